//! Declarative data model for a Modbus RTU device.
//!
//! `rtu-ir` provides the typed building blocks a caller assembles into a
//! [`Tree`]: the [`Matcher`] family that describes the byte-level shape
//! of a request field, the [`identification`] object table behind the
//! MEI "Read Device Identification" sub-protocol, and the
//! callback/device/command types that make up the tree itself.
//!
//! This crate is pure data plus the small amount of behavior that is
//! intrinsic to a value's own semantics (`Matcher::fits`,
//! `Matcher::render_predicate`, `Matcher::size`) — it does not know how
//! to build a state graph or emit text; that's `rtu-codegen`'s job.
//!
//! # Entry point
//!
//! ```
//! use rtu_ir::{CallbackParam, CallbackProto, Command, Device, DeviceAddress, Matcher, Tree, ValueKind};
//!
//! let tree = Tree::new()
//!     .with_callback(CallbackProto::new("on_read", vec![CallbackParam::new(ValueKind::U16)]))
//!     .with_device(Device::new(
//!         DeviceAddress::Fixed(1),
//!         vec![Command::calling(
//!             vec![
//!                 Matcher::exact(ValueKind::U8, 0x03).unwrap(),
//!                 Matcher::range(ValueKind::U16, 0, 0x100).unwrap(),
//!             ],
//!             "on_read",
//!         )],
//!     ));
//! assert_eq!(tree.devices().len(), 1);
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod identification;
pub mod matcher;
pub mod tree;
pub mod value;

pub use identification::{Conformity, IdentObject, IdentificationTable};
pub use matcher::{Matcher, MatcherError, MatcherFamily, Predicate};
pub use tree::{
    Action, CallbackParam, CallbackProto, Command, Device, DeviceAddress, Mode, Tree,
};
pub use value::{Signedness, ValueKind};
