//! The single structured error type the builder can fail with. Every
//! variant here is fatal: on any of these, generation aborts and no
//! partial artifact is ever emitted.

use rtu_ir::ValueKind;
use thiserror::Error;

/// Everything that can go wrong building a state machine from a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A command referenced a callback name not present in the root
    /// `callbacks` table.
    #[error("unknown callback `{0}`")]
    UnknownCallback(String),

    /// A callback or namespace name is not a valid identifier.
    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),

    /// A `device@<text>` address literal could not be parsed as decimal
    /// or `0x` hex.
    #[error("`{0}` is not a valid device address")]
    BadDeviceAddress(String),

    /// A parsed device address exceeded 254.
    #[error("device address {0} is out of range (must be 0..=254)")]
    AddressOutOfRange(u32),

    /// A captured matcher does not fit the callback parameter it feeds.
    #[error(
        "callback `{callback}` parameter {position}: matcher {matcher} does not fit {parameter}"
    )]
    SizeMismatch {
        /// The callback being built.
        callback: String,
        /// The zero-based parameter position.
        position: usize,
        /// The offending matcher, rendered for display.
        matcher: String,
        /// The parameter's declared value kind.
        parameter: ValueKind,
    },

    /// Two sibling transitions out of the same state have matchers with
    /// overlapping predicates but different next-states — the prefix
    /// trie cannot merge them.
    #[error("state `{state}` has conflicting transitions on {matcher}")]
    ConflictingTransitions {
        /// The state the conflict was detected in.
        state: String,
        /// The matcher shared by the conflicting transitions.
        matcher: String,
    },

    /// An `identification` key is not one of the sixteen recognized MEI
    /// object codes.
    #[error("0x{0:02x} is not a recognized identification object code")]
    InvalidIdentificationKey(u8),

    /// `identification` was declared without `PRODUCT_CODE`, the
    /// minimum required object.
    #[error("identification requires PRODUCT_CODE to be declared")]
    MissingProductCode,

    /// `mode` was neither `slave` nor `master`.
    #[error("`{0}` is not a valid mode (expected slave or master)")]
    InvalidMode(String),

    /// The root `callbacks` table was absent.
    #[error("the tree declares no callbacks")]
    MissingCallbacks,
}
