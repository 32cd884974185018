//! `rtu-slave-demo` — authors one concrete Modbus RTU slave device tree as
//! Rust values and runs it through [`rtu_codegen`], the way the original
//! tool's callers authored their tree as a literal Python dict passed
//! into `Modbus(tree)`.
//!
//! A minimal holding-register device at address `0x01`, exposing read and
//! write commands plus a full device-identification table (vendor name,
//! product code, revision, URL, model name — enough to reach the
//! "regular" conformity level and exercise the function 17 / 43-14 reply
//! builders).
//!
//! **Usage:**
//! ```text
//! rtu-slave-demo [-o <path>] [-t <0..8>]
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::process::ExitCode;

use anyhow::Result;
use rtu_ir::{
    CallbackParam, CallbackProto, Command, Device, DeviceAddress, IdentObject, IdentificationTable,
    Matcher, Tree, ValueKind,
};

fn build_tree() -> Result<Tree> {
    let identification = IdentificationTable::new()
        .with(IdentObject::VendorName, "Example Co")
        .with(IdentObject::ProductCode, "RTU-DEMO")
        .with(IdentObject::MajorMinorRevision, "1.0")
        .with(IdentObject::VendorUrl, "https://example.invalid")
        .with(IdentObject::ModelName, "HoldingRegs5");

    let read_holding_registers = Command::calling(
        vec![
            Matcher::exact(ValueKind::U8, 0x03)?.with_alias("READ_HOLDING_REGISTERS"),
            Matcher::range(ValueKind::U16, 0, 5)?.with_alias("START"),
            Matcher::range(ValueKind::U16, 1, 6)?.with_alias("COUNT"),
        ],
        "on_read_holding_registers",
    );

    let write_single_register = Command::calling(
        vec![
            Matcher::exact(ValueKind::U8, 0x06)?.with_alias("WRITE_SINGLE_REGISTER"),
            Matcher::range(ValueKind::U16, 0, 5)?.with_alias("ADDRESS"),
            Matcher::any(ValueKind::U16).with_alias("VALUE"),
        ],
        "on_write_single_register",
    );

    let tree = Tree::new()
        .with_callback(CallbackProto::new(
            "on_read_holding_registers",
            vec![
                CallbackParam::named(ValueKind::U16, "start"),
                CallbackParam::named(ValueKind::U16, "count"),
            ],
        ))
        .with_callback(CallbackProto::new(
            "on_write_single_register",
            vec![
                CallbackParam::named(ValueKind::U16, "address"),
                CallbackParam::named(ValueKind::U16, "value"),
            ],
        ))
        .with_identification(identification)
        .with_namespace("slave")
        .with_device(Device::new(
            DeviceAddress::Fixed(0x01),
            vec![read_holding_registers, write_single_register],
        ));

    Ok(tree)
}

fn main() -> ExitCode {
    match build_tree() {
        Ok(tree) => rtu_codegen::cli::run(&tree),
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
