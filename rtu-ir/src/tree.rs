//! The declarative input tree: callbacks, devices and their command
//! sequences, and the handful of process-wide settings (mode, slave id,
//! namespace, buffer floor). This is the in-memory shape the builder
//! walks — authored directly as Rust values by the caller, never parsed
//! from an external file format.

use crate::identification::IdentificationTable;
use crate::matcher::Matcher;
use crate::value::ValueKind;

/// Decode/reply mode for the generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// The generated code answers requests (the common case).
    Slave,
    /// The generated code issues requests and decodes the slave's
    /// replies, echo-checking address and function code.
    Master,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Slave
    }
}

/// One positional parameter of a callback prototype: a value kind and
/// an optional display name used only in generated comments.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackParam {
    kind: ValueKind,
    name: Option<String>,
}

impl CallbackParam {
    /// A parameter with no display name.
    #[must_use]
    pub fn new(kind: ValueKind) -> Self {
        CallbackParam { kind, name: None }
    }

    /// A parameter with a display name — the `(tag, name)` pair shape.
    #[must_use]
    pub fn named(kind: ValueKind, name: impl Into<String>) -> Self {
        CallbackParam {
            kind,
            name: Some(name.into()),
        }
    }

    /// The parameter's value kind.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The parameter's display name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A callback's name and ordered parameter prototype, as declared in
/// the root `callbacks` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackProto {
    name: String,
    params: Vec<CallbackParam>,
}

impl CallbackProto {
    /// Declares a callback named `name` with the given ordered
    /// parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Vec<CallbackParam>) -> Self {
        CallbackProto {
            name: name.into(),
            params,
        }
    }

    /// The callback's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The callback's ordered parameter prototype.
    #[must_use]
    pub fn params(&self) -> &[CallbackParam] {
        &self.params
    }
}

/// A device's address: either fixed at code-generation time, or set at
/// runtime through a generated mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAddress {
    /// `device` — the address is a mutable variable set at runtime.
    Runtime,
    /// `device@<addr>` — the address is a compile-time constant,
    /// `0..=254` (`255` is the Modbus broadcast address and is not a
    /// valid device address here).
    Fixed(u8),
}

/// What a command sequence does once fully matched: invoke a named
/// callback, or do nothing (the `NOTHING` sentinel — the sequence still
/// produces a reachable terminal state, just with a no-op action).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Invoke the named callback with the values captured along the
    /// sequence.
    Callback(String),
    /// No callback was named for this sequence.
    Nothing,
}

/// One command: the function-code matcher, zero or more data matchers,
/// and the terminal action.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    matchers: Vec<Matcher>,
    action: Action,
}

impl Command {
    /// Builds a command from its ordered matchers (function code
    /// first) and terminal action.
    #[must_use]
    pub fn new(matchers: Vec<Matcher>, action: Action) -> Self {
        Command { matchers, action }
    }

    /// A command that invokes `callback` once fully matched.
    #[must_use]
    pub fn calling(matchers: Vec<Matcher>, callback: impl Into<String>) -> Self {
        Command::new(matchers, Action::Callback(callback.into()))
    }

    /// A command with no callback — the `NOTHING` sentinel.
    #[must_use]
    pub fn silent(matchers: Vec<Matcher>) -> Self {
        Command::new(matchers, Action::Nothing)
    }

    /// The ordered matchers, function code first.
    #[must_use]
    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// The terminal action.
    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }
}

/// One declared device: its address and the command sequences it
/// accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    address: DeviceAddress,
    commands: Vec<Command>,
}

impl Device {
    /// Declares a device at `address` accepting `commands`.
    #[must_use]
    pub fn new(address: DeviceAddress, commands: Vec<Command>) -> Self {
        Device { address, commands }
    }

    /// The device's address.
    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// The device's command sequences, in declaration order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

/// The full declarative description of one Modbus RTU device family —
/// the root of the tree the builder consumes.
#[derive(Debug, Clone)]
pub struct Tree {
    callbacks: Vec<CallbackProto>,
    identification: IdentificationTable,
    slave_id: u8,
    buffer_size_floor: Option<u16>,
    mode: Mode,
    namespace: String,
    on_received: Option<String>,
    devices: Vec<Device>,
}

impl Tree {
    /// An empty tree in `slave` mode, namespace `"slave"`, slave id
    /// `0xFF` — the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Tree {
            callbacks: Vec::new(),
            identification: IdentificationTable::new(),
            slave_id: 0xFF,
            buffer_size_floor: None,
            mode: Mode::Slave,
            namespace: "slave".to_string(),
            on_received: None,
            devices: Vec::new(),
        }
    }

    /// Declares one callback prototype.
    #[must_use]
    pub fn with_callback(mut self, proto: CallbackProto) -> Self {
        self.callbacks.push(proto);
        self
    }

    /// Sets the identification table (function 17 / 43-14 support).
    #[must_use]
    pub fn with_identification(mut self, table: IdentificationTable) -> Self {
        self.identification = table;
        self
    }

    /// Overrides the default slave id (`0xFF`) packed into the function
    /// 17 reply.
    #[must_use]
    pub fn with_slave_id(mut self, slave_id: u8) -> Self {
        self.slave_id = slave_id;
        self
    }

    /// Sets a buffer size floor — the emitted buffer is never smaller
    /// than this, even if no command needs it.
    #[must_use]
    pub fn with_buffer_size_floor(mut self, floor: u16) -> Self {
        self.buffer_size_floor = Some(floor);
        self
    }

    /// Sets the decode/reply mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Overrides the default namespace (`"slave"`) the emitted code is
    /// generated under.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Declares a callback invoked on every complete, well-formed
    /// frame, in addition to any command-specific callback.
    #[must_use]
    pub fn with_on_received(mut self, callback: impl Into<String>) -> Self {
        self.on_received = Some(callback.into());
        self
    }

    /// Declares one device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    /// The declared callback prototypes.
    #[must_use]
    pub fn callbacks(&self) -> &[CallbackProto] {
        &self.callbacks
    }

    /// The identification table.
    #[must_use]
    pub fn identification(&self) -> &IdentificationTable {
        &self.identification
    }

    /// The slave id packed into the function 17 reply.
    #[must_use]
    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    /// The user-supplied buffer size floor, if any.
    #[must_use]
    pub fn buffer_size_floor(&self) -> Option<u16> {
        self.buffer_size_floor
    }

    /// The decode/reply mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The emitted namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The `on_received` callback name, if declared.
    #[must_use]
    pub fn on_received(&self) -> Option<&str> {
        self.on_received.as_deref()
    }

    /// The declared devices, in declaration order.
    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let tree = Tree::new();
        assert_eq!(tree.slave_id(), 0xFF);
        assert_eq!(tree.namespace(), "slave");
        assert_eq!(tree.mode(), Mode::Slave);
        assert!(tree.devices().is_empty());
    }

    #[test]
    fn builder_accumulates_devices() {
        let tree = Tree::new()
            .with_device(Device::new(DeviceAddress::Fixed(1), vec![]))
            .with_device(Device::new(DeviceAddress::Runtime, vec![]));
        assert_eq!(tree.devices().len(), 2);
    }
}
