//! The builder (component D): walks a [`Tree`], allocates states,
//! inserts transitions through the prefix trie, and attaches terminal
//! operations — producing a [`BuiltArtifact`] ready for the emitter.

use std::collections::{HashMap, HashSet};

use rtu_ir::{Action, CallbackProto, Command, DeviceAddress, IdentificationTable, Matcher, Mode, Tree};

use crate::error::BuildError;
use crate::graph::{Graph, Terminal};
use crate::identification::synthetic_commands;
use crate::operation::Operation;

/// The fully built automaton plus the ambient settings the emitter
/// needs alongside it.
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    graph: Graph,
    buffer_size: u16,
    callbacks: Vec<CallbackProto>,
    identification: IdentificationTable,
    slave_id: u8,
    mode: Mode,
    namespace: String,
    on_received: Option<String>,
}

impl BuiltArtifact {
    /// The built state graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The emitted buffer size: the longest command's byte length plus
    /// four, floored by the tree's configured minimum.
    #[must_use]
    pub fn buffer_size(&self) -> u16 {
        self.buffer_size
    }

    /// All callback prototypes, including synthetic identification ones.
    #[must_use]
    pub fn callbacks(&self) -> &[CallbackProto] {
        &self.callbacks
    }

    /// The identification table, as declared.
    #[must_use]
    pub fn identification(&self) -> &IdentificationTable {
        &self.identification
    }

    /// The slave id packed into the function 17 reply.
    #[must_use]
    pub fn slave_id(&self) -> u8 {
        self.slave_id
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

    /// The `on_received` callback, if declared.
    #[must_use]
    pub fn on_received(&self) -> Option<&str> {
        self.on_received.as_deref()
    }
}

/// Whether `name` is a valid C-style identifier: starts with a letter
/// or underscore, followed by letters, digits or underscores, and is
/// non-empty.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a `device@<addr>` literal's address text (decimal or `0x`
/// hex), as the external tree format would present it.
///
/// # Errors
///
/// Returns [`BuildError::BadDeviceAddress`] if `text` is not a valid
/// decimal or hex literal, or [`BuildError::AddressOutOfRange`] if the
/// parsed value exceeds 254.
pub fn parse_device_address(text: &str) -> Result<DeviceAddress, BuildError> {
    let trimmed = text.trim();
    let value = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| BuildError::BadDeviceAddress(text.to_string()))?
    } else {
        trimmed
            .parse::<u32>()
            .map_err(|_| BuildError::BadDeviceAddress(text.to_string()))?
    };

    if value > 254 {
        return Err(BuildError::AddressOutOfRange(value));
    }

    Ok(DeviceAddress::Fixed(value as u8))
}

/// Parses a `mode` literal (`"slave"` or `"master"`), as the external
/// tree format would present it.
///
/// # Errors
///
/// Returns [`BuildError::InvalidMode`] for any other text.
pub fn parse_mode(text: &str) -> Result<Mode, BuildError> {
    match text {
        "slave" => Ok(Mode::Slave),
        "master" => Ok(Mode::Master),
        other => Err(BuildError::InvalidMode(other.to_string())),
    }
}

/// Builds the full automaton from `tree`.
///
/// # Errors
///
/// Returns any of the [`BuildError`] variants: unknown callback,
/// invalid identifier, duplicate device address, out-of-range address,
/// conflicting sibling transitions, identification without a product
/// code or with an unrecognized key, or a size-fit violation.
pub fn build(tree: &Tree) -> Result<BuiltArtifact, BuildError> {
    if tree.callbacks().is_empty() {
        return Err(BuildError::MissingCallbacks);
    }

    let mut callbacks: HashMap<String, CallbackProto> = HashMap::new();
    for proto in tree.callbacks() {
        if !is_valid_identifier(proto.name()) {
            return Err(BuildError::InvalidIdentifier(proto.name().to_string()));
        }
        callbacks.insert(proto.name().to_string(), proto.clone());
    }

    if !is_valid_identifier(tree.namespace()) {
        return Err(BuildError::InvalidIdentifier(tree.namespace().to_string()));
    }

    if let Some(on_received) = tree.on_received() {
        if !callbacks.contains_key(on_received) {
            return Err(BuildError::UnknownCallback(on_received.to_string()));
        }
    }

    let identification = tree.identification().clone();
    let identification_active = tree.mode() == Mode::Slave && !identification.is_empty();
    if identification_active && identification.slave_id_identifier().is_none() {
        return Err(BuildError::MissingProductCode);
    }

    let synth = if identification_active {
        let synth = synthetic_commands();
        for proto in &synth.callbacks {
            callbacks.insert(proto.name().to_string(), proto.clone());
        }
        Some(synth)
    } else {
        None
    };

    let mut graph = Graph::new(tree.mode());
    let mut seen_fixed: HashSet<u8> = HashSet::new();
    let mut seen_runtime = false;
    let mut max_command_size: u16 = 0;
    let mut identification_attached = false;

    // A fixed `device@<addr>` is always preferred over a bare runtime
    // `device` as the home for the synthetic identification commands,
    // regardless of declaration order — matching the original tool's
    // `next(key for key in tree if key.startswith("device@"))` lookup,
    // which only falls back to the bare `device` key when no `device@`
    // key exists at all.
    let synth_target = tree
        .devices()
        .iter()
        .position(|d| matches!(d.address(), DeviceAddress::Fixed(_)))
        .or(if tree.devices().is_empty() { None } else { Some(0) });

    for (index, device) in tree.devices().iter().enumerate() {
        let (matcher, name) = match device.address() {
            DeviceAddress::Fixed(addr) => {
                if addr > 254 {
                    return Err(BuildError::AddressOutOfRange(u32::from(addr)));
                }
                if !seen_fixed.insert(addr) {
                    return Err(BuildError::ConflictingTransitions {
                        state: "DEVICE_ADDRESS".to_string(),
                        matcher: format!("u8({addr})"),
                    });
                }
                let matcher = Matcher::exact(rtu_ir::ValueKind::U8, i64::from(addr))
                    .map_err(|_| BuildError::AddressOutOfRange(u32::from(addr)))?;
                (matcher, format!("DEVICE_{addr}"))
            }
            DeviceAddress::Runtime => {
                if seen_runtime {
                    return Err(BuildError::ConflictingTransitions {
                        state: "DEVICE_ADDRESS".to_string(),
                        matcher: "RuntimeDeviceAddress".to_string(),
                    });
                }
                seen_runtime = true;
                (Matcher::runtime_device_address(), "DEVICE".to_string())
            }
        };

        let device_matcher = matcher.clone();
        let device_state = graph.insert_transition_named(graph.root(), matcher, name)?;

        let mut commands: Vec<&Command> = device.commands().iter().collect();
        let owned_synth_commands;
        if !identification_attached && synth_target == Some(index) {
            if let Some(synth) = &synth {
                owned_synth_commands = synth.commands.clone();
                commands.extend(owned_synth_commands.iter());
                identification_attached = true;
            }
        }

        for command in &commands {
            let size: u16 = command.matchers().iter().map(|m| u16::from(m.size())).sum();
            max_command_size = max_command_size.max(size);
            process_command(&mut graph, device_state, &device_matcher, command, &callbacks)?;
        }
    }

    if identification_active && !identification_attached {
        return Err(BuildError::MissingProductCode);
    }

    let mut buffer_size = max_command_size + 4;
    if let Some(floor) = tree.buffer_size_floor() {
        buffer_size = buffer_size.max(floor);
    }

    let mut callback_list: Vec<CallbackProto> = callbacks.into_values().collect();
    callback_list.sort_by(|a, b| a.name().cmp(b.name()));

    Ok(BuiltArtifact {
        graph,
        buffer_size,
        callbacks: callback_list,
        identification,
        slave_id: tree.slave_id(),
        mode: tree.mode(),
        namespace: tree.namespace().to_string(),
        on_received: tree.on_received().map(str::to_string),
    })
}

fn process_command(
    graph: &mut Graph,
    device_state: usize,
    device_matcher: &Matcher,
    command: &Command,
    callbacks: &HashMap<String, CallbackProto>,
) -> Result<(), BuildError> {
    let Some((last, init)) = command.matchers().split_last() else {
        return Ok(());
    };

    let mut state = device_state;
    for matcher in init {
        let hint = matcher.alias().map(str::to_string).unwrap_or_else(|| {
            (graph.state(state).transitions().len() + 1).to_string()
        });
        state = graph.insert_transition(state, matcher.clone(), &hint)?;
    }

    let crc_state = graph.insert_crc_entry(state, last.clone())?;

    // Build the chain: device address matcher first, then every command matcher.
    let mut capture_chain = Vec::with_capacity(command.matchers().len() + 1);
    capture_chain.push(device_matcher.clone());
    capture_chain.extend(command.matchers().iter().cloned());

    let (terminal_name, terminal) = match command.action() {
        Action::Nothing => ("RDY_TO_CALL__NOTHING".to_string(), Terminal::NoOperation),
        Action::Callback(name) => {
            let proto = callbacks
                .get(name)
                .ok_or_else(|| BuildError::UnknownCallback(name.clone()))?;
            let prototype: Vec<_> = proto.params().iter().map(|p| p.kind()).collect();
            let operation = Operation::new(name.clone(), &prototype, &capture_chain)?;
            (
                format!("RDY_TO_CALL__{}", name.to_uppercase()),
                Terminal::Operation(operation),
            )
        }
    };

    let terminal_state = graph.get_or_create_terminal(&terminal_name, terminal);
    graph.add_crc_acceptance(crc_state, terminal_state);

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rtu_ir::{CallbackParam, Command, Device, ValueKind};

    fn single_read_tree() -> Tree {
        Tree::new()
            .with_callback(CallbackProto::new("on_read", vec![CallbackParam::new(ValueKind::U16)]))
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![Command::calling(
                    vec![
                        Matcher::exact(ValueKind::U8, 0x03).unwrap(),
                        Matcher::range(ValueKind::U16, 0, 0x100).unwrap(),
                    ],
                    "on_read",
                )],
            ))
    }

    #[test]
    fn single_command_shapes_expected_states() {
        let built = build(&single_read_tree()).unwrap();
        let names: Vec<&str> = built.graph().states().iter().map(|s| s.name()).collect();
        assert!(names.contains(&"DEVICE_ADDRESS"));
        assert!(names.contains(&"DEVICE_1"));
        assert!(names.contains(&"DEVICE_1_2"));
        assert!(names.contains(&"DEVICE_1_2__CRC"));
        assert!(names.contains(&"RDY_TO_CALL__ON_READ"));
        assert!(built.buffer_size() >= 7);
    }

    #[test]
    fn missing_callbacks_is_rejected() {
        let tree = Tree::new();
        assert_eq!(build(&tree).unwrap_err(), BuildError::MissingCallbacks);
    }

    #[test]
    fn unknown_callback_is_rejected() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_read", vec![]))
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![Command::calling(vec![Matcher::exact(ValueKind::U8, 1).unwrap()], "on_missing")],
            ));
        assert_eq!(
            build(&tree).unwrap_err(),
            BuildError::UnknownCallback("on_missing".to_string())
        );
    }

    #[test]
    fn duplicate_fixed_address_conflicts() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_read", vec![]))
            .with_device(Device::new(DeviceAddress::Fixed(1), vec![]))
            .with_device(Device::new(DeviceAddress::Fixed(1), vec![]));
        assert!(matches!(
            build(&tree).unwrap_err(),
            BuildError::ConflictingTransitions { .. }
        ));
    }

    #[test]
    fn prefix_sharing_merges_shared_prefix() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_a", vec![]))
            .with_callback(CallbackProto::new("on_b", vec![]))
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![
                    Command::calling(
                        vec![
                            Matcher::exact(ValueKind::U8, 0x03).unwrap(),
                            Matcher::range(ValueKind::U16, 0, 0x100).unwrap(),
                            Matcher::exact(ValueKind::U8, 1).unwrap(),
                        ],
                        "on_a",
                    ),
                    Command::calling(
                        vec![
                            Matcher::exact(ValueKind::U8, 0x03).unwrap(),
                            Matcher::range(ValueKind::U16, 0, 0x100).unwrap(),
                            Matcher::exact(ValueKind::U8, 2).unwrap(),
                        ],
                        "on_b",
                    ),
                ],
            ));
        let built = build(&tree).unwrap();
        let names: Vec<&str> = built.graph().states().iter().map(|s| s.name()).collect();
        let shared_prefix_occurrences = names.iter().filter(|n| **n == "DEVICE_1_2").count();
        assert_eq!(shared_prefix_occurrences, 1);
        assert!(names.contains(&"RDY_TO_CALL__ON_A"));
        assert!(names.contains(&"RDY_TO_CALL__ON_B"));
    }

    #[test]
    fn overlapping_siblings_reject() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_a", vec![]))
            .with_callback(CallbackProto::new("on_b", vec![]))
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![
                    Command::calling(vec![Matcher::exact(ValueKind::U8, 5).unwrap()], "on_a"),
                    Command::calling(
                        vec![Matcher::one_of(ValueKind::U8, vec![5, 6]).unwrap()],
                        "on_b",
                    ),
                ],
            ));
        assert!(matches!(
            build(&tree).unwrap_err(),
            BuildError::ConflictingTransitions { .. }
        ));
    }

    #[test]
    fn runtime_address_has_no_fixed_constant() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_a", vec![]))
            .with_device(Device::new(
                DeviceAddress::Runtime,
                vec![Command::calling(vec![Matcher::exact(ValueKind::U8, 1).unwrap()], "on_a")],
            ));
        let built = build(&tree).unwrap();
        assert!(built
            .graph()
            .states()
            .iter()
            .any(|s| s.name() == "DEVICE"));
    }

    #[test]
    fn nothing_commands_share_one_terminal() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_a", vec![]))
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![
                    Command::silent(vec![Matcher::exact(ValueKind::U8, 5).unwrap()]),
                    Command::silent(vec![Matcher::exact(ValueKind::U8, 6).unwrap()]),
                ],
            ));
        let built = build(&tree).unwrap();
        let terminal_count = built
            .graph()
            .states()
            .iter()
            .filter(|s| s.name() == "RDY_TO_CALL__NOTHING")
            .count();
        assert_eq!(terminal_count, 1);
    }

    #[test]
    fn address_parsing_accepts_decimal_and_hex() {
        assert_eq!(parse_device_address("23").unwrap(), DeviceAddress::Fixed(23));
        assert_eq!(parse_device_address("0x17").unwrap(), DeviceAddress::Fixed(23));
    }

    #[test]
    fn address_parsing_rejects_out_of_range() {
        assert_eq!(
            parse_device_address("255").unwrap_err(),
            BuildError::AddressOutOfRange(255)
        );
    }

    #[test]
    fn identification_prefers_fixed_device_over_runtime() {
        // A runtime device declared first must not steal the synthetic
        // identification commands from a fixed device declared after it.
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_a", vec![]))
            .with_identification(
                IdentificationTable::new().with(rtu_ir::IdentObject::ProductCode, "PC"),
            )
            .with_device(Device::new(
                DeviceAddress::Runtime,
                vec![Command::calling(vec![Matcher::exact(ValueKind::U8, 1).unwrap()], "on_a")],
            ))
            .with_device(Device::new(DeviceAddress::Fixed(2), vec![]));
        let built = build(&tree).unwrap();
        let runtime_has_report_slave_id = built
            .graph()
            .states()
            .iter()
            .find(|s| s.name() == "DEVICE")
            .map(|s| s.transitions().iter().any(|t| t.matcher().alias() == Some("REPORT_SLAVE_ID")))
            .unwrap_or(false);
        assert!(!runtime_has_report_slave_id);
        let fixed_has_report_slave_id = built
            .graph()
            .states()
            .iter()
            .find(|s| s.name() == "DEVICE_2")
            .map(|s| s.transitions().iter().any(|t| t.matcher().alias() == Some("REPORT_SLAVE_ID")))
            .unwrap_or(false);
        assert!(fixed_has_report_slave_id);
    }
}
