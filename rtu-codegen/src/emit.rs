//! The emitter (component F): walks a built [`Graph`] plus the ambient
//! settings from [`BuiltArtifact`] and renders the full decode/reply
//! source text, substituting each named section into the master or
//! slave template.

use rtu_ir::{Mode, ValueKind};

use crate::builder::BuiltArtifact;
use crate::graph::{Graph, State, Terminal, Transition};
use crate::identification::{render_read_device_identification, render_report_slave_id};
use rtu_ir::MatcherFamily;

const TEMPLATE_SLAVE: &str = include_str!("templates/slave.tpl");
const TEMPLATE_MASTER: &str = include_str!("templates/master.tpl");

/// Renders the full source text for `artifact`, indenting nested blocks
/// with `tab` repeated per level (the CLI's `--tab-size` setting
/// controls its width; four spaces is the documented default).
#[must_use]
pub fn render(artifact: &BuiltArtifact, tab: &str) -> String {
    let template = match artifact.mode() {
        Mode::Slave => TEMPLATE_SLAVE,
        Mode::Master => TEMPLATE_MASTER,
    };

    let mut out = template
        .replace("@NAMESPACE@", artifact.namespace())
        .replace("@BUFSIZE@", &artifact.buffer_size().to_string())
        .replace("@PROTOTYPES@", render_prototypes(artifact, tab).trim_end())
        .replace("@ENUMS@", render_enums(artifact.graph(), tab).trim_end())
        .replace("@CASES@", render_cases(artifact.graph(), tab).trim_end())
        .replace("@CALLBACKS@", render_callbacks(artifact.graph(), tab).trim_end())
        .replace(
            "@READY_REPLY_CALLBACK@",
            render_ready_reply_callback(artifact).trim_end(),
        );

    if artifact.mode() == Mode::Slave {
        out = out
            .replace("@DEVICE_ADDRESS@", render_device_address(artifact, tab).trim_end())
            .replace(
                "@set_device_address@",
                render_set_device_address(artifact, tab).trim_end(),
            )
            .replace("@INCOMPLETE@", render_incomplete(artifact.graph(), tab).trim_end())
            .replace(
                "@SLAVE_ID_FUNCTION@",
                render_report_slave_id(artifact.identification(), artifact.slave_id(), tab, 1)
                    .trim_end(),
            )
            .replace(
                "@SLAVE_READ_ID_REQUEST@",
                render_read_device_identification(artifact.identification(), tab, 1).trim_end(),
            );
    }

    out
}

fn render_device_address(artifact: &BuiltArtifact, tab: &str) -> String {
    let fixed_address = single_fixed_device_address(artifact.graph());
    match fixed_address {
        Some(addr) => format!(
            "///< Device ID\n{tab}{tab}static constexpr auto device_address = uint8_t{{{addr}}};"
        ),
        None => format!(
            "///< Runtime ID. Set-up before starting the modbus\n{tab}{tab}inline static uint8_t device_address = 255;"
        ),
    }
}

fn render_set_device_address(artifact: &BuiltArtifact, tab: &str) -> String {
    if single_fixed_device_address(artifact.graph()).is_some() {
        return String::new();
    }
    format!(
        "///< Set the device address\n\
         {tab}{tab}static inline void set_device_address(uint8_t new_address) {{\n\
         {tab}{tab}{tab}device_address = new_address;\n\
         {tab}{tab}}}"
    )
}

/// Returns the fixed address when the graph declares exactly one
/// `DEVICE_<addr>`-style root transition and no runtime one; otherwise
/// `None` (a runtime-addressed device, or several fixed devices, both
/// of which need the mutable `device_address` rather than a constant).
fn single_fixed_device_address(graph: &Graph) -> Option<u8> {
    let root = graph.state(graph.root());
    if root.transitions().len() != 1 {
        return None;
    }
    let transition = &root.transitions()[0];
    match transition.matcher().family() {
        MatcherFamily::Value(ValueKind::U8) => match transition.matcher().predicate() {
            rtu_ir::Predicate::Exact(v) => Some(*v as u8),
            _ => None,
        },
        _ => None,
    }
}

fn render_ready_reply_callback(artifact: &BuiltArtifact) -> String {
    match artifact.on_received() {
        Some(name) => format!("{name}(std::string_view{{(char *)buffer, cnt}});"),
        None => String::new(),
    }
}

fn render_prototypes(artifact: &BuiltArtifact, tab: &str) -> String {
    let mut out = String::new();
    for proto in artifact.callbacks() {
        out.push_str(tab);
        out.push_str("void ");
        out.push_str(proto.name());
        out.push('(');
        let params: Vec<String> = proto
            .params()
            .iter()
            .map(|p| match p.name() {
                Some(name) => format!("{} {name}", p.kind().type_name()),
                None => p.kind().type_name().to_string(),
            })
            .collect();
        out.push_str(&params.join(", "));
        out.push_str(");\n");
    }

    if let Some(name) = artifact.on_received() {
        out.push_str(tab);
        out.push_str(&format!("void {name}(std::string_view);\n"));
    }

    out
}

fn render_enums(graph: &Graph, tab: &str) -> String {
    graph
        .states()
        .iter()
        .filter(|s| s.terminal().is_none())
        .map(|s| format!("{tab}{tab}{}", s.name()))
        .collect::<Vec<_>>()
        .join(",\n")
}

fn render_cases(graph: &Graph, tab: &str) -> String {
    let mut out = String::new();
    for state in graph.states() {
        if state.terminal().is_some() {
            continue;
        }
        out.push_str(&format!("{tab}{tab}{tab}case state_t::{}:\n", state.name()));
        out.push_str(&render_state_body(graph, state, 4));
    }

    for state in graph.states() {
        if state.terminal().is_some() {
            out.push_str(&format!("{tab}{tab}{tab}case state_t::{}:\n", state.name()));
        }
    }

    out
}

fn render_incomplete(graph: &Graph, tab: &str) -> String {
    graph
        .states()
        .iter()
        .filter(|s| s.terminal().is_none())
        .map(|s| format!("{tab}{tab}case state_t::{}:\n", s.name()))
        .collect()
}

fn render_callbacks(graph: &Graph, tab: &str) -> String {
    let mut out = String::new();
    for state in graph.states() {
        let Some(terminal) = state.terminal() else { continue };
        out.push_str(&format!("{tab}{tab}case state_t::{}:\n", state.name()));
        let body = match terminal {
            Terminal::Operation(op) => op.render_call(),
            Terminal::NoOperation => "// Reply is ignored".to_string(),
        };
        out.push_str(&format!("{tab}{tab}{tab}{body}\n{tab}{tab}{tab}break;\n"));
    }

    out
}

fn render_state_body(graph: &Graph, state: &State, indent: usize) -> String {
    let tab = "    ".repeat(indent);
    let mut body = String::new();

    if state.position() == 0 && state.mode() == Mode::Master {
        body.push_str(&format!(
            "{tab}// The address must match the address just sent and still in the buffer\n\
             {tab}if ( c != buffer[0] ) {{\n\
             {tab}    error = error_t::ignore_frame;\n\
             {tab}    state = state_t::IGNORE;\n\
             {tab}    break;\n\
             {tab}}}\n"
        ));
    }

    if state.position() == 1 && state.mode() == Mode::Master {
        body.push_str(&format!(
            "{tab}// The command must match the command just sent\n\
             {tab}if ( c == (0x80 | buffer[1]) ) {{ // Bit 7 indicates an error\n\
             {tab}    state = state_t::BAD_REQUEST;\n\
             {tab}    break;\n\
             {tab}}} else if ( c != buffer[1] ) {{\n\
             {tab}    state = state_t::ERROR;\n\
             {tab}    break;\n\
             {tab}}}\n\n"
        ));
    }

    for group in group_transitions(state.transitions()) {
        body.push_str(&render_group(graph, &group, state.position(), indent));
    }

    body.push_str(&format!("{tab}break;\n"));
    body
}

fn group_transitions(transitions: &[Transition]) -> Vec<Vec<&Transition>> {
    let mut groups: Vec<(MatcherFamily, Vec<&Transition>)> = Vec::new();
    for t in transitions {
        if let Some(existing) = groups.iter_mut().find(|(f, _)| *f == t.matcher().family()) {
            existing.1.push(t);
        } else {
            groups.push((t.matcher().family(), vec![t]));
        }
    }
    groups.into_iter().map(|(_, v)| v).collect()
}

fn render_group(graph: &Graph, transitions: &[&Transition], position: u32, indent: usize) -> String {
    let tab = "    ".repeat(indent);
    let size = transitions[0].matcher().size();

    if transitions[0].matcher().family() == MatcherFamily::CrcTail {
        let t = transitions[0];
        let next_name = graph.state(t.next()).name();
        let inner = "    ".repeat(indent + 1);
        return format!(
            "{tab}if ( cnt == {} ) {{\n{inner}state = state_t::{next_name};\n{tab}}}\n",
            position + u32::from(size)
        );
    }

    let var = "c";
    let mut prefix = String::new();
    if size == 2 {
        prefix = format!("{tab}auto c = ntoh(cnt-2);\n\n");
    } else if size == 4 {
        prefix = format!("{tab}auto c = ntohl(cnt-4);\n\n");
    }

    let (error, error_state) = match position {
        0 => ("error_t::ignore_frame", "IGNORE"),
        1 => ("error_t::illegal_function_code", "ERROR"),
        _ => ("error_t::illegal_data_value", "ERROR"),
    };

    let tested: Vec<(&Transition, String)> = transitions
        .iter()
        .filter_map(|t| t.matcher().render_predicate(var).map(|test| (*t, test)))
        .collect();
    let wildcard = transitions
        .iter()
        .find(|t| t.matcher().render_predicate(var).is_none());

    // `statement_indent` is the indent the if/else chain itself sits at:
    // unchanged for a single-byte matcher (it runs directly in the case
    // body), one level deeper for a multi-byte matcher (it runs inside
    // the `if (cnt == ...)` wrapper that collects the accumulated bytes).
    let statement_indent = if size == 1 { indent } else { indent + 1 };
    let s_tab = "    ".repeat(statement_indent);
    let s_inner = "    ".repeat(statement_indent + 1);

    let statement = if tested.is_empty() {
        let next_name = wildcard.map(|t| graph.state(t.next()).name()).unwrap_or("ERROR");
        format!("{s_tab}state = state_t::{next_name};\n")
    } else {
        let mut chain = String::new();
        for (index, (t, test)) in tested.iter().enumerate() {
            if index > 0 {
                chain.push_str(" else ");
            }
            let next_name = graph.state(t.next()).name();
            chain.push_str(&format!(
                "{}if ( {test} ) {{\n{s_inner}state = state_t::{next_name};\n{s_tab}}}",
                if index == 0 { &s_tab } else { "" }
            ));
        }
        chain.push_str(&format!(
            " else {{\n{s_inner}error = {error};\n{s_inner}state = state_t::{error_state};\n{s_tab}}}\n"
        ));
        chain
    };

    if size == 1 {
        format!("{prefix}{statement}")
    } else {
        format!(
            "{prefix}{tab}if ( cnt == {} ) {{\n{statement}{tab}}}\n",
            position + u32::from(size)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::identification::is_synthetic_callback;
    use rtu_ir::{
        CallbackParam, CallbackProto, Command, Device, DeviceAddress, IdentObject, IdentificationTable,
        Matcher, Tree,
    };

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
    fn renders_a_complete_slave_artifact() {
        let built = build(&single_read_tree()).unwrap();
        let text = render(&built, "    ");
        assert!(text.contains("namespace slave {"));
        assert!(text.contains("void on_read(uint16_t"));
        assert!(text.contains("on_read(ntoh("));
        assert!(text.contains("static constexpr auto device_address = uint8_t{1};"));
        assert!(!text.contains("set_device_address"));
        assert!(text.contains("inline void on_diagnostics() {}"));
    }

    #[test]
    fn runtime_device_renders_mutator() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_a", vec![]))
            .with_device(Device::new(
                DeviceAddress::Runtime,
                vec![Command::calling(vec![Matcher::exact(ValueKind::U8, 1).unwrap()], "on_a")],
            ));
        let built = build(&tree).unwrap();
        let text = render(&built, "    ");
        assert!(text.contains("inline static uint8_t device_address = 255;"));
        assert!(text.contains("static inline void set_device_address(uint8_t new_address)"));
    }

    #[test]
    fn identification_sections_render_when_active() {
        let tree = Tree::new()
            .with_callback(CallbackProto::new("on_read", vec![CallbackParam::new(ValueKind::U16)]))
            .with_identification(
                IdentificationTable::new()
                    .with(IdentObject::ProductCode, "PC")
                    .with(IdentObject::ModelName, "MX"),
            )
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![Command::calling(
                    vec![
                        Matcher::exact(ValueKind::U8, 0x03).unwrap(),
                        Matcher::range(ValueKind::U16, 0, 0x100).unwrap(),
                    ],
                    "on_read",
                )],
            ));
        let built = build(&tree).unwrap();
        let text = render(&built, "    ");
        assert!(text.contains("on_report_slave_id"));
        assert!(text.contains("on_read_device_identification"));
    }

    #[test]
    fn master_mode_renders_echo_guards() {
        let tree = Tree::new()
            .with_mode(Mode::Master)
            .with_callback(CallbackProto::new("on_a", vec![]))
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![Command::calling(vec![Matcher::exact(ValueKind::U8, 3).unwrap()], "on_a")],
            ));
        let built = build(&tree).unwrap();
        let text = render(&built, "    ");
        assert!(text.contains("The address must match the address just sent"));
        assert!(text.contains("The command must match the command just sent"));
    }

    #[test]
    fn diagnostics_stub_does_not_duplicate_synthetic_callback() {
        assert!(is_synthetic_callback("on_diagnostics"));
    }
}
