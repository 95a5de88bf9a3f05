use crate::analysis::Analysis;
use crate::circuit::Circuit;
use crate::component::Component;
use crate::nodes::NodeId;

/// First line of a complete netlist document
pub const NETLIST_HEADER: &str = "# Qucs 0.0.19";

/// Canonical number formatting.
///
/// Rust's float formatting is the shortest text that parses back to the same
/// `f64`, so both branches round-trip exactly. Very small and very large
/// magnitudes use exponent notation (`1e-12`) instead of long digit runs.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if value.is_finite() && (1e-3..1e15).contains(&magnitude) {
        format!("{}", value)
    } else {
        format!("{:e}", value)
    }
}

/// Render one component with the nodes of its terminals:
/// `Tag:Name node_1 ... node_k key="value" ...`. Ground renders as `gnd` and
/// only parameters that differ from the kind's default are written.
pub fn component_line(component: &Component, nodes: &[NodeId]) -> String {
    let mut line = format!("{}:{}", component.kind().tag(), component.name());

    for node in nodes {
        line.push(' ');
        line.push_str(&node.to_string());
    }

    for (name, value) in component.non_default_params() {
        line.push_str(&format!(" {}=\"{}\"", name, value));
    }

    for (branch, equations) in component.equations() {
        line.push_str(&format!(
            " I{}=\"{}\" Q{}=\"{}\"",
            branch, equations.current, branch, equations.charge
        ));
    }

    line
}

impl Component {
    /// Netlist line of this component, given the nodes of its terminals
    pub fn to_line(&self, nodes: &[NodeId]) -> String {
        component_line(self, nodes)
    }
}

/// Component lines of a circuit, newline terminated
pub fn render_components(circuit: &Circuit) -> String {
    let assignment = circuit.assign_nodes();
    let mut out = String::new();

    for (component, nodes) in circuit.resolved(&assignment) {
        if !component.emits_line() {
            continue;
        }
        out.push_str(&component_line(component, nodes));
        out.push('\n');
    }

    out
}

/// A complete netlist document: optional header, components, then one
/// directive line per analysis.
pub fn render_netlist(circuit: &Circuit, analyses: &[Analysis], header: bool) -> String {
    let mut out = String::new();
    if header {
        out.push_str(&format!("{}  {}\n", NETLIST_HEADER, circuit.title));
    }

    out.push_str(&render_components(circuit));

    for (i, analysis) in analyses.iter().enumerate() {
        out.push_str(&analysis.directive(&format!("{}{}", analysis.label_prefix(), i + 1)));
        out.push('\n');
    }

    out
}
