use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, space0, space1},
    combinator::not,
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::circuit::Circuit;
use crate::component::{Component, ComponentKind, Equations, ParamValue};
use crate::error::{BridgeError, Result};
use crate::netlist::NETLIST_HEADER;
use crate::pin::Pin;

/// Node token that denotes ground
pub const GROUND_MARKER: &str = "gnd";

/// One component line, split into its tokens
#[derive(Debug, Clone, PartialEq)]
pub struct NetlistLine {
    /// 1-based line number in the source text
    pub line: usize,
    pub tag: String,
    pub name: String,
    pub nodes: Vec<String>,
    pub params: Vec<(String, String)>,
}

/// Parsed netlist document
#[derive(Debug, Clone, Default)]
pub struct ParsedNetlist {
    pub title: Option<String>,
    pub components: Vec<NetlistLine>,
    /// Analysis directive lines, verbatim
    pub directives: Vec<String>,
}

#[derive(Debug, Default)]
pub struct NetlistParser;

impl NetlistParser {
    pub fn new() -> Self {
        NetlistParser
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParsedNetlist> {
        let path = path.as_ref();
        info!("Reading netlist from: {}", path.display());
        let content = fs::read_to_string(path)?;
        self.parse_netlist(&content)
    }

    pub fn parse_netlist(&self, content: &str) -> Result<ParsedNetlist> {
        let mut netlist = ParsedNetlist::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix(NETLIST_HEADER) {
                let title = rest.trim();
                if !title.is_empty() {
                    netlist.title = Some(title.to_string());
                }
                continue;
            }

            // Comments
            if line.starts_with('#') {
                continue;
            }

            if line.starts_with('.') {
                netlist.directives.push(line.to_string());
                continue;
            }

            netlist.components.push(parse_line(line, index + 1)?);
        }

        debug!(
            "Parsed {} component lines and {} directives",
            netlist.components.len(),
            netlist.directives.len()
        );
        Ok(netlist)
    }
}

impl ParsedNetlist {
    /// Rebuild a circuit. Terminals sharing a node token are connected,
    /// `gnd` terminals go to ground.
    pub fn into_circuit(self) -> Result<Circuit> {
        let mut circuit = Circuit::new(self.title.unwrap_or_default());
        let mut anchors: HashMap<String, Pin> = HashMap::new();

        for line in &self.components {
            let component = Component::from_line(line)?;
            let name = component.name().to_string();
            let terminals = component.terminal_names();
            circuit.add(component)?;

            for (terminal, node) in terminals.into_iter().zip(&line.nodes) {
                let pin = Pin::new(name.clone(), terminal);
                if node == GROUND_MARKER {
                    circuit.connect(&pin, &Pin::ground())?;
                } else if let Some(anchor) = anchors.get(node) {
                    circuit.connect(&pin, anchor)?;
                } else {
                    anchors.insert(node.clone(), pin);
                }
            }
        }

        Ok(circuit)
    }
}

/// Parse a single `Tag:Name node... key="value"...` line
pub fn parse_line(input: &str, line: usize) -> Result<NetlistLine> {
    let (rest, ((tag, name), nodes, params)) = component_line(input.trim())
        .map_err(|e| BridgeError::syntax(line, format!("malformed component line: {}", e)))?;

    if !rest.is_empty() {
        return Err(BridgeError::syntax(
            line,
            format!("unexpected trailing text '{}'", rest),
        ));
    }

    Ok(NetlistLine {
        line,
        tag: tag.to_string(),
        name: name.to_string(),
        nodes: nodes.into_iter().map(str::to_string).collect(),
        params: params
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    })
}

type LineParts<'a> = ((&'a str, &'a str), Vec<&'a str>, Vec<(&'a str, &'a str)>);

fn component_line(input: &str) -> IResult<&str, LineParts<'_>> {
    let (input, head) = separated_pair(identifier, char(':'), instance_name)(input)?;
    let (input, nodes) = many0(preceded(space1, node_token))(input)?;
    let (input, params) = many0(preceded(space1, parameter))(input)?;
    let (input, _) = space0(input)?;
    Ok((input, (head, nodes, params)))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn instance_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn node_token(input: &str) -> IResult<&str, &str> {
    terminated(
        take_while1(|c: char| !c.is_whitespace() && c != '=' && c != '"'),
        not(char('=')),
    )(input)
}

fn parameter(input: &str) -> IResult<&str, (&str, &str)> {
    pair(
        terminated(identifier, char('=')),
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
    )(input)
}

/// Parse value with unit suffix (e.g., 1k, 1meg, 1m, 1u, 1n, 1p)
pub fn parse_value_with_unit(value_str: &str) -> Result<f64> {
    let trimmed = value_str.trim();
    if let Ok(value) = trimmed.parse::<f64>() {
        return Ok(value);
    }

    let lower = trimmed.to_lowercase();
    let (number, multiplier) = if let Some(num_str) = lower.strip_suffix("meg") {
        (num_str, 1e6)
    } else if let Some(num_str) = lower.strip_suffix('t') {
        (num_str, 1e12)
    } else if let Some(num_str) = lower.strip_suffix('g') {
        (num_str, 1e9)
    } else if let Some(num_str) = lower.strip_suffix('k') {
        (num_str, 1e3)
    } else if let Some(num_str) = lower.strip_suffix('m') {
        (num_str, 1e-3)
    } else if let Some(num_str) = lower.strip_suffix('u') {
        (num_str, 1e-6)
    } else if let Some(num_str) = lower.strip_suffix('n') {
        (num_str, 1e-9)
    } else if let Some(num_str) = lower.strip_suffix('p') {
        (num_str, 1e-12)
    } else if let Some(num_str) = lower.strip_suffix('f') {
        (num_str, 1e-15)
    } else {
        (lower.as_str(), 1.0)
    };

    number
        .trim()
        .parse::<f64>()
        .map(|value| value * multiplier)
        .map_err(|_| BridgeError::format("<value>", format!("invalid number '{}'", value_str)))
}

impl Component {
    /// Rebuild a component from its netlist line, validating terminal count
    /// and every parameter against the kind's default table.
    pub fn from_line(line: &NetlistLine) -> Result<Component> {
        let kind = ComponentKind::from_tag(&line.tag).ok_or_else(|| {
            BridgeError::syntax(line.line, format!("unknown component type '{}'", line.tag))
        })?;

        let component = if kind == ComponentKind::EquationDevice {
            equation_device_from_line(line)?
        } else {
            let mut component = Component::new(kind, line.name.clone())?;
            for (key, raw) in &line.params {
                let default = kind.default_of(key).ok_or_else(|| BridgeError::UnknownParameter {
                    component: line.name.clone(),
                    param: key.clone(),
                })?;
                let value = if default.value.is_number() {
                    let number = parse_value_with_unit(raw).map_err(|_| BridgeError::InvalidParameter {
                        component: line.name.clone(),
                        param: key.clone(),
                        message: format!("'{}' is not a number", raw),
                    })?;
                    ParamValue::Number(number)
                } else {
                    ParamValue::Text(raw.clone())
                };
                component.set(key, value)?;
            }
            component
        };

        if line.nodes.len() != component.terminal_count() {
            return Err(BridgeError::Arity {
                component: line.name.clone(),
                expected: component.terminal_count(),
                actual: line.nodes.len(),
            });
        }

        Ok(component)
    }
}

fn equation_device_from_line(line: &NetlistLine) -> Result<Component> {
    let mut current = BTreeMap::new();
    let mut charge = BTreeMap::new();

    for (key, expr) in &line.params {
        let (table, number) = if let Some(number) = key.strip_prefix('I') {
            (&mut current, number)
        } else if let Some(number) = key.strip_prefix('Q') {
            (&mut charge, number)
        } else {
            return Err(BridgeError::UnknownParameter {
                component: line.name.clone(),
                param: key.clone(),
            });
        };
        let branch: usize = number.parse().map_err(|_| BridgeError::UnknownParameter {
            component: line.name.clone(),
            param: key.clone(),
        })?;
        table.insert(branch, expr.clone());
    }

    let branches = line.nodes.len() / 2;
    if line.nodes.len() % 2 != 0 {
        return Err(BridgeError::Arity {
            component: line.name.clone(),
            expected: 2 * (branches + 1),
            actual: line.nodes.len(),
        });
    }

    let equations = current
        .into_iter()
        .fold(Equations::new(branches), |eqs, (branch, expr)| eqs.current(branch, expr));
    let equations = charge
        .into_iter()
        .fold(equations, |eqs, (branch, expr)| eqs.charge(branch, expr));

    Component::equation_device(line.name.clone(), equations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeId;

    #[test]
    fn test_parse_resistor() {
        let line = parse_line("R:R1 1 gnd R=\"1 k\" Temp=\"30\"", 3).unwrap();
        assert_eq!(line.line, 3);
        assert_eq!(line.tag, "R");
        assert_eq!(line.name, "R1");
        assert_eq!(line.nodes, vec!["1", "gnd"]);
        assert_eq!(
            line.params,
            vec![
                ("R".to_string(), "1 k".to_string()),
                ("Temp".to_string(), "30".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_line_without_params() {
        let line = parse_line("Short:S1 1 2", 1).unwrap();
        assert_eq!(line.nodes, vec!["1", "2"]);
        assert!(line.params.is_empty());
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(matches!(
            parse_line("R1 1 2 1k", 7),
            Err(BridgeError::Syntax { line: 7, .. })
        ));
        assert!(parse_line("R:R1 1 2 R=\"5", 1).is_err());
        assert!(parse_line("R:R1 1 2 R=\"5\" 3", 1).is_err());
    }

    #[test]
    fn test_parse_value_with_unit() {
        assert_eq!(parse_value_with_unit("1k").unwrap(), 1000.0);
        assert_eq!(parse_value_with_unit("1.5meg").unwrap(), 1.5e6);
        assert_eq!(parse_value_with_unit("10m").unwrap(), 10e-3);
        assert_eq!(parse_value_with_unit("1u").unwrap(), 1e-6);
        assert_eq!(parse_value_with_unit("1e-12").unwrap(), 1e-12);
        assert!(parse_value_with_unit("inf").unwrap().is_infinite());
        assert!(parse_value_with_unit("abc").is_err());
    }

    #[test]
    fn test_component_round_trip() {
        let components = vec![
            Component::resistor("R1", 4.7e3).with("Temp", 85.0).unwrap(),
            Component::capacitor("C1", 1e-12).with("V", "0.5").unwrap(),
            Component::new(ComponentKind::Mosfet, "M1")
                .unwrap()
                .with("Type", "pfet")
                .unwrap()
                .with("W", 2.5e-6)
                .unwrap()
                .with("Tox", 0.1 + 0.2)
                .unwrap(),
            Component::new(ComponentKind::PulseVoltage, "V2")
                .unwrap()
                .with("U2", 3.3)
                .unwrap()
                .with("Tr", 1e-12)
                .unwrap(),
            Component::file_voltage("V3", "data/my wave.csv").unwrap(),
            Component::new(ComponentKind::Triac, "T1").unwrap(),
        ];

        for original in components {
            let nodes: Vec<NodeId> = (1..=original.terminal_count()).map(NodeId).collect();
            let text = original.to_line(&nodes);
            let parsed = parse_line(&text, 1).unwrap();
            let rebuilt = Component::from_line(&parsed).unwrap();
            assert_eq!(rebuilt, original, "{}", text);

            for (name, value) in original.params() {
                let default = original.kind().default_of(name).unwrap();
                let emitted = text.contains(&format!(" {}=\"", name));
                assert_eq!(emitted, !default.value.matches(value), "{} in {}", name, text);
            }
        }
    }

    #[test]
    fn test_equation_device_from_line() {
        let line = parse_line(
            "EDD:D1 1 gnd 2 gnd I1=\"V1*V2\" Q1=\"0\" I2=\"0\" Q2=\"1e-12*V2\"",
            1,
        )
        .unwrap();
        let edd = Component::from_line(&line).unwrap();
        assert_eq!(edd.branch_count(), 2);
        assert_eq!(edd.equations()[&1].current, "V1*V2");
        assert_eq!(edd.equations()[&2].charge, "1e-12*V2");

        let odd = parse_line("EDD:D1 1 gnd 2 I1=\"V1\" Q1=\"0\"", 1).unwrap();
        assert!(matches!(
            Component::from_line(&odd),
            Err(BridgeError::Arity { .. })
        ));

        let missing = parse_line("EDD:D1 1 gnd I1=\"V1\"", 1).unwrap();
        assert!(matches!(
            Component::from_line(&missing),
            Err(BridgeError::MissingEquation { .. })
        ));
    }

    #[test]
    fn test_from_line_validation() {
        let unknown_tag = parse_line("Xyz:X1 1 2", 4).unwrap();
        assert!(matches!(
            Component::from_line(&unknown_tag),
            Err(BridgeError::Syntax { line: 4, .. })
        ));

        let bad_param = parse_line("R:R1 1 2 Q=\"1\"", 1).unwrap();
        assert!(matches!(
            Component::from_line(&bad_param),
            Err(BridgeError::UnknownParameter { .. })
        ));

        let bad_value = parse_line("R:R1 1 2 R=\"lots\"", 1).unwrap();
        assert!(matches!(
            Component::from_line(&bad_value),
            Err(BridgeError::InvalidParameter { .. })
        ));

        let arity = parse_line("R:R1 1 2 3", 1).unwrap();
        assert!(matches!(
            Component::from_line(&arity),
            Err(BridgeError::Arity { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_netlist_round_trip_through_circuit() {
        let text = "# Qucs 0.0.19  Ladder\n\
                    Vdc:V1 1 gnd U=\"12\"\n\
                    R:R1 1 2 R=\"1000\"\n\
                    # tap\n\
                    R:R2 2 3 R=\"2200\"\n\
                    C:C1 3 gnd C=\"1e-9\"\n\
                    .DC:DC1\n";

        let parsed = NetlistParser::new().parse_netlist(text).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Ladder"));
        assert_eq!(parsed.components.len(), 4);
        assert_eq!(parsed.directives, vec![".DC:DC1"]);

        let circuit = parsed.into_circuit().unwrap();
        assert_eq!(circuit.title, "Ladder");
        let body: String = text
            .lines()
            .filter(|line| !line.starts_with('#') && !line.starts_with('.'))
            .map(|line| format!("{}\n", line))
            .collect();
        assert_eq!(circuit.to_netlist(), body);
    }
}
