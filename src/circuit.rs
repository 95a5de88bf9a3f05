use std::collections::HashMap;

use log::debug;

use crate::component::{Component, ComponentKind};
use crate::error::{BridgeError, Result};
use crate::netlist;
use crate::nodes::{NodeAssignment, NodeId, NodeResolver};
use crate::pin::Pin;

/// Complete circuit representation
///
/// Components keep their insertion order, which fixes both the netlist line
/// order and the node numbering.
#[derive(Debug, Clone)]
pub struct Circuit {
    pub title: String,
    components: Vec<Component>,
    /// First terminal slot of each component, parallel to `components`
    offsets: Vec<usize>,
    index: HashMap<String, usize>,
    resolver: NodeResolver,
}

impl Circuit {
    pub fn new(title: impl Into<String>) -> Self {
        Circuit {
            title: title.into(),
            components: Vec::new(),
            offsets: Vec::new(),
            index: HashMap::new(),
            resolver: NodeResolver::new(),
        }
    }

    /// Add a component to the circuit
    pub fn add(&mut self, component: Component) -> Result<()> {
        if self.index.contains_key(component.name()) {
            return Err(BridgeError::DuplicateComponent {
                name: component.name().to_string(),
            });
        }

        let first = self.resolver.add_slots(component.terminal_count());
        if component.kind() == ComponentKind::Ground {
            self.resolver.union(first, NodeResolver::GROUND_SLOT);
        }

        debug!(
            "Added {} '{}' with {} terminals",
            component.kind().tag(),
            component.name(),
            component.terminal_count()
        );

        self.index.insert(component.name().to_string(), self.components.len());
        self.offsets.push(first);
        self.components.push(component);
        Ok(())
    }

    /// Merge the electrical identity of two pins
    pub fn connect(&mut self, a: &Pin, b: &Pin) -> Result<()> {
        let slot_a = self.slot_of(a)?;
        let slot_b = self.slot_of(b)?;
        if self.resolver.union(slot_a, slot_b) {
            debug!("Connected {} to {}", a, b);
        }
        Ok(())
    }

    /// Connect terminal `i` of a component to `pins[i]`, for every terminal.
    pub fn wire(&mut self, name: &str, pins: &[Pin]) -> Result<()> {
        let position = self.position(name)?;
        let component = &self.components[position];
        if pins.len() != component.terminal_count() {
            return Err(BridgeError::Arity {
                component: name.to_string(),
                expected: component.terminal_count(),
                actual: pins.len(),
            });
        }

        // Resolve everything before merging so a bad pin leaves no partial wiring.
        let first = self.offsets[position];
        let targets = pins
            .iter()
            .map(|pin| self.slot_of(pin))
            .collect::<Result<Vec<_>>>()?;

        for (terminal, target) in targets.into_iter().enumerate() {
            self.resolver.union(first + terminal, target);
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| BridgeError::UnknownComponent {
                name: name.to_string(),
            })
    }

    fn slot_of(&self, pin: &Pin) -> Result<usize> {
        match pin {
            Pin::Ground => Ok(NodeResolver::GROUND_SLOT),
            Pin::Terminal { component, terminal } => {
                let position = self.position(component)?;
                let owner = &self.components[position];
                let offset = owner.terminal_index(terminal).ok_or_else(|| {
                    BridgeError::UnknownTerminal {
                        component: component.clone(),
                        terminal: terminal.clone(),
                        available: owner.terminal_names().join(", "),
                    }
                })?;
                Ok(self.offsets[position] + offset)
            }
        }
    }

    /// Number every terminal's node. Recomputed from the connection set on
    /// each call; identical connection sets give identical numbering.
    pub fn assign_nodes(&self) -> NodeAssignment {
        self.resolver.assign()
    }

    /// Node of a single pin
    pub fn node_of(&self, pin: &Pin) -> Result<NodeId> {
        let slot = self.slot_of(pin)?;
        let nodes = self.assign_nodes();
        Ok(nodes.node(slot).unwrap_or(NodeId::GROUND))
    }

    /// Nodes of all terminals of a component, in terminal order
    pub fn nodes_of(&self, name: &str, assignment: &NodeAssignment) -> Result<Vec<NodeId>> {
        let position = self.position(name)?;
        let component = &self.components[position];
        Ok(assignment
            .nodes(self.offsets[position], component.terminal_count())
            .to_vec())
    }

    /// Components paired with their terminal nodes, in insertion order
    pub fn resolved<'a>(
        &'a self,
        assignment: &'a NodeAssignment,
    ) -> impl Iterator<Item = (&'a Component, &'a [NodeId])> + 'a {
        self.components
            .iter()
            .zip(self.offsets.iter())
            .map(move |(component, &first)| (component, assignment.nodes(first, component.terminal_count())))
    }

    /// Render the component lines of the netlist
    pub fn to_netlist(&self) -> String {
        netlist::render_components(self)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.index.get(name).map(|&position| &self.components[position])
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of S-parameter ports (power sources) in the circuit
    pub fn port_count(&self) -> usize {
        self.components
            .iter()
            .filter(|component| component.kind() == ComponentKind::PowerPort)
            .count()
    }
}
