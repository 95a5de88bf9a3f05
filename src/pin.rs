use std::fmt;

/// A named connection point on a component, or the circuit's ground.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pin {
    Ground,
    Terminal { component: String, terminal: String },
}

impl Pin {
    pub fn new(component: impl Into<String>, terminal: impl Into<String>) -> Self {
        Pin::Terminal {
            component: component.into(),
            terminal: terminal.into(),
        }
    }

    pub fn ground() -> Self {
        Pin::Ground
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, Pin::Ground)
    }

    /// Name of the owning component, `None` for ground
    pub fn component(&self) -> Option<&str> {
        match self {
            Pin::Ground => None,
            Pin::Terminal { component, .. } => Some(component),
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::Ground => write!(f, "gnd"),
            Pin::Terminal { component, terminal } => write!(f, "{}.{}", component, terminal),
        }
    }
}
