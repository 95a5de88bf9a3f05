pub mod analysis;
pub mod circuit;
pub mod cli;
pub mod component;
pub mod dataset;
pub mod error;
pub mod netlist;
pub mod nodes;
pub mod parser;
pub mod pin;
pub mod results;
pub mod simulator;
pub mod waveform;

// Re-export commonly used types
pub use analysis::{Analysis, Sweep, SweepKind};
pub use circuit::Circuit;
pub use component::{Component, ComponentKind, Equations, ParamValue};
pub use error::{BridgeError, ErrorKind};
pub use netlist::{format_number, render_netlist};
pub use nodes::NodeId;
pub use parser::NetlistParser;
pub use pin::Pin;
pub use results::{parse_results, AnalysisKind, SimulationResult};
pub use simulator::{Simulator, SimulatorConfig, Solver};
pub use waveform::{FileData, FileFormat};

// Error types
pub type Result<T> = error::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
