use log::{debug, info};

use crate::analysis::Analysis;
use crate::circuit::Circuit;
use crate::error::{BridgeError, Result};
use crate::netlist::render_netlist;
use crate::results::{parse_results, SimulationResult};

/// External solver: takes netlist text, returns dataset text.
///
/// Implemented for closures so tests and callers can plug in any process
/// runner or canned output.
pub trait Solver {
    fn solve(&self, netlist: &str) -> Result<String>;
}

impl<F> Solver for F
where
    F: Fn(&str) -> Result<String>,
{
    fn solve(&self, netlist: &str) -> Result<String> {
        self(netlist)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Write the `# Qucs ...` header comment
    pub header: bool,
    /// Label used for log messages and solver errors
    pub analysis_label: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            header: true,
            analysis_label: "simulation".to_string(),
        }
    }
}

/// Render, solve, decode
pub struct Simulator<S: Solver> {
    solver: S,
    config: SimulatorConfig,
}

impl<S: Solver> Simulator<S> {
    /// Create a new simulator with default configuration
    pub fn new(solver: S) -> Self {
        Self::with_config(solver, SimulatorConfig::default())
    }

    pub fn with_config(solver: S, config: SimulatorConfig) -> Self {
        Simulator { solver, config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Netlist text handed to the solver for this circuit and analysis
    pub fn netlist(&self, circuit: &Circuit, analysis: &Analysis) -> String {
        render_netlist(circuit, std::slice::from_ref(analysis), self.config.header)
    }

    /// Run one analysis. The solver is called exactly once.
    pub fn run(&self, circuit: &Circuit, analysis: &Analysis) -> Result<SimulationResult> {
        let netlist = self.netlist(circuit, analysis);
        info!(
            "Running {} of '{}' ({} components)",
            self.config.analysis_label,
            circuit.title,
            circuit.len()
        );
        debug!("Netlist:\n{}", netlist);

        let output = self.solver.solve(&netlist).map_err(|e| match e {
            BridgeError::Solver { .. } => e,
            other => BridgeError::Solver {
                message: format!("{}: {}", self.config.analysis_label, other),
            },
        })?;

        let result = parse_results(&output, &analysis.kind(circuit.port_count()))?;
        info!("{} of '{}' completed", self.config.analysis_label, circuit.title);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Sweep, DEFAULT_Z0};
    use crate::component::Component;
    use crate::pin::Pin;
    use std::cell::RefCell;

    fn divider() -> Circuit {
        let mut circuit = Circuit::new("Divider");
        circuit.add(Component::dc_voltage("V1", 5.0)).unwrap();
        circuit.add(Component::resistor("R1", 1000.0)).unwrap();
        circuit.add(Component::resistor("R2", 500.0)).unwrap();
        circuit.wire("V1", &[Pin::new("R1", "1"), Pin::ground()]).unwrap();
        circuit.wire("R2", &[Pin::new("R1", "2"), Pin::ground()]).unwrap();
        circuit
    }

    #[test]
    fn test_run_passes_netlist_and_decodes() {
        let seen = RefCell::new(Vec::new());
        let solver = |netlist: &str| -> Result<String> {
            seen.borrow_mut().push(netlist.to_string());
            Ok("<Qucs Dataset 0.0.19>\n<dep 2.V>\n  +1.6666666666666667e+00\n</dep>\n".to_string())
        };

        let simulator = Simulator::new(solver);
        let result = simulator.run(&divider(), &Analysis::Dc).unwrap();

        let calls = seen.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            "# Qucs 0.0.19  Divider\n\
             Vdc:V1 1 gnd U=\"5\"\n\
             R:R1 1 2 R=\"1000\"\n\
             R:R2 2 gnd R=\"500\"\n\
             .DC:DC1\n"
        );
        assert!(result.as_dc().unwrap().voltage("2").is_some());
    }

    #[test]
    fn test_headerless_config() {
        let simulator = Simulator::with_config(
            |_: &str| -> Result<String> { Ok(String::new()) },
            SimulatorConfig {
                header: false,
                ..SimulatorConfig::default()
            },
        );
        let netlist = simulator.netlist(&divider(), &Analysis::Dc);
        assert!(netlist.starts_with("Vdc:V1"));
    }

    #[test]
    fn test_solver_failure() {
        let simulator = Simulator::new(|_: &str| -> Result<String> {
            Err(BridgeError::Solver {
                message: "exit status 1".to_string(),
            })
        });
        let err = simulator.run(&divider(), &Analysis::Dc).unwrap_err();
        assert!(matches!(err, BridgeError::Solver { ref message } if message == "exit status 1"));

        let simulator = Simulator::new(|_: &str| -> Result<String> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "qucsator").into())
        });
        let err = simulator.run(&divider(), &Analysis::Dc).unwrap_err();
        assert!(matches!(err, BridgeError::Solver { .. }));
    }

    #[test]
    fn test_s_parameter_uses_port_count() {
        let mut circuit = Circuit::new("Through");
        circuit.add(Component::power_port("P1", 1, DEFAULT_Z0)).unwrap();
        circuit.add(Component::power_port("P2", 2, DEFAULT_Z0)).unwrap();
        circuit.add(Component::resistor("R1", 50.0)).unwrap();
        circuit.wire("P1", &[Pin::new("R1", "1"), Pin::ground()]).unwrap();
        circuit.wire("P2", &[Pin::new("R1", "2"), Pin::ground()]).unwrap();

        let partial = "<Qucs Dataset 0.0.19>\n<indep frequency 1>\n1e9\n</indep>\n\
                       <dep S[1,1] frequency>\n0.5\n</dep>\n";
        let simulator = Simulator::new(move |_: &str| -> Result<String> { Ok(partial.to_string()) });
        let analysis = Analysis::SParameter {
            sweep: Sweep::lin(1e9, 1e9, 1),
            z0: DEFAULT_Z0,
        };

        match simulator.run(&circuit, &analysis) {
            Err(BridgeError::IncompleteMatrix { ports, missing }) => {
                assert_eq!(ports, 2);
                assert_eq!(missing, vec![(1, 2), (2, 1), (2, 2)]);
            }
            other => panic!("expected IncompleteMatrix, got {:?}", other),
        }
    }
}
