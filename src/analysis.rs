use serde::{Deserialize, Serialize};

use crate::netlist::format_number;
use crate::results::AnalysisKind;

/// Default reference impedance for S-parameter analyses, in ohms
pub const DEFAULT_Z0: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepKind {
    Lin,
    Log,
}

impl SweepKind {
    fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Lin => "lin",
            SweepKind::Log => "log",
        }
    }
}

/// Frequency sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub kind: SweepKind,
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

impl Sweep {
    pub fn lin(start: f64, stop: f64, points: usize) -> Self {
        Sweep {
            kind: SweepKind::Lin,
            start,
            stop,
            points,
        }
    }

    pub fn log(start: f64, stop: f64, points: usize) -> Self {
        Sweep {
            kind: SweepKind::Log,
            start,
            stop,
            points,
        }
    }

    fn params(&self) -> String {
        format!(
            "Type=\"{}\" Start=\"{}\" Stop=\"{}\" Points=\"{}\"",
            self.kind.as_str(),
            format_number(self.start),
            format_number(self.stop),
            self.points
        )
    }
}

/// Analysis requested from the solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Analysis {
    /// DC operating point
    Dc,
    Transient { start: f64, stop: f64, points: usize },
    Ac { sweep: Sweep },
    SParameter { sweep: Sweep, z0: f64 },
    /// AC sweep with noise correlation output
    Noise { sweep: Sweep },
}

impl Analysis {
    /// Prefix of the directive label (`DC1`, `TR1`, ...)
    pub fn label_prefix(&self) -> &'static str {
        match self {
            Analysis::Dc => "DC",
            Analysis::Transient { .. } => "TR",
            Analysis::Ac { .. } | Analysis::Noise { .. } => "AC",
            Analysis::SParameter { .. } => "SP",
        }
    }

    /// Directive line, e.g. `.TR:TR1 Type="lin" Start="0" Stop="0.001" Points="101"`
    pub fn directive(&self, label: &str) -> String {
        match self {
            Analysis::Dc => format!(".DC:{}", label),
            Analysis::Transient {
                start,
                stop,
                points,
            } => format!(
                ".TR:{} {}",
                label,
                Sweep::lin(*start, *stop, *points).params()
            ),
            Analysis::Ac { sweep } => format!(".AC:{} {} Noise=\"no\"", label, sweep.params()),
            Analysis::Noise { sweep } => format!(".AC:{} {} Noise=\"yes\"", label, sweep.params()),
            Analysis::SParameter { sweep, .. } => format!(".SP:{} {}", label, sweep.params()),
        }
    }

    /// Tag selecting how the solver's output is decoded. `ports` is only
    /// used by S-parameter analyses.
    pub fn kind(&self, ports: usize) -> AnalysisKind {
        match self {
            Analysis::Dc => AnalysisKind::Dc,
            Analysis::Transient { .. } => AnalysisKind::Transient,
            Analysis::Ac { .. } => AnalysisKind::Ac,
            Analysis::SParameter { z0, .. } => AnalysisKind::SParameter { ports, z0: *z0 },
            Analysis::Noise { .. } => AnalysisKind::Noise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(Analysis::Dc.directive("DC1"), ".DC:DC1");

        let tran = Analysis::Transient {
            start: 0.0,
            stop: 1e-3,
            points: 101,
        };
        assert_eq!(
            tran.directive("TR1"),
            ".TR:TR1 Type=\"lin\" Start=\"0\" Stop=\"0.001\" Points=\"101\""
        );

        let sp = Analysis::SParameter {
            sweep: Sweep::lin(1e9, 2e9, 11),
            z0: DEFAULT_Z0,
        };
        assert_eq!(
            sp.directive("SP1"),
            ".SP:SP1 Type=\"lin\" Start=\"1000000000\" Stop=\"2000000000\" Points=\"11\""
        );

        let noise = Analysis::Noise {
            sweep: Sweep::log(1.0, 1e5, 6),
        };
        assert!(noise.directive("AC1").ends_with("Noise=\"yes\""));
    }

    #[test]
    fn test_kind_mapping() {
        let sp = Analysis::SParameter {
            sweep: Sweep::lin(1e9, 2e9, 11),
            z0: 75.0,
        };
        assert_eq!(sp.kind(2), AnalysisKind::SParameter { ports: 2, z0: 75.0 });
        assert_eq!(Analysis::Dc.kind(0), AnalysisKind::Dc);
        assert_eq!(
            Analysis::Noise {
                sweep: Sweep::lin(1.0, 2.0, 2)
            }
            .kind(0),
            AnalysisKind::Noise
        );
    }
}
