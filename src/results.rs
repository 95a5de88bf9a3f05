use lazy_static::lazy_static;
use log::debug;
use num_complex::Complex64;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::dataset::{Dataset, Vector};
use crate::error::{BridgeError, Result};

// Label used for format errors in solver output, which has no file path
const RESULTS_LABEL: &str = "<results>";

lazy_static! {
    static ref S_PARAMETER_PATTERN: Regex = Regex::new(r"^S\[(\d+),(\d+)\]$").unwrap();
    static ref CORRELATION_PATTERN: Regex = Regex::new(r"^C\[([^,\]]+),([^,\]]+)\]$").unwrap();
}

/// Selects how dataset text is decoded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnalysisKind {
    Dc,
    Transient,
    Ac,
    SParameter { ports: usize, z0: f64 },
    Noise,
}

impl AnalysisKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisKind::Dc => "DC",
            AnalysisKind::Transient => "transient",
            AnalysisKind::Ac => "AC",
            AnalysisKind::SParameter { .. } => "S-parameter",
            AnalysisKind::Noise => "noise",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum SimulationResult {
    Dc(DcResult),
    Transient(WaveformResult<f64>),
    Ac(WaveformResult<Complex64>),
    SParameter(SParameterResult),
    Noise(NoiseResult),
}

impl SimulationResult {
    pub fn as_dc(&self) -> Option<&DcResult> {
        match self {
            SimulationResult::Dc(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_transient(&self) -> Option<&WaveformResult<f64>> {
        match self {
            SimulationResult::Transient(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_ac(&self) -> Option<&WaveformResult<Complex64>> {
        match self {
            SimulationResult::Ac(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_s_parameter(&self) -> Option<&SParameterResult> {
        match self {
            SimulationResult::SParameter(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_noise(&self) -> Option<&NoiseResult> {
        match self {
            SimulationResult::Noise(result) => Some(result),
            _ => None,
        }
    }
}

/// Operating point: one voltage per node, one current per branch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DcResult {
    voltages: BTreeMap<String, f64>,
    currents: BTreeMap<String, f64>,
}

impl DcResult {
    pub fn voltage(&self, node: &str) -> Option<f64> {
        self.voltages.get(node).copied()
    }

    pub fn current(&self, branch: &str) -> Option<f64> {
        self.currents.get(branch).copied()
    }

    pub fn voltages(&self) -> &BTreeMap<String, f64> {
        &self.voltages
    }

    pub fn currents(&self) -> &BTreeMap<String, f64> {
        &self.currents
    }
}

/// Sequences aligned index-for-index with a shared independent variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformResult<T> {
    indep_name: String,
    indep: Vec<f64>,
    voltages: BTreeMap<String, Vec<T>>,
    currents: BTreeMap<String, Vec<T>>,
}

impl<T> WaveformResult<T> {
    /// Name of the independent vector (`time` or `acfrequency`)
    pub fn indep_name(&self) -> &str {
        &self.indep_name
    }

    pub fn indep(&self) -> &[f64] {
        &self.indep
    }

    pub fn len(&self) -> usize {
        self.indep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indep.is_empty()
    }

    pub fn voltage(&self, node: &str) -> Option<&[T]> {
        self.voltages.get(node).map(Vec::as_slice)
    }

    pub fn current(&self, branch: &str) -> Option<&[T]> {
        self.currents.get(branch).map(Vec::as_slice)
    }

    pub fn voltages(&self) -> &BTreeMap<String, Vec<T>> {
        &self.voltages
    }

    pub fn currents(&self) -> &BTreeMap<String, Vec<T>> {
        &self.currents
    }
}

/// `(output, input)` port indices, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortPair {
    pub output: usize,
    pub input: usize,
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S[{},{}]", self.output, self.input)
    }
}

impl Serialize for PortPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepInfo {
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SParameterResult {
    ports: usize,
    z0: f64,
    sweep: SweepInfo,
    frequency: Vec<f64>,
    matrix: BTreeMap<PortPair, Vec<Complex64>>,
}

impl SParameterResult {
    /// S-parameter from port `input` to port `output` over frequency
    pub fn s(&self, output: usize, input: usize) -> Option<&[Complex64]> {
        self.matrix
            .get(&PortPair { output, input })
            .map(Vec::as_slice)
    }

    pub fn ports(&self) -> usize {
        self.ports
    }

    /// Reference impedance in ohms
    pub fn z0(&self) -> f64 {
        self.z0
    }

    pub fn sweep(&self) -> SweepInfo {
        self.sweep
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn matrix(&self) -> &BTreeMap<PortPair, Vec<Complex64>> {
        &self.matrix
    }
}

/// Unordered pair of noise source names, stored sorted
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePair {
    first: String,
    second: String,
}

impl SourcePair {
    pub fn new(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        SourcePair {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn names(&self) -> (&str, &str) {
        (&self.first, &self.second)
    }
}

impl fmt::Display for SourcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.first, self.second)
    }
}

impl Serialize for SourcePair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Correlation coefficient per pair of noise sources
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoiseResult {
    correlations: BTreeMap<SourcePair, f64>,
}

impl NoiseResult {
    /// Correlation between two sources, in either order. Values are passed
    /// through as the solver reported them, including any outside [-1, 1].
    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.correlations.get(&SourcePair::new(a, b)).copied()
    }

    pub fn correlations(&self) -> &BTreeMap<SourcePair, f64> {
        &self.correlations
    }

    pub fn len(&self) -> usize {
        self.correlations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correlations.is_empty()
    }
}

/// Decode solver output for the given analysis.
///
/// The dataset text does not say which analysis produced it, so the caller
/// picks the decoding. No partially filled result is ever returned.
pub fn parse_results(text: &str, kind: &AnalysisKind) -> Result<SimulationResult> {
    let dataset = Dataset::parse(text)?;
    debug!(
        "Decoding {} result from {} vectors",
        kind.name(),
        dataset.vectors().len()
    );

    match *kind {
        AnalysisKind::Dc => parse_dc(&dataset).map(SimulationResult::Dc),
        AnalysisKind::Transient => {
            parse_waveform(&dataset, kind, "time", (".Vt", ".It"), real_values)
                .map(SimulationResult::Transient)
        }
        AnalysisKind::Ac => {
            parse_waveform(&dataset, kind, "acfrequency", (".v", ".i"), complex_values)
                .map(SimulationResult::Ac)
        }
        AnalysisKind::SParameter { ports, z0 } => {
            parse_s_parameters(&dataset, ports, z0).map(SimulationResult::SParameter)
        }
        AnalysisKind::Noise => parse_noise(&dataset).map(SimulationResult::Noise),
    }
}

fn real_values(vector: &Vector) -> Result<Vec<f64>> {
    vector
        .real_values()
        .map_err(|_| BridgeError::format(RESULTS_LABEL, format!("vector '{}' must be real", vector.name)))
}

fn complex_values(vector: &Vector) -> Result<Vec<Complex64>> {
    Ok(vector.values.clone())
}

fn expect_len(vector: &Vector, expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(BridgeError::LengthMismatch {
            name: vector.name.clone(),
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

fn parse_dc(dataset: &Dataset) -> Result<DcResult> {
    let mut result = DcResult::default();

    for vector in dataset.dependent() {
        let target = if let Some(node) = vector.name.strip_suffix(".V") {
            (&mut result.voltages, node)
        } else if let Some(branch) = vector.name.strip_suffix(".I") {
            (&mut result.currents, branch)
        } else {
            debug!("Skipping DC vector '{}'", vector.name);
            continue;
        };

        expect_len(vector, 1)?;
        let value = real_values(vector)?[0];
        target.0.insert(target.1.to_string(), value);
    }

    if result.voltages.is_empty() && result.currents.is_empty() {
        return Err(BridgeError::missing_field(AnalysisKind::Dc.name(), "NODE.V"));
    }

    Ok(result)
}

fn parse_waveform<T>(
    dataset: &Dataset,
    kind: &AnalysisKind,
    indep_name: &str,
    (voltage_suffix, current_suffix): (&str, &str),
    values: fn(&Vector) -> Result<Vec<T>>,
) -> Result<WaveformResult<T>> {
    let indep = dataset
        .get(indep_name)
        .filter(|vector| vector.independent)
        .ok_or_else(|| BridgeError::missing_field(kind.name(), indep_name))?;
    let indep_values = real_values(indep)?;

    let mut voltages = BTreeMap::new();
    let mut currents = BTreeMap::new();

    for vector in dataset.dependent() {
        let (target, name) = if let Some(node) = vector.name.strip_suffix(voltage_suffix) {
            (&mut voltages, node)
        } else if let Some(branch) = vector.name.strip_suffix(current_suffix) {
            (&mut currents, branch)
        } else {
            debug!("Skipping {} vector '{}'", kind.name(), vector.name);
            continue;
        };

        expect_len(vector, indep_values.len())?;
        target.insert(name.to_string(), values(vector)?);
    }

    Ok(WaveformResult {
        indep_name: indep_name.to_string(),
        indep: indep_values,
        voltages,
        currents,
    })
}

fn parse_s_parameters(dataset: &Dataset, ports: usize, z0: f64) -> Result<SParameterResult> {
    const ANALYSIS: &str = "S-parameter";

    if ports == 0 {
        return Err(BridgeError::format(RESULTS_LABEL, "S-parameter analysis declares no ports"));
    }

    let frequency = dataset
        .get("frequency")
        .filter(|vector| vector.independent)
        .ok_or_else(|| BridgeError::missing_field(ANALYSIS, "frequency"))?;
    let frequency = real_values(frequency)?;
    let (start, stop) = match (frequency.first(), frequency.last()) {
        (Some(&start), Some(&stop)) => (start, stop),
        _ => return Err(BridgeError::missing_field(ANALYSIS, "frequency")),
    };

    let mut matrix = BTreeMap::new();
    for vector in dataset.dependent() {
        let captures = match S_PARAMETER_PATTERN.captures(&vector.name) {
            Some(captures) => captures,
            None => {
                debug!("Skipping S-parameter vector '{}'", vector.name);
                continue;
            }
        };

        let index = |group: usize| captures[group].parse::<usize>().ok().filter(|i| (1..=ports).contains(i));
        let pair = match (index(1), index(2)) {
            (Some(output), Some(input)) => PortPair { output, input },
            _ => {
                return Err(BridgeError::format(
                    RESULTS_LABEL,
                    format!("'{}' is outside the {}-port matrix", vector.name, ports),
                ))
            }
        };

        expect_len(vector, frequency.len())?;
        if matrix.insert(pair, vector.values.clone()).is_some() {
            return Err(BridgeError::format(
                RESULTS_LABEL,
                format!("duplicate entry for {}", pair),
            ));
        }
    }

    let missing: Vec<(usize, usize)> = (1..=ports)
        .flat_map(|output| (1..=ports).map(move |input| (output, input)))
        .filter(|&(output, input)| !matrix.contains_key(&PortPair { output, input }))
        .collect();
    if !missing.is_empty() {
        return Err(BridgeError::IncompleteMatrix { ports, missing });
    }

    Ok(SParameterResult {
        ports,
        z0,
        sweep: SweepInfo {
            start,
            stop,
            points: frequency.len(),
        },
        frequency,
        matrix,
    })
}

fn parse_noise(dataset: &Dataset) -> Result<NoiseResult> {
    let mut correlations = BTreeMap::new();
    let mut seen = BTreeSet::new();

    for vector in dataset.dependent() {
        let captures = match CORRELATION_PATTERN.captures(&vector.name) {
            Some(captures) => captures,
            None => {
                debug!("Skipping noise vector '{}'", vector.name);
                continue;
            }
        };

        let pair = SourcePair::new(captures[1].trim(), captures[2].trim());
        if !seen.insert(pair.clone()) {
            return Err(BridgeError::format(
                RESULTS_LABEL,
                format!("correlation C[{}] given more than once", pair),
            ));
        }

        expect_len(vector, 1)?;
        correlations.insert(pair, real_values(vector)?[0]);
    }

    if correlations.is_empty() {
        return Err(BridgeError::missing_field("noise", "C[A,B]"));
    }

    Ok(NoiseResult { correlations })
}
