use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::netlist::format_number;

/// Inclusive branch-count range of the equation-defined device.
pub const MAX_BRANCHES: usize = 20;

/// Value of a component parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(value) => Some(*value),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Number(_) => None,
            ParamValue::Text(text) => Some(text),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(value) => f.write_str(&format_number(*value)),
            ParamValue::Text(text) => f.write_str(text),
        }
    }
}

/// Documented default of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Number(f64),
    Text(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> ParamValue {
        match self {
            DefaultValue::Number(value) => ParamValue::Number(value),
            DefaultValue::Text(text) => ParamValue::Text(text.to_string()),
        }
    }

    /// Exact equality against a current value
    pub fn matches(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (DefaultValue::Number(default), ParamValue::Number(value)) => default == value,
            (DefaultValue::Text(default), ParamValue::Text(value)) => default == value,
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, DefaultValue::Number(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDefault {
    pub name: &'static str,
    pub value: DefaultValue,
}

const fn num(name: &'static str, value: f64) -> ParamDefault {
    ParamDefault {
        name,
        value: DefaultValue::Number(value),
    }
}

const fn text(name: &'static str, value: &'static str) -> ParamDefault {
    ParamDefault {
        name,
        value: DefaultValue::Text(value),
    }
}

const ROOM: f64 = 26.85;

const NO_PARAMS: &[ParamDefault] = &[];
const RESISTOR: &[ParamDefault] = &[
    num("R", 50.0),
    num("Temp", ROOM),
    num("Tc1", 0.0),
    num("Tc2", 0.0),
    num("Tnom", ROOM),
];
const CAPACITOR: &[ParamDefault] = &[num("C", 1e-12), text("V", "")];
const INDUCTOR: &[ParamDefault] = &[num("L", 1e-9), text("I", "")];
const DC_VOLTAGE: &[ParamDefault] = &[num("U", 1.0)];
const DC_CURRENT: &[ParamDefault] = &[num("I", 1e-3)];
const AC_VOLTAGE: &[ParamDefault] = &[
    num("U", 1.0),
    num("f", 1e9),
    num("Phase", 0.0),
    num("Theta", 0.0),
];
const AC_CURRENT: &[ParamDefault] = &[
    num("I", 1e-3),
    num("f", 1e9),
    num("Phase", 0.0),
    num("Theta", 0.0),
];
const PULSE_VOLTAGE: &[ParamDefault] = &[
    num("U1", 0.0),
    num("U2", 1.0),
    num("T1", 0.0),
    num("T2", 1e-9),
    num("Tr", 1e-9),
    num("Tf", 1e-9),
];
const PULSE_CURRENT: &[ParamDefault] = &[
    num("I1", 0.0),
    num("I2", 1e-3),
    num("T1", 0.0),
    num("T2", 1e-9),
    num("Tr", 1e-9),
    num("Tf", 1e-9),
];
const RECT_VOLTAGE: &[ParamDefault] = &[
    num("U", 1.0),
    num("TH", 1e-9),
    num("TL", 1e-9),
    num("Tr", 1e-9),
    num("Tf", 1e-9),
    num("Td", 0.0),
];
const RECT_CURRENT: &[ParamDefault] = &[
    num("I", 1e-3),
    num("TH", 1e-9),
    num("TL", 1e-9),
    num("Tr", 1e-9),
    num("Tf", 1e-9),
    num("Td", 0.0),
];
const NOISE_VOLTAGE: &[ParamDefault] = &[num("u", 1e-6), num("e", 0.0), num("c", 1.0), num("a", 0.0)];
const NOISE_CURRENT: &[ParamDefault] = &[num("i", 1e-6), num("e", 0.0), num("c", 1.0), num("a", 0.0)];
const FILE_SOURCE: &[ParamDefault] = &[
    text("File", ""),
    text("Interpolator", "linear"),
    text("Repeat", "no"),
    num("G", 1.0),
    num("T", 0.0),
];
const POWER_PORT: &[ParamDefault] = &[
    num("Num", 1.0),
    num("Z", 50.0),
    num("P", 0.0),
    num("f", 1e9),
    num("Temp", ROOM),
];
const CONTROLLED: &[ParamDefault] = &[num("G", 1.0), num("T", 0.0)];
const DIODE: &[ParamDefault] = &[
    num("Is", 1e-15),
    num("N", 1.0),
    num("Cj0", 1e-14),
    num("M", 0.5),
    num("Vj", 0.7),
    num("Rs", 0.0),
    num("Tt", 0.0),
    num("Area", 1.0),
    num("Temp", ROOM),
];
const BJT: &[ParamDefault] = &[
    text("Type", "npn"),
    num("Is", 1e-16),
    num("Nf", 1.0),
    num("Nr", 1.0),
    num("Bf", 100.0),
    num("Br", 1.0),
    num("Vaf", 0.0),
    num("Var", 0.0),
    num("Rb", 0.0),
    num("Rc", 0.0),
    num("Re", 0.0),
    num("Cje", 0.0),
    num("Cjc", 0.0),
    num("Tf", 0.0),
    num("Tr", 0.0),
    num("Area", 1.0),
    num("Temp", ROOM),
];
const JFET: &[ParamDefault] = &[
    text("Type", "nfet"),
    num("Vt0", -2.0),
    num("Beta", 1e-4),
    num("Lambda", 0.0),
    num("Rd", 0.0),
    num("Rs", 0.0),
    num("Is", 1e-14),
    num("N", 1.0),
    num("Cgs", 0.0),
    num("Cgd", 0.0),
    num("Temp", ROOM),
];
const MOSFET: &[ParamDefault] = &[
    text("Type", "nfet"),
    num("Vt0", 1.0),
    num("Kp", 2e-5),
    num("Gamma", 0.0),
    num("Phi", 0.6),
    num("Lambda", 0.0),
    num("Rd", 0.0),
    num("Rs", 0.0),
    num("L", 1e-6),
    num("W", 1e-6),
    num("Tox", 1e-7),
    num("Temp", ROOM),
];
const THYRISTOR: &[ParamDefault] = &[
    num("Vbo", 400.0),
    num("Igt", 50e-6),
    num("Cj0", 10e-12),
    num("Is", 1e-10),
    num("N", 2.0),
    num("Ri", 10.0),
    num("Rg", 5.0),
    num("Temp", ROOM),
];
const DIAC: &[ParamDefault] = &[
    num("Vbo", 30.0),
    num("Ibo", 50e-6),
    num("Cj0", 10e-12),
    num("Is", 1e-10),
    num("N", 2.0),
    num("Ri", 10.0),
    num("Temp", ROOM),
];

/// Types of circuit components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Resistor,
    Capacitor,
    Inductor,
    Short,
    Open,
    Ground,
    DcVoltage,
    DcCurrent,
    AcVoltage,
    AcCurrent,
    PulseVoltage,
    PulseCurrent,
    ExpVoltage,
    ExpCurrent,
    RectVoltage,
    RectCurrent,
    NoiseVoltage,
    NoiseCurrent,
    FileVoltage,
    FileCurrent,
    PowerPort,
    Vccs,
    Cccs,
    Vcvs,
    Ccvs,
    Diode,
    Bjt,
    Jfet,
    Mosfet,
    Thyristor,
    Triac,
    Diac,
    EquationDevice,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 33] = [
        ComponentKind::Resistor,
        ComponentKind::Capacitor,
        ComponentKind::Inductor,
        ComponentKind::Short,
        ComponentKind::Open,
        ComponentKind::Ground,
        ComponentKind::DcVoltage,
        ComponentKind::DcCurrent,
        ComponentKind::AcVoltage,
        ComponentKind::AcCurrent,
        ComponentKind::PulseVoltage,
        ComponentKind::PulseCurrent,
        ComponentKind::ExpVoltage,
        ComponentKind::ExpCurrent,
        ComponentKind::RectVoltage,
        ComponentKind::RectCurrent,
        ComponentKind::NoiseVoltage,
        ComponentKind::NoiseCurrent,
        ComponentKind::FileVoltage,
        ComponentKind::FileCurrent,
        ComponentKind::PowerPort,
        ComponentKind::Vccs,
        ComponentKind::Cccs,
        ComponentKind::Vcvs,
        ComponentKind::Ccvs,
        ComponentKind::Diode,
        ComponentKind::Bjt,
        ComponentKind::Jfet,
        ComponentKind::Mosfet,
        ComponentKind::Thyristor,
        ComponentKind::Triac,
        ComponentKind::Diac,
        ComponentKind::EquationDevice,
    ];

    /// Wire-format tag written before the ':' of a netlist line
    pub fn tag(&self) -> &'static str {
        match self {
            ComponentKind::Resistor => "R",
            ComponentKind::Capacitor => "C",
            ComponentKind::Inductor => "L",
            ComponentKind::Short => "Short",
            ComponentKind::Open => "Open",
            ComponentKind::Ground => "GND",
            ComponentKind::DcVoltage => "Vdc",
            ComponentKind::DcCurrent => "Idc",
            ComponentKind::AcVoltage => "Vac",
            ComponentKind::AcCurrent => "Iac",
            ComponentKind::PulseVoltage => "Vpulse",
            ComponentKind::PulseCurrent => "Ipulse",
            ComponentKind::ExpVoltage => "Vexp",
            ComponentKind::ExpCurrent => "Iexp",
            ComponentKind::RectVoltage => "Vrect",
            ComponentKind::RectCurrent => "Irect",
            ComponentKind::NoiseVoltage => "Vnoise",
            ComponentKind::NoiseCurrent => "Inoise",
            ComponentKind::FileVoltage => "Vfile",
            ComponentKind::FileCurrent => "Ifile",
            ComponentKind::PowerPort => "Pac",
            ComponentKind::Vccs => "VCCS",
            ComponentKind::Cccs => "CCCS",
            ComponentKind::Vcvs => "VCVS",
            ComponentKind::Ccvs => "CCVS",
            ComponentKind::Diode => "Diode",
            ComponentKind::Bjt => "BJT",
            ComponentKind::Jfet => "JFET",
            ComponentKind::Mosfet => "MOSFET",
            ComponentKind::Thyristor => "Thyristor",
            ComponentKind::Triac => "Triac",
            ComponentKind::Diac => "Diac",
            ComponentKind::EquationDevice => "EDD",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    /// Terminal names in netlist order. Empty for the equation-defined
    /// device, whose terminals depend on its branch count.
    pub fn terminals(&self) -> &'static [&'static str] {
        match self {
            ComponentKind::Ground => &["1"],
            ComponentKind::Resistor
            | ComponentKind::Capacitor
            | ComponentKind::Inductor
            | ComponentKind::Short
            | ComponentKind::Open => &["1", "2"],
            ComponentKind::DcVoltage
            | ComponentKind::DcCurrent
            | ComponentKind::AcVoltage
            | ComponentKind::AcCurrent
            | ComponentKind::PulseVoltage
            | ComponentKind::PulseCurrent
            | ComponentKind::ExpVoltage
            | ComponentKind::ExpCurrent
            | ComponentKind::RectVoltage
            | ComponentKind::RectCurrent
            | ComponentKind::NoiseVoltage
            | ComponentKind::NoiseCurrent
            | ComponentKind::FileVoltage
            | ComponentKind::FileCurrent
            | ComponentKind::PowerPort => &["+", "-"],
            ComponentKind::Vccs | ComponentKind::Cccs | ComponentKind::Vcvs | ComponentKind::Ccvs => {
                &["IN+", "OUT+", "OUT-", "IN-"]
            }
            ComponentKind::Diode => &["C", "A"],
            ComponentKind::Bjt => &["B", "C", "E", "S"],
            ComponentKind::Jfet => &["G", "D", "S"],
            ComponentKind::Mosfet => &["G", "D", "S", "B"],
            ComponentKind::Thyristor => &["A", "K", "G"],
            ComponentKind::Triac => &["A1", "A2", "G"],
            ComponentKind::Diac => &["A1", "A2"],
            ComponentKind::EquationDevice => &[],
        }
    }

    /// Parameter default table, in emission order
    pub fn defaults(&self) -> &'static [ParamDefault] {
        match self {
            ComponentKind::Resistor => RESISTOR,
            ComponentKind::Capacitor => CAPACITOR,
            ComponentKind::Inductor => INDUCTOR,
            ComponentKind::Short | ComponentKind::Open | ComponentKind::Ground => NO_PARAMS,
            ComponentKind::DcVoltage => DC_VOLTAGE,
            ComponentKind::DcCurrent => DC_CURRENT,
            ComponentKind::AcVoltage => AC_VOLTAGE,
            ComponentKind::AcCurrent => AC_CURRENT,
            ComponentKind::PulseVoltage | ComponentKind::ExpVoltage => PULSE_VOLTAGE,
            ComponentKind::PulseCurrent | ComponentKind::ExpCurrent => PULSE_CURRENT,
            ComponentKind::RectVoltage => RECT_VOLTAGE,
            ComponentKind::RectCurrent => RECT_CURRENT,
            ComponentKind::NoiseVoltage => NOISE_VOLTAGE,
            ComponentKind::NoiseCurrent => NOISE_CURRENT,
            ComponentKind::FileVoltage | ComponentKind::FileCurrent => FILE_SOURCE,
            ComponentKind::PowerPort => POWER_PORT,
            ComponentKind::Vccs | ComponentKind::Cccs | ComponentKind::Vcvs | ComponentKind::Ccvs => {
                CONTROLLED
            }
            ComponentKind::Diode => DIODE,
            ComponentKind::Bjt => BJT,
            ComponentKind::Jfet => JFET,
            ComponentKind::Mosfet => MOSFET,
            ComponentKind::Thyristor | ComponentKind::Triac => THYRISTOR,
            ComponentKind::Diac => DIAC,
            ComponentKind::EquationDevice => NO_PARAMS,
        }
    }

    pub fn default_of(&self, param: &str) -> Option<&'static ParamDefault> {
        self.defaults().iter().find(|default| default.name == param)
    }

    /// Returns true if the terminal count depends on the instance
    pub fn is_variable_arity(&self) -> bool {
        matches!(self, ComponentKind::EquationDevice)
    }
}

/// Equations requested for an equation-defined device, before validation.
#[derive(Debug, Clone, Default)]
pub struct Equations {
    branches: usize,
    current: BTreeMap<usize, String>,
    charge: BTreeMap<usize, String>,
}

impl Equations {
    pub fn new(branches: usize) -> Self {
        Equations {
            branches,
            ..Default::default()
        }
    }

    /// Current equation of a 1-based branch
    pub fn current(mut self, branch: usize, expr: impl Into<String>) -> Self {
        self.current.insert(branch, expr.into());
        self
    }

    /// Charge equation of a 1-based branch
    pub fn charge(mut self, branch: usize, expr: impl Into<String>) -> Self {
        self.charge.insert(branch, expr.into());
        self
    }
}

/// Current/charge equation pair of one branch. The text is never evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEquations {
    pub current: String,
    pub charge: String,
}

/// Circuit component
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    name: String,
    kind: ComponentKind,
    params: Vec<(&'static str, ParamValue)>,
    /// Branches 1..=N, every branch present. Only set for the equation-defined device.
    equations: BTreeMap<usize, BranchEquations>,
}

impl Component {
    fn fixed(kind: ComponentKind, name: impl Into<String>) -> Self {
        Component {
            name: name.into(),
            kind,
            params: kind
                .defaults()
                .iter()
                .map(|default| (default.name, default.value.to_value()))
                .collect(),
            equations: BTreeMap::new(),
        }
    }

    /// Create a component of any kind with all parameters at their defaults.
    ///
    /// The equation-defined device cannot be built without equations, so
    /// asking for one here fails with a missing-equation error; use
    /// [`Component::equation_device`] instead.
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Result<Self> {
        if kind == ComponentKind::EquationDevice {
            return Err(BridgeError::MissingEquation {
                component: name.into(),
                branch: 1,
                quantity: "current",
            });
        }
        Ok(Self::fixed(kind, name))
    }

    /// Create an equation-defined device. Branches without equations carry
    /// the zero expression.
    pub fn equation_device(name: impl Into<String>, equations: Equations) -> Result<Self> {
        let name = name.into();
        let branches = equations.branches;
        if !(1..=MAX_BRANCHES).contains(&branches) {
            return Err(BridgeError::BranchCountOutOfRange {
                component: name,
                branches,
            });
        }

        let highest = equations
            .current
            .keys()
            .chain(equations.charge.keys())
            .copied()
            .max()
            .unwrap_or(0);
        if highest > branches || equations.current.contains_key(&0) || equations.charge.contains_key(&0) {
            return Err(BridgeError::BranchCountOutOfRange {
                component: name,
                branches: highest.max(branches),
            });
        }

        if !equations.current.contains_key(&1) {
            return Err(BridgeError::MissingEquation {
                component: name,
                branch: 1,
                quantity: "current",
            });
        }
        if !equations.charge.contains_key(&1) {
            return Err(BridgeError::MissingEquation {
                component: name,
                branch: 1,
                quantity: "charge",
            });
        }

        for (prefix, table) in [('I', &equations.current), ('Q', &equations.charge)] {
            for (branch, expression) in table {
                check_text(&name, &format!("{}{}", prefix, branch), expression)?;
            }
        }

        let Equations {
            mut current,
            mut charge,
            ..
        } = equations;
        let table = (1..=branches)
            .map(|branch| {
                let pair = BranchEquations {
                    current: current.remove(&branch).unwrap_or_else(|| "0".to_string()),
                    charge: charge.remove(&branch).unwrap_or_else(|| "0".to_string()),
                };
                (branch, pair)
            })
            .collect();

        Ok(Component {
            name,
            kind: ComponentKind::EquationDevice,
            params: Vec::new(),
            equations: table,
        })
    }

    pub fn resistor(name: impl Into<String>, resistance: f64) -> Self {
        let mut component = Self::fixed(ComponentKind::Resistor, name);
        component.put("R", resistance.into());
        component
    }

    pub fn capacitor(name: impl Into<String>, capacitance: f64) -> Self {
        let mut component = Self::fixed(ComponentKind::Capacitor, name);
        component.put("C", capacitance.into());
        component
    }

    pub fn inductor(name: impl Into<String>, inductance: f64) -> Self {
        let mut component = Self::fixed(ComponentKind::Inductor, name);
        component.put("L", inductance.into());
        component
    }

    pub fn dc_voltage(name: impl Into<String>, voltage: f64) -> Self {
        let mut component = Self::fixed(ComponentKind::DcVoltage, name);
        component.put("U", voltage.into());
        component
    }

    pub fn dc_current(name: impl Into<String>, current: f64) -> Self {
        let mut component = Self::fixed(ComponentKind::DcCurrent, name);
        component.put("I", current.into());
        component
    }

    pub fn ac_voltage(name: impl Into<String>, amplitude: f64, frequency: f64) -> Self {
        let mut component = Self::fixed(ComponentKind::AcVoltage, name);
        component.put("U", amplitude.into());
        component.put("f", frequency.into());
        component
    }

    /// Power source acting as port `number` of an S-parameter analysis
    pub fn power_port(name: impl Into<String>, number: usize, impedance: f64) -> Self {
        let mut component = Self::fixed(ComponentKind::PowerPort, name);
        component.put("Num", (number as f64).into());
        component.put("Z", impedance.into());
        component
    }

    /// Voltage source driven by a time-series file
    pub fn file_voltage(name: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        Self::fixed(ComponentKind::FileVoltage, name).with("File", ParamValue::Text(path.into()))
    }

    pub fn diode(name: impl Into<String>) -> Self {
        Self::fixed(ComponentKind::Diode, name)
    }

    pub fn ground(name: impl Into<String>) -> Self {
        Self::fixed(ComponentKind::Ground, name)
    }

    pub fn short(name: impl Into<String>) -> Self {
        Self::fixed(ComponentKind::Short, name)
    }

    pub fn open(name: impl Into<String>) -> Self {
        Self::fixed(ComponentKind::Open, name)
    }

    fn put(&mut self, param: &str, value: ParamValue) {
        if let Some(slot) = self.params.iter_mut().find(|(name, _)| *name == param) {
            slot.1 = value;
        } else {
            debug_assert!(false, "{} has no parameter {}", self.kind.tag(), param);
        }
    }

    /// Set a parameter. The name must exist in the kind's default table and
    /// the value must have the same shape (number or text) as its default.
    pub fn set(&mut self, param: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let default = self.kind.default_of(param).ok_or_else(|| BridgeError::UnknownParameter {
            component: self.name.clone(),
            param: param.to_string(),
        })?;

        let same_shape = default.value.is_number() == matches!(value, ParamValue::Number(_));
        if !same_shape {
            let expected = if default.value.is_number() { "a number" } else { "text" };
            return Err(BridgeError::InvalidParameter {
                component: self.name.clone(),
                param: param.to_string(),
                message: format!("expected {}, got '{}'", expected, value),
            });
        }

        if let ParamValue::Text(text) = &value {
            check_text(&self.name, param, text)?;
        }

        self.put(param, value);
        Ok(())
    }

    /// Builder form of [`Component::set`]
    pub fn with(mut self, param: &str, value: impl Into<ParamValue>) -> Result<Self> {
        self.set(param, value)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn param(&self, param: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(name, _)| *name == param)
            .map(|(_, value)| value)
    }

    pub fn number(&self, param: &str) -> Option<f64> {
        self.param(param).and_then(ParamValue::as_number)
    }

    /// All parameters, in default-table order
    pub fn params(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.params.iter().map(|(name, value)| (*name, value))
    }

    /// Parameters whose value differs from the kind's documented default
    pub fn non_default_params(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.kind
            .defaults()
            .iter()
            .zip(self.params.iter())
            .filter(|(default, (_, value))| !default.value.matches(value))
            .map(|(_, (name, value))| (*name, value))
    }

    /// Branch equations of an equation-defined device, keyed 1..=N
    pub fn equations(&self) -> &BTreeMap<usize, BranchEquations> {
        &self.equations
    }

    pub fn branch_count(&self) -> usize {
        self.equations.len()
    }

    /// Get the number of terminals for this component
    pub fn terminal_count(&self) -> usize {
        if self.kind.is_variable_arity() {
            2 * self.branch_count()
        } else {
            self.kind.terminals().len()
        }
    }

    /// Terminal names in netlist order. Branch `i` of an equation-defined
    /// device occupies terminals `P<i>` and `N<i>`.
    pub fn terminal_names(&self) -> Vec<String> {
        if self.kind.is_variable_arity() {
            (1..=self.branch_count())
                .flat_map(|branch| [format!("P{}", branch), format!("N{}", branch)])
                .collect()
        } else {
            self.kind.terminals().iter().map(|name| name.to_string()).collect()
        }
    }

    /// Position of a terminal in netlist order
    pub fn terminal_index(&self, terminal: &str) -> Option<usize> {
        if !self.kind.is_variable_arity() {
            return self.kind.terminals().iter().position(|name| *name == terminal);
        }

        let (offset, number) = if let Some(number) = terminal.strip_prefix('P') {
            (0, number)
        } else if let Some(number) = terminal.strip_prefix('N') {
            (1, number)
        } else {
            return None;
        };
        let branch: usize = number.parse().ok()?;
        if (1..=self.branch_count()).contains(&branch) {
            Some(2 * (branch - 1) + offset)
        } else {
            None
        }
    }

    /// Returns true if the component contributes a netlist line
    pub fn emits_line(&self) -> bool {
        self.kind != ComponentKind::Ground
    }
}

/// Netlist values are written between double quotes on a single line
fn check_text(component: &str, param: &str, text: &str) -> Result<()> {
    if let Some(c) = text.chars().find(|&c| matches!(c, '"' | '\n' | '\r')) {
        return Err(BridgeError::InvalidParameter {
            component: component.to_string(),
            param: param.to_string(),
            message: format!("{:?} cannot appear in a netlist value", c),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_component_creation() {
        let resistor = Component::resistor("R1", 1000.0);
        assert_eq!(resistor.name(), "R1");
        assert_eq!(resistor.kind().tag(), "R");
        assert_eq!(resistor.number("R"), Some(1000.0));
        assert_eq!(resistor.number("Temp"), Some(26.85));
        assert_eq!(resistor.terminal_count(), 2);
    }

    #[test]
    fn test_tags_are_unique_and_reversible() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ComponentKind::from_tag("Vsin"), None);
    }

    #[test]
    fn test_non_default_params() {
        let resistor = Component::resistor("R1", 50.0);
        assert_eq!(resistor.non_default_params().count(), 0);

        let mosfet = Component::new(ComponentKind::Mosfet, "M1")
            .unwrap()
            .with("Type", "pfet")
            .unwrap()
            .with("W", 10e-6)
            .unwrap();
        let changed: Vec<_> = mosfet.non_default_params().map(|(name, _)| name).collect();
        assert_eq!(changed, vec!["Type", "W"]);
    }

    #[test]
    fn test_set_rejects_unknown_and_mistyped() {
        let mut diode = Component::diode("D1");
        let err = diode.set("Bogus", 1.0).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownParameter { .. }));
        assert_eq!(err.kind(), ErrorKind::Construction);

        let err = diode.set("Is", "large").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParameter { .. }));

        let mut bjt = Component::new(ComponentKind::Bjt, "Q1").unwrap();
        assert!(bjt.set("Type", 1.0).is_err());
        assert!(bjt.set("Type", "pnp").is_ok());
    }

    #[test]
    fn test_text_values_cannot_break_netlist_quoting() {
        let err = Component::file_voltage("V1", "my \"wave\".csv").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParameter { ref param, .. } if param == "File"));
        assert!(Component::file_voltage("V1", "wave\n.csv").is_err());

        let mut bjt = Component::new(ComponentKind::Bjt, "Q1").unwrap();
        assert!(bjt.set("Type", "p\"np").is_err());
        assert_eq!(bjt.param("Type"), Some(&ParamValue::Text("npn".to_string())));

        let eqs = Equations::new(1).current(1, "V1/\"R\"").charge(1, "0");
        let err = Component::equation_device("D1", eqs).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParameter { ref param, .. } if param == "I1"));

        let eqs = Equations::new(2).current(1, "V1").charge(1, "0").charge(2, "1e-12*V2\r");
        let err = Component::equation_device("D1", eqs).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParameter { ref param, .. } if param == "Q2"));

        assert!(Component::file_voltage("V1", "data/my wave.csv").is_ok());
    }

    #[test]
    fn test_terminal_arity() {
        assert_eq!(Component::new(ComponentKind::Bjt, "Q1").unwrap().terminal_count(), 4);
        assert_eq!(Component::new(ComponentKind::Jfet, "J1").unwrap().terminal_count(), 3);
        assert_eq!(Component::new(ComponentKind::Vcvs, "E1").unwrap().terminal_count(), 4);
        assert_eq!(Component::ground("G1").terminal_count(), 1);
        assert_eq!(Component::short("S1").terminal_count(), 2);
        assert_eq!(Component::open("O1").params().count(), 0);
    }

    #[test]
    fn test_equation_device_branch_range() {
        for branches in [0, 21] {
            let eqs = Equations::new(branches).current(1, "V1").charge(1, "0");
            let err = Component::equation_device("D1", eqs).unwrap_err();
            assert!(matches!(err, BridgeError::BranchCountOutOfRange { .. }));
        }

        let eqs = Equations::new(20).current(1, "V1").charge(1, "0");
        assert_eq!(Component::equation_device("D1", eqs).unwrap().terminal_count(), 40);

        let eqs = Equations::new(2).current(1, "V1").charge(1, "0").current(3, "V3");
        assert!(Component::equation_device("D1", eqs).is_err());
    }

    #[test]
    fn test_equation_device_missing_equation() {
        let err = Component::equation_device("D1", Equations::new(2).charge(1, "0")).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::MissingEquation { branch: 1, quantity: "current", .. }
        ));

        let err = Component::equation_device("D1", Equations::new(2).current(1, "V1")).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::MissingEquation { branch: 1, quantity: "charge", .. }
        ));

        // only branch 2 supplied
        let err = Component::equation_device("D1", Equations::new(2).current(2, "V2").charge(2, "0"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::MissingEquation { branch: 1, .. }));

        assert!(Component::new(ComponentKind::EquationDevice, "D1").is_err());
    }

    #[test]
    fn test_equation_device_fills_zero_branches() {
        let eqs = Equations::new(3)
            .current(1, "1e-12*(exp(V1/0.025)-1)")
            .charge(1, "1e-12*V1")
            .charge(3, "V3*V3");
        let edd = Component::equation_device("D1", eqs).unwrap();

        assert_eq!(edd.branch_count(), 3);
        assert_eq!(edd.terminal_count(), 6);
        let branches: Vec<_> = edd.equations().keys().copied().collect();
        assert_eq!(branches, vec![1, 2, 3]);
        assert_eq!(edd.equations()[&2].current, "0");
        assert_eq!(edd.equations()[&2].charge, "0");
        assert_eq!(edd.equations()[&3].current, "0");
        assert_eq!(edd.equations()[&3].charge, "V3*V3");

        assert_eq!(edd.terminal_names(), vec!["P1", "N1", "P2", "N2", "P3", "N3"]);
        assert_eq!(edd.terminal_index("N2"), Some(3));
        assert_eq!(edd.terminal_index("P4"), None);
        assert_eq!(edd.terminal_index("X1"), None);
    }
}
