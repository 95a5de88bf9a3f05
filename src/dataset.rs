use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, space0, space1},
    combinator::{map, opt},
    multi::many1,
    number::complete::double,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use num_complex::Complex64;
use std::collections::HashSet;

use crate::error::{BridgeError, Result};
use crate::netlist::format_number;

/// Prefix of the version header line
pub const DATASET_HEADER_PREFIX: &str = "<Qucs Dataset ";

/// Version written by [`Dataset::to_text`]
pub const DATASET_VERSION: &str = "0.0.19";

/// Returns true if the first non-blank line is a dataset version header
pub fn is_dataset(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map_or(false, |line| line.starts_with(DATASET_HEADER_PREFIX))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    pub name: String,
    pub independent: bool,
    /// Names of the independent vectors a dependent vector is sampled over
    pub dependencies: Vec<String>,
    pub values: Vec<Complex64>,
}

impl Vector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_real(&self) -> bool {
        self.values.iter().all(|value| value.im == 0.0)
    }

    /// Values as reals; fails if any value carries an imaginary part
    pub fn real_values(&self) -> Result<Vec<f64>> {
        self.values
            .iter()
            .map(|value| {
                if value.im == 0.0 {
                    Ok(value.re)
                } else {
                    Err(BridgeError::format(
                        "<dataset>",
                        format!("vector '{}' holds complex value {} where reals are expected", self.name, value),
                    ))
                }
            })
            .collect()
    }
}

/// A parsed dataset document:
///
/// ```text
/// <Qucs Dataset 0.0.19>
/// <indep time 3>
///   0
///   1e-9
///   2e-9
/// </indep>
/// <dep out.Vt time>
///   0
///   1
///   0.5
/// </dep>
/// ```
///
/// A `<dep>` header names either a value count or the independent vectors
/// it is sampled over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub version: String,
    vectors: Vec<Vector>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockKind {
    Independent,
    Dependent,
}

struct OpenBlock {
    kind: BlockKind,
    name: String,
    extra: Vec<String>,
    values: Vec<Complex64>,
    line: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset {
            version: DATASET_VERSION.to_string(),
            vectors: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Dataset> {
        let mut dataset = Dataset::default();
        let mut seen_header = false;
        let mut names = HashSet::new();
        let mut open: Option<OpenBlock> = None;

        for (index, raw) in text.lines().enumerate() {
            let number = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if !seen_header {
                let version = line
                    .strip_prefix(DATASET_HEADER_PREFIX)
                    .and_then(|rest| rest.strip_suffix('>'))
                    .ok_or_else(|| BridgeError::syntax(number, "missing dataset version header"))?;
                dataset.version = version.trim().to_string();
                seen_header = true;
                continue;
            }

            match open.take() {
                None => {
                    let (kind, name, extra) = block_header(line)
                        .map(|(_, header)| header)
                        .map_err(|_| BridgeError::syntax(number, format!("expected block header, found '{}'", line)))?;
                    if !names.insert(name.to_string()) {
                        return Err(BridgeError::syntax(number, format!("duplicate vector '{}'", name)));
                    }
                    open = Some(OpenBlock {
                        kind,
                        name: name.to_string(),
                        extra: extra.into_iter().map(str::to_string).collect(),
                        values: Vec::new(),
                        line: number,
                    });
                }
                Some(mut block) => {
                    let closing = match block.kind {
                        BlockKind::Independent => "</indep>",
                        BlockKind::Dependent => "</dep>",
                    };
                    if line == closing {
                        let vector = dataset.finish_block(block)?;
                        dataset.vectors.push(vector);
                    } else if line.starts_with('<') {
                        return Err(BridgeError::syntax(
                            number,
                            format!("expected '{}' before '{}'", closing, line),
                        ));
                    } else {
                        let value = parse_value(line).ok_or_else(|| {
                            BridgeError::syntax(number, format!("invalid value '{}'", line))
                        })?;
                        block.values.push(value);
                        open = Some(block);
                    }
                }
            }
        }

        if let Some(block) = open {
            return Err(BridgeError::syntax(
                block.line,
                format!("block '{}' is not terminated", block.name),
            ));
        }
        if !seen_header {
            return Err(BridgeError::syntax(1, "empty dataset"));
        }

        Ok(dataset)
    }

    fn finish_block(&self, block: OpenBlock) -> Result<Vector> {
        let OpenBlock {
            kind,
            name,
            extra,
            values,
            line,
        } = block;

        let (expected, dependencies) = match kind {
            BlockKind::Independent => {
                let count = match extra.as_slice() {
                    [count] => count.parse::<usize>().ok(),
                    _ => None,
                }
                .ok_or_else(|| BridgeError::syntax(line, format!("independent vector '{}' needs a count", name)))?;
                (Some(count), Vec::new())
            }
            BlockKind::Dependent => match extra.as_slice() {
                [] => (None, Vec::new()),
                [count] if count.parse::<usize>().is_ok() => (count.parse::<usize>().ok(), Vec::new()),
                dependencies => {
                    let mut expected = 1usize;
                    for dependency in dependencies {
                        let indep = self
                            .vectors
                            .iter()
                            .find(|vector| vector.independent && &vector.name == dependency)
                            .ok_or_else(|| {
                                BridgeError::syntax(
                                    line,
                                    format!("'{}' depends on unknown vector '{}'", name, dependency),
                                )
                            })?;
                        expected *= indep.len();
                    }
                    (Some(expected), dependencies.to_vec())
                }
            },
        };

        if let Some(expected) = expected {
            if values.len() != expected {
                return Err(BridgeError::LengthMismatch {
                    name,
                    expected,
                    actual: values.len(),
                });
            }
        }

        Ok(Vector {
            name,
            independent: kind == BlockKind::Independent,
            dependencies,
            values,
        })
    }

    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    pub fn get(&self, name: &str) -> Option<&Vector> {
        self.vectors.iter().find(|vector| vector.name == name)
    }

    pub fn independent(&self) -> impl Iterator<Item = &Vector> {
        self.vectors.iter().filter(|vector| vector.independent)
    }

    pub fn dependent(&self) -> impl Iterator<Item = &Vector> {
        self.vectors.iter().filter(|vector| !vector.independent)
    }

    pub fn add_independent(&mut self, name: impl Into<String>, values: &[f64]) -> &mut Self {
        self.vectors.push(Vector {
            name: name.into(),
            independent: true,
            dependencies: Vec::new(),
            values: values.iter().map(|&re| Complex64::new(re, 0.0)).collect(),
        });
        self
    }

    /// Add a dependent vector. With no dependencies the header carries the
    /// value count instead.
    pub fn add_dependent(
        &mut self,
        name: impl Into<String>,
        dependencies: &[&str],
        values: Vec<Complex64>,
    ) -> &mut Self {
        self.vectors.push(Vector {
            name: name.into(),
            independent: false,
            dependencies: dependencies.iter().map(|dep| dep.to_string()).collect(),
            values,
        });
        self
    }

    pub fn add_real_dependent(&mut self, name: impl Into<String>, dependencies: &[&str], values: &[f64]) -> &mut Self {
        let values = values.iter().map(|&re| Complex64::new(re, 0.0)).collect();
        self.add_dependent(name, dependencies, values)
    }

    /// Render as dataset text; [`Dataset::parse`] reads it back unchanged.
    pub fn to_text(&self) -> String {
        let mut out = format!("{}{}>\n", DATASET_HEADER_PREFIX, self.version);

        for vector in &self.vectors {
            if vector.independent {
                out.push_str(&format!("<indep {} {}>\n", vector.name, vector.len()));
            } else if vector.dependencies.is_empty() {
                out.push_str(&format!("<dep {} {}>\n", vector.name, vector.len()));
            } else {
                out.push_str(&format!("<dep {} {}>\n", vector.name, vector.dependencies.join(" ")));
            }

            for value in &vector.values {
                out.push_str("  ");
                out.push_str(&format_value(*value));
                out.push('\n');
            }

            out.push_str(if vector.independent { "</indep>\n" } else { "</dep>\n" });
        }

        out
    }
}

/// Real values as plain numbers, complex ones as `re+jim` / `re-jim`
pub fn format_value(value: Complex64) -> String {
    if value.im == 0.0 {
        format_number(value.re)
    } else if value.im.is_sign_negative() {
        format!("{}-j{}", format_number(value.re), format_number(-value.im))
    } else {
        format!("{}+j{}", format_number(value.re), format_number(value.im))
    }
}

fn block_header(input: &str) -> IResult<&str, (BlockKind, &str, Vec<&str>)> {
    let token = || take_while1(|c: char| !c.is_whitespace() && c != '>');
    let (input, (kind, name, extra)) = delimited(
        char('<'),
        tuple((
            alt((
                map(tag("indep"), |_| BlockKind::Independent),
                map(tag("dep"), |_| BlockKind::Dependent),
            )),
            preceded(space1, token()),
            opt(many1(preceded(space1, token()))),
        )),
        preceded(space0, char('>')),
    )(input)?;
    Ok((input, (kind, name, extra.unwrap_or_default())))
}

fn complex_literal(input: &str) -> IResult<&str, Complex64> {
    let (input, re) = double(input)?;
    let (input, im) = opt(pair(alt((char('+'), char('-'))), preceded(char('j'), double)))(input)?;
    let im = match im {
        Some(('-', magnitude)) => -magnitude,
        Some((_, magnitude)) => magnitude,
        None => 0.0,
    };
    Ok((input, Complex64::new(re, im)))
}

/// Parse one value line
pub fn parse_value(text: &str) -> Option<Complex64> {
    match complex_literal(text.trim()) {
        Ok(("", value)) => Some(value),
        _ => None,
    }
}
