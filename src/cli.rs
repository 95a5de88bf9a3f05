use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::analysis::DEFAULT_Z0;
use crate::parser::parse_value_with_unit;
use crate::results::AnalysisKind;
use crate::waveform::FileFormat;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: CliCommand,
    pub verbose_level: u8,
}

#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Decode a solver dataset
    Results {
        input_file: String,
        analysis: AnalysisKind,
        output_file: Option<String>,
        output_format: OutputFormat,
    },
    /// Convert a waveform file between layouts
    Convert {
        input_file: String,
        output_file: String,
        format: FileFormat,
    },
    /// Re-render a netlist in canonical form
    Netlist {
        input_file: String,
        output_file: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn build_cli() -> Command {
    let verbose = Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::Count)
        .global(true)
        .help("Increase verbosity level");

    let output = Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .help("Write to FILE instead of stdout");

    Command::new("cbridge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect solver datasets, waveform files and netlists")
        .subcommand_required(true)
        .arg(verbose)
        .subcommand(
            Command::new("results")
                .about("Decode a result dataset")
                .arg(Arg::new("input").help("Dataset file").required(true).index(1))
                .arg(
                    Arg::new("analysis")
                        .short('a')
                        .long("analysis")
                        .required(true)
                        .value_parser(["dc", "tran", "ac", "sp", "noise"])
                        .help("Analysis that produced the dataset"),
                )
                .arg(
                    Arg::new("ports")
                        .long("ports")
                        .value_name("N")
                        .help("Port count of an S-parameter analysis"),
                )
                .arg(
                    Arg::new("z0")
                        .long("z0")
                        .value_name("OHMS")
                        .help("Reference impedance of an S-parameter analysis"),
                )
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .default_value("text")
                        .value_parser(["text", "json"])
                        .help("Output format"),
                )
                .arg(output.clone()),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a waveform file")
                .arg(Arg::new("input").help("Waveform file").required(true).index(1))
                .arg(Arg::new("output").help("Destination file").required(true).index(2))
                .arg(
                    Arg::new("to")
                        .long("to")
                        .required(true)
                        .value_parser(["csv", "block"])
                        .help("Destination layout"),
                )
                .arg(
                    Arg::new("delimiter")
                        .long("delimiter")
                        .default_value(",")
                        .value_parser([",", ";"])
                        .help("Column delimiter for csv output"),
                ),
        )
        .subcommand(
            Command::new("netlist")
                .about("Parse a netlist and print it in canonical form")
                .arg(Arg::new("input").help("Netlist file").required(true).index(1))
                .arg(output),
        )
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| anyhow!("A subcommand is required"))?;

        let verbose_level = sub.get_count("verbose");
        let input_file = sub
            .get_one::<String>("input")
            .ok_or_else(|| anyhow!("Input file is required"))?
            .clone();

        let command = match name {
            "results" => {
                let output_format = match sub.get_one::<String>("format").map(String::as_str) {
                    Some("json") => OutputFormat::Json,
                    _ => OutputFormat::Text,
                };

                CliCommand::Results {
                    input_file,
                    analysis: parse_analysis(sub)?,
                    output_file: sub.get_one::<String>("output").cloned(),
                    output_format,
                }
            }
            "convert" => {
                let output_file = sub
                    .get_one::<String>("output")
                    .ok_or_else(|| anyhow!("Output file is required"))?
                    .clone();

                let format = match sub.get_one::<String>("to").map(String::as_str) {
                    Some("block") => FileFormat::Block,
                    Some("csv") => {
                        let delimiter = sub
                            .get_one::<String>("delimiter")
                            .and_then(|d| d.bytes().next())
                            .unwrap_or(b',');
                        FileFormat::Delimited { delimiter }
                    }
                    _ => return Err(anyhow!("Destination layout is required")),
                };

                CliCommand::Convert {
                    input_file,
                    output_file,
                    format,
                }
            }
            "netlist" => CliCommand::Netlist {
                input_file,
                output_file: sub.get_one::<String>("output").cloned(),
            },
            other => return Err(anyhow!("Unknown subcommand '{}'", other)),
        };

        Ok(CliArgs {
            command,
            verbose_level,
        })
    }
}

fn parse_analysis(matches: &ArgMatches) -> Result<AnalysisKind> {
    let analysis = matches
        .get_one::<String>("analysis")
        .ok_or_else(|| anyhow!("Analysis is required"))?;

    Ok(match analysis.as_str() {
        "dc" => AnalysisKind::Dc,
        "tran" => AnalysisKind::Transient,
        "ac" => AnalysisKind::Ac,
        "noise" => AnalysisKind::Noise,
        "sp" => {
            let ports = matches
                .get_one::<String>("ports")
                .ok_or_else(|| anyhow!("S-parameter analysis requires --ports"))?
                .parse::<usize>()
                .map_err(|_| anyhow!("--ports must be a positive integer"))?;
            if ports == 0 {
                return Err(anyhow!("--ports must be a positive integer"));
            }

            let z0 = match matches.get_one::<String>("z0") {
                Some(value) => parse_value_with_unit(value)?,
                None => DEFAULT_Z0,
            };
            if z0 <= 0.0 {
                return Err(anyhow!("Reference impedance must be positive"));
            }

            AnalysisKind::SParameter { ports, z0 }
        }
        other => return Err(anyhow!("Unknown analysis '{}'", other)),
    })
}
