use anyhow::{Context, Result};
use colored::*;
use log::{error, info, LevelFilter};
use std::fs;
use std::path::Path;

use circuitbridge::cli::{build_cli, CliArgs, CliCommand, OutputFormat};
use circuitbridge::netlist::{format_number, NETLIST_HEADER};
use circuitbridge::parser::NetlistParser;
use circuitbridge::results::{parse_results, AnalysisKind, SimulationResult};
use circuitbridge::waveform;

fn main() {
    let matches = build_cli().get_matches();

    let args = match CliArgs::from_matches(&matches) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    };

    let level = match args.verbose_level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run_application(args) {
        error!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn run_application(args: CliArgs) -> Result<()> {
    match args.command {
        CliCommand::Results {
            input_file,
            analysis,
            output_file,
            output_format,
        } => {
            info!("Decoding {} result from {}", analysis.name(), input_file.bright_blue());
            let text = fs::read_to_string(&input_file)
                .with_context(|| format!("Failed to read '{}'", input_file))?;
            let result = parse_results(&text, &analysis)
                .with_context(|| format!("Failed to decode '{}'", input_file))?;

            let rendered = match output_format {
                OutputFormat::Json => serde_json::to_string_pretty(&result)?,
                OutputFormat::Text => summarize(&result, &analysis),
            };
            emit(&rendered, output_file.as_deref())
        }
        CliCommand::Convert {
            input_file,
            output_file,
            format,
        } => {
            let data = waveform::read_file(&input_file)
                .with_context(|| format!("Failed to read waveform '{}'", input_file))?;
            let samples = data.len();
            waveform::write_file(&output_file, &data.with_format(format))
                .with_context(|| format!("Failed to write '{}'", output_file))?;
            println!(
                "{} {} samples -> {}",
                "Converted".green().bold(),
                samples,
                output_file.bright_green()
            );
            Ok(())
        }
        CliCommand::Netlist {
            input_file,
            output_file,
        } => {
            if !Path::new(&input_file).exists() {
                return Err(anyhow::anyhow!("Input file '{}' not found", input_file));
            }

            let parsed = NetlistParser::new().parse_file(&input_file)?;
            let directives = parsed.directives.clone();
            let circuit = parsed.into_circuit()?;

            let mut out = format!("{}  {}\n", NETLIST_HEADER, circuit.title);
            out.push_str(&circuit.to_netlist());
            for directive in directives {
                out.push_str(&directive);
                out.push('\n');
            }
            emit(&out, output_file.as_deref())
        }
    }
}

fn emit(text: &str, output_file: Option<&str>) -> Result<()> {
    match output_file {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write '{}'", path))?;
            info!("Output written to: {}", path.bright_green());
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// Human readable digest: scalars in full, sequences by their last value
fn summarize(result: &SimulationResult, analysis: &AnalysisKind) -> String {
    let mut out = format!("{}\n", format!("=== {} result ===", analysis.name()).bold());

    match result {
        SimulationResult::Dc(dc) => {
            for (node, value) in dc.voltages() {
                out.push_str(&format!("  V({}): {} V\n", node.cyan(), format_number(*value)));
            }
            for (branch, value) in dc.currents() {
                out.push_str(&format!("  I({}): {} A\n", branch.cyan(), format_number(*value)));
            }
        }
        SimulationResult::Transient(tran) => {
            out.push_str(&format!("{} points in '{}'\n", tran.len(), tran.indep_name()));
            for (node, values) in tran.voltages() {
                if let Some(last) = values.last() {
                    out.push_str(&format!("  V({}): {} V (final)\n", node.cyan(), format_number(*last)));
                }
            }
            for (branch, values) in tran.currents() {
                if let Some(last) = values.last() {
                    out.push_str(&format!("  I({}): {} A (final)\n", branch.cyan(), format_number(*last)));
                }
            }
        }
        SimulationResult::Ac(ac) => {
            out.push_str(&format!("{} points in '{}'\n", ac.len(), ac.indep_name()));
            for (node, values) in ac.voltages() {
                if let Some(last) = values.last() {
                    out.push_str(&format!("  |V({})|: {} (final)\n", node.cyan(), format_number(last.norm())));
                }
            }
            for (branch, values) in ac.currents() {
                if let Some(last) = values.last() {
                    out.push_str(&format!("  |I({})|: {} (final)\n", branch.cyan(), format_number(last.norm())));
                }
            }
        }
        SimulationResult::SParameter(sp) => {
            let sweep = sp.sweep();
            out.push_str(&format!(
                "{} ports, z0 = {} ohm, {} points from {} to {} Hz\n",
                sp.ports(),
                format_number(sp.z0()),
                sweep.points,
                format_number(sweep.start),
                format_number(sweep.stop)
            ));
            for (pair, values) in sp.matrix() {
                if let Some(first) = values.first() {
                    let db = 20.0 * first.norm().log10();
                    out.push_str(&format!(
                        "  {}: {:.2} dB at {} Hz\n",
                        pair.to_string().cyan(),
                        db,
                        format_number(sweep.start)
                    ));
                }
            }
        }
        SimulationResult::Noise(noise) => {
            for (pair, value) in noise.correlations() {
                let line = format!("  C[{}]: {}", pair, format_number(*value));
                if value.abs() > 1.0 {
                    out.push_str(&format!("{}\n", line.yellow()));
                } else {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
    }

    out
}
