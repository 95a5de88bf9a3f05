use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::dataset::{self, Dataset};
use crate::error::{BridgeError, Result};
use crate::netlist::format_number;

const DEFAULT_INDEP_NAME: &str = "time";
const DEFAULT_DEP_NAME: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    /// Two columns separated by `delimiter`
    Delimited { delimiter: u8 },
    /// `<indep>` / `<dep>` dataset blocks
    Block,
}

impl FileFormat {
    pub const CSV: FileFormat = FileFormat::Delimited { delimiter: b',' };
}

impl Default for FileFormat {
    fn default() -> Self {
        FileFormat::CSV
    }
}

/// Sampled waveform: strictly increasing independent values with one
/// dependent value each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    indep_name: String,
    dep_name: String,
    indep: Vec<f64>,
    dep: Vec<f64>,
    format: FileFormat,
}

impl FileData {
    pub fn new(
        indep_name: impl Into<String>,
        dep_name: impl Into<String>,
        indep: Vec<f64>,
        dep: Vec<f64>,
        format: FileFormat,
    ) -> Result<Self> {
        let dep_name = dep_name.into();

        if indep.len() < 2 {
            return Err(BridgeError::TooFewPoints { count: indep.len() });
        }
        if dep.len() != indep.len() {
            return Err(BridgeError::LengthMismatch {
                name: dep_name,
                expected: indep.len(),
                actual: dep.len(),
            });
        }
        for (index, pair) in indep.windows(2).enumerate() {
            // also rejects NaN
            if !(pair[1] > pair[0]) {
                return Err(BridgeError::NonMonotonic {
                    index: index + 1,
                    previous: pair[0],
                    value: pair[1],
                });
            }
        }

        Ok(FileData {
            indep_name: indep_name.into(),
            dep_name,
            indep,
            dep,
            format,
        })
    }

    pub fn indep_name(&self) -> &str {
        &self.indep_name
    }

    pub fn dep_name(&self) -> &str {
        &self.dep_name
    }

    pub fn indep(&self) -> &[f64] {
        &self.indep
    }

    pub fn dep(&self) -> &[f64] {
        &self.dep
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.indep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indep.is_empty()
    }

    /// Same samples, written in another layout
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    /// Encode in this data's own format
    pub fn encode(&self) -> Result<String> {
        match self.format {
            FileFormat::Delimited { delimiter } => encode_delimited(self, delimiter),
            FileFormat::Block => Ok(encode_block(self)),
        }
    }
}

fn looks_numeric(field: &str) -> bool {
    field.trim().parse::<f64>().is_ok()
}

/// Delimiter found outside quotes in each of the first two records, `;`
/// taking precedence over `,`. A header row may hold either character in
/// its names, so the first data row has to agree with it.
fn sniff_delimiter(text: &str) -> Option<u8> {
    let mut records: Vec<(bool, bool)> = Vec::new();
    let mut current = (false, false);
    let mut quoted = false;
    let mut blank = true;

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                blank = false;
            }
            '\n' if !quoted => {
                if !blank {
                    records.push(current);
                    if records.len() == 2 {
                        break;
                    }
                }
                current = (false, false);
                blank = true;
            }
            ',' if !quoted => {
                current.0 = true;
                blank = false;
            }
            ';' if !quoted => {
                current.1 = true;
                blank = false;
            }
            c if !c.is_whitespace() => blank = false,
            _ => {}
        }
    }
    if !blank && records.len() < 2 {
        records.push(current);
    }

    if records.is_empty() {
        None
    } else if records.iter().all(|(_, semicolon)| *semicolon) {
        Some(b';')
    } else if records.iter().all(|(comma, _)| *comma) {
        Some(b',')
    } else {
        None
    }
}

/// Decode text in either layout. `path` only labels errors.
pub fn decode(path: &str, text: &str) -> Result<FileData> {
    if dataset::is_dataset(text) {
        return decode_block(path, text);
    }

    match sniff_delimiter(text) {
        Some(delimiter) => decode_delimited(path, text, delimiter),
        None => Err(BridgeError::UnrecognizedFormat {
            path: path.to_string(),
        }),
    }
}

fn numeric_row(path: &str, record: &StringRecord, row: usize) -> Result<(f64, f64)> {
    let field = |column: usize| -> Result<f64> {
        let text = record.get(column).unwrap_or("");
        text.parse::<f64>()
            .map_err(|_| BridgeError::format(path, format!("row {}: '{}' is not a number", row, text)))
    };
    Ok((field(0)?, field(1)?))
}

pub fn decode_delimited(path: &str, text: &str, delimiter: u8) -> Result<FileData> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BridgeError::format(path, e.to_string()))?;
        if record.len() != 2 {
            return Err(BridgeError::format(
                path,
                format!("expected 2 columns, found {}", record.len()),
            ));
        }
        records.push(record);
    }

    let has_header = records
        .first()
        .and_then(|record| record.get(0))
        .map_or(false, |field| !looks_numeric(field));

    let (indep_name, dep_name, data) = if has_header {
        let header = &records[0];
        if let Some(first_row) = records.get(1) {
            if !first_row.iter().all(looks_numeric) {
                return Err(BridgeError::UnrecognizedFormat {
                    path: path.to_string(),
                });
            }
        }
        (
            header.get(0).unwrap_or(DEFAULT_INDEP_NAME).to_string(),
            header.get(1).unwrap_or(DEFAULT_DEP_NAME).to_string(),
            &records[1..],
        )
    } else {
        (
            DEFAULT_INDEP_NAME.to_string(),
            DEFAULT_DEP_NAME.to_string(),
            &records[..],
        )
    };

    let mut indep = Vec::with_capacity(data.len());
    let mut dep = Vec::with_capacity(data.len());
    for (i, record) in data.iter().enumerate() {
        let (x, y) = numeric_row(path, record, i + 1)?;
        indep.push(x);
        dep.push(y);
    }

    debug!("Decoded {} delimited samples from {}", indep.len(), path);
    FileData::new(indep_name, dep_name, indep, dep, FileFormat::Delimited { delimiter })
        .map_err(|e| in_file(path, e))
}

pub fn decode_block(path: &str, text: &str) -> Result<FileData> {
    let dataset = Dataset::parse(text).map_err(|e| in_file(path, e))?;

    let indep = dataset
        .independent()
        .next()
        .ok_or_else(|| BridgeError::format(path, "no <indep> block"))?;
    let dep = dataset
        .dependent()
        .next()
        .ok_or_else(|| BridgeError::format(path, "no <dep> block"))?;

    let indep_values = indep.real_values().map_err(|e| in_file(path, e))?;
    let dep_values = dep.real_values().map_err(|e| in_file(path, e))?;

    debug!("Decoded {} block samples from {}", indep_values.len(), path);
    FileData::new(
        indep.name.clone(),
        dep.name.clone(),
        indep_values,
        dep_values,
        FileFormat::Block,
    )
    .map_err(|e| in_file(path, e))
}

/// Wrap a content error with the file it came from
fn in_file(path: &str, err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Format { reason, .. } => BridgeError::format(path, reason),
        BridgeError::UnrecognizedFormat { .. } => err,
        other => BridgeError::format(path, other.to_string()),
    }
}

pub fn encode_delimited(data: &FileData, delimiter: u8) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    // a numeric-looking first name would be read back as a data row
    if !looks_numeric(&data.indep_name) {
        writer
            .write_record([data.indep_name.as_str(), data.dep_name.as_str()])
            .map_err(|e| BridgeError::format("<memory>", e.to_string()))?;
    }

    for (x, y) in data.indep.iter().zip(&data.dep) {
        writer
            .write_record([format_number(*x), format_number(*y)])
            .map_err(|e| BridgeError::format("<memory>", e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| BridgeError::format("<memory>", e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BridgeError::format("<memory>", e.to_string()))
}

fn block_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_whitespace() || c == '<' || c == '>' { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

pub fn encode_block(data: &FileData) -> String {
    let indep_name = block_name(&data.indep_name);
    let mut dep_name = block_name(&data.dep_name);
    // vector names are unique within a dataset
    if dep_name == indep_name {
        dep_name.push_str("_dep");
    }

    let mut dataset = Dataset::new();
    dataset
        .add_independent(indep_name, &data.indep)
        .add_real_dependent(dep_name, &[], &data.dep);
    dataset.to_text()
}

pub fn read_file(path: impl AsRef<Path>) -> Result<FileData> {
    let path = path.as_ref();
    info!("Reading waveform file: {}", path.display());
    let text = fs::read_to_string(path)?;
    decode(&path.display().to_string(), &text)
}

pub fn write_file(path: impl AsRef<Path>, data: &FileData) -> Result<()> {
    let path = path.as_ref();
    let text = data.encode()?;
    fs::write(path, text)?;
    info!("Wrote {} samples to {}", data.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn test_decode_delimited_with_header() {
        let data = decode("wave.csv", "time,voltage\n0.0,0.0\n1e-9,1.0\n2e-9,0.5\n").unwrap();
        assert_eq!(data.indep(), &[0.0, 1e-9, 2e-9]);
        assert_eq!(data.dep(), &[0.0, 1.0, 0.5]);
        assert_eq!(data.indep_name(), "time");
        assert_eq!(data.dep_name(), "voltage");
        assert_eq!(data.format(), FileFormat::CSV);
    }

    #[test]
    fn test_decode_semicolon_without_header() {
        let data = decode("wave.txt", "0;1.5\n0.5;-2\n1;3e-3\n").unwrap();
        assert_eq!(data.format(), FileFormat::Delimited { delimiter: b';' });
        assert_eq!(data.indep_name(), "time");
        assert_relative_eq!(data.dep()[2], 0.003);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_decode_failures() {
        let err = decode("one.csv", "time,v\n0,1\n").unwrap_err();
        assert!(matches!(err, BridgeError::Format { ref path, .. } if path == "one.csv"));

        let err = decode("back.csv", "0,1\n2,2\n1,3\n").unwrap_err();
        assert!(matches!(err, BridgeError::Format { .. }));

        let err = decode("flat.csv", "0,1\n0,2\n").unwrap_err();
        assert!(matches!(err, BridgeError::Format { .. }));

        let err = decode("cols.csv", "0,1,2\n1,2,3\n").unwrap_err();
        assert!(matches!(err, BridgeError::Format { .. }));

        let err = decode("word.csv", "0,1\n1,x\n").unwrap_err();
        assert!(matches!(err, BridgeError::Format { .. }));
    }

    #[test]
    fn test_unrecognized_formats() {
        assert!(matches!(
            decode("plain.txt", "hello world\n"),
            Err(BridgeError::UnrecognizedFormat { .. })
        ));
        assert!(matches!(
            decode("two_headers.csv", "time,v\nsecond,header\n0,1\n1,2\n"),
            Err(BridgeError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn test_construction_validation() {
        assert!(matches!(
            FileData::new("t", "v", vec![0.0], vec![1.0], FileFormat::CSV),
            Err(BridgeError::TooFewPoints { count: 1 })
        ));
        assert!(matches!(
            FileData::new("t", "v", vec![0.0, 1.0], vec![1.0], FileFormat::CSV),
            Err(BridgeError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            FileData::new("t", "v", vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0], FileFormat::Block),
            Err(BridgeError::NonMonotonic { index: 2, .. })
        ));
    }

    #[test]
    fn test_delimited_round_trip() {
        let times = vec![0.0, 1e-12, 0.1 + 0.2, 1.0 / 3.0, 7.5e20];
        let samples = vec![-1.0, 2.2e-9, 0.0, 1e300, -0.5];
        for delimiter in [b',', b';'] {
            let data = FileData::new(
                "time",
                "out, filtered",
                times.clone(),
                samples.clone(),
                FileFormat::Delimited { delimiter },
            )
            .unwrap();
            let decoded = decode("rt.csv", &data.encode().unwrap()).unwrap();
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn test_delimiter_characters_in_names() {
        let names = [("time", "a;b"), ("t;1", "x,y"), ("a,b", "c;d"), ("line\nbreak", "v\"q\"")];
        for (indep_name, dep_name) in names {
            for delimiter in [b',', b';'] {
                let data = FileData::new(
                    indep_name,
                    dep_name,
                    vec![0.0, 0.5, 1.0],
                    vec![2.0, -1.0, 3e-6],
                    FileFormat::Delimited { delimiter },
                )
                .unwrap();
                let text = data.encode().unwrap();
                let decoded = decode("names.csv", &text).unwrap_or_else(|e| panic!("{}: {}", text, e));
                assert_eq!(decoded, data, "{}", text);
            }
        }
    }

    #[test]
    fn test_sniff_needs_agreeing_rows() {
        assert_eq!(sniff_delimiter("time,a;b\n0,1\n"), Some(b','));
        assert_eq!(sniff_delimiter("time;a,b\n0;1\n"), Some(b';'));
        assert_eq!(sniff_delimiter("\n\n0;1\n"), Some(b';'));
        assert_eq!(sniff_delimiter("time,v\n0;1\n"), None);
        assert_eq!(sniff_delimiter("   \n"), None);
    }

    #[test]
    fn test_numeric_names_still_round_trip() {
        let data = FileData::new("1", "2", vec![0.0, 1.0], vec![5.0, 6.0], FileFormat::CSV).unwrap();
        let decoded = decode("n.csv", &data.encode().unwrap()).unwrap();
        assert_eq!(decoded.indep(), data.indep());
        assert_eq!(decoded.dep(), data.dep());
    }

    #[test]
    fn test_block_round_trip() {
        let data = FileData::new(
            "time",
            "Vin",
            vec![0.0, 1e-9, 2e-9, 5e-9],
            vec![0.0, 1.0, 0.5, -0.25],
            FileFormat::Block,
        )
        .unwrap();
        let text = data.encode().unwrap();
        assert!(text.starts_with("<Qucs Dataset 0.0.19>\n<indep time 4>\n"));
        assert!(text.contains("<dep Vin 4>"));
        assert_eq!(decode("wave.dat", &text).unwrap(), data);
    }

    #[test]
    fn test_block_names_stay_distinct() {
        for (indep_name, dep_name) in [("v", "v"), ("a b", "a_b"), ("", " "), ("<t>", "_t_")] {
            let data = FileData::new(
                indep_name,
                dep_name,
                vec![0.0, 1.0],
                vec![4.0, 5.0],
                FileFormat::Block,
            )
            .unwrap();
            let decoded = decode("same.dat", &data.encode().unwrap()).unwrap();
            assert_eq!(decoded.indep(), data.indep());
            assert_eq!(decoded.dep(), data.dep());
            assert_ne!(decoded.indep_name, decoded.dep_name);
        }
    }

    #[test]
    fn test_block_errors_carry_path() {
        let text = "<Qucs Dataset 0.0.19>\n<indep time 2>\n0\n1\n</indep>\n<dep v 2>\n1\n</dep>\n";
        let err = decode("bad.dat", text).unwrap_err();
        assert!(matches!(err, BridgeError::Format { ref path, .. } if path == "bad.dat"));

        let complex = "<Qucs Dataset 0.0.19>\n<indep time 2>\n0\n1\n</indep>\n<dep v 2>\n1\n1+j1\n</dep>\n";
        assert!(matches!(
            decode("c.dat", complex),
            Err(BridgeError::Format { ref path, .. }) if path == "c.dat"
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.csv");
        let data = FileData::new("time", "I", vec![0.0, 1.0, 2.0], vec![0.0, 1e-3, 0.0], FileFormat::CSV).unwrap();

        write_file(&path, &data).unwrap();
        assert_eq!(read_file(&path).unwrap(), data);

        let block = dir.path().join("source.dat");
        write_file(&block, &data.clone().with_format(FileFormat::Block)).unwrap();
        assert_eq!(read_file(&block).unwrap().dep(), data.dep());

        assert!(matches!(
            read_file(dir.path().join("missing.csv")),
            Err(BridgeError::Io(_))
        ));
    }
}
