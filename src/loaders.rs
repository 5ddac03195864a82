//! Loaders for template banks and query point files. Each returns plain physical
//! parameters; the index never sees file formats.
use crate::{
    errors::{GridError, GridResult},
    point::PhysicalParams,
};
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankFormat {
    /// Whitespace separated `mass1 mass2 spin1z spin2z` columns, `#` starts a comment.
    Tabular,
    /// CSV with a header naming the `mass1`, `mass2`, `spin1z` and `spin2z` columns.
    Columnar,
}

impl BankFormat {
    /// Picks the loader from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> GridResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("txt" | "dat") => Ok(BankFormat::Tabular),
            Some("csv") => Ok(BankFormat::Columnar),
            _ => Err(GridError::configuration(format!(
                "unsupported bank file {path:?}, expected a .txt, .dat or .csv file"
            ))),
        }
    }

    pub fn load<P: AsRef<Path>>(self, path: P) -> GridResult<Vec<PhysicalParams>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        match self {
            BankFormat::Tabular => {
                read_tabular(BufReader::new(file), &path.to_string_lossy())
            }
            BankFormat::Columnar => read_columnar(file),
        }
    }
}

/// Loads a bank or point file, choosing the format from its extension.
pub fn load_bank<P: AsRef<Path>>(path: P) -> GridResult<Vec<PhysicalParams>> {
    BankFormat::from_path(&path)?.load(path)
}

pub fn read_tabular<R: BufRead>(reader: R, file_name: &str) -> GridResult<Vec<PhysicalParams>> {
    let mut params = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let parse_error = |message: String| GridError::Parsing {
            file_name: file_name.to_string(),
            line_number: i + 1,
            message,
        };
        let columns = content
            .split_whitespace()
            .map(|column| {
                column
                    .parse::<f64>()
                    .map_err(|_| parse_error(format!("cannot read {column:?} as a number")))
            })
            .collect::<GridResult<Vec<f64>>>()?;
        if columns.len() < 4 {
            return Err(parse_error(format!(
                "expected 4 columns (mass1 mass2 spin1z spin2z), found {}",
                columns.len()
            )));
        }
        params.push(PhysicalParams::new(
            columns[0], columns[1], columns[2], columns[3],
        ));
    }
    Ok(params)
}

pub fn read_columnar<R: Read>(reader: R) -> GridResult<Vec<PhysicalParams>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut params = Vec::new();
    for record in rdr.deserialize() {
        params.push(record?);
    }
    Ok(params)
}
