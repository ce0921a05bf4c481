//! Sample metadata tables.
//!
//! Only the header is interpreted here. The table body is handed to
//! `qiime` by path, except by [`transform_to_tsv`], which re-serializes it.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("The metadata file {path:?} is empty.")]
    Empty { path: PathBuf },

    #[error("Could not read metadata file {path:?}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not parse the header of metadata file {path:?}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error(
        "The metadata file {path:?} is missing column(s) required by this stage: {}. \
         Available columns: {}",
        .missing.join(", "),
        .available.join(", ")
    )]
    MissingColumns {
        path: PathBuf,
        missing: Vec<String>,
        available: Vec<String>,
    },
}

/// Pick the field delimiter of a metadata header line.
/// Tabs win over semicolons, semicolons over commas.
pub fn sniff_delimiter(header: &str) -> u8 {
    if header.contains('\t') {
        b'\t'
    } else if header.contains(';') {
        b';'
    } else {
        b','
    }
}

/// A sample-by-attribute table on disk, known by its column names.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    path: PathBuf,
    delimiter: u8,
    columns: Vec<String>,
}

impl MetadataTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let io_err = |source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        };
        let csv_err = |source| MetadataError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut header = String::new();
        BufReader::new(File::open(path).map_err(io_err)?)
            .read_line(&mut header)
            .map_err(io_err)?;
        if header.trim().is_empty() {
            return Err(MetadataError::Empty {
                path: path.to_path_buf(),
            });
        }

        let delimiter = sniff_delimiter(&header);
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;
        let columns = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|c| c.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        Ok(MetadataTable {
            path: path.to_path_buf(),
            delimiter,
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// All column names, the sample id column first.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail unless every name in `names` is a column of this table.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<(), MetadataError> {
        let mut missing: Vec<String> = Vec::new();
        for name in names {
            let name: &str = name.as_ref();
            if !self.has_column(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MetadataError::MissingColumns {
                path: self.path.clone(),
                missing,
                available: self.columns.clone(),
            })
        }
    }
}

/// Re-serialize a delimited table as tab-separated text with no row index.
/// Returns the number of data rows written. An empty input leaves `output`
/// untouched.
pub fn transform_to_tsv(input: &Path, delimiter: u8, output: &Path) -> Result<usize> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(input)
        .with_context(|| input.display().to_string())?;
    let records = rdr
        .records()
        .collect::<Result<Vec<csv::StringRecord>, _>>()
        .with_context(|| input.display().to_string())?;
    if records.is_empty() {
        return Err(MetadataError::Empty {
            path: input.to_path_buf(),
        }
        .into());
    }

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output)
        .with_context(|| output.display().to_string())?;
    for record in &records {
        wtr.write_record(record)?;
    }
    wtr.flush().with_context(|| output.display().to_string())?;
    Ok(records.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write_table(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("id\tHorse\tType"), b'\t');
        assert_eq!(sniff_delimiter("id;Horse;Type"), b';');
        assert_eq!(sniff_delimiter("id,Horse,Type"), b',');
    }

    #[test]
    fn test_load_semicolon_table() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_table(
            dir.path(),
            "metadata_for_q.csv",
            "sample-id;disease_state;Horse;Type\nS1;healthy;H1;incisor\n",
        );
        let table = MetadataTable::load(&path)?;
        assert_eq!(table.delimiter(), b';');
        assert_eq!(
            table.columns(),
            &["sample-id", "disease_state", "Horse", "Type"]
        );
        assert!(table.require_columns(&["disease_state", "Horse"]).is_ok());
        Ok(())
    }

    #[test]
    fn test_missing_columns_are_named() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_table(dir.path(), "m.tsv", "sample-id\tHorse\nS1\tH1\n");
        let table = MetadataTable::load(&path)?;
        let err = table
            .require_columns(&["disease_state", "Horse", "disease_state"])
            .unwrap_err();
        match err {
            MetadataError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["disease_state".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_empty_table() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_table(dir.path(), "empty.csv", "");
        match MetadataTable::load(&path) {
            Err(MetadataError::Empty { path: p }) => assert_eq!(p, path),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(
            MetadataTable::load(dir.path().join("missing.csv")),
            Err(MetadataError::Io { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_transform_to_tsv() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = write_table(
            dir.path(),
            "metadata_for_q.csv",
            "sample-id;disease_state;barcode-sequence\nS1;healthy;ACGT\nS2;gingivitis;TTGA\n",
        );
        let output = dir.path().join("metadata.tsv");
        let rows = transform_to_tsv(&input, b';', &output)?;
        assert_eq!(rows, 2);
        assert_eq!(
            fs::read_to_string(&output)?,
            "sample-id\tdisease_state\tbarcode-sequence\nS1\thealthy\tACGT\nS2\tgingivitis\tTTGA\n"
        );
        Ok(())
    }

    #[test]
    fn test_transform_empty_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_table(dir.path(), "metadata_for_q.csv", "");
        let output = write_table(dir.path(), "metadata.tsv", "sample-id\tHorse\nS1\tH1\n");

        let err = transform_to_tsv(&input, b';', &output).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MetadataError>(),
            Some(MetadataError::Empty { .. })
        ));
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "sample-id\tHorse\nS1\tH1\n"
        );
    }
}
