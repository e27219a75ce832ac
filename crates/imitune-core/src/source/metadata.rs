use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// One row of the metadata table, keyed by column name.
///
/// A column that the row does not reach (a short, ragged line) is absent
/// rather than empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRow {
    fields: BTreeMap<String, String>,
}

impl MetadataRow {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// `true` when the column is absent or holds an empty string.
    #[must_use]
    pub fn is_blank(&self, column: &str) -> bool {
        self.get(column).map_or(true, str::is_empty)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A metadata table read in file order.
///
/// Row order is significant: the position of a row is what its record id
/// is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    headers: Vec<String>,
    rows: Vec<MetadataRow>,
}

impl MetadataTable {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<MetadataRow>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV file with a header line.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        log::debug!("Reading metadata table {}", path.display());
        let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        Self::from_csv(reader)
    }

    /// Read CSV content with a header line from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_csv(csv::ReaderBuilder::new().flexible(true).from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.as_str(), v))
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[MetadataRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Fail with [`Error::MissingColumn`] unless the header declares `column`.
    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(Error::MissingColumn {
                column: column.to_string(),
            })
        }
    }
}
