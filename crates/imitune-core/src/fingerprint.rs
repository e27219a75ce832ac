//! Row-order fingerprint of a metadata table.
//!
//! Record ids are derived from row positions, so any re-ordering or
//! re-filtering of the metadata table between building a generation and
//! computing deletions silently points ids at the wrong embeddings. The
//! fingerprint is a blake3 digest over the ordered rows, recorded when the
//! generation is built and re-checked before every deletion run.
//!
//! The digest is taken over a *key* that must survive the edits a deletion
//! table is expected to carry. By default every column except the ones the
//! validity predicate inspects is hashed, since blanking those fields is
//! exactly how rows are marked for deletion.
//!
//! A key that leaves no columns to hash, such as the default key over a
//! table holding only the url column, still records the row count but
//! cannot see reordering. [`RowOrderFingerprint::checks_order`] reports
//! this so callers can warn about it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::source::MetadataTable;

const FIELD_SEP: u8 = 0x1f;
const ROW_SEP: u8 = 0x1e;

/// Which part of each row contributes to the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "columns")]
pub enum FingerprintKey {
    /// A single identifying column, e.g. a file name.
    Column(String),
    /// Every column in header order except those listed.
    AllExcept(Vec<String>),
}

impl FingerprintKey {
    fn columns<'a>(&'a self, table: &'a MetadataTable) -> Result<Vec<&'a str>> {
        match self {
            Self::Column(column) => {
                table.require_column(column)?;
                Ok(vec![column.as_str()])
            }
            Self::AllExcept(excluded) => Ok(table
                .headers()
                .iter()
                .filter(|h| !excluded.contains(*h))
                .map(String::as_str)
                .collect()),
        }
    }
}

/// Digest of a metadata table's row order under a [`FingerprintKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOrderFingerprint {
    pub key: FingerprintKey,
    /// Columns the key resolved to when the fingerprint was taken.
    #[serde(default)]
    pub columns: Vec<String>,
    pub digest: String,
    pub rows: usize,
}

impl RowOrderFingerprint {
    /// Fingerprint `table` under `key`.
    pub fn compute(table: &MetadataTable, key: FingerprintKey) -> Result<Self> {
        let columns = key.columns(table)?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(table.len() as u64).to_le_bytes());
        for column in &columns {
            hasher.update(column.as_bytes());
            hasher.update(&[FIELD_SEP]);
        }
        for row in table.rows() {
            hasher.update(&[ROW_SEP]);
            for column in &columns {
                // Absent and empty fields hash differently.
                match row.get(column) {
                    Some(value) => {
                        hasher.update(&[1]);
                        hasher.update(value.as_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
                hasher.update(&[FIELD_SEP]);
            }
        }

        Ok(Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            digest: hasher.finalize().to_hex().to_string(),
            rows: table.len(),
            key,
        })
    }

    /// Whether the digest covers row content, and so detects reordering.
    /// `false` means only the row count is checked.
    #[must_use]
    pub fn checks_order(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Recompute over `table` with the recorded key and compare.
    pub fn verify(&self, table: &MetadataTable) -> Result<()> {
        let actual = Self::compute(table, self.key.clone())?;
        if actual.digest == self.digest && actual.rows == self.rows {
            log::debug!("Row order fingerprint verified ({} rows)", self.rows);
            Ok(())
        } else {
            Err(Error::RowOrderMismatch {
                expected: self.digest.clone(),
                expected_rows: self.rows,
                actual: actual.digest,
                actual_rows: actual.rows,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> MetadataTable {
        MetadataTable::from_reader(csv.as_bytes()).unwrap()
    }

    const BUILT: &str = "fname,freesound_url\n10,https://a\n11,https://b\n12,https://c\n";

    #[test]
    fn test_blanked_url_column_still_verifies() {
        let key = FingerprintKey::AllExcept(vec!["freesound_url".to_string()]);
        let fp = RowOrderFingerprint::compute(&table(BUILT), key).unwrap();
        assert_eq!(fp.rows, 3);

        let novoices = table("fname,freesound_url\n10,https://a\n11,\n12,https://c\n");
        assert!(fp.verify(&novoices).is_ok());
    }

    #[test]
    fn test_reordered_rows_are_rejected() {
        let key = FingerprintKey::Column("fname".to_string());
        let fp = RowOrderFingerprint::compute(&table(BUILT), key).unwrap();

        let reordered = table("fname,freesound_url\n11,https://b\n10,https://a\n12,https://c\n");
        assert!(matches!(
            fp.verify(&reordered),
            Err(Error::RowOrderMismatch { expected_rows: 3, actual_rows: 3, .. })
        ));
    }

    #[test]
    fn test_filtered_rows_are_rejected() {
        let key = FingerprintKey::AllExcept(vec!["freesound_url".to_string()]);
        let fp = RowOrderFingerprint::compute(&table(BUILT), key).unwrap();

        let filtered = table("fname,freesound_url\n10,https://a\n12,https://c\n");
        assert!(matches!(
            fp.verify(&filtered),
            Err(Error::RowOrderMismatch { expected_rows: 3, actual_rows: 2, .. })
        ));
    }

    #[test]
    fn test_key_records_resolved_columns() {
        let key = FingerprintKey::AllExcept(vec!["freesound_url".to_string()]);
        let fp = RowOrderFingerprint::compute(&table(BUILT), key).unwrap();
        assert_eq!(fp.columns, ["fname"]);
        assert!(fp.checks_order());
    }

    #[test]
    fn test_url_only_table_checks_row_count_only() {
        let key = FingerprintKey::AllExcept(vec!["freesound_url".to_string()]);
        let fp = RowOrderFingerprint::compute(&table("freesound_url
a
b
c
"), key).unwrap();
        assert!(fp.columns.is_empty());
        assert!(!fp.checks_order());

        // Reordering goes unnoticed; a changed row count does not.
        assert!(fp.verify(&table("freesound_url
c
a
b
")).is_ok());
        assert!(fp.verify(&table("freesound_url
c
a
")).is_err());
    }

    #[test]
    fn test_key_column_must_exist() {
        let key = FingerprintKey::Column("fname".to_string());
        let err = RowOrderFingerprint::compute(&table("url\na\n"), key).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[test]
    fn test_key_serializes_with_kind_tag() {
        let key = FingerprintKey::Column("fname".to_string());
        assert_eq!(
            serde_json::to_string(&key).unwrap(),
            r#"{"kind":"column","columns":"fname"}"#
        );
    }
}
