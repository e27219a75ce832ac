use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::RecordId;

/// Per-record metadata stored alongside the vector in the index.
///
/// Values are strings; a value may be empty.
pub type Metadata = BTreeMap<String, String>;

/// The unit of synchronization: one dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Position-derived identifier.
    pub id: RecordId,

    /// The row's embedding. Its length is fixed per generation.
    pub embedding: Vec<f32>,

    /// Metadata copied from the row of the metadata table.
    #[serde(default)]
    pub metadata: Metadata,
}

impl CanonicalRecord {
    #[must_use]
    pub fn new(id: RecordId, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id,
            embedding,
            metadata,
        }
    }

    /// Number of dimensions in this record's embedding.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_shape() {
        let mut metadata = Metadata::new();
        metadata.insert("freesound_url".to_string(), "https://freesound.org/s/1".to_string());
        let record = CanonicalRecord::new(RecordId::from_position(0).unwrap(), vec![0.5, -1.0], metadata);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "000000000001",
                "embedding": [0.5, -1.0],
                "metadata": {"freesound_url": "https://freesound.org/s/1"}
            })
        );
    }

    #[test]
    fn test_metadata_may_be_omitted() {
        let record: CanonicalRecord =
            serde_json::from_str(r#"{"id": "000000000002", "embedding": [1.0]}"#).unwrap();
        assert!(record.metadata.is_empty());
        assert_eq!(record.dimension(), 1);
    }
}
