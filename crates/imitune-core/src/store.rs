//! On-disk record store.
//!
//! A generation is persisted as two JSON documents: the artifact itself, an
//! array of `{id, embedding, metadata}` objects, and a sidecar manifest
//! (`<stem>.manifest.json`) carrying the row count, dimension, and row-order
//! fingerprint. Both are serialized to temporary files in the target
//! directory before either is renamed into place. The old manifest is
//! removed before the new artifact lands and the new manifest goes last, so
//! an artifact never sits next to a manifest from another generation.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::model::{CanonicalRecord, DatasetGeneration, GenerationManifest, RecordId};

/// Location of a persisted generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar manifest, e.g. `embeddings.manifest.json`.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.with_extension("manifest.json")
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist a generation and its manifest, creating parent directories.
    pub fn write(&self, generation: &DatasetGeneration, manifest: &GenerationManifest) -> Result<()> {
        if manifest.row_count != generation.len() || manifest.dimension != generation.dimension() {
            return Err(Error::InvalidData(format!(
                "manifest describes {} x {}, generation is {} x {}",
                manifest.row_count,
                manifest.dimension,
                generation.len(),
                generation.dimension()
            )));
        }

        log::info!(
            "Saving {} records to {}",
            generation.len(),
            self.path.display()
        );
        let manifest_path = self.manifest_path();
        let artifact = stage_json(&self.path, generation.records())?;
        let staged_manifest = stage_json(&manifest_path, manifest)?;

        match fs::remove_file(&manifest_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        artifact.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        staged_manifest
            .persist(&manifest_path)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Read the manifest, if one was written for this artifact.
    pub fn load_manifest(&self) -> Result<Option<GenerationManifest>> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    /// Load and validate the persisted generation.
    ///
    /// The dimension is taken from the manifest. Artifacts written without
    /// one take it from the first record; every record is still checked
    /// against it.
    pub fn load(&self) -> Result<DatasetGeneration> {
        if !self.path.is_file() {
            return Err(Error::SourceNotFound {
                path: self.path.clone(),
            });
        }

        log::info!("Loading records from {}", self.path.display());
        let reader = BufReader::new(File::open(&self.path)?);
        let records: Vec<CanonicalRecord> = serde_json::from_reader(reader)?;

        // Ids are positional; a duplicate or shuffled id would collapse or
        // misplace records in the index.
        for (position, record) in records.iter().enumerate() {
            if RecordId::from_position(position) != Some(record.id) {
                return Err(Error::InvalidData(format!(
                    "record at position {position} has id {}, expected {}",
                    record.id,
                    RecordId::from_position(position)
                        .map_or_else(|| String::from("<out of range>"), |id| id.to_string())
                )));
            }
        }

        let dimension = match self.load_manifest()? {
            Some(manifest) => {
                if manifest.row_count != records.len() {
                    return Err(Error::InvalidData(format!(
                        "manifest records {} rows but artifact holds {}",
                        manifest.row_count,
                        records.len()
                    )));
                }
                manifest.dimension
            }
            None => {
                log::warn!(
                    "No manifest next to {}; inferring dimension from the first record",
                    self.path.display()
                );
                records.first().map_or(0, CanonicalRecord::dimension)
            }
        };

        DatasetGeneration::new(dimension, records)
    }
}

/// Serialize `value` into a temporary file next to `path`.
fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}
