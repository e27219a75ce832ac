use ndarray::Array2;
use ndarray_npy::read_npy;
use std::path::Path;

use crate::error::{Error, Result};

/// An `N x D` matrix of `f32` embeddings, one row per dataset row.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    dimension: usize,
    rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    /// Build a matrix from explicit rows, which must all share `dimension`.
    pub fn new(dimension: usize, rows: Vec<Vec<f32>>) -> Result<Self> {
        if let Some((position, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dimension) {
            return Err(Error::InvalidData(format!(
                "embedding row {position} has {} values, expected {dimension}",
                row.len()
            )));
        }
        Ok(Self { dimension, rows })
    }

    /// Load a two-dimensional `.npy` array.
    ///
    /// `float32` arrays are read as-is; `float64` arrays are narrowed to
    /// `f32`.
    pub fn from_npy(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        log::debug!("Reading embeddings {}", path.display());

        let array: Array2<f32> = match read_npy::<_, Array2<f32>>(path) {
            Ok(array) => array,
            Err(f32_err) => match read_npy::<_, Array2<f64>>(path) {
                Ok(array) => {
                    log::info!("Narrowing float64 embeddings in {} to float32", path.display());
                    array.mapv(|v| v as f32)
                }
                Err(_) => {
                    return Err(Error::EmbeddingSource {
                        path: path.to_path_buf(),
                        message: f32_err.to_string(),
                    })
                }
            },
        };

        Ok(Self::from(array))
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
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
    pub fn row(&self, position: usize) -> Option<&[f32]> {
        self.rows.get(position).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

impl From<Array2<f32>> for EmbeddingMatrix {
    fn from(array: Array2<f32>) -> Self {
        Self {
            dimension: array.ncols(),
            rows: array.rows().into_iter().map(|row| row.to_vec()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    #[test]
    fn test_reads_float32_npy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("emb.npy");
        write_npy(&path, &array![[1.0_f32, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();

        let matrix = EmbeddingMatrix::from_npy(&path).unwrap();
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.dimension(), 2);
        assert_eq!(matrix.row(1), Some(&[3.0_f32, 4.0][..]));
    }

    #[test]
    fn test_narrows_float64_npy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("emb64.npy");
        write_npy(&path, &array![[0.25_f64, -0.5, 1.0]]).unwrap();

        let matrix = EmbeddingMatrix::from_npy(&path).unwrap();
        assert_eq!(matrix.dimension(), 3);
        assert_eq!(matrix.row(0), Some(&[0.25_f32, -0.5, 1.0][..]));
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let err = EmbeddingMatrix::from_npy("/nonexistent/emb.npy").unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_garbage_file_is_embedding_source_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.npy");
        std::fs::write(&path, b"not an npy file").unwrap();

        let err = EmbeddingMatrix::from_npy(&path).unwrap_err();
        assert!(matches!(err, Error::EmbeddingSource { .. }));
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        assert!(EmbeddingMatrix::new(2, vec![vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(EmbeddingMatrix::new(2, vec![vec![1.0, 2.0]]).is_ok());
    }
}
