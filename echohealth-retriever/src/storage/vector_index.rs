//! Exact inner-product search over L2-normalized vectors.
//!
//! Vectors are normalized once when the index is built and the query is
//! normalized at search time, so every score is a cosine similarity in
//! `[-1, 1]`. The corpus is small enough that a brute-force scan over a
//! row-major matrix beats any approximate structure on simplicity.

use crate::error::{Result, RetrieverError};
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Ordering;

/// One search result: a row of the index and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub row: usize,
    pub score: f32,
}

/// A flat (exhaustive) inner-product index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl FlatIndex {
    /// Builds an index of `dimension`-length vectors, normalizing each one.
    ///
    /// Fails with [`RetrieverError::DimensionMismatch`] if any vector has a
    /// different length. An empty `vectors` yields a valid, empty index.
    pub fn build(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrieverError::config("index dimension must be positive"));
        }
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for mut vector in vectors {
            if vector.len() != dimension {
                return Err(RetrieverError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            normalize(&mut vector);
            data.extend_from_slice(&vector);
        }
        Ok(Self { dimension, data })
    }

    /// Wraps an already-normalized row-major matrix, as read back from disk.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(RetrieverError::snapshot_mismatch(format!(
                "{} values do not form rows of dimension {dimension}",
                data.len()
            )));
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The stored (normalized) vector at `row`.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        self.data.chunks_exact(self.dimension).nth(row)
    }

    /// The whole row-major matrix.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns up to `k` hits sorted by descending score, ties by ascending row.
    ///
    /// When `k` exceeds the number of rows, every row is returned exactly once;
    /// no placeholder entries are ever produced.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() {
            return Err(RetrieverError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut query = query.to_vec();
        normalize(&mut query);

        let hits = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| SearchHit {
                row,
                score: dot(vector, &query),
            })
            .k_smallest_by(k, rank)
            .collect();
        Ok(hits)
    }
}

/// Best hit first: higher score, then lower row.
fn rank(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score).then(a.row.cmp(&b.row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlatIndex {
        FlatIndex::build(
            3,
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 2.0, 0.0],
                vec![3.0, 4.0, 0.0],
                vec![0.0, 0.0, -5.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_normalizes_rows() {
        let index = sample();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dimension(), 3);
        for row in 0..index.len() {
            let norm: f32 = index.row(row).unwrap().iter().map(|x| x * x).sum();
            assert!((norm - 1.0).abs() < 1e-6);
        }
        assert_eq!(index.row(2).unwrap(), &[0.6, 0.8, 0.0]);
    }

    #[test]
    fn test_stored_vector_is_its_own_top_hit() {
        let index = sample();
        for row in 0..index.len() {
            let query = index.row(row).unwrap().to_vec();
            let hits = index.search(&query, 1).unwrap();
            assert_eq!(hits[0].row, row);
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_query_is_normalized() {
        let index = sample();
        let hits = index.search(&[30.0, 40.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].row, 2);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].row, 1);
        assert!((hits[1].score - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_k_larger_than_index_returns_every_row_once() {
        let index = sample();
        let hits = index.search(&[1.0, 1.0, 1.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
        let mut rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        rows.sort();
        assert_eq!(rows, vec![0, 1, 2, 3]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(hits.iter().all(|h| (-1.0..=1.0001).contains(&h.score)));
    }

    #[test]
    fn test_ties_break_by_row() {
        let index = FlatIndex::build(
            2,
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 3.0], vec![2.0, 0.0]],
        )
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 4).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_zero_k_returns_nothing() {
        assert!(sample().search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_fails() {
        let index = FlatIndex::build(3, Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 5),
            Err(RetrieverError::EmptyIndex)
        ));
    }

    #[test]
    fn test_dimension_mismatches() {
        assert!(matches!(
            FlatIndex::build(3, vec![vec![1.0, 0.0]]),
            Err(RetrieverError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            sample().search(&[1.0, 0.0], 1),
            Err(RetrieverError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let index = FlatIndex::build(2, vec![vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(index.row(0).unwrap(), &[0.0, 0.0]);
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[1], SearchHit { row: 0, score: 0.0 });
    }

    #[test]
    fn test_from_raw_rejects_ragged_data() {
        assert!(FlatIndex::from_raw(3, vec![0.0; 7]).is_err());
        assert_eq!(FlatIndex::from_raw(3, vec![0.0; 6]).unwrap().len(), 2);
    }
}
