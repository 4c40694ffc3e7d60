//! Similarity primitives shared by search, detection, clustering and the
//! action cache. Everything here is pure and synchronous.

use crate::error::{FolioError, Result};

/// Decimal places kept when a score is persisted.
pub const SCORE_PRECISION: i32 = 4;

/// A candidate that cleared the similarity threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit<'a, T> {
    pub item: &'a T,
    /// Position of the candidate in the input slice.
    pub index: usize,
    pub similarity: f32,
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns `0.0` when either vector has zero magnitude. Lengths that differ
/// are a data-integrity problem and fail with [`FolioError::DimensionMismatch`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(FolioError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(similarity.clamp(-1.0, 1.0) as f32)
}

/// Candidates whose similarity to `query` is at least `threshold`, best first.
///
/// `embedding_of` projects each candidate onto its vector; candidates without
/// one are skipped. The sort is stable, so equal scores keep input order.
pub fn find_similar<'a, T, F>(
    query: &[f32],
    candidates: &'a [T],
    threshold: f32,
    embedding_of: F,
) -> Result<Vec<SimilarityHit<'a, T>>>
where
    F: Fn(&T) -> Option<&[f32]>,
{
    let mut hits = Vec::new();
    for (index, item) in candidates.iter().enumerate() {
        let Some(embedding) = embedding_of(item) else {
            continue;
        };
        let similarity = cosine_similarity(query, embedding)?;
        if similarity >= threshold {
            hits.push(SimilarityHit {
                item,
                index,
                similarity,
            });
        }
    }

    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    Ok(hits)
}

/// Clamp into `[0, 1]` and round to [`SCORE_PRECISION`] decimals.
pub fn round_score(score: f32) -> f32 {
    let factor = 10f64.powi(SCORE_PRECISION);
    let clamped = (score as f64).clamp(0.0, 1.0);
    ((clamped * factor).round() / factor) as f32
}

/// Element-wise mean of equal-length vectors. `None` for an empty input.
pub fn mean_vector(vectors: &[&[f32]]) -> Result<Option<Vec<f32>>> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };

    let dims = first.len();
    let mut sum = vec![0.0f64; dims];
    for vector in vectors {
        if vector.len() != dims {
            return Err(FolioError::DimensionMismatch {
                expected: dims,
                actual: vector.len(),
            });
        }
        for (acc, value) in sum.iter_mut().zip(vector.iter()) {
            *acc += *value as f64;
        }
    }

    let count = vectors.len() as f64;
    Ok(Some(sum.into_iter().map(|v| (v / count) as f32).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(v: &Vec<f32>) -> Option<&[f32]> {
        Some(v.as_slice())
    }

    #[test]
    fn identical_vectors_score_one() {
        let a = vec![0.3, -1.2, 4.5, 0.0];
        let score = cosine_similarity(&a, &a).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let score = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            FolioError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn find_similar_sorts_descending_and_filters() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.1],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];

        let hits = find_similar(&query, &candidates, 0.5, identity).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn find_similar_breaks_ties_by_input_order() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![2.0, 0.0], vec![0.0, 1.0], vec![5.0, 0.0]];

        let hits = find_similar(&query, &candidates, 0.9, identity).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![0, 2]);
    }

    #[test]
    fn find_similar_is_idempotent() {
        let query = vec![0.2, 0.9, 0.1];
        let candidates = vec![vec![0.1, 0.8, 0.3], vec![0.9, 0.1, 0.0], vec![0.2, 0.9, 0.2]];

        let first = find_similar(&query, &candidates, 0.0, identity).unwrap();
        let second = find_similar(&query, &candidates, 0.0, identity).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn find_similar_skips_candidates_without_embedding() {
        let query = vec![1.0, 0.0];
        let candidates = vec![Some(vec![1.0, 0.0]), None];
        let hits = find_similar(&query, &candidates, 0.0, |c| c.as_deref()).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn round_score_clamps_and_rounds() {
        assert_eq!(round_score(0.876_54), 0.8765);
        assert_eq!(round_score(1.2), 1.0);
        assert_eq!(round_score(-0.3), 0.0);
    }

    #[test]
    fn mean_vector_averages() {
        let a = [1.0, 3.0];
        let b = [3.0, 5.0];
        let mean = mean_vector(&[&a, &b]).unwrap().unwrap();
        assert_eq!(mean, vec![2.0, 4.0]);
        assert!(mean_vector(&[]).unwrap().is_none());
        assert!(mean_vector(&[&a, &[1.0]]).is_err());
    }
}
