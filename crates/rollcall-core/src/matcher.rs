//! Nearest-candidate matching over cosine similarity.

use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;

/// Acceptance threshold used when none is configured.
pub const DEFAULT_THRESHOLD: f32 = 0.50;

/// The best-scoring candidate for a probe, before any threshold is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch<K> {
  /// `None` only when there were no candidates.
  pub id:    Option<K>,
  /// Similarity of the best candidate; 0.0 when there were none.
  pub score: f32,
}

/// Strategy for ranking a probe against candidate embeddings.
pub trait Matcher {
  fn best_match<K: Clone>(&self, probe: &Embedding, candidates: &[(K, Embedding)]) -> BestMatch<K>;
}

/// Cosine similarity matcher.
///
/// Candidates are walked in the order given and a later candidate only wins
/// with a strictly greater score, so ties go to the first one seen.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
  fn best_match<K: Clone>(&self, probe: &Embedding, candidates: &[(K, Embedding)]) -> BestMatch<K> {
    let mut best_score = f32::NEG_INFINITY;
    let mut best_idx: Option<usize> = None;

    for (i, (_, candidate)) in candidates.iter().enumerate() {
      let score = probe.similarity(candidate);
      if score > best_score {
        best_score = score;
        best_idx = Some(i);
      }
    }

    match best_idx {
      Some(idx) => BestMatch { id: Some(candidates[idx].0.clone()), score: best_score },
      None => BestMatch { id: None, score: 0.0 },
    }
  }
}

/// Convenience wrapper over [`CosineMatcher`].
pub fn best_match<K: Clone>(probe: &Embedding, candidates: &[(K, Embedding)]) -> BestMatch<K> {
  CosineMatcher.best_match(probe, candidates)
}

/// Minimum similarity at which a best match counts as an identification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(pub f32);

impl Default for Threshold {
  fn default() -> Self { Self(DEFAULT_THRESHOLD) }
}

impl Threshold {
  /// A score exactly at the threshold is accepted.
  pub fn accepts(self, score: f32) -> bool { score >= self.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn emb(values: &[f32]) -> Embedding { Embedding::new(values.to_vec()) }

  #[test]
  fn test_best_match_scans_every_candidate() {
    let probe = emb(&[1.0, 0.0, 0.0]);
    let candidates = vec![
      ("decoy1", emb(&[0.0, 1.0, 0.0])),
      ("decoy2", emb(&[0.0, 0.0, 1.0])),
      ("match", emb(&[1.0, 0.0, 0.0])),
    ];

    let best = best_match(&probe, &candidates);
    assert_eq!(best.id, Some("match"));
    assert!((best.score - 1.0).abs() < 1e-6);
  }

  #[test]
  fn test_tie_goes_to_first_candidate() {
    let probe = emb(&[1.0, 1.0]);
    let candidates = vec![(1, emb(&[2.0, 2.0])), (2, emb(&[1.0, 1.0]))];

    for _ in 0..10 {
      let best = best_match(&probe, &candidates);
      assert_eq!(best.id, Some(1));
    }
  }

  #[test]
  fn test_below_threshold_keeps_best_score() {
    let probe = emb(&[1.0, 0.0]);
    let candidates = vec![(7, emb(&[0.3, 0.9539392]))];

    let best = best_match(&probe, &candidates);
    assert_eq!(best.id, Some(7));
    assert!((best.score - 0.3).abs() < 1e-4);
    assert!(!Threshold::default().accepts(best.score));
  }

  #[test]
  fn test_empty_candidates() {
    let best = best_match::<u32>(&emb(&[1.0, 0.0]), &[]);
    assert_eq!(best.id, None);
    assert_eq!(best.score, 0.0);
  }

  #[test]
  fn test_zero_probe_scores_zero() {
    let best = best_match(&emb(&[0.0, 0.0]), &[("a", emb(&[1.0, 0.0]))]);
    assert_eq!(best.id, Some("a"));
    assert_eq!(best.score, 0.0);
  }

  #[test]
  fn test_threshold_boundary() {
    let t = Threshold(0.5);
    assert!(t.accepts(0.5));
    assert!(t.accepts(0.51));
    assert!(!t.accepts(0.4999));
  }
}
