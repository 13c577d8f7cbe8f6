//! Embedding vectors and the storage codec.
//!
//! An enrolled identity is persisted as a single token holding up to
//! [`MAX_SAMPLES`] raw recognizer outputs. Matching never uses the raw samples
//! directly: [`aggregate`] collapses them into one unit-length mean.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Raw samples kept per identity; extra captures are dropped by [`encode`].
pub const MAX_SAMPLES: usize = 3;

// ─── Embedding ───────────────────────────────────────────────────────────────

/// A fixed-length feature vector produced by the face recognizer.
///
/// Vectors from different model versions are not comparable; nothing here
/// detects that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
  pub values: Vec<f32>,
}

impl Embedding {
  pub fn new(values: Vec<f32>) -> Self { Self { values } }

  pub fn len(&self) -> usize { self.values.len() }

  pub fn is_empty(&self) -> bool { self.values.is_empty() }

  /// Euclidean (L2) norm.
  pub fn magnitude(&self) -> f32 {
    self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
  }

  /// Scale to unit length. A zero vector is returned unchanged.
  pub fn normalized(&self) -> Self {
    let norm = self.magnitude();
    if norm > 0.0 {
      Self::new(self.values.iter().map(|x| x / norm).collect())
    } else {
      self.clone()
    }
  }

  /// Cosine similarity in [-1, 1]. A zero-magnitude operand scores 0.0.
  pub fn similarity(&self, other: &Embedding) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (a, b) in self.values.iter().zip(other.values.iter()) {
      dot += a * b;
      norm_a += a * a;
      norm_b += b * b;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 { dot / denom } else { 0.0 }
  }
}

impl From<Vec<f32>> for Embedding {
  fn from(values: Vec<f32>) -> Self { Self::new(values) }
}

// ─── Codec ───────────────────────────────────────────────────────────────────

/// Every shape an identity token has been persisted in.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSamples {
  /// `[[f32, ...], ...]`, as written by [`encode`].
  Nested(Vec<Vec<f32>>),
  /// `["[f32, ...]", ...]`, each sample itself JSON-encoded.
  Legacy(Vec<String>),
  /// `[f32, ...]`, a single bare sample.
  Flat(Vec<f32>),
}

/// Serialise 1–[`MAX_SAMPLES`] samples into one storage token.
///
/// Samples past the limit are dropped. All samples must share a dimension.
pub fn encode(samples: &[Embedding]) -> Result<String> {
  let kept = &samples[..samples.len().min(MAX_SAMPLES)];
  let Some(first) = kept.first() else {
    return Err(Error::InvalidInput("at least one face sample is required".into()));
  };
  if first.is_empty() {
    return Err(Error::InvalidInput("face sample is empty".into()));
  }
  if let Some(bad) = kept.iter().find(|s| s.len() != first.len()) {
    return Err(Error::InvalidInput(format!(
      "face samples differ in dimension ({} vs {})",
      first.len(),
      bad.len()
    )));
  }

  let nested: Vec<&[f32]> = kept.iter().map(|s| s.values.as_slice()).collect();
  Ok(serde_json::to_string(&nested)?)
}

/// Decode a token into its raw samples.
pub fn decode(token: &str) -> Result<Vec<Embedding>> {
  let stored: StoredSamples = serde_json::from_str(token)
    .map_err(|e| Error::CorruptEmbedding(e.to_string()))?;

  let samples: Vec<Embedding> = match stored {
    StoredSamples::Nested(rows) => rows.into_iter().map(Embedding::new).collect(),
    StoredSamples::Legacy(rows) => rows
      .iter()
      .map(|row| {
        serde_json::from_str::<Vec<f32>>(row)
          .map(Embedding::new)
          .map_err(|e| Error::CorruptEmbedding(format!("legacy sample: {e}")))
      })
      .collect::<Result<_>>()?,
    StoredSamples::Flat(values) => vec![Embedding::new(values)],
  };

  let Some(first) = samples.first() else {
    return Err(Error::CorruptEmbedding("token holds no samples".into()));
  };
  let dim = first.len();
  if dim == 0 {
    return Err(Error::CorruptEmbedding("sample has no values".into()));
  }
  if samples.iter().any(|s| s.len() != dim) {
    return Err(Error::CorruptEmbedding("samples differ in dimension".into()));
  }

  Ok(samples)
}

/// Number of raw samples held by a token.
pub fn sample_count(token: &str) -> Result<usize> { Ok(decode(token)?.len()) }

/// Collapse a token into the unit-length mean of its samples.
pub fn aggregate(token: &str) -> Result<Embedding> {
  let samples = decode(token)?;
  if samples.len() == 1 {
    return Ok(samples[0].normalized());
  }

  let dim = samples[0].len();
  let count = samples.len() as f64;
  let mut column = Vec::with_capacity(samples.len());
  let mut mean = Vec::with_capacity(dim);

  for i in 0..dim {
    column.clear();
    column.extend(samples.iter().map(|s| s.values[i]));
    // Summed in sorted order so the mean does not depend on sample order.
    column.sort_by(f32::total_cmp);
    let sum: f64 = column.iter().map(|&v| f64::from(v)).sum();
    mean.push((sum / count) as f32);
  }

  Ok(Embedding::new(mean).normalized())
}
