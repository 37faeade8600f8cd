//! Exact vector similarity search

use crate::error::{PipelineError, Result};
use std::cmp::Ordering;

/// Cosine similarity in `[-1, 1]`; 0 when either vector has zero length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Score every candidate against `query` and keep the `top_k` best, highest
/// similarity first. Ties keep candidate order.
pub fn top_k<'a, T, I>(query: &[f32], candidates: I, top_k: usize) -> Result<Vec<(f32, T)>>
where
    I: IntoIterator<Item = (T, &'a [f32])>,
{
    let mut scored = Vec::new();
    for (item, vector) in candidates {
        if vector.len() != query.len() {
            return Err(PipelineError::Search(format!(
                "Dimension mismatch: query has {} values, stored vector has {}",
                query.len(),
                vector.len()
            )));
        }
        scored.push((cosine_similarity(query, vector), item));
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}
