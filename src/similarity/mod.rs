#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use wide::f32x8;

use crate::{Result, StoreError};

/// Compute the dot product of two equal-length vectors using SIMD
/// accumulation with a scalar tail.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut acc = f32x8::splat(0.0);
    let simd_len = a.len() - (a.len() % 8);

    for i in (0..simd_len).step_by(8) {
        let va = f32x8::new([
            a[i],
            a[i + 1],
            a[i + 2],
            a[i + 3],
            a[i + 4],
            a[i + 5],
            a[i + 6],
            a[i + 7],
        ]);
        let vb = f32x8::new([
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]);
        acc += va * vb;
    }

    let mut sum = acc.reduce_add();
    for i in simd_len..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

/// Compute the L2 norm of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm. Vectors of differing
/// length fail with `DimensionMismatch`.
#[inline]
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(StoreError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot(a, b) / (norm_a * norm_b))
}

/// A scored candidate, ordered worst-first so a min-heap of size `k`
/// retains the best `k` seen.
#[derive(Debug, Clone, PartialEq)]
struct Scored {
    id: String,
    score: f32,
}

impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower score ranks higher in the heap; equal scores rank the
        // lexicographically larger id higher so it is evicted first.
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Select the `k` most similar candidates to `query` by cosine similarity.
///
/// Results are sorted by descending score; ties break by ascending id.
/// Candidates whose length differs from the query fail the whole call.
#[inline]
pub fn top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Result<Vec<(String, f32)>>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<Scored> = BinaryHeap::with_capacity(k + 1);

    for (id, embedding) in candidates {
        let score = cosine(query, embedding)?;
        heap.push(Scored {
            id: id.to_string(),
            score,
        });
        if heap.len() > k {
            heap.pop();
        }
    }

    let mut results: Vec<(String, f32)> = heap
        .into_iter()
        .map(|scored| (scored.id, scored.score))
        .collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    Ok(results)
}
