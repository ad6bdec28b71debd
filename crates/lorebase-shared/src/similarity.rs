//! Cosine similarity and top-K selection for exact (brute-force) search.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// Cosine similarity of two vectors, in `[-1.0, 1.0]`.
///
/// Returns exactly `0.0` when the lengths differ or either vector has zero
/// norm. Accumulation is done in `f64` and the result clamped, so identical
/// vectors score `1.0` rather than `1.0000001`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// An item paired with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scored<T> {
    pub score: f32,
    pub item: T,
}

struct HeapEntry<T> {
    key: f32,
    seq: usize,
    score: f32,
    item: T,
}

impl<T> HeapEntry<T> {
    // Worse entries order greater so the heap top is the current worst.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank(other)
    }
}

/// Keep the `k` highest-scoring items, best first.
///
/// Runs in O(n log k) with a bounded heap. Equal scores keep their input
/// order; NaN scores rank below every real score.
pub fn top_k<T, I>(items: I, k: usize) -> Vec<Scored<T>>
where
    I: IntoIterator<Item = (f32, T)>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<HeapEntry<T>> = BinaryHeap::with_capacity(k + 1);
    for (seq, (score, item)) in items.into_iter().enumerate() {
        let key = if score.is_nan() { f32::NEG_INFINITY } else { score };
        let entry = HeapEntry {
            key,
            seq,
            score,
            item,
        };

        if heap.len() < k {
            heap.push(entry);
        } else if let Some(worst) = heap.peek() {
            if entry.rank(worst) == Ordering::Less {
                heap.pop();
                heap.push(entry);
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|e| Scored {
            score: e.score,
            item: e.item,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn identical_orthogonal_opposite() {
        let a = [0.3f32, -1.2, 4.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < EPS);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        let neg: Vec<f32> = a.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&a, &neg) + 1.0).abs() < EPS);
    }

    #[test]
    fn degenerate_inputs_score_exactly_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[-0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn scores_stay_in_bounds() {
        let vectors: [&[f32]; 5] = [
            &[1.0, 2.0, 3.0],
            &[-7.5, 0.001, 2.0],
            &[1e-20, 1e-20, 1e-20],
            &[3.0e38, -3.0e38, 1.0],
            &[0.1, 0.1, -0.1],
        ];
        for a in vectors {
            for b in vectors {
                let s = cosine_similarity(a, b);
                assert!((-1.0..=1.0).contains(&s), "{s} out of range");
            }
        }
    }

    #[test]
    fn top_k_is_descending_and_bounded() {
        let items = vec![(0.2, "c"), (0.9, "a"), (-0.5, "e"), (0.4, "b"), (0.1, "d")];
        let top = top_k(items, 3);
        let names: Vec<_> = top.iter().map(|s| s.item).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn top_k_ties_keep_input_order() {
        let items = vec![(0.5, 1), (0.7, 2), (0.5, 3), (0.5, 4)];
        let top = top_k(items, 3);
        let ids: Vec<_> = top.iter().map(|s| s.item).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn top_k_edge_sizes() {
        assert!(top_k(vec![(1.0, ())], 0).is_empty());
        assert_eq!(top_k(vec![(1.0, 'x'), (0.5, 'y')], 10).len(), 2);
        assert!(top_k(Vec::<(f32, u8)>::new(), 5).is_empty());
    }

    #[test]
    fn nan_ranks_last() {
        let top = top_k(vec![(f32::NAN, "nan"), (-1.0, "low"), (0.3, "mid")], 2);
        let names: Vec<_> = top.iter().map(|s| s.item).collect();
        assert_eq!(names, vec!["mid", "low"]);
    }
}
