// ============================================================
// Layer 4 — Batch Sampling
// ============================================================
// Turns a split of N samples into lists of sample indices:
//
//   batch_indices  — the training list: every sample exactly once,
//                    optionally shuffled, cut into consecutive batches
//                    (the last one may be short)
//   ghost_indices  — `count` small batches for noise estimation,
//                    each drawn independently without replacement
//
// Both take the RNG explicitly so callers decide the seeding.

use rand::{
    seq::{index, SliceRandom},
    Rng,
};

pub fn batch_indices<R: Rng + ?Sized>(
    n:          usize,
    batch_size: usize,
    shuffle:    bool,
    rng:        &mut R,
) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    if shuffle {
        order.shuffle(rng);
    }
    order
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

pub fn ghost_indices<R: Rng + ?Sized>(
    n:          usize,
    ghost_size: usize,
    count:      usize,
    rng:        &mut R,
) -> Vec<Vec<usize>> {
    let size = ghost_size.min(n);
    if size == 0 {
        return Vec::new();
    }
    (0..count)
        .map(|_| index::sample(rng, n, size).into_vec())
        .collect()
}
