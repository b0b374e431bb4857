//! Data-parallel reduction helpers.
//!
//! Every scope is a reduction over pixels. These helpers hide the choice
//! between a rayon fold/reduce and a plain loop: small inputs run
//! sequentially, large inputs are split across the pool. The combine step
//! must be associative and order-independent so both paths agree.

use rayon::prelude::*;

/// Minimum element count before work is spread across threads.
pub const PARALLEL_THRESHOLD: usize = 16_384;

/// Parallel fold/reduce over fixed-size chunks with threshold-based dispatch.
///
/// ```ignore
/// if elements >= PARALLEL_THRESHOLD {
///     data.par_chunks(chunk_size)
///         .enumerate()
///         .fold(init, fold_fn)
///         .reduce(init, reduce_fn)
/// } else {
///     // sequential version
/// }
/// ```
///
/// `fold_fn` receives the chunk index alongside the chunk so row-based
/// callers know which row they are looking at.
pub fn fold_reduce_chunks<T, A, I, F, R>(
    data: &[T],
    chunk_size: usize,
    init: I,
    fold_fn: F,
    reduce_fn: R,
) -> A
where
    T: Sync,
    A: Send,
    I: Fn() -> A + Sync + Send,
    F: Fn(A, usize, &[T]) -> A + Sync + Send,
    R: Fn(A, A) -> A + Sync + Send,
{
    let chunk_size = chunk_size.max(1);
    if data.len() >= PARALLEL_THRESHOLD {
        data.par_chunks(chunk_size)
            .enumerate()
            .fold(&init, |acc, (i, chunk)| fold_fn(acc, i, chunk))
            .reduce(&init, &reduce_fn)
    } else {
        data.chunks(chunk_size)
            .enumerate()
            .fold(init(), |acc, (i, chunk)| fold_fn(acc, i, chunk))
    }
}

/// Parallel for-each over fixed-size chunks with their index.
pub fn for_each_chunk<T, F>(data: &[T], chunk_size: usize, f: F)
where
    T: Sync,
    F: Fn(usize, &[T]) + Sync + Send,
{
    let chunk_size = chunk_size.max(1);
    if data.len() >= PARALLEL_THRESHOLD {
        data.par_chunks(chunk_size)
            .enumerate()
            .for_each(|(i, chunk)| f(i, chunk));
    } else {
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            f(i, chunk);
        }
    }
}

/// Parallel for-each over mutable fixed-size chunks with their index.
pub fn for_each_chunk_mut<T, F>(data: &mut [T], chunk_size: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    let chunk_size = chunk_size.max(1);
    if data.len() >= PARALLEL_THRESHOLD {
        data.par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(i, chunk)| f(i, chunk));
    } else {
        for (i, chunk) in data.chunks_mut(chunk_size).enumerate() {
            f(i, chunk);
        }
    }
}

/// Map `0..count` to a vector, in parallel when `count` is large enough.
pub fn map_indices<T, F>(count: usize, threshold: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if count >= threshold {
        (0..count).into_par_iter().map(f).collect()
    } else {
        (0..count).map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_reduce_matches_sequential_sum() {
        let data: Vec<u64> = (0..(PARALLEL_THRESHOLD as u64 * 3)).collect();
        let expected: u64 = data.iter().sum();

        let total = fold_reduce_chunks(
            &data,
            97,
            || 0u64,
            |acc, _, chunk| acc + chunk.iter().sum::<u64>(),
            |a, b| a + b,
        );
        assert_eq!(total, expected);
    }

    #[test]
    fn test_fold_reduce_small_input_sequential() {
        let data = [1u32, 2, 3, 4, 5];
        let rows = fold_reduce_chunks(
            &data,
            2,
            Vec::new,
            |mut acc, i, _| {
                acc.push(i);
                acc
            },
            |mut a, b| {
                a.extend(b);
                a
            },
        );
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_for_each_chunk_mut_sees_every_chunk() {
        let mut data = vec![0usize; PARALLEL_THRESHOLD * 2];
        for_each_chunk_mut(&mut data, 64, |i, chunk| chunk.fill(i));
        assert_eq!(data[0], 0);
        assert_eq!(data[64], 1);
        assert_eq!(data[data.len() - 1], (data.len() - 1) / 64);
    }

    #[test]
    fn test_map_indices_preserves_order() {
        let v = map_indices(1000, 10, |i| i * 2);
        assert_eq!(v[999], 1998);
    }
}
