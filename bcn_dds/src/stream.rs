//! Scheduling of per row work and sequential reads of level data.
//!
//! Mip levels depend on the position in the stream, so levels are read in order
//! with a [StreamCursor]. The rows of texels within a level are independent and
//! can be processed in parallel.
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::debug;

use crate::SurfaceError;

/// How rows of a level are distributed across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parallelism {
    /// Process rows in order on the calling thread.
    Sequential,
    /// Use the global rayon thread pool.
    #[default]
    Automatic,
    /// Use a dedicated thread pool with the given number of threads.
    /// The pool is shared by every mipmap of a single operation.
    Threads(usize),
}

/// A shared flag checked before processing each row.
///
/// Clones share the same flag, so cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

struct CursorState<R> {
    reader: R,
    position: u64,
}

/// A reader shared between workers that hands out consecutive byte ranges.
///
/// Each read locks the underlying reader, so ranges never interleave
/// even if requests come from multiple threads.
pub struct StreamCursor<R> {
    state: Mutex<CursorState<R>>,
}

impl<R: Read> StreamCursor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            state: Mutex::new(CursorState {
                reader,
                position: 0,
            }),
        }
    }

    /// Read up to `len` bytes following the previous read.
    ///
    /// Fewer bytes are returned only if the reader reached the end of its data.
    pub fn read_next(&self, len: usize) -> std::io::Result<Vec<u8>> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;

        // `len` can be much larger than the remaining data.
        let mut buffer = Vec::new();
        (&mut state.reader).take(len as u64).read_to_end(&mut buffer)?;
        state.position += buffer.len() as u64;
        Ok(buffer)
    }

    /// The number of bytes read so far.
    pub fn position(&self) -> std::io::Result<u64> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.position)
    }

    pub fn into_inner(self) -> std::io::Result<R> {
        self.state
            .into_inner()
            .map(|s| s.reader)
            .map_err(|_| poisoned())
    }
}

fn poisoned() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "stream cursor lock poisoned")
}

/// The threads used for every level of one encode or decode operation.
///
/// [Parallelism::Threads] builds its dedicated pool once here.
/// Other modes run on the calling thread or the global pool.
pub(crate) struct WorkerPool(Option<rayon::ThreadPool>);

impl WorkerPool {
    pub(crate) fn new(parallelism: Parallelism) -> Result<Self, SurfaceError> {
        match parallelism {
            Parallelism::Threads(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| SurfaceError::ThreadPool {
                        reason: e.to_string(),
                    })?;
                debug!(threads = pool.current_num_threads(), "created thread pool");
                Ok(Self(Some(pool)))
            }
            Parallelism::Sequential | Parallelism::Automatic => Ok(Self(None)),
        }
    }

    /// Run `op` so that parallel rows inside it use this pool.
    pub(crate) fn install<T, OP>(&self, op: OP) -> T
    where
        T: Send,
        OP: FnOnce() -> T + Send,
    {
        match &self.0 {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// Call `f` with the index and contents of each `row_len` sized row of `output`.
///
/// Parallel rows run on the current rayon pool, which is the dedicated pool
/// when called within [WorkerPool::install].
/// The first error stops processing of the remaining rows and is returned.
/// Rows already written are left in place.
pub(crate) fn for_each_row<F>(
    output: &mut [u8],
    row_len: usize,
    parallelism: Parallelism,
    cancellation: Option<&CancellationToken>,
    f: F,
) -> Result<(), SurfaceError>
where
    F: Fn(usize, &mut [u8]) -> Result<(), SurfaceError> + Sync + Send,
{
    if row_len == 0 {
        return Ok(());
    }

    let process_row = |(i, row): (usize, &mut [u8])| {
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(SurfaceError::Cancelled);
        }
        f(i, row)
    };

    match parallelism {
        Parallelism::Sequential => output.chunks_mut(row_len).enumerate().try_for_each(process_row),
        Parallelism::Automatic | Parallelism::Threads(_) => output
            .par_chunks_mut(row_len)
            .enumerate()
            .try_for_each(process_row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn fill_rows(parallelism: Parallelism) -> Result<Vec<u8>, SurfaceError> {
        let mut output = vec![0u8; 64 * 3];
        WorkerPool::new(parallelism)?.install(|| {
            for_each_row(&mut output, 3, parallelism, None, |i, row| {
                row.fill(i as u8);
                Ok(())
            })
        })?;
        Ok(output)
    }

    #[rstest]
    #[case(Parallelism::Sequential)]
    #[case(Parallelism::Automatic)]
    #[case(Parallelism::Threads(1))]
    #[case(Parallelism::Threads(3))]
    fn rows_match_index(#[case] parallelism: Parallelism) {
        let expected: Vec<_> = (0..64u8).flat_map(|i| [i; 3]).collect();
        assert_eq!(expected, fill_rows(parallelism).unwrap());
    }

    #[test]
    fn short_last_row() {
        let mut output = vec![0u8; 5];
        for_each_row(&mut output, 2, Parallelism::Sequential, None, |_, row| {
            row.fill(row.len() as u8);
            Ok(())
        })
        .unwrap();
        assert_eq!(vec![2, 2, 2, 2, 1], output);
    }

    #[rstest]
    #[case(Parallelism::Sequential)]
    #[case(Parallelism::Automatic)]
    fn cancelled_before_start(#[case] parallelism: Parallelism) {
        let token = CancellationToken::new();
        token.cancel();

        let mut output = vec![0u8; 16];
        let result = for_each_row(&mut output, 4, parallelism, Some(&token), |_, row| {
            row.fill(1);
            Ok(())
        });
        assert_eq!(Err(SurfaceError::Cancelled), result);
        assert_eq!(vec![0u8; 16], output);
    }

    #[test]
    fn cancel_while_running() {
        let token = CancellationToken::new();
        let mut output = vec![0u8; 16];
        let result = for_each_row(&mut output, 4, Parallelism::Sequential, Some(&token), |i, row| {
            row.fill(1);
            if i == 1 {
                token.cancel();
            }
            Ok(())
        });
        assert_eq!(Err(SurfaceError::Cancelled), result);
        assert_eq!([1; 8], output[..8]);
        assert_eq!([0; 8], output[8..]);
    }

    #[rstest]
    #[case(Parallelism::Sequential)]
    #[case(Parallelism::Automatic)]
    fn first_error_aborts(#[case] parallelism: Parallelism) {
        let mut output = vec![0u8; 16];
        let result = for_each_row(&mut output, 4, parallelism, None, |i, _| {
            if i == 2 {
                Err(SurfaceError::NotEnoughData {
                    expected: 1,
                    actual: 0,
                })
            } else {
                Ok(())
            }
        });
        assert_eq!(
            Err(SurfaceError::NotEnoughData {
                expected: 1,
                actual: 0
            }),
            result
        );
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert_eq!(token, clone);
        assert_ne!(token, CancellationToken::new());

        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn worker_pool_reused_across_installs() {
        let pool = WorkerPool::new(Parallelism::Threads(3)).unwrap();
        assert_eq!(3, pool.install(rayon::current_num_threads));
        assert_eq!(3, pool.install(rayon::current_num_threads));
    }

    #[test]
    fn worker_pool_sequential_runs_on_caller() {
        let pool = WorkerPool::new(Parallelism::Sequential).unwrap();
        assert_eq!(None, pool.install(rayon::current_thread_index));
    }

    #[test]
    fn cursor_large_read_returns_available_bytes() {
        let cursor = StreamCursor::new(Cursor::new(vec![1u8, 2, 3]));
        assert_eq!(vec![1, 2, 3], cursor.read_next(usize::MAX).unwrap());
        assert!(cursor.read_next(usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn cursor_reads_consecutive_ranges() {
        let cursor = StreamCursor::new(Cursor::new((0..10u8).collect::<Vec<_>>()));
        assert_eq!(vec![0, 1, 2, 3], cursor.read_next(4).unwrap());
        assert_eq!(vec![4, 5], cursor.read_next(2).unwrap());
        assert_eq!(6, cursor.position().unwrap());

        // Only the remaining bytes are returned at the end of the stream.
        assert_eq!(vec![6, 7, 8, 9], cursor.read_next(8).unwrap());
        assert!(cursor.read_next(1).unwrap().is_empty());
        assert_eq!(10, cursor.position().unwrap());
    }

    #[test]
    fn cursor_shared_between_threads() {
        let cursor = StreamCursor::new(Cursor::new((0..64u8).collect::<Vec<_>>()));
        let mut chunks: Vec<_> = (0..16)
            .into_par_iter()
            .map(|_| cursor.read_next(4).unwrap())
            .collect();

        // Each read is a whole aligned range regardless of thread order.
        chunks.sort();
        let expected: Vec<_> = (0..64u8).collect::<Vec<_>>().chunks(4).map(|c| c.to_vec()).collect();
        assert_eq!(expected, chunks);
    }
}
