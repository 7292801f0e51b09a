use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

thread_local! {
    static THREAD_ID: Cell<usize> = Cell::new(0);
}

/// Index of the current worker within a `parallel_for`; the main thread is 0.
pub fn thread_id() -> usize {
    THREAD_ID.with(|id| id.get())
}

/// One worker per hardware thread; the main thread participates.
pub fn num_system_threads() -> usize {
    num_cpus::get().max(1)
}

/// Run `f(i)` for every `i` in `[start, end)` across the worker pool.
///
/// A shared atomic counter feeds indices in chunks of `ceil(n / threads)`;
/// the call returns only when every task has finished.
pub fn parallel_for<F>(start: usize, end: usize, f: F)
where
    F: Fn(usize) + Send + Sync,
{
    let n_tasks = end.saturating_sub(start);
    if n_tasks == 0 {
        return;
    }
    let n_threads = num_system_threads().min(n_tasks);
    let chunk_size = (n_tasks + n_threads - 1) / n_threads;
    let counter = AtomicUsize::new(0);

    let work = |tid: usize| {
        THREAD_ID.with(|id| id.set(tid));
        loop {
            let begin = counter.fetch_add(chunk_size, Ordering::SeqCst);
            if begin >= n_tasks {
                break;
            }
            let chunk_end = (begin + chunk_size).min(n_tasks);
            for i in begin..chunk_end {
                f(start + i);
            }
        }
        THREAD_ID.with(|id| id.set(0));
    };

    crossbeam::scope(|scope| {
        for t in 1..n_threads {
            let work = &work;
            scope.spawn(move |_| work(t));
        }
        work(0);
    })
    .expect("worker thread panicked");
}

/// Parallel pass over a mutable slice; each element is visited exactly once
/// by exactly one worker.
pub fn parallel_for_slice<T, F>(items: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, usize, &mut T) + Send + Sync,
{
    if items.is_empty() {
        return;
    }
    let n_threads = num_system_threads().min(items.len());
    let chunk_size = (items.len() + n_threads - 1) / n_threads;

    crossbeam::scope(|scope| {
        for (ci, chunk) in items.chunks_mut(chunk_size).enumerate() {
            let f = &f;
            scope.spawn(move |_| {
                THREAD_ID.with(|id| id.set(ci));
                let base = ci * chunk_size;
                for (j, item) in chunk.iter_mut().enumerate() {
                    f(ci, base + j, item);
                }
                THREAD_ID.with(|id| id.set(0));
            });
        }
    })
    .expect("worker thread panicked");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_every_index_visited_once() {
        let n = 10_000;
        let visits: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
        parallel_for(0, n, |i| {
            visits[i].fetch_add(1, Ordering::SeqCst);
        });
        assert!(visits.iter().all(|v| v.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_sum_matches_serial() {
        let total = AtomicU64::new(0);
        parallel_for(1, 1001, |i| {
            total.fetch_add(i as u64, Ordering::SeqCst);
        });
        assert_eq!(total.load(Ordering::SeqCst), 500_500);
    }

    #[test]
    fn test_slice_pass_mutates_all() {
        let mut values = vec![0usize; 1000];
        parallel_for_slice(&mut values, |_tid, i, v| {
            *v = i * 2;
        });
        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, i * 2);
        }
    }

    #[test]
    fn test_thread_id_in_range() {
        let n_threads = num_system_threads();
        parallel_for(0, 1000, |_| {
            assert!(thread_id() < n_threads.max(1));
        });
    }
}
