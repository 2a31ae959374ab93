use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::ApplicationError;

/// Bounded rayon pool for per-file work within one job.
#[derive(Debug)]
pub struct WorkerPool {
    workers: usize,
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, ApplicationError> {
        if workers == 0 {
            return Err(ApplicationError::Configuration(
                "worker count must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("ingest-worker-{index}"))
            .build()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self { workers, pool })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Applies `task` to every item on the pool's threads. Items are picked
    /// up in no particular order; results come back in input order.
    pub fn map<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        if items.is_empty() {
            return Vec::new();
        }
        self.pool.install(|| items.par_iter().map(&task).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_workers_is_a_configuration_error() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[test]
    fn results_keep_input_order() {
        let pool = WorkerPool::new(4).expect("pool");
        let items: Vec<u64> = (0..50).collect();
        let doubled = pool.map(&items, |value| {
            thread::sleep(Duration::from_millis(50 - value));
            value * 2
        });
        assert_eq!(doubled, items.iter().map(|value| value * 2).collect::<Vec<_>>());
    }

    #[test]
    fn never_runs_more_threads_than_workers() {
        let pool = WorkerPool::new(2).expect("pool");
        let items: Vec<u32> = (0..12).collect();
        let threads = Mutex::new(HashSet::new());
        pool.map(&items, |_| {
            threads
                .lock()
                .expect("lock")
                .insert(thread::current().id());
            thread::sleep(Duration::from_millis(5));
        });
        assert!(threads.lock().expect("lock").len() <= 2);
    }

    #[test]
    fn work_runs_on_named_pool_threads() {
        let pool = WorkerPool::new(3).expect("pool");
        assert_eq!(pool.workers(), 3);
        let names = pool.map(&[1_u8, 2, 3], |_| {
            thread::current().name().map(str::to_string).unwrap_or_default()
        });
        assert!(names.iter().all(|name| name.starts_with("ingest-worker-")));
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let pool = WorkerPool::new(3).expect("pool");
        let out: Vec<u8> = pool.map(&Vec::<u8>::new(), |value| *value);
        assert!(out.is_empty());
    }
}
