use rayon::prelude::*;
use thiserror::Error;

/// Errors that can occur while setting up parallel execution.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),
}

/// Controls how a [`ThreadPool`] executes its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Run sequentially on the calling thread.
    ///
    /// Useful for small images, debugging, or when the caller already
    /// parallelizes across planes.
    Serial,

    /// Use the global Rayon thread pool.
    #[default]
    Global,

    /// Run on a dedicated Rayon thread pool with `n` threads.
    ///
    /// The pool is built once in [`ThreadPool::new`] and reused by every call.
    Fixed(usize),
}

/// Fan-out of independent tasks over worker threads.
///
/// Every task runs exactly once and [`ThreadPool::run`] blocks until all of
/// them finished. Tasks must not share mutable state; they typically own
/// disjoint row slices of an output image.
pub struct ThreadPool {
    strategy: ExecutionStrategy,
    pool: Option<rayon::ThreadPool>,
}

impl ThreadPool {
    /// Create a thread pool for the given strategy.
    ///
    /// # Arguments
    ///
    /// * `strategy` - How tasks are dispatched.
    ///
    /// # Errors
    ///
    /// Returns an error if a fixed pool is requested with zero threads or if
    /// Rayon fails to spawn the workers.
    pub fn new(strategy: ExecutionStrategy) -> Result<Self, ParallelError> {
        let pool = match strategy {
            ExecutionStrategy::Fixed(0) => return Err(ParallelError::InvalidThreadCount(0)),
            ExecutionStrategy::Fixed(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ParallelError::BuildError(e.to_string()))?,
            ),
            ExecutionStrategy::Serial | ExecutionStrategy::Global => None,
        };
        Ok(Self { strategy, pool })
    }

    /// A pool that runs every task on the calling thread.
    pub fn serial() -> Self {
        Self {
            strategy: ExecutionStrategy::Serial,
            pool: None,
        }
    }

    /// The strategy this pool was created with.
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Number of threads tasks may run on.
    pub fn num_threads(&self) -> usize {
        match (&self.pool, self.strategy) {
            (_, ExecutionStrategy::Serial) => 1,
            (Some(pool), _) => pool.current_num_threads(),
            (None, _) => rayon::current_num_threads(),
        }
    }

    /// Run `f` once for every task.
    ///
    /// # Arguments
    ///
    /// * `tasks` - The units of work, consumed by the workers.
    /// * `f` - The worker function.
    ///
    /// # Returns
    ///
    /// The first error returned by a worker, if any. Once a worker failed no
    /// further tasks are started, so outputs written by the tasks are then
    /// unspecified.
    pub fn run<T, E, F>(&self, tasks: Vec<T>, f: F) -> Result<(), E>
    where
        T: Send,
        E: Send,
        F: Fn(T) -> Result<(), E> + Sync + Send,
    {
        self.run_with_init(tasks, || (), |_, task| f(task))
    }

    /// Run `f` once for every task with per-worker scratch state.
    ///
    /// `init` is called at least once per worker thread that picks up tasks;
    /// the state it returns is passed to every task that worker runs.
    ///
    /// # Arguments
    ///
    /// * `tasks` - The units of work, consumed by the workers.
    /// * `init` - Creates the scratch state of a worker.
    /// * `f` - The worker function.
    ///
    /// # Returns
    ///
    /// The first error returned by a worker, if any.
    pub fn run_with_init<T, S, E, INIT, F>(&self, tasks: Vec<T>, init: INIT, f: F) -> Result<(), E>
    where
        T: Send,
        E: Send,
        INIT: Fn() -> S + Sync + Send,
        F: Fn(&mut S, T) -> Result<(), E> + Sync + Send,
    {
        match (&self.pool, self.strategy) {
            (_, ExecutionStrategy::Serial) => {
                let mut state = init();
                tasks.into_iter().try_for_each(|task| f(&mut state, task))
            }
            (Some(pool), _) => {
                pool.install(|| tasks.into_par_iter().try_for_each_init(&init, &f))
            }
            (None, _) => tasks.into_par_iter().try_for_each_init(&init, &f),
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::Global,
            pool: None,
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("strategy", &self.strategy)
            .field("num_threads", &self.num_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn double_all(pool: &ThreadPool) -> Result<Vec<i32>, ParallelError> {
        let src = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut dst = vec![0; src.len()];
        let tasks: Vec<_> = src.chunks(3).zip(dst.chunks_mut(3)).collect();
        pool.run(tasks, |(s, d)| {
            s.iter().zip(d.iter_mut()).for_each(|(s, d)| *d = *s * 2);
            Ok::<(), ParallelError>(())
        })?;
        Ok(dst)
    }

    #[test]
    fn test_run_serial() -> Result<(), ParallelError> {
        let pool = ThreadPool::serial();
        assert_eq!(pool.num_threads(), 1);
        assert_eq!(double_all(&pool)?, vec![2, 4, 6, 8, 10, 12, 14, 16]);
        Ok(())
    }

    #[test]
    fn test_run_global() -> Result<(), ParallelError> {
        let pool = ThreadPool::new(ExecutionStrategy::Global)?;
        assert_eq!(double_all(&pool)?, vec![2, 4, 6, 8, 10, 12, 14, 16]);
        Ok(())
    }

    #[test]
    fn test_run_fixed() -> Result<(), ParallelError> {
        let pool = ThreadPool::new(ExecutionStrategy::Fixed(2))?;
        assert_eq!(pool.num_threads(), 2);
        assert_eq!(double_all(&pool)?, vec![2, 4, 6, 8, 10, 12, 14, 16]);
        Ok(())
    }

    #[test]
    fn test_fixed_zero_threads() {
        let res = ThreadPool::new(ExecutionStrategy::Fixed(0));
        assert!(matches!(res, Err(ParallelError::InvalidThreadCount(0))));
    }

    #[test]
    fn test_run_every_task_once() -> Result<(), ParallelError> {
        let pool = ThreadPool::new(ExecutionStrategy::Fixed(4))?;
        let counter = AtomicUsize::new(0);
        let inits = AtomicUsize::new(0);
        pool.run_with_init(
            (0..100).collect(),
            || {
                inits.fetch_add(1, Ordering::Relaxed);
                Vec::<usize>::new()
            },
            |scratch, task: usize| {
                scratch.push(task);
                counter.fetch_add(task, Ordering::Relaxed);
                Ok::<(), ParallelError>(())
            },
        )?;
        assert_eq!(counter.load(Ordering::Relaxed), (0..100).sum::<usize>());
        assert!(inits.load(Ordering::Relaxed) >= 1);
        Ok(())
    }

    #[test]
    fn test_run_reports_worker_failure() {
        for pool in [ThreadPool::serial(), ThreadPool::default()] {
            let res = pool.run((0..16).collect(), |task: usize| {
                if task == 7 {
                    Err(ParallelError::BuildError(format!("task {task} failed")))
                } else {
                    Ok(())
                }
            });
            assert_eq!(
                res,
                Err(ParallelError::BuildError("task 7 failed".to_string()))
            );
        }
    }
}
