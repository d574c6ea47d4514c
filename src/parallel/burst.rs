//! Burst Executor
//!
//! Submit many independent jobs, then block until all of them finish.
//!
//! ```text
//! let mut burst = pool.burst(regions.len());
//! for region in regions {
//!     burst.queue(move || save(region));
//! }
//! burst.complete();
//! ```
//!
//! With multicore disabled every queued job runs inline on the calling
//! thread at `queue` time and `complete` has nothing left to do.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{MantleError, Result};

type Job<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Shared worker pool with a single-core switch
pub struct MultiBurst {
    pool: ThreadPool,
    multicore: AtomicBool,
}

impl MultiBurst {
    /// Build a pool with `threads` workers (0 = one per CPU)
    pub fn new(threads: usize, multicore: bool) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mantle-io-{}", i))
            .build()
            .map_err(|e| MantleError::ThreadPool(e.to_string()))?;

        tracing::debug!(
            "Burst pool ready: {} threads, multicore={}",
            pool.current_num_threads(),
            multicore
        );

        Ok(Self {
            pool,
            multicore: AtomicBool::new(multicore),
        })
    }

    pub fn is_multicore(&self) -> bool {
        self.multicore.load(Ordering::Relaxed)
    }

    /// Toggle parallel dispatch; off forces synchronous execution
    pub fn set_multicore(&self, multicore: bool) {
        self.multicore.store(multicore, Ordering::Relaxed);
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Start a batch sized for roughly `estimate` jobs
    pub fn burst(&self, estimate: usize) -> BurstExecutor<'_> {
        BurstExecutor {
            owner: self,
            multicore: self.is_multicore(),
            jobs: Vec::with_capacity(estimate),
        }
    }
}

impl std::fmt::Debug for MultiBurst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiBurst")
            .field("threads", &self.threads())
            .field("multicore", &self.is_multicore())
            .finish()
    }
}

/// One batch of jobs. Jobs may borrow from the caller's stack frame.
#[must_use = "queued jobs only run once the burst is completed"]
pub struct BurstExecutor<'a> {
    owner: &'a MultiBurst,
    multicore: bool,
    jobs: Vec<Job<'a>>,
}

impl<'a> BurstExecutor<'a> {
    pub fn queue(&mut self, job: impl FnOnce() + Send + 'a) -> &mut Self {
        if self.multicore {
            self.jobs.push(Box::new(job));
        } else {
            job();
        }
        self
    }

    pub fn queue_all<I, F>(&mut self, jobs: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() + Send + 'a,
    {
        for job in jobs {
            self.queue(job);
        }
        self
    }

    /// Jobs waiting for [`BurstExecutor::complete`]
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Run every pending job and wait for all of them
    pub fn complete(self) {
        if self.jobs.is_empty() {
            return;
        }

        let jobs = self.jobs;
        self.owner.pool.scope(move |scope| {
            for job in jobs {
                scope.spawn(move |_| job());
            }
        });
    }
}
