//! A small abstraction over bounded-parallelism execution, used by the scanner and
//! the metadata reader for batched I/O. Mirrors a single-threaded fallback so the
//! rest of the crate doesn't need to special-case "no threads available".

mod cancellation;

pub use cancellation::{Cancelled, CancellationToken};

/// A pool with a fixed degree of parallelism.
///
/// Degree defaults to `cores * 4`, matching the I/O-bound (not CPU-bound) nature of
/// the batched work this pool is used for: metadata reads and directory scans spend
/// most of their time waiting on the filesystem, so oversubscribing cores is
/// deliberate, not a bug.
#[derive(Clone)]
pub struct BoundedPool(BoundedPoolImpl);

#[derive(Clone)]
enum BoundedPoolImpl {
    #[cfg(feature = "rayon")]
    Rayon(std::sync::Arc<rayon_core::ThreadPool>),
    Inline,
}

impl std::fmt::Debug for BoundedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            #[cfg(feature = "rayon")]
            BoundedPoolImpl::Rayon(pool) => f
                .debug_struct("BoundedPool")
                .field("degree", &pool.current_num_threads())
                .finish(),
            BoundedPoolImpl::Inline => f.debug_struct("BoundedPool").field("degree", &1).finish(),
        }
    }
}

impl BoundedPool {
    /// Builds a pool with the given degree of parallelism. `degree == 0` or `1`
    /// runs everything inline on the calling thread.
    pub fn with_degree(degree: usize) -> Self {
        if degree <= 1 {
            return Self::inline();
        }

        #[cfg(feature = "rayon")]
        {
            match rayon_core::ThreadPoolBuilder::new()
                .num_threads(degree)
                .build()
            {
                Ok(pool) => {
                    tracing::debug!(degree, "initialized bounded thread pool");
                    return Self(BoundedPoolImpl::Rayon(std::sync::Arc::new(pool)));
                }
                Err(e) => {
                    tracing::warn!(%e, "failed to build thread pool, falling back to inline execution");
                }
            }
        }

        Self::inline()
    }

    /// The default degree for I/O-bound batch work: `cores * 4`, capped at a sane
    /// floor of 4 so single-core environments still get some overlap between I/O
    /// waits.
    pub fn default_degree() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cores * 4).max(4)
    }

    pub fn with_default_degree() -> Self {
        Self::with_degree(Self::default_degree())
    }

    pub const fn inline() -> Self {
        Self(BoundedPoolImpl::Inline)
    }

    pub fn is_parallel(&self) -> bool {
        match self.0 {
            #[cfg(feature = "rayon")]
            BoundedPoolImpl::Rayon(_) => true,
            BoundedPoolImpl::Inline => false,
        }
    }

    /// Runs `f` over every item in `items`, preserving input order in the output.
    /// Cheap items and expensive items are fine to mix — this is a work-stealing
    /// pool, not a fixed partition.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        match &self.0 {
            #[cfg(feature = "rayon")]
            BoundedPoolImpl::Rayon(pool) => {
                use rayon::prelude::*;
                pool.install(|| items.into_par_iter().map(f).collect())
            }
            BoundedPoolImpl::Inline => items.into_iter().map(f).collect(),
        }
    }
}

impl Default for BoundedPool {
    fn default() -> Self {
        Self::with_default_degree()
    }
}
