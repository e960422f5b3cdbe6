//! Worker pool sizing and the bounded conversion pool.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::Semaphore;

const GIB: u64 = 1024 * 1024 * 1024;

/// Hard cap on concurrent converter processes
pub const MAX_WORKERS: usize = 8;

/// Memory use (percent) above which a batch waits before starting
pub const MEMORY_PRESSURE_PERCENT: f64 = 90.0;

/// How long a batch waits under memory pressure
pub const MEMORY_PRESSURE_PAUSE: Duration = Duration::from_secs(10);

/// Worker count for `file_count` documents on a host with `cpus` cores and
/// `total_memory` bytes of RAM.
///
/// Leaves one core free, scales down on small-memory hosts, never uses more
/// than one worker per two files and never more than [`MAX_WORKERS`].
pub fn optimal_worker_count(cpus: usize, total_memory: u64, file_count: usize) -> usize {
    let base_workers = cpus.saturating_sub(1).max(1);

    let memory_factor = if total_memory < 8 * GIB {
        0.5
    } else if total_memory < 16 * GIB {
        0.75
    } else {
        1.0
    };

    let file_limit = (file_count / 2).max(1);
    let memory_limit = (base_workers as f64 * memory_factor) as usize;

    base_workers
        .min(file_limit)
        .min(memory_limit)
        .max(1)
        .min(MAX_WORKERS)
}

/// Documents per batch: smaller on small-memory hosts and with more workers
pub fn optimal_batch_size(total_memory: u64, workers: usize) -> usize {
    let base_batch = if total_memory < 8 * GIB {
        5.0
    } else if total_memory < 16 * GIB {
        10.0
    } else {
        20.0
    };

    let adjusted = (base_batch * (4.0 / workers.max(1) as f64)) as usize;
    adjusted.max(5)
}

/// Point-in-time view of host resources
#[derive(Debug, Clone, Copy)]
pub struct SystemResources {
    pub cpus: usize,
    pub total_memory: u64,
    pub used_memory: u64,
}

impl SystemResources {
    pub fn snapshot() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            cpus: num_cpus::get(),
            total_memory: system.total_memory(),
            used_memory: system.used_memory(),
        }
    }

    pub fn memory_percent(&self) -> f64 {
        if self.total_memory == 0 {
            return 0.0;
        }
        self.used_memory as f64 / self.total_memory as f64 * 100.0
    }

    pub fn under_pressure(&self) -> bool {
        self.memory_percent() > MEMORY_PRESSURE_PERCENT
    }
}

/// Pause once if the host is short on memory
pub async fn wait_for_memory() {
    let resources = SystemResources::snapshot();
    if resources.under_pressure() {
        tracing::warn!(
            "[Pool] memory at {:.1}%, pausing {}s before next batch",
            resources.memory_percent(),
            MEMORY_PRESSURE_PAUSE.as_secs()
        );
        tokio::time::sleep(MEMORY_PRESSURE_PAUSE).await;
    }
}

/// Run `job` over every item on blocking threads, at most `workers` at once.
///
/// Results come back in input order. A job that panics yields `None` in its
/// slot.
pub async fn run_blocking_pool<I, T, F>(items: Vec<I>, workers: usize, job: Arc<F>) -> Vec<Option<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> T + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let total = items.len();
    let mut futures = FuturesUnordered::new();

    for (index, item) in items.into_iter().enumerate() {
        let sem = Arc::clone(&semaphore);
        let job = Arc::clone(&job);

        futures.push(async move {
            // The semaphore is never closed while the pool runs
            let _permit = sem.acquire_owned().await.ok();
            let result = tokio::task::spawn_blocking(move || job(item)).await;
            (index, result)
        });
    }

    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut completed = 0;

    while let Some((index, result)) = futures.next().await {
        match result {
            Ok(value) => results[index] = Some(value),
            Err(e) => tracing::error!("[Pool] worker task failed: {}", e),
        }
        completed += 1;
        tracing::debug!("[Pool] progress: {}/{}", completed, total);
    }

    results
}
