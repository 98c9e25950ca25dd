use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Maximum number of worker threads (0 = auto-detect)
    pub max_threads: usize,
    /// Percentage of CPU cores to use when auto-detecting (1-100)
    pub thread_percentage: u8,
    /// Channel buffer size multiplier (buffer = workers * multiplier)
    pub channel_buffer_multiplier: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            thread_percentage: 75,
            channel_buffer_multiplier: 2,
        }
    }
}

impl ParallelConfig {
    pub fn with_max_threads(max_threads: usize) -> Self {
        Self {
            max_threads,
            ..Self::default()
        }
    }
}

/// Bounded worker pool over crossbeam channels
///
/// Workers share nothing but the input channel and the result channel;
/// results are handed back in input order whatever order they complete in.
pub struct ParallelProcessor {
    config: ParallelConfig,
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    /// Calculate optimal number of worker threads
    pub fn calculate_optimal_workers(&self, work_count: usize) -> usize {
        let max_workers = if self.config.max_threads > 0 {
            self.config.max_threads
        } else {
            let cpu_cores = num_cpus::get();
            std::cmp::max(1, (cpu_cores * self.config.thread_percentage as usize) / 100)
        };

        // Don't create more workers than work items
        std::cmp::min(max_workers, work_count.max(1))
    }

    /// Process work items on the pool
    ///
    /// `worker_fn` receives the item's index in `work_items` and the item.
    /// Returns one result per item, in original order.
    pub fn process<T, R, F>(&self, work_items: Vec<T>, worker_fn: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(usize, T) -> R + Send + Sync,
    {
        let work_count = work_items.len();
        if work_count == 0 {
            return Ok(Vec::new());
        }

        let workers = self.calculate_optimal_workers(work_count);
        let buffer = workers * self.config.channel_buffer_multiplier.max(1);

        let (work_tx, work_rx): (Sender<(usize, T)>, Receiver<(usize, T)>) = bounded(buffer);
        let (result_tx, result_rx): (Sender<(usize, R)>, Receiver<(usize, R)>) = bounded(buffer * 2);

        let completed = AtomicUsize::new(0);
        let worker_fn = &worker_fn;
        let completed = &completed;

        let indexed_results = crossbeam::thread::scope(|s| {
            for worker_id in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();

                s.spawn(move |_| {
                    while let Ok((index, work_item)) = work_rx.recv() {
                        let result = worker_fn(index, work_item);
                        if result_tx.send((index, result)).is_err() {
                            break; // Receiver dropped
                        }
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::trace!("worker-{worker_id} finished item {index} ({done}/{work_count})");
                    }
                });
            }

            // Producer: feed the bounded work channel
            s.spawn(move |_| {
                for item in work_items.into_iter().enumerate() {
                    if work_tx.send(item).is_err() {
                        break; // Workers dropped
                    }
                }
            });

            // Drop our copies so the channels close once the threads finish
            drop(work_rx);
            drop(result_tx);

            collect_results(result_rx, work_count)
        })
        .map_err(|_| anyhow::anyhow!("Thread panic occurred during parallel processing"))?;

        let mut sorted = indexed_results;
        sorted.sort_by_key(|(index, _)| *index);
        Ok(sorted.into_iter().map(|(_, result)| result).collect())
    }
}

/// Collect results from workers
fn collect_results<R>(result_rx: Receiver<(usize, R)>, total_work: usize) -> Vec<(usize, R)> {
    let mut results = Vec::with_capacity(total_work);
    while let Ok(result) = result_rx.recv() {
        results.push(result);
        if results.len() >= total_work {
            break;
        }
    }
    results
}
