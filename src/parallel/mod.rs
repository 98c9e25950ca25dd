//! Generic parallel execution framework
//!
//! Focuses on execution strategy only: how many workers, how work is handed
//! out, and how results come back. It knows nothing about applications or
//! reports; the pipeline decides what a work item is.
//!
//! ```rust
//! use iqfetch::parallel::{ParallelConfig, ParallelProcessor};
//!
//! let processor = ParallelProcessor::new(ParallelConfig::with_max_threads(4));
//! let doubled = processor.process(vec![1, 2, 3], |_, x| x * 2).unwrap();
//! assert_eq!(doubled, vec![2, 4, 6]);
//! ```

pub mod processor;

pub use processor::{ParallelConfig, ParallelProcessor};
