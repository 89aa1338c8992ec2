//! An ordered counting container: distinct keys kept in ascending order, each
//! with a strictly positive occurrence count, plus a running total.
//!
//! ```
//! use sortedcounter_core::SortedCounter;
//!
//! let mut counter = SortedCounter::from_items(vec![3, 1, 3]);
//! counter.add(2, 4).unwrap();
//! assert_eq!(counter.size(), 7);
//! assert_eq!(counter.minimum(), Ok(&1));
//! assert_eq!(counter.to_string(), "{1: 1, 2: 4, 3: 2}");
//! ```
//!
//! The `bencher` and `reporter` modules drive random workloads against the
//! counter and summarise their latencies.

pub mod bencher;
pub mod counter;
pub mod error;
pub mod reporter;

pub use counter::SortedCounter;
pub use error::{Error, Result};
