use thiserror::Error;

/// Failures surfaced by [`SortedCounter`](crate::SortedCounter) operations.
///
/// Every failing operation leaves the counter exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An add/remove multiplicity was zero or negative.
    #[error("cannot {op} a non-positive number of occurrences (got {times})")]
    InvalidArgument { op: &'static str, times: i64 },

    /// A count supplied for construction from a key/count mapping was zero or negative.
    #[error("the count must be > 0 (got {count})")]
    InvalidCount { count: i64 },

    #[error("key not present in the counter")]
    KeyNotFound,

    #[error("container is empty")]
    EmptyContainer,

    /// The running total would no longer fit in a `u64`.
    #[error("total occurrence count overflowed")]
    CountOverflow,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_add(times: i64) -> Self {
        Error::InvalidArgument { op: "add", times }
    }

    pub(crate) fn invalid_remove(times: i64) -> Self {
        Error::InvalidArgument { op: "remove", times }
    }
}
