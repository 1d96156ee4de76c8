//! Limit/offset pagination utilities.

use serde::Deserialize;
use thiserror::Error;

/// Error type for page parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("limit must not be negative")]
    NegativeLimit,
    #[error("offset must not be negative")]
    NegativeOffset,
}

/// Optional limit/offset window applied after ordering by primary key.
///
/// Absent values mean "no limit" and "start at the first row".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, PageError> {
        if matches!(limit, Some(l) if l < 0) {
            return Err(PageError::NegativeLimit);
        }
        if matches!(offset, Some(o) if o < 0) {
            return Err(PageError::NegativeOffset);
        }
        Ok(Self { limit, offset })
    }

    /// Number of leading rows to skip.
    pub fn skip(&self) -> usize {
        self.offset.unwrap_or(0).max(0) as usize
    }

    /// Maximum number of rows to return, `None` for unbounded.
    pub fn take(&self) -> Option<usize> {
        self.limit.map(|l| l.max(0) as usize)
    }

    /// Applies the window to rows that are already in their final order.
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        let iter = rows.into_iter().skip(self.skip());
        match self.take() {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }
}
