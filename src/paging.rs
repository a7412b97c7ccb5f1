//! Page arithmetic for batch queries.

use crate::error::{QueryError, QueryResult};

/// A zero-based page of `rows_per_batch` rows.
///
/// Page `n` covers rows `[n * rows_per_batch, (n + 1) * rows_per_batch)` of
/// the ordered result. Limit and offset both fit a signed 64-bit SQL integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    page: u64,
    rows_per_batch: i64,
    offset: i64,
}

impl PageSpec {
    pub fn new(page: u64, rows_per_batch: u64) -> QueryResult<Self> {
        if rows_per_batch == 0 {
            return Err(QueryError::InvalidPageArgument(
                "rows per batch must be positive".to_string(),
            ));
        }
        let overflow = || {
            QueryError::InvalidPageArgument(format!(
                "page {} of {} rows overflows the row offset",
                page, rows_per_batch
            ))
        };
        let limit = i64::try_from(rows_per_batch).map_err(|_| {
            QueryError::InvalidPageArgument(format!(
                "{} rows per batch exceeds {}",
                rows_per_batch,
                i64::MAX
            ))
        })?;
        let offset = page
            .checked_mul(rows_per_batch)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_else(overflow)?;
        Ok(Self {
            page,
            rows_per_batch: limit,
            offset,
        })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.rows_per_batch
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}
