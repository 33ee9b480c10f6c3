//! Cursor query builder.
//!
//! [`SampleQuery`] selects samples strictly after a cursor id, oldest first.
//! Feeding the id of the last returned sample back in as the next cursor
//! walks a channel without gaps or duplicates.
//!
//! # Example
//!
//! ```
//! use eegstream_store::{SampleQuery, Store};
//! use eegstream_types::ChannelId;
//!
//! let dir = tempfile::tempdir()?;
//! let store = Store::open(dir.path().join("eeg.db"))?;
//!
//! let mut cursor = 0;
//! loop {
//!     let page = store.query_samples(
//!         &SampleQuery::new().channel(ChannelId::a3()).since_id(cursor).limit(100),
//!     )?;
//!     match page.last() {
//!         Some(last) => cursor = last.id,
//!         None => break,
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use eegstream_types::ChannelId;

/// Fluent query builder for the sample log.
///
/// Use this to construct queries for
/// [`Store::query_samples`](crate::Store::query_samples). Results are ordered
/// by ascending id unless [`newest_first`](Self::newest_first) is set.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SampleQuery {
    /// Filter by channel. `None` selects every channel.
    pub channel: Option<ChannelId>,
    /// Only samples with `id > since_id`.
    pub since_id: i64,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Order by descending id, so a limit keeps the most recent samples.
    pub newest_first: bool,
}

impl SampleQuery {
    /// Create a query over every channel from the start of the log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only include samples from the specified channel.
    pub fn channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Only include samples with an id strictly greater than `id`.
    pub fn since_id(mut self, id: i64) -> Self {
        self.since_id = id;
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return the most recent samples first.
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Build the SQL statement for this query.
    ///
    /// Parameters are bound positionally in the order returned by
    /// [`build_params`](Self::build_params).
    pub(crate) fn build_sql(&self) -> String {
        let mut sql = String::from("SELECT id, ts, channel, value FROM eeg_samples WHERE id > ?");
        if self.channel.is_some() {
            sql.push_str(" AND channel = ?");
        }
        sql.push_str(if self.newest_first {
            " ORDER BY id DESC"
        } else {
            " ORDER BY id ASC"
        });
        if self.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }
        sql
    }

    /// Build the positional parameters for [`build_sql`](Self::build_sql).
    pub(crate) fn build_params(&self) -> Vec<Box<dyn rusqlite::ToSql>> {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.since_id)];
        if let Some(ref channel) = self.channel {
            params.push(Box::new(channel.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(Box::new(limit));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query() {
        let query = SampleQuery::new();
        assert_eq!(query.channel, None);
        assert_eq!(query.since_id, 0);
        assert_eq!(query.limit, None);
        assert!(!query.newest_first);
        assert_eq!(
            query.build_sql(),
            "SELECT id, ts, channel, value FROM eeg_samples WHERE id > ? ORDER BY id ASC"
        );
        assert_eq!(query.build_params().len(), 1);
    }

    #[test]
    fn test_full_query() {
        let query = SampleQuery::new()
            .channel(ChannelId::a4())
            .since_id(17)
            .limit(5);
        assert_eq!(query.channel, Some(ChannelId::a4()));
        assert_eq!(query.since_id, 17);
        assert_eq!(query.limit, Some(5));

        let sql = query.build_sql();
        assert!(sql.contains("AND channel = ?"));
        assert!(sql.ends_with("ORDER BY id ASC LIMIT ?"));
        assert_eq!(query.build_params().len(), 3);
    }

    #[test]
    fn test_newest_first_query() {
        let query = SampleQuery::new()
            .channel(ChannelId::a3())
            .limit(100)
            .newest_first();
        assert!(query.newest_first);
        assert_eq!(
            query.build_sql(),
            "SELECT id, ts, channel, value FROM eeg_samples WHERE id > ? AND channel = ? \
             ORDER BY id DESC LIMIT ?"
        );
        assert_eq!(query.build_params().len(), 3);
    }
}
