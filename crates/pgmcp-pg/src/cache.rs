//! Schema cache with single-flight refresh.
//!
//! The cache holds one schema summary with an expiry instant. Readers take a
//! shared lock for the fast path; a stale entry is refreshed under the
//! exclusive lock with a second staleness check, so any number of concurrent
//! readers straddling expiry issue exactly one catalog query. The exclusive
//! latch is the only lock in the gateway held across a suspension point, and
//! only for the duration of a single catalog load.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::IntrospectError;

/// Provider of the raw schema summary text. The live implementation is
/// [`crate::introspect::PgSchemaSource`].
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load(&self) -> Result<String, IntrospectError>;
}

struct Entry {
    summary: String,
    expires_at: Instant,
}

/// Time-bounded memoization of the schema summary.
pub struct SchemaCache {
    ttl: Duration,
    max_chars: usize,
    state: RwLock<Option<Entry>>,
}

impl SchemaCache {
    pub fn new(ttl: Duration, max_chars: usize) -> Self {
        Self {
            ttl,
            max_chars,
            state: RwLock::new(None),
        }
    }

    /// Return the cached summary, refreshing it through `source` when stale.
    ///
    /// After the first successful load this never returns an empty string:
    /// truncation happens here, preserving whole lines when possible.
    pub async fn get(&self, source: &dyn SchemaSource) -> Result<String, IntrospectError> {
        {
            let guard = self.state.read().await;
            if let Some(entry) = guard.as_ref() {
                if Instant::now() < entry.expires_at && !entry.summary.is_empty() {
                    return Ok(entry.summary.clone());
                }
            }
        }

        let mut guard = self.state.write().await;
        // Another task may have refreshed while we waited for the latch.
        if let Some(entry) = guard.as_ref() {
            if Instant::now() < entry.expires_at && !entry.summary.is_empty() {
                return Ok(entry.summary.clone());
            }
        }

        let raw = source.load().await?;
        let summary = truncate_summary(&raw, self.max_chars);
        *guard = Some(Entry {
            summary: summary.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(summary)
    }
}

/// Truncate a summary to `max_chars`, cutting at the last whole line when one
/// fits, and append the truncation marker.
fn truncate_summary(txt: &str, max_chars: usize) -> String {
    if txt.len() <= max_chars {
        return txt.to_string();
    }

    let mut cut = max_chars;
    while !txt.is_char_boundary(cut) {
        cut -= 1;
    }
    if let Some(nl) = txt[..cut].rfind('\n') {
        cut = nl;
    }

    format!("{}\n-- ...truncated schema...", &txt[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        loads: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaSource for CountingSource {
        async fn load(&self) -> Result<String, IntrospectError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            // Simulate catalog latency so concurrent readers pile up on the
            // refresh latch.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                Err(IntrospectError::Db(sqlx::Error::PoolClosed))
            } else {
                Ok("TABLE public.users(id integer PRIMARY KEY)\n".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_reload() {
        let cache = SchemaCache::new(Duration::from_secs(60), 18_000);
        let source = CountingSource::new();

        let first = cache.get(&source).await.unwrap();
        let second = cache.get(&source).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_expiry_single_flight() {
        let cache = Arc::new(SchemaCache::new(Duration::from_secs(60), 18_000));
        let source = Arc::new(CountingSource::new());

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            let source = source.clone();
            tasks.push(tokio::spawn(async move {
                cache.get(source.as_ref()).await.unwrap()
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        assert_eq!(source.count(), 1, "expected exactly one catalog query");
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_refresh_error_propagates_and_nothing_is_cached() {
        let cache = SchemaCache::new(Duration::from_secs(60), 18_000);
        let failing = CountingSource::failing();

        assert!(cache.get(&failing).await.is_err());

        // A later call with a healthy source succeeds; the failed refresh
        // left no entry behind.
        let healthy = CountingSource::new();
        let summary = cache.get(&healthy).await.unwrap();
        assert!(!summary.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_refreshed() {
        let cache = SchemaCache::new(Duration::from_millis(10), 18_000);
        let source = CountingSource::new();

        cache.get(&source).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.get(&source).await.unwrap();

        assert_eq!(source.count(), 2);
    }

    #[test]
    fn test_truncation_preserves_whole_lines() {
        let txt = "TABLE a(x int)\nTABLE b(y int)\nTABLE c(z int)\n";
        let truncated = truncate_summary(txt, 20);

        assert!(truncated.starts_with("TABLE a(x int)"));
        assert!(truncated.ends_with("-- ...truncated schema..."));
        assert!(!truncated.contains("TABLE c"));
    }

    #[test]
    fn test_no_truncation_under_budget() {
        let txt = "TABLE a(x int)\n";
        assert_eq!(truncate_summary(txt, 18_000), txt);
    }
}
