use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use tokio::sync::{mpsc, oneshot};

/// Writes queued beyond this are dropped rather than slowing requests down
const WRITE_QUEUE_CAPACITY: usize = 1024;

/// What a cached TMDB response is stored under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    MovieSearch { query: String, page: u32 },
    MovieDetails(i64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::MovieSearch { query, page } => {
                write!(f, "tmdb:search:{}:{}", query.trim().to_lowercase(), page)
            }
            CacheKey::MovieDetails(tmdb_id) => write!(f, "tmdb:movie:{}", tmdb_id),
        }
    }
}

/// Opens a reconnecting Redis connection
pub async fn connect(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    Ok(ConnectionManager::new(client).await?)
}

struct PendingWrite {
    key: String,
    json: String,
    ttl_secs: u64,
}

/// Read-through cache for TMDB responses
///
/// Redis is an optimization only: failed reads count as misses and writes
/// happen on a background task.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    writes: mpsc::Sender<PendingWrite>,
}

/// Stops the writer task after flushing queued writes
pub struct CacheWriterHandle {
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    pub fn new(conn: ConnectionManager) -> (Self, CacheWriterHandle) {
        let (writes, queue) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(run_writer(conn.clone(), queue, stopped));

        (Self { conn, writes }, CacheWriterHandle { stop, task })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(key.to_string()).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(value) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    /// Queues a write and returns immediately
    pub fn put_json<T: Serialize>(&self, key: &CacheKey, value: &T, ttl_secs: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache serialization failed");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            json,
            ttl_secs,
        };
        if let Err(e) = self.writes.try_send(write) {
            tracing::warn!(key = %key, error = %e, "Dropping cache write");
        }
    }
}

async fn store(conn: &mut ConnectionManager, write: PendingWrite) {
    let result: redis::RedisResult<()> = conn.set_ex(&write.key, write.json, write.ttl_secs).await;
    if let Err(e) = result {
        tracing::error!(key = %write.key, error = %e, "Cache write failed");
    }
}

async fn run_writer(
    mut conn: ConnectionManager,
    mut queue: mpsc::Receiver<PendingWrite>,
    mut stopped: oneshot::Receiver<()>,
) {
    tracing::info!("Cache writer started");
    loop {
        tokio::select! {
            next = queue.recv() => match next {
                Some(write) => store(&mut conn, write).await,
                None => break,
            },
            _ = &mut stopped => {
                let mut flushed = 0;
                while let Ok(write) = queue.try_recv() {
                    store(&mut conn, write).await;
                    flushed += 1;
                }
                tracing::info!(flushed, "Cache writer flushed pending writes");
                break;
            }
        }
    }
    tracing::info!("Cache writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_normalizes_query() {
        let key = CacheKey::MovieSearch {
            query: "  The Matrix ".to_string(),
            page: 2,
        };
        assert_eq!(key.to_string(), "tmdb:search:the matrix:2");
    }

    #[test]
    fn test_details_key() {
        assert_eq!(CacheKey::MovieDetails(27205).to_string(), "tmdb:movie:27205");
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_queued_write_flushed_on_shutdown() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let conn = connect(&redis_url).await.unwrap();
        let (cache, handle) = Cache::new(conn.clone());

        let key = CacheKey::MovieDetails(-1);
        assert_eq!(cache.get_json::<Vec<String>>(&key).await, None);

        let value = vec!["Inception".to_string()];
        cache.put_json(&key, &value, 60);
        handle.shutdown().await;

        assert_eq!(cache.get_json::<Vec<String>>(&key).await, Some(value));

        let mut conn = conn;
        let _: () = conn.del(key.to_string()).await.unwrap();
    }
}
