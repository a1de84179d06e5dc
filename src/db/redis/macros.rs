/// Read-through caching around an async fetch returning `AppResult<T>`
///
/// A hit skips the fetch. On a miss the fetched value is queued for writing
/// and returned; fetch errors propagate and nothing is cached.
///
/// ```rust,ignore
/// cached!(cache, CacheKey::MovieDetails(603), 86400, self.fetch_details(603))
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $fetch:expr) => {{
        let key = $key;
        match $cache.get_json(&key).await {
            Some(hit) => Ok(hit),
            None => {
                let value = $fetch.await?;
                $cache.put_json(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
