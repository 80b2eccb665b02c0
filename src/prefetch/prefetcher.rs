//! Resource prefetcher
//!
//! Issues low-priority GETs against one configured origin and writes
//! successful responses into the shared cache. Network I/O happens without
//! holding the cache lock; results are written afterwards in one short
//! critical section.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::cache::{Payload, SharedCache};
use crate::prefetch::{
    is_valid_card_id, PrefetchError, PrefetchOptions, PrefetchOutcome, Priority, AUDIO_TTL_MS,
    DOCUMENT_TTL_MS,
};

/// The card prefetch currently allowed to run.
#[derive(Debug)]
struct InFlight {
    generation: u64,
    card_id: String,
    cancel: oneshot::Sender<()>,
}

// == Prefetcher ==
/// Fetches resources ahead of use and caches them.
///
/// At most one card prefetch is in flight: starting another cancels it.
#[derive(Debug)]
pub struct Prefetcher {
    client: Client,
    cache: SharedCache,
    base_url: Url,
    /// Response bodies larger than this are abandoned mid-read
    max_body_bytes: usize,
    generation: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
    /// Card ids being prefetched, with the generation that queued them
    queued: Mutex<HashMap<String, u64>>,
}

impl Prefetcher {
    /// Creates a prefetcher whose requests time out after `timeout`.
    ///
    /// Every target is resolved against `base_url`; card resources live at
    /// `<base>/api/insight/<id>` and `<base>/audio/<id>.mp3`.
    ///
    /// # Errors
    /// `BaseUrl` when `base_url` is not an absolute http(s) URL, `Request`
    /// when the HTTP client cannot be built.
    pub fn new(cache: SharedCache, base_url: &str, timeout: Duration) -> Result<Self, PrefetchError> {
        let base_url = parse_base_url(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, cache, base_url))
    }

    /// Creates a prefetcher around an existing HTTP client.
    pub fn with_client(client: Client, cache: SharedCache, base_url: Url) -> Self {
        Self {
            client,
            cache,
            base_url,
            max_body_bytes: usize::MAX,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            queued: Mutex::new(HashMap::new()),
        }
    }

    /// Caps how many body bytes a single response may deliver.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Resolves `target` (absolute, or relative to the base URL) and returns
    /// it only when it stays on the configured origin.
    pub fn resolve(&self, target: &str) -> Option<Url> {
        self.base_url
            .join(target)
            .ok()
            .filter(|url| url.origin() == self.base_url.origin())
    }

    // == Prefetch ==
    /// Fetches a JSON document and caches it under `url`.
    ///
    /// Stored with `options.expiry_ms` or a 24 hour TTL. Targets off the
    /// configured origin are never requested. Any failure leaves the cache
    /// untouched.
    pub async fn prefetch(&self, url: &str, options: &PrefetchOptions) -> PrefetchOutcome {
        let result = match self.resolve(url) {
            Some(target) => self.fetch_json(target, options.priority).await,
            None => Err(PrefetchError::Forbidden(url.to_string())),
        };

        match result {
            Ok(document) => {
                let ttl_ms = options.expiry_ms.unwrap_or(DOCUMENT_TTL_MS);
                self.cache.write().await.set(url, Payload::Json(document), ttl_ms);
                debug!("Prefetched {}", url);
                PrefetchOutcome::Stored
            }
            Err(err @ PrefetchError::Forbidden(_)) => {
                warn!("Prefetch rejected: {}", err);
                PrefetchOutcome::Failed
            }
            Err(err) => {
                debug!("Prefetch of {} failed: {}", url, err);
                PrefetchOutcome::Failed
            }
        }
    }

    // == Prefetch Card ==
    /// Fetches a card's insight document and audio clip concurrently.
    ///
    /// The insight is cached as `insight-<id>` (24 h default TTL) and the audio
    /// as `audio-<id>` (7 day default TTL); each is stored independently when
    /// its response succeeds. A card already queued is skipped. Any other card
    /// prefetch still running is cancelled first. Ids that are not a single
    /// safe path segment fail without any request.
    pub async fn prefetch_card(&self, card_id: &str, options: &PrefetchOptions) -> PrefetchOutcome {
        if !is_valid_card_id(card_id) {
            warn!("Prefetch rejected: invalid card id {:?}", card_id);
            return PrefetchOutcome::Failed;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut queued = self.queued.lock().await;
            if queued.contains_key(card_id) {
                debug!("Card {} is already being prefetched", card_id);
                return PrefetchOutcome::Skipped;
            }
            queued.insert(card_id.to_string(), generation);
        }

        let (cancel, cancelled) = oneshot::channel();
        let previous = self.in_flight.lock().await.replace(InFlight {
            generation,
            card_id: card_id.to_string(),
            cancel,
        });
        if let Some(previous) = previous {
            debug!("Cancelling prefetch of card {}", previous.card_id);
            let _ = previous.cancel.send(());
        }

        let insight_path = format!("api/insight/{}", card_id);
        let audio_path = format!("audio/{}.mp3", card_id);

        let outcome = tokio::select! {
            // A send or a dropped sender both mean this prefetch was superseded
            _ = cancelled => {
                debug!("Prefetch of card {} cancelled", card_id);
                PrefetchOutcome::Cancelled
            }
            (insight, audio) = async {
                tokio::join!(
                    self.fetch_card_json(&insight_path, options.priority),
                    self.fetch_card_bytes(&audio_path, options.priority),
                )
            } => self.store_card(card_id, insight, audio, options).await,
        };

        self.release(card_id, generation).await;
        outcome
    }

    /// Cancels the in-flight card prefetch, if any, and clears the queue.
    pub async fn abort_prefetch(&self) {
        if let Some(in_flight) = self.in_flight.lock().await.take() {
            debug!("Aborting prefetch of card {}", in_flight.card_id);
            let _ = in_flight.cancel.send(());
        }
        self.queued.lock().await.clear();
    }

    /// Number of card prefetches currently queued.
    pub async fn queued_len(&self) -> usize {
        self.queued.lock().await.len()
    }

    async fn store_card(
        &self,
        card_id: &str,
        insight: Result<Value, PrefetchError>,
        audio: Result<Vec<u8>, PrefetchError>,
        options: &PrefetchOptions,
    ) -> PrefetchOutcome {
        let mut stored = 0;
        let mut cache = self.cache.write().await;

        match insight {
            Ok(document) => {
                let ttl_ms = options.expiry_ms.unwrap_or(DOCUMENT_TTL_MS);
                cache.set(format!("insight-{}", card_id), Payload::Json(document), ttl_ms);
                stored += 1;
            }
            Err(err) => debug!("Insight prefetch for card {} failed: {}", card_id, err),
        }

        match audio {
            Ok(bytes) => {
                let ttl_ms = options.expiry_ms.unwrap_or(AUDIO_TTL_MS);
                cache.set(format!("audio-{}", card_id), Payload::from(bytes), ttl_ms);
                stored += 1;
            }
            Err(err) => debug!("Audio prefetch for card {} failed: {}", card_id, err),
        }

        match stored {
            2 => PrefetchOutcome::Stored,
            1 => PrefetchOutcome::Partial,
            _ => PrefetchOutcome::Failed,
        }
    }

    /// Frees the queue entry and in-flight slot unless a newer prefetch owns them.
    async fn release(&self, card_id: &str, generation: u64) {
        {
            let mut slot = self.in_flight.lock().await;
            if slot.as_ref().is_some_and(|f| f.generation == generation) {
                *slot = None;
            }
        }

        let mut queued = self.queued.lock().await;
        if queued.get(card_id) == Some(&generation) {
            queued.remove(card_id);
        }
    }

    async fn fetch_card_json(&self, path: &str, priority: Priority) -> Result<Value, PrefetchError> {
        let target = self.card_url(path)?;
        self.fetch_json(target, priority).await
    }

    async fn fetch_card_bytes(&self, path: &str, priority: Priority) -> Result<Vec<u8>, PrefetchError> {
        let target = self.card_url(path)?;
        self.fetch(target, priority).await
    }

    /// Card resources sit directly under the base path.
    fn card_url(&self, path: &str) -> Result<Url, PrefetchError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let directory = format!("{}/", base.path());
            base.set_path(&directory);
        }
        base.join(path)
            .ok()
            .filter(|url| url.origin() == self.base_url.origin())
            .ok_or_else(|| PrefetchError::Forbidden(path.to_string()))
    }

    async fn fetch(&self, url: Url, priority: Priority) -> Result<Vec<u8>, PrefetchError> {
        let mut response = self
            .client
            .get(url)
            .header("Purpose", "prefetch")
            .header("Priority", priority.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PrefetchError::Status(status));
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(PrefetchError::TooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(PrefetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn fetch_json(&self, url: Url, priority: Priority) -> Result<Value, PrefetchError> {
        let body = self.fetch(url, priority).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Parses the configured origin, accepting only absolute http(s) URLs.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, PrefetchError> {
    let url = Url::parse(base_url).map_err(|err| PrefetchError::BaseUrl(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PrefetchError::BaseUrl(format!("unsupported scheme {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    const SLOW_CARD: &str = "slow";

    #[derive(Clone, Default)]
    struct Upstream {
        hits: Arc<AtomicUsize>,
    }

    fn requires_prefetch_purpose(headers: &HeaderMap) -> bool {
        headers.get("purpose").and_then(|v| v.to_str().ok()) == Some("prefetch")
    }

    async fn insight(
        State(upstream): State<Upstream>,
        Path(id): Path<String>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        if !requires_prefetch_purpose(&headers) {
            return StatusCode::BAD_REQUEST.into_response();
        }
        match id.as_str() {
            SLOW_CARD => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({ "insight": "late" })).into_response()
            }
            "missing" => StatusCode::NOT_FOUND.into_response(),
            "garbled" => "not json".into_response(),
            _ => Json(json!({ "pointId": id, "insight": format!("Insight for {}", id) }))
                .into_response(),
        }
    }

    async fn audio(
        State(upstream): State<Upstream>,
        Path(file): Path<String>,
    ) -> impl IntoResponse {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        match file.as_str() {
            "missing.mp3" | "garbled.mp3" | "silent.mp3" => StatusCode::NOT_FOUND.into_response(),
            _ => vec![0xFFu8, 0xFB, 0x90, 0x64].into_response(),
        }
    }

    async fn secret(State(upstream): State<Upstream>) -> impl IntoResponse {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({ "secret": "token-123" }))
    }

    async fn spawn_upstream() -> (String, Upstream) {
        let upstream = Upstream::default();
        let router = Router::new()
            .route("/api/insight/:id", get(insight))
            .route("/audio/:file", get(audio))
            .route("/internal/secret", get(secret))
            .with_state(upstream.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (format!("http://{}", addr), upstream)
    }

    fn shared_cache() -> SharedCache {
        Arc::new(RwLock::new(CacheStore::default()))
    }

    #[tokio::test]
    async fn test_prefetch_stores_json_under_url() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();
        let url = format!("{}/api/insight/LI4", base);

        let outcome = prefetcher.prefetch(&url, &PrefetchOptions::default()).await;

        assert_eq!(outcome, PrefetchOutcome::Stored);
        let cached = cache.write().await.get(&url);
        assert_eq!(
            cached,
            Some(Payload::Json(json!({ "pointId": "LI4", "insight": "Insight for LI4" })))
        );
    }

    #[tokio::test]
    async fn test_prefetch_failures_are_swallowed() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();
        let options = PrefetchOptions::default();

        let not_found = format!("{}/api/insight/missing", base);
        let garbled = format!("{}/api/insight/garbled", base);

        assert_eq!(prefetcher.prefetch(&not_found, &options).await, PrefetchOutcome::Failed);
        assert_eq!(prefetcher.prefetch(&garbled, &options).await, PrefetchOutcome::Failed);
        assert!(cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_unreachable_origin_fails() {
        let cache = shared_cache();
        // Nothing listens on port 9 of the loopback interface
        let prefetcher =
            Prefetcher::new(cache.clone(), "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let outcome = prefetcher
            .prefetch("http://127.0.0.1:9/unreachable", &PrefetchOptions::default())
            .await;

        assert_eq!(outcome, PrefetchOutcome::Failed);
        assert!(cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_never_leaves_the_configured_origin() {
        let (base, upstream) = spawn_upstream().await;
        let (other_base, other) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();
        let options = PrefetchOptions::default();

        let foreign = format!("{}/internal/secret", other_base);
        assert_eq!(prefetcher.prefetch(&foreign, &options).await, PrefetchOutcome::Failed);
        assert_eq!(
            prefetcher.prefetch("//169.254.169.254/latest", &options).await,
            PrefetchOutcome::Failed
        );
        assert_eq!(
            prefetcher.prefetch("file:///etc/passwd", &options).await,
            PrefetchOutcome::Failed
        );

        assert_eq!(other.hits.load(Ordering::SeqCst), 0);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
        assert!(cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_relative_url_resolves_against_base() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();

        assert_eq!(
            prefetcher.resolve("/api/insight/LI4").map(|url| url.to_string()),
            Some(format!("{}/api/insight/LI4", base))
        );

        let outcome = prefetcher
            .prefetch("/api/insight/LI4", &PrefetchOptions::default())
            .await;
        assert_eq!(outcome, PrefetchOutcome::Stored);
        assert!(cache.read().await.has("/api/insight/LI4"));
    }

    #[test]
    fn test_base_url_must_be_absolute_http() {
        assert!(parse_base_url("http://127.0.0.1:8080").is_ok());
        assert!(matches!(parse_base_url("not a url"), Err(PrefetchError::BaseUrl(_))));
        assert!(matches!(parse_base_url("file:///tmp"), Err(PrefetchError::BaseUrl(_))));
    }

    #[tokio::test]
    async fn test_card_id_cannot_escape_card_paths() {
        let (base, upstream) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();

        for card_id in ["../../internal/secret", "..", "LI4?x=1", "a/b", ""] {
            let outcome = prefetcher
                .prefetch_card(card_id, &PrefetchOptions::default())
                .await;
            assert_eq!(outcome, PrefetchOutcome::Failed, "card id {:?}", card_id);
        }

        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
        assert!(cache.read().await.is_empty());
        assert_eq!(prefetcher.queued_len().await, 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_not_buffered_or_cached() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        // The 4 byte audio clip fits, the insight document does not
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5))
            .unwrap()
            .with_max_body_bytes(16);

        let outcome = prefetcher
            .prefetch_card("LI4", &PrefetchOptions::default())
            .await;

        assert_eq!(outcome, PrefetchOutcome::Partial);
        let cache = cache.read().await;
        assert!(!cache.has("insight-LI4"));
        assert!(cache.has("audio-LI4"));
    }

    #[tokio::test]
    async fn test_prefetch_times_out() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher =
            Prefetcher::new(cache.clone(), &base, Duration::from_millis(200)).unwrap();
        let url = format!("{}/api/insight/{}", base, SLOW_CARD);

        let outcome = prefetcher.prefetch(&url, &PrefetchOptions::default()).await;

        assert_eq!(outcome, PrefetchOutcome::Failed);
        assert!(!cache.read().await.has(&url));
    }

    #[tokio::test]
    async fn test_prefetch_card_stores_both_resources() {
        let (base, upstream) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();

        let outcome = prefetcher
            .prefetch_card("ST36", &PrefetchOptions { priority: Priority::High, expiry_ms: None })
            .await;

        assert_eq!(outcome, PrefetchOutcome::Stored);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);

        let mut cache = cache.write().await;
        assert!(cache.get("insight-ST36").is_some());
        assert_eq!(
            cache.get("audio-ST36"),
            Some(Payload::from(vec![0xFFu8, 0xFB, 0x90, 0x64]))
        );
        drop(cache);
        assert_eq!(prefetcher.queued_len().await, 0);
    }

    #[tokio::test]
    async fn test_prefetch_card_twice_keeps_one_entry_per_key() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();
        let options = PrefetchOptions::default();

        prefetcher.prefetch_card("x", &options).await;
        prefetcher.prefetch_card("x", &options).await;

        let cache = cache.read().await;
        assert_eq!(cache.len(), 2);
        assert!(cache.has("insight-x"));
        assert!(cache.has("audio-x"));
    }

    #[tokio::test]
    async fn test_prefetch_card_partial_when_one_resource_fails() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();

        // Insight succeeds, audio 404s
        let outcome = prefetcher
            .prefetch_card("silent", &PrefetchOptions::default())
            .await;

        assert_eq!(outcome, PrefetchOutcome::Partial);
        let cache = cache.read().await;
        assert!(cache.has("insight-silent"));
        assert!(!cache.has("audio-silent"));
    }

    #[tokio::test]
    async fn test_prefetch_card_fails_when_both_resources_fail() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();

        let outcome = prefetcher
            .prefetch_card("missing", &PrefetchOptions::default())
            .await;
        assert_eq!(outcome, PrefetchOutcome::Failed);

        // Insight returns non-JSON and audio 404s
        let outcome = prefetcher
            .prefetch_card("garbled", &PrefetchOptions::default())
            .await;
        assert_eq!(outcome, PrefetchOutcome::Failed);
        assert!(cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_newer_card_cancels_in_flight_prefetch() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher =
            Arc::new(Prefetcher::new(cache.clone(), &base, Duration::from_secs(10)).unwrap());

        let first = {
            let prefetcher = prefetcher.clone();
            tokio::spawn(async move {
                prefetcher
                    .prefetch_card(SLOW_CARD, &PrefetchOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let second = prefetcher
            .prefetch_card("LI4", &PrefetchOptions::default())
            .await;

        assert_eq!(first.await.unwrap(), PrefetchOutcome::Cancelled);
        assert_eq!(second, PrefetchOutcome::Stored);

        let cache = cache.read().await;
        assert!(!cache.has("insight-slow"));
        assert!(!cache.has("audio-slow"));
        assert!(cache.has("insight-LI4"));
        assert_eq!(prefetcher.queued_len().await, 0);
    }

    #[tokio::test]
    async fn test_queued_card_is_skipped_and_abort_cancels() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher =
            Arc::new(Prefetcher::new(cache.clone(), &base, Duration::from_secs(10)).unwrap());

        let first = {
            let prefetcher = prefetcher.clone();
            tokio::spawn(async move {
                prefetcher
                    .prefetch_card(SLOW_CARD, &PrefetchOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let duplicate = prefetcher
            .prefetch_card(SLOW_CARD, &PrefetchOptions::default())
            .await;
        assert_eq!(duplicate, PrefetchOutcome::Skipped);

        prefetcher.abort_prefetch().await;

        assert_eq!(first.await.unwrap(), PrefetchOutcome::Cancelled);
        assert_eq!(prefetcher.queued_len().await, 0);
        assert!(cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_expiry_override_applies_to_card_resources() {
        let (base, _) = spawn_upstream().await;
        let cache = shared_cache();
        let prefetcher = Prefetcher::new(cache.clone(), &base, Duration::from_secs(5)).unwrap();

        let outcome = prefetcher
            .prefetch_card("GB20", &PrefetchOptions { priority: Priority::Low, expiry_ms: Some(0) })
            .await;

        assert_eq!(outcome, PrefetchOutcome::Stored);
        // A zero TTL means the entries are already unusable
        let cache = cache.read().await;
        assert!(!cache.has("insight-GB20"));
        assert!(!cache.has("audio-GB20"));
    }
}
