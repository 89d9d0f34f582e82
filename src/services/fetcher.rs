use crate::error::{DocCrawlerError, Result};
use crate::services::robots::RobotsTxt;
use crate::services::throttle::AutoThrottle;
use crate::types::{CrawlConfig, PageResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};
use url::Url;

/// Slots held by one in-flight request, released on drop.
#[derive(Debug)]
pub struct DispatchPermit {
    _global: OwnedSemaphorePermit,
    _origin: OwnedSemaphorePermit,
}

/// HTTP side of the crawl: concurrency caps, dispatch delay, robots.txt and caching.
pub struct ContentFetcher {
    client: reqwest::Client,
    user_agent: String,
    obey_robots: bool,
    cache_enabled: bool,
    per_origin_limit: usize,
    global: Arc<Semaphore>,
    per_origin: Mutex<HashMap<String, Arc<Semaphore>>>,
    robots: Mutex<HashMap<String, Arc<RobotsTxt>>>,
    cache: Mutex<HashMap<String, Arc<OnceCell<PageResponse>>>>,
    throttle: Mutex<AutoThrottle>,
}

impl ContentFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .cookie_store(config.cookies_enabled)
            .pool_max_idle_per_host(config.concurrent_requests_per_domain)
            .connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder
            .build()
            .map_err(|e| DocCrawlerError::Config {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        let per_origin_limit =
            if config.concurrent_requests_per_domain > config.concurrent_requests {
                warn!(
                    "Per-domain concurrency {} exceeds global limit {}, clamping",
                    config.concurrent_requests_per_domain, config.concurrent_requests
                );
                config.concurrent_requests
            } else {
                config.concurrent_requests_per_domain
            };

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            obey_robots: config.obey_robots,
            cache_enabled: config.http_cache_enabled,
            per_origin_limit,
            global: Arc::new(Semaphore::new(config.concurrent_requests)),
            per_origin: Mutex::new(HashMap::new()),
            robots: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            throttle: Mutex::new(AutoThrottle::new(
                &config.autothrottle,
                config.download_delay(),
            )),
        })
    }

    /// Minimum spacing before the next dispatch.
    pub async fn dispatch_delay(&self) -> Duration {
        self.throttle.lock().await.delay()
    }

    /// Waits for a global slot and a slot for the URL's origin.
    pub async fn acquire(&self, url: &Url) -> Result<DispatchPermit> {
        let origin_semaphore = {
            let mut per_origin = self.per_origin.lock().await;
            per_origin
                .entry(origin_key(url))
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_origin_limit)))
                .clone()
        };

        let global = Arc::clone(&self.global)
            .acquire_owned()
            .await
            .map_err(|e| anyhow::anyhow!("Global request limiter closed: {}", e))?;
        let origin = origin_semaphore
            .acquire_owned()
            .await
            .map_err(|e| anyhow::anyhow!("Per-origin request limiter closed: {}", e))?;

        Ok(DispatchPermit {
            _global: global,
            _origin: origin,
        })
    }

    /// Fetches a page. Any HTTP status is returned as a response; only transport
    /// failures and robots.txt exclusions are errors.
    pub async fn fetch(&self, url: &str) -> Result<PageResponse> {
        let parsed = Url::parse(url)?;

        if self.obey_robots {
            let robots = self.robots_for(&parsed).await;
            if !robots.is_allowed(&parsed, &self.user_agent) {
                return Err(DocCrawlerError::RobotsDisallowed {
                    url: url.to_string(),
                });
            }
        }

        if !self.cache_enabled {
            return self.fetch_remote(url, parsed).await;
        }

        // Concurrent requests for one URL share a single in-flight fetch. Failures are not cached.
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(url.to_string()).or_default())
        };
        if let Some(cached) = cell.get() {
            debug!("Serving {} from response cache", url);
            return Ok(cached.clone());
        }
        cell.get_or_try_init(|| self.fetch_remote(url, parsed))
            .await
            .cloned()
    }

    async fn fetch_remote(&self, url: &str, parsed: Url) -> Result<PageResponse> {
        debug!("Fetching {}", url);
        let started = Instant::now();
        let response = match self.client.get(parsed).send().await {
            Ok(response) => response,
            Err(e) => {
                self.throttle.lock().await.record_failure();
                return Err(DocCrawlerError::Request {
                    url: url.to_string(),
                    source: e,
                });
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| DocCrawlerError::Request {
            url: url.to_string(),
            source: e,
        })?;
        self.throttle
            .lock()
            .await
            .record_response(status, started.elapsed());

        Ok(PageResponse::new(url, status, body))
    }

    async fn robots_for(&self, url: &Url) -> Arc<RobotsTxt> {
        // Held across the fetch so each origin's robots.txt is requested once.
        let mut robots = self.robots.lock().await;
        let key = origin_key(url);
        if let Some(rules) = robots.get(&key) {
            return Arc::clone(rules);
        }

        let rules = Arc::new(RobotsTxt::fetch(&self.client, url).await);
        robots.insert(key, Arc::clone(&rules));
        rules
    }
}

fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}
