//! Sequential citation fetching
//!
//! One request per unique URL, in ordinal order, with a fixed pause between
//! consecutive requests. A 429 gets one pause-and-retry; every other failure
//! is recorded and the loop moves on.

use crate::provider::{CitationSource, FetchError};
use crate::registry::UrlRegistry;
use crate::schema::{Citation, FailurePolicy};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Result of requesting a citation for one URL
#[derive(Debug)]
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<String, FetchError>,
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives a [`CitationSource`] over a registry
pub struct CitationFetcher<'a, S: CitationSource + ?Sized> {
    source: &'a S,
    delay: Duration,
}

impl<'a, S: CitationSource + ?Sized> CitationFetcher<'a, S> {
    pub fn new(source: &'a S, delay: Duration) -> Self {
        Self { source, delay }
    }

    /// Fetch a citation for every URL in ascending ordinal order
    ///
    /// The delay only separates actual requests; URLs rejected before
    /// reaching the source cost no pause.
    pub async fn fetch_all(&self, registry: &UrlRegistry) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::with_capacity(registry.len());
        let mut requested = false;

        for (ordinal, url) in registry.iter() {
            info!("  -> [{}/{}] {}", ordinal, registry.len(), truncate(url, 60));

            let result = match validate_url(url) {
                Ok(()) => {
                    if requested && !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    requested = true;
                    self.fetch_one(url).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!(url = %url, error = %e, "Citation request failed");
            }

            outcomes.push(FetchOutcome {
                url: url.to_string(),
                result,
            });
        }

        outcomes
    }

    async fn fetch_one(&self, url: &str) -> Result<String, FetchError> {
        match self.source.fetch_citation(url).await {
            Err(FetchError::RateLimited { retry_after }) => {
                let pause = retry_after.unwrap_or(self.delay * 2);
                warn!(
                    url = %url,
                    pause_ms = pause.as_millis() as u64,
                    "Rate limited, pausing before retry"
                );
                tokio::time::sleep(pause).await;
                self.source.fetch_citation(url).await
            }
            other => other,
        }
    }
}

/// Marker text used for a failed URL under [`FailurePolicy::Placeholder`]
pub fn placeholder_citation(url: &str) -> String {
    format!("[Citation unavailable for URL: {}]", url)
}

/// Apply the failure policy, producing the final registry and citations
///
/// Under `Omit` the registry is renumbered so ordinals stay contiguous.
pub fn resolve(
    registry: &UrlRegistry,
    outcomes: Vec<FetchOutcome>,
    policy: FailurePolicy,
) -> (UrlRegistry, Vec<Citation>) {
    let registry = match policy {
        FailurePolicy::Placeholder => registry.clone(),
        FailurePolicy::Omit => registry.retain(|url| {
            outcomes
                .iter()
                .any(|o| o.url == url && o.is_ok())
        }),
    };

    let mut citations: Vec<Citation> = outcomes
        .into_iter()
        .filter_map(|outcome| {
            let ordinal = registry.ordinal(&outcome.url)?;
            let text = match outcome.result {
                Ok(text) => text,
                Err(_) => placeholder_citation(&outcome.url),
            };
            Some(Citation {
                ordinal,
                url: outcome.url,
                text,
            })
        })
        .collect();
    citations.sort_by_key(|c| c.ordinal);

    (registry, citations)
}

fn validate_url(url: &str) -> Result<(), FetchError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Source answering from a closure and recording every call
    struct FakeSource<F> {
        answer: F,
        calls: Mutex<Vec<String>>,
    }

    impl<F> FakeSource<F>
    where
        F: Fn(&str, usize) -> Result<String, FetchError> + Send + Sync,
    {
        fn new(answer: F) -> Self {
            Self {
                answer,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<F> CitationSource for FakeSource<F>
    where
        F: Fn(&str, usize) -> Result<String, FetchError> + Send + Sync,
    {
        async fn fetch_citation(&self, url: &str) -> Result<String, FetchError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(url.to_string());
                calls.iter().filter(|u| u.as_str() == url).count()
            };
            (self.answer)(url, attempt)
        }
    }

    fn registry(urls: &[&str]) -> UrlRegistry {
        let mut registry = UrlRegistry::default();
        for url in urls {
            registry.insert(url);
        }
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_sequential_with_delay() {
        let source = FakeSource::new(|url: &str, _| Ok(format!("Citation for {}", url)));
        let reg = registry(&["https://a.com", "https://b.com", "https://c.com"]);

        let start = tokio::time::Instant::now();
        let outcomes = CitationFetcher::new(&source, Duration::from_millis(500))
            .fetch_all(&reg)
            .await;

        assert_eq!(
            source.calls(),
            vec!["https://a.com", "https://b.com", "https://c.com"]
        );
        assert!(outcomes.iter().all(FetchOutcome::is_ok));
        // Two pauses between three calls, none after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_failure_does_not_abort() {
        let source = FakeSource::new(|url: &str, _| {
            if url.contains("bad") {
                Err(FetchError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok("ok".to_string())
            }
        });
        let reg = registry(&["https://bad.com", "https://good.com"]);

        let outcomes = CitationFetcher::new(&source, Duration::ZERO)
            .fetch_all(&reg)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_never_requested() {
        let source = FakeSource::new(|_: &str, _| Ok("ok".to_string()));
        let reg = registry(&["./relative.md", "https://a.com", "mailto:x@y.z"]);

        let outcomes = CitationFetcher::new(&source, Duration::ZERO)
            .fetch_all(&reg)
            .await;

        assert_eq!(source.calls(), vec!["https://a.com"]);
        assert!(matches!(outcomes[0].result, Err(FetchError::InvalidUrl(_))));
        assert!(matches!(outcomes[2].result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_url_costs_no_delay() {
        let source = FakeSource::new(|_: &str, _| Ok("ok".to_string()));
        let reg = registry(&["./a.md", "https://a.com", "mailto:x@y.z", "./b.md", "https://b.com"]);

        let start = tokio::time::Instant::now();
        let outcomes = CitationFetcher::new(&source, Duration::from_millis(500))
            .fetch_all(&reg)
            .await;

        assert_eq!(outcomes.len(), 5);
        assert_eq!(source.calls(), vec!["https://a.com", "https://b.com"]);
        // One pause between the two real requests
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_once() {
        let source = FakeSource::new(|_: &str, attempt| {
            if attempt == 1 {
                Err(FetchError::RateLimited {
                    retry_after: Some(Duration::from_secs(3)),
                })
            } else {
                Ok("after pause".to_string())
            }
        });
        let reg = registry(&["https://a.com"]);

        let start = tokio::time::Instant::now();
        let outcomes = CitationFetcher::new(&source, Duration::from_millis(100))
            .fetch_all(&reg)
            .await;

        assert_eq!(source.calls().len(), 2);
        assert_eq!(outcomes[0].result.as_deref().unwrap(), "after pause");
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_rate_limit_second_failure_recorded() {
        let source = FakeSource::new(|_: &str, _| Err(FetchError::RateLimited { retry_after: None }));
        let reg = registry(&["https://a.com"]);

        let outcomes = CitationFetcher::new(&source, Duration::ZERO)
            .fetch_all(&reg)
            .await;

        assert_eq!(source.calls().len(), 2);
        assert!(matches!(
            outcomes[0].result,
            Err(FetchError::RateLimited { .. })
        ));
    }

    fn outcome(url: &str, ok: bool) -> FetchOutcome {
        FetchOutcome {
            url: url.to_string(),
            result: if ok {
                Ok(format!("Cite {}", url))
            } else {
                Err(FetchError::EmptyResponse)
            },
        }
    }

    #[test]
    fn test_resolve_placeholder() {
        let reg = registry(&["a", "b", "c"]);
        let outcomes = vec![outcome("a", true), outcome("b", false), outcome("c", true)];

        let (resolved, citations) = resolve(&reg, outcomes, FailurePolicy::Placeholder);

        assert_eq!(resolved, reg);
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[1].ordinal, 2);
        assert_eq!(citations[1].text, "[Citation unavailable for URL: b]");
        assert_eq!(citations[2].text, "Cite c");
    }

    #[test]
    fn test_resolve_omit_renumbers() {
        let reg = registry(&["a", "b", "c"]);
        let outcomes = vec![outcome("a", true), outcome("b", false), outcome("c", true)];

        let (resolved, citations) = resolve(&reg, outcomes, FailurePolicy::Omit);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.ordinal("b"), None);
        let pairs: Vec<_> = citations.iter().map(|c| (c.ordinal, c.url.as_str())).collect();
        assert_eq!(pairs, vec![(1, "a"), (2, "c")]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a very long string", 10), "this is...");
        assert_eq!(truncate("ééééééééééééé", 6), "ééé...");
    }
}
