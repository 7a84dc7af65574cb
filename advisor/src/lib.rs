//! Suggests layer pipelines for an image.
//!
//! The actual suggestions come from an injected [`SuggestionService`] (for example a
//! client of a hosted vision model). This crate wraps such a service with everything
//! needed to use it responsibly: images are downsized and recompressed before they
//! are sent, answers are cached by image content, requests are rate limited and
//! every failure degrades to a fixed [`fallback_template`].
use std::{num::NonZeroUsize, time::Instant};

use log::{debug, info, warn};
use serde_derive::Serialize;
use thiserror::Error;

use coders::{prepare_for_advisor, CodingError};
use ml::{LayerSpec, Pipeline};

pub mod cache;
pub mod config;
pub mod content_hash;
pub mod rate_limiter;
pub mod templates;

pub use cache::SuggestionCache;
pub use config::AdvisorConfig;
pub use content_hash::ContentHash;
pub use rate_limiter::RateLimiter;
pub use templates::fallback_template;

pub type AdvisorResult<T> = Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Could not prepare image: {0}")]
    Coding(#[from] CodingError),
    #[error("Suggestion service failed: {0}")]
    Service(String),
    #[error("Could not read config: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("Malformed config: {0}")]
    ConfigFormat(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Something that looks at an image and proposes layers for it.
pub trait SuggestionService {
    /// Receives the prepared JPEG bytes of the image.
    fn suggest(&self, jpeg: &[u8]) -> AdvisorResult<Vec<LayerSpec>>;
}

impl<S: SuggestionService + ?Sized> SuggestionService for Box<S> {
    fn suggest(&self, jpeg: &[u8]) -> AdvisorResult<Vec<LayerSpec>> {
        (**self).suggest(jpeg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoService,
    RateLimited,
    ServiceFailed,
    InvalidSuggestion,
}

/// Where the layers of a [`Suggestion`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionSource {
    Service,
    Cache,
    Fallback { reason: FallbackReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub layers: Vec<LayerSpec>,
    pub content_hash: ContentHash,
    pub source: SuggestionSource,
}

impl Suggestion {
    fn fallback(content_hash: ContentHash, reason: FallbackReason) -> Suggestion {
        Suggestion {
            layers: fallback_template(),
            content_hash,
            source: SuggestionSource::Fallback { reason },
        }
    }
}

/// Answers suggestion requests from cache, service or fallback template.
pub struct Advisor<S = Box<dyn SuggestionService>> {
    service: Option<S>,
    cache: SuggestionCache,
    limiter: RateLimiter,
    config: AdvisorConfig,
}

impl Advisor {
    /// An advisor without service, it always answers with the fallback template.
    pub fn new(config: AdvisorConfig) -> AdvisorResult<Advisor> {
        Advisor::build(config, None)
    }
}

impl<S: SuggestionService> Advisor<S> {
    pub fn with_service(config: AdvisorConfig, service: S) -> AdvisorResult<Advisor<S>> {
        Advisor::build(config, Some(service))
    }

    fn build(config: AdvisorConfig, service: Option<S>) -> AdvisorResult<Advisor<S>> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| AdvisorError::InvalidConfig("cache_capacity must be positive".into()))?;
        Ok(Advisor {
            service,
            cache: SuggestionCache::new(capacity),
            limiter: RateLimiter::new(config.max_requests, config.window()),
            config,
        })
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn cache(&self) -> &SuggestionCache {
        &self.cache
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// Suggests layers for the raw image file bytes.
    ///
    /// Fails only if the image cannot be decoded, every other problem results in
    /// the fallback template.
    pub fn suggest(&mut self, image_bytes: &[u8]) -> AdvisorResult<Suggestion> {
        self.suggest_at(image_bytes, Instant::now())
    }

    /// As [`Advisor::suggest`], with the time used for rate limiting passed in.
    pub fn suggest_at(&mut self, image_bytes: &[u8], now: Instant) -> AdvisorResult<Suggestion> {
        let prepared = prepare_for_advisor(
            image_bytes,
            self.config.max_image_dimension,
            self.config.jpeg_quality,
        )?;
        let content_hash = ContentHash::of(&prepared);

        if let Some(layers) = self.cache.get(&content_hash) {
            info!("Answering suggestion for {} from cache", content_hash);
            return Ok(Suggestion {
                layers,
                content_hash,
                source: SuggestionSource::Cache,
            });
        }

        let service = match &self.service {
            Some(service) => service,
            None => {
                debug!("No suggestion service configured, using fallback template");
                return Ok(Suggestion::fallback(content_hash, FallbackReason::NoService));
            }
        };

        if !self.limiter.try_acquire_at(now) {
            warn!(
                "Rate limit of {} requests per {}s reached, using fallback template",
                self.config.max_requests, self.config.window_secs
            );
            return Ok(Suggestion::fallback(content_hash, FallbackReason::RateLimited));
        }

        let layers = match service.suggest(&prepared) {
            Ok(layers) => layers,
            Err(err) => {
                warn!("{}, using fallback template", err);
                return Ok(Suggestion::fallback(content_hash, FallbackReason::ServiceFailed));
            }
        };

        if layers.is_empty() {
            warn!("Suggestion service returned no layers, using fallback template");
            return Ok(Suggestion::fallback(
                content_hash,
                FallbackReason::InvalidSuggestion,
            ));
        }
        if let Err(err) = Pipeline::from_specs(&layers) {
            warn!("Suggestion service returned invalid layers ({}), using fallback template", err);
            return Ok(Suggestion::fallback(
                content_hash,
                FallbackReason::InvalidSuggestion,
            ));
        }

        info!("Caching {} suggested layers for {}", layers.len(), content_hash);
        self.cache.put(content_hash, layers.clone());
        Ok(Suggestion {
            layers,
            content_hash,
            source: SuggestionSource::Service,
        })
    }
}
