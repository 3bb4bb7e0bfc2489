//! Region loader resolution for query results.
//!
//! # Responsibility
//! - Run registered loaders over every region of a result page.
//! - Bound how many regions of one page load at the same time.
//!
//! # Invariants
//! - Pages are loaded one at a time by the caller; only regions within a
//!   page run concurrently, at most `region_concurrency` at once.
//! - The first loader failure fails the page.

use crate::capability::actor::Actor;
use crate::model::page::Page;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::thread;

const DEFAULT_REGION_CONCURRENCY: usize = 4;

/// Resolves dynamic content inside one region (joins, widget data, ...).
pub trait RegionLoader: Send + Sync {
    /// Stable loader name used in errors and logs.
    fn name(&self) -> &str;

    /// Mutates `region` in place.
    fn load_region(
        &self,
        actor: &Actor,
        slug: &str,
        region_key: &str,
        region: &mut Value,
    ) -> Result<(), String>;
}

/// Loader failure for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderError {
    pub loader: String,
    pub slug: String,
    pub region_key: String,
    pub message: String,
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loader `{}` failed on `{}:{}`: {}",
            self.loader, self.slug, self.region_key, self.message
        )
    }
}

impl Error for LoaderError {}

/// Concurrency policy for region loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderPolicy {
    pub region_concurrency: NonZeroUsize,
}

impl LoaderPolicy {
    /// Builds a policy, treating `0` as fully sequential.
    pub fn with_concurrency(region_concurrency: usize) -> Self {
        Self {
            region_concurrency: NonZeroUsize::new(region_concurrency).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Default for LoaderPolicy {
    fn default() -> Self {
        Self::with_concurrency(DEFAULT_REGION_CONCURRENCY)
    }
}

/// Registered region loaders plus their concurrency policy.
#[derive(Default)]
pub struct RegionLoaders {
    loaders: Vec<Box<dyn RegionLoader>>,
    policy: LoaderPolicy,
}

impl RegionLoaders {
    pub fn new(policy: LoaderPolicy) -> Self {
        Self {
            loaders: Vec::new(),
            policy,
        }
    }

    pub fn register(&mut self, loader: impl RegionLoader + 'static) {
        self.loaders.push(Box::new(loader));
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Runs every loader over every canonical-or-merged region of `page`.
    pub fn load_page(&self, actor: &Actor, page: &mut Page) -> Result<(), LoaderError> {
        if self.is_empty() || page.areas.is_empty() {
            return Ok(());
        }

        let slug = page.slug.as_str();
        let mut regions: Vec<(&String, &mut Value)> = page.areas.iter_mut().collect();
        for chunk in regions.chunks_mut(self.policy.region_concurrency.get()) {
            if chunk.len() == 1 {
                let (key, region) = &mut chunk[0];
                self.run_loaders(actor, slug, key, region)?;
                continue;
            }

            let outcomes = thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter_mut()
                    .map(|(key, region)| {
                        let region_key = key.to_string();
                        let handle = scope.spawn(move || self.run_loaders(actor, slug, key, region));
                        (region_key, handle)
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(region_key, handle)| {
                        handle.join().unwrap_or_else(|_| {
                            Err(LoaderError {
                                loader: "*".to_string(),
                                slug: slug.to_string(),
                                region_key,
                                message: "loader panicked".to_string(),
                            })
                        })
                    })
                    .collect::<Vec<_>>()
            });
            outcomes.into_iter().collect::<Result<Vec<()>, _>>()?;
        }
        Ok(())
    }

    fn run_loaders(
        &self,
        actor: &Actor,
        slug: &str,
        region_key: &str,
        region: &mut Value,
    ) -> Result<(), LoaderError> {
        for loader in &self.loaders {
            loader
                .load_region(actor, slug, region_key, region)
                .map_err(|message| LoaderError {
                    loader: loader.name().to_string(),
                    slug: slug.to_string(),
                    region_key: region_key.to_string(),
                    message,
                })?;
        }
        Ok(())
    }
}
