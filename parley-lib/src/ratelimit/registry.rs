use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, OnceLock};

use crate::Route;
use crate::ratelimit::{Bucket, BucketKey, BucketStrategy};

/// Maps routes to the buckets that pace them.
///
/// Holds every bucket created during the lifetime of the process and a
/// secondary index from route template to the quota-group hash the server
/// reported for it. Both maps are read on every submission and written
/// rarely, so they live in `DashMap`s; creating a missing bucket goes through
/// the entry API so that two racing submissions end up with the same
/// instance.
#[derive(Debug)]
pub struct BucketRegistry {
    strategy: BucketStrategy,
    buckets: DashMap<BucketKey, Arc<Bucket>>,
    hashes: DashMap<String, String>,
    unclassified: OnceLock<Arc<Bucket>>,
}

impl BucketRegistry {
    /// Create an empty registry using the given strategy
    #[must_use]
    pub fn new(strategy: BucketStrategy) -> Self {
        Self {
            strategy,
            buckets: DashMap::new(),
            hashes: DashMap::new(),
            unclassified: OnceLock::new(),
        }
    }

    /// The strategy used to map routes to buckets
    #[must_use]
    pub const fn strategy(&self) -> BucketStrategy {
        self.strategy
    }

    /// Find the bucket for `route`, creating it if needed.
    ///
    /// With [`BucketStrategy::Hash`], routes whose template has no known
    /// quota-group hash resolve to the single shared unclassified bucket,
    /// regardless of their major parameters.
    #[must_use]
    pub fn resolve(&self, route: &Route) -> Arc<Bucket> {
        match self.strategy {
            BucketStrategy::Hash => match self.known_hash(route.template_id()) {
                Some(hash) => self.get_or_create(BucketKey::hashed(&hash, route)),
                None => self.unclassified(),
            },
            BucketStrategy::BaseRoute => self.get_or_create(BucketKey::base_route(route)),
        }
    }

    /// Record the quota-group hash reported for a route template.
    ///
    /// Returns `true` if the mapping was new or changed.
    pub fn learn(&self, template_id: &str, hash: &str) -> bool {
        if self
            .hashes
            .get(template_id)
            .is_some_and(|known| known.as_str() == hash)
        {
            return false;
        }

        match self.hashes.insert(template_id.to_string(), hash.to_string()) {
            Some(previous) if previous != hash => {
                log::debug!("Route {template_id} moved from bucket {previous} to {hash}");
                true
            }
            Some(_) => false,
            None => {
                log::debug!("Route {template_id} belongs to bucket {hash}");
                true
            }
        }
    }

    /// The quota-group hash currently known for a route template
    #[must_use]
    pub fn known_hash(&self, template_id: &str) -> Option<String> {
        self.hashes.get(template_id).map(|hash| hash.clone())
    }

    /// The shared bucket for routes that are not classified yet
    #[must_use]
    pub fn unclassified(&self) -> Arc<Bucket> {
        self.unclassified
            .get_or_init(|| Arc::new(Bucket::new(BucketKey::Unclassified)))
            .clone()
    }

    /// All buckets created so far, including the unclassified bucket once
    /// it has been used
    #[must_use]
    pub fn buckets(&self) -> Vec<Arc<Bucket>> {
        self.unclassified
            .get()
            .cloned()
            .into_iter()
            .chain(self.buckets.iter().map(|entry| entry.value().clone()))
            .collect()
    }

    /// Number of buckets created so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len() + usize::from(self.unclassified.get().is_some())
    }

    /// Whether no bucket has been created yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_create(&self, key: BucketKey) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.get(&key) {
            return bucket.clone();
        }

        match self.buckets.entry(key) {
            // Another thread created it, use theirs
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let bucket = Arc::new(Bucket::new(entry.key().clone()));
                entry.insert(bucket).clone()
            }
        }
    }
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new(BucketStrategy::default())
    }
}
