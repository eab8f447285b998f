//! Export identifier allocation
//!
//! Each export unit owns one allocator. Identifiers are derived from the
//! asset's class and a hash of its stable identity, so the same asset gets
//! the same identifier on every run regardless of load order:
//!
//! ```text
//! candidate = class_id * 10^14 + fnv1a(file identity, path_id) mod 10^14
//! ```
//!
//! Collisions step upward inside the class band, wrapping at the band
//! end, up to an attempt limit.

use std::collections::{HashMap, HashSet};

use crate::asset::AssetKey;
use crate::hash::key_hash;
use crate::schema::ClassId;
use crate::{Error, Result};

/// Width of one class band
pub const ID_BAND: i64 = 100_000_000_000_000;

/// Number of class bands that fit in an `i64`
const BAND_COUNT: i64 = i64::MAX / ID_BAND;

pub const DEFAULT_ATTEMPT_LIMIT: u32 = 4096;

/// Identifier of the main object of a standalone asset document
pub fn main_object_id(class: ClassId) -> i64 {
    i64::from(class.0) * 100_000
}

/// Unit-scoped table of asset → export identifier
#[derive(Debug)]
pub struct ExportIdAllocator {
    ids: HashMap<AssetKey, i64>,
    used: HashSet<i64>,
    order: Vec<AssetKey>,
    attempt_limit: u32,
}

impl Default for ExportIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportIdAllocator {
    pub fn new() -> Self {
        Self::with_attempt_limit(DEFAULT_ATTEMPT_LIMIT)
    }

    pub fn with_attempt_limit(attempt_limit: u32) -> Self {
        Self {
            ids: HashMap::new(),
            used: HashSet::new(),
            order: Vec::new(),
            attempt_limit,
        }
    }

    /// First identifier tried for an asset
    pub fn candidate(class: ClassId, identity: &str, path_id: i64) -> i64 {
        let band = i64::from(class.0).rem_euclid(BAND_COUNT) * ID_BAND;
        band + (key_hash(identity, path_id) % ID_BAND as u64) as i64
    }

    /// Claim `id` for `key`, falling back to a generated identifier when it
    /// is zero or already taken. Re-adding a known key returns its id.
    pub fn reserve(
        &mut self,
        key: AssetKey,
        class: ClassId,
        identity: &str,
        id: i64,
    ) -> Result<i64> {
        if let Some(&existing) = self.ids.get(&key) {
            return Ok(existing);
        }
        if id == 0 || self.used.contains(&id) {
            return self.add(key, class, identity);
        }
        self.assign(key, id);
        Ok(id)
    }

    /// Generate an identifier for `key`
    pub fn add(&mut self, key: AssetKey, class: ClassId, identity: &str) -> Result<i64> {
        if let Some(&existing) = self.ids.get(&key) {
            return Ok(existing);
        }

        let start = Self::candidate(class, identity, key.path_id);
        let band = start - start.rem_euclid(ID_BAND);
        let mut offset = start - band;

        for _ in 0..self.attempt_limit {
            let id = band + offset;
            if id != 0 && !self.used.contains(&id) {
                self.assign(key, id);
                return Ok(id);
            }
            offset = (offset + 1) % ID_BAND;
        }

        Err(Error::AllocatorExhaustion {
            class,
            attempts: self.attempt_limit,
        })
    }

    fn assign(&mut self, key: AssetKey, id: i64) {
        self.ids.insert(key, id);
        self.used.insert(id);
        self.order.push(key);
    }

    pub fn export_id(&self, key: AssetKey) -> Option<i64> {
        self.ids.get(&key).copied()
    }

    pub fn contains(&self, key: AssetKey) -> bool {
        self.ids.contains_key(&key)
    }

    /// Keys in the order they were added
    pub fn order(&self) -> &[AssetKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
