// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A cache of convolution functions, keyed by image geometry.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::{
    record::{Record, RecordField},
    store::{ConvFunctionStore, StoreError},
    types::CacheKey,
};

/// Convolution functions that have already been made, in the order they were
/// made.
///
/// Stores are shared behind [`Arc`]s and never change once cached. Lookups
/// only take a read lock. Only one store is built at a time, so two threads
/// asking for the same geometry never both do the (expensive) synthesis.
#[derive(Debug, Default)]
pub struct KernelCache {
    entries: RwLock<IndexMap<CacheKey, Arc<ConvFunctionStore>>>,
    build_lock: Mutex<()>,
    /// If set, the most entries kept; the oldest entry is dropped to make room
    /// for a new one.
    limit: Option<usize>,
}

impl KernelCache {
    /// An empty cache that never drops anything.
    pub fn new() -> KernelCache {
        KernelCache::default()
    }

    /// An empty cache that holds at most `limit` (at least 1) entries.
    pub fn with_limit(limit: usize) -> KernelCache {
        KernelCache {
            limit: Some(limit.max(1)),
            ..KernelCache::default()
        }
    }

    /// The most entries this cache keeps, if it's bounded.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Get the store for `key`, building it with `build` if it isn't cached.
    /// The boolean is `true` if the store came from the cache.
    ///
    /// If `build` fails, nothing is cached and the error is returned; other
    /// entries are unaffected.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use wproj_convfunc::{
    ///     convfunc::SpheroidalTaper, synthesise, CacheKey, KernelCache, SynthesisParams,
    /// };
    ///
    /// let params = SynthesisParams {
    ///     conv_size: 128,
    ///     sampling: 4,
    ///     w_planes: 1,
    ///     w_scale: 0.0,
    ///     sampling_increment: (4e-3, 4e-3),
    ///     threshold: 1e-3,
    ///     memory_budget_mb: 4096,
    /// };
    /// let taper = SpheroidalTaper::new(params.inner());
    /// let cache = KernelCache::new();
    /// let key = CacheKey::new(128, 128, 1e-3, 1e-3);
    ///
    /// let (first, hit) = cache
    ///     .get_or_build(&key, || synthesise(&params, &taper, None).map(|s| s.store))
    ///     .unwrap();
    /// assert!(!hit);
    /// // The second request doesn't synthesise anything.
    /// let (second, hit) = cache
    ///     .get_or_build(&key, || synthesise(&params, &taper, None).map(|s| s.store))
    ///     .unwrap();
    /// assert!(hit);
    /// assert!(Arc::ptr_eq(&first, &second));
    /// ```
    pub fn get_or_build<E, F>(
        &self,
        key: &CacheKey,
        build: F,
    ) -> Result<(Arc<ConvFunctionStore>, bool), E>
    where
        F: FnOnce() -> Result<ConvFunctionStore, E>,
    {
        if let Some(store) = self.get(key) {
            debug!("Convolution-function cache hit for {key}");
            return Ok((store, true));
        }

        let _building = self.build_lock.lock();
        // Another thread may have built this while we waited.
        if let Some(store) = self.get(key) {
            debug!("Convolution-function cache hit for {key} (after waiting)");
            return Ok((store, true));
        }

        debug!("Convolution-function cache miss for {key}");
        let store = Arc::new(build()?);
        self.insert(key.clone(), Arc::clone(&store));
        Ok((store, false))
    }

    /// Get the cached store for `key` without building anything.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<ConvFunctionStore>> {
        self.entries.read().get(key).cloned()
    }

    /// The position of `key` in the cache, if it's present.
    pub fn index_of(&self, key: &CacheKey) -> Option<usize> {
        self.entries.read().get_index_of(key)
    }

    /// Is there a store for `key`?
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Put a store in the cache. An existing entry for `key` is left alone,
    /// and it is returned instead.
    pub fn insert(&self, key: CacheKey, store: Arc<ConvFunctionStore>) -> Arc<ConvFunctionStore> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            return Arc::clone(existing);
        }
        if let Some(limit) = self.limit {
            while entries.len() >= limit {
                if let Some((old, _)) = entries.shift_remove_index(0) {
                    debug!("Dropping cached convolution functions for {old}");
                }
            }
        }
        entries.insert(key, Arc::clone(&store));
        store
    }

    /// Drop the entry for `key`, returning it. Later entries move up one
    /// position. Anyone still holding the store keeps a valid copy.
    pub fn remove(&self, key: &CacheKey) -> Option<Arc<ConvFunctionStore>> {
        self.entries.write().shift_remove(key)
    }

    /// The number of cached stores.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Are there no cached stores?
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The cached keys, oldest first.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// All cached entries, oldest first.
    pub fn entries(&self) -> Vec<(CacheKey, Arc<ConvFunctionStore>)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }

    /// Drop every entry. Builds in progress are not affected; their results
    /// are cached when they finish.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Describe every cached entry in `record`. Entry `k` has fields
    /// `key{k}`, `val{k}`, `convfunctions{k}` and `convsupportblock{k}`;
    /// `numconv`, `convsizes`, `wscalers` and `convsamplings` cover all
    /// entries.
    pub fn to_record(&self, record: &mut Record) -> Result<(), StoreError> {
        let entries = self.entries();
        let mut sizes = Vec::with_capacity(entries.len());
        let mut w_scales = Vec::with_capacity(entries.len());
        let mut samplings = Vec::with_capacity(entries.len());

        record.define("numconv", RecordField::Int(entries.len() as i64));
        for (k, (key, store)) in entries.iter().enumerate() {
            let mut r = store.to_record()?;
            record.define(format!("key{k}"), RecordField::Str(key.to_string()));
            record.define(format!("val{k}"), RecordField::Int(k as i64));
            if let Some(f) = r.remove("convfunc") {
                record.define(format!("convfunctions{k}"), f);
            }
            if let Some(f) = r.remove("convsupport") {
                record.define(format!("convsupportblock{k}"), f);
            }
            sizes.push(store.size() as i64);
            w_scales.push(store.w_scale());
            samplings.push(store.sampling() as i64);
        }
        record.define("convsizes", RecordField::IntVec(sizes));
        record.define("wscalers", RecordField::FloatVec(w_scales));
        record.define("convsamplings", RecordField::IntVec(samplings));
        Ok(())
    }

    /// Fill this cache from a record made by [`KernelCache::to_record`].
    /// Without `wscalers` or `convsamplings`, the single `wscaler` and
    /// `convsampling` fields are used for every entry.
    pub fn from_record(&self, record: &Record) -> Result<(), StoreError> {
        let n = record.get_usize("numconv")?;
        let sizes = record.get_usize_vec("convsizes")?;
        let w_scales = match record.get_float_vec("wscalers") {
            Ok(v) => v.to_vec(),
            Err(_) => vec![record.get_float("wscaler")?; n],
        };
        let samplings = match record.get_usize_vec("convsamplings") {
            Ok(v) => v,
            Err(_) => vec![record.get_usize("convsampling")?; n],
        };
        for (name, len) in [
            ("convsizes", sizes.len()),
            ("wscalers", w_scales.len()),
            ("convsamplings", samplings.len()),
        ] {
            if len < n {
                return Err(StoreError::Deserialization {
                    field: name.to_string(),
                    reason: format!("{len} values for {n} convolution functions"),
                });
            }
        }

        let mut restored = Vec::with_capacity(n);
        for k in 0..n {
            let key = CacheKey::from_string(record.get_str(&format!("key{k}"))?.to_string());
            let val = record.get_usize(&format!("val{k}"))?;
            let field = |name: String| {
                record
                    .get(&name)
                    .cloned()
                    .ok_or(StoreError::Deserialization {
                        field: name,
                        reason: "field is absent".to_string(),
                    })
            };
            let (Some(&size), Some(&w_scale), Some(&sampling)) =
                (sizes.get(val), w_scales.get(val), samplings.get(val))
            else {
                return Err(StoreError::Deserialization {
                    field: format!("val{k}"),
                    reason: format!("{val} is not a valid index"),
                });
            };

            let mut r = Record::new();
            r.define("convfunc", field(format!("convfunctions{val}"))?);
            r.define("convsupport", field(format!("convsupportblock{val}"))?);
            r.define("convsampling", RecordField::Int(sampling as i64));
            r.define("convsize", RecordField::Int(size as i64));
            r.define("wscaler", RecordField::Float(w_scale));
            let store = ConvFunctionStore::from_record(&r).map_err(|e| match e {
                StoreError::Deserialization { field, reason } => StoreError::Deserialization {
                    field: format!("{field} of convolution function {val}"),
                    reason,
                },
                e => e,
            })?;
            restored.push((key, store));
        }

        // Only touch the cache once everything has been read.
        for (key, store) in restored {
            self.insert(key, Arc::new(store));
        }
        Ok(())
    }
}
