// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for the convolution-function cache.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::prelude::*;
use num_complex::Complex64 as c64;

use super::*;
use crate::{convfunc::ConvFuncError, types::ImageGeometry};

/// A small, consistent store; `tag` makes stores distinguishable.
fn store(tag: f64) -> ConvFunctionStore {
    let kernel = Array3::from_shape_fn((7, 7, 2), |(x, y, p)| {
        c64::new(tag / (1 + x + y + p) as f64, 0.0)
    });
    ConvFunctionStore::new(kernel, vec![1, 1], 4, 16, 0.5)
}

fn key(nx: usize) -> CacheKey {
    ImageGeometry::new(nx, nx, 1e-5, 1e-5).cache_key()
}

#[test]
fn test_idempotent_hit() {
    let cache = KernelCache::new();
    let builds = AtomicUsize::new(0);
    let build = || {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok::<_, ConvFuncError>(store(1.0))
    };

    let (first, hit) = cache.get_or_build(&key(100), build).unwrap();
    assert!(!hit);
    let (second, hit) = cache.get_or_build(&key(100), build).unwrap();
    assert!(hit);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_failed_build_is_isolated() {
    let cache = KernelCache::new();
    let (good, _) = cache
        .get_or_build(&key(100), || Ok::<_, ConvFuncError>(store(1.0)))
        .unwrap();

    let result = cache.get_or_build(&key(200), || {
        Err(ConvFuncError::DegenerateKernel { plane: 0 })
    });
    assert_eq!(
        result.unwrap_err(),
        ConvFuncError::DegenerateKernel { plane: 0 }
    );

    // Nothing was cached for the failure, and the first entry is intact.
    assert!(!cache.contains(&key(200)));
    assert_eq!(cache.len(), 1);
    let (again, hit) = cache
        .get_or_build(&key(100), || -> Result<_, ConvFuncError> {
            panic!("the first entry should still be cached")
        })
        .unwrap();
    assert!(hit);
    assert_eq!(*again, *good);

    // The failed key can still be built later.
    let (_, hit) = cache
        .get_or_build(&key(200), || Ok::<_, ConvFuncError>(store(2.0)))
        .unwrap();
    assert!(!hit);
    assert_eq!(cache.keys(), vec![key(100), key(200)]);
}

#[test]
fn test_one_build_per_key_across_threads() {
    let cache = KernelCache::new();
    let builds = AtomicUsize::new(0);
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                cache
                    .get_or_build(&key(64), || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok::<_, ConvFuncError>(store(1.0))
                    })
                    .unwrap();
            });
        }
    });
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_insert_keeps_existing() {
    let cache = KernelCache::new();
    let first = cache.insert(key(10), Arc::new(store(1.0)));
    let second = cache.insert(key(10), Arc::new(store(2.0)));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.index_of(&key(10)), Some(0));
    assert_eq!(cache.index_of(&key(11)), None);
}

#[test]
fn test_bounded_cache_drops_oldest() {
    let cache = KernelCache::with_limit(2);
    assert_eq!(cache.limit(), Some(2));
    for (i, nx) in [10, 20, 30].into_iter().enumerate() {
        cache
            .get_or_build(&key(nx), || Ok::<_, ConvFuncError>(store(i as f64)))
            .unwrap();
    }
    assert_eq!(cache.keys(), vec![key(20), key(30)]);

    // A zero limit still keeps the newest entry.
    let cache = KernelCache::with_limit(0);
    cache.insert(key(10), Arc::new(store(1.0)));
    cache.insert(key(20), Arc::new(store(2.0)));
    assert_eq!(cache.keys(), vec![key(20)]);
}

#[test]
fn test_remove_and_clear() {
    let cache = KernelCache::new();
    cache.insert(key(10), Arc::new(store(1.0)));
    cache.insert(key(20), Arc::new(store(2.0)));
    assert!(cache.remove(&key(10)).is_some());
    assert!(cache.remove(&key(10)).is_none());
    assert_eq!(cache.index_of(&key(20)), Some(0));
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_record_round_trip() {
    let cache = KernelCache::new();
    cache.insert(key(10), Arc::new(store(1.0)));
    cache.insert(key(20), Arc::new(store(3.0)));

    let mut record = Record::new();
    cache.to_record(&mut record).unwrap();
    assert_eq!(record.get_int("numconv").unwrap(), 2);
    for field in [
        "key0",
        "val0",
        "convfunctions0",
        "convsupportblock0",
        "key1",
        "convfunctions1",
        "convsizes",
        "wscalers",
        "convsamplings",
    ] {
        assert!(record.is_defined(field), "{field} is missing");
    }

    let restored = KernelCache::new();
    restored.from_record(&record).unwrap();
    assert_eq!(restored.keys(), cache.keys());
    for (k, s) in cache.entries() {
        assert_eq!(*restored.get(&k).unwrap(), *s);
    }
}

#[test]
fn test_record_with_single_scalars() {
    let cache = KernelCache::new();
    cache.insert(key(10), Arc::new(store(1.0)));
    let mut record = Record::new();
    cache.to_record(&mut record).unwrap();

    // Records without the per-entry vectors use the single values.
    record.remove("wscalers");
    record.remove("convsamplings");
    let restored = KernelCache::new();
    assert!(restored.from_record(&record).is_err());
    record.define("wscaler", RecordField::Float(0.5));
    record.define("convsampling", RecordField::Int(4));
    restored.from_record(&record).unwrap();
    assert_eq!(*restored.get(&key(10)).unwrap(), store(1.0));
}

#[test]
fn test_bad_record_leaves_cache_alone() {
    let cache = KernelCache::new();
    cache.insert(key(10), Arc::new(store(1.0)));
    cache.insert(key(20), Arc::new(store(2.0)));
    let mut record = Record::new();
    cache.to_record(&mut record).unwrap();
    record.remove("convsupportblock1");

    let restored = KernelCache::new();
    let result = restored.from_record(&record);
    assert!(matches!(
        result,
        Err(StoreError::Deserialization { field, .. }) if field == "convsupportblock1"
    ));
    assert!(restored.is_empty());
}
