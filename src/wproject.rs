// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The convolution-function machinery of a W-projection gridder.
//!
//! A [`WProjectConvFunc`] turns an image geometry into a padded grid, works
//! out the number of W planes and the W scaling, and fetches (or makes) the
//! matching [`ConvFunctionStore`] from its [`KernelCache`].

use std::{path::Path, sync::Arc};

use log::{debug, info};
use parking_lot::Mutex;

use crate::{
    cache::KernelCache,
    config::{ConfigError, WProjectionConfig},
    convfunc::{
        synthesise, CancelFlag, ConvFuncError, ConvFuncWarning, SpheroidalTaper, SynthesisParams,
    },
    record::{Record, RecordField},
    store::{ConvFunctionStore, StoreError},
    types::{CacheKey, ImageGeometry},
    wstats::{self, WStats},
};

/// What a gridder gets back when it asks for convolution functions.
#[derive(Debug, Clone)]
pub struct ConvFuncLookup {
    /// The convolution functions. Shared with the cache.
    pub store: Arc<ConvFunctionStore>,
    /// Did the store come from the cache?
    pub cache_hit: bool,
    /// Problems found while making the store. Always empty on a cache hit.
    pub warnings: Vec<ConvFuncWarning>,
    /// The cache key of the padded grid.
    pub key: CacheKey,
    /// The padded grid that the store was made for.
    pub grid: ImageGeometry,
}

/// The entry most recently asked for.
#[derive(Debug, Clone)]
struct Current {
    key: CacheKey,
    nx: usize,
    ny: usize,
}

/// Makes (or fetches) W-projection convolution functions for images.
#[derive(Debug)]
pub struct WProjectConvFunc {
    config: WProjectionConfig,
    cache: Arc<KernelCache>,
    current: Mutex<Option<Current>>,
}

impl WProjectConvFunc {
    /// Create a new [`WProjectConvFunc`] with its own cache.
    pub fn new(config: WProjectionConfig) -> Result<WProjectConvFunc, ConfigError> {
        let cache = match config.max_cached_kernels {
            Some(limit) => KernelCache::with_limit(limit),
            None => KernelCache::new(),
        };
        WProjectConvFunc::with_cache(config, Arc::new(cache))
    }

    /// Create a new [`WProjectConvFunc`] that uses (and fills) an existing
    /// cache. The cache's limit is left alone.
    pub fn with_cache(
        config: WProjectionConfig,
        cache: Arc<KernelCache>,
    ) -> Result<WProjectConvFunc, ConfigError> {
        config.validate()?;
        Ok(WProjectConvFunc {
            config,
            cache,
            current: Mutex::new(None),
        })
    }

    /// The parameters this engine makes convolution functions with.
    pub fn config(&self) -> &WProjectionConfig {
        &self.config
    }

    /// The cache used by this engine. It may be shared with other engines
    /// (see [`WProjectConvFunc::with_cache`]).
    pub fn cache(&self) -> &Arc<KernelCache> {
        &self.cache
    }

    /// The number of W planes to use for this image.
    pub fn w_planes(&self, image: &ImageGeometry, stats: Option<&WStats>) -> usize {
        match usize::try_from(self.config.w_planes) {
            Ok(n) if n > 0 => n,
            _ => wstats::auto_w_planes(stats, image.half_fov()),
        }
    }

    /// Get the convolution functions for `image`, making them if they aren't
    /// cached. W statistics, if available, set the W range (and the number of
    /// W planes if that isn't configured).
    pub fn find_conv_function(
        &self,
        image: &ImageGeometry,
        stats: Option<&WStats>,
    ) -> Result<ConvFuncLookup, ConvFuncError> {
        self.find(image, stats, None)
    }

    /// As [`WProjectConvFunc::find_conv_function`], but synthesis stops (and
    /// nothing is cached) if `cancel` is raised.
    pub fn find_conv_function_cancellable(
        &self,
        image: &ImageGeometry,
        stats: Option<&WStats>,
        cancel: &CancelFlag,
    ) -> Result<ConvFuncLookup, ConvFuncError> {
        self.find(image, stats, Some(cancel))
    }

    fn find(
        &self,
        image: &ImageGeometry,
        stats: Option<&WStats>,
        cancel: Option<&CancelFlag>,
    ) -> Result<ConvFuncLookup, ConvFuncError> {
        let grid = image.padded(self.config.padding);
        let key = grid.cache_key();
        debug!(
            "Image is {}x{}; padded grid is {}x{}",
            image.nx, image.ny, grid.nx, grid.ny
        );

        let mut warnings = vec![];
        let (store, cache_hit) = self.cache.get_or_build(&key, || {
            let w_planes = self.w_planes(image, stats);
            let max_w = wstats::max_w(stats, grid.incr_x);
            let w_scale = wstats::w_scale(w_planes, max_w);
            if w_planes > 1 {
                info!("W projection using {w_planes} planes");
                info!("Maximum W = {max_w} (wavelengths)");
                info!("Scaling in W (at maximum W) = {} wavelengths per pixel", 1.0 / w_scale);
            }

            let params = SynthesisParams::for_grid(&grid, w_planes, w_scale, &self.config)?;
            let taper = SpheroidalTaper::new(params.inner());
            let synthesis = synthesise(&params, &taper, cancel)?;
            warnings = synthesis.warnings;
            Ok(synthesis.store)
        })?;

        *self.current.lock() = Some(Current {
            key: key.clone(),
            nx: grid.nx,
            ny: grid.ny,
        });
        Ok(ConvFuncLookup {
            store,
            cache_hit,
            warnings,
            key,
            grid,
        })
    }

    /// The convolution functions most recently asked for, if they're still
    /// cached.
    pub fn current(&self) -> Option<(CacheKey, Arc<ConvFunctionStore>)> {
        let current = self.current.lock().clone()?;
        let store = self.cache.get(&current.key)?;
        Some((current.key, store))
    }

    /// Describe the whole cache, and the current convolution functions, as a
    /// [`Record`].
    ///
    /// Besides the cache's own fields (see [`KernelCache::to_record`]),
    /// `actualconvIndex` is the cache position of the current entry (-1 if
    /// there isn't one). The current entry's `convfunc`, `convsupport`,
    /// `convsize`, `wscaler` and `convsampling` are copied to the top level,
    /// along with the padded grid size `nx` and `ny`.
    pub fn to_record(&self) -> Result<Record, StoreError> {
        let mut record = Record::new();
        self.cache.to_record(&mut record)?;

        let current = self.current.lock().clone();
        let current = current.and_then(|c| {
            let index = self.cache.index_of(&c.key)?;
            let store = self.cache.get(&c.key)?;
            Some((c, index, store))
        });
        match current {
            Some((c, index, store)) => {
                let mut r = store.to_record()?;
                record.define("actualconvIndex", RecordField::Int(index as i64));
                for name in ["convsize", "convsupport", "convfunc", "wscaler", "convsampling"] {
                    if let Some(f) = r.remove(name) {
                        record.define(name, f);
                    }
                }
                record.define("nx", RecordField::Int(c.nx as i64));
                record.define("ny", RecordField::Int(c.ny as i64));
            }
            None => record.define("actualconvIndex", RecordField::Int(-1)),
        }
        Ok(record)
    }

    /// Fill the cache from a record made by [`WProjectConvFunc::to_record`],
    /// and make its current convolution functions current here.
    pub fn from_record(&self, record: &Record) -> Result<(), StoreError> {
        self.cache.from_record(record)?;
        let index = record.get_int("actualconvIndex")?;
        let current = match usize::try_from(index) {
            Ok(i) => Some(Current {
                key: CacheKey::from_string(record.get_str(&format!("key{i}"))?.to_string()),
                nx: record.get_usize("nx")?,
                ny: record.get_usize("ny")?,
            }),
            Err(_) => None,
        };
        *self.current.lock() = current;
        Ok(())
    }

    /// Save the cache to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        self.to_record()?.save(path)
    }

    /// Load a cache saved with [`WProjectConvFunc::save`].
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        self.from_record(&Record::load(path)?)
    }
}
