//! LRU memoisation of band ratio scale factors.
//!
//! A regression over a fixed area, date and band pair is deterministic, so
//! repeated retrievals of the same overpass (e.g. re-running the inversion
//! with different geometry) can skip calibration.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;
use plume_common::{AreaOfInterest, BandId, DateWindow, PlumeResult, SpectralBand};
use tracing::debug;

use crate::calibrate::{calibrate, ScaleFactor};

/// Identity of one calibration: (date window, area, band pair, source scenes,
/// resolution).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScaleFactorKey {
    pub window: DateWindow,
    /// Quantized area key, see [`AreaOfInterest::cache_key`].
    pub aoi: String,
    pub band_a: BandId,
    pub band_b: BandId,
    /// Scenes the bands were read from. Different collections or archives
    /// overpassing on the same day never share a slope.
    pub scene_a: String,
    pub scene_b: String,
    /// Resolution in millimetres so the key stays hashable.
    pub resolution_mm: u64,
}

impl ScaleFactorKey {
    pub fn new(
        window: DateWindow,
        aoi: &AreaOfInterest,
        band_a: &SpectralBand,
        band_b: &SpectralBand,
    ) -> Self {
        Self {
            window,
            aoi: aoi.cache_key(),
            band_a: band_a.band.clone(),
            band_b: band_b.band.clone(),
            scene_a: band_a.scene_id.clone(),
            scene_b: band_b.scene_id.clone(),
            resolution_mm: (band_a.resolution_m() * 1000.0).round() as u64,
        }
    }
}

/// Hit/miss counters for the scale factor cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleFactorCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe LRU cache of calibrated scale factors.
pub struct ScaleFactorCache {
    cache: Mutex<LruCache<ScaleFactorKey, ScaleFactor>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScaleFactorCache {
    /// Create a cache holding at most `capacity` scale factors.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached scale factor.
    pub fn get(&self, key: &ScaleFactorKey) -> Option<ScaleFactor> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        match cache.get(key) {
            Some(scale) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("scale_factor_cache_hits_total").increment(1);
                Some(*scale)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("scale_factor_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Store a scale factor.
    pub fn insert(&self, key: ScaleFactorKey, scale: ScaleFactor) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(key, scale);
    }

    /// Return the cached scale factor for these bands, calibrating on a miss.
    ///
    /// Failed calibrations are not cached.
    pub fn get_or_calibrate(
        &self,
        window: DateWindow,
        aoi: &AreaOfInterest,
        band_a: &SpectralBand,
        band_b: &SpectralBand,
    ) -> PlumeResult<ScaleFactor> {
        let key = ScaleFactorKey::new(window, aoi, band_a, band_b);
        if let Some(scale) = self.get(&key) {
            debug!(window = %window, scale = scale.value(), "Scale factor cache hit");
            return Ok(scale);
        }

        let scale = calibrate(band_a, band_b, aoi)?;
        self.insert(key, scale);
        Ok(scale)
    }

    pub fn stats(&self) -> ScaleFactorCacheStats {
        let entries = self.cache.lock().unwrap_or_else(|e| e.into_inner()).len();
        ScaleFactorCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

impl Default for ScaleFactorCache {
    fn default() -> Self {
        Self::new(64)
    }
}
