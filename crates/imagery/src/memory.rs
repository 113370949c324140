//! Scenes held in memory.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use plume_common::{AreaOfInterest, BandId, DateWindow, PlumeError, PlumeResult, SpectralBand};

use crate::provider::ImageryProvider;
use crate::scene::{clip_to_aoi, select_scene, SceneMetadata};

#[derive(Debug, Clone)]
struct MemoryScene {
    metadata: SceneMetadata,
    /// Full-scene reflectance per band, row-major.
    bands: HashMap<BandId, Vec<f32>>,
}

/// Imagery provider over scenes registered in memory.
///
/// Selection and clipping follow the same rules as the on-disk archive, so
/// both providers return identical bands for identical scenes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryImagery {
    scenes: Vec<MemoryScene>,
}

impl InMemoryImagery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scene with full-grid reflectance for each of its bands.
    pub fn add_scene(
        &mut self,
        metadata: SceneMetadata,
        bands: impl IntoIterator<Item = (BandId, Vec<f32>)>,
    ) -> PlumeResult<()> {
        metadata.validate()?;

        let expected = metadata.width * metadata.height;
        let mut stored = HashMap::new();
        for (band, samples) in bands {
            if samples.len() != expected {
                return Err(PlumeError::invalid_input(
                    "bands",
                    format!(
                        "band {} of scene {} has {} samples, expected {}",
                        band,
                        metadata.id,
                        samples.len(),
                        expected
                    ),
                ));
            }
            stored.insert(band, samples);
        }

        self.scenes.push(MemoryScene {
            metadata,
            bands: stored,
        });
        Ok(())
    }

    /// Builder-style [`add_scene`](Self::add_scene).
    pub fn with_scene(
        mut self,
        metadata: SceneMetadata,
        bands: impl IntoIterator<Item = (BandId, Vec<f32>)>,
    ) -> PlumeResult<Self> {
        self.add_scene(metadata, bands)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

#[async_trait]
impl ImageryProvider for InMemoryImagery {
    async fn fetch_band(
        &self,
        collection: &str,
        band: &BandId,
        aoi: &AreaOfInterest,
        window: &DateWindow,
    ) -> PlumeResult<SpectralBand> {
        let picked = select_scene(
            self.scenes.iter().map(|s| &s.metadata),
            collection,
            aoi,
            window,
        )?;
        let scene = self
            .scenes
            .iter()
            .find(|s| std::ptr::eq(&s.metadata, picked))
            .ok_or_else(|| PlumeError::storage(format!("scene {} is not registered", picked.id)))?;

        let samples = scene.bands.get(band).ok_or_else(|| {
            PlumeError::no_imagery(format!("scene {} has no band {}", picked.id, band))
        })?;

        let raster = clip_to_aoi(picked, samples, aoi)?;
        debug!(scene = %picked.id, band = %band, shape = %raster.shape, "Served band from memory");

        Ok(SpectralBand::new(band.clone(), raster, *aoi, picked.id.clone()))
    }
}
