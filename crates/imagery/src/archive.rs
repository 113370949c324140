//! Scenes stored on the local filesystem.
//!
//! Layout: one directory per scene, anywhere below the archive root.
//!
//! ```text
//! <root>/<scene>/scene.json   SceneMetadata
//! <root>/<scene>/B11.bin      little-endian u16 digital numbers, row-major
//! <root>/<scene>/B12.bin
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use plume_common::{
    AreaOfInterest, BandId, DateWindow, PlumeError, PlumeResult, Raster, SpectralBand,
};

use crate::provider::ImageryProvider;
use crate::scene::{clip_to_aoi, select_scene, SceneMetadata, SCENE_METADATA_FILE};

#[derive(Debug, Clone)]
struct ArchivedScene {
    metadata: SceneMetadata,
    dir: PathBuf,
}

/// Imagery provider over a directory of archived scenes.
///
/// The archive is indexed once on [`LocalSceneArchive::open`]; band files are
/// read on demand.
#[derive(Debug, Clone)]
pub struct LocalSceneArchive {
    root: PathBuf,
    scenes: Arc<Vec<ArchivedScene>>,
}

impl LocalSceneArchive {
    /// Index every scene below `root`.
    pub async fn open(root: impl Into<PathBuf>) -> PlumeResult<Self> {
        let root = root.into();
        let scan_root = root.clone();
        let scenes = tokio::task::spawn_blocking(move || scan(&scan_root))
            .await
            .map_err(|e| PlumeError::storage(format!("archive scan task failed: {}", e)))??;

        info!(
            root = %root.display(),
            scenes = scenes.len(),
            "Indexed scene archive"
        );

        Ok(Self {
            root,
            scenes: Arc::new(scenes),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Metadata of every indexed scene.
    pub fn scenes(&self) -> impl Iterator<Item = &SceneMetadata> {
        self.scenes.iter().map(|s| &s.metadata)
    }
}

fn scan(root: &Path) -> PlumeResult<Vec<ArchivedScene>> {
    if !root.is_dir() {
        return Err(PlumeError::storage(format!(
            "scene archive {} is not a directory",
            root.display()
        )));
    }

    let mut scenes = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| PlumeError::storage(format!("archive walk: {}", e)))?;
        if !entry.file_type().is_file() || entry.file_name() != SCENE_METADATA_FILE {
            continue;
        }

        let path = entry.path();
        match read_metadata(path) {
            Ok(metadata) => {
                let dir = path.parent().unwrap_or(root).to_path_buf();
                debug!(scene = %metadata.id, dir = %dir.display(), "Found scene");
                scenes.push(ArchivedScene { metadata, dir });
            }
            Err(e) => {
                // One broken scene must not hide the rest of the archive.
                warn!(path = %path.display(), error = %e, "Skipping unreadable scene");
            }
        }
    }

    Ok(scenes)
}

fn read_metadata(path: &Path) -> PlumeResult<SceneMetadata> {
    let bytes = std::fs::read(path)?;
    let metadata: SceneMetadata = serde_json::from_slice(&bytes)?;
    metadata.validate()?;
    Ok(metadata)
}

/// Decode little-endian `u16` digital numbers into reflectance.
fn decode_reflectance(bytes: &[u8], quantification: f64) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| (u16::from_le_bytes([pair[0], pair[1]]) as f64 / quantification) as f32)
        .collect()
}

fn read_band(
    scene: &SceneMetadata,
    path: &Path,
    aoi: &AreaOfInterest,
) -> PlumeResult<Raster> {
    let bytes = std::fs::read(path)
        .map_err(|e| PlumeError::storage(format!("reading {}: {}", path.display(), e)))?;

    let expected = scene.width * scene.height * 2;
    if bytes.len() != expected {
        return Err(PlumeError::storage(format!(
            "{} holds {} bytes, expected {} for a {} u16 grid",
            path.display(),
            bytes.len(),
            expected,
            scene.shape()
        )));
    }

    let samples = decode_reflectance(&bytes, scene.quantification);
    clip_to_aoi(scene, &samples, aoi)
}

#[async_trait]
impl ImageryProvider for LocalSceneArchive {
    async fn fetch_band(
        &self,
        collection: &str,
        band: &BandId,
        aoi: &AreaOfInterest,
        window: &DateWindow,
    ) -> PlumeResult<SpectralBand> {
        let picked = select_scene(self.scenes(), collection, aoi, window)?;
        let archived = self
            .scenes
            .iter()
            .find(|s| std::ptr::eq(&s.metadata, picked))
            .ok_or_else(|| PlumeError::storage(format!("scene {} is not indexed", picked.id)))?;
        let scene = archived.metadata.clone();

        let file = scene.band_file(band).ok_or_else(|| {
            PlumeError::no_imagery(format!("scene {} has no band {}", scene.id, band))
        })?;
        let path = archived.dir.join(file);

        debug!(scene = %scene.id, band = %band, path = %path.display(), "Reading band");

        let area = *aoi;
        let metadata = scene.clone();
        let raster = tokio::task::spawn_blocking(move || read_band(&metadata, &path, &area))
            .await
            .map_err(|e| PlumeError::storage(format!("band read task failed: {}", e)))??;

        info!(
            scene = %scene.id,
            band = %band,
            rows = raster.shape.rows,
            cols = raster.shape.cols,
            "Fetched band"
        );

        Ok(SpectralBand::new(band.clone(), raster, *aoi, scene.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reflectance() {
        let bytes: Vec<u8> = [0u16, 5000, 10000, 2500]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let values = decode_reflectance(&bytes, 10000.0);
        assert_eq!(values, vec![0.0, 0.5, 1.0, 0.25]);
    }
}
