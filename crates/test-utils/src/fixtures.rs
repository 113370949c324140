//! Common test fixtures for plume retrieval tests.
//!
//! The reference scenario is the Hassi Messaoud (Algeria) oil-field source
//! observed by Sentinel-2A on 2019-11-20.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// The Hassi Messaoud plume scenario.
pub mod hassi_messaoud {
    pub const SOURCE_LON: f64 = 5.9053;
    pub const SOURCE_LAT: f64 = 31.6585;

    /// Half-width of the 10 km search square.
    pub const HALF_WIDTH_M: f64 = 5000.0;

    /// Overpass with a visible plume.
    pub const PLUME_DATE: &str = "2019-11-20";

    /// Overpass over the same area without emission.
    pub const REFERENCE_DATE: &str = "2019-10-06";

    pub const COLLECTION: &str = "COPERNICUS/S2_HARMONIZED";
    pub const PLUME_SCENE_ID: &str = "20191120T101321_20191120T101408_T31SGR";
    pub const REFERENCE_SCENE_ID: &str = "20191006T101029_20191006T101519_T31SGR";
}

/// Radiative-transfer settings used for the original Hassi Messaoud run.
pub mod radtran {
    pub const NUM_LAYERS: usize = 100;
    pub const TARGET_HEIGHT_KM: f64 = 0.0;
    pub const OBSERVER_HEIGHT_KM: f64 = 100.0;
    pub const SOLAR_ZENITH_DEG: f64 = 40.0;
    pub const VIEWING_ZENITH_DEG: f64 = 0.0;
    pub const INSTRUMENT: &str = "S2A";
    pub const METHOD: &str = "MBSP";
}

/// Description of one scene written into an [`ArchiveFixture`].
#[derive(Debug, Clone)]
pub struct SceneFixture {
    pub id: String,
    pub collection: String,
    pub spacecraft: String,
    /// RFC 3339 acquisition time.
    pub acquired: String,
    /// (min_lon, min_lat, max_lon, max_lat)
    pub bounds: (f64, f64, f64, f64),
    pub width: usize,
    pub height: usize,
    pub resolution_m: f64,
    pub quantification: f64,
    /// Band id and its row-major digital numbers.
    pub bands: Vec<(String, Vec<u16>)>,
}

impl SceneFixture {
    /// A Sentinel-2 scene with every band filled with constant digital numbers.
    pub fn uniform(
        id: &str,
        acquired: &str,
        bounds: (f64, f64, f64, f64),
        width: usize,
        height: usize,
        bands: &[(&str, u16)],
    ) -> Self {
        Self {
            id: id.to_string(),
            collection: hassi_messaoud::COLLECTION.to_string(),
            spacecraft: "Sentinel-2A".to_string(),
            acquired: acquired.to_string(),
            bounds,
            width,
            height,
            resolution_m: 20.0,
            quantification: 10000.0,
            bands: bands
                .iter()
                .map(|(name, dn)| (name.to_string(), vec![*dn; width * height]))
                .collect(),
        }
    }
}

/// A temporary scene archive laid out the way the local imagery provider expects:
/// one directory per scene holding `scene.json` and little-endian `u16` band files.
pub struct ArchiveFixture {
    dir: TempDir,
}

impl ArchiveFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp archive"),
        }
    }

    /// Root directory of the archive.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a scene into the archive and return its directory.
    pub fn add_scene(&self, scene: &SceneFixture) -> PathBuf {
        let scene_dir = self.dir.path().join(scene.id.replace('/', "_"));
        fs::create_dir_all(&scene_dir).expect("create scene dir");

        let mut band_files = serde_json::Map::new();
        for (name, dn) in &scene.bands {
            let file = format!("{}.bin", name);
            let bytes: Vec<u8> = dn.iter().flat_map(|v| v.to_le_bytes()).collect();
            fs::write(scene_dir.join(&file), bytes).expect("write band");
            band_files.insert(name.clone(), serde_json::Value::String(file));
        }

        let metadata = serde_json::json!({
            "id": scene.id,
            "collection": scene.collection,
            "spacecraft": scene.spacecraft,
            "acquired": scene.acquired,
            "bounds": {
                "min_lon": scene.bounds.0,
                "min_lat": scene.bounds.1,
                "max_lon": scene.bounds.2,
                "max_lat": scene.bounds.3,
            },
            "width": scene.width,
            "height": scene.height,
            "resolution_m": scene.resolution_m,
            "quantification": scene.quantification,
            "bands": band_files,
        });
        fs::write(
            scene_dir.join("scene.json"),
            serde_json::to_vec_pretty(&metadata).expect("serialize scene"),
        )
        .expect("write scene.json");

        scene_dir
    }
}

impl Default for ArchiveFixture {
    fn default() -> Self {
        Self::new()
    }
}
