//! Imagery sources for plume retrievals.
//!
//! The retrieval core only needs one thing from imagery: "give me band X
//! over this area on this day". [`ImageryProvider`] is that seam.
//!
//! ```text
//! fetch_band(collection, band, aoi, window)
//!        │
//!        ▼
//!  select_scene ── collection ∧ footprint ∩ aoi ∧ acquired ∈ window
//!        │         ordered by (acquired, id), first wins
//!        ▼
//!  read DN / reflectance ──► clip to aoi pixel window ──► SpectralBand
//! ```
//!
//! - [`LocalSceneArchive`]: scenes on disk, one directory per scene.
//! - [`InMemoryImagery`]: scenes held in memory.

pub mod archive;
pub mod memory;
pub mod provider;
pub mod scene;

pub use archive::LocalSceneArchive;
pub use memory::InMemoryImagery;
pub use provider::ImageryProvider;
pub use scene::{clip_to_aoi, select_scene, PixelWindow, SceneMetadata, SCENE_METADATA_FILE};
