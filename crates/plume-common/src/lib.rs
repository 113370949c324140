//! Common types shared across the plume retrieval workspace.

pub mod aoi;
pub mod band;
pub mod error;
pub mod geo;
pub mod raster;
pub mod time;

pub use aoi::AreaOfInterest;
pub use band::{BandId, SpectralBand};
pub use error::{PlumeError, PlumeResult};
pub use geo::GeoPoint;
pub use raster::{Raster, RasterShape, ValueRange};
pub use time::DateWindow;
