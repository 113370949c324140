//! The imagery collaborator seam.

use async_trait::async_trait;
use plume_common::{AreaOfInterest, BandId, DateWindow, PlumeResult, SpectralBand};

/// Source of spectral bands clipped to an area of interest.
#[async_trait]
pub trait ImageryProvider: Send + Sync {
    /// Fetch one band of the first matching scene in `collection`.
    ///
    /// The returned band is tagged with `aoi`. Fails with `NoImageryFound`
    /// when no scene of the collection covers the area inside the window.
    async fn fetch_band(
        &self,
        collection: &str,
        band: &BandId,
        aoi: &AreaOfInterest,
        window: &DateWindow,
    ) -> PlumeResult<SpectralBand>;
}
