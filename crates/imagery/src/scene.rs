//! Scene metadata, deterministic scene selection and AOI clipping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plume_common::{
    AreaOfInterest, BandId, DateWindow, PlumeError, PlumeResult, Raster, RasterShape,
};

/// Name of the metadata file inside every archived scene directory.
pub const SCENE_METADATA_FILE: &str = "scene.json";

/// Slack, in pixels, when snapping AOI edges onto the scene grid.
const EDGE_TOLERANCE_PX: f64 = 1e-6;

/// Description of one acquired scene.
///
/// The grid is north-up and equirectangular: row 0 lies along `bounds.max_lat`
/// and column 0 along `bounds.min_lon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub id: String,
    pub collection: String,
    #[serde(default)]
    pub spacecraft: Option<String>,
    pub acquired: DateTime<Utc>,
    pub bounds: AreaOfInterest,
    pub width: usize,
    pub height: usize,
    /// Ground sample distance (m).
    pub resolution_m: f64,
    /// Digital number corresponding to reflectance 1.0.
    #[serde(default = "default_quantification")]
    pub quantification: f64,
    /// Band id to file name, relative to the scene directory.
    #[serde(default)]
    pub bands: BTreeMap<String, String>,
}

fn default_quantification() -> f64 {
    10000.0
}

impl SceneMetadata {
    pub fn validate(&self) -> PlumeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PlumeError::invalid_input(
                "scene",
                format!("{}: empty grid {}x{}", self.id, self.height, self.width),
            ));
        }
        if !self.resolution_m.is_finite() || self.resolution_m <= 0.0 {
            return Err(PlumeError::invalid_input(
                "scene",
                format!("{}: resolution {} m", self.id, self.resolution_m),
            ));
        }
        if !self.quantification.is_finite() || self.quantification <= 0.0 {
            return Err(PlumeError::invalid_input(
                "scene",
                format!("{}: quantification value {}", self.id, self.quantification),
            ));
        }
        let b = &self.bounds;
        if !(b.max_lon > b.min_lon && b.max_lat > b.min_lat) {
            return Err(PlumeError::invalid_input(
                "scene",
                format!("{}: empty footprint {}", self.id, b.cache_key()),
            ));
        }
        Ok(())
    }

    pub fn shape(&self) -> RasterShape {
        RasterShape::new(self.height, self.width)
    }

    /// File holding `band`, if the scene has it.
    pub fn band_file(&self, band: &BandId) -> Option<&str> {
        self.bands.get(band.as_str()).map(String::as_str)
    }

    /// Whether this scene is a candidate for the given request.
    pub fn matches(&self, collection: &str, aoi: &AreaOfInterest, window: &DateWindow) -> bool {
        self.collection == collection
            && self.bounds.intersects(aoi)
            && window.contains(&self.acquired)
    }

    /// Pixel window covering `aoi` on this scene's grid.
    ///
    /// The window may extend past the grid when the AOI is not fully inside
    /// the footprint.
    pub fn pixel_window(&self, aoi: &AreaOfInterest) -> PixelWindow {
        let b = &self.bounds;
        let dx = (b.max_lon - b.min_lon) / self.width as f64;
        let dy = (b.max_lat - b.min_lat) / self.height as f64;

        let col_start = ((aoi.min_lon - b.min_lon) / dx + EDGE_TOLERANCE_PX).floor() as i64;
        let col_end = ((aoi.max_lon - b.min_lon) / dx - EDGE_TOLERANCE_PX).ceil() as i64;
        let row_start = ((b.max_lat - aoi.max_lat) / dy + EDGE_TOLERANCE_PX).floor() as i64;
        let row_end = ((b.max_lat - aoi.min_lat) / dy - EDGE_TOLERANCE_PX).ceil() as i64;

        PixelWindow {
            row_start,
            col_start,
            rows: (row_end - row_start).max(0) as usize,
            cols: (col_end - col_start).max(0) as usize,
        }
    }
}

/// A rectangle of scene pixels; the origin may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_start: i64,
    pub col_start: i64,
    pub rows: usize,
    pub cols: usize,
}

impl PixelWindow {
    pub fn shape(&self) -> RasterShape {
        RasterShape::new(self.rows, self.cols)
    }
}

/// Pick the scene serving a request.
///
/// Candidates must belong to `collection`, intersect `aoi` and be acquired
/// inside `window`. Among them the earliest acquisition wins, ties broken by
/// scene id, so the choice never depends on discovery order.
pub fn select_scene<'a, I>(
    scenes: I,
    collection: &str,
    aoi: &AreaOfInterest,
    window: &DateWindow,
) -> PlumeResult<&'a SceneMetadata>
where
    I: IntoIterator<Item = &'a SceneMetadata>,
{
    scenes
        .into_iter()
        .filter(|scene| scene.matches(collection, aoi, window))
        .min_by(|a, b| (a.acquired, &a.id).cmp(&(b.acquired, &b.id)))
        .ok_or_else(|| {
            PlumeError::no_imagery(format!(
                "no {} scene covers {} during {}",
                collection,
                aoi.cache_key(),
                window
            ))
        })
}

/// Cut the pixel window of `aoi` out of a full-scene sample grid.
///
/// `samples` is row-major over the whole scene. Cells of the window that fall
/// outside the scene are NaN.
pub fn clip_to_aoi(
    scene: &SceneMetadata,
    samples: &[f32],
    aoi: &AreaOfInterest,
) -> PlumeResult<Raster> {
    let expected = scene.width * scene.height;
    if samples.len() != expected {
        return Err(PlumeError::storage(format!(
            "scene {} has {} samples, expected {} for {}",
            scene.id,
            samples.len(),
            expected,
            scene.shape()
        )));
    }

    let window = scene.pixel_window(aoi);
    if window.rows == 0 || window.cols == 0 {
        return Err(PlumeError::no_imagery(format!(
            "{} covers no pixel of scene {}",
            aoi.cache_key(),
            scene.id
        )));
    }

    let mut data = Vec::with_capacity(window.rows * window.cols);
    for r in 0..window.rows {
        let src_row = window.row_start + r as i64;
        for c in 0..window.cols {
            let src_col = window.col_start + c as i64;
            let inside = (0..scene.height as i64).contains(&src_row)
                && (0..scene.width as i64).contains(&src_col);
            data.push(if inside {
                samples[src_row as usize * scene.width + src_col as usize]
            } else {
                f32::NAN
            });
        }
    }

    Raster::new(window.shape(), scene.resolution_m, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scene(id: &str, day: u32, hour: u32) -> SceneMetadata {
        SceneMetadata {
            id: id.to_string(),
            collection: "S2".to_string(),
            spacecraft: None,
            acquired: Utc.with_ymd_and_hms(2019, 11, day, hour, 0, 0).unwrap(),
            bounds: AreaOfInterest::new(0.0, 0.0, 4.0, 4.0),
            width: 4,
            height: 4,
            resolution_m: 20.0,
            quantification: 10000.0,
            bands: BTreeMap::new(),
        }
    }

    fn day(d: &str) -> DateWindow {
        DateWindow::parse_day(d).unwrap()
    }

    #[test]
    fn test_selection_is_earliest_then_by_id() {
        let scenes = vec![scene("c", 20, 11), scene("b", 20, 10), scene("a", 20, 10)];
        let aoi = AreaOfInterest::new(1.0, 1.0, 2.0, 2.0);
        let picked = select_scene(&scenes, "S2", &aoi, &day("2019-11-20")).unwrap();
        assert_eq!(picked.id, "a");

        let reversed: Vec<_> = scenes.iter().rev().cloned().collect();
        let picked = select_scene(&reversed, "S2", &aoi, &day("2019-11-20")).unwrap();
        assert_eq!(picked.id, "a");
    }

    #[test]
    fn test_selection_filters() {
        let scenes = vec![scene("a", 19, 10), scene("b", 21, 0)];
        let aoi = AreaOfInterest::new(1.0, 1.0, 2.0, 2.0);
        let err = select_scene(&scenes, "S2", &aoi, &day("2019-11-20")).unwrap_err();
        assert!(matches!(err, PlumeError::NoImageryFound(_)));

        let far = AreaOfInterest::new(10.0, 10.0, 11.0, 11.0);
        assert!(select_scene(&scenes, "S2", &far, &day("2019-11-19")).is_err());
        assert!(select_scene(&scenes, "L8", &aoi, &day("2019-11-19")).is_err());
    }

    #[test]
    fn test_pixel_window_snaps_to_grid() {
        let s = scene("a", 20, 10);
        // Full footprint.
        let w = s.pixel_window(&s.bounds);
        assert_eq!((w.row_start, w.col_start, w.rows, w.cols), (0, 0, 4, 4));

        // Lon [1, 3) is columns 1..3; lat [2, 4] is rows 0..2 (north-up).
        let w = s.pixel_window(&AreaOfInterest::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!((w.row_start, w.col_start, w.rows, w.cols), (0, 1, 2, 2));

        // Partial pixels are included.
        let w = s.pixel_window(&AreaOfInterest::new(1.5, 1.5, 2.5, 2.5));
        assert_eq!((w.row_start, w.col_start, w.rows, w.cols), (1, 1, 2, 2));
    }

    #[test]
    fn test_clip_pads_outside_footprint() {
        let s = scene("a", 20, 10);
        let samples: Vec<f32> = (0..16).map(|i| i as f32).collect();

        let raster = clip_to_aoi(&s, &samples, &AreaOfInterest::new(3.0, 3.0, 5.0, 5.0)).unwrap();
        assert_eq!(raster.shape, RasterShape::new(2, 2));
        // Only the top-right scene pixel (row 0, col 3) overlaps.
        assert!(raster.get(0, 0).unwrap().is_nan());
        assert!(raster.get(0, 1).unwrap().is_nan());
        assert_eq!(raster.get(1, 0), Some(3.0));
        assert!(raster.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_clip_rejects_truncated_samples() {
        let s = scene("a", 20, 10);
        let err = clip_to_aoi(&s, &[0.0; 15], &s.bounds).unwrap_err();
        assert!(matches!(err, PlumeError::Storage(_)));
    }

    #[test]
    fn test_metadata_validation() {
        let mut s = scene("a", 20, 10);
        assert!(s.validate().is_ok());
        s.quantification = 0.0;
        assert!(s.validate().is_err());
    }
}
