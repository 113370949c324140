//! End-to-end retrievals over an on-disk scene archive.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use imagery::LocalSceneArchive;
use inversion::{InversionConfig, InversionError, LayeredBeerLambert, RadiativeTransferModel};
use plume_common::{AreaOfInterest, GeoPoint, RasterShape};
use retriever::output::{read_f32_le, CONCENTRATION_NAME, SIGNAL_NAME};
use retriever::{write_outputs, Pipeline, RetrieverConfig};
use test_utils::fixtures::{hassi_messaoud, ArchiveFixture, SceneFixture};
use test_utils::generators::test_aoi;
use test_utils::{assert_all_cells_approx, assert_approx_eq};

const PLUME_ACQUIRED: &str = "2019-11-20T10:13:21Z";
const REFERENCE_ACQUIRED: &str = "2019-10-06T10:10:29Z";

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn hassi_config() -> RetrieverConfig {
    let source = GeoPoint::new(hassi_messaoud::SOURCE_LON, hassi_messaoud::SOURCE_LAT).unwrap();
    let mut config = RetrieverConfig::new(source, date(hassi_messaoud::PLUME_DATE));
    config.half_width_m = hassi_messaoud::HALF_WIDTH_M;
    config.dispatch.workers = 4;
    config
}

/// A 3×3 scene covering exactly the Hassi Messaoud area of interest.
fn hassi_scene(id: &str, acquired: &str, b11: u16, b12: u16) -> SceneFixture {
    let aoi: AreaOfInterest = test_aoi();
    SceneFixture::uniform(
        id,
        acquired,
        (aoi.min_lon, aoi.min_lat, aoi.max_lon, aoi.max_lat),
        3,
        3,
        &[("B11", b11), ("B12", b12)],
    )
}

async fn pipeline_over(archive: &ArchiveFixture) -> Pipeline {
    let imagery = LocalSceneArchive::open(archive.path()).await.unwrap();
    Pipeline::new(Arc::new(imagery), Arc::new(LayeredBeerLambert))
}

// ============================================================================
// Single pass
// ============================================================================

#[tokio::test]
async fn test_uniform_scene_end_to_end() {
    let archive = ArchiveFixture::new();
    archive.add_scene(&hassi_scene(
        hassi_messaoud::PLUME_SCENE_ID,
        PLUME_ACQUIRED,
        5000,
        6000,
    ));
    let pipeline = pipeline_over(&archive).await;
    let config = hassi_config();

    let run = pipeline.run(&config).await.unwrap();

    assert_eq!(run.aoi, test_aoi());
    assert_eq!(run.plume.scene_id, hassi_messaoud::PLUME_SCENE_ID);
    assert_approx_eq!(run.plume.scale.value(), 1.2, 1e-6);
    assert!(run.reference.is_none());

    // F = (1.2 · 0.6 − 0.5) / 0.5
    assert_eq!(run.signal.raster.shape, RasterShape::new(3, 3));
    assert_eq!(run.signal.raster.valid_count(), 9);
    assert_all_cells_approx!(run.signal.raster, 0.44, 1e-5);

    let report = &run.report;
    assert_eq!(report.inverted, 9);
    assert_eq!(report.failed, 0);
    assert!(!report.incomplete);

    let expected = LayeredBeerLambert
        .retrieve(run.signal.raster.data[0] as f64, &config.inversion)
        .unwrap() as f32;
    for v in &report.concentration.raster.data {
        assert_eq!(v.to_bits(), expected.to_bits());
    }
}

#[tokio::test]
async fn test_repeat_run_hits_scale_factor_cache() {
    let archive = ArchiveFixture::new();
    archive.add_scene(&hassi_scene("plume", PLUME_ACQUIRED, 5000, 6000));
    let pipeline = pipeline_over(&archive).await;
    let config = hassi_config();

    let first = pipeline.run(&config).await.unwrap();
    let second = pipeline.run(&config).await.unwrap();

    let stats = pipeline.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
    assert_eq!(first.plume.scale, second.plume.scale);

    let bits = |r: &retriever::RetrievalRun| -> Vec<u32> {
        r.report
            .concentration
            .raster
            .data
            .iter()
            .map(|v| v.to_bits())
            .collect()
    };
    assert_eq!(bits(&first), bits(&second));
}

#[tokio::test]
async fn test_same_day_collections_do_not_share_scale_factor() {
    let archive = ArchiveFixture::new();
    archive.add_scene(&hassi_scene("s2", PLUME_ACQUIRED, 5000, 6000));
    let mut landsat = hassi_scene("l8", PLUME_ACQUIRED, 5000, 4000);
    landsat.collection = "LANDSAT-8".to_string();
    archive.add_scene(&landsat);
    let pipeline = pipeline_over(&archive).await;

    let mut config = hassi_config();
    let s2 = pipeline.run(&config).await.unwrap();
    config.imagery.collection = "LANDSAT-8".to_string();
    let l8 = pipeline.run(&config).await.unwrap();

    assert_eq!(s2.plume.scene_id, "s2");
    assert_approx_eq!(s2.plume.scale.value(), 1.2, 1e-6);
    assert_eq!(l8.plume.scene_id, "l8");
    assert_approx_eq!(l8.plume.scale.value(), 0.8, 1e-6);
    // F = (0.8 · 0.4 − 0.5) / 0.5
    assert_all_cells_approx!(l8.signal.raster, -0.36, 1e-5);
    assert_eq!(l8.signal.masked_count(), 0);
    assert_eq!(pipeline.cache().stats().hits, 0);
}

#[tokio::test]
async fn test_missing_overpass_fails_before_inversion() {
    let archive = ArchiveFixture::new();
    archive.add_scene(&hassi_scene("reference", REFERENCE_ACQUIRED, 5000, 6000));
    let pipeline = pipeline_over(&archive).await;

    let err = pipeline.run(&hassi_config()).await.unwrap_err();
    assert_eq!(err.code(), "no_imagery_found");
    assert_eq!(pipeline.cache().stats().misses, 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let archive = ArchiveFixture::new();
    let pipeline = pipeline_over(&archive).await;

    let mut config = hassi_config();
    config.half_width_m = 0.0;
    let err = pipeline.run(&config).await.unwrap_err();
    assert_eq!(err.code(), "invalid_input");
}

// ============================================================================
// Reference-day differencing
// ============================================================================

#[tokio::test]
async fn test_reference_day_isolates_plume() {
    let archive = ArchiveFixture::new();

    // Plume day: the centre pixel absorbs 10% of SWIR2.
    let mut plume = hassi_scene(hassi_messaoud::PLUME_SCENE_ID, PLUME_ACQUIRED, 5000, 6000);
    let mut b12 = vec![6000u16; 9];
    b12[4] = 5400;
    plume.bands = vec![("B11".to_string(), vec![5000; 9]), ("B12".to_string(), b12)];
    archive.add_scene(&plume);
    archive.add_scene(&hassi_scene(
        hassi_messaoud::REFERENCE_SCENE_ID,
        REFERENCE_ACQUIRED,
        5000,
        6000,
    ));

    let pipeline = pipeline_over(&archive).await;
    let mut config = hassi_config();
    config.reference_date = Some(date(hassi_messaoud::REFERENCE_DATE));

    let run = pipeline.run(&config).await.unwrap();
    let reference = run.reference.as_ref().unwrap();
    assert_eq!(reference.scene_id, hassi_messaoud::REFERENCE_SCENE_ID);
    assert_approx_eq!(reference.scale.value(), 1.2, 1e-6);
    // c = (8 · 0.30 + 0.27) / (9 · 0.25)
    assert_approx_eq!(run.plume.scale.value(), 2.67 / 2.25, 1e-6);

    let signal = &run.signal.raster;
    assert_approx_eq!(signal.get(1, 1).unwrap(), -0.1584, 1e-4);
    for (i, v) in signal.data.iter().enumerate() {
        if i != 4 {
            assert_approx_eq!(*v, -0.016, 1e-4);
        }
    }

    let concentration = &run.report.concentration.raster;
    let centre = concentration.get(1, 1).unwrap();
    let edge = concentration.get(0, 0).unwrap();
    assert!(edge > 0.0);
    assert!(centre > edge);
    assert_eq!(run.report.concentration.range.unwrap().max, centre);
}

// ============================================================================
// Timeout
// ============================================================================

struct SlowModel;

impl RadiativeTransferModel for SlowModel {
    fn retrieve(&self, value: f64, config: &InversionConfig) -> Result<f64, InversionError> {
        std::thread::sleep(Duration::from_millis(300));
        LayeredBeerLambert.retrieve(value, config)
    }
}

#[tokio::test]
async fn test_timeout_yields_incomplete_report() {
    let archive = ArchiveFixture::new();
    archive.add_scene(&hassi_scene("plume", PLUME_ACQUIRED, 5000, 6000));
    let imagery = LocalSceneArchive::open(archive.path()).await.unwrap();
    let pipeline = Pipeline::new(Arc::new(imagery), Arc::new(SlowModel));

    let mut config = hassi_config();
    config.dispatch.workers = 3;
    config.dispatch.options.timeout = Some(Duration::from_millis(50));

    let run = pipeline.run(&config).await.unwrap();
    assert!(run.report.incomplete);
    assert!(run.report.timed_out);
    assert_eq!(run.report.unprocessed, 9);
    assert_eq!(run.report.concentration.raster.shape, RasterShape::new(3, 3));
    assert!(run.report.concentration.raster.data.iter().all(|v| v.is_nan()));
}

// ============================================================================
// Outputs
// ============================================================================

#[tokio::test]
async fn test_outputs_round_trip() {
    let archive = ArchiveFixture::new();
    archive.add_scene(&hassi_scene("plume", PLUME_ACQUIRED, 5000, 6000));
    let pipeline = pipeline_over(&archive).await;
    let config = hassi_config();
    let run = pipeline.run(&config).await.unwrap();

    let out = tempfile::tempdir().unwrap();
    let files = write_outputs(out.path(), &run, &config.inversion).unwrap();

    assert_eq!(files.signal, out.path().join(format!("{}.f32", SIGNAL_NAME)));
    assert_eq!(
        files.concentration,
        out.path().join(format!("{}.f32", CONCENTRATION_NAME))
    );

    let concentration = read_f32_le(&files.concentration).unwrap();
    assert_eq!(concentration, run.report.concentration.raster.data);
    let signal = read_f32_le(&files.signal).unwrap();
    assert_eq!(signal, run.signal.raster.data);

    let sidecar: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&files.concentration_sidecar).unwrap()).unwrap();
    assert_eq!(sidecar["shape"]["rows"], 3);
    assert_eq!(sidecar["shape"]["cols"], 3);
    assert_eq!(sidecar["units"], "mol/m2");
    assert_eq!(sidecar["inverted"], 9);
    assert_eq!(sidecar["incomplete"], false);
    assert_eq!(sidecar["inversion"]["instrument"], "S2A");

    let sidecar: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&files.signal_sidecar).unwrap()).unwrap();
    assert_eq!(sidecar["scene_id"], "plume");
    assert_eq!(sidecar["kind"], "mbsp");
    assert!(sidecar["reference_scene_id"].is_null());
}
