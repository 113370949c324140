//! Raster outputs for downstream visualisation.
//!
//! Each raster is written as a raw little-endian `f32` array (`<name>.f32`,
//! row-major, NaN for invalid cells) next to a JSON sidecar (`<name>.json`)
//! describing its grid and provenance.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use inversion::InversionConfig;
use mbsp::SignalKind;
use plume_common::{AreaOfInterest, Raster, RasterShape, ValueRange};

use crate::pipeline::RetrievalRun;

pub const SIGNAL_NAME: &str = "fractional_signal";
pub const CONCENTRATION_NAME: &str = "concentration";

/// Sidecar of the fractional signal raster.
#[derive(Debug, Clone, Serialize)]
pub struct SignalSidecar {
    pub kind: SignalKind,
    pub shape: RasterShape,
    pub resolution_m: f64,
    pub aoi: AreaOfInterest,
    pub range: Option<ValueRange>,
    pub masked: usize,
    pub scene_id: String,
    pub scale_factor: f64,
    pub reference_scene_id: Option<String>,
    pub reference_scale_factor: Option<f64>,
    pub dtype: &'static str,
    pub byte_order: &'static str,
}

/// Sidecar of the concentration raster.
#[derive(Debug, Clone, Serialize)]
pub struct ConcentrationSidecar {
    pub units: &'static str,
    pub shape: RasterShape,
    pub resolution_m: f64,
    pub aoi: AreaOfInterest,
    pub range: Option<ValueRange>,
    pub inversion: InversionConfig,
    pub inverted: usize,
    pub masked: usize,
    pub failed: usize,
    pub unprocessed: usize,
    pub retried: usize,
    pub timed_out: bool,
    pub incomplete: bool,
    pub workers: usize,
    pub elapsed_ms: u64,
    pub dtype: &'static str,
    pub byte_order: &'static str,
}

/// Files written for one run.
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub signal: PathBuf,
    pub signal_sidecar: PathBuf,
    pub concentration: PathBuf,
    pub concentration_sidecar: PathBuf,
}

/// Write both rasters of `run` and their sidecars into `dir`.
pub fn write_outputs(
    dir: &Path,
    run: &RetrievalRun,
    inversion: &InversionConfig,
) -> Result<OutputFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let signal = &run.signal;
    let signal_sidecar = SignalSidecar {
        kind: signal.kind,
        shape: signal.raster.shape,
        resolution_m: signal.raster.resolution_m,
        aoi: run.aoi,
        range: signal.range,
        masked: signal.masked_count(),
        scene_id: run.plume.scene_id.clone(),
        scale_factor: run.plume.scale.value(),
        reference_scene_id: run.reference.as_ref().map(|r| r.scene_id.clone()),
        reference_scale_factor: run.reference.as_ref().map(|r| r.scale.value()),
        dtype: "float32",
        byte_order: "little",
    };
    let (signal_path, signal_sidecar_path) =
        write_raster(dir, SIGNAL_NAME, &signal.raster, &signal_sidecar)?;

    let report = &run.report;
    let concentration = &report.concentration;
    let concentration_sidecar = ConcentrationSidecar {
        units: "mol/m2",
        shape: concentration.raster.shape,
        resolution_m: concentration.raster.resolution_m,
        aoi: run.aoi,
        range: concentration.range,
        inversion: *inversion,
        inverted: report.inverted,
        masked: report.masked,
        failed: report.failed,
        unprocessed: report.unprocessed,
        retried: report.retried,
        timed_out: report.timed_out,
        incomplete: report.incomplete,
        workers: report.workers,
        elapsed_ms: report.elapsed.as_millis() as u64,
        dtype: "float32",
        byte_order: "little",
    };
    let (concentration_path, concentration_sidecar_path) = write_raster(
        dir,
        CONCENTRATION_NAME,
        &concentration.raster,
        &concentration_sidecar,
    )?;

    info!(dir = %dir.display(), "Wrote retrieval outputs");

    Ok(OutputFiles {
        signal: signal_path,
        signal_sidecar: signal_sidecar_path,
        concentration: concentration_path,
        concentration_sidecar: concentration_sidecar_path,
    })
}

fn write_raster<T: Serialize>(
    dir: &Path,
    name: &str,
    raster: &Raster,
    sidecar: &T,
) -> Result<(PathBuf, PathBuf)> {
    let data_path = dir.join(format!("{}.f32", name));
    std::fs::write(&data_path, f32_le_bytes(&raster.data))
        .with_context(|| format!("Failed to write {:?}", data_path))?;

    let sidecar_path = dir.join(format!("{}.json", name));
    let json = serde_json::to_vec_pretty(sidecar)
        .with_context(|| format!("Failed to serialize sidecar for {}", name))?;
    std::fs::write(&sidecar_path, json)
        .with_context(|| format!("Failed to write {:?}", sidecar_path))?;

    Ok((data_path, sidecar_path))
}

/// Little-endian bytes of an `f32` slice; zero-copy on little-endian hosts.
fn f32_le_bytes(data: &[f32]) -> Cow<'_, [u8]> {
    if cfg!(target_endian = "little") {
        Cow::Borrowed(bytemuck::cast_slice(data))
    } else {
        Cow::Owned(data.iter().flat_map(|v| v.to_le_bytes()).collect())
    }
}

/// Read back a raw `f32` array written by [`write_outputs`].
pub fn read_f32_le(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    anyhow::ensure!(
        bytes.len() % 4 == 0,
        "{:?} is not a whole number of f32 values",
        path
    );
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
