//! Retriever configuration.
//!
//! Loaded from a YAML file, then patched by command-line flags and
//! environment variables (see [`ConfigOverrides`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use serde::{Deserialize, Serialize};

use inversion::{DispatchOptions, Instrument, InversionConfig, Method};
use mbsp::MbspOptions;
use plume_common::{AreaOfInterest, BandId, DateWindow, GeoPoint, PlumeError, PlumeResult};

pub const DEFAULT_HALF_WIDTH_M: f64 = 5000.0;
pub const DEFAULT_COLLECTION: &str = "COPERNICUS/S2_HARMONIZED";

/// Everything one retrieval run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// The point source.
    pub source: GeoPoint,

    /// Half-width of the square area of interest (m).
    #[serde(default = "default_half_width_m")]
    pub half_width_m: f64,

    /// Day of the overpass with the plume.
    pub plume_date: NaiveDate,

    /// Day of an overpass without emission. When set, the plume signal is
    /// differenced against it.
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,

    #[serde(default)]
    pub imagery: ImageryConfig,

    #[serde(default)]
    pub mbsp: MbspOptions,

    #[serde(default)]
    pub inversion: InversionConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Directory receiving the output rasters and sidecars.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Where bands come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    /// Root of the local scene archive.
    pub archive: PathBuf,
    /// Product collection scenes must belong to.
    pub collection: String,
    /// Band with weak methane absorption (SWIR1).
    pub reference_band: BandId,
    /// Band with strong methane absorption (SWIR2).
    pub target_band: BandId,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            archive: PathBuf::from("./data/scenes"),
            collection: DEFAULT_COLLECTION.to_string(),
            reference_band: BandId::from("B11"),
            target_band: BandId::from("B12"),
        }
    }
}

/// Batch inversion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(flatten)]
    pub options: DispatchOptions,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            options: DispatchOptions::default(),
        }
    }
}

fn default_half_width_m() -> f64 {
    DEFAULT_HALF_WIDTH_M
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./out")
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl RetrieverConfig {
    /// A configuration with defaults for everything but the source and date.
    pub fn new(source: GeoPoint, plume_date: NaiveDate) -> Self {
        Self {
            source,
            half_width_m: DEFAULT_HALF_WIDTH_M,
            plume_date,
            reference_date: None,
            imagery: ImageryConfig::default(),
            mbsp: MbspOptions::default(),
            inversion: InversionConfig::default(),
            dispatch: DispatchConfig::default(),
            output_dir: default_output_dir(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse retriever config")
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("In config file {:?}", path))
    }

    /// Build the effective configuration from an optional file plus overrides.
    ///
    /// Without a file, the overrides must name the source and the plume date.
    pub fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match (overrides.lon, overrides.lat, overrides.plume_date) {
                (Some(lon), Some(lat), Some(date)) => Self::new(GeoPoint { lon, lat }, date),
                _ => bail!("without --config, --lon, --lat and --plume-date are required"),
            },
        };

        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Check the whole configuration before any imagery is fetched.
    pub fn validate(&self) -> PlumeResult<()> {
        self.source.validate()?;

        if !self.half_width_m.is_finite() || self.half_width_m <= 0.0 {
            return Err(PlumeError::invalid_input(
                "half_width_m",
                format!("{} is not a positive distance", self.half_width_m),
            ));
        }

        if self.reference_date == Some(self.plume_date) {
            return Err(PlumeError::invalid_input(
                "reference_date",
                "must differ from plume_date",
            ));
        }

        if self.imagery.collection.trim().is_empty() {
            return Err(PlumeError::invalid_input("collection", "must not be empty"));
        }
        if self.imagery.reference_band == self.imagery.target_band {
            return Err(PlumeError::invalid_input(
                "target_band",
                format!(
                    "reference and target band are both {}",
                    self.imagery.target_band
                ),
            ));
        }

        if self.dispatch.workers == 0 {
            return Err(PlumeError::invalid_input("workers", "must be >= 1"));
        }

        self.mbsp.validate()?;
        self.inversion.validate()?;
        self.dispatch.options.validate()?;
        Ok(())
    }

    /// Area of interest around the source.
    pub fn aoi(&self) -> PlumeResult<AreaOfInterest> {
        AreaOfInterest::around(self.source, self.half_width_m)
    }

    /// Acquisition window of the plume overpass: the date and the next day.
    pub fn plume_window(&self) -> DateWindow {
        DateWindow::day_of(self.plume_date)
    }

    pub fn reference_window(&self) -> Option<DateWindow> {
        self.reference_date.map(DateWindow::day_of)
    }
}

/// Command-line and environment overrides for [`RetrieverConfig`].
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Source longitude (degrees)
    #[arg(long, env = "PLUME_SOURCE_LON", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Source latitude (degrees)
    #[arg(long, env = "PLUME_SOURCE_LAT", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Plume overpass date (YYYY-MM-DD)
    #[arg(long, env = "PLUME_DATE")]
    pub plume_date: Option<NaiveDate>,

    /// Reference (no-emission) overpass date (YYYY-MM-DD)
    #[arg(long, env = "PLUME_REFERENCE_DATE")]
    pub reference_date: Option<NaiveDate>,

    /// Ignore any reference date and run single-pass
    #[arg(long)]
    pub single_pass: bool,

    /// Half-width of the area of interest (m)
    #[arg(long, env = "PLUME_HALF_WIDTH_M")]
    pub half_width_m: Option<f64>,

    /// Scene archive root
    #[arg(long, env = "PLUME_ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Product collection
    #[arg(long, env = "PLUME_COLLECTION")]
    pub collection: Option<String>,

    /// Reference (SWIR1) band id
    #[arg(long)]
    pub reference_band: Option<String>,

    /// Target (SWIR2) band id
    #[arg(long)]
    pub target_band: Option<String>,

    /// Instrument (S2A, S2B, L8, L9)
    #[arg(long, env = "PLUME_INSTRUMENT")]
    pub instrument: Option<Instrument>,

    /// Retrieval method (MBSP, MBMP, SBMP)
    #[arg(long)]
    pub method: Option<Method>,

    /// Solar zenith angle (degrees)
    #[arg(long)]
    pub solar_zenith_deg: Option<f64>,

    /// Viewing zenith angle (degrees)
    #[arg(long)]
    pub viewing_zenith_deg: Option<f64>,

    /// Target height above sea level (km)
    #[arg(long, allow_negative_numbers = true)]
    pub target_height_km: Option<f64>,

    /// Observer height above sea level (km)
    #[arg(long)]
    pub observer_height_km: Option<f64>,

    /// Number of atmospheric layers
    #[arg(long)]
    pub num_layers: Option<usize>,

    /// Inversion workers
    #[arg(long, env = "PLUME_WORKERS")]
    pub workers: Option<usize>,

    /// Global inversion deadline (ms)
    #[arg(long, env = "PLUME_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Attempts per pixel before it is marked failed
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Constant removed from the fractional signal
    #[arg(long, allow_negative_numbers = true)]
    pub fractional_offset: Option<f64>,

    /// Output directory
    #[arg(long, env = "PLUME_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Patch `config` with every override that was given.
    pub fn apply(&self, config: &mut RetrieverConfig) {
        if let Some(lon) = self.lon {
            config.source.lon = lon;
        }
        if let Some(lat) = self.lat {
            config.source.lat = lat;
        }
        if let Some(date) = self.plume_date {
            config.plume_date = date;
        }
        if self.single_pass {
            config.reference_date = None;
        } else if let Some(date) = self.reference_date {
            config.reference_date = Some(date);
        }
        if let Some(v) = self.half_width_m {
            config.half_width_m = v;
        }

        let imagery = &mut config.imagery;
        if let Some(archive) = &self.archive {
            imagery.archive = archive.clone();
        }
        if let Some(collection) = &self.collection {
            imagery.collection = collection.clone();
        }
        if let Some(band) = &self.reference_band {
            imagery.reference_band = BandId::new(band.as_str());
        }
        if let Some(band) = &self.target_band {
            imagery.target_band = BandId::new(band.as_str());
        }

        let inversion = &mut config.inversion;
        if let Some(instrument) = self.instrument {
            inversion.instrument = instrument;
        }
        if let Some(method) = self.method {
            inversion.method = method;
        }
        if let Some(v) = self.solar_zenith_deg {
            inversion.geometry.solar_zenith_deg = v;
        }
        if let Some(v) = self.viewing_zenith_deg {
            inversion.geometry.viewing_zenith_deg = v;
        }
        if let Some(v) = self.target_height_km {
            inversion.geometry.target_height_km = v;
        }
        if let Some(v) = self.observer_height_km {
            inversion.geometry.observer_height_km = v;
        }
        if let Some(v) = self.num_layers {
            inversion.num_layers = v;
        }

        if let Some(v) = self.workers {
            config.dispatch.workers = v;
        }
        if let Some(ms) = self.timeout_ms {
            config.dispatch.options.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(v) = self.max_attempts {
            config.dispatch.options.max_attempts = v;
        }
        if let Some(v) = self.fractional_offset {
            config.mbsp.fractional_offset = v;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
    }
}
