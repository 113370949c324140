//! End-to-end retrieval: imagery → fractional signal → column enhancement.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{info, instrument, warn};

use imagery::ImageryProvider;
use inversion::{DispatchReport, Dispatcher, RadiativeTransferModel};
use mbsp::{
    composite, retrieve_fractional_signal, FractionalSignalRaster, ScaleFactor, ScaleFactorCache,
};
use plume_common::{AreaOfInterest, DateWindow, PlumeResult};

use crate::config::RetrieverConfig;

/// One overpass reduced to its fractional signal.
#[derive(Debug, Clone)]
pub struct PassSignal {
    pub window: DateWindow,
    pub scene_id: String,
    pub scale: ScaleFactor,
    pub signal: FractionalSignalRaster,
}

/// Everything a retrieval produced.
#[derive(Debug, Clone)]
pub struct RetrievalRun {
    pub aoi: AreaOfInterest,
    pub plume: PassSignal,
    pub reference: Option<PassSignal>,
    /// The signal handed to the inversion: the plume pass, or the plume pass
    /// minus the reference pass.
    pub signal: FractionalSignalRaster,
    pub report: DispatchReport,
}

/// Runs retrievals against one imagery source and one physics model.
///
/// Scale factors are cached across runs, so repeated requests for the same
/// overpass skip the regression.
pub struct Pipeline {
    imagery: Arc<dyn ImageryProvider>,
    model: Arc<dyn RadiativeTransferModel>,
    cache: Arc<ScaleFactorCache>,
}

impl Pipeline {
    pub fn new(imagery: Arc<dyn ImageryProvider>, model: Arc<dyn RadiativeTransferModel>) -> Self {
        Self {
            imagery,
            model,
            cache: Arc::new(ScaleFactorCache::default()),
        }
    }

    /// Share a scale-factor cache with other pipelines.
    pub fn with_cache(mut self, cache: Arc<ScaleFactorCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &ScaleFactorCache {
        &self.cache
    }

    /// Run a full retrieval.
    ///
    /// Configuration, imagery and shape problems fail before any inversion
    /// starts. Inversion problems are reported in [`RetrievalRun::report`].
    #[instrument(
        skip_all,
        fields(
            lon = config.source.lon,
            lat = config.source.lat,
            plume_date = %config.plume_date,
        )
    )]
    pub async fn run(&self, config: &RetrieverConfig) -> PlumeResult<RetrievalRun> {
        let started = Instant::now();
        config.validate()?;
        let aoi = config.aoi()?;

        let plume = self.single_pass(config, &aoi, config.plume_window()).await?;

        let (signal, reference) = match config.reference_window() {
            Some(window) => {
                let reference = self.single_pass(config, &aoi, window).await?;
                let differential = composite(&plume.signal, &reference.signal)?;
                (differential, Some(reference))
            }
            None => (plume.signal.clone(), None),
        };

        let dispatcher = Dispatcher::new(self.model.clone(), config.dispatch.options);
        let report = dispatcher
            .dispatch(&signal, config.inversion, config.dispatch.workers)
            .await?;

        if report.incomplete {
            warn!(
                unprocessed = report.unprocessed,
                failed = report.failed,
                "Retrieval finished with an incomplete concentration raster"
            );
        }

        let elapsed = started.elapsed();
        histogram!("retrieval_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
        counter!("retrieval_runs_total").increment(1);

        info!(
            scene = %plume.scene_id,
            reference_scene = reference.as_ref().map(|r| r.scene_id.as_str()).unwrap_or("-"),
            inverted = report.inverted,
            masked = report.masked,
            failed = report.failed,
            incomplete = report.incomplete,
            elapsed_ms = elapsed.as_millis() as u64,
            "Retrieval complete"
        );

        Ok(RetrievalRun {
            aoi,
            plume,
            reference,
            signal,
            report,
        })
    }

    /// Fetch both bands of one overpass and reduce them to a fractional signal.
    #[instrument(skip_all, fields(window = %window))]
    async fn single_pass(
        &self,
        config: &RetrieverConfig,
        aoi: &AreaOfInterest,
        window: DateWindow,
    ) -> PlumeResult<PassSignal> {
        let imagery = &config.imagery;
        let (reference, target) = tokio::try_join!(
            self.imagery
                .fetch_band(&imagery.collection, &imagery.reference_band, aoi, &window),
            self.imagery
                .fetch_band(&imagery.collection, &imagery.target_band, aoi, &window),
        )?;

        let scale = self
            .cache
            .get_or_calibrate(window, aoi, &reference, &target)?;
        let signal = retrieve_fractional_signal(&reference, &target, scale, &config.mbsp)?;

        info!(
            scene = %reference.scene_id,
            scale = scale.value(),
            masked = signal.masked_count(),
            "Computed fractional signal"
        );

        Ok(PassSignal {
            window,
            scene_id: reference.scene_id,
            scale,
            signal,
        })
    }
}
