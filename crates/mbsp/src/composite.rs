//! Differential compositing against a no-emission reference overpass.

use plume_common::{PlumeResult, Raster};
use rayon::prelude::*;
use tracing::info;

use crate::signal::{FractionalSignalRaster, SignalKind};

/// Subtract a reference-day signal from a plume-day signal, cell by cell.
///
/// Static surface artefacts present on both days cancel, leaving the
/// anomaly attributable to the source. A cell is masked if it is masked in
/// either input.
pub fn composite(
    plume: &FractionalSignalRaster,
    reference: &FractionalSignalRaster,
) -> PlumeResult<FractionalSignalRaster> {
    plume.ensure_same_grid(reference)?;

    let data: Vec<f32> = plume
        .raster
        .data
        .par_iter()
        .zip(reference.raster.data.par_iter())
        .map(|(&p, &r)| {
            if p.is_finite() && r.is_finite() {
                p - r
            } else {
                f32::NAN
            }
        })
        .collect();

    let differential = FractionalSignalRaster::new(
        Raster {
            shape: plume.raster.shape,
            resolution_m: plume.raster.resolution_m,
            data,
        },
        SignalKind::Differential,
    );

    info!(
        shape = %differential.raster.shape,
        masked = differential.masked_count(),
        min = differential.range.map(|r| r.min),
        max = differential.range.map(|r| r.max),
        "Composited differential signal"
    );

    Ok(differential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_common::{PlumeError, RasterShape};

    fn signal(rows: usize, cols: usize, data: Vec<f32>) -> FractionalSignalRaster {
        FractionalSignalRaster::new(
            Raster::new(RasterShape::new(rows, cols), 20.0, data).unwrap(),
            SignalKind::Mbsp,
        )
    }

    #[test]
    fn test_subtracts_cellwise() {
        let plume = signal(1, 3, vec![-0.10, -0.02, 0.05]);
        let reference = signal(1, 3, vec![-0.01, -0.02, 0.01]);
        let diff = composite(&plume, &reference).unwrap();
        assert_eq!(diff.kind, SignalKind::Differential);
        assert!((diff.raster.data[0] + 0.09).abs() < 1e-6);
        assert_eq!(diff.raster.data[1], 0.0);
        assert!((diff.raster.data[2] - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_mask_propagates_from_either_side() {
        let plume = signal(1, 3, vec![f32::NAN, 0.1, 0.1]);
        let reference = signal(1, 3, vec![0.0, f32::NAN, 0.0]);
        let diff = composite(&plume, &reference).unwrap();
        assert!(diff.raster.data[0].is_nan());
        assert!(diff.raster.data[1].is_nan());
        assert_eq!(diff.masked_count(), 2);
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let a = signal(2, 2, vec![0.0; 4]);
        let b = signal(1, 4, vec![0.0; 4]);
        assert!(matches!(
            composite(&a, &b),
            Err(PlumeError::ShapeMismatch { .. })
        ));
    }
}
