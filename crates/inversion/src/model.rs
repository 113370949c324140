//! Single-pixel radiative-transfer models.

use crate::config::{Instrument, InversionConfig, Method};
use crate::error::InversionError;

/// Converts one fractional signal value into a column enhancement (mol/m²).
///
/// Implementations must be deterministic and free of shared mutable state:
/// the dispatcher calls them concurrently from several workers.
pub trait RadiativeTransferModel: Send + Sync {
    fn retrieve(&self, value: f64, config: &InversionConfig) -> Result<f64, InversionError>;
}

/// Top of the modelled atmosphere (km).
pub const TOP_OF_ATMOSPHERE_KM: f64 = 100.0;

/// Layered Beer–Lambert inversion.
///
/// The atmosphere between the target and [`TOP_OF_ATMOSPHERE_KM`] is split
/// into `num_layers` equal layers and the enhancement is placed in the lowest
/// one. Light crosses it once on the solar leg and, for the part of the layer
/// below the observer, again on the viewing leg. With `σ` the effective
/// differential cross-section of the band pair and `AMF` the resulting air
/// mass factor, the fractional signal is `F = exp(−σ · ΔΩ · AMF) − 1`, so
///
/// ```text
/// ΔΩ = −ln(1 + F) / (σ · AMF)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredBeerLambert;

impl LayeredBeerLambert {
    /// Band-averaged effective CH4 cross-sections (m²/mol) of the
    /// (SWIR1, SWIR2) pair at surface pressure.
    pub fn band_cross_sections(instrument: Instrument) -> (f64, f64) {
        match instrument {
            Instrument::Sentinel2A => (0.0011, 0.0201),
            Instrument::Sentinel2B => (0.0010, 0.0196),
            Instrument::Landsat8 => (0.0009, 0.0160),
            Instrument::Landsat9 => (0.0009, 0.0162),
        }
    }

    /// Cross-section seen by the signal of a given method.
    pub fn effective_cross_section(instrument: Instrument, method: Method) -> f64 {
        let (swir1, swir2) = Self::band_cross_sections(instrument);
        match method {
            // Ratio methods see the SWIR1 absorption cancel part of SWIR2's.
            Method::Mbsp | Method::Mbmp => swir2 - swir1,
            Method::Sbmp => swir2,
        }
    }

    /// Two-way air mass factor through the enhancement layer.
    pub fn air_mass_factor(config: &InversionConfig) -> f64 {
        let g = &config.geometry;
        let layer_km = (TOP_OF_ATMOSPHERE_KM - g.target_height_km).max(f64::EPSILON)
            / config.num_layers as f64;
        let below_observer =
            ((g.observer_height_km - g.target_height_km) / layer_km).clamp(0.0, 1.0);

        1.0 / g.solar_zenith_deg.to_radians().cos()
            + below_observer / g.viewing_zenith_deg.to_radians().cos()
    }
}

impl RadiativeTransferModel for LayeredBeerLambert {
    fn retrieve(&self, value: f64, config: &InversionConfig) -> Result<f64, InversionError> {
        if !value.is_finite() {
            return Err(InversionError::invalid_signal(value, "not a finite number"));
        }
        let transmittance = 1.0 + value;
        if transmittance <= 0.0 {
            return Err(InversionError::invalid_signal(
                value,
                "implies total or negative transmittance",
            ));
        }

        let sigma = Self::effective_cross_section(config.instrument, config.method);
        let amf = Self::air_mass_factor(config);
        let column = -transmittance.ln() / (sigma * amf);

        if !column.is_finite() {
            return Err(InversionError::NonConvergence(value));
        }
        Ok(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_signal_is_zero_column() {
        let column = LayeredBeerLambert
            .retrieve(0.0, &InversionConfig::default())
            .unwrap();
        assert_eq!(column, 0.0);
    }

    #[test]
    fn test_forward_model_round_trip() {
        let config = InversionConfig::default();
        let sigma = LayeredBeerLambert::effective_cross_section(config.instrument, config.method);
        let amf = LayeredBeerLambert::air_mass_factor(&config);
        let column = 1.5;
        let signal = (-sigma * column * amf).exp() - 1.0;

        let retrieved = LayeredBeerLambert.retrieve(signal, &config).unwrap();
        assert!((retrieved - column).abs() < 1e-9);
    }

    #[test]
    fn test_absorption_gives_positive_enhancement() {
        let column = LayeredBeerLambert
            .retrieve(-0.05, &InversionConfig::default())
            .unwrap();
        assert!(column > 0.0);
    }

    #[test]
    fn test_nadir_amf() {
        let config = InversionConfig::default();
        // sza 40°, nadir view, observer well above the enhancement layer.
        let expected = 1.0 / 40f64.to_radians().cos() + 1.0;
        assert!((LayeredBeerLambert::air_mass_factor(&config) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_low_observer_sees_partial_layer() {
        let mut config = InversionConfig::default();
        config.num_layers = 10; // 10 km layers
        config.geometry.observer_height_km = 5.0;
        let expected = 1.0 / 40f64.to_radians().cos() + 0.5;
        assert!((LayeredBeerLambert::air_mass_factor(&config) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_unphysical_signal_fails() {
        let config = InversionConfig::default();
        assert!(matches!(
            LayeredBeerLambert.retrieve(-1.0, &config),
            Err(InversionError::InvalidSignal { .. })
        ));
        assert!(LayeredBeerLambert.retrieve(f64::NAN, &config).is_err());
    }
}
