//! Inversion configuration: instrument, method and viewing geometry.

use plume_common::{PlumeError, PlumeResult};
use serde::{Deserialize, Serialize};

/// Multispectral instrument that acquired the bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    #[serde(rename = "S2A")]
    Sentinel2A,
    #[serde(rename = "S2B")]
    Sentinel2B,
    #[serde(rename = "L8")]
    Landsat8,
    #[serde(rename = "L9")]
    Landsat9,
}

impl Instrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sentinel2A => "S2A",
            Self::Sentinel2B => "S2B",
            Self::Landsat8 => "L8",
            Self::Landsat9 => "L9",
        }
    }
}

impl std::str::FromStr for Instrument {
    type Err = PlumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "S2A" => Ok(Self::Sentinel2A),
            "S2B" => Ok(Self::Sentinel2B),
            "L8" | "LANDSAT8" => Ok(Self::Landsat8),
            "L9" | "LANDSAT9" => Ok(Self::Landsat9),
            other => Err(PlumeError::invalid_input(
                "instrument",
                format!("unknown instrument '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Retrieval method the fractional signal was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Multi-band single-pass: SWIR2 over SWIR1 on one overpass.
    Mbsp,
    /// Multi-band multi-pass: MBSP differenced against a reference overpass.
    Mbmp,
    /// Single-band multi-pass: SWIR2 alone across two overpasses.
    Sbmp,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mbsp => "MBSP",
            Self::Mbmp => "MBMP",
            Self::Sbmp => "SBMP",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = PlumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MBSP" => Ok(Self::Mbsp),
            "MBMP" => Ok(Self::Mbmp),
            "SBMP" => Ok(Self::Sbmp),
            other => Err(PlumeError::invalid_input(
                "method",
                format!("unknown method '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sun/target/observer geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewingGeometry {
    /// Height of the emitting surface above sea level (km).
    pub target_height_km: f64,
    /// Height of the observer above sea level (km).
    pub observer_height_km: f64,
    /// Solar zenith angle (degrees).
    pub solar_zenith_deg: f64,
    /// Viewing zenith angle (degrees).
    pub viewing_zenith_deg: f64,
}

impl Default for ViewingGeometry {
    fn default() -> Self {
        Self {
            target_height_km: 0.0,
            observer_height_km: 100.0,
            solar_zenith_deg: 40.0,
            viewing_zenith_deg: 0.0,
        }
    }
}

/// Everything a single-pixel inversion needs besides the signal value.
///
/// A plain immutable record, passed by value to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InversionConfig {
    pub instrument: Instrument,
    pub method: Method,
    #[serde(flatten)]
    pub geometry: ViewingGeometry,
    /// Number of atmospheric layers between the target and the top of atmosphere.
    pub num_layers: usize,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            instrument: Instrument::Sentinel2A,
            method: Method::Mbsp,
            geometry: ViewingGeometry::default(),
            num_layers: 100,
        }
    }
}

impl InversionConfig {
    /// Validate the configuration before any inversion work starts.
    pub fn validate(&self) -> PlumeResult<()> {
        if self.num_layers == 0 {
            return Err(PlumeError::invalid_input("num_layers", "must be >= 1"));
        }

        let g = &self.geometry;
        for (param, angle) in [
            ("solar_zenith_deg", g.solar_zenith_deg),
            ("viewing_zenith_deg", g.viewing_zenith_deg),
        ] {
            if !angle.is_finite() || !(0.0..90.0).contains(&angle) {
                return Err(PlumeError::invalid_input(
                    param,
                    format!("{} is outside [0, 90)", angle),
                ));
            }
        }

        if !g.target_height_km.is_finite() || !g.observer_height_km.is_finite() {
            return Err(PlumeError::invalid_input("geometry", "heights must be finite"));
        }
        if g.observer_height_km <= g.target_height_km {
            return Err(PlumeError::invalid_input(
                "observer_height_km",
                format!(
                    "observer at {} km is not above target at {} km",
                    g.observer_height_km, g.target_height_km
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = InversionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instrument, Instrument::Sentinel2A);
        assert_eq!(config.method, Method::Mbsp);
        assert_eq!(config.num_layers, 100);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let mut config = InversionConfig::default();
        config.geometry.solar_zenith_deg = 90.0;
        assert!(config.validate().is_err());

        let mut config = InversionConfig::default();
        config.geometry.observer_height_km = 0.0;
        assert!(config.validate().is_err());

        let config = InversionConfig {
            num_layers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: InversionConfig =
            serde_json::from_str(r#"{"instrument": "L8", "solar_zenith_deg": 30.0}"#).unwrap();
        assert_eq!(config.instrument, Instrument::Landsat8);
        assert_eq!(config.method, Method::Mbsp);
        assert_eq!(config.geometry.solar_zenith_deg, 30.0);
        assert_eq!(config.geometry.observer_height_km, 100.0);
        assert_eq!(config.num_layers, 100);
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!("s2a".parse::<Instrument>().unwrap(), Instrument::Sentinel2A);
        assert_eq!("L9".parse::<Instrument>().unwrap(), Instrument::Landsat9);
        assert!("S3".parse::<Instrument>().is_err());
        assert_eq!("mbmp".parse::<Method>().unwrap(), Method::Mbmp);
    }
}
