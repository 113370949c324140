//! Multi-Band Single-Pass (MBSP) methane signal retrieval.
//!
//! Turns two co-registered SWIR bands into a per-pixel fractional absorption
//! signal:
//!
//! ```text
//! reference band (B11) ─┐
//!                       ├─► calibrate ─► scale factor c
//! target band (B12) ────┤                     │
//!                       └─────────────────────┴─► F = (c·B12 − B11) / B11
//!                                                         │
//!                     reference-day F ───────────► composite (plume − reference)
//! ```
//!
//! Cells where the reference band is zero or missing are masked (`NaN`)
//! rather than failing the whole raster. Shape or resolution mismatches
//! between inputs are hard errors.

pub mod cache;
pub mod calibrate;
pub mod composite;
pub mod retrieval;
pub mod signal;

pub use cache::{ScaleFactorCache, ScaleFactorKey};
pub use calibrate::{calibrate, ScaleFactor};
pub use composite::composite;
pub use retrieval::{retrieve_fractional_signal, MbspOptions};
pub use signal::{FractionalSignalRaster, SignalKind};
