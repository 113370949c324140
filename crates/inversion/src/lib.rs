//! Radiative-transfer inversion of fractional methane signals.
//!
//! The physical model is a single-pixel function behind the
//! [`RadiativeTransferModel`] trait. The [`Dispatcher`] splits a signal
//! raster into contiguous partitions of flat pixel indices, runs one blocking
//! worker per partition and reassembles the results by index:
//!
//! ```text
//! FractionalSignalRaster
//!      │
//!      ▼
//! task arena (row-major flat indices)
//!      │
//!      ├─► partition 0 ─► worker 0 ─┐
//!      ├─► partition 1 ─► worker 1 ─┼─► (index, outcome) channel
//!      └─► partition N ─► worker N ─┘            │
//!                                                ▼
//!                                  ConcentrationRaster + DispatchReport
//! ```
//!
//! Per-pixel failures are counted and marked invalid; a global timeout
//! yields a partial raster flagged incomplete.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod partition;

pub use config::{Instrument, InversionConfig, Method, ViewingGeometry};
pub use dispatch::{ConcentrationRaster, DispatchOptions, DispatchReport, Dispatcher, PixelTask};
pub use error::InversionError;
pub use model::{LayeredBeerLambert, RadiativeTransferModel};
pub use partition::partition;
