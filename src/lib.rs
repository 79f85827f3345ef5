#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! suncal is a library of post-correlation calibration routines for
//! visibility data from a 16-antenna solar radio interferometer.
//!
//! Two instrumental effects are removed from raw correlator output before
//! scientific use:
//!
//! - time-varying receiver and attenuator gain settings, corrected by
//!   [`correct_attenuation`] against a reference gain state;
//! - instrumental polarization mixing from differential feed rotation
//!   (parallactic angle and mount geometry) plus a fixed X-Y delay phase,
//!   corrected by [`correct_feed_rotation`].
//!
//! Both corrections share the fixed packed-baseline ordering in
//! [`baselines`], take their inputs as a [`VisData`] value, and return a new
//! corrected dataset without touching the input. Antenna telemetry and
//! stored calibration records come from external collaborators, abstracted
//! behind the [`GainStateProvider`], [`AntennaStateProvider`] and
//! [`CalRecordStore`] traits; persistence formats and record encodings are
//! not this crate's concern.
//!
//! [`pipeline::CalContext`] drives the two stages in the usual order; which
//! calibration epoch to correct against remains the caller's decision.

pub mod baselines;
pub mod corrections;
pub mod error;
pub mod pipeline;
pub mod records;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_common;

pub use baselines::{baseline_order, ArrayTopology};
pub use corrections::{correct_attenuation, correct_feed_rotation};
pub use error::{BadArrayShape, SuncalError};
pub use pipeline::{CalContext, CalContextBuilder};
pub use records::{total_power_cal, CalRecordKind, CalRecordStore};
pub use state::{AntennaGeometry, AntennaStateProvider, GainState, GainStateProvider};
pub use types::{PowerView, PowerViewMut, VisData};

// Re-export the numeric stack so consumers don't need to juggle versions.
pub use hifitime;
pub use ndarray;
pub use num_complex;
