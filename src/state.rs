//! External state providers: attenuator gain state and antenna geometry.
//!
//! The telemetry store behind these traits is not this crate's concern; the
//! correctors only need the queries below. Provider calls are ordinary
//! blocking calls, and transient failures are surfaced, not retried here.

use hifitime::{Duration, Epoch};
use ndarray::{Array1, Array2, Array3, Axis};

use crate::{error::SuncalError, util::median_axis1};

/// Per-antenna attenuation state sampled over a time range.
///
/// The component tables are additive decibel quantities; the total H-feed
/// gain of an antenna at one sample is `h1 + h2` plus the `dcmattn` setting
/// for the band in use.
#[derive(Debug, Clone)]
pub struct GainState {
    /// Sample epochs, ascending.
    pub times: Vec<Epoch>,
    /// First H-feed attenuator component in dB, `[antenna][time]`.
    pub h1: Array2<f64>,
    /// Second H-feed attenuator component in dB, `[antenna][time]`.
    pub h2: Array2<f64>,
    /// First V-feed attenuator component in dB, `[antenna][time]`.
    pub v1: Array2<f64>,
    /// Second V-feed attenuator component in dB, `[antenna][time]`.
    pub v2: Array2<f64>,
    /// Attenuator settings in dB, `[antenna][polarization][band]`.
    pub dcmattn: Array3<f64>,
}

impl GainState {
    /// Sample timestamps as Julian dates.
    pub fn times_jd(&self) -> Vec<f64> {
        self.times.iter().map(Epoch::as_jde_utc_days).collect()
    }

    /// The summed attenuator components for one antenna and feed at one
    /// sample. `pol` 0 is the H feed, 1 the V feed.
    pub fn component_sum(&self, ant: usize, pol: usize, time: usize) -> f64 {
        match pol {
            0 => self.h1[[ant, time]] + self.h2[[ant, time]],
            _ => self.v1[[ant, time]] + self.v2[[ant, time]],
        }
    }

    /// Reduce to a single snapshot by taking per-antenna medians of the
    /// component tables over the sampled window. The state is expected to be
    /// constant over a reference window; the median guards against a single
    /// noisy sample.
    pub fn time_median(&self) -> GainSnapshot {
        GainSnapshot {
            h1: median_axis1(&self.h1),
            h2: median_axis1(&self.h2),
            v1: median_axis1(&self.v1),
            v2: median_axis1(&self.v2),
            dcmattn: self.dcmattn.clone(),
        }
    }
}

/// A single-epoch reduction of a [`GainState`].
#[derive(Debug, Clone)]
pub struct GainSnapshot {
    /// Median first H-feed component in dB, per antenna.
    pub h1: Array1<f64>,
    /// Median second H-feed component in dB, per antenna.
    pub h2: Array1<f64>,
    /// Median first V-feed component in dB, per antenna.
    pub v1: Array1<f64>,
    /// Median second V-feed component in dB, per antenna.
    pub v2: Array1<f64>,
    /// Attenuator settings in dB, `[antenna][polarization][band]`.
    pub dcmattn: Array3<f64>,
}

impl GainSnapshot {
    /// The summed attenuator components for one antenna and feed.
    pub fn component_sum(&self, ant: usize, pol: usize) -> f64 {
        match pol {
            0 => self.h1[ant] + self.h2[ant],
            _ => self.v1[ant] + self.v2[ant],
        }
    }
}

/// Per-antenna pointing state sampled over a time range.
#[derive(Debug, Clone)]
pub struct AntennaGeometry {
    /// Sample epochs, ascending.
    pub times: Vec<Epoch>,
    /// Parallactic angle in radians, `[time][antenna]`.
    pub parallactic_angle: Array2<f64>,
    /// Actual azimuth in radians, `[time][antenna]`. An azimuth of exactly
    /// zero marks a sample where the antenna was not tracking.
    pub azimuth: Array2<f64>,
}

impl AntennaGeometry {
    /// Sample timestamps as Julian dates.
    pub fn times_jd(&self) -> Vec<f64> {
        self.times.iter().map(Epoch::as_jde_utc_days).collect()
    }

    /// Indices of time samples whose first-antenna pointing is valid.
    pub fn valid_time_indices(&self) -> Vec<usize> {
        self.azimuth
            .index_axis(Axis(1), 0)
            .iter()
            .enumerate()
            .filter_map(|(n, &az)| (az != 0.0).then_some(n))
            .collect()
    }
}

/// Supplies per-antenna, per-polarization, per-band attenuation settings over
/// a time range.
pub trait GainStateProvider {
    /// The gain state over `[start, end]`, sampled at `cadence`, or at the
    /// provider's native cadence when `None`.
    ///
    /// # Errors
    ///
    /// Implementations return [`SuncalError::Provider`] when the underlying
    /// query fails.
    fn gain_state(
        &self,
        start: Epoch,
        end: Epoch,
        cadence: Option<Duration>,
    ) -> Result<GainState, SuncalError>;
}

/// Supplies parallactic angle and pointing validity per antenna over a time
/// range.
pub trait AntennaStateProvider {
    /// The antenna geometry over `[start, end]` at the provider's cadence.
    ///
    /// # Errors
    ///
    /// Implementations return [`SuncalError::Provider`] when the underlying
    /// query fails.
    fn antenna_geometry(&self, start: Epoch, end: Epoch) -> Result<AntennaGeometry, SuncalError>;
}
