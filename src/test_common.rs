//! Shared fixtures for unit tests: synthetic datasets and in-memory
//! providers.

use hifitime::{Duration, Epoch, TimeUnits};
use ndarray::{Array1, Array2, Array3, Array4};
use num_complex::Complex;

use crate::{
    baselines::ArrayTopology,
    error::SuncalError,
    records::{CalRecordKind, CalRecordStore, RefCalRecord, TotalPowerRecord, XyPhaseRecord},
    state::{AntennaGeometry, AntennaStateProvider, GainState, GainStateProvider},
    types::VisData,
};

/// 2017-08-08 00:00 UTC, a plausible observing day.
pub(crate) const JD0: f64 = 2_457_973.5;

/// A unit-visibility dataset with `nt` samples at a 10 s cadence and
/// full-size power arrays set to one.
pub(crate) fn unit_vis_data(topo: &ArrayTopology, nf: usize, nt: usize, f0: f64) -> VisData {
    // wide channel spacing for small axes; degenerate spacing for axes
    // longer than the band tables, to keep every channel inside them
    let fstep = if nf <= topo.num_bands { 0.5 } else { 0.0 };
    let time: Vec<f64> = (0..nt).map(|n| JD0 + n as f64 * 10.0 / 86400.0).collect();
    let fghz = Array1::from_iter((0..nf).map(|f| f0 + f as f64 * fstep));
    let power_rows = topo.power_slots * topo.num_ants * topo.num_moments;
    VisData::new(
        time,
        fghz,
        Array4::from_elem((nf, topo.num_baselines(), 4, nt), Complex::new(1.0, 0.0)),
        Array2::ones((power_rows, nt)),
        Array2::ones((power_rows, nt)),
    )
}

/// A gain state with every component table and attenuator setting equal to
/// `value_db`, sampled `num_times` times at 15 s from `start`.
pub(crate) fn flat_gain_state(
    topo: &ArrayTopology,
    start: Epoch,
    num_times: usize,
    value_db: f64,
) -> GainState {
    let times: Vec<Epoch> = (0..num_times)
        .map(|n| start + (n as f64 * 15.0).seconds())
        .collect();
    GainState {
        times,
        h1: Array2::from_elem((topo.num_gain_ants, num_times), value_db),
        h2: Array2::from_elem((topo.num_gain_ants, num_times), value_db),
        v1: Array2::from_elem((topo.num_gain_ants, num_times), value_db),
        v2: Array2::from_elem((topo.num_gain_ants, num_times), value_db),
        dcmattn: Array3::from_elem((topo.num_gain_ants, 2, topo.num_bands), value_db),
    }
}

/// A geometry with a constant parallactic angle everywhere and valid
/// pointings, sampled `num_times` times at the dataset's 10 s cadence.
pub(crate) fn unit_geometry(
    topo: &ArrayTopology,
    jd_start: f64,
    num_times: usize,
    chi: f64,
) -> AntennaGeometry {
    let times: Vec<Epoch> = (0..num_times)
        .map(|n| Epoch::from_jde_utc(jd_start + n as f64 * 10.0 / 86400.0))
        .collect();
    AntennaGeometry {
        times,
        parallactic_angle: Array2::from_elem((num_times, topo.num_gain_ants), chi),
        azimuth: Array2::from_elem((num_times, topo.num_gain_ants), 1.0),
    }
}

/// An X-Y delay-phase record with the same phase for every antenna and
/// frequency.
pub(crate) fn xy_phase_record(
    topo: &ArrayTopology,
    timestamp: Epoch,
    fghz: &[f64],
    phase: f64,
) -> XyPhaseRecord {
    XyPhaseRecord {
        timestamp,
        fghz: Array1::from_vec(fghz.to_vec()),
        xy_phase: Array2::from_elem((topo.num_pol_ants, fghz.len()), phase),
    }
}

/// A gain-state provider holding one reference state and one source state:
/// queries starting at the reference epoch get the former, everything else
/// the latter.
pub(crate) struct TwoStateGains {
    pub(crate) ref_epoch: Epoch,
    pub(crate) ref_state: GainState,
    pub(crate) src_state: GainState,
}

impl GainStateProvider for TwoStateGains {
    fn gain_state(
        &self,
        start: Epoch,
        _end: Epoch,
        _cadence: Option<Duration>,
    ) -> Result<GainState, SuncalError> {
        if (start - self.ref_epoch).abs() < 1.seconds() {
            Ok(self.ref_state.clone())
        } else {
            Ok(self.src_state.clone())
        }
    }
}

/// An antenna-state provider that returns the same geometry for any range.
pub(crate) struct FixedGeometry(pub(crate) AntennaGeometry);

impl AntennaStateProvider for FixedGeometry {
    fn antenna_geometry(
        &self,
        _start: Epoch,
        _end: Epoch,
    ) -> Result<AntennaGeometry, SuncalError> {
        Ok(self.0.clone())
    }
}

/// A record store holding at most one record of each kind.
#[derive(Default)]
pub(crate) struct FixedRecords {
    pub(crate) refcal: Option<RefCalRecord>,
    pub(crate) xy_phase: Option<XyPhaseRecord>,
    pub(crate) total_power: Option<TotalPowerRecord>,
}

impl FixedRecords {
    pub(crate) fn with_refcal(timestamp: Epoch) -> Self {
        Self {
            refcal: Some(RefCalRecord { timestamp }),
            ..Self::default()
        }
    }

    pub(crate) fn with_xy_phase(record: XyPhaseRecord) -> Self {
        Self {
            xy_phase: Some(record),
            ..Self::default()
        }
    }
}

impl CalRecordStore for FixedRecords {
    fn refcal(&self, at: Epoch) -> Result<RefCalRecord, SuncalError> {
        self.refcal
            .clone()
            .filter(|record| record.timestamp <= at)
            .ok_or(SuncalError::MissingCalRecord {
                kind: CalRecordKind::RefCal,
                at,
            })
    }

    fn xy_phase(&self, at: Epoch) -> Result<XyPhaseRecord, SuncalError> {
        self.xy_phase
            .clone()
            .filter(|record| record.timestamp <= at)
            .ok_or(SuncalError::MissingCalRecord {
                kind: CalRecordKind::XyPhase,
                at,
            })
    }

    fn total_power(&self, at: Epoch) -> Result<TotalPowerRecord, SuncalError> {
        self.total_power
            .clone()
            .filter(|record| record.timestamp <= at)
            .ok_or(SuncalError::MissingCalRecord {
                kind: CalRecordKind::TotalPower,
                at,
            })
    }
}
