//! Stored calibration records and their retrieval interface.
//!
//! Records are produced elsewhere and looked up by type code and
//! nearest-preceding timestamp; this crate only consumes them. The binary
//! encoding and the store itself live behind [`CalRecordStore`].

use hifitime::Epoch;
use ndarray::{Array1, Array2, Array3, Axis};

use crate::error::{BadArrayShape, SuncalError};

/// The kinds of stored calibration record the correctors consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalRecordKind {
    /// A reference-calibration marker, whose timestamp anchors the reference
    /// gain state.
    RefCal,
    /// Total-power and auto-correlation scale factors.
    TotalPower,
    /// Per-antenna X-Y delay phase.
    XyPhase,
}

impl CalRecordKind {
    /// The record type code used by the calibration record store.
    pub fn type_code(self) -> u8 {
        match self {
            CalRecordKind::RefCal => 8,
            CalRecordKind::TotalPower => 10,
            CalRecordKind::XyPhase => 11,
        }
    }
}

/// A reference-calibration marker record (type 8).
#[derive(Debug, Clone)]
pub struct RefCalRecord {
    /// When the reference calibration was taken.
    pub timestamp: Epoch,
}

/// An X-Y delay-phase record (type 11).
#[derive(Debug, Clone)]
pub struct XyPhaseRecord {
    /// When the record was taken.
    pub timestamp: Epoch,
    /// Calibration frequency axis in GHz. Entries of exactly zero are
    /// absent channels.
    pub fghz: Array1<f64>,
    /// Per-antenna X-Y delay phase in radians, `[antenna][frequency]`.
    pub xy_phase: Array2<f64>,
}

impl XyPhaseRecord {
    /// The frequency axis and phase table with absent (exactly-zero)
    /// frequency entries dropped.
    pub fn drop_empty_channels(&self) -> (Array1<f64>, Array2<f64>) {
        let good: Vec<usize> = self
            .fghz
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| (f != 0.0).then_some(i))
            .collect();
        (
            self.fghz.select(Axis(0), &good),
            self.xy_phase.select(Axis(1), &good),
        )
    }
}

/// One antenna's entry in a total-power record. `antnum` is 1-based in
/// storage.
#[derive(Debug, Clone)]
pub struct TotalPowerAntenna {
    /// The 1-based storage antenna number.
    pub antnum: usize,
    /// Total-power calibration factors, `[polarization][frequency]`.
    pub tp_calfac: Array2<f64>,
    /// Auto-correlation calibration factors, `[polarization][frequency]`.
    pub ac_calfac: Array2<f64>,
    /// Total-power off-Sun offsets, `[polarization][frequency]`.
    pub tp_offsun: Array2<f64>,
    /// Auto-correlation off-Sun offsets, `[polarization][frequency]`.
    pub ac_offsun: Array2<f64>,
}

/// A total-power / auto-correlation calibration record (type 10).
#[derive(Debug, Clone)]
pub struct TotalPowerRecord {
    /// When the record was taken.
    pub timestamp: Epoch,
    /// Calibration frequency axis in GHz.
    pub fghz: Array1<f64>,
    /// Per-antenna entries, in storage order.
    pub antennas: Vec<TotalPowerAntenna>,
}

/// Supplies stored calibration records by kind and nearest-preceding
/// timestamp.
pub trait CalRecordStore {
    /// The most recent RefCal record at or before `at`.
    ///
    /// # Errors
    ///
    /// [`SuncalError::MissingCalRecord`] when no such record exists.
    fn refcal(&self, at: Epoch) -> Result<RefCalRecord, SuncalError>;

    /// The most recent X-Y delay-phase record at or before `at`.
    ///
    /// # Errors
    ///
    /// [`SuncalError::MissingCalRecord`] when no such record exists.
    fn xy_phase(&self, at: Epoch) -> Result<XyPhaseRecord, SuncalError>;

    /// The most recent total-power record at or before `at`.
    ///
    /// # Errors
    ///
    /// [`SuncalError::MissingCalRecord`] when no such record exists.
    fn total_power(&self, at: Epoch) -> Result<TotalPowerRecord, SuncalError>;
}

/// Total-power and auto-correlation calibration factors on a 0-based antenna
/// axis, `[antenna][polarization][frequency]`.
#[derive(Debug, Clone)]
pub struct TotalPowerCal {
    /// When the underlying record was taken.
    pub timestamp: Epoch,
    /// Calibration frequency axis in GHz.
    pub fghz: Array1<f64>,
    /// Total-power calibration factors.
    pub tp_calfac: Array3<f64>,
    /// Auto-correlation calibration factors.
    pub ac_calfac: Array3<f64>,
    /// Total-power off-Sun offsets.
    pub tp_offsun: Array3<f64>,
    /// Auto-correlation off-Sun offsets.
    pub ac_offsun: Array3<f64>,
}

/// Read the total-power calibration factors at or before `at`, converting the
/// record's 1-based storage antenna numbers to a dense 0-based antenna axis
/// of length `num_cal_ants`.
///
/// # Errors
///
/// - [`SuncalError::MissingCalRecord`] when no total-power record precedes
///   `at`.
/// - [`SuncalError::BadArrayShape`] when an entry's antenna number falls
///   outside `1..=num_cal_ants` or its tables disagree with the record's
///   frequency axis.
pub fn total_power_cal(
    store: &impl CalRecordStore,
    at: Epoch,
    num_cal_ants: usize,
) -> Result<TotalPowerCal, SuncalError> {
    let record = store.total_power(at)?;
    let nf = record.fghz.len();
    let mut cal = TotalPowerCal {
        timestamp: record.timestamp,
        fghz: record.fghz.clone(),
        tp_calfac: Array3::zeros((num_cal_ants, 2, nf)),
        ac_calfac: Array3::zeros((num_cal_ants, 2, nf)),
        tp_offsun: Array3::zeros((num_cal_ants, 2, nf)),
        ac_offsun: Array3::zeros((num_cal_ants, 2, nf)),
    };
    for entry in &record.antennas {
        if entry.antnum == 0 || entry.antnum > num_cal_ants {
            return Err(SuncalError::BadArrayShape(BadArrayShape {
                argument: "antnum",
                function: "total_power_cal",
                expected: format!("1..={num_cal_ants}"),
                received: format!("{}", entry.antnum),
            }));
        }
        let iant = entry.antnum - 1;
        for (name, table, dest) in [
            ("tp_calfac", &entry.tp_calfac, &mut cal.tp_calfac),
            ("ac_calfac", &entry.ac_calfac, &mut cal.ac_calfac),
            ("tp_offsun", &entry.tp_offsun, &mut cal.tp_offsun),
            ("ac_offsun", &entry.ac_offsun, &mut cal.ac_offsun),
        ] {
            if table.dim() != (2, nf) {
                return Err(SuncalError::BadArrayShape(BadArrayShape {
                    argument: name,
                    function: "total_power_cal",
                    expected: format!("(2, {nf})"),
                    received: format!("{:?}", table.dim()),
                }));
            }
            dest.index_axis_mut(Axis(0), iant).assign(table);
        }
    }
    Ok(cal)
}
