//! The visibility dataset and typed views over its packed power buffers.

use hifitime::Epoch;
use ndarray::{Array1, Array2, Array4};
use num_complex::Complex;

use crate::{
    baselines::ArrayTopology,
    error::{BadArrayShape, SuncalError},
    util::median,
};

/// One unit of correlator output to be calibrated.
///
/// Correctors never mutate a `VisData` in place; each returns a new,
/// independent copy with the affected arrays replaced.
#[derive(Debug, Clone)]
pub struct VisData {
    /// Julian-date timestamps, strictly non-decreasing.
    pub time: Vec<f64>,
    /// Frequency axis in GHz.
    pub fghz: Array1<f64>,
    /// Complex cross-correlation data, `[frequency][baseline][pol][time]`.
    /// The polarization-product axis is 0=HH, 1=VV, 2=HV, 3=VH.
    pub x: Array4<Complex<f64>>,
    /// Packed H-feed power moments, `[slot * antenna * moment][time]`. Use
    /// [`PowerView`] for `[slot][antenna][moment][time]` access.
    pub px: Array2<f64>,
    /// Packed V-feed power moments, same layout as `px`.
    pub py: Array2<f64>,
    /// Per-frequency validity flags; `true` marks a frequency the correctors
    /// could not calibrate, whose data must not be used downstream.
    pub flags: Array1<bool>,
}

impl VisData {
    /// Wrap raw correlator output, with every frequency initially valid.
    pub fn new(
        time: Vec<f64>,
        fghz: Array1<f64>,
        x: Array4<Complex<f64>>,
        px: Array2<f64>,
        py: Array2<f64>,
    ) -> Self {
        let nf = fghz.len();
        Self {
            time,
            fghz,
            x,
            px,
            py,
            flags: Array1::from_elem(nf, false),
        }
    }

    /// Check the array dimensions against the expected topology.
    ///
    /// # Errors
    ///
    /// Returns [`BadArrayShape`] when the time axis is empty or decreasing,
    /// or when any axis disagrees with `fghz`/`time` lengths, the baseline
    /// count, or the packed power layout. A mismatch
    /// here is a programming error upstream; failing fast beats silently
    /// wrong numbers.
    pub fn validate(&self, topo: &ArrayTopology) -> Result<(), BadArrayShape> {
        let nf = self.fghz.len();
        let nt = self.time.len();
        if nt == 0 {
            return Err(BadArrayShape {
                argument: "time",
                function: "VisData::validate",
                expected: "at least one time sample".into(),
                received: "0".into(),
            });
        }
        if self.time.windows(2).any(|w| w[1] < w[0]) {
            return Err(BadArrayShape {
                argument: "time",
                function: "VisData::validate",
                expected: "non-decreasing timestamps".into(),
                received: "a decreasing step".into(),
            });
        }
        let expected_x = (nf, topo.num_baselines(), 4, nt);
        if self.x.dim() != expected_x {
            return Err(BadArrayShape {
                argument: "x",
                function: "VisData::validate",
                expected: format!("{expected_x:?}"),
                received: format!("{:?}", self.x.dim()),
            });
        }
        let power_rows = topo.power_slots * topo.num_ants * topo.num_moments;
        if self.px.dim() != (power_rows, nt) {
            return Err(BadArrayShape {
                argument: "px",
                function: "VisData::validate",
                expected: format!("({power_rows}, {nt})"),
                received: format!("{:?}", self.px.dim()),
            });
        }
        if self.py.dim() != (power_rows, nt) {
            return Err(BadArrayShape {
                argument: "py",
                function: "VisData::validate",
                expected: format!("({power_rows}, {nt})"),
                received: format!("{:?}", self.py.dim()),
            });
        }
        if self.flags.len() != nf {
            return Err(BadArrayShape {
                argument: "flags",
                function: "VisData::validate",
                expected: format!("{nf}"),
                received: format!("{}", self.flags.len()),
            });
        }
        Ok(())
    }

    /// The first and last timestamps as epochs.
    pub fn time_range(&self) -> (Epoch, Epoch) {
        (
            Epoch::from_jde_utc(self.time[0]),
            Epoch::from_jde_utc(self.time[self.time.len() - 1]),
        )
    }

    /// The median time step in whole seconds. Zero for single-sample data.
    pub fn median_cadence_s(&self) -> i64 {
        if self.time.len() < 2 {
            return 0;
        }
        let steps: Vec<f64> = self.time.windows(2).map(|w| w[1] - w[0]).collect();
        (median(&steps) * 86400.0).round() as i64
    }

    /// The 0-based attenuator band index for every dataset frequency: two
    /// bands per GHz, `band = round(fghz * 2 - 1) - 1`.
    ///
    /// # Errors
    ///
    /// Returns [`SuncalError::BandOutOfRange`] when a frequency falls outside
    /// the `num_bands`-entry attenuator tables.
    pub fn band_indices(&self, num_bands: usize) -> Result<Vec<usize>, SuncalError> {
        self.fghz
            .iter()
            .map(|&fghz| {
                let band = (fghz * 2.0 - 1.0).round() as i64 - 1;
                if band < 0 || band >= num_bands as i64 {
                    Err(SuncalError::BandOutOfRange {
                        fghz,
                        band,
                        num_bands,
                    })
                } else {
                    Ok(band as usize)
                }
            })
            .collect()
    }
}

/// Read-only `[slot][antenna][moment][time]` view over a packed power buffer.
///
/// The buffer stores rows in C order, `row = (slot * num_ants + antenna) *
/// num_moments + moment`; keeping the index arithmetic in one place avoids
/// the aliasing pitfalls of reshaping the same allocation two different ways.
pub struct PowerView<'a> {
    buf: &'a Array2<f64>,
    num_ants: usize,
    num_moments: usize,
}

impl<'a> PowerView<'a> {
    /// View `buf` with the packed layout described by `topo`.
    pub fn new(buf: &'a Array2<f64>, topo: &ArrayTopology) -> Self {
        Self {
            buf,
            num_ants: topo.num_ants,
            num_moments: topo.num_moments,
        }
    }

    /// The value at `[slot][antenna][moment][time]`.
    pub fn get(&self, slot: usize, ant: usize, moment: usize, time: usize) -> f64 {
        self.buf[[row(slot, ant, moment, self.num_ants, self.num_moments), time]]
    }
}

/// Mutable companion to [`PowerView`].
pub struct PowerViewMut<'a> {
    buf: &'a mut Array2<f64>,
    num_ants: usize,
    num_moments: usize,
}

impl<'a> PowerViewMut<'a> {
    /// View `buf` mutably with the packed layout described by `topo`.
    pub fn new(buf: &'a mut Array2<f64>, topo: &ArrayTopology) -> Self {
        Self {
            num_ants: topo.num_ants,
            num_moments: topo.num_moments,
            buf,
        }
    }

    /// The value at `[slot][antenna][moment][time]`.
    pub fn get(&self, slot: usize, ant: usize, moment: usize, time: usize) -> f64 {
        self.buf[[row(slot, ant, moment, self.num_ants, self.num_moments), time]]
    }

    /// Multiply the cell at `[slot][antenna][moment][time]` by `factor`.
    pub fn scale(&mut self, slot: usize, ant: usize, moment: usize, time: usize, factor: f64) {
        self.buf[[row(slot, ant, moment, self.num_ants, self.num_moments), time]] *= factor;
    }
}

fn row(slot: usize, ant: usize, moment: usize, num_ants: usize, num_moments: usize) -> usize {
    (slot * num_ants + ant) * num_moments + moment
}
