//! Corrections that can be performed on visibility data.
//!
//! Two instrumental effects are removed here: time-varying receiver and
//! attenuator gain settings ([`correct_attenuation`]) and instrumental
//! polarization mixing from differential feed rotation plus a fixed X-Y
//! delay phase ([`correct_feed_rotation`]). Each corrector returns a new
//! dataset and leaves its input untouched, so the two can be applied in
//! sequence or independently.

use std::f64::consts::FRAC_PI_2;

use hifitime::{Epoch, TimeUnits};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::izip;
use log::{debug, trace};
use ndarray::{parallel::prelude::*, Array4, Axis};
use num_complex::Complex;

use crate::{
    baselines::ArrayTopology,
    error::{BadArrayShape, SuncalError},
    records::CalRecordStore,
    state::{AntennaGeometry, AntennaStateProvider, GainState, GainStateProvider},
    types::{PowerViewMut, VisData},
    util::{common_val_idx, lobe, nearest_val_idx},
};

/// Polarization products 0..4 as (first-antenna feed, second-antenna feed),
/// with feed 0 = H and 1 = V: HH, VV, HV, VH.
const POL_FEEDS: [(usize, usize); 4] = [(0, 0), (1, 1), (0, 1), (1, 0)];

/// Seconds of gain-state samples to median over at the reference time.
const REF_WINDOW_S: f64 = 60.0;

fn progress_bar(len: usize, message: &'static str, draw_progress: bool) -> ProgressBar {
    let draw_target = if draw_progress {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    let progress = ProgressBar::with_draw_target(Some(len as u64), draw_target);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})",
            )
            .unwrap()
            .progress_chars("=> "),
    );
    progress.set_message(message);
    progress
}

fn check_gain_state(
    gain_state: &GainState,
    topo: &ArrayTopology,
    argument: &'static str,
    function: &'static str,
) -> Result<(), BadArrayShape> {
    let num_gain_times = gain_state.times.len();
    if num_gain_times == 0 {
        return Err(BadArrayShape {
            argument,
            function,
            expected: "at least one gain-state sample".into(),
            received: "0".into(),
        });
    }
    let expected = (topo.num_gain_ants, num_gain_times);
    for (name, table) in [
        ("h1", &gain_state.h1),
        ("h2", &gain_state.h2),
        ("v1", &gain_state.v1),
        ("v2", &gain_state.v2),
    ] {
        if table.dim() != expected {
            return Err(BadArrayShape {
                argument,
                function,
                expected: format!("{name} of shape {expected:?}"),
                received: format!("{name} of shape {:?}", table.dim()),
            });
        }
    }
    let expected_attn = (topo.num_gain_ants, 2, topo.num_bands);
    if gain_state.dcmattn.dim() != expected_attn {
        return Err(BadArrayShape {
            argument,
            function,
            expected: format!("dcmattn of shape {expected_attn:?}"),
            received: format!("dcmattn of shape {:?}", gain_state.dcmattn.dim()),
        });
    }
    Ok(())
}

/// Rescale a dataset to a common reference attenuator state.
///
/// The gain state at `ref_time` (or, when `None`, at the timestamp of the
/// most recent preceding reference calibration) is taken as the reference;
/// every antenna's gain relative to it is accumulated in additive dB units
/// from the component tables and the attenuator settings, converted to linear
/// baseline gain factors, and multiplied into the cross-correlation data.
/// The packed power and power-squared moments are rescaled by the per-antenna
/// linear power factor and its square; the third moment is left untouched.
///
/// Returns a new dataset; `time` and `fghz` pass through unchanged.
///
/// # Errors
///
/// - [`SuncalError::MissingCalRecord`] when `ref_time` is `None` and no
///   reference calibration precedes the dataset.
/// - [`SuncalError::BandOutOfRange`] when a dataset frequency falls outside
///   the attenuator band tables.
/// - [`SuncalError::BadArrayShape`] when the dataset or a provider response
///   disagrees with the topology.
/// - Provider errors are propagated, not retried.
pub fn correct_attenuation(
    data: &VisData,
    gains: &impl GainStateProvider,
    records: &impl CalRecordStore,
    topo: &ArrayTopology,
    ref_time: Option<Epoch>,
    draw_progress: bool,
) -> Result<VisData, SuncalError> {
    trace!("start correct_attenuation");

    data.validate(topo)?;
    let (start, end) = data.time_range();

    let ref_time = match ref_time {
        Some(t) => t,
        None => records.refcal(start)?.timestamp,
    };

    // reference gain state, medianed over a short window around the
    // reference time
    let ref_state = gains.gain_state(ref_time, ref_time + REF_WINDOW_S.seconds(), None)?;
    check_gain_state(&ref_state, topo, "ref_state", "correct_attenuation")?;
    let ref_snapshot = ref_state.time_median();

    // gain state across the dataset, at the dataset's own cadence; a cadence
    // that rounds to one second means no decimation at all
    let cadence_s = data.median_cadence_s();
    let cadence = (cadence_s > 1).then(|| (cadence_s as f64).seconds());
    let src_state = gains.gain_state(start, end, cadence)?;
    check_gain_state(&src_state, topo, "src_state", "correct_attenuation")?;
    let num_gain_times = src_state.times.len();

    // antenna gains relative to the reference state, additive dB,
    // [antenna][pol][band][gain-time]
    let num_gain_ants = topo.num_gain_ants;
    let mut antgain = Array4::<f64>::zeros((num_gain_ants, 2, topo.num_bands, num_gain_times));
    for ant in 0..num_gain_ants {
        for pol in 0..2 {
            for band in 0..topo.num_bands {
                let delta_attn =
                    src_state.dcmattn[[ant, pol, band]] - ref_snapshot.dcmattn[[ant, pol, band]];
                for gt in 0..num_gain_times {
                    antgain[[ant, pol, band, gt]] = src_state.component_sum(ant, pol, gt)
                        - ref_snapshot.component_sum(ant, pol)
                        + delta_attn;
                }
            }
        }
    }

    let bands = data.band_indices(topo.num_bands)?;
    // nearest gain-state sample for each dataset time
    let gain_time_idx = nearest_val_idx(&data.time, &src_state.times_jd());

    let mut cdata = data.clone();

    let correction_progress = progress_bar(topo.num_baselines(), "attn corrections", draw_progress);

    // baselines touch disjoint output slabs, so this parallelizes cleanly
    cdata
        .x
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(topo.baselines())
        .for_each(|(mut baseline_view, &(ant1, ant2))| {
            // non-physical slots keep a neutral gain factor
            if ant1 >= num_gain_ants || ant2 >= num_gain_ants {
                correction_progress.inc(1);
                return;
            }
            for (freq_idx, &band) in bands.iter().enumerate() {
                for (pol_idx, &(feed1, feed2)) in POL_FEEDS.iter().enumerate() {
                    for (time_idx, &gt) in gain_time_idx.iter().enumerate() {
                        let gain_db =
                            antgain[[ant1, feed1, band, gt]] + antgain[[ant2, feed2, band, gt]];
                        baseline_view[[freq_idx, pol_idx, time_idx]] *=
                            10f64.powf(gain_db / 20.0);
                    }
                }
            }
            correction_progress.inc(1);
        });

    correction_progress.finish();

    // the packed power arrays line up slot-for-slot with the frequency axis;
    // trimmed datasets whose frequency axis no longer covers the power slots
    // cannot be rescaled here
    if data.fghz.len() == topo.power_slots {
        let mut px = PowerViewMut::new(&mut cdata.px, topo);
        let mut py = PowerViewMut::new(&mut cdata.py, topo);
        for (slot, &band) in bands.iter().enumerate() {
            for ant in 0..num_gain_ants {
                for (time_idx, &gt) in gain_time_idx.iter().enumerate() {
                    let gain_h = 10f64.powf(antgain[[ant, 0, band, gt]] / 10.0);
                    let gain_v = 10f64.powf(antgain[[ant, 1, band, gt]] / 10.0);
                    px.scale(slot, ant, 0, time_idx, gain_h);
                    px.scale(slot, ant, 1, time_idx, gain_h * gain_h);
                    py.scale(slot, ant, 0, time_idx, gain_v);
                    py.scale(slot, ant, 1, time_idx, gain_v * gain_v);
                }
            }
        }
    } else {
        debug!(
            "frequency axis ({} channels) does not cover the {} power slots; leaving px/py unscaled",
            data.fghz.len(),
            topo.power_slots
        );
    }

    trace!("end correct_attenuation");
    Ok(cdata)
}

/// Correct the cross-correlation data for X-Y delay phase and differential
/// feed rotation.
///
/// The delay-phase record nearest-preceding the dataset start supplies
/// per-antenna phases on its own frequency axis; dataset frequencies are
/// matched to it by value at four decimal digits, and unmatched frequencies
/// are flagged invalid in the output. The parallactic angle of each
/// equatorial-mount antenna is first referenced to the fixed reference
/// antenna, then each baseline's four polarization products are phase-shifted
/// by the delay-phase angles and mixed through the per-time rotation by the
/// differential angle `chi[ant1] - chi[ant2]`.
///
/// Auto-baselines and antenna slots beyond the polarization-corrected subset
/// are exempt. `px`, `py`, `time` and `fghz` pass through unchanged.
///
/// # Errors
///
/// - [`SuncalError::MissingCalRecord`] when no delay-phase record precedes
///   the dataset.
/// - [`SuncalError::NoValidPointing`] when the geometry has no sample with a
///   valid pointing flag.
/// - [`SuncalError::BadArrayShape`] when the dataset or a provider response
///   disagrees with the topology.
/// - Provider errors are propagated, not retried.
pub fn correct_feed_rotation(
    data: &VisData,
    antennas: &impl AntennaStateProvider,
    records: &impl CalRecordStore,
    topo: &ArrayTopology,
    geometry: Option<AntennaGeometry>,
    draw_progress: bool,
) -> Result<VisData, SuncalError> {
    trace!("start correct_feed_rotation");

    data.validate(topo)?;
    let (start, end) = data.time_range();

    let geometry = match geometry {
        Some(geometry) => geometry,
        None => antennas.antenna_geometry(start, end)?,
    };
    let num_geom_times = geometry.times.len();
    if geometry.parallactic_angle.dim() != geometry.azimuth.dim()
        || geometry.parallactic_angle.dim().0 != num_geom_times
        || geometry.parallactic_angle.dim().1 < topo.num_gain_ants
    {
        return Err(SuncalError::BadArrayShape(BadArrayShape {
            argument: "geometry",
            function: "correct_feed_rotation",
            expected: format!("({num_geom_times}, >= {})", topo.num_gain_ants),
            received: format!("{:?}", geometry.parallactic_angle.dim()),
        }));
    }

    // equatorial mounts do not track alt-az rotation: their effective angle
    // relative to the array is referenced to the reference antenna's own
    let mut chi = geometry.parallactic_angle.clone();
    let ref_chi = geometry
        .parallactic_angle
        .index_axis(Axis(1), topo.ref_ant)
        .to_owned();
    for &ant in &topo.equatorial_ants {
        for sample in 0..num_geom_times {
            chi[[sample, ant]] -= ref_chi[sample];
        }
    }

    // nearest geometry sample with a valid pointing for each dataset time
    let valid = geometry.valid_time_indices();
    if valid.is_empty() {
        return Err(SuncalError::NoValidPointing {
            function: "correct_feed_rotation",
        });
    }
    let geometry_jd = geometry.times_jd();
    let valid_jd: Vec<f64> = valid.iter().map(|&n| geometry_jd[n]).collect();
    let geom_time_idx: Vec<usize> = nearest_val_idx(&data.time, &valid_jd)
        .into_iter()
        .map(|i| valid[i])
        .collect();

    // X-Y delay phase on the record's own frequency axis
    let record = records.xy_phase(start)?;
    if record.xy_phase.dim().1 != record.fghz.len()
        || record.xy_phase.dim().0 < topo.num_pol_ants
    {
        return Err(SuncalError::BadArrayShape(BadArrayShape {
            argument: "records",
            function: "correct_feed_rotation",
            expected: format!(
                "xy_phase of shape (>= {}, {})",
                topo.num_pol_ants,
                record.fghz.len()
            ),
            received: format!("xy_phase of shape {:?}", record.xy_phase.dim()),
        }));
    }
    let (cal_fghz, delay_phase) = record.drop_empty_channels();

    // match dataset frequencies to calibration frequencies by value
    let (data_freq_idx, cal_freq_idx) =
        common_val_idx(&data.fghz.to_vec(), &cal_fghz.to_vec(), 4);
    let missing: Vec<usize> = (0..data.fghz.len())
        .filter(|f| data_freq_idx.binary_search(f).is_err())
        .collect();
    if !missing.is_empty() {
        debug!(
            "{} of {} dataset frequencies are absent from the delay-phase record; flagging them",
            missing.len(),
            data.fghz.len()
        );
    }

    let num_freqs = data.fghz.len();
    let num_times = data.time.len();
    let mut cdata = data.clone();

    let correction_progress = progress_bar(topo.num_baselines(), "feed rotation", draw_progress);

    cdata
        .x
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(topo.baselines())
        .for_each(|(mut baseline_view, &(ant1, ant2))| {
            if ant1 >= topo.num_pol_ants || ant2 >= topo.num_pol_ants || ant1 == ant2 {
                correction_progress.inc(1);
                return;
            }

            // X-Y delay phase on matched frequencies; product 0 (HH) is
            // untouched
            for (&freq_idx, &cal_idx) in izip!(&data_freq_idx, &cal_freq_idx) {
                let angle_vv = lobe(delay_phase[[ant1, cal_idx]] - delay_phase[[ant2, cal_idx]]);
                let angle_hv = -delay_phase[[ant2, cal_idx]] + FRAC_PI_2;
                let angle_vh = delay_phase[[ant1, cal_idx]] - FRAC_PI_2;
                let phase_vv = Complex::from_polar(1.0, angle_vv);
                let phase_hv = Complex::from_polar(1.0, angle_hv);
                let phase_vh = Complex::from_polar(1.0, angle_vh);
                for time_idx in 0..num_times {
                    baseline_view[[freq_idx, 1, time_idx]] *= phase_vv;
                    baseline_view[[freq_idx, 2, time_idx]] *= phase_hv;
                    baseline_view[[freq_idx, 3, time_idx]] *= phase_vh;
                }
            }

            // differential feed rotation, composed on top of the delay-phase
            // corrected values
            for (time_idx, &geom_idx) in geom_time_idx.iter().enumerate() {
                let dchi = chi[[geom_idx, ant1]] - chi[[geom_idx, ant2]];
                let (sin_chi, cos_chi) = dchi.sin_cos();
                for freq_idx in 0..num_freqs {
                    let hh = baseline_view[[freq_idx, 0, time_idx]];
                    let vv = baseline_view[[freq_idx, 1, time_idx]];
                    let hv = baseline_view[[freq_idx, 2, time_idx]];
                    let vh = baseline_view[[freq_idx, 3, time_idx]];
                    baseline_view[[freq_idx, 0, time_idx]] = hh * cos_chi + vh * sin_chi;
                    baseline_view[[freq_idx, 2, time_idx]] = hv * cos_chi + vv * sin_chi;
                    baseline_view[[freq_idx, 3, time_idx]] = vh * cos_chi - hh * sin_chi;
                    baseline_view[[freq_idx, 1, time_idx]] = vv * cos_chi - hv * sin_chi;
                }
            }
            correction_progress.inc(1);
        });

    correction_progress.finish();

    // unmatched frequencies are unusable, not stale
    for &freq_idx in &missing {
        cdata.flags[freq_idx] = true;
    }

    trace!("end correct_feed_rotation");
    Ok(cdata)
}
