//! Driver that applies the enabled calibration stages in order.

use derive_builder::Builder;
use hifitime::Epoch;
use log::trace;
use std::fmt::Display;

use crate::{
    baselines::ArrayTopology,
    corrections::{correct_attenuation, correct_feed_rotation},
    error::SuncalError,
    records::CalRecordStore,
    state::{AntennaGeometry, AntennaStateProvider, GainStateProvider},
    types::VisData,
};

/// Options for calibrating a chunk of correlator data.
#[derive(Builder, Debug, Default, Clone)]
pub struct CalContext {
    /// Whether attenuation corrections are enabled
    #[builder(default = "true")]
    pub correct_attenuation: bool,
    /// Whether delay-phase and feed-rotation corrections are enabled
    #[builder(default = "true")]
    pub correct_feed_rotation: bool,
    /// Reference time for the attenuation correction; when `None`, the
    /// timestamp of the most recent preceding reference calibration is used.
    #[builder(default)]
    pub ref_time: Option<Epoch>,
    /// Precomputed antenna geometry for the feed-rotation correction; when
    /// `None`, the antenna-state provider is queried for the dataset's span.
    #[builder(default)]
    pub geometry: Option<AntennaGeometry>,
    /// Whether to draw progress bars
    #[builder(default = "false")]
    pub draw_progress: bool,
}

impl Display for CalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} correct attenuation.",
            if self.correct_attenuation {
                "Will"
            } else {
                "Will not"
            }
        )?;
        writeln!(
            f,
            "{} correct feed rotation.",
            if self.correct_feed_rotation {
                "Will"
            } else {
                "Will not"
            }
        )?;
        Ok(())
    }
}

impl CalContext {
    /// A one line description of the corrections that will be applied.
    pub fn as_comment(&self) -> String {
        [
            if self.correct_attenuation {
                Some("attenuation corrections".to_string())
            } else {
                None
            },
            if self.correct_feed_rotation {
                Some("feed rotation corrections".to_string())
            } else {
                None
            },
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<String>>()
        .join(", ")
    }

    /// Apply the enabled corrections to `data`, returning a new dataset.
    ///
    /// # Errors
    ///
    /// Wraps errors from [`correct_attenuation`] and
    /// [`correct_feed_rotation`].
    pub fn calibrate(
        &self,
        data: &VisData,
        gains: &impl GainStateProvider,
        antennas: &impl AntennaStateProvider,
        records: &impl CalRecordStore,
        topo: &ArrayTopology,
    ) -> Result<VisData, SuncalError> {
        let mut cdata = data.clone();
        if self.correct_attenuation {
            trace!("correcting attenuation");
            cdata = correct_attenuation(
                &cdata,
                gains,
                records,
                topo,
                self.ref_time,
                self.draw_progress,
            )?;
        }
        if self.correct_feed_rotation {
            trace!("correcting feed rotation");
            cdata = correct_feed_rotation(
                &cdata,
                antennas,
                records,
                topo,
                self.geometry.clone(),
                self.draw_progress,
            )?;
        }
        Ok(cdata)
    }
}
