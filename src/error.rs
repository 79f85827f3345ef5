//! Error types for suncal.

use hifitime::Epoch;
use thiserror::Error;

use crate::records::CalRecordKind;

/// Errors that can occur while calibrating visibility data.
#[derive(Error, Debug)]
pub enum SuncalError {
    /// No calibration record of the requested kind exists at or before the
    /// requested time.
    #[error("no {kind:?} calibration record (type {}) found at or before {at}", .kind.type_code())]
    MissingCalRecord {
        /// The kind of record that was requested
        kind: CalRecordKind,
        /// The requested time
        at: Epoch,
    },

    /// No sample in the antenna geometry series has a valid pointing flag.
    #[error("no geometry sample with a valid pointing flag was available to {function}")]
    NoValidPointing {
        /// The function that needed a valid pointing
        function: &'static str,
    },

    /// A dataset frequency maps outside the attenuator band table.
    #[error("frequency {fghz} GHz maps to band {band}, outside 0..{num_bands}")]
    BandOutOfRange {
        /// The offending frequency in GHz
        fghz: f64,
        /// The band index it mapped to
        band: i64,
        /// The number of bands in the attenuator tables
        num_bands: usize,
    },

    /// Error for bad array shape in provided argument
    #[error(transparent)]
    BadArrayShape(#[from] BadArrayShape),

    /// A query to an external state provider failed. Retry policy belongs to
    /// the provider, not to the correctors.
    #[error("provider query failed: {0}")]
    Provider(String),
}

/// Error for bad array shape in provided argument
#[derive(Error, Debug)]
#[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
pub struct BadArrayShape {
    /// The argument name within the function
    pub argument: &'static str,
    /// The function name
    pub function: &'static str,
    /// The expected shape
    pub expected: String,
    /// The shape that was received instead
    pub received: String,
}
