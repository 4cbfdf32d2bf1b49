//! Error kinds surfaced by the aggregation core.

use thiserror::Error;

/// A shift-boundary or bucketing configuration that the core refuses to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid time of day {0:?}, expected HH:MM")]
    TimeOfDay(String),

    #[error("shift boundaries coincide at {0}, both shifts must be non-empty")]
    CoincidingBoundaries(String),

    #[error("bucket width must be one of 15, 30, 60 or 120 minutes, got {0}")]
    BucketWidth(u32),

    #[error("utc offset of {0} minutes is out of range")]
    UtcOffset(i32),

    #[error("trailing window must be between one second and 24 hours")]
    TrailingWindow,
}

/// Why a raw record was dropped from a batch.
///
/// Never returned from a batch-level call; records that fail to parse are
/// counted and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("unparsable timestamp {0:?}")]
    Timestamp(String),

    #[error("negative count {0}")]
    NegativeCount(String),

    #[error("non-numeric count {0}")]
    NonNumericCount(String),

    #[error("unknown stage {0:?}")]
    UnknownStage(String),

    #[error("record carries no stage and the batch has no default")]
    MissingStage,
}
