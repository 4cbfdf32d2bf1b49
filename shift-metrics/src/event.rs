//! Count events and the raw records they are parsed from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::MalformedEvent;

/// A station on the packaging line, in line order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Capper,
    Labeler,
    Boxer,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Capper, Stage::Labeler, Stage::Boxer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Capper => "capper",
            Stage::Labeler => "labeler",
            Stage::Boxer => "boxer",
        }
    }

    /// The next station along the line, if any.
    pub fn downstream(&self) -> Option<Stage> {
        match self {
            Stage::Capper => Some(Stage::Labeler),
            Stage::Labeler => Some(Stage::Boxer),
            Stage::Boxer => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = MalformedEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "capper" => Ok(Stage::Capper),
            "labeler" => Ok(Stage::Labeler),
            "boxer" => Ok(Stage::Boxer),
            _ => Err(MalformedEvent::UnknownStage(s.to_owned())),
        }
    }
}

/// The two production shifts. `Day` is shift 1, `Night` is shift 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Day,
    Night,
}

impl Shift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Day => "day",
            Shift::Night => "night",
        }
    }

    fn from_hint(s: &str) -> Option<Shift> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Some(Shift::Day),
            "night" => Some(Shift::Night),
            _ => None,
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, immutable count observation from one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEvent {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub stage: Stage,
    pub shift_hint: Option<Shift>,
}

impl CountEvent {
    pub fn new(timestamp: DateTime<Utc>, count: u64, stage: Stage) -> Self {
        CountEvent {
            timestamp,
            count,
            stage,
            shift_hint: None,
        }
    }
}

/// A record as the fetch collaborator hands it over, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCountRecord {
    pub timestamp: String,
    #[serde(default)]
    pub count: Option<Value>,
    #[serde(default)]
    pub shift: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RawCountRecord {
    /// Validates the record.
    ///
    /// `site_offset` is used for timestamps that carry no offset of their own;
    /// `default_stage` for records without a `source` label.
    pub fn parse(
        &self,
        site_offset: FixedOffset,
        default_stage: Option<Stage>,
    ) -> Result<CountEvent, MalformedEvent> {
        let timestamp = parse_timestamp(&self.timestamp, site_offset)?;
        let count = match &self.count {
            None => 1,
            Some(value) => parse_count(value)?,
        };
        let stage = match (&self.source, default_stage) {
            (Some(label), _) => label.parse()?,
            (None, Some(stage)) => stage,
            (None, None) => return Err(MalformedEvent::MissingStage),
        };
        Ok(CountEvent {
            timestamp,
            count,
            stage,
            shift_hint: self.shift.as_deref().and_then(Shift::from_hint),
        })
    }
}

fn parse_timestamp(raw: &str, site_offset: FixedOffset) -> Result<DateTime<Utc>, MalformedEvent> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            if let Some(local) = site_offset.from_local_datetime(&naive).single() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }
    Err(MalformedEvent::Timestamp(raw.to_owned()))
}

fn parse_count(value: &Value) -> Result<u64, MalformedEvent> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(v)
            } else if n.as_i64().is_some_and(|v| v < 0) {
                Err(MalformedEvent::NegativeCount(n.to_string()))
            } else {
                integral_float(n.as_f64(), &n.to_string())
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<u64>() {
                Ok(v)
            } else if s.parse::<i64>().is_ok_and(|v| v < 0) {
                Err(MalformedEvent::NegativeCount(s.to_owned()))
            } else {
                integral_float(s.parse::<f64>().ok(), s)
            }
        }
        other => Err(MalformedEvent::NonNumericCount(other.to_string())),
    }
}

fn integral_float(value: Option<f64>, raw: &str) -> Result<u64, MalformedEvent> {
    match value {
        Some(v) if v.is_finite() && v < 0.0 => Err(MalformedEvent::NegativeCount(raw.to_owned())),
        Some(v) if v.is_finite() && v.fract() == 0.0 && v <= u64::MAX as f64 => Ok(v as u64),
        _ => Err(MalformedEvent::NonNumericCount(raw.to_owned())),
    }
}

/// A fully materialised batch of events plus the number of records dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub events: Vec<CountEvent>,
    pub malformed: usize,
}

impl EventBatch {
    pub fn new(events: Vec<CountEvent>) -> Self {
        EventBatch {
            events,
            malformed: 0,
        }
    }

    /// Parses every record, dropping and counting the ones that do not validate.
    pub fn from_records<'a, I>(records: I, site_offset: FixedOffset, default_stage: Option<Stage>) -> Self
    where
        I: IntoIterator<Item = &'a RawCountRecord>,
    {
        let mut batch = EventBatch::default();
        for record in records {
            match record.parse(site_offset, default_stage) {
                Ok(event) => batch.events.push(event),
                Err(e) => {
                    debug!(timestamp = %record.timestamp, error = %e, "dropping malformed record");
                    batch.malformed += 1;
                }
            }
        }
        if batch.malformed > 0 {
            warn!(
                malformed = batch.malformed,
                kept = batch.events.len(),
                stage = ?default_stage,
                "batch contained malformed records"
            );
        }
        batch
    }

    /// Folds another batch into this one.
    pub fn extend(&mut self, other: EventBatch) {
        self.events.extend(other.events);
        self.malformed += other.malformed;
    }

    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &CountEvent> {
        self.events.iter().filter(move |e| e.stage == stage)
    }
}
