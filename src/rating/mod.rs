// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Anonymous community ratings of features and their aggregates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FeatureKind, ValidationError};

mod bucket;
mod ledger;

pub use bucket::HourBucket;
pub use ledger::{
    fixed_timezone, write_event, Averages, ParkingSummary, PumpSummary, RatingLedger,
    DEFAULT_MAJORITY_SAMPLE, DEFAULT_TIMEZONE, DEFAULT_WINDOW,
};

/// Lowest accepted score of a numeric rating dimension.
pub const MIN_SCORE: u8 = 1;

/// Highest accepted score of a numeric rating dimension.
pub const MAX_SCORE: u8 = 5;

/// A single rated aspect of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// Whether a pump works (boolean).
    Working,
    /// General impression, 1-5, for pumps and parking spots.
    Vibe,
    /// How safe a bike is left at a parking spot, 1-5.
    Safety,
    /// How likely it is to find a free spot, 1-5.
    Availability,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Vibe => "vibe",
            Self::Safety => "safety",
            Self::Availability => "availability",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rating of a bike pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpRating {
    pub working: bool,
    pub vibe: u8,
}

/// A rating of a bike parking spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingRating {
    pub safety: u8,
    pub availability: u8,
    pub vibe: u8,
}

/// Kind-specific contents of a rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RatingPayload {
    Pump(PumpRating),
    Parking(ParkingRating),
}

impl RatingPayload {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Pump(_) => FeatureKind::Pump,
            Self::Parking(_) => FeatureKind::Parking,
        }
    }

    /// Checks that all numeric scores are within [MIN_SCORE]..=[MAX_SCORE].
    pub fn validate(&self) -> Result<(), ValidationError> {
        let scores = match self {
            Self::Pump(r) => vec![(Dimension::Vibe, r.vibe)],
            Self::Parking(r) => vec![
                (Dimension::Safety, r.safety),
                (Dimension::Availability, r.availability),
                (Dimension::Vibe, r.vibe),
            ],
        };

        match scores
            .iter()
            .find(|(_, value)| !(MIN_SCORE..=MAX_SCORE).contains(value))
        {
            Some(&(dimension, value)) => Err(ValidationError::OutOfRange { dimension, value }),
            None => Ok(()),
        }
    }

    /// Returns the score of a numeric dimension, or `None` if this kind of
    /// rating doesn't have it. [Dimension::Working] is not numeric.
    pub fn score(&self, dimension: Dimension) -> Option<f64> {
        match (self, dimension) {
            (Self::Pump(r), Dimension::Vibe) => Some(r.vibe as f64),
            (Self::Parking(r), Dimension::Vibe) => Some(r.vibe as f64),
            (Self::Parking(r), Dimension::Safety) => Some(r.safety as f64),
            (Self::Parking(r), Dimension::Availability) => Some(r.availability as f64),
            _ => None,
        }
    }

    /// Returns the reported working status of a pump.
    pub fn working(&self) -> Option<bool> {
        match self {
            Self::Pump(r) => Some(r.working),
            Self::Parking(_) => None,
        }
    }
}

/// A submitted rating. Events are never modified or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEvent {
    pub feature_id: i64,
    pub created_at: DateTime<Utc>,
    pub payload: RatingPayload,
}

impl RatingEvent {
    pub fn kind(&self) -> FeatureKind {
        self.payload.kind()
    }
}
