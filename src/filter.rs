// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Spatial queries over features combined with thresholds on their rating aggregates.

use chrono::{DateTime, TimeDelta, Utc};

use crate::feature::{FeatureStore, Neighbor};
use crate::rating::{Averages, RatingLedger};
use crate::{FeatureKind, Point, ValidationError};

/// Minimum aggregates a feature must have to be returned by [filtered_within].
/// `None` disables a threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    /// Minimum average vibe.
    pub min_rating: Option<f64>,
    pub min_safety: Option<f64>,
    pub min_availability: Option<f64>,

    /// Only keep pumps which all recent reports consider working.
    pub require_working: bool,
}

/// Checks a single aggregate against a threshold.
///
/// A feature without samples (`aggregate == None`) always passes, so that new and
/// unrated features are never hidden by filters.
pub fn passes_threshold(aggregate: Option<f64>, threshold: Option<f64>) -> bool {
    match (aggregate, threshold) {
        (Some(value), Some(min)) => value >= min,
        _ => true,
    }
}

impl Thresholds {
    /// Checks all thresholds. Like with [passes_threshold], an unknown
    /// working status passes [Thresholds::require_working].
    pub fn accepts(&self, averages: &Averages, all_working: Option<bool>) -> bool {
        passes_threshold(averages.vibe, self.min_rating)
            && passes_threshold(averages.safety, self.min_safety)
            && passes_threshold(averages.availability, self.min_availability)
            && (!self.require_working || all_working.unwrap_or(true))
    }
}

/// A feature which passed [Thresholds], with the aggregates it was judged by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredFeature<'a> {
    pub neighbor: Neighbor<'a>,
    pub averages: Averages,
    pub all_working: Option<bool>,
}

/// Returns features of a given kind within `radius` meters of `p` whose rating aggregates
/// over `[now - window, now]` pass the `thresholds`. Results are ordered like
/// [FeatureStore::within].
pub fn filtered_within<'a>(
    store: &'a FeatureStore,
    ledger: &RatingLedger,
    kind: FeatureKind,
    p: Point,
    radius: f64,
    thresholds: &Thresholds,
    window: TimeDelta,
    now: DateTime<Utc>,
) -> Result<Vec<FilteredFeature<'a>>, ValidationError> {
    p.validate()?;
    if !radius.is_finite() || radius < 0.0 {
        return Err(ValidationError::Radius(radius));
    }

    let candidates = store.within(kind, p, radius);
    let total = candidates.len();

    let kept: Vec<FilteredFeature<'a>> = candidates
        .into_iter()
        .filter_map(|neighbor| {
            let id = neighbor.feature.id;
            let averages = ledger.average_over_window(kind, id, window, now);
            let all_working = match kind {
                FeatureKind::Pump => ledger.all_working(kind, id, window, now),
                FeatureKind::Parking => None,
            };

            if thresholds.accepts(&averages, all_working) {
                Some(FilteredFeature {
                    neighbor,
                    averages,
                    all_working,
                })
            } else {
                None
            }
        })
        .collect();

    log::debug!(
        "{} of {} {} features within {} m passed the filter",
        kept.len(),
        total,
        kind,
        radius
    );
    Ok(kept)
}
