// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::io;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::Serialize;

use super::{Dimension, HourBucket, RatingEvent, RatingPayload};
use crate::{FeatureKind, LoadError, ValidationError};

/// Default trailing window of aggregate queries.
pub const DEFAULT_WINDOW: TimeDelta = TimeDelta::weeks(10);

/// Default number of most recent reports considered by a majority vote.
pub const DEFAULT_MAJORITY_SAMPLE: usize = 3;

/// Time zone of the local hours used by hour buckets.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Stockholm;

/// Returns a time zone with a constant, whole-hour offset from UTC
/// (one of the `Etc/GMT±N` zones), or `None` if there is no such zone.
pub fn fixed_timezone(hours_east: i32) -> Option<Tz> {
    let name = match hours_east {
        0 => "Etc/GMT".to_string(),
        // Etc/GMT zones have inverted signs: Etc/GMT-1 is UTC+01:00
        h => format!("Etc/GMT{:+}", -h),
    };
    name.parse().ok()
}

/// Mean of every numeric rating dimension. A dimension without any samples is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Averages {
    pub vibe: Option<f64>,
    pub safety: Option<f64>,
    pub availability: Option<f64>,
}

impl Averages {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Vibe => self.vibe,
            Dimension::Safety => self.safety,
            Dimension::Availability => self.availability,
            Dimension::Working => None,
        }
    }
}

/// What is shown next to a pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PumpSummary {
    pub majority_working: Option<bool>,
    pub avg_vibe: Option<f64>,
}

/// What is shown next to a parking spot. `avg_availability` is restricted
/// to an hour bucket, if one was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ParkingSummary {
    pub avg_vibe: Option<f64>,
    pub avg_safety: Option<f64>,
    pub avg_availability: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn get(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Append-only log of [RatingEvents](RatingEvent), grouped by feature.
///
/// The ledger may be shared between threads: every append holds the write lock
/// only for a single push, so an event is either visible in full or not at all.
/// Aggregates never fail; a feature without any events simply has no aggregates.
#[derive(Debug)]
pub struct RatingLedger {
    events: RwLock<HashMap<(FeatureKind, i64), Vec<RatingEvent>>>,
    timezone: Tz,
}

impl Default for RatingLedger {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl RatingLedger {
    /// Creates an empty ledger. `timezone` defines the local time used by hour buckets,
    /// including daylight saving time.
    pub fn new(timezone: Tz) -> Self {
        Self {
            events: RwLock::default(),
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Returns the total number of events in the ledger.
    pub fn len(&self) -> usize {
        self.events.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates and records a new rating of a feature, timestamped with `now`.
    pub fn append(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        payload: RatingPayload,
        now: DateTime<Utc>,
    ) -> Result<RatingEvent, ValidationError> {
        let event = RatingEvent {
            feature_id,
            created_at: now,
            payload,
        };
        self.insert(kind, event)?;
        Ok(event)
    }

    /// Records an existing event, e.g. one read back from a rating log.
    pub fn insert(&self, kind: FeatureKind, event: RatingEvent) -> Result<(), ValidationError> {
        if event.kind() != kind {
            return Err(ValidationError::KindMismatch {
                kind,
                payload: event.kind(),
            });
        }
        event.payload.validate()?;

        self.events
            .write()
            .entry((kind, event.feature_id))
            .or_default()
            .push(event);
        Ok(())
    }

    /// Returns a copy of all events of a feature, in insertion order.
    pub fn events(&self, kind: FeatureKind, feature_id: i64) -> Vec<RatingEvent> {
        self.events
            .read()
            .get(&(kind, feature_id))
            .cloned()
            .unwrap_or_default()
    }

    fn with_window<T, F>(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        window: TimeDelta,
        now: DateTime<Utc>,
        f: F,
    ) -> T
    where
        F: FnOnce(&mut dyn Iterator<Item = &RatingEvent>) -> T,
    {
        let since = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let guard = self.events.read();
        let events = guard
            .get(&(kind, feature_id))
            .map(Vec::as_slice)
            .unwrap_or_default();

        f(&mut events
            .iter()
            .filter(|e| e.created_at >= since && e.created_at <= now))
    }

    /// Computes the mean of every numeric dimension over events created
    /// within `[now - window, now]`.
    pub fn average_over_window(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Averages {
        self.with_window(kind, feature_id, window, now, |events| {
            let mut vibe = Mean::default();
            let mut safety = Mean::default();
            let mut availability = Mean::default();

            for e in events {
                if let Some(v) = e.payload.score(Dimension::Vibe) {
                    vibe.push(v);
                }
                if let Some(v) = e.payload.score(Dimension::Safety) {
                    safety.push(v);
                }
                if let Some(v) = e.payload.score(Dimension::Availability) {
                    availability.push(v);
                }
            }

            Averages {
                vibe: vibe.get(),
                safety: safety.get(),
                availability: availability.get(),
            }
        })
    }

    /// Computes the mean of a single numeric dimension over events created
    /// within `[now - window, now]` at a local hour falling into `bucket`.
    pub fn bucketed_average(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        dimension: Dimension,
        bucket: HourBucket,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        self.with_window(kind, feature_id, window, now, |events| {
            let mut mean = Mean::default();
            for e in events {
                let hour = e.created_at.with_timezone(&self.timezone).hour();
                if bucket.contains(hour) {
                    if let Some(v) = e.payload.score(dimension) {
                        mean.push(v);
                    }
                }
            }
            mean.get()
        })
    }

    /// Returns the majority of the `n` most recent boolean reports of a feature.
    ///
    /// Exact ties resolve to `true`. Events with equal timestamps are ordered
    /// by insertion, later first. Returns `None` if there are no reports, or if
    /// `dimension` is not boolean.
    pub fn majority_of_last_n(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        dimension: Dimension,
        n: usize,
    ) -> Option<bool> {
        if dimension != Dimension::Working {
            return None;
        }

        let guard = self.events.read();
        let events = guard.get(&(kind, feature_id))?;

        let mut reports: Vec<(usize, DateTime<Utc>, bool)> = events
            .iter()
            .enumerate()
            .filter_map(|(idx, e)| e.payload.working().map(|w| (idx, e.created_at, w)))
            .collect();
        drop(guard);

        reports.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
        reports.truncate(n);

        if reports.is_empty() {
            return None;
        }

        let working = reports.iter().filter(|r| r.2).count();
        let broken = reports.len() - working;
        Some(working >= broken)
    }

    /// Returns `Some(true)` if every working-status report within
    /// `[now - window, now]` says working, `Some(false)` if any doesn't,
    /// and `None` if there are no such reports.
    pub fn all_working(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Option<bool> {
        self.with_window(kind, feature_id, window, now, |events| {
            events
                .filter_map(|e| e.payload.working())
                .fold(None, |acc, w| Some(acc.unwrap_or(true) && w))
        })
    }

    pub fn pump_summary(
        &self,
        feature_id: i64,
        majority_sample: usize,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> PumpSummary {
        PumpSummary {
            majority_working: self.majority_of_last_n(
                FeatureKind::Pump,
                feature_id,
                Dimension::Working,
                majority_sample,
            ),
            avg_vibe: self
                .average_over_window(FeatureKind::Pump, feature_id, window, now)
                .vibe,
        }
    }

    pub fn parking_summary(
        &self,
        feature_id: i64,
        availability_bucket: Option<HourBucket>,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> ParkingSummary {
        let avg = self.average_over_window(FeatureKind::Parking, feature_id, window, now);
        let avg_availability = match availability_bucket {
            Some(bucket) => self.bucketed_average(
                FeatureKind::Parking,
                feature_id,
                Dimension::Availability,
                bucket,
                window,
                now,
            ),
            None => avg.availability,
        };

        ParkingSummary {
            avg_vibe: avg.vibe,
            avg_safety: avg.safety,
            avg_availability,
        }
    }

    /// Reads a rating log in the JSON Lines format (one [RatingEvent] per line),
    /// as written by [write_event]. Empty lines are skipped.
    /// Returns the number of imported events.
    pub fn import<R: io::BufRead>(&self, reader: R) -> Result<usize, LoadError> {
        let mut count = 0;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let event: RatingEvent = serde_json::from_str(&line)?;
            self.insert(event.kind(), event)
                .map_err(|source| LoadError::InvalidRating {
                    line: idx + 1,
                    source,
                })?;
            count += 1;
        }

        log::info!("imported {} ratings", count);
        Ok(count)
    }
}

/// Writes a single [RatingEvent] as a line of a JSON Lines rating log.
pub fn write_event<W: io::Write>(mut w: W, event: &RatingEvent) -> io::Result<()> {
    serde_json::to_writer(&mut w, event)?;
    w.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::{ParkingRating, PumpRating};

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!((($a - $b).abs() < 1e-9), "assertion failed: {} ≈ {}", $a, $b)
        };
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn pump(working: bool, vibe: u8) -> RatingPayload {
        RatingPayload::Pump(PumpRating { working, vibe })
    }

    fn parking(safety: u8, availability: u8, vibe: u8) -> RatingPayload {
        RatingPayload::Parking(ParkingRating {
            safety,
            availability,
            vibe,
        })
    }

    fn utc_ledger() -> RatingLedger {
        RatingLedger::new(Tz::UTC)
    }

    #[test]
    fn append_validates() {
        let l = utc_ledger();
        let now = at("2025-09-22T12:00:00Z");

        assert!(matches!(
            l.append(FeatureKind::Pump, 1, pump(true, 0), now),
            Err(ValidationError::OutOfRange { .. }),
        ));
        assert_eq!(
            l.append(FeatureKind::Pump, 1, parking(3, 3, 3), now),
            Err(ValidationError::KindMismatch {
                kind: FeatureKind::Pump,
                payload: FeatureKind::Parking,
            }),
        );
        assert!(l.is_empty());

        let e = l.append(FeatureKind::Pump, 1, pump(true, 4), now).unwrap();
        assert_eq!(e.created_at, now);
        assert_eq!(l.events(FeatureKind::Pump, 1), vec![e]);
        assert!(l.events(FeatureKind::Parking, 1).is_empty());
    }

    #[test]
    fn average_over_window() {
        let l = utc_ledger();
        let now = at("2025-09-22T12:00:00Z");

        l.append(FeatureKind::Parking, 7, parking(2, 4, 5), now).unwrap();
        l.append(FeatureKind::Parking, 7, parking(4, 1, 3), now - TimeDelta::weeks(2))
            .unwrap();
        // Outside of the window
        l.append(FeatureKind::Parking, 7, parking(1, 1, 1), now - TimeDelta::weeks(11))
            .unwrap();

        let avg = l.average_over_window(FeatureKind::Parking, 7, DEFAULT_WINDOW, now);
        assert_almost_eq!(avg.safety.unwrap(), 3.0);
        assert_almost_eq!(avg.availability.unwrap(), 2.5);
        assert_almost_eq!(avg.vibe.unwrap(), 4.0);

        // The window end is inclusive
        let avg = l.average_over_window(FeatureKind::Parking, 7, TimeDelta::zero(), now);
        assert_almost_eq!(avg.safety.unwrap(), 2.0);

        // Pumps have no safety ratings
        l.append(FeatureKind::Pump, 7, pump(true, 2), now).unwrap();
        let avg = l.average_over_window(FeatureKind::Pump, 7, DEFAULT_WINDOW, now);
        assert_eq!(avg.safety, None);
        assert_almost_eq!(avg.vibe.unwrap(), 2.0);
    }

    #[test]
    fn unknown_feature_has_no_aggregates() {
        let l = utc_ledger();
        let now = at("2025-09-22T12:00:00Z");
        assert_eq!(
            l.average_over_window(FeatureKind::Pump, 404, DEFAULT_WINDOW, now),
            Averages::default(),
        );
        assert_eq!(
            l.majority_of_last_n(FeatureKind::Pump, 404, Dimension::Working, 3),
            None
        );
        assert_eq!(l.all_working(FeatureKind::Pump, 404, DEFAULT_WINDOW, now), None);
    }

    #[test]
    fn bucketed_average() {
        let l = RatingLedger::new(fixed_timezone(1).unwrap());
        let now = at("2025-09-22T23:30:00Z");

        // Local hours: 08, 09, 22 and 00
        l.append(FeatureKind::Parking, 1, parking(3, 1, 3), at("2025-09-22T07:15:00Z"))
            .unwrap();
        l.append(FeatureKind::Parking, 1, parking(3, 2, 3), at("2025-09-22T08:15:00Z"))
            .unwrap();
        l.append(FeatureKind::Parking, 1, parking(3, 4, 3), at("2025-09-22T21:15:00Z"))
            .unwrap();
        l.append(FeatureKind::Parking, 1, parking(3, 5, 3), at("2025-09-22T23:15:00Z"))
            .unwrap();

        let avg = |start, end| {
            l.bucketed_average(
                FeatureKind::Parking,
                1,
                Dimension::Availability,
                HourBucket::new(start, end).unwrap(),
                DEFAULT_WINDOW,
                now,
            )
        };

        assert_eq!(avg(8, 9), Some(1.0));
        assert_eq!(avg(8, 10), Some(1.5));
        assert_eq!(avg(12, 18), None);
        assert_eq!(avg(21, 3), Some(4.5));
    }

    #[test]
    fn bucketed_average_follows_daylight_saving_time() {
        let l = RatingLedger::default();
        let now = at("2025-12-31T12:00:00Z");
        let window = TimeDelta::days(365);

        // 08:30 CEST (UTC+2) in summer, 08:30 CET (UTC+1) in winter
        l.append(FeatureKind::Parking, 1, parking(3, 5, 3), at("2025-07-01T06:30:00Z"))
            .unwrap();
        l.append(FeatureKind::Parking, 1, parking(3, 3, 3), at("2025-12-01T07:30:00Z"))
            .unwrap();

        let avg = |start, end| {
            l.bucketed_average(
                FeatureKind::Parking,
                1,
                Dimension::Availability,
                HourBucket::new(start, end).unwrap(),
                window,
                now,
            )
        };

        assert_eq!(avg(8, 9), Some(4.0));
        assert_eq!(avg(6, 8), None);
    }

    #[test]
    fn fixed_timezones() {
        let t = at("2025-07-01T06:30:00Z");
        assert_eq!(t.with_timezone(&fixed_timezone(0).unwrap()).hour(), 6);
        assert_eq!(t.with_timezone(&fixed_timezone(1).unwrap()).hour(), 7);
        assert_eq!(t.with_timezone(&fixed_timezone(-5).unwrap()).hour(), 1);
        assert!(fixed_timezone(20).is_none());
    }

    #[test]
    fn majority_of_last_n() {
        let l = utc_ledger();
        let t0 = at("2025-09-22T12:00:00Z");

        // Most recent first: working, working, broken
        l.append(FeatureKind::Pump, 1, pump(false, 1), t0).unwrap();
        l.append(FeatureKind::Pump, 1, pump(true, 3), t0 + TimeDelta::hours(1))
            .unwrap();
        l.append(FeatureKind::Pump, 1, pump(true, 3), t0 + TimeDelta::hours(2))
            .unwrap();
        assert_eq!(
            l.majority_of_last_n(FeatureKind::Pump, 1, Dimension::Working, 3),
            Some(true)
        );

        // Only two reports, both broken
        l.append(FeatureKind::Pump, 2, pump(false, 1), t0).unwrap();
        l.append(FeatureKind::Pump, 2, pump(false, 1), t0).unwrap();
        assert_eq!(
            l.majority_of_last_n(FeatureKind::Pump, 2, Dimension::Working, 3),
            Some(false)
        );

        assert_eq!(
            l.majority_of_last_n(FeatureKind::Pump, 1, Dimension::Vibe, 3),
            None
        );
    }

    #[test]
    fn majority_ties_favor_working() {
        let l = utc_ledger();
        let t0 = at("2025-09-22T12:00:00Z");

        l.append(FeatureKind::Pump, 1, pump(false, 1), t0).unwrap();
        l.append(FeatureKind::Pump, 1, pump(true, 1), t0).unwrap();
        assert_eq!(
            l.majority_of_last_n(FeatureKind::Pump, 1, Dimension::Working, 3),
            Some(true)
        );

        // Older reports fall out of the sample, regardless of insertion order
        l.append(FeatureKind::Pump, 1, pump(false, 1), t0 + TimeDelta::minutes(5))
            .unwrap();
        l.append(FeatureKind::Pump, 1, pump(true, 1), t0 - TimeDelta::days(1))
            .unwrap();
        assert_eq!(
            l.majority_of_last_n(FeatureKind::Pump, 1, Dimension::Working, 3),
            Some(false)
        );
        assert_eq!(
            l.majority_of_last_n(FeatureKind::Pump, 1, Dimension::Working, 0),
            None
        );
    }

    #[test]
    fn all_working() {
        let l = utc_ledger();
        let now = at("2025-09-22T12:00:00Z");

        l.append(FeatureKind::Pump, 1, pump(true, 3), now).unwrap();
        assert_eq!(l.all_working(FeatureKind::Pump, 1, DEFAULT_WINDOW, now), Some(true));

        l.append(FeatureKind::Pump, 1, pump(false, 3), now - TimeDelta::days(3))
            .unwrap();
        assert_eq!(l.all_working(FeatureKind::Pump, 1, DEFAULT_WINDOW, now), Some(false));
        assert_eq!(
            l.all_working(FeatureKind::Pump, 1, TimeDelta::days(1), now),
            Some(true)
        );
    }

    #[test]
    fn summaries() {
        let l = utc_ledger();
        let now = at("2025-09-22T12:00:00Z");

        l.append(FeatureKind::Pump, 3, pump(true, 5), now).unwrap();
        l.append(FeatureKind::Pump, 3, pump(false, 3), now).unwrap();
        assert_eq!(
            l.pump_summary(3, DEFAULT_MAJORITY_SAMPLE, DEFAULT_WINDOW, now),
            PumpSummary {
                majority_working: Some(true),
                avg_vibe: Some(4.0),
            },
        );

        l.append(FeatureKind::Parking, 3, parking(2, 5, 4), at("2025-09-22T08:00:00Z"))
            .unwrap();
        l.append(FeatureKind::Parking, 3, parking(4, 1, 2), at("2025-09-22T11:00:00Z"))
            .unwrap();
        let s = l.parking_summary(3, None, DEFAULT_WINDOW, now);
        assert_eq!(s.avg_availability, Some(3.0));
        assert_eq!(s.avg_safety, Some(3.0));

        let s = l.parking_summary(3, Some(HourBucket::new(10, 12).unwrap()), DEFAULT_WINDOW, now);
        assert_eq!(s.avg_availability, Some(1.0));
        assert_eq!(s.avg_vibe, Some(3.0));
    }

    #[test]
    fn import_and_write() {
        let now = at("2025-09-22T12:00:00Z");
        let source = utc_ledger();
        let mut log = Vec::new();
        for payload in [pump(true, 4), pump(false, 2)] {
            let e = source.append(FeatureKind::Pump, 5, payload, now).unwrap();
            write_event(&mut log, &e).unwrap();
        }
        log.extend_from_slice(b"\n");

        let l = utc_ledger();
        assert_eq!(l.import(log.as_slice()).unwrap(), 2);
        assert_eq!(l.events(FeatureKind::Pump, 5), source.events(FeatureKind::Pump, 5));

        let bad = br#"{"feature_id":1,"created_at":"2025-09-22T08:30:00Z","payload":{"kind":"pump","working":true,"vibe":9}}"#;
        assert!(matches!(
            l.import(bad.as_slice()),
            Err(LoadError::InvalidRating { line: 1, .. }),
        ));
        assert!(matches!(l.import(b"{".as_slice()), Err(LoadError::Json(_))));
    }

    #[test]
    fn concurrent_appends() {
        let l = utc_ledger();
        let now = at("2025-09-22T12:00:00Z");

        std::thread::scope(|s| {
            for t in 0..8 {
                let l = &l;
                s.spawn(move || {
                    for i in 0..100 {
                        l.append(FeatureKind::Pump, i % 4, pump(t % 2 == 0, 3), now)
                            .unwrap();
                        let _ = l.average_over_window(FeatureKind::Pump, i % 4, DEFAULT_WINDOW, now);
                    }
                });
            }
        });

        assert_eq!(l.len(), 800);
        assert_eq!(l.events(FeatureKind::Pump, 0).len(), 200);
        assert_eq!(
            l.average_over_window(FeatureKind::Pump, 0, DEFAULT_WINDOW, now)
                .vibe,
            Some(3.0)
        );
    }
}
