// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Single entry point bundling all datasets and answering every supported request.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::density::{
    self, BoundingBox, DensityZone, GridCell, PointSource, DEFAULT_CELL_SIZE,
    DEFAULT_DENSITY_RADIUS,
};
use crate::feature::{FeatureStore, Neighbor};
use crate::filter::{self, FilteredFeature, Thresholds};
use crate::network::{Network, Route, RouteError, RouteOptions, DEFAULT_CYCLING_SPEED};
use crate::rating::{
    self, Averages, Dimension, HourBucket, ParkingSummary, PumpSummary, RatingEvent,
    RatingLedger, RatingPayload,
};
use crate::{FeatureKind, Point, ValidationError};

/// Tunable defaults of an [Engine].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    /// Number of features returned by nearest-feature queries.
    pub nearest_limit: usize,

    /// Trailing window of rating aggregates.
    pub rating_window: TimeDelta,

    /// Number of most recent reports deciding whether a pump works.
    pub majority_sample: usize,

    /// Speed used to estimate travel times, in meters per second.
    pub cycling_speed: f64,

    /// Radius of light density buffers, in meters.
    pub density_radius: f64,

    /// Time zone of the local hours used by hour buckets.
    pub timezone: Tz,

    pub route: RouteOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            nearest_limit: 20,
            rating_window: rating::DEFAULT_WINDOW,
            majority_sample: rating::DEFAULT_MAJORITY_SAMPLE,
            cycling_speed: DEFAULT_CYCLING_SPEED,
            density_radius: DEFAULT_DENSITY_RADIUS,
            timezone: rating::DEFAULT_TIMEZONE,
            route: RouteOptions::default(),
        }
    }
}

/// Bundles the [FeatureStore], the road [Network] and the [RatingLedger].
///
/// Features and the network are read-only, while ratings may be submitted
/// concurrently with any other request. The engine is meant to be shared
/// between worker threads behind an [Arc](std::sync::Arc).
#[derive(Debug)]
pub struct Engine {
    features: FeatureStore,
    network: Network,
    ratings: RatingLedger,
    options: Options,
}

impl Engine {
    pub fn new(features: FeatureStore, network: Network, options: Options) -> Self {
        Self {
            features,
            network,
            ratings: RatingLedger::new(options.timezone),
            options,
        }
    }

    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn ratings(&self) -> &RatingLedger {
        &self.ratings
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns up to `k` (or [Options::nearest_limit]) features of a kind closest to `p`.
    pub fn nearest(
        &self,
        kind: FeatureKind,
        p: Point,
        k: Option<usize>,
    ) -> Result<Vec<Neighbor<'_>>, ValidationError> {
        p.validate()?;
        Ok(self
            .features
            .nearest(kind, p, k.unwrap_or(self.options.nearest_limit)))
    }

    /// Returns all features of a kind within `radius` meters of `p`.
    pub fn within(
        &self,
        kind: FeatureKind,
        p: Point,
        radius: f64,
    ) -> Result<Vec<Neighbor<'_>>, ValidationError> {
        p.validate()?;
        if !radius.is_finite() || radius < 0.0 {
            return Err(ValidationError::Radius(radius));
        }
        Ok(self.features.within(kind, p, radius))
    }

    /// Returns features of a kind within `radius` meters of `p` passing the `thresholds`,
    /// see [filter::filtered_within].
    pub fn filtered(
        &self,
        kind: FeatureKind,
        p: Point,
        radius: f64,
        thresholds: &Thresholds,
        now: DateTime<Utc>,
    ) -> Result<Vec<FilteredFeature<'_>>, ValidationError> {
        filter::filtered_within(
            &self.features,
            &self.ratings,
            kind,
            p,
            radius,
            thresholds,
            self.options.rating_window,
            now,
        )
    }

    /// Finds the cheapest bicycle route between two positions.
    pub fn route(&self, start: Point, end: Point) -> Result<Route, RouteError> {
        self.network
            .shortest_path(start, end, &self.options.route)
    }

    /// Estimates the riding time of a route at [Options::cycling_speed], in minutes.
    pub fn travel_time(&self, route: &Route) -> f64 {
        route.travel_time(self.options.cycling_speed)
    }

    /// Records a rating of an existing feature.
    pub fn submit_rating(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        payload: RatingPayload,
        now: DateTime<Utc>,
    ) -> Result<RatingEvent, ValidationError> {
        if self.features.get(kind, feature_id).is_none() {
            return Err(ValidationError::UnknownFeature {
                kind,
                id: feature_id,
            });
        }

        let event = self.ratings.append(kind, feature_id, payload, now)?;
        log::debug!("rated {} {}", kind, feature_id);
        Ok(event)
    }

    /// Computes mean ratings of a feature over the trailing `window`
    /// (or [Options::rating_window]), optionally restricted to an hour bucket.
    pub fn aggregate(
        &self,
        kind: FeatureKind,
        feature_id: i64,
        window: Option<TimeDelta>,
        bucket: Option<HourBucket>,
        now: DateTime<Utc>,
    ) -> Averages {
        let window = window.unwrap_or(self.options.rating_window);
        match bucket {
            None => self
                .ratings
                .average_over_window(kind, feature_id, window, now),
            Some(bucket) => {
                let avg = |dimension| {
                    self.ratings
                        .bucketed_average(kind, feature_id, dimension, bucket, window, now)
                };
                Averages {
                    vibe: avg(Dimension::Vibe),
                    safety: avg(Dimension::Safety),
                    availability: avg(Dimension::Availability),
                }
            }
        }
    }

    /// Decides whether a pump works by a majority of the `n`
    /// (or [Options::majority_sample]) most recent reports.
    pub fn majority(&self, kind: FeatureKind, feature_id: i64, n: Option<usize>) -> Option<bool> {
        self.ratings.majority_of_last_n(
            kind,
            feature_id,
            Dimension::Working,
            n.unwrap_or(self.options.majority_sample),
        )
    }

    pub fn pump_summary(&self, feature_id: i64, now: DateTime<Utc>) -> PumpSummary {
        self.ratings.pump_summary(
            feature_id,
            self.options.majority_sample,
            self.options.rating_window,
            now,
        )
    }

    pub fn parking_summary(
        &self,
        feature_id: i64,
        availability_bucket: Option<HourBucket>,
        now: DateTime<Utc>,
    ) -> ParkingSummary {
        self.ratings.parking_summary(
            feature_id,
            availability_bucket,
            self.options.rating_window,
            now,
        )
    }

    /// Counts lights around every centroid, see [density::light_density].
    pub fn light_density(
        &self,
        centroids: &[Point],
        bbox: &BoundingBox,
        radius: Option<f64>,
        lights: &[Point],
    ) -> Result<Vec<DensityZone>, ValidationError> {
        density::light_density(
            centroids,
            bbox,
            radius.unwrap_or(self.options.density_radius),
            lights,
        )
    }

    /// Counts lights provided by an external source around every centroid,
    /// see [density::light_density_from].
    pub fn light_density_from<S: PointSource + ?Sized>(
        &self,
        source: &S,
        centroids: &[Point],
        bbox: &BoundingBox,
        radius: Option<f64>,
    ) -> Result<Vec<DensityZone>, ValidationError> {
        density::light_density_from(
            source,
            centroids,
            bbox,
            radius.unwrap_or(self.options.density_radius),
        )
    }

    /// Averages the recent safety ratings of all parking spots over a square grid
    /// of `cell_size` (by default 0.01) degrees.
    pub fn safety_heatmap(
        &self,
        cell_size: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<GridCell>, ValidationError> {
        let samples: Vec<(Point, f64)> = self
            .features
            .all(FeatureKind::Parking)
            .filter_map(|f| {
                self.ratings
                    .average_over_window(FeatureKind::Parking, f.id, self.options.rating_window, now)
                    .safety
                    .map(|safety| (f.position, safety))
            })
            .collect();

        density::grid_average(&samples, cell_size.unwrap_or(DEFAULT_CELL_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{features_from_buffer, Attributes};
    use crate::network::NetworkBuilder;
    use crate::rating::{ParkingRating, PumpRating};

    const PUMPS: &[u8] = include_bytes!("feature/test_fixtures/pumps.geojson");
    const PARKING: &[u8] = include_bytes!("feature/test_fixtures/parking.geojson");

    fn now() -> DateTime<Utc> {
        "2025-09-22T12:00:00Z".parse().unwrap()
    }

    fn engine() -> Engine {
        let mut features = FeatureStore::new();
        for (kind, data) in [(FeatureKind::Pump, PUMPS), (FeatureKind::Parking, PARKING)] {
            features
                .load(kind, features_from_buffer(kind, data).unwrap())
                .unwrap();
        }

        let mut b = NetworkBuilder::new();
        b.add_vertex(1, Point::new(18.0686, 59.3293))
            .add_vertex(2, Point::new(18.0717, 59.3199))
            .add_vertex(3, Point::new(18.0513, 59.3175))
            .add_edge(1, 1, 2, 1100.0, 1100.0, vec![])
            .add_edge(2, 2, 3, 1200.0, -1.0, vec![]);

        Engine::new(features, b.build().unwrap(), Options::default())
    }

    fn pump(working: bool, vibe: u8) -> RatingPayload {
        RatingPayload::Pump(PumpRating { working, vibe })
    }

    #[test]
    fn engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn nearest_and_within() {
        let e = engine();
        let p = Point::new(18.0686, 59.3290);

        let found = e.nearest(FeatureKind::Pump, p, None).unwrap();
        assert_eq!(found.iter().map(|n| n.feature.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(e.nearest(FeatureKind::Pump, p, Some(1)).unwrap().len(), 1);

        let found = e.within(FeatureKind::Pump, p, 100.0).unwrap();
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0].feature.attributes, Attributes::Pump(_)));

        assert!(e.nearest(FeatureKind::Pump, Point::new(0.0, -100.0), None).is_err());
        assert!(e.within(FeatureKind::Pump, p, f64::INFINITY).is_err());
    }

    #[test]
    fn submit_rating() {
        let e = engine();
        assert!(e.submit_rating(FeatureKind::Pump, 1, pump(true, 4), now()).is_ok());
        assert_eq!(
            e.submit_rating(FeatureKind::Pump, 404, pump(true, 4), now()),
            Err(ValidationError::UnknownFeature {
                kind: FeatureKind::Pump,
                id: 404,
            }),
        );
        assert!(matches!(
            e.submit_rating(FeatureKind::Pump, 1, pump(true, 7), now()),
            Err(ValidationError::OutOfRange { .. }),
        ));
        assert_eq!(e.ratings().len(), 1);
    }

    #[test]
    fn ratings_roundtrip_through_engine() {
        let e = engine();
        e.submit_rating(FeatureKind::Pump, 2, pump(false, 2), now())
            .unwrap();
        e.submit_rating(FeatureKind::Pump, 2, pump(true, 4), now())
            .unwrap();
        e.submit_rating(FeatureKind::Pump, 2, pump(false, 3), now())
            .unwrap();

        assert_eq!(e.majority(FeatureKind::Pump, 2, None), Some(false));
        assert_eq!(e.majority(FeatureKind::Pump, 1, None), None);

        let avg = e.aggregate(FeatureKind::Pump, 2, None, None, now());
        assert_eq!(avg.vibe, Some(3.0));
        assert_eq!(
            e.aggregate(FeatureKind::Pump, 2, Some(TimeDelta::zero()), None, now() - TimeDelta::days(1)),
            Averages::default(),
        );

        // 12:00 UTC is 14:00 in Stockholm summer time
        let bucket = HourBucket::new(14, 15).unwrap();
        assert_eq!(
            e.aggregate(FeatureKind::Pump, 2, None, Some(bucket), now()).vibe,
            Some(3.0)
        );
        let bucket = HourBucket::new(13, 14).unwrap();
        assert_eq!(
            e.aggregate(FeatureKind::Pump, 2, None, Some(bucket), now()).vibe,
            None
        );

        assert_eq!(
            e.pump_summary(2, now()),
            PumpSummary {
                majority_working: Some(false),
                avg_vibe: Some(3.0),
            },
        );
    }

    #[test]
    fn route() {
        let e = engine();
        let r = e
            .route(Point::new(18.0686, 59.3293), Point::new(18.0513, 59.3175))
            .unwrap();
        assert_eq!(r.cost, 2300.0);
        assert_eq!(r.edges_in_path(), 2);
        assert!((e.travel_time(&r) - r.length / DEFAULT_CYCLING_SPEED / 60.0).abs() < 1e-9);

        // Edge 2 is one-way
        assert!(matches!(
            e.route(Point::new(18.0513, 59.3175), Point::new(18.0686, 59.3293)),
            Err(RouteError::NoPathFound { from: 3, to: 1 }),
        ));
    }

    #[test]
    fn safety_heatmap() {
        let e = engine();
        e.submit_rating(
            FeatureKind::Parking,
            101,
            RatingPayload::Parking(ParkingRating {
                safety: 4,
                availability: 2,
                vibe: 3,
            }),
            now(),
        )
        .unwrap();

        let cells = e.safety_heatmap(None, now()).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].value, 4.0);
        assert_eq!(cells[0].samples, 1);
        assert!(cells[0].bbox.contains(e.features().get(FeatureKind::Parking, 101).unwrap().position));
    }

    #[test]
    fn light_density() {
        let e = engine();
        let bbox = BoundingBox::new(18.0, 59.3, 18.1, 59.4).unwrap();
        let centroid = Point::new(18.0686, 59.3293);
        let lights = [Point::new(18.0686, 59.3295), Point::new(18.0710, 59.3293)];

        let zones = e.light_density(&[centroid], &bbox, None, &lights).unwrap();
        assert_eq!(zones[0].count, 1);
        assert_eq!(zones[0].radius, 100.0);

        let zones = e
            .light_density_from(&lights[..], &[centroid], &bbox, Some(200.0))
            .unwrap();
        assert_eq!(zones[0].count, 2);
    }
}
