// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Geospatial queries and bicycle routing for a cycling map.
//!
//! The crate answers "what is near me" queries over bike pumps and parking spots,
//! keeps community ratings of those features with time-windowed aggregates,
//! finds the cheapest bicycle route over a street network imported from
//! [OpenStreetMap](https://www.openstreetmap.org/) data, and computes
//! street-lighting density overlays. All of it is bundled in an [Engine].
//!
//! # Example
//!
//! ```no_run
//! use velomap::{dataset::Compression, engine, feature, osm, FeatureKind, Point};
//!
//! let mut features = feature::FeatureStore::new();
//! features
//!     .load(
//!         FeatureKind::Pump,
//!         feature::features_from_file(FeatureKind::Pump, "pumps.geojson", Compression::Unknown)
//!             .expect("failed to load pumps"),
//!     )
//!     .expect("invalid pumps");
//!
//! let network = osm::network_from_file(&osm::Options::default(), "stockholm.osm.bz2")
//!     .expect("failed to load the road network");
//!
//! let e = velomap::Engine::new(features, network, engine::Options::default());
//! let here = Point::new(18.0686, 59.3293);
//!
//! for n in e.nearest(FeatureKind::Pump, here, Some(5)).unwrap() {
//!     println!("pump {} at {:.0} m", n.feature.id, n.distance);
//! }
//!
//! let route = e.route(here, Point::new(18.0513, 59.3175)).expect("no route");
//! println!("{:.0} m, {:.1} min", route.length, e.travel_time(&route));
//! ```

pub mod dataset;
pub mod density;
mod distance;
pub mod engine;
mod error;
pub mod feature;
pub mod filter;
pub mod geojson;
mod kd;
pub mod network;
pub mod osm;
pub mod rating;

pub use distance::{earth_distance, polyline_length, Point};
pub use engine::Engine;
pub use error::{LoadError, ValidationError};
pub use feature::{Feature, FeatureKind};
pub use kd::{KDTree, Located};
