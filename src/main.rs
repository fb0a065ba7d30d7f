// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{TimeDelta, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use velomap::dataset::Compression;
use velomap::density::{BoundingBox, GeoJsonPoints};
use velomap::feature::{self, FeatureStore};
use velomap::filter::Thresholds;
use velomap::geojson::{self, FeatureCollection};
use velomap::network::Network;
use velomap::rating::{self, HourBucket, ParkingRating, PumpRating, RatingPayload};
use velomap::{engine, osm, Engine, FeatureKind, LoadError, Point};

#[derive(Debug, thiserror::Error)]
#[error("{0}: {1}")]
struct DatasetError(PathBuf, #[source] LoadError);

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// GeoJSON file with bike pumps
    #[arg(long)]
    pumps: Option<PathBuf>,

    /// GeoJSON file with bike parking spots
    #[arg(long)]
    parking: Option<PathBuf>,

    /// OSM XML file with the street network (.osm, .osm.gz or .osm.bz2)
    #[arg(long)]
    network: Option<PathBuf>,

    /// JSON Lines log of ratings
    #[arg(long)]
    ratings: Option<PathBuf>,

    /// Time zone of the local hours used by hour buckets
    #[arg(long, default_value_t = rating::DEFAULT_TIMEZONE)]
    timezone: Tz,

    /// Fixed offset of the local time from UTC, in hours, overriding --timezone
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<i32>,

    /// Trailing window of rating aggregates, in days
    #[arg(long, default_value_t = 70)]
    window_days: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Position {
    /// Longitude of the position
    #[arg(allow_hyphen_values = true)]
    lon: f64,

    /// Latitude of the position
    #[arg(allow_hyphen_values = true)]
    lat: f64,
}

impl From<&Position> for Point {
    fn from(p: &Position) -> Self {
        Point::new(p.lon, p.lat)
    }
}

#[derive(Subcommand)]
enum Command {
    /// List features closest to a position
    Nearest {
        kind: FeatureKind,
        #[command(flatten)]
        at: Position,
        /// Maximum number of features
        #[arg(short)]
        k: Option<usize>,
    },

    /// List features within a radius (in meters) of a position
    Within {
        kind: FeatureKind,
        #[command(flatten)]
        at: Position,
        radius: f64,
    },

    /// List features within a radius of a position passing rating thresholds
    Filter {
        kind: FeatureKind,
        #[command(flatten)]
        at: Position,
        radius: f64,
        #[arg(long)]
        min_rating: Option<f64>,
        #[arg(long)]
        min_safety: Option<f64>,
        #[arg(long)]
        min_availability: Option<f64>,
        #[arg(long)]
        require_working: bool,
    },

    /// Find a bicycle route between two positions
    Route {
        #[arg(allow_hyphen_values = true)]
        from_lon: f64,
        #[arg(allow_hyphen_values = true)]
        from_lat: f64,
        #[arg(allow_hyphen_values = true)]
        to_lon: f64,
        #[arg(allow_hyphen_values = true)]
        to_lat: f64,
    },

    /// Rate a feature and append the rating to the ratings log
    Rate {
        #[command(subcommand)]
        rating: RateCommand,
    },

    /// Show aggregated ratings of a feature
    Summary {
        kind: FeatureKind,
        id: i64,
        /// Only use ratings submitted within these local hours, e.g. 7-9
        #[arg(long)]
        hours: Option<HourBucket>,
    },

    /// Count street lights around all features of a kind within a bounding box
    Density {
        kind: FeatureKind,
        /// GeoJSON file with street lights
        #[arg(long)]
        lights: PathBuf,
        /// min_lon,min_lat,max_lon,max_lat
        #[arg(long, value_delimiter = ',', num_args = 4, allow_hyphen_values = true)]
        bbox: Vec<f64>,
        /// Buffer radius, in meters
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Average parking safety over a square grid
    Heatmap {
        /// Cell size, in degrees
        #[arg(long)]
        cell_size: Option<f64>,
    },
}

#[derive(Subcommand)]
enum RateCommand {
    Pump {
        id: i64,
        #[arg(action = clap::ArgAction::Set)]
        working: bool,
        vibe: u8,
    },
    Parking {
        id: i64,
        safety: u8,
        availability: u8,
        vibe: u8,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    colog::init();
    let cli = Cli::parse();

    let timezone = match cli.utc_offset {
        Some(h) => rating::fixed_timezone(h).ok_or_else(|| format!("invalid UTC offset: {h}"))?,
        None => cli.timezone,
    };
    let options = engine::Options {
        timezone,
        rating_window: TimeDelta::try_days(cli.window_days)
            .ok_or_else(|| format!("invalid window: {} days", cli.window_days))?,
        ..Default::default()
    };

    let e = Engine::new(load_features(&cli)?, load_network(&cli)?, options);
    if let Some(ref path) = cli.ratings {
        load_ratings(&e, path)?;
    }

    let now = Utc::now();
    match cli.command {
        Command::Nearest { kind, ref at, k } => {
            let found = e.nearest(kind, at.into(), k)?;
            print_json(&collection(&found))
        }

        Command::Within {
            kind,
            ref at,
            radius,
        } => {
            let found = e.within(kind, at.into(), radius)?;
            print_json(&collection(&found))
        }

        Command::Filter {
            kind,
            ref at,
            radius,
            min_rating,
            min_safety,
            min_availability,
            require_working,
        } => {
            let thresholds = Thresholds {
                min_rating,
                min_safety,
                min_availability,
                require_working,
            };
            let found = e.filtered(kind, at.into(), radius, &thresholds, now)?;
            print_json(&collection(&found))
        }

        Command::Route {
            from_lon,
            from_lat,
            to_lon,
            to_lat,
        } => {
            let route = e.route(Point::new(from_lon, from_lat), Point::new(to_lon, to_lat))?;
            let feature = geojson::route_feature(&route, e.options().cycling_speed);
            print_json(&FeatureCollection::new(vec![feature]))
        }

        Command::Rate { ref rating } => {
            let (kind, id, payload) = match *rating {
                RateCommand::Pump { id, working, vibe } => (
                    FeatureKind::Pump,
                    id,
                    RatingPayload::Pump(PumpRating { working, vibe }),
                ),
                RateCommand::Parking {
                    id,
                    safety,
                    availability,
                    vibe,
                } => (
                    FeatureKind::Parking,
                    id,
                    RatingPayload::Parking(ParkingRating {
                        safety,
                        availability,
                        vibe,
                    }),
                ),
            };

            let event = e.submit_rating(kind, id, payload, now)?;
            if let Some(ref path) = cli.ratings {
                let f = OpenOptions::new().create(true).append(true).open(path)?;
                rating::write_event(f, &event)?;
            } else {
                log::warn!("no --ratings log given, the rating is not saved");
            }
            print_json(&event)
        }

        Command::Summary { kind, id, hours } => match kind {
            FeatureKind::Pump => print_json(&e.pump_summary(id, now)),
            FeatureKind::Parking => print_json(&e.parking_summary(id, hours, now)),
        },

        Command::Density {
            kind,
            ref lights,
            ref bbox,
            radius,
        } => {
            let bbox = BoundingBox::try_from(<[f64; 4]>::try_from(bbox.as_slice())?)?;
            let centroids: Vec<Point> = e
                .features()
                .all(kind)
                .map(|f| f.position)
                .filter(|&p| bbox.contains(p))
                .collect();
            let source = GeoJsonPoints {
                path: lights.clone(),
                compression: Compression::Unknown,
            };
            let zones = e.light_density_from(&source, &centroids, &bbox, radius)?;
            print_json(&collection(&zones))
        }

        Command::Heatmap { cell_size } => {
            let cells = e.safety_heatmap(cell_size, now)?;
            print_json(&collection(&cells))
        }
    }
}

fn load_features(cli: &Cli) -> Result<FeatureStore, DatasetError> {
    let mut store = FeatureStore::new();
    for (kind, path) in [
        (FeatureKind::Pump, &cli.pumps),
        (FeatureKind::Parking, &cli.parking),
    ] {
        let Some(path) = path else { continue };
        feature::features_from_file(kind, path, Compression::Unknown)
            .and_then(|features| store.load(kind, features))
            .map_err(|e| DatasetError(path.clone(), e))?;
    }
    Ok(store)
}

fn load_network(cli: &Cli) -> Result<Network, DatasetError> {
    match cli.network {
        Some(ref path) => osm::network_from_file(&osm::Options::default(), path)
            .map_err(|e| DatasetError(path.clone(), e)),
        None => Ok(Network::default()),
    }
}

fn load_ratings(e: &Engine, path: &Path) -> Result<(), DatasetError> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(DatasetError(path.to_path_buf(), err.into())),
    };

    let count = e
        .ratings()
        .import(BufReader::new(f))
        .map_err(|err| DatasetError(path.to_path_buf(), err))?;
    log::info!("loaded {} ratings", count);
    Ok(())
}

fn collection<'a, T, P>(items: &'a [T]) -> FeatureCollection<P>
where
    geojson::Feature<P>: From<&'a T>,
{
    items.iter().map(geojson::Feature::from).collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
