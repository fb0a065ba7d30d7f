// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::io;
use std::path::Path;

use serde::Deserialize;

use super::{Attributes, Feature, FeatureKind, ParkingAttributes, PumpAttributes};
use crate::dataset::{self, Compression};
use crate::geojson;
use crate::LoadError;

/// Properties of a pump, as present in the dataset. Both the English names
/// and the column names of the municipal dataset are accepted.
#[derive(Debug, Deserialize)]
struct PumpRecord {
    #[serde(alias = "id")]
    fid: i64,
    #[serde(default, alias = "Adress")]
    address: Option<String>,
    #[serde(default, alias = "Namn")]
    name: Option<String>,
    #[serde(default, rename = "type", alias = "Typ")]
    type_: Option<String>,
}

/// Properties of a parking spot, as present in the dataset.
#[derive(Debug, Deserialize)]
struct ParkingRecord {
    #[serde(alias = "id")]
    fid: i64,
    #[serde(default, alias = "Antal_platser", alias = "num_spots")]
    spots: Option<u32>,
    #[serde(default, rename = "type", alias = "Typ")]
    type_: Option<String>,
    #[serde(default, alias = "Bildfiler")]
    photofile: Option<String>,
}

trait Record {
    fn into_parts(self) -> (i64, Attributes);
}

impl Record for PumpRecord {
    fn into_parts(self) -> (i64, Attributes) {
        (
            self.fid,
            Attributes::Pump(PumpAttributes {
                address: self.address,
                name: self.name,
                type_: self.type_,
            }),
        )
    }
}

impl Record for ParkingRecord {
    fn into_parts(self) -> (i64, Attributes) {
        (
            self.fid,
            Attributes::Parking(ParkingAttributes {
                spots: self.spots,
                type_: self.type_,
                photofile: self.photofile,
            }),
        )
    }
}

fn convert<R: Record>(
    kind: FeatureKind,
    fc: geojson::FeatureCollection<R>,
) -> Result<Vec<Feature>, LoadError> {
    fc.features
        .into_iter()
        .map(|f| {
            let (id, attributes) = f.properties.into_parts();
            let position = match f.geometry {
                Some(ref g) => g.as_point().ok_or(LoadError::UnsupportedGeometry {
                    kind,
                    id,
                    got: g.type_name(),
                })?,
                None => {
                    return Err(LoadError::UnsupportedGeometry {
                        kind,
                        id,
                        got: "null",
                    })
                }
            };

            if !position.is_valid() {
                return Err(LoadError::InvalidCoordinate {
                    kind: kind.as_str(),
                    id,
                    lon: position.lon,
                    lat: position.lat,
                });
            }

            Ok(Feature {
                id,
                position,
                attributes,
            })
        })
        .collect()
}

/// Parses a GeoJSON FeatureCollection of Points (in WGS84) into [Features](Feature)
/// of the given kind.
pub fn features_from_io<R: io::Read>(
    kind: FeatureKind,
    reader: R,
) -> Result<Vec<Feature>, LoadError> {
    match kind {
        FeatureKind::Pump => {
            let fc: geojson::FeatureCollection<PumpRecord> = serde_json::from_reader(reader)?;
            convert(kind, fc)
        }
        FeatureKind::Parking => {
            let fc: geojson::FeatureCollection<ParkingRecord> = serde_json::from_reader(reader)?;
            convert(kind, fc)
        }
    }
}

/// Parses a GeoJSON FeatureCollection from a static buffer, see [features_from_io].
pub fn features_from_buffer(kind: FeatureKind, data: &[u8]) -> Result<Vec<Feature>, LoadError> {
    match kind {
        FeatureKind::Pump => {
            let fc: geojson::FeatureCollection<PumpRecord> = serde_json::from_slice(data)?;
            convert(kind, fc)
        }
        FeatureKind::Parking => {
            let fc: geojson::FeatureCollection<ParkingRecord> = serde_json::from_slice(data)?;
            convert(kind, fc)
        }
    }
}

/// Parses a (possibly compressed) GeoJSON file, see [features_from_io].
pub fn features_from_file<P: AsRef<Path>>(
    kind: FeatureKind,
    path: P,
    compression: Compression,
) -> Result<Vec<Feature>, LoadError> {
    let reader = dataset::open(path, compression)?;
    features_from_io(kind, reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    const PUMPS: &[u8] = include_bytes!("test_fixtures/pumps.geojson");
    const PARKING: &[u8] = include_bytes!("test_fixtures/parking.geojson");

    #[test]
    fn load_pumps() {
        let pumps = features_from_buffer(FeatureKind::Pump, PUMPS).unwrap();
        assert_eq!(pumps.len(), 3);
        assert_eq!(pumps[0].id, 1);
        assert_eq!(pumps[0].position, Point::new(18.0686, 59.3293));
        assert_eq!(
            pumps[0].attributes,
            Attributes::Pump(PumpAttributes {
                address: Some("Drottninggatan 1".to_string()),
                name: Some("Pump Norrmalm".to_string()),
                type_: Some("Fast pump".to_string()),
            }),
        );

        // English property names
        assert_eq!(
            pumps[2].attributes,
            Attributes::Pump(PumpAttributes {
                address: Some("Hornsgatan 70".to_string()),
                name: None,
                type_: Some("Fast pump".to_string()),
            }),
        );
    }

    #[test]
    fn load_parking() {
        let parking = features_from_io(FeatureKind::Parking, io::Cursor::new(PARKING)).unwrap();
        assert_eq!(parking.len(), 2);
        assert_eq!(
            parking[0].attributes,
            Attributes::Parking(ParkingAttributes {
                spots: Some(20),
                type_: Some("Cykelställ".to_string()),
                photofile: Some("p101.jpg".to_string()),
            }),
        );
        assert_eq!(parking[1].id, 102);
        assert_eq!(parking[1].kind(), FeatureKind::Parking);
    }

    #[test]
    fn load_rejects_non_points() {
        let data = br#"{"type": "FeatureCollection", "features": [{
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[18.0, 59.3], [18.1, 59.3]]},
            "properties": {"fid": 5}
        }]}"#;
        assert!(matches!(
            features_from_buffer(FeatureKind::Pump, data),
            Err(LoadError::UnsupportedGeometry { id: 5, got: "LineString", .. }),
        ));
    }

    #[test]
    fn load_rejects_bad_coordinates() {
        let data = br#"{"type": "FeatureCollection", "features": [{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [59.3, 218.0]},
            "properties": {"fid": 5}
        }]}"#;
        assert!(matches!(
            features_from_buffer(FeatureKind::Pump, data),
            Err(LoadError::InvalidCoordinate { id: 5, .. }),
        ));
    }

    #[test]
    fn load_rejects_malformed_json() {
        assert!(matches!(
            features_from_buffer(FeatureKind::Parking, b"{\"type\": \"Feature"),
            Err(LoadError::Json(_)),
        ));

        // Missing fid
        let data = br#"{"type": "FeatureCollection", "features": [{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [18.0, 59.3]},
            "properties": {}
        }]}"#;
        assert!(matches!(
            features_from_buffer(FeatureKind::Parking, data),
            Err(LoadError::Json(_)),
        ));
    }
}
