// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Point features (bike pumps and parking spots) and the spatial store answering
//! nearest-k and within-radius queries over them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Point;

mod load;
mod store;

pub use load::{features_from_buffer, features_from_file, features_from_io};
pub use store::{FeatureStore, Neighbor};

/// The kind of a [Feature]. Feature ids are only unique within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Pump,
    Parking,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pump => "pump",
            Self::Parking => "parking",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pump" | "pumps" => Ok(Self::Pump),
            "parking" => Ok(Self::Parking),
            _ => Err(format!("unknown feature kind: {s:?} (expected pump or parking)")),
        }
    }
}

/// Attributes of a bike pump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// Attributes of a bike parking spot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingAttributes {
    /// Number of bikes which can be parked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spots: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photofile: Option<String>,
}

/// Kind-specific attributes of a [Feature].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Attributes {
    Pump(PumpAttributes),
    Parking(ParkingAttributes),
}

impl Attributes {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Pump(_) => FeatureKind::Pump,
            Self::Parking(_) => FeatureKind::Parking,
        }
    }
}

/// A point-located, attributed real-world object.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: i64,
    pub position: Point,
    pub attributes: Attributes,
}

impl Feature {
    pub fn kind(&self) -> FeatureKind {
        self.attributes.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_str() {
        assert_eq!("pump".parse::<FeatureKind>(), Ok(FeatureKind::Pump));
        assert_eq!("parking".parse::<FeatureKind>(), Ok(FeatureKind::Parking));
        assert!("bench".parse::<FeatureKind>().is_err());
        assert_eq!(FeatureKind::Parking.to_string(), "parking");
    }

    #[test]
    fn attributes_serialize_flat() {
        let a = Attributes::Parking(ParkingAttributes {
            spots: Some(12),
            type_: Some("Cykelställ".to_string()),
            photofile: None,
        });
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::json!({"spots": 12, "type": "Cykelställ"}),
        );
    }
}
