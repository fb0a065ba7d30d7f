// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Import of road networks from [OpenStreetMap](https://www.openstreetmap.org/) data.

use std::io;
use std::path::Path;

use builder::NetworkLoader;

use crate::dataset::{self, Compression};
use crate::density::BoundingBox;
use crate::network::Network;
use crate::LoadError;

mod builder;
mod model;
mod profile;
mod xml;

pub use profile::{Penalty, Profile, BICYCLE_PROFILE};

/// Additional controls for interpreting OSM data as a road [Network].
#[derive(Debug, Clone, Copy)]
pub struct Options<'a> {
    /// How OSM ways should be interpreted and converted into edges.
    pub profile: &'a Profile<'a>,

    /// Compression of the [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML) input.
    pub compression: Compression,

    /// Only import nodes within this bounding box.
    pub bbox: Option<BoundingBox>,
}

impl Default for Options<'_> {
    fn default() -> Self {
        Self {
            profile: &BICYCLE_PROFILE,
            compression: Compression::Unknown,
            bbox: None,
        }
    }
}

/// Parses OSM XML from a reader into a [Network] as per the provided [Options].
///
/// The provided stream is decompressed and wrapped in a buffered reader
/// as necessary. [Compression::Unknown] is treated as uncompressed input.
pub fn network_from_io<R: io::Read>(options: &Options<'_>, reader: R) -> Result<Network, LoadError> {
    let b = dataset::decompress(reader, options.compression);
    let mut loader = NetworkLoader::new(options);
    loader.add_features(xml::Reader::from_io(b))?;
    loader.finish()
}

/// Parses a (possibly compressed) OSM XML file at the provided path into a [Network].
/// The `.osm.pbf` format is not supported.
pub fn network_from_file<P: AsRef<Path>>(
    options: &Options<'_>,
    path: P,
) -> Result<Network, LoadError> {
    let path = path.as_ref();
    if path.extension().and_then(|e| e.to_str()) == Some("pbf") {
        return Err(LoadError::UnknownFormat(path.to_path_buf()));
    }

    let reader = dataset::open(path, options.compression)?;
    let mut loader = NetworkLoader::new(options);
    loader.add_features(xml::Reader::from_io(reader))?;
    loader.finish()
}

/// Parses OSM XML from a static buffer into a [Network] as per the provided [Options].
pub fn network_from_buffer(options: &Options<'_>, data: &[u8]) -> Result<Network, LoadError> {
    match options.compression {
        Compression::Unknown | Compression::None => {
            // Fast path is available for in-memory XML data
            let mut loader = NetworkLoader::new(options);
            loader.add_features(xml::Reader::from_buffer(data))?;
            loader.finish()
        }
        _ => network_from_io(options, io::Cursor::new(data)),
    }
}
