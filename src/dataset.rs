// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Opening of (possibly compressed) dataset files.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::LoadError;

/// Compression of an input dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Guess the compression based on the file extension
    #[default]
    Unknown,

    /// Force uncompressed input
    None,

    /// Force [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    Gzip,

    /// Force [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    Bzip2,
}

impl Compression {
    /// Guesses the compression from the extension of a file:
    /// `.gz` means [Compression::Gzip], `.bz2` means [Compression::Bzip2],
    /// and anything else is assumed to be uncompressed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("gz") => Self::Gzip,
            Some("bz2") => Self::Bzip2,
            _ => Self::None,
        }
    }

    /// Resolves [Compression::Unknown] by looking at the file extension.
    pub fn resolve<P: AsRef<Path>>(self, path: P) -> Self {
        if self == Self::Unknown {
            Self::from_path(path)
        } else {
            self
        }
    }
}

/// Wraps a reader in the appropriate decompressor and a buffered reader.
///
/// [Compression::Unknown] can't be resolved without a file name and is treated
/// as uncompressed input.
pub fn decompress<'r, R: io::Read + 'r>(
    reader: R,
    compression: Compression,
) -> Box<dyn io::BufRead + 'r> {
    match compression {
        Compression::Unknown | Compression::None => Box::new(io::BufReader::new(reader)),
        Compression::Gzip => Box::new(io::BufReader::new(flate2::read::MultiGzDecoder::new(
            reader,
        ))),
        Compression::Bzip2 => Box::new(io::BufReader::new(bzip2::read::MultiBzDecoder::new(
            reader,
        ))),
    }
}

/// Opens a dataset file, decompressing it as necessary.
pub fn open<P: AsRef<Path>>(
    path: P,
    compression: Compression,
) -> Result<Box<dyn io::BufRead>, LoadError> {
    let path = path.as_ref();
    let compression = compression.resolve(path);
    log::debug!("opening {} ({:?})", path.display(), compression);
    let f = File::open(path)?;
    Ok(decompress(f, compression))
}
