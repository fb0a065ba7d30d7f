// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::io;
use std::str::from_utf8;

use quick_xml::events::{BytesStart, Event};

use super::model::{Feature, Node, Way};
use crate::Point;

/// Parser is a trait for objects which can parse XML.
///
/// This trait only exists to fix the mismatch of
/// [quick_xml::Reader::read_event] when working on buffered data
/// and [quick_xml::Reader::read_event_into] when working on IO.
pub(super) trait Parser {
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>>;
}

/// IoParser implements [Parser] over an [std::io::BufRead].
pub(super) struct IoParser<R: io::BufRead>(quick_xml::Reader<R>, Vec<u8>);

impl<R: io::BufRead> Parser for IoParser<R> {
    #[inline]
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>> {
        self.1.clear();
        self.0.read_event_into(&mut self.1)
    }
}

/// BufParser implements [Parser] over a slice of bytes (`&[u8]`).
pub(super) struct BufParser<'a>(quick_xml::Reader<&'a [u8]>);

impl<'a> Parser for BufParser<'a> {
    #[inline]
    fn read_event<'b>(&'b mut self) -> quick_xml::Result<Event<'b>> {
        self.0.read_event()
    }
}

/// Reader streams OSM [Features](Feature) (nodes and ways) from an
/// [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML) document.
pub(super) struct Reader<P: Parser> {
    parser: P,
    eof: bool,
}

impl<'a> Reader<BufParser<'a>> {
    pub(super) fn from_buffer(data: &'a [u8]) -> Self {
        Self {
            parser: BufParser(quick_xml::Reader::from_reader(data)),
            eof: false,
        }
    }
}

impl<R: io::BufRead> Reader<IoParser<R>> {
    pub(super) fn from_io(reader: R) -> Self {
        Self {
            parser: IoParser(quick_xml::Reader::from_reader(reader), Vec::default()),
            eof: false,
        }
    }
}

impl<P: Parser> Iterator for Reader<P> {
    type Item = Result<Feature, quick_xml::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut f: Option<Feature> = None;

        while !self.eof {
            let event = match self.parser.read_event() {
                Ok(e) => e,
                Err(e) => {
                    self.eof = true;
                    return Some(Err(e));
                }
            };

            match event {
                Event::Empty(start) => match start.local_name().as_ref() {
                    b"node" => {
                        if let Some(n) = parse_node(&start) {
                            return Some(Ok(Feature::Node(n)));
                        }
                    }
                    b"tag" => {
                        if let Some(Feature::Way(ref mut w)) = f {
                            if let Some((k, v)) = parse_tag(&start) {
                                w.tags.insert(k, v);
                            }
                        }
                    }
                    b"nd" => {
                        if let Some(Feature::Way(ref mut w)) = f {
                            if let Some(ref_) = parse_nd(&start) {
                                w.nodes.push(ref_);
                            }
                        }
                    }
                    _ => {}
                },

                Event::Start(start) => match start.local_name().as_ref() {
                    b"node" => f = parse_node(&start).map(Feature::Node),
                    b"way" => f = parse_way(&start).map(Feature::Way),
                    // Members and tags of relations are skipped
                    b"relation" => f = None,
                    _ => {}
                },

                Event::End(end) => match end.local_name().as_ref() {
                    b"node" | b"way" => {
                        if let Some(f) = f.take() {
                            return Some(Ok(f));
                        }
                    }
                    _ => {}
                },

                Event::Eof => {
                    self.eof = true;
                }

                _ => {}
            }
        }

        f.map(Ok)
    }
}

fn parse_id(start: &BytesStart<'_>, key: &[u8]) -> Option<i64> {
    start
        .attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| from_utf8(&attr.value).ok()?.parse().ok())
        .filter(|&id| id != 0)
}

fn parse_node(start: &BytesStart<'_>) -> Option<Node> {
    let mut id: i64 = 0;
    let mut lat = f64::NAN;
    let mut lon = f64::NAN;

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"id" => id = from_utf8(&attr.value).ok()?.parse().ok()?,
            b"lat" => lat = from_utf8(&attr.value).ok()?.parse().ok()?,
            b"lon" => lon = from_utf8(&attr.value).ok()?.parse().ok()?,
            _ => {}
        }
    }

    let position = Point::new(lon, lat);
    if id != 0 && position.is_valid() {
        Some(Node { id, position })
    } else {
        log::warn!("skipping node with invalid attributes: id={} lat={} lon={}", id, lat, lon);
        None
    }
}

fn parse_way(start: &BytesStart<'_>) -> Option<Way> {
    parse_id(start, b"id").map(|id| Way {
        id,
        nodes: Vec::default(),
        tags: HashMap::default(),
    })
}

fn parse_tag(start: &BytesStart<'_>) -> Option<(String, String)> {
    let mut k = None;
    let mut v = None;

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"k" => k = attr.unescape_value().ok().map(|s| s.into_owned()),
            b"v" => v = attr.unescape_value().ok().map(|s| s.into_owned()),
            _ => {}
        }
    }

    k.map(|k| (k, v.unwrap_or_default()))
}

fn parse_nd(start: &BytesStart<'_>) -> Option<i64> {
    parse_id(start, b"ref")
}
