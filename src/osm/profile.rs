// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

/// Describes how to convert OSM ways into edges of a [Network](crate::network::Network).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile<'a> {
    /// Human readable name of the routing profile,
    /// customary the most specific [access tag](https://wiki.openstreetmap.org/wiki/Key:access).
    pub name: &'a str,

    /// Array of tags which OSM ways can be used for routing.
    ///
    /// A way is matched against all [Penalty] objects in order, and
    /// once an exact key and value match is found; the way is used for routing,
    /// and each resulting edge gets a cost equal to its length multiplied by the penalty.
    ///
    /// For example, if there are two penalties:
    /// 1. highway=cycleway, penalty=1
    /// 2. highway=primary, penalty=10
    ///
    /// This will result in:
    /// - a highway=cycleway stretch of 100 meters being used for routing with a cost of 100.
    /// - a highway=primary stretch of 100 meters being used for routing with a cost of 1000.
    /// - a highway=motorway not being used for routing, as it does not match any [Penalty].
    pub penalties: &'a [Penalty<'a>],

    /// Array of OSM [access tags](https://wiki.openstreetmap.org/wiki/Key:access#Land-based_transportation)
    /// (in order from least to most specific) to consider when checking for road prohibitions.
    ///
    /// This array is also used to follow mode-specific one-way tags
    /// (see [Profile::way_direction]).
    pub access: &'a [&'a str],

    /// Force no routing over [motorroad=yes](https://wiki.openstreetmap.org/wiki/Key:motorroad) ways.
    pub disallow_motorroad: bool,

    /// Allow riding against the traffic on one-way streets with a contraflow lane
    /// ([cycleway=opposite*](https://wiki.openstreetmap.org/wiki/Key:cycleway#Cycle_lanes_in_the_opposite_direction)).
    pub allow_opposite_cycleway: bool,
}

/// Numeric multiplier for OSM ways with specific keys and values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penalty<'a> {
    /// Key of an OSM way for which this Penalty applies,
    /// used for [Penalty::value] comparison (e.g. "highway")
    pub key: &'a str,

    /// Value under [Penalty::key] of an OSM way for which this Penalty applies.
    /// E.g. "cycleway" or "residential".
    pub value: &'a str,

    /// Multiplier of the length, to express preference for a specific way.
    /// Must be not less than one and a finite floating-point number.
    pub penalty: f64,
}

impl<'a> Profile<'a> {
    /// Finds the first matching [Penalty] for a way with given tags.
    /// If there is no matching penalty, or if the way is disallowed
    /// by the access tags (as determined by [Profile::is_allowed]),
    /// returns [f64::INFINITY].
    pub fn way_penalty(&self, tags: &HashMap<String, String>) -> f64 {
        let penalty = self.get_penalty(tags);
        if !penalty.is_normal() || !self.is_allowed(tags) {
            return f64::INFINITY;
        }
        return penalty;
    }

    /// Returns the first matching penalty from way tags, or [f64::INFINITY] otherwise.
    fn get_penalty(&self, tags: &HashMap<String, String>) -> f64 {
        self.penalties
            .iter()
            .find_map(|p| {
                if tags.get(p.key).map(|v| v.as_str()) == Some(p.value) {
                    Some(p.penalty)
                } else {
                    None
                }
            })
            .unwrap_or(f64::INFINITY)
    }

    /// Checks if the way is routable, by considering motor roads ([Profile::disallow_motorroad])
    /// and access tags ([Profile::access]).
    pub fn is_allowed(&self, tags: &HashMap<String, String>) -> bool {
        if self.disallow_motorroad && tags.get("motorroad").map(|v| v.as_str()) == Some("yes") {
            return false;
        }

        match self
            .access
            .iter()
            .rev()
            .find_map(|&mode| tags.get(mode).map(|v| v.as_str()))
        {
            Some("no") | Some("private") | Some("use_sidepath") => false,
            _ => true,
        }
    }

    /// Checks if a way is traversable forward (first return value) and
    /// backwards (second return value) by investigating mode-specific and generic one-way tags.
    ///
    /// Some ways (highway=motorway, highway=motorway_link, junction=roundabout and
    /// junction=circular) default to being one-way, except if overridden by specific tags.
    /// A generic one-way restriction is lifted by a contraflow cycle lane, if
    /// [Profile::allow_opposite_cycleway] is set.
    pub fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        let mut forward = true;
        let mut backward = true;

        match tags.get("highway").map(|s| s.as_str()).unwrap_or("") {
            "motorway" | "motorway_link" => backward = false,
            _ => {}
        }

        match tags.get("junction").map(|s| s.as_str()).unwrap_or("") {
            "roundabout" | "circular" => backward = false,
            _ => {}
        }

        let (oneway, mode_specific) = self.get_active_oneway_value(tags);
        match oneway {
            "yes" | "true" | "1" => {
                forward = true;
                backward = false;
            }

            "-1" | "reverse" => {
                forward = false;
                backward = true;
            }

            "no" => {
                forward = true;
                backward = true;
            }

            _ => {}
        }

        if !mode_specific && self.allow_opposite_cycleway && Self::has_opposite_cycleway(tags) {
            forward = true;
            backward = true;
        }

        return (forward, backward);
    }

    /// Returns the value of the most specific "oneway:MODE" tag (based on [Profile::access]),
    /// falling back to simply "oneway", and returning an empty string if no relevant tag was found.
    /// The second value is true if a mode-specific tag was used.
    fn get_active_oneway_value<'t>(&self, tags: &'t HashMap<String, String>) -> (&'t str, bool) {
        let specific = self
            .access
            .iter()
            .rev()
            .filter(|&&mode| mode != "access")
            .find_map(|&mode| tags.get(&format!("oneway:{}", mode)));

        match specific {
            Some(v) => (v.as_str(), true),
            None => (tags.get("oneway").map(|v| v.as_str()).unwrap_or(""), false),
        }
    }

    fn has_opposite_cycleway(tags: &HashMap<String, String>) -> bool {
        ["cycleway", "cycleway:left", "cycleway:right", "cycleway:both"]
            .iter()
            .filter_map(|&k| tags.get(k))
            .any(|v| v.starts_with("opposite"))
    }
}

/// Routing [Profile] for cycling, preferring cycleways and residential streets.
pub const BICYCLE_PROFILE: Profile = Profile {
    name: "bicycle",
    penalties: &[
        Penalty {
            key: "highway",
            value: "trunk",
            penalty: 50.0,
        },
        Penalty {
            key: "highway",
            value: "trunk_link",
            penalty: 50.0,
        },
        Penalty {
            key: "highway",
            value: "primary",
            penalty: 10.0,
        },
        Penalty {
            key: "highway",
            value: "primary_link",
            penalty: 10.0,
        },
        Penalty {
            key: "highway",
            value: "secondary",
            penalty: 3.0,
        },
        Penalty {
            key: "highway",
            value: "secondary_link",
            penalty: 3.0,
        },
        Penalty {
            key: "highway",
            value: "tertiary",
            penalty: 2.5,
        },
        Penalty {
            key: "highway",
            value: "tertiary_link",
            penalty: 2.5,
        },
        Penalty {
            key: "highway",
            value: "unclassified",
            penalty: 2.5,
        },
        Penalty {
            key: "highway",
            value: "cycleway",
            penalty: 1.0,
        },
        Penalty {
            key: "highway",
            value: "residential",
            penalty: 1.0,
        },
        Penalty {
            key: "highway",
            value: "living_street",
            penalty: 1.5,
        },
        Penalty {
            key: "highway",
            value: "track",
            penalty: 2.0,
        },
        Penalty {
            key: "highway",
            value: "service",
            penalty: 2.0,
        },
        Penalty {
            key: "highway",
            value: "pedestrian",
            penalty: 3.0,
        },
        Penalty {
            key: "highway",
            value: "footway",
            penalty: 3.0,
        },
        Penalty {
            key: "highway",
            value: "steps",
            penalty: 5.0,
        },
        Penalty {
            key: "highway",
            value: "path",
            penalty: 2.0,
        },
    ],
    access: &["access", "vehicle", "bicycle"],
    disallow_motorroad: true,
    allow_opposite_cycleway: true,
};
