// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Half-open range of local hours-of-day, `[start, end)`.
///
/// A bucket with `start > end` wraps past midnight, e.g. `21..3` contains
/// 21, 22, 23, 0, 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HourBucket {
    start: u32,
    end: u32,
}

impl HourBucket {
    /// Creates a new bucket. `start` must be in 0..=23 and `end` in 0..=24;
    /// empty buckets (`start == end`) are rejected.
    pub fn new(start: u32, end: u32) -> Result<Self, ValidationError> {
        if start > 23 || end > 24 || start == end {
            return Err(ValidationError::HourBucket { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// Checks if an hour-of-day (0..=23) falls into this bucket.
    pub fn contains(&self, hour: u32) -> bool {
        if self.wraps() {
            hour >= self.start || hour < self.end
        } else {
            hour >= self.start && hour < self.end
        }
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.start, self.end)
    }
}

impl FromStr for HourBucket {
    type Err = String;

    /// Parses buckets written as `start-end`, e.g. `7-9` or `21-03`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid hour bucket: {s:?} (expected start-end)"))?;
        let parse = |h: &str| {
            h.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid hour {h:?}: {e}"))
        };
        Self::new(parse(start)?, parse(end)?).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bucket() {
        let b = HourBucket::new(7, 9).unwrap();
        assert!(!b.wraps());
        assert!(!b.contains(6));
        assert!(b.contains(7));
        assert!(b.contains(8));
        assert!(!b.contains(9));

        let b = HourBucket::new(18, 24).unwrap();
        assert!(b.contains(23));
        assert!(!b.contains(0));
    }

    #[test]
    fn wrapping_bucket() {
        let b = HourBucket::new(21, 3).unwrap();
        assert!(b.wraps());
        let hours: Vec<u32> = (0..24).filter(|&h| b.contains(h)).collect();
        assert_eq!(hours, vec![0, 1, 2, 21, 22, 23]);
    }

    #[test]
    fn invalid_buckets() {
        assert_eq!(
            HourBucket::new(5, 5),
            Err(ValidationError::HourBucket { start: 5, end: 5 }),
        );
        assert!(HourBucket::new(24, 3).is_err());
        assert!(HourBucket::new(3, 25).is_err());
        assert!(HourBucket::new(0, 24).is_ok());
    }

    #[test]
    fn display() {
        assert_eq!(HourBucket::new(7, 9).unwrap().to_string(), "07-09");
    }

    #[test]
    fn parse() {
        assert_eq!("7-9".parse(), Ok(HourBucket::new(7, 9).unwrap()));
        assert_eq!("21-03".parse(), Ok(HourBucket::new(21, 3).unwrap()));
        assert!("9".parse::<HourBucket>().is_err());
        assert!("5-5".parse::<HourBucket>().is_err());
        assert!("a-5".parse::<HourBucket>().is_err());
    }
}
