//! Grid positions of the scanning stage.
//!
//! A scan visits every `(row, col)` pair of two inclusive
//! ranges exactly once, rows outermost. The same index is
//! rendered as `"<row>_<col>"` on the wire and in artifact
//! file names.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, ensure, Error, Result};
use itertools::iproduct;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridIndex {
    pub row: u32,
    pub col: u32,
}

impl GridIndex {
    pub fn new(row: u32, col: u32) -> Self {
        GridIndex { row, col }
    }

    /// The `"<row>_<col>"` token.
    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.row, self.col)
    }
}

impl Serialize for GridIndex {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

/// Inclusive range of grid coordinates along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    start: u32,
    end: u32,
}

impl GridRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        ensure!(
            start <= end,
            "grid range start {} is past its end {}",
            start,
            end
        );
        Ok(GridRange { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + Clone {
        self.start..=self.end
    }
}

/// `0-7`, the extent of the filter wheel grid.
impl Default for GridRange {
    fn default() -> Self {
        GridRange { start: 0, end: 7 }
    }
}

impl fmt::Display for GridRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for GridRange {
    type Err = Error;

    /// Accepts `"start-end"` (inclusive) or a single `"n"`.
    fn from_str(s: &str) -> Result<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").unwrap();
        }

        let caps = RE
            .captures(s)
            .ok_or_else(|| anyhow!("unexpected grid range `{}`: use `start-end` or `n`", s))?;
        let start: u32 = caps[1].parse()?;
        let end: u32 = match caps.get(2) {
            Some(m) => m.as_str().parse()?,
            None => start,
        };
        GridRange::new(start, end)
    }
}

impl Serialize for GridRange {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GridRange {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let str_rep = <String as Deserialize>::deserialize(de)?;
        str_rep.parse().map_err(de::Error::custom)
    }
}

/// The two axes of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub rows: GridRange,
    pub cols: GridRange,
}

impl Grid {
    pub fn new(rows: GridRange, cols: GridRange) -> Self {
        Grid { rows, cols }
    }

    pub fn cell_count(&self) -> usize {
        self.rows.len() * self.cols.len()
    }

    /// Row-major enumeration of every cell.
    pub fn indices(&self) -> impl Iterator<Item = GridIndex> {
        iproduct!(self.rows.iter(), self.cols.iter()).map(|(row, col)| GridIndex::new(row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_format() {
        assert_eq!(GridIndex::new(3, 4).token(), "3_4");
        assert_eq!(GridIndex::new(0, 12).to_string(), "0_12");
    }

    #[test]
    fn parse_ranges() -> Result<()> {
        assert_eq!("0-7".parse::<GridRange>()?, GridRange::new(0, 7)?);
        assert_eq!(" 2 - 5 ".parse::<GridRange>()?, GridRange::new(2, 5)?);
        assert_eq!("3".parse::<GridRange>()?, GridRange::new(3, 3)?);
        assert!("7-0".parse::<GridRange>().is_err());
        assert!("a-b".parse::<GridRange>().is_err());
        assert!("0..7".parse::<GridRange>().is_err());
        Ok(())
    }

    #[test]
    fn row_major_enumeration_visits_every_cell_once() -> Result<()> {
        let grid = Grid::new(GridRange::new(0, 7)?, GridRange::new(0, 7)?);
        let visited: Vec<_> = grid.indices().collect();

        let mut expected = vec![];
        for row in 0..=7 {
            for col in 0..=7 {
                expected.push(GridIndex::new(row, col));
            }
        }
        assert_eq!(visited, expected);
        assert_eq!(grid.cell_count(), 64);
        Ok(())
    }

    #[test]
    fn offset_ranges() -> Result<()> {
        let grid = Grid::new(GridRange::new(2, 3)?, GridRange::new(5, 6)?);
        let tokens: Vec<_> = grid.indices().map(|i| i.token()).collect();
        assert_eq!(tokens, vec!["2_5", "2_6", "3_5", "3_6"]);
        Ok(())
    }

    #[test]
    fn range_serde_uses_dash_form() -> Result<()> {
        let range: GridRange = serde_json::from_str("\"1-4\"")?;
        assert_eq!(range, GridRange::new(1, 4)?);
        assert_eq!(serde_json::to_string(&range)?, "\"1-4\"");
        Ok(())
    }
}
