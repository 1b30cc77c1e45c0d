// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::Error;

/// position of a site in the array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub row: usize,
    pub col: usize,
}

impl Address {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Heading {
    North,
    East,
    South,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Heading {
    pub fn name(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
            Self::NorthEast => "northeast",
            Self::NorthWest => "northwest",
            Self::SouthEast => "southeast",
            Self::SouthWest => "southwest",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::NorthEast => Self::SouthWest,
            Self::NorthWest => Self::SouthEast,
            Self::SouthEast => Self::NorthWest,
            Self::SouthWest => Self::NorthEast,
        }
    }

    pub fn input_port(&self) -> String {
        format!("{}_in", self.name())
    }

    pub fn output_port(&self) -> String {
        format!("{}_out", self.name())
    }
}

const CARDINAL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

// Hex arrays use axial coordinates: `col` is q, `row` is r.
const HEX: [Heading; 6] = [
    Heading::East,
    Heading::NorthEast,
    Heading::NorthWest,
    Heading::West,
    Heading::SouthWest,
    Heading::SouthEast,
];

/// Neighborhood of a tile: four cardinal neighbors or six hex neighbors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Cardinal,
    Hex,
}

impl Default for Topology {
    fn default() -> Self {
        Self::Cardinal
    }
}

impl FromStr for Topology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cardinal" | "mesh" | "4" => Ok(Self::Cardinal),
            "hex" | "hexagonal" | "6" => Ok(Self::Hex),
            _ => Err(Error::UnknownArchitecture(s.to_string())),
        }
    }
}

impl Topology {
    pub fn directions(&self) -> &'static [Heading] {
        match self {
            Self::Cardinal => &CARDINAL,
            Self::Hex => &HEX,
        }
    }

    /// (row, col) step taken when leaving through `heading`.
    fn offset(&self, heading: Heading) -> (i64, i64) {
        match (self, heading) {
            (_, Heading::North) => (-1, 0),
            (_, Heading::South) => (1, 0),
            (_, Heading::East) => (0, 1),
            (_, Heading::West) => (0, -1),
            (Self::Hex, Heading::NorthEast) => (-1, 1),
            (Self::Hex, Heading::NorthWest) => (-1, 0),
            (Self::Hex, Heading::SouthEast) => (1, 0),
            (Self::Hex, Heading::SouthWest) => (1, -1),
            (Self::Cardinal, h) => panic!("{} is not a cardinal direction", h.name()),
        }
    }

    /// the address across `heading`, if it lies inside a `rows` x `cols` array.
    pub fn neighbor(
        &self,
        address: Address,
        heading: Heading,
        rows: usize,
        cols: usize,
    ) -> Option<Address> {
        let (dr, dc) = self.offset(heading);
        let row = address.row as i64 + dr;
        let col = address.col as i64 + dc;
        if row < 0 || col < 0 || row >= rows as i64 || col >= cols as i64 {
            return None;
        }
        Some(Address::new(row as usize, col as usize))
    }

    /// Number of hops between two addresses.
    pub fn distance(&self, a: Address, b: Address) -> usize {
        let dr = b.row as i64 - a.row as i64;
        let dc = b.col as i64 - a.col as i64;
        match self {
            Self::Cardinal => (dr.abs() + dc.abs()) as usize,
            Self::Hex => ((dr.abs() + dc.abs() + (dr + dc).abs()) / 2) as usize,
        }
    }
}
