//! Puzzle solution → identifier mapping.
//!
//! Solutions are points on the globe. The identifier is the H3 cell that
//! contains the point at the tier's resolution, rendered as lowercase hex
//! without leading zeros. Anyone who places the point inside the right cell
//! reproduces the identifier exactly; a guess outside it yields a different,
//! useless string.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShardlockError;

/// A validated (latitude, longitude) pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
    point: h3o::LatLng,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ShardlockError> {
        let point =
            h3o::LatLng::new(lat, lng).map_err(|_| ShardlockError::InvalidCoordinate { lat, lng })?;
        Ok(Self { lat, lng, point })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = ShardlockError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        Self {
            lat: c.lat,
            lng: c.lng,
        }
    }
}

/// Discretization level, 0 (coarsest) to 15 (finest).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Resolution(h3o::Resolution);

impl TryFrom<u8> for Resolution {
    type Error = ShardlockError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        h3o::Resolution::try_from(value)
            .map(Self)
            .map_err(|_| ShardlockError::InvalidResolution(value))
    }
}

impl From<Resolution> for u8 {
    fn from(r: Resolution) -> Self {
        u8::from(r.0)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(self.0))
    }
}

/// Deterministic mapping from a solution to its identifier string.
///
/// Implementations must be pure: the build and every client must agree on
/// the output bit for bit.
pub trait IdentifierMapper: Send + Sync {
    fn identifier(&self, at: &Coordinate, resolution: Resolution) -> String;
}

/// H3 hexagonal cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct H3Cells;

impl IdentifierMapper for H3Cells {
    fn identifier(&self, at: &Coordinate, resolution: Resolution) -> String {
        let cell = at.point.to_cell(resolution.0);
        format!("{:x}", u64::from(cell))
    }
}
