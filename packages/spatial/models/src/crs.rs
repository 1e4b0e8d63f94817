//! Coordinate reference system identifiers.
//!
//! Only the identity of a CRS is modelled here. The join engine never
//! reprojects; collections that disagree on their [`Crs`] are rejected at
//! join time, so callers map them into one CRS first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An EPSG-coded coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// WGS 84 longitude/latitude. The implicit CRS of RFC 7946 `GeoJSON`
    /// and of listing coordinates.
    pub const WGS84: Self = Self { epsg: 4326 };

    /// Creates a CRS from its EPSG code.
    #[must_use]
    pub const fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    /// Returns the EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        self.epsg
    }

    /// Returns the OGC URN form used by the legacy `GeoJSON` `crs` member.
    #[must_use]
    pub fn urn(self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Error returned when a CRS identifier cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCrsError {
    /// The identifier that failed to parse.
    pub value: String,
}

impl fmt::Display for InvalidCrsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid CRS identifier '{}': expected EPSG:<code> or an OGC URN",
            self.value
        )
    }
}

impl std::error::Error for InvalidCrsError {}

impl FromStr for Crs {
    type Err = InvalidCrsError;

    /// Accepts `EPSG:25831`, `urn:ogc:def:crs:EPSG::25831`,
    /// `urn:ogc:def:crs:EPSG:6.6:25831` and the `CRS84` aliases of WGS 84.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || InvalidCrsError {
            value: s.to_string(),
        };

        if trimmed.eq_ignore_ascii_case("CRS84")
            || trimmed.to_ascii_uppercase().ends_with(":CRS84")
        {
            return Ok(Self::WGS84);
        }

        let upper = trimmed.to_ascii_uppercase();
        let code = if let Some(code) = upper.strip_prefix("EPSG:") {
            code
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            upper.rsplit(':').next().ok_or_else(invalid)?
        } else {
            return Err(invalid());
        };

        code.parse::<u32>()
            .ok()
            .filter(|c| *c > 0)
            .map(Self::from_epsg)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for Crs {
    type Error = InvalidCrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}
