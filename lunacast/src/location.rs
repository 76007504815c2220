//! Geographic coordinates and their cache tokens

use crate::error::{ForecastError, Result};
use lunar_math::geo::{haversine_km, quantize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal digits kept when a coordinate is used as a cache key
pub const COORDINATE_PRECISION: i32 = 4;

/// A validated latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(rename = "lat")]
    latitude: f64,
    #[serde(rename = "lon")]
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite degrees
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ForecastError::validation(
                "latitude",
                format!("{} is outside [-90, 90]", latitude),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ForecastError::validation(
                "longitude",
                format!("{} is outside [-180, 180]", longitude),
            ));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Validate a coordinate that came from deserialization
    pub fn validated(self) -> Result<Self> {
        Self::new(self.latitude, self.longitude)
    }

    /// Round both components to [`COORDINATE_PRECISION`] digits
    pub fn quantized(&self) -> Self {
        Self {
            latitude: quantize(self.latitude, COORDINATE_PRECISION),
            longitude: quantize(self.longitude, COORDINATE_PRECISION),
        }
    }

    /// Great-circle distance to `other` in kilometres
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Stable, sign-prefixed directory token, e.g. `latn50_4501_lone30_5234`
    pub fn token(&self) -> String {
        let q = self.quantized();
        format!(
            "lat{}_lon{}",
            encode_component(q.latitude, 'n', 's'),
            encode_component(q.longitude, 'e', 'w')
        )
    }

    /// Decode a token produced by [`Coordinate::token`]
    pub fn from_token(token: &str) -> Result<Self> {
        let invalid = || ForecastError::validation("token", format!("malformed coordinate token '{}'", token));

        let rest = token.strip_prefix("lat").ok_or_else(invalid)?;
        let (lat_part, lon_part) = rest.split_once("_lon").ok_or_else(invalid)?;

        let latitude = decode_component(lat_part, 'n', 's').ok_or_else(invalid)?;
        let longitude = decode_component(lon_part, 'e', 'w').ok_or_else(invalid)?;

        Self::new(latitude, longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

fn encode_component(value: f64, positive: char, negative: char) -> String {
    let sign = if value >= 0.0 { positive } else { negative };
    let digits = format!("{:.*}", COORDINATE_PRECISION as usize, value.abs()).replace('.', "_");
    format!("{}{}", sign, digits)
}

fn decode_component(part: &str, positive: char, negative: char) -> Option<f64> {
    let mut chars = part.chars();
    let sign = match chars.next()? {
        c if c == positive => 1.0,
        c if c == negative => -1.0,
        _ => return None,
    };
    let magnitude: f64 = chars.as_str().replacen('_', ".", 1).parse().ok()?;
    Some(sign * magnitude)
}
