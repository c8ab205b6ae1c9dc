use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decimal places kept on every coordinate written into an order.
pub const COORDINATE_PRECISION: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates an untrusted coordinate pair. Both parts must be finite JSON
    /// numbers; anything else yields `None`. Accepted values are rounded to
    /// [`COORDINATE_PRECISION`] decimal places.
    pub fn from_raw(raw: &RawLatLng) -> Option<Self> {
        let lat = finite_number(&raw.lat)?;
        let lng = finite_number(&raw.lng)?;
        Some(Self::new(lat, lng).rounded())
    }

    pub fn rounded(self) -> Self {
        Self {
            lat: round_coordinate(self.lat),
            lng: round_coordinate(self.lng),
        }
    }
}

/// A coordinate as delivered by a map widget or typed by a user, before any
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLatLng {
    pub lat: Value,
    pub lng: Value,
}

impl RawLatLng {
    pub fn new(lat: impl Into<Value>, lng: impl Into<Value>) -> Self {
        Self {
            lat: lat.into(),
            lng: lng.into(),
        }
    }

    /// Parses textual input, keeping non-numeric text as a string so that the
    /// coordinate setter can reject it.
    pub fn parse(lat: &str, lng: &str) -> Self {
        Self {
            lat: parse_part(lat),
            lng: parse_part(lng),
        }
    }
}

impl From<GeoPoint> for RawLatLng {
    fn from(point: GeoPoint) -> Self {
        Self::new(point.lat, point.lng)
    }
}

pub fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_PRECISION);
    (value * scale).round() / scale
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn parse_part(raw: &str) -> Value {
    match raw.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Value::from(parsed),
        _ => Value::String(raw.to_string()),
    }
}
