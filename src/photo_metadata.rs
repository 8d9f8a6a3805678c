use serde::{Deserialize, Serialize};

/// Latitude/longitude of a photo, in signed decimal degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Geotag {
    pub latitude: f64,
    pub longitude: f64,
}

impl Geotag {
    pub fn new(latitude: f64, longitude: f64) -> Geotag {
        Geotag {
            latitude,
            longitude,
        }
    }
}

/// Converts a degrees[, minutes[, seconds]] angle to decimal degrees.
///
/// `direction` "S" or "W" (any case) makes the result negative. Every other
/// reference, known or not, leaves it positive. Components past the third are
/// ignored. Callers must not pass an empty slice.
pub fn dms_to_decimal(direction: &str, dms: &[f64]) -> f64 {
    let mut result = dms[0];
    if let Some(minutes) = dms.get(1) {
        result += minutes / 60.0;
    }
    if let Some(seconds) = dms.get(2) {
        result += seconds / 3600.0;
    }

    if direction.eq_ignore_ascii_case("W") || direction.eq_ignore_ascii_case("S") {
        -result
    } else {
        result
    }
}
