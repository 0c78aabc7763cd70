use serde::{Deserialize, Serialize};

use crate::error::{Result, SkycamError};

/// Geographic position of the observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude in decimal degrees (-90 to 90), positive north
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180), positive east
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SkycamError::config(format!(
                "Latitude must be between -90 and 90 degrees, got {}",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SkycamError::config(format!(
                "Longitude must be between -180 and 180 degrees, got {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}
