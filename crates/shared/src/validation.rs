//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    /// ISO 3166-1 alpha-3 country codes: exactly three uppercase letters.
    static ref ISO3_PATTERN: Regex = Regex::new(r"^[A-Z]{3}$").expect("valid regex");
}

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lng: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lng) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that a string is an ISO 3166-1 alpha-3 country code.
pub fn validate_iso3(code: &str) -> Result<(), ValidationError> {
    if ISO3_PATTERN.is_match(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("iso3_format");
        err.message = Some("Country code must be an ISO 3166-1 alpha-3 code".into());
        Err(err)
    }
}

/// Validates that a priority value is non-negative.
pub fn validate_priority(priority: i32) -> Result<(), ValidationError> {
    if priority >= 0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("priority_range");
        err.message = Some("Priority must be non-negative".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_latitude_valid() {
        assert!(validate_latitude(0.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(37.7749).is_ok());
    }

    #[test]
    fn test_validate_latitude_invalid() {
        assert!(validate_latitude(90.001).is_err());
        assert!(validate_latitude(-90.001).is_err());
        assert!(validate_latitude(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_longitude_valid() {
        assert!(validate_longitude(0.0).is_ok());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(180.0).is_ok());
    }

    #[test]
    fn test_validate_longitude_invalid() {
        assert!(validate_longitude(180.5).is_err());
        assert!(validate_longitude(-200.0).is_err());
    }

    #[test]
    fn test_validate_iso3() {
        assert!(validate_iso3("KEN").is_ok());
        assert!(validate_iso3("PHL").is_ok());
        assert!(validate_iso3("ken").is_err());
        assert!(validate_iso3("KE").is_err());
        assert!(validate_iso3("KENY").is_err());
        assert!(validate_iso3("").is_err());
    }

    #[test]
    fn test_validate_priority() {
        assert!(validate_priority(0).is_ok());
        assert!(validate_priority(10).is_ok());
        assert!(validate_priority(-1).is_err());
    }
}
