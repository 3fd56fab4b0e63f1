// Validation utilities
// Author: Gabriel Demetrios Lafis

/// Validate that a name is usable as an engine object name
pub fn validate_name(name: &str, what: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("'{}' cannot be empty", what));
    }

    if name.contains("$GETML") {
        return Err(format!(
            "'{}' must not contain the reserved sequence '$GETML'",
            what
        ));
    }

    Ok(())
}

/// Validate that a numeric value is non-negative
pub fn validate_non_negative(value: f64, what: &str) -> Result<(), String> {
    if value.is_nan() || value < 0.0 {
        Err(format!("'{}' must be non-negative, got {}", what, value))
    } else {
        Ok(())
    }
}

/// Validate that a numeric value is strictly positive
pub fn validate_positive(value: f64, what: &str) -> Result<(), String> {
    if value.is_nan() || value <= 0.0 {
        Err(format!("'{}' must be positive, got {}", what, value))
    } else {
        Ok(())
    }
}

/// Validate that a numeric value is in range
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    what: &str,
) -> Result<(), String> {
    if value < min || value > max {
        Err(format!("'{}' must be between {} and {}", what, min, max))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("population", "name").is_ok());
        assert!(validate_name("  ", "name").is_err());
        assert!(validate_name("a$GETML_SEPb", "name").is_err());
    }

    #[test]
    fn test_numeric_validators() {
        assert!(validate_positive(0.5, "share").is_ok());
        assert!(validate_positive(0.0, "share").is_err());
        assert!(validate_non_negative(0.0, "memory").is_ok());
        assert!(validate_non_negative(f64::NAN, "memory").is_err());
        assert!(validate_range(0.5, 0.0, 1.0, "share").is_ok());
        assert_eq!(
            validate_range(2, 0, 1, "share").unwrap_err(),
            "'share' must be between 0 and 1"
        );
    }
}
