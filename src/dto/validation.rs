//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that an activity code is a seven-digit number.
///
/// # Examples
///
/// ```ignore
/// validate_activity_code(1234567) // Ok
/// validate_activity_code(999999)  // Err - six digits
/// validate_activity_code(10000000) // Err - eight digits
/// ```
pub fn validate_activity_code(code: u32) -> Result<(), ValidationError> {
    if !(1_000_000..=9_999_999).contains(&code) {
        let mut err = ValidationError::new("activity_code_range");
        err.message = Some(format!("Activity code must have seven digits (got {code})").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_activity_code_valid() {
        assert!(validate_activity_code(1_000_000).is_ok());
        assert!(validate_activity_code(9_999_999).is_ok());
        assert!(validate_activity_code(1234567).is_ok());
    }

    #[test]
    fn test_validate_activity_code_invalid() {
        assert!(validate_activity_code(0).is_err());
        assert!(validate_activity_code(999_999).is_err()); // six digits
        assert!(validate_activity_code(10_000_000).is_err()); // eight digits
    }
}
