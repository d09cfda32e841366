//! Custom `validator` rules shared by several DTOs.

use validator::ValidationError;

/// Rejects values that are empty once surrounding whitespace is trimmed.
/// Services store trimmed names, so `length(min = 1)` alone lets `"   "` through.
pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("No puede estar en blanco".into());
        return Err(err);
    }
    Ok(())
}
