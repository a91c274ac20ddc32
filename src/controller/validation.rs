//! Validation of SearchCustomization storage settings
//!
//! Invalid values are never fatal to a reconcile. Callers log the error and
//! fall back to the operator defaults.

use crate::controller::error::{Error, Result};

/// Quantity suffixes accepted for storage sizes
const SIZE_SUFFIXES: &[&str] = &["Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "k", "M", "G", "T", "P", "E"];

/// Validate a storage size quantity (e.g., "10Gi", "10G", "1073741824")
pub fn validate_storage_size(size: &str) -> Result<()> {
    let size = size.trim();
    if size.is_empty() {
        return Err(Error::ValidationError("storage size is empty".to_string()));
    }

    let number = SIZE_SUFFIXES
        .iter()
        .find_map(|suffix| size.strip_suffix(suffix))
        .unwrap_or(size);

    let value: u64 = number
        .parse()
        .map_err(|_| Error::ValidationError(format!("invalid storage size: {}", size)))?;

    if value == 0 {
        return Err(Error::ValidationError(format!(
            "storage size must be positive: {}",
            size
        )));
    }

    Ok(())
}

/// Validate a storage class name as a DNS-1123 subdomain
pub fn validate_storage_class(class: &str) -> Result<()> {
    let valid = !class.is_empty()
        && class.len() <= 253
        && class
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && class.starts_with(|c: char| c.is_ascii_alphanumeric())
        && class.ends_with(|c: char| c.is_ascii_alphanumeric());

    if valid {
        Ok(())
    } else {
        Err(Error::ValidationError(format!(
            "invalid storage class name: {}",
            class
        )))
    }
}
