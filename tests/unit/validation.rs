//! Unit tests for storage settings validation

use search_operator::controller::validation::{validate_storage_class, validate_storage_size};

#[test]
fn test_binary_and_decimal_suffixes() {
    assert!(validate_storage_size("10Gi").is_ok());
    assert!(validate_storage_size("10G").is_ok());
    assert!(validate_storage_size("500Mi").is_ok());
    assert!(validate_storage_size("2T").is_ok());
}

#[test]
fn test_invalid_sizes_report_validation_error() {
    let err = validate_storage_size("big").unwrap_err();
    assert!(err.to_string().contains("invalid storage size"));
    assert!(!err.is_retryable());
}

#[test]
fn test_zero_size_rejected() {
    assert!(validate_storage_size("0").is_err());
}

#[test]
fn test_storage_class_dns_subdomain() {
    assert!(validate_storage_class("standard").is_ok());
    assert!(validate_storage_class("gp2.csi").is_ok());
    assert!(validate_storage_class("").is_err());
    assert!(validate_storage_class("trailing-").is_err());
}
