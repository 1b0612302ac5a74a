//! Request validation for proxied file keys and provider names.

use fileproxy_cache::StorageProvider;

use crate::constants::MAX_FILE_KEY_LENGTH;
use crate::error::{ApiError, ApiResult};

/// Reject keys that could escape the bucket or confuse the backend.
///
/// A key is refused when it is empty, longer than `MAX_FILE_KEY_LENGTH`,
/// contains `..` or `//`, or contains a control character.
pub fn validate_file_key(key: &str) -> ApiResult<()> {
    if key.is_empty() {
        return Err(ApiError::invalid_key("File key is empty"));
    }
    if key.len() > MAX_FILE_KEY_LENGTH {
        return Err(ApiError::invalid_key(format!(
            "File key exceeds {} bytes",
            MAX_FILE_KEY_LENGTH
        )));
    }
    if key.contains("..") {
        return Err(ApiError::invalid_key("File key contains '..'"));
    }
    if key.contains("//") {
        return Err(ApiError::invalid_key("File key contains '//'"));
    }
    if key.chars().any(char::is_control) {
        return Err(ApiError::invalid_key("File key contains control characters"));
    }
    Ok(())
}

/// Parse an explicitly requested provider. `None` means "use the default".
pub fn parse_provider(raw: Option<&str>) -> ApiResult<Option<StorageProvider>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => Ok(Some(name.parse::<StorageProvider>()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_nested_keys() {
        assert!(validate_file_key("avatars/2024/user-1.png").is_ok());
        assert!(validate_file_key("report final (v2).pdf").is_ok());
        assert!(validate_file_key("文档/说明.txt").is_ok());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let err = validate_file_key("../../etc/passwd").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidKey);
        assert!(validate_file_key("a/../b").is_err());
        assert!(validate_file_key("a//b").is_err());
    }

    #[test]
    fn test_rejects_control_characters() {
        assert!(validate_file_key("a\nb").is_err());
        assert!(validate_file_key("a\0b").is_err());
        assert!(validate_file_key("tab\there").is_err());
    }

    #[test]
    fn test_length_limit() {
        assert!(validate_file_key(&"a".repeat(MAX_FILE_KEY_LENGTH)).is_ok());
        assert!(validate_file_key(&"a".repeat(MAX_FILE_KEY_LENGTH + 1)).is_err());
        assert!(validate_file_key("").is_err());
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider(None).unwrap(), None);
        assert_eq!(parse_provider(Some("")).unwrap(), None);
        assert_eq!(
            parse_provider(Some("tencent")).unwrap(),
            Some(StorageProvider::Tencent)
        );
        let err = parse_provider(Some("ftp")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidProvider);
    }

    proptest! {
        #[test]
        fn prop_any_key_with_dotdot_is_rejected(prefix in "[a-z/]{0,20}", suffix in "[a-z/]{0,20}") {
            let key = format!("{}..{}", prefix, suffix);
            prop_assert_eq!(validate_file_key(&key).unwrap_err().code, ErrorCode::InvalidKey);
        }
    }
}
