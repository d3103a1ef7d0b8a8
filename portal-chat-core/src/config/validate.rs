//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.chat.storage_key.trim().is_empty() {
        errors.push("chat.storage_key must not be empty".to_string());
    }
    if config.chat.title_max_chars == 0 {
        errors.push("chat.title_max_chars must be > 0".to_string());
    }
    if config.chat.chunk_chars == 0 {
        errors.push("chat.chunk_chars must be > 0".to_string());
    }
    if config.chat.tick_interval_ms == 0 {
        errors.push("chat.tick_interval_ms must be > 0".to_string());
    }
    if config.storage.dir.trim().is_empty() {
        errors.push("storage.dir must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.chat.chunk_chars = 0;
        config.chat.tick_interval_ms = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("chat.chunk_chars"));
        assert!(err.contains("chat.tick_interval_ms"));
    }

    #[test]
    fn test_validate_rejects_blank_storage_key() {
        let mut config = Config::default();
        config.chat.storage_key = "  ".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("chat.storage_key"));
    }
}
