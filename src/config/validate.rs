//! Configuration validation.

use crate::config::{Config, InterrogateConfig, LdsrConfig};
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_interrogate(&config.interrogate)?;
    validate_ldsr(&config.ldsr)?;
    Ok(())
}

/// Validate interrogator settings.
pub fn validate_interrogate(settings: &InterrogateConfig) -> Result<()> {
    if settings.num_beams == 0 {
        return Err(Error::ConfigValidation {
            message: "num_beams must be at least 1".to_string(),
        });
    }

    if settings.max_length == 0 {
        return Err(Error::ConfigValidation {
            message: "max_length must be at least 1".to_string(),
        });
    }

    if settings.min_length > settings.max_length {
        return Err(Error::ConfigValidation {
            message: format!(
                "min_length ({}) must not exceed max_length ({})",
                settings.min_length, settings.max_length
            ),
        });
    }

    Ok(())
}

/// Validate LDSR settings.
pub fn validate_ldsr(settings: &LdsrConfig) -> Result<()> {
    if settings.steps == 0 {
        return Err(Error::ConfigValidation {
            message: "ldsr steps must be at least 1".to_string(),
        });
    }

    if !(settings.target_scale.is_finite() && settings.target_scale > 0.0) {
        return Err(Error::ConfigValidation {
            message: format!(
                "target_scale must be a positive number, got {}",
                settings.target_scale
            ),
        });
    }

    if !(0.0..=1.0).contains(&settings.eta) {
        return Err(Error::ConfigValidation {
            message: format!("eta must be between 0.0 and 1.0, got {}", settings.eta),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_beams() {
        let mut config = Config::default();
        config.interrogate.num_beams = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_min_exceeds_max_length() {
        let mut config = Config::default();
        config.interrogate.min_length = 60;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_steps() {
        let mut config = Config::default();
        config.ldsr.steps = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_scale() {
        let mut config = Config::default();
        config.ldsr.target_scale = 0.0;
        assert!(validate_config(&config).is_err());

        config.ldsr.target_scale = f32::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_eta_range() {
        let mut config = Config::default();
        config.ldsr.eta = 1.5;
        assert!(matches!(
            validate_config(&config),
            Err(Error::ConfigValidation { .. })
        ));
    }
}
