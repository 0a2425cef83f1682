//! CLI argument validators.
//!
//! Shared validation functions for CLI argument parsing.

/// Parse and validate a value in `0.0..=1.0` (DDIM eta).
pub fn parse_unit_float(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(0.0..=1.0).contains(&value) {
        return Err(format!("value must be between 0.0 and 1.0, got {value}"));
    }

    Ok(value)
}

/// Parse and validate a strictly positive, finite scale factor.
pub fn parse_scale(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !value.is_finite() || value <= 0.0 {
        return Err(format!("scale must be a positive number, got {value}"));
    }

    Ok(value)
}
