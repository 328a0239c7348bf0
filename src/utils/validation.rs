use crate::utils::error::{MrlError, Result};
use std::collections::HashSet;

pub const SUPPORTED_OUTPUT_FORMATS: [&str; 2] = ["json", "csv"];

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(MrlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(MrlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_file_extensions(
    field_name: &str,
    files: &[&str],
    allowed_extensions: &[&str],
) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    for file in files {
        if let Some(extension) = std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            if !allowed_set.contains(extension.to_ascii_lowercase().as_str()) {
                return Err(MrlError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.to_string(),
                    reason: format!(
                        "Unsupported file extension: {}. Allowed extensions: {}",
                        extension,
                        allowed_extensions.join(", ")
                    ),
                });
            }
        } else {
            return Err(MrlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: file.to_string(),
                reason: "File has no extension or invalid filename".to_string(),
            });
        }
    }

    Ok(())
}

pub fn validate_output_formats(field_name: &str, formats: &[String]) -> Result<()> {
    if formats.is_empty() {
        return Err(MrlError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    for format in formats {
        if !SUPPORTED_OUTPUT_FORMATS.contains(&format.as_str()) {
            return Err(MrlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format.clone(),
                reason: format!(
                    "Unsupported format. Valid formats: {}",
                    SUPPORTED_OUTPUT_FORMATS.join(", ")
                ),
            });
        }
    }

    Ok(())
}

/// The CSV table is written next to the JSON document with a `.csv` extension,
/// so a `.csv` output path cannot carry both formats.
pub fn validate_output_targets(field_name: &str, output_path: &str, formats: &[String]) -> Result<()> {
    let wants = |format: &str| formats.iter().any(|f| f == format);
    let csv_extension = std::path::Path::new(output_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if wants("json") && wants("csv") && csv_extension {
        return Err(MrlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: output_path.to_string(),
            reason: "The CSV table would overwrite the JSON document; use a .json output path"
                .to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MrlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Measured levels and doses: finite and not below zero.
pub fn validate_non_negative(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MrlError::ValidationError {
            message: format!("{} must be a non-negative number, got {}", field_name, value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(MrlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
