use crate::utils::error::{MarkingError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> MarkingError {
    MarkingError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| MarkingError::MissingConfigError {
        field: field_name.to_string(),
    })
}

/// Grader initials are matched against the roster's marker cells, so they must
/// be a single non-empty token.
pub fn validate_grader<'a>(field_name: &str, grader: &'a Option<String>) -> Result<&'a str> {
    let grader = validate_required_field(field_name, grader)?;
    let initials = grader.trim();
    if initials.is_empty() {
        return Err(invalid(field_name, grader, "Grader initials cannot be empty"));
    }
    if initials.contains(|c: char| c.is_whitespace() || c == ',') {
        return Err(invalid(
            field_name,
            grader,
            "Grader initials must be a single token as written in the roster",
        ));
    }
    Ok(grader)
}

/// Roster, response file and local mark store are all CSV files.
pub fn validate_csv_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(()),
        Some(ext) => Err(invalid(
            field_name,
            path,
            format!("Expected a .csv file, got .{}", ext),
        )),
        None => Err(invalid(field_name, path, "Expected a .csv file")),
    }
}

/// Address of a shared mark sheet: an absolute http(s) URL.
pub fn validate_sheet_url(field_name: &str, url_str: &str) -> Result<()> {
    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}
