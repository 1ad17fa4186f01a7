//! Runtime parameter text, in the comma-separated array form the driver's
//! parameter files take (`"0,1,6,12"`).

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{LowmemError, Result};

/// Parse a comma-separated list of at most `capacity` values.
///
/// Surrounding whitespace and a trailing newline are ignored.
///
/// # Errors
/// `InvalidParameter` if the list is empty, too long, or any value fails
/// to parse.
pub fn parse_array<T>(name: &str, text: &str, capacity: usize) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid(name, text, "empty list"));
    }

    let values = trimmed
        .split(',')
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| invalid(name, text, &format!("{:?}: {e}", raw.trim())))
        })
        .collect::<Result<Vec<T>>>()?;

    if values.len() > capacity {
        return Err(invalid(
            name,
            text,
            &format!("{} values, at most {capacity} allowed", values.len()),
        ));
    }
    Ok(values)
}

/// Parse a single scalar parameter.
///
/// # Errors
/// `InvalidParameter` if the value fails to parse.
pub fn parse_scalar<T>(name: &str, text: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| invalid(name, text, &e.to_string()))
}

/// Render a list back into parameter-file form.
#[must_use]
pub fn format_array<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn invalid(name: &str, value: &str, reason: &str) -> LowmemError {
    LowmemError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
