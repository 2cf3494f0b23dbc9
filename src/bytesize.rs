//! Human-readable byte sizes, as used for VM RAM and disk sizes.
//!
//! `<number>[ ]<unit>` where a bare `K`/`M`/`G`/`T` is binary (1024^n),
//! `KB`/`MB`/`GB`/`TB` is decimal (1000^n) and `KiB`/`MiB`/`GiB`/`TiB` is
//! binary again. No unit, or `B`, means bytes.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ByteSizeError {
    #[error("empty size")]
    Empty,

    #[error("'{0}' does not start with a number")]
    InvalidNumber(String),

    #[error("unknown unit '{unit}' in '{input}'")]
    UnknownUnit { input: String, unit: String },

    #[error("'{0}' is too large")]
    Overflow(String),
}

fn multiplier(unit: &str) -> Option<u64> {
    const KI: u64 = 1024;
    const K: u64 = 1000;
    let m = match unit {
        "" | "B" => 1,
        "K" | "KiB" => KI,
        "M" | "MiB" => KI.pow(2),
        "G" | "GiB" => KI.pow(3),
        "T" | "TiB" => KI.pow(4),
        "KB" => K,
        "MB" => K.pow(2),
        "GB" => K.pow(3),
        "TB" => K.pow(4),
        _ => return None,
    };
    Some(m)
}

/// Parse a size string into bytes.
///
/// ```
/// use image_factory::bytesize::parse_bytes;
/// assert_eq!(parse_bytes("1G").unwrap(), 1073741824);
/// assert_eq!(parse_bytes("2 TB").unwrap(), 2000000000000);
/// ```
pub fn parse_bytes(input: &str) -> Result<u64, ByteSizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ByteSizeError::Empty);
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let unit = unit.strip_prefix(' ').unwrap_or(unit);

    let invalid = || ByteSizeError::InvalidNumber(input.to_string());
    if number.is_empty() {
        return Err(invalid());
    }

    let multiplier = multiplier(unit).ok_or_else(|| ByteSizeError::UnknownUnit {
        input: input.to_string(),
        unit: unit.to_string(),
    })?;

    if number.contains('.') {
        let value: f64 = number.parse().map_err(|_| invalid())?;
        let bytes = value * multiplier as f64;
        if !bytes.is_finite() || bytes >= u64::MAX as f64 {
            return Err(ByteSizeError::Overflow(input.to_string()));
        }
        Ok(bytes as u64)
    } else {
        let value: u64 = number
            .parse()
            .map_err(|_| ByteSizeError::Overflow(input.to_string()))?;
        value
            .checked_mul(multiplier)
            .ok_or_else(|| ByteSizeError::Overflow(input.to_string()))
    }
}
