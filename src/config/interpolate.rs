//! `%(name)s` expansion within one merged section.

use super::{ConfigError, Section};

/// References may nest this deep before expansion gives up.
pub const MAX_INTERPOLATION_DEPTH: usize = 10;

/// Expand `%(name)s` references in `value` using options from `items`.
///
/// `%%` is a literal percent sign. `section` and `key` only feed error
/// messages.
pub fn interpolate(
    section: &str,
    key: &str,
    value: &str,
    items: &Section,
) -> Result<String, ConfigError> {
    expand(section, key, value, items, 1)
}

fn expand(
    section: &str,
    key: &str,
    value: &str,
    items: &Section,
    depth: usize,
) -> Result<String, ConfigError> {
    if depth > MAX_INTERPOLATION_DEPTH {
        return Err(ConfigError::interpolation(
            section,
            key,
            format!("references nest deeper than {MAX_INTERPOLATION_DEPTH} levels"),
        ));
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('%') {
            out.push('%');
            rest = after;
            continue;
        }

        let Some(reference) = tail.strip_prefix('(') else {
            return Err(ConfigError::interpolation(
                section,
                key,
                format!("'%' must be followed by '%' or '(' in '{value}'"),
            ));
        };
        let Some((name, after)) = reference.split_once(")s") else {
            return Err(ConfigError::interpolation(
                section,
                key,
                format!("unterminated reference in '{value}'"),
            ));
        };

        let target = items.get(name).ok_or_else(|| {
            ConfigError::interpolation(section, key, format!("references unknown option '{name}'"))
        })?;
        out.push_str(&expand(section, key, target, items, depth + 1)?);
        rest = after;
    }
    out.push_str(rest);

    Ok(out)
}
