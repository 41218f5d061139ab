//! Date-based naming patterns.
//!
//! Two notations are accepted and may be mixed:
//! - named fields `%(year)d`, `%(month)02d`, ... (`year month day hour minute second`)
//! - strftime directives `%Y`, `%m`, `%d`, ...

use crate::error::PlacementError;
use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;
use std::path::{Component, PathBuf};
use std::sync::LazyLock;

static NAMED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\((?P<name>[a-z]+)\)(?P<zero>0?)(?P<width>\d*)d").expect("valid field pattern")
});

fn invalid(pattern: &str, reason: impl Into<String>) -> PlacementError {
    PlacementError::InvalidFormat {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

fn field_value(name: &str, dt: &NaiveDateTime) -> Option<i64> {
    Some(match name {
        "year" => dt.year() as i64,
        "month" => dt.month() as i64,
        "day" => dt.day() as i64,
        "hour" => dt.hour() as i64,
        "minute" => dt.minute() as i64,
        "second" => dt.second() as i64,
        _ => return None,
    })
}

/// Expand a pattern for the given capture time
pub fn render(pattern: &str, dt: &NaiveDateTime) -> Result<String, PlacementError> {
    let mut expanded = String::with_capacity(pattern.len() + 8);
    let mut last = 0;

    for caps in NAMED_FIELD.captures_iter(pattern) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps["name"];
        let value = field_value(name, dt)
            .ok_or_else(|| invalid(pattern, format!("unknown field '{}'", name)))?;
        let width: usize = match &caps["width"] {
            "" => 0,
            digits => digits
                .parse()
                .map_err(|_| invalid(pattern, format!("bad width '{}'", digits)))?,
        };

        expanded.push_str(&pattern[last..whole.start()]);
        if caps["zero"].is_empty() {
            expanded.push_str(&format!("{:width$}", value, width = width));
        } else {
            expanded.push_str(&format!("{:0width$}", value, width = width));
        }
        last = whole.end();
    }
    expanded.push_str(&pattern[last..]);

    if !expanded.contains('%') {
        return Ok(expanded);
    }

    let items: Vec<Item<'_>> = StrftimeItems::new(&expanded).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid(pattern, "unsupported % directive"));
    }
    Ok(dt.format_with_items(items.into_iter()).to_string())
}

/// Expand a directory pattern into a path relative to the output root.
///
/// Absolute results and `..` components are rejected.
pub fn render_directory(pattern: &str, dt: &NaiveDateTime) -> Result<PathBuf, PlacementError> {
    let rendered = render(pattern, dt)?;
    let path = PathBuf::from(&rendered);

    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(invalid(pattern, format!("'{}' leaves the output directory", rendered))),
        }
    }
    Ok(path)
}

/// Expand a filename prefix pattern; the result may not contain a separator
pub fn render_prefix(pattern: &str, dt: &NaiveDateTime) -> Result<String, PlacementError> {
    let rendered = render(pattern, dt)?;
    if rendered.contains(['/', std::path::MAIN_SEPARATOR]) {
        return Err(invalid(pattern, "a filename prefix cannot contain a path separator"));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn taken() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 8, 24)
            .unwrap()
            .and_hms_opt(13, 5, 52)
            .unwrap()
    }

    #[test]
    fn default_directory_format() {
        let dir = render_directory("%(year)d/%(year)04d_%(month)02d_%(day)02d", &taken()).unwrap();
        assert_eq!(dir, PathBuf::from("2013/2013_08_24"));
    }

    #[test]
    fn filename_prefix_format() {
        let prefix = render_prefix(
            "%(year)04d%(month)02d%(day)02d%(hour)02d%(minute)02d%(second)02d_",
            &taken(),
        )
        .unwrap();
        assert_eq!(prefix, "20130824130552_");
    }

    #[test]
    fn strftime_directives() {
        assert_eq!(render("%Y/%m/%d-%H%M%S", &taken()).unwrap(), "2013/08/24-130552");
        assert_eq!(render("%(year)d/%m", &taken()).unwrap(), "2013/08");
    }

    #[test]
    fn space_padding_without_zero_flag() {
        assert_eq!(render("[%(month)3d]", &taken()).unwrap(), "[  8]");
    }

    #[test]
    fn literal_text_is_kept() {
        assert_eq!(render("photos", &taken()).unwrap(), "photos");
        assert_eq!(render("100%% %(day)d", &taken()).unwrap(), "100% 24");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = render("%(week)02d", &taken());
        assert!(matches!(result, Err(PlacementError::InvalidFormat { .. })));
    }

    #[test]
    fn escaping_directories_are_rejected() {
        assert!(render_directory("/abs/%(year)d", &taken()).is_err());
        assert!(render_directory("../%(year)d", &taken()).is_err());
        assert!(render_prefix("%(year)d/", &taken()).is_err());
    }
}
