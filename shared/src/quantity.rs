use std::fmt;
use std::time::Duration;

/// Failure to parse a quantity or duration string.
#[derive(Debug, PartialEq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error: {}", self.0)
    }
}

/// Parse a Kubernetes-style quantity string into a plain number.
///
/// `"2500m"` is 2.5, `"2Gi"` is 2147483648, `"500k"` is 500000.
pub fn parse_quantity(s: &str) -> Result<f64, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError("empty quantity".to_string()));
    }

    let (number, suffix) = match s.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => s.split_at(idx),
        None => (s, ""),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| ParseError(format!("bad number in quantity '{}'", s)))?;

    let multiplier = match suffix {
        "" => 1.0,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return Err(ParseError(format!("unknown suffix '{}' in '{}'", suffix, s))),
    };

    Ok(value * multiplier)
}

/// Parse a duration string such as `"120s"`, `"500ms"`, `"2m"` or `"1h"`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError("empty duration".to_string()));
    }

    let (number, unit) = match s.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| ParseError(format!("bad number in duration '{}'", s)))?;
    if value < 0.0 {
        return Err(ParseError(format!("negative duration '{}'", s)));
    }

    let secs = match unit {
        "ms" => value / 1e3,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(ParseError(format!("unknown unit '{}' in '{}'", unit, s))),
    };

    Ok(Duration::from_secs_f64(secs))
}
