//! `_range` expression parsing.
//!
//! The accepted grammar is `[NUM <|<=] (int|float) [<|<= NUM]` with at
//! least one bound, e.g. `1 <= int <= 10`, `0 < float` or `int <= 255`.
//! Bounds may be negative or decimal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{NumberKind, RangeBounds};

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(-?[0-9]+(?:\.[0-9]+)?)\s*(<=?)\s*)?(int|float)(?:\s*(<=?)\s*(-?[0-9]+(?:\.[0-9]+)?))?\s*$",
    )
    .unwrap()
});

pub fn parse_range(text: &str) -> Result<RangeBounds, String> {
    let captures = RANGE_RE.captures(text).ok_or_else(|| {
        format!("invalid `_range` expression '{text}'; expected e.g. '1 <= int <= 10'")
    })?;

    let kind = match captures.get(3).map(|m| m.as_str()) {
        Some("int") => NumberKind::Int,
        _ => NumberKind::Float,
    };

    let min = parse_bound(captures.get(1).map(|m| m.as_str()))?;
    let min_inclusive = captures.get(2).map(|m| m.as_str()) == Some("<=");
    let max = parse_bound(captures.get(5).map(|m| m.as_str()))?;
    let max_inclusive = captures.get(4).map(|m| m.as_str()) == Some("<=");

    if min.is_none() && max.is_none() {
        return Err(format!(
            "`_range` expression '{text}' has no bound; at least one is required"
        ));
    }

    let bounds = RangeBounds {
        kind,
        min,
        min_inclusive,
        max,
        max_inclusive,
    };

    if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
        if min > max {
            return Err(format!(
                "`_range`: the lower bound {min} exceeds the upper bound {max}"
            ));
        }
        if min == max && !(bounds.min_inclusive && bounds.max_inclusive) {
            return Err(format!(
                "`_range`: the bounds '{}' exclude every value",
                bounds.describe()
            ));
        }
    }

    Ok(bounds)
}

fn parse_bound(text: Option<&str>) -> Result<Option<f64>, String> {
    match text {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("invalid `_range` bound '{raw}'")),
    }
}
