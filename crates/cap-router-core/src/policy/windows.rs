// crates/cap-router-core/src/policy/windows.rs
// ============================================================================
// Module: Time Window Matching
// Description: Weekday/hour allow-window parsing and matching.
// Purpose: Evaluate window specs against a local timestamp, fail closed.
// Dependencies: chrono
// ============================================================================

//! ## Overview
//! Window specs take the form `"<day-spec> <HH:MM>-<HH:MM>"` or
//! `"<day-spec>"` (whole day). A day-spec is a three-letter weekday
//! (`Mon`..`Sun`) or an inclusive range `X-Y`; ranges may wrap the week
//! boundary (`Sat-Mon` covers Sat, Sun, Mon). Hour ranges are end-inclusive
//! at minute resolution. Malformed specs never match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::Weekday;

// ============================================================================
// SECTION: Parsed Window
// ============================================================================

/// Parsed window spec.
///
/// # Invariants
/// - `start_min <= end_min` when an hour range is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedWindow {
    /// First weekday of the inclusive day range.
    start_day: Weekday,
    /// Last weekday of the inclusive day range.
    end_day: Weekday,
    /// Optional inclusive minute-of-day range.
    minutes: Option<(u32, u32)>,
}

impl ParsedWindow {
    /// Returns true when the given local weekday and minute fall inside the
    /// window.
    pub(crate) fn contains(&self, weekday: Weekday, minute_of_day: u32) -> bool {
        if !day_in_range(weekday, self.start_day, self.end_day) {
            return false;
        }
        match self.minutes {
            Some((start, end)) => start <= minute_of_day && minute_of_day <= end,
            None => true,
        }
    }
}

/// Returns true when the window spec matches the local moment. Malformed
/// specs never match.
pub(crate) fn window_matches(spec: &str, weekday: Weekday, minute_of_day: u32) -> bool {
    parse_window(spec).is_some_and(|window| window.contains(weekday, minute_of_day))
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a window spec; returns `None` for malformed input.
pub(crate) fn parse_window(spec: &str) -> Option<ParsedWindow> {
    let mut parts = spec.trim().split_whitespace();
    let day_spec = parts.next()?;
    let hours_spec = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let (start_day, end_day) = parse_day_spec(day_spec)?;
    let minutes = match hours_spec {
        Some(hours) => Some(parse_hour_range(hours)?),
        None => None,
    };

    Some(ParsedWindow {
        start_day,
        end_day,
        minutes,
    })
}

/// Parses a day-spec: a single weekday or an inclusive `X-Y` range.
fn parse_day_spec(spec: &str) -> Option<(Weekday, Weekday)> {
    match spec.split_once('-') {
        Some((start, end)) => Some((parse_weekday(start)?, parse_weekday(end)?)),
        None => {
            let day = parse_weekday(spec)?;
            Some((day, day))
        }
    }
}

/// Parses a three-letter weekday name.
fn parse_weekday(name: &str) -> Option<Weekday> {
    match name {
        "Mon" => Some(Weekday::Mon),
        "Tue" => Some(Weekday::Tue),
        "Wed" => Some(Weekday::Wed),
        "Thu" => Some(Weekday::Thu),
        "Fri" => Some(Weekday::Fri),
        "Sat" => Some(Weekday::Sat),
        "Sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parses an `HH:MM-HH:MM` range into inclusive minutes of day.
fn parse_hour_range(spec: &str) -> Option<(u32, u32)> {
    let (start, end) = spec.split_once('-')?;
    let start = parse_minute_of_day(start)?;
    let end = parse_minute_of_day(end)?;
    if start > end {
        return None;
    }
    Some((start, end))
}

/// Parses an `HH:MM` clock value into a minute of day.
fn parse_minute_of_day(spec: &str) -> Option<u32> {
    let (hours, minutes) = spec.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Returns true when `day` falls inside the inclusive, possibly wrapping
/// weekday range.
fn day_in_range(day: Weekday, start: Weekday, end: Weekday) -> bool {
    let day = day.num_days_from_monday();
    let start = start.num_days_from_monday();
    let end = end.num_days_from_monday();
    if start <= end {
        start <= day && day <= end
    } else {
        day >= start || day <= end
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_day_spec_matches_any_minute() {
        assert!(window_matches("Mon", Weekday::Mon, 0));
        assert!(window_matches("Mon", Weekday::Mon, 1_439));
        assert!(!window_matches("Mon", Weekday::Tue, 600));
    }

    #[test]
    fn day_range_is_inclusive() {
        assert!(window_matches("Mon-Fri", Weekday::Mon, 600));
        assert!(window_matches("Mon-Fri", Weekday::Fri, 600));
        assert!(!window_matches("Mon-Fri", Weekday::Sat, 600));
    }

    #[test]
    fn day_range_wraps_week_boundary() {
        assert!(window_matches("Sat-Mon", Weekday::Sun, 600));
        assert!(window_matches("Sat-Mon", Weekday::Mon, 600));
        assert!(!window_matches("Sat-Mon", Weekday::Wed, 600));
    }

    #[test]
    fn hour_range_is_end_inclusive() {
        assert!(window_matches("Mon 09:00-17:00", Weekday::Mon, 9 * 60));
        assert!(window_matches("Mon 09:00-17:00", Weekday::Mon, 17 * 60));
        assert!(!window_matches("Mon 09:00-17:00", Weekday::Mon, 17 * 60 + 1));
    }

    #[test]
    fn malformed_specs_never_match() {
        assert!(!window_matches("", Weekday::Mon, 600));
        assert!(!window_matches("Monday", Weekday::Mon, 600));
        assert!(!window_matches("Mon 9:00-17:00", Weekday::Mon, 600));
        assert!(!window_matches("Mon 17:00-09:00", Weekday::Mon, 600));
        assert!(!window_matches("Mon 09:00-25:00", Weekday::Mon, 600));
        assert!(!window_matches("Mon 09:00-17:00 extra", Weekday::Mon, 600));
    }
}
