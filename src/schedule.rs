//! Schedule gate predicates: day-of-week matching and time-window matching.
//!
//! Both matchers are pure functions over `chrono` types so the engine can be
//! exercised with any clock. A rule with no day or time control passes its
//! schedule gate vacuously; that policy lives in the callers, which only
//! invoke these functions when a control is present.

use chrono::{NaiveTime, Weekday};

/// Returns true when `today` is in the allowed weekday set.
///
/// An empty set means the rule carries no day restriction and always matches.
pub fn day_matches(today: Weekday, allowed: &[Weekday]) -> bool {
    allowed.is_empty() || allowed.contains(&today)
}

/// Parse a 3-letter (or longer) weekday name, case-insensitively.
///
/// Only the first three letters are significant, so "Wed", "wednesday" and
/// "WEDNES" all resolve to `Weekday::Wed`.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let prefix: String = name.trim().chars().take(3).collect();
    match prefix.to_ascii_lowercase().as_str() {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Returns true when `now` falls inside the `[on, off]` window.
///
/// Windows where `on < off` are plain same-day windows with both boundaries
/// inclusive. Windows where `on >= off` cross midnight and match when `now`
/// is at-or-after `on` (evening side) or at-or-before `off` (morning side).
/// The degenerate `on == off` window takes the wraparound branch, which is
/// satisfied at every instant, so it always matches.
pub fn window_matches(now: NaiveTime, on: NaiveTime, off: NaiveTime) -> bool {
    if on < off {
        now >= on && now <= off
    } else {
        // Overnight window, e.g. on=22:00 off=06:00
        now >= on || now <= off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn day_matches_subset() {
        let allowed = [Weekday::Mon, Weekday::Wed, Weekday::Fri];
        assert!(day_matches(Weekday::Wed, &allowed));
        assert!(!day_matches(Weekday::Tue, &allowed));
    }

    #[test]
    fn day_matches_empty_set_always_passes() {
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert!(day_matches(day, &[]));
        }
    }

    #[test]
    fn parse_weekday_case_and_length_insensitive() {
        assert_eq!(parse_weekday("Mon"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("wednesday"), Some(Weekday::Wed));
        assert_eq!(parse_weekday("SAT"), Some(Weekday::Sat));
        assert_eq!(parse_weekday("  sun "), Some(Weekday::Sun));
        assert_eq!(parse_weekday("noday"), None);
        assert_eq!(parse_weekday(""), None);
    }

    #[test]
    fn same_day_window_inclusive_boundaries() {
        let on = t(8, 0);
        let off = t(20, 0);
        assert!(window_matches(t(8, 0), on, off));
        assert!(window_matches(t(20, 0), on, off));
        assert!(window_matches(t(12, 0), on, off));
        assert!(!window_matches(t(7, 59), on, off));
        assert!(!window_matches(t(20, 1), on, off));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let on = t(22, 0);
        let off = t(6, 0);
        assert!(window_matches(t(23, 30), on, off));
        assert!(window_matches(t(2, 0), on, off));
        assert!(window_matches(t(22, 0), on, off));
        assert!(window_matches(t(6, 0), on, off));
        assert!(!window_matches(t(12, 0), on, off));
        assert!(!window_matches(t(21, 59), on, off));
    }

    #[test]
    fn degenerate_window_always_matches() {
        // on == off takes the wraparound branch and is satisfied everywhere
        let on = t(9, 30);
        assert!(window_matches(t(9, 30), on, on));
        assert!(window_matches(t(0, 0), on, on));
        assert!(window_matches(t(23, 59), on, on));
    }
}
