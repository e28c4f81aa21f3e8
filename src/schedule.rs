// daily-focus-backend/src/schedule.rs
// Wall-clock helpers for tasks scheduled at a time of day. Scheduled times are
// stored as the text the user typed (`HH:mm`, sometimes `HH:mm:ss` when it
// comes back from the database), so parsing is lenient and every function
// degrades to a safe answer instead of failing.

use chrono::{Duration, Local, NaiveTime, Timelike};
use serde::Serialize;
use std::cmp::Ordering;

/// Tolerance used when the caller has no other scheduled times to compare with.
const LEGACY_TOLERANCE_MINUTES: i64 = 5;
const UPCOMING_WINDOW_MINUTES: i64 = 15;

/// Parses `HH:mm` (extra `:ss` components are ignored) into a time of day.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let mut parts = value.trim().split(':');
    let hours = parts.next()?.trim().parse::<u32>().ok()?;
    let minutes = parts.next()?.trim().parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

pub fn current_time() -> NaiveTime {
    Local::now().time()
}

/// `HH:mm` label for a time of day.
pub fn time_label(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Whether `now` falls inside the window that starts at `scheduled`.
///
/// With a comparison set, the window runs until the earliest later time in
/// the set, or for the rest of the day when there is none. Without one, the
/// older five-minute tolerance applies. A window never opens before its start.
pub fn is_time_active<S: AsRef<str>>(
    scheduled: Option<&str>,
    all_scheduled: Option<&[S]>,
    now: NaiveTime,
) -> bool {
    let Some(start) = scheduled.and_then(parse_time_of_day) else {
        return false;
    };

    if now < start {
        return false;
    }

    let others = match all_scheduled {
        Some(times) if !times.is_empty() => times,
        _ => return now - start <= Duration::minutes(LEGACY_TOLERANCE_MINUTES),
    };

    let next = others
        .iter()
        .filter_map(|time| parse_time_of_day(time.as_ref()))
        .filter(|time| *time > start)
        .min();

    match next {
        Some(end) => now < end,
        None => true,
    }
}

/// Whether `scheduled` is strictly ahead of `now` by at most fifteen minutes.
pub fn is_time_upcoming(scheduled: Option<&str>, now: NaiveTime) -> bool {
    let Some(start) = scheduled.and_then(parse_time_of_day) else {
        return false;
    };

    let ahead = start - now;
    ahead > Duration::zero() && ahead <= Duration::minutes(UPCOMING_WINDOW_MINUTES)
}

/// Renders `HH:mm` as a 12-hour clock label, e.g. `13:05` -> `1:05 PM`.
/// Input that does not parse is returned unchanged.
pub fn format_time(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    match parse_time_of_day(value) {
        Some(time) => {
            let (is_pm, hour12) = time.hour12();
            let period = if is_pm { "PM" } else { "AM" };
            format!("{}:{:02} {}", hour12, time.minute(), period)
        }
        None => value.to_string(),
    }
}

/// Ascending order by time of day; missing or unparseable times go last.
pub fn compare_scheduled_times(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.and_then(parse_time_of_day);
    let b = b.and_then(parse_time_of_day);

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub is_active: bool,
    pub is_upcoming: bool,
    pub display_time: String,
}

impl ScheduleStatus {
    pub fn evaluate<S: AsRef<str>>(
        scheduled: Option<&str>,
        all_scheduled: Option<&[S]>,
        now: NaiveTime,
    ) -> Self {
        ScheduleStatus {
            is_active: is_time_active(scheduled, all_scheduled, now),
            is_upcoming: is_time_upcoming(scheduled, now),
            display_time: format_time(scheduled.unwrap_or_default()),
        }
    }

    /// Status for an entry that is not on today's schedule.
    pub fn inactive(scheduled: Option<&str>) -> Self {
        ScheduleStatus {
            is_active: false,
            is_upcoming: false,
            display_time: format_time(scheduled.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn label(time: NaiveTime) -> String {
        format!("{:02}:{:02}", time.hour(), time.minute())
    }

    const NO_TIMES: Option<&[&str]> = None;

    #[test]
    fn parses_hours_minutes_and_ignores_seconds() {
        assert_eq!(parse_time_of_day("09:30"), Some(at(9, 30)));
        assert_eq!(parse_time_of_day("9:5"), Some(at(9, 5)));
        assert_eq!(parse_time_of_day("14:45:59"), Some(at(14, 45)));
        assert_eq!(parse_time_of_day("ab:cd"), None);
        assert_eq!(parse_time_of_day("10"), None);
        assert_eq!(parse_time_of_day(""), None);
        assert_eq!(parse_time_of_day("25:00"), None);
    }

    #[test]
    fn absent_or_malformed_time_is_never_active() {
        let times = ["09:00", "10:00"];
        assert!(!is_time_active(None, Some(&times[..]), at(9, 30)));
        assert!(!is_time_active(Some("nine"), Some(&times[..]), at(9, 30)));
        assert!(!is_time_active(Some("xx:yy"), NO_TIMES, at(9, 30)));
    }

    #[test]
    fn window_runs_until_the_next_scheduled_time() {
        let times = ["11:00", "09:00", "10:00", "09:00"];
        assert!(!is_time_active(Some("09:00"), Some(&times[..]), at(8, 59)));
        assert!(is_time_active(Some("09:00"), Some(&times[..]), at(9, 0)));
        assert!(is_time_active(Some("09:00"), Some(&times[..]), at(9, 59)));
        assert!(!is_time_active(Some("09:00"), Some(&times[..]), at(10, 0)));
        assert!(is_time_active(Some("10:00"), Some(&times[..]), at(10, 30)));
    }

    #[test]
    fn last_window_of_the_day_stays_open() {
        let times = ["09:00", "18:00"];
        assert!(is_time_active(Some("18:00"), Some(&times[..]), at(23, 59)));
    }

    #[test]
    fn malformed_entries_in_comparison_set_are_ignored() {
        let times = ["09:00", "later", "", "12:00"];
        assert!(is_time_active(Some("09:00"), Some(&times[..]), at(11, 0)));
        assert!(!is_time_active(Some("09:00"), Some(&times[..]), at(12, 0)));
    }

    #[test]
    fn legacy_tolerance_applies_without_comparison_set() {
        let empty: [&str; 0] = [];
        assert!(is_time_active(Some("09:00"), NO_TIMES, at(9, 5)));
        assert!(!is_time_active(Some("09:00"), NO_TIMES, at(9, 6)));
        assert!(is_time_active(Some("09:00"), Some(&empty[..]), at(9, 3)));
        assert!(!is_time_active(Some("09:00"), Some(&empty[..]), at(8, 58)));
    }

    #[test]
    fn upcoming_is_strictly_future_within_fifteen_minutes() {
        assert!(is_time_upcoming(Some("10:15"), at(10, 0)));
        assert!(is_time_upcoming(Some("10:01"), at(10, 0)));
        assert!(!is_time_upcoming(Some("10:16"), at(10, 0)));
        assert!(!is_time_upcoming(Some("10:00"), at(10, 0)));
        assert!(!is_time_upcoming(Some("09:59"), at(10, 0)));
        assert!(!is_time_upcoming(Some("soon"), at(10, 0)));
        assert!(!is_time_upcoming(None, at(10, 0)));
    }

    #[test]
    fn formats_twelve_hour_clock() {
        assert_eq!(format_time("00:00"), "12:00 AM");
        assert_eq!(format_time("13:05"), "1:05 PM");
        assert_eq!(format_time("12:30"), "12:30 PM");
        assert_eq!(format_time("09:07:00"), "9:07 AM");
        assert_eq!(format_time(""), "");
        assert_eq!(format_time("lunch"), "lunch");
    }

    #[test]
    fn sorting_puts_unscheduled_last() {
        let mut times = vec![None, Some("14:00"), Some("bad"), Some("08:30"), None, Some("09:00")];
        times.sort_by(|a, b| compare_scheduled_times(*a, *b));

        assert_eq!(&times[..3], &[Some("08:30"), Some("09:00"), Some("14:00")]);
        assert!(times[3..]
            .iter()
            .all(|t| (*t).and_then(parse_time_of_day).is_none()));
    }

    #[test]
    fn status_combines_flags_and_label() {
        let times = ["09:00", "10:00"];
        let status = ScheduleStatus::evaluate(Some("09:00"), Some(&times[..]), at(9, 10));
        assert!(status.is_active);
        assert!(!status.is_upcoming);
        assert_eq!(status.display_time, "9:00 AM");

        let idle = ScheduleStatus::inactive(Some("09:00"));
        assert!(!idle.is_active);
        assert_eq!(idle.display_time, "9:00 AM");
    }

    fn time_strategy() -> impl Strategy<Value = NaiveTime> {
        (0u32..24, 0u32..60).prop_map(|(h, m)| at(h, m))
    }

    proptest! {
        #[test]
        fn open_ended_window_is_active_from_its_start(
            t1 in time_strategy(),
            t2 in time_strategy(),
        ) {
            let (start, now) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            let start_label = label(start);
            let times = [start_label.clone()];
            prop_assert!(is_time_active(Some(start_label.as_str()), Some(&times[..]), now));
        }

        #[test]
        fn window_is_bounded_by_the_next_time(
            a in time_strategy(),
            b in time_strategy(),
            now in time_strategy(),
        ) {
            prop_assume!(a < b);
            let a_label = label(a);
            let times = [label(b), a_label.clone()];
            let expected = now >= a && now < b;
            prop_assert_eq!(is_time_active(Some(a_label.as_str()), Some(&times[..]), now), expected);
        }

        #[test]
        fn legacy_rule_accepts_at_most_five_minutes_after_start(
            start in time_strategy(),
            now in time_strategy(),
        ) {
            let start_label = label(start);
            let expected = now >= start && now - start <= Duration::minutes(5);
            prop_assert_eq!(is_time_active(Some(start_label.as_str()), NO_TIMES, now), expected);
        }

        #[test]
        fn comparator_is_antisymmetric(
            a in proptest::option::of(time_strategy()),
            b in proptest::option::of(time_strategy()),
        ) {
            let a = a.map(label);
            let b = b.map(label);
            let forward = compare_scheduled_times(a.as_deref(), b.as_deref());
            let backward = compare_scheduled_times(b.as_deref(), a.as_deref());
            prop_assert_eq!(forward, backward.reverse());
        }

        #[test]
        fn arbitrary_input_never_panics(raw in ".*", now in time_strategy()) {
            let times = [raw.clone()];
            let _ = is_time_active(Some(raw.as_str()), Some(&times[..]), now);
            let _ = is_time_upcoming(Some(raw.as_str()), now);
            let _ = format_time(&raw);
        }
    }
}
