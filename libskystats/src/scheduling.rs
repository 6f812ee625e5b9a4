//! Daily trigger computation
//!
//! The daemon fires once per day at a fixed local wall-clock time. Nothing is
//! persisted about previous runs: after a restart the next trigger is simply
//! the next occurrence of that time, and missed days are not replayed.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone};

/// Longest DST gap we step over when the trigger time does not exist
const MAX_GAP_MINUTES: i64 = 180;

/// First instant strictly after `now` whose local wall-clock time is `at`
///
/// If `at` falls into a DST gap on some day, the first valid instant after
/// the gap is used; if it is ambiguous, the earlier instant is used.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = resolve_local(&tz, date.and_time(at)) {
            if candidate > *now {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    now.clone() + Duration::days(1)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earlier, _) => Some(earlier),
        LocalResult::None => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            tz.from_local_datetime(&(naive + Duration::minutes(minutes)))
                .earliest()
        }),
    }
}

/// Time left until `next`, zero if it already passed
pub fn duration_until<Tz: TimeZone>(now: &DateTime<Tz>, next: &DateTime<Tz>) -> std::time::Duration {
    next.clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}
