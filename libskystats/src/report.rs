//! Day-over-day deltas and the status message template

use chrono::{Local, NaiveDate};

use crate::error::{Result, SkystatsError};
use crate::metrics::Snapshot;

/// Bluesky's post length limit
pub const POST_CHAR_LIMIT: usize = 300;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Values substituted into the status template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderParams {
    /// Reported day, `YYYY-MM-DD`
    pub date: String,
    pub posts: i64,
    pub posts_diff: i64,
    pub follows: i64,
    pub follows_diff: i64,
    pub followers: i64,
    pub followers_diff: i64,
}

/// Deltas between two snapshots, reported for yesterday's local date
pub fn compute_delta(old: &Snapshot, new: &Snapshot) -> RenderParams {
    compute_delta_on(old, new, Local::now().date_naive())
}

/// Deltas between two snapshots, reported for the day before `today`
///
/// Counts are the baseline's, as of the previous post; each diff is
/// `new - old`.
pub fn compute_delta_on(old: &Snapshot, new: &Snapshot, today: NaiveDate) -> RenderParams {
    let reported = today.pred_opt().unwrap_or(today);

    RenderParams {
        date: reported.format(DATE_FORMAT).to_string(),
        posts: old.posts,
        posts_diff: new.posts.saturating_sub(old.posts),
        follows: old.follows,
        follows_diff: new.follows.saturating_sub(old.follows),
        followers: old.followers,
        followers_diff: new.followers.saturating_sub(old.followers),
    }
}

/// Signed rendering of a delta: `±0`, `+n`, or the number's own `-n`
pub fn format_diff(diff: i64) -> String {
    if diff == 0 {
        return "±0".to_string();
    }

    if diff > 0 {
        return format!("+{}", diff);
    }

    diff.to_string()
}

pub fn render(params: &RenderParams) -> String {
    format!(
        "【{}の統計】\nポスト数: {}({})\nフォロー数: {}({})\nフォロワー数: {}({})",
        params.date,
        params.posts,
        format_diff(params.posts_diff),
        params.follows,
        format_diff(params.follows_diff),
        params.followers,
        format_diff(params.followers_diff),
    )
}

/// Reject text the PDS would refuse as a post
pub fn validate_post_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(SkystatsError::InvalidInput(
            "Post text cannot be empty".to_string(),
        ));
    }

    let length = text.chars().count();
    if length > POST_CHAR_LIMIT {
        return Err(SkystatsError::InvalidInput(format!(
            "Post text exceeds the {} character limit (current: {} characters)",
            POST_CHAR_LIMIT, length
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_diff_zero() {
        assert_eq!(format_diff(0), "±0");
    }

    #[test]
    fn test_format_diff_positive() {
        assert_eq!(format_diff(1), "+1");
        assert_eq!(format_diff(5), "+5");
        assert_eq!(format_diff(i64::MAX), format!("+{}", i64::MAX));
    }

    #[test]
    fn test_format_diff_negative() {
        assert_eq!(format_diff(-2), "-2");
        assert_eq!(format_diff(-1000), "-1000");
        assert_eq!(format_diff(i64::MIN), i64::MIN.to_string());
    }

    #[test]
    fn test_compute_delta_per_field() {
        let old = Snapshot::new(100, 10, 50);
        let new = Snapshot::new(105, 10, 48);
        let params = compute_delta_on(&old, &new, day(2024, 3, 15));

        assert_eq!(params.date, "2024-03-14");
        assert_eq!(params.posts, 100);
        assert_eq!(params.posts_diff, 5);
        assert_eq!(params.follows, 10);
        assert_eq!(params.follows_diff, 0);
        assert_eq!(params.followers, 50);
        assert_eq!(params.followers_diff, -2);
    }

    #[test]
    fn test_compute_delta_same_snapshot_is_zero() {
        let snapshot = Snapshot::new(7, 8, 9);
        let params = compute_delta_on(&snapshot, &snapshot, day(2024, 1, 2));

        assert_eq!(params.posts_diff, 0);
        assert_eq!(params.follows_diff, 0);
        assert_eq!(params.followers_diff, 0);
    }

    #[test]
    fn test_yesterday_crosses_month_and_year() {
        let s = Snapshot::default();
        assert_eq!(compute_delta_on(&s, &s, day(2024, 3, 1)).date, "2024-02-29");
        assert_eq!(compute_delta_on(&s, &s, day(2025, 1, 1)).date, "2024-12-31");
    }

    #[test]
    fn test_compute_delta_uses_local_yesterday() {
        let s = Snapshot::default();
        let expected = Local::now()
            .date_naive()
            .pred_opt()
            .unwrap()
            .format("%Y-%m-%d")
            .to_string();
        // Could flake across local midnight; the window is a few microseconds
        assert_eq!(compute_delta(&s, &s).date, expected);
    }

    #[test]
    fn test_render_template() {
        let params = compute_delta_on(
            &Snapshot::new(100, 10, 50),
            &Snapshot::new(105, 10, 48),
            day(2024, 3, 15),
        );

        assert_eq!(
            render(&params),
            "【2024-03-14の統計】\nポスト数: 100(+5)\nフォロー数: 10(±0)\nフォロワー数: 50(-2)"
        );
    }

    #[test]
    fn test_render_has_four_lines() {
        let params = compute_delta_on(&Snapshot::default(), &Snapshot::default(), day(2024, 1, 1));
        assert_eq!(render(&params).lines().count(), 4);
    }

    #[test]
    fn test_render_is_deterministic() {
        let params = compute_delta_on(
            &Snapshot::new(1, 2, 3),
            &Snapshot::new(4, 1, 3),
            day(2024, 6, 1),
        );
        assert_eq!(render(&params), render(&params));
    }

    #[test]
    fn test_rendered_message_fits_post_limit() {
        let params = compute_delta_on(
            &Snapshot::new(i64::MIN, i64::MIN, i64::MIN),
            &Snapshot::new(-1, -1, -1),
            day(2024, 1, 1),
        );
        assert!(validate_post_text(&render(&params)).is_ok());
    }

    #[test]
    fn test_validate_post_text_limits() {
        assert!(validate_post_text("").is_err());
        assert!(validate_post_text("   ").is_err());
        assert!(validate_post_text(&"あ".repeat(POST_CHAR_LIMIT)).is_ok());

        match validate_post_text(&"a".repeat(POST_CHAR_LIMIT + 1)) {
            Err(SkystatsError::InvalidInput(msg)) => assert!(msg.contains("301 characters")),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }
}
