//! Keyword-category scoring over a set of reviews.
//!
//! Every review is checked against every category; a category counts at
//! most once per review no matter how many of its keywords appear. Risk hits
//! add the absolute category weight to the risk points, wow hits add the
//! weight to the wow points. Both are divided by the number of reviews and
//! folded into a score centred on 50:
//!
//! ```text
//! score = 50 - risk_rate * 10 + wow_rate * 10
//! ```
//!
//! The score is rounded to one decimal, the rates to three. An empty review
//! set scores exactly 50.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{CategoryKind, CategorySet};
use crate::models::ReviewRecord;

const NEUTRAL_SCORE: f64 = 50.0;
const RATE_FACTOR: f64 = 10.0;

/// Outcome of scoring one set of reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub total_reviews: usize,
    pub risk_points: i64,
    pub risk_rate: f64,
    pub wow_points: i64,
    pub wow_rate: f64,
    /// Reviews matching each category; categories without hits are omitted.
    /// Logged, not written to the report.
    #[serde(skip)]
    pub category_hits: BTreeMap<String, usize>,
}

impl ScoreResult {
    /// The result for an empty review set.
    pub fn empty() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            total_reviews: 0,
            risk_points: 0,
            risk_rate: 0.0,
            wow_points: 0,
            wow_rate: 0.0,
            category_hits: BTreeMap::new(),
        }
    }
}

/// A date range with an inclusive start and no end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
}

impl DateWindow {
    /// The `days` calendar days ending with `today`.
    ///
    /// Review dates carry no time of day, so the day exactly `days` back is
    /// outside: it would only be inside for a review posted at midnight.
    pub fn last_days(today: NaiveDate, days: u64) -> Self {
        let start = today
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(NaiveDate::MIN);
        Self { start }
    }

    /// Undated reviews and reviews with unparseable dates fall outside.
    pub fn contains(&self, review: &ReviewRecord) -> bool {
        review.parsed_date().is_some_and(|date| date >= self.start)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Score `reviews` against `categories`, optionally restricted to `window`.
pub fn score_reviews<'r, I>(
    reviews: I,
    categories: &CategorySet,
    window: Option<&DateWindow>,
) -> ScoreResult
where
    I: IntoIterator<Item = &'r ReviewRecord>,
{
    let mut total_reviews = 0usize;
    let mut risk_points = 0i64;
    let mut wow_points = 0i64;
    let mut category_hits: BTreeMap<String, usize> = BTreeMap::new();

    let in_window = reviews
        .into_iter()
        .filter(|review| window.is_none_or(|w| w.contains(review)));

    for review in in_window {
        total_reviews += 1;
        for category in categories.iter().filter(|c| c.matches(&review.text)) {
            match category.kind {
                CategoryKind::Risk => risk_points += category.points(),
                CategoryKind::Wow => wow_points += category.points(),
            }
            *category_hits.entry(category.name.clone()).or_default() += 1;
        }
    }

    if total_reviews == 0 {
        return ScoreResult::empty();
    }

    let risk_rate = risk_points as f64 / total_reviews as f64;
    let wow_rate = wow_points as f64 / total_reviews as f64;
    let score = NEUTRAL_SCORE - risk_rate * RATE_FACTOR + wow_rate * RATE_FACTOR;

    ScoreResult {
        score: round_to(score, 1),
        total_reviews,
        risk_points,
        risk_rate: round_to(risk_rate, 3),
        wow_points,
        wow_rate: round_to(wow_rate, 3),
        category_hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> CategorySet {
        CategorySet::from_yaml_str(
            r#"
fatal_risks:
  部屋の衛生状態が悪い: [汚い, 不潔]
  実態との乖離: [写真と違う, 狭い]
  高額な追加料金: [追加料金]
  従業員の対応への不信感: [無愛想]
wow_factors:
  最高の遊び場: [広い, ドッグラン]
  極上のおもてなし: [おやつ, 手作りごはん]
  いつでも一緒: [レストラン同伴可]
scores:
  部屋の衛生状態が悪い: -15
  実態との乖離: -12
  高額な追加料金: -8
  従業員の対応への不信感: -5
  最高の遊び場: 3
  極上のおもてなし: 3
  いつでも一緒: 3
"#,
        )
        .unwrap()
    }

    fn review(date: Option<&str>, text: &str) -> ReviewRecord {
        ReviewRecord::new(date.map(str::to_string), text)
    }

    #[test]
    fn test_mixed_reviews() {
        let reviews = vec![
            review(Some("2025-10-01"), "部屋が少し狭いけど、ドッグランが広くて最高！"),
            review(Some("2025-09-15"), "とても綺麗でした。おやつもたくさん！"),
            review(Some("2025-08-01"), "スタッフが無愛想。部屋も汚い。二度と行かない。汚い！"),
        ];

        let result = score_reviews(&reviews, &categories(), None);
        assert_eq!(result.total_reviews, 3);
        assert_eq!(result.risk_points, 32);
        assert_eq!(result.wow_points, 6);
        assert_eq!(result.risk_rate, 10.667);
        assert_eq!(result.wow_rate, 2.0);
        assert_eq!(result.score, -36.7);
        assert_eq!(result.category_hits.get("部屋の衛生状態が悪い"), Some(&1));
        assert_eq!(result.category_hits.get("高額な追加料金"), None);
    }

    #[test]
    fn test_no_keywords_is_neutral() {
        let reviews = vec![review(Some("2025-07-01"), "可もなく不可もなく。")];
        let result = score_reviews(&reviews, &categories(), None);
        assert_eq!(result.total_reviews, 1);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.risk_points, 0);
        assert_eq!(result.wow_rate, 0.0);
    }

    #[test]
    fn test_empty_input_is_neutral() {
        let reviews: Vec<ReviewRecord> = Vec::new();
        let result = score_reviews(&reviews, &categories(), None);
        assert_eq!(result, ScoreResult::empty());
        assert_eq!(result.score, 50.0);
    }

    #[test]
    fn test_category_counts_once_per_review() {
        let reviews = vec![review(None, "汚い、不潔、汚い")];
        let result = score_reviews(&reviews, &categories(), None);
        assert_eq!(result.risk_points, 15);
        assert_eq!(result.score, -100.0);
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut reviews = vec![
            review(None, "汚い"),
            review(None, "ドッグラン"),
            review(None, "普通"),
        ];
        let forward = score_reviews(&reviews, &categories(), None);
        reviews.reverse();
        let backward = score_reviews(&reviews, &categories(), None);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_window_filters_by_date() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let window = DateWindow::last_days(today, 365);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 10, 2).unwrap());

        let reviews = vec![
            review(Some("2024-10-02"), "ドッグラン"),
            review(Some("2024-10-01"), "汚い"),
            review(None, "汚い"),
            review(Some("someday"), "汚い"),
        ];

        let windowed = score_reviews(&reviews, &categories(), Some(&window));
        assert_eq!(windowed.total_reviews, 1);
        assert_eq!(windowed.score, 80.0);

        let all_time = score_reviews(&reviews, &categories(), None);
        assert_eq!(all_time.total_reviews, 4);
    }

    #[test]
    fn test_window_boundary_day_is_excluded() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let window = DateWindow::last_days(today, 365);
        assert!(window.contains(&review(Some("2025-03-01"), "today")));
        assert!(window.contains(&review(Some("2024-03-02"), "364 days back")));
        assert!(!window.contains(&review(Some("2024-03-01"), "365 days back")));
    }

    #[test]
    fn test_category_hits_are_not_serialized() {
        let reviews = vec![review(None, "汚い")];
        let result = score_reviews(&reviews, &categories(), None);
        assert_eq!(result.category_hits.len(), 1);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("category_hits").is_none());
        assert_eq!(json["risk_points"], 15);
    }

    #[test]
    fn test_window_with_no_reviews_is_neutral() {
        let window = DateWindow::last_days(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(), 365);
        let reviews = vec![review(Some("2020-01-01"), "汚い")];
        assert_eq!(score_reviews(&reviews, &categories(), Some(&window)), ScoreResult::empty());
    }
}
