use crate::dates::{normalize, today};
use crate::models::{Completion, Habit, HabitStat, StatsResponse};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsView {
    Week,
    Month,
}

/// Inclusive day range covered by a stats view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatsRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

pub fn range_for(view: StatsView, anchor: NaiveDate) -> StatsRange {
    match view {
        StatsView::Week => {
            let start = week_start(anchor);
            StatsRange {
                start,
                end: start + Duration::days(6),
            }
        }
        StatsView::Month => {
            let start = anchor.with_day(1).unwrap_or(anchor);
            let end = start
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(start);
            StatsRange { start, end }
        }
    }
}

/// Moves the anchor by `steps` weeks or months (negative goes back).
pub fn shift(view: StatsView, anchor: NaiveDate, steps: i32) -> NaiveDate {
    match view {
        StatsView::Week => anchor + Duration::weeks(i64::from(steps)),
        StatsView::Month => {
            let months = Months::new(steps.unsigned_abs());
            let shifted = if steps >= 0 {
                anchor.checked_add_months(months)
            } else {
                anchor.checked_sub_months(months)
            };
            shifted.unwrap_or(anchor)
        }
    }
}

/// Whether "next" is allowed: the current range must end before `today`.
pub fn can_navigate_next(view: StatsView, anchor: NaiveDate, today: NaiveDate) -> bool {
    range_for(view, anchor).end < today
}

pub fn build_stats(
    view: StatsView,
    anchor: NaiveDate,
    habits: &[Habit],
    completions: &[Completion],
) -> StatsResponse {
    build_stats_at(today(), view, anchor, habits, completions)
}

pub fn build_stats_at(
    today: NaiveDate,
    view: StatsView,
    anchor: NaiveDate,
    habits: &[Habit],
    completions: &[Completion],
) -> StatsResponse {
    let range = range_for(view, anchor);
    let habits = habits
        .iter()
        .map(|habit| HabitStat {
            id: habit.id.clone(),
            name: habit.name.clone(),
            count: completions
                .iter()
                .filter(|completion| {
                    completion.habit_id == habit.id && range.contains(completion.date)
                })
                .count() as u64,
        })
        .collect();

    StatsResponse {
        view,
        label: range_label(view, range),
        start_date: normalize(range.start),
        end_date: normalize(range.end),
        can_navigate_next: can_navigate_next(view, anchor, today),
        habits,
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

fn range_label(view: StatsView, range: StatsRange) -> String {
    match view {
        StatsView::Week => format!(
            "{} - {}",
            range.start.format("%b %-d"),
            range.end.format("%b %-d")
        ),
        StatsView::Month => range.start.format("%B %Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn habit(id: &str, name: &str, sort_order: i64) -> Habit {
        Habit {
            id: id.to_string(),
            owner_id: "alice".to_string(),
            name: name.to_string(),
            sort_order,
            created_at: Utc::now(),
        }
    }

    fn done(habit_id: &str, date: NaiveDate) -> Completion {
        Completion {
            id: format!("{habit_id}-{date}"),
            owner_id: "alice".to_string(),
            habit_id: habit_id.to_string(),
            date,
        }
    }

    #[test]
    fn week_runs_sunday_to_saturday() {
        let range = range_for(StatsView::Week, day(2024, 6, 5));
        assert_eq!(range.start, day(2024, 6, 2));
        assert_eq!(range.end, day(2024, 6, 8));
        assert_eq!(range_for(StatsView::Week, day(2024, 6, 2)), range);
    }

    #[test]
    fn month_covers_every_day() {
        let range = range_for(StatsView::Month, day(2024, 2, 17));
        assert_eq!(range.start, day(2024, 2, 1));
        assert_eq!(range.end, day(2024, 2, 29));
        let december = range_for(StatsView::Month, day(2023, 12, 31));
        assert_eq!(december.end, day(2023, 12, 31));
    }

    #[test]
    fn shift_moves_by_whole_views() {
        assert_eq!(shift(StatsView::Week, day(2024, 6, 5), -1), day(2024, 5, 29));
        assert_eq!(shift(StatsView::Month, day(2024, 3, 31), -1), day(2024, 2, 29));
        assert_eq!(shift(StatsView::Month, day(2024, 12, 15), 1), day(2025, 1, 15));
    }

    #[test]
    fn next_is_blocked_for_the_current_range() {
        let today = day(2024, 6, 5);
        assert!(!can_navigate_next(StatsView::Week, today, today));
        assert!(can_navigate_next(StatsView::Week, day(2024, 5, 29), today));
        assert!(!can_navigate_next(StatsView::Month, day(2024, 6, 1), today));
        assert!(can_navigate_next(StatsView::Month, day(2024, 5, 31), today));
    }

    #[test]
    fn counts_completions_inside_the_range_per_habit() {
        let habits = vec![habit("a", "Read", 0), habit("b", "Run", 1)];
        let completions = vec![
            done("a", day(2024, 6, 2)),
            done("a", day(2024, 6, 8)),
            done("a", day(2024, 6, 9)),
            done("x", day(2024, 6, 3)),
        ];

        let stats = build_stats_at(
            day(2024, 6, 20),
            StatsView::Week,
            day(2024, 6, 4),
            &habits,
            &completions,
        );

        assert_eq!(stats.label, "Jun 2 - Jun 8");
        assert_eq!(stats.start_date, "2024-06-02");
        assert_eq!(stats.end_date, "2024-06-08");
        assert!(stats.can_navigate_next);
        let counts: Vec<(&str, u64)> = stats
            .habits
            .iter()
            .map(|stat| (stat.name.as_str(), stat.count))
            .collect();
        assert_eq!(counts, vec![("Read", 2), ("Run", 0)]);
    }

    #[test]
    fn month_label_names_month_and_year() {
        let stats = build_stats_at(day(2024, 6, 20), StatsView::Month, day(2024, 6, 4), &[], &[]);
        assert_eq!(stats.label, "June 2024");
        assert!(!stats.can_navigate_next);
        assert!(stats.habits.is_empty());
    }
}
