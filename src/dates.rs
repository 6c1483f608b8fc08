use chrono::{Duration, Local, NaiveDate};

use crate::errors::StoreError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Local calendar day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Canonical `YYYY-MM-DD` key used for remote queries and date equality.
pub fn normalize(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|err| StoreError::validation(format!("invalid date '{value}': {err}")))
}

/// Selected day for the tracker view. Never moves past local today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCursor {
    selected: NaiveDate,
}

impl Default for DateCursor {
    fn default() -> Self {
        Self::starting_at(today())
    }
}

impl DateCursor {
    pub fn starting_at(selected: NaiveDate) -> Self {
        Self { selected }
    }

    pub fn selected(&self) -> NaiveDate {
        self.selected
    }

    pub fn step(&mut self, delta_days: i64) -> bool {
        self.step_at(delta_days, today())
    }

    /// Moves by `delta_days`. Returns false and leaves the selection alone when
    /// the target would be after `today`.
    pub fn step_at(&mut self, delta_days: i64, today: NaiveDate) -> bool {
        let Some(target) = self.selected.checked_add_signed(Duration::days(delta_days)) else {
            return false;
        };
        self.go_to_at(target, today)
    }

    pub fn go_to_at(&mut self, date: NaiveDate, today: NaiveDate) -> bool {
        if date > today || date == self.selected {
            return false;
        }
        self.selected = date;
        true
    }

    pub fn is_today(&self) -> bool {
        self.is_today_at(today())
    }

    pub fn is_today_at(&self, today: NaiveDate) -> bool {
        normalize(self.selected) == normalize(today)
    }

    pub fn can_step_forward_at(&self, today: NaiveDate) -> bool {
        self.selected < today
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn step_forward_from_today_is_a_no_op() {
        let today = day(2024, 6, 1);
        let mut cursor = DateCursor::starting_at(today);
        assert!(!cursor.step_at(1, today));
        assert_eq!(cursor.selected(), today);
        assert!(cursor.is_today_at(today));
    }

    #[test]
    fn step_moves_backwards_and_forwards_up_to_today() {
        let today = day(2024, 6, 1);
        let mut cursor = DateCursor::starting_at(today);
        assert!(cursor.step_at(-3, today));
        assert_eq!(cursor.selected(), day(2024, 5, 29));
        assert!(cursor.can_step_forward_at(today));
        assert!(!cursor.step_at(5, today));
        assert_eq!(cursor.selected(), day(2024, 5, 29));
        assert!(cursor.step_at(3, today));
        assert!(cursor.is_today_at(today));
    }

    #[test]
    fn go_to_rejects_future_dates() {
        let today = day(2024, 6, 1);
        let mut cursor = DateCursor::starting_at(day(2024, 5, 1));
        assert!(!cursor.go_to_at(day(2024, 6, 2), today));
        assert!(cursor.go_to_at(day(2024, 2, 29), today));
        assert_eq!(normalize(cursor.selected()), "2024-02-29");
    }

    #[test]
    fn normalize_pads_and_parse_round_trips() {
        assert_eq!(normalize(day(2024, 1, 5)), "2024-01-05");
        assert_eq!(parse_date(" 2024-01-05 ").unwrap(), day(2024, 1, 5));
        assert!(matches!(parse_date("05/01/2024"), Err(StoreError::Validation(_))));
    }
}
