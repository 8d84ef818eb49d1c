use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Category as seen from an expense: enough to group and colour it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub date: DateTime<Utc>,
    pub category: Option<CategoryTag>,
}

impl ExpenseRecord {
    /// Name used for grouping: the category's name or `fallback` when there is none.
    pub fn category_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.category.as_ref().map_or(fallback, |c| c.name.as_str())
    }
}

// flat join of expenses LEFT JOIN categories
#[derive(Debug, sqlx::FromRow)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
}

impl From<ExpenseRow> for ExpenseRecord {
    fn from(r: ExpenseRow) -> Self {
        // a dangling category id (no joined name) counts as uncategorized
        let category = match (r.category_id, r.category_name) {
            (Some(id), Some(name)) => Some(CategoryTag {
                id,
                name,
                color: r.category_color.unwrap_or_default(),
            }),
            _ => None,
        };
        Self {
            id: r.id,
            user_id: r.user_id,
            amount: r.amount,
            description: r.description,
            date: r.occurred_at,
            category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub is_default: bool,
}

impl Category {
    #[cfg(test)]
    pub fn tag(&self) -> CategoryTag {
        CategoryTag {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }

    pub fn visible_to(&self, user_id: Uuid) -> bool {
        self.is_default || self.user_id == Some(user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: Decimal,
    pub description: String,
    pub category_id: Uuid,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub category_id: Option<Uuid>,
}

impl ExpenseFilter {
    #[cfg(test)]
    pub fn matches(&self, record: &ExpenseRecord) -> bool {
        self.start.map_or(true, |s| record.date >= s)
            && self.end.map_or(true, |e| record.date <= e)
            && self
                .category_id
                .map_or(true, |id| record.category.as_ref().map(|c| c.id) == Some(id))
    }
}

/// Inclusive calendar month `[first instant, last instant]` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthRange {
    pub fn new(year: i32, month: u32) -> Result<Self, AppError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::InvalidRequest(format!("invalid month {month}/{year}")))?;
        let next = first
            .checked_add_months(chrono::Months::new(1))
            .ok_or_else(|| AppError::InvalidRequest(format!("invalid month {month}/{year}")))?;
        let start = first.and_time(NaiveTime::MIN).and_utc();
        let end = next.and_time(NaiveTime::MIN).and_utc() - TimeDelta::microseconds(1);
        Ok(Self {
            year,
            month,
            start,
            end,
        })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end.date_naive()
    }

    #[cfg(test)]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_range_covers_whole_month() {
        let range = MonthRange::new(2024, 2).unwrap();
        assert_eq!(range.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(range.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let last_second = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap()
            .and_utc();
        assert!(range.contains(last_second));
        assert!(!range.contains(MonthRange::new(2024, 3).unwrap().start));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let range = MonthRange::new(2025, 12).unwrap();
        assert_eq!(range.last_day(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(matches!(MonthRange::new(2025, 13), Err(AppError::InvalidRequest(_))));
        assert!(matches!(MonthRange::new(2025, 0), Err(AppError::InvalidRequest(_))));
    }
}
