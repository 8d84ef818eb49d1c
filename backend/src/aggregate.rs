use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::AppError;
use crate::locale::Locale;
use crate::models::ExpenseRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAggregate {
    pub name: String,
    /// colour of the first record seen under this name, `None` for the fallback bucket
    pub color: Option<String>,
    pub total: Decimal,
    pub count: usize,
    pub percentage: f64,
}

/// Per-category breakdown of one request's records.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// in order of first appearance in the input
    pub categories: Vec<CategoryAggregate>,
    pub grand_total: Decimal,
    pub record_count: usize,
}

impl Summary {
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&CategoryAggregate> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// Groups `records` by effective category name.
///
/// Records without a category go to the locale's fallback label; a category
/// that happens to carry the same name lands in the same bucket.
pub fn summarize(records: &[ExpenseRecord], locale: Locale) -> Result<Summary, AppError> {
    if records.is_empty() {
        return Err(AppError::InvalidRequest(
            locale.labels().no_expenses.to_string(),
        ));
    }
    let fallback = locale.labels().uncategorized;

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut categories: Vec<CategoryAggregate> = Vec::new();
    let mut grand_total = Decimal::ZERO;

    for record in records {
        let name = record.category_name(fallback);
        let slot = *index.entry(name).or_insert_with(|| {
            categories.push(CategoryAggregate {
                name: name.to_string(),
                color: record.category.as_ref().map(|c| c.color.clone()),
                total: Decimal::ZERO,
                count: 0,
                percentage: 0.0,
            });
            categories.len() - 1
        });
        let agg = &mut categories[slot];
        agg.total += record.amount;
        agg.count += 1;
        grand_total += record.amount;
    }

    for agg in &mut categories {
        agg.percentage = percentage_of(agg.total, grand_total);
    }

    Ok(Summary {
        categories,
        grand_total,
        record_count: records.len(),
    })
}

fn percentage_of(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    (part * Decimal::ONE_HUNDRED / whole).to_f64().unwrap_or(0.0)
}
