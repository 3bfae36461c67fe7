use std::collections::BTreeMap;

use model_core::{RevenueLineItem, RevenuePeriod};

/// Sum raw revenue periods into one annual figure per year in range.
///
/// Quarterly rows take precedence over an annual row: when a line item has
/// any quarterly amounts for a year, its annual row for that year is ignored.
/// A line item with no rows at all for a year contributes zero.
pub fn aggregate_annual_revenue(
    line_items: &[RevenueLineItem],
    periods: &[RevenuePeriod],
    start_year: i32,
    end_year: i32,
) -> BTreeMap<i32, f64> {
    let mut annual = BTreeMap::new();

    for year in start_year..=end_year {
        let mut total = 0.0;
        for item in line_items {
            let item_id = item.id.unwrap_or_default();
            let mut quarterly_sum = 0.0;
            let mut has_quarterly = false;
            let mut annual_amount = 0.0;

            for period in periods
                .iter()
                .filter(|p| p.line_item_id == item_id && p.year == year)
            {
                if period.quarter.is_some() {
                    has_quarterly = true;
                    quarterly_sum += period.amount;
                } else {
                    annual_amount = period.amount;
                }
            }

            total += if has_quarterly { quarterly_sum } else { annual_amount };
        }
        annual.insert(year, total);
    }

    annual
}
