use std::collections::{BTreeMap, BTreeSet};

use model_core::{
    EngineError, Model, RevenueLineItem, RevenuePeriod, Scenario, ScenarioRevenue,
};

use crate::rounding::round_money;

/// Growth fallback when a series has fewer than two known points.
const DEFAULT_GROWTH_RATE: f64 = 0.05;
/// Historical growth means are clamped to this range before extrapolating.
const MIN_GROWTH_RATE: f64 = -0.5;
const MAX_GROWTH_RATE: f64 = 2.0;

/// Outcome of planning a forward forecast, before anything is persisted.
#[derive(Debug)]
pub struct ForecastPlan {
    /// New or updated period rows, all `is_actual = false`.
    pub periods: Vec<RevenuePeriod>,
    pub forecasted_years: Vec<i32>,
    pub periods_created: usize,
    /// Mean base growth rate across the series that produced projections.
    pub growth_applied: f64,
    /// Bull/base/bear revenue accumulated for years beyond the last known
    /// data, to be merged over the recalculated scenario series.
    pub scenario_revenues: Vec<ScenarioRevenue>,
}

/// Fill empty revenue slots from historical growth. Each (line item,
/// quarter position) series is handled independently: gaps between known
/// points interpolate linearly, years past the last known point compound a
/// decayed growth rate, and years before the first known point discount it
/// backwards. Projected amounts chain, so a projected year can seed the
/// next.
pub fn plan(
    model: &Model,
    line_items: &[RevenueLineItem],
    periods: &[RevenuePeriod],
) -> Result<ForecastPlan, EngineError> {
    if line_items.is_empty() {
        return Err(EngineError::ForecastPrecondition(
            "model has no revenue line items".to_string(),
        ));
    }
    if !periods.iter().any(|p| p.amount > 0.0) {
        return Err(EngineError::ForecastPrecondition(
            "no revenue period has a positive amount".to_string(),
        ));
    }

    let model_id = model.id.unwrap_or_default();
    let decay = model.revenue_growth_decay;

    let mut plan_periods = Vec::new();
    let mut forecasted_years = BTreeSet::new();
    let mut applied_rates = Vec::new();
    let mut bull_by_year: BTreeMap<i32, f64> = BTreeMap::new();
    let mut base_by_year: BTreeMap<i32, f64> = BTreeMap::new();
    let mut bear_by_year: BTreeMap<i32, f64> = BTreeMap::new();

    for item in line_items {
        let item_id = item.id.unwrap_or_default();
        for quarter in 1..=4 {
            let slots: BTreeMap<i32, &RevenuePeriod> = periods
                .iter()
                .filter(|p| p.line_item_id == item_id && p.quarter == Some(quarter))
                .map(|p| (p.year, p))
                .collect();
            let known: BTreeMap<i32, f64> = slots
                .iter()
                .filter(|(_, p)| p.amount > 0.0)
                .map(|(year, p)| (*year, p.amount))
                .collect();
            let (first_known, last_known) = match (known.keys().next(), known.keys().next_back()) {
                (Some(&first), Some(&last)) => (first, last),
                _ => continue,
            };
            let base_growth = base_growth_rate(&known);

            // Chained amounts: known values plus projections made so far.
            let mut amounts = known.clone();
            let mut projected_any = false;

            for year in model.years() {
                if amounts.get(&year).copied().unwrap_or(0.0) > 0.0 {
                    continue;
                }

                let amount = if year > first_known && year < last_known {
                    interpolate(&known, year)
                } else if year > last_known {
                    let prior = amounts.get(&(year - 1)).copied().unwrap_or(0.0);
                    let years_out = year - last_known;
                    let decayed = base_growth * (1.0 - decay).powi(years_out);
                    let projected = (prior * (1.0 + decayed)).max(0.0);

                    *bull_by_year.entry(year).or_default() +=
                        (prior * (1.0 + decayed * model.bull_multiplier)).max(0.0);
                    *bear_by_year.entry(year).or_default() +=
                        (prior * (1.0 + decayed * model.bear_multiplier)).max(0.0);
                    *base_by_year.entry(year).or_default() += projected;

                    projected
                } else {
                    // year < first_known: discount the first known point back.
                    let years_behind = first_known - year;
                    known[&first_known] / (1.0 + base_growth).powi(years_behind)
                };

                let amount = amount.max(0.0);
                amounts.insert(year, amount);
                forecasted_years.insert(year);
                projected_any = true;
                plan_periods.push(RevenuePeriod {
                    id: slots.get(&year).and_then(|p| p.id),
                    line_item_id: item_id,
                    year,
                    quarter: Some(quarter),
                    amount,
                    is_actual: false,
                });
            }

            if projected_any {
                applied_rates.push(base_growth);
            }
        }
    }

    if plan_periods.is_empty() {
        return Err(EngineError::ForecastPrecondition(
            "no forecastable revenue periods found".to_string(),
        ));
    }

    let growth_applied = applied_rates.iter().sum::<f64>() / applied_rates.len() as f64;
    let periods_created = plan_periods.len();

    let mut scenario_revenues = Vec::new();
    for (map, scenario) in [
        (&bull_by_year, Scenario::Bull),
        (&base_by_year, Scenario::Base),
        (&bear_by_year, Scenario::Bear),
    ] {
        for (&year, &amount) in map {
            scenario_revenues.push(ScenarioRevenue {
                id: None,
                model_id,
                year,
                scenario,
                amount: round_money(amount),
            });
        }
    }

    Ok(ForecastPlan {
        periods: plan_periods,
        forecasted_years: forecasted_years.into_iter().collect(),
        periods_created,
        growth_applied,
        scenario_revenues,
    })
}

/// Mean of consecutive-pair YoY growth ratios, clamped to a sane range.
fn base_growth_rate(known: &BTreeMap<i32, f64>) -> f64 {
    if known.len() < 2 {
        return DEFAULT_GROWTH_RATE;
    }

    let values: Vec<f64> = known.values().copied().collect();
    let samples: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if samples.is_empty() {
        return DEFAULT_GROWTH_RATE;
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    mean.clamp(MIN_GROWTH_RATE, MAX_GROWTH_RATE)
}

/// Linear interpolation by year fraction between the nearest known points on
/// either side. Callers guarantee both sides exist.
fn interpolate(known: &BTreeMap<i32, f64>, year: i32) -> f64 {
    let (&prev_year, &prev_amount) = known
        .range(..year)
        .next_back()
        .expect("bounded below");
    let (&next_year, &next_amount) = known
        .range(year + 1..)
        .next()
        .expect("bounded above");

    let fraction = (year - prev_year) as f64 / (next_year - prev_year) as f64;
    prev_amount + (next_amount - prev_amount) * fraction
}
