use std::collections::BTreeMap;

use model_core::{Assumptions, IncomeStatementRow, Model};

use crate::rounding::{round_money, round_price};

/// Margin earned outside operations (interest and similar), as a share of
/// revenue.
const OTHER_INCOME_MARGIN: f64 = 0.002;
/// Share of the required pre-tax shift absorbed by COGS, S&M, R&D and G&A
/// when gliding toward a target net margin.
const GLIDE_WEIGHTS: [f64; 4] = [0.3, 0.35, 0.2, 0.15];
/// No cost line glides below one percent of revenue.
const MIN_COST_PERCENT: f64 = 0.01;
/// Uplift applied to GAAP EPS for the non-GAAP figure.
const NON_GAAP_EPS_FACTOR: f64 = 1.15;
/// Margin gaps smaller than this are treated as already on target.
const MARGIN_GAP_EPSILON: f64 = 0.001;

/// Per-year cost percentages applied to revenue when projecting a P&L.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostPercentages {
    pub cogs: f64,
    pub sales_marketing: f64,
    pub research_development: f64,
    pub general_admin: f64,
    pub depreciation: f64,
    pub tax_rate: f64,
}

impl CostPercentages {
    pub fn from_assumptions(assumptions: &Assumptions) -> Self {
        Self {
            cogs: assumptions.cogs_percent,
            sales_marketing: assumptions.sm_percent,
            research_development: assumptions.rd_percent,
            general_admin: assumptions.ga_percent,
            depreciation: assumptions.depreciation_percent,
            tax_rate: assumptions.tax_rate,
        }
    }

    fn cost_sum(&self) -> f64 {
        self.cogs
            + self.sales_marketing
            + self.research_development
            + self.general_admin
            + self.depreciation
    }

    /// Net margin this cost structure produces before any glide.
    pub fn implied_net_margin(&self) -> f64 {
        (1.0 - self.cost_sum() + OTHER_INCOME_MARGIN) * (1.0 - self.tax_rate)
    }
}

/// Shift the baseline cost structure toward a target net margin, linearly
/// over the model's year range. Depreciation stays at baseline; the other
/// four cost lines absorb the shift in fixed proportions.
pub fn glide_percentages(
    baseline: CostPercentages,
    target_net_margin: Option<f64>,
    year_index: usize,
    total_years: usize,
) -> CostPercentages {
    let target = match target_net_margin {
        Some(t) => t,
        None => return baseline,
    };
    if total_years <= 1 {
        return baseline;
    }

    let margin_gap = target - baseline.implied_net_margin();
    if margin_gap.abs() < MARGIN_GAP_EPSILON {
        return baseline;
    }

    let pre_tax_shift = -margin_gap / (1.0 - baseline.tax_rate);
    let progress = year_index as f64 / (total_years - 1) as f64;
    let adjust = |pct: f64, weight: f64| (pct + pre_tax_shift * weight * progress).max(MIN_COST_PERCENT);

    CostPercentages {
        cogs: adjust(baseline.cogs, GLIDE_WEIGHTS[0]),
        sales_marketing: adjust(baseline.sales_marketing, GLIDE_WEIGHTS[1]),
        research_development: adjust(baseline.research_development, GLIDE_WEIGHTS[2]),
        general_admin: adjust(baseline.general_admin, GLIDE_WEIGHTS[3]),
        depreciation: baseline.depreciation,
        tax_rate: baseline.tax_rate,
    }
}

/// Project income statement rows for every year in the model range. Years
/// with an actual row pass through untouched; the rest are derived from
/// annual revenue and the glide-path cost percentages.
pub fn project(
    model: &Model,
    annual_revenue: &BTreeMap<i32, f64>,
    assumptions: Option<&Assumptions>,
    actual_rows: &[IncomeStatementRow],
) -> Vec<IncomeStatementRow> {
    let baseline =
        CostPercentages::from_assumptions(&assumptions.cloned().unwrap_or_default());
    let total_years = model.year_count();
    let actuals: BTreeMap<i32, &IncomeStatementRow> = actual_rows
        .iter()
        .filter(|r| r.is_actual)
        .map(|r| (r.year, r))
        .collect();

    let mut rows = Vec::with_capacity(total_years);
    for year in model.years() {
        if let Some(actual) = actuals.get(&year) {
            rows.push((*actual).clone());
            continue;
        }
        let revenue = annual_revenue.get(&year).copied().unwrap_or(0.0);
        let percentages = glide_percentages(
            baseline,
            model.target_net_margin,
            model.year_index(year),
            total_years,
        );
        rows.push(project_year(model, year, revenue, &percentages));
    }
    rows
}

fn project_year(
    model: &Model,
    year: i32,
    revenue: f64,
    pct: &CostPercentages,
) -> IncomeStatementRow {
    let shares = model.shares_outstanding;

    let cogs = round_money(revenue * pct.cogs);
    let revenue_rounded = round_money(revenue);
    let gross_profit = revenue_rounded - cogs;

    let sales_marketing = round_money(revenue * pct.sales_marketing);
    let research_development = round_money(revenue * pct.research_development);
    let general_admin = round_money(revenue * pct.general_admin);
    let depreciation = round_money(revenue * pct.depreciation);
    let total_operating_expenses =
        sales_marketing + research_development + general_admin + depreciation;

    let operating_income = gross_profit - total_operating_expenses;
    let ebitda = operating_income + depreciation;
    let other_income = round_money(revenue * OTHER_INCOME_MARGIN);
    let pre_tax_income = operating_income + other_income;
    let income_tax = round_money(pre_tax_income.max(0.0) * pct.tax_rate);
    let net_income = pre_tax_income - income_tax;

    let eps_raw = if shares > 0.0 { net_income / shares } else { 0.0 };

    IncomeStatementRow {
        id: None,
        model_id: model.id.unwrap_or_default(),
        year,
        is_actual: false,
        revenue: revenue_rounded,
        cogs,
        gross_profit,
        sales_marketing,
        research_development,
        general_admin,
        depreciation,
        total_operating_expenses,
        operating_income,
        ebitda,
        other_income,
        pre_tax_income,
        income_tax,
        net_income,
        eps: round_price(eps_raw),
        non_gaap_eps: round_price(eps_raw * NON_GAAP_EPS_FACTOR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(start: i32, end: i32, target: Option<f64>) -> Model {
        Model {
            id: Some(1),
            name: "test".to_string(),
            ticker: None,
            start_year: start,
            end_year: end,
            shares_outstanding: 1_000_000.0,
            bull_multiplier: 1.2,
            base_multiplier: 1.0,
            bear_multiplier: 0.8,
            target_net_margin: target,
            revenue_growth_decay: 0.1,
            created_at: None,
        }
    }

    #[test]
    fn test_projected_lines_follow_cost_percentages() {
        let m = model(2024, 2024, None);
        let revenue: BTreeMap<i32, f64> = [(2024, 1_000_000.0)].into_iter().collect();

        let rows = project(&m, &revenue, None, &[]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.cogs, 280_000.0);
        assert_eq!(row.gross_profit, 720_000.0);
        assert_eq!(row.sales_marketing, 220_000.0);
        assert_eq!(row.total_operating_expenses, 495_000.0);
        assert_eq!(row.operating_income, 225_000.0);
        assert_eq!(row.ebitda, 240_000.0);
        assert_eq!(row.other_income, 2_000.0);
        assert_eq!(row.pre_tax_income, 227_000.0);
        assert_eq!(row.income_tax, 56_750.0);
        assert_eq!(row.net_income, 170_250.0);
        assert_eq!(row.eps, 0.17);
    }

    #[test]
    fn test_zero_shares_yield_zero_eps() {
        let mut m = model(2024, 2024, None);
        m.shares_outstanding = 0.0;
        let revenue: BTreeMap<i32, f64> = [(2024, 1_000_000.0)].into_iter().collect();

        let rows = project(&m, &revenue, None, &[]);
        assert_eq!(rows[0].eps, 0.0);
        assert_eq!(rows[0].non_gaap_eps, 0.0);
    }

    #[test]
    fn test_actual_rows_pass_through_unchanged() {
        let m = model(2024, 2025, None);
        let revenue: BTreeMap<i32, f64> = [(2024, 500.0), (2025, 500.0)].into_iter().collect();
        let actual = IncomeStatementRow {
            id: Some(7),
            model_id: 1,
            year: 2024,
            is_actual: true,
            revenue: 123.0,
            cogs: 1.0,
            gross_profit: 122.0,
            sales_marketing: 0.0,
            research_development: 0.0,
            general_admin: 0.0,
            depreciation: 0.0,
            total_operating_expenses: 0.0,
            operating_income: 122.0,
            ebitda: 122.0,
            other_income: 0.0,
            pre_tax_income: 122.0,
            income_tax: 30.0,
            net_income: 92.0,
            eps: 0.0,
            non_gaap_eps: 0.0,
        };

        let rows = project(&m, &revenue, None, &[actual.clone()]);
        assert_eq!(rows[0], actual);
        assert!(!rows[1].is_actual);
    }

    #[test]
    fn test_glide_is_neutral_when_target_matches_baseline() {
        let baseline =
            CostPercentages::from_assumptions(&model_core::Assumptions::default());
        let implied = baseline.implied_net_margin();
        let m = model(2024, 2028, Some(implied));
        let revenue: BTreeMap<i32, f64> =
            (2024..=2028).map(|y| (y, 1_000_000.0)).collect();

        let rows = project(&m, &revenue, None, &[]);
        for row in &rows {
            assert_eq!(row.cogs, 280_000.0);
            assert_eq!(row.sales_marketing, 220_000.0);
            assert_eq!(row.research_development, 180_000.0);
            assert_eq!(row.general_admin, 80_000.0);
        }
    }

    #[test]
    fn test_glide_reaches_target_in_final_year() {
        let baseline =
            CostPercentages::from_assumptions(&model_core::Assumptions::default());
        let target = baseline.implied_net_margin() + 0.05;
        let m = model(2024, 2028, Some(target));

        // First year is untouched, the final year carries the full shift.
        let first = glide_percentages(baseline, Some(target), 0, 5);
        assert_eq!(first, baseline);

        let last = glide_percentages(baseline, Some(target), 4, 5);
        let implied_last = last.implied_net_margin();
        assert!((implied_last - target).abs() < 1e-9);
    }

    #[test]
    fn test_glide_floors_cost_percentages() {
        let baseline =
            CostPercentages::from_assumptions(&model_core::Assumptions::default());
        // An absurd target forces every glided line to its floor.
        let last = glide_percentages(baseline, Some(0.95), 4, 5);
        assert_eq!(last.general_admin, MIN_COST_PERCENT);
        assert!(last.cogs >= MIN_COST_PERCENT);
        assert_eq!(last.depreciation, baseline.depreciation);
    }

    #[test]
    fn test_single_year_model_never_glides() {
        let baseline =
            CostPercentages::from_assumptions(&model_core::Assumptions::default());
        let glided = glide_percentages(baseline, Some(0.5), 0, 1);
        assert_eq!(glided, baseline);
    }
}
