use std::collections::BTreeMap;

use model_core::{Assumptions, BalanceSheetRow, CashBalancer, IncomeStatementRow, Model};

use crate::rounding::round_money;

/// Inventory carried as a fixed share of revenue.
const INVENTORY_PERCENT: f64 = 0.03;
/// Opening short-term investments, stepped linearly per model year.
const SHORT_TERM_INVESTMENTS_SEED: f64 = 150_000.0;
const SHORT_TERM_INVESTMENTS_STEP: f64 = 25_000.0;
/// Opening gross equipment, stepped linearly per model year.
const EQUIPMENT_SEED: f64 = 500_000.0;
const EQUIPMENT_STEP: f64 = 50_000.0;
const ACCUMULATED_DEPRECIATION_STEP: f64 = 35_000.0;
/// Short-term debt held flat across the projection.
const SHORT_TERM_DEBT: f64 = 100_000.0;
/// Long-term debt amortizes linearly from this opening balance.
const LONG_TERM_DEBT_SEED: f64 = 400_000.0;
const LONG_TERM_DEBT_STEP: f64 = 25_000.0;
const COMMON_SHARES: f64 = 1_000_000.0;
/// Retained earnings carried into the first model year.
const RETAINED_EARNINGS_OPENING: f64 = 250_000.0;

/// Residual cash balancing: cash is whatever makes assets equal liabilities
/// plus equity, not a figure carried over from the cash-flow statement. The
/// two statements are therefore circular by construction; kept as-is to match
/// the established model semantics.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResidualCashBalancer;

impl CashBalancer for ResidualCashBalancer {
    fn solve_cash(&self, row: &BalanceSheetRow) -> f64 {
        row.total_liabilities_and_equity
            - (row.short_term_investments + row.accounts_receivable + row.inventory)
            - row.total_long_term_assets
    }
}

/// Project balance sheet rows for every year in the model range. Actual
/// years pass through; projected years derive working capital from revenue,
/// step the capital-structure lines by year index, accumulate retained
/// earnings from net income, and solve cash as the balancing residual.
pub fn project(
    model: &Model,
    annual_revenue: &BTreeMap<i32, f64>,
    income_rows: &[IncomeStatementRow],
    assumptions: Option<&Assumptions>,
    actual_rows: &[BalanceSheetRow],
    balancer: &dyn CashBalancer,
) -> Vec<BalanceSheetRow> {
    let assume = assumptions.cloned().unwrap_or_default();
    let actuals: BTreeMap<i32, &BalanceSheetRow> = actual_rows
        .iter()
        .filter(|r| r.is_actual)
        .map(|r| (r.year, r))
        .collect();
    let net_income_by_year: BTreeMap<i32, f64> =
        income_rows.iter().map(|r| (r.year, r.net_income)).collect();

    let mut rows = Vec::with_capacity(model.year_count());
    let mut prior_retained = RETAINED_EARNINGS_OPENING;

    for year in model.years() {
        if let Some(actual) = actuals.get(&year) {
            prior_retained = actual.retained_earnings;
            rows.push((*actual).clone());
            continue;
        }

        let revenue = annual_revenue.get(&year).copied().unwrap_or(0.0);
        let year_index = model.year_index(year) as f64;
        let net_income = net_income_by_year.get(&year).copied().unwrap_or(0.0);

        let accounts_receivable = round_money(revenue * assume.ar_percent);
        let inventory = round_money(revenue * INVENTORY_PERCENT);
        let short_term_investments =
            SHORT_TERM_INVESTMENTS_SEED + year_index * SHORT_TERM_INVESTMENTS_STEP;
        let equipment = EQUIPMENT_SEED + year_index * EQUIPMENT_STEP;
        let accumulated_depreciation = year_index * ACCUMULATED_DEPRECIATION_STEP;
        let capex = round_money(revenue * assume.capex_percent);
        let total_long_term_assets = equipment - accumulated_depreciation + capex;

        let accounts_payable = round_money(revenue * assume.ap_percent);
        let long_term_debt = (LONG_TERM_DEBT_SEED - year_index * LONG_TERM_DEBT_STEP).max(0.0);
        let total_current_liabilities = accounts_payable + SHORT_TERM_DEBT;
        let total_liabilities = total_current_liabilities + long_term_debt;

        let retained_earnings = round_money(prior_retained + net_income);
        let total_equity = COMMON_SHARES + retained_earnings;
        let total_liabilities_and_equity = total_liabilities + total_equity;

        let mut row = BalanceSheetRow {
            id: None,
            model_id: model.id.unwrap_or_default(),
            year,
            is_actual: false,
            cash: 0.0,
            short_term_investments,
            accounts_receivable,
            inventory,
            total_current_assets: 0.0,
            equipment,
            accumulated_depreciation,
            capex,
            total_long_term_assets,
            total_assets: 0.0,
            accounts_payable,
            short_term_debt: SHORT_TERM_DEBT,
            total_current_liabilities,
            long_term_debt,
            total_liabilities,
            common_shares: COMMON_SHARES,
            retained_earnings,
            total_equity,
            total_liabilities_and_equity,
        };

        row.cash = balancer.solve_cash(&row);
        row.total_current_assets =
            row.cash + short_term_investments + accounts_receivable + inventory;
        row.total_assets = row.total_current_assets + total_long_term_assets;

        prior_retained = retained_earnings;
        rows.push(row);
    }

    rows
}
