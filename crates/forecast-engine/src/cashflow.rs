use std::collections::BTreeMap;

use model_core::{Assumptions, BalanceSheetRow, CashFlowRow, IncomeStatementRow, Model};

use crate::rounding::round_money;

/// Derive cash flow rows for every year in the model range from income
/// figures and balance-sheet deltas. Actual years pass through. Deltas are
/// zero for the first model year; short-term debt and common shares are held
/// flat by the balance projector, so their deltas stay zero.
pub fn derive(
    model: &Model,
    income_rows: &[IncomeStatementRow],
    balance_rows: &[BalanceSheetRow],
    assumptions: Option<&Assumptions>,
    actual_rows: &[CashFlowRow],
) -> Vec<CashFlowRow> {
    let initial_cash = round_money(assumptions.cloned().unwrap_or_default().initial_cash);
    let actuals: BTreeMap<i32, &CashFlowRow> = actual_rows
        .iter()
        .filter(|r| r.is_actual)
        .map(|r| (r.year, r))
        .collect();
    let income: BTreeMap<i32, &IncomeStatementRow> =
        income_rows.iter().map(|r| (r.year, r)).collect();
    let balance: BTreeMap<i32, &BalanceSheetRow> =
        balance_rows.iter().map(|r| (r.year, r)).collect();

    let mut rows = Vec::with_capacity(model.year_count());
    for year in model.years() {
        if let Some(actual) = actuals.get(&year) {
            rows.push((*actual).clone());
            continue;
        }

        let inc = income.get(&year);
        let bs = balance.get(&year);
        let prior_bs = balance.get(&(year - 1));
        let is_first_year = year == model.start_year;

        let net_income = inc.map_or(0.0, |r| r.net_income);
        let depreciation_add_back = inc.map_or(0.0, |r| r.depreciation);

        let delta = |current: f64, prior: f64| if is_first_year { 0.0 } else { current - prior };
        let change_in_receivables = match (bs, prior_bs) {
            (Some(b), Some(p)) => delta(b.accounts_receivable, p.accounts_receivable),
            _ => 0.0,
        };
        let change_in_inventory = match (bs, prior_bs) {
            (Some(b), Some(p)) => delta(b.inventory, p.inventory),
            _ => 0.0,
        };
        let change_in_payables = match (bs, prior_bs) {
            (Some(b), Some(p)) => delta(b.accounts_payable, p.accounts_payable),
            _ => 0.0,
        };
        let change_in_long_term_debt = match (bs, prior_bs) {
            (Some(b), Some(p)) => delta(b.long_term_debt, p.long_term_debt),
            _ => 0.0,
        };

        let operating_cash_flow = net_income + depreciation_add_back - change_in_receivables
            - change_in_inventory
            + change_in_payables;
        let capital_expenditures = bs.map_or(0.0, |b| b.capex);
        let investing_cash_flow = -capital_expenditures;
        let financing_cash_flow = change_in_long_term_debt;
        let net_change_in_cash = operating_cash_flow + investing_cash_flow + financing_cash_flow;

        let beginning_cash = if is_first_year {
            initial_cash
        } else {
            prior_bs.map_or(initial_cash, |p| p.cash)
        };

        rows.push(CashFlowRow {
            id: None,
            model_id: model.id.unwrap_or_default(),
            year,
            is_actual: false,
            net_income,
            depreciation_add_back,
            change_in_receivables,
            change_in_inventory,
            change_in_payables,
            operating_cash_flow,
            capital_expenditures,
            investing_cash_flow,
            change_in_short_term_debt: 0.0,
            change_in_long_term_debt,
            change_in_common_shares: 0.0,
            financing_cash_flow,
            net_change_in_cash,
            beginning_cash,
            ending_cash: beginning_cash + net_change_in_cash,
            free_cash_flow: operating_cash_flow + investing_cash_flow,
        });
    }

    rows
}
