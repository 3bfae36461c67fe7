use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A company (or tracked crypto project) being modelled: the year range,
/// share count, and scenario knobs everything downstream keys off.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Model {
    pub id: Option<i64>,
    pub name: String,
    pub ticker: Option<String>,
    pub start_year: i32,
    pub end_year: i32,
    pub shares_outstanding: f64,
    pub bull_multiplier: f64,
    pub base_multiplier: f64,
    pub bear_multiplier: f64,
    /// When set, projected cost percentages glide toward this net margin
    /// over the model's year range.
    pub target_net_margin: Option<f64>,
    /// Per-year decay applied to historical growth when extrapolating
    /// revenue forward.
    pub revenue_growth_decay: f64,
    pub created_at: Option<String>,
}

impl Model {
    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    pub fn year_count(&self) -> usize {
        (self.end_year - self.start_year + 1).max(0) as usize
    }

    /// Zero-based position of a year within the model range.
    pub fn year_index(&self, year: i32) -> usize {
        (year - self.start_year).max(0) as usize
    }
}

/// A named revenue stream belonging to a model.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RevenueLineItem {
    pub id: Option<i64>,
    pub model_id: i64,
    pub name: String,
}

/// One revenue amount for a line item: quarterly (quarter 1-4) or annual
/// (quarter None). Quarterly rows take precedence over an annual row when
/// summing a year.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RevenuePeriod {
    pub id: Option<i64>,
    pub line_item_id: i64,
    pub year: i32,
    pub quarter: Option<i32>,
    pub amount: f64,
    pub is_actual: bool,
}

/// Base-case cost and working-capital percentages for a model
/// (scenario_id None).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assumptions {
    pub id: Option<i64>,
    pub model_id: i64,
    pub scenario_id: Option<i64>,
    pub cogs_percent: f64,
    pub sm_percent: f64,
    pub rd_percent: f64,
    pub ga_percent: f64,
    pub depreciation_percent: f64,
    pub tax_rate: f64,
    pub ar_percent: f64,
    pub ap_percent: f64,
    pub capex_percent: f64,
    pub initial_cash: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            id: None,
            model_id: 0,
            scenario_id: None,
            cogs_percent: 0.28,
            sm_percent: 0.22,
            rd_percent: 0.18,
            ga_percent: 0.08,
            depreciation_percent: 0.015,
            tax_rate: 0.25,
            ar_percent: 0.15,
            ap_percent: 0.10,
            capex_percent: 0.05,
            initial_cash: 500_000.0,
        }
    }
}

/// Annual P&L line. `is_actual` rows come from filings and pass through the
/// engine untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IncomeStatementRow {
    pub id: Option<i64>,
    pub model_id: i64,
    pub year: i32,
    pub is_actual: bool,
    pub revenue: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub sales_marketing: f64,
    pub research_development: f64,
    pub general_admin: f64,
    pub depreciation: f64,
    pub total_operating_expenses: f64,
    pub operating_income: f64,
    pub ebitda: f64,
    pub other_income: f64,
    pub pre_tax_income: f64,
    pub income_tax: f64,
    pub net_income: f64,
    pub eps: f64,
    pub non_gaap_eps: f64,
}

/// Annual balance sheet line. Cash is solved as the balancing residual, so
/// total_assets always equals total_liabilities_and_equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BalanceSheetRow {
    pub id: Option<i64>,
    pub model_id: i64,
    pub year: i32,
    pub is_actual: bool,
    pub cash: f64,
    pub short_term_investments: f64,
    pub accounts_receivable: f64,
    pub inventory: f64,
    pub total_current_assets: f64,
    pub equipment: f64,
    pub accumulated_depreciation: f64,
    pub capex: f64,
    pub total_long_term_assets: f64,
    pub total_assets: f64,
    pub accounts_payable: f64,
    pub short_term_debt: f64,
    pub total_current_liabilities: f64,
    pub long_term_debt: f64,
    pub total_liabilities: f64,
    pub common_shares: f64,
    pub retained_earnings: f64,
    pub total_equity: f64,
    pub total_liabilities_and_equity: f64,
}

/// Annual cash flow line, derived from income figures and balance-sheet
/// deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CashFlowRow {
    pub id: Option<i64>,
    pub model_id: i64,
    pub year: i32,
    pub is_actual: bool,
    pub net_income: f64,
    pub depreciation_add_back: f64,
    pub change_in_receivables: f64,
    pub change_in_inventory: f64,
    pub change_in_payables: f64,
    pub operating_cash_flow: f64,
    pub capital_expenditures: f64,
    pub investing_cash_flow: f64,
    pub change_in_short_term_debt: f64,
    pub change_in_long_term_debt: f64,
    pub change_in_common_shares: f64,
    pub financing_cash_flow: f64,
    pub net_change_in_cash: f64,
    pub beginning_cash: f64,
    pub ending_cash: f64,
    pub free_cash_flow: f64,
}

/// Discounted-cash-flow valuation: user parameters plus computed outputs.
/// One row per model; parameters survive recalculation, outputs are
/// overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DcfValuation {
    pub id: Option<i64>,
    pub model_id: i64,
    pub risk_free_rate: f64,
    pub beta: f64,
    pub market_return: f64,
    pub cost_of_debt: f64,
    pub tax_rate: f64,
    pub equity_weight: f64,
    pub debt_weight: f64,
    pub long_term_growth: f64,
    pub current_price: f64,
    pub total_debt: f64,
    pub cost_of_equity: f64,
    pub wacc: f64,
    pub npv: f64,
    pub terminal_value: f64,
    pub discounted_terminal_value: f64,
    pub target_equity_value: f64,
    pub target_price: f64,
}

impl Default for DcfValuation {
    fn default() -> Self {
        Self {
            id: None,
            model_id: 0,
            risk_free_rate: 0.042,
            beta: 1.2,
            market_return: 0.10,
            cost_of_debt: 0.05,
            tax_rate: 0.25,
            equity_weight: 0.85,
            debt_weight: 0.15,
            long_term_growth: 0.025,
            current_price: 0.0,
            total_debt: 0.0,
            cost_of_equity: 0.0,
            wacc: 0.0,
            npv: 0.0,
            terminal_value: 0.0,
            discounted_terminal_value: 0.0,
            target_equity_value: 0.0,
            target_price: 0.0,
        }
    }
}

/// Multiple-based valuation comparison: price/revenue and PEG-based
/// price/earnings targets per scenario, alongside the DCF target, and their
/// average. One row per model; the multiples survive recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ValuationComparison {
    pub id: Option<i64>,
    pub model_id: i64,
    pub bull_pr_multiple: f64,
    pub base_pr_multiple: f64,
    pub bear_pr_multiple: f64,
    pub bull_peg: f64,
    pub base_peg: f64,
    pub bear_peg: f64,
    pub eps_used: f64,
    pub growth_pct_used: f64,
    pub bull_pr_target: f64,
    pub base_pr_target: f64,
    pub bear_pr_target: f64,
    pub bull_pe_target: f64,
    pub base_pe_target: f64,
    pub bear_pe_target: f64,
    pub bull_dcf_target: f64,
    pub base_dcf_target: f64,
    pub bear_dcf_target: f64,
    pub average_target: f64,
    pub percent_to_target: f64,
}

impl Default for ValuationComparison {
    fn default() -> Self {
        Self {
            id: None,
            model_id: 0,
            bull_pr_multiple: 12.0,
            base_pr_multiple: 8.0,
            bear_pr_multiple: 5.0,
            bull_peg: 2.0,
            base_peg: 1.5,
            bear_peg: 1.0,
            eps_used: 0.0,
            growth_pct_used: 0.0,
            bull_pr_target: 0.0,
            base_pr_target: 0.0,
            bear_pr_target: 0.0,
            bull_pe_target: 0.0,
            base_pe_target: 0.0,
            bear_pe_target: 0.0,
            bull_dcf_target: 0.0,
            base_dcf_target: 0.0,
            bear_dcf_target: 0.0,
            average_target: 0.0,
            percent_to_target: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Scenario {
    Bull,
    Base,
    Bear,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Bull, Scenario::Base, Scenario::Bear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Bull => "bull",
            Scenario::Base => "base",
            Scenario::Bear => "bear",
        }
    }

    /// The model's growth multiplier for this scenario.
    pub fn multiplier(&self, model: &Model) -> f64 {
        match self {
            Scenario::Bull => model.bull_multiplier,
            Scenario::Base => model.base_multiplier,
            Scenario::Bear => model.bear_multiplier,
        }
    }
}

/// One point of the first-class scenario revenue series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScenarioRevenue {
    pub id: Option<i64>,
    pub model_id: i64,
    pub year: i32,
    pub scenario: Scenario,
    pub amount: f64,
}

/// Everything one recalculation pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculationResult {
    pub revenue: BTreeMap<i32, f64>,
    pub income_statement: Vec<IncomeStatementRow>,
    pub balance_sheet: Vec<BalanceSheetRow>,
    pub cash_flow: Vec<CashFlowRow>,
    pub dcf: DcfValuation,
    pub valuation: ValuationComparison,
}

/// Result of a forward forecast: what was filled, the growth applied, and
/// the recalculation triggered afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub forecasted_years: Vec<i32>,
    pub periods_created: usize,
    pub growth_applied: f64,
    pub growth_decay_rate: f64,
    pub scenario_revenues: Vec<ScenarioRevenue>,
    pub recalculation: RecalculationResult,
}
