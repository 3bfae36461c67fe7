use std::collections::BTreeMap;

use model_core::{
    DcfValuation, IncomeStatementRow, Model, Scenario, ScenarioRevenue, ValuationComparison,
};

use crate::rounding::{round_money, round_price};

/// Growth assumed when no usable EPS history exists.
const DEFAULT_EARNINGS_GROWTH: f64 = 0.25;
/// EPS magnitudes below this make a PEG-based target meaningless.
const EPS_EPSILON: f64 = 0.001;

/// Compute the multiple-based valuation comparison and the scenario revenue
/// series. Multiples on an existing comparison row survive; only the targets
/// are recomputed.
pub fn compute(
    model: &Model,
    annual_revenue: &BTreeMap<i32, f64>,
    income_rows: &[IncomeStatementRow],
    dcf: &DcfValuation,
    existing: Option<&ValuationComparison>,
) -> (ValuationComparison, Vec<ScenarioRevenue>) {
    let mut out = existing.cloned().unwrap_or_default();
    out.model_id = model.id.unwrap_or_default();

    let shares = model.shares_outstanding;
    let last_revenue = annual_revenue
        .get(&model.end_year)
        .copied()
        .unwrap_or(0.0);
    let revenue_per_share = if shares > 0.0 { last_revenue / shares } else { 0.0 };

    let eps_series: Vec<f64> = income_rows.iter().map(|r| r.eps).collect();
    let eps = eps_series.last().copied().unwrap_or(0.0);
    let growth = earnings_growth(&eps_series);
    let growth_pct = (growth * 100.0).max(1.0);

    out.eps_used = eps;
    out.growth_pct_used = growth_pct;

    let pr_target = |multiple: f64| round_price(revenue_per_share * multiple);
    let pe_target = |peg: f64| {
        if eps.abs() < EPS_EPSILON {
            0.0
        } else {
            round_price(eps * growth_pct * peg)
        }
    };
    let dcf_target =
        |scenario: Scenario| round_price(dcf.target_price * scenario.multiplier(model));

    out.bull_pr_target = pr_target(out.bull_pr_multiple);
    out.base_pr_target = pr_target(out.base_pr_multiple);
    out.bear_pr_target = pr_target(out.bear_pr_multiple);
    out.bull_pe_target = pe_target(out.bull_peg);
    out.base_pe_target = pe_target(out.base_peg);
    out.bear_pe_target = pe_target(out.bear_peg);
    out.bull_dcf_target = dcf_target(Scenario::Bull);
    out.base_dcf_target = dcf_target(Scenario::Base);
    out.bear_dcf_target = dcf_target(Scenario::Bear);

    let targets = [
        out.bull_pr_target,
        out.base_pr_target,
        out.bear_pr_target,
        out.bull_pe_target,
        out.base_pe_target,
        out.bear_pe_target,
        out.bull_dcf_target,
        out.base_dcf_target,
        out.bear_dcf_target,
    ];
    out.average_target = round_price(targets.iter().sum::<f64>() / targets.len() as f64);
    out.percent_to_target = if dcf.current_price > 0.0 {
        (out.average_target - dcf.current_price) / dcf.current_price
    } else {
        0.0
    };

    (out, scenario_revenue_series(model, annual_revenue))
}

/// YoY growth of the latest two non-zero EPS values, falling back to the
/// latest two raw values, then to a default.
fn earnings_growth(eps_series: &[f64]) -> f64 {
    let non_zero: Vec<f64> = eps_series.iter().copied().filter(|e| *e != 0.0).collect();
    let pair = if non_zero.len() >= 2 {
        Some((non_zero[non_zero.len() - 2], non_zero[non_zero.len() - 1]))
    } else if eps_series.len() >= 2 {
        Some((eps_series[eps_series.len() - 2], eps_series[eps_series.len() - 1]))
    } else {
        None
    };

    match pair {
        Some((prev, cur)) if prev != 0.0 => (cur - prev) / prev.abs(),
        _ => DEFAULT_EARNINGS_GROWTH,
    }
}

/// Bull/base/bear revenue per year: base is the modelled revenue, bull and
/// bear scale the realized YoY growth by the model multipliers. Years with
/// unknown or nonpositive revenue on either side are skipped.
fn scenario_revenue_series(
    model: &Model,
    annual_revenue: &BTreeMap<i32, f64>,
) -> Vec<ScenarioRevenue> {
    let model_id = model.id.unwrap_or_default();
    let mut rows = Vec::new();

    for year in model.years().skip(1) {
        let prev = annual_revenue.get(&(year - 1)).copied().unwrap_or(0.0);
        let current = annual_revenue.get(&year).copied().unwrap_or(0.0);
        if prev <= 0.0 || current <= 0.0 {
            continue;
        }
        let yoy = (current - prev) / prev;

        for scenario in Scenario::ALL {
            let amount = match scenario {
                Scenario::Base => current,
                _ => prev * (1.0 + yoy * scenario.multiplier(model)),
            };
            rows.push(ScenarioRevenue {
                id: None,
                model_id,
                year,
                scenario,
                amount: round_money(amount),
            });
        }
    }

    rows
}
