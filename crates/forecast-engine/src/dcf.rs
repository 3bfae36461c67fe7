use model_core::DcfValuation;

use crate::rounding::{round_money, round_price};

/// Fill the computed DCF fields from the free-cash-flow series.
///
/// User-set parameters (rates, weights, current price, total debt) pass
/// through untouched; cost of equity comes from CAPM, WACC blends it with
/// after-tax cost of debt, and the terminal value is guarded to zero when
/// WACC does not exceed the long-term growth rate.
pub fn compute(
    params: &DcfValuation,
    free_cash_flows: &[f64],
    shares_outstanding: f64,
) -> DcfValuation {
    let mut out = params.clone();

    out.cost_of_equity =
        params.risk_free_rate + params.beta * (params.market_return - params.risk_free_rate);
    out.wacc = out.cost_of_equity * params.equity_weight
        + params.cost_of_debt * (1.0 - params.tax_rate) * params.debt_weight;

    let n = free_cash_flows.len();
    let npv: f64 = free_cash_flows
        .iter()
        .enumerate()
        .map(|(i, fcf)| fcf / (1.0 + out.wacc).powi(i as i32 + 1))
        .sum();
    out.npv = round_money(npv);

    out.terminal_value = match free_cash_flows.last() {
        Some(last) if out.wacc > params.long_term_growth => round_money(
            last * (1.0 + params.long_term_growth) / (out.wacc - params.long_term_growth),
        ),
        _ => 0.0,
    };
    out.discounted_terminal_value = if out.terminal_value != 0.0 {
        round_money(out.terminal_value / (1.0 + out.wacc).powi(n as i32))
    } else {
        0.0
    };

    out.target_equity_value = out.npv + out.discounted_terminal_value - params.total_debt;
    out.target_price = if shares_outstanding > 0.0 {
        round_price(out.target_equity_value / shares_outstanding)
    } else {
        0.0
    };

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DcfValuation {
        DcfValuation {
            model_id: 1,
            risk_free_rate: 0.04,
            beta: 1.0,
            market_return: 0.10,
            cost_of_debt: 0.05,
            tax_rate: 0.25,
            equity_weight: 1.0,
            debt_weight: 0.0,
            long_term_growth: 0.02,
            current_price: 50.0,
            total_debt: 100_000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_capm_and_wacc() {
        let out = compute(&params(), &[100_000.0], 1_000_000.0);
        assert!((out.cost_of_equity - 0.10).abs() < 1e-12);
        assert!((out.wacc - 0.10).abs() < 1e-12);

        let mut p = params();
        p.equity_weight = 0.8;
        p.debt_weight = 0.2;
        let out = compute(&p, &[100_000.0], 1_000_000.0);
        // 0.10 * 0.8 + 0.05 * 0.75 * 0.2
        assert!((out.wacc - 0.0875).abs() < 1e-12);
    }

    #[test]
    fn test_npv_discounts_each_year() {
        let out = compute(&params(), &[110_000.0, 121_000.0], 1_000_000.0);
        // 110000/1.1 + 121000/1.21 = 100000 + 100000
        assert_eq!(out.npv, 200_000.0);
    }

    #[test]
    fn test_terminal_value_guard_at_equal_rates() {
        let mut p = params();
        // Make WACC exactly equal the long-term growth rate.
        p.long_term_growth = 0.10;
        let out = compute(&p, &[100_000.0, 100_000.0], 1_000_000.0);
        assert_eq!(out.terminal_value, 0.0);
        assert_eq!(out.discounted_terminal_value, 0.0);
    }

    #[test]
    fn test_target_price_nets_out_debt() {
        let out = compute(&params(), &[110_000.0], 1_000_000.0);
        // npv = 100000, tv = 110000*1.02/0.08 = 1402500, dtv = 1275000
        assert_eq!(out.npv, 100_000.0);
        assert_eq!(out.terminal_value, 1_402_500.0);
        assert_eq!(out.discounted_terminal_value, 1_275_000.0);
        assert_eq!(out.target_equity_value, 1_275_000.0);
        assert_eq!(out.target_price, 1.28);
    }

    #[test]
    fn test_zero_shares_yield_zero_target_price() {
        let out = compute(&params(), &[100_000.0], 0.0);
        assert_eq!(out.target_price, 0.0);
    }

    #[test]
    fn test_user_parameters_pass_through() {
        let p = params();
        let out = compute(&p, &[100_000.0], 1_000_000.0);
        assert_eq!(out.current_price, p.current_price);
        assert_eq!(out.total_debt, p.total_debt);
        assert_eq!(out.risk_free_rate, p.risk_free_rate);
    }
}
