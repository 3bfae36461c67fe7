use std::collections::BTreeSet;

use model_core::{
    Assumptions, DcfValuation, EngineError, IncomeStatementRow, Model, RevenuePeriod, Scenario,
};
use model_store::{ModelDb, ModelStore};

use crate::ForecastEngine;

async fn setup_engine() -> ForecastEngine {
    let db = ModelDb::new("sqlite::memory:").await.unwrap();
    ForecastEngine::new(ModelStore::new(db))
}

fn model(start: i32, end: i32) -> Model {
    Model {
        id: None,
        name: "Acme".to_string(),
        ticker: Some("ACME".to_string()),
        start_year: start,
        end_year: end,
        shares_outstanding: 1_000_000.0,
        bull_multiplier: 1.2,
        base_multiplier: 1.0,
        bear_multiplier: 0.8,
        target_net_margin: None,
        revenue_growth_decay: 0.1,
        created_at: None,
    }
}

fn annual_period(line_item_id: i64, year: i32, amount: f64, is_actual: bool) -> RevenuePeriod {
    RevenuePeriod {
        id: None,
        line_item_id,
        year,
        quarter: None,
        amount,
        is_actual,
    }
}

fn quarterly_period(line_item_id: i64, year: i32, quarter: i32, amount: f64) -> RevenuePeriod {
    RevenuePeriod {
        id: None,
        line_item_id,
        year,
        quarter: Some(quarter),
        amount,
        is_actual: true,
    }
}

fn actual_income_2024(model_id: i64) -> IncomeStatementRow {
    IncomeStatementRow {
        id: None,
        model_id,
        year: 2024,
        is_actual: true,
        revenue: 1_000_000.0,
        cogs: 300_000.0,
        gross_profit: 700_000.0,
        sales_marketing: 220_000.0,
        research_development: 180_000.0,
        general_admin: 80_000.0,
        depreciation: 15_000.0,
        total_operating_expenses: 495_000.0,
        operating_income: 205_000.0,
        ebitda: 220_000.0,
        other_income: 2_000.0,
        pre_tax_income: 207_000.0,
        income_tax: 51_750.0,
        net_income: 155_250.0,
        eps: 0.16,
        non_gaap_eps: 0.18,
    }
}

#[tokio::test]
async fn test_recalculate_unknown_model_fails() {
    let engine = setup_engine().await;
    let err = engine.recalculate(999).await.unwrap_err();
    assert!(matches!(err, EngineError::ModelNotFound(999)));
}

#[tokio::test]
async fn test_end_to_end_actuals_untouched_and_costs_projected() {
    let engine = setup_engine().await;
    let store = engine.store();

    let model_id = store.create_model(&model(2024, 2026)).await.unwrap();
    let item_id = store.add_line_item(model_id, "Product").await.unwrap();
    store
        .set_period(&annual_period(item_id, 2024, 1_000_000.0, true))
        .await
        .unwrap();
    store
        .set_period(&annual_period(item_id, 2025, 1_200_000.0, false))
        .await
        .unwrap();
    store
        .set_period(&annual_period(item_id, 2026, 1_440_000.0, false))
        .await
        .unwrap();
    store
        .upsert_assumptions(&Assumptions {
            model_id,
            cogs_percent: 0.30,
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .upsert_income_row(&actual_income_2024(model_id))
        .await
        .unwrap();

    let result = engine.recalculate(model_id).await.unwrap();

    assert_eq!(result.revenue[&2024], 1_000_000.0);
    assert_eq!(result.revenue[&2025], 1_200_000.0);

    let income = &result.income_statement;
    assert_eq!(income.len(), 3);
    assert!(income[0].is_actual);
    assert_eq!(income[0].cogs, 300_000.0);

    for row in &income[1..] {
        assert!(!row.is_actual);
        assert_eq!(row.cogs, (row.revenue * 0.30).round());
        assert_eq!(row.gross_profit, row.revenue - row.cogs);
    }

    // The actual row in the store is byte-identical after the run.
    let stored = store.income_rows(model_id).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored[0].is_actual);
    assert_eq!(stored[0].revenue, 1_000_000.0);
    assert_eq!(stored[0].eps, 0.16);
}

#[tokio::test]
async fn test_recalculation_is_deterministic_and_idempotent() {
    let engine = setup_engine().await;
    let store = engine.store();

    let model_id = store.create_model(&model(2024, 2026)).await.unwrap();
    let item_id = store.add_line_item(model_id, "Product").await.unwrap();
    for (year, amount) in [(2024, 800_000.0), (2025, 1_000_000.0), (2026, 1_250_000.0)] {
        store
            .set_period(&annual_period(item_id, year, amount, year == 2024))
            .await
            .unwrap();
    }

    let first = engine.recalculate(model_id).await.unwrap();
    let second = engine.recalculate(model_id).await.unwrap();

    assert_eq!(first.income_statement, second.income_statement);
    assert_eq!(first.balance_sheet, second.balance_sheet);
    assert_eq!(first.cash_flow, second.cash_flow);

    // Ignore row ids assigned by the upserts; the figures must match.
    let mut dcf1 = first.dcf.clone();
    let mut dcf2 = second.dcf.clone();
    dcf1.id = None;
    dcf2.id = None;
    assert_eq!(dcf1, dcf2);
    let mut val1 = first.valuation.clone();
    let mut val2 = second.valuation.clone();
    val1.id = None;
    val2.id = None;
    assert_eq!(val1, val2);

    // No duplicate projected rows in the store.
    assert_eq!(store.income_rows(model_id).await.unwrap().len(), 3);
    assert_eq!(store.balance_rows(model_id).await.unwrap().len(), 3);
    assert_eq!(store.cash_flow_rows(model_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_balance_sheet_always_balances() {
    let engine = setup_engine().await;
    let store = engine.store();

    let model_id = store.create_model(&model(2023, 2028)).await.unwrap();
    let item_id = store.add_line_item(model_id, "Services").await.unwrap();
    for (i, year) in (2023..=2028).enumerate() {
        store
            .set_period(&annual_period(
                item_id,
                year,
                750_000.0 * (1.0 + 0.17 * i as f64),
                false,
            ))
            .await
            .unwrap();
    }

    let result = engine.recalculate(model_id).await.unwrap();
    for row in &result.balance_sheet {
        assert_eq!(row.total_assets, row.total_liabilities_and_equity);
    }
}

#[tokio::test]
async fn test_dcf_parameters_survive_recalculation() {
    let engine = setup_engine().await;
    let store = engine.store();

    let model_id = store.create_model(&model(2024, 2026)).await.unwrap();
    let item_id = store.add_line_item(model_id, "Product").await.unwrap();
    store
        .set_period(&annual_period(item_id, 2024, 1_000_000.0, true))
        .await
        .unwrap();

    store
        .upsert_dcf_valuation(&DcfValuation {
            model_id,
            beta: 1.7,
            current_price: 88.0,
            total_debt: 2_000_000.0,
            ..Default::default()
        })
        .await
        .unwrap();

    let result = engine.recalculate(model_id).await.unwrap();
    assert_eq!(result.dcf.beta, 1.7);
    assert_eq!(result.dcf.current_price, 88.0);
    assert_eq!(result.dcf.total_debt, 2_000_000.0);
    // Computed fields were filled in.
    assert!(result.dcf.wacc > 0.0);

    let stored = store.dcf_valuation(model_id).await.unwrap().unwrap();
    assert_eq!(stored.beta, 1.7);
    assert_eq!(stored.wacc, result.dcf.wacc);
}

#[tokio::test]
async fn test_comparison_multiples_survive_recalculation() {
    let engine = setup_engine().await;
    let store = engine.store();

    let model_id = store.create_model(&model(2024, 2026)).await.unwrap();
    let item_id = store.add_line_item(model_id, "Product").await.unwrap();
    store
        .set_period(&annual_period(item_id, 2024, 1_000_000.0, true))
        .await
        .unwrap();

    store
        .upsert_valuation_comparison(&model_core::ValuationComparison {
            model_id,
            bull_pr_multiple: 25.0,
            bear_peg: 0.5,
            ..Default::default()
        })
        .await
        .unwrap();

    let result = engine.recalculate(model_id).await.unwrap();
    assert_eq!(result.valuation.bull_pr_multiple, 25.0);
    assert_eq!(result.valuation.bear_peg, 0.5);

    let stored = store.valuation_comparison(model_id).await.unwrap().unwrap();
    assert_eq!(stored.bull_pr_multiple, 25.0);
    assert_eq!(stored.bear_peg, 0.5);
}

#[tokio::test]
async fn test_forecast_forward_fills_and_recalculates() {
    let engine = setup_engine().await;
    let store = engine.store();

    let model_id = store.create_model(&model(2023, 2027)).await.unwrap();
    let item_id = store.add_line_item(model_id, "Subscriptions").await.unwrap();
    for quarter in 1..=4 {
        store
            .set_period(&quarterly_period(item_id, 2023, quarter, 100_000.0))
            .await
            .unwrap();
        store
            .set_period(&quarterly_period(item_id, 2024, quarter, 120_000.0))
            .await
            .unwrap();
    }

    let result = engine.forecast_forward(model_id).await.unwrap();

    assert_eq!(result.forecasted_years, vec![2025, 2026, 2027]);
    // Four quarterly series, three empty years each.
    assert_eq!(result.periods_created, 12);
    assert!((result.growth_applied - 0.2).abs() < 1e-9);
    assert_eq!(result.growth_decay_rate, 0.1);

    // Projected revenue chains: 2025 grows 18% (20% decayed once).
    let revenue_2025 = result.recalculation.revenue[&2025];
    assert!((revenue_2025 - 4.0 * 120_000.0 * 1.18).abs() < 1.0);

    // Scenario revenue was merged for the forecasted years.
    let scenario_years: BTreeSet<i32> =
        result.scenario_revenues.iter().map(|r| r.year).collect();
    assert_eq!(scenario_years, BTreeSet::from([2025, 2026, 2027]));
    let stored = store.scenario_revenues(model_id).await.unwrap();
    for year in [2025, 2026, 2027] {
        let get = |s: Scenario| {
            stored
                .iter()
                .find(|r| r.year == year && r.scenario == s)
                .unwrap()
                .amount
        };
        assert!(get(Scenario::Bear) <= get(Scenario::Base));
        assert!(get(Scenario::Base) <= get(Scenario::Bull));
    }

    // Filled periods were persisted and the full chain ran.
    let periods = store.periods_for_model(model_id).await.unwrap();
    assert_eq!(periods.len(), 20);
    assert_eq!(store.income_rows(model_id).await.unwrap().len(), 5);

    // A second forecast finds nothing left to fill.
    let err = engine.forecast_forward(model_id).await.unwrap_err();
    assert!(matches!(err, EngineError::ForecastPrecondition(_)));
}

#[tokio::test]
async fn test_forecast_requires_positive_revenue() {
    let engine = setup_engine().await;
    let store = engine.store();

    let model_id = store.create_model(&model(2024, 2026)).await.unwrap();
    let err = engine.forecast_forward(model_id).await.unwrap_err();
    assert!(matches!(err, EngineError::ForecastPrecondition(_)));

    let item_id = store.add_line_item(model_id, "Product").await.unwrap();
    store
        .set_period(&annual_period(item_id, 2024, 0.0, true))
        .await
        .unwrap();
    let err = engine.forecast_forward(model_id).await.unwrap_err();
    assert!(matches!(err, EngineError::ForecastPrecondition(_)));
}
