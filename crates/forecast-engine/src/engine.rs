use model_core::{
    CashBalancer, DcfValuation, EngineError, ForecastResult, Model, RecalculationResult,
};
use model_store::ModelStore;

use crate::balance::ResidualCashBalancer;
use crate::locks::ModelLocks;
use crate::{balance, cashflow, comparison, dcf, forecast, income, revenue};

/// The recalculation and forecasting engine.
///
/// Both entry points are serialized per model: the engine holds the model's
/// lock for the whole call, so at most one recalculation per model is in
/// flight at a time. All projected rows are swapped inside one transaction;
/// actual rows are never touched.
pub struct ForecastEngine {
    store: ModelStore,
    locks: ModelLocks,
    balancer: Box<dyn CashBalancer>,
}

impl ForecastEngine {
    pub fn new(store: ModelStore) -> Self {
        Self::with_balancer(store, Box::new(ResidualCashBalancer))
    }

    pub fn with_balancer(store: ModelStore, balancer: Box<dyn CashBalancer>) -> Self {
        Self {
            store,
            locks: ModelLocks::new(),
            balancer,
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Re-derive every projected statement row and both valuation views for
    /// a model from its current revenue inputs and assumptions.
    pub async fn recalculate(&self, model_id: i64) -> Result<RecalculationResult, EngineError> {
        let _guard = self.locks.acquire(model_id).await;
        self.recalculate_locked(model_id).await
    }

    /// Fill empty revenue periods from historical growth, then run the full
    /// recalculation chain on the result.
    pub async fn forecast_forward(&self, model_id: i64) -> Result<ForecastResult, EngineError> {
        let _guard = self.locks.acquire(model_id).await;

        let model = self.require_model(model_id).await?;
        let line_items = self.store.line_items(model_id).await?;
        let periods = self.store.periods_for_model(model_id).await?;

        let plan = forecast::plan(&model, &line_items, &periods)?;
        tracing::info!(
            "Forecasting model {}: {} periods across years {:?} (growth {:.4}, decay {:.4})",
            model_id,
            plan.periods_created,
            plan.forecasted_years,
            plan.growth_applied,
            model.revenue_growth_decay
        );

        self.store.save_periods(&plan.periods).await?;
        let recalculation = self.recalculate_locked(model_id).await?;
        // The forecaster's bull/bear series overrides the recalculated one
        // for the years it projected.
        self.store
            .upsert_scenario_revenues(&plan.scenario_revenues)
            .await?;

        Ok(ForecastResult {
            forecasted_years: plan.forecasted_years,
            periods_created: plan.periods_created,
            growth_applied: plan.growth_applied,
            growth_decay_rate: model.revenue_growth_decay,
            scenario_revenues: plan.scenario_revenues,
            recalculation,
        })
    }

    async fn recalculate_locked(&self, model_id: i64) -> Result<RecalculationResult, EngineError> {
        let model = self.require_model(model_id).await?;
        tracing::info!(
            "Recalculating model {} ({}-{})",
            model_id,
            model.start_year,
            model.end_year
        );

        let line_items = self.store.line_items(model_id).await?;
        let periods = self.store.periods_for_model(model_id).await?;
        let assumptions = self.store.base_assumptions(model_id).await?;
        let actual_income: Vec<_> = self
            .store
            .income_rows(model_id)
            .await?
            .into_iter()
            .filter(|r| r.is_actual)
            .collect();
        let actual_balance: Vec<_> = self
            .store
            .balance_rows(model_id)
            .await?
            .into_iter()
            .filter(|r| r.is_actual)
            .collect();
        let actual_cash: Vec<_> = self
            .store
            .cash_flow_rows(model_id)
            .await?
            .into_iter()
            .filter(|r| r.is_actual)
            .collect();
        let dcf_params = self
            .store
            .dcf_valuation(model_id)
            .await?
            .unwrap_or_else(|| DcfValuation {
                model_id,
                ..Default::default()
            });
        let existing_comparison = self.store.valuation_comparison(model_id).await?;

        let annual_revenue = revenue::aggregate_annual_revenue(
            &line_items,
            &periods,
            model.start_year,
            model.end_year,
        );
        tracing::debug!("Annual revenue for model {}: {:?}", model_id, annual_revenue);

        let income_rows = income::project(
            &model,
            &annual_revenue,
            assumptions.as_ref(),
            &actual_income,
        );
        let balance_rows = balance::project(
            &model,
            &annual_revenue,
            &income_rows,
            assumptions.as_ref(),
            &actual_balance,
            self.balancer.as_ref(),
        );
        let cash_flow_rows = cashflow::derive(
            &model,
            &income_rows,
            &balance_rows,
            assumptions.as_ref(),
            &actual_cash,
        );

        let free_cash_flows: Vec<f64> =
            cash_flow_rows.iter().map(|r| r.free_cash_flow).collect();
        let dcf_row = dcf::compute(&dcf_params, &free_cash_flows, model.shares_outstanding);
        let (valuation, scenario_revenues) = comparison::compute(
            &model,
            &annual_revenue,
            &income_rows,
            &dcf_row,
            existing_comparison.as_ref(),
        );

        self.store
            .replace_projection(
                model_id,
                &income_rows,
                &balance_rows,
                &cash_flow_rows,
                &dcf_row,
                &valuation,
                &scenario_revenues,
            )
            .await?;
        tracing::debug!(
            "Model {} recalculated: target price {:.2}, average target {:.2}",
            model_id,
            dcf_row.target_price,
            valuation.average_target
        );

        Ok(RecalculationResult {
            revenue: annual_revenue,
            income_statement: income_rows,
            balance_sheet: balance_rows,
            cash_flow: cash_flow_rows,
            dcf: dcf_row,
            valuation,
        })
    }

    async fn require_model(&self, model_id: i64) -> Result<Model, EngineError> {
        self.store
            .get_model(model_id)
            .await?
            .ok_or(EngineError::ModelNotFound(model_id))
    }
}
