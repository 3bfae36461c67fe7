use sqlx::sqlite::SqliteConnection;

use model_core::{
    Assumptions, BalanceSheetRow, CashFlowRow, DcfValuation, IncomeStatementRow, Model,
    RevenueLineItem, RevenuePeriod, ScenarioRevenue, ValuationComparison,
};

use crate::db::ModelDb;

/// Typed access to everything the engine reads and writes.
///
/// Projected-row replacement happens inside a single transaction
/// (`replace_projection`), so a failed recalculation leaves the previous
/// projection intact.
pub struct ModelStore {
    db: ModelDb,
}

impl ModelStore {
    pub fn new(db: ModelDb) -> Self {
        Self { db }
    }

    /// Get a reference to the database
    pub fn db(&self) -> &ModelDb {
        &self.db
    }

    pub async fn create_model(&self, model: &Model) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO models (
                name, ticker, start_year, end_year, shares_outstanding,
                bull_multiplier, base_multiplier, bear_multiplier,
                target_net_margin, revenue_growth_decay
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&model.name)
        .bind(&model.ticker)
        .bind(model.start_year)
        .bind(model.end_year)
        .bind(model.shares_outstanding)
        .bind(model.bull_multiplier)
        .bind(model.base_multiplier)
        .bind(model.bear_multiplier)
        .bind(model.target_net_margin)
        .bind(model.revenue_growth_decay)
        .fetch_one(self.db.pool())
        .await?;

        Ok(id)
    }

    pub async fn get_model(&self, id: i64) -> Result<Option<Model>, sqlx::Error> {
        sqlx::query_as::<_, Model>("SELECT * FROM models WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
    }

    pub async fn add_line_item(&self, model_id: i64, name: &str) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO revenue_line_items (model_id, name) VALUES (?, ?) RETURNING id",
        )
        .bind(model_id)
        .bind(name)
        .fetch_one(self.db.pool())
        .await?;

        Ok(id)
    }

    pub async fn line_items(&self, model_id: i64) -> Result<Vec<RevenueLineItem>, sqlx::Error> {
        sqlx::query_as::<_, RevenueLineItem>(
            "SELECT * FROM revenue_line_items WHERE model_id = ? ORDER BY id",
        )
        .bind(model_id)
        .fetch_all(self.db.pool())
        .await
    }

    pub async fn periods_for_model(&self, model_id: i64) -> Result<Vec<RevenuePeriod>, sqlx::Error> {
        sqlx::query_as::<_, RevenuePeriod>(
            r#"
            SELECT p.* FROM revenue_periods p
            JOIN revenue_line_items li ON li.id = p.line_item_id
            WHERE li.model_id = ?
            ORDER BY p.line_item_id, p.year, p.quarter
            "#,
        )
        .bind(model_id)
        .fetch_all(self.db.pool())
        .await
    }

    /// Insert or update the period row for a (line item, year, quarter) slot.
    /// `quarter` None addresses the annual slot.
    pub async fn set_period(&self, period: &RevenuePeriod) -> Result<i64, sqlx::Error> {
        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM revenue_periods WHERE line_item_id = ? AND year = ? AND quarter IS ?",
        )
        .bind(period.line_item_id)
        .bind(period.year)
        .bind(period.quarter)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some((id,)) = existing {
            sqlx::query("UPDATE revenue_periods SET amount = ?, is_actual = ? WHERE id = ?")
                .bind(period.amount)
                .bind(period.is_actual)
                .bind(id)
                .execute(self.db.pool())
                .await?;
            Ok(id)
        } else {
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO revenue_periods (line_item_id, year, quarter, amount, is_actual)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(period.line_item_id)
            .bind(period.year)
            .bind(period.quarter)
            .bind(period.amount)
            .bind(period.is_actual)
            .fetch_one(self.db.pool())
            .await?;
            Ok(id)
        }
    }

    pub async fn save_periods(&self, periods: &[RevenuePeriod]) -> Result<usize, sqlx::Error> {
        for period in periods {
            self.set_period(period).await?;
        }
        Ok(periods.len())
    }

    /// The base-case assumptions row (scenario_id NULL), if any.
    pub async fn base_assumptions(&self, model_id: i64) -> Result<Option<Assumptions>, sqlx::Error> {
        sqlx::query_as::<_, Assumptions>(
            "SELECT * FROM assumptions WHERE model_id = ? AND scenario_id IS NULL",
        )
        .bind(model_id)
        .fetch_optional(self.db.pool())
        .await
    }

    pub async fn upsert_assumptions(&self, assumptions: &Assumptions) -> Result<i64, sqlx::Error> {
        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM assumptions WHERE model_id = ? AND scenario_id IS ?",
        )
        .bind(assumptions.model_id)
        .bind(assumptions.scenario_id)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some((id,)) = existing {
            sqlx::query(
                r#"
                UPDATE assumptions SET
                    cogs_percent = ?, sm_percent = ?, rd_percent = ?, ga_percent = ?,
                    depreciation_percent = ?, tax_rate = ?, ar_percent = ?, ap_percent = ?,
                    capex_percent = ?, initial_cash = ?
                WHERE id = ?
                "#,
            )
            .bind(assumptions.cogs_percent)
            .bind(assumptions.sm_percent)
            .bind(assumptions.rd_percent)
            .bind(assumptions.ga_percent)
            .bind(assumptions.depreciation_percent)
            .bind(assumptions.tax_rate)
            .bind(assumptions.ar_percent)
            .bind(assumptions.ap_percent)
            .bind(assumptions.capex_percent)
            .bind(assumptions.initial_cash)
            .bind(id)
            .execute(self.db.pool())
            .await?;
            Ok(id)
        } else {
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO assumptions (
                    model_id, scenario_id, cogs_percent, sm_percent, rd_percent, ga_percent,
                    depreciation_percent, tax_rate, ar_percent, ap_percent, capex_percent,
                    initial_cash
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(assumptions.model_id)
            .bind(assumptions.scenario_id)
            .bind(assumptions.cogs_percent)
            .bind(assumptions.sm_percent)
            .bind(assumptions.rd_percent)
            .bind(assumptions.ga_percent)
            .bind(assumptions.depreciation_percent)
            .bind(assumptions.tax_rate)
            .bind(assumptions.ar_percent)
            .bind(assumptions.ap_percent)
            .bind(assumptions.capex_percent)
            .bind(assumptions.initial_cash)
            .fetch_one(self.db.pool())
            .await?;
            Ok(id)
        }
    }

    pub async fn income_rows(&self, model_id: i64) -> Result<Vec<IncomeStatementRow>, sqlx::Error> {
        sqlx::query_as::<_, IncomeStatementRow>(
            "SELECT * FROM income_statement_lines WHERE model_id = ? ORDER BY year",
        )
        .bind(model_id)
        .fetch_all(self.db.pool())
        .await
    }

    pub async fn balance_rows(&self, model_id: i64) -> Result<Vec<BalanceSheetRow>, sqlx::Error> {
        sqlx::query_as::<_, BalanceSheetRow>(
            "SELECT * FROM balance_sheet_lines WHERE model_id = ? ORDER BY year",
        )
        .bind(model_id)
        .fetch_all(self.db.pool())
        .await
    }

    pub async fn cash_flow_rows(&self, model_id: i64) -> Result<Vec<CashFlowRow>, sqlx::Error> {
        sqlx::query_as::<_, CashFlowRow>(
            "SELECT * FROM cash_flow_lines WHERE model_id = ? ORDER BY year",
        )
        .bind(model_id)
        .fetch_all(self.db.pool())
        .await
    }

    /// Seed or correct a statement row directly (used for actuals sourced
    /// from filings).
    pub async fn upsert_income_row(&self, row: &IncomeStatementRow) -> Result<(), sqlx::Error> {
        let mut conn = self.db.pool().acquire().await?;
        sqlx::query("DELETE FROM income_statement_lines WHERE model_id = ? AND year = ?")
            .bind(row.model_id)
            .bind(row.year)
            .execute(&mut *conn)
            .await?;
        insert_income_row(&mut conn, row).await
    }

    pub async fn upsert_balance_row(&self, row: &BalanceSheetRow) -> Result<(), sqlx::Error> {
        let mut conn = self.db.pool().acquire().await?;
        sqlx::query("DELETE FROM balance_sheet_lines WHERE model_id = ? AND year = ?")
            .bind(row.model_id)
            .bind(row.year)
            .execute(&mut *conn)
            .await?;
        insert_balance_row(&mut conn, row).await
    }

    pub async fn upsert_cash_flow_row(&self, row: &CashFlowRow) -> Result<(), sqlx::Error> {
        let mut conn = self.db.pool().acquire().await?;
        sqlx::query("DELETE FROM cash_flow_lines WHERE model_id = ? AND year = ?")
            .bind(row.model_id)
            .bind(row.year)
            .execute(&mut *conn)
            .await?;
        insert_cash_flow_row(&mut conn, row).await
    }

    pub async fn dcf_valuation(&self, model_id: i64) -> Result<Option<DcfValuation>, sqlx::Error> {
        sqlx::query_as::<_, DcfValuation>("SELECT * FROM dcf_valuations WHERE model_id = ?")
            .bind(model_id)
            .fetch_optional(self.db.pool())
            .await
    }

    pub async fn valuation_comparison(
        &self,
        model_id: i64,
    ) -> Result<Option<ValuationComparison>, sqlx::Error> {
        sqlx::query_as::<_, ValuationComparison>(
            "SELECT * FROM valuation_comparisons WHERE model_id = ?",
        )
        .bind(model_id)
        .fetch_optional(self.db.pool())
        .await
    }

    pub async fn scenario_revenues(&self, model_id: i64) -> Result<Vec<ScenarioRevenue>, sqlx::Error> {
        sqlx::query_as::<_, ScenarioRevenue>(
            "SELECT * FROM scenario_revenues WHERE model_id = ? ORDER BY year, scenario",
        )
        .bind(model_id)
        .fetch_all(self.db.pool())
        .await
    }

    pub async fn upsert_scenario_revenues(
        &self,
        rows: &[ScenarioRevenue],
    ) -> Result<(), sqlx::Error> {
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO scenario_revenues (model_id, year, scenario, amount)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(model_id, year, scenario) DO UPDATE SET amount = excluded.amount
                "#,
            )
            .bind(row.model_id)
            .bind(row.year)
            .bind(row.scenario)
            .bind(row.amount)
            .execute(self.db.pool())
            .await?;
        }
        Ok(())
    }

    /// Replace a model's projection in one transaction: delete projected
    /// statement rows, insert the new ones, upsert the valuation rows, and
    /// swap the scenario revenue series. Actual rows are never touched.
    #[allow(clippy::too_many_arguments)]
    pub async fn replace_projection(
        &self,
        model_id: i64,
        income: &[IncomeStatementRow],
        balance: &[BalanceSheetRow],
        cash_flow: &[CashFlowRow],
        dcf: &DcfValuation,
        valuation: &ValuationComparison,
        scenario: &[ScenarioRevenue],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM income_statement_lines WHERE model_id = ? AND is_actual = 0")
            .bind(model_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM balance_sheet_lines WHERE model_id = ? AND is_actual = 0")
            .bind(model_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cash_flow_lines WHERE model_id = ? AND is_actual = 0")
            .bind(model_id)
            .execute(&mut *tx)
            .await?;

        for row in income.iter().filter(|r| !r.is_actual) {
            insert_income_row(&mut *tx, row).await?;
        }
        for row in balance.iter().filter(|r| !r.is_actual) {
            insert_balance_row(&mut *tx, row).await?;
        }
        for row in cash_flow.iter().filter(|r| !r.is_actual) {
            insert_cash_flow_row(&mut *tx, row).await?;
        }

        upsert_dcf_row(&mut *tx, model_id, dcf).await?;
        upsert_comparison_row(&mut *tx, model_id, valuation).await?;

        sqlx::query("DELETE FROM scenario_revenues WHERE model_id = ?")
            .bind(model_id)
            .execute(&mut *tx)
            .await?;
        for row in scenario {
            sqlx::query(
                "INSERT INTO scenario_revenues (model_id, year, scenario, amount) VALUES (?, ?, ?, ?)",
            )
            .bind(row.model_id)
            .bind(row.year)
            .bind(row.scenario)
            .bind(row.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Write user-edited DCF parameters (and any computed fields) directly.
    pub async fn upsert_dcf_valuation(&self, dcf: &DcfValuation) -> Result<(), sqlx::Error> {
        let mut conn = self.db.pool().acquire().await?;
        upsert_dcf_row(&mut conn, dcf.model_id, dcf).await
    }

    /// Write user-edited comparison multiples (and any computed fields)
    /// directly.
    pub async fn upsert_valuation_comparison(
        &self,
        valuation: &ValuationComparison,
    ) -> Result<(), sqlx::Error> {
        let mut conn = self.db.pool().acquire().await?;
        upsert_comparison_row(&mut conn, valuation.model_id, valuation).await
    }
}

async fn upsert_dcf_row(
    conn: &mut SqliteConnection,
    model_id: i64,
    dcf: &DcfValuation,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO dcf_valuations (
            model_id, risk_free_rate, beta, market_return, cost_of_debt, tax_rate,
            equity_weight, debt_weight, long_term_growth, current_price, total_debt,
            cost_of_equity, wacc, npv, terminal_value, discounted_terminal_value,
            target_equity_value, target_price
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(model_id) DO UPDATE SET
            risk_free_rate = excluded.risk_free_rate,
            beta = excluded.beta,
            market_return = excluded.market_return,
            cost_of_debt = excluded.cost_of_debt,
            tax_rate = excluded.tax_rate,
            equity_weight = excluded.equity_weight,
            debt_weight = excluded.debt_weight,
            long_term_growth = excluded.long_term_growth,
            current_price = excluded.current_price,
            total_debt = excluded.total_debt,
            cost_of_equity = excluded.cost_of_equity,
            wacc = excluded.wacc,
            npv = excluded.npv,
            terminal_value = excluded.terminal_value,
            discounted_terminal_value = excluded.discounted_terminal_value,
            target_equity_value = excluded.target_equity_value,
            target_price = excluded.target_price
        "#,
    )
    .bind(model_id)
    .bind(dcf.risk_free_rate)
    .bind(dcf.beta)
    .bind(dcf.market_return)
    .bind(dcf.cost_of_debt)
    .bind(dcf.tax_rate)
    .bind(dcf.equity_weight)
    .bind(dcf.debt_weight)
    .bind(dcf.long_term_growth)
    .bind(dcf.current_price)
    .bind(dcf.total_debt)
    .bind(dcf.cost_of_equity)
    .bind(dcf.wacc)
    .bind(dcf.npv)
    .bind(dcf.terminal_value)
    .bind(dcf.discounted_terminal_value)
    .bind(dcf.target_equity_value)
    .bind(dcf.target_price)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_comparison_row(
    conn: &mut SqliteConnection,
    model_id: i64,
    valuation: &ValuationComparison,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO valuation_comparisons (
            model_id, bull_pr_multiple, base_pr_multiple, bear_pr_multiple,
            bull_peg, base_peg, bear_peg, eps_used, growth_pct_used,
            bull_pr_target, base_pr_target, bear_pr_target,
            bull_pe_target, base_pe_target, bear_pe_target,
            bull_dcf_target, base_dcf_target, bear_dcf_target,
            average_target, percent_to_target
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(model_id) DO UPDATE SET
            bull_pr_multiple = excluded.bull_pr_multiple,
            base_pr_multiple = excluded.base_pr_multiple,
            bear_pr_multiple = excluded.bear_pr_multiple,
            bull_peg = excluded.bull_peg,
            base_peg = excluded.base_peg,
            bear_peg = excluded.bear_peg,
            eps_used = excluded.eps_used,
            growth_pct_used = excluded.growth_pct_used,
            bull_pr_target = excluded.bull_pr_target,
            base_pr_target = excluded.base_pr_target,
            bear_pr_target = excluded.bear_pr_target,
            bull_pe_target = excluded.bull_pe_target,
            base_pe_target = excluded.base_pe_target,
            bear_pe_target = excluded.bear_pe_target,
            bull_dcf_target = excluded.bull_dcf_target,
            base_dcf_target = excluded.base_dcf_target,
            bear_dcf_target = excluded.bear_dcf_target,
            average_target = excluded.average_target,
            percent_to_target = excluded.percent_to_target
        "#,
    )
    .bind(model_id)
    .bind(valuation.bull_pr_multiple)
    .bind(valuation.base_pr_multiple)
    .bind(valuation.bear_pr_multiple)
    .bind(valuation.bull_peg)
    .bind(valuation.base_peg)
    .bind(valuation.bear_peg)
    .bind(valuation.eps_used)
    .bind(valuation.growth_pct_used)
    .bind(valuation.bull_pr_target)
    .bind(valuation.base_pr_target)
    .bind(valuation.bear_pr_target)
    .bind(valuation.bull_pe_target)
    .bind(valuation.base_pe_target)
    .bind(valuation.bear_pe_target)
    .bind(valuation.bull_dcf_target)
    .bind(valuation.base_dcf_target)
    .bind(valuation.bear_dcf_target)
    .bind(valuation.average_target)
    .bind(valuation.percent_to_target)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_income_row(
    conn: &mut SqliteConnection,
    row: &IncomeStatementRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO income_statement_lines (
            model_id, year, is_actual, revenue, cogs, gross_profit, sales_marketing,
            research_development, general_admin, depreciation, total_operating_expenses,
            operating_income, ebitda, other_income, pre_tax_income, income_tax,
            net_income, eps, non_gaap_eps
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(row.model_id)
    .bind(row.year)
    .bind(row.is_actual)
    .bind(row.revenue)
    .bind(row.cogs)
    .bind(row.gross_profit)
    .bind(row.sales_marketing)
    .bind(row.research_development)
    .bind(row.general_admin)
    .bind(row.depreciation)
    .bind(row.total_operating_expenses)
    .bind(row.operating_income)
    .bind(row.ebitda)
    .bind(row.other_income)
    .bind(row.pre_tax_income)
    .bind(row.income_tax)
    .bind(row.net_income)
    .bind(row.eps)
    .bind(row.non_gaap_eps)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_balance_row(
    conn: &mut SqliteConnection,
    row: &BalanceSheetRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO balance_sheet_lines (
            model_id, year, is_actual, cash, short_term_investments, accounts_receivable,
            inventory, total_current_assets, equipment, accumulated_depreciation, capex,
            total_long_term_assets, total_assets, accounts_payable, short_term_debt,
            total_current_liabilities, long_term_debt, total_liabilities, common_shares,
            retained_earnings, total_equity, total_liabilities_and_equity
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(row.model_id)
    .bind(row.year)
    .bind(row.is_actual)
    .bind(row.cash)
    .bind(row.short_term_investments)
    .bind(row.accounts_receivable)
    .bind(row.inventory)
    .bind(row.total_current_assets)
    .bind(row.equipment)
    .bind(row.accumulated_depreciation)
    .bind(row.capex)
    .bind(row.total_long_term_assets)
    .bind(row.total_assets)
    .bind(row.accounts_payable)
    .bind(row.short_term_debt)
    .bind(row.total_current_liabilities)
    .bind(row.long_term_debt)
    .bind(row.total_liabilities)
    .bind(row.common_shares)
    .bind(row.retained_earnings)
    .bind(row.total_equity)
    .bind(row.total_liabilities_and_equity)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_cash_flow_row(
    conn: &mut SqliteConnection,
    row: &CashFlowRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cash_flow_lines (
            model_id, year, is_actual, net_income, depreciation_add_back,
            change_in_receivables, change_in_inventory, change_in_payables,
            operating_cash_flow, capital_expenditures, investing_cash_flow,
            change_in_short_term_debt, change_in_long_term_debt, change_in_common_shares,
            financing_cash_flow, net_change_in_cash, beginning_cash, ending_cash,
            free_cash_flow
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(row.model_id)
    .bind(row.year)
    .bind(row.is_actual)
    .bind(row.net_income)
    .bind(row.depreciation_add_back)
    .bind(row.change_in_receivables)
    .bind(row.change_in_inventory)
    .bind(row.change_in_payables)
    .bind(row.operating_cash_flow)
    .bind(row.capital_expenditures)
    .bind(row.investing_cash_flow)
    .bind(row.change_in_short_term_debt)
    .bind(row.change_in_long_term_debt)
    .bind(row.change_in_common_shares)
    .bind(row.financing_cash_flow)
    .bind(row.net_change_in_cash)
    .bind(row.beginning_cash)
    .bind(row.ending_cash)
    .bind(row.free_cash_flow)
    .execute(conn)
    .await?;
    Ok(())
}
