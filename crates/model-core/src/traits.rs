use crate::BalanceSheetRow;

/// Seam for the balance-sheet cash plug.
///
/// The production implementation is residual cash balancing: cash is solved
/// as whatever makes total assets equal total liabilities and equity, rather
/// than being carried over from the cash-flow statement. A cash-flow-driven
/// balance can replace it behind this trait without touching the projector.
pub trait CashBalancer: Send + Sync {
    /// Solve the cash line for a row whose other components are already set.
    fn solve_cash(&self, row: &BalanceSheetRow) -> f64;
}
