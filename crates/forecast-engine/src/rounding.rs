/// Round a monetary amount to whole currency units.
pub(crate) fn round_money(value: f64) -> f64 {
    value.round()
}

/// Round a per-share figure (EPS, price targets) to two decimals.
pub(crate) fn round_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
