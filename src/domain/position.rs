//! Account positions.

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    /// Signed share count; negative for a short.
    pub quantity: f64,
    /// Signed market value; negative for a short.
    pub market_value: f64,
}

impl Position {
    pub fn new(symbol: &str, quantity: f64, market_value: f64) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity,
            market_value,
        }
    }

    pub fn is_long(&self) -> bool {
        self.market_value > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.market_value < 0.0
    }

    /// Fraction of `portfolio_value` held in this position.
    pub fn weight(&self, portfolio_value: f64) -> f64 {
        if portfolio_value == 0.0 {
            return 0.0;
        }
        self.market_value / portfolio_value
    }
}
