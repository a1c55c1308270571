//! Per-model token pricing

use std::collections::HashMap;

/// Key used for models without an explicit price
pub const DEFAULT_KEY: &str = "default";

/// Built-in per-token prices in USD
const BUILTIN_PRICES: [(&str, f64); 3] = [
    ("gpt-3.5-turbo", 0.002 / 1000.0),
    ("gpt-4", 0.06 / 1000.0),
    (DEFAULT_KEY, 0.01 / 1000.0),
];

/// Price table used to turn token counts into cost
#[derive(Debug, Clone)]
pub struct Pricing {
    prices: HashMap<String, f64>,
}

impl Default for Pricing {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl Pricing {
    /// Build the table from the built-in prices plus configured overrides
    pub fn new(overrides: &HashMap<String, f64>) -> Self {
        let mut prices: HashMap<String, f64> = BUILTIN_PRICES
            .iter()
            .map(|(model, price)| (model.to_string(), *price))
            .collect();
        prices.extend(overrides.iter().map(|(model, price)| (model.clone(), *price)));
        Self { prices }
    }

    /// Per-token price for a model
    pub fn price_per_token(&self, model: &str) -> f64 {
        self.prices
            .get(model)
            .or_else(|| self.prices.get(DEFAULT_KEY))
            .copied()
            .unwrap_or(0.0)
    }

    /// Cost in USD of `tokens` tokens on `model`
    pub fn calculate_cost(&self, model: &str, tokens: u64) -> f64 {
        tokens as f64 * self.price_per_token(model)
    }
}
