//! Per-model token pricing.

use std::collections::HashMap;

use crate::config::schema::ModelConfig;

/// Currency assumed when a pricing entry does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Resolved per-million-token pricing for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub prompt_per_1m: f64,
    pub completion_per_1m: f64,
    pub currency: String,
}

impl ModelPricing {
    /// Cost of a request in `self.currency`.
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 * self.prompt_per_1m
            + completion_tokens as f64 * self.completion_per_1m)
            / 1_000_000.0
    }
}

/// Model name → pricing, built once per configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Build from the `models` section. Entries with both rates at zero are
    /// treated as unpriced.
    pub fn from_models(models: &HashMap<String, ModelConfig>) -> Self {
        let entries = models
            .iter()
            .filter_map(|(name, params)| {
                let pricing = params.pricing.as_ref()?;
                if pricing.prompt_per_1m == 0.0 && pricing.completion_per_1m == 0.0 {
                    return None;
                }
                let currency = pricing
                    .currency
                    .clone()
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
                Some((
                    name.clone(),
                    ModelPricing {
                        prompt_per_1m: pricing.prompt_per_1m,
                        completion_per_1m: pricing.completion_per_1m,
                        currency,
                    },
                ))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.entries.get(model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
