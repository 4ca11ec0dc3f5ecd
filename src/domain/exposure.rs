//! Exposure summaries of a weight vector, overall and per country.

use std::collections::BTreeMap;

use super::portfolio::Weights;
use super::universe::Universe;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExposureSummary {
    pub long: f64,
    pub short: f64,
    pub gross: f64,
    pub net: f64,
}

impl ExposureSummary {
    pub fn from_weights(weights: &Weights) -> Self {
        let long: f64 = weights.values().filter(|w| **w > 0.0).sum();
        let short: f64 = weights.values().filter(|w| **w < 0.0).map(|w| -w).sum();
        ExposureSummary {
            long,
            short,
            gross: long + short,
            net: long - short,
        }
    }
}

/// Net weight per country. Symbols missing from the universe are grouped
/// under `"Unknown"`.
pub fn country_exposure(weights: &Weights, universe: &Universe) -> BTreeMap<String, f64> {
    let mut by_country = BTreeMap::new();
    for (symbol, w) in weights {
        if *w == 0.0 {
            continue;
        }
        let country = universe.country_of(symbol).unwrap_or("Unknown");
        *by_country.entry(country.to_string()).or_insert(0.0) += w;
    }
    by_country
}

/// Countries sorted by |net exposure| descending, then name.
pub fn ranked_country_exposure(weights: &Weights, universe: &Universe) -> Vec<(String, f64)> {
    let mut ranked: Vec<_> = country_exposure(weights, universe).into_iter().collect();
    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::universe::Instrument;

    fn weights(pairs: &[(&str, f64)]) -> Weights {
        pairs.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    #[test]
    fn summary_splits_long_and_short() {
        let s = ExposureSummary::from_weights(&weights(&[("A", 0.04), ("B", -0.01), ("C", 0.02)]));
        assert!((s.long - 0.06).abs() < 1e-12);
        assert!((s.short - 0.01).abs() < 1e-12);
        assert!((s.gross - 0.07).abs() < 1e-12);
        assert!((s.net - 0.05).abs() < 1e-12);
    }

    #[test]
    fn country_exposure_aggregates_instruments() {
        let universe = Universe::from_instruments(vec![
            Instrument::new("EWJ", "Japan"),
            Instrument::new("DXJ", "Japan"),
            Instrument::new("EWZ", "Brazil"),
        ])
        .unwrap();
        let w = weights(&[("EWJ", 0.03), ("DXJ", 0.01), ("EWZ", -0.05), ("XXX", 0.01)]);

        let exposure = country_exposure(&w, &universe);
        assert!((exposure["Japan"] - 0.04).abs() < 1e-12);
        assert!((exposure["Brazil"] + 0.05).abs() < 1e-12);
        assert!((exposure["Unknown"] - 0.01).abs() < 1e-12);

        let ranked = ranked_country_exposure(&w, &universe);
        assert_eq!(ranked[0].0, "Brazil");
        assert_eq!(ranked[1].0, "Japan");
    }
}
