//! Portfolio construction: scores in, constrained target weights out.
//!
//! The pipeline is fixed:
//!
//! 1. rank scored instruments (score descending, symbol ascending on ties);
//! 2. assign demeaned-rank weights scaled to the gross exposure limit, tied
//!    scores sharing their average rank;
//! 3. long-only: clip negatives and renormalise the positives;
//! 4. cap every |weight| at `max_weight`, redistributing the excess;
//! 5. scale the delta against current holdings down to the turnover cap.
//!
//! Step 5 scales the whole delta vector uniformly, so every trade keeps its
//! direction and relative size. Held instruments without a score are targeted
//! at zero and exit through the same turnover budget.

use tracing::{debug, info, warn};

use super::constraints::Constraints;
use super::error::RebalanceError;
use super::portfolio::{AccountState, TargetWeights, Weights};
use super::score::Scores;

/// Slack allowed when comparing weights against their bounds.
pub const WEIGHT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Optimiser {
    constraints: Constraints,
}

impl Optimiser {
    pub fn new(constraints: Constraints) -> Self {
        Optimiser { constraints }
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn generate_optimal_portfolio(
        &self,
        state: &AccountState,
        scores: &Scores,
    ) -> Result<TargetWeights, RebalanceError> {
        state.validate()?;

        let ranked = rank_scores(scores);
        if ranked.is_empty() {
            return Err(RebalanceError::InsufficientData {
                reason: "no usable scores for this period".to_string(),
            });
        }
        debug!(instruments = ranked.len(), "ranked scored universe");

        let c = &self.constraints;
        let mut target = rank_weights(&ranked, c.gross_exposure);
        if !c.long_short {
            clip_and_renormalise(&mut target, c.gross_exposure);
        }
        cap_weights(&mut target, c.max_weight);

        for symbol in state.weights.keys() {
            target.entry(symbol.clone()).or_insert(0.0);
        }

        let weights = self.limit_turnover(&state.weights, &target)?;
        Ok(TargetWeights::new(weights))
    }

    fn limit_turnover(&self, current: &Weights, target: &Weights) -> Result<Weights, RebalanceError> {
        let c = &self.constraints;
        let turnover: f64 = target
            .iter()
            .map(|(s, t)| (t - current.get(s).copied().unwrap_or(0.0)).abs())
            .sum();

        let scale = if turnover > c.turnover_cap {
            c.turnover_cap / turnover
        } else {
            1.0
        };

        if let Some((symbol, required)) = self.required_step(current, target) {
            if required > scale + WEIGHT_EPSILON {
                return Err(RebalanceError::InfeasibleConstraint {
                    reason: format!(
                        "{symbol} is outside its weight bounds and needs turnover {:.6}, cap is {:.6}",
                        required * turnover,
                        c.turnover_cap
                    ),
                });
            }
        }

        if scale < 1.0 {
            info!(
                turnover,
                cap = c.turnover_cap,
                scale,
                "scaling rebalance delta to turnover cap"
            );
        }

        let weights = target
            .iter()
            .map(|(symbol, t)| {
                let cur = current.get(symbol).copied().unwrap_or(0.0);
                let mut w = cur + (t - cur) * scale;
                if !c.long_short && w < 0.0 && w > -WEIGHT_EPSILON {
                    w = 0.0;
                }
                (symbol.clone(), w)
            })
            .collect();
        Ok(weights)
    }

    /// Largest fraction of the delta needed to bring an out-of-bounds current
    /// weight back inside the feasible set, with the symbol that needs it.
    fn required_step<'a>(&self, current: &'a Weights, target: &Weights) -> Option<(&'a str, f64)> {
        let c = &self.constraints;
        let mut worst: Option<(&str, f64)> = None;

        for (symbol, &cur) in current {
            let t = target.get(symbol).copied().unwrap_or(0.0);
            let step = if !c.long_short && cur < -WEIGHT_EPSILON {
                -cur / (t - cur)
            } else if cur.abs() > c.max_weight + WEIGHT_EPSILON {
                (cur.abs() - c.max_weight) / (cur - t).abs()
            } else {
                continue;
            };
            if worst.is_none_or(|(_, w)| step > w) {
                worst = Some((symbol.as_str(), step));
            }
        }

        worst
    }
}

/// Finite scores ordered best first: score descending, then symbol ascending.
fn rank_scores(scores: &Scores) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = scores
        .iter()
        .filter(|(symbol, score)| {
            if score.is_finite() {
                true
            } else {
                warn!(%symbol, "dropping non-finite score");
                false
            }
        })
        .map(|(s, v)| (s.as_str(), *v))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

/// Demeaned ranks scaled so Σ|w| equals `gross`. The best instrument gets the
/// largest weight and tied scores share their average rank.
///
/// With no spread left to rank (a lone instrument, or every score tied) each
/// instrument takes an equal share of `gross` in the direction of its score,
/// and a zero score gets no weight.
fn rank_weights(ranked: &[(&str, f64)], gross: f64) -> Weights {
    let n = ranked.len();
    let mid = (n as f64 + 1.0) / 2.0;
    let mut raw = vec![0.0; n];

    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && ranked[end].1 == ranked[start].1 {
            end += 1;
        }
        // positions start..end hold ranks n - start down to n - end + 1
        let average = (2 * n + 1 - start - end) as f64 / 2.0;
        for r in &mut raw[start..end] {
            *r = average - mid;
        }
        start = end;
    }

    let total: f64 = raw.iter().map(|r| r.abs()).sum();
    if total == 0.0 {
        let share = gross / n as f64;
        return ranked
            .iter()
            .map(|(symbol, score)| {
                let w = if *score > 0.0 {
                    share
                } else if *score < 0.0 {
                    -share
                } else {
                    0.0
                };
                (symbol.to_string(), w)
            })
            .collect();
    }

    ranked
        .iter()
        .zip(raw)
        .map(|((symbol, _), r)| (symbol.to_string(), r * gross / total))
        .collect()
}

/// Zero out shorts and scale the longs back up to `gross`, keeping their
/// relative proportions.
fn clip_and_renormalise(weights: &mut Weights, gross: f64) {
    let mut long_total = 0.0;
    for w in weights.values_mut() {
        if *w < 0.0 {
            *w = 0.0;
        }
        long_total += *w;
    }
    if long_total <= 0.0 {
        return;
    }
    for w in weights.values_mut() {
        *w *= gross / long_total;
    }
}

/// Cap |w| at `cap`, handing the clipped excess to uncapped non-zero weights
/// in proportion to their size until none is left or everything is capped.
fn cap_weights(weights: &mut Weights, cap: f64) {
    for _ in 0..=weights.len() {
        let mut excess = 0.0;
        for w in weights.values_mut() {
            if w.abs() > cap {
                excess += w.abs() - cap;
                *w = cap.copysign(*w);
            }
        }

        let free_total: f64 = weights
            .values()
            .filter(|w| **w != 0.0 && w.abs() < cap)
            .map(|w| w.abs())
            .sum();
        if excess <= WEIGHT_EPSILON || free_total <= 0.0 {
            break;
        }

        for w in weights.values_mut() {
            if *w != 0.0 && w.abs() < cap {
                *w += excess * (w.abs() / free_total) * w.signum();
            }
        }
    }

    for w in weights.values_mut() {
        *w = w.clamp(-cap, cap);
    }
}
