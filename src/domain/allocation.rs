//! Capital allocation across buy candidates.
//!
//! Reserves a configured fraction of cash, then divides the spendable pool
//! evenly across candidates, dropping any candidate whose price exceeds its
//! even share and redividing until a fixed point. Each pass removes at least
//! one candidate or terminates, so the loop runs at most N passes.

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::error::SwingtraderError;

/// How buy candidates are ordered before submission. A required config
/// value, not a hidden default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrdering {
    DescendingPrice,
    AscendingPrice,
    Randomized,
}

impl CandidateOrdering {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "descending-price" => Some(CandidateOrdering::DescendingPrice),
            "ascending-price" => Some(CandidateOrdering::AscendingPrice),
            "randomized" => Some(CandidateOrdering::Randomized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyCandidate {
    pub symbol: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub symbol: String,
    pub budget: f64,
}

/// Per-cycle budget plan. Computed once, consumed immediately by the buy
/// phase; never persisted across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    pub spendable: f64,
}

impl AllocationPlan {
    pub fn total_spend(&self) -> f64 {
        self.allocations.iter().map(|a| a.budget).sum()
    }
}

/// Truncate toward zero at `places` decimal places.
pub fn truncate(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places as i32);
    (value * scale).trunc() / scale
}

/// Order candidates in place per the configured strategy.
pub fn order_candidates<R: Rng>(
    candidates: &mut [BuyCandidate],
    ordering: CandidateOrdering,
    rng: &mut R,
) {
    match ordering {
        CandidateOrdering::DescendingPrice => candidates.sort_by(|a, b| {
            b.price
                .partial_cmp(&a.price)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        }),
        CandidateOrdering::AscendingPrice => candidates.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        }),
        CandidateOrdering::Randomized => candidates.shuffle(rng),
    }
}

/// Allocate `cash` across `candidates`.
///
/// Fails with `InsufficientBudget` when the shrinking loop empties the
/// candidate set, or when the final even share truncates to a non-positive
/// amount; in either case no partial plan is returned.
pub fn allocate<R: Rng>(
    mut candidates: Vec<BuyCandidate>,
    cash: f64,
    reserve_fraction: f64,
    decimal_places: u32,
    ordering: CandidateOrdering,
    rng: &mut R,
) -> Result<AllocationPlan, SwingtraderError> {
    let spendable = cash * (1.0 - reserve_fraction);

    if candidates.is_empty() {
        return Err(SwingtraderError::InsufficientBudget {
            spendable,
            candidates: 0,
        });
    }

    order_candidates(&mut candidates, ordering, rng);

    // Converging loop: removing an unaffordable candidate raises the even
    // share for everyone else, so affordability must be re-checked until no
    // further removals occur.
    loop {
        let share = spendable / candidates.len() as f64;
        let before = candidates.len();
        candidates.retain(|c| c.price <= share);

        if candidates.is_empty() {
            return Err(SwingtraderError::InsufficientBudget {
                spendable,
                candidates: before,
            });
        }
        if candidates.len() == before {
            break;
        }
    }

    let share = truncate(spendable / candidates.len() as f64, decimal_places);
    if share <= 0.0 {
        return Err(SwingtraderError::InsufficientBudget {
            spendable,
            candidates: candidates.len(),
        });
    }

    let allocations = candidates
        .into_iter()
        .map(|c| Allocation {
            symbol: c.symbol,
            budget: share,
        })
        .collect();

    Ok(AllocationPlan {
        allocations,
        spendable,
    })
}
