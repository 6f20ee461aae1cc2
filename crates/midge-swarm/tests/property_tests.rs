// Property-based tests for rate distribution and weighted selection
//
// Properties tested:
// 1. Rate shares sum to the configured total
// 2. Rate shares differ by at most one, larger shares first
// 3. The cumulative selection table is monotonic and ends at exactly 1.0
// 4. Every draw in [0, 1] selects some action; 0 selects the first, 1 the last

use std::sync::Arc;

use async_trait::async_trait;
use midge_core::MidgeResult;
use midge_swarm::{distribute_rate, Action, ActionOutcome, ActionSet, ActionTable};
use proptest::prelude::*;

struct Weights;

#[async_trait]
impl ActionSet for Weights {
    fn actions() -> MidgeResult<Vec<Action<Self>>> {
        table_actions(&[1])
    }
}

fn table_actions(weights: &[u32]) -> MidgeResult<Vec<Action<Weights>>> {
    weights
        .iter()
        .enumerate()
        .map(|(index, weight)| {
            Action::new(format!("action-{index}"), *weight, |_: Arc<Weights>| async {
                Ok(ActionOutcome::success(()))
            })
        })
        .collect()
}

// ============================================================================
// Rate distribution
// ============================================================================

proptest! {
    #[test]
    fn prop_rate_shares_sum_to_total(
        total in 1u32..=100_000,
        population in 1usize..=512,
    ) {
        let shares = distribute_rate(total, population);
        prop_assert_eq!(shares.len(), population);
        prop_assert_eq!(shares.iter().map(|s| u64::from(*s)).sum::<u64>(), u64::from(total));
    }

    #[test]
    fn prop_rate_shares_are_balanced(
        total in 1u32..=100_000,
        population in 1usize..=512,
    ) {
        let shares = distribute_rate(total, population);
        let max = *shares.iter().max().unwrap();
        let min = *shares.iter().min().unwrap();
        prop_assert!(max - min <= 1);
        // larger shares go to the first midges
        prop_assert!(shares.windows(2).all(|pair| pair[0] >= pair[1]));
    }
}

// ============================================================================
// Weighted selection
// ============================================================================

proptest! {
    #[test]
    fn prop_cumulative_table_is_monotonic(
        weights in prop::collection::vec(1u32..=1000, 1..20),
    ) {
        let table = ActionTable::new(table_actions(&weights).unwrap()).unwrap();
        let cumulative = table.cumulative();

        prop_assert_eq!(cumulative.len(), weights.len());
        prop_assert!(cumulative.windows(2).all(|pair| pair[0] <= pair[1]));
        prop_assert_eq!(*cumulative.last().unwrap(), 1.0);
    }

    #[test]
    fn prop_every_draw_selects_an_action(
        weights in prop::collection::vec(1u32..=1000, 1..20),
        draw in 0.0f64..=1.0,
    ) {
        let table = ActionTable::new(table_actions(&weights).unwrap()).unwrap();
        let chosen = table.choose(draw);

        let index = table
            .actions()
            .iter()
            .position(|action| action.name() == chosen.name())
            .unwrap();
        // the chosen bucket is the first one reaching the draw
        prop_assert!(table.cumulative()[index] >= draw);
        if index > 0 {
            prop_assert!(table.cumulative()[index - 1] < draw);
        }

        prop_assert_eq!(table.choose(0.0).name(), "action-0");
        let last = format!("action-{}", weights.len() - 1);
        prop_assert_eq!(table.choose(1.0).name(), last.as_str());
    }
}

#[test]
fn test_single_action_set_is_always_selected() {
    let table = ActionTable::new(Weights::actions().unwrap()).unwrap();
    assert_eq!(table.choose(0.0).name(), "action-0");
    assert_eq!(table.choose(0.999).name(), "action-0");
}
