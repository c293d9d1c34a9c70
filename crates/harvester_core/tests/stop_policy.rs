use std::sync::Once;

use harvester_core::{
    ItemFacts, ItemObservation, ItemVerdict, PageVerdict, StopCause, StopPolicy, StopState,
    DEFAULT_MAX_CONSECUTIVE_EXISTING,
};
use pretty_assertions::assert_eq;

const CUTOFF: i64 = 1_700_000_000;
const DAY: i64 = 86_400;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn policy() -> StopPolicy {
    StopPolicy::new(CUTOFF, DEFAULT_MAX_CONSECUTIVE_EXISTING)
}

fn fresh(published_at_unix: i64) -> ItemFacts {
    ItemFacts {
        published_at_unix,
        exists_with_body: false,
    }
}

fn existing(published_at_unix: i64) -> ItemFacts {
    ItemFacts {
        published_at_unix,
        exists_with_body: true,
    }
}

struct PageRun {
    state: StopState,
    observations: Vec<ItemObservation>,
    verdict: PageVerdict,
}

/// Feeds a newest-first page item by item, as the orchestrator does.
fn run_page(policy: &StopPolicy, mut state: StopState, items: &[ItemFacts]) -> PageRun {
    let mut observations = Vec::new();
    for facts in items {
        let observation = policy.observe(&mut state, facts);
        observations.push(observation);
        if observation.ends_page {
            break;
        }
    }
    PageRun {
        verdict: policy.close_page(&state),
        state,
        observations,
    }
}

#[test]
fn duplicate_streak_stops_before_later_items_are_evaluated() {
    init_logging();
    let page = [
        existing(CUTOFF + 5 * DAY),
        existing(CUTOFF + 4 * DAY),
        existing(CUTOFF + 3 * DAY),
        fresh(CUTOFF + 2 * DAY),
        fresh(CUTOFF + DAY),
    ];

    let eval = run_page(&policy(), StopState::default(), &page);

    let verdicts: Vec<_> = eval.observations.iter().map(|o| o.verdict).collect();
    assert_eq!(
        verdicts,
        vec![
            ItemVerdict::SkipDuplicate,
            ItemVerdict::SkipDuplicate,
            ItemVerdict::SkipDuplicate,
        ]
    );
    assert_eq!(eval.verdict, PageVerdict::Stop(StopCause::DuplicateStreak));
    assert_eq!(eval.state.consecutive_duplicates, 3);
}

#[test]
fn new_item_resets_streak() {
    init_logging();
    let page = [
        existing(CUTOFF + 5 * DAY),
        existing(CUTOFF + 4 * DAY),
        fresh(CUTOFF + 3 * DAY),
        existing(CUTOFF + 2 * DAY),
    ];

    let eval = run_page(&policy(), StopState::default(), &page);

    assert_eq!(eval.observations.len(), 4);
    assert_eq!(eval.state.consecutive_duplicates, 1);
    assert_eq!(eval.verdict, PageVerdict::Continue);
}

#[test]
fn streak_carries_across_pages() {
    init_logging();
    let policy = policy();
    let first = run_page(
        &policy,
        StopState::default(),
        &[fresh(CUTOFF + 9 * DAY), existing(CUTOFF + 8 * DAY), existing(CUTOFF + 7 * DAY)],
    );
    assert_eq!(first.verdict, PageVerdict::Continue);

    let second = run_page(&policy, first.state, &[existing(CUTOFF + 6 * DAY), fresh(CUTOFF)]);
    assert_eq!(second.observations.len(), 1);
    assert_eq!(second.verdict, PageVerdict::Stop(StopCause::DuplicateStreak));
}

#[test]
fn caught_up_requires_both_date_axes() {
    init_logging();
    let policy = policy();

    let only_below = run_page(&policy, StopState::default(), &[fresh(CUTOFF - DAY)]);
    assert!(only_below.state.below_cutoff_seen);
    assert!(!only_below.state.found_in_window_date);
    assert_eq!(only_below.verdict, PageVerdict::Continue);

    let then_in_window = run_page(&policy, only_below.state, &[fresh(CUTOFF)]);
    assert_eq!(then_in_window.verdict, PageVerdict::Stop(StopCause::CaughtUp));
}

#[test]
fn window_only_page_keeps_going() {
    init_logging();
    let page = [fresh(CUTOFF + 3 * DAY), fresh(CUTOFF + 2 * DAY), fresh(CUTOFF)];
    let eval = run_page(&policy(), StopState::default(), &page);

    assert!(eval.observations.iter().all(|o| o.should_persist()));
    assert_eq!(eval.verdict, PageVerdict::Continue);
}

#[test]
fn below_cutoff_items_are_accepted_but_not_persisted() {
    init_logging();
    let mut state = StopState::default();
    let observation = policy().observe(&mut state, &fresh(CUTOFF - 1));

    assert_eq!(observation.verdict, ItemVerdict::Accept);
    assert!(!observation.in_window);
    assert!(!observation.ends_page);
    assert!(!observation.should_persist());
}

#[test]
fn zero_threshold_is_treated_as_one() {
    init_logging();
    let policy = StopPolicy::new(CUTOFF, 0);
    let eval = run_page(
        &policy,
        StopState::default(),
        &[existing(CUTOFF + DAY), fresh(CUTOFF + DAY)],
    );
    assert_eq!(eval.observations.len(), 1);
    assert_eq!(eval.verdict, PageVerdict::Stop(StopCause::DuplicateStreak));
}
