use harvester_core::{update, FeedMsg, FeedPhase, FeedRun, FetchSignal};

#[test]
fn out_of_phase_messages_are_ignored() {
    let run = FeedRun::new("feed", 5, 3);
    let (next, effects) = update(
        run.clone(),
        FeedMsg::PageFetched {
            signal: FetchSignal::Ok,
        },
    );

    assert_eq!(run, next);
    assert!(effects.is_empty());
    assert_eq!(next.phase(), &FeedPhase::Init);
}
