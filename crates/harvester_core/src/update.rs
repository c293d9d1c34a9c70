use crate::{
    AbortKind, FeedEffect, FeedMsg, FeedPhase, FeedRun, FetchSignal, PageVerdict, TerminalReason,
};

/// Pure update function: applies a message to a feed run and returns the effects to execute.
///
/// Messages that do not fit the current phase are ignored. A terminal run never
/// produces further effects.
pub fn update(mut run: FeedRun, msg: FeedMsg) -> (FeedRun, Vec<FeedEffect>) {
    if run.is_terminal() {
        return (run, Vec::new());
    }

    let effects = match (run.phase().clone(), msg) {
        (_, FeedMsg::CancelObserved(kind)) => finish(&mut run, TerminalReason::Cancelled(kind)),
        (FeedPhase::Init, FeedMsg::Start) => vec![FeedEffect::AcquireSession],
        (FeedPhase::Init, FeedMsg::SessionReady) => {
            run.set_phase(FeedPhase::Fetching);
            vec![FeedEffect::FetchPage(run.cursor().clone())]
        }
        (FeedPhase::Init, FeedMsg::SessionUnavailable) => {
            abort(&mut run, AbortKind::SessionInvalid)
        }
        (FeedPhase::Fetching, FeedMsg::PageFetched { signal }) => {
            run.record_page_fetched();
            match signal {
                FetchSignal::Ok => {
                    run.set_phase(FeedPhase::Evaluating);
                    vec![FeedEffect::EvaluatePage]
                }
                FetchSignal::NoMorePages => finish(&mut run, TerminalReason::NoMorePages),
                FetchSignal::Malformed => finish(&mut run, TerminalReason::MalformedPage),
                FetchSignal::RateLimited => abort(&mut run, AbortKind::RateLimited),
                FetchSignal::SessionInvalid => abort(&mut run, AbortKind::SessionInvalid),
            }
        }
        (FeedPhase::Evaluating, FeedMsg::PageEvaluated { state, verdict }) => {
            run.set_stop_state(state);
            match verdict {
                PageVerdict::Stop(cause) => finish(&mut run, cause.into()),
                PageVerdict::Continue => {
                    if run.advance() {
                        run.set_phase(FeedPhase::Fetching);
                        vec![FeedEffect::FetchPage(run.cursor().clone())]
                    } else {
                        finish(&mut run, TerminalReason::MaxPages)
                    }
                }
            }
        }
        _ => Vec::new(),
    };

    (run, effects)
}

fn finish(run: &mut FeedRun, reason: TerminalReason) -> Vec<FeedEffect> {
    run.set_phase(FeedPhase::Terminal(reason));
    vec![FeedEffect::Complete(reason)]
}

fn abort(run: &mut FeedRun, kind: AbortKind) -> Vec<FeedEffect> {
    let reason = match kind {
        AbortKind::RateLimited => TerminalReason::RateLimited,
        AbortKind::SessionInvalid => TerminalReason::SessionInvalid,
    };
    run.set_phase(FeedPhase::Terminal(reason));
    vec![FeedEffect::AbortRun(kind), FeedEffect::Complete(reason)]
}
