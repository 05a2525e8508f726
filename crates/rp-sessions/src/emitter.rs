//! The per-session segment emitter: reads `final_segments`
//! in order, sleeps for each segment's `delay_seconds`, and hands the
//! segment to a sink. Cancellable — on supersession any not-yet-emitted
//! segments are discarded, but segments already handed to the sink stay
//! delivered.

use rp_domain::{CancelToken, FinalSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Completed,
    Interrupted { emitted: usize },
}

/// Emit `segments` in order onto `sink`, honoring each segment's delay and
/// checking `cancel` before every sleep and every send.
pub async fn emit_segments<F>(segments: &[FinalSegment], cancel: &CancelToken, mut sink: F) -> EmitOutcome
where
    F: FnMut(&FinalSegment),
{
    for (i, segment) in segments.iter().enumerate() {
        if cancel.is_cancelled() {
            return EmitOutcome::Interrupted { emitted: i };
        }
        if segment.delay_seconds > 0.0 {
            tokio::select! {
                biased;
                _ = wait_for_cancel(cancel) => {
                    return EmitOutcome::Interrupted { emitted: i };
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs_f32(segment.delay_seconds)) => {}
            }
        }
        if cancel.is_cancelled() {
            return EmitOutcome::Interrupted { emitted: i };
        }
        sink(segment);
    }
    EmitOutcome::Completed
}

async fn wait_for_cancel(cancel: &CancelToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_domain::SegmentAction;

    fn seg(content: &str, delay: f32) -> FinalSegment {
        FinalSegment {
            content: content.into(),
            delay_seconds: delay,
            action: if delay > 0.0 { SegmentAction::Typing } else { SegmentAction::Idle },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_all_segments_in_order_when_not_cancelled() {
        let segments = vec![seg("a", 0.0), seg("b", 0.1), seg("c", 0.1)];
        let cancel = CancelToken::new();
        let mut received = Vec::new();
        let outcome = emit_segments(&segments, &cancel, |s| received.push(s.content.clone())).await;
        assert_eq!(outcome, EmitOutcome::Completed);
        assert_eq!(received, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn stops_immediately_when_already_cancelled() {
        let segments = vec![seg("a", 0.0), seg("b", 1.0)];
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut received = Vec::new();
        let outcome = emit_segments(&segments, &cancel, |s| received.push(s.content.clone())).await;
        assert_eq!(outcome, EmitOutcome::Interrupted { emitted: 0 });
        assert!(received.is_empty());
    }
}
