//! FinalValidator.

use rp_domain::{FinalSegment, SegmentAction};

pub const APOLOGY_FALLBACK: &str = "抱歉，我刚才走神了。";

pub struct Requirements {
    pub max_messages: usize,
    pub min_first_len: usize,
}

/// Enforce `len(final_segments) <= max_messages` (merging tail segments
/// into the last allowed one), `final_segments[0].delay_seconds == 0`
/// (P6 — guaranteed here by construction), and non-empty content after
/// merge (falling back to the static apology otherwise).
pub fn validate(mut segments: Vec<FinalSegment>, requirements: &Requirements) -> Vec<FinalSegment> {
    if segments.is_empty() {
        return vec![apology()];
    }

    if segments.len() > requirements.max_messages && requirements.max_messages > 0 {
        let tail = segments.split_off(requirements.max_messages - 1);
        let merged_content = tail
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let last_delay = segments.last().map(|s| s.delay_seconds).unwrap_or(0.0);
        segments.push(FinalSegment {
            content: merged_content,
            delay_seconds: last_delay,
            action: if last_delay > 0.0 { SegmentAction::Typing } else { SegmentAction::Idle },
        });
    }

    if segments.len() >= 2 {
        let first_len = segments[0].content.chars().count();
        if first_len < requirements.min_first_len {
            let second = segments.remove(1);
            segments[0].content.push(' ');
            segments[0].content.push_str(&second.content);
        }
    }

    segments.retain(|s| !s.content.trim().is_empty());
    if segments.is_empty() {
        return vec![apology()];
    }

    if let Some(first) = segments.first_mut() {
        first.delay_seconds = 0.0;
        first.action = SegmentAction::Idle;
    }

    segments
}

fn apology() -> FinalSegment {
    FinalSegment {
        content: APOLOGY_FALLBACK.to_owned(),
        delay_seconds: 0.0,
        action: SegmentAction::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(content: &str, delay: f32) -> FinalSegment {
        FinalSegment { content: content.into(), delay_seconds: delay, action: SegmentAction::Typing }
    }

    #[test]
    fn merges_tail_when_over_max_messages() {
        let segments = vec![seg("a", 0.0), seg("b", 1.0), seg("c", 1.0), seg("d", 1.0)];
        let out = validate(segments, &Requirements { max_messages: 2, min_first_len: 0 });
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].content, "b c d");
    }

    #[test]
    fn merges_first_two_when_first_too_short() {
        let segments = vec![seg("hi", 0.0), seg("there, how are you", 1.0)];
        let out = validate(segments, &Requirements { max_messages: 4, min_first_len: 10 });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "hi there, how are you");
    }

    #[test]
    fn empty_segments_fall_back_to_apology() {
        let out = validate(vec![], &Requirements { max_messages: 4, min_first_len: 0 });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, APOLOGY_FALLBACK);
    }

    #[test]
    fn first_segment_always_has_zero_delay() {
        let segments = vec![seg("a", 2.0), seg("b", 1.0)];
        let out = validate(segments, &Requirements { max_messages: 4, min_first_len: 0 });
        assert_eq!(out[0].delay_seconds, 0.0);
    }
}
