//! Segment Processor: turn a `ReplyPlan` into `final_segments`.

use rand::Rng;
use rp_domain::{
    BigFive, FinalSegment, MoodState, RelationshipStage, RelationshipState, ReplyPlan,
    SegmentAction, SegmentDraft,
};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};

pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// `fragmentation_tendency = clamp01(0.4*extraversion + 0.4*closeness + 0.2*arousal)`.
pub fn fragmentation_tendency(big_five: &BigFive, relationship: &RelationshipState, mood: &MoodState) -> f32 {
    clamp01(0.4 * big_five.extraversion + 0.4 * relationship.closeness + 0.2 * mood.arousal)
}

/// `split_threshold_chars = clamp(round(45 - 40*fragmentation_tendency), 5, 60)`.
pub fn split_threshold_chars(fragmentation_tendency: f32) -> usize {
    let raw = (45.0 - 40.0 * fragmentation_tendency).round();
    raw.clamp(5.0, 60.0) as usize
}

const SENTENCE_ENDERS: [char; 3] = ['。', '!', '?'];

/// Rule-split path: break a single long reply into bubbles at newlines
/// unconditionally, and at sentence enders once the running buffer is at
/// least `split_threshold_chars` long.
pub fn rule_split(text: &str, split_threshold_chars: usize, min_bubble_length: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut buffer = String::new();

    for ch in text.chars() {
        buffer.push(ch);
        if ch == '\n' {
            let trimmed = buffer.trim_end_matches('\n').to_string();
            if !trimmed.is_empty() {
                segments.push(trimmed);
            }
            buffer.clear();
        } else if SENTENCE_ENDERS.contains(&ch) && buffer.chars().count() >= split_threshold_chars {
            segments.push(buffer.clone());
            buffer.clear();
        }
    }
    if !buffer.trim().is_empty() {
        segments.push(buffer);
    }

    let filtered: Vec<String> = segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().count() >= min_bubble_length)
        .collect();

    if filtered.is_empty() {
        vec![text.trim().to_string()]
    } else {
        filtered
    }
}

/// `delay_seconds` for the i-th segment: 0 for the first, otherwise
/// `max(1.0, content_length * typing_rate * (1 - busyness))`.
pub fn segment_delay(index: usize, content: &str, typing_rate: f32, busyness: f32) -> f32 {
    if index == 0 {
        return 0.0;
    }
    let len = content.chars().count() as f32;
    (len * typing_rate * (1.0 - busyness)).max(1.0)
}

pub fn segments_from_rule_split(
    text: &str,
    big_five: &BigFive,
    relationship: &RelationshipState,
    mood: &MoodState,
    typing_rate: f32,
    min_bubble_length: usize,
) -> Vec<FinalSegment> {
    let frag = fragmentation_tendency(big_five, relationship, mood);
    let threshold = split_threshold_chars(frag);
    let pieces = rule_split(text, threshold, min_bubble_length);
    pieces
        .iter()
        .enumerate()
        .map(|(i, content)| {
            let delay = segment_delay(i, content, typing_rate, mood.busyness);
            FinalSegment {
                content: content.clone(),
                delay_seconds: delay,
                action: if delay > 0.0 { SegmentAction::Typing } else { SegmentAction::Idle },
            }
        })
        .collect()
}

fn segments_from_plan(plan: &ReplyPlan) -> Vec<FinalSegment> {
    plan.messages
        .iter()
        .map(|m: &SegmentDraft| {
            let delay = m.delay_seconds.unwrap_or(0.0);
            FinalSegment {
                content: m.content.clone(),
                delay_seconds: delay,
                action: if delay > 0.0 { SegmentAction::Typing } else { SegmentAction::Idle },
            }
        })
        .collect()
}

/// `P_macro(stage, busyness)`: probability of substituting a single
/// macro-delay record for normal segments.
pub fn macro_delay_probability(stage: RelationshipStage, busyness: f32) -> f32 {
    if busyness > 0.85 {
        return 1.0;
    }
    match stage {
        RelationshipStage::Avoiding | RelationshipStage::Terminating => 0.8,
        RelationshipStage::Stagnating => 0.5,
        _ => 0.0,
    }
}

pub fn roll_macro_delay(stage: RelationshipStage, busyness: f32) -> Option<f32> {
    let p = macro_delay_probability(stage, busyness);
    if p <= 0.0 {
        return None;
    }
    let mut rng = rand::thread_rng();
    if rng.gen::<f32>() < p {
        Some(rng.gen_range(1800.0..=7200.0))
    } else {
        None
    }
}

pub struct SegmentProcessor<'a> {
    invoker: &'a dyn Invoker,
    typing_rate: f32,
    min_bubble_length: usize,
}

impl<'a> SegmentProcessor<'a> {
    pub fn new(invoker: &'a dyn Invoker, typing_rate: f32, min_bubble_length: usize) -> Self {
        Self { invoker, typing_rate, min_bubble_length }
    }

    /// Pass-through path when `reply_plan` already carries explicit
    /// per-message delays (skip the `processor` invoker call in that
    /// case, per DESIGN.md). Otherwise try the
    /// `processor` role once, falling back to the deterministic rule-split
    /// path on any invoker or parse failure.
    pub async fn process(
        &self,
        reply_plan: &ReplyPlan,
        big_five: &BigFive,
        relationship: &RelationshipState,
        mood: &MoodState,
        cancel: &rp_domain::CancelToken,
    ) -> (Vec<FinalSegment>, Option<rp_domain::StageError>) {
        if reply_plan.is_pre_segmented() {
            return (segments_from_plan(reply_plan), None);
        }

        let joined: String = reply_plan
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        match self.try_processor_role(&joined, cancel).await {
            Some(segments) if !segments.is_empty() => (segments, None),
            _ => {
                let segments = segments_from_rule_split(
                    &joined,
                    big_five,
                    relationship,
                    mood,
                    self.typing_rate,
                    self.min_bubble_length,
                );
                (segments, Some(rp_domain::StageError::StageFallback { stage: "Process".into() }))
            }
        }
    }

    async fn try_processor_role(&self, text: &str, cancel: &rp_domain::CancelToken) -> Option<Vec<FinalSegment>> {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "segments": {
                    "type": "array",
                    "items": { "type": "object", "properties": {
                        "content": {"type": "string"},
                        "delay_seconds": {"type": "number"}
                    }}
                }
            }
        });
        let request = InvokeRequest::structured(
            "Split the following reply into natural chat bubbles with delays.",
            text,
            schema,
        );
        let response = self.invoker.invoke(Role::Processor, request, cancel).await.ok()?;
        let value = match response {
            InvokeResponse::Json(v) => v,
            InvokeResponse::Text(t) => rp_invoker::parse_best_effort(&t)?,
        };
        let segments = value.get("segments")?.as_array()?;
        let mut out = Vec::new();
        for (i, seg) in segments.iter().enumerate() {
            let content = seg.get("content")?.as_str()?.to_owned();
            let delay = seg
                .get("delay_seconds")
                .and_then(|v| v.as_f64())
                .map(|v| v as f32)
                .unwrap_or_else(|| if i == 0 { 0.0 } else { 1.0 });
            out.push(FinalSegment {
                content,
                delay_seconds: delay,
                action: if delay > 0.0 { SegmentAction::Typing } else { SegmentAction::Idle },
            });
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragmentation_tendency_is_clamped_to_unit_range() {
        let bf = BigFive { extraversion: 1.0, ..BigFive::default() };
        let rel = RelationshipState { closeness: 1.0, ..RelationshipState::default() };
        let mood = MoodState { arousal: 1.0, ..MoodState::default() };
        assert_eq!(fragmentation_tendency(&bf, &rel, &mood), 1.0);
    }

    #[test]
    fn split_threshold_matches_formula_bounds() {
        assert_eq!(split_threshold_chars(0.0), 45);
        assert_eq!(split_threshold_chars(1.0), 5);
    }

    #[test]
    fn rule_split_breaks_on_newline_unconditionally() {
        let pieces = rule_split("hi\nthere", 100, 1);
        assert_eq!(pieces, vec!["hi", "there"]);
    }

    #[test]
    fn rule_split_breaks_on_sentence_ender_past_threshold() {
        let text = "短。这是一个比较长的句子，测试分段逻辑是否正确。";
        let pieces = rule_split(text, 5, 1);
        assert!(pieces.len() >= 2);
    }

    #[test]
    fn rule_split_drops_short_segments_but_keeps_one_if_all_dropped() {
        let pieces = rule_split("ok", 100, 5);
        assert_eq!(pieces, vec!["ok"]);
    }

    #[test]
    fn segment_delay_first_is_zero_rest_respect_busyness() {
        assert_eq!(segment_delay(0, "whatever", 0.2, 0.5), 0.0);
        let d = segment_delay(1, "12345", 0.2, 0.0);
        assert_eq!(d, 1.0_f32.max(5.0 * 0.2));
    }

    #[test]
    fn macro_delay_probability_matches_table() {
        assert_eq!(macro_delay_probability(RelationshipStage::Avoiding, 0.1), 0.8);
        assert_eq!(macro_delay_probability(RelationshipStage::Stagnating, 0.1), 0.5);
        assert_eq!(macro_delay_probability(RelationshipStage::Initiating, 0.1), 0.0);
        assert_eq!(macro_delay_probability(RelationshipStage::Initiating, 0.9), 1.0);
    }
}
