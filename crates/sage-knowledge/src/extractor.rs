//! Surprise mining of finished worker transcripts.
//!
//! Two passes over assistant and tool messages:
//! 1. explicit lesson blocks (`Context:` / `Surprise:` / `Rule:` lines)
//! 2. a lossy regex scan for surprise phrases, with the surrounding
//!    sentences supplying context and a resolution
//!
//! Only successful subagent runs with enough messages are mined.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use sage_core::{MessageRole, Role, TranscriptMessage};
use sage_settings::ExtractionSettings;
use tracing::debug;

use crate::matcher::DomainMatcher;
use crate::types::{Candidate, normalize_text};

pub use sage_core::transcript::parse_jsonl as parse_transcript_jsonl;

const SURPRISE_PATTERN: &str = r"(?i)\b(?:errors?|failed|failures?|workaround|rate[\s-]?limit(?:ed|s)?|deprecated|timed\s+out|timeouts?|not\s+found|permission\s+denied|turns?\s+out|instead\s+of|doesn['’]t\s+work|does\s+not\s+work)\b";
const RESOLUTION_PATTERN: &str =
    r"(?i)\b(?:use|using|instead|should|must|fix(?:ed)?|workaround|switch(?:ed)?|retry|set)\b";
const LESSON_LABEL_PATTERN: &str =
    r"(?im)^\s*(?:[-*]\s*)?(?:\*\*)?(context|surprise|rule(?:/workaround)?|workaround)(?:\*\*)?\s*:(?:\*\*)?\s*(.*)$";

/// Mines candidates from transcripts.
pub struct TranscriptExtractor {
    surprise: Regex,
    resolution: Regex,
    lesson_label: Regex,
    matcher: Arc<DomainMatcher>,
    settings: ExtractionSettings,
}

#[derive(Clone, Copy)]
struct Sentence<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

/// Split text into sentences on `.`/`!`/`?` followed by whitespace, and on
/// newlines. Byte offsets refer to `text`.
fn sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => Some(i),
            '.' | '!' | '?' => match chars.peek() {
                None => Some(i + c.len_utf8()),
                Some((_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = boundary {
            push_sentence(&mut out, text, start, end);
            start = end;
        }
    }
    push_sentence(&mut out, text, start, text.len());
    out
}

fn push_sentence<'a>(out: &mut Vec<Sentence<'a>>, text: &'a str, start: usize, end: usize) {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let offset = slice.len() - slice.trim_start().len();
    out.push(Sentence {
        start: start + offset,
        end: start + offset + trimmed.len(),
        text: trimmed,
    });
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect::<String>().trim().to_string()
}

impl TranscriptExtractor {
    /// Create an extractor.
    pub fn new(matcher: Arc<DomainMatcher>, settings: ExtractionSettings) -> Self {
        Self {
            surprise: compile(SURPRISE_PATTERN),
            resolution: compile(RESOLUTION_PATTERN),
            lesson_label: compile(LESSON_LABEL_PATTERN),
            matcher,
            settings,
        }
    }

    /// Extract candidates from a finished session.
    ///
    /// Candidates carry no source and are stamped now; callers set both.
    pub fn extract(
        &self,
        transcript: &[TranscriptMessage],
        role: Role,
        success: bool,
        message_count: usize,
    ) -> Vec<Candidate> {
        if !self.settings.enabled
            || role != Role::Subagent
            || !success
            || message_count < self.settings.min_messages
        {
            return Vec::new();
        }

        let task = transcript
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map_or("", |m| m.text.as_str());

        let mut drafts: Vec<(String, String, String)> = Vec::new();
        let mut last_user = "";
        for message in transcript {
            match message.role {
                MessageRole::User => last_user = &message.text,
                MessageRole::Assistant | MessageRole::Tool => {
                    drafts.extend(self.lesson_blocks(&message.text));
                    drafts.extend(self.scan(&message.text, last_user));
                }
                MessageRole::System => {}
            }
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (context, surprise, rule) in drafts {
            if candidates.len() >= self.settings.max_candidates {
                break;
            }
            if context.is_empty() && surprise.is_empty() && rule.is_empty() {
                continue;
            }
            let key = normalize_text(if surprise.is_empty() { &rule } else { &surprise });
            if !seen.insert(key) {
                continue;
            }
            let domain = self.assign_domain(&context, &surprise, &rule, task);
            candidates.push(Candidate::new(domain, context, surprise, rule));
        }
        debug!(count = candidates.len(), "extracted candidates");
        candidates
    }

    /// Surprise and rule decide first, then the context, then the task prompt.
    fn assign_domain(&self, context: &str, surprise: &str, rule: &str, task: &str) -> String {
        let lesson = format!("{surprise}\n{rule}");
        self.matcher
            .first_match(&lesson)
            .or_else(|| self.matcher.first_match(context))
            .or_else(|| self.matcher.first_match(task))
            .unwrap_or(self.settings.fallback_domain.as_str())
            .to_string()
    }

    /// Parse explicit `Context:` / `Surprise:` / `Rule:` blocks.
    ///
    /// A block starts at a `Context:` label, or at any label when the
    /// current block already has that field. Missing fields stay empty.
    fn lesson_blocks(&self, text: &str) -> Vec<(String, String, String)> {
        let limit = self.settings.window_chars;
        let mut blocks = Vec::new();
        let mut current: Option<[String; 3]> = None;

        for caps in self.lesson_label.captures_iter(text) {
            let label = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
            let value = clip(caps.get(2).map_or("", |m| m.as_str()), limit);
            let slot = match label.as_str() {
                "context" => 0,
                "surprise" => 1,
                _ => 2,
            };
            let starts_new = slot == 0 || current.as_ref().is_some_and(|b| !b[slot].is_empty());
            if starts_new {
                if let Some(done) = current.take() {
                    blocks.push(done);
                }
            }
            let block = current.get_or_insert_with(Default::default);
            block[slot] = value;
        }
        if let Some(done) = current {
            blocks.push(done);
        }

        blocks
            .into_iter()
            .map(|[context, surprise, rule]| (context, surprise, rule))
            .collect()
    }

    /// Pattern scan producing one draft per matched sentence.
    fn scan(&self, text: &str, last_user: &str) -> Vec<(String, String, String)> {
        let limit = self.settings.window_chars;
        let half = limit / 2;
        let all = sentences(text);
        let mut drafts = Vec::new();
        let mut used = HashSet::new();

        for m in self.surprise.find_iter(text) {
            let lo = m.start().saturating_sub(half);
            let hi = m.end().saturating_add(half);
            let Some(idx) = all.iter().position(|s| s.start <= m.start() && m.start() < s.end.max(s.start + 1)) else {
                continue;
            };
            if self.lesson_label.is_match(all[idx].text) || !used.insert(idx) {
                continue;
            }

            let surprise = clip(all[idx].text, limit);
            let context = match idx.checked_sub(1).map(|p| all[p]) {
                Some(prev) if prev.end >= lo => clip(prev.text, limit),
                _ => clip(last_user, limit),
            };
            let rule = all[idx + 1..]
                .iter()
                .take_while(|s| s.start <= hi)
                .find(|s| self.resolution.is_match(s.text))
                .map(|s| clip(s.text, limit))
                .unwrap_or_default();
            drafts.push((context, surprise, rule));
        }
        drafts
    }
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_settings::DomainSettings;

    fn extractor() -> TranscriptExtractor {
        let domains = vec![
            DomainSettings::new("render", &["render", "manim"]),
            DomainSettings::new("sharing", &["discord", "slack"]),
        ];
        TranscriptExtractor::new(
            Arc::new(DomainMatcher::new(&domains).unwrap()),
            ExtractionSettings::default(),
        )
    }

    fn transcript(assistant: &str) -> Vec<TranscriptMessage> {
        vec![
            TranscriptMessage::user("Render the intro scene with manim"),
            TranscriptMessage::assistant("Starting."),
            TranscriptMessage::tool("ok"),
            TranscriptMessage::assistant(assistant),
        ]
    }

    #[test]
    fn gated_by_role_success_and_length() {
        let x = extractor();
        let t = transcript("The command failed with exit 1. Use the venv python.");
        assert!(x.extract(&t, Role::Main, true, 4).is_empty());
        assert!(x.extract(&t, Role::Cron, true, 4).is_empty());
        assert!(x.extract(&t, Role::Subagent, false, 4).is_empty());
        assert!(x.extract(&t, Role::Subagent, true, 3).is_empty());
        assert!(!x.extract(&t, Role::Subagent, true, 4).is_empty());
    }

    #[test]
    fn no_surprise_no_candidates() {
        let x = extractor();
        let t = transcript("Rendered the scene. Everything went smoothly.");
        assert!(x.extract(&t, Role::Subagent, true, 4).is_empty());
    }

    #[test]
    fn pattern_window_fills_fields() {
        let x = extractor();
        let t = transcript(
            "Ran python3 -m manim on scene.py. It failed: No module named manim. \
             You should use .venv/bin/python instead. Done.",
        );
        let c = x.extract(&t, Role::Subagent, true, 4);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].domain, "render");
        assert_eq!(c[0].context, "Ran python3 -m manim on scene.py.");
        assert_eq!(c[0].surprise, "It failed: No module named manim.");
        assert_eq!(c[0].rule, "You should use .venv/bin/python instead.");
    }

    #[test]
    fn context_falls_back_to_user_message() {
        let x = extractor();
        let t = transcript("Discord upload hit a rate limit.");
        let c = x.extract(&t, Role::Subagent, true, 4);
        assert_eq!(c[0].context, "Render the intro scene with manim");
        assert_eq!(c[0].rule, "");
        assert_eq!(c[0].domain, "sharing");
    }

    #[test]
    fn explicit_lesson_block() {
        let x = extractor();
        let t = transcript(
            "Lesson learned:\n- **Context:** posting to slack\n- **Surprise:** files over 1GB are rejected\n- **Rule:** compress first",
        );
        let c = x.extract(&t, Role::Subagent, true, 4);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].context, "posting to slack");
        assert_eq!(c[0].surprise, "files over 1GB are rejected");
        assert_eq!(c[0].rule, "compress first");
        assert_eq!(c[0].domain, "sharing");
    }

    #[test]
    fn malformed_block_yields_empty_fields() {
        let x = extractor();
        let t = transcript("Surprise: the API is deprecated\nnothing else");
        let c = x.extract(&t, Role::Subagent, true, 4);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].context, "");
        assert_eq!(c[0].surprise, "the API is deprecated");
        assert_eq!(c[0].rule, "");
    }

    #[test]
    fn unmatched_domain_uses_task_then_fallback() {
        let x = extractor();
        let t = transcript("The geocoder timed out.");
        assert_eq!(x.extract(&t, Role::Subagent, true, 4)[0].domain, "render");

        let t = vec![
            TranscriptMessage::user("look up the address"),
            TranscriptMessage::assistant("a"),
            TranscriptMessage::assistant("b"),
            TranscriptMessage::tool("Error: permission denied on /etc/hosts"),
        ];
        assert_eq!(x.extract(&t, Role::Subagent, true, 4)[0].domain, "general");
    }

    #[test]
    fn deduplicated_and_capped() {
        let x = extractor();
        let repeated = "Upload failed. ".repeat(3);
        let many: String = (0..10).map(|i| format!("Step {i} failed. ")).collect();
        let mut t = transcript(&repeated);
        t.push(TranscriptMessage::tool(repeated.clone()));
        assert_eq!(x.extract(&t, Role::Subagent, true, 5).len(), 1);

        let t = transcript(&many);
        assert_eq!(x.extract(&t, Role::Subagent, true, 4).len(), 5);
    }

    #[test]
    fn sentence_splitting() {
        let s: Vec<&str> = sentences("One. Two!\nThree? v1.2 stays").iter().map(|s| s.text).collect();
        assert_eq!(s, vec!["One.", "Two!", "Three?", "v1.2 stays"]);
    }

    #[test]
    fn jsonl_parser_is_reexported() {
        let (t, errors) = parse_transcript_jsonl("{\"role\":\"user\",\"text\":\"hi\"}\nnot json\n");
        assert_eq!(t.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
