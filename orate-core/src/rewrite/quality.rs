//! Deterministic quality gate for rewrite candidates.
//!
//! Pure and synchronous: compares a rewritten candidate against the raw
//! transcript and decides whether it may replace it. The pipeline treats a
//! rejection as "use the raw transcript", never as an error.

use crate::level::ProcessingLevel;

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub is_acceptable: bool,
    pub reason: Option<RejectReason>,
    /// Candidate/raw character ratio, 0.0 when the candidate is empty.
    pub ratio: f64,
}

impl GateDecision {
    fn accept(ratio: f64) -> Self {
        Self {
            is_acceptable: true,
            reason: None,
            ratio,
        }
    }

    fn reject(reason: RejectReason, ratio: f64) -> Self {
        Self {
            is_acceptable: false,
            reason: Some(reason),
            ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Candidate is empty after trimming.
    EmptyCandidate,
    /// Length ratio fell outside the level's acceptable band.
    RatioOutOfBand { ratio: f64, min: f64, max: f64 },
    /// Candidate looks like an assistant answering the transcript instead
    /// of rewriting it.
    AnswerMarker(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyCandidate => write!(f, "empty_candidate"),
            RejectReason::RatioOutOfBand { ratio, min, max } => {
                write!(f, "ratio_out_of_band(ratio={ratio:.2} band={min}..{max})")
            }
            RejectReason::AnswerMarker(marker) => write!(f, "answer_marker({marker})"),
        }
    }
}

/// Candidate prefixes that indicate the model answered instead of rewriting.
const ANSWER_PREFIXES: &[&str] = &[
    "sure,",
    "sure!",
    "sure thing",
    "here is ",
    "here's ",
    "here are ",
    "certainly",
    "of course",
    "i'd be happy to",
    "great question",
];

/// Substrings that indicate assistant meta-commentary anywhere in the text.
const ASSISTANT_MARKERS: &[&str] = &[
    "as an ai",
    "as a language model",
    "i cannot assist",
    "i can't assist",
    "i'm an ai",
];

/// Evaluate a rewrite candidate against the raw transcript.
pub fn evaluate(raw: &str, candidate: &str, level: ProcessingLevel) -> GateDecision {
    let raw = raw.trim();
    let candidate = candidate.trim();
    let (min, max) = ratio_band(level);

    if candidate.is_empty() {
        return GateDecision::reject(RejectReason::EmptyCandidate, 0.0);
    }

    let ratio = if raw.is_empty() {
        1.0
    } else {
        candidate.chars().count() as f64 / raw.chars().count() as f64
    };

    if ratio < min || ratio > max {
        return GateDecision::reject(RejectReason::RatioOutOfBand { ratio, min, max }, ratio);
    }

    if let Some(marker) = answer_marker(candidate, level) {
        return GateDecision::reject(RejectReason::AnswerMarker(marker), ratio);
    }

    GateDecision::accept(ratio)
}

/// Acceptable candidate/raw length ratio per level. Polish tolerates a
/// wider band than clean — heavier editing is expected there.
fn ratio_band(level: ProcessingLevel) -> (f64, f64) {
    match level {
        // Raw never reaches the gate; any ratio passes if it somehow does.
        ProcessingLevel::Raw => (0.0, f64::INFINITY),
        ProcessingLevel::Clean => (0.6, 3.0),
        ProcessingLevel::Polish => (0.2, 15.0),
    }
}

fn answer_marker(candidate: &str, level: ProcessingLevel) -> Option<String> {
    let lowered = candidate.to_lowercase();

    for prefix in ANSWER_PREFIXES {
        if lowered.starts_with(prefix) {
            return Some(prefix.trim_end().to_string());
        }
    }

    for marker in ASSISTANT_MARKERS {
        if lowered.contains(marker) {
            return Some((*marker).to_string());
        }
    }

    // List openers count as answer-shaped only for clean: the polish prompt
    // explicitly allows restructuring into bullets and headings.
    if level == ProcessingLevel::Clean && starts_with_list_opener(&lowered) {
        return Some("list_opener".into());
    }

    None
}

fn starts_with_list_opener(lowered: &str) -> bool {
    if lowered.starts_with("- ") || lowered.starts_with("* ") || lowered.starts_with("\u{2022} ") {
        return true;
    }
    // "1. " / "2) " style numbered openers.
    let mut chars = lowered.chars();
    let mut saw_digit = false;
    for c in chars.by_ref() {
        if c.is_ascii_digit() {
            saw_digit = true;
            continue;
        }
        return saw_digit && (c == '.' || c == ')');
    }
    false
}
