use crate::core::model::DiagramKind;

const PROCESS_KEYWORDS: &[&str] = &[
    "pump",
    "valve",
    "flow transmitter",
    "pressure transmitter",
    "level transmitter",
    "temperature transmitter",
    "compressor",
    "heat exchanger",
    "vessel",
    "tank",
    "reactor",
    "pipeline",
    "piping",
    "nozzle",
    "p&id",
    "strainer",
];

const ELECTRICAL_KEYWORDS: &[&str] = &[
    "circuit breaker",
    "breaker",
    "relay",
    "transformer",
    "busbar",
    "switchgear",
    "contactor",
    "motor control",
    "single line",
    "terminal block",
    "voltage",
    "earthing",
    "grounding",
    "feeder",
    "overload",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeywordScores {
    pub process: usize,
    pub electrical: usize,
}

pub fn score_text(text: &str) -> KeywordScores {
    let lowered = text.to_lowercase();
    KeywordScores {
        process: count_hits(&lowered, PROCESS_KEYWORDS),
        electrical: count_hits(&lowered, ELECTRICAL_KEYWORDS),
    }
}

fn count_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().map(|kw| text.matches(kw).count()).sum()
}

pub fn classify_scores(scores: KeywordScores) -> DiagramKind {
    if scores.electrical > scores.process {
        DiagramKind::Electrical
    } else {
        // Ties and empty text fall back to the baseline.
        DiagramKind::Process
    }
}

pub fn classify_text(text: &str) -> DiagramKind {
    classify_scores(score_text(text))
}
