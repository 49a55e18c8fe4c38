use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// The disciplines a harvested record is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Discipline {
    #[serde(rename = "Computer Science")]
    ComputerScience,
    #[serde(rename = "Political Science")]
    PoliticalScience,
    #[serde(rename = "Marketing")]
    Marketing,
    #[serde(rename = "Chemical Engineering")]
    ChemicalEngineering,
    #[serde(rename = "Civil Engineering")]
    CivilEngineering,
}

impl Discipline {
    pub const ALL: [Discipline; 5] = [
        Discipline::ComputerScience,
        Discipline::PoliticalScience,
        Discipline::Marketing,
        Discipline::ChemicalEngineering,
        Discipline::CivilEngineering,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Discipline::ComputerScience => "Computer Science",
            Discipline::PoliticalScience => "Political Science",
            Discipline::Marketing => "Marketing",
            Discipline::ChemicalEngineering => "Chemical Engineering",
            Discipline::CivilEngineering => "Civil Engineering",
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("discipline pattern is valid")
}

/// HAL domain code prefixes, checked in order.
static CODE_PATTERNS: LazyLock<Vec<(Regex, Discipline)>> = LazyLock::new(|| {
    vec![
        (pattern(r"(?i)^info(\.|$)"), Discipline::ComputerScience),
        (pattern(r"(?i)^shs\.scipo$"), Discipline::PoliticalScience),
        (pattern(r"(?i)^shs\.gestion$"), Discipline::Marketing),
        (
            pattern(r"(?i)^(chim|ens\.chim|sdeng\.chim)(\.|$)"),
            Discipline::ChemicalEngineering,
        ),
        (
            pattern(r"(?i)^(sdeng\.civi|sdeng\.mech|sdeng\.mat|sdeng\.genie-civi)(\.|$)"),
            Discipline::CivilEngineering,
        ),
    ]
});

/// Free-text cues used when no domain code matches.
static TEXT_PATTERNS: LazyLock<Vec<(Regex, Discipline)>> = LazyLock::new(|| {
    vec![
        (
            pattern(r"(?i)\bcomputer science|informatics|algorithm|machine learning|ai\b"),
            Discipline::ComputerScience,
        ),
        (
            pattern(r"(?i)\bpolitical science|politics|public policy|governance\b"),
            Discipline::PoliticalScience,
        ),
        (
            pattern(r"(?i)\bmarketing|consumer|branding|advertising|retail\b"),
            Discipline::Marketing,
        ),
        (
            pattern(r"(?i)\bchemical engineering|process engineering|reactor|catalyst|polymer\b"),
            Discipline::ChemicalEngineering,
        ),
        (
            pattern(r"(?i)\bcivil engineering|geotechnical|structural|transportation engineering|concrete\b"),
            Discipline::CivilEngineering,
        ),
    ]
});

/// First discipline whose code pattern matches any of `codes`.
pub fn from_codes(codes: &[String]) -> Option<Discipline> {
    codes.iter().map(|c| c.trim()).find_map(|code| {
        CODE_PATTERNS
            .iter()
            .find(|(re, _)| re.is_match(code))
            .map(|(_, d)| *d)
    })
}

/// First discipline whose cue occurs anywhere in `texts`.
pub fn from_text(texts: &[&str]) -> Option<Discipline> {
    let blob = texts.join(" ; ");
    TEXT_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&blob))
        .map(|(_, d)| *d)
}

/// Domain codes first, then text cues.
pub fn classify(codes: &[String], texts: &[&str]) -> Option<Discipline> {
    from_codes(codes).or_else(|| from_text(texts))
}
