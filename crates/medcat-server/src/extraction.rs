//! Anatomical entity extraction from free text
//!
//! Provider descriptions are scanned for organ and body-region names; the names
//! found become the anatomical area candidates of an ingested dataset.

use regex::{Regex, RegexBuilder};

/// Structured hints extracted from a piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityHints {
    /// Canonical organ names in order of first appearance, without duplicates
    pub organs: Vec<String>,
}

pub trait EntityParser: Send + Sync {
    fn parse(&self, text: &str) -> EntityHints;
}

/// Canonical organ name and the surface forms that refer to it.
///
/// Plural and adjectival forms map onto the singular canonical name.
const VOCABULARY: &[(&str, &[&str])] = &[
    ("brain", &["brain", "brains", "cerebral", "cerebrum"]),
    ("heart", &["heart", "hearts", "cardiac", "myocardial"]),
    ("lung", &["lung", "lungs", "pulmonary", "chest"]),
    ("liver", &["liver", "livers", "hepatic"]),
    ("kidney", &["kidney", "kidneys", "renal"]),
    ("breast", &["breast", "breasts", "mammary", "mammogram", "mammograms"]),
    ("skin", &["skin", "dermal", "dermatological"]),
    ("eye", &["eye", "eyes", "retina", "retinal", "ocular", "fundus"]),
    ("bone", &["bone", "bones", "skeletal"]),
    ("knee", &["knee", "knees"]),
    ("spine", &["spine", "spinal", "vertebra", "vertebrae"]),
    ("prostate", &["prostate", "prostatic"]),
    ("pancreas", &["pancreas", "pancreatic"]),
    ("colon", &["colon", "colorectal", "bowel", "bowels"]),
    ("stomach", &["stomach", "gastric"]),
    ("thyroid", &["thyroid"]),
    ("blood", &["blood", "hematologic", "haematologic"]),
    ("teeth", &["tooth", "teeth", "dental"]),
    ("cervix", &["cervix", "cervical"]),
    ("bladder", &["bladder", "bladders"]),
];

/// Vocabulary matcher: whole words, case-insensitive.
pub struct KeywordEntityParser {
    pattern: Regex,
}

impl KeywordEntityParser {
    pub fn new() -> Result<Self, regex::Error> {
        let alternation = VOCABULARY
            .iter()
            .flat_map(|(_, forms)| forms.iter())
            .map(|form| regex::escape(form))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
            .case_insensitive(true)
            .build()?;

        Ok(Self { pattern })
    }

    fn canonical(form: &str) -> Option<&'static str> {
        let lower = form.to_lowercase();
        VOCABULARY
            .iter()
            .find(|(_, forms)| forms.contains(&lower.as_str()))
            .map(|(canonical, _)| *canonical)
    }
}

impl EntityParser for KeywordEntityParser {
    fn parse(&self, text: &str) -> EntityHints {
        let mut organs: Vec<String> = Vec::new();
        for found in self.pattern.find_iter(text) {
            if let Some(name) = Self::canonical(found.as_str()) {
                if !organs.iter().any(|o| o == name) {
                    organs.push(name.to_string());
                }
            }
        }
        EntityHints { organs }
    }
}
