//! Language identification and the closed set of supported language labels.
//!
//! Each label maps to both an index analyzer (stemmer) and a label the
//! identifier model can produce, so that shard routing and analysis agree.

use crate::types::DEFAULT_LANGUAGE;
use tantivy::tokenizer::Language as StemmerLanguage;
use whatlang::Lang;

/// Supported language labels with their analyzer and classifier mappings.
const LANGUAGES: &[(&str, StemmerLanguage, Lang)] = &[
    ("en", StemmerLanguage::English, Lang::Eng),
    ("fr", StemmerLanguage::French, Lang::Fra),
    ("de", StemmerLanguage::German, Lang::Deu),
    ("es", StemmerLanguage::Spanish, Lang::Spa),
    ("it", StemmerLanguage::Italian, Lang::Ita),
    ("pt", StemmerLanguage::Portuguese, Lang::Por),
    ("nl", StemmerLanguage::Dutch, Lang::Nld),
    ("ru", StemmerLanguage::Russian, Lang::Rus),
    ("sv", StemmerLanguage::Swedish, Lang::Swe),
];

/// All labels an instance may list in its options.
pub fn available_languages() -> Vec<String> {
    LANGUAGES.iter().map(|(label, _, _)| label.to_string()).collect()
}

pub(crate) fn stemmer_for_label(label: &str) -> Option<StemmerLanguage> {
    LANGUAGES
        .iter()
        .find(|(l, _, _)| *l == label)
        .map(|(_, stemmer, _)| *stemmer)
}

fn classifier_lang(label: &str) -> Option<Lang> {
    LANGUAGES
        .iter()
        .find(|(l, _, _)| *l == label)
        .map(|(_, _, lang)| *lang)
}

fn label_for(lang: Lang) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(_, _, l)| *l == lang)
        .map(|(label, _, _)| *label)
}

/// Picks the language shard for a text, constrained to a target set.
///
/// Implementations must return a member of `targets` when one ranks in the
/// classifier's candidates, and [`DEFAULT_LANGUAGE`] otherwise. They never
/// fail: an unusable classification falls back to the default.
pub trait LanguageIdentify: Send + Sync {
    fn guess(&self, text: &str, targets: &[String]) -> String;
}

/// Statistical identifier over a pretrained n-gram model, restricted to the
/// target label set via an allowlist detector.
pub struct WhatlangIdentifier;

impl WhatlangIdentifier {
    pub fn new() -> Self {
        WhatlangIdentifier
    }
}

impl Default for WhatlangIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageIdentify for WhatlangIdentifier {
    fn guess(&self, text: &str, targets: &[String]) -> String {
        let allowlist: Vec<Lang> = targets
            .iter()
            .filter_map(|label| classifier_lang(label))
            .collect();
        if allowlist.is_empty() {
            return DEFAULT_LANGUAGE.to_string();
        }

        // The underlying model expects line-shaped input; trailing newlines
        // are not significant.
        let text = text.trim();
        if text.is_empty() {
            return DEFAULT_LANGUAGE.to_string();
        }

        let detector = whatlang::Detector::with_allowlist(allowlist);
        match detector.detect_lang(text).and_then(label_for) {
            Some(label) => label.to_string(),
            None => {
                tracing::debug!("no target language ranked, falling back to default");
                DEFAULT_LANGUAGE.to_string()
            }
        }
    }
}
