use serde::{Deserialize, Serialize};

/// Instance (tenant) identifier — a plain string, one directory per instance.
pub type InstanceName = String;
/// Document identifier as carried by the change feed.
pub type DocumentId = String;

/// The docType whose documents have extractable file bodies.
pub const FILES_DOC_TYPE: &str = "files";
/// Derived docType holding extracted body text, paired with [`FILES_DOC_TYPE`].
pub const CONTENT_DOC_TYPE: &str = "files.content";
/// Language shard used when the identifier produces nothing usable.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A queued request to run one incremental update pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotif {
    pub instance: InstanceName,
    pub doc_type: String,
    pub retry_count: u32,
}

impl UpdateNotif {
    pub fn new(instance: impl Into<String>, doc_type: impl Into<String>) -> Self {
        UpdateNotif {
            instance: instance.into(),
            doc_type: doc_type.into(),
            retry_count: 0,
        }
    }
}

fn default_languages() -> Vec<String> {
    vec![DEFAULT_LANGUAGE.to_string()]
}

/// Per-instance options, persisted as `<root>/<instance>/config.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceOptions {
    #[serde(default)]
    pub highlight: bool,
    #[serde(default)]
    pub content: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        InstanceOptions {
            highlight: false,
            content: false,
            languages: default_languages(),
        }
    }
}

/// Partial options payload: unset fields keep their previous value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsPatch {
    pub highlight: Option<bool>,
    pub content: Option<bool>,
    pub languages: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_single_language() {
        let opts = InstanceOptions::default();
        assert!(!opts.highlight);
        assert!(!opts.content);
        assert_eq!(opts.languages, vec![DEFAULT_LANGUAGE]);
    }

    #[test]
    fn options_yaml_roundtrip() {
        let opts = InstanceOptions {
            highlight: true,
            content: false,
            languages: vec!["en".into(), "fr".into()],
        };
        let text = serde_yaml::to_string(&opts).unwrap();
        let back: InstanceOptions = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, opts);
    }

    #[test]
    fn options_yaml_fills_missing_fields() {
        let back: InstanceOptions = serde_yaml::from_str("highlight: true\n").unwrap();
        assert!(back.highlight);
        assert!(!back.content);
        assert_eq!(back.languages, vec![DEFAULT_LANGUAGE]);
    }
}
