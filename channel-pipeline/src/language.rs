use tracing::debug;

/// Best-label language identification.
pub trait LanguageClassifier {
    /// ISO 639-3 code of the most likely language, if any.
    fn classify(&self, text: &str) -> Option<String>;
}

/// Trigram-based classifier backed by `whatlang`. No confidence floor is
/// applied; the single best label is returned as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangClassifier;

impl LanguageClassifier for WhatlangClassifier {
    fn classify(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        debug!(
            lang = info.lang().code(),
            confidence = info.confidence(),
            "Language detected"
        );
        Some(info.lang().code().to_string())
    }
}
