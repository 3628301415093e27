use crate::language::LanguageClassifier;
use tracing::debug;
use tubescout_core::Candidate;

/// Language and audience-size gates applied to discovery candidates.
pub struct CandidateFilter<C> {
    classifier: C,
    target_language: String,
    subscriber_ceiling: u64,
}

impl<C: LanguageClassifier> CandidateFilter<C> {
    pub fn new(classifier: C, target_language: impl Into<String>, subscriber_ceiling: u64) -> Self {
        Self {
            classifier,
            target_language: target_language.into(),
            subscriber_ceiling,
        }
    }

    /// Title and description together must be classified as the target language.
    pub fn passes_language(&self, candidate: &Candidate) -> bool {
        let label = self.classifier.classify(&candidate.language_sample());
        debug!(
            video_id = %candidate.video_id,
            label = ?label,
            "Language gate"
        );
        label.as_deref() == Some(self.target_language.as_str())
    }

    /// Strictly below the ceiling.
    pub fn passes_audience(&self, subscriber_count: u64) -> bool {
        subscriber_count < self.subscriber_ceiling
    }

    pub fn subscriber_ceiling(&self) -> u64 {
        self.subscriber_ceiling
    }
}
