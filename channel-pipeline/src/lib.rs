pub mod discovery;
pub mod enrichment;
pub mod extract;
pub mod filter;
pub mod language;
pub mod resolver;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

pub use discovery::{DiscoveryStage, DiscoverySummary};
pub use enrichment::{ChannelEnricher, EnrichmentStage, EnrichmentSummary};
pub use filter::CandidateFilter;
pub use language::{LanguageClassifier, WhatlangClassifier};
pub use resolver::HandleResolver;
pub use search::SearchPager;
