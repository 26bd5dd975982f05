pub mod resolver;
pub mod similarity;

pub use resolver::{CandidatePool, MatchConfig, MatchResolver, DEFAULT_NAME_SIMILARITY_THRESHOLD};
pub use similarity::name_similarity;
