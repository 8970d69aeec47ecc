//! Final result ranking (§4.12, C13).

mod result_ranker;

pub use result_ranker::{RankedResult, RankingContext, ResultRanker, UserPreferences};
