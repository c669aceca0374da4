#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Query surfaces: single-stage semantic search and the two-stage
//! retrieve-then-rerank pipeline.

pub mod pipeline;
pub mod semantic;

use semsearch_core::config::ErrorPolicy;
use semsearch_core::error::Error;

pub use pipeline::HybridPipeline;
pub use semantic::SemanticSearch;

/// Whether `policy` lets stage-1 failure `e` degrade to an empty result.
///
/// Only outages and rejections qualify. Data consistency failures and
/// reranker failures always surface.
pub(crate) fn degrades_to_empty(policy: ErrorPolicy, e: &Error) -> bool {
    policy == ErrorPolicy::Empty
        && matches!(
            e,
            Error::Configuration { .. }
                | Error::ProviderUnavailable { .. }
                | Error::ProviderRateLimited { .. }
                | Error::ProviderRequest { .. }
                | Error::Store { .. }
        )
}
