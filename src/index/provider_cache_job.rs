//! Follow-up job queued after a successful blob-index lookup, to warm the
//! provider-result cache for every slice hash inside the index (spec §4.5
//! step 3: "every slice hash inside the index gets the enclosing
//! providerResult appended to its provider-set cache entry").

use crate::hash::{ContextId, Hash};
use crate::model::ProviderResult;

#[derive(Clone, Debug)]
pub struct IndexFanoutJob {
    pub context_id: ContextId,
    /// Every slice hash contained anywhere in the index, to be appended to
    /// the provider-result cache entry of each.
    pub slices: Vec<Hash>,
    pub provider_result: ProviderResult,
}
