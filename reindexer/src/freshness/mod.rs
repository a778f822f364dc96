//! Index freshness comparison.

use reindexer_shared::IndexId;

/// Whether `candidate` should replace the currently aliased index.
///
/// With no current index the candidate always wins. Otherwise only the
/// embedded timestamps are compared, and ties reject the candidate so that
/// re-running against unchanged data does not rebuild.
pub fn is_newer(candidate: &IndexId, current: Option<&IndexId>) -> bool {
    match current {
        None => true,
        Some(current) => candidate.timestamp() > current.timestamp(),
    }
}
