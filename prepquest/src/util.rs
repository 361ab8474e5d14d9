use chrono::{DateTime, SubsecRound, Utc};
use std::path::{Path, PathBuf};

/// Returns the workspace root, i.e. the parent of this crate's manifest
/// directory.
///
/// Resolved at compile time, so a relocated binary still points at the
/// source tree it was built from.
pub fn workspace_dir() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// Current time truncated to microseconds, the finest precision every
/// supported backend stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
