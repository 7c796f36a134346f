//! Path utilities for locating optional test data files.

use std::path::PathBuf;

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Searches for a test file.
///
/// Checks `TEST_DATA_DIR` (if set), then the workspace-level `testdata/`.
/// Real correction archives are large, so they are never checked in.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(test_data_dir) = std::env::var("TEST_DATA_DIR") {
        candidates.push(PathBuf::from(test_data_dir).join(name));
    }
    candidates.push(workspace_root().join("testdata").join(name));

    candidates.into_iter().find(|path| path.exists())
}

/// The style table shipped with the proxy.
pub fn shipped_style_config_path() -> PathBuf {
    workspace_root().join("config").join("layer_configs.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
        assert!(shipped_style_config_path().exists());
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(find_test_file("definitely-not-here.pmtiles").is_none());
    }
}
