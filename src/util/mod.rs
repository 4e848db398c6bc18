//! Shared utilities

pub mod fs;
pub mod hash;
pub mod paths;

/// Whether the tool is running under a test harness.
///
/// `file://` repository URLs are only accepted in test mode, so fixture
/// repositories never leak into production manifests.
pub fn is_test_mode() -> bool {
    if cfg!(test) {
        return true;
    }
    matches!(
        std::env::var("AMS_COMPOSE_TEST_MODE").as_deref(),
        Ok("true") | Ok("1")
    )
}
