// tests/common/mod.rs

#![allow(dead_code)]

use std::path::Path;

pub use agentloop_test_utils::builders::{AgentConfigBuilder, fast_backoff, test_settings};
pub use agentloop_test_utils::fake_backend::{FakeBackend, LaunchLog};
pub use agentloop_test_utils::fake_triggers::{Behaviour, FakeTriggerSource, WatchStats};
pub use agentloop_test_utils::{init_tracing, with_timeout};

/// Write `contents` to `dir/name`.
pub fn write_file(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

/// Number of lines appended to a counter file by test scripts (missing = 0).
pub fn read_counter(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.lines().count())
        .unwrap_or(0)
}
