//! Test configuration and pipeline construction

use super::tool::FakeMediaTool;
use memories_dl::{Config, MediaTool, Pipeline, ProcessingMode, RetryConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Configuration writing into `root/out` with a near-zero backoff
///
/// One worker slot keeps record order deterministic.
pub fn test_config(root: &Path, mode: ProcessingMode) -> Config {
    Config {
        output_dir: root.join("out"),
        ledger_path: root.join("failed_memories.json"),
        mode,
        workers: 1,
        retry: RetryConfig {
            max_attempts: 3,
            backoff_unit: Duration::from_millis(1),
        },
        fetch_timeout: Duration::from_secs(5),
        blocking_threads: 2,
        ..Config::default()
    }
}

/// Pipeline over a fresh [`FakeMediaTool`], returned alongside for inspection
pub fn create_test_pipeline(config: Config) -> (Pipeline, Arc<FakeMediaTool>) {
    let tool = Arc::new(FakeMediaTool::default());
    let dyn_tool: Arc<dyn MediaTool> = tool.clone();
    let pipeline = Pipeline::new(config, dyn_tool).expect("valid test config");
    (pipeline, tool)
}
