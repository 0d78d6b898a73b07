// Shared helpers for integration tests: fake vendor CLIs as sh scripts
#![allow(dead_code)]

use ralph_runner_lib::config::AgentConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

static INIT_LOGGER: Once = Once::new();

pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A throwaway CLI that records each invocation in `calls.log`
pub struct FakeCli {
    pub dir: TempDir,
    pub script: PathBuf,
}

impl FakeCli {
    /// `body` runs after stdin has been saved to `stdin.txt`
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake-cli.sh");
        let header = format!(
            "#!/bin/sh\nDIR='{}'\necho \"$*\" >> \"$DIR/calls.log\"\ncat > \"$DIR/stdin.txt\"\n",
            dir.path().display()
        );
        fs::write(&script, format!("{}{}\n", header, body)).unwrap();
        Self { dir, script }
    }

    pub fn config(&self) -> AgentConfig {
        AgentConfig {
            cli_command: vec!["sh".to_string(), self.script.display().to_string()],
            ..Default::default()
        }
    }

    /// Argument lines of every invocation so far
    pub fn calls(&self) -> Vec<String> {
        match fs::read_to_string(self.dir.path().join("calls.log")) {
            Ok(log) => log.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn stdin(&self) -> String {
        fs::read_to_string(self.dir.path().join("stdin.txt")).unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
