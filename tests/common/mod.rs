//! Shared helpers for CLI integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Isolated workspace with its own database path.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("data").join("docqa.db")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `content` to `name` inside the workspace.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// `docqa` with a clean environment pointed at this workspace.
    pub fn docqa(&self) -> Command {
        let mut cmd = Command::cargo_bin("docqa").unwrap();
        cmd.env_remove("RUST_LOG")
            .env_remove("OPENAI_API_KEY")
            .env_remove("DOCQA_API_KEY")
            .env_remove("DOCQA_CHUNK_SIZE")
            .env_remove("DOCQA_CHUNK_OVERLAP")
            .env_remove("DOCQA_RETRIEVER_PROVIDER")
            .env_remove("DOCQA_STORAGE_TYPE")
            .env("DOCQA_DB_PATH", self.db_path());
        cmd
    }
}
