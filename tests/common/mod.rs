//! Common test utilities for rust-sqllineage tests

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Test context with temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub work_dir: PathBuf,
}

impl TestContext {
    /// Create a new test context by copying a fixture to a temp directory
    pub fn with_fixture(fixture_name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(fixture_name);

        let work_dir = temp_dir.path().to_path_buf();
        copy_dir_recursive(&fixture_path, &work_dir).expect("Failed to copy fixture");

        Self {
            _temp_dir: temp_dir,
            work_dir,
        }
    }

    /// Get the path to the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.work_dir.join("snapshot.json")
    }

    /// Run the analysis with default options
    pub fn analyze(&self) -> AnalyzeResult {
        self.analyze_with(|_| {})
    }

    /// Run the analysis after letting the caller adjust the options
    pub fn analyze_with(
        &self,
        configure: impl FnOnce(&mut rust_sqllineage::AnalyzeOptions),
    ) -> AnalyzeResult {
        let mut options = rust_sqllineage::AnalyzeOptions {
            snapshot_path: self.snapshot_path(),
            output_path: None,
            include_triggers: false,
            pretty: false,
            verbose: false,
        };
        configure(&mut options);

        match rust_sqllineage::analyze_snapshot(options) {
            Ok(model_path) => AnalyzeResult {
                success: true,
                model_path: Some(model_path),
                errors: vec![],
            },
            Err(e) => AnalyzeResult {
                success: false,
                model_path: None,
                errors: vec![format!("{e:#}")],
            },
        }
    }

    /// Analyze and parse the written document, panicking if analysis fails.
    pub fn analyze_successfully(&self) -> serde_json::Value {
        let result = self.analyze();
        assert!(result.success, "Analysis failed: {:?}", result.errors);
        read_document(result.model_path.as_deref().expect("model path"))
    }
}

/// Result of an analysis run
pub struct AnalyzeResult {
    pub success: bool,
    pub model_path: Option<PathBuf>,
    pub errors: Vec<String>,
}

/// Read and parse a written model document
pub fn read_document(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("Failed to read model document");
    serde_json::from_str(&text).expect("Model document is not valid JSON")
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
