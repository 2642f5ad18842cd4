use anyhow::{Context, Result};
use chrono::Local;
use pilot_providers::SessionProgram;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-run output directory: screenshots, the agent log and, on request, the
/// program a failed session generated.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    dir: PathBuf,
}

impl RunArtifacts {
    /// Create `<base>/<YYYYmmdd_HH_MM_SS>`.
    pub fn create(base: impl AsRef<Path>) -> Result<Self> {
        let stamp = Local::now().format("%Y%m%d_%H_%M_%S").to_string();
        let dir = base.as_ref().join(stamp);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;
        info!("Results directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("agent.log")
    }

    pub fn save_screenshot(&self, name: &str, png: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, png)
            .with_context(|| format!("Failed to write screenshot {}", path.display()))?;
        debug!("Saved {}", path.display());
        Ok(path)
    }

    pub fn save_program(&self, program: &SessionProgram) -> Result<PathBuf> {
        let path = self.dir.join("program.json");
        let json = serde_json::to_string_pretty(program)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write program {}", path.display()))?;
        info!("Session program saved to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let base = TempDir::new().unwrap();
        let artifacts = RunArtifacts::create(base.path()).unwrap();
        assert!(artifacts.dir().is_dir());
        assert_eq!(artifacts.dir().parent(), Some(base.path()));
        let name = artifacts.dir().file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), "20260101_12_00_00".len());

        let shot = artifacts.save_screenshot("screenshot1.png", b"png").unwrap();
        assert_eq!(fs::read(shot).unwrap(), b"png");
        assert!(artifacts.log_path().ends_with("agent.log"));
    }

    #[test]
    fn test_save_program() {
        let base = TempDir::new().unwrap();
        let artifacts = RunArtifacts::create(base.path()).unwrap();
        let program = SessionProgram {
            session_id: "s1".to_string(),
            program: Some("click(3)".to_string()),
            pllm_attempts: Some(2),
            source: None,
        };
        let path = artifacts.save_program(&program).unwrap();
        let saved: SessionProgram =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved, program);
    }
}
