//! Operator kill switch.
//!
//! A plain file on disk: create it to stop trading, delete it (and
//! manually reset the HALT) to resume. File presence is checked at the
//! top of every tick so the switch works even if the process is wedged
//! in a bad decision loop.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct KillSwitch {
    path: PathBuf,
}

impl KillSwitch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether the switch is currently engaged.
    #[must_use]
    pub fn engaged(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_is_disengaged() {
        let switch = KillSwitch::new("/nonexistent/kill-switch-test");
        assert!(!switch.engaged());
    }

    #[test]
    fn test_present_file_engages() {
        let path = std::env::temp_dir().join("sentinel-kill-switch-test");
        std::fs::write(&path, b"stop").unwrap();
        let switch = KillSwitch::new(&path);
        assert!(switch.engaged());
        std::fs::remove_file(&path).unwrap();
        assert!(!switch.engaged());
    }
}
