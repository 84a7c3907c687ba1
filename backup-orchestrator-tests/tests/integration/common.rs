//! Helpers shared by the integration tests

use backup_orchestrator::utils::command::tool_available;
use std::process::Command;

/// Skip the current test (by returning) when a tool is not installed
macro_rules! require_tools {
    ($($tool:expr),+) => {
        $(
            if !backup_orchestrator::utils::command::tool_available($tool) {
                eprintln!("skipping: {} not found in PATH", $tool);
                return;
            }
        )+
    };
}

pub fn is_docker_available() -> bool {
    tool_available("docker")
        && Command::new("docker")
            .arg("ps")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
}

/// Stops and removes a Docker container on drop, even on panic
pub struct ContainerGuard {
    name: String,
}

impl ContainerGuard {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let _ = Command::new("docker").args(["stop", &self.name]).output();
        let _ = Command::new("docker").args(["rm", "-v", &self.name]).output();
    }
}
