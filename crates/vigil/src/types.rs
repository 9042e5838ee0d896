use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Exit code reported while a process has not produced one: never started,
/// still running, or the OS status was unreadable.
pub const PENDING_EXIT: i32 = -111;

/// Declarative description of one supervised process, decoded from a single
/// TOML file. The name is the file stem, not a field of the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSpec {
	#[serde(skip)]
	pub name: String,
	pub command: Option<String>,
	pub workdir: Option<PathBuf>,
	#[serde(default)]
	pub env: HashMap<String, String>,
	#[serde(default = "default_true", rename = "start")]
	pub autostart: bool,
}

fn default_true() -> bool {
	true
}

impl ProcessSpec {
	/// A spec that never spawns (no command). Handy for tests and for
	/// representing inert config entries.
	pub fn inert(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			command: None,
			workdir: None,
			env: HashMap::new(),
			autostart: true,
		}
	}
}

/// Observed lifecycle position of a handle, derived from OS process status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
	NotStarted,
	Running,
	Paused,
	Exited(i32),
}

impl ProcState {
	pub fn is_running(&self) -> bool {
		matches!(self, ProcState::Running | ProcState::Paused)
	}
}

/// One row of the process listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcSummary {
	pub name: String,
	pub running: bool,
	pub paused: bool,
	pub returncode: i32,
}

/// Registry-wide health breakdown. Integer percentages, 0–100, summing to
/// 100 modulo rounding. An empty registry reports `killed: 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
	pub running: u8,
	pub paused: u8,
	pub killed: u8,
	pub done: u8,
}

impl StatusSnapshot {
	pub fn empty() -> Self {
		Self {
			running: 0,
			paused: 0,
			killed: 100,
			done: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spec_toml_defaults() {
		let spec: ProcessSpec = toml::from_str("command = \"echo hi\"").unwrap();
		assert_eq!(spec.command.as_deref(), Some("echo hi"));
		assert!(spec.autostart);
		assert!(spec.env.is_empty());
		assert!(spec.workdir.is_none());
	}

	#[test]
	fn spec_toml_full() {
		let spec: ProcessSpec = toml::from_str(
			"command = \"sleep 5\"\nworkdir = \"/tmp\"\nstart = false\n[env]\nFOO = \"bar\"\n",
		)
		.unwrap();
		assert_eq!(spec.workdir.as_deref(), Some(std::path::Path::new("/tmp")));
		assert!(!spec.autostart);
		assert_eq!(spec.env.get("FOO").map(String::as_str), Some("bar"));
	}

	#[test]
	fn spec_without_command_is_loadable() {
		let spec: ProcessSpec = toml::from_str("start = true").unwrap();
		assert!(spec.command.is_none());
	}

	#[test]
	fn paused_state_counts_as_running() {
		assert!(ProcState::Paused.is_running());
		assert!(ProcState::Running.is_running());
		assert!(!ProcState::NotStarted.is_running());
		assert!(!ProcState::Exited(0).is_running());
	}
}
