use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use vigil::{ProcSummary, StatusSnapshot};

/// One JSON object per line over the daemon's Unix socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
	Start { name: String },
	Kill { name: String },
	Restart { name: String },
	Pause { name: String },
	Resume { name: String },
	Out { name: String },
	List,
	Status,
	/// Streamed variant of `Status`: the daemon keeps the connection open
	/// and writes a `Status` response on every sampler tick.
	Watch,
	Reload,
	Ping,
	Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
	Ok { message: Option<String> },
	List { procs: Vec<ProcSummary> },
	Status { snapshot: StatusSnapshot },
	Out { text: String },
	Error { message: String },
	Pong,
}

const APP_NAME: &str = "vigil";

pub fn state_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
		PathBuf::from(dir).join(APP_NAME)
	} else if let Some(home) = home_dir() {
		home.join(".local").join("state").join(APP_NAME)
	} else {
		PathBuf::from("/tmp").join(APP_NAME)
	}
}

pub fn config_dir() -> PathBuf {
	config_root().join(APP_NAME)
}

/// The pre-split monolithic config, one file of top-level tables. Migrated
/// into `config_dir()` once at daemon startup.
pub fn legacy_config_path() -> PathBuf {
	config_root().join(format!("{}.toml", APP_NAME))
}

fn config_root() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		PathBuf::from(dir)
	} else if let Some(home) = home_dir() {
		home.join(".config")
	} else {
		PathBuf::from("/tmp")
	}
}

pub fn socket_path() -> PathBuf {
	state_dir().join("daemon.sock")
}

pub fn pid_path() -> PathBuf {
	state_dir().join("daemon.pid")
}

fn home_dir() -> Option<PathBuf> {
	std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_wire_tags() {
		let json = serde_json::to_string(&Request::Start { name: "web".into() }).unwrap();
		assert_eq!(json, r#"{"cmd":"start","name":"web"}"#);

		let back: Request = serde_json::from_str(r#"{"cmd":"kill","name":"web"}"#).unwrap();
		assert!(matches!(back, Request::Kill { name } if name == "web"));

		let json = serde_json::to_string(&Request::Reload).unwrap();
		assert_eq!(json, r#"{"cmd":"reload"}"#);
	}

	#[test]
	fn response_wire_tags() {
		let json = serde_json::to_string(&Response::Status {
			snapshot: StatusSnapshot::empty(),
		})
		.unwrap();
		assert_eq!(
			json,
			r#"{"type":"status","snapshot":{"running":0,"paused":0,"killed":100,"done":0}}"#
		);

		let back: Response = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
		assert!(matches!(back, Response::Pong));
	}

	#[test]
	fn paths_follow_xdg_overrides() {
		let tmp = std::env::temp_dir();
		std::env::set_var("XDG_STATE_HOME", &tmp);
		assert_eq!(state_dir(), tmp.join("vigil"));
		assert_eq!(socket_path(), tmp.join("vigil").join("daemon.sock"));
		assert_eq!(pid_path(), tmp.join("vigil").join("daemon.pid"));

		std::env::set_var("XDG_CONFIG_HOME", &tmp);
		assert_eq!(config_dir(), tmp.join("vigil"));
		assert_eq!(legacy_config_path(), tmp.join("vigil.toml"));
	}
}
