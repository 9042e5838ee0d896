use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::SupervisorError;
use crate::handle::ProcessHandle;
use crate::types::{ProcSummary, ProcessSpec};

/// The authoritative name → handle mapping.
///
/// The outer lock guards the map's structure; each handle carries its own
/// mutex, so operations on two different names run concurrently while
/// structural changes and full scans stay mutually exclusive.
pub struct Registry {
	procs: RwLock<HashMap<String, Arc<Mutex<ProcessHandle>>>>,
	scrollback: Option<usize>,
}

impl Registry {
	pub fn new(scrollback: Option<usize>) -> Self {
		Self {
			procs: RwLock::new(HashMap::new()),
			scrollback,
		}
	}

	/// Install a fresh handle for `name`, killing the previous process
	/// group first if it is still running. Restart is destructive: the old
	/// handle is superseded, never reused.
	pub async fn start(&self, name: &str, spec: ProcessSpec) -> Result<(), SupervisorError> {
		let mut procs = self.procs.write().await;
		if let Some(existing) = procs.get(name) {
			let mut old = existing.lock().await;
			if old.running() {
				old.kill()?;
			}
		}

		let mut handle = ProcessHandle::new(spec, self.scrollback);
		handle.start()?;
		procs.insert(name.to_string(), Arc::new(Mutex::new(handle)));
		Ok(())
	}

	pub async fn get(&self, name: &str) -> Result<Arc<Mutex<ProcessHandle>>, SupervisorError> {
		let procs = self.procs.read().await;
		procs
			.get(name)
			.cloned()
			.ok_or_else(|| SupervisorError::NotFound(name.to_string()))
	}

	/// Snapshot of the current entries; the map lock is released before the
	/// caller touches any handle.
	pub async fn handles(&self) -> Vec<(String, Arc<Mutex<ProcessHandle>>)> {
		let procs = self.procs.read().await;
		procs
			.iter()
			.map(|(name, handle)| (name.clone(), Arc::clone(handle)))
			.collect()
	}

	pub async fn list(&self) -> Vec<ProcSummary> {
		let mut rows = Vec::new();
		for (name, handle) in self.handles().await {
			let mut h = handle.lock().await;
			rows.push(ProcSummary {
				name,
				running: h.running(),
				paused: h.paused(),
				returncode: h.returncode(),
			});
		}
		rows.sort_by(|a, b| a.name.cmp(&b.name));
		rows
	}

	/// Best-effort kill of everything; one stuck handle cannot block the
	/// shutdown of the rest.
	pub async fn kill_all(&self) {
		for (name, handle) in self.handles().await {
			let mut h = handle.lock().await;
			if let Err(e) = h.kill() {
				tracing::warn!("{}: kill failed during shutdown: {}", name, e);
			}
		}
	}
}
