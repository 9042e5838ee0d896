use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};

use crate::config::ConfigStore;
use crate::error::SupervisorError;
use crate::reconcile;
use crate::registry::Registry;
use crate::status::{self, StatusFeed};
use crate::types::{ProcSummary, ProcessSpec, StatusSnapshot};

pub struct SupervisorConfig {
	pub config_dir: PathBuf,
	/// Legacy monolithic config file, split into per-process files once at
	/// construction if present.
	pub legacy_config: Option<PathBuf>,
	/// Retained output lines per process. `None` keeps everything.
	pub scrollback: Option<usize>,
	pub sample_period: Duration,
}

/// The engine facade consumed by external collaborators (daemon, CLI,
/// dashboards): registry operations by name, config-driven reload, and the
/// cached status snapshot.
pub struct Supervisor {
	registry: Registry,
	store: Mutex<ConfigStore>,
	specs: RwLock<BTreeMap<String, ProcessSpec>>,
	feed: StatusFeed,
	sample_period: Duration,
}

impl Supervisor {
	pub fn new(config: SupervisorConfig) -> Arc<Self> {
		let store = ConfigStore::new(&config.config_dir);
		if let Some(legacy) = &config.legacy_config {
			store.migrate_legacy(legacy);
		}
		Arc::new(Self {
			registry: Registry::new(config.scrollback),
			store: Mutex::new(store),
			specs: RwLock::new(BTreeMap::new()),
			feed: StatusFeed::new(),
			sample_period: config.sample_period,
		})
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Run one reconciliation pass. The store mutex serializes reloads, so
	/// two concurrent calls cannot interleave their change detection.
	pub async fn reload(&self) -> Vec<String> {
		let mut store = self.store.lock().await;
		let (specs, started) = reconcile::reconcile(&mut store, &self.registry).await;
		*self.specs.write().await = specs;
		started
	}

	/// Spawn `name` from its last loaded spec. Explicit start beats the
	/// spec's autostart hint.
	pub async fn start(&self, name: &str) -> Result<(), SupervisorError> {
		let spec = self
			.specs
			.read()
			.await
			.get(name)
			.cloned()
			.ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
		self.registry.start(name, spec).await
	}

	pub async fn kill(&self, name: &str) -> Result<(), SupervisorError> {
		let handle = self.registry.get(name).await?;
		let mut h = handle.lock().await;
		h.kill()
	}

	/// Kill, then reapply the spec the handle was last started with.
	pub async fn restart(&self, name: &str) -> Result<(), SupervisorError> {
		let handle = self.registry.get(name).await?;
		let spec = {
			let mut h = handle.lock().await;
			h.kill()?;
			h.spec().clone()
		};
		self.registry.start(name, spec).await
	}

	pub async fn pause(&self, name: &str) -> Result<(), SupervisorError> {
		let handle = self.registry.get(name).await?;
		let mut h = handle.lock().await;
		h.pause()
	}

	pub async fn resume(&self, name: &str) -> Result<(), SupervisorError> {
		let handle = self.registry.get(name).await?;
		let mut h = handle.lock().await;
		h.resume()
	}

	/// Pump and return the full retained output of `name`.
	pub async fn output(&self, name: &str) -> Result<String, SupervisorError> {
		let handle = self.registry.get(name).await?;
		let mut h = handle.lock().await;
		Ok(h.pump())
	}

	pub async fn list(&self) -> Vec<ProcSummary> {
		self.registry.list().await
	}

	/// The sampler's cached snapshot; free to read at any rate.
	pub fn status(&self) -> StatusSnapshot {
		self.feed.current()
	}

	/// Push-style variant: the receiver wakes on every sampler tick with
	/// the same cached value the pull side reads.
	pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
		self.feed.subscribe()
	}

	pub async fn kill_all(&self) {
		self.registry.kill_all().await;
	}

	/// Background sampler: reclassify the registry every period and publish
	/// the result. Sleeps the full period between ticks and performs no
	/// subprocess IO.
	pub fn spawn_sampler(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let sup = Arc::clone(self);
		tokio::spawn(async move {
			loop {
				let snapshot = status::sample(&sup.registry).await;
				sup.feed.publish(snapshot);
				tokio::time::sleep(sup.sample_period).await;
			}
		})
	}
}
