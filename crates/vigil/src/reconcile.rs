use std::collections::BTreeMap;

use crate::config::ConfigStore;
use crate::registry::Registry;
use crate::types::ProcessSpec;

/// One reconciliation pass: load the full config snapshot, take the set of
/// names whose file content changed, and (re)start exactly those whose spec
/// has autostart enabled. Unchanged names are left alone, even if their
/// process has since crashed — reload reacts to configuration edits, not to
/// process health.
///
/// Returns the fresh snapshot and the names that were (re)started.
pub async fn reconcile(
	store: &mut ConfigStore,
	registry: &Registry,
) -> (BTreeMap<String, ProcessSpec>, Vec<String>) {
	let specs = store.load_all();
	let changed = store.take_changed();

	let mut started = Vec::new();
	for name in &changed {
		// A file can disappear between the scan and this pass.
		let Some(spec) = specs.get(name) else {
			continue;
		};
		if !spec.autostart {
			tracing::debug!("{}: changed but autostart is off", name);
			continue;
		}
		tracing::info!("loading {}", name);
		match registry.start(name, spec.clone()).await {
			Ok(()) => started.push(name.clone()),
			Err(e) => tracing::warn!("{}: failed to start: {}", name, e),
		}
	}
	(specs, started)
}
