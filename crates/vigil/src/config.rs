use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::types::ProcessSpec;

/// Loads a directory of per-process TOML files and tracks which ones have
/// changed between reloads.
///
/// Change detection compares a per-file fingerprint of the file's bytes
/// against the previous reload: differing bytes mean a changed spec,
/// independent of mtimes and clocks.
pub struct ConfigStore {
	dir: PathBuf,
	fingerprints: HashMap<String, u64>,
}

impl ConfigStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			fingerprints: HashMap::new(),
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// One-shot migration of the legacy monolithic config: every top-level
	/// table becomes `<dir>/<name>.toml`, then the original file is removed.
	pub fn migrate_legacy(&self, legacy: &Path) {
		if !legacy.exists() {
			return;
		}
		let content = match std::fs::read_to_string(legacy) {
			Ok(c) => c,
			Err(e) => {
				tracing::warn!("failed to read {}: {}", legacy.display(), e);
				return;
			}
		};
		let table: toml::Table = match toml::from_str(&content) {
			Ok(t) => t,
			Err(e) => {
				tracing::warn!("failed to parse {}: {}", legacy.display(), e);
				return;
			}
		};

		let _ = std::fs::create_dir_all(&self.dir);
		for (name, value) in &table {
			let Some(body) = value.as_table() else {
				tracing::warn!("skipping '{}' in {}: not a table", name, legacy.display());
				continue;
			};
			let path = self.dir.join(format!("{}.toml", name));
			match toml::to_string(body) {
				Ok(text) => {
					if let Err(e) = std::fs::write(&path, text) {
						tracing::warn!("failed to write {}: {}", path.display(), e);
					} else {
						tracing::info!("migrated '{}' to {}", name, path.display());
					}
				}
				Err(e) => tracing::warn!("failed to serialize '{}': {}", name, e),
			}
		}
		let _ = std::fs::remove_file(legacy);
	}

	/// Config files directly under the directory, skipping editor backup
	/// artifacts (`name~`, `name#`). A missing directory is created empty.
	pub fn list_files(&self) -> Vec<PathBuf> {
		if !self.dir.exists() {
			let _ = std::fs::create_dir_all(&self.dir);
		}
		let entries = match std::fs::read_dir(&self.dir) {
			Ok(e) => e,
			Err(e) => {
				tracing::warn!("failed to read {}: {}", self.dir.display(), e);
				return Vec::new();
			}
		};

		let mut files: Vec<PathBuf> = entries
			.flatten()
			.map(|entry| entry.path())
			.filter(|path| path.is_file())
			.filter(|path| {
				let name = path.file_name().unwrap_or_default().to_string_lossy();
				!name.ends_with('~') && !name.ends_with('#')
			})
			.collect();
		files.sort();
		files
	}

	/// Parse every config file into a spec keyed by file stem. A file that
	/// fails to read or parse is skipped with a warning; the others load.
	pub fn load_all(&self) -> BTreeMap<String, ProcessSpec> {
		let mut specs = BTreeMap::new();
		for path in self.list_files() {
			let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};
			let content = match std::fs::read_to_string(&path) {
				Ok(c) => c,
				Err(e) => {
					tracing::warn!("failed to read {}: {}", path.display(), e);
					continue;
				}
			};
			match toml::from_str::<ProcessSpec>(&content) {
				Ok(mut spec) => {
					spec.name = stem.to_string();
					specs.insert(stem.to_string(), spec);
				}
				Err(e) => tracing::warn!("failed to parse {}: {}", path.display(), e),
			}
		}
		specs
	}

	/// Names whose file content differs from the previous call. Each call
	/// replaces the stored fingerprints, so callers run exactly one call
	/// per reload cycle.
	pub fn take_changed(&mut self) -> BTreeSet<String> {
		let mut next = HashMap::new();
		let mut changed = BTreeSet::new();
		for path in self.list_files() {
			let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};
			let Ok(content) = std::fs::read(&path) else {
				continue;
			};
			let fingerprint = hash_bytes(&content);
			if self.fingerprints.get(stem) != Some(&fingerprint) {
				changed.insert(stem.to_string());
			}
			next.insert(stem.to_string(), fingerprint);
		}
		self.fingerprints = next;
		changed
	}
}

fn hash_bytes(bytes: &[u8]) -> u64 {
	let mut hasher = DefaultHasher::new();
	bytes.hash(&mut hasher);
	hasher.finish()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

	fn temp_dir(name: &str) -> PathBuf {
		let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
		let dir = std::env::temp_dir().join(format!("vigil-config-{}-{}", n, name));
		let _ = std::fs::remove_dir_all(&dir);
		dir
	}

	#[test]
	fn missing_dir_is_created_empty() {
		let dir = temp_dir("missing");
		let store = ConfigStore::new(&dir);
		assert!(store.list_files().is_empty());
		assert!(dir.exists());
		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn backup_artifacts_are_skipped() {
		let dir = temp_dir("backups");
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("web.toml"), "command = \"echo hi\"").unwrap();
		std::fs::write(dir.join("web.toml~"), "command = \"stale\"").unwrap();
		std::fs::write(dir.join("#web.toml#"), "command = \"stale\"").unwrap();
		let store = ConfigStore::new(&dir);
		assert_eq!(store.list_files().len(), 1);
		assert_eq!(store.load_all().len(), 1);
		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn malformed_file_does_not_abort_the_rest() {
		let dir = temp_dir("malformed");
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("good.toml"), "command = \"echo ok\"").unwrap();
		std::fs::write(dir.join("bad.toml"), "command = [not toml").unwrap();
		let store = ConfigStore::new(&dir);
		let specs = store.load_all();
		assert_eq!(specs.len(), 1);
		assert!(specs.contains_key("good"));
		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn changed_set_tracks_content_not_time() {
		let dir = temp_dir("changed");
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("a.toml"), "command = \"sleep 1\"").unwrap();
		std::fs::write(dir.join("b.toml"), "command = \"sleep 2\"").unwrap();

		let mut store = ConfigStore::new(&dir);
		let first = store.take_changed();
		assert_eq!(first.len(), 2);

		// Rewriting identical bytes is not a change.
		std::fs::write(dir.join("a.toml"), "command = \"sleep 1\"").unwrap();
		assert!(store.take_changed().is_empty());

		std::fs::write(dir.join("b.toml"), "command = \"sleep 99\"").unwrap();
		let third = store.take_changed();
		assert_eq!(third.into_iter().collect::<Vec<_>>(), vec!["b".to_string()]);
		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn legacy_file_is_split_once() {
		let dir = temp_dir("legacy");
		let legacy = std::env::temp_dir().join(format!(
			"vigil-legacy-{}.toml",
			TEST_COUNTER.fetch_add(1, Ordering::SeqCst)
		));
		std::fs::write(
			&legacy,
			"[web]\ncommand = \"echo web\"\n\n[worker]\ncommand = \"echo worker\"\nstart = false\n",
		)
		.unwrap();

		let store = ConfigStore::new(&dir);
		store.migrate_legacy(&legacy);

		assert!(!legacy.exists());
		let specs = store.load_all();
		assert_eq!(specs.len(), 2);
		assert!(specs["web"].autostart);
		assert!(!specs["worker"].autostart);

		// Running the migration again with the file gone changes nothing.
		store.migrate_legacy(&legacy);
		assert_eq!(store.load_all().len(), 2);
		let _ = std::fs::remove_dir_all(&dir);
	}
}
