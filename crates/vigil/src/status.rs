use tokio::sync::watch;

use crate::registry::Registry;
use crate::types::StatusSnapshot;

/// The four mutually exclusive classifications used for aggregate health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
	Running,
	Paused,
	Killed,
	Done,
}

/// Bucket precedence: a clean exit is `Done`, any other non-running handle
/// is `Killed`, then live handles split on the paused flag.
pub fn classify(running: bool, paused: bool, returncode: i32) -> Bucket {
	if !running && !paused && returncode == 0 {
		Bucket::Done
	} else if !running {
		Bucket::Killed
	} else if !paused {
		Bucket::Running
	} else {
		Bucket::Paused
	}
}

/// Classify every registry entry from scratch and fold the counts into
/// rounded integer percentages.
pub async fn sample(registry: &Registry) -> StatusSnapshot {
	let handles = registry.handles().await;
	let total = handles.len();
	if total == 0 {
		return StatusSnapshot::empty();
	}

	let mut counts = [0usize; 4];
	for (_, handle) in handles {
		let mut h = handle.lock().await;
		let bucket = classify(h.running(), h.paused(), h.returncode());
		let slot = match bucket {
			Bucket::Running => 0,
			Bucket::Paused => 1,
			Bucket::Killed => 2,
			Bucket::Done => 3,
		};
		counts[slot] += 1;
	}

	StatusSnapshot {
		running: percent(counts[0], total),
		paused: percent(counts[1], total),
		killed: percent(counts[2], total),
		done: percent(counts[3], total),
	}
}

fn percent(count: usize, total: usize) -> u8 {
	((count as f64 / total as f64) * 100.0).round() as u8
}

/// Cache for the latest snapshot: the sampler publishes an immutable value
/// each tick, pull queries read it for free, and push consumers hold a
/// [`watch::Receiver`] that wakes on every re-broadcast.
pub struct StatusFeed {
	tx: watch::Sender<StatusSnapshot>,
}

impl StatusFeed {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(StatusSnapshot::empty());
		Self { tx }
	}

	pub fn current(&self) -> StatusSnapshot {
		*self.tx.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
		self.tx.subscribe()
	}

	pub fn publish(&self, snapshot: StatusSnapshot) {
		self.tx.send_replace(snapshot);
	}
}

impl Default for StatusFeed {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::PENDING_EXIT;

	#[test]
	fn classification_precedence() {
		assert_eq!(classify(false, false, 0), Bucket::Done);
		assert_eq!(classify(false, false, 1), Bucket::Killed);
		assert_eq!(classify(false, false, -15), Bucket::Killed);
		assert_eq!(classify(false, false, PENDING_EXIT), Bucket::Killed);
		assert_eq!(classify(true, false, PENDING_EXIT), Bucket::Running);
		assert_eq!(classify(true, true, PENDING_EXIT), Bucket::Paused);
	}

	#[test]
	fn percent_rounds_to_nearest() {
		assert_eq!(percent(1, 3), 33);
		assert_eq!(percent(2, 3), 67);
		assert_eq!(percent(1, 1), 100);
		assert_eq!(percent(0, 5), 0);
	}

	#[test]
	fn feed_caches_latest_value() {
		let feed = StatusFeed::new();
		assert_eq!(feed.current(), StatusSnapshot::empty());

		let snapshot = StatusSnapshot {
			running: 50,
			paused: 0,
			killed: 50,
			done: 0,
		};
		feed.publish(snapshot);
		assert_eq!(feed.current(), snapshot);

		let mut rx = feed.subscribe();
		feed.publish(snapshot);
		assert!(rx.has_changed().unwrap());
		assert_eq!(*rx.borrow_and_update(), snapshot);
	}
}
