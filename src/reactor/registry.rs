use std::collections::BTreeMap;
use std::os::fd::{BorrowedFd, RawFd};
use crate::error::ReactorError;
use super::task::ReceiveTask;

/// Where a registration stands with respect to the reactor thread.
///
/// - `Pending`: in the registry, but the reactor has not yet applied the
///   matching register command, so the descriptor is not being watched.
/// - `Active`: the reactor watches the descriptor and dispatches its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
	Pending,
	Active,
}

pub(crate) struct Entry {
	task: Box<dyn ReceiveTask>,
	state: RegistrationState,
	generation: u64,
}

impl Entry {
	#[inline]
	pub(crate) fn into_task(self) -> Box<dyn ReceiveTask> {
		self.task
	}
}

impl std::fmt::Debug for Entry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Entry")
			.field("state", &self.state)
			.field("generation", &self.generation)
			.finish_non_exhaustive()
	}
}

/// Descriptor -> task map shared between callers and the reactor thread.
///
/// Every insert gets a fresh generation number. Commands travelling through
/// the control channel carry it, which lets the reactor ignore a command
/// that belongs to an earlier registration of the same descriptor value.
#[derive(Debug, Default)]
pub(crate) struct Registry {
	entries: BTreeMap<RawFd, Entry>,
	next_generation: u64,
}

impl Registry {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	#[inline]
	pub(crate) fn contains(&self, fd: RawFd) -> bool {
		self.entries.contains_key(&fd)
	}

	#[inline]
	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	/// Adds a `Pending` entry and returns its generation.
	pub(crate) fn insert(&mut self, fd: RawFd, task: Box<dyn ReceiveTask>) -> Result<u64, ReactorError> {
		if self.contains(fd) {
			return Err(ReactorError::AlreadyRegistered { fd });
		}
		self.next_generation += 1;
		let generation = self.next_generation;
		self.entries.insert(fd, Entry { task, state: RegistrationState::Pending, generation });
		Ok(generation)
	}

	pub(crate) fn remove(&mut self, fd: RawFd) -> Option<Entry> {
		self.entries.remove(&fd)
	}

	/// Removes the entry only if it is still the registration `generation`.
	pub(crate) fn remove_generation(&mut self, fd: RawFd, generation: u64) -> Option<Entry> {
		match self.entries.get(&fd) {
			Some(entry) if entry.generation == generation => self.entries.remove(&fd),
			_ => None,
		}
	}

	/// Pending -> Active. Returns `false` when the entry is gone or belongs
	/// to a different generation.
	pub(crate) fn activate(&mut self, fd: RawFd, generation: u64) -> bool {
		match self.entries.get_mut(&fd) {
			Some(entry) if entry.generation == generation => {
				entry.state = RegistrationState::Active;
				true
			}
			_ => false,
		}
	}

	pub(crate) fn generation(&self, fd: RawFd) -> Option<u64> {
		self.entries.get(&fd).map(|entry| entry.generation)
	}

	pub(crate) fn state(&self, fd: RawFd) -> Option<RegistrationState> {
		self.entries.get(&fd).map(|entry| entry.state)
	}

	/// Runs the task of an `Active` entry of the given generation.
	///
	/// Returns `None` when nothing was dispatched, otherwise the task's
	/// keep-registered answer. On `false` the entry is already removed.
	pub(crate) fn dispatch(&mut self, fd: BorrowedFd<'_>, generation: u64) -> Option<bool> {
		use std::os::fd::AsRawFd;

		let raw = fd.as_raw_fd();
		let entry = self.entries.get_mut(&raw)?;
		if entry.generation != generation || entry.state != RegistrationState::Active {
			return None;
		}
		let keep = entry.task.attempt(fd);
		if !keep {
			self.entries.remove(&raw);
		}
		Some(keep)
	}

	pub(crate) fn clear(&mut self) {
		self.entries.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::os::fd::{AsFd, AsRawFd};
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn counting_task(hits: &Arc<AtomicUsize>, keep: bool) -> Box<dyn ReceiveTask> {
		let hits = Arc::clone(hits);
		Box::new(move |_: BorrowedFd<'_>| {
			hits.fetch_add(1, Ordering::SeqCst);
			keep
		})
	}

	#[test]
	fn pending_until_activated() {
		let stdin = std::io::stdin();
		let fd = stdin.as_fd();
		let hits = Arc::new(AtomicUsize::new(0));

		let mut registry = Registry::new();
		let generation = registry.insert(fd.as_raw_fd(), counting_task(&hits, true)).unwrap();
		assert_eq!(registry.state(fd.as_raw_fd()), Some(RegistrationState::Pending));
		assert_eq!(registry.dispatch(fd, generation), None);

		assert!(registry.activate(fd.as_raw_fd(), generation));
		assert_eq!(registry.state(fd.as_raw_fd()), Some(RegistrationState::Active));
		assert_eq!(registry.dispatch(fd, generation), Some(true));
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn duplicate_insert_keeps_original() {
		let hits = Arc::new(AtomicUsize::new(0));
		let other = Arc::new(AtomicUsize::new(0));
		let mut registry = Registry::new();
		let generation = registry.insert(0, counting_task(&hits, true)).unwrap();
		assert!(matches!(
			registry.insert(0, counting_task(&other, true)),
			Err(ReactorError::AlreadyRegistered { fd: 0 })
		));

		registry.activate(0, generation);
		let stdin = std::io::stdin();
		registry.dispatch(stdin.as_fd(), generation);
		assert_eq!(hits.load(Ordering::SeqCst), 1);
		assert_eq!(other.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn stale_generation_is_ignored() {
		let hits = Arc::new(AtomicUsize::new(0));
		let mut registry = Registry::new();
		let first = registry.insert(0, counting_task(&hits, true)).unwrap();
		registry.remove(0);
		let second = registry.insert(0, counting_task(&hits, true)).unwrap();
		assert_ne!(first, second);

		assert!(!registry.activate(0, first));
		assert_eq!(registry.state(0), Some(RegistrationState::Pending));
		assert!(registry.remove_generation(0, first).is_none());
		assert!(registry.activate(0, second));
	}

	#[test]
	fn task_returning_false_is_removed() {
		let hits = Arc::new(AtomicUsize::new(0));
		let mut registry = Registry::new();
		let generation = registry.insert(0, counting_task(&hits, false)).unwrap();
		registry.activate(0, generation);

		let stdin = std::io::stdin();
		assert_eq!(registry.dispatch(stdin.as_fd(), generation), Some(false));
		assert!(!registry.contains(0));
		assert_eq!(registry.len(), 0);
	}
}
