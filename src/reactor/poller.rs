//! The reactor's master readiness set.
//!
//! Slot 0 always holds the control channel's read end; every other slot is
//! a descriptor the reactor thread itself has applied as live, tagged with
//! the registration generation it was applied for.

use std::os::fd::RawFd;

const READABLE: libc::c_short = libc::POLLIN | libc::POLLPRI | libc::POLLERR | libc::POLLHUP;

/// What a wait reported for one live descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
	/// Data, an error or a hangup is pending; the task should try one receive.
	Readable { fd: RawFd, generation: u64 },
	/// The descriptor number is no longer open (`POLLNVAL`).
	Closed { fd: RawFd, generation: u64 },
}

pub(crate) struct ReadinessSet {
	fds: Vec<libc::pollfd>,
	generations: Vec<u64>,
}

impl ReadinessSet {
	pub(crate) fn new(control: RawFd) -> Self {
		Self {
			fds: vec![libc::pollfd { fd: control, events: libc::POLLIN, revents: 0 }],
			generations: vec![0],
		}
	}

	/// Live data descriptors (the control slot not counted).
	#[inline]
	pub(crate) fn len(&self) -> usize {
		self.fds.len() - 1
	}

	fn position(&self, fd: RawFd) -> Option<usize> {
		self.fds.iter().skip(1).position(|p| p.fd == fd).map(|i| i + 1)
	}

	/// Starts watching `fd`. Re-inserting replaces the recorded generation.
	pub(crate) fn insert(&mut self, fd: RawFd, generation: u64) {
		match self.position(fd) {
			Some(i) => {
				self.generations[i] = generation;
				self.fds[i].revents = 0;
			}
			None => {
				self.fds.push(libc::pollfd { fd, events: libc::POLLIN, revents: 0 });
				self.generations.push(generation);
			}
		}
	}

	/// Stops watching `fd`. Returns whether it was being watched.
	pub(crate) fn remove(&mut self, fd: RawFd) -> bool {
		match self.position(fd) {
			Some(i) => {
				self.fds.swap_remove(i);
				self.generations.swap_remove(i);
				true
			}
			None => false,
		}
	}

	/// Blocks until something in the set is ready. No timeout.
	pub(crate) fn wait(&mut self) -> std::io::Result<usize> {
		for p in &mut self.fds {
			p.revents = 0;
		}
		let n = unsafe { libc::poll(self.fds.as_mut_ptr(), self.fds.len() as libc::nfds_t, -1) };
		if n == -1 {
			return Err(std::io::Error::last_os_error());
		}
		Ok(n as usize)
	}

	/// Whether the last wait reported the control channel readable.
	#[inline]
	pub(crate) fn control_ready(&self) -> bool {
		self.fds[0].revents & READABLE != 0
	}

	/// Appends the data descriptors the last wait reported, in set order.
	pub(crate) fn collect_ready(&self, out: &mut Vec<Readiness>) {
		for (p, &generation) in self.fds.iter().zip(&self.generations).skip(1) {
			if p.revents & libc::POLLNVAL != 0 {
				out.push(Readiness::Closed { fd: p.fd, generation });
			} else if p.revents & READABLE != 0 {
				out.push(Readiness::Readable { fd: p.fd, generation });
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::os::fd::AsRawFd;

	#[test]
	fn insert_replace_remove() {
		let mut set = ReadinessSet::new(100);
		set.insert(5, 1);
		set.insert(6, 2);
		set.insert(5, 3);
		assert_eq!(set.len(), 2);
		assert!(set.position(5).is_some());

		assert!(set.remove(5));
		assert!(!set.remove(5));
		assert!(set.position(5).is_none());
		assert_eq!(set.generations[set.position(6).unwrap()], 2);
		assert!(!set.remove(100));
	}

	fn pipe() -> (std::os::fd::OwnedFd, std::os::fd::OwnedFd) {
		use std::os::fd::{FromRawFd, OwnedFd};
		let mut fds = [0 as libc::c_int; 2];
		assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
		unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
	}

	#[test]
	fn reports_readable_descriptor_with_generation() {
		let (control, _control_writer) = pipe();
		let (reader, writer) = pipe();
		let byte = 1u8;
		assert_eq!(unsafe { libc::write(writer.as_raw_fd(), &byte as *const u8 as *const libc::c_void, 1) }, 1);

		let mut set = ReadinessSet::new(control.as_raw_fd());
		set.insert(reader.as_raw_fd(), 7);
		assert_eq!(set.wait().unwrap(), 1);
		assert!(!set.control_ready());

		let mut ready = Vec::new();
		set.collect_ready(&mut ready);
		assert_eq!(ready, vec![Readiness::Readable { fd: reader.as_raw_fd(), generation: 7 }]);
	}
}
