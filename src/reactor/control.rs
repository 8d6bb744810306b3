//! Self-wake control channel between registering threads and the reactor.
//!
//! A private pipe. Producers write one fixed-size record per command; the
//! reactor polls the read end alongside its sockets and reads exactly one
//! record per wake. Records are smaller than `PIPE_BUF`, so the kernel
//! never interleaves two of them.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use crate::error::{ReactorError, errno};

/// Size of one encoded control record.
pub(crate) const MESSAGE_SIZE: usize = 16;

const TAG_EXIT: u32 = 0;
const TAG_REGISTER: u32 = 1;
const TAG_DEREGISTER: u32 = 2;

/// One command for the reactor thread.
///
/// `generation` identifies the registration the command belongs to, so a
/// stale command for a descriptor that has since been re-registered can be
/// told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlMessage {
	Exit,
	Register { fd: RawFd, generation: u64 },
	Deregister { fd: RawFd, generation: u64 },
}

/*
Wire layout (native endian, the pipe never leaves the process):
  ┌────────┬────────┬──────────────┐
  │ 0..4   │ 4..8   │ 8..16        │
  ├────────┼────────┼──────────────┤
  │ tag    │ fd     │ generation   │
  └────────┴────────┴──────────────┘
*/

impl ControlMessage {
	pub(crate) fn encode(&self) -> [u8; MESSAGE_SIZE] {
		let (tag, fd, generation) = match *self {
			Self::Exit => (TAG_EXIT, -1, 0),
			Self::Register { fd, generation } => (TAG_REGISTER, fd, generation),
			Self::Deregister { fd, generation } => (TAG_DEREGISTER, fd, generation),
		};
		let mut bytes = [0u8; MESSAGE_SIZE];
		bytes[0..4].copy_from_slice(&tag.to_ne_bytes());
		bytes[4..8].copy_from_slice(&fd.to_ne_bytes());
		bytes[8..16].copy_from_slice(&generation.to_ne_bytes());
		bytes
	}

	pub(crate) fn decode(bytes: &[u8; MESSAGE_SIZE]) -> Result<Self, ReactorError> {
		let mut tag = [0u8; 4];
		let mut fd = [0u8; 4];
		let mut generation = [0u8; 8];
		tag.copy_from_slice(&bytes[0..4]);
		fd.copy_from_slice(&bytes[4..8]);
		generation.copy_from_slice(&bytes[8..16]);

		let fd = RawFd::from_ne_bytes(fd);
		let generation = u64::from_ne_bytes(generation);
		match u32::from_ne_bytes(tag) {
			TAG_EXIT => Ok(Self::Exit),
			TAG_REGISTER => Ok(Self::Register { fd, generation }),
			TAG_DEREGISTER => Ok(Self::Deregister { fd, generation }),
			tag => Err(ReactorError::UnknownCommand { tag }),
		}
	}
}

/// Write end, shared by every registering thread.
#[derive(Debug)]
pub(crate) struct ControlSender {
	fd: OwnedFd,
}

/// Read end, owned by the reactor thread.
#[derive(Debug)]
pub(crate) struct ControlReceiver {
	fd: OwnedFd,
}

/// Opens the pipe. Both ends are non-blocking and close-on-exec.
pub(crate) fn channel() -> std::io::Result<(ControlSender, ControlReceiver)> {
	let mut fds = [0 as libc::c_int; 2];
	let result = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
	if result == -1 {
		return Err(std::io::Error::last_os_error());
	}
	let receiver = ControlReceiver { fd: unsafe { OwnedFd::from_raw_fd(fds[0]) } };
	let sender = ControlSender { fd: unsafe { OwnedFd::from_raw_fd(fds[1]) } };
	Ok((sender, receiver))
}

impl ControlSender {
	/// Writes one record.
	///
	/// Never blocks: a full pipe fails with `EAGAIN` inside
	/// `ReactorError::ControlChannel`. Nothing was written in that case and
	/// the caller may retry once the reactor has drained the pipe.
	pub(crate) fn send(&self, msg: ControlMessage) -> Result<(), ReactorError> {
		let bytes = msg.encode();
		let n = unsafe {
			libc::write(self.fd.as_raw_fd(), bytes.as_ptr() as *const libc::c_void, MESSAGE_SIZE)
		};
		if n == MESSAGE_SIZE as isize {
			return Ok(());
		}
		Err(ReactorError::ControlChannel {
			transferred: n.max(0) as usize,
			expected: MESSAGE_SIZE,
			errno: if n == -1 { errno() } else { 0 },
		})
	}
}

impl ControlReceiver {
	/// Reads exactly one record. A short or failed read is an error and
	/// whatever was read is dropped.
	pub(crate) fn recv(&self) -> Result<ControlMessage, ReactorError> {
		let mut bytes = [0u8; MESSAGE_SIZE];
		let n = unsafe {
			libc::read(self.fd.as_raw_fd(), bytes.as_mut_ptr() as *mut libc::c_void, MESSAGE_SIZE)
		};
		if n != MESSAGE_SIZE as isize {
			return Err(ReactorError::ControlChannel {
				transferred: n.max(0) as usize,
				expected: MESSAGE_SIZE,
				errno: if n == -1 { errno() } else { 0 },
			});
		}
		ControlMessage::decode(&bytes)
	}
}

impl AsRawFd for ControlReceiver {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}
