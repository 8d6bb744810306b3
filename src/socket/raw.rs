use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use crate::error::{SocketError, errno};
use super::{AddrFamily, Protocol, SocketKind, sctp};

/// Opens a socket for `family`/`kind`/`protocol`.
///
/// The socket is created with `SOCK_CLOEXEC` (close on exec) and returned
/// as an `OwnedFd`, so every error path below closes it on drop.
///
/// SCTP sockets are additionally prepared for control-plane use:
/// - subscribed to data-I/O, shutdown and peer-address-change events.
///   A failure here is logged and otherwise ignored.
/// - tuned for fast failure detection (see `sctp::tune_failure_detection`).
///   A failure here fails the whole call.
pub fn open_socket(family: AddrFamily, kind: SocketKind, protocol: Protocol) -> std::io::Result<OwnedFd> {
	let fd = unsafe {
		libc::socket(family.raw(), kind.raw() | libc::SOCK_CLOEXEC, protocol.raw())
	};
	if fd == -1 {
		let err = SocketError::Create { errno: errno(), protocol: protocol.as_str() };
		tracing::error!(%protocol, error = %err, "failed to open socket");
		return Err(err.into());
	}
	let fd = unsafe { OwnedFd::from_raw_fd(fd) };

	if protocol == Protocol::Sctp {
		if let Err(e) = sctp::subscribe_events(&fd) {
			tracing::warn!(fd = fd.as_raw_fd(), error = %e, "failed to subscribe to SCTP events");
		}
		if let Err(e) = sctp::tune_failure_detection(&fd) {
			tracing::error!(fd = fd.as_raw_fd(), error = %e, "failed to tune SCTP timers");
			return Err(e);
		}
	}

	Ok(fd)
}

/// Returns the kind of an open socket, read back through `SO_TYPE`.
///
/// `None` for negative descriptors, non-sockets and unknown kinds.
pub fn socket_kind(fd: std::os::fd::RawFd) -> Option<SocketKind> {
	if fd < 0 {
		return None;
	}
	let mut kind: libc::c_int = 0;
	let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			fd,
			libc::SOL_SOCKET,
			libc::SO_TYPE,
			&mut kind as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		return None;
	}
	SocketKind::from_raw(kind)
}

