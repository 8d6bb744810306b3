use std::os::fd::AsRawFd;
use crate::addr::{SockAddr, ToSockAddr};
use crate::error::{SocketError, errno};

/// Binds `socket` to the textual `ip` and `port`.
///
/// The address is resolved first, so malformed text fails before any
/// syscall. Returns the address the socket ended up bound to (with the
/// kernel-chosen port when `port` is 0).
pub fn bind_addr<S: AsRawFd>(socket: &S, ip: &str, port: u16) -> std::io::Result<SockAddr> {
	let addr = SockAddr::parse(ip, port).inspect_err(|_| {
		tracing::error!(ip, "failed to convert bind address");
	})?;

	let result = addr.with_raw(|ptr, len| unsafe {
		libc::bind(socket.as_raw_fd(), ptr, len)
	});

	match result {
		Some(-1) => {
			let err = SocketError::Bind { errno: errno(), addr: addr.to_string() };
			tracing::error!(fd = socket.as_raw_fd(), %addr, error = %err, "bind failed");
			Err(err.into())
		}
		Some(_) => Ok(bound_addr(socket).unwrap_or(addr)),
		None => Err(SocketError::InvalidAddress { reason: "address too long" }.into()),
	}
}

/// Returns the local address of `socket` (`getsockname`).
pub fn bound_addr<S: AsRawFd>(socket: &S) -> std::io::Result<SockAddr> {
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockname(socket.as_raw_fd(), &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
	};
	if result == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "getsockname" }.into());
	}
	SockAddr::from_storage(&storage, len)
		.ok_or_else(|| SocketError::InvalidAddress { reason: "unsupported local address family" }.into())
}

/// Connects `socket` to the textual `ip` and `port`.
///
/// Blocking sockets return once the handshake is done; for SCTP that is
/// bounded by the INIT tuning applied at open time.
pub fn connect_to<S: AsRawFd>(socket: &S, ip: &str, port: u16) -> std::io::Result<SockAddr> {
	let addr = SockAddr::parse(ip, port).inspect_err(|_| {
		tracing::error!(ip, "failed to convert destination address");
	})?;

	let result = addr.with_raw(|ptr, len| unsafe {
		libc::connect(socket.as_raw_fd(), ptr, len)
	});

	match result {
		Some(-1) => {
			let err = SocketError::Connect { errno: errno(), addr: addr.to_string() };
			tracing::info!(fd = socket.as_raw_fd(), %addr, error = %err, "failed to establish connection");
			Err(err.into())
		}
		Some(_) => Ok(addr),
		None => Err(SocketError::InvalidAddress { reason: "address too long" }.into()),
	}
}
