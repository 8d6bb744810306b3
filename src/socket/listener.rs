use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use crate::addr::SockAddr;
use crate::error::{SocketError, errno};
use super::{AddrFamily, Protocol, SocketKind, SocketHandle};

/// Marks `socket` as passive.
///
/// `backlog`: maximum pending connections queue size.
pub fn listen<S: AsRawFd>(socket: &S, backlog: i32) -> std::io::Result<()> {
	let result = unsafe { libc::listen(socket.as_raw_fd(), backlog) };
	if result == -1 {
		let err = SocketError::Listen { errno: errno(), backlog };
		tracing::error!(fd = socket.as_raw_fd(), error = %err, "failed to listen for incoming connections");
		return Err(err.into());
	}
	Ok(())
}

/// Accepts one pending connection, blocking if the listener is blocking.
///
/// Returns the connected socket and the peer's address. Works for TCP and
/// one-to-one SCTP listeners alike.
pub fn accept<S: AsRawFd>(socket: &S) -> std::io::Result<(OwnedFd, SockAddr)> {
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

	let fd = unsafe {
		libc::accept4(
			socket.as_raw_fd(),
			&mut storage as *mut _ as *mut libc::sockaddr,
			&mut len,
			libc::SOCK_CLOEXEC,
		)
	};

	if fd == -1 {
		let err = SocketError::Accept { errno: errno() };
		tracing::error!(fd = socket.as_raw_fd(), error = %err, "failed to accept connection");
		return Err(err.into());
	}

	let fd = unsafe { OwnedFd::from_raw_fd(fd) };
	let addr = SockAddr::from_storage(&storage, len)
		.ok_or(SocketError::InvalidAddress { reason: "invalid client address" })?;

	Ok((fd, addr))
}

/// Opens an IPv4 SCTP socket of `kind` and binds it.
///
/// On a bind failure the handle is reset, so it never stays half set up.
pub fn sctp_init_socket(socket: &mut SocketHandle, kind: SocketKind, ip: &str, port: u16) -> std::io::Result<()> {
	socket.open(AddrFamily::Ipv4, kind, Protocol::Sctp)?;
	if let Err(e) = socket.bind(ip, port) {
		socket.reset();
		return Err(e);
	}
	Ok(())
}

/// SCTP client endpoint: bound to `ip` on an ephemeral port.
pub fn sctp_init_client(socket: &mut SocketHandle, kind: SocketKind, ip: &str) -> std::io::Result<()> {
	sctp_init_socket(socket, kind, ip, 0)
}

/// SCTP server endpoint: bound to `ip:port` and listening with `SOMAXCONN`.
pub fn sctp_init_server(socket: &mut SocketHandle, kind: SocketKind, ip: &str, port: u16) -> std::io::Result<()> {
	sctp_init_socket(socket, kind, ip, port)?;
	socket.listen(libc::SOMAXCONN)
}

/// TCP server endpoint: IPv4 stream socket bound to `ip:port`, listening
/// with room for `backlog` pending connections.
pub fn tcp_make_server(socket: &mut SocketHandle, ip: &str, port: u16, backlog: i32) -> std::io::Result<()> {
	socket.open(AddrFamily::Ipv4, SocketKind::Stream, Protocol::Tcp)?;
	if let Err(e) = socket.bind(ip, port) {
		socket.reset();
		return Err(e);
	}
	socket.listen(backlog)
}
