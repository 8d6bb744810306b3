use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use crate::addr::SockAddr;
use crate::error::SocketError;
use super::{AddrFamily, Protocol, SocketKind};

/// Owns at most one socket descriptor and the address it was bound to.
///
/// Move-only: there is no `Clone`, so exactly one handle closes a given
/// descriptor. Starts out empty; `open` fills it, `close` empties it again
/// and dropping the handle closes whatever it still owns.
#[derive(Debug, Default)]
pub struct SocketHandle {
	fd: Option<OwnedFd>,
	addr: Option<SockAddr>,
}

impl SocketHandle {
	/// Creates an empty handle (no descriptor).
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens a socket into this handle.
	///
	/// Fails with `AlreadyOpen` if the handle already owns a descriptor.
	pub fn open(&mut self, family: AddrFamily, kind: SocketKind, protocol: Protocol) -> std::io::Result<()> {
		if let Some(fd) = &self.fd {
			tracing::error!(fd = fd.as_raw_fd(), "socket is already open");
			return Err(SocketError::AlreadyOpen.into());
		}
		self.fd = Some(super::open_socket(family, kind, protocol)?);
		Ok(())
	}

	/// Binds to `ip:port` and remembers the resolved address.
	pub fn bind(&mut self, ip: &str, port: u16) -> std::io::Result<SockAddr> {
		let addr = super::bind_addr(self.owned()?, ip, port)?;
		self.addr = Some(addr);
		Ok(addr)
	}

	/// Connects to `ip:port`, returning the resolved destination.
	pub fn connect(&self, ip: &str, port: u16) -> std::io::Result<SockAddr> {
		super::connect_to(self.owned()?, ip, port)
	}

	pub fn listen(&self, backlog: i32) -> std::io::Result<()> {
		super::listen(self.owned()?, backlog)
	}

	/// Accepts one connection into a new handle.
	pub fn accept(&self) -> std::io::Result<(SocketHandle, SockAddr)> {
		let (fd, peer) = super::accept(self.owned()?)?;
		Ok((SocketHandle::from(fd), peer))
	}

	/// Closes the descriptor. A no-op when already closed.
	pub fn close(&mut self) {
		self.fd = None;
	}

	/// Closes the descriptor and forgets the bound address.
	pub fn reset(&mut self) {
		self.close();
		self.addr = None;
	}

	#[inline]
	pub fn is_open(&self) -> bool {
		self.fd.is_some()
	}

	/// Returns the raw descriptor, or `None` when closed.
	#[inline]
	pub fn fd(&self) -> Option<RawFd> {
		self.fd.as_ref().map(|fd| fd.as_raw_fd())
	}

	#[inline]
	pub fn as_fd(&self) -> Option<BorrowedFd<'_>> {
		self.fd.as_ref().map(|fd| fd.as_fd())
	}

	/// Address recorded by the last successful `bind`.
	#[inline]
	pub fn local_addr(&self) -> Option<SockAddr> {
		self.addr
	}

	/// Gives up ownership of the descriptor without closing it.
	pub fn into_fd(mut self) -> Option<OwnedFd> {
		self.fd.take()
	}

	pub(crate) fn owned(&self) -> std::io::Result<&OwnedFd> {
		self.fd.as_ref().ok_or_else(|| SocketError::NotOpen.into())
	}
}

impl From<OwnedFd> for SocketHandle {
	fn from(fd: OwnedFd) -> Self {
		Self { fd: Some(fd), addr: None }
	}
}

/*
Descriptor slot:
  None      closed (new, close, reset, after into_fd)
  Some(fd)  open; dropping the handle closes fd
*/
