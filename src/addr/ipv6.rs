use std::net::Ipv6Addr;
use crate::addr::ToSockAddr;
use crate::error::SocketError;

/// IPv6 socket address (IP + port + scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketAddrV6 {
	ip: [u8; 16],
	port: u16,
	/// Scope ID for link-local addresses (identifies network interface).
	/// Usually 0 unless using link-local addresses like fe80::.
	scope_id: u32,
}

impl SocketAddrV6 {
	/// Creates a new IPv6 address.
	pub fn new(ip: [u8; 16], port: u16) -> Self {
		Self { ip, port, scope_id: 0 }
	}

	/// Creates with explicit scope ID.
	///
	/// Use for link-local addresses (fe80::) where you need to specify the interface.
	pub fn with_scope(ip: [u8; 16], port: u16, scope_id: u32) -> Self {
		Self { ip, port, scope_id }
	}

	/// Parses RFC 4291 text (e.g. "::1") and pairs it with `port`.
	pub fn parse(ip: &str, port: u16) -> Result<Self, SocketError> {
		let parsed: Ipv6Addr = ip
			.parse()
			.map_err(|_| SocketError::InvalidAddress { reason: "not an IPv6 address" })?;
		Ok(Self::new(parsed.octets(), port))
	}

	/// Overwrites IP and port from text, keeping `self` intact on failure.
	pub fn assign(&mut self, ip: &str, port: u16) -> Result<(), SocketError> {
		let parsed = Self::parse(ip, port)?;
		self.ip = parsed.ip;
		self.port = parsed.port;
		Ok(())
	}

	/// Returns the IP bytes.
	pub fn ip(&self) -> [u8; 16] {
		self.ip
	}

	/// Returns the IP in RFC 5952 form.
	pub fn ip_string(&self) -> String {
		Ipv6Addr::from(self.ip).to_string()
	}

	/// Returns the port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Returns the scope ID.
	pub fn scope_id(&self) -> u32 {
		self.scope_id
	}

	/// Converts to the raw sockaddr_in6 for syscalls.
	pub(crate) fn to_raw(&self) -> libc::sockaddr_in6 {
		libc::sockaddr_in6 {
			sin6_family: libc::AF_INET6 as libc::sa_family_t,
			sin6_port: self.port.to_be(),
			sin6_flowinfo: 0,
			sin6_addr: libc::in6_addr {
				s6_addr: self.ip,
			},
			sin6_scope_id: self.scope_id,
		}
	}

	/// Creates from raw sockaddr_in6.
	pub(crate) fn from_raw(raw: &libc::sockaddr_in6) -> Self {
		Self {
			ip: raw.sin6_addr.s6_addr,
			port: u16::from_be(raw.sin6_port),
			scope_id: raw.sin6_scope_id,
		}
	}
}

impl std::fmt::Display for SocketAddrV6 {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}]:{}", Ipv6Addr::from(self.ip), self.port)
	}
}

impl ToSockAddr for SocketAddrV6 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}
