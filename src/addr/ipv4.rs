use std::net::Ipv4Addr;
use crate::addr::ToSockAddr;
use crate::error::SocketError;

/// IPv4 socket address (IP + port).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketAddrV4 {
	ip: [u8; 4],
	port: u16,
}

impl SocketAddrV4 {
	/// Creates a new IPv4 address.
	pub fn new(ip: [u8; 4], port: u16) -> Self {
		Self { ip, port }
	}

	/// Parses dotted-quad text (e.g. "127.0.1.1") and pairs it with `port`.
	pub fn parse(ip: &str, port: u16) -> Result<Self, SocketError> {
		let parsed: Ipv4Addr = ip
			.parse()
			.map_err(|_| SocketError::InvalidAddress { reason: "not an IPv4 address" })?;
		Ok(Self { ip: parsed.octets(), port })
	}

	/// Overwrites this address from text.
	///
	/// On a parse failure `self` is left exactly as it was.
	pub fn assign(&mut self, ip: &str, port: u16) -> Result<(), SocketError> {
		*self = Self::parse(ip, port)?;
		Ok(())
	}

	/// Creates from raw sockaddr_in.
	pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> Self {
		Self {
			ip: raw.sin_addr.s_addr.to_ne_bytes(),
			port: u16::from_be(raw.sin_port),
		}
	}

	/// Returns the IP bytes.
	pub fn ip(&self) -> [u8; 4] {
		self.ip
	}

	/// Returns the IP in dotted-quad form.
	pub fn ip_string(&self) -> String {
		Ipv4Addr::from(self.ip).to_string()
	}

	/// Returns the port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Converts to the raw sockaddr_in for syscalls.
	pub(crate) fn to_raw(&self) -> libc::sockaddr_in {
		libc::sockaddr_in {
			sin_family: libc::AF_INET as libc::sa_family_t,
			sin_port: self.port.to_be(),
			sin_addr: libc::in_addr {
				s_addr: u32::from_be_bytes(self.ip).to_be(),
			},
			sin_zero: [0; 8],
		}
	}
}

impl std::fmt::Display for SocketAddrV4 {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", Ipv4Addr::from(self.ip), self.port)
	}
}

impl From<std::net::SocketAddrV4> for SocketAddrV4 {
	fn from(addr: std::net::SocketAddrV4) -> Self {
		Self::new(addr.ip().octets(), addr.port())
	}
}

impl ToSockAddr for SocketAddrV4 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();  // sockaddr_in lives on THIS stack frame
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

/*
  - sin_family: Address family (AF_INET = 2 for IPv4)
  - sin_port: Port in network byte order (big-endian)
  - sin_addr: IP address in network byte order
  - sin_zero: Padding to match sockaddr size
 */

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn raw_layout_is_network_order() {
		let addr = SocketAddrV4::parse("127.0.1.1", 36412).unwrap();
		let raw = addr.to_raw();
		assert_eq!(raw.sin_port, 36412u16.to_be());
		assert_eq!(raw.sin_addr.s_addr.to_ne_bytes(), [127, 0, 1, 1]);
		assert_eq!(SocketAddrV4::from_raw(&raw), addr);
	}

	#[test]
	fn failed_assign_leaves_address_untouched() {
		let mut addr = SocketAddrV4::new([10, 0, 0, 1], 2152);
		assert!(addr.assign("10.0.0.256", 9).is_err());
		assert_eq!(addr, SocketAddrV4::new([10, 0, 0, 1], 2152));

		addr.assign("172.16.0.9", 38412).unwrap();
		assert_eq!(addr.to_string(), "172.16.0.9:38412");
	}
}
