use crate::buffer::{DEFAULT_BUFFER_CAPACITY, DEFAULT_POOL_SIZE};

/// Construction parameters for a `SocketReactor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorConfig {
	/// Reactor name. Also the OS thread name and the `socket_reactor` span field.
	pub name: String,
	/// Bytes per receive buffer handed to the built-in tasks.
	pub buffer_capacity: usize,
	/// Receive buffers that may be in flight at once.
	pub pool_size: usize,
}

impl Default for ReactorConfig {
	fn default() -> Self {
		Self::new("socket-reactor")
	}
}

impl ReactorConfig {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			buffer_capacity: DEFAULT_BUFFER_CAPACITY,
			pool_size: DEFAULT_POOL_SIZE,
		}
	}

	pub fn buffer_capacity(mut self, bytes: usize) -> Self {
		self.buffer_capacity = bytes;
		self
	}

	pub fn pool_size(mut self, buffers: usize) -> Self {
		self.pool_size = buffers;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_and_overrides() {
		let config = ReactorConfig::new("s1ap");
		assert_eq!(config.buffer_capacity, 12756);
		assert_eq!(config.pool_size, 4096);

		let config = config.buffer_capacity(2048).pool_size(8);
		assert_eq!(config.name, "s1ap");
		assert_eq!(config.buffer_capacity, 2048);
		assert_eq!(config.pool_size, 8);
	}
}
