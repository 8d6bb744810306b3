//! Single-threaded receive reactor.
//!
//! One dedicated thread blocks in `poll(2)` over every registered socket
//! plus the read end of a private control pipe, and runs the descriptor's
//! `ReceiveTask` whenever the socket turns readable. Other threads add and
//! remove descriptors through `register`/`deregister`, which update the
//! shared registry and then wake the reactor through the pipe.

mod config;
mod control;
mod poller;
mod registry;
mod task;

pub use self::config::ReactorConfig;
pub use self::registry::RegistrationState;
pub use self::task::{DatagramReceiveTask, ReceiveTask, SctpMessageReceiveTask, StreamReceiveTask};

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use crate::addr::SockAddr;
use crate::buffer::{BufferPool, PooledBuffer};
use crate::error::ReactorError;
use crate::socket::sctp::SctpSndRcvInfo;
use self::control::{ControlMessage, ControlReceiver, ControlSender};
use self::poller::{Readiness, ReadinessSet};
use self::registry::Registry;

/*
---
Membership has two views:
  registry map  - mutated by callers under the registry lock
  live set      - the pollfd array, mutated only by the reactor thread

  register:    lock -> insert Pending -> write Register  (rollback on failure)
  reactor:     read Register(gen) -> entry still gen? -> Active + watch
  deregister:  lock -> write Deregister -> erase entry    (nothing on failure)
  reactor:     read Deregister -> unwatch

Dispatch runs with the registry lock held, so once deregister returns the
task is gone and can never be called again, even though the reactor may
still have the descriptor in its live set for one more wake.
---
*/

struct Control {
	sender: Option<ControlSender>,
	exit_sent: bool,
}

impl Control {
	fn running_sender(&self) -> Option<&ControlSender> {
		if self.exit_sent {
			return None;
		}
		self.sender.as_ref()
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Multiplexes receive readiness for many sockets onto one thread.
///
/// Lock order is registry, then control. Stopping only takes the control
/// lock, so it may be called from inside a receive callback.
pub struct SocketReactor {
	name: String,
	registry: Arc<Mutex<Registry>>,
	control: Mutex<Control>,
	thread: Mutex<Option<JoinHandle<()>>>,
	thread_id: ThreadId,
	pool: Arc<BufferPool>,
}

impl SocketReactor {
	/// Starts a reactor with default buffer settings.
	pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
		Self::with_config(ReactorConfig::new(name))
	}

	/// Opens the control channel and starts the reactor thread.
	pub fn with_config(config: ReactorConfig) -> std::io::Result<Self> {
		let (sender, receiver) = control::channel()?;
		let registry = Arc::new(Mutex::new(Registry::new()));

		let span = tracing::debug_span!("socket_reactor", name = %config.name);
		let shared = Arc::clone(&registry);
		let handle = thread::Builder::new()
			.name(config.name.clone())
			.spawn(move || {
				let _enter = span.enter();
				run(&shared, receiver);
			})?;

		tracing::info!(
			name = %config.name,
			buffer_capacity = config.buffer_capacity,
			pool_size = config.pool_size,
			"socket reactor started"
		);

		Ok(Self {
			thread_id: handle.thread().id(),
			name: config.name,
			registry,
			control: Mutex::new(Control { sender: Some(sender), exit_sent: false }),
			thread: Mutex::new(Some(handle)),
			pool: BufferPool::new(config.buffer_capacity, config.pool_size),
		})
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Pool the built-in receive tasks draw their buffers from.
	#[inline]
	pub fn buffer_pool(&self) -> &Arc<BufferPool> {
		&self.pool
	}

	/// `true` until `stop` has told the reactor thread to exit.
	pub fn is_running(&self) -> bool {
		lock(&self.control).running_sender().is_some()
	}

	/// Registration state of `fd`, `None` if it is not registered.
	///
	/// Always `None` when called from the reactor thread, where the
	/// registry is locked for dispatch.
	pub fn state(&self, fd: RawFd) -> Option<RegistrationState> {
		if self.on_reactor_thread() {
			return None;
		}
		lock(&self.registry).state(fd)
	}

	/// Registers `fd` with `task`.
	///
	/// The entry starts `Pending` and turns `Active` once the reactor thread
	/// has picked up the registration. While the control channel is full the
	/// call releases its locks and retries; if the wake-up fails for any
	/// other reason the entry is rolled back and `ControlChannel` is returned.
	pub fn register<T>(&self, fd: RawFd, task: T) -> Result<(), ReactorError>
	where
		T: ReceiveTask + 'static,
	{
		self.register_boxed(fd, Box::new(task))
	}

	/// Registers `fd` with a `DatagramReceiveTask` feeding `callback`.
	pub fn register_datagram<F>(&self, fd: RawFd, callback: F) -> Result<(), ReactorError>
	where
		F: FnMut(PooledBuffer, Option<SockAddr>) + Send + 'static,
	{
		self.register(fd, DatagramReceiveTask::new(Arc::clone(&self.pool), callback))
	}

	/// Registers `fd` with an `SctpMessageReceiveTask` feeding `callback`.
	pub fn register_sctp<F>(&self, fd: RawFd, callback: F) -> Result<(), ReactorError>
	where
		F: FnMut(PooledBuffer, Option<SockAddr>, SctpSndRcvInfo, i32) + Send + 'static,
	{
		self.register(fd, SctpMessageReceiveTask::new(Arc::clone(&self.pool), callback))
	}

	/// Registers a connected TCP `fd` with a `StreamReceiveTask` feeding `callback`.
	pub fn register_stream<F>(&self, fd: RawFd, callback: F) -> Result<(), ReactorError>
	where
		F: FnMut(PooledBuffer) + Send + 'static,
	{
		self.register(fd, StreamReceiveTask::new(Arc::clone(&self.pool), callback))
	}

	fn register_boxed(&self, fd: RawFd, task: Box<dyn ReceiveTask>) -> Result<(), ReactorError> {
		if self.on_reactor_thread() {
			return Err(ReactorError::ReentrantCall);
		}
		if !is_open_descriptor(fd) {
			tracing::error!(fd, "refusing to register invalid descriptor");
			return Err(ReactorError::InvalidDescriptor { fd });
		}

		let mut task = task;
		loop {
			let mut registry = lock(&self.registry);
			let control = lock(&self.control);
			let Some(sender) = control.running_sender() else {
				return Err(ReactorError::Stopped);
			};

			let generation = registry.insert(fd, task).inspect_err(|e| {
				tracing::error!(fd, error = %e, "register failed");
			})?;

			let err = match sender.send(ControlMessage::Register { fd, generation }) {
				Ok(()) => {
					tracing::debug!(fd, generation, "descriptor registered");
					return Ok(());
				}
				Err(e) => e,
			};
			let Some(entry) = registry.remove(fd) else {
				return Err(err);
			};
			if !is_channel_full(&err) {
				tracing::error!(fd, error = %err, "failed to signal registration; rolled back");
				return Err(err);
			}

			// Let the reactor thread drain the channel, then try again.
			task = entry.into_task();
			drop(control);
			drop(registry);
			tracing::trace!(fd, "control channel full; retrying registration");
			thread::yield_now();
		}
	}

	/// Removes `fd` from the reactor.
	///
	/// When this returns `Ok` the task has been dropped and will not run
	/// again; the same descriptor may be registered anew right away. The
	/// descriptor must be deregistered before it is closed.
	pub fn deregister(&self, fd: RawFd) -> Result<(), ReactorError> {
		if self.on_reactor_thread() {
			return Err(ReactorError::ReentrantCall);
		}

		loop {
			let mut registry = lock(&self.registry);
			let control = lock(&self.control);
			let Some(sender) = control.running_sender() else {
				return Err(ReactorError::Stopped);
			};

			let Some(generation) = registry.generation(fd) else {
				tracing::error!(fd, "deregister of unknown descriptor");
				return Err(ReactorError::NotRegistered { fd });
			};

			match sender.send(ControlMessage::Deregister { fd, generation }) {
				Ok(()) => {
					registry.remove(fd);
					tracing::debug!(fd, generation, "descriptor deregistered");
					return Ok(());
				}
				Err(e) if is_channel_full(&e) => {
					drop(control);
					drop(registry);
					tracing::trace!(fd, "control channel full; retrying deregistration");
					thread::yield_now();
				}
				Err(e) => {
					tracing::error!(fd, error = %e, "failed to signal deregistration; descriptor stays registered");
					return Err(e);
				}
			}
		}
	}

	/// Stops the reactor thread. Idempotent.
	///
	/// Sends the exit command, waits for the thread to finish, then closes
	/// the control channel and drops every remaining task. Called from a
	/// receive callback it only sends the exit command; the thread finishes
	/// after the current wake and a later `stop` (or drop) joins it.
	pub fn stop(&self) {
		loop {
			let mut control = lock(&self.control);
			let Some(sender) = control.running_sender() else {
				break;
			};
			match sender.send(ControlMessage::Exit) {
				Ok(()) => {
					control.exit_sent = true;
					break;
				}
				Err(e) if is_channel_full(&e) => {
					drop(control);
					thread::yield_now();
				}
				Err(e) => {
					tracing::error!(name = %self.name, error = %e, "failed to send exit command");
					control.exit_sent = true;
					break;
				}
			}
		}

		if self.on_reactor_thread() {
			return;
		}

		let Some(handle) = lock(&self.thread).take() else {
			return;
		};
		if handle.join().is_err() {
			tracing::error!(name = %self.name, "socket reactor thread panicked");
		}

		lock(&self.control).sender = None;
		let mut registry = lock(&self.registry);
		let remaining = registry.len();
		registry.clear();
		tracing::info!(name = %self.name, remaining, "socket reactor stopped");
	}

	#[inline]
	fn on_reactor_thread(&self) -> bool {
		thread::current().id() == self.thread_id
	}
}

impl Drop for SocketReactor {
	fn drop(&mut self) {
		self.stop();
	}
}

impl std::fmt::Debug for SocketReactor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SocketReactor")
			.field("name", &self.name)
			.field("running", &self.is_running())
			.finish_non_exhaustive()
	}
}

/// A full control pipe only means the reactor has not caught up yet.
#[inline]
fn is_channel_full(e: &ReactorError) -> bool {
	matches!(e, ReactorError::ControlChannel { errno: libc::EAGAIN, .. })
}

fn is_open_descriptor(fd: RawFd) -> bool {
	fd >= 0 && unsafe { libc::fcntl(fd, libc::F_GETFD) } != -1
}

/// Reactor thread body. Returns on the exit command.
fn run(registry: &Mutex<Registry>, receiver: ControlReceiver) {
	let mut live = ReadinessSet::new(receiver.as_raw_fd());
	let mut ready = Vec::new();

	loop {
		match live.wait() {
			Ok(_) => {}
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(e) => {
				tracing::error!(error = %e, "readiness wait failed");
				continue;
			}
		}

		let mut registry = lock(registry);

		live.collect_ready(&mut ready);
		for readiness in ready.drain(..) {
			match readiness {
				Readiness::Readable { fd, generation } => {
					// Registered descriptors stay open until deregistered, and
					// the registry lock keeps deregister out while this runs.
					let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
					if registry.dispatch(borrowed, generation) == Some(false) {
						live.remove(fd);
						tracing::debug!(fd, generation, "task retired descriptor");
					}
				}
				Readiness::Closed { fd, generation } => {
					tracing::warn!(fd, generation, "registered descriptor was closed without deregistering");
					live.remove(fd);
					registry.remove_generation(fd, generation);
				}
			}
		}

		if !live.control_ready() {
			continue;
		}
		match receiver.recv() {
			Ok(ControlMessage::Exit) => {
				tracing::debug!(live = live.len(), "exit command received");
				return;
			}
			Ok(ControlMessage::Register { fd, generation }) => {
				if registry.activate(fd, generation) {
					live.insert(fd, generation);
					tracing::trace!(fd, generation, live = live.len(), "descriptor active");
				} else {
					tracing::debug!(fd, generation, "dropping stale register command");
				}
			}
			Ok(ControlMessage::Deregister { fd, generation }) => {
				live.remove(fd);
				tracing::trace!(fd, generation, live = live.len(), "descriptor unwatched");
			}
			Err(e) => {
				tracing::warn!(error = %e, "dropping control message");
			}
		}
	}
}
