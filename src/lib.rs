pub mod socket;
pub mod reactor;
pub mod buffer;
mod addr;
mod error;

pub use self::error::{IoError, SocketError, ReactorError, errno};
pub use self::addr::{FromSockAddr, ToSockAddr, SockAddr, SocketAddrV4, SocketAddrV6};
pub use self::buffer::{BufferPool, PooledBuffer};
pub use self::socket::{AddrFamily, SocketKind, Protocol, SocketHandle, RecvFrom,
					   open_socket, socket_kind, bind_addr, bound_addr, connect_to, listen, accept,
					   sctp_init_socket, sctp_init_client, sctp_init_server, tcp_make_server,
					   stream_read, stream_send, recv_from, send_to};
pub use self::socket::{set_nonblocking, set_reuse_addr, set_recv_buffer_size, set_send_buffer_size,
					   set_recv_timeout};
pub use self::socket::sctp::{SctpInitMsg, SctpRtoInfo, SctpSndRcvInfo, sctp_init_msg, sctp_rto_info};
pub use self::reactor::{SocketReactor, ReactorConfig, RegistrationState, ReceiveTask,
						DatagramReceiveTask, SctpMessageReceiveTask, StreamReceiveTask};
