//! multistream-select negotiation.
//!
//! Two peers sharing a fresh byte stream agree on one application protocol
//! before handing the stream over to it.
//!
//! # Message Flow
//!
//! ```text
//! Client                                  Host
//!    |                                      |
//!    |------- /multistream/1.0.0 --------->|  Handshake (symmetric:
//!    |<------ /multistream/1.0.0 ----------|  both send, then read)
//!    |                                      |
//!    |------- /rock/1.0.0 ---------------->|  Proposal
//!    |<------ na --------------------------|  Not available
//!    |                                      |
//!    |------- /foo/1.0.0 ----------------->|  Proposal
//!    |<------ /foo/1.0.0 ------------------|  Echo = selected
//!    |                                      |
//!    |======= /foo/1.0.0 traffic =========>|  Stream now belongs to /foo
//! ```
//!
//! # Host Commands
//!
//! | Message         | Host reply                                      |
//! |-----------------|-------------------------------------------------|
//! | `ls`            | Registered ids joined by `\n`, one message      |
//! | `debug-sigkill` | None; session ends (debug hosts only)           |
//! | registered id   | The same id; negotiation done                   |
//! | anything else   | `na`; host waits for the next proposal          |
//!
//! # Host State Machine
//!
//! ```text
//!  [AwaitingHandshake] --handshake ok--> [Serving] --echo--> [Selected]
//!          |                              |   ^
//!          | handshake failed             |   | ls / na
//!          v                              |---+
//!      [Aborted] <---- I/O error or debug-sigkill
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use multistream::protocol::{Client, Communicator, Host};
//!
//! // Host side
//! let host = Host::new();
//! host.add_handler("/echo/1.0.0".parse()?, echo_handler)?;
//! let selected = host.negotiate(&mut Communicator::new(inbound)).await?;
//!
//! // Client side
//! let mut client = Client::from_stream(outbound);
//! let selected = client.select_one_of(&["/rock/1.0.0", "/echo/1.0.0"]).await?;
//! ```

mod client;
mod communicator;
mod handshake;
mod host;
mod id;
mod registry;
pub mod varint;

pub use client::{Client, ClientState};
pub use communicator::Communicator;
pub use handshake::{perform_handshake, Role};
pub use host::{Host, HostConfig, Negotiated};
pub use id::ProtocolId;
pub use registry::HandlerRegistry;

/// Literal both peers exchange before negotiating.
pub const HANDSHAKE_ID: &str = "/multistream/1.0.0";

/// Request for the host's protocol listing.
pub const LS: &str = "ls";

/// Host reply: the proposed protocol is not available.
pub const NA: &str = "na";

/// Debug-only request that makes the host drop the session.
pub const DEBUG_SIGKILL: &str = "debug-sigkill";

/// Default largest message payload in bytes.
pub const MAX_MESSAGE_LEN: usize = 65535;
