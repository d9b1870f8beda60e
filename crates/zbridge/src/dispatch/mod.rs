//! Command stream decoding and dispatch.
//!
//! The client writes one JSON document per line on standard input:
//!
//! ```json
//! {"type":"send","tag":"t1","class":"MESSAGE","instance":"PERSONAL","recipient":"bob","body":["hi"]}
//! {"type":"subscribe","classes":["help"]}
//! {"type":"quit"}
//! ```
//!
//! [`CommandReader`] frames the raw byte stream into records, [`Command`]
//! decodes a record and [`CommandDispatcher`] applies it to the transport.
//! Every event for the client is written by [`EventWriter`] as a single JSON
//! line:
//!
//! ```json
//! {"type":"result","tag":"t1","result":"SENT"}
//! {"type":"error","message":"Parse error"}
//! ```

mod errors;
mod handler;
mod reader;
mod request;
mod response;

pub use self::errors::{DispatchError, ReaderError};
pub use self::handler::{CommandDispatcher, Dispatched};
pub use self::reader::{CommandReader, ReadStatus};
pub use self::request::{Command, SendCommand};
pub use self::response::{BridgeEvent, EventWriter};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
