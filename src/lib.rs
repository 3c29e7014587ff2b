//! Asynchronous client for the Tarantool [IPROTO] binary protocol, built on [`tokio`].
//!
//! The client multiplexes concurrent requests over a single TCP connection:
//! every request is assigned a monotonically increasing `sync` id, and a
//! background task correlates replies with their waiting callers, so any
//! number of tasks can share one [`Connection`].
//!
//! Spaces and indexes can be addressed by numeric id directly, or by name
//! once the schema is loaded with [`Connection::parse_schema`] (or seeded
//! manually via [`Connection::set_schema`]).
//!
//! ```no_run
//! use tarantool_iproto::{Connection, ExecutorExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tarantool_iproto::Error> {
//!     let conn = Connection::builder()
//!         .auth("storage", "storage-password")
//!         .build("127.0.0.1:3301")
//!         .await?;
//!     conn.parse_schema().await?;
//!     let rows: Vec<(u32, String)> = conn
//!         .select("users", "primary", None, None, None, (1,))
//!         .await?;
//!     println!("{rows:?}");
//!     Ok(())
//! }
//! ```
//!
//! [IPROTO]: https://www.tarantool.io/en/doc/latest/dev_guide/internals/box_protocol/

pub use rmpv::Value;

pub use self::{
    builder::ConnectionBuilder,
    client::{
        schema::{IndexRef, Schema, SpaceRef, SpaceSchema},
        CallResponse, Connection, DmoResponse, Executor, ExecutorExt,
    },
    codec::consts::IteratorType,
    errors::Error,
    tuple::{Tuple, TupleElement},
};

pub mod errors;

mod builder;
mod client;
mod codec;
mod transport;
mod tuple;
mod utils;

/// Crate-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
