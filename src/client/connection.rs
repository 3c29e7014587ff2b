use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use rmpv::Value;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::{
    schema::{self, IndexRef, Schema, SpaceRef},
    Executor, ExecutorExt,
};
use crate::{
    builder::ConnectionBuilder,
    codec::{request::EncodedRequest, response::ResponseBody},
    errors::Error,
    transport::DispatcherSender,
    Result,
};

/// Connection to a Tarantool instance.
///
/// Cheap to clone; all clones multiplex their requests over the same
/// TCP connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    dispatcher_sender: DispatcherSender,
    read_timeout: Option<Duration>,
    schema: Mutex<Schema>,
}

impl Connection {
    /// Create new [`ConnectionBuilder`].
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::default()
    }

    pub(crate) fn new(dispatcher_sender: DispatcherSender, read_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                dispatcher_sender,
                read_timeout,
                schema: Mutex::new(Schema::default()),
            }),
        }
    }

    /// Whether the underlying connection is still usable.
    pub fn alive(&self) -> bool {
        self.inner.dispatcher_sender.is_open()
    }

    /// Close the connection, failing all requests currently in flight.
    pub async fn close(&self) {
        self.inner.dispatcher_sender.close().await;
    }

    /// Current copy of the schema cache.
    pub fn schema(&self) -> Schema {
        self.inner.schema.lock().clone()
    }

    /// Replace the schema cache, e.g. to seed it without querying the server.
    pub fn set_schema(&self, schema: Schema) {
        *self.inner.schema.lock() = schema;
    }

    /// Load the schema from the server and replace the cache with it.
    ///
    /// Requires the connected user to be allowed to evaluate Lua
    /// expressions. On failure the previous cache stays in place.
    pub async fn parse_schema(&self) -> Result<()> {
        let schema = schema::load(self).await?;
        debug!("loaded schema with {} spaces", schema.len());
        *self.inner.schema.lock() = schema;
        Ok(())
    }
}

#[async_trait]
impl Executor for Connection {
    async fn send_encoded_request(&self, request: EncodedRequest) -> Result<Value> {
        let fut = self.inner.dispatcher_sender.send(request);
        let resp = match self.inner.read_timeout {
            Some(x) => timeout(x, fut).await??,
            None => fut.await?,
        };
        match resp.body {
            ResponseBody::Ok(x) => Ok(x),
            ResponseBody::Error(x) => Err(x.into()),
        }
    }

    fn resolve_space(&self, space: &SpaceRef) -> Result<u32> {
        self.inner.schema.lock().space_id(space)
    }

    fn resolve_index(&self, space: &SpaceRef, index: &IndexRef) -> Result<u32> {
        self.inner.schema.lock().index_id(space, index)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection")
    }
}

/// Periodically ping the server while the connection is open.
///
/// A ping failing with anything but a server-reported error means the
/// link is dead or stuck, so the connection is closed.
pub(crate) async fn keepalive_loop(conn: Connection, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // the first tick fires immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        if !conn.alive() {
            break;
        }
        match conn.ping().await {
            Ok(elapsed) => trace!("keep-alive ping took {:?}", elapsed),
            Err(Error::Response(err)) => {
                // The link works, only the request itself displeased the server
                warn!("keep-alive ping rejected: {}", err);
            }
            Err(err) => {
                warn!("keep-alive ping failed: {}, closing connection", err);
                conn.close().await;
                break;
            }
        }
    }
    debug!("keep-alive loop finished");
}
