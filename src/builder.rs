use std::{fmt::Display, time::Duration};

use tokio::net::ToSocketAddrs;
use tracing::debug;

use crate::{
    client::{keepalive_loop, Connection},
    errors::Error,
    transport::Dispatcher,
};

/// How many requests can sit in the dispatcher queue before
/// senders start waiting.
const DEFAULT_SEND_QUEUE_CAPACITY: usize = 500;

/// Build connection to Tarantool.
#[derive(Debug)]
pub struct ConnectionBuilder {
    user: Option<String>,
    password: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    send_queue_capacity: usize,
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

impl ConnectionBuilder {
    /// Create connection to Tarantool using provided address.
    ///
    /// Must be called from the async context: the connection task (and the
    /// keep-alive task, if a read timeout is set) are spawned onto the
    /// current runtime.
    pub async fn build<A>(&self, addr: A) -> Result<Connection, Error>
    where
        A: ToSocketAddrs + Display,
    {
        let (dispatcher, dispatcher_sender) = Dispatcher::prepare(
            addr,
            self.user.as_deref(),
            self.password.as_deref(),
            self.connect_timeout,
            self.write_timeout,
            self.send_queue_capacity,
        )
        .await?;

        tokio::spawn(dispatcher.run());
        let conn = Connection::new(dispatcher_sender, self.read_timeout);

        if let Some(read_timeout) = self.read_timeout {
            let period = read_timeout / 3;
            debug!("starting keep-alive loop with period {:?}", period);
            tokio::spawn(keepalive_loop(conn.clone(), period));
        }

        Ok(conn)
    }

    /// Sets user login and, optionally, password, used for this connection.
    ///
    /// AUTH message is sent upon connecting to server, except for
    /// the `guest` user with an empty password.
    pub fn auth<'a>(&mut self, user: &str, password: impl Into<Option<&'a str>>) -> &mut Self {
        self.user = Some(user.into());
        self.password = password.into().map(Into::into);
        self
    }

    /// Sets timeout for connect (including the greeting and AUTH exchange).
    ///
    /// By default disabled.
    pub fn connect_timeout(&mut self, connect_timeout: impl Into<Option<Duration>>) -> &mut Self {
        self.connect_timeout = connect_timeout.into();
        self
    }

    /// Sets the per-request response deadline.
    ///
    /// While set, a background task also pings the server every
    /// `read_timeout / 3` to detect a dead link early.
    ///
    /// By default disabled.
    pub fn read_timeout(&mut self, read_timeout: impl Into<Option<Duration>>) -> &mut Self {
        self.read_timeout = read_timeout.into();
        self
    }

    /// Sets timeout for each frame write.
    ///
    /// By default disabled.
    pub fn write_timeout(&mut self, write_timeout: impl Into<Option<Duration>>) -> &mut Self {
        self.write_timeout = write_timeout.into();
        self
    }

    /// Sets the size of the internal request queue.
    ///
    /// By default 500.
    pub fn send_queue_capacity(&mut self, send_queue_capacity: usize) -> &mut Self {
        self.send_queue_capacity = send_queue_capacity;
        self
    }
}
