use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    net::ToSocketAddrs,
    sync::{mpsc, oneshot},
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::connection::Connection;
use crate::{
    codec::{request::EncodedRequest, response::Response},
    errors::Error,
};

pub(crate) enum DispatcherMessage {
    Request(EncodedRequest, ResponseSender),
    Close,
}

#[repr(transparent)]
pub(crate) struct ResponseSender(oneshot::Sender<Result<Response, Error>>);

impl ResponseSender {
    #[inline]
    pub(crate) fn send(self, value: Result<Response, Error>) -> Result<(), Result<Response, Error>> {
        self.0.send(value)
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Client side of the dispatcher.
///
/// Passes requests to the connection task and awaits responses
/// on per-request oneshot channels.
pub(crate) struct DispatcherSender {
    tx: mpsc::Sender<DispatcherMessage>,
    open: Arc<AtomicBool>,
}

impl DispatcherSender {
    pub(crate) async fn send(&self, request: EncodedRequest) -> Result<Response, Error> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(DispatcherMessage::Request(request, ResponseSender(tx)))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        match rx.await {
            Ok(x) => x,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Ask the connection task to shut down.
    ///
    /// All requests in flight at that moment fail with `ConnectionClosed`.
    pub(crate) async fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self.tx.send(DispatcherMessage::Close).await;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Dispatching messages from client to connection.
pub(crate) struct Dispatcher {
    rx: ReceiverStream<DispatcherMessage>,
    conn: Connection,
    open: Arc<AtomicBool>,
}

impl Dispatcher {
    pub(crate) async fn prepare<A>(
        addr: A,
        user: Option<&str>,
        password: Option<&str>,
        connect_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
        send_queue_capacity: usize,
    ) -> Result<(Self, DispatcherSender), Error>
    where
        A: ToSocketAddrs + Display,
    {
        let conn = Connection::new(addr, user, password, connect_timeout, write_timeout).await?;

        let (tx, rx) = mpsc::channel(send_queue_capacity);
        let open = Arc::new(AtomicBool::new(true));

        Ok((
            Self {
                rx: ReceiverStream::new(rx),
                conn,
                open: Arc::clone(&open),
            },
            DispatcherSender { tx, open },
        ))
    }

    pub(crate) async fn run(mut self) {
        debug!("starting dispatcher");
        let _ = self.conn.run(&mut self.rx).await;
        self.open.store(false, Ordering::Release);
        debug!("dispatcher finished");
    }
}
