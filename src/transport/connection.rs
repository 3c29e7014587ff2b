use std::{collections::HashMap, fmt::Display, io::ErrorKind, time::Duration};

use futures::{
    future::{Fuse, FusedFuture},
    FutureExt, SinkExt, StreamExt, TryStreamExt,
};
use tokio::{
    io::AsyncReadExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream, ToSocketAddrs,
    },
    time::{error::Elapsed, timeout},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use super::dispatcher::{DispatcherMessage, ResponseSender};
use crate::{
    codec::{
        request::{Auth, EncodedRequest},
        response::{Response, ResponseBody},
        ClientCodec, Greeting,
    },
    errors::{CodecDecodeError, CodecEncodeError, Error, HandshakeError},
};

/// Stand-in write deadline when none is configured.
const NO_WRITE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// How often in-flight entries of callers which went away
/// (dropped or timed out) are removed.
const IN_FLIGHT_SWEEP_PERIOD: Duration = Duration::from_secs(10);

struct ConnectionData {
    in_flights: HashMap<u64, ResponseSender>,
    next_sync: u64,
}

impl Default for ConnectionData {
    fn default() -> Self {
        Self {
            in_flights: HashMap::with_capacity(32),
            next_sync: 0,
        }
    }
}

impl ConnectionData {
    #[inline]
    fn next_sync(&mut self) -> u64 {
        let next = self.next_sync;
        self.next_sync += 1;
        next
    }

    /// Prepare request for sending to server.
    ///
    /// Set `sync` value and attempt to store this message in in-flight storage.
    ///
    /// `Err` means that message was not prepared and should not be sent.
    /// This function also takes care of reporting the error through `tx`.
    #[inline]
    fn try_prepare_request(
        &mut self,
        request: &mut EncodedRequest,
        tx: ResponseSender,
    ) -> Result<(), ()> {
        let sync = self.next_sync();
        *request.sync_mut() = sync;
        trace!("sending request with sync {}", sync);
        // Syncs never repeat within a connection, but a seeded counter
        // could collide with an entry which is still in flight
        if let Some(old) = self.in_flights.insert(sync, tx) {
            let new = self
                .in_flights
                .insert(sync, old)
                .expect("value was just inserted");
            if new.send(Err(Error::DuplicatedSync(sync))).is_err() {
                warn!("failed to pass error to sync {}, receiver dropped", sync);
            }
            return Err(());
        }
        Ok(())
    }

    /// Send result of processing request (by sync) to client.
    #[inline]
    fn respond_to_client(&mut self, sync: u64, result: Result<Response, Error>) {
        if let Some(tx) = self.in_flights.remove(&sync) {
            if tx.send(result).is_err() {
                warn!("failed to pass response sync {}, receiver dropped", sync);
            }
        } else {
            warn!("unknown sync {}, response dropped", sync);
        }
    }

    /// Send error to all in-flight requests and drop them.
    #[inline]
    fn send_error_to_all_in_flights(&mut self, err: Error) {
        for (_, tx) in self.in_flights.drain() {
            let _ = tx.send(Err(err.clone()));
        }
    }

    /// Remove entries no one awaits anymore.
    #[inline]
    fn drop_abandoned(&mut self) {
        let before = self.in_flights.len();
        self.in_flights.retain(|_, tx| !tx.is_closed());
        let dropped = before - self.in_flights.len();
        if dropped > 0 {
            trace!("dropped {} abandoned in-flight entries", dropped);
        }
    }
}

pub(crate) struct Connection {
    read_stream: FramedRead<OwnedReadHalf, ClientCodec>,
    write_stream: FramedWrite<OwnedWriteHalf, ClientCodec>,
    write_timeout: Option<Duration>,
    data: ConnectionData,
}

impl Connection {
    async fn new_inner<A>(
        addr: A,
        user: Option<&str>,
        password: Option<&str>,
        write_timeout: Option<Duration>,
    ) -> Result<Self, Error>
    where
        A: ToSocketAddrs + Display,
    {
        debug!("starting connection to Tarantool {}", addr);
        let mut tcp = TcpStream::connect(&addr).await?;
        trace!("connection established to {}", addr);

        let mut greeting_buffer = [0u8; Greeting::SIZE];
        tcp.read_exact(&mut greeting_buffer).await.map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                Error::Handshake(HandshakeError::TruncatedGreeting)
            } else {
                err.into()
            }
        })?;
        let greeting = Greeting::decode(greeting_buffer)?;
        debug!("server: {}", greeting.server);
        trace!("salt: {:?}", greeting.salt);

        let (read_tcp_stream, write_tcp_stream) = tcp.into_split();
        let mut read_stream = FramedRead::new(read_tcp_stream, ClientCodec::default());
        let mut write_stream = FramedWrite::new(write_tcp_stream, ClientCodec::default());

        let mut conn_data = ConnectionData::default();

        // Guest with an empty password is what the server assumes anyway,
        // so an AUTH roundtrip can be skipped
        match user {
            Some(user) if !(user == "guest" && password.unwrap_or_default().is_empty()) => {
                Self::auth(
                    &mut read_stream,
                    &mut write_stream,
                    conn_data.next_sync(),
                    user,
                    password,
                    &greeting.salt,
                )
                .await?;
            }
            _ => {}
        }

        Ok(Self {
            read_stream,
            write_stream,
            write_timeout,
            data: conn_data,
        })
    }

    pub(super) async fn new<A>(
        addr: A,
        user: Option<&str>,
        password: Option<&str>,
        connect_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Result<Self, Error>
    where
        A: ToSocketAddrs + Display,
    {
        match connect_timeout {
            Some(dur) => timeout(dur, Self::new_inner(addr, user, password, write_timeout))
                .await
                .map_err(|_| Error::ConnectTimeout)
                .and_then(|x| x),
            None => Self::new_inner(addr, user, password, write_timeout).await,
        }
    }

    async fn auth(
        read_stream: &mut FramedRead<OwnedReadHalf, ClientCodec>,
        write_stream: &mut FramedWrite<OwnedWriteHalf, ClientCodec>,
        sync: u64,
        user: &str,
        password: Option<&str>,
        salt: &[u8],
    ) -> Result<(), Error> {
        let mut request = EncodedRequest::new(Auth::new(user, password, salt))?;
        *request.sync_mut() = sync;

        trace!("sending auth request");
        write_stream.send(request).await.map_err(Error::from)?;

        let resp = Self::get_next_stream_value(read_stream).await?;
        match resp.body {
            ResponseBody::Ok(_) => Ok(()),
            ResponseBody::Error(err) => Err(HandshakeError::Rejected(err).into()),
        }
    }

    #[inline]
    fn handle_send_result(
        connection_data: &mut ConnectionData,
        sync: u64,
        result: Result<Result<(), CodecEncodeError>, Elapsed>,
    ) -> Result<(), tokio::io::Error> {
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(CodecEncodeError::Encode(err))) => {
                connection_data.respond_to_client(sync, Err(err.into()));
                Ok(())
            }
            Ok(Err(CodecEncodeError::Io(err))) => Err(err),
            Err(_) => {
                // The frame stays in the codec buffer and goes out with a
                // later flush, only this caller gives up on waiting
                connection_data.respond_to_client(sync, Err(Error::Timeout));
                Ok(())
            }
        }
    }

    #[inline]
    async fn get_next_stream_value(
        read_stream: &mut FramedRead<OwnedReadHalf, ClientCodec>,
    ) -> Result<Response, CodecDecodeError> {
        match read_stream.try_next().await {
            Ok(Some(x)) => Ok(x),
            Ok(None) => Err(CodecDecodeError::Closed),
            Err(e) => Err(e),
        }
    }

    #[inline]
    fn handle_response(connection_data: &mut ConnectionData, response: Response) {
        trace!(
            "received response for sync {}, schema version {}",
            response.sync,
            response.schema_version
        );
        connection_data.respond_to_client(response.sync, Ok(response));
    }

    /// Run connection.
    ///
    /// `Ok` means the connection was closed on purpose (close message or all
    /// senders dropped). `Err` means it died due to an error; the error
    /// itself was already delivered to every in-flight request.
    pub(crate) async fn run(
        self,
        client_rx: &mut ReceiverStream<DispatcherMessage>,
    ) -> Result<(), ()> {
        let Self {
            mut read_stream,
            write_stream,
            write_timeout,
            mut data,
        } = self;

        let write_deadline = write_timeout.unwrap_or(NO_WRITE_TIMEOUT);
        let mut sweep_interval = tokio::time::interval(IN_FLIGHT_SWEEP_PERIOD);
        let mut write_stream = Some(write_stream);
        let mut send_future = Fuse::terminated();

        let err: Error = loop {
            tokio::select! {
                // Read value from TCP stream
                next = Self::get_next_stream_value(&mut read_stream) => {
                    match next {
                        Ok(x) => Self::handle_response(&mut data, x),
                        Err(err) => break err.into(),
                    }
                }
                // Read value from internal queue, unless a write is ongoing
                next = client_rx.next(), if send_future.is_terminated() => {
                    match next {
                        Some(DispatcherMessage::Request(mut request, tx)) => {
                            // Caller could cancel the request while it was queued
                            if tx.is_closed() {
                                continue;
                            }
                            if data.try_prepare_request(&mut request, tx).is_err() {
                                continue;
                            }
                            let sync = request.sync;
                            let mut ws = write_stream.take().expect("write stream taken twice");
                            // Boxed since `Timeout` is not `Unpin`; owns the
                            // write stream while in flight so the future can
                            // be 'static and stored across loop iterations.
                            send_future = async move {
                                let res = timeout(write_deadline, ws.send(request)).await;
                                (sync, res, ws)
                            }
                            .boxed()
                            .fuse();
                        }
                        Some(DispatcherMessage::Close) => {
                            debug!("closing connection on request");
                            data.send_error_to_all_in_flights(Error::ConnectionClosed);
                            return Ok(());
                        }
                        None => {
                            debug!("all senders dropped, closing connection");
                            data.send_error_to_all_in_flights(Error::ConnectionClosed);
                            return Ok(());
                        }
                    }
                }
                (sync, res, ws) = &mut send_future => {
                    write_stream = Some(ws);
                    if let Err(err) = Self::handle_send_result(&mut data, sync, res) {
                        break err.into();
                    }
                }
                _ = sweep_interval.tick() => {
                    data.drop_abandoned();
                }
            }
        };

        data.send_error_to_all_in_flights(err);
        Err(())
    }
}
