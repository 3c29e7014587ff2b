//! In-process mock server speaking the IPROTO wire format.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use rmpv::Value;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener,
    },
    sync::Mutex,
    task::JoinHandle,
};

/// Raw salt encoded into the greeting; the client uses its first 20 bytes.
pub const SALT_RAW: [u8; 32] = [7u8; 32];

/// Request codes, as the mock server sees them.
pub mod codes {
    pub const SELECT: u64 = 1;
    pub const INSERT: u64 = 2;
    pub const REPLACE: u64 = 3;
    pub const UPDATE: u64 = 4;
    pub const DELETE: u64 = 5;
    pub const AUTH: u64 = 7;
    pub const EVAL: u64 = 8;
    pub const UPSERT: u64 = 9;
    pub const CALL: u64 = 10;
    pub const PING: u64 = 64;
}

/// Body keys, as the mock server sees them.
pub mod keys {
    pub const SPACE_ID: u64 = 0x10;
    pub const INDEX_ID: u64 = 0x11;
    pub const LIMIT: u64 = 0x12;
    pub const OFFSET: u64 = 0x13;
    pub const ITERATOR: u64 = 0x14;
    pub const KEY: u64 = 0x20;
    pub const TUPLE: u64 = 0x21;
    pub const FUNCTION_NAME: u64 = 0x22;
    pub const USER_NAME: u64 = 0x23;
    pub const EXPR: u64 = 0x27;
    pub const OPS: u64 = 0x28;
}

/// The 20 salt bytes participating in the scramble.
pub fn auth_salt() -> [u8; 20] {
    let mut salt = [0u8; 20];
    salt.copy_from_slice(&SALT_RAW[..20]);
    salt
}

pub fn greeting_block() -> [u8; 128] {
    let mut buffer = [b' '; 128];
    let banner = b"Tarantool 2.10.7 (Binary) 822f2e28-a869-4141-b801-38ee25c7e0b8";
    buffer[..banner.len()].copy_from_slice(banner);
    buffer[63] = b'\n';
    let salt_b64 = STANDARD.encode(SALT_RAW);
    buffer[64..64 + salt_b64.len()].copy_from_slice(salt_b64.as_bytes());
    buffer[127] = b'\n';
    buffer
}

/// Request frame, as decoded by the mock server.
#[derive(Clone, Debug)]
pub struct Frame {
    pub request_type: u64,
    pub sync: u64,
    pub body: Value,
}

impl Frame {
    /// Value under the given integer key of the body map.
    pub fn body_field(&self, key: u64) -> Option<&Value> {
        let Value::Map(entries) = &self.body else {
            return None;
        };
        entries
            .iter()
            .find(|(k, _)| k.as_u64() == Some(key))
            .map(|(_, v)| v)
    }
}

/// What the mock server should do with a request frame.
pub enum Action {
    /// Reply with an OK response carrying given `DATA`.
    ReplyData(Value),
    /// Reply with an OK response without a body.
    ReplyEmpty,
    /// Reply with an error response.
    ReplyError(u16, String),
    /// Reply with an OK response after a delay, without blocking other replies.
    ReplyDataAfter(Value, Duration),
    /// Don't reply at all.
    Ignore,
    /// Drop the connection.
    Drop,
}

/// Mock server, serving a single connection with a scripted handler.
pub struct MockServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start<F>(mut handler: F) -> Self
    where
        F: FnMut(&Frame) -> Action + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut read, write) = stream.into_split();
            let write = Arc::new(Mutex::new(write));
            write
                .lock()
                .await
                .write_all(&greeting_block())
                .await
                .unwrap();
            while let Some(frame) = read_frame(&mut read).await {
                match handler(&frame) {
                    Action::ReplyData(data) => {
                        write_all(&write, ok_response(frame.sync, Some(data))).await;
                    }
                    Action::ReplyEmpty => {
                        write_all(&write, ok_response(frame.sync, None)).await;
                    }
                    Action::ReplyError(code, message) => {
                        write_all(&write, error_response(frame.sync, code, &message)).await;
                    }
                    Action::ReplyDataAfter(data, delay) => {
                        let write = Arc::clone(&write);
                        let sync = frame.sync;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            write_all(&write, ok_response(sync, Some(data))).await;
                        });
                    }
                    Action::Ignore => {}
                    Action::Drop => return,
                }
            }
        });
        Self { addr, handle }
    }

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn write_all(write: &Arc<Mutex<OwnedWriteHalf>>, bytes: Vec<u8>) {
    let _ = write.lock().await.write_all(&bytes).await;
}

async fn read_frame(read: &mut OwnedReadHalf) -> Option<Frame> {
    let mut marker = [0u8; 1];
    read.read_exact(&mut marker).await.ok()?;
    let length = match marker[0] {
        m @ 0x00..=0x7f => m as u64,
        0xcc => {
            let mut b = [0u8; 1];
            read.read_exact(&mut b).await.ok()?;
            b[0] as u64
        }
        0xcd => {
            let mut b = [0u8; 2];
            read.read_exact(&mut b).await.ok()?;
            u16::from_be_bytes(b) as u64
        }
        0xce => {
            let mut b = [0u8; 4];
            read.read_exact(&mut b).await.ok()?;
            u32::from_be_bytes(b) as u64
        }
        0xcf => {
            let mut b = [0u8; 8];
            read.read_exact(&mut b).await.ok()?;
            u64::from_be_bytes(b)
        }
        rest => panic!("unexpected frame length marker {rest:#x}"),
    };
    let mut payload = vec![0u8; length as usize];
    read.read_exact(&mut payload).await.ok()?;

    let mut cursor = &payload[..];
    let header = rmpv::decode::read_value(&mut cursor).unwrap();
    let body = if cursor.is_empty() {
        Value::Map(vec![])
    } else {
        rmpv::decode::read_value(&mut cursor).unwrap()
    };
    let Value::Map(header) = header else {
        panic!("request header is not a map");
    };
    let header_field = |key: u64| {
        header
            .iter()
            .find(|(k, _)| k.as_u64() == Some(key))
            .and_then(|(_, v)| v.as_u64())
    };
    Some(Frame {
        request_type: header_field(0x00).expect("request type in header"),
        sync: header_field(0x01).expect("sync in header"),
        body,
    })
}

pub fn ok_response(sync: u64, data: Option<Value>) -> Vec<u8> {
    let header = Value::Map(vec![
        (0x00.into(), 0.into()),
        (0x01.into(), sync.into()),
        (0x05.into(), 1.into()),
    ]);
    let body = data.map(|x| Value::Map(vec![(0x30.into(), x)]));
    encode_frame(header, body)
}

pub fn error_response(sync: u64, code: u16, message: &str) -> Vec<u8> {
    let header = Value::Map(vec![
        (0x00.into(), (0x8000u32 + code as u32).into()),
        (0x01.into(), sync.into()),
        (0x05.into(), 1.into()),
    ]);
    let body = Value::Map(vec![(0x31.into(), message.into())]);
    encode_frame(header, Some(body))
}

fn encode_frame(header: Value, body: Option<Value>) -> Vec<u8> {
    let mut payload = Vec::new();
    rmpv::encode::write_value(&mut payload, &header).unwrap();
    if let Some(body) = body {
        rmpv::encode::write_value(&mut payload, &body).unwrap();
    }
    let mut out = Vec::new();
    rmp::encode::write_uint(&mut out, payload.len() as u64).unwrap();
    out.extend_from_slice(&payload);
    out
}
