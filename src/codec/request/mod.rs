use std::io::Write;

use super::consts::{keys, RequestType};
use crate::errors::EncodingError;

pub(crate) use self::{
    auth::Auth, call::Call, delete::Delete, eval::Eval, insert::Insert, ping::Ping,
    replace::Replace, select::Select, update::Update, upsert::Upsert,
};

mod auth;
mod call;
mod delete;
mod eval;
mod insert;
mod ping;
mod replace;
mod select;
mod update;
mod upsert;

/// Request body.
pub trait Request: Send {
    /// Return type of this request.
    fn request_type() -> RequestType
    where
        Self: Sized;

    /// Encode body into MessagePack and write it to provided [`Write`].
    fn encode(&self, buf: &mut dyn Write) -> Result<(), EncodingError>;
}

/// Request with a pre-encoded body, ready to be framed.
///
/// `sync` is assigned later, by the connection which writes the frame.
pub struct EncodedRequest {
    pub(crate) request_type: RequestType,
    pub(crate) sync: u64,
    body: Vec<u8>,
}

impl EncodedRequest {
    pub(crate) fn new<R: Request>(body: R) -> Result<Self, EncodingError> {
        let mut buf = Vec::with_capacity(64);
        body.encode(&mut buf)?;
        Ok(Self {
            request_type: R::request_type(),
            sync: 0,
            body: buf,
        })
    }

    pub(crate) fn sync_mut(&mut self) -> &mut u64 {
        &mut self.sync
    }

    /// Encode header and body into provided [`Write`].
    pub(crate) fn encode(&self, mut buf: impl Write) -> Result<(), EncodingError> {
        rmp::encode::write_map_len(&mut buf, 2)?;
        rmp::encode::write_pfix(&mut buf, keys::REQUEST_TYPE)?;
        rmp::encode::write_u8(&mut buf, self.request_type as u8)?;
        rmp::encode::write_pfix(&mut buf, keys::SYNC)?;
        rmp::encode::write_u64(&mut buf, self.sync)?;
        buf.write_all(&self.body)?;
        Ok(())
    }
}
