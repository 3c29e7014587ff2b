use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::{Buf, BufMut, BytesMut};
use rmp::Marker;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use self::{request::EncodedRequest, response::Response};
use crate::errors::{CodecDecodeError, CodecEncodeError, DecodingError, HandshakeError};

pub mod consts;
pub mod request;
pub mod response;
pub mod utils;

/// Incremental decoder of the MessagePack unsigned integer, prefixing
/// every frame.
enum LengthDecoder {
    NoMarker,
    Marker(Marker),
    Value(usize),
}

impl Default for LengthDecoder {
    fn default() -> Self {
        Self::NoMarker
    }
}

impl LengthDecoder {
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<usize>, DecodingError> {
        if src.is_empty() {
            return Ok(None);
        }
        let marker = match self {
            LengthDecoder::NoMarker => {
                // src is non-empty, checked above
                let marker = Marker::from_u8(src.get_u8());
                *self = Self::Marker(marker);
                marker
            }
            LengthDecoder::Marker(x) => *x,
            LengthDecoder::Value(x) => return Ok(Some(*x)),
        };
        let length = match marker {
            Marker::FixPos(x) => x as usize,
            Marker::U8 => {
                if src.len() >= 1 {
                    src.get_u8() as usize
                } else {
                    return Ok(None);
                }
            }
            Marker::U16 => {
                if src.len() >= 2 {
                    src.get_u16() as usize
                } else {
                    return Ok(None);
                }
            }
            Marker::U32 => {
                if src.len() >= 4 {
                    src.get_u32() as usize
                } else {
                    return Ok(None);
                }
            }
            Marker::U64 => {
                if src.len() >= 8 {
                    src.get_u64() as usize
                } else {
                    return Ok(None);
                }
            }
            rest => {
                return Err(
                    DecodingError::type_mismatch("unsigned integer", format!("{:?}", rest))
                        .in_other("frame length"),
                )
            }
        };
        trace!("decoded frame length: {}", length);
        *self = LengthDecoder::Value(length);
        Ok(Some(length))
    }

    fn reset(&mut self) {
        *self = LengthDecoder::NoMarker
    }
}

/// Client-side codec: encodes requests, decodes responses.
#[derive(Default)]
pub(crate) struct ClientCodec {
    length_decoder: LengthDecoder,
}

impl Decoder for ClientCodec {
    type Item = Response;

    type Error = CodecDecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(next_frame_length) = self
            .length_decoder
            .decode(src)
            .map_err(CodecDecodeError::Decode)?
        else {
            return Ok(None);
        };
        if src.len() >= next_frame_length {
            self.length_decoder.reset();
            let frame_bytes = src.split_to(next_frame_length);
            Response::decode(frame_bytes.reader())
                .map(Some)
                .map_err(CodecDecodeError::Decode)
        } else {
            src.reserve(next_frame_length - src.len());
            Ok(None)
        }
    }
}

impl Encoder<EncodedRequest> for ClientCodec {
    type Error = CodecEncodeError;

    // To omit creating intermediate BytesMut, encode message with 0 as length,
    // and after encoding calculate size of the encoded message and overwrite
    // length field (0) with new data.
    fn encode(&mut self, item: EncodedRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let begin_idx = dst.len();

        // Write message with fictional length (0), always encoded as 9 bytes
        let mut writer = dst.writer();
        let result = rmp::encode::write_u64(&mut writer, 0)
            .map_err(|err| err.into())
            .and_then(|_| item.encode(&mut writer));
        let dst = writer.into_inner();
        if let Err(err) = result {
            // A partially written frame must not reach the wire
            dst.truncate(begin_idx);
            return Err(CodecEncodeError::Encode(err));
        }

        // Calculate length and overwrite length field with actual value
        let data_len = dst.len() - begin_idx - 9;
        let mut len_writer = (&mut dst[begin_idx..]).writer();
        rmp::encode::write_u64(&mut len_writer, data_len as u64)
            .map_err(|err| CodecEncodeError::Encode(err.into()))?;

        Ok(())
    }
}

/// Greeting message from server.
///
/// [Docs](https://www.tarantool.io/en/doc/latest/dev_guide/internals/box_protocol/#greeting-message).
#[derive(Debug)]
pub(crate) struct Greeting {
    pub server: String,
    pub salt: Vec<u8>,
}

impl Greeting {
    /// Size of the full message from server in bytes.
    pub const SIZE: usize = 128;

    /// Length of the base64-encoded salt in the second greeting line.
    const SALT_B64_LENGTH: usize = 44;

    /// Number of salt bytes used for authentication.
    pub const SALT_LENGTH: usize = 20;

    /// Decode greeting from the 128-byte block.
    pub fn decode(buffer: [u8; Self::SIZE]) -> Result<Self, HandshakeError> {
        let line1 = &buffer[0..63];
        let banner_end = line1.iter().position(|x| *x == b'\n').unwrap_or(line1.len());
        let server = String::from_utf8_lossy(&line1[..banner_end])
            .trim_end()
            .to_owned();

        let salt_b64 = &buffer[64..64 + Self::SALT_B64_LENGTH];
        let mut salt = STANDARD.decode(salt_b64)?;
        if salt.len() < Self::SALT_LENGTH {
            return Err(HandshakeError::SaltTooShort(salt.len()));
        }
        salt.truncate(Self::SALT_LENGTH);

        Ok(Self { server, salt })
    }
}
