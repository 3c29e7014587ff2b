use std::io::Read;

use rmpv::Value;
use tracing::debug;

use crate::{
    codec::consts::{
        keys,
        response_codes::{ERROR_RANGE_END, ERROR_RANGE_START, OK},
    },
    errors::{DecodingError, ErrorResponse},
    utils::{find_and_take_single_key_in_map, value_to_map},
};

#[derive(Clone, Debug)]
pub(crate) enum ResponseBody {
    /// Entire body map of a successful response.
    ///
    /// It's up to the caller to extract and decode `DATA`.
    Ok(Value),
    Error(ErrorResponse),
}

#[derive(Clone, Debug)]
pub(crate) struct Response {
    pub sync: u64,
    pub schema_version: u32,
    pub body: ResponseBody,
}

impl Response {
    /// Decode a response from a single complete frame (without the length prefix).
    pub(crate) fn decode(mut buf: impl Read) -> Result<Self, DecodingError> {
        let map_len = rmp::decode::read_map_len(&mut buf)?;
        let mut response_code: Option<u32> = None;
        let mut sync: Option<u64> = None;
        let mut schema_version: Option<u32> = None;
        for _ in 0..map_len {
            let key: u8 = rmp::decode::read_pfix(&mut buf)?;
            match key {
                keys::RESPONSE_CODE => {
                    response_code = Some(rmp::decode::read_int(&mut buf)?);
                }
                keys::SYNC => {
                    sync = Some(rmp::decode::read_int(&mut buf)?);
                }
                keys::SCHEMA_VERSION => {
                    schema_version = Some(rmp::decode::read_int(&mut buf)?);
                }
                rest => {
                    debug!("unexpected key in response header: {}", rest);
                    let _ = rmpv::decode::read_value(&mut buf)?;
                }
            }
        }
        let response_code = response_code
            .ok_or_else(|| DecodingError::missing_key("RESPONSE_CODE").in_other("response header"))?;
        let sync =
            sync.ok_or_else(|| DecodingError::missing_key("SYNC").in_other("response header"))?;
        // Servers report their schema version in every response; the client
        // doesn't act on it, so a missing value is not an error.
        let schema_version = schema_version.unwrap_or(0);

        let body_value = Self::decode_body(buf)?;
        let body = match response_code {
            OK => {
                if !matches!(body_value, Value::Map(_)) {
                    return Err(
                        DecodingError::type_mismatch("map", body_value.to_string())
                            .in_other("response body"),
                    );
                }
                ResponseBody::Ok(body_value)
            }
            code @ ERROR_RANGE_START..=ERROR_RANGE_END => {
                let code = code - ERROR_RANGE_START;
                let map = value_to_map(body_value).map_err(|err| err.in_other("error body"))?;
                let description = match find_and_take_single_key_in_map(keys::ERROR, map) {
                    Some(Value::String(x)) => x.into_str().ok_or_else(|| {
                        DecodingError::type_mismatch("UTF-8 string", "non-UTF-8 string")
                            .in_other("error description")
                    })?,
                    Some(rest) => {
                        return Err(DecodingError::type_mismatch("string", rest.to_string())
                            .in_other("error description"))
                    }
                    None => {
                        return Err(DecodingError::missing_key("ERROR").in_other("error body"))
                    }
                };
                ResponseBody::Error(ErrorResponse::new(code, description))
            }
            rest => return Err(DecodingError::unknown_response_code(rest)),
        };
        Ok(Self {
            sync,
            schema_version,
            body,
        })
    }

    /// Read the body map from what's left of the frame.
    ///
    /// Some responses (e.g. to PING) carry no body at all; those decode
    /// as an empty map. Bytes after the body value mean a malformed frame.
    fn decode_body(mut buf: impl Read) -> Result<Value, DecodingError> {
        let mut remaining = Vec::new();
        buf.read_to_end(&mut remaining)?;
        if remaining.is_empty() {
            return Ok(Value::Map(Vec::new()));
        }
        let mut cursor = &remaining[..];
        let value = rmpv::decode::read_value(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(DecodingError::trailing_bytes(cursor.len()).in_other("response body"));
        }
        Ok(value)
    }
}
