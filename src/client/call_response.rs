use rmpv::Value;
use serde::de::DeserializeOwned;

use crate::{
    errors::DecodingError,
    utils::{extract_and_deserialize_iproto_data, extract_iproto_data, extract_iproto_data_tuple},
};

/// Tuple, returned from `call` and `eval` requests.
#[derive(Clone, Debug, PartialEq)]
pub struct CallResponse(pub(crate) Value);

impl CallResponse {
    /// Decode the whole returned tuple into a type.
    pub fn decode<T>(self) -> Result<T, DecodingError>
    where
        T: DeserializeOwned,
    {
        extract_and_deserialize_iproto_data(self.0)
    }

    /// Decode only the first element of the returned tuple.
    ///
    /// Raises error if nothing was returned.
    pub fn decode_first<T>(self) -> Result<T, DecodingError>
    where
        T: DeserializeOwned,
    {
        let first = extract_iproto_data_tuple(self.0)?
            .into_iter()
            .next()
            .ok_or_else(|| DecodingError::invalid_tuple_length(1, 0))?;
        Ok(rmpv::ext::from_value(first)?)
    }

    /// Raw `DATA` value of the response.
    pub fn data(self) -> Result<Value, DecodingError> {
        extract_iproto_data(self.0)
    }
}
