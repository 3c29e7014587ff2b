use rmpv::Value;
use serde::de::DeserializeOwned;

use crate::{errors::DecodingError, utils::extract_iproto_data_tuple};

/// Row, returned from data-manipulation operations
/// (insert, update, replace, delete).
///
/// Shares the wire shape with [`CallResponse`](crate::CallResponse): the
/// body's `DATA` key holds an array of rows. Only the decoding surface
/// differs, since a data-manipulation operation affects at most one row.
#[derive(Clone, Debug, PartialEq)]
pub struct DmoResponse(pub(crate) Value);

impl DmoResponse {
    /// Decode the affected row into a type.
    ///
    /// Raises error if the operation returned no row.
    pub fn decode<T>(self) -> Result<T, DecodingError>
    where
        T: DeserializeOwned,
    {
        self.decode_opt()?
            .ok_or_else(|| DecodingError::invalid_tuple_length(1, 0))
    }

    /// Decode the affected row into a type, `None` if there is no row.
    pub fn decode_opt<T>(self) -> Result<Option<T>, DecodingError>
    where
        T: DeserializeOwned,
    {
        extract_iproto_data_tuple(self.0)?
            .into_iter()
            .next()
            .map(rmpv::ext::from_value::<T>)
            .transpose()
            .map_err(Into::into)
    }
}
