use std::io::Write;

use super::Request;
use crate::{
    codec::{
        consts::{keys, RequestType},
        utils::{write_kv_tuple, write_kv_u32},
    },
    errors::EncodingError,
    tuple::Tuple,
};

#[derive(Clone, Debug)]
pub(crate) struct Delete<K> {
    pub space_id: u32,
    pub index_id: u32,
    pub keys: K,
}

impl<K> Delete<K> {
    pub(crate) fn new(space_id: u32, index_id: u32, keys: K) -> Self {
        Self {
            space_id,
            index_id,
            keys,
        }
    }
}

impl<K: Tuple + Send> Request for Delete<K> {
    fn request_type() -> RequestType
    where
        Self: Sized,
    {
        RequestType::Delete
    }

    fn encode(&self, mut buf: &mut dyn Write) -> Result<(), EncodingError> {
        rmp::encode::write_map_len(&mut buf, 3)?;
        write_kv_u32(buf, keys::SPACE_ID, self.space_id)?;
        write_kv_u32(buf, keys::INDEX_ID, self.index_id)?;
        write_kv_tuple(buf, keys::KEY, &self.keys)?;
        Ok(())
    }
}
