use std::io::Write;

use super::Request;
use crate::{
    codec::{
        consts::{keys, IteratorType, RequestType},
        utils::{write_kv_tuple, write_kv_u32},
    },
    errors::EncodingError,
    tuple::Tuple,
};

/// Limit, used when caller haven't provided one.
///
/// Effectively "unlimited".
pub(crate) const DEFAULT_LIMIT: u32 = 1 << 30;

#[derive(Clone, Debug)]
pub(crate) struct Select<K> {
    pub space_id: u32,
    pub index_id: u32,
    pub limit: u32,
    pub offset: u32,
    pub iterator: IteratorType,
    pub keys: K,
}

impl<K> Select<K> {
    pub(crate) fn new(
        space_id: u32,
        index_id: u32,
        limit: Option<u32>,
        offset: Option<u32>,
        iterator: Option<IteratorType>,
        keys: K,
    ) -> Self {
        Self {
            space_id,
            index_id,
            limit: limit.unwrap_or(DEFAULT_LIMIT),
            offset: offset.unwrap_or(0),
            iterator: iterator.unwrap_or_default(),
            keys,
        }
    }
}

impl<K: Tuple + Send> Request for Select<K> {
    fn request_type() -> RequestType
    where
        Self: Sized,
    {
        RequestType::Select
    }

    fn encode(&self, mut buf: &mut dyn Write) -> Result<(), EncodingError> {
        rmp::encode::write_map_len(&mut buf, 6)?;
        write_kv_u32(buf, keys::SPACE_ID, self.space_id)?;
        write_kv_u32(buf, keys::INDEX_ID, self.index_id)?;
        write_kv_u32(buf, keys::LIMIT, self.limit)?;
        write_kv_u32(buf, keys::OFFSET, self.offset)?;
        write_kv_u32(buf, keys::ITERATOR, self.iterator as u32)?;
        write_kv_tuple(buf, keys::KEY, &self.keys)?;
        Ok(())
    }
}
