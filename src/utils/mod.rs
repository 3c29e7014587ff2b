//! Various helpers.

pub(crate) use self::deser::{
    extract_and_deserialize_iproto_data, extract_iproto_data, extract_iproto_data_tuple,
    find_and_take_single_key_in_map, value_to_map,
};

mod deser;
