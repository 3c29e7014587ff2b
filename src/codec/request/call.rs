use std::io::Write;

use super::Request;
use crate::{
    codec::{
        consts::{keys, RequestType},
        utils::{write_kv_str, write_kv_tuple},
    },
    errors::EncodingError,
    tuple::Tuple,
};

#[derive(Clone, Debug)]
pub(crate) struct Call<A> {
    pub function_name: String,
    pub args: A,
}

impl<A> Call<A> {
    pub(crate) fn new(function_name: impl Into<String>, args: A) -> Self {
        Self {
            function_name: function_name.into(),
            args,
        }
    }
}

impl<A: Tuple + Send> Request for Call<A> {
    fn request_type() -> RequestType
    where
        Self: Sized,
    {
        RequestType::Call
    }

    fn encode(&self, mut buf: &mut dyn Write) -> Result<(), EncodingError> {
        rmp::encode::write_map_len(&mut buf, 2)?;
        write_kv_str(buf, keys::FUNCTION_NAME, &self.function_name)?;
        write_kv_tuple(buf, keys::TUPLE, &self.args)?;
        Ok(())
    }
}
