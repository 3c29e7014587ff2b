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
pub(crate) struct Eval<A> {
    pub expr: String,
    pub args: A,
}

impl<A> Eval<A> {
    pub(crate) fn new(expr: impl Into<String>, args: A) -> Self {
        Self {
            expr: expr.into(),
            args,
        }
    }
}

impl<A: Tuple + Send> Request for Eval<A> {
    fn request_type() -> RequestType
    where
        Self: Sized,
    {
        RequestType::Eval
    }

    fn encode(&self, mut buf: &mut dyn Write) -> Result<(), EncodingError> {
        rmp::encode::write_map_len(&mut buf, 2)?;
        write_kv_str(buf, keys::EXPR, &self.expr)?;
        write_kv_tuple(buf, keys::TUPLE, &self.args)?;
        Ok(())
    }
}
