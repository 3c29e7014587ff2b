use async_trait::async_trait;
use rmpv::Value;

use super::{
    private::Sealed,
    schema::{IndexRef, SpaceRef},
};
use crate::{codec::request::EncodedRequest, Result};

/// Types, able to send requests to the server.
///
/// Name resolution happens here, before any bytes are sent: ids pass
/// through untouched, names are looked up in the schema cache.
#[async_trait]
pub trait Executor: Sealed + Send + Sync {
    /// Send encoded request, receiving the raw body of a successful response.
    async fn send_encoded_request(&self, request: EncodedRequest) -> Result<Value>;

    /// Resolve a space reference into its id.
    fn resolve_space(&self, space: &SpaceRef) -> Result<u32>;

    /// Resolve an index reference into its id within a space.
    fn resolve_index(&self, space: &SpaceRef, index: &IndexRef) -> Result<u32>;
}

#[async_trait]
impl<E: Executor + Sealed + Sync> Executor for &E {
    async fn send_encoded_request(&self, request: EncodedRequest) -> Result<Value> {
        (**self).send_encoded_request(request).await
    }

    fn resolve_space(&self, space: &SpaceRef) -> Result<u32> {
        (**self).resolve_space(space)
    }

    fn resolve_index(&self, space: &SpaceRef, index: &IndexRef) -> Result<u32> {
        (**self).resolve_index(space, index)
    }
}

#[async_trait]
impl<E: Executor + Sealed + Sync> Executor for &mut E {
    async fn send_encoded_request(&self, request: EncodedRequest) -> Result<Value> {
        (**self).send_encoded_request(request).await
    }

    fn resolve_space(&self, space: &SpaceRef) -> Result<u32> {
        (**self).resolve_space(space)
    }

    fn resolve_index(&self, space: &SpaceRef, index: &IndexRef) -> Result<u32> {
        (**self).resolve_index(space, index)
    }
}
