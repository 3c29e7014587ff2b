use std::time::Duration;

use async_trait::async_trait;
use futures::{future::BoxFuture, FutureExt};
use rmpv::Value;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use super::{
    schema::{IndexRef, SpaceRef, PRIMARY_INDEX_ID},
    CallResponse, DmoResponse, Executor,
};
use crate::{
    codec::request::{
        Call, Delete, EncodedRequest, Eval, Insert, Ping, Replace, Request, Select, Update, Upsert,
    },
    tuple::Tuple,
    utils::extract_and_deserialize_iproto_data,
    IteratorType, Result,
};

/// Helper trait around [`Executor`], providing typed requests.
///
/// Spaces and indexes can be passed as numeric ids or as names; names
/// require the schema cache to be loaded first.
#[async_trait]
pub trait ExecutorExt: Executor {
    /// Send request, receiving raw response body.
    ///
    /// It is not recommended to use this method directly, since some requests
    /// should be only sent in specific situations and might break connection.
    fn send_request<R>(&self, body: R) -> BoxFuture<Result<Value>>
    where
        R: Request;

    /// Ping the server, returning the measured roundtrip time.
    async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        let _ = self.send_request(Ping {}).await?;
        Ok(start.elapsed())
    }

    /// Select tuples from space.
    ///
    /// Defaults: `offset` 0, `limit` effectively unlimited,
    /// `iterator` [`IteratorType::Equal`].
    async fn select<T, S, I, A>(
        &self,
        space: S,
        index: I,
        limit: Option<u32>,
        offset: Option<u32>,
        iterator: Option<IteratorType>,
        keys: A,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        S: Into<SpaceRef> + Send,
        I: Into<IndexRef> + Send,
        A: Tuple + Send,
    {
        let space = space.into();
        let space_id = self.resolve_space(&space)?;
        let index_id = self.resolve_index(&space, &index.into())?;
        let body = self
            .send_request(Select::new(
                space_id, index_id, limit, offset, iterator, keys,
            ))
            .await?;
        extract_and_deserialize_iproto_data(body).map_err(Into::into)
    }

    /// Select a single tuple by primary key.
    async fn get<T, S, A>(&self, space: S, key: A) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        S: Into<SpaceRef> + Send,
        A: Tuple + Send,
    {
        let rows = self
            .select(space, PRIMARY_INDEX_ID, Some(1), None, None, key)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a tuple.
    async fn insert<S, T>(&self, space: S, tuple: T) -> Result<DmoResponse>
    where
        S: Into<SpaceRef> + Send,
        T: Tuple + Send,
    {
        let space_id = self.resolve_space(&space.into())?;
        self.send_request(Insert::new(space_id, tuple))
            .await
            .map(DmoResponse)
    }

    /// Insert a tuple into a space. If a tuple with the same primary key
    /// already exists, replace the existing tuple with a new one.
    async fn replace<S, T>(&self, space: S, tuple: T) -> Result<DmoResponse>
    where
        S: Into<SpaceRef> + Send,
        T: Tuple + Send,
    {
        let space_id = self.resolve_space(&space.into())?;
        self.send_request(Replace::new(space_id, tuple))
            .await
            .map(DmoResponse)
    }

    /// Update a tuple.
    ///
    /// `ops` is a tuple of update operations, each of the form
    /// `(operator, field_no, argument...)`.
    async fn update<S, I, K, O>(&self, space: S, index: I, keys: K, ops: O) -> Result<DmoResponse>
    where
        S: Into<SpaceRef> + Send,
        I: Into<IndexRef> + Send,
        K: Tuple + Send,
        O: Tuple + Send,
    {
        let space = space.into();
        let space_id = self.resolve_space(&space)?;
        let index_id = self.resolve_index(&space, &index.into())?;
        self.send_request(Update::new(space_id, index_id, keys, ops))
            .await
            .map(DmoResponse)
    }

    /// Delete a tuple identified by key.
    async fn delete<S, I, K>(&self, space: S, index: I, keys: K) -> Result<DmoResponse>
    where
        S: Into<SpaceRef> + Send,
        I: Into<IndexRef> + Send,
        K: Tuple + Send,
    {
        let space = space.into();
        let space_id = self.resolve_space(&space)?;
        let index_id = self.resolve_index(&space, &index.into())?;
        self.send_request(Delete::new(space_id, index_id, keys))
            .await
            .map(DmoResponse)
    }

    /// Update a tuple or insert it, if it doesn't exist yet.
    async fn upsert<S, T, O>(&self, space: S, tuple: T, ops: O) -> Result<()>
    where
        S: Into<SpaceRef> + Send,
        T: Tuple + Send,
        O: Tuple + Send,
    {
        let space_id = self.resolve_space(&space.into())?;
        let _ = self
            .send_request(Upsert::new(space_id, tuple, ops))
            .await?;
        Ok(())
    }

    /// Remotely call a function.
    async fn call<N, A>(&self, function_name: N, args: A) -> Result<CallResponse>
    where
        N: Into<String> + Send,
        A: Tuple + Send,
    {
        self.send_request(Call::new(function_name, args))
            .await
            .map(CallResponse)
    }

    /// Evaluate a Lua expression.
    async fn eval<N, A>(&self, expr: N, args: A) -> Result<CallResponse>
    where
        N: Into<String> + Send,
        A: Tuple + Send,
    {
        self.send_request(Eval::new(expr, args))
            .await
            .map(CallResponse)
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {
    fn send_request<R>(&self, body: R) -> BoxFuture<Result<Value>>
    where
        R: Request,
    {
        let request = EncodedRequest::new(body);
        async move { self.send_encoded_request(request?).await }.boxed()
    }
}
