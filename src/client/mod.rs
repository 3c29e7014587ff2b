pub use self::{
    call_response::CallResponse, connection::Connection, dmo_response::DmoResponse,
    executor::Executor, executor_ext::ExecutorExt,
};

pub(crate) use self::connection::keepalive_loop;

pub mod schema;

mod call_response;
mod connection;
mod dmo_response;
mod executor;
mod executor_ext;

mod private {
    use crate::client::Connection;

    #[doc(hidden)]
    pub trait Sealed {}

    impl Sealed for Connection {}
    impl<S: Sealed + ?Sized> Sealed for &S {}
    impl<S: Sealed + ?Sized> Sealed for &mut S {}
}
