pub(crate) use self::dispatcher::{Dispatcher, DispatcherSender};

mod connection;
mod dispatcher;
