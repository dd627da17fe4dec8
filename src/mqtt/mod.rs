pub mod client;

use std::future::Future;

use crate::error::Result;

/// Bus operations needed to shut down in order.
pub trait BusControl {
    fn unsubscribe(&mut self) -> impl Future<Output = Result<()>>;

    /// Disconnect and wait for the connection to wind down.
    fn disconnect(&mut self) -> impl Future<Output = Result<()>>;
}
