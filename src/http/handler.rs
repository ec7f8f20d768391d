use std::future::Future;

use crate::http::request::Request;
use crate::http::response::Response;

/// The application side of a connection.
///
/// One handler instance is shared by every connection, so it is invoked
/// concurrently. It owns the request for the duration of the call.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> impl Future<Output = Response> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send,
{
    fn handle(&self, request: Request) -> impl Future<Output = Response> + Send {
        self(request)
    }
}
