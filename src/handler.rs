//! Handler capability: the unit of work run against each connection.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::net::connection::Connection;

/// A `Handler` serves one socket.
///
/// The client or server closes the connection after the future returns, so
/// a handler must not rely on the stream outliving it.
///
/// On the server, a panic inside `serve_socket` is assumed to be isolated
/// to that connection: the server catches it, logs it with a backtrace and
/// hangs up. On the client the panic propagates to the caller of
/// [`Client::connect`](crate::Client::connect).
pub trait Handler: Send + Sync + 'static {
    fn serve_socket<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, ()>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve_socket<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, ()> {
        (**self).serve_socket(conn)
    }
}

/// Adapter allowing an ordinary function or closure to be used as a
/// [`Handler`].
#[derive(Debug, Clone, Copy)]
pub struct HandlerFn<F>(pub F);

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Connection) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    fn serve_socket<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, ()> {
        (self.0)(conn)
    }
}

/// Wrap `f` in a [`HandlerFn`].
///
/// ```no_run
/// use socketkit::handler_fn;
/// use tokio::io::AsyncWriteExt;
///
/// let greet = handler_fn(|conn| {
///     Box::pin(async move {
///         let _ = conn.write_all(b"hello").await;
///     })
/// });
/// # let _ = greet;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Connection) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    HandlerFn(f)
}
