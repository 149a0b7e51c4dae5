//! Absolute I/O deadlines on a raw transport.
//!
//! A deadline is an absolute instant after which reads and writes fail with
//! `io::ErrorKind::TimedOut` instead of blocking. It applies to every future
//! I/O call, not just the next one, until it is moved or cleared.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{sleep_until, Instant, Sleep};

/// A transport the idle-deadline wrapper can push deadlines onto.
///
/// Implemented by [`DeadlineStream`] and by TLS streams layered over a
/// transport, which forward the deadline to the socket underneath.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Set the absolute deadline for all future I/O.
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()>;
}

/// A raw stream with an optional absolute deadline.
#[derive(Debug)]
pub struct DeadlineStream<S> {
    inner: S,
    deadline: Option<Pin<Box<Sleep>>>,
    shut_down: bool,
}

impl<S> DeadlineStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            deadline: None,
            shut_down: false,
        }
    }

    /// Arm or move the deadline. Fails once the stream has been shut down.
    pub fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        if self.shut_down {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "cannot set deadline on a closed stream",
            ));
        }
        match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.deadline = Some(Box::pin(sleep_until(deadline))),
        }
        Ok(())
    }

    /// Remove the deadline; I/O blocks indefinitely again.
    pub fn clear_deadline(&mut self) {
        self.deadline = None;
    }

    /// Currently armed deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|sleep| sleep.deadline())
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// `Err` once the deadline has passed. Registers the waker otherwise so
    /// a blocked operation is woken when the deadline fires.
    fn poll_expired(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        let expired = match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().poll(cx).is_ready(),
            None => false,
        };
        if expired {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "i/o deadline exceeded",
            ))
        } else {
            Ok(())
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for DeadlineStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.poll_expired(cx)?;
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DeadlineStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.poll_expired(cx)?;
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.poll_expired(cx)?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.shut_down = true;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

impl<S> Transport for DeadlineStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        DeadlineStream::set_deadline(self, deadline)
    }
}

impl<S: Transport> Transport for tokio_rustls::server::TlsStream<S> {
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        self.get_mut().0.set_deadline(deadline)
    }
}

impl<S: Transport> Transport for tokio_rustls::client::TlsStream<S> {
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        self.get_mut().0.set_deadline(deadline)
    }
}

impl Transport for Box<dyn Transport> {
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        (**self).set_deadline(deadline)
    }
}
