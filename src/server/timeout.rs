// I/O timeout module
// Idle and stalled-write deadlines for a connection stream

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{sleep, Instant, Sleep};

/// A deadline armed when an operation goes pending and disarmed by progress
struct Deadline {
    limit: Option<Duration>,
    timer: Pin<Box<Sleep>>,
    armed: bool,
}

impl Deadline {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            limit,
            timer: Box::pin(sleep(Duration::ZERO)),
            armed: false,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Called after the wrapped operation returned `Pending`
    fn poll_expired(&mut self, cx: &mut Context<'_>) -> bool {
        let Some(limit) = self.limit else {
            return false;
        };
        if !self.armed {
            self.timer.as_mut().reset(Instant::now() + limit);
            self.armed = true;
        }
        self.timer.as_mut().poll(cx).is_ready()
    }
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{what} timed out"))
}

/// Stream wrapper failing with `TimedOut` when the peer stops making progress
///
/// The read deadline only fires when neither direction moved for the idle
/// limit, so a client downloading a large body is never cut off for not
/// sending anything. The write deadline fires when a single write, flush or
/// shutdown stays blocked for the write limit.
pub struct TimeoutIo<S> {
    inner: S,
    idle: Deadline,
    write: Deadline,
}

impl<S> TimeoutIo<S> {
    /// `None` disables the respective deadline
    pub fn new(inner: S, idle: Option<Duration>, write: Option<Duration>) -> Self {
        Self {
            inner,
            idle: Deadline::new(idle),
            write: Deadline::new(write),
        }
    }

    fn write_progress<T>(&mut self, cx: &mut Context<'_>, poll: Poll<io::Result<T>>) -> Poll<io::Result<T>> {
        if poll.is_ready() {
            self.write.disarm();
            self.idle.disarm();
            poll
        } else if self.write.poll_expired(cx) {
            Poll::Ready(Err(timed_out("write")))
        } else {
            Poll::Pending
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimeoutIo<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        match Pin::new(&mut me.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                me.idle.disarm();
                Poll::Ready(result)
            }
            Poll::Pending if me.idle.poll_expired(cx) => Poll::Ready(Err(timed_out("idle read"))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimeoutIo<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let me = self.get_mut();
        let poll = Pin::new(&mut me.inner).poll_write(cx, buf);
        me.write_progress(cx, poll)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let me = self.get_mut();
        let poll = Pin::new(&mut me.inner).poll_write_vectored(cx, bufs);
        me.write_progress(cx, poll)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        let poll = Pin::new(&mut me.inner).poll_flush(cx);
        me.write_progress(cx, poll)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        let poll = Pin::new(&mut me.inner).poll_shutdown(cx);
        me.write_progress(cx, poll)
    }
}

/// Whether a connection error came from one of the deadlines above
pub fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::TimedOut {
                return true;
            }
            // Custom io errors keep their payload out of `source()`
            if let Some(inner) = io.get_ref() {
                source = Some(inner as &(dyn std::error::Error + 'static));
                continue;
            }
        }
        source = e.source();
    }
    false
}
