use std::future::Future as _;

use crate::{
    buffer::{Buffer as _, FixedBuffer},
    session::SessionBuilder,
    threaded::{PendingOutput, ThreadedSession},
    FlushDirective,
};

pin_project_lite::pin_project! {
    /// A writer that pushes everything written to it through a
    /// [`ThreadedSession`] and writes the output to an underlying async
    /// writer. Works as either a `tokio` writer (with the `tokio` feature)
    /// or a `futures` writer.
    ///
    /// The codec work runs on the session's worker thread. At most one
    /// operation is in flight: each write waits for the previous write's
    /// output to be written out before submitting more input.
    ///
    /// Shutting the writer down (`poll_shutdown` / `poll_close`) seals the
    /// stream. Dropping it without shutting down disposes the session.
    ///
    /// ```
    /// # fn main() -> std::io::Result<()> {
    /// use futures::AsyncWriteExt as _;
    /// use codec_session::{Backend, Session};
    ///
    /// futures::executor::block_on(async {
    ///     let mut compressed = vec![];
    ///     let mut writer = Session::compressor(Backend::Zstd)
    ///         .build_async_writer(&mut compressed)?;
    ///     writer.write_all(b"hello world").await?;
    ///     writer.close().await?;
    ///     drop(writer);
    ///
    ///     assert_eq!(zstd::decode_all(&compressed[..])?, b"hello world");
    ///     Ok::<_, std::io::Error>(())
    /// })
    /// # }
    /// ```
    pub struct AsyncSessionWriter<W> {
        #[pin]
        writer: W,
        session: ThreadedSession,
        pending: Option<PendingOutput>,
        buffer: FixedBuffer<Vec<u8>>,
        flush_submitted: bool,
        shutdown_submitted: bool,
    }
}

impl<W> AsyncSessionWriter<W> {
    pub fn new(writer: W, session: ThreadedSession) -> Self {
        Self {
            writer,
            session,
            pending: None,
            buffer: FixedBuffer::new(vec![]),
            flush_submitted: false,
            shutdown_submitted: false,
        }
    }

    pub fn session(&self) -> &ThreadedSession {
        &self.session
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Wait for the in-flight operation (if any) and move its output into
    /// the buffer. Returns `false` if nothing was in flight.
    ///
    /// The buffer must be empty before calling this.
    fn poll_receive(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<bool>> {
        let this = self.project();

        let Some(pending) = this.pending.as_mut() else {
            return std::task::Poll::Ready(Ok(false));
        };

        let result = ready!(std::pin::Pin::new(pending).poll(cx));
        *this.pending = None;

        let output = result?;
        *this.buffer = FixedBuffer::filled(output);

        std::task::Poll::Ready(Ok(true))
    }

    fn submit(
        self: std::pin::Pin<&mut Self>,
        data: &[u8],
        directive: FlushDirective,
    ) -> std::io::Result<()> {
        let this = self.project();
        debug_assert!(this.pending.is_none());

        let pending = this.session.feed(data, directive)?;
        *this.pending = Some(pending);
        Ok(())
    }

    fn submit_finish(self: std::pin::Pin<&mut Self>) {
        let this = self.project();
        debug_assert!(this.pending.is_none());

        *this.pending = Some(this.session.finish());
        *this.shutdown_submitted = true;
    }

    #[cfg(feature = "tokio")]
    fn flush_uncommitted_tokio(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>>
    where
        W: tokio::io::AsyncWrite,
    {
        let mut this = self.project();

        loop {
            let uncommitted = this.buffer.uncommitted();
            if uncommitted.is_empty() {
                return std::task::Poll::Ready(Ok(()));
            }

            let committed = ready!(this.writer.as_mut().poll_write(cx, uncommitted))?;
            this.buffer.commit(committed);

            if committed == 0 {
                return std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write buffered data",
                )));
            }
        }
    }

    /// Write out buffered output and wait for the in-flight operation,
    /// until neither is left.
    #[cfg(feature = "tokio")]
    fn settle_tokio(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>>
    where
        W: tokio::io::AsyncWrite,
    {
        loop {
            ready!(self.as_mut().flush_uncommitted_tokio(cx))?;

            if !ready!(self.as_mut().poll_receive(cx))? {
                return std::task::Poll::Ready(Ok(()));
            }
        }
    }

    fn flush_uncommitted_futures(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>>
    where
        W: futures::AsyncWrite,
    {
        let mut this = self.project();

        loop {
            let uncommitted = this.buffer.uncommitted();
            if uncommitted.is_empty() {
                return std::task::Poll::Ready(Ok(()));
            }

            let committed = ready!(this.writer.as_mut().poll_write(cx, uncommitted))?;
            this.buffer.commit(committed);

            if committed == 0 {
                return std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write buffered data",
                )));
            }
        }
    }

    fn settle_futures(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), std::io::Error>>
    where
        W: futures::AsyncWrite,
    {
        loop {
            ready!(self.as_mut().flush_uncommitted_futures(cx))?;

            if !ready!(self.as_mut().poll_receive(cx))? {
                return std::task::Poll::Ready(Ok(()));
            }
        }
    }
}

#[cfg(feature = "tokio")]
impl<W> tokio::io::AsyncWrite for AsyncSessionWriter<W>
where
    W: tokio::io::AsyncWrite,
{
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        data: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        if data.is_empty() {
            return std::task::Poll::Ready(Ok(0));
        }

        ready!(self.as_mut().settle_tokio(cx))?;

        self.as_mut().submit(data, FlushDirective::NoFlush)?;
        std::task::Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        ready!(self.as_mut().settle_tokio(cx))?;

        if !self.shutdown_submitted && !self.flush_submitted {
            self.as_mut().submit(&[], FlushDirective::SyncFlush)?;
            *self.as_mut().project().flush_submitted = true;
            ready!(self.as_mut().settle_tokio(cx))?;
        }

        let this = self.project();
        ready!(this.writer.poll_flush(cx))?;
        *this.flush_submitted = false;

        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        ready!(self.as_mut().settle_tokio(cx))?;

        if !self.shutdown_submitted {
            self.as_mut().submit_finish();
            ready!(self.as_mut().settle_tokio(cx))?;
        }

        let this = self.project();
        this.writer.poll_shutdown(cx)
    }
}

impl<W> futures::AsyncWrite for AsyncSessionWriter<W>
where
    W: futures::AsyncWrite,
{
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        data: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        if data.is_empty() {
            return std::task::Poll::Ready(Ok(0));
        }

        ready!(self.as_mut().settle_futures(cx))?;

        self.as_mut().submit(data, FlushDirective::NoFlush)?;
        std::task::Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        ready!(self.as_mut().settle_futures(cx))?;

        if !self.shutdown_submitted && !self.flush_submitted {
            self.as_mut().submit(&[], FlushDirective::SyncFlush)?;
            *self.as_mut().project().flush_submitted = true;
            ready!(self.as_mut().settle_futures(cx))?;
        }

        let this = self.project();
        ready!(this.writer.poll_flush(cx))?;
        *this.flush_submitted = false;

        std::task::Poll::Ready(Ok(()))
    }

    fn poll_close(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        ready!(self.as_mut().settle_futures(cx))?;

        if !self.shutdown_submitted {
            self.as_mut().submit_finish();
            ready!(self.as_mut().settle_futures(cx))?;
        }

        let this = self.project();
        this.writer.poll_close(cx)
    }
}

impl SessionBuilder {
    /// Build a threaded session and wrap it in an [`AsyncSessionWriter`].
    pub fn build_async_writer<W>(self, writer: W) -> std::io::Result<AsyncSessionWriter<W>> {
        let session = self.build_threaded()?;
        Ok(AsyncSessionWriter::new(writer, session))
    }
}
