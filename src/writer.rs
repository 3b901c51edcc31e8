use crate::{
    buffer::{Buffer as _, FixedBuffer},
    session::{Session, SessionBuilder},
    FlushDirective,
};

/// A writer that pushes everything written to it through a [`Session`]
/// and writes the session's output to an underlying writer.
///
/// Works for both compression and decompression sessions. Dropping the
/// writer finishes the session (ignoring errors), so call
/// [`shutdown`](Self::shutdown) to observe them, or
/// [`dispose`](Self::dispose) to abandon the stream without sealing it.
///
/// ```
/// # fn main() -> std::io::Result<()> {
/// use std::io::Write as _;
/// use codec_session::{Backend, Session};
///
/// let mut compressed = vec![];
/// let mut writer = Session::compressor(Backend::Deflate)
///     .with_level(9)
///     .build_writer(&mut compressed)?;
/// writer.write_all(b"hello world")?;
/// writer.shutdown()?;
/// drop(writer);
///
/// let mut decompressed = vec![];
/// let mut writer = Session::decompressor(Backend::Deflate).build_writer(&mut decompressed)?;
/// writer.write_all(&compressed)?;
/// writer.shutdown()?;
/// drop(writer);
///
/// assert_eq!(decompressed, b"hello world");
/// # Ok(())
/// # }
/// ```
pub struct SessionWriter<W>
where
    W: std::io::Write,
{
    writer: W,
    session: Session,
    buffer: FixedBuffer<Vec<u8>>,
}

impl<W> SessionWriter<W>
where
    W: std::io::Write,
{
    pub fn new(writer: W, session: Session) -> Self {
        Self {
            writer,
            session,
            buffer: FixedBuffer::new(vec![]),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Seal the session and write out the remaining output. Calling this
    /// more than once is fine.
    pub fn shutdown(&mut self) -> std::io::Result<()> {
        self.flush_uncommitted()?;

        let output = self.session.finish()?;
        self.buffer = FixedBuffer::filled(output);
        self.flush_uncommitted()?;

        self.writer.flush()
    }

    /// Abandon the session without sealing it. Output that was already
    /// produced but not yet written out is discarded.
    pub fn dispose(&mut self) {
        self.session.dispose();
        self.buffer.clear();
    }

    fn flush_uncommitted(&mut self) -> std::io::Result<()> {
        loop {
            let uncommitted = self.buffer.uncommitted();
            if uncommitted.is_empty() {
                return Ok(());
            }

            let committed = self.writer.write(uncommitted)?;
            self.buffer.commit(committed);

            if committed == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write buffered data",
                ));
            }
        }
    }
}

impl<W> std::io::Write for SessionWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, data: &[u8]) -> Result<usize, std::io::Error> {
        self.flush_uncommitted()?;

        let output = self.session.feed(data, FlushDirective::NoFlush)?;
        self.buffer = FixedBuffer::filled(output);

        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_uncommitted()?;

        let output = self.session.feed(&[], FlushDirective::SyncFlush)?;
        self.buffer = FixedBuffer::filled(output);
        self.flush_uncommitted()?;

        self.writer.flush()
    }
}

impl<W> Drop for SessionWriter<W>
where
    W: std::io::Write,
{
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl SessionBuilder {
    /// Build a session and wrap it in a [`SessionWriter`].
    pub fn build_writer<W>(self, writer: W) -> std::io::Result<SessionWriter<W>>
    where
        W: std::io::Write,
    {
        let session = self.build()?;
        Ok(SessionWriter::new(writer, session))
    }
}
