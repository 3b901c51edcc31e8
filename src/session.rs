use crate::{
    buffer::ChunkBuffer,
    codec::CodecContext,
    config::SessionConfig,
    threaded::ThreadedSession,
    Backend, Error, FlushDirective, SessionKind,
};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Accepting input.
    Active,
    /// Running the termination protocol.
    Finalizing,
    /// Finished, or retired by a codec error.
    Finalized,
    /// Abandoned without flushing.
    Disposed,
}

/// A synchronous compression or decompression stream.
///
/// Each call to [`feed`](Self::feed) returns whatever output the codec
/// produced for that input; [`finish`](Self::finish) seals the stream and
/// returns the rest. Concatenating every returned chunk gives the complete
/// output stream, regardless of how the input was split.
///
/// ```
/// # fn main() -> Result<(), codec_session::Error> {
/// use codec_session::{Backend, FlushDirective, Session};
///
/// let mut compressor = Session::compressor(Backend::Zstd).with_level(19).build()?;
/// let mut compressed = compressor.feed(b"hello ", FlushDirective::NoFlush)?;
/// compressed.extend(compressor.feed(b"world", FlushDirective::NoFlush)?);
/// compressed.extend(compressor.finish()?);
///
/// let mut decompressor = Session::decompressor(Backend::Zstd).build()?;
/// let mut decompressed = decompressor.feed(&compressed, FlushDirective::NoFlush)?;
/// decompressed.extend(decompressor.finish()?);
/// assert_eq!(decompressed, b"hello world");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    backend: Backend,
    kind: SessionKind,
    state: SessionState,
    context: Option<CodecContext>,
}

impl Session {
    /// Start building a compression session.
    pub fn compressor(backend: Backend) -> SessionBuilder {
        SessionBuilder::new(backend, SessionKind::Compress)
    }

    /// Start building a decompression session.
    pub fn decompressor(backend: Backend) -> SessionBuilder {
        SessionBuilder::new(backend, SessionKind::Decompress)
    }

    pub(crate) fn from_context(context: CodecContext) -> Self {
        Self {
            backend: context.backend(),
            kind: context.kind(),
            state: SessionState::Active,
            context: Some(context),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_native(
        native: Box<dyn crate::codec::NativeCodec>,
        chunk_size: usize,
    ) -> Self {
        Self::from_context(CodecContext::from_native(
            Backend::Deflate,
            SessionKind::Compress,
            native,
            chunk_size,
        ))
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Push `data` through the codec and return the output it produced.
    ///
    /// Empty input with [`FlushDirective::NoFlush`] returns immediately
    /// without touching the codec. A codec error retires the session:
    /// later calls fail with [`Error::SessionFinalized`].
    pub fn feed(&mut self, data: &[u8], directive: FlushDirective) -> Result<Vec<u8>, Error> {
        if self.state != SessionState::Active {
            return Err(Error::SessionFinalized);
        }
        if data.is_empty() && directive == FlushDirective::NoFlush {
            return Ok(vec![]);
        }

        let context = self.context.as_mut().ok_or(Error::SessionFinalized)?;
        let estimate = context.estimate_output(data.len(), directive);
        let mut output = ChunkBuffer::with_estimate(estimate);

        match context.step(data, directive, &mut output) {
            Ok(step) => {
                log::trace!(
                    "{} {:?} session fed {} of {} bytes, produced {}",
                    self.backend,
                    self.kind,
                    step.input_consumed,
                    data.len(),
                    step.produced
                );

                if step.frame_complete && directive == FlushDirective::Finish {
                    log::debug!("{} {:?} session sealed by feed", self.backend, self.kind);
                    self.retire(SessionState::Finalized);
                }
                Ok(output.finalize())
            }
            Err(error) => {
                self.retire(SessionState::Finalized);
                Err(error)
            }
        }
    }

    /// Seal the stream and return the remaining output.
    ///
    /// The codec state is released afterwards whether or not sealing
    /// succeeded. Calling this again (or after [`dispose`](Self::dispose),
    /// or after a codec error) returns empty output rather than
    /// [`Error::SessionFinalized`]; only [`feed`](Self::feed) rejects a
    /// session that is no longer active.
    pub fn finish(&mut self) -> Result<Vec<u8>, Error> {
        if self.state != SessionState::Active {
            return Ok(vec![]);
        }

        let Some(mut context) = self.context.take() else {
            self.state = SessionState::Finalized;
            return Ok(vec![]);
        };
        self.state = SessionState::Finalizing;

        let result = Self::seal(&mut context);

        context.release();
        self.state = SessionState::Finalized;

        match &result {
            Ok(output) => log::debug!(
                "{} {:?} session finished ({} final bytes)",
                self.backend,
                self.kind,
                output.len()
            ),
            Err(error) => log::debug!(
                "{} {:?} session failed to finish: {error}",
                self.backend,
                self.kind
            ),
        }

        result
    }

    fn seal(context: &mut CodecContext) -> Result<Vec<u8>, Error> {
        let estimate = context.estimate_output(0, FlushDirective::Finish);
        let mut output = ChunkBuffer::with_estimate(estimate);

        if context.seals_in_two_calls() {
            context.step(&[], FlushDirective::SyncFlush, &mut output)?;
        }

        let step = context.step(&[], FlushDirective::Finish, &mut output)?;
        debug_assert!(step.frame_complete);

        Ok(output.finalize())
    }

    /// Release the codec state without flushing anything. Output produced
    /// so far is left as-is, which may be a truncated stream.
    pub fn dispose(&mut self) {
        if self.state == SessionState::Active {
            log::debug!("{} {:?} session disposed", self.backend, self.kind);
            self.retire(SessionState::Disposed);
        }
    }

    fn retire(&mut self, state: SessionState) {
        if let Some(mut context) = self.context.take() {
            context.release();
        }
        self.state = state;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Builder for [`Session`] and [`ThreadedSession`].
///
/// Configuration is validated by [`build`](Self::build) and
/// [`build_threaded`](Self::build_threaded) before any codec state gets
/// allocated.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    backend: Backend,
    kind: SessionKind,
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new(backend: Backend, kind: SessionKind) -> Self {
        Self {
            backend,
            kind,
            config: SessionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.config.level = Some(level);
        self
    }

    pub fn with_memory_level(mut self, memory_level: u32) -> Self {
        self.config.memory_level = Some(memory_level);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.config.threads = Some(threads);
        self
    }

    pub fn build(self) -> Result<Session, Error> {
        let config = self.config.validate(self.backend, self.kind)?;
        let context = CodecContext::new(&config)?;
        Ok(Session::from_context(context))
    }

    /// Build a session whose operations run in order on a background
    /// worker.
    pub fn build_threaded(self) -> Result<ThreadedSession, Error> {
        let session = self.build()?;
        ThreadedSession::spawn(session)
    }
}
