use crate::{
    buffer::{Buffer as _, ChunkBuffer, FixedBuffer},
    config::ValidatedConfig,
    Error, FlushDirective,
};

pub(crate) mod deflate;
pub(crate) mod zstd;

/// One of the supported compression algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Raw DEFLATE streams (no zlib or gzip wrapper).
    Deflate,
    /// Zstandard frames.
    Zstd,
}

impl Backend {
    /// Version of the native library behind this backend.
    ///
    /// zstd reports its library version (e.g. `1.5.6`). The deflate engine
    /// behind `flate2` has no version of its own to report, so
    /// [`Backend::Deflate`] returns the engine name, `miniz_oxide`.
    pub fn version(self) -> String {
        match self {
            Self::Deflate => deflate::version(),
            Self::Zstd => zstd::version(),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deflate => f.write_str("deflate"),
            Self::Zstd => f.write_str("zstd"),
        }
    }
}

/// Whether a session compresses or decompresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Compress,
    Decompress,
}

/// Progress reported by a single native call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NativeProgress {
    pub consumed: usize,
    /// The native state reports output it couldn't fit in the staging
    /// buffer.
    pub pending: bool,
    pub frame_complete: bool,
}

/// The native primitive behind a [`CodecContext`]: one call feeds some
/// input and collects whatever output fits into the staging buffer.
///
/// Errors are returned as the backend's diagnostic text.
pub(crate) trait NativeCodec: Send {
    fn call(
        &mut self,
        input: &[u8],
        staging: &mut FixedBuffer<Vec<u8>>,
        directive: FlushDirective,
    ) -> Result<NativeProgress, String>;

    /// Output capacity worth reserving for `input_len` bytes of input.
    fn estimate_output(&self, input_len: usize, directive: FlushDirective) -> usize;

    /// Whether finishing takes a separate flush call before the call that
    /// seals the frame.
    fn seals_in_two_calls(&self) -> bool {
        false
    }

    /// Whether a decoder may keep going into another frame once one frame
    /// completes.
    fn continues_after_frame(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StepResult {
    pub produced: usize,
    pub input_consumed: usize,
    pub frame_complete: bool,
}

/// Exclusive owner of one native codec state object.
///
/// The native state is dropped exactly once: by [`release`](Self::release),
/// by a fatal error inside [`step`](Self::step), or when the context itself
/// is dropped.
pub(crate) struct CodecContext {
    backend: Backend,
    kind: SessionKind,
    native: Option<Box<dyn NativeCodec>>,
    staging: FixedBuffer<Vec<u8>>,
}

impl CodecContext {
    pub fn new(config: &ValidatedConfig) -> Result<Self, Error> {
        let native: Box<dyn NativeCodec> = match (config.backend, config.kind) {
            (Backend::Deflate, SessionKind::Compress) => {
                Box::new(deflate::DeflateCompressor::new(config))
            }
            (Backend::Deflate, SessionKind::Decompress) => {
                Box::new(deflate::DeflateDecompressor::new(config))
            }
            (Backend::Zstd, SessionKind::Compress) => Box::new(
                zstd::ZstdCompressor::new(config)
                    .map_err(|message| Error::codec(Backend::Zstd, message))?,
            ),
            (Backend::Zstd, SessionKind::Decompress) => Box::new(
                zstd::ZstdDecompressor::new(config)
                    .map_err(|message| Error::codec(Backend::Zstd, message))?,
            ),
        };

        Ok(Self::from_native(
            config.backend,
            config.kind,
            native,
            config.chunk_size,
        ))
    }

    pub fn from_native(
        backend: Backend,
        kind: SessionKind,
        native: Box<dyn NativeCodec>,
        chunk_size: usize,
    ) -> Self {
        Self {
            backend,
            kind,
            native: Some(native),
            staging: FixedBuffer::new(vec![0; chunk_size]),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_released(&self) -> bool {
        self.native.is_none()
    }

    pub fn seals_in_two_calls(&self) -> bool {
        self.native
            .as_ref()
            .is_some_and(|native| native.seals_in_two_calls())
    }

    pub fn estimate_output(&self, input_len: usize, directive: FlushDirective) -> usize {
        self.native
            .as_ref()
            .map_or(0, |native| native.estimate_output(input_len, directive))
    }

    /// Drive the native codec until `input` is consumed and the directive
    /// has been fully applied, appending all output to `output`.
    ///
    /// Any native error releases the context before it's returned.
    pub fn step(
        &mut self,
        input: &[u8],
        directive: FlushDirective,
        output: &mut ChunkBuffer,
    ) -> Result<StepResult, Error> {
        let Some(native) = self.native.as_mut() else {
            return Err(Error::SessionFinalized);
        };

        let capacity = self.staging.capacity();
        let mut result = StepResult::default();

        loop {
            self.staging.clear();

            let remaining = &input[result.input_consumed..];
            let progress = match native.call(remaining, &mut self.staging, directive) {
                Ok(progress) => progress,
                Err(message) => return Err(self.fail(message)),
            };

            let produced = output.drain_from(&mut self.staging);
            result.produced += produced;
            result.input_consumed += progress.consumed;

            log::trace!(
                "{} {:?} step ({directive:?}): consumed {}, produced {produced}",
                self.backend,
                self.kind,
                progress.consumed,
            );

            let input_exhausted = result.input_consumed == input.len();

            if progress.frame_complete {
                if input_exhausted || !native.continues_after_frame() {
                    result.frame_complete = true;
                    break;
                }
                continue;
            }

            let no_progress = progress.consumed == 0 && produced == 0;
            if self.kind == SessionKind::Decompress && no_progress {
                if directive == FlushDirective::Finish {
                    return Err(self.fail(
                        "compressed stream ended before the frame was complete".to_string(),
                    ));
                }
                break;
            }

            let staging_full = produced == capacity;
            if directive != FlushDirective::Finish
                && input_exhausted
                && !staging_full
                && !progress.pending
            {
                break;
            }
        }

        Ok(result)
    }

    /// Drop the native state. Calling this again is a no-op.
    pub fn release(&mut self) {
        if self.native.take().is_some() {
            log::trace!("released {} {:?} codec state", self.backend, self.kind);
        }
    }

    fn fail(&mut self, message: String) -> Error {
        log::warn!(
            "{} {:?} codec failed, releasing its state: {message}",
            self.backend,
            self.kind
        );
        self.release();
        Error::codec(self.backend, message)
    }
}

impl std::fmt::Debug for CodecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecContext")
            .field("backend", &self.backend)
            .field("kind", &self.kind)
            .field("released", &self.is_released())
            .field("chunk_size", &self.staging.capacity())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::buffer::Buffer as _;

    /// Shared counters observed by tests after the codec moved into a
    /// session.
    #[derive(Debug, Default)]
    pub struct FakeStats {
        pub calls: AtomicUsize,
        pub releases: AtomicUsize,
    }

    impl FakeStats {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    /// A "compressor" that copies input through unchanged, emits a
    /// `|` marker on flush, and seals with a trailer spanning several
    /// staging buffers.
    pub struct FakeCodec {
        pub stats: Arc<FakeStats>,
        pub trailer_len: usize,
        pub trailer_written: usize,
        pub pending_flush: bool,
        pub fail_on: Option<u8>,
        pub two_calls: bool,
    }

    impl FakeCodec {
        pub fn new(stats: Arc<FakeStats>) -> Self {
            Self {
                stats,
                trailer_len: 0,
                trailer_written: 0,
                pending_flush: false,
                fail_on: None,
                two_calls: false,
            }
        }
    }

    impl NativeCodec for FakeCodec {
        fn call(
            &mut self,
            input: &[u8],
            staging: &mut FixedBuffer<Vec<u8>>,
            directive: FlushDirective,
        ) -> Result<NativeProgress, String> {
            self.stats.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(poison) = self.fail_on {
                if input.contains(&poison) {
                    return Err(format!("poisoned byte {poison}"));
                }
            }

            let writable = staging.writable();
            let copy_len = writable.len().min(input.len());
            writable[..copy_len].copy_from_slice(&input[..copy_len]);
            staging.written(copy_len);

            if copy_len < input.len() {
                return Ok(NativeProgress {
                    consumed: copy_len,
                    pending: false,
                    frame_complete: false,
                });
            }

            let mut frame_complete = false;
            match directive {
                FlushDirective::NoFlush => {}
                FlushDirective::SyncFlush | FlushDirective::FullFlush => {
                    self.pending_flush = true;
                }
                FlushDirective::Finish => {
                    self.pending_flush = false;
                    let writable = staging.writable();
                    let trailer = (self.trailer_len - self.trailer_written).min(writable.len());
                    writable[..trailer].fill(b'#');
                    staging.written(trailer);
                    self.trailer_written += trailer;
                    frame_complete = self.trailer_written == self.trailer_len;
                }
            }

            if self.pending_flush {
                let writable = staging.writable();
                if let Some(byte) = writable.first_mut() {
                    *byte = b'|';
                    staging.written(1);
                    self.pending_flush = false;
                }
            }

            Ok(NativeProgress {
                consumed: copy_len,
                pending: self.pending_flush,
                frame_complete,
            })
        }

        fn estimate_output(&self, input_len: usize, _directive: FlushDirective) -> usize {
            input_len
        }

        fn seals_in_two_calls(&self) -> bool {
            self.two_calls
        }
    }

    impl Drop for FakeCodec {
        fn drop(&mut self) {
            self.stats.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn context(codec: FakeCodec, chunk_size: usize) -> CodecContext {
        CodecContext::from_native(
            Backend::Deflate,
            SessionKind::Compress,
            Box::new(codec),
            chunk_size,
        )
    }
}
