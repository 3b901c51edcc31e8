//! Incremental DEFLATE and zstd compression exposed as sessions.
//!
//! A [`Session`] takes arbitrarily sized chunks of input and hands back
//! whatever output the codec produced for them. Concatenating every chunk
//! of output, in order, always gives the complete stream, no matter how the
//! input was split. [`ThreadedSession`] runs the same work on a background
//! worker and returns a future per operation.
//!
//! Output is the raw backend stream: raw DEFLATE (no zlib or gzip
//! wrapper), or zstd frames.
//!
//! For `std::io` and async I/O, see [`SessionWriter`] and
//! [`AsyncSessionWriter`].

#[macro_use]
mod macros;

pub mod async_writer;
mod buffer;
mod codec;
pub mod config;
mod error;
mod flush;
mod session;
mod threaded;
pub mod writer;

pub use async_writer::AsyncSessionWriter;
pub use codec::{Backend, SessionKind};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use flush::FlushDirective;
pub use session::{Session, SessionBuilder, SessionState};
pub use threaded::{PendingOutput, ThreadedSession};
pub use writer::SessionWriter;

/// Create a compression session for `backend`.
///
/// The configuration is validated before any codec state gets allocated.
pub fn create_compression_session(backend: Backend, config: SessionConfig) -> Result<Session> {
    Session::compressor(backend).with_config(config).build()
}

/// Create a decompression session for `backend` with default settings.
pub fn create_decompression_session(backend: Backend) -> Result<Session> {
    Session::decompressor(backend).build()
}

/// Compress `data` in a single call, returning one complete stream.
///
/// Uses the backend's default level when `level` is `None`.
pub fn compress_once(backend: Backend, data: &[u8], level: Option<i32>) -> Result<Vec<u8>> {
    match backend {
        Backend::Zstd => {
            let level = level.unwrap_or(config::DEFAULT_ZSTD_LEVEL);

            // Validate the same way sessions do so the accepted range matches
            SessionConfig {
                level: Some(level),
                ..Default::default()
            }
            .validate(backend, SessionKind::Compress)?;

            zstd::bulk::compress(data, level)
                .map_err(|error| Error::codec(Backend::Zstd, error.to_string()))
        }
        Backend::Deflate => {
            let mut builder = Session::compressor(backend);
            if let Some(level) = level {
                builder = builder.with_level(level);
            }

            let mut session = builder.build()?;
            session.feed(data, FlushDirective::Finish)
        }
    }
}

/// Version string of the library behind `backend`. See
/// [`Backend::version`] for what the deflate backend reports.
pub fn backend_version(backend: Backend) -> String {
    backend.version()
}
