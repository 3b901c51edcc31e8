use crate::{Backend, Error, SessionKind};

/// Smallest accepted staging buffer size.
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Largest accepted staging buffer size.
pub const MAX_CHUNK_SIZE: usize = 10 * 1024 * 1024;

pub const DEFAULT_DEFLATE_LEVEL: i32 = -1;
pub const DEFAULT_DEFLATE_CHUNK_SIZE: usize = 16 * 1024;
pub const DEFAULT_MEMORY_LEVEL: u32 = 8;
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Options for creating a session. Unset options use the backend's
/// defaults.
///
/// | Option | Applies to | Range |
/// |---|---|---|
/// | `level` | compressors | deflate `-1..=9`, zstd `1..=22` |
/// | `memory_level` | deflate compressors | `1..=9` (see below) |
/// | `chunk_size` | all sessions | `1 KiB..=10 MiB` |
/// | `threads` | zstd compressors | any; `0` disables zstd's own workers |
///
/// Setting an option where it doesn't apply is a configuration error
/// rather than being ignored.
///
/// `memory_level` is range-checked but has no effect on the output: the
/// deflate engine behind `flate2` sizes its hash tables on its own, which
/// corresponds to zlib's default memory level of 8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub level: Option<i32>,
    pub memory_level: Option<u32>,
    pub chunk_size: Option<usize>,
    pub threads: Option<u32>,
}

/// A [`SessionConfig`] that passed validation for a specific backend and
/// session kind, with defaults filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ValidatedConfig {
    pub backend: Backend,
    pub kind: SessionKind,
    pub level: i32,
    pub memory_level: u32,
    pub chunk_size: usize,
    pub threads: u32,
}

impl SessionConfig {
    pub(crate) fn validate(
        &self,
        backend: Backend,
        kind: SessionKind,
    ) -> Result<ValidatedConfig, Error> {
        let chunk_size = match self.chunk_size {
            Some(size) if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) => {
                return Err(Error::Config(format!(
                    "chunk size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE} bytes, got {size}"
                )));
            }
            Some(size) => size,
            None => default_chunk_size(backend, kind),
        };

        if kind == SessionKind::Decompress {
            reject_option(self.level.is_some(), "level", "decompression sessions")?;
            reject_option(
                self.memory_level.is_some(),
                "memory level",
                "decompression sessions",
            )?;
            reject_option(self.threads.is_some(), "threads", "decompression sessions")?;

            return Ok(ValidatedConfig {
                backend,
                kind,
                level: 0,
                memory_level: 0,
                chunk_size,
                threads: 0,
            });
        }

        match backend {
            Backend::Deflate => {
                reject_option(self.threads.is_some(), "threads", "the deflate backend")?;

                let level = self.level.unwrap_or(DEFAULT_DEFLATE_LEVEL);
                if !(-1..=9).contains(&level) {
                    return Err(Error::Config(format!(
                        "deflate compression level must be between -1 and 9, got {level}"
                    )));
                }

                let memory_level = self.memory_level.unwrap_or(DEFAULT_MEMORY_LEVEL);
                if !(1..=9).contains(&memory_level) {
                    return Err(Error::Config(format!(
                        "memory level must be between 1 and 9, got {memory_level}"
                    )));
                }

                Ok(ValidatedConfig {
                    backend,
                    kind,
                    level,
                    memory_level,
                    chunk_size,
                    threads: 0,
                })
            }
            Backend::Zstd => {
                reject_option(
                    self.memory_level.is_some(),
                    "memory level",
                    "the zstd backend",
                )?;

                let level = self.level.unwrap_or(DEFAULT_ZSTD_LEVEL);
                if !(1..=22).contains(&level) {
                    return Err(Error::Config(format!(
                        "zstd compression level must be between 1 and 22, got {level}"
                    )));
                }

                Ok(ValidatedConfig {
                    backend,
                    kind,
                    level,
                    memory_level: 0,
                    chunk_size,
                    threads: self.threads.unwrap_or(0),
                })
            }
        }
    }
}

fn reject_option(is_set: bool, option: &str, target: &str) -> Result<(), Error> {
    if is_set {
        Err(Error::Config(format!("{option} does not apply to {target}")))
    } else {
        Ok(())
    }
}

fn default_chunk_size(backend: Backend, kind: SessionKind) -> usize {
    match (backend, kind) {
        (Backend::Deflate, _) => DEFAULT_DEFLATE_CHUNK_SIZE,
        (Backend::Zstd, SessionKind::Compress) => zstd::zstd_safe::CCtx::out_size(),
        (Backend::Zstd, SessionKind::Decompress) => zstd::zstd_safe::DCtx::out_size(),
    }
}
