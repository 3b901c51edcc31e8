use crate::Error;

/// Caller intent for one `feed` call, normalized across backends.
///
/// Backends that lack a directive degrade it to the nearest one they
/// support (never to a no-op): zstd has no back-reference reset, so
/// [`FullFlush`](Self::FullFlush) becomes a plain flush there, and
/// decompressors treat both flush variants alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FlushDirective {
    /// The codec may hold input back. Feeding empty input with this
    /// directive is a no-op that never reaches the codec.
    #[default]
    NoFlush,

    /// Emit everything buffered so far; the stream stays open.
    SyncFlush,

    /// Like [`SyncFlush`](Self::SyncFlush), but also resets back-reference
    /// state so decoding can resume at this boundary after data loss.
    FullFlush,

    /// Seal the frame, including any trailing metadata.
    Finish,
}

impl FlushDirective {
    /// Numeric value, using zlib's flush numbering.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::NoFlush => 0,
            Self::SyncFlush => 2,
            Self::FullFlush => 3,
            Self::Finish => 4,
        }
    }

    pub(crate) fn to_deflate(self) -> flate2::FlushCompress {
        match self {
            Self::NoFlush => flate2::FlushCompress::None,
            Self::SyncFlush => flate2::FlushCompress::Sync,
            Self::FullFlush => flate2::FlushCompress::Full,
            Self::Finish => flate2::FlushCompress::Finish,
        }
    }

    pub(crate) fn to_inflate(self) -> flate2::FlushDecompress {
        match self {
            Self::NoFlush => flate2::FlushDecompress::None,
            Self::SyncFlush | Self::FullFlush => flate2::FlushDecompress::Sync,
            // Inflate's own `Finish` expects all output to fit in one call.
            // The end of the stream shows up as `Status::StreamEnd` anyway
            Self::Finish => flate2::FlushDecompress::None,
        }
    }

    pub(crate) fn to_zstd(self) -> zstd::zstd_safe::zstd_sys::ZSTD_EndDirective {
        use zstd::zstd_safe::zstd_sys::ZSTD_EndDirective;

        match self {
            Self::NoFlush => ZSTD_EndDirective::ZSTD_e_continue,
            Self::SyncFlush | Self::FullFlush => ZSTD_EndDirective::ZSTD_e_flush,
            Self::Finish => ZSTD_EndDirective::ZSTD_e_end,
        }
    }
}

impl TryFrom<i32> for FlushDirective {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoFlush),
            2 => Ok(Self::SyncFlush),
            3 => Ok(Self::FullFlush),
            4 => Ok(Self::Finish),
            other => Err(Error::InvalidArgument(format!(
                "invalid flush directive {other}"
            ))),
        }
    }
}
