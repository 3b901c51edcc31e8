use ::zstd::{
    stream::raw::Operation as _,
    zstd_safe::{self, CParameter},
};

use crate::{buffer::FixedBuffer, config::ValidatedConfig, FlushDirective};

use super::{NativeCodec, NativeProgress};

pub(crate) fn version() -> String {
    zstd_safe::version_string().to_string()
}

fn error_name(code: zstd_safe::ErrorCode) -> String {
    zstd_safe::get_error_name(code).to_string()
}

pub(crate) struct ZstdCompressor {
    cctx: zstd_safe::CCtx<'static>,
}

impl ZstdCompressor {
    pub fn new(config: &ValidatedConfig) -> Result<Self, String> {
        log::debug!(
            "creating zstd compressor (level {}, threads {}, chunk size {})",
            config.level,
            config.threads,
            config.chunk_size,
        );

        let mut cctx = zstd_safe::CCtx::try_create()
            .ok_or_else(|| "failed to create zstd compression context".to_string())?;

        cctx.set_parameter(CParameter::CompressionLevel(config.level))
            .map_err(error_name)?;
        if config.threads > 0 {
            cctx.set_parameter(CParameter::NbWorkers(config.threads))
                .map_err(error_name)?;
        }

        Ok(Self { cctx })
    }
}

impl NativeCodec for ZstdCompressor {
    fn call(
        &mut self,
        input: &[u8],
        staging: &mut FixedBuffer<Vec<u8>>,
        directive: FlushDirective,
    ) -> Result<NativeProgress, String> {
        if directive == FlushDirective::FullFlush {
            log::trace!("zstd has no full flush, using a regular flush");
        }

        let mut in_buffer = zstd_safe::InBuffer::around(input);
        let (result, _) = crate::buffer::with_zstd_out_buffer(staging, |out_buffer| {
            self.cctx
                .compress_stream2(out_buffer, &mut in_buffer, directive.to_zstd())
        });

        // For `NoFlush` the result is only a size hint; for the other
        // directives it counts bytes still waiting to be flushed
        let remaining = result.map_err(error_name)?;
        let flushing = directive != FlushDirective::NoFlush;

        Ok(NativeProgress {
            consumed: in_buffer.pos(),
            pending: flushing && remaining > 0,
            frame_complete: directive == FlushDirective::Finish && remaining == 0,
        })
    }

    fn estimate_output(&self, input_len: usize, directive: FlushDirective) -> usize {
        match directive {
            FlushDirective::Finish => zstd_safe::compress_bound(input_len),
            _ => input_len,
        }
    }

    fn seals_in_two_calls(&self) -> bool {
        true
    }
}

pub(crate) struct ZstdDecompressor {
    decoder: ::zstd::stream::raw::Decoder<'static>,
    frame_open: bool,
}

impl ZstdDecompressor {
    pub fn new(config: &ValidatedConfig) -> Result<Self, String> {
        log::debug!(
            "creating zstd decompressor (chunk size {})",
            config.chunk_size
        );

        let decoder = ::zstd::stream::raw::Decoder::new().map_err(|error| error.to_string())?;

        Ok(Self {
            decoder,
            frame_open: false,
        })
    }
}

impl NativeCodec for ZstdDecompressor {
    fn call(
        &mut self,
        input: &[u8],
        staging: &mut FixedBuffer<Vec<u8>>,
        directive: FlushDirective,
    ) -> Result<NativeProgress, String> {
        if directive == FlushDirective::Finish && input.is_empty() && !self.frame_open {
            return Ok(NativeProgress {
                consumed: 0,
                pending: false,
                frame_complete: true,
            });
        }

        let mut in_buffer = zstd_safe::InBuffer::around(input);
        let (result, _) = crate::buffer::with_zstd_out_buffer(staging, |out_buffer| {
            self.decoder.run(&mut in_buffer, out_buffer)
        });

        let hint = result.map_err(|error| error.to_string())?;
        let consumed = in_buffer.pos();

        if consumed > 0 {
            self.frame_open = true;
        }
        let frame_complete = hint == 0;
        if frame_complete {
            self.frame_open = false;
        }

        Ok(NativeProgress {
            consumed,
            pending: false,
            frame_complete,
        })
    }

    fn estimate_output(&self, _input_len: usize, _directive: FlushDirective) -> usize {
        zstd_safe::DCtx::out_size()
    }

    fn continues_after_frame(&self) -> bool {
        true
    }
}
