use crate::{
    buffer::{Buffer as _, FixedBuffer},
    config::ValidatedConfig,
    FlushDirective,
};

use super::{NativeCodec, NativeProgress};

pub(crate) fn version() -> String {
    // flate2 is built on its pure-Rust inflate/deflate engine by default,
    // which doesn't report a version of its own
    "miniz_oxide".to_string()
}

fn progress_between(before: u64, after: u64) -> usize {
    (after - before)
        .try_into()
        .expect("could not cast deflate progress to usize")
}

/// Raw DEFLATE compressor (no zlib header or trailer).
pub(crate) struct DeflateCompressor {
    compress: flate2::Compress,
}

impl DeflateCompressor {
    pub fn new(config: &ValidatedConfig) -> Self {
        let level = match u32::try_from(config.level) {
            Ok(level) => flate2::Compression::new(level),
            Err(_) => flate2::Compression::default(),
        };

        // The memory level is validated but flate2 keeps its own hash
        // table sizing, equivalent to zlib's default of 8
        log::debug!(
            "creating deflate compressor (level {}, memory level {}, chunk size {})",
            level.level(),
            config.memory_level,
            config.chunk_size,
        );

        Self {
            compress: flate2::Compress::new(level, false),
        }
    }
}

impl NativeCodec for DeflateCompressor {
    fn call(
        &mut self,
        input: &[u8],
        staging: &mut FixedBuffer<Vec<u8>>,
        directive: FlushDirective,
    ) -> Result<NativeProgress, String> {
        let total_in = self.compress.total_in();
        let total_out = self.compress.total_out();

        let status = self
            .compress
            .compress(input, staging.writable(), directive.to_deflate())
            .map_err(|error| format!("deflate failed: {error}"))?;

        staging.written(progress_between(total_out, self.compress.total_out()));

        // `BufError` only means no progress was possible; the caller's loop
        // decides whether that ends the step
        Ok(NativeProgress {
            consumed: progress_between(total_in, self.compress.total_in()),
            pending: false,
            frame_complete: status == flate2::Status::StreamEnd,
        })
    }

    fn estimate_output(&self, input_len: usize, directive: FlushDirective) -> usize {
        match directive {
            FlushDirective::Finish => input_len.saturating_mul(2),
            _ => input_len,
        }
    }
}

/// Raw DEFLATE decompressor.
pub(crate) struct DeflateDecompressor {
    decompress: flate2::Decompress,
    chunk_size: usize,
    frame_open: bool,
    stream_ended: bool,
}

impl DeflateDecompressor {
    pub fn new(config: &ValidatedConfig) -> Self {
        log::debug!(
            "creating deflate decompressor (chunk size {})",
            config.chunk_size
        );

        Self {
            decompress: flate2::Decompress::new(false),
            chunk_size: config.chunk_size,
            frame_open: false,
            stream_ended: false,
        }
    }
}

impl NativeCodec for DeflateDecompressor {
    fn call(
        &mut self,
        input: &[u8],
        staging: &mut FixedBuffer<Vec<u8>>,
        directive: FlushDirective,
    ) -> Result<NativeProgress, String> {
        // A raw deflate stream holds exactly one frame; anything after its
        // end is left unconsumed
        let nothing_started =
            directive == FlushDirective::Finish && input.is_empty() && !self.frame_open;
        if self.stream_ended || nothing_started {
            return Ok(NativeProgress {
                consumed: 0,
                pending: false,
                frame_complete: true,
            });
        }

        let total_in = self.decompress.total_in();
        let total_out = self.decompress.total_out();

        let status = self
            .decompress
            .decompress(input, staging.writable(), directive.to_inflate())
            .map_err(|error| format!("inflate failed: {error}"))?;

        staging.written(progress_between(total_out, self.decompress.total_out()));
        let consumed = progress_between(total_in, self.decompress.total_in());

        if consumed > 0 {
            self.frame_open = true;
        }
        if status == flate2::Status::StreamEnd {
            self.frame_open = false;
            self.stream_ended = true;
        }

        Ok(NativeProgress {
            consumed,
            pending: false,
            frame_complete: self.stream_ended,
        })
    }

    fn estimate_output(&self, _input_len: usize, _directive: FlushDirective) -> usize {
        self.chunk_size
    }
}
