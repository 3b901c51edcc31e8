#![allow(unused)]

use codec_session::{Backend, FlushDirective, Session};
use proptest::prelude::*;

pub type Data = easy_hex::Hex<Vec<u8>>;

pub const MAX_DATA_LENGTH: usize = 1000;
pub const MIN_ZSTD_LEVEL: i32 = 1;
pub const MAX_ZSTD_LEVEL: i32 = 15;

pub fn arb_data() -> impl Strategy<Value = Data> {
    prop::collection::vec(any::<u8>(), 0..=MAX_DATA_LENGTH).prop_map(easy_hex::Hex)
}

/// Mostly-repetitive data, which compresses to something much smaller
/// than its input.
pub fn arb_compressible_data() -> impl Strategy<Value = Data> {
    prop::collection::vec(prop::sample::select(&b"abc "[..]), 0..=MAX_DATA_LENGTH * 10)
        .prop_map(easy_hex::Hex)
}

pub fn arb_data_with_pos() -> impl Strategy<Value = (Data, usize)> {
    arb_data().prop_flat_map(|data| {
        let len = data.len();
        (Just(data), 0..=len)
    })
}

pub fn arb_data_with_positions<const N: usize>() -> impl Strategy<Value = (Data, [usize; N])> {
    arb_data().prop_flat_map(|data| {
        let len = data.len();
        (Just(data), prop::array::uniform(0..=len))
    })
}

pub fn arb_backend() -> impl Strategy<Value = Backend> {
    prop_oneof![Just(Backend::Deflate), Just(Backend::Zstd)]
}

pub fn arb_deflate_level() -> impl Strategy<Value = i32> {
    -1..=9
}

pub fn arb_zstd_level() -> impl Strategy<Value = i32> {
    MIN_ZSTD_LEVEL..=MAX_ZSTD_LEVEL
}

pub fn arb_level(backend: Backend) -> BoxedStrategy<i32> {
    match backend {
        Backend::Deflate => arb_deflate_level().boxed(),
        Backend::Zstd => arb_zstd_level().boxed(),
    }
}

pub fn arb_backend_with_level() -> impl Strategy<Value = (Backend, i32)> {
    arb_backend().prop_flat_map(|backend| (Just(backend), arb_level(backend)))
}

pub fn arb_chunk_size() -> impl Strategy<Value = usize> {
    codec_session::config::MIN_CHUNK_SIZE..=4 * codec_session::config::MIN_CHUNK_SIZE
}

pub fn arb_directive() -> impl Strategy<Value = FlushDirective> {
    prop_oneof![
        4 => Just(FlushDirective::NoFlush),
        1 => Just(FlushDirective::SyncFlush),
        1 => Just(FlushDirective::FullFlush),
    ]
}

/// Split `data` at each of `positions` (in any order).
pub fn split_at_positions<'a>(data: &'a [u8], positions: &[usize]) -> Vec<&'a [u8]> {
    let mut positions = positions.to_vec();
    positions.sort_unstable();

    let mut chunks = vec![];
    let mut start = 0;
    for pos in positions {
        chunks.push(&data[start..pos]);
        start = pos;
    }
    chunks.push(&data[start..]);
    chunks
}

/// Run every chunk through `session`, then finish it, and concatenate
/// all the output.
pub fn run_session(session: &mut Session, chunks: &[&[u8]]) -> Vec<u8> {
    let mut output = vec![];
    for chunk in chunks {
        output.extend(session.feed(chunk, FlushDirective::NoFlush).unwrap());
    }
    output.extend(session.finish().unwrap());
    output
}

pub fn decompress(backend: Backend, compressed: &[u8]) -> Vec<u8> {
    let mut session = Session::decompressor(backend).build().unwrap();
    run_session(&mut session, &[compressed])
}

/// Decompress with a decoder that doesn't share any code with the
/// sessions under test.
pub fn decompress_independently(backend: Backend, compressed: &[u8]) -> Vec<u8> {
    match backend {
        Backend::Deflate => {
            use std::io::Read as _;

            let mut decoded = vec![];
            flate2::read::DeflateDecoder::new(compressed)
                .read_to_end(&mut decoded)
                .unwrap();
            decoded
        }
        Backend::Zstd => zstd::decode_all(compressed).unwrap(),
    }
}

pub fn compress_independently(backend: Backend, data: &[u8]) -> Vec<u8> {
    match backend {
        Backend::Deflate => {
            use std::io::Write as _;

            let mut encoder =
                flate2::write::DeflateEncoder::new(vec![], flate2::Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        Backend::Zstd => zstd::encode_all(data, 3).unwrap(),
    }
}

pub fn from_hex(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}
