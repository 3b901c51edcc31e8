use assert_matches::assert_matches;
use codec_session::{Backend, Error, FlushDirective, PendingOutput, Session};
use easy_hex::Hex;
use futures::FutureExt as _;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

mod test_utils;

fn resolve_all(pending: Vec<PendingOutput>) -> Vec<u8> {
    futures::executor::block_on(async move {
        let mut output = vec![];
        for pending in pending {
            output.extend(pending.await.unwrap());
        }
        output
    })
}

proptest! {
    #[test]
    fn test_threaded_compress_then_decompress(
        (data, positions) in test_utils::arb_data_with_positions::<3>(),
        (backend, level) in test_utils::arb_backend_with_level(),
    ) {
        let chunks = test_utils::split_at_positions(&data, &positions);

        let compressor = Session::compressor(backend)
            .with_level(level)
            .build_threaded()
            .unwrap();
        let mut pending = vec![];
        for chunk in &chunks {
            pending.push(compressor.feed(chunk, FlushDirective::NoFlush).unwrap());
        }
        pending.push(compressor.finish());
        let compressed = resolve_all(pending);

        let decompressor = Session::decompressor(backend).build_threaded().unwrap();
        let pending = vec![
            decompressor.feed(&compressed, FlushDirective::NoFlush).unwrap(),
            decompressor.finish(),
        ];
        let decompressed = resolve_all(pending);

        assert_eq!(Hex(decompressed), data);
    }

    #[test]
    fn test_threaded_matches_plain_session(
        (data, positions) in test_utils::arb_data_with_positions::<2>(),
        backend in test_utils::arb_backend(),
    ) {
        let chunks = test_utils::split_at_positions(&data, &positions);

        let mut plain = Session::compressor(backend).build().unwrap();
        let expected = test_utils::run_session(&mut plain, &chunks);

        let threaded = Session::compressor(backend).build_threaded().unwrap();
        let mut pending = vec![];
        for chunk in &chunks {
            pending.push(threaded.feed(chunk, FlushDirective::NoFlush).unwrap());
        }
        pending.push(threaded.finish());

        assert_eq!(Hex(resolve_all(pending)), Hex(expected));
    }
}

#[test]
fn test_threaded_zstd_output_is_deterministic() {
    let compressor = Session::compressor(Backend::Zstd)
        .with_level(19)
        .build_threaded()
        .unwrap();
    let pending = vec![
        compressor.feed(b"foo", FlushDirective::NoFlush).unwrap(),
        compressor.finish(),
    ];

    assert_eq!(
        Hex(resolve_all(pending)),
        Hex(test_utils::from_hex("28b52ffd0068180000666f6f010000"))
    );
}

#[test]
fn test_threaded_results_resolve_in_order() {
    let compressor = Session::compressor(Backend::Deflate).build_threaded().unwrap();

    let data = b"some data worth compressing ".repeat(1000);
    let first = compressor.feed(&data, FlushDirective::SyncFlush).unwrap();
    let second = compressor.feed(b"", FlushDirective::NoFlush).unwrap();
    let last = compressor.finish();

    // The last operation resolving means the earlier ones already ran
    let last = futures::executor::block_on(last).unwrap();
    let first = first.now_or_never().unwrap().unwrap();
    let second = second.now_or_never().unwrap().unwrap();
    assert_eq!(second, b"");

    let mut compressed = first;
    compressed.extend(last);
    assert_eq!(
        test_utils::decompress_independently(Backend::Deflate, &compressed),
        data
    );
}

#[test]
fn test_threaded_input_is_copied() {
    let compressor = Session::compressor(Backend::Zstd).build_threaded().unwrap();

    let mut buffer = b"original".to_vec();
    let pending = compressor.feed(&buffer, FlushDirective::NoFlush).unwrap();
    buffer.copy_from_slice(b"modified");
    drop(buffer);

    let compressed = resolve_all(vec![pending, compressor.finish()]);
    assert_eq!(zstd::decode_all(&compressed[..]).unwrap(), b"original");
}

#[test]
fn test_threaded_feed_after_finish() {
    let compressor = Session::compressor(Backend::Zstd).build_threaded().unwrap();

    let finished = compressor.finish();
    assert!(!compressor.is_open());
    assert_matches!(
        compressor.feed(b"late", FlushDirective::NoFlush),
        Err(Error::SessionFinalized)
    );

    let compressed = futures::executor::block_on(finished).unwrap();
    assert_eq!(zstd::decode_all(&compressed[..]).unwrap(), b"");

    let again = futures::executor::block_on(compressor.finish()).unwrap();
    assert_eq!(again, b"");
}

#[test]
fn test_threaded_corrupted_input() {
    let decompressor = Session::decompressor(Backend::Zstd).build_threaded().unwrap();

    let bad = decompressor
        .feed(b"definitely not zstd", FlushDirective::NoFlush)
        .unwrap();
    let after = decompressor.feed(b"more", FlushDirective::NoFlush).unwrap();
    let finished = decompressor.finish();

    futures::executor::block_on(async move {
        assert_matches!(
            bad.await,
            Err(Error::Codec {
                backend: Backend::Zstd,
                ..
            })
        );
        assert_matches!(after.await, Err(Error::SessionFinalized));
        assert_eq!(finished.await.unwrap(), b"");
    });
}

#[test]
fn test_threaded_sessions_are_independent() {
    let broken = Session::decompressor(Backend::Deflate)
        .build_threaded()
        .unwrap();
    let healthy = Session::compressor(Backend::Deflate).build_threaded().unwrap();

    let failed = broken.feed(&[0xff; 16], FlushDirective::NoFlush).unwrap();
    let fed = healthy.feed(b"unaffected", FlushDirective::NoFlush).unwrap();
    let finished = healthy.finish();

    assert_matches!(
        futures::executor::block_on(failed),
        Err(Error::Codec { .. })
    );
    let compressed = resolve_all(vec![fed, finished]);
    assert_eq!(
        test_utils::decompress(Backend::Deflate, &compressed),
        b"unaffected"
    );
}

#[test]
fn test_threaded_dispose() {
    let compressor = Session::compressor(Backend::Deflate).build_threaded().unwrap();

    let queued = compressor.feed(b"queued", FlushDirective::NoFlush).unwrap();
    compressor.dispose();
    compressor.dispose();

    assert!(!compressor.is_open());
    assert_matches!(
        compressor.feed(b"late", FlushDirective::NoFlush),
        Err(Error::SessionFinalized)
    );

    // Queued work still runs before the release
    assert_matches!(futures::executor::block_on(queued), Ok(_));
    assert_eq!(futures::executor::block_on(compressor.finish()).unwrap(), b"");
}

#[test]
fn test_threaded_shared_between_threads() {
    let compressor = std::sync::Arc::new(
        Session::compressor(Backend::Zstd)
            .build_threaded()
            .unwrap(),
    );

    let handle = std::thread::spawn({
        let compressor = compressor.clone();
        move || compressor.feed(b"from another thread", FlushDirective::NoFlush)
    });
    let fed = handle.join().unwrap().unwrap();

    let compressed = resolve_all(vec![fed, compressor.finish()]);
    assert_eq!(
        zstd::decode_all(&compressed[..]).unwrap(),
        b"from another thread"
    );
}
