//! End-to-end extraction tests: batching, dedup, miner registration and
//! stream handling through the public API.

use flate2::write::GzEncoder;
use flate2::Compression;
use nativex::{DedupPolicy, EngineState, Extractor, NativexError, Occurrence, Stream};
use std::fs;
use std::io::Write;
use tempfile::TempDir;

fn glob_extractor(patterns: &[&str], policy: DedupPolicy) -> Extractor {
    let mut extractor = Extractor::builder().dedup_policy(policy).build().unwrap();
    for pattern in patterns {
        assert!(extractor.register_builtin_miner("match_glob", pattern));
    }
    extractor
}

fn values(occurrences: &[Occurrence]) -> Vec<&str> {
    occurrences.iter().map(|o| o.value.as_str()).collect()
}

#[test]
fn test_batch_count_is_ceiling() {
    // 25 matches, batch size 10: 10, 10, 5
    let text = "ab ".repeat(25);
    let mut extractor = Extractor::builder()
        .batch_size(10)
        .window_size(16)
        .build()
        .unwrap();
    assert!(extractor.register_builtin_miner("match_glob", "ab"));
    extractor.bind_stream(Stream::from_text(&text)).unwrap();

    let mut sizes = Vec::new();
    while !extractor.is_at_end().unwrap() {
        sizes.push(extractor.next_batch().unwrap().len());
    }
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(extractor.state(), EngineState::AtEnd);
    assert_eq!(extractor.stats().batches, 3);
    assert_eq!(extractor.stats().occurrences, 25);
}

#[test]
fn test_exact_multiple_needs_no_empty_batch() {
    // 20 matches, batch size 10: the end is known right after the second batch
    let text = "ab ".repeat(20);
    let mut extractor = Extractor::builder().batch_size(10).build().unwrap();
    assert!(extractor.register_builtin_miner("match_glob", "ab"));
    extractor.bind_stream(Stream::from_text(&text)).unwrap();

    assert_eq!(extractor.next_batch().unwrap().len(), 10);
    assert!(!extractor.is_at_end().unwrap());
    assert_eq!(extractor.next_batch().unwrap().len(), 10);
    assert!(extractor.is_at_end().unwrap());
}

#[test]
fn test_batches_iterator_matches_extract_all() {
    let text = "x1 x2 x3 x4 x5 x6 x7";
    let mut extractor = Extractor::builder().batch_size(3).build().unwrap();
    assert!(extractor.register_builtin_miner("match_glob", "x?"));

    extractor.bind_stream(Stream::from_text(text)).unwrap();
    let batched: Vec<Occurrence> = extractor.batches().flat_map(|b| b.unwrap()).collect();

    extractor.unbind_stream();
    extractor.bind_stream(Stream::from_text(text)).unwrap();
    let all = extractor.extract_all().unwrap();

    assert_eq!(batched, all);
    assert_eq!(values(&all), ["x1", "x2", "x3", "x4", "x5", "x6", "x7"]);
}

#[test]
fn test_literal_date() {
    let mut extractor = glob_extractor(&["2020-05-05"], DedupPolicy::KeepAll);
    extractor
        .bind_stream(Stream::from_text("released 2020-05-05, patched 2020-05-06"))
        .unwrap();
    let found = extractor.extract_all().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].pos, 9);
    assert_eq!(found[0].len, 10);
    assert_eq!(found[0].label, "Glob");
    assert_eq!(found[0].miner, "match_glob");

    let mut extractor = glob_extractor(&["2020-05-05"], DedupPolicy::KeepAll);
    extractor.bind_stream(Stream::from_text("2020-05-05")).unwrap();
    let whole = extractor.extract_all().unwrap();
    assert_eq!(whole.len(), 1);
    assert_eq!(whole[0].span(), (0, 10));

    extractor.bind_stream(Stream::from_text("2020-05-06")).unwrap();
    assert!(extractor.extract_all().unwrap().is_empty());

    let mut extractor = glob_extractor(&["2020-05-05"], DedupPolicy::KeepAll);
    extractor
        .bind_stream(Stream::from_text("only 2020-05-06 here"))
        .unwrap();
    assert!(extractor.extract_all().unwrap().is_empty());
}

#[test]
fn test_enclosed_occurrences() {
    let patterns = ["123", "456", "123 456"];

    let mut keep_all = glob_extractor(&patterns, DedupPolicy::KeepAll);
    keep_all.bind_stream(Stream::from_text("123 456")).unwrap();
    let all = keep_all.extract_all().unwrap();
    assert_eq!(values(&all), ["123 456", "123", "456"]);

    let mut maximal = glob_extractor(&patterns, DedupPolicy::KeepMaximal);
    maximal.bind_stream(Stream::from_text("123 456")).unwrap();
    let kept = maximal.extract_all().unwrap();
    assert_eq!(values(&kept), ["123 456"]);
    assert_eq!(maximal.stats().suppressed, 2);
}

#[test]
fn test_enclosed_filter_spans_windows() {
    // The long match starts in the first window, the short one in the second
    let text = "aaaa-bbbb";
    let mut extractor = Extractor::builder()
        .window_size(4)
        .dedup_policy(DedupPolicy::KeepMaximal)
        .build()
        .unwrap();
    assert!(extractor.register_builtin_miner("match_glob", "aaaa-bbbb"));
    assert!(extractor.register_builtin_miner("match_glob", "bbbb"));
    extractor.bind_stream(Stream::from_text(text)).unwrap();
    assert_eq!(values(&extractor.extract_all().unwrap()), ["aaaa-bbbb"]);
}

#[test]
fn test_unicode_offsets() {
    let mut extractor = Extractor::new();
    assert!(extractor.register_builtin_miner("match_dictionary", "brno,plzeň"));
    extractor
        .bind_stream(Stream::from_text("žluťoučký kůň v plzeň a brno"))
        .unwrap();
    let found = extractor.extract_all().unwrap();
    assert_eq!(values(&found), ["plzeň", "brno"]);
    assert_eq!(found[0].upos, 16);
    assert_eq!(found[0].ulen, 5);
    assert_eq!(found[0].len, 6);
    assert_eq!(found[1].upos, 24);
}

#[test]
fn test_failed_miner_leaves_registry_intact() {
    let mut extractor = Extractor::new();
    assert!(extractor.register_builtin_miner("match_glob", "ok"));

    assert!(!extractor.register_miner("/nonexistent/libminers.so", "match_phone", ""));
    assert_eq!(extractor.miners().len(), 1);
    let reason = extractor.last_error().unwrap();
    assert!(reason.contains("libminers.so"), "{}", reason);

    assert!(!extractor.register_builtin_miner("match_nothing", ""));
    assert!(!extractor.register_builtin_miner("match_glob", "[unclosed"));
    assert_eq!(extractor.miners().len(), 1);

    assert!(extractor.register_builtin_miner("match_glob", "fine"));
    extractor
        .bind_stream(Stream::from_text("ok then, fine"))
        .unwrap();
    assert_eq!(values(&extractor.extract_all().unwrap()), ["ok", "fine"]);
}

#[test]
fn test_list_meta() {
    let mut extractor = Extractor::new();
    assert!(extractor.register_builtin_miner("match_glob", "a*"));
    assert!(extractor.register_builtin_miner("match_dictionary", "praha"));
    let meta = extractor.list_meta();
    assert_eq!(meta.len(), 2);
    assert_eq!(meta["Glob"].miner, "match_glob");
    assert_eq!(meta["Dictionary"].miner, "match_dictionary");
}

#[test]
fn test_state_errors() {
    let mut extractor = glob_extractor(&["x"], DedupPolicy::KeepAll);
    assert_eq!(extractor.state(), EngineState::Unbound);
    assert!(matches!(
        extractor.next_batch(),
        Err(NativexError::InvalidState(_))
    ));
    assert!(matches!(
        extractor.is_at_end(),
        Err(NativexError::InvalidState(_))
    ));
    assert!(extractor.last_error().is_some());

    extractor.bind_stream(Stream::from_text("x x")).unwrap();
    assert_eq!(extractor.state(), EngineState::Bound);
    assert!(matches!(
        extractor.bind_stream(Stream::from_text("y")),
        Err(NativexError::InvalidState(_))
    ));

    // Draining allows a rebind without an explicit unbind
    assert_eq!(extractor.extract_all().unwrap().len(), 2);
    extractor.bind_stream(Stream::from_text("x")).unwrap();
    assert_eq!(extractor.extract_all().unwrap().len(), 1);

    let mut closed = Stream::from_text("x");
    closed.close();
    assert!(matches!(
        extractor.bind_stream(closed),
        Err(NativexError::ResourceFailure(_))
    ));
}

#[test]
fn test_empty_stream_is_immediately_at_end() {
    let mut extractor = glob_extractor(&["x"], DedupPolicy::KeepAll);
    extractor.bind_stream(Stream::from_text("")).unwrap();
    assert_eq!(extractor.state(), EngineState::AtEnd);
    assert!(extractor.is_at_end().unwrap());
    assert!(extractor.next_batch().unwrap().is_empty());
}

#[test]
fn test_parallel_matches_sequential() {
    let mut text = String::new();
    for i in 0..4000 {
        text.push_str(&format!("id-{:04} 2020-05-{:02} note{} ", i, i % 28 + 1, i % 7));
    }
    let patterns = ["id-????", "2020-05-0?", "note*", "id-00*"];

    let run = |threads: usize| {
        let mut extractor = Extractor::builder()
            .threads(threads)
            .window_size(32 * 1024)
            .batch_size(500)
            .dedup_policy(DedupPolicy::KeepMaximal)
            .build()
            .unwrap();
        for pattern in patterns {
            assert!(extractor.register_builtin_miner("match_glob", pattern));
        }
        extractor.bind_stream(Stream::from_text(&text)).unwrap();
        extractor.extract_all().unwrap()
    };

    let sequential = run(1);
    let parallel = run(4);
    assert!(!sequential.is_empty());
    assert_eq!(sequential, parallel);
}

#[test]
fn test_file_and_gzip_streams() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("input.txt");
    fs::write(&plain, "call +1 (846) 569-3535 now").unwrap();

    let gz = dir.path().join("input.txt.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&gz).unwrap(), Compression::default());
    encoder.write_all(b"call +1 (846) 569-3535 now").unwrap();
    encoder.finish().unwrap();

    for path in [&plain, &gz] {
        let mut extractor = glob_extractor(&["+1 (???) ???-????"], DedupPolicy::KeepAll);
        extractor.bind_stream(Stream::open_file(path).unwrap()).unwrap();
        let found = extractor.extract_all().unwrap();
        assert_eq!(values(&found), ["+1 (846) 569-3535"], "{}", path.display());
        assert_eq!(found[0].pos, 5);
    }
}

#[test]
fn test_unbind_returns_stream() {
    let mut extractor = glob_extractor(&["x"], DedupPolicy::KeepAll);
    extractor.bind_stream(Stream::from_text("x y x")).unwrap();
    assert_eq!(extractor.next_batch_of(1).unwrap().len(), 1);
    let stream = extractor.unbind_stream().unwrap();
    assert!(stream.is_valid());
    assert_eq!(extractor.state(), EngineState::Unbound);
    assert!(extractor.unbind_stream().is_none());
}

#[test]
fn test_rebinding_partly_read_stream_starts_over() {
    let mut first = glob_extractor(&["x"], DedupPolicy::KeepAll);
    first.bind_stream(Stream::from_text("x y x")).unwrap();
    assert_eq!(first.next_batch_of(1).unwrap().len(), 1);
    let stream = first.unbind_stream().unwrap();

    let mut second = glob_extractor(&["x"], DedupPolicy::KeepAll);
    second.bind_stream(stream).unwrap();
    assert_eq!(second.state(), EngineState::Bound);
    assert!(!second.is_at_end().unwrap());
    let all = second.extract_all().unwrap();
    assert_eq!(all.iter().map(|o| o.pos).collect::<Vec<_>>(), [0, 4]);
}
