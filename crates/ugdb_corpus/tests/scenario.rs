//! End-to-end transaction scenarios.

use ugdb_corpus::{Corpus, CorpusError, TxnState};
use ugdb_testkit::prelude::*;

#[test]
fn counter_written_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corpus");

    let mut corpus = Corpus::create(&path).unwrap();
    corpus.begin_read_write().unwrap();
    corpus.write_counter_str("a", 7).unwrap();
    corpus.commit().unwrap();

    corpus.begin_read_only().unwrap();
    assert_eq!(corpus.read_counter_str("a").unwrap(), 7);
    corpus.commit().unwrap();
    corpus.close().unwrap();

    let mut corpus = Corpus::open(&path).unwrap();
    corpus.begin_read_only().unwrap();
    assert_eq!(corpus.read_counter_str("a").unwrap(), 7);
    corpus.commit().unwrap();
    corpus.close().unwrap();
}

#[test]
fn reader_sees_its_snapshot_until_renewed() {
    with_temp_corpus(|writer| {
        let mut reader = writer.share();
        reader.begin_read_only().unwrap();

        writer.begin_read_write().unwrap();
        writer.write(b"k", b"v").unwrap();
        assert!(!reader.exists(b"k").unwrap());
        writer.commit().unwrap();

        assert!(!reader.exists(b"k").unwrap());
        reader.commit().unwrap();

        reader.begin_read_only().unwrap();
        assert_eq!(reader.read(b"k").unwrap(), *b"v");
        reader.commit().unwrap();
    });
}

#[test]
fn read_only_then_read_write() {
    with_temp_corpus(|corpus| {
        corpus.begin_read_only().unwrap();
        assert!(!corpus.exists(b"k").unwrap());
        corpus.commit().unwrap();
        assert!(corpus.has_parked_reader());

        corpus.begin_read_write().unwrap();
        assert_eq!(corpus.state(), TxnState::ReadWriteActive);
        corpus.write(b"k", b"v").unwrap();
        corpus.commit().unwrap();

        corpus.begin_read_only().unwrap();
        assert!(corpus.exists(b"k").unwrap());
        corpus.commit().unwrap();
    });
}

#[test]
fn aborted_writes_are_discarded() {
    with_temp_corpus(|corpus| {
        corpus.begin_read_write().unwrap();
        corpus.write(b"k", b"v").unwrap();
        corpus.abort().unwrap();

        corpus.begin_read_only().unwrap();
        assert!(matches!(corpus.read(b"k"), Err(CorpusError::NotFound)));
        corpus.abort().unwrap();
    });
}

#[test]
fn writer_reads_its_own_writes() {
    with_temp_corpus(|corpus| {
        corpus.begin_read_write().unwrap();
        corpus.write_counter(b"n", 41).unwrap();
        assert_eq!(corpus.read_counter(b"n").unwrap(), 41);
        assert!(corpus.exists(b"n").unwrap());
        corpus.commit().unwrap();
    });
}

#[test]
fn stat_tracks_commits() {
    let mut corpus = scenarios::populated_corpus(5);
    let before = corpus.stat().unwrap();
    assert_eq!(before.entries, 5);

    corpus.begin_read_write().unwrap();
    corpus.write_counter_str("ngram-5", 5).unwrap();
    corpus.commit().unwrap();

    let after = corpus.stat().unwrap();
    assert_eq!(after.entries, 6);
    assert!(after.committed_seq > before.committed_seq);
    assert!(after.log_size > before.log_size);
}
