use std::sync::Arc;
use std::thread;

use crate::closer::Closer;
use crate::command::Command;
use crate::error::Error;
use crate::executor::WaitHandle;
use crate::lexer::Token;
use crate::pipe::new_pipe;
use crate::provider::IoProvider;
use crate::stream::{self, Buffer, InStream, MemReader, OutStream, Resource};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn public_types_are_send_and_sync() {
    assert_send_sync::<Closer>();
    assert_send_sync::<Command>();
    assert_send_sync::<IoProvider>();
    assert_send_sync::<WaitHandle>();
    assert_send_sync::<Token>();
    assert_send_sync::<Error>();
    assert_send_sync::<Buffer>();
}

#[test]
fn pipe_write_then_read() {
    let (w, r) = new_pipe();
    assert_eq!(w.write(b"hello").unwrap(), 5);
    let mut buf = [0u8; 5];
    assert_eq!(r.read(&mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");
}

#[test]
fn pipe_serves_partial_reads_without_losing_bytes() {
    let (w, r) = new_pipe();
    w.write(b"hello").unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(r.read(&mut buf).unwrap(), 2);
    assert_eq!(&buf, b"he");
    let mut rest = [0u8; 8];
    assert_eq!(r.read(&mut rest).unwrap(), 3);
    assert_eq!(&rest[..3], b"llo");
}

#[test]
fn pipe_drains_buffered_data_after_close() {
    let (w, r) = new_pipe();
    w.write(b"abc").unwrap();
    w.close().unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(r.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], b"abc");
    assert_eq!(r.read(&mut buf).unwrap(), 0);
}

#[test]
fn pipe_write_after_close_fails() {
    let (w, r) = new_pipe();
    r.close().unwrap();
    assert!(w.write(b"too late").is_err());
}

#[test]
fn pipe_close_is_idempotent() {
    let (w, r) = new_pipe();
    w.close().unwrap();
    w.close().unwrap();
    r.close().unwrap();
    r.close().unwrap();
}

#[test]
fn pipe_read_blocks_until_the_writer_delivers() {
    let (w, r) = new_pipe();
    let reader = thread::spawn(move || {
        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                return collected;
            }
            collected.extend_from_slice(&buf[..n]);
        }
    });
    w.write(b"stream").unwrap();
    w.write(b"ed").unwrap();
    w.close().unwrap();
    assert_eq!(reader.join().unwrap(), b"streamed");
}

#[test]
fn pipe_applies_backpressure_but_makes_progress() {
    let (w, r) = new_pipe();
    let writer = thread::spawn(move || {
        for chunk in [b"one".as_slice(), b"two", b"three", b"four"] {
            w.write(chunk).unwrap();
        }
        w.close().unwrap();
    });
    let collected = stream::read_to_end(&*r).unwrap();
    writer.join().unwrap();
    assert_eq!(collected, b"onetwothreefour");
}

#[test]
fn buffer_collects_writes() {
    let buf = Buffer::new();
    buf.write_all(b"one ").unwrap();
    buf.write_all(b"two").unwrap();
    assert_eq!(buf.string(), "one two");
    assert_eq!(buf.contents(), b"one two");
}

#[test]
fn mem_reader_reads_once() {
    let r = MemReader::new(b"data".to_vec());
    assert_eq!(stream::read_to_end(&r).unwrap(), b"data");
    assert_eq!(stream::read_to_end(&r).unwrap(), b"");
}

#[test]
fn copy_pumps_reader_into_writer() {
    let r = MemReader::new(b"pumped bytes".to_vec());
    let w = Buffer::new();
    assert_eq!(stream::copy(&r, &w).unwrap(), 12);
    assert_eq!(w.string(), "pumped bytes");
}

#[test]
fn file_writer_truncates_and_reader_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let path = path.to_str().unwrap();
    let closer = Closer::new();

    let w = stream::open_writer(&closer, path).unwrap();
    w.write_all(b"first contents").unwrap();
    closer.close();

    let w = stream::open_writer(&closer, path).unwrap();
    w.write_all(b"second").unwrap();
    closer.close();

    let r = stream::open_reader(&closer, path).unwrap();
    assert_eq!(stream::read_to_end(&*r).unwrap(), b"second");
    closer.close();
}

#[test]
fn file_append_writer_keeps_existing_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let path = path.to_str().unwrap();
    let closer = Closer::new();

    let w = stream::open_append_writer(&closer, path).unwrap();
    w.write_all(b"one\n").unwrap();
    closer.close();

    let w = stream::open_append_writer(&closer, path).unwrap();
    w.write_all(b"two\n").unwrap();
    closer.close();

    let r = stream::open_reader(&closer, path).unwrap();
    assert_eq!(stream::read_to_end(&*r).unwrap(), b"one\ntwo\n");
    closer.close();
}

#[test]
fn file_writer_rejects_writes_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("closed.txt");
    let closer = Closer::new();
    let w = stream::open_writer(&closer, path.to_str().unwrap()).unwrap();
    w.close().unwrap();
    assert!(w.write_all(b"nope").is_err());
    // releasing through the closer afterwards is still fine
    closer.close();
}

#[test]
fn special_paths_bypass_the_filesystem() {
    let closer = Closer::new();

    let null = stream::open_writer(&closer, "/dev/null").unwrap();
    null.write_all(b"discarded").unwrap();
    let null = stream::open_reader(&closer, "/dev/null").unwrap();
    assert_eq!(stream::read_to_end(&*null).unwrap(), b"");

    let zero = stream::open_reader(&closer, "/dev/zero").unwrap();
    let mut buf = [9u8; 16];
    assert_eq!(zero.read(&mut buf).unwrap(), 16);
    assert!(buf.iter().all(|&b| b == 0));

    let random = stream::open_reader(&closer, "/dev/urandom").unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(random.read(&mut buf).unwrap(), 16);

    // normalization happens before the match
    let normalized = stream::open_reader(&closer, "/dev/../dev/null").unwrap();
    assert_eq!(stream::read_to_end(&*normalized).unwrap(), b"");

    closer.close();
}

#[test]
fn subshell_provider_captures_stdout_and_inherits_the_rest() {
    let (parent, _out, _err) = IoProvider::captured("input");
    let (sub, captured) = IoProvider::subshell(&parent);
    assert!(Arc::ptr_eq(&parent.default_err, &sub.default_err));
    assert!(Arc::ptr_eq(&parent.default_in, &sub.default_in));
    assert!(!Arc::ptr_eq(&parent.default_out, &sub.default_out));
    sub.default_out.write_all(b"captured").unwrap();
    assert_eq!(captured.string(), "captured");
    sub.close();
    parent.close();
}
