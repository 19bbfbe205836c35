//! TCP redirection end-to-end tests.

use super::*;
use ntest::timeout;
use std::io::{Read, Write};

#[test]
#[timeout(20000)]
fn combined_redirection_echoes_through_one_connection() {
    let port = common::find_available_port();
    let mut child = spawn_sockpipe(&["-e", "cat", "-b", &format!("TCPS{port}")]);

    let mut stream = connect_with_retry(port, Duration::from_secs(5));
    stream.write_all(b"hello over tcp\n").unwrap();

    let mut buf = [0u8; 15];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello over tcp\n");

    // The listener is closed once the session is accepted: a second
    // connection attempt has nothing to talk to.
    std::thread::sleep(Duration::from_millis(100));
    assert!(
        TcpStream::connect(("127.0.0.1", port)).is_err(),
        "expected exactly one listener on port {port}, closed after accept"
    );

    // EOF on the socket is EOF on the child's stdin.
    drop(stream);
    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(0));
}

#[test]
#[timeout(60000)]
fn combined_redirection_preserves_large_payloads() {
    let port = common::find_available_port();
    let mut child = spawn_sockpipe(&["-e", "cat", "-b", &format!("TCPS{port}")]);

    let stream = connect_with_retry(port, Duration::from_secs(5));
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();

    // Write from a second thread so the echo can drain concurrently.
    let mut writer = stream.try_clone().unwrap();
    let outbound = payload.clone();
    let sender = std::thread::spawn(move || {
        writer.write_all(&outbound).unwrap();
        writer.shutdown(std::net::Shutdown::Write).unwrap();
    });

    let mut reader = stream;
    let mut received = Vec::new();
    reader.read_to_end(&mut received).unwrap();
    sender.join().unwrap();

    assert_eq!(received.len(), payload.len());
    assert_eq!(received, payload, "bytes must arrive unmodified and in order");

    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(0));
}

#[test]
#[timeout(20000)]
fn output_redirection_carries_stdout_to_the_peer() {
    let port = common::find_available_port();
    let mut child = spawn_sockpipe(&[
        "-e",
        "echo output-goes-remote",
        "-o",
        &format!("TCPS{port}"),
    ]);

    let mut stream = connect_with_retry(port, Duration::from_secs(5));
    let mut received = String::new();
    stream.read_to_string(&mut received).unwrap();
    assert_eq!(received, "output-goes-remote\n");

    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(0));
}

#[test]
#[timeout(20000)]
fn output_redirection_mirrors_stderr() {
    let port = common::find_available_port();
    let mut child = spawn_sockpipe(&[
        "-e",
        "ls /sockpipe-definitely-not-a-real-path",
        "-o",
        &format!("TCPS{port}"),
    ]);

    let mut stream = connect_with_retry(port, Duration::from_secs(5));
    let mut received = String::new();
    stream.read_to_string(&mut received).unwrap();
    assert!(
        received.contains("sockpipe-definitely-not-a-real-path"),
        "the child's stderr should reach the peer, got: {received:?}"
    );

    // The child's own failure code passes through.
    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_ne!(status.code(), Some(0));
}

#[test]
#[timeout(20000)]
fn input_redirection_feeds_the_child_from_the_peer() {
    let port = common::find_available_port();
    let mut child = spawn_sockpipe(&["-e", "cat", "-i", &format!("TCPS{port}")]);

    let mut stream = connect_with_retry(port, Duration::from_secs(5));
    stream.write_all(b"fed from the network\n").unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(0));

    // Output was not redirected, so it lands on the inherited stdout.
    let mut out = String::new();
    child
        .stdout
        .take()
        .unwrap()
        .read_to_string(&mut out)
        .unwrap();
    assert_eq!(out, "fed from the network\n");
}

#[test]
#[timeout(20000)]
fn split_input_and_output_use_two_listeners() {
    let in_port = common::find_available_port();
    // Identical text would mean combined redirection; insist on two ports.
    let out_port = loop {
        let port = common::find_available_port();
        if port != in_port {
            break port;
        }
    };
    let mut child = spawn_sockpipe(&[
        "-e",
        "cat",
        "-i",
        &format!("TCPS{in_port}"),
        "-o",
        &format!("TCPS{out_port}"),
    ]);

    // Establishment is ordered: the input listener comes up first.
    let mut input = connect_with_retry(in_port, Duration::from_secs(5));
    let mut output = connect_with_retry(out_port, Duration::from_secs(5));

    input.write_all(b"crossed the wires\n").unwrap();
    input.shutdown(std::net::Shutdown::Write).unwrap();

    let mut received = String::new();
    output.read_to_string(&mut received).unwrap();
    assert_eq!(received, "crossed the wires\n");

    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(0));
}
