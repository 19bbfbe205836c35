//! Common test utilities and helpers
#![allow(dead_code)]

use std::net::{TcpListener, UdpSocket};
use std::time::{Duration, Instant};

/// Find an available TCP port for testing
pub fn find_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    listener.local_addr().unwrap().port()
}

/// Find an available UDP port for testing
pub fn find_available_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind to random port");
    socket.local_addr().unwrap().port()
}

/// Wait for a condition to be true, with timeout
pub fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
