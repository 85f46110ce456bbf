//! Minimal echo client.
//!
//! Run against any echo server, e.g.:
//! `cargo run --example echo_client -- ws://127.0.0.1:9001/`

use std::sync::mpsc;
use std::time::Duration;

use tetherws::Socket;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tetherws=debug".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001/".to_string());

    let (done_tx, done_rx) = mpsc::channel();

    let mut socket = Socket::new();
    socket.set_url(&url).expect("invalid url");
    socket.on_connected(|session| {
        println!("connected, sending greeting");
        session.send_text("hello from tetherws");
    });
    socket.on_text(move |_session, bytes| {
        println!("echo: {}", String::from_utf8_lossy(bytes));
        let _ = done_tx.send(());
    });
    socket.on_disconnected(|session| match session.last_error() {
        Some(err) => eprintln!("disconnected: {err}"),
        None => println!("disconnected cleanly"),
    });
    socket.connect().expect("connect failed");

    match done_rx.recv_timeout(Duration::from_secs(10)) {
        Ok(()) => println!("round trip complete"),
        Err(_) => eprintln!("no echo within 10s"),
    }

    socket.disconnect_and_release();
    std::thread::sleep(Duration::from_millis(200));
}
