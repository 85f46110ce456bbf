//! Scripted WebSocket server for exercising the client end to end.
//!
//! Each server accepts exactly one connection and plays out its script:
//! echoing, rejecting the handshake, closing first, or probing with a
//! ping. Frames are read with the crate's own parser (which unmasks the
//! client's masked frames) and written unmasked, as a server must.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tetherws::message::{CloseCode, CloseFrame};
use tetherws::protocol::{compute_accept_key, Frame, OpCode};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// What the server does after (or instead of) the handshake.
pub enum Script {
    /// Accept the upgrade and echo every text/binary message.
    Echo,
    /// Answer 101 but with a wrong `Sec-WebSocket-Accept` value.
    BadAccept,
    /// Refuse the upgrade with an HTTP 404.
    Http404,
    /// Accept, then immediately send a close frame and wait for the reply.
    CloseFirst { code: u16, reason: String },
    /// Accept, send a ping, report the pong payload, then echo.
    PingThenEcho {
        payload: Vec<u8>,
        pong_tx: Sender<Vec<u8>>,
    },
    /// Accept, send "Hel" + ping + "lo" so the ping interleaves a
    /// fragmented text message; report the pong payload, then echo.
    FragmentedHello { pong_tx: Sender<Vec<u8>> },
}

/// One-shot scripted server bound to an OS-assigned port.
pub struct TestServer {
    addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn spawn(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let _ = run_script(stream, script);
            }
        });

        Self {
            addr,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://127.0.0.1:{}{}", self.addr.port(), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_script(mut stream: TcpStream, script: Script) -> std::io::Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let (key, leftover) = read_request(&mut stream)?;

    match script {
        Script::Http404 => {
            stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")?;
            stream.flush()?;
            thread::sleep(Duration::from_millis(100));
            Ok(())
        }
        Script::BadAccept => {
            write_accept(&mut stream, "aW5jb3JyZWN0IGFjY2VwdCE=")?;
            thread::sleep(Duration::from_millis(100));
            Ok(())
        }
        Script::Echo => {
            write_accept(&mut stream, &compute_accept_key(&key))?;
            frame_loop(&mut stream, leftover, None)
        }
        Script::CloseFirst { code, reason } => {
            write_accept(&mut stream, &compute_accept_key(&key))?;
            // Pause so the close frame arrives on its own read, after the
            // client has finished the handshake, never bundled with it.
            thread::sleep(Duration::from_millis(100));
            let close = Frame::close(Some(CloseFrame::new(CloseCode::from_u16(code), reason)));
            stream.write_all(&close.encode(None))?;
            // Wait for the client's close reply (or its FIN).
            frame_loop(&mut stream, leftover, None)
        }
        Script::PingThenEcho { payload, pong_tx } => {
            write_accept(&mut stream, &compute_accept_key(&key))?;
            stream.write_all(&Frame::ping(payload).encode(None))?;
            frame_loop(&mut stream, leftover, Some(pong_tx))
        }
        Script::FragmentedHello { pong_tx } => {
            write_accept(&mut stream, &compute_accept_key(&key))?;
            stream.write_all(&Frame::new(false, OpCode::Text, b"Hel".to_vec()).encode(None))?;
            stream.write_all(&Frame::ping(b"abc".to_vec()).encode(None))?;
            stream.write_all(&Frame::new(true, OpCode::Continuation, b"lo".to_vec()).encode(None))?;
            frame_loop(&mut stream, leftover, Some(pong_tx))
        }
    }
}

/// Read the upgrade request head; returns the client key and any bytes
/// past the terminator.
fn read_request(stream: &mut TcpStream) -> std::io::Result<(String, Vec<u8>)> {
    let mut head = Vec::new();
    let mut scratch = [0u8; 2048];

    let end = loop {
        if let Some(pos) = head.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut scratch)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "eof in request head",
            ));
        }
        head.extend_from_slice(&scratch[..n]);
    };

    let text = String::from_utf8_lossy(&head[..end]);
    let key = text
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("sec-websocket-key")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default();

    Ok((key, head[end..].to_vec()))
}

fn write_accept(stream: &mut TcpStream, accept: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

/// Read, reassemble, and echo frames until a close frame or EOF.
fn frame_loop(
    stream: &mut TcpStream,
    leftover: Vec<u8>,
    pong_tx: Option<Sender<Vec<u8>>>,
) -> std::io::Result<()> {
    let mut buf = leftover;
    let mut scratch = [0u8; 8192];
    let mut message: Vec<u8> = Vec::new();
    let mut message_op: Option<OpCode> = None;

    loop {
        loop {
            let parsed = match Frame::parse(&buf) {
                Ok(Some((frame, consumed))) => {
                    buf.drain(..consumed);
                    frame
                }
                Ok(None) => break,
                Err(_) => return Ok(()),
            };

            match parsed.opcode {
                OpCode::Close => {
                    let _ = stream.write_all(&Frame::close(None).encode(None));
                    return Ok(());
                }
                OpCode::Ping => {
                    stream.write_all(&Frame::pong(parsed.into_payload()).encode(None))?;
                }
                OpCode::Pong => {
                    if let Some(tx) = &pong_tx {
                        let _ = tx.send(parsed.into_payload());
                    }
                }
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    if parsed.opcode != OpCode::Continuation {
                        message_op = Some(parsed.opcode);
                        message.clear();
                    }
                    let fin = parsed.fin;
                    message.extend_from_slice(parsed.payload());
                    if fin {
                        let opcode = message_op.take().unwrap_or(OpCode::Binary);
                        let echo = Frame::new(true, opcode, std::mem::take(&mut message));
                        stream.write_all(&echo.encode(None))?;
                    }
                }
                _ => {}
            }
        }

        let n = match stream.read(&mut scratch) {
            Ok(n) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&scratch[..n]);
    }
}
