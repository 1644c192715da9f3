//! A mock gateway server for exercising [`shardkit_gateway::Shard`]
//! end-to-end: accepts one raw TCP connection, performs the upgrade
//! handshake response, and lets the test drive the frame exchange
//! directly. Grounded on `crates/rt-test-utils`'s `MockWsServer`, ported
//! from `tokio-tungstenite`'s accept loop to this family's hand-rolled
//! frame codec so the same decoder under test also speaks for "the
//! server side" in these tests.

use shardkit_gateway::{Frame, FrameDecoder, FrameOptions, Opcode, create_frame};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Binds to a random local port and accepts exactly one connection,
/// handing back the raw stream once the upgrade handshake has been
/// answered — the test then drives frames directly.
pub struct MockWsPeer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockWsPeer {
    pub async fn bind() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(MockWsPeer { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Accept one connection, read until the end of the request headers,
    /// and write back a successful `101 Switching Protocols` response.
    /// Returns the connected stream plus any bytes the client already
    /// sent past the header terminator (there should be none yet).
    pub async fn accept_and_upgrade(&self) -> std::io::Result<MockWsConnection> {
        let (mut stream, _peer) = self.listener.accept().await?;
        read_request_headers(&mut stream).await?;
        stream
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\nConnection: upgrade\r\nUpgrade: websocket\r\n\r\n")
            .await?;
        Ok(MockWsConnection {
            stream,
            decoder: FrameDecoder::new(),
        })
    }
}

/// The server side of one accepted connection: a raw stream plus its
/// own decoder, so the test can both send frames (as the "server") and
/// read frames the client sends.
pub struct MockWsConnection {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl MockWsConnection {
    /// Send a JSON gateway payload as an unmasked server-style text frame.
    pub async fn send_json(&mut self, value: &serde_json::Value) -> std::io::Result<()> {
        let frame = create_frame(
            value.to_string().as_bytes(),
            FrameOptions { opcode: Opcode::Text, masked: false, ..FrameOptions::default() },
        );
        self.stream.write_all(&frame).await
    }

    /// Read bytes off the wire until at least one full frame decodes.
    pub async fn recv_frame(&mut self) -> std::io::Result<Frame> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed"));
            }
            let mut frames = self.decoder.feed(&buf[..n]);
            if !frames.is_empty() {
                return Ok(frames.remove(0));
            }
        }
    }
}

async fn read_request_headers(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(());
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed during handshake"));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
