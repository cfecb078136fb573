//! Telnet byte stream over TCP.
//!
//! Only what is needed to drive an OLT shell: option negotiation is
//! answered (everything refused except ECHO and SUPPRESS-GO-AHEAD),
//! subnegotiations are skipped, `IAC IAC` is unescaped and `CR NUL`
//! collapsed. The data bytes that remain are handed to the channel layer.

use bytes::{Buf, BytesMut};
use futures_util::FutureExt;
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::config::TelnetConfig;
use crate::error::{ChannelError, Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Any bidirectional async byte stream a session can run over.
pub trait RawStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RawStream for T {}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    CarriageReturn,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Incremental Telnet command stripper.
///
/// State survives across calls so sequences split between TCP reads are
/// handled.
#[derive(Debug)]
pub struct TelnetCodec {
    state: State,
    /// `answered[cmd - WILL][option]`: a reply for this request was already sent.
    answered: [[bool; 256]; 4],
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self {
            state: State::Data,
            answered: [[false; 256]; 4],
        }
    }
}

impl TelnetCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `input`, appending data bytes to `data` and negotiation
    /// replies to `replies`.
    pub fn decode(&mut self, input: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        let mut i = 0;
        while i < input.len() {
            match self.state {
                State::Data => {
                    let rest = &input[i..];
                    match memchr::memchr2(IAC, b'\r', rest) {
                        Some(pos) => {
                            data.extend_from_slice(&rest[..pos]);
                            if rest[pos] == IAC {
                                self.state = State::Iac;
                            } else {
                                data.push(b'\r');
                                self.state = State::CarriageReturn;
                            }
                            i += pos + 1;
                        }
                        None => {
                            data.extend_from_slice(rest);
                            i = input.len();
                        }
                    }
                }
                State::CarriageReturn => {
                    self.state = State::Data;
                    if input[i] == 0 {
                        i += 1;
                    }
                }
                State::Iac => {
                    let byte = input[i];
                    i += 1;
                    self.state = match byte {
                        IAC => {
                            data.push(IAC);
                            State::Data
                        }
                        DO | DONT | WILL | WONT => State::Negotiate(byte),
                        SB => State::Subnegotiation,
                        _ => State::Data,
                    };
                }
                State::Negotiate(command) => {
                    let option = input[i];
                    i += 1;
                    self.state = State::Data;
                    self.answer(command, option, replies);
                }
                State::Subnegotiation => match memchr::memchr(IAC, &input[i..]) {
                    Some(pos) => {
                        i += pos + 1;
                        self.state = State::SubnegotiationIac;
                    }
                    None => i = input.len(),
                },
                State::SubnegotiationIac => {
                    self.state = if input[i] == SE {
                        State::Data
                    } else {
                        State::Subnegotiation
                    };
                    i += 1;
                }
            }
        }
    }

    fn answer(&mut self, command: u8, option: u8, replies: &mut Vec<u8>) {
        let reply = match command {
            WILL if option == OPT_ECHO || option == OPT_SGA => DO,
            WILL => DONT,
            DO if option == OPT_SGA => WILL,
            DO => WONT,
            // Refusals need no acknowledgement.
            _ => return,
        };

        let seen = &mut self.answered[(command - WILL) as usize][option as usize];
        if *seen {
            return;
        }
        *seen = true;

        trace!("telnet negotiation: {} {} -> {}", command, option, reply);
        replies.extend_from_slice(&[IAC, reply, option]);
    }
}

/// Telnet transport wrapping a byte stream.
pub struct TelnetTransport {
    stream: Box<dyn RawStream>,
    codec: TelnetCodec,
    read_buf: BytesMut,
    outbound: BytesMut,
    chunk_size: usize,
    peer: String,
    closed: bool,
}

impl TelnetTransport {
    /// Open a TCP connection to the device.
    pub async fn connect(config: &TelnetConfig) -> Result<Self> {
        debug!("Connecting to {}", config.socket_addr());

        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            host: config.host.clone(),
            port: config.port,
            timeout: config.connect_timeout,
        })?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;

        stream.set_nodelay(true).map_err(TransportError::Io)?;

        let mut transport = Self::from_stream(stream, config.socket_addr());
        transport.chunk_size = config.read_chunk_size;
        Ok(transport)
    }

    /// Wrap an already-established stream.
    pub fn from_stream<S: RawStream + 'static>(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream: Box::new(stream),
            codec: TelnetCodec::new(),
            read_buf: BytesMut::with_capacity(4096),
            outbound: BytesMut::new(),
            chunk_size: 4096,
            peer: peer.into(),
            closed: false,
        }
    }

    /// Peer description for logging.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Wait for the next data bytes from the device.
    ///
    /// Chunks carrying only Telnet commands are absorbed. Returns
    /// [`ChannelError::Closed`] on EOF.
    pub async fn read(&mut self) -> Result<Vec<u8>> {
        loop {
            self.flush_outbound().await?;

            self.read_buf.reserve(self.chunk_size);
            let n = self
                .stream
                .read_buf(&mut self.read_buf)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                return Err(ChannelError::Closed.into());
            }

            let raw = self.read_buf.split();
            trace!("{} <- {:?}", self.peer, String::from_utf8_lossy(&raw));

            let mut data = Vec::with_capacity(raw.len());
            let mut replies = Vec::new();
            self.codec.decode(&raw, &mut data, &mut replies);
            self.outbound.extend_from_slice(&replies);

            if !data.is_empty() {
                return Ok(data);
            }
        }
    }

    /// Return data that is available right now without waiting.
    pub fn try_read(&mut self) -> Result<Option<Vec<u8>>> {
        match self.read().now_or_never() {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    /// Send one line followed by `terminator`.
    pub async fn write_line(&mut self, line: &str, terminator: &str) -> Result<()> {
        for &byte in line.as_bytes().iter().chain(terminator.as_bytes()) {
            if byte == IAC {
                self.outbound.extend_from_slice(&[IAC, IAC]);
            } else {
                self.outbound.extend_from_slice(&[byte]);
            }
        }
        self.flush_outbound().await
    }

    async fn flush_outbound(&mut self) -> Result<()> {
        while self.outbound.has_remaining() {
            self.stream
                .write_buf(&mut self.outbound)
                .await
                .map_err(TransportError::Io)?;
        }
        self.stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shut the socket down. Calling this more than once is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("Closing connection to {}", self.peer);
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::error::Error;

    fn decode_all(codec: &mut TelnetCodec, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::new();
        let mut replies = Vec::new();
        codec.decode(input, &mut data, &mut replies);
        (data, replies)
    }

    #[test]
    fn test_refuses_unknown_options() {
        let mut codec = TelnetCodec::new();
        // DO TERMINAL-TYPE, WILL ECHO, WILL NAWS, then text
        let (data, replies) =
            decode_all(&mut codec, &[IAC, DO, 24, IAC, WILL, 1, IAC, WILL, 31, b'o', b'k']);
        assert_eq!(data, b"ok");
        assert_eq!(replies, vec![IAC, WONT, 24, IAC, DO, 1, IAC, DONT, 31]);
    }

    #[test]
    fn test_answers_each_request_once() {
        let mut codec = TelnetCodec::new();
        let (_, first) = decode_all(&mut codec, &[IAC, DO, 24]);
        let (_, second) = decode_all(&mut codec, &[IAC, DO, 24]);
        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
    }

    #[test]
    fn test_sequences_split_across_reads() {
        let mut codec = TelnetCodec::new();
        let (d1, r1) = decode_all(&mut codec, &[b'a', IAC]);
        let (d2, r2) = decode_all(&mut codec, &[DO]);
        let (d3, r3) = decode_all(&mut codec, &[3, b'b']);
        assert_eq!(d1, b"a");
        assert!(r1.is_empty() && r2.is_empty() && d2.is_empty());
        assert_eq!(d3, b"b");
        assert_eq!(r3, vec![IAC, WILL, 3]);
    }

    #[test]
    fn test_subnegotiation_skipped_and_iac_unescaped() {
        let mut codec = TelnetCodec::new();
        let (data, replies) =
            decode_all(&mut codec, &[b'x', IAC, SB, 24, 1, IAC, SE, IAC, IAC, b'y']);
        assert_eq!(data, vec![b'x', 0xFF, b'y']);
        assert!(replies.is_empty());
    }

    #[test]
    fn test_cr_nul_collapsed() {
        let mut codec = TelnetCodec::new();
        let (data, _) = decode_all(&mut codec, b"a\r\0b\r\nc");
        assert_eq!(data, b"a\rb\r\nc");
    }

    #[tokio::test]
    async fn test_read_flushes_negotiation_replies() {
        let mock = Builder::new()
            .read(&[IAC, DO, 24])
            .write(&[IAC, WONT, 24])
            .read(b"Username:")
            .write(b"admin\r\n")
            .build();

        let mut transport = TelnetTransport::from_stream(mock, "mock");
        let data = transport.read().await.unwrap();
        assert_eq!(data, b"Username:");
        transport.write_line("admin", "\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let mock = Builder::new().build();
        let mut transport = TelnetTransport::from_stream(mock, "mock");
        let err = transport.read().await.unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock = Builder::new().build();
        let mut transport = TelnetTransport::from_stream(mock, "mock");
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.is_closed());
    }
}
