use std::{
    io::{self, ErrorKind, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use anyhow::{anyhow, Context};
use register_view::DebugTarget;
use thiserror::Error;

use super::framing::{encode_packet, hex_decode, hex_encode, FrameAssembler, FrameEvent};

/// How often a packet is sent again after the stub answered with a NAK.
const MAX_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum RspError {
    #[error("The connection to the GDB stub failed")]
    Io(#[from] io::Error),
    #[error("The GDB stub closed the connection")]
    ConnectionClosed,
    #[error("The GDB stub kept rejecting packet {0:?}")]
    Rejected(String),
    #[error("The GDB stub answered with error {0:#04x}")]
    Remote(u8),
    #[error("The GDB stub does not support {0:?}")]
    Unsupported(String),
    #[error("Unexpected reply {reply:?} to {request:?}")]
    Malformed { request: String, reply: String },
}

/// A client for the GDB remote serial protocol.
///
/// Debug unit registers are not part of the regular register file, they are accessed with the
/// `readspr`/`writespr` monitor commands.
pub struct RspClient<S: Read + Write> {
    stream: S,
    assembler: FrameAssembler,
    buffer: Vec<u8>,
    position: usize,
    /// Set after an I/O error, a late reply may still be on its way.
    desynced: bool,
}

impl RspClient<TcpStream> {
    /// Connects to the GDB stub listening on `host:port`.
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let address = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("Resolving {}:{}", host, port))?
            .next()
            .ok_or_else(|| anyhow!("{}:{} does not resolve to an address", host, port))?;

        log::info!("Connecting to the GDB stub at {}", address);
        let stream = TcpStream::connect_timeout(&address, connect_timeout)
            .with_context(|| format!("Connecting to {}", address))?;
        stream.set_read_timeout(Some(read_timeout))?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> RspClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            assembler: FrameAssembler::new(),
            buffer: Vec::new(),
            position: 0,
            desynced: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn read_byte(&mut self) -> Result<u8, RspError> {
        if self.position == self.buffer.len() {
            let mut chunk = [0u8; 256];
            let read = self.stream.read(&mut chunk)?;
            if read == 0 {
                return Err(RspError::ConnectionClosed);
            }
            self.buffer.clear();
            self.buffer.extend_from_slice(&chunk[..read]);
            self.position = 0;
        }
        let byte = self.buffer[self.position];
        self.position += 1;
        Ok(byte)
    }

    /// Sends a packet and waits for it to be acknowledged.
    pub fn send_packet(&mut self, payload: &[u8]) -> Result<(), RspError> {
        let packet = encode_packet(payload);
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                log::debug!("Retransmitting packet (attempt {})", attempt + 1);
            }
            self.stream.write_all(&packet)?;
            self.stream.flush()?;
            loop {
                match self.read_byte()? {
                    b'+' => return Ok(()),
                    b'-' => break,
                    other => log::trace!("Ignoring {:#04x} while waiting for an ACK", other),
                }
            }
        }
        Err(RspError::Rejected(
            String::from_utf8_lossy(payload).into_owned(),
        ))
    }

    /// Receives the next packet with a valid checksum and acknowledges it.
    pub fn receive_packet(&mut self) -> Result<Vec<u8>, RspError> {
        loop {
            let byte = self.read_byte()?;
            match self.assembler.push(byte) {
                FrameEvent::Complete => {}
                FrameEvent::Resync => {
                    log::debug!("Dropped an incomplete packet");
                    continue;
                }
                _ => continue,
            }
            match self.assembler.take() {
                Some(Ok(payload)) => {
                    self.stream.write_all(b"+")?;
                    self.stream.flush()?;
                    return Ok(payload);
                }
                Some(Err(error)) => {
                    log::warn!("Received a corrupt packet: {:?}", error);
                    self.stream.write_all(b"-")?;
                    self.stream.flush()?;
                }
                None => {}
            }
        }
    }

    /// Drops everything the stub sent so far, until the stream runs dry.
    ///
    /// Relies on the read timeout of the stream to notice that nothing more is pending.
    fn resync(&mut self) -> Result<(), RspError> {
        log::debug!("Discarding pending input after a failed request");
        self.buffer.clear();
        self.position = 0;
        self.assembler = FrameAssembler::new();

        let mut chunk = [0u8; 256];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(RspError::ConnectionClosed),
                Ok(read) => log::trace!("Discarded {} stale bytes", read),
                Err(error)
                    if matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
                {
                    self.desynced = false;
                    return Ok(());
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Sends a request and returns its reply, skipping console output packets.
    ///
    /// After an I/O error the pending input is discarded first, so a late reply to an earlier
    /// request is never taken for the answer to this one.
    pub fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, RspError> {
        if self.desynced {
            self.resync()?;
        }
        let result = self.exchange(request);
        if let Err(RspError::Io(_)) = &result {
            self.desynced = true;
        }
        result
    }

    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, RspError> {
        self.send_packet(request)?;
        loop {
            let reply = self.receive_packet()?;
            if is_console_output(&reply) {
                if let Some(text) = hex_decode(&reply[1..]) {
                    log::info!("Stub: {}", String::from_utf8_lossy(&text).trim_end());
                }
                continue;
            }
            return Ok(reply);
        }
    }

    /// Runs a `monitor` command on the stub.
    pub fn monitor(&mut self, command: &str) -> Result<Vec<u8>, RspError> {
        log::debug!("monitor {}", command);
        let request = format!("qRcmd,{}", hex_encode(command.as_bytes()));
        let reply = self.transact(request.as_bytes())?;
        if reply.is_empty() {
            return Err(RspError::Unsupported(command.to_string()));
        }
        if let Some(code) = error_code(&reply) {
            return Err(RspError::Remote(code));
        }
        Ok(reply)
    }

    pub fn read_spr(&mut self, spr: u16) -> Result<u32, RspError> {
        let command = format!("readspr {:x}", spr);
        let reply = self.monitor(&command)?;
        let malformed = || RspError::Malformed {
            request: command.clone(),
            reply: String::from_utf8_lossy(&reply).into_owned(),
        };

        let text = hex_decode(&reply).ok_or_else(malformed)?;
        let text = String::from_utf8(text).map_err(|_| malformed())?;
        u32::from_str_radix(text.trim(), 16).map_err(|_| malformed())
    }

    pub fn write_spr(&mut self, spr: u16, value: u32) -> Result<(), RspError> {
        let command = format!("writespr {:x} {:x}", spr, value);
        let reply = self.monitor(&command)?;
        if reply != b"OK" {
            return Err(RspError::Malformed {
                request: command,
                reply: String::from_utf8_lossy(&reply).into_owned(),
            });
        }
        Ok(())
    }
}

impl<S: Read + Write> DebugTarget for RspClient<S> {
    fn read_spr(&mut self, spr: u16) -> anyhow::Result<u32> {
        Ok(RspClient::read_spr(self, spr)?)
    }

    fn write_spr(&mut self, spr: u16, value: u32) -> anyhow::Result<()> {
        Ok(RspClient::write_spr(self, spr, value)?)
    }
}

/// `O` followed by hex encoded text. A bare `OK` is a regular reply.
fn is_console_output(reply: &[u8]) -> bool {
    reply.len() > 1 && reply[0] == b'O' && hex_decode(&reply[1..]).is_some()
}

/// Parses an `Enn` error reply.
fn error_code(reply: &[u8]) -> Option<u8> {
    match reply {
        [b'E', hi, lo] => hex_decode(&[*hi, *lo]).map(|code| code[0]),
        _ => None,
    }
}
