//! Packet framing of the GDB remote serial protocol.

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Bytes which must be escaped inside a packet body.
const ESCAPED: &[u8] = b"$#}*";

pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Wraps `payload` into `$payload#cs`, escaping reserved bytes.
pub fn encode_packet(payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len());
    for &b in payload {
        if ESCAPED.contains(&b) {
            body.push(b'}');
            body.push(b ^ 0x20);
        } else {
            body.push(b);
        }
    }

    let sum = checksum(&body);
    let mut packet = Vec::with_capacity(body.len() + 4);
    packet.push(b'$');
    packet.extend_from_slice(&body);
    packet.push(b'#');
    packet.push(HEX[(sum >> 4) as usize]);
    packet.push(HEX[(sum & 0xf) as usize]);
    packet
}

pub fn hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for &b in data {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0xf) as usize] as char);
    }
    out
}

fn from_hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(10 + b - b'a'),
        b'A'..=b'F' => Some(10 + b - b'A'),
        _ => None,
    }
}

pub fn hex_decode(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() % 2 != 0 {
        return None;
    }
    data.chunks_exact(2)
        .map(|pair| Some((from_hex_digit(pair[0])? << 4) | from_hex_digit(pair[1])?))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    Ignore,
    NeedMore,
    /// A `$` arrived inside a frame, the partial frame was dropped.
    Resync,
    /// A `^C` arrived outside of a frame.
    Interrupt,
    /// A whole frame was received, fetch it with [`FrameAssembler::take`].
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    InFrame,
    Checksum(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    Checksum { expected: u8, received: Option<u8> },
    Escape,
    RunLength,
}

/// Collects bytes into frames.
pub struct FrameAssembler {
    state: FrameState,
    body: Vec<u8>,
    sum: [u8; 2],
    complete: bool,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            state: FrameState::Idle,
            body: Vec::new(),
            sum: [0; 2],
            complete: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> FrameEvent {
        match self.state {
            FrameState::Idle => match byte {
                b'$' => {
                    self.start();
                    FrameEvent::NeedMore
                }
                0x03 => FrameEvent::Interrupt,
                _ => FrameEvent::Ignore,
            },
            FrameState::InFrame => match byte {
                b'$' => {
                    self.start();
                    FrameEvent::Resync
                }
                b'#' => {
                    self.state = FrameState::Checksum(0);
                    FrameEvent::NeedMore
                }
                _ => {
                    self.body.push(byte);
                    FrameEvent::NeedMore
                }
            },
            FrameState::Checksum(count) => {
                if byte == b'$' {
                    self.start();
                    return FrameEvent::Resync;
                }
                self.sum[count as usize] = byte;
                if count == 0 {
                    self.state = FrameState::Checksum(1);
                    FrameEvent::NeedMore
                } else {
                    self.state = FrameState::Idle;
                    self.complete = true;
                    FrameEvent::Complete
                }
            }
        }
    }

    fn start(&mut self) {
        self.state = FrameState::InFrame;
        self.body.clear();
        self.complete = false;
    }

    /// Verifies and decodes the last complete frame.
    pub fn take(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        if !self.complete {
            return None;
        }
        self.complete = false;

        let expected = checksum(&self.body);
        let received = match (from_hex_digit(self.sum[0]), from_hex_digit(self.sum[1])) {
            (Some(hi), Some(lo)) => Some((hi << 4) | lo),
            _ => None,
        };
        if received != Some(expected) {
            return Some(Err(FrameError::Checksum { expected, received }));
        }
        Some(decode_body(&self.body))
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Undoes `}` escaping and `*` run length encoding.
fn decode_body(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(body.len());
    let mut bytes = body.iter().copied();
    while let Some(b) = bytes.next() {
        match b {
            b'}' => out.push(bytes.next().ok_or(FrameError::Escape)? ^ 0x20),
            b'*' => {
                let count = bytes.next().ok_or(FrameError::RunLength)?;
                let last = *out.last().ok_or(FrameError::RunLength)?;
                let repeat = count.checked_sub(29).ok_or(FrameError::RunLength)?;
                out.extend(std::iter::repeat(last).take(repeat as usize));
            }
            _ => out.push(b),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(data: &[u8]) -> (FrameEvent, Option<Result<Vec<u8>, FrameError>>) {
        let mut assembler = FrameAssembler::new();
        let mut last = FrameEvent::Ignore;
        for &byte in data {
            last = assembler.push(byte);
        }
        (last, assembler.take())
    }

    #[test]
    fn encodes_with_checksum() {
        assert_eq!(encode_packet(b"OK"), b"$OK#9a".to_vec());
        assert_eq!(encode_packet(b""), b"$#00".to_vec());
    }

    #[test]
    fn escapes_reserved_bytes() {
        let packet = encode_packet(b"a$b");
        assert_eq!(packet[..5].to_vec(), b"$a}\x04b".to_vec());
        let (event, frame) = assemble(&packet);
        assert_eq!(event, FrameEvent::Complete);
        assert_eq!(frame, Some(Ok(b"a$b".to_vec())));
    }

    #[test]
    fn partial_frame_needs_more() {
        let (event, frame) = assemble(b"$O");
        assert_eq!(event, FrameEvent::NeedMore);
        assert_eq!(frame, None);
    }

    #[test]
    fn resyncs_on_dollar() {
        let (_, frame) = assemble(b"$qS$OK#9a");
        assert_eq!(frame, Some(Ok(b"OK".to_vec())));
    }

    #[test]
    fn rejects_bad_checksum() {
        let (_, frame) = assemble(b"$OK#00");
        assert_eq!(
            frame,
            Some(Err(FrameError::Checksum {
                expected: 0x9a,
                received: Some(0)
            }))
        );
    }

    #[test]
    fn expands_run_length() {
        // '0' repeated 3 more times: count byte is 3 + 29 = ' '.
        let body = b"0* ";
        let mut packet = vec![b'$'];
        packet.extend_from_slice(body);
        packet.push(b'#');
        packet.extend_from_slice(hex_encode(&[checksum(body)]).as_bytes());
        let (_, frame) = assemble(&packet);
        assert_eq!(frame, Some(Ok(b"0000".to_vec())));
    }

    #[test]
    fn interrupt_outside_frame() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(0x03), FrameEvent::Interrupt);
        assert_eq!(assembler.push(b'+'), FrameEvent::Ignore);
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(hex_encode(b"readspr 3000"), "726561647370722033303030");
        assert_eq!(hex_decode(b"4f4B"), Some(b"OK".to_vec()));
        assert_eq!(hex_decode(b"4f4"), None);
        assert_eq!(hex_decode(b"zz"), None);
    }
}
