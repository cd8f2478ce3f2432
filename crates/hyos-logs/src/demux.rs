//! Decoder for the runtime's multiplexed stdout/stderr stream
//!
//! Without a TTY every chunk of output is wrapped in a frame:
//!
//! ```text
//! [stream: u8][0u8; 3][len: u32 big-endian][payload; len]
//! ```
//!
//! A read that races a write can end mid-frame; the incomplete tail is
//! dropped rather than reported.

/// Size of a frame header in bytes
pub const HEADER_LEN: usize = 8;

/// Which stream a frame came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
    Unknown(u8),
}

impl From<u8> for StreamKind {
    fn from(b: u8) -> Self {
        match b {
            0 => Self::Stdin,
            1 => Self::Stdout,
            2 => Self::Stderr,
            other => Self::Unknown(other),
        }
    }
}

impl From<StreamKind> for u8 {
    fn from(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
            StreamKind::Unknown(b) => b,
        }
    }
}

/// One decoded frame, borrowing its payload from the input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub stream: StreamKind,
    pub payload: &'a [u8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    ReadHeader,
    ReadPayload { stream: StreamKind, len: usize },
    Done,
}

/// Cursor over a multiplexed buffer yielding complete frames in order
#[derive(Debug)]
pub struct FrameDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
    /// End of the last complete frame
    consumed: usize,
    state: State,
}

impl<'a> FrameDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            consumed: 0,
            state: State::ReadHeader,
        }
    }

    /// Bytes after the last complete frame
    pub fn remainder(&self) -> usize {
        self.buf.len() - self.consumed
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl<'a> Iterator for FrameDecoder<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::ReadHeader => {
                    if self.remaining() < HEADER_LEN {
                        self.state = State::Done;
                        continue;
                    }
                    let header = &self.buf[self.pos..self.pos + HEADER_LEN];
                    let stream = StreamKind::from(header[0]);
                    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
                    self.pos += HEADER_LEN;
                    self.state = State::ReadPayload {
                        stream,
                        len: len as usize,
                    };
                }
                State::ReadPayload { stream, len } => {
                    if self.remaining() < len {
                        self.state = State::Done;
                        continue;
                    }
                    let payload = &self.buf[self.pos..self.pos + len];
                    self.pos += len;
                    self.consumed = self.pos;
                    self.state = State::ReadHeader;
                    return Some(Frame { stream, payload });
                }
                State::Done => return None,
            }
        }
    }
}

/// Strip stream framing, returning the concatenated payloads as text
///
/// With `tty` set the runtime does not frame its output and the bytes are
/// returned as they are.
pub fn demultiplex(bytes: &[u8], tty: bool) -> String {
    if tty {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let mut decoder = FrameDecoder::new(bytes);
    let mut out = Vec::with_capacity(bytes.len());
    for frame in decoder.by_ref() {
        out.extend_from_slice(frame.payload);
    }

    if decoder.remainder() > 0 {
        tracing::debug!(
            dropped = decoder.remainder(),
            "discarded partial trailing frame"
        );
    }

    // Payloads are joined before decoding so a character split across two
    // frames survives.
    String::from_utf8_lossy(&out).into_owned()
}

/// Wrap a payload in a frame header
pub fn encode_frame(stream: StreamKind, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(u8::from(stream));
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
