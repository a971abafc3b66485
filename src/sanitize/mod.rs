//! Streaming ANSI/OSC/C0 control sanitizer.
//!
//! Strips terminal escape sequences from raw PTY bytes and emits cleaned
//! UTF-8 text, decoding incrementally so a batch boundary never splits a
//! multi-byte character or an escape sequence.

pub mod noise;

/// States of the sanitizer's byte-level state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Ordinary text; `ESC` switches to `Esc`.
    Normal,
    /// Just saw `ESC (0x1B)`.
    Esc,
    /// Inside a CSI sequence (`ESC [ ... final`).
    Csi,
    /// Inside an OSC sequence (`ESC ] ... BEL | ESC \`).
    Osc,
    /// Inside an OSC sequence, just saw `ESC`; `\` terminates as the
    /// string terminator (ST), anything else resumes `Osc`.
    OscEsc,
}

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// A streaming sanitizer instance.
///
/// Holds state across calls to [`Sanitizer::push`] so a caller can feed
/// it byte batches (e.g. PTY read chunks) without losing a partial escape
/// sequence or a partial UTF-8 continuation at a batch boundary.
#[derive(Debug, Default)]
pub struct Sanitizer {
    state: StateHolder,
    /// Bytes of a UTF-8 sequence seen so far but not yet complete.
    pending_utf8: Vec<u8>,
}

#[derive(Debug)]
struct StateHolder(State);

impl Default for StateHolder {
    fn default() -> Self {
        Self(State::Normal)
    }
}

impl Sanitizer {
    /// Creates a fresh sanitizer with no held state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a batch of raw bytes, returning the cleaned text produced
    /// from them. Line-ending normalization (`\r\n` → `\n`, bare `\r` →
    /// `\n`) and UTF-8 decoding happen here; stripped control bytes never
    /// reach the output.
    pub fn push(&mut self, input: &[u8]) -> String {
        let mut stripped = Vec::with_capacity(input.len());
        for &byte in input {
            self.step(byte, &mut stripped);
        }
        self.decode_incremental(&stripped)
    }

    /// Finishes the stream, flushing any pending partial UTF-8 sequence
    /// as replacement characters.
    pub fn finish(&mut self) -> String {
        if self.pending_utf8.is_empty() {
            return String::new();
        }
        let count = self.pending_utf8.len();
        self.pending_utf8.clear();
        "\u{FFFD}".repeat(count)
    }

    fn step(&mut self, byte: u8, out: &mut Vec<u8>) {
        match self.state.0 {
            State::Normal => {
                if byte == ESC {
                    self.state.0 = State::Esc;
                } else if is_dropped_c0(byte) {
                    // dropped
                } else {
                    out.push(byte);
                }
            }
            State::Esc => match byte {
                b'[' => self.state.0 = State::Csi,
                b']' => self.state.0 = State::Osc,
                // Two-byte escape (e.g. ESC M): the byte itself is part
                // of the sequence and is swallowed; the next byte is
                // ordinary text again.
                _ => self.state.0 = State::Normal,
            },
            State::Csi => {
                if (0x40..=0x7E).contains(&byte) {
                    self.state.0 = State::Normal;
                }
                // parameter/intermediate bytes and the final byte are
                // both swallowed; CSI never emits.
            }
            State::Osc => {
                if byte == BEL {
                    self.state.0 = State::Normal;
                } else if byte == ESC {
                    self.state.0 = State::OscEsc;
                }
            }
            State::OscEsc => {
                self.state.0 = State::Normal;
                if byte != b'\\' {
                    // Not a string terminator; reinterpret as if we'd
                    // just seen ESC in Normal state.
                    self.step(byte, out);
                }
            }
        }
    }

    fn decode_incremental(&mut self, stripped: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending_utf8);
        buf.extend_from_slice(stripped);

        let mut out = String::with_capacity(buf.len());
        let mut start = 0;
        loop {
            match std::str::from_utf8(&buf[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(
                        std::str::from_utf8(&buf[start..start + valid_up_to])
                            .unwrap_or_default(),
                    );
                    match e.error_len() {
                        Some(bad_len) => {
                            out.push('\u{FFFD}');
                            start += valid_up_to + bad_len;
                        }
                        None => {
                            // Incomplete sequence at the end of the
                            // buffer: hold it for the next batch.
                            self.pending_utf8 = buf[start + valid_up_to..].to_vec();
                            return normalize_line_endings(&out);
                        }
                    }
                }
            }
        }
        normalize_line_endings(&out)
    }
}

const fn is_dropped_c0(byte: u8) -> bool {
    byte < 0x20 && !matches!(byte, b'\t' | b'\n' | b'\r')
}

fn normalize_line_endings(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

/// One-shot convenience wrapper: sanitizes a complete byte slice with no
/// held state across calls.
#[must_use]
pub fn sanitize(input: &[u8]) -> String {
    let mut sanitizer = Sanitizer::new();
    let mut out = sanitizer.push(input);
    out.push_str(&sanitizer.finish());
    out
}
