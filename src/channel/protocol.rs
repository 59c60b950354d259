//! Wire format: line framing in, `[RESULT]` envelopes out.

use std::fmt::Write as _;

/// Longest request line accepted by any transport.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Terminator appended to every envelope on stream transports.
pub const END_MARKER: &str = "[END]";

/// One response, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ok: bool,
    pub command: String,
    pub body: String,
}

impl Envelope {
    pub fn ok(command: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            ok: true,
            command: command.into(),
            body: body.into(),
        }
    }

    pub fn error(command: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            ok: false,
            command: command.into(),
            body: body.into(),
        }
    }

    /// Startup notice written once the channel is open.
    pub fn init_ready() -> Self {
        Self::ok("init", "cli_ready=1")
    }

    /// Startup notice written when the channel could not be opened.
    pub fn init_failed() -> Self {
        Self::error("init", "failed_to_open_cli_pipe")
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 48);
        out.push_str("[RESULT]\n");
        let _ = writeln!(out, "status={}", if self.ok { "ok" } else { "error" });
        let _ = writeln!(out, "command={}", self.command);
        out.push('\n');
        out.push_str(&self.body);
        out.push('\n');
        out
    }

    /// Rendered form followed by [`END_MARKER`].
    pub fn render_terminated(&self) -> String {
        let mut out = self.render();
        out.push_str(END_MARKER);
        out.push('\n');
        out
    }
}

/// Escape a text value so it stays on one line.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Strip one trailing carriage return and surrounding whitespace. Blank lines yield `None`.
pub fn normalize_line(raw: &str) -> Option<String> {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Reassembles newline-terminated requests from arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete, non-blank line. Lines longer than [`MAX_LINE_BYTES`] are dropped.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(pos) = self.pending.iter().position(|b| *b == b'\n') else {
                if self.pending.len() > MAX_LINE_BYTES {
                    tracing::warn!(bytes = self.pending.len(), "discarding oversized request line");
                    self.pending.clear();
                    self.discarding = true;
                }
                return None;
            };
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if raw.len() > MAX_LINE_BYTES + 1 {
                tracing::warn!(bytes = raw.len(), "discarding oversized request line");
                continue;
            }
            if let Some(line) = normalize_line(&String::from_utf8_lossy(&raw)) {
                return Some(line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_layout() {
        let env = Envelope::ok("goto", "target_kind=tile\ntarget_tile=105");
        assert_eq!(
            env.render(),
            "[RESULT]\nstatus=ok\ncommand=goto\n\ntarget_kind=tile\ntarget_tile=105\n"
        );
        assert_eq!(
            Envelope::init_failed().render_terminated(),
            "[RESULT]\nstatus=error\ncommand=init\n\nfailed_to_open_cli_pipe\n[END]\n"
        );
    }

    #[test]
    fn lines_are_trimmed_and_blank_lines_skipped() {
        let mut buf = LineBuffer::default();
        buf.push(b"  state \r\n\n\r\nlook");
        assert_eq!(buf.next_line().as_deref(), Some("state"));
        assert_eq!(buf.next_line(), None);
        buf.push(b"\n");
        assert_eq!(buf.next_line().as_deref(), Some("look"));
        assert_eq!(buf.next_line(), None);
    }

    #[test]
    fn oversized_lines_are_dropped_whole() {
        let mut buf = LineBuffer::default();
        buf.push(&vec![b'x'; MAX_LINE_BYTES + 10]);
        assert_eq!(buf.next_line(), None);
        buf.push(b"tail of the long line\nhelp\n");
        assert_eq!(buf.next_line().as_deref(), Some("help"));
    }

    #[test]
    fn escapes_line_breaks_only() {
        assert_eq!(escape_value("a\nb\r\tc"), "a\\nb\\r\tc");
        assert_eq!(normalize_line("   "), None);
        assert_eq!(normalize_line(" say hi\r\n").as_deref(), Some("say hi"));
    }
}
