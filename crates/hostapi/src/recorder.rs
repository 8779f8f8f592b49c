use std::sync::Mutex;

const DEFAULT_CAP: usize = 1024 * 1024;

/// One bounded ring-buffer channel (stdout or stderr) for a single
/// invocation (§4.9). A write that would overflow the remaining budget is
/// prefix-truncated to fill it, a single `...<truncated N bytes>` sentinel
/// is appended, and the channel then stops accepting further writes
/// (decided open question: prefix-truncate + stop, see SPEC_FULL.md §E.2).
struct Channel {
    buf: String,
    cap: usize,
    closed: bool,
}

impl Channel {
    fn new(cap: usize) -> Self {
        Self { buf: String::new(), cap, closed: false }
    }

    fn write(&mut self, chunk: &str) {
        if self.closed {
            return;
        }
        let remaining = self.cap.saturating_sub(self.buf.len());
        if chunk.len() <= remaining {
            self.buf.push_str(chunk);
            return;
        }

        let truncated_at = floor_char_boundary(chunk, remaining);
        self.buf.push_str(&chunk[..truncated_at]);
        let dropped = chunk.len() - truncated_at;
        self.buf.push_str(&format!("...<truncated {dropped} bytes>"));
        self.closed = true;
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut idx = index.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Owns the stdout/stderr channels for one invocation's `console` calls.
pub struct LogRecorder {
    stdout: Mutex<Channel>,
    stderr: Mutex<Channel>,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            stdout: Mutex::new(Channel::new(cap)),
            stderr: Mutex::new(Channel::new(cap)),
        }
    }

    pub fn write_stdout(&self, chunk: &str) {
        self.stdout.lock().unwrap().write(chunk);
    }

    pub fn write_stderr(&self, chunk: &str) {
        self.stderr.lock().unwrap().write(chunk);
    }

    pub fn take_stdout(&self) -> String {
        self.stdout.lock().unwrap().buf.clone()
    }

    pub fn take_stderr(&self) -> String {
        self.stderr.lock().unwrap().buf.clone()
    }
}

impl Default for LogRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_within_cap_are_preserved_verbatim() {
        let recorder = LogRecorder::with_capacity(1024);
        recorder.write_stdout("hello");
        recorder.write_stdout(" world");
        assert_eq!(recorder.take_stdout(), "hello world");
    }

    #[test]
    fn overflow_write_is_prefix_truncated_with_sentinel() {
        let recorder = LogRecorder::with_capacity(10);
        recorder.write_stdout("0123456789ABCDEF");
        let out = recorder.take_stdout();
        assert!(out.starts_with("0123456789"));
        assert!(out.contains("...<truncated 6 bytes>"));
    }

    #[test]
    fn channel_stops_accepting_writes_after_truncation() {
        let recorder = LogRecorder::with_capacity(5);
        recorder.write_stdout("0123456789");
        let after_first = recorder.take_stdout();
        recorder.write_stdout("more");
        assert_eq!(recorder.take_stdout(), after_first);
    }

    #[test]
    fn stdout_and_stderr_are_independent() {
        let recorder = LogRecorder::with_capacity(1024);
        recorder.write_stdout("out");
        recorder.write_stderr("err");
        assert_eq!(recorder.take_stdout(), "out");
        assert_eq!(recorder.take_stderr(), "err");
    }
}
