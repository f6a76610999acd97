use std::io::{self, BufRead};

/// Longest line kept from the analysis output; the excess is discarded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Splits a byte stream into lines on `\n` or `\r`.
///
/// ffmpeg ends its progress stats with a bare `\r`, so splitting on `\n`
/// alone would let one "line" grow for as long as the stream runs. Bytes
/// past `max` in a single line are consumed and dropped.
pub struct LineReader<R> {
    inner: R,
    max: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max(inner, MAX_LINE_BYTES)
    }

    pub fn with_max(inner: R, max: usize) -> Self {
        Self { inner, max }
    }

    /// Read the next line into `line`, without its terminator.
    ///
    /// Returns `false` at end of stream once no bytes are left. A `\r\n`
    /// pair yields an empty line between the two terminators.
    pub fn read_line(&mut self, line: &mut Vec<u8>) -> io::Result<bool> {
        line.clear();
        let mut seen_any = false;
        loop {
            let available = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(seen_any);
            }
            seen_any = true;

            let room = self.max.saturating_sub(line.len());
            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(end) => {
                    line.extend_from_slice(&available[..end.min(room)]);
                    self.inner.consume(end + 1);
                    return Ok(true);
                }
                None => {
                    let len = available.len();
                    line.extend_from_slice(&available[..len.min(room)]);
                    self.inner.consume(len);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn collect(input: &[u8], max: usize) -> Vec<String> {
        let mut reader = LineReader::with_max(Cursor::new(input.to_vec()), max);
        let mut line = Vec::new();
        let mut out = Vec::new();
        while reader.read_line(&mut line).unwrap() {
            out.push(String::from_utf8_lossy(&line).into_owned());
        }
        out
    }

    #[test]
    fn splits_on_carriage_return_and_newline() {
        let lines = collect(b"frame=1 fps=0\rframe=2 fps=0\rscene_score=0.4\nlast", 1024);
        assert_eq!(lines, ["frame=1 fps=0", "frame=2 fps=0", "scene_score=0.4", "last"]);
    }

    #[test]
    fn crlf_gives_an_empty_line() {
        assert_eq!(collect(b"a\r\nb\n", 1024), ["a", "", "b"]);
    }

    #[test]
    fn overlong_line_is_truncated() {
        let mut input = vec![b'x'; 10_000];
        input.extend_from_slice(b"\nnext\n");
        let lines = collect(&input, 100);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 100);
        assert_eq!(lines[1], "next");
    }

    #[test]
    fn long_progress_stream_stays_bounded() {
        // Small buffer so every line crosses several fill_buf calls.
        let mut input = Vec::new();
        for i in 0..5_000 {
            input.extend_from_slice(format!("frame={i} fps=25 speed=1x\r").as_bytes());
        }
        let source = BufReader::with_capacity(7, Cursor::new(input));
        let mut reader = LineReader::with_max(source, 64);
        let mut line = Vec::new();
        let mut count = 0;
        while reader.read_line(&mut line).unwrap() {
            assert!(line.len() <= 64);
            assert!(line.capacity() < 1024);
            count += 1;
        }
        assert_eq!(count, 5_000);
    }
}
