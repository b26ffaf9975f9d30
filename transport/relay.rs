// Line relay: copy newline-delimited text from a source to a sink, flushing per line
use std::borrow::Cow;
use std::io::{BufRead, Result, Write};
use std::sync::atomic::{AtomicBool, Ordering};

pub const LINE_TERMINATOR: &[u8] = b"\n";

/// Relay lines until the source is exhausted or `cancel` is raised.
///
/// Every line written to the sink is terminated, the last one included, and
/// the sink is flushed after each line. Returns the number of lines relayed.
pub fn relay_lines<R, W>(source: &mut R, sink: &mut W, cancel: &AtomicBool) -> Result<u64>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    let mut raw = Vec::with_capacity(256);
    let mut lines = 0u64;

    while !cancel.load(Ordering::Relaxed) {
        raw.clear();
        if source.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let line = decode_line(&raw);
        sink.write_all(line.as_bytes())?;
        sink.write_all(LINE_TERMINATOR)?;
        sink.flush()?;
        lines += 1;
    }

    Ok(lines)
}

// Strip "\n" or "\r\n" and decode as UTF-8, replacing invalid sequences
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&raw[..end])
}
