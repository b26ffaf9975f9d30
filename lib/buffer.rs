// Shared transfer buffer: the caller keeps a handle while the executor writes into it
use std::io::{Result, Write};
use std::sync::Arc;

use netcat_transport::LINE_TERMINATOR;
use parking_lot::Mutex;

#[derive(Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clone_handle(&self) -> Self {
        SharedBuffer {
            bytes: Arc::clone(&self.bytes),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Text with exactly one trailing line terminator removed.
    ///
    /// Every relayed line is terminated, so this is what a display shows.
    pub fn trimmed_text(&self) -> String {
        let mut text = self.text();
        if text.as_bytes().ends_with(LINE_TERMINATOR) {
            text.truncate(text.len() - LINE_TERMINATOR.len());
        }
        text
    }

    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.lock())
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

impl Clone for SharedBuffer {
    fn clone(&self) -> Self {
        self.clone_handle()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_share_contents() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone_handle();
        writer.write_all(b"ping\n").unwrap();
        assert_eq!(buffer.contents(), b"ping\n");
    }

    #[test]
    fn trims_exactly_one_terminator() {
        let mut buffer = SharedBuffer::new();
        buffer.write_all(b"a\n\nb\n\n").unwrap();
        assert_eq!(buffer.trimmed_text(), "a\n\nb\n");
    }

    #[test]
    fn take_leaves_it_empty() {
        let mut buffer = SharedBuffer::new();
        buffer.write_all(b"x\n").unwrap();
        assert_eq!(buffer.take(), b"x\n");
        assert!(buffer.is_empty());
        assert_eq!(buffer.trimmed_text(), "");
    }
}
