//! An in-memory output sink.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// A cloneable output buffer.
///
/// Every clone writes into the same buffer, so one clone can be handed to
/// the VM as its output sink while another reads what the program printed.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Returns the written output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Discards everything written so far.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_buffer() {
        let reader = SharedOutput::new();
        let mut writer = reader.clone();
        writeln!(writer, "a").unwrap();
        writeln!(writer, "b").unwrap();
        assert_eq!(reader.lines(), vec!["a", "b"]);
        reader.clear();
        assert_eq!(reader.contents(), "");
    }
}
