use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusive right to capture test output. At most one run holds it.
#[derive(Debug, Clone, Default)]
pub struct CaptureSlot {
    held: Arc<AtomicBool>,
}

impl CaptureSlot {
    /// Returns `None` while another run holds the capture.
    pub fn acquire(&self) -> Option<OutputCapture> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(OutputCapture {
            held: Arc::clone(&self.held),
            pending: String::new(),
        })
    }

    #[cfg(test)]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Buffer for text written since the previous test finished. Released on drop,
/// whatever way the run ends.
#[derive(Debug)]
pub struct OutputCapture {
    held: Arc<AtomicBool>,
    pending: String,
}

impl OutputCapture {
    pub fn write(&mut self, text: &str) {
        self.pending.push_str(text);
        if !text.ends_with('\n') {
            self.pending.push('\n');
        }
    }

    /// Hand over the buffered text, unless it is blank. The buffer is cleared
    /// either way.
    pub fn take(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.pending);
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
