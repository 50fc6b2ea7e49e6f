use std::fmt::Write as _;

/// Accumulates the human-readable compile/execute dump `get_debug_info`
/// exposes. Non-stable format, appended to only when
/// `GraphOptions::record_debug_info` is set — a format-and-append pattern
/// scoped to one graph instance instead of a process-wide logger.
#[derive(Default)]
pub struct DebugInfoRecorder {
    text: String,
}

impl DebugInfoRecorder {
    pub fn batch(&mut self, batch_index: usize, queue_index: u32, task_count: usize) {
        let _ = writeln!(self.text, "batch {batch_index}: queue={queue_index} tasks={task_count}");
    }

    pub fn barrier(&mut self, batch_index: usize, barrier: &crate::barrier::Barrier) {
        let _ = writeln!(
            self.text,
            "  barrier batch={batch_index} {:?}->{:?} access {:?}->{:?} split={:?} target={:?}",
            barrier.src_stage, barrier.dst_stage, barrier.src_access, barrier.dst_access, barrier.split, barrier.target
        );
    }

    pub fn note(&mut self, message: impl AsRef<str>) {
        let _ = writeln!(self.text, "{}", message.as_ref());
    }

    /// Copies as much of the accumulated text as fits into `buffer`,
    /// returning the number of bytes written.
    pub fn get_debug_info(&self, buffer: &mut [u8]) -> usize {
        let bytes = self.text.as_bytes();
        let len = bytes.len().min(buffer.len());
        buffer[..len].copy_from_slice(&bytes[..len]);
        len
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_truncates_to_the_caller_buffer() {
        let mut recorder = DebugInfoRecorder::default();
        recorder.note("hello");
        let mut small = [0u8; 3];
        let written = recorder.get_debug_info(&mut small);
        assert_eq!(written, 3);
        assert_eq!(&small, b"hel");
    }
}
