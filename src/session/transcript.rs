/// Direction of a transcript stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Transcription of the user's input audio
    Input,
    /// Transcription of the assistant's output audio
    Output,
}

/// Accumulates streamed transcript fragments per direction until a
/// turn-complete signal
///
/// Pure buffering, no I/O. Fragments are concatenated in arrival order.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    input: String,
    output: String,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the given direction's buffer
    pub fn append(&mut self, direction: Direction, fragment: &str) {
        match direction {
            Direction::Input => self.input.push_str(fragment),
            Direction::Output => self.output.push_str(fragment),
        }
    }

    /// Return and clear the accumulated text; None when empty
    pub fn flush(&mut self, direction: Direction) -> Option<String> {
        let buffer = match direction {
            Direction::Input => &mut self.input,
            Direction::Output => &mut self.output,
        };

        if buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(buffer))
        }
    }

    /// Peek at the accumulated text without clearing
    pub fn peek(&self, direction: Direction) -> &str {
        match direction {
            Direction::Input => &self.input,
            Direction::Output => &self.output,
        }
    }

    /// Clear both buffers
    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
    }
}
