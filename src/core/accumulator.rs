/// Concatenates a streamed fragment onto the buffer received so far.
pub fn append(buffer: &str, fragment: &str) -> String {
    let mut next = String::with_capacity(buffer.len() + fragment.len());
    next.push_str(buffer);
    next.push_str(fragment);
    next
}

/// Growing text buffer for one streamed response. It never shrinks.
#[derive(Debug, Clone, Default)]
pub struct TextAccumulator {
    buffer: String,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) -> &str {
        self.buffer.push_str(fragment);
        &self.buffer
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
