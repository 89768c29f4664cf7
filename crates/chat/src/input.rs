/// Key presses the chat text box understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    Enter { shift: bool },
}

/// Editable draft for the next chat message.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    value: String,
    is_streaming: bool,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Mirrors the aggregator's busy flag. Submission is refused while set.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.is_streaming = streaming;
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Applies one key press. Returns the text to send when Enter submits.
    pub fn handle_key(&mut self, key: KeyInput) -> Option<String> {
        match key {
            KeyInput::Char(ch) => {
                self.value.push(ch);
                None
            }
            KeyInput::Backspace => {
                self.value.pop();
                None
            }
            KeyInput::Enter { shift: true } => {
                self.value.push('\n');
                None
            }
            KeyInput::Enter { shift: false } => self.handle_submit(),
        }
    }

    fn handle_submit(&mut self) -> Option<String> {
        if self.is_streaming {
            return None;
        }

        let draft = self.value.strip_suffix('\n').unwrap_or(&self.value);
        if draft.trim().is_empty() {
            return None;
        }

        let len = draft.len();
        self.value.truncate(len);
        Some(std::mem::take(&mut self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(buffer: &mut InputBuffer, text: &str) {
        for ch in text.chars() {
            assert_eq!(buffer.handle_key(KeyInput::Char(ch)), None);
        }
    }

    #[test]
    fn enter_submits_and_clears() {
        let mut buffer = InputBuffer::new();
        type_text(&mut buffer, "What dataset was used?");

        let sent = buffer.handle_key(KeyInput::Enter { shift: false });

        assert_eq!(sent.as_deref(), Some("What dataset was used?"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn shift_enter_inserts_newline_without_submitting() {
        let mut buffer = InputBuffer::new();
        type_text(&mut buffer, "line one");

        assert_eq!(buffer.handle_key(KeyInput::Enter { shift: true }), None);
        type_text(&mut buffer, "line two");

        assert_eq!(buffer.value(), "line one\nline two");
        assert_eq!(
            buffer.handle_key(KeyInput::Enter { shift: false }).as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn trailing_newline_is_stripped_once() {
        let mut buffer = InputBuffer::new();
        type_text(&mut buffer, "hi");
        buffer.handle_key(KeyInput::Enter { shift: true });

        assert_eq!(
            buffer.handle_key(KeyInput::Enter { shift: false }).as_deref(),
            Some("hi")
        );
    }

    #[test]
    fn blank_draft_never_submits_and_stays_as_typed() {
        let mut buffer = InputBuffer::new();
        type_text(&mut buffer, "  ");
        buffer.handle_key(KeyInput::Enter { shift: true });

        assert_eq!(buffer.handle_key(KeyInput::Enter { shift: false }), None);
        assert_eq!(buffer.value(), "  \n");
        assert_eq!(buffer.handle_key(KeyInput::Enter { shift: false }), None);
        assert_eq!(buffer.value(), "  \n");
    }

    #[test]
    fn busy_refuses_submission_and_keeps_draft() {
        let mut buffer = InputBuffer::new();
        buffer.set_streaming(true);
        type_text(&mut buffer, "follow-up");

        assert_eq!(buffer.handle_key(KeyInput::Enter { shift: false }), None);
        assert_eq!(buffer.value(), "follow-up");

        buffer.set_streaming(false);
        assert_eq!(
            buffer.handle_key(KeyInput::Enter { shift: false }).as_deref(),
            Some("follow-up")
        );
    }

    #[test]
    fn backspace_removes_last_char() {
        let mut buffer = InputBuffer::new();
        type_text(&mut buffer, "abc");
        buffer.handle_key(KeyInput::Backspace);

        assert_eq!(buffer.value(), "ab");
    }
}
