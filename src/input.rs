/// Key event reduced to what the composer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub enter: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Submit,
    Insert,
}

/// Draft text of the composer.
#[derive(Debug, Clone)]
pub struct InputBox {
    value: String,
    max_length: usize,
}

impl InputBox {
    pub fn new(max_length: usize) -> Self {
        Self {
            value: String::new(),
            max_length,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Replaces the draft. Edits past the length limit are dropped and the
    /// previous draft is kept.
    pub fn set_value(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.chars().count() > self.max_length {
            return false;
        }
        self.value = value;
        true
    }

    /// `"<len>/<max>"`, shown only while something is typed.
    pub fn counter_label(&self) -> Option<String> {
        if self.value.is_empty() {
            return None;
        }
        Some(format!("{}/{}", self.value.chars().count(), self.max_length))
    }

    pub fn can_send(&self, in_flight: bool) -> bool {
        !in_flight && !self.value.trim().is_empty()
    }

    /// Enter submits a non-blank draft, Shift+Enter inserts a newline.
    pub fn on_key(&self, key: KeyPress) -> KeyAction {
        if key.enter && !key.shift && !self.value.trim().is_empty() {
            KeyAction::Submit
        } else {
            KeyAction::Insert
        }
    }

    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_edits_past_the_limit() {
        let mut input = InputBox::new(5);
        assert!(input.set_value("hello"));
        assert!(!input.set_value("hello!"));
        assert_eq!(input.value(), "hello");
        assert_eq!(input.counter_label().as_deref(), Some("5/5"));
    }

    #[test]
    fn counter_hidden_when_empty() {
        let input = InputBox::new(1000);
        assert!(input.counter_label().is_none());
        assert!(!input.can_send(false));
    }

    #[test]
    fn enter_submits_and_shift_enter_inserts() {
        let mut input = InputBox::new(100);
        input.set_value("availability");
        let enter = KeyPress {
            enter: true,
            shift: false,
        };
        let shift_enter = KeyPress {
            enter: true,
            shift: true,
        };
        assert_eq!(input.on_key(enter), KeyAction::Submit);
        assert_eq!(input.on_key(shift_enter), KeyAction::Insert);

        input.set_value("   ");
        assert_eq!(input.on_key(enter), KeyAction::Insert);
    }

    #[test]
    fn sending_is_blocked_while_in_flight() {
        let mut input = InputBox::new(100);
        input.set_value("hi");
        assert!(input.can_send(false));
        assert!(!input.can_send(true));
        assert_eq!(input.take(), "hi");
        assert!(input.value().is_empty());
    }
}
