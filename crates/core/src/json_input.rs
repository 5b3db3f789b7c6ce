//! Free-text field that must hold valid JSON.

/// Text input that flags, but never rejects, invalid JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonInput {
    text: String,
    required: bool,
    error: Option<String>,
}

impl JsonInput {
    pub fn new(required: bool) -> Self {
        let mut input = Self {
            text: String::new(),
            required,
            error: None,
        };
        input.validate();
        input
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.validate();
    }

    pub fn push(&mut self, c: char) {
        self.text.push(c);
        self.validate();
    }

    pub fn pop(&mut self) {
        self.text.pop();
        self.validate();
    }

    pub fn clear(&mut self) {
        self.set_text(String::new());
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Parsed value, if the text is non-empty valid JSON.
    pub fn value(&self) -> Option<serde_json::Value> {
        if self.text.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.text).ok()
    }

    fn validate(&mut self) {
        self.error = if self.text.trim().is_empty() {
            self.required.then(|| "This field is required".to_string())
        } else {
            serde_json::from_str::<serde_json::Value>(&self.text)
                .err()
                .map(|e| format!("Invalid JSON: {}", e))
        };
    }
}
