//! Collected non-fatal problems

/// Non-fatal problems gathered during one invocation.
///
/// When `emit` is set each warning is also logged as it arrives; JSON mode
/// turns that off and reports the list in its envelope instead.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    messages: Vec<String>,
    emit: bool,
}

impl Warnings {
    /// Warnings that are logged through `tracing` as they arrive
    pub fn logged() -> Self {
        Self {
            messages: Vec::new(),
            emit: true,
        }
    }

    /// Warnings that are only collected
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Record a warning. A message already recorded is not repeated.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.messages.contains(&message) {
            return;
        }
        if self.emit {
            tracing::warn!("{}", message);
        }
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
