//! The undo state machine as a plain value.
//!
//! `HistoryStack` has two fields and pure transitions: every operation
//! consumes the old state and returns the new one, so the rules can be
//! tested without any storage behind them.

/// Current value plus the stack of values it superseded (top is last).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStack<T> {
    current: Option<T>,
    stack: Vec<T>,
}

impl<T> Default for HistoryStack<T> {
    fn default() -> Self {
        Self {
            current: None,
            stack: Vec::new(),
        }
    }
}

impl<T> HistoryStack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Superseded values, oldest first.
    pub fn stack(&self) -> &[T] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Replace the current value.
    ///
    /// A `Some` pushes the previous current (if any) onto the stack. A `None`
    /// clears current and leaves the stack alone.
    #[must_use]
    pub fn set_current(self, value: Option<T>) -> Self {
        let Self { current, mut stack } = self;
        match value {
            Some(next) => {
                if let Some(previous) = current {
                    stack.push(previous);
                }
                Self {
                    current: Some(next),
                    stack,
                }
            }
            None => Self {
                current: None,
                stack,
            },
        }
    }

    /// Pop the top of the stack into current; empty stack leaves `None`.
    #[must_use]
    pub fn undo(self) -> Self {
        let mut stack = self.stack;
        let current = stack.pop();
        Self { current, stack }
    }
}
