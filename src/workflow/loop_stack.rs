//! Loop bookkeeping for `for`/`next` pairs

use thiserror::Error;

/// Deepest `for` nesting a single run may open
pub const MAX_LOOP_DEPTH: usize = 64;

/// Errors raised by loop stack operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("empty loop stack: 'next' without a matching 'for'")]
    EmptyStack,

    #[error("loops nested deeper than {max}")]
    TooDeep { max: usize },
}

/// One open loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopFrame {
    /// Name the counter is exposed under in the model
    pub variable_name: String,

    /// Address of the `for` action that opened this frame
    pub index: usize,

    /// Current counter value
    pub current_value: i64,

    /// First value (inclusive)
    pub from: i64,

    /// Last value (inclusive)
    pub to: i64,
}

impl LoopFrame {
    /// True once the counter has moved past `to`
    pub fn is_finished(&self) -> bool {
        self.current_value > self.to
    }
}

/// LIFO stack of open loops; the last frame is the innermost
#[derive(Debug, Clone, Default)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
}

impl LoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new innermost loop with its counter at `from`
    ///
    /// Pushing a `for` that is already open restarts it: that frame and every
    /// frame nested inside it are dropped first.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        return_index: usize,
        from: i64,
        to: i64,
    ) -> Result<&LoopFrame, LoopError> {
        let variable_name = name.into();

        if let Some(open) = self.frames.iter().position(|f| f.index == return_index) {
            self.frames.truncate(open);
        }
        if self.frames.len() >= MAX_LOOP_DEPTH {
            return Err(LoopError::TooDeep {
                max: MAX_LOOP_DEPTH,
            });
        }

        self.frames.push(LoopFrame {
            variable_name,
            index: return_index,
            current_value: from,
            from,
            to,
        });
        self.peek()
    }

    /// Innermost frame, unchanged
    pub fn peek(&self) -> Result<&LoopFrame, LoopError> {
        self.frames.last().ok_or(LoopError::EmptyStack)
    }

    /// Advance the innermost counter by one; returns true when the loop is done
    pub fn increment(&mut self) -> Result<bool, LoopError> {
        let frame = self.frames.last_mut().ok_or(LoopError::EmptyStack)?;
        match frame.current_value.checked_add(1) {
            Some(value) => frame.current_value = value,
            // Only reachable at `to == i64::MAX`, after its last iteration
            None => return Ok(true),
        }
        Ok(frame.is_finished())
    }

    /// Remove and return the innermost frame
    pub fn pop(&mut self) -> Result<LoopFrame, LoopError> {
        self.frames.pop().ok_or(LoopError::EmptyStack)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Open frames, outermost first
    pub fn frames(&self) -> &[LoopFrame] {
        &self.frames
    }
}
