/// Optimistic target vs. last confirmed value for a controllable device
/// attribute. `set_target` is updated immediately when a command is
/// issued, independent of confirmation; `set_current` only when a poll
/// or push confirms new device state; `reset` overwrites both from a
/// freshly decoded raw state.
///
/// Every mutator reports whether anything actually changed (value
/// equality), so callers can coalesce any number of property updates
/// into a single change notification per operation.
#[derive(Debug, Clone)]
pub struct Property<T> {
    target: T,
    current: T,
}

impl<T: PartialEq + Clone> Property<T> {
    pub fn new(initial: T) -> Self {
        Self {
            target: initial.clone(),
            current: initial,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn set_target(&mut self, value: T) -> bool {
        if self.target == value {
            return false;
        }
        self.target = value;
        true
    }

    pub fn set_current(&mut self, value: T) -> bool {
        if self.current == value {
            return false;
        }
        self.current = value;
        true
    }

    /// Overwrite both sides from confirmed device state. Returns whether
    /// either differed.
    pub fn reset(&mut self, value: T) -> bool {
        let mut changed = false;
        if self.current != value {
            self.current = value.clone();
            changed = true;
        }
        if self.target != value {
            self.target = value;
            changed = true;
        }
        changed
    }
}
