//! The one-slot undo snapshot (spec §3, §4.3). Deliberately not a stack —
//! spec §9 calls this out explicitly: "keeps the data model tiny and bounds
//! storage; do not generalize to a multi-step stack unless scope changes."

#[derive(Debug, Default)]
pub struct UndoSlot {
    snapshot: Option<String>,
}

impl UndoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any prior snapshot. Called the moment a `WRITE_LOCK` is
    /// granted, capturing the body as of that instant.
    pub fn capture(&mut self, body_text: String) {
        self.snapshot = Some(body_text);
    }

    pub fn is_available(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Consumes the snapshot, returning it if present. `UNDO` clears the
    /// slot after restoring from it.
    pub fn take(&mut self) -> Option<String> {
        self.snapshot.take()
    }

    /// Clears the slot without returning it, used by `REVERT` (spec §4.3:
    /// "clears the undo snapshot").
    pub fn clear(&mut self) {
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_overwrites_prior_snapshot() {
        let mut u = UndoSlot::new();
        u.capture("first".into());
        u.capture("second".into());
        assert_eq!(u.take(), Some("second".to_string()));
    }

    #[test]
    fn take_clears_the_slot() {
        let mut u = UndoSlot::new();
        u.capture("body".into());
        assert!(u.is_available());
        assert_eq!(u.take(), Some("body".to_string()));
        assert!(!u.is_available());
        assert_eq!(u.take(), None);
    }
}
