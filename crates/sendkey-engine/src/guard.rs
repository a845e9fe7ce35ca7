use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Flag marking the window during which the remapper's own synthetic events
/// are in flight.
///
/// The interception path checks this before classifying: a raised guard means
/// the observed event is one of ours looping back, and must fall through to
/// the host untouched. Raised just before a synthetic dispatch is scheduled,
/// lowered shortly after it lands.
#[derive(Clone, Debug, Default)]
pub struct SyntheticGuard {
    raised: Arc<AtomicBool>,
}

impl SyntheticGuard {
    /// A lowered guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a synthetic dispatch window is open.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Open the synthetic window.
    pub(crate) fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Close the synthetic window.
    pub(crate) fn lower(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_and_lower() {
        let g = SyntheticGuard::new();
        assert!(!g.is_raised());
        g.raise();
        assert!(g.is_raised());
        // Clones observe the same flag.
        let g2 = g.clone();
        assert!(g2.is_raised());
        g2.lower();
        assert!(!g.is_raised());
    }
}
