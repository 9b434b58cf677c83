/// Retain/release counter owned by every [`crate::Loadable`].
///
/// All mutation happens on the thread driving the cache, so a plain integer
/// is enough.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reference {
    count: u32,
}

impl Reference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// `true` once every retain has been matched by a release.
    pub fn unused(&self) -> bool {
        self.count == 0
    }

    pub fn retain(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Decrement the count.
    ///
    /// Returns `false` without touching the count when it is already zero;
    /// the caller reports that as misuse.
    pub fn release(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.count -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_release() {
        let mut reference = Reference::new();
        assert!(reference.unused());

        reference.retain();
        reference.retain();
        assert_eq!(reference.count(), 2);
        assert!(!reference.unused());

        assert!(reference.release());
        assert!(reference.release());
        assert!(reference.unused());
    }

    #[test]
    fn test_release_at_zero_is_noop() {
        let mut reference = Reference::new();
        assert!(!reference.release());
        assert_eq!(reference.count(), 0);

        reference.retain();
        assert!(reference.release());
        assert!(!reference.release());
        assert_eq!(reference.count(), 0);
    }
}
