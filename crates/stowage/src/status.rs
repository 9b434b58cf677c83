//! Loadable status and the transition rules between states.

/// Lifecycle status of a [`crate::Loadable`].
///
/// `Wait` is left exactly once. `DependentLoading`, `CheckVersion` and
/// `Downloading` are sub-states of `Loading` that strategies report for
/// observability; the engine treats all four as "in progress".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadableStatus {
    /// Created, begin-load has not run yet.
    #[default]
    Wait,
    /// Begin-load has run and the strategy is being polled.
    Loading,
    /// Waiting on other resources before the payload can be produced.
    DependentLoading,
    /// Finished with a payload.
    SuccessToLoad,
    /// Finished with an error.
    FailedToLoad,
    /// Torn down and removed from its registry.
    Unloaded,
    /// Comparing a cached copy against the manifest.
    CheckVersion,
    /// Transferring bytes.
    Downloading,
}

impl LoadableStatus {
    /// Terminal: success, failure or unloaded.
    pub fn is_done(self) -> bool {
        matches!(
            self,
            LoadableStatus::SuccessToLoad | LoadableStatus::FailedToLoad | LoadableStatus::Unloaded
        )
    }

    /// `Loading` or one of its sub-states.
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            LoadableStatus::Loading
                | LoadableStatus::DependentLoading
                | LoadableStatus::CheckVersion
                | LoadableStatus::Downloading
        )
    }

    pub fn is_success(self) -> bool {
        self == LoadableStatus::SuccessToLoad
    }

    pub fn is_failed(self) -> bool {
        self == LoadableStatus::FailedToLoad
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: LoadableStatus) -> bool {
        use LoadableStatus::*;
        match (self, next) {
            (Wait, Loading) => true,
            (from, to) if from.is_loading() && to.is_loading() => true,
            (from, SuccessToLoad | FailedToLoad) => from.is_loading(),
            (Wait | Unloaded, Unloaded) => false,
            (_, Unloaded) => true,
            _ => false,
        }
    }
}
