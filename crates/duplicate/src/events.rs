use async_trait::async_trait;

use crate::record::Record;

/// What a `duplicating` observer decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookOutcome {
    #[default]
    Proceed,
    Veto,
}

impl HookOutcome {
    pub fn is_veto(self) -> bool {
        self == HookOutcome::Veto
    }
}

impl From<bool> for HookOutcome {
    /// `false` vetoes, anything else proceeds
    fn from(proceed: bool) -> Self {
        if proceed {
            HookOutcome::Proceed
        } else {
            HookOutcome::Veto
        }
    }
}

impl From<()> for HookOutcome {
    fn from(_: ()) -> Self {
        HookOutcome::Proceed
    }
}

#[async_trait]
pub trait DuplicationObserver: Send + Sync {
    /// Called before anything is written; returning `Veto` cancels the duplication
    async fn duplicating(&self, _original: &Record) -> HookOutcome {
        HookOutcome::Proceed
    }

    /// Called after the duplication committed
    async fn duplicated(&self, _original: &Record, _duplicate: &Record) {}
}
