//! The two acquire/release protocols behind [`BigLock`](crate::BigLock).
//!
//! `plain` is a bare mutex. `adaptive` adds the predictive sleep before
//! acquiring and the hold measurement on release. Which one runs is fixed
//! when the lock is constructed.

pub(crate) mod adaptive;
pub(crate) mod plain;

use crate::config::BigLockConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    Plain,
    Adaptive,
}

impl Strategy {
    pub(crate) fn for_config(config: &BigLockConfig) -> Self {
        if config.adaptive_timing {
            Strategy::Adaptive
        } else {
            Strategy::Plain
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Plain => write!(f, "plain"),
            Strategy::Adaptive => write!(f, "adaptive"),
        }
    }
}
