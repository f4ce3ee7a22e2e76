//! Feature flags
//!
//! Flags are read once into a `Copy` snapshot. Every guard is a pure function
//! of a snapshot, so a request sees one consistent set of flags even if the
//! handle is reloaded while it runs.

use crate::database::{QueryFailure, QueryResult};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    /// `FEATURE_REDIS_CACHE`
    pub cache: bool,
    /// `FEATURE_EDIT_TASK`
    pub edit_task: bool,
    /// `FEATURE_DELETE_TASK`
    pub delete_task: bool,
}

/// Write operations that can be switched off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteGuard {
    EditTask,
    DeleteTask,
}

impl WriteGuard {
    /// Message surfaced to callers when the guard rejects a write
    pub fn disabled_message(self) -> &'static str {
        match self {
            WriteGuard::EditTask => "Edit task feature is disabled",
            WriteGuard::DeleteTask => "Delete task feature is disabled",
        }
    }
}

impl FeatureFlags {
    /// Only the literal `true`, ignoring case, switches a flag on
    pub fn parse_flag(value: Option<&str>) -> bool {
        value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache
    }

    pub fn allows(&self, guard: WriteGuard) -> bool {
        match guard {
            WriteGuard::EditTask => self.edit_task,
            WriteGuard::DeleteTask => self.delete_task,
        }
    }

    /// Rejects a guarded write before it reaches the database
    pub fn guard(&self, guard: WriteGuard) -> QueryResult<()> {
        if self.allows(guard) {
            Ok(())
        } else {
            Err(QueryFailure::feature_disabled(guard))
        }
    }
}

/// Process-wide holder for the current flag snapshot
#[derive(Debug, Default)]
pub struct FeatureFlagHandle {
    current: RwLock<FeatureFlags>,
}

impl FeatureFlagHandle {
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            current: RwLock::new(flags),
        }
    }

    pub fn snapshot(&self) -> FeatureFlags {
        *self.current.read()
    }

    /// Replace the snapshot; calls already holding the old one keep it
    pub fn reload(&self, flags: FeatureFlags) {
        let previous = std::mem::replace(&mut *self.current.write(), flags);
        if previous != flags {
            info!(?previous, current = ?flags, "Feature flags reloaded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::FailureKind;

    #[test]
    fn test_parse_flag_accepts_only_true() {
        assert!(FeatureFlags::parse_flag(Some("true")));
        assert!(FeatureFlags::parse_flag(Some("TRUE")));
        assert!(FeatureFlags::parse_flag(Some(" true ")));
        assert!(!FeatureFlags::parse_flag(Some("1")));
        assert!(!FeatureFlags::parse_flag(Some("yes")));
        assert!(!FeatureFlags::parse_flag(Some("")));
        assert!(!FeatureFlags::parse_flag(None));
    }

    #[test]
    fn test_guard_rejects_disabled_writes() {
        let flags = FeatureFlags {
            edit_task: true,
            ..FeatureFlags::default()
        };

        assert!(flags.guard(WriteGuard::EditTask).is_ok());

        let failure = flags.guard(WriteGuard::DeleteTask).unwrap_err();
        assert_eq!(failure.kind, FailureKind::FeatureDisabled);
        assert_eq!(failure.message, "Delete task feature is disabled");
    }

    #[test]
    fn test_snapshot_is_stable_across_reload() {
        let handle = FeatureFlagHandle::new(FeatureFlags::default());
        let before = handle.snapshot();

        handle.reload(FeatureFlags {
            cache: true,
            ..FeatureFlags::default()
        });

        assert!(!before.cache_enabled());
        assert!(handle.snapshot().cache_enabled());
    }
}
