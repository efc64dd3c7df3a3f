use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MicrophonePermission {
    Granted,
    Denied,
    Prompt,
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub microphone: MicrophonePermission,
    pub message: Option<String>,
}

/// Host capability for microphone access.
pub trait MicrophoneAccess: Send + Sync {
    /// Current state without prompting the user.
    fn query(&self) -> MicrophonePermission;
    /// Prompts once; returns whether access was granted.
    fn request(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct PermissionManager {
    snapshot: PermissionSnapshot,
    resolved: bool,
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self {
            snapshot: PermissionSnapshot {
                microphone: MicrophonePermission::Prompt,
                message: None,
            },
            resolved: false,
        }
    }
}

impl PermissionManager {
    pub fn snapshot(&self) -> PermissionSnapshot {
        self.snapshot.clone()
    }

    pub fn is_granted(&self) -> bool {
        self.snapshot.microphone == MicrophonePermission::Granted
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Resolves microphone access, prompting at most once per manager.
    pub fn acquire(&mut self, access: &dyn MicrophoneAccess) -> PermissionSnapshot {
        if self.is_resolved() {
            return self.snapshot();
        }

        let (microphone, message) = match access.query() {
            MicrophonePermission::Granted => (MicrophonePermission::Granted, None),
            MicrophonePermission::Denied => (
                MicrophonePermission::Denied,
                Some(
                    "Microphone access is blocked. Enable it in your system settings; button controls still work."
                        .to_string(),
                ),
            ),
            MicrophonePermission::Unsupported => (
                MicrophonePermission::Unsupported,
                Some("Voice commands are not available. You can still use button controls.".to_string()),
            ),
            MicrophonePermission::Prompt => {
                if access.request() {
                    (MicrophonePermission::Granted, None)
                } else {
                    (
                        MicrophonePermission::Denied,
                        Some("Microphone access denied. You can still use button controls.".to_string()),
                    )
                }
            }
        };

        match microphone {
            MicrophonePermission::Granted => info!("microphone access granted"),
            other => warn!(permission = ?other, "microphone unavailable; button-only control"),
        }
        self.snapshot = PermissionSnapshot {
            microphone,
            message,
        };
        self.resolved = true;
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMic {
        state: MicrophonePermission,
        grant: bool,
        prompts: AtomicUsize,
    }

    impl MicrophoneAccess for FakeMic {
        fn query(&self) -> MicrophonePermission {
            self.state
        }

        fn request(&self) -> bool {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.grant
        }
    }

    fn mic(state: MicrophonePermission, grant: bool) -> FakeMic {
        FakeMic {
            state,
            grant,
            prompts: AtomicUsize::new(0),
        }
    }

    #[test]
    fn prompt_happens_once() {
        let access = mic(MicrophonePermission::Prompt, true);
        let mut manager = PermissionManager::default();
        assert!(!manager.is_resolved());
        assert_eq!(manager.acquire(&access).microphone, MicrophonePermission::Granted);
        assert!(manager.is_resolved());
        manager.acquire(&access);
        assert_eq!(access.prompts.load(Ordering::SeqCst), 1);
        assert!(manager.is_granted());
    }

    #[test]
    fn blocked_permission_is_not_prompted() {
        let access = mic(MicrophonePermission::Denied, true);
        let mut manager = PermissionManager::default();
        let snapshot = manager.acquire(&access);
        assert_eq!(snapshot.microphone, MicrophonePermission::Denied);
        assert!(snapshot.message.is_some());
        assert_eq!(access.prompts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn declined_prompt_degrades_with_message() {
        let access = mic(MicrophonePermission::Prompt, false);
        let mut manager = PermissionManager::default();
        let snapshot = manager.acquire(&access);
        assert_eq!(snapshot.microphone, MicrophonePermission::Denied);
        assert!(snapshot
            .message
            .as_deref()
            .is_some_and(|m| m.contains("button controls")));
    }
}
