//! # Audio Focus Coordinator
//!
//! Tracks the audio focus this session holds and turns host focus changes into
//! playback actions for the session owner.
//!
//! | Change                   | Session playing         | Otherwise |
//! |--------------------------|-------------------------|-----------|
//! | `LostTransient`          | pause, remember it      | nothing   |
//! | `LostTransientCanDuck`   | duck (or pause)         | nothing   |
//! | `Gained`                 | resume if auto-paused, unduck if ducked | |
//! | `LostPermanent`          | stop and abandon focus  | stop      |
//!
//! A pause the user asked for is never undone by a later `Gained`.

use crate::error::{PlaybackError, Result};
use bridge_traits::{AudioFocusHost, FocusChangeStream, FocusGrant, FocusState};
use core_runtime::events::SessionState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the session should do in response to a focus change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAction {
    None,
    Pause,
    /// Resume an automatic pause. `restore_volume` is set when output was
    /// ducked before the pause.
    Resume { restore_volume: bool },
    Duck,
    Unduck,
    Stop,
}

pub struct AudioFocusCoordinator {
    host: Arc<dyn AudioFocusHost>,
    state: FocusState,
    auto_paused: bool,
    ducked: bool,
    ducking: bool,
}

impl AudioFocusCoordinator {
    /// `ducking` selects whether `LostTransientCanDuck` lowers the volume or
    /// pauses like `LostTransient`.
    pub fn new(host: Arc<dyn AudioFocusHost>, ducking: bool) -> Self {
        Self {
            host,
            state: FocusState::None,
            auto_paused: false,
            ducked: false,
            ducking,
        }
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn is_auto_paused(&self) -> bool {
        self.auto_paused
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    /// Make sure focus is held before playback starts.
    ///
    /// # Errors
    ///
    /// `FocusDenied` if the host refuses, `Bridge` if the host call fails.
    pub async fn request(&mut self) -> Result<()> {
        if self.state == FocusState::Gained {
            return Ok(());
        }

        match self.host.request_focus().await? {
            FocusGrant::Granted => {
                debug!("audio focus granted");
                self.state = FocusState::Gained;
                Ok(())
            }
            FocusGrant::Denied => {
                info!("audio focus denied");
                Err(PlaybackError::FocusDenied)
            }
        }
    }

    /// Give focus back to the host. Failures are logged, not returned: the
    /// session is stopping either way.
    pub async fn abandon(&mut self) {
        self.auto_paused = false;
        self.ducked = false;

        if self.state == FocusState::None {
            return;
        }
        self.state = FocusState::None;

        if let Err(err) = self.host.abandon_focus().await {
            warn!(error = %err, "failed to abandon audio focus");
        }
    }

    /// Explicit user play or pause; an earlier automatic pause no longer
    /// applies.
    pub fn clear_auto_pause(&mut self) {
        self.auto_paused = false;
    }

    pub async fn subscribe(&self) -> Result<Box<dyn FocusChangeStream>> {
        Ok(self.host.subscribe_changes().await?)
    }

    /// Record a focus change reported by the host and decide the reaction.
    pub fn on_change(&mut self, focus: FocusState, session: SessionState) -> FocusAction {
        debug!(?focus, %session, "audio focus changed");
        self.state = focus;

        match focus {
            FocusState::Gained => {
                if self.auto_paused {
                    self.auto_paused = false;
                    let restore_volume = std::mem::take(&mut self.ducked);
                    FocusAction::Resume { restore_volume }
                } else if self.ducked {
                    self.ducked = false;
                    FocusAction::Unduck
                } else {
                    FocusAction::None
                }
            }
            FocusState::LostTransientCanDuck if self.ducking => {
                if session.is_active() && !self.ducked {
                    self.ducked = true;
                    FocusAction::Duck
                } else {
                    FocusAction::None
                }
            }
            FocusState::LostTransient | FocusState::LostTransientCanDuck => {
                if session.is_active() {
                    self.auto_paused = true;
                    FocusAction::Pause
                } else {
                    FocusAction::None
                }
            }
            FocusState::LostPermanent => {
                self.auto_paused = false;
                if session.has_timeline() {
                    FocusAction::Stop
                } else {
                    FocusAction::None
                }
            }
            FocusState::None => {
                self.auto_paused = false;
                self.ducked = false;
                FocusAction::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use mockall::mock;

    mock! {
        FocusHost {}

        #[async_trait::async_trait]
        impl AudioFocusHost for FocusHost {
            async fn request_focus(&self) -> bridge_traits::error::Result<FocusGrant>;
            async fn abandon_focus(&self) -> bridge_traits::error::Result<()>;
            async fn subscribe_changes(&self) -> bridge_traits::error::Result<Box<dyn FocusChangeStream>>;
        }
    }

    fn granting() -> MockFocusHost {
        let mut host = MockFocusHost::new();
        host.expect_request_focus()
            .returning(|| Ok(FocusGrant::Granted));
        host
    }

    fn coordinator(host: MockFocusHost, ducking: bool) -> AudioFocusCoordinator {
        AudioFocusCoordinator::new(Arc::new(host), ducking)
    }

    #[tokio::test]
    async fn request_is_skipped_while_focus_is_held() {
        let mut host = MockFocusHost::new();
        host.expect_request_focus()
            .times(1)
            .returning(|| Ok(FocusGrant::Granted));
        let mut focus = coordinator(host, false);

        focus.request().await.unwrap();
        focus.request().await.unwrap();
        assert_eq!(focus.state(), FocusState::Gained);
    }

    #[tokio::test]
    async fn denied_request_fails() {
        let mut host = MockFocusHost::new();
        host.expect_request_focus()
            .returning(|| Ok(FocusGrant::Denied));
        let mut focus = coordinator(host, false);

        assert!(matches!(focus.request().await, Err(PlaybackError::FocusDenied)));
        assert_eq!(focus.state(), FocusState::None);
    }

    #[tokio::test]
    async fn transient_loss_while_playing_pauses_and_resumes() {
        let mut focus = coordinator(granting(), false);
        focus.request().await.unwrap();

        assert_eq!(
            focus.on_change(FocusState::LostTransient, SessionState::Playing),
            FocusAction::Pause
        );
        assert!(focus.is_auto_paused());
        assert_eq!(
            focus.on_change(FocusState::Gained, SessionState::Paused),
            FocusAction::Resume {
                restore_volume: false
            }
        );
        assert!(!focus.is_auto_paused());
    }

    #[test]
    fn user_pause_is_never_resumed() {
        let mut focus = coordinator(MockFocusHost::new(), false);

        assert_eq!(
            focus.on_change(FocusState::LostTransient, SessionState::Paused),
            FocusAction::None
        );
        assert_eq!(
            focus.on_change(FocusState::Gained, SessionState::Paused),
            FocusAction::None
        );
    }

    #[test]
    fn explicit_play_forgets_auto_pause() {
        let mut focus = coordinator(MockFocusHost::new(), false);
        focus.on_change(FocusState::LostTransient, SessionState::Playing);

        focus.clear_auto_pause();
        assert_eq!(
            focus.on_change(FocusState::Gained, SessionState::Playing),
            FocusAction::None
        );
    }

    #[test]
    fn duckable_loss_ducks_when_enabled() {
        let mut focus = coordinator(MockFocusHost::new(), true);

        assert_eq!(
            focus.on_change(FocusState::LostTransientCanDuck, SessionState::Playing),
            FocusAction::Duck
        );
        assert!(focus.is_ducked());
        assert_eq!(
            focus.on_change(FocusState::Gained, SessionState::Playing),
            FocusAction::Unduck
        );
    }

    #[test]
    fn duckable_loss_pauses_when_ducking_disabled() {
        let mut focus = coordinator(MockFocusHost::new(), false);

        assert_eq!(
            focus.on_change(FocusState::LostTransientCanDuck, SessionState::Buffering),
            FocusAction::Pause
        );
    }

    #[test]
    fn ducked_then_paused_restores_volume_on_resume() {
        let mut focus = coordinator(MockFocusHost::new(), true);
        focus.on_change(FocusState::LostTransientCanDuck, SessionState::Playing);
        focus.on_change(FocusState::LostTransient, SessionState::Playing);

        assert_eq!(
            focus.on_change(FocusState::Gained, SessionState::Paused),
            FocusAction::Resume {
                restore_volume: true
            }
        );
    }

    #[test]
    fn permanent_loss_stops_live_sessions_only() {
        let mut focus = coordinator(MockFocusHost::new(), false);
        assert_eq!(
            focus.on_change(FocusState::LostPermanent, SessionState::Paused),
            FocusAction::Stop
        );
        assert_eq!(
            focus.on_change(FocusState::LostPermanent, SessionState::Stopped),
            FocusAction::None
        );
    }

    #[tokio::test]
    async fn abandon_tolerates_host_failure() {
        let mut host = granting();
        host.expect_abandon_focus()
            .times(1)
            .returning(|| Err(BridgeError::OperationFailed("audio service died".into())));
        let mut focus = coordinator(host, false);

        focus.request().await.unwrap();
        focus.abandon().await;
        assert_eq!(focus.state(), FocusState::None);

        // Nothing held any more; the host is not called again.
        focus.abandon().await;
    }
}
