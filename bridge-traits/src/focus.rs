//! Audio focus arbitration.
//!
//! Mobile platforms arbitrate audio output between applications: a player asks
//! for focus before producing sound and is told when another application takes
//! it away, either for good (another player started) or transiently (a
//! navigation prompt, a notification chime).

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Focus held by this application, as last reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusState {
    /// Focus was never requested or has been abandoned.
    None,
    Gained,
    /// Lost for a short while; expected back.
    LostTransient,
    /// Lost for a short while; output may continue at a lowered volume.
    LostTransientCanDuck,
    /// Lost for good.
    LostPermanent,
}

/// Outcome of a focus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusGrant {
    Granted,
    Denied,
}

/// Host audio focus manager (Android `AudioManager`, iOS `AVAudioSession`, ...).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::focus::{AudioFocusHost, FocusGrant, FocusState};
///
/// async fn watch(host: &dyn AudioFocusHost) -> Result<()> {
///     if host.request_focus().await? == FocusGrant::Granted {
///         let mut changes = host.subscribe_changes().await?;
///         while let Some(state) = changes.next().await {
///             println!("focus is now {state:?}");
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait AudioFocusHost: Send + Sync {
    /// Ask for long-lived media focus.
    async fn request_focus(&self) -> Result<FocusGrant>;

    /// Give focus back.
    async fn abandon_focus(&self) -> Result<()>;

    /// Subscribe to focus changes pushed by the host.
    async fn subscribe_changes(&self) -> Result<Box<dyn FocusChangeStream>>;
}

/// Stream of focus changes.
#[async_trait::async_trait]
pub trait FocusChangeStream: Send {
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<FocusState>;
}

/// Focus host for platforms without arbitration (desktop, tests).
///
/// Every request is granted and no change is ever reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnarbitratedFocus;

#[async_trait::async_trait]
impl AudioFocusHost for UnarbitratedFocus {
    async fn request_focus(&self) -> Result<FocusGrant> {
        Ok(FocusGrant::Granted)
    }

    async fn abandon_focus(&self) -> Result<()> {
        Ok(())
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn FocusChangeStream>> {
        Ok(Box::new(ClosedFocusStream))
    }
}

struct ClosedFocusStream;

#[async_trait::async_trait]
impl FocusChangeStream for ClosedFocusStream {
    async fn next(&mut self) -> Option<FocusState> {
        None
    }
}
