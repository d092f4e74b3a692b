use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{api::CalendarSync, error::ApiError};

/// A consent attempt that got no completion message within this window is
/// treated as abandoned.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(300);

/// Completion messages posted by the popup back to the opener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OauthMessage {
    #[serde(rename = "GOOGLE_OAUTH_SUCCESS")]
    Success,
    #[serde(rename = "GOOGLE_OAUTH_ERROR")]
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Disallowed origin or unrecognized payload; state untouched.
    Ignored,
    Connected,
    Failed(String),
}

/// How the host shell opens the consent URL (browser popup, webview, a
/// printed link in the CLI). Popup-blocked surfaces as an error here.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), ApiError>;
}

/// Bridges the async OAuth completion back into the client. The popup is a
/// single-slot resource: a second sign-in while one is pending is refused
/// instead of spawning a second window. Completion arrives as an external
/// message whose origin must be on the allow-list before anything changes.
pub struct OauthBridge {
    calendar: CalendarSync,
    allowed_origins: Vec<String>,
    timeout: Duration,
    pending: Mutex<Option<Instant>>,
}

impl OauthBridge {
    pub fn new(calendar: CalendarSync, allowed_origins: Vec<String>) -> Self {
        Self {
            calendar,
            allowed_origins,
            timeout: AUTH_TIMEOUT,
            pending: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn in_progress(&self) -> bool {
        let mut pending = self.pending.lock().await;
        match *pending {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                // deadline passed without a message: the slot frees itself
                *pending = None;
                false
            }
            None => false,
        }
    }

    /// Fetch the consent URL and hand it to the opener. Refuses while an
    /// attempt is already pending.
    pub async fn sign_in(&self, opener: &dyn UrlOpener) -> Result<(), ApiError> {
        {
            let mut pending = self.pending.lock().await;
            match *pending {
                Some(deadline) if Instant::now() < deadline => {
                    return Err(ApiError::AuthInProgress);
                }
                _ => *pending = Some(Instant::now() + self.timeout),
            }
        }

        let url = match self.calendar.initiate_auth().await {
            Ok(url) => url,
            Err(err) => {
                self.release().await;
                return Err(err);
            }
        };
        if let Err(err) = opener.open(&url).await {
            self.release().await;
            return Err(err);
        }
        Ok(())
    }

    /// Deliver a window message. Origin is matched by prefix against the
    /// allow-list; anything else is dropped with no state change.
    pub async fn deliver(&self, origin: &str, payload: &Value) -> AuthOutcome {
        if !self
            .allowed_origins
            .iter()
            .any(|allowed| origin.starts_with(allowed.as_str()))
        {
            tracing::debug!("dropping oauth message from origin {origin}");
            return AuthOutcome::Ignored;
        }

        let Ok(message) = serde_json::from_value::<OauthMessage>(payload.clone()) else {
            return AuthOutcome::Ignored;
        };

        self.release().await;
        match message {
            OauthMessage::Success => {
                self.calendar.set_connected(true);
                AuthOutcome::Connected
            }
            OauthMessage::Error { error } => {
                self.calendar.set_connected(false);
                AuthOutcome::Failed(error)
            }
        }
    }

    /// The user closed the popup without completing; connection state is
    /// left as it was.
    pub async fn popup_closed(&self) {
        self.release().await;
    }

    async fn release(&self) {
        *self.pending.lock().await = None;
    }
}
