//! Push notifications.
//!
//! Delivery is fire-and-forget: failures are logged by [`notify_best_effort`]
//! and never interrupt the pipeline.

use std::path::Path;

use log::{info, warn};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{Result, SkycamError};

pub trait Notifier {
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Sends through `notifier`, logging instead of failing.
pub fn notify_best_effort(notifier: &dyn Notifier, title: &str, message: &str) {
    if let Err(e) = notifier.notify(title, message) {
        warn!("Notification '{}' not delivered: {}", title, e);
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        info!("[{}] {}", title, message.replace('\n', " "));
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.sent.lock().push((title.to_string(), message.to_string()));
        Ok(())
    }
}

/// Pushover application and user keys, as stored in `pushover.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushoverCredentials {
    pub app_token: String,
    pub user_token: String,
}

impl PushoverCredentials {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SkycamError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| SkycamError::metadata(path, e))
    }
}

#[cfg(feature = "pushover")]
pub use pushover::PushoverNotifier;

#[cfg(feature = "pushover")]
mod pushover {
    use super::*;

    const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

    /// Low-priority Pushover messages over HTTPS.
    pub struct PushoverNotifier {
        credentials: PushoverCredentials,
        client: reqwest::blocking::Client,
    }

    impl PushoverNotifier {
        pub fn new(credentials: PushoverCredentials) -> Self {
            Self {
                credentials,
                client: reqwest::blocking::Client::new(),
            }
        }
    }

    impl Notifier for PushoverNotifier {
        fn notify(&self, title: &str, message: &str) -> Result<()> {
            let params = [
                ("token", self.credentials.app_token.as_str()),
                ("user", self.credentials.user_token.as_str()),
                ("priority", "-1"),
                ("message", message),
                ("title", title),
            ];
            self.client
                .post(PUSHOVER_URL)
                .form(&params)
                .send()
                .and_then(|response| response.error_for_status())
                .map(|_| ())
                .map_err(|e| SkycamError::Notification {
                    message: e.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _title: &str, _message: &str) -> Result<()> {
            Err(SkycamError::Notification {
                message: "offline".to_string(),
            })
        }
    }

    #[test]
    fn test_best_effort_swallows_errors() {
        notify_best_effort(&Broken, "title", "message");
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::default();
        notify_best_effort(&notifier, "SkyCam Sequence Complete", "done");
        assert_eq!(notifier.titles(), vec!["SkyCam Sequence Complete"]);
    }

    #[test]
    fn test_credentials_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pushover.json");
        std::fs::write(&path, r#"{"app_token": "a1", "user_token": "u1"}"#).unwrap();
        let creds = PushoverCredentials::from_file(&path).unwrap();
        assert_eq!(creds.app_token, "a1");
        assert!(PushoverCredentials::from_file(&dir.path().join("missing.json")).is_err());
    }
}
