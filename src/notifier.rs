//! Desktop notifications through `notify-send`.

use herakles_leak_guard::Notifier;
use std::time::Duration;
use tracing::debug;

use crate::exec::run_with_timeout;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends a critical-urgency desktop notification. Failures are only logged at debug level.
#[derive(Debug, Clone)]
pub struct NotifySend {
    program: String,
}

impl Default for NotifySend {
    fn default() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }
}

impl Notifier for NotifySend {
    fn notify(&self, title: &str, message: &str) {
        match run_with_timeout(&self.program, &["-u", "critical", title, message], NOTIFY_TIMEOUT) {
            Ok(out) if out.status.success() => {}
            Ok(out) => debug!("{} exited with {}", self.program, out.status),
            Err(e) => debug!("Notification not delivered: {}", e),
        }
    }
}
