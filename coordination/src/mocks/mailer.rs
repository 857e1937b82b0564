//! Mock invitation mailer for testing.

use crate::error::{CoordinationError, Result};
use crate::providers::{InvitationEmail, InvitationMailer};
use crate::reports::Delivery;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// How the mock mailer responds to sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailerMode {
    /// Accept and report [`Delivery::Sent`].
    #[default]
    Deliver,

    /// Accept and report [`Delivery::Queued`].
    Queue,

    /// Fail every send.
    Fail,
}

/// Mock invitation mailer.
///
/// Records every accepted email and can be switched into queue or failure
/// mode to exercise the advisory-delivery paths.
#[derive(Debug, Clone, Default)]
pub struct MockMailer {
    mode: Arc<Mutex<MailerMode>>,
    sent: Arc<Mutex<Vec<InvitationEmail>>>,
}

impl MockMailer {
    /// Create a mailer that delivers everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the mailer's behavior.
    pub fn set_mode(&self, mode: MailerMode) {
        if let Ok(mut guard) = self.mode.lock() {
            *guard = mode;
        }
    }

    /// Emails accepted so far (failed sends are not recorded).
    ///
    /// # Errors
    ///
    /// Returns error if the mailer mutex is poisoned.
    pub fn sent(&self) -> Result<Vec<InvitationEmail>> {
        Ok(self
            .sent
            .lock()
            .map_err(|_| CoordinationError::Internal)?
            .clone())
    }
}

impl InvitationMailer for MockMailer {
    fn send_invitation(
        &self,
        email: &InvitationEmail,
    ) -> impl Future<Output = Result<Delivery>> + Send {
        let mode = Arc::clone(&self.mode);
        let sent = Arc::clone(&self.sent);
        let email = email.clone();

        async move {
            let mode = *mode.lock().map_err(|_| CoordinationError::Internal)?;
            match mode {
                MailerMode::Fail => Err(CoordinationError::Storage(
                    "mock mailer failure".to_string(),
                )),
                MailerMode::Deliver => {
                    sent.lock()
                        .map_err(|_| CoordinationError::Internal)?
                        .push(email);
                    Ok(Delivery::Sent)
                }
                MailerMode::Queue => {
                    sent.lock()
                        .map_err(|_| CoordinationError::Internal)?
                        .push(email);
                    Ok(Delivery::Queued)
                }
            }
        }
    }
}
