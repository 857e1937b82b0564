//! SMTP mailer implementation using Lettre.

use super::{InvitationEmail, InvitationMailer};
use crate::error::{CoordinationError, Result};
use crate::reports::Delivery;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// SMTP mailer using Lettre.
///
/// Sends real invitation emails via an SMTP relay, suitable for production
/// use.
///
/// # Examples
///
/// ```ignore
/// use caravan_coordination::providers::SmtpMailer;
///
/// let mailer = SmtpMailer::new(
///     "smtp.example.com".to_string(),
///     587,
///     "caravan".to_string(),
///     "app_password".to_string(),
///     "invites@caravan.app".to_string(),
///     "Caravan".to_string(),
/// );
/// ```
#[derive(Clone)]
pub struct SmtpMailer {
    /// SMTP server address.
    smtp_server: String,

    /// SMTP server port.
    smtp_port: u16,

    /// SMTP credentials.
    credentials: Credentials,

    /// Sender email address.
    from_email: String,

    /// Sender display name.
    from_name: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer.
    #[must_use]
    pub fn new(
        smtp_server: String,
        smtp_port: u16,
        smtp_username: String,
        smtp_password: String,
        from_email: String,
        from_name: String,
    ) -> Self {
        Self {
            smtp_server,
            smtp_port,
            credentials: Credentials::new(smtp_username, smtp_password),
            from_email,
            from_name,
        }
    }

    /// Build an SMTP transport.
    ///
    /// A fresh transport per email avoids connection pooling issues with
    /// relays that drop idle connections.
    fn build_transport(&self) -> Result<SmtpTransport> {
        let relay = SmtpTransport::relay(&self.smtp_server)
            .map_err(|e| CoordinationError::Storage(format!("SMTP relay error: {e}")))?;
        Ok(relay
            .port(self.smtp_port)
            .credentials(self.credentials.clone())
            .build())
    }

    /// Build the "From" header.
    fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }
}

impl InvitationMailer for SmtpMailer {
    async fn send_invitation(&self, email: &InvitationEmail) -> Result<Delivery> {
        let expires_days = (email.expires_at - chrono::Utc::now()).num_days();
        let body = format!(
            "{inviter} invited you to join the trip \"{trip}\".\n\n\
             Open /trips/{id}/join to accept.\n\n\
             This invitation expires in {expires_days} days.",
            inviter = email.inviter_name,
            trip = email.trip_title,
            id = email.trip_id.0,
        );

        let message = Message::builder()
            .from(
                self.from_header()
                    .parse()
                    .map_err(|_| CoordinationError::Internal)?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| CoordinationError::Internal)?)
            .subject(format!(
                "{} invited you to \"{}\"",
                email.inviter_name, email.trip_title
            ))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| CoordinationError::Storage(format!("failed to build email: {e}")))?;

        self.build_transport()?
            .send(&message)
            .map_err(|e| CoordinationError::Storage(format!("SMTP send failed: {e}")))?;

        Ok(Delivery::Sent)
    }
}
