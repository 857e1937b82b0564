//! Invitation mailer trait.

use super::InvitationEmail;
use crate::error::Result;
use crate::reports::Delivery;

/// Outbound invitation email delivery.
///
/// This trait abstracts over email delivery services (SMTP relays,
/// SendGrid, AWS SES, ...). Delivery is advisory: the invitation record is
/// written before the send is attempted, and a failed send never rolls the
/// record back.
pub trait InvitationMailer: Send + Sync {
    /// Send one invitation email.
    ///
    /// # Returns
    ///
    /// [`Delivery::Sent`] when the message was handed off synchronously,
    /// [`Delivery::Queued`] when the provider accepted it for later
    /// delivery.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The transport cannot be reached
    /// - The provider rejects the message
    fn send_invitation(
        &self,
        email: &InvitationEmail,
    ) -> impl std::future::Future<Output = Result<Delivery>> + Send;
}
