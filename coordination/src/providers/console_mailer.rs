//! Console mailer for development and testing.

use super::{InvitationEmail, InvitationMailer};
use crate::error::Result;
use crate::reports::Delivery;
use chrono::Utc;
use tracing::info;

/// Console mailer.
///
/// Logs invitation emails instead of sending them. Useful for development
/// where you don't want to send real mail.
#[derive(Clone, Debug, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    /// Create a new console mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl InvitationMailer for ConsoleMailer {
    async fn send_invitation(&self, email: &InvitationEmail) -> Result<Delivery> {
        let expires_days = (email.expires_at - Utc::now()).num_days();

        info!(
            to = %email.to,
            trip = %email.trip_title,
            inviter = %email.inviter_name,
            expires_in_days = expires_days,
            "📧 Trip invitation email (development mode)"
        );
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  TRIP INVITATION EMAIL                       ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ To: {:<57}║", email.to);
        println!("║ Subject: {} invited you to \"{}\"", email.inviter_name, email.trip_title);
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Join here: /trips/{}/join", email.trip_id.0);
        println!("║ This invitation expires in {expires_days} days.");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        Ok(Delivery::Sent)
    }
}
