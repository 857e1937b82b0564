//! Trip lifecycle controller.
//!
//! Trip status is an advisory progress indicator, never a gate: transitions
//! fire as side effects of the other engines' milestones, and a transition
//! that cannot apply (missing trip, terminal status, lost race) is skipped
//! silently. The triggering operation always succeeds regardless.
//!
//! Allowed forward order:
//!
//! ```text
//! Planning → Inviting → Surveying → Voting → Booked → InProgress → Completed
//! ```
//!
//! with `Cancelled` reachable from any non-terminal state by an external
//! collaborator. Survey and voting-session creation overwrite the current
//! status outright (organizers may re-survey or re-vote a trip that is
//! already further along); only terminal statuses are never overwritten.

use crate::providers::{CoordinationStore, TripStatusUpdate};
use crate::reports::StatusChange;
use crate::state::{TripId, TripStatus};
use tracing::{debug, warn};

/// Milestone events that trigger an advisory status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// First successful invitation of an invite batch.
    InvitationIssued,

    /// A survey was opened.
    SurveyOpened,

    /// A voting session was opened.
    VotingOpened,
}

/// Target status for an event given the observed current status, or `None`
/// when the transition does not apply.
fn target_for(event: LifecycleEvent, current: TripStatus) -> Option<TripStatus> {
    if current.is_terminal() {
        return None;
    }
    match event {
        // Only the very first invitation moves the needle.
        LifecycleEvent::InvitationIssued => {
            (current == TripStatus::Planning).then_some(TripStatus::Inviting)
        }
        // Unconditional overwrite: a trip can return to Surveying/Voting
        // from any later non-terminal stage.
        LifecycleEvent::SurveyOpened => {
            (current != TripStatus::Surveying).then_some(TripStatus::Surveying)
        }
        LifecycleEvent::VotingOpened => {
            (current != TripStatus::Voting).then_some(TripStatus::Voting)
        }
    }
}

/// Apply the advisory status transition for a milestone event.
///
/// Reads the trip, computes the target status, and applies it with a
/// compare-and-set against the observed status so a concurrent transition
/// is skipped rather than clobbered. Store failures are logged and mapped
/// to [`StatusChange::Failed`]; nothing here ever returns an error.
pub async fn advance_trip_status<S: CoordinationStore>(
    store: &S,
    trip_id: TripId,
    event: LifecycleEvent,
) -> StatusChange {
    let trip = match store.trip(trip_id).await {
        Ok(Some(trip)) => trip,
        Ok(None) => {
            debug!(?trip_id, ?event, "status transition skipped, trip not found");
            return StatusChange::Skipped { current: None };
        }
        Err(error) => {
            warn!(?trip_id, ?event, %error, "status transition failed reading trip");
            return StatusChange::Failed;
        }
    };

    let Some(to) = target_for(event, trip.status) else {
        debug!(?trip_id, ?event, current = ?trip.status, "status transition not applicable");
        return StatusChange::Skipped {
            current: Some(trip.status),
        };
    };

    match store.update_trip_status(trip_id, trip.status, to).await {
        Ok(TripStatusUpdate::Applied { from }) => {
            debug!(?trip_id, ?from, ?to, "trip status advanced");
            StatusChange::Applied { from, to }
        }
        Ok(TripStatusUpdate::Skipped { current }) => {
            debug!(?trip_id, ?current, "status transition lost a race, skipped");
            StatusChange::Skipped { current }
        }
        Err(error) => {
            warn!(?trip_id, ?event, %error, "status transition failed");
            StatusChange::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_invitation_only_moves_planning_trips() {
        assert_eq!(
            target_for(LifecycleEvent::InvitationIssued, TripStatus::Planning),
            Some(TripStatus::Inviting)
        );
        assert_eq!(
            target_for(LifecycleEvent::InvitationIssued, TripStatus::Surveying),
            None
        );
    }

    #[test]
    fn survey_overwrites_any_non_terminal_status() {
        assert_eq!(
            target_for(LifecycleEvent::SurveyOpened, TripStatus::Voting),
            Some(TripStatus::Surveying)
        );
        assert_eq!(
            target_for(LifecycleEvent::SurveyOpened, TripStatus::Booked),
            Some(TripStatus::Surveying)
        );
        assert_eq!(target_for(LifecycleEvent::SurveyOpened, TripStatus::Cancelled), None);
        assert_eq!(target_for(LifecycleEvent::SurveyOpened, TripStatus::Completed), None);
    }

    #[test]
    fn no_self_transition() {
        assert_eq!(target_for(LifecycleEvent::SurveyOpened, TripStatus::Surveying), None);
        assert_eq!(target_for(LifecycleEvent::VotingOpened, TripStatus::Voting), None);
    }
}
