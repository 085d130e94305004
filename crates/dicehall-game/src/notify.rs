//! Best-effort per-member notifications.
//!
//! Delivery happens after the state change has committed. Each recipient
//! gets its own task; a failed or panicked delivery is logged and never
//! reaches the caller, so one unreachable member cannot affect the others
//! or the game state.

use std::{fmt, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use dicehall_types::{LobbyId, UserId};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::{
    engine::{MatchResult, RoundResult},
    query::LobbyView,
};

/// Why a running match ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortCause {
    MemberLeft(UserId),
    MemberKicked(UserId),
    Deleted,
    SettlementFailed,
}

/// A message for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Membership or settings changed.
    LobbyUpdated { lobby: LobbyView },
    /// The lobby was closed before its match started.
    LobbyClosed { lobby: LobbyId },
    /// The recipient was removed by the creator.
    Kicked { lobby: LobbyId },
    /// Roll for this round.
    RoundPrompt {
        lobby: LobbyId,
        round: u32,
        total_rounds: u32,
    },
    RoundResolved { result: RoundResult },
    MatchFinished { result: MatchResult },
    /// Escrow has been returned.
    MatchAborted { lobby: LobbyId, cause: AbortCause },
    BonusGranted {
        amount: u64,
        at: DateTime<Utc>,
    },
}

/// Transport that delivers notifications to users.
pub trait Notifier: Send + Sync + 'static {
    type Error: fmt::Display + Send + 'static;

    fn notify(
        &self,
        user: UserId,
        notification: Notification,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send;
}

/// Delivery counts of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Send `notification` to every recipient concurrently and wait for all
/// deliveries to finish.
pub async fn fan_out<N: Notifier>(
    notifier: &Arc<N>,
    recipients: &[UserId],
    notification: &Notification,
) -> FanOutReport {
    let mut tasks = JoinSet::new();
    for recipient in recipients {
        let notifier = Arc::clone(notifier);
        let notification = notification.clone();
        let recipient = *recipient;
        tasks.spawn(async move {
            (recipient, notifier.notify(recipient, notification).await)
        });
    }

    let mut report = FanOutReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => report.delivered += 1,
            Ok((user, Err(err))) => {
                report.failed += 1;
                tracing::warn!(user = %user, error = %err, "Notification delivery failed");
            }
            Err(err) => {
                report.failed += 1;
                tracing::warn!(error = %err, "Notification task aborted");
            }
        }
    }
    report
}

/// Logs every notification at `debug` and drops it. Used when no
/// transport is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    type Error = std::convert::Infallible;

    async fn notify(
        &self,
        user: UserId,
        notification: Notification,
    ) -> std::result::Result<(), Self::Error> {
        tracing::debug!(user = %user, ?notification, "Notification");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use fixtures::{FailingNotifier, RecordingNotifier};

/// **Test fixtures only.**
#[cfg(any(test, feature = "test-helpers"))]
mod fixtures {
    use std::{
        collections::BTreeSet,
        sync::{Mutex, PoisonError},
    };

    use dicehall_types::UserId;

    use super::{Notification, Notifier};

    /// Records every delivery in order.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(UserId, Notification)>>,
    }

    impl RecordingNotifier {
        #[must_use]
        pub fn all(&self) -> Vec<(UserId, Notification)> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        #[must_use]
        pub fn received(&self, user: UserId) -> Vec<Notification> {
            self.all()
                .into_iter()
                .filter(|(u, _)| *u == user)
                .map(|(_, n)| n)
                .collect()
        }

        pub fn clear(&self) {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }

        fn record(&self, user: UserId, notification: Notification) {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((user, notification));
        }
    }

    impl Notifier for RecordingNotifier {
        type Error = String;

        async fn notify(&self, user: UserId, notification: Notification) -> Result<(), String> {
            self.record(user, notification);
            Ok(())
        }
    }

    /// Fails delivery to a fixed set of users and records the rest.
    #[derive(Debug, Default)]
    pub struct FailingNotifier {
        unreachable: BTreeSet<UserId>,
        inner: RecordingNotifier,
    }

    impl FailingNotifier {
        #[must_use]
        pub fn unreachable(users: impl IntoIterator<Item = UserId>) -> Self {
            Self {
                unreachable: users.into_iter().collect(),
                inner: RecordingNotifier::default(),
            }
        }

        #[must_use]
        pub fn received(&self, user: UserId) -> Vec<Notification> {
            self.inner.received(user)
        }
    }

    impl Notifier for FailingNotifier {
        type Error = String;

        async fn notify(&self, user: UserId, notification: Notification) -> Result<(), String> {
            if self.unreachable.contains(&user) {
                return Err(format!("{user} is unreachable"));
            }
            self.inner.record(user, notification);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> Notification {
        Notification::LobbyClosed {
            lobby: LobbyId(123_456),
        }
    }

    #[tokio::test]
    async fn fan_out_reaches_everyone() {
        let notifier = Arc::new(RecordingNotifier::default());
        let report = fan_out(&notifier, &[UserId(1), UserId(2), UserId(3)], &note()).await;
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(notifier.received(UserId(2)), vec![note()]);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let notifier = Arc::new(FailingNotifier::unreachable([UserId(2)]));
        let report = fan_out(&notifier, &[UserId(1), UserId(2), UserId(3)], &note()).await;
        assert_eq!(report, FanOutReport { delivered: 2, failed: 1 });
        assert_eq!(notifier.received(UserId(1)).len(), 1);
        assert!(notifier.received(UserId(2)).is_empty());
        assert_eq!(notifier.received(UserId(3)).len(), 1);
    }

    #[tokio::test]
    async fn empty_recipient_list() {
        let notifier = Arc::new(TracingNotifier);
        assert_eq!(fan_out(&notifier, &[], &note()).await, FanOutReport::default());
    }

    #[test]
    fn notifications_serialize_with_kind_tag() {
        let json = serde_json::to_value(note()).unwrap();
        assert_eq!(json["kind"], "lobby_closed");
        assert_eq!(json["lobby"], 123_456);
    }
}
