//! Async game service: the operation set exposed to the transport layer.
//!
//! Each operation runs its read-check-write sequence in one store
//! transaction, then fans notifications out to the affected members after
//! the commit. Results cross the boundary as [`Outcome`] envelopes.
//!
//! ```text
//! handler ─▶ GameService ─▶ StateStore::transact { gate → registry / engine / ledger }
//!                       └─▶ fan_out(notifier)      (best effort, after commit)
//! ```
//!
//! Store transactions run inline on the calling task and block its worker
//! until the commit returns. With a disk-backed store, host the service on
//! a multi-thread tokio runtime.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dicehall_ledger::{BonusClaim, HousePool};
use dicehall_store::StateStore;
use dicehall_types::{
    ConfirmAction, DicehallError, GameConfig, GameKind, GameState, LobbyId, Outcome, Reason,
    Result, UserId,
};
use serde::Serialize;

use crate::{
    clock::{Clock, DiceSource, RandomDice, SystemClock},
    confirmation::{ConfirmationGate, GateDecision},
    engine::{MatchEngine, MatchResult, RollResult},
    notify::{AbortCause, Notification, Notifier, fan_out},
    query::{self, LeaderboardEntry, LobbyView, UserProfile},
    registry::{Departure, LobbyRegistry, LobbySummary},
};

/// Result of a confirmation-gated action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus<T> {
    /// Nothing happened yet; repeat the action before `expires_at`.
    Pending { expires_at: DateTime<Utc> },
    Done { result: T },
}

impl<T> ActionStatus<T> {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    #[must_use]
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done { result } => Some(result),
            Self::Pending { .. } => None,
        }
    }
}

/// How a match that reached its last round was closed.
enum Closing {
    Settled(MatchResult),
    /// Settlement failed; escrow went back and the lobby was removed.
    Released {
        members: Vec<UserId>,
        error: DicehallError,
    },
}

/// Post-commit work for a departure.
struct DepartureEffect {
    departure: Departure,
    aborted: bool,
    view: Option<LobbyView>,
}

pub struct GameService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    dice: Arc<dyn DiceSource>,
    config: GameConfig,
    registry: LobbyRegistry,
    engine: MatchEngine,
    gate: ConfirmationGate,
    house: HousePool,
}

impl<S: StateStore, N: Notifier> GameService<S, N> {
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: GameConfig) -> Result<Self> {
        config.validate()?;
        let registry = LobbyRegistry::new(config.clone())?;
        let engine = MatchEngine::new(registry.ledger().clone());
        Ok(Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
            dice: Arc::new(RandomDice),
            gate: ConfirmationGate::from_config(&config)?,
            house: HousePool::from_config(&config)?,
            config,
            registry,
            engine,
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_dice(mut self, dice: Arc<dyn DiceSource>) -> Self {
        self.dice = dice;
        self
    }

    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ── Users ──────────────────────────────────────────────────────────

    /// Register on first interaction; refresh the display name afterwards.
    pub fn register(&self, user: UserId, name: &str) -> Outcome<UserProfile> {
        let now = self.clock.now();
        let result = self.store.transact(|s| {
            self.registry.ensure_user(s, user, name, now);
            query::user_profile(s, user)
        });
        report("register", result)
    }

    pub async fn claim_bonus(&self, user: UserId) -> Outcome<BonusClaim> {
        let now = self.clock.now();
        let result = self
            .store
            .transact(|s| self.house.claim_bonus(s, user, now));
        if let Ok(claim) = &result {
            let note = Notification::BonusGranted {
                amount: claim.amount,
                at: now,
            };
            fan_out(&self.notifier, &[user], &note).await;
        }
        report("claim_bonus", result)
    }

    // ── Lobby lifecycle ────────────────────────────────────────────────

    pub fn create_lobby(&self, user: UserId, game: GameKind, wager: u64) -> Outcome<LobbyView> {
        let now = self.clock.now();
        let result = self.store.transact(|s| {
            let id = self
                .registry
                .create(s, user, game, wager, &mut rand::thread_rng(), now)?;
            self.view(s, id)
        });
        report("create_lobby", result)
    }

    pub async fn join_lobby(&self, lobby: LobbyId, user: UserId) -> Outcome<LobbyView> {
        let now = self.clock.now();
        let result = self.store.transact(|s| {
            self.registry.join(s, lobby, user, now)?;
            self.view(s, lobby)
        });
        if let Ok(view) = &result {
            let note = Notification::LobbyUpdated {
                lobby: view.clone(),
            };
            fan_out(&self.notifier, &view.members, &note).await;
        }
        report("join_lobby", result)
    }

    /// Lock every member's wager and begin round 1.
    pub async fn start_match(&self, lobby: LobbyId, by: UserId) -> Outcome<LobbyView> {
        let now = self.clock.now();
        let result = self.store.transact(|s| {
            self.registry.start(s, lobby, by, now)?;
            self.view(s, lobby)
        });
        if let Ok(view) = &result {
            let note = Notification::RoundPrompt {
                lobby,
                round: 1,
                total_rounds: view.total_rounds.unwrap_or(self.config.dice.rounds),
            };
            fan_out(&self.notifier, &view.members, &note).await;
        }
        report("start_match", result)
    }

    /// Leave a lobby. Gated: the first call only records a pending
    /// confirmation. Leaving a running match costs the penalty and aborts
    /// the match for everyone else.
    pub async fn leave_lobby(
        &self,
        lobby: LobbyId,
        user: UserId,
    ) -> Outcome<ActionStatus<Departure>> {
        let now = self.clock.now();
        let result = self.store.transact(|s| {
            let current = s.lobby(lobby)?;
            if !current.is_member(user) {
                return Err(DicehallError::NotMember { lobby, user });
            }
            if current.is_match_finished() {
                return Err(DicehallError::MatchFinished(lobby));
            }
            let action = if current.is_started() {
                ConfirmAction::LeaveInGame
            } else {
                ConfirmAction::Leave
            };
            if let GateDecision::Pending { expires_at } = self.gate.check(s, user, action, lobby, now)
            {
                return Ok(Err(ActionStatus::Pending { expires_at }));
            }
            let departure = self.registry.leave(s, lobby, user, true, now)?;
            self.settle_departure(s, departure).map(Ok)
        });
        let result = match result {
            Ok(Ok(effect)) => {
                let cause = AbortCause::MemberLeft(effect.departure.user);
                self.announce_departure(&effect, cause).await;
                Ok(ActionStatus::Done {
                    result: effect.departure,
                })
            }
            Ok(Err(pending)) => Ok(pending),
            Err(err) => Err(err),
        };
        report("leave_lobby", result)
    }

    /// Creator removes `target`. Gated per target.
    pub async fn kick(
        &self,
        lobby: LobbyId,
        by: UserId,
        target: UserId,
    ) -> Outcome<ActionStatus<Departure>> {
        let now = self.clock.now();
        let result = self.store.transact(|s| {
            LobbyRegistry::validate_kick(s, lobby, by, target)?;
            let action = ConfirmAction::Kick(target);
            if let GateDecision::Pending { expires_at } = self.gate.check(s, by, action, lobby, now) {
                return Ok(Err(ActionStatus::Pending { expires_at }));
            }
            let departure = self.registry.kick(s, lobby, by, target, now)?;
            self.settle_departure(s, departure).map(Ok)
        });
        let result = match result {
            Ok(Ok(effect)) => {
                let note = Notification::Kicked { lobby };
                fan_out(&self.notifier, &[target], &note).await;
                self.announce_departure(&effect, AbortCause::MemberKicked(target))
                    .await;
                Ok(ActionStatus::Done {
                    result: effect.departure,
                })
            }
            Ok(Err(pending)) => Ok(pending),
            Err(err) => Err(err),
        };
        report("kick", result)
    }

    /// Creator deletes the lobby, aborting a running match. Gated.
    pub async fn delete_lobby(&self, lobby: LobbyId, by: UserId) -> Outcome<ActionStatus<LobbyView>> {
        let now = self.clock.now();
        let result = self.store.transact(|s| {
            LobbyRegistry::validate_delete(s, lobby, by)?;
            let action = ConfirmAction::DeleteLobby;
            if let GateDecision::Pending { expires_at } = self.gate.check(s, by, action, lobby, now) {
                return Ok(ActionStatus::Pending { expires_at });
            }
            let view = self.view(s, lobby)?;
            self.registry.delete(s, lobby, by)?;
            Ok(ActionStatus::Done { result: view })
        });
        if let Ok(ActionStatus::Done { result: view }) = &result {
            let others: Vec<UserId> = view.members.iter().copied().filter(|m| *m != by).collect();
            let note = if view.started {
                Notification::MatchAborted {
                    lobby,
                    cause: AbortCause::Deleted,
                }
            } else {
                Notification::LobbyClosed { lobby }
            };
            fan_out(&self.notifier, &others, &note).await;
        }
        report("delete_lobby", result)
    }

    /// A running match loses its quorum once anyone departs: abort it.
    fn settle_departure(&self, s: &mut GameState, mut departure: Departure) -> Result<DepartureEffect> {
        let aborted = departure.was_started && !departure.lobby_deleted;
        if aborted {
            self.registry.dissolve(s, departure.lobby)?;
            departure.lobby_deleted = true;
        }
        let view = if departure.lobby_deleted {
            None
        } else {
            Some(self.view(s, departure.lobby)?)
        };
        Ok(DepartureEffect {
            departure,
            aborted,
            view,
        })
    }

    async fn announce_departure(&self, effect: &DepartureEffect, cause: AbortCause) {
        let lobby = effect.departure.lobby;
        let note = if effect.aborted {
            Notification::MatchAborted { lobby, cause }
        } else if let Some(view) = &effect.view {
            Notification::LobbyUpdated {
                lobby: view.clone(),
            }
        } else {
            Notification::LobbyClosed { lobby }
        };
        fan_out(&self.notifier, &effect.departure.remaining, &note).await;
    }

    // ── Match play ─────────────────────────────────────────────────────

    /// Roll the die for `user`. The roll that completes a round announces
    /// the result and, after the pacing delay, prompts the next round. The
    /// roll that completes the last round settles the match in the same
    /// transaction, so nobody can leave or be removed between the final
    /// result and the payout.
    pub async fn roll(&self, lobby: LobbyId, user: UserId) -> Outcome<RollResult> {
        let now = self.clock.now();
        let face = self.dice.roll();
        let result = self.store.transact(|s| {
            let roll = self.engine.submit_roll(s, lobby, user, face, now)?;
            let closing = if roll.finished {
                Some(self.close_match(s, lobby, now)?)
            } else {
                None
            };
            Ok((roll, closing))
        });
        let (roll, closing) = match result {
            Ok(done) => done,
            Err(err) => return report("roll", Err(err)),
        };

        if let Some(round) = &roll.resolved {
            let members: Vec<UserId> = round.scores.keys().copied().collect();
            let note = Notification::RoundResolved {
                result: round.clone(),
            };
            fan_out(&self.notifier, &members, &note).await;

            if let Some(closing) = closing {
                if let Err(err) = self.announce_closing(lobby, closing).await {
                    return report("roll", Err(err));
                }
            } else {
                tokio::time::sleep(self.config.round_pacing).await;
                let note = Notification::RoundPrompt {
                    lobby,
                    round: round.round + 1,
                    total_rounds: round.total_rounds,
                };
                fan_out(&self.notifier, &members, &note).await;
            }
        }
        Outcome::success(roll)
    }

    /// Finalize a finished match inside the caller's transaction. If
    /// settlement fails the snapshot is restored to before the attempt and
    /// every member's escrow is released instead.
    fn close_match(&self, s: &mut GameState, lobby: LobbyId, now: DateTime<Utc>) -> Result<Closing> {
        let checkpoint = s.clone();
        match self.engine.finalize(s, lobby, now) {
            Ok(result) => Ok(Closing::Settled(result)),
            Err(error) => {
                *s = checkpoint;
                tracing::error!(lobby = %lobby, error = %error, "Settlement failed; releasing escrow");
                let removed = self.registry.dissolve(s, lobby)?;
                Ok(Closing::Released {
                    members: removed.members,
                    error,
                })
            }
        }
    }

    async fn announce_closing(&self, lobby: LobbyId, closing: Closing) -> Result<MatchResult> {
        match closing {
            Closing::Settled(result) => {
                let note = Notification::MatchFinished {
                    result: result.clone(),
                };
                fan_out(&self.notifier, &result.members, &note).await;
                Ok(result)
            }
            Closing::Released { members, error } => {
                let note = Notification::MatchAborted {
                    lobby,
                    cause: AbortCause::SettlementFailed,
                };
                fan_out(&self.notifier, &members, &note).await;
                Err(error)
            }
        }
    }

    /// Finalize lobbies persisted in `Finished` without a settlement, as
    /// found in documents written by older releases. Call at startup.
    ///
    /// # Errors
    /// Returns the store error if the state cannot be read. Failures of
    /// individual lobbies are logged and skipped.
    pub async fn recover(&self) -> Result<Vec<MatchResult>> {
        let stalled = MatchEngine::stalled_matches(&self.store.snapshot()?);
        if !stalled.is_empty() {
            tracing::info!(count = stalled.len(), "Recovering unsettled matches");
        }
        let mut recovered = Vec::with_capacity(stalled.len());
        for lobby in stalled {
            let now = self.clock.now();
            match self.store.transact(|s| self.close_match(s, lobby, now)) {
                Ok(closing) => {
                    if let Ok(result) = self.announce_closing(lobby, closing).await {
                        recovered.push(result);
                    }
                }
                Err(err) => {
                    tracing::warn!(lobby = %lobby, error = %err, "Recovery skipped lobby");
                }
            }
        }
        Ok(recovered)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn lobby(&self, lobby: LobbyId) -> Outcome<LobbyView> {
        report("lobby", self.store.snapshot().and_then(|s| self.view(&s, lobby)))
    }

    pub fn open_lobbies(&self) -> Outcome<Vec<LobbySummary>> {
        report(
            "open_lobbies",
            self.store.snapshot().map(|s| self.registry.open_lobbies(&s)),
        )
    }

    pub fn user_profile(&self, user: UserId) -> Outcome<UserProfile> {
        report(
            "user_profile",
            self.store
                .snapshot()
                .and_then(|s| query::user_profile(&s, user)),
        )
    }

    pub fn leaderboard_by_balance(&self, limit: usize) -> Outcome<Vec<LeaderboardEntry>> {
        report(
            "leaderboard_by_balance",
            self.store
                .snapshot()
                .map(|s| query::leaderboard_by_balance(&s, limit)),
        )
    }

    pub fn leaderboard_by_wins(&self, limit: usize) -> Outcome<Vec<LeaderboardEntry>> {
        report(
            "leaderboard_by_wins",
            self.store
                .snapshot()
                .map(|s| query::leaderboard_by_wins(&s, limit)),
        )
    }

    fn view(&self, s: &GameState, lobby: LobbyId) -> Result<LobbyView> {
        let l = s.lobby(lobby)?;
        Ok(LobbyView::new(l, self.registry.capacity(l.game)))
    }
}

fn report<T>(op: &'static str, result: Result<T>) -> Outcome<T> {
    if let Err(err) = &result {
        if err.reason() == Reason::Internal {
            tracing::error!(op, error = %err, "Operation failed");
        } else {
            tracing::debug!(op, error = %err, "Operation rejected");
        }
    }
    Outcome::from(result)
}
