//! # dicehall-ledger
//!
//! **Escrow Ledger**: available vs. locked balance per user, settlement of
//! finished matches, the house commission pool, and supply auditing.
//!
//! ## Architecture
//!
//! Every operation works on a `&mut GameState` handed out by the store's
//! transaction, so a ledger step and the lobby change that caused it commit
//! together or not at all:
//! 1. **EscrowLedger**: lock / unlock wagers, settle win or draw
//! 2. **HousePool**: accrue commission, pay it back out as bonus claims
//! 3. **SupplyAudit**: conservation and lock-consistency checks
//!
//! ## Wager Flow
//!
//! ```text
//! start ─▶ lock_all(wager) ─▶ … match … ─┬─▶ settle(winner, losers)  ─▶ commission → HousePool
//!                                        ├─▶ settle_draw(players)
//!                                        └─▶ release_all (abort / compensating rollback)
//! ```
//!
//! Funds are always locked before they are debited or paid out.

pub mod audit;
pub mod escrow;
pub mod house;

pub use audit::{SupplyAudit, SupplySnapshot};
pub use escrow::{EscrowLedger, Settlement};
pub use house::{BonusClaim, HousePool};
