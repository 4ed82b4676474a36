//! Game engines.
//!
//! Every engine here is free of I/O: it validates the stake, draws from the
//! supplied `Rng` and reports how much was charged and how much is paid
//! back. Moving money is left to the services, which settle each finished
//! round against the balance and the round ledger in one transaction.
//!
//! Instant games:
//! - Dice
//! - Prize wheel
//! - Slots (three reels) and payline slots (5x3)
//! - Cascades
//! - Coin flip, high card, rock-paper-scissors
//! - European roulette
//!
//! Session games, kept in a [`sessions::SessionStore`] between requests:
//! - Blackjack
//! - Aviator
//! - Mines
//! - Poker

pub mod aviator;
pub mod blackjack;
pub mod cards;
pub mod cascades;
pub mod coin_flip;
pub mod dice;
pub mod high_card;
pub mod mines;
pub mod paylines;
pub mod poker;
pub mod roulette;
pub mod rps;
pub mod sessions;
pub mod slots;
pub mod wheel;

use serde::Serialize;

/// Stakes accepted by the fixed-stake games.
pub const STANDARD_STAKES: [i64; 5] = [100, 500, 1000, 2000, 5000];

/// Largest stake any free-stake game takes in one round, and the largest
/// single roulette bet.
pub const MAX_STAKE: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Invalid stake: {0}")]
    InvalidStake(String),
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Game already finished")]
    Finished,
}

/// A finished round, ready to be settled.
///
/// `stake` is what the round takes from the balance and `payout` what it
/// returns, so the balance after settlement is `before - stake + payout`.
pub trait Wager: Serialize {
    fn game(&self) -> &'static str;
    fn stake(&self) -> i64;
    fn payout(&self) -> i64;
}

pub fn validate_allowed(stake: i64, allowed: &[i64]) -> Result<(), GameError> {
    if allowed.contains(&stake) {
        Ok(())
    } else {
        Err(GameError::InvalidStake(format!(
            "stake must be one of {:?}",
            allowed
        )))
    }
}

pub fn validate_range(stake: i64, minimum: i64, maximum: i64) -> Result<(), GameError> {
    if (minimum..=maximum).contains(&stake) {
        Ok(())
    } else {
        Err(GameError::InvalidStake(format!(
            "stake must be between {} and {}",
            minimum, maximum
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_validation() {
        assert!(validate_allowed(500, &STANDARD_STAKES).is_ok());
        assert!(validate_allowed(501, &STANDARD_STAKES).is_err());
        assert!(validate_range(MAX_STAKE, 100, MAX_STAKE).is_ok());
        assert!(validate_range(i64::MAX, 100, MAX_STAKE).is_err());
        assert!(validate_range(5000, 100, 5000).is_ok());
        assert!(validate_range(5001, 100, 5000).is_err());
        assert!(validate_range(0, 100, 5000).is_err());
    }
}
