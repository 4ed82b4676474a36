use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{validate_range, GameError, MAX_STAKE, Wager};

pub const MIN_STAKE: i64 = 50;
pub const WIN_MULTIPLIER: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Cara,
    Sello,
}

/// The coin can also land on the house, which beats either call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Landing {
    Cara,
    Sello,
    House,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinFlipRound {
    pub stake: i64,
    pub choice: Side,
    pub landing: Landing,
    pub won: bool,
    pub payout: i64,
}

pub fn wins(choice: Side, landing: Landing) -> bool {
    matches!(
        (choice, landing),
        (Side::Cara, Landing::Cara) | (Side::Sello, Landing::Sello)
    )
}

pub fn play<R: Rng>(stake: i64, choice: Side, rng: &mut R) -> Result<CoinFlipRound, GameError> {
    validate_range(stake, MIN_STAKE, MAX_STAKE)?;

    let landing = match rng.gen_range(0..3) {
        0 => Landing::Cara,
        1 => Landing::Sello,
        _ => Landing::House,
    };
    let won = wins(choice, landing);

    Ok(CoinFlipRound {
        stake,
        choice,
        landing,
        won,
        payout: if won { stake * WIN_MULTIPLIER } else { 0 },
    })
}

impl Wager for CoinFlipRound {
    fn game(&self) -> &'static str {
        "cara_sello"
    }

    fn stake(&self) -> i64 {
        self.stake
    }

    fn payout(&self) -> i64 {
        self.payout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_house_landing_always_loses() {
        assert!(wins(Side::Cara, Landing::Cara));
        assert!(!wins(Side::Cara, Landing::Sello));
        assert!(!wins(Side::Cara, Landing::House));
        assert!(!wins(Side::Sello, Landing::House));
    }

    #[test]
    fn test_play() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut wins = 0;
        for _ in 0..3000 {
            let round = play(100, Side::Sello, &mut rng).unwrap();
            if round.won {
                wins += 1;
                assert_eq!(round.payout, 200);
            } else {
                assert_eq!(round.payout, 0);
            }
        }
        // Roughly one in three.
        assert!((800..1200).contains(&wins));
        assert!(play(49, Side::Cara, &mut rng).is_err());
    }

    #[test]
    fn test_stake_above_table_limit() {
        let mut rng = StdRng::seed_from_u64(8);
        assert!(play(MAX_STAKE, Side::Cara, &mut rng).is_ok());
        assert!(matches!(
            play(i64::MAX, Side::Cara, &mut rng),
            Err(GameError::InvalidStake(_))
        ));
    }
}
