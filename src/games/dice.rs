use rand::Rng;
use serde::Serialize;

use super::{validate_allowed, GameError, Wager, STANDARD_STAKES};

pub const DOUBLE_SIX_MULTIPLIER: i64 = 10;
pub const DOUBLE_MULTIPLIER: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DiceRound {
    pub stake: i64,
    pub dice: [u8; 2],
    pub multiplier: i64,
    pub payout: i64,
}

pub fn multiplier(first: u8, second: u8) -> i64 {
    match (first, second) {
        (6, 6) => DOUBLE_SIX_MULTIPLIER,
        (a, b) if a == b => DOUBLE_MULTIPLIER,
        _ => 0,
    }
}

pub fn play<R: Rng>(stake: i64, rng: &mut R) -> Result<DiceRound, GameError> {
    validate_allowed(stake, &STANDARD_STAKES)?;

    let dice = [rng.gen_range(1..=6), rng.gen_range(1..=6)];
    let multiplier = multiplier(dice[0], dice[1]);

    Ok(DiceRound {
        stake,
        dice,
        multiplier,
        payout: stake * multiplier,
    })
}

impl Wager for DiceRound {
    fn game(&self) -> &'static str {
        "dados"
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
    fn test_multiplier_table() {
        assert_eq!(multiplier(6, 6), 10);
        assert_eq!(multiplier(1, 1), 5);
        assert_eq!(multiplier(3, 3), 5);
        assert_eq!(multiplier(6, 5), 0);
        assert_eq!(multiplier(1, 2), 0);
    }

    #[test]
    fn test_play_pays_by_table() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let round = play(1000, &mut rng).unwrap();
            assert!((1..=6).contains(&round.dice[0]));
            assert!((1..=6).contains(&round.dice[1]));
            assert_eq!(round.payout, 1000 * multiplier(round.dice[0], round.dice[1]));
        }
    }

    #[test]
    fn test_rejects_unlisted_stake() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(play(300, &mut rng), Err(GameError::InvalidStake(_))));
    }
}
