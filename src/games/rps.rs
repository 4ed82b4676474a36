use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{high_card::Verdict, validate_range, GameError, MAX_STAKE, Wager};

pub const MIN_STAKE: i64 = 100;
pub const WIN_MULTIPLIER: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Piedra,
    Papel,
    Tijera,
}

const HANDS: [Hand; 3] = [Hand::Piedra, Hand::Papel, Hand::Tijera];

impl Hand {
    pub fn beats(&self, other: Hand) -> bool {
        matches!(
            (self, other),
            (Hand::Piedra, Hand::Tijera) | (Hand::Papel, Hand::Piedra) | (Hand::Tijera, Hand::Papel)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpsRound {
    pub stake: i64,
    pub player: Hand,
    pub house: Hand,
    pub verdict: Verdict,
    pub payout: i64,
}

pub fn judge(stake: i64, player: Hand, house: Hand) -> (Verdict, i64) {
    if player == house {
        (Verdict::Tie, stake)
    } else if player.beats(house) {
        (Verdict::Win, stake * WIN_MULTIPLIER)
    } else {
        (Verdict::Loss, 0)
    }
}

pub fn play<R: Rng>(stake: i64, player: Hand, rng: &mut R) -> Result<RpsRound, GameError> {
    validate_range(stake, MIN_STAKE, MAX_STAKE)?;

    let house = HANDS[rng.gen_range(0..HANDS.len())];
    let (verdict, payout) = judge(stake, player, house);

    Ok(RpsRound {
        stake,
        player,
        house,
        verdict,
        payout,
    })
}

impl Wager for RpsRound {
    fn game(&self) -> &'static str {
        "piedra_papel_tijera"
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
    fn test_judge_cycle() {
        assert_eq!(judge(100, Hand::Piedra, Hand::Tijera), (Verdict::Win, 200));
        assert_eq!(judge(100, Hand::Tijera, Hand::Papel), (Verdict::Win, 200));
        assert_eq!(judge(100, Hand::Papel, Hand::Piedra), (Verdict::Win, 200));
        assert_eq!(judge(100, Hand::Piedra, Hand::Papel), (Verdict::Loss, 0));
        assert_eq!(judge(100, Hand::Papel, Hand::Papel), (Verdict::Tie, 100));
    }

    #[test]
    fn test_stake_limits() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(play(MAX_STAKE, Hand::Papel, &mut rng).is_ok());
        assert!(matches!(
            play(i64::MAX, Hand::Papel, &mut rng),
            Err(GameError::InvalidStake(_))
        ));
        assert!(play(MIN_STAKE - 1, Hand::Papel, &mut rng).is_err());
    }
}
