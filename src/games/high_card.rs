use rand::Rng;
use serde::Serialize;

use super::{validate_range, GameError, MAX_STAKE, Wager};

pub const MIN_STAKE: i64 = 100;
pub const WIN_MULTIPLIER: i64 = 2;

/// Upper bounds the player's card is drawn from, each picked with equal odds.
pub const PLAYER_RANGES: [u8; 3] = [7, 10, 13];
pub const HOUSE_RANGE: u8 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Win,
    Tie,
    Loss,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighCardRound {
    pub stake: i64,
    pub player_card: u8,
    pub house_card: u8,
    pub verdict: Verdict,
    pub payout: i64,
}

pub fn judge(stake: i64, player: u8, house: u8) -> (Verdict, i64) {
    match player.cmp(&house) {
        std::cmp::Ordering::Greater => (Verdict::Win, stake * WIN_MULTIPLIER),
        std::cmp::Ordering::Equal => (Verdict::Tie, stake),
        std::cmp::Ordering::Less => (Verdict::Loss, 0),
    }
}

pub fn play<R: Rng>(stake: i64, rng: &mut R) -> Result<HighCardRound, GameError> {
    validate_range(stake, MIN_STAKE, MAX_STAKE)?;

    let range = PLAYER_RANGES[rng.gen_range(0..PLAYER_RANGES.len())];
    let player_card = rng.gen_range(1..=range);
    let house_card = rng.gen_range(1..=HOUSE_RANGE);
    let (verdict, payout) = judge(stake, player_card, house_card);

    Ok(HighCardRound {
        stake,
        player_card,
        house_card,
        verdict,
        payout,
    })
}

/// Exact odds of each verdict, as (win, tie, loss).
pub fn probabilities() -> (f64, f64, f64) {
    let mut win = 0.0;
    let mut tie = 0.0;
    let per_range = 1.0 / PLAYER_RANGES.len() as f64;

    for range in PLAYER_RANGES {
        let per_card = per_range / (range as f64 * HOUSE_RANGE as f64);
        for player in 1..=range {
            for house in 1..=HOUSE_RANGE {
                if player > house {
                    win += per_card;
                } else if player == house {
                    tie += per_card;
                }
            }
        }
    }

    (win, tie, 1.0 - win - tie)
}

impl Wager for HighCardRound {
    fn game(&self) -> &'static str {
        "carta_mayor"
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
    fn test_judge() {
        assert_eq!(judge(100, 9, 3), (Verdict::Win, 200));
        assert_eq!(judge(100, 5, 5), (Verdict::Tie, 100));
        assert_eq!(judge(100, 2, 13), (Verdict::Loss, 0));
    }

    #[test]
    fn test_probabilities_favor_the_house() {
        let (win, tie, loss) = probabilities();
        assert!((win + tie + loss - 1.0).abs() < 1e-9);
        assert!(loss > win);
    }

    #[test]
    fn test_player_card_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..300 {
            let round = play(100, &mut rng).unwrap();
            assert!((1..=13).contains(&round.player_card));
            assert!((1..=13).contains(&round.house_card));
        }
    }

    #[test]
    fn test_stake_above_table_limit() {
        let mut rng = StdRng::seed_from_u64(21);
        assert!(matches!(
            play(i64::MAX / 2 + 1, &mut rng),
            Err(GameError::InvalidStake(_))
        ));
        assert!(play(MAX_STAKE + 1, &mut rng).is_err());
    }
}
