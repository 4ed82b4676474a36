use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;

use super::{validate_allowed, GameError, Wager, STANDARD_STAKES};

pub const BASE_WIN_CHANCE: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    Cherry,
    Lemon,
    Orange,
    Watermelon,
    Star,
    Bell,
    Grapes,
    Seven,
}

pub const SYMBOLS: [Symbol; 8] = [
    Symbol::Cherry,
    Symbol::Lemon,
    Symbol::Orange,
    Symbol::Watermelon,
    Symbol::Star,
    Symbol::Bell,
    Symbol::Grapes,
    Symbol::Seven,
];

impl Symbol {
    /// Likelihood of each winning triple, in thousandths.
    pub fn weight(&self) -> u32 {
        match self {
            Symbol::Cherry => 350,
            Symbol::Lemon => 250,
            Symbol::Orange => 200,
            Symbol::Watermelon => 100,
            Symbol::Star => 80,
            Symbol::Bell => 14,
            Symbol::Grapes => 5,
            Symbol::Seven => 1,
        }
    }

    pub fn multiplier(&self) -> i64 {
        match self {
            Symbol::Cherry => 1,
            Symbol::Lemon => 2,
            Symbol::Orange => 3,
            Symbol::Watermelon => 4,
            Symbol::Star => 5,
            Symbol::Bell => 25,
            Symbol::Grapes => 50,
            Symbol::Seven => 100,
        }
    }
}

/// Chance that a spin lands a triple. Larger stakes get a better chance.
pub fn win_chance(stake: i64) -> f64 {
    let mut chance = BASE_WIN_CHANCE;
    if stake >= 2000 {
        chance += 0.05;
    }
    if stake >= 5000 {
        chance += 0.05;
    }
    chance
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotsRound {
    pub stake: i64,
    pub reels: [Symbol; 3],
    pub winner: bool,
    pub multiplier: i64,
    pub payout: i64,
}

pub fn play<R: Rng>(stake: i64, rng: &mut R) -> Result<SlotsRound, GameError> {
    validate_allowed(stake, &STANDARD_STAKES)?;

    if rng.gen_bool(win_chance(stake)) {
        let weights = WeightedIndex::new(SYMBOLS.iter().map(|s| s.weight()))
            .map_err(|e| GameError::InvalidMove(e.to_string()))?;
        let symbol = SYMBOLS[weights.sample(rng)];

        return Ok(SlotsRound {
            stake,
            reels: [symbol; 3],
            winner: true,
            multiplier: symbol.multiplier(),
            payout: stake * symbol.multiplier(),
        });
    }

    let reels = loop {
        let reels = [
            SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
            SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
            SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
        ];
        if !(reels[0] == reels[1] && reels[1] == reels[2]) {
            break reels;
        }
    };

    Ok(SlotsRound {
        stake,
        reels,
        winner: false,
        multiplier: 0,
        payout: 0,
    })
}

impl Wager for SlotsRound {
    fn game(&self) -> &'static str {
        "tragamonedas"
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
    fn test_weights_sum_to_one() {
        assert_eq!(SYMBOLS.iter().map(|s| s.weight()).sum::<u32>(), 1000);
    }

    #[test]
    fn test_win_chance_by_stake() {
        assert!((win_chance(100) - 0.30).abs() < 1e-9);
        assert!((win_chance(2000) - 0.35).abs() < 1e-9);
        assert!((win_chance(5000) - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_losses_never_show_a_triple() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let round = play(500, &mut rng).unwrap();
            let triple = round.reels[0] == round.reels[1] && round.reels[1] == round.reels[2];
            assert_eq!(triple, round.winner);
            if round.winner {
                assert_eq!(round.payout, 500 * round.reels[0].multiplier());
            } else {
                assert_eq!(round.payout, 0);
            }
        }
    }
}
