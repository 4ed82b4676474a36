//! Five-reel, three-row slots with ten fixed paylines.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;

use super::{validate_allowed, GameError, Wager};

pub const REELS: usize = 5;
pub const ROWS: usize = 3;
pub const LINE_BETS: [i64; 6] = [100, 250, 500, 1000, 2500, 5000];

/// Row index on each reel, left to right.
pub const PAYLINES: [[usize; REELS]; 10] = [
    [0, 0, 0, 0, 0],
    [1, 1, 1, 1, 1],
    [2, 2, 2, 2, 2],
    [0, 1, 2, 1, 0],
    [2, 1, 0, 1, 2],
    [0, 0, 1, 2, 2],
    [2, 2, 1, 0, 0],
    [1, 0, 1, 0, 1],
    [1, 2, 1, 2, 1],
    [1, 0, 2, 0, 1],
];

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
    Diamond,
    Crown,
}

pub const SYMBOLS: [Symbol; 10] = [
    Symbol::Cherry,
    Symbol::Lemon,
    Symbol::Orange,
    Symbol::Watermelon,
    Symbol::Star,
    Symbol::Bell,
    Symbol::Grapes,
    Symbol::Seven,
    Symbol::Diamond,
    Symbol::Crown,
];

impl Symbol {
    pub fn weight(&self) -> u32 {
        match self {
            Symbol::Cherry => 40,
            Symbol::Lemon => 35,
            Symbol::Orange => 30,
            Symbol::Watermelon => 25,
            Symbol::Star => 20,
            Symbol::Bell => 15,
            Symbol::Grapes => 10,
            Symbol::Seven => 5,
            Symbol::Diamond => 2,
            Symbol::Crown => 1,
        }
    }

    /// Line multipliers for runs of 3, 4 and 5.
    pub fn paytable(&self) -> [i64; 3] {
        match self {
            Symbol::Crown => [200, 500, 1000],
            Symbol::Diamond => [100, 200, 500],
            Symbol::Seven => [50, 100, 200],
            Symbol::Grapes => [30, 60, 120],
            Symbol::Bell => [20, 40, 80],
            Symbol::Star => [10, 20, 40],
            Symbol::Watermelon => [5, 10, 20],
            Symbol::Orange => [3, 6, 12],
            Symbol::Lemon => [2, 4, 8],
            Symbol::Cherry => [1, 2, 4],
        }
    }
}

pub type Grid = [[Symbol; ROWS]; REELS];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineWin {
    pub line: usize,
    pub symbol: Symbol,
    pub count: usize,
    pub multiplier: i64,
    pub payout: i64,
}

/// First run of three or more equal adjacent symbols along the line.
pub fn evaluate_line(symbols: &[Symbol; REELS]) -> Option<(Symbol, usize)> {
    let mut start = 0;
    while start < REELS {
        let mut end = start + 1;
        while end < REELS && symbols[end] == symbols[start] {
            end += 1;
        }
        if end - start >= 3 {
            return Some((symbols[start], end - start));
        }
        start = end;
    }
    None
}

pub fn line_symbols(grid: &Grid, line: &[usize; REELS]) -> [Symbol; REELS] {
    let mut symbols = [Symbol::Cherry; REELS];
    for (reel, row) in line.iter().enumerate() {
        symbols[reel] = grid[reel][*row];
    }
    symbols
}

pub fn evaluate_grid(grid: &Grid, lines: usize, bet: i64) -> Vec<LineWin> {
    PAYLINES
        .iter()
        .take(lines)
        .enumerate()
        .filter_map(|(index, line)| {
            let (symbol, count) = evaluate_line(&line_symbols(grid, line))?;
            let multiplier = symbol.paytable()[count - 3];
            Some(LineWin {
                line: index + 1,
                symbol,
                count,
                multiplier,
                payout: multiplier * bet,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PaylinesRound {
    pub bet_per_line: i64,
    pub lines: usize,
    pub stake: i64,
    pub grid: Grid,
    pub wins: Vec<LineWin>,
    pub payout: i64,
}

pub fn play<R: Rng>(bet: i64, lines: usize, rng: &mut R) -> Result<PaylinesRound, GameError> {
    validate_allowed(bet, &LINE_BETS)?;
    if !(1..=PAYLINES.len()).contains(&lines) {
        return Err(GameError::InvalidChoice(format!(
            "lines must be between 1 and {}",
            PAYLINES.len()
        )));
    }

    let weights = WeightedIndex::new(SYMBOLS.iter().map(|s| s.weight()))
        .map_err(|e| GameError::InvalidMove(e.to_string()))?;
    let mut grid = [[Symbol::Cherry; ROWS]; REELS];
    for reel in grid.iter_mut() {
        for cell in reel.iter_mut() {
            *cell = SYMBOLS[weights.sample(rng)];
        }
    }

    let wins = evaluate_grid(&grid, lines, bet);
    let payout = wins.iter().map(|w| w.payout).sum();

    Ok(PaylinesRound {
        bet_per_line: bet,
        lines,
        stake: bet * lines as i64,
        grid,
        wins,
        payout,
    })
}

impl Wager for PaylinesRound {
    fn game(&self) -> &'static str {
        "tragamonedas5"
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
    use Symbol::*;

    #[test]
    fn test_evaluate_line_runs() {
        assert_eq!(evaluate_line(&[Seven, Seven, Seven, Lemon, Lemon]), Some((Seven, 3)));
        assert_eq!(evaluate_line(&[Crown, Crown, Crown, Crown, Crown]), Some((Crown, 5)));
        assert_eq!(evaluate_line(&[Lemon, Bell, Bell, Bell, Bell]), Some((Bell, 4)));
        assert_eq!(evaluate_line(&[Lemon, Lemon, Bell, Bell, Star]), None);
        assert_eq!(evaluate_line(&[Lemon, Bell, Star, Star, Star]), Some((Star, 3)));
    }

    #[test]
    fn test_evaluate_grid_counts_active_lines_only() {
        let mut grid = [[Cherry, Lemon, Orange]; REELS];
        // Middle row is all lemons; line 2 pays, line 1 (cherries) pays too.
        grid[3] = [Star, Lemon, Orange];
        grid[4] = [Bell, Lemon, Orange];

        let wins = evaluate_grid(&grid, 1, 100);
        assert_eq!(wins.len(), 1);
        assert_eq!(wins[0].symbol, Cherry);
        assert_eq!(wins[0].count, 3);
        assert_eq!(wins[0].payout, 100);

        let wins = evaluate_grid(&grid, 3, 100);
        assert_eq!(wins.len(), 3);
        assert_eq!(wins[1].symbol, Lemon);
        assert_eq!(wins[1].count, 5);
        assert_eq!(wins[1].payout, 800);
        assert_eq!(wins[2].symbol, Orange);
        assert_eq!(wins[2].payout, 1200);
    }

    #[test]
    fn test_play_stake_is_bet_times_lines() {
        let mut rng = StdRng::seed_from_u64(5);
        let round = play(250, 4, &mut rng).unwrap();
        assert_eq!(round.stake, 1000);
        assert_eq!(round.payout, round.wins.iter().map(|w| w.payout).sum::<i64>());
        assert!(play(250, 0, &mut rng).is_err());
        assert!(play(250, 11, &mut rng).is_err());
        assert!(play(300, 1, &mut rng).is_err());
    }
}
