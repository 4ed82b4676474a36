//! Falling-block board. Runs of three or more equal symbols in any of the
//! four directions are cleared, the columns fall, the holes are refilled
//! from the top and the board is checked again until nothing matches.

use std::collections::HashSet;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{validate_range, GameError, Wager};

const MIN_RUN: usize = 3;
const MAX_LEVELS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Board {
    #[serde(rename = "5x5")]
    Small,
    #[serde(rename = "10x10")]
    Large,
}

pub struct BoardConfig {
    pub size: usize,
    /// Base multiplier in tenths.
    pub base_tenths: i64,
    pub min_bet: i64,
    pub max_bet: i64,
}

impl Board {
    pub fn config(&self) -> BoardConfig {
        match self {
            Board::Small => BoardConfig {
                size: 5,
                base_tenths: 10,
                min_bet: 100,
                max_bet: 5000,
            },
            Board::Large => BoardConfig {
                size: 10,
                base_tenths: 20,
                min_bet: 500,
                max_bet: 20_000,
            },
        }
    }
}

/// Symbols are numbered 1 to 9; the number is also the scoring group.
pub const SYMBOL_WEIGHTS: [u32; 9] = [30, 30, 30, 20, 15, 10, 5, 2, 1];

pub fn combo_multiplier(length: usize) -> i64 {
    match length {
        0..=3 => 1,
        4 => 2,
        5 => 5,
        6 => 10,
        7 => 25,
        8 => 50,
        9 => 100,
        _ => 200,
    }
}

/// Level bonus in tenths.
pub fn cascade_bonus_tenths(level: u32) -> i64 {
    match level {
        0 | 1 => 10,
        2 => 12,
        3 => 15,
        4 => 20,
        5 => 30,
        _ => 50,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Horizontal,
    Vertical,
    DiagonalDown,
    DiagonalUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Combo {
    pub symbol: u8,
    pub direction: Direction,
    pub cells: Vec<(usize, usize)>,
}

pub type Grid = Vec<Vec<u8>>;

fn cell(grid: &Grid, row: isize, col: isize) -> Option<u8> {
    if row < 0 || col < 0 {
        return None;
    }
    grid.get(row as usize)?.get(col as usize).copied()
}

/// Maximal runs of at least three equal, non-empty symbols.
pub fn find_combos(grid: &Grid) -> Vec<Combo> {
    let size = grid.len() as isize;
    let directions = [
        (Direction::Horizontal, 0, 1),
        (Direction::Vertical, 1, 0),
        (Direction::DiagonalDown, 1, 1),
        (Direction::DiagonalUp, -1, 1),
    ];
    let mut combos = Vec::new();

    for (direction, dr, dc) in directions {
        for row in 0..size {
            for col in 0..size {
                let symbol = match cell(grid, row, col) {
                    Some(s) if s != 0 => s,
                    _ => continue,
                };
                // Only start counting at the beginning of a run.
                if cell(grid, row - dr, col - dc) == Some(symbol) {
                    continue;
                }
                let mut cells = vec![(row as usize, col as usize)];
                let (mut r, mut c) = (row + dr, col + dc);
                while cell(grid, r, c) == Some(symbol) {
                    cells.push((r as usize, c as usize));
                    r += dr;
                    c += dc;
                }
                if cells.len() >= MIN_RUN {
                    combos.push(Combo {
                        symbol,
                        direction,
                        cells,
                    });
                }
            }
        }
    }

    combos
}

/// Clears matched cells and returns how many were removed.
pub fn clear_combos(grid: &mut Grid, combos: &[Combo]) -> usize {
    let cleared: HashSet<(usize, usize)> = combos
        .iter()
        .flat_map(|c| c.cells.iter().copied())
        .collect();
    for (row, col) in &cleared {
        grid[*row][*col] = 0;
    }
    cleared.len()
}

/// Drops symbols into the holes below them and refills the top of each column.
pub fn apply_gravity<F: FnMut() -> u8>(grid: &mut Grid, mut refill: F) {
    let size = grid.len();
    for col in 0..size {
        let mut write = size;
        for row in (0..size).rev() {
            if grid[row][col] != 0 {
                write -= 1;
                let symbol = grid[row][col];
                grid[row][col] = 0;
                grid[write][col] = symbol;
            }
        }
        for row in (0..write).rev() {
            grid[row][col] = refill();
        }
    }
}

/// Points for one level before the cascade bonus: group x 10 x combo multiplier.
pub fn level_points(combos: &[Combo]) -> i64 {
    combos
        .iter()
        .map(|c| c.symbol as i64 * 10 * combo_multiplier(c.cells.len()))
        .sum()
}

/// Money won by one level: points x base x bonus x stake / 100.
pub fn level_payout(points: i64, base_tenths: i64, level: u32, stake: i64) -> i64 {
    points * base_tenths * cascade_bonus_tenths(level) * stake / 10_000
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadeLevel {
    pub level: u32,
    pub combos: Vec<Combo>,
    pub cleared: usize,
    pub points: i64,
    pub bonus_tenths: i64,
    pub payout: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadesRound {
    pub board: Board,
    pub stake: i64,
    pub initial: Grid,
    pub levels: Vec<CascadeLevel>,
    #[serde(rename = "final")]
    pub final_grid: Grid,
    pub payout: i64,
}

pub fn play<R: Rng>(board: Board, stake: i64, rng: &mut R) -> Result<CascadesRound, GameError> {
    let config = board.config();
    validate_range(stake, config.min_bet, config.max_bet)?;

    let weights = WeightedIndex::new(SYMBOL_WEIGHTS)
        .map_err(|e| GameError::InvalidMove(e.to_string()))?;
    let mut draw = || weights.sample(rng) as u8 + 1;

    let mut grid: Grid = (0..config.size)
        .map(|_| (0..config.size).map(|_| draw()).collect())
        .collect();
    let initial = grid.clone();

    let mut levels = Vec::new();
    let mut level = 0;
    while level < MAX_LEVELS {
        let combos = find_combos(&grid);
        if combos.is_empty() {
            break;
        }
        level += 1;

        let points = level_points(&combos);
        let payout = level_payout(points, config.base_tenths, level, stake);
        let cleared = clear_combos(&mut grid, &combos);
        apply_gravity(&mut grid, &mut draw);

        levels.push(CascadeLevel {
            level,
            combos,
            cleared,
            points,
            bonus_tenths: cascade_bonus_tenths(level),
            payout,
        });
    }

    let payout = levels.iter().map(|l| l.payout).sum();
    Ok(CascadesRound {
        board,
        stake,
        initial,
        levels,
        final_grid: grid,
        payout,
    })
}

impl Wager for CascadesRound {
    fn game(&self) -> &'static str {
        "cascadas"
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

    fn grid(rows: &[&[u8]]) -> Grid {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_find_combos_in_all_directions() {
        let g = grid(&[
            &[1, 1, 1, 2, 3],
            &[4, 5, 6, 2, 7],
            &[8, 9, 5, 2, 1],
            &[3, 4, 6, 5, 8],
            &[9, 7, 3, 8, 5],
        ]);
        let combos = find_combos(&g);
        let found: Vec<(u8, Direction, usize)> = combos
            .iter()
            .map(|c| (c.symbol, c.direction, c.cells.len()))
            .collect();

        assert!(found.contains(&(1, Direction::Horizontal, 3)));
        assert!(found.contains(&(2, Direction::Vertical, 3)));
        assert!(found.contains(&(5, Direction::DiagonalDown, 4)));
        assert_eq!(combos.len(), 3);
    }

    #[test]
    fn test_diagonal_up_run() {
        let g = grid(&[&[0, 0, 4], &[0, 4, 0], &[4, 0, 0]]);
        let combos = find_combos(&g);
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].direction, Direction::DiagonalUp);
        assert_eq!(combos[0].cells, vec![(2, 0), (1, 1), (0, 2)]);
    }

    #[test]
    fn test_gravity_drops_and_refills() {
        let mut g = grid(&[&[1, 2], &[0, 3]]);
        apply_gravity(&mut g, || 9);
        assert_eq!(g, grid(&[&[9, 2], &[1, 3]]));
    }

    #[test]
    fn test_payout_arithmetic() {
        // Three 1s on the small board at stake 1000: 10 points x 1.0 x 1.0 x 1000 / 100.
        assert_eq!(level_payout(10, 10, 1, 1000), 100);
        // Same points on level 3 of the large board: 10 x 2.0 x 1.5 x 1000 / 100.
        assert_eq!(level_payout(10, 20, 3, 1000), 300);
        assert_eq!(combo_multiplier(5), 5);
        assert_eq!(cascade_bonus_tenths(9), 50);
    }

    #[test]
    fn test_play_settles_to_a_stable_board() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            let round = play(Board::Small, 1000, &mut rng).unwrap();
            assert!(find_combos(&round.final_grid).is_empty() || round.levels.len() as u32 == MAX_LEVELS);
            assert_eq!(round.payout, round.levels.iter().map(|l| l.payout).sum::<i64>());
        }
        assert!(play(Board::Large, 100, &mut rng).is_err());
    }
}
