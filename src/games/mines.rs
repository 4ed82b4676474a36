use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{validate_range, GameError, MAX_STAKE, Wager};

pub const MIN_STAKE: i64 = 100;
pub const SUGGESTED_STAKES: [i64; 6] = [100, 500, 1000, 2000, 5000, 10000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Facil,
    Medio,
    Dificil,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DifficultyConfig {
    pub size: usize,
    pub mines: usize,
    /// Per-cell multiplier in thousandths.
    pub base_milli: i64,
}

impl Difficulty {
    pub fn config(&self) -> DifficultyConfig {
        match self {
            Difficulty::Facil => DifficultyConfig {
                size: 5,
                mines: 5,
                base_milli: 1050,
            },
            Difficulty::Medio => DifficultyConfig {
                size: 6,
                mines: 10,
                base_milli: 1100,
            },
            Difficulty::Dificil => DifficultyConfig {
                size: 7,
                mines: 20,
                base_milli: 1150,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Playing,
    Won,
    Exploded,
    CashedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    mine: bool,
    open: bool,
    flagged: bool,
    adjacent: u8,
}

#[derive(Debug, Clone)]
pub struct Mines {
    pub stake: i64,
    pub difficulty: Difficulty,
    size: usize,
    mines: usize,
    base_milli: i64,
    cells: Vec<Cell>,
    pub opened: usize,
    pub status: Status,
    pub payout: i64,
}

/// Cell as shown to the player. Mines are only revealed once the game is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "adjacent")]
pub enum CellView {
    Hidden,
    Flagged,
    Open(u8),
    Mine,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinesView {
    pub stake: i64,
    pub difficulty: Difficulty,
    pub size: usize,
    pub mines: usize,
    pub flags: usize,
    pub opened: usize,
    pub status: Status,
    pub multiplier: f64,
    pub winnings: i64,
    pub payout: i64,
    pub board: Vec<Vec<CellView>>,
}

impl Mines {
    pub fn start<R: Rng>(stake: i64, difficulty: Difficulty, rng: &mut R) -> Result<Self, GameError> {
        validate_range(stake, MIN_STAKE, MAX_STAKE)?;

        let config = difficulty.config();
        let total = config.size * config.size;
        let mut cells = vec![Cell::default(); total];
        for position in index::sample(rng, total, config.mines) {
            cells[position].mine = true;
        }

        Ok(Self::with_cells(stake, difficulty, cells))
    }

    fn with_cells(stake: i64, difficulty: Difficulty, mut cells: Vec<Cell>) -> Self {
        let config = difficulty.config();
        let size = config.size;
        for row in 0..size {
            for col in 0..size {
                let adjacent = neighbours(size, row, col)
                    .filter(|(r, c)| cells[r * size + c].mine)
                    .count() as u8;
                cells[row * size + col].adjacent = adjacent;
            }
        }

        Mines {
            stake,
            difficulty,
            size,
            mines: cells.iter().filter(|c| c.mine).count(),
            base_milli: config.base_milli,
            cells,
            opened: 0,
            status: Status::Playing,
            payout: 0,
        }
    }

    pub fn multiplier_milli(&self) -> i64 {
        1000 + self.opened as i64 * (self.base_milli - 1000)
    }

    /// What cashing out now would pay.
    pub fn winnings(&self) -> i64 {
        self.stake * self.multiplier_milli() / 1000
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, GameError> {
        if row < self.size && col < self.size {
            Ok(row * self.size + col)
        } else {
            Err(GameError::InvalidMove(format!(
                "cell ({}, {}) is off the board",
                row, col
            )))
        }
    }

    fn ensure_playing(&self) -> Result<(), GameError> {
        if self.status == Status::Playing {
            Ok(())
        } else {
            Err(GameError::Finished)
        }
    }

    /// Opens a cell. Returns true once the game is over.
    pub fn open(&mut self, row: usize, col: usize) -> Result<bool, GameError> {
        self.ensure_playing()?;
        let idx = self.index(row, col)?;
        let cell = self.cells[idx];
        if cell.open {
            return Err(GameError::InvalidMove("cell already open".to_string()));
        }
        if cell.flagged {
            return Err(GameError::InvalidMove("cell is flagged".to_string()));
        }

        if cell.mine {
            self.cells[idx].open = true;
            self.status = Status::Exploded;
            self.payout = 0;
            return Ok(true);
        }

        // Flood fill across cells with no adjacent mines.
        let mut pending = vec![(row, col)];
        while let Some((r, c)) = pending.pop() {
            let i = r * self.size + c;
            let cell = self.cells[i];
            if cell.open || cell.flagged || cell.mine {
                continue;
            }
            self.cells[i].open = true;
            self.opened += 1;
            if cell.adjacent == 0 {
                pending.extend(neighbours(self.size, r, c));
            }
        }

        if self.opened == self.size * self.size - self.mines {
            self.status = Status::Won;
            self.payout = self.winnings();
            return Ok(true);
        }
        Ok(false)
    }

    /// Toggles a flag and returns whether the cell is now flagged.
    pub fn toggle_flag(&mut self, row: usize, col: usize) -> Result<bool, GameError> {
        self.ensure_playing()?;
        let idx = self.index(row, col)?;
        if self.cells[idx].open {
            return Err(GameError::InvalidMove("cell already open".to_string()));
        }
        self.cells[idx].flagged = !self.cells[idx].flagged;
        Ok(self.cells[idx].flagged)
    }

    pub fn cash_out(&mut self) -> Result<(), GameError> {
        self.ensure_playing()?;
        self.status = Status::CashedOut;
        self.payout = self.winnings();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), GameError> {
        self.ensure_playing()?;
        self.status = Status::Cancelled;
        self.payout = 0;
        Ok(())
    }

    pub fn view(&self) -> MinesView {
        let over = self.status != Status::Playing;
        let board = self
            .cells
            .chunks(self.size)
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        c if c.mine && (c.open || over) => CellView::Mine,
                        c if c.open => CellView::Open(c.adjacent),
                        c if c.flagged => CellView::Flagged,
                        _ => CellView::Hidden,
                    })
                    .collect()
            })
            .collect();

        MinesView {
            stake: self.stake,
            difficulty: self.difficulty,
            size: self.size,
            mines: self.mines,
            flags: self.cells.iter().filter(|c| c.flagged).count(),
            opened: self.opened,
            status: self.status,
            multiplier: self.multiplier_milli() as f64 / 1000.0,
            winnings: if self.status == Status::Exploded { 0 } else { self.winnings() },
            payout: self.payout,
            board,
        }
    }
}

fn neighbours(size: usize, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> {
    let rows = row.saturating_sub(1)..=(row + 1).min(size - 1);
    rows.flat_map(move |r| {
        let cols = col.saturating_sub(1)..=(col + 1).min(size - 1);
        cols.map(move |c| (r, c))
    })
    .filter(move |&(r, c)| (r, c) != (row, col))
}

impl Wager for Mines {
    fn game(&self) -> &'static str {
        "minas"
    }

    fn stake(&self) -> i64 {
        self.stake
    }

    fn payout(&self) -> i64 {
        self.payout
    }
}

impl Serialize for Mines {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.view().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    /// 5x5 board with mines down the right-hand column.
    fn right_column_board() -> Mines {
        let mut cells = vec![Cell::default(); 25];
        for row in 0..5 {
            cells[row * 5 + 4].mine = true;
        }
        Mines::with_cells(1000, Difficulty::Facil, cells)
    }

    #[test]
    fn test_start_places_mines() {
        let mut rng = StdRng::seed_from_u64(10);
        let game = Mines::start(100, Difficulty::Dificil, &mut rng).unwrap();
        assert_eq!(game.mines, 20);
        assert_eq!(game.size, 7);
        assert!(Mines::start(99, Difficulty::Facil, &mut rng).is_err());
        assert!(matches!(
            Mines::start(i64::MAX, Difficulty::Facil, &mut rng),
            Err(GameError::InvalidStake(_))
        ));
    }

    #[test]
    fn test_adjacent_counts() {
        let game = right_column_board();
        assert_eq!(game.cells[3].adjacent, 2);
        assert_eq!(game.cells[5 + 3].adjacent, 3);
        assert_eq!(game.cells[2].adjacent, 0);
    }

    #[test]
    fn test_flood_fill_opens_safe_region() {
        let mut game = right_column_board();
        // Top-left has no adjacent mines, so the whole left block opens.
        assert!(game.open(0, 0).unwrap());
        assert_eq!(game.opened, 20);
        assert_eq!(game.status, Status::Won);
        // 1 + 20 x 0.05 = 2.0x
        assert_eq!(game.payout, 2000);
    }

    #[test]
    fn test_single_cell_and_cash_out() {
        let mut game = right_column_board();
        assert!(!game.open(0, 3).unwrap());
        assert_eq!(game.opened, 1);
        assert_eq!(game.winnings(), 1050);
        assert!(game.open(0, 3).is_err());

        game.cash_out().unwrap();
        assert_eq!(game.status, Status::CashedOut);
        assert_eq!(game.payout, 1050);
        assert_eq!(game.cash_out(), Err(GameError::Finished));
    }

    #[test]
    fn test_mine_ends_the_game() {
        let mut game = right_column_board();
        assert!(game.open(2, 4).unwrap());
        assert_eq!(game.status, Status::Exploded);
        assert_eq!(game.payout, 0);
        assert_eq!(game.view().board[0][4], CellView::Mine);
    }

    #[test]
    fn test_flags_block_opening() {
        let mut game = right_column_board();
        assert!(game.toggle_flag(1, 1).unwrap());
        assert!(game.open(1, 1).is_err());
        assert_eq!(game.view().board[1][1], CellView::Flagged);
        assert!(!game.toggle_flag(1, 1).unwrap());
        assert!(game.toggle_flag(9, 9).is_err());
    }

    #[test]
    fn test_cancel_forfeits() {
        let mut game = right_column_board();
        game.cancel().unwrap();
        assert_eq!(game.status, Status::Cancelled);
        assert_eq!(game.payout, 0);
    }
}
