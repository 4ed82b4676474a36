//! Single-zero roulette with several bets settled on one spin.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{GameError, Wager, MAX_STAKE};

pub const MIN_BET: i64 = 10;
pub const MAX_BET: i64 = MAX_STAKE;
pub const STRAIGHT_MULTIPLIER: i64 = 35;
pub const EVEN_MONEY_MULTIPLIER: i64 = 2;

const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Verde,
    Rojo,
    Negro,
}

pub fn color(number: u8) -> Color {
    if number == 0 {
        Color::Verde
    } else if RED_NUMBERS.contains(&number) {
        Color::Rojo
    } else {
        Color::Negro
    }
}

/// 1, 2 or 3; 0 for zero.
pub fn dozen(number: u8) -> u8 {
    if number == 0 {
        0
    } else {
        (number - 1) / 12 + 1
    }
}

/// 1, 2 or 3; 0 for zero.
pub fn column(number: u8) -> u8 {
    if number == 0 {
        0
    } else {
        (number - 1) % 3 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tipo", content = "valor", rename_all = "snake_case")]
pub enum BetKind {
    NumeroPleno(u8),
    Docena(u8),
    Columna(u8),
    /// `true` for red.
    RojoNegro(bool),
    /// `true` for even.
    ParImpar(bool),
    /// `true` for low (1-18).
    BajoAlto(bool),
}

/// A bet as it arrives on the wire, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct BetRequest {
    pub tipo: String,
    pub valor: serde_json::Value,
    pub monto: i64,
}

fn number_value(value: &serde_json::Value) -> Option<u8> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn choice_value(value: &serde_json::Value) -> Option<&str> {
    value.as_str().map(|s| s.trim())
}

impl TryFrom<&BetRequest> for BetKind {
    type Error = GameError;

    fn try_from(bet: &BetRequest) -> Result<Self, Self::Error> {
        let invalid = || GameError::InvalidChoice(format!("invalid value for {}", bet.tipo));
        let kind = match bet.tipo.as_str() {
            "numero_pleno" => match number_value(&bet.valor) {
                Some(n) if n <= 36 => BetKind::NumeroPleno(n),
                _ => return Err(invalid()),
            },
            "docena" => match number_value(&bet.valor) {
                Some(n @ 1..=3) => BetKind::Docena(n),
                _ => return Err(invalid()),
            },
            "columna" => match number_value(&bet.valor) {
                Some(n @ 1..=3) => BetKind::Columna(n),
                _ => return Err(invalid()),
            },
            "rojo_negro" => match choice_value(&bet.valor) {
                Some("rojo") => BetKind::RojoNegro(true),
                Some("negro") => BetKind::RojoNegro(false),
                _ => return Err(invalid()),
            },
            "par_impar" => match choice_value(&bet.valor) {
                Some("par") => BetKind::ParImpar(true),
                Some("impar") => BetKind::ParImpar(false),
                _ => return Err(invalid()),
            },
            "bajo_alto" => match choice_value(&bet.valor) {
                Some("bajo") => BetKind::BajoAlto(true),
                Some("alto") => BetKind::BajoAlto(false),
                _ => return Err(invalid()),
            },
            other => {
                return Err(GameError::InvalidChoice(format!(
                    "unknown bet type: {}",
                    other
                )))
            }
        };
        Ok(kind)
    }
}

impl BetKind {
    pub fn wins(&self, number: u8) -> bool {
        // Zero only pays a straight bet on zero.
        if number == 0 {
            return *self == BetKind::NumeroPleno(0);
        }
        match *self {
            BetKind::NumeroPleno(n) => n == number,
            BetKind::Docena(d) => dozen(number) == d,
            BetKind::Columna(c) => column(number) == c,
            BetKind::RojoNegro(red) => (color(number) == Color::Rojo) == red,
            BetKind::ParImpar(even) => (number % 2 == 0) == even,
            BetKind::BajoAlto(low) => (number <= 18) == low,
        }
    }

    pub fn multiplier(&self) -> i64 {
        match self {
            BetKind::NumeroPleno(_) => STRAIGHT_MULTIPLIER,
            _ => EVEN_MONEY_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettledBet {
    pub bet: BetKind,
    pub amount: i64,
    pub won: bool,
    pub payout: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouletteRound {
    pub number: u8,
    pub color: Color,
    pub even: Option<bool>,
    pub low: Option<bool>,
    pub dozen: u8,
    pub column: u8,
    pub winning: Vec<SettledBet>,
    pub losing: Vec<SettledBet>,
    pub stake: i64,
    pub payout: i64,
}

pub fn validate(bets: &[BetRequest]) -> Result<Vec<(BetKind, i64)>, GameError> {
    if bets.is_empty() {
        return Err(GameError::InvalidChoice(
            "at least one bet is required".to_string(),
        ));
    }

    let validated = bets
        .iter()
        .map(|bet| {
            if !(MIN_BET..=MAX_BET).contains(&bet.monto) {
                return Err(GameError::InvalidStake(format!(
                    "bets on {} must be between {} and {}",
                    bet.tipo, MIN_BET, MAX_BET
                )));
            }
            Ok((BetKind::try_from(bet)?, bet.monto))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // The whole spin, including a straight-bet win, must fit in an i64.
    validated
        .iter()
        .try_fold(0i64, |total, (kind, amount)| {
            amount
                .checked_mul(kind.multiplier())
                .and_then(|_| total.checked_add(*amount))
        })
        .ok_or_else(|| GameError::InvalidStake("total bet is too large".to_string()))?;

    Ok(validated)
}

pub fn settle(bets: &[(BetKind, i64)], number: u8) -> RouletteRound {
    let mut winning = Vec::new();
    let mut losing = Vec::new();

    for (kind, amount) in bets {
        let won = kind.wins(number);
        let settled = SettledBet {
            bet: *kind,
            amount: *amount,
            won,
            payout: if won { amount * kind.multiplier() } else { 0 },
        };
        if won {
            winning.push(settled);
        } else {
            losing.push(settled);
        }
    }

    RouletteRound {
        number,
        color: color(number),
        even: (number != 0).then_some(number % 2 == 0),
        low: (number != 0).then_some(number <= 18),
        dozen: dozen(number),
        column: column(number),
        stake: bets.iter().map(|(_, amount)| amount).sum(),
        payout: winning.iter().map(|b| b.payout).sum(),
        winning,
        losing,
    }
}

pub fn play<R: Rng>(bets: &[BetRequest], rng: &mut R) -> Result<RouletteRound, GameError> {
    let bets = validate(bets)?;
    Ok(settle(&bets, rng.gen_range(0..=36)))
}

/// Probability and multiplier per bet type.
pub fn probabilities() -> Vec<(&'static str, f64, i64)> {
    vec![
        ("numero_pleno", 1.0 / 37.0, STRAIGHT_MULTIPLIER),
        ("docena", 12.0 / 37.0, EVEN_MONEY_MULTIPLIER),
        ("columna", 12.0 / 37.0, EVEN_MONEY_MULTIPLIER),
        ("rojo_negro", 18.0 / 37.0, EVEN_MONEY_MULTIPLIER),
        ("par_impar", 18.0 / 37.0, EVEN_MONEY_MULTIPLIER),
        ("bajo_alto", 18.0 / 37.0, EVEN_MONEY_MULTIPLIER),
    ]
}

impl Wager for RouletteRound {
    fn game(&self) -> &'static str {
        "ruleta_europea"
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
    use serde_json::json;

    fn bet(tipo: &str, valor: serde_json::Value, monto: i64) -> BetRequest {
        BetRequest {
            tipo: tipo.to_string(),
            valor,
            monto,
        }
    }

    #[test]
    fn test_board_layout() {
        assert_eq!(color(0), Color::Verde);
        assert_eq!(color(1), Color::Rojo);
        assert_eq!(color(2), Color::Negro);
        assert_eq!(color(36), Color::Rojo);
        assert_eq!(dozen(12), 1);
        assert_eq!(dozen(13), 2);
        assert_eq!(dozen(36), 3);
        assert_eq!(column(1), 1);
        assert_eq!(column(35), 2);
        assert_eq!(column(36), 3);
    }

    #[test]
    fn test_bet_wins() {
        assert!(BetKind::NumeroPleno(17).wins(17));
        assert!(!BetKind::NumeroPleno(17).wins(18));
        assert!(BetKind::RojoNegro(true).wins(3));
        assert!(BetKind::RojoNegro(false).wins(4));
        assert!(BetKind::ParImpar(true).wins(4));
        assert!(BetKind::BajoAlto(false).wins(19));
        assert!(BetKind::Columna(3).wins(33));
    }

    #[test]
    fn test_zero_only_pays_straight_zero() {
        assert!(BetKind::NumeroPleno(0).wins(0));
        assert!(!BetKind::ParImpar(true).wins(0));
        assert!(!BetKind::BajoAlto(true).wins(0));
        assert!(!BetKind::Docena(1).wins(0));
        assert!(!BetKind::RojoNegro(false).wins(0));
    }

    #[test]
    fn test_validate_rejects_bad_bets() {
        assert!(validate(&[]).is_err());
        assert!(validate(&[bet("numero_pleno", json!(37), 100)]).is_err());
        assert!(validate(&[bet("docena", json!(0), 100)]).is_err());
        assert!(validate(&[bet("rojo_negro", json!("verde"), 100)]).is_err());
        assert!(validate(&[bet("par_impar", json!("par"), 9)]).is_err());
        assert!(validate(&[bet("split", json!(1), 100)]).is_err());
    }

    #[test]
    fn test_huge_bets_are_refused() {
        let huge = i64::MAX - 500_000_000_000 + 1;
        let bets = [
            bet("numero_pleno", json!(1), huge),
            bet("numero_pleno", json!(2), huge),
        ];
        assert!(matches!(validate(&bets), Err(GameError::InvalidStake(_))));
        assert!(validate(&[bet("rojo_negro", json!("rojo"), MAX_BET + 1)]).is_err());

        let bets = validate(&[
            bet("numero_pleno", json!(1), MAX_BET),
            bet("numero_pleno", json!(2), MAX_BET),
        ])
        .unwrap();
        let round = settle(&bets, 20);
        assert_eq!(round.stake, 2 * MAX_BET);
        assert_eq!(round.payout, 0);
    }

    #[test]
    fn test_settle_multiple_bets() {
        let bets = validate(&[
            bet("numero_pleno", json!(7), 100),
            bet("rojo_negro", json!("rojo"), 50),
            bet("docena", json!("3"), 20),
        ])
        .unwrap();

        let round = settle(&bets, 7);
        assert_eq!(round.stake, 170);
        assert_eq!(round.payout, 100 * 35 + 50 * 2);
        assert_eq!(round.winning.len(), 2);
        assert_eq!(round.losing.len(), 1);
        assert_eq!(round.color, Color::Rojo);
        assert_eq!(round.even, Some(false));
        assert_eq!(round.low, Some(true));
    }
}
