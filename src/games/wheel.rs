use rand::Rng;
use serde::Serialize;

use super::Wager;

pub const SPIN_COST: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prize {
    Mega,
    Grand,
    Double,
    FreeSpin,
    Nothing,
}

/// Prize slots on the wheel, each slot equally likely.
const SLOTS: [(Prize, usize); 5] = [
    (Prize::Mega, 1),
    (Prize::Grand, 2),
    (Prize::Double, 4),
    (Prize::FreeSpin, 1),
    (Prize::Nothing, 31),
];

impl Prize {
    pub fn label(&self) -> &'static str {
        match self {
            Prize::Mega => "Mega Premio",
            Prize::Grand => "Gran Premio",
            Prize::Double => "Premio Doble",
            Prize::FreeSpin => "Giro Gratis",
            Prize::Nothing => "Sin Premio",
        }
    }

    pub fn multiplier(&self) -> i64 {
        match self {
            Prize::Mega => 10,
            Prize::Grand => 5,
            Prize::Double => 2,
            Prize::FreeSpin | Prize::Nothing => 0,
        }
    }
}

pub fn slot_count() -> usize {
    SLOTS.iter().map(|(_, n)| n).sum()
}

pub fn prize_at(mut index: usize) -> Prize {
    for (prize, count) in SLOTS {
        if index < count {
            return prize;
        }
        index -= count;
    }
    Prize::Nothing
}

#[derive(Debug, Clone, Serialize)]
pub struct WheelSpin {
    pub slot: usize,
    pub prize: Prize,
    pub label: &'static str,
    pub cost: i64,
    pub multiplier: i64,
    pub payout: i64,
}

pub fn spin<R: Rng>(rng: &mut R) -> WheelSpin {
    let slot = rng.gen_range(0..slot_count());
    let prize = prize_at(slot);
    // A free spin costs nothing and pays nothing.
    let cost = if prize == Prize::FreeSpin { 0 } else { SPIN_COST };

    WheelSpin {
        slot,
        prize,
        label: prize.label(),
        cost,
        multiplier: prize.multiplier(),
        payout: SPIN_COST * prize.multiplier(),
    }
}

impl Wager for WheelSpin {
    fn game(&self) -> &'static str {
        "ruleta"
    }

    fn stake(&self) -> i64 {
        self.cost
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
    fn test_wheel_layout() {
        assert_eq!(slot_count(), 39);
        assert_eq!(prize_at(0), Prize::Mega);
        assert_eq!(prize_at(1), Prize::Grand);
        assert_eq!(prize_at(2), Prize::Grand);
        assert_eq!(prize_at(3), Prize::Double);
        assert_eq!(prize_at(6), Prize::Double);
        assert_eq!(prize_at(7), Prize::FreeSpin);
        assert_eq!(prize_at(8), Prize::Nothing);
        assert_eq!(prize_at(38), Prize::Nothing);
    }

    #[test]
    fn test_free_spin_is_not_charged() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let spin = spin(&mut rng);
            match spin.prize {
                Prize::FreeSpin => assert_eq!((spin.cost, spin.payout), (0, 0)),
                Prize::Mega => assert_eq!(spin.payout, 5000),
                _ => assert_eq!(spin.cost, SPIN_COST),
            }
        }
    }
}
