//! Crash game. Multipliers are kept in hundredths (`150` is 1.50x).

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use super::{validate_allowed, GameError, Wager, STANDARD_STAKES};

pub const MIN_AUTO_CASHOUT: u32 = 110;
pub const MAX_MULTIPLIER: u32 = 50_000;

/// Upper bound of each crash bracket and its likelihood in tenths of a percent.
pub const CRASH_BRACKETS: [(u32, u32); 10] = [
    (100, 300),
    (150, 300),
    (1_000, 200),
    (5_000, 100),
    (10_000, 50),
    (20_000, 30),
    (25_000, 10),
    (30_000, 5),
    (40_000, 4),
    (50_000, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlightState {
    #[serde(rename = "vuelo")]
    Flying,
    #[serde(rename = "cashout")]
    CashedOut,
    #[serde(rename = "explosion")]
    Exploded,
}

pub fn as_multiplier(hundredths: u32) -> f64 {
    hundredths as f64 / 100.0
}

/// Crash point for a draw `roll` in `0..1000` and a shaping value `u` in `[0, 1)`.
pub fn crash_point(roll: u32, u: f64) -> u32 {
    let mut cumulative = 0;
    let mut floor = 100;
    for (index, (cap, weight)) in CRASH_BRACKETS.iter().enumerate() {
        cumulative += weight;
        if roll < cumulative {
            if index == 0 {
                return 100;
            }
            // Squaring u leans toward the low end of the bracket.
            let span = (cap - floor) as f64;
            return floor + (span * u * u).round() as u32;
        }
        floor = *cap;
    }
    MAX_MULTIPLIER
}

/// Flight length for a crash point, in milliseconds.
pub fn flight_duration_ms(crash: u32) -> u64 {
    if crash <= 100 {
        return 500;
    }
    if crash <= 150 {
        return 500 + (crash as u64 - 100) * 10;
    }
    let seconds = 1.0 + (crash as f64 - 150.0) / 100.0 * 59.0 / 498.5;
    let tenths = (seconds * 10.0).round().clamp(10.0, 600.0);
    tenths as u64 * 100
}

/// Share of the climb covered after `t` of the flight: quick at first, then easing off.
pub fn progress(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.7 {
        1.0 - (1.0 - t).powi(2)
    } else {
        0.91 + ((t - 0.7) / 0.3) * 0.09
    }
}

pub fn color(crash: u32) -> &'static str {
    match crash {
        0..=150 => "red",
        151..=300 => "orange",
        301..=1000 => "yellow",
        _ => "green",
    }
}

#[derive(Debug, Clone)]
pub struct Aviator {
    pub stake: i64,
    pub crash: u32,
    pub duration_ms: u64,
    pub auto_cashout: Option<u32>,
    pub state: FlightState,
    pub cashed_at: Option<u32>,
    pub payout: i64,
    last_multiplier: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AviatorView {
    pub stake: i64,
    pub state: FlightState,
    pub current_multiplier: f64,
    /// Only revealed once the flight is over.
    pub crash_multiplier: Option<f64>,
    pub cashout_multiplier: Option<f64>,
    pub auto_cashout: Option<f64>,
    pub duration_ms: u64,
    pub payout: i64,
}

impl Aviator {
    pub fn launch<R: Rng>(stake: i64, rng: &mut R) -> Result<Self, GameError> {
        validate_allowed(stake, &STANDARD_STAKES)?;

        let crash = crash_point(rng.gen_range(0..1000), rng.gen::<f64>());
        Ok(Aviator {
            stake,
            crash,
            duration_ms: flight_duration_ms(crash),
            auto_cashout: None,
            state: FlightState::Flying,
            cashed_at: None,
            payout: 0,
            last_multiplier: 100,
        })
    }

    pub fn multiplier_at(&self, elapsed: Duration) -> u32 {
        let t = elapsed.as_millis() as f64 / self.duration_ms as f64;
        let climb = (self.crash - 100) as f64 * progress(t);
        100 + climb.round() as u32
    }

    fn ensure_flying(&self) -> Result<(), GameError> {
        match self.state {
            FlightState::Flying => Ok(()),
            _ => Err(GameError::Finished),
        }
    }

    pub fn configure_auto_cashout(&mut self, target: u32, enabled: bool) -> Result<(), GameError> {
        self.ensure_flying()?;
        if !enabled {
            self.auto_cashout = None;
            return Ok(());
        }
        if !(MIN_AUTO_CASHOUT..=MAX_MULTIPLIER).contains(&target) {
            return Err(GameError::InvalidChoice(format!(
                "auto cash-out must be between {:.2}x and {:.2}x",
                as_multiplier(MIN_AUTO_CASHOUT),
                as_multiplier(MAX_MULTIPLIER)
            )));
        }
        self.auto_cashout = Some(target);
        Ok(())
    }

    fn cash_at(&mut self, multiplier: u32) {
        self.state = FlightState::CashedOut;
        self.cashed_at = Some(multiplier);
        self.payout = self.stake * multiplier as i64 / 100;
    }

    /// Moves the flight forward to `elapsed`. Returns true once it is over.
    ///
    /// An auto cash-out below the crash point always wins, even when the
    /// poll arrives after the crash, since the curve passed the target first.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        if self.state != FlightState::Flying {
            return true;
        }

        let current = self.multiplier_at(elapsed);
        self.last_multiplier = current;
        let auto_cashout = self.auto_cashout;
        match auto_cashout {
            Some(target) if target < self.crash && current >= target => self.cash_at(target),
            _ if current >= self.crash => self.state = FlightState::Exploded,
            _ => {}
        }
        self.state != FlightState::Flying
    }

    /// Cashes out at the server-side multiplier for `elapsed`.
    pub fn cash_out(&mut self, elapsed: Duration) -> Result<(), GameError> {
        self.ensure_flying()?;
        if !self.advance(elapsed) {
            let current = self.last_multiplier;
            self.cash_at(current);
        }
        Ok(())
    }

    pub fn view(&self) -> AviatorView {
        let over = self.state != FlightState::Flying;
        AviatorView {
            stake: self.stake,
            state: self.state,
            current_multiplier: as_multiplier(self.last_multiplier),
            crash_multiplier: over.then(|| as_multiplier(self.crash)),
            cashout_multiplier: self.cashed_at.map(as_multiplier),
            auto_cashout: self.auto_cashout.map(as_multiplier),
            duration_ms: self.duration_ms,
            payout: self.payout,
        }
    }
}

impl Wager for Aviator {
    fn game(&self) -> &'static str {
        "aviator"
    }

    fn stake(&self) -> i64 {
        self.stake
    }

    fn payout(&self) -> i64 {
        self.payout
    }
}

impl Serialize for Aviator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Settled<'a> {
            #[serde(flatten)]
            view: AviatorView,
            crash: u32,
            color: &'a str,
        }

        Settled {
            view: self.view(),
            crash: self.crash,
            color: color(self.crash),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn flight(crash: u32) -> Aviator {
        Aviator {
            stake: 1000,
            crash,
            duration_ms: flight_duration_ms(crash),
            auto_cashout: None,
            state: FlightState::Flying,
            cashed_at: None,
            payout: 0,
            last_multiplier: 100,
        }
    }

    #[test]
    fn test_crash_point_brackets() {
        assert_eq!(crash_point(0, 0.9), 100);
        assert_eq!(crash_point(299, 0.9), 100);
        assert_eq!(crash_point(300, 0.0), 100);
        assert_eq!(crash_point(300, 0.5), 113);
        assert_eq!(crash_point(600, 0.0), 150);
        assert_eq!(crash_point(999, 0.0), 40_000);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let crash = crash_point(rng.gen_range(0..1000), rng.gen());
            assert!((100..=MAX_MULTIPLIER).contains(&crash));
        }
    }

    #[test]
    fn test_flight_duration() {
        assert_eq!(flight_duration_ms(100), 500);
        assert_eq!(flight_duration_ms(120), 700);
        assert_eq!(flight_duration_ms(150), 1000);
        assert_eq!(flight_duration_ms(50_000), 60_000);
        assert_eq!(flight_duration_ms(1_000), 2000);
    }

    #[test]
    fn test_progress_curve() {
        assert_eq!(progress(0.0), 0.0);
        assert!((progress(0.5) - 0.75).abs() < 1e-9);
        assert!((progress(0.7) - 0.91).abs() < 1e-9);
        assert!((progress(1.0) - 1.0).abs() < 1e-9);
        assert!((progress(4.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cash_out_before_crash_pays() {
        let mut game = flight(1_000);
        let half = Duration::from_millis(game.duration_ms / 2);
        game.cash_out(half).unwrap();

        assert_eq!(game.state, FlightState::CashedOut);
        // Halfway through the flight the climb is 75% of the way to 10x.
        assert_eq!(game.cashed_at, Some(775));
        assert_eq!(game.payout, 7750);
        assert_eq!(game.cash_out(half), Err(GameError::Finished));
    }

    #[test]
    fn test_cash_out_after_crash_loses() {
        let mut game = flight(300);
        game.cash_out(Duration::from_secs(120)).unwrap();
        assert_eq!(game.state, FlightState::Exploded);
        assert_eq!(game.payout, 0);
    }

    #[test]
    fn test_instant_crash_cannot_be_cashed() {
        let mut game = flight(100);
        game.cash_out(Duration::ZERO).unwrap();
        assert_eq!(game.state, FlightState::Exploded);
    }

    #[test]
    fn test_auto_cashout_wins_on_late_poll() {
        let mut game = flight(500);
        game.configure_auto_cashout(200, true).unwrap();
        assert!(game.advance(Duration::from_secs(600)));
        assert_eq!(game.state, FlightState::CashedOut);
        assert_eq!(game.payout, 2000);
    }

    #[test]
    fn test_auto_cashout_validation() {
        let mut game = flight(500);
        assert!(game.configure_auto_cashout(105, true).is_err());
        assert!(game.configure_auto_cashout(50_001, true).is_err());
        game.configure_auto_cashout(250, true).unwrap();
        game.configure_auto_cashout(0, false).unwrap();
        assert_eq!(game.auto_cashout, None);
    }

    #[test]
    fn test_history_colors() {
        assert_eq!(color(150), "red");
        assert_eq!(color(250), "orange");
        assert_eq!(color(1_000), "yellow");
        assert_eq!(color(1_001), "green");
    }
}
