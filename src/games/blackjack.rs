use rand::Rng;
use serde::Serialize;

use super::cards::{self, Card, CardView, ACE};
use super::{validate_allowed, GameError, Wager, STANDARD_STAKES};

const DEALER_STANDS_ON: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    PlayerBust,
    DealerBust,
    Blackjack,
    DealerBlackjack,
    Win,
    Push,
    Loss,
}

pub fn card_value(card: Card) -> u8 {
    match cards::rank(card) {
        ACE => 11,
        r if r >= 8 => 10,
        r => r + 2,
    }
}

/// Best total, counting aces as 1 where 11 would bust.
pub fn hand_value(hand: &[Card]) -> u8 {
    let mut value: u8 = hand.iter().map(|c| card_value(*c)).sum();
    let mut aces = hand.iter().filter(|c| cards::rank(**c) == ACE).count();
    while value > 21 && aces > 0 {
        value -= 10;
        aces -= 1;
    }
    value
}

pub fn is_blackjack(hand: &[Card]) -> bool {
    hand.len() == 2 && hand_value(hand) == 21
}

/// Outcome and total returned for a stake once both hands are final.
pub fn settle(stake: i64, player: &[Card], dealer: &[Card]) -> (Outcome, i64) {
    let player_value = hand_value(player);
    let dealer_value = hand_value(dealer);
    let player_bj = is_blackjack(player);
    let dealer_bj = is_blackjack(dealer);
    let three_to_two = stake * 5 / 2;

    if player_value > 21 {
        (Outcome::PlayerBust, 0)
    } else if dealer_value > 21 {
        (Outcome::DealerBust, if player_bj { three_to_two } else { stake * 2 })
    } else if player_bj && dealer_bj {
        (Outcome::Push, stake)
    } else if player_bj {
        (Outcome::Blackjack, three_to_two)
    } else if dealer_bj {
        (Outcome::DealerBlackjack, 0)
    } else if player_value > dealer_value {
        (Outcome::Win, stake * 2)
    } else if player_value == dealer_value {
        (Outcome::Push, stake)
    } else {
        (Outcome::Loss, 0)
    }
}

#[derive(Debug, Clone)]
pub struct Blackjack {
    pub stake: i64,
    deck: Vec<Card>,
    pub player: Vec<Card>,
    pub dealer: Vec<Card>,
    pub stage: Stage,
    pub outcome: Option<Outcome>,
    pub payout: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlackjackView {
    pub stake: i64,
    pub player: Vec<CardView>,
    pub dealer: Vec<CardView>,
    pub player_score: u8,
    pub dealer_score: u8,
    pub player_blackjack: bool,
    pub stage: Stage,
    pub outcome: Option<Outcome>,
    pub payout: i64,
}

impl Blackjack {
    pub fn deal<R: Rng>(stake: i64, rng: &mut R) -> Result<Self, GameError> {
        validate_allowed(stake, &STANDARD_STAKES)?;

        let mut game = Blackjack {
            stake,
            deck: cards::shuffled_deck(rng),
            player: Vec::new(),
            dealer: Vec::new(),
            stage: Stage::Playing,
            outcome: None,
            payout: 0,
        };
        for _ in 0..2 {
            let card = game.draw()?;
            game.player.push(card);
            let card = game.draw()?;
            game.dealer.push(card);
        }
        Ok(game)
    }

    fn draw(&mut self) -> Result<Card, GameError> {
        self.deck
            .pop()
            .ok_or_else(|| GameError::InvalidMove("deck exhausted".to_string()))
    }

    fn ensure_playing(&self) -> Result<(), GameError> {
        match self.stage {
            Stage::Playing => Ok(()),
            Stage::Finished => Err(GameError::Finished),
        }
    }

    fn finish(&mut self, outcome: Outcome, payout: i64) {
        self.stage = Stage::Finished;
        self.outcome = Some(outcome);
        self.payout = payout;
    }

    pub fn hit(&mut self) -> Result<(), GameError> {
        self.ensure_playing()?;

        let card = self.draw()?;
        self.player.push(card);
        if hand_value(&self.player) > 21 {
            self.finish(Outcome::PlayerBust, 0);
        }
        Ok(())
    }

    pub fn stand(&mut self) -> Result<(), GameError> {
        self.ensure_playing()?;

        while hand_value(&self.dealer) < DEALER_STANDS_ON {
            let card = self.draw()?;
            self.dealer.push(card);
        }
        let (outcome, payout) = settle(self.stake, &self.player, &self.dealer);
        self.finish(outcome, payout);
        Ok(())
    }

    /// The dealer's hole card stays hidden while the hand is in play.
    pub fn view(&self) -> BlackjackView {
        let (dealer, dealer_score) = match self.stage {
            Stage::Playing => (
                cards::view(&self.dealer[..1]),
                hand_value(&self.dealer[..1]),
            ),
            Stage::Finished => (cards::view(&self.dealer), hand_value(&self.dealer)),
        };

        BlackjackView {
            stake: self.stake,
            player: cards::view(&self.player),
            dealer,
            player_score: hand_value(&self.player),
            dealer_score,
            player_blackjack: is_blackjack(&self.player),
            stage: self.stage,
            outcome: self.outcome,
            payout: self.payout,
        }
    }
}

impl Wager for Blackjack {
    fn game(&self) -> &'static str {
        "blackjack"
    }

    fn stake(&self) -> i64 {
        self.stake
    }

    fn payout(&self) -> i64 {
        self.payout
    }
}

impl Serialize for Blackjack {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.view().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    // Spades: rank 0 is a two, 8 a ten, 12 an ace.
    const TWO: Card = 0;
    const FIVE: Card = 3;
    const SEVEN: Card = 5;
    const NINE: Card = 7;
    const TEN: Card = 8;
    const KING: Card = 11;
    const ACE_CARD: Card = 12;

    #[test]
    fn test_hand_value_with_aces() {
        assert_eq!(hand_value(&[ACE_CARD, KING]), 21);
        assert_eq!(hand_value(&[ACE_CARD, ACE_CARD]), 12);
        assert_eq!(hand_value(&[ACE_CARD, NINE, FIVE]), 15);
        assert_eq!(hand_value(&[TEN, SEVEN, FIVE]), 22);
        assert!(is_blackjack(&[KING, ACE_CARD]));
        assert!(!is_blackjack(&[SEVEN, FIVE, NINE]));
    }

    #[test]
    fn test_settle_payouts() {
        let stake = 1000;
        assert_eq!(
            settle(stake, &[TEN, NINE], &[TEN, SEVEN, FIVE]),
            (Outcome::DealerBust, 2000)
        );
        assert_eq!(
            settle(stake, &[ACE_CARD, KING], &[TEN, SEVEN, FIVE]),
            (Outcome::DealerBust, 2500)
        );
        assert_eq!(
            settle(stake, &[ACE_CARD, KING], &[ACE_CARD, TEN]),
            (Outcome::Push, 1000)
        );
        assert_eq!(
            settle(stake, &[ACE_CARD, KING], &[TEN, NINE]),
            (Outcome::Blackjack, 2500)
        );
        assert_eq!(
            settle(stake, &[TEN, FIVE, TWO, TWO, TWO], &[ACE_CARD, TEN]),
            (Outcome::DealerBlackjack, 0)
        );
        assert_eq!(settle(stake, &[TEN, NINE], &[TEN, SEVEN]), (Outcome::Win, 2000));
        assert_eq!(settle(stake, &[TEN, SEVEN], &[TEN, SEVEN]), (Outcome::Push, 1000));
        assert_eq!(settle(stake, &[TEN, SEVEN], &[TEN, NINE]), (Outcome::Loss, 0));
    }

    #[test]
    fn test_stand_finishes_and_dealer_reaches_seventeen() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..50 {
            let mut game = Blackjack::deal(500, &mut rng).unwrap();
            assert_eq!(game.view().dealer.len(), 1);
            game.stand().unwrap();
            assert_eq!(game.stage, Stage::Finished);
            assert!(hand_value(&game.dealer) >= 17);
            assert_eq!(game.stand(), Err(GameError::Finished));
            assert_eq!(game.hit(), Err(GameError::Finished));
        }
    }

    #[test]
    fn test_hit_until_bust() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut game = Blackjack::deal(100, &mut rng).unwrap();
        while game.stage == Stage::Playing {
            game.hit().unwrap();
        }
        assert_eq!(game.outcome, Some(Outcome::PlayerBust));
        assert_eq!(game.payout, 0);
    }

    #[test]
    fn test_deal_rejects_unlisted_stake() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!(Blackjack::deal(150, &mut rng).is_err());
    }
}
