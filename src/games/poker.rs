//! Heads-up hold'em against the house.
//!
//! The player sits with the buy-in and the house with twice that. The
//! house posts the big blind and answers every player action. When the
//! hand ends the player gets back the remaining stack plus any share of
//! the pot, so a hand always settles as `balance - buy_in + payout`.

use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::cards::{self, Card, CardView};
use super::{validate_allowed, GameError, Wager};

pub const BUY_INS: [i64; 6] = [200, 500, 1000, 2500, 5000, 10000];
pub const SMALL_BLINDS: [i64; 6] = [10, 25, 50, 100, 200, 500];

const HOUSE_BET_CHANCE: f64 = 0.45;
const HOUSE_RAISE_CHANCE: f64 = 0.35;

const PLAYER: usize = 0;
const HOUSE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandRank {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

/// Hand strength: the category first, then card values from 2 to 14 for tie-breaks.
pub type HandValue = (HandRank, Vec<u8>);

fn value(card: Card) -> u8 {
    cards::rank(card) + 2
}

/// Highest card of the best five-card run, counting the ace low as well.
fn straight_high(values: &[u8]) -> Option<u8> {
    let mut present = [false; 15];
    for v in values {
        present[*v as usize] = true;
        if *v == 14 {
            present[1] = true;
        }
    }
    (5..=14u8)
        .rev()
        .find(|high| (high - 4..=*high).all(|v| present[v as usize]))
}

pub fn evaluate(hand: &[Card]) -> HandValue {
    let mut values: Vec<u8> = hand.iter().map(|c| value(*c)).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));

    let flush: Option<Vec<u8>> = (0..4u8).find_map(|suit| {
        let suited: Vec<u8> = hand
            .iter()
            .filter(|c| cards::suit(**c) == suit)
            .map(|c| value(*c))
            .collect();
        (suited.len() >= 5).then(|| {
            let mut suited = suited;
            suited.sort_unstable_by(|a, b| b.cmp(a));
            suited
        })
    });

    if let Some(suited) = &flush {
        if let Some(high) = straight_high(suited) {
            let rank = if high == 14 {
                HandRank::RoyalFlush
            } else {
                HandRank::StraightFlush
            };
            return (rank, vec![high]);
        }
    }

    // (count, value), most frequent first, then highest.
    let mut groups: Vec<(usize, u8)> = Vec::new();
    for v in &values {
        match groups.iter_mut().find(|(_, g)| g == v) {
            Some(group) => group.0 += 1,
            None => groups.push((1, *v)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let kickers = |exclude: &[u8], n: usize| -> Vec<u8> {
        values
            .iter()
            .copied()
            .filter(|v| !exclude.contains(v))
            .take(n)
            .collect()
    };

    let top = groups[0];
    let second = groups.get(1).copied().unwrap_or((0, 0));

    if top.0 >= 4 {
        let mut tie = vec![top.1];
        tie.extend(kickers(&[top.1], 1));
        return (HandRank::FourOfAKind, tie);
    }
    if top.0 == 3 && second.0 >= 2 {
        return (HandRank::FullHouse, vec![top.1, second.1]);
    }
    if let Some(suited) = flush {
        return (HandRank::Flush, suited.into_iter().take(5).collect());
    }
    if let Some(high) = straight_high(&values) {
        return (HandRank::Straight, vec![high]);
    }
    if top.0 == 3 {
        let mut tie = vec![top.1];
        tie.extend(kickers(&[top.1], 2));
        return (HandRank::ThreeOfAKind, tie);
    }
    if top.0 == 2 && second.0 == 2 {
        let mut tie = vec![top.1, second.1];
        tie.extend(kickers(&[top.1, second.1], 1));
        return (HandRank::TwoPair, tie);
    }
    if top.0 == 2 {
        let mut tie = vec![top.1];
        tie.extend(kickers(&[top.1], 3));
        return (HandRank::Pair, tie);
    }
    (HandRank::HighCard, values.into_iter().take(5).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Pasar,
    Igualar,
    Subir,
    Retirarse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Won,
    Lost,
    Split,
    Folded,
    Surrendered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HouseAction {
    pub action: Action,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct Poker {
    pub buy_in: i64,
    pub small_blind: i64,
    pub big_blind: i64,
    deck: Vec<Card>,
    player_cards: Vec<Card>,
    house_cards: Vec<Card>,
    board: Vec<Card>,
    stacks: [i64; 2],
    bets: [i64; 2],
    acted: [bool; 2],
    pub pot: i64,
    pub street: Street,
    pub outcome: Option<Outcome>,
    pub payout: i64,
    pub last_house_action: Option<HouseAction>,
    hands: Option<(HandRank, HandRank)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PokerView {
    pub buy_in: i64,
    pub small_blind: i64,
    pub big_blind: i64,
    pub player_cards: Vec<CardView>,
    pub board: Vec<CardView>,
    /// Only shown after a showdown.
    pub house_cards: Option<Vec<CardView>>,
    pub player_stack: i64,
    pub house_stack: i64,
    pub pot: i64,
    pub to_call: i64,
    pub min_raise: i64,
    pub street: Street,
    pub finished: bool,
    pub outcome: Option<Outcome>,
    pub player_hand: Option<HandRank>,
    pub house_hand: Option<HandRank>,
    pub last_house_action: Option<HouseAction>,
    pub payout: i64,
}

impl Poker {
    pub fn start<R: Rng>(buy_in: i64, small_blind: i64, rng: &mut R) -> Result<Self, GameError> {
        validate_allowed(buy_in, &BUY_INS)?;
        if !SMALL_BLINDS.contains(&small_blind) {
            return Err(GameError::InvalidChoice(format!(
                "small blind must be one of {:?}",
                SMALL_BLINDS
            )));
        }

        let mut game = Poker {
            buy_in,
            small_blind,
            big_blind: small_blind * 2,
            deck: cards::shuffled_deck(rng),
            player_cards: Vec::new(),
            house_cards: Vec::new(),
            board: Vec::new(),
            stacks: [buy_in, buy_in * 2],
            bets: [0, 0],
            acted: [false, false],
            pot: 0,
            street: Street::PreFlop,
            outcome: None,
            payout: 0,
            last_house_action: None,
            hands: None,
        };
        game.player_cards = game.deal(2)?;
        game.house_cards = game.deal(2)?;

        let blind = game.big_blind.min(game.stacks[HOUSE]);
        game.put_in(HOUSE, blind);
        Ok(game)
    }

    fn deal(&mut self, n: usize) -> Result<Vec<Card>, GameError> {
        (0..n)
            .map(|_| {
                self.deck
                    .pop()
                    .ok_or_else(|| GameError::InvalidMove("deck exhausted".to_string()))
            })
            .collect()
    }

    fn put_in(&mut self, seat: usize, amount: i64) {
        let amount = amount.min(self.stacks[seat]);
        self.stacks[seat] -= amount;
        self.bets[seat] += amount;
        self.pot += amount;
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn to_call(&self) -> i64 {
        (self.bets[HOUSE] - self.bets[PLAYER]).max(0)
    }

    pub fn min_raise(&self) -> i64 {
        self.to_call() + self.big_blind
    }

    /// Chips the player has put in so far.
    pub fn committed(&self) -> i64 {
        self.buy_in - self.stacks[PLAYER]
    }

    fn finish(&mut self, outcome: Outcome, payout: i64) {
        self.outcome = Some(outcome);
        self.payout = payout;
    }

    /// Hands back the part of the larger bet an all-in opponent could not match.
    fn return_uncalled(&mut self) {
        let (high, low) = if self.bets[PLAYER] > self.bets[HOUSE] {
            (PLAYER, HOUSE)
        } else {
            (HOUSE, PLAYER)
        };
        if self.stacks[low] == 0 {
            let excess = self.bets[high] - self.bets[low];
            self.bets[high] -= excess;
            self.stacks[high] += excess;
            self.pot -= excess;
        }
    }

    pub fn act<R: Rng>(&mut self, action: Action, amount: i64, rng: &mut R) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::Finished);
        }
        if self.acted[PLAYER] {
            return Err(GameError::InvalidMove(
                "already acted on this street".to_string(),
            ));
        }

        let to_call = self.to_call();
        match action {
            Action::Retirarse => {
                let stack = self.stacks[PLAYER];
                self.finish(Outcome::Folded, stack);
                return Ok(());
            }
            Action::Pasar => {
                if to_call != 0 {
                    return Err(GameError::InvalidMove(format!(
                        "cannot check, {} to call",
                        to_call
                    )));
                }
            }
            Action::Igualar => {
                self.put_in(PLAYER, to_call);
                self.return_uncalled();
            }
            Action::Subir => {
                let stack = self.stacks[PLAYER];
                let all_in = amount == stack && amount > to_call;
                if amount < self.min_raise() && !all_in {
                    return Err(GameError::InvalidMove(format!(
                        "minimum raise is {}",
                        self.min_raise()
                    )));
                }
                if amount > stack {
                    return Err(GameError::InvalidMove(
                        "not enough chips for that raise".to_string(),
                    ));
                }
                self.put_in(PLAYER, amount);
                // The house has to answer the raise.
                self.acted[HOUSE] = false;
            }
        }
        self.acted[PLAYER] = true;

        if !self.acted[HOUSE] {
            self.house_turn(rng);
        }
        self.progress()
    }

    fn house_turn<R: Rng>(&mut self, rng: &mut R) {
        let to_call = (self.bets[PLAYER] - self.bets[HOUSE]).max(0);
        let mut hand = self.house_cards.clone();
        hand.extend(&self.board);
        let strong = evaluate(&hand).0 >= HandRank::Pair;
        let stack = self.stacks[HOUSE];

        let action = if stack == 0 || (self.stacks[PLAYER] == 0 && to_call == 0) {
            HouseAction {
                action: Action::Pasar,
                amount: 0,
            }
        } else if to_call == 0 {
            if strong && rng.gen_bool(HOUSE_BET_CHANCE) {
                HouseAction {
                    action: Action::Subir,
                    amount: self.big_blind.min(stack),
                }
            } else {
                HouseAction {
                    action: Action::Pasar,
                    amount: 0,
                }
            }
        } else if strong && self.stacks[PLAYER] > 0 && rng.gen_bool(HOUSE_RAISE_CHANCE) {
            HouseAction {
                action: Action::Subir,
                amount: (to_call + self.big_blind.max(to_call)).min(stack),
            }
        } else {
            HouseAction {
                action: Action::Igualar,
                amount: to_call.min(stack),
            }
        };

        self.put_in(HOUSE, action.amount);
        self.acted[HOUSE] = true;
        if action.action == Action::Subir {
            self.acted[PLAYER] = false;
        } else {
            self.return_uncalled();
        }
        self.last_house_action = Some(action);
    }

    /// Advances streets once both sides have acted on level bets, running
    /// the board out when someone is all in.
    fn progress(&mut self) -> Result<(), GameError> {
        loop {
            let level = self.bets[PLAYER] == self.bets[HOUSE];
            if !(self.acted[PLAYER] && self.acted[HOUSE] && level) {
                return Ok(());
            }

            self.street = match self.street {
                Street::PreFlop => {
                    let flop = self.deal(3)?;
                    self.board.extend(flop);
                    Street::Flop
                }
                Street::Flop => {
                    let turn = self.deal(1)?;
                    self.board.extend(turn);
                    Street::Turn
                }
                Street::Turn => {
                    let river = self.deal(1)?;
                    self.board.extend(river);
                    Street::River
                }
                Street::River | Street::Showdown => Street::Showdown,
            };
            self.bets = [0, 0];

            if self.street == Street::Showdown {
                self.showdown();
                return Ok(());
            }

            let all_in = self.stacks[PLAYER] == 0 || self.stacks[HOUSE] == 0;
            self.acted = [all_in, all_in];
        }
    }

    fn showdown(&mut self) {
        let mut player = self.player_cards.clone();
        player.extend(&self.board);
        let mut house = self.house_cards.clone();
        house.extend(&self.board);

        let player_value = evaluate(&player);
        let house_value = evaluate(&house);
        self.hands = Some((player_value.0, house_value.0));

        let stack = self.stacks[PLAYER];
        match player_value.cmp(&house_value) {
            Ordering::Greater => self.finish(Outcome::Won, stack + self.pot),
            Ordering::Less => self.finish(Outcome::Lost, stack),
            Ordering::Equal => self.finish(Outcome::Split, stack + self.pot / 2),
        }
    }

    /// Leaves the table: the remaining stack comes back plus half of what was committed.
    pub fn surrender(&mut self) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::Finished);
        }
        let refund = self.stacks[PLAYER] + self.committed() / 2;
        self.finish(Outcome::Surrendered, refund);
        Ok(())
    }

    pub fn view(&self) -> PokerView {
        let showdown = self.hands.is_some();
        PokerView {
            buy_in: self.buy_in,
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            player_cards: cards::view(&self.player_cards),
            board: cards::view(&self.board),
            house_cards: showdown.then(|| cards::view(&self.house_cards)),
            player_stack: self.stacks[PLAYER],
            house_stack: self.stacks[HOUSE],
            pot: self.pot,
            to_call: self.to_call(),
            min_raise: self.min_raise(),
            street: self.street,
            finished: self.is_finished(),
            outcome: self.outcome,
            player_hand: self.hands.map(|h| h.0),
            house_hand: self.hands.map(|h| h.1),
            last_house_action: self.last_house_action,
            payout: self.payout,
        }
    }
}

impl Wager for Poker {
    fn game(&self) -> &'static str {
        "poker"
    }

    fn stake(&self) -> i64 {
        self.buy_in
    }

    fn payout(&self) -> i64 {
        self.payout
    }
}

impl Serialize for Poker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.view().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    /// Builds a card from a value (2-14) and a suit (0-3).
    fn c(value: u8, suit: u8) -> Card {
        suit * 13 + (value - 2)
    }

    #[test]
    fn test_evaluate_categories() {
        let royal = [c(14, 0), c(13, 0), c(12, 0), c(11, 0), c(10, 0), c(2, 1), c(3, 2)];
        assert_eq!(evaluate(&royal).0, HandRank::RoyalFlush);

        let wheel = [c(14, 0), c(2, 1), c(3, 2), c(4, 3), c(5, 0), c(9, 1), c(13, 2)];
        assert_eq!(evaluate(&wheel), (HandRank::Straight, vec![5]));

        let quads = [c(9, 0), c(9, 1), c(9, 2), c(9, 3), c(5, 0), c(13, 1), c(2, 2)];
        assert_eq!(evaluate(&quads), (HandRank::FourOfAKind, vec![9, 13]));

        let full = [c(7, 0), c(7, 1), c(7, 2), c(4, 3), c(4, 0), c(4, 1), c(2, 2)];
        assert_eq!(evaluate(&full), (HandRank::FullHouse, vec![7, 4]));

        let flush = [c(2, 3), c(6, 3), c(9, 3), c(11, 3), c(13, 3), c(14, 0), c(14, 1)];
        assert_eq!(evaluate(&flush), (HandRank::Flush, vec![13, 11, 9, 6, 2]));

        let two_pair = [c(10, 0), c(10, 1), c(6, 2), c(6, 3), c(3, 0), c(3, 1), c(12, 2)];
        assert_eq!(evaluate(&two_pair), (HandRank::TwoPair, vec![10, 6, 12]));

        let high = [c(2, 0), c(4, 1), c(7, 2), c(9, 3), c(11, 0), c(13, 1), c(3, 2)];
        assert_eq!(evaluate(&high), (HandRank::HighCard, vec![13, 11, 9, 7, 4]));
    }

    #[test]
    fn test_kickers_break_ties() {
        let board = [c(10, 0), c(10, 1), c(4, 2), c(7, 3), c(2, 0)];
        let mut ace_kicker = board.to_vec();
        ace_kicker.extend([c(14, 2), c(3, 3)]);
        let mut king_kicker = board.to_vec();
        king_kicker.extend([c(13, 2), c(3, 1)]);

        assert!(evaluate(&ace_kicker) > evaluate(&king_kicker));
    }

    #[test]
    fn test_start_posts_big_blind() {
        let mut rng = StdRng::seed_from_u64(30);
        let game = Poker::start(1000, 25, &mut rng).unwrap();
        let view = game.view();
        assert_eq!(view.player_stack, 1000);
        assert_eq!(view.house_stack, 1950);
        assert_eq!(view.pot, 50);
        assert_eq!(view.to_call, 50);
        assert_eq!(view.min_raise, 100);
        assert!(view.house_cards.is_none());
        assert!(Poker::start(1000, 30, &mut rng).is_err());
        assert!(Poker::start(300, 25, &mut rng).is_err());
    }

    #[test]
    fn test_cannot_check_facing_a_bet() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut game = Poker::start(500, 10, &mut rng).unwrap();
        assert!(game.act(Action::Pasar, 0, &mut rng).is_err());
        assert!(game.act(Action::Subir, 25, &mut rng).is_err());
    }

    #[test]
    fn test_fold_returns_stack() {
        let mut rng = StdRng::seed_from_u64(32);
        let mut game = Poker::start(500, 10, &mut rng).unwrap();
        game.act(Action::Retirarse, 0, &mut rng).unwrap();
        assert_eq!(game.outcome, Some(Outcome::Folded));
        assert_eq!(game.payout, 500);
        assert_eq!(game.act(Action::Igualar, 0, &mut rng), Err(GameError::Finished));
    }

    #[test]
    fn test_surrender_refunds_half_of_committed() {
        let mut rng = StdRng::seed_from_u64(33);
        let mut game = Poker::start(1000, 50, &mut rng).unwrap();
        game.surrender().unwrap();
        assert_eq!(game.payout, 1000);

        let mut game = Poker::start(1000, 50, &mut rng).unwrap();
        game.act(Action::Igualar, 0, &mut rng).unwrap();
        let committed = game.committed();
        assert!(committed >= 100);
        if !game.is_finished() {
            game.surrender().unwrap();
            assert_eq!(game.payout, 1000 - committed + committed / 2);
        }
    }

    #[test]
    fn test_calling_down_reaches_showdown_and_conserves_chips() {
        let mut rng = StdRng::seed_from_u64(34);
        for _ in 0..50 {
            let mut game = Poker::start(2500, 100, &mut rng).unwrap();
            let mut guard = 0;
            while !game.is_finished() && guard < 50 {
                game.act(Action::Igualar, 0, &mut rng).unwrap();
                guard += 1;
            }
            assert!(game.is_finished());
            assert_eq!(game.street, Street::Showdown);
            // Chips never leave the table: both stacks plus the pot stay constant.
            assert_eq!(game.stacks[PLAYER] + game.stacks[HOUSE] + game.pot, 7500);
            assert!(game.payout >= game.stacks[PLAYER]);
            assert!(game.payout <= game.stacks[PLAYER] + game.pot);
            assert!(game.view().house_cards.is_some());
        }
    }

    #[test]
    fn test_all_in_runs_out_the_board() {
        let mut rng = StdRng::seed_from_u64(35);
        let mut game = Poker::start(200, 10, &mut rng).unwrap();
        game.act(Action::Subir, 200, &mut rng).unwrap();
        assert!(game.is_finished());
        assert_eq!(game.board.len(), 5);
        assert_eq!(game.stacks[PLAYER] + game.stacks[HOUSE] + game.pot, 600);
    }
}
