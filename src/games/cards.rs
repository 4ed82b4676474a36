//! Cards are `u8` values in `0..52`: suit = card / 13, rank = card % 13,
//! where rank 0 is a two and rank 12 an ace.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub type Card = u8;

const RANKS: [&str; 13] = [
    "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K", "A",
];
const SUITS: [&str; 4] = ["♠", "♥", "♦", "♣"];

pub const ACE: u8 = 12;

pub fn rank(card: Card) -> u8 {
    card % 13
}

pub fn suit(card: Card) -> u8 {
    card / 13
}

pub fn shuffled_deck<R: Rng>(rng: &mut R) -> Vec<Card> {
    let mut deck: Vec<Card> = (0..52).collect();
    deck.shuffle(rng);
    deck
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardView {
    pub rank: String,
    pub suit: String,
}

impl CardView {
    pub fn of(card: Card) -> Self {
        CardView {
            rank: RANKS[rank(card) as usize].to_string(),
            suit: SUITS[suit(card) as usize].to_string(),
        }
    }
}

pub fn view(cards: &[Card]) -> Vec<CardView> {
    cards.iter().map(|c| CardView::of(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_deck_is_complete() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = shuffled_deck(&mut rng);
        assert_eq!(deck.len(), 52);
        assert_eq!(deck.iter().collect::<HashSet<_>>().len(), 52);
    }

    #[test]
    fn test_card_view() {
        assert_eq!(
            CardView::of(12),
            CardView {
                rank: "A".to_string(),
                suit: "♠".to_string()
            }
        );
        assert_eq!(CardView::of(13 + 8).rank, "10");
        assert_eq!(CardView::of(51).suit, "♣");
    }
}
