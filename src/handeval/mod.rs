//! Seven-card Hold'em hand evaluator, written from scratch around a flat
//! `Card(u8)` id with rank/suit accessors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandEvalError {
    #[error("duplicate card id {0} in evaluation input")]
    DuplicateCard(u8),
}

/// `card = rank*4 + suit`, rank `0..13` (Two..Ace), suit `0..4`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card(pub u8);

impl Card {
    pub fn rank(&self) -> u8 {
        self.0 / 4
    }

    pub fn suit(&self) -> u8 {
        self.0 % 4
    }

    /// Ace-high numeric value, 2..=14.
    pub fn rank_value(&self) -> u8 {
        self.rank() + 2
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandCategory {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

/// Total ordering over made hands: compare `category` first, then
/// `tiebreak` lexicographically (both fields derive `Ord` in declaration
/// order, which the field order below matches).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandRank {
    pub category: HandCategory,
    pub tiebreak: [u8; 5],
}

fn rank_counts(cards: &[Card; 5]) -> [u8; 15] {
    let mut counts = [0u8; 15];
    for c in cards {
        counts[c.rank_value() as usize] += 1;
    }
    counts
}

fn straight_high(mut unique_ranks: Vec<u8>) -> Option<u8> {
    unique_ranks.sort_unstable();
    unique_ranks.dedup();
    if unique_ranks.contains(&14) {
        unique_ranks.insert(0, 1); // Ace also counts low for the wheel.
    }
    if unique_ranks.len() < 5 {
        return None;
    }
    for window in unique_ranks.windows(5).rev() {
        if window[4] - window[0] == 4 {
            return Some(window[4]);
        }
    }
    None
}

/// Ranks a single 5-card hand. Errors if any two cards share an id.
pub fn evaluate_five(cards: &[Card; 5]) -> Result<HandRank, HandEvalError> {
    for i in 0..5 {
        for j in (i + 1)..5 {
            if cards[i].0 == cards[j].0 {
                return Err(HandEvalError::DuplicateCard(cards[i].0));
            }
        }
    }

    let is_flush = cards.iter().all(|c| c.suit() == cards[0].suit());
    let counts = rank_counts(cards);
    let unique_ranks: Vec<u8> = cards.iter().map(|c| c.rank_value()).collect();
    let straight_top = straight_high(unique_ranks);

    let mut groups: Vec<(u8, u8)> = (2u8..=14)
        .filter(|&r| counts[r as usize] > 0)
        .map(|r| (counts[r as usize], r))
        .collect();
    // Highest count first, then highest rank first.
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let pad = |vals: &[u8]| {
        let mut out = [0u8; 5];
        out[..vals.len()].copy_from_slice(vals);
        out
    };

    if let Some(top) = straight_top {
        if is_flush {
            return Ok(HandRank {
                category: HandCategory::StraightFlush,
                tiebreak: pad(&[top]),
            });
        }
    }

    if groups[0].0 == 4 {
        let kicker = groups[1].1;
        return Ok(HandRank {
            category: HandCategory::FourOfAKind,
            tiebreak: pad(&[groups[0].1, kicker]),
        });
    }

    if groups[0].0 == 3 && groups[1].0 == 2 {
        return Ok(HandRank {
            category: HandCategory::FullHouse,
            tiebreak: pad(&[groups[0].1, groups[1].1]),
        });
    }

    if is_flush {
        let mut ranks: Vec<u8> = cards.iter().map(|c| c.rank_value()).collect();
        ranks.sort_unstable_by(|a, b| b.cmp(a));
        return Ok(HandRank {
            category: HandCategory::Flush,
            tiebreak: pad(&ranks),
        });
    }

    if let Some(top) = straight_top {
        return Ok(HandRank {
            category: HandCategory::Straight,
            tiebreak: pad(&[top]),
        });
    }

    if groups[0].0 == 3 {
        let mut kickers: Vec<u8> = groups[1..].iter().map(|g| g.1).collect();
        kickers.sort_unstable_by(|a, b| b.cmp(a));
        return Ok(HandRank {
            category: HandCategory::ThreeOfAKind,
            tiebreak: pad(&[groups[0].1, kickers[0], kickers[1]]),
        });
    }

    if groups[0].0 == 2 && groups[1].0 == 2 {
        let (hi, lo) = if groups[0].1 > groups[1].1 {
            (groups[0].1, groups[1].1)
        } else {
            (groups[1].1, groups[0].1)
        };
        let kicker = groups[2].1;
        return Ok(HandRank {
            category: HandCategory::TwoPair,
            tiebreak: pad(&[hi, lo, kicker]),
        });
    }

    if groups[0].0 == 2 {
        let mut kickers: Vec<u8> = groups[1..].iter().map(|g| g.1).collect();
        kickers.sort_unstable_by(|a, b| b.cmp(a));
        return Ok(HandRank {
            category: HandCategory::Pair,
            tiebreak: pad(&[groups[0].1, kickers[0], kickers[1], kickers[2]]),
        });
    }

    let mut ranks: Vec<u8> = cards.iter().map(|c| c.rank_value()).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));
    Ok(HandRank {
        category: HandCategory::HighCard,
        tiebreak: pad(&ranks),
    })
}

fn combinations_5_of_7() -> Vec<[usize; 5]> {
    let mut out = Vec::with_capacity(21);
    for a in 0..7 {
        for b in (a + 1)..7 {
            for c in (b + 1)..7 {
                for d in (c + 1)..7 {
                    for e in (d + 1)..7 {
                        out.push([a, b, c, d, e]);
                    }
                }
            }
        }
    }
    out
}

/// Best 5-card hand out of a 5-card board and 2 hole cards.
pub fn best_hand(hole: [Card; 2], board: [Card; 5]) -> Result<HandRank, HandEvalError> {
    let seven = [
        hole[0], hole[1], board[0], board[1], board[2], board[3], board[4],
    ];
    for i in 0..7 {
        for j in (i + 1)..7 {
            if seven[i].0 == seven[j].0 {
                return Err(HandEvalError::DuplicateCard(seven[i].0));
            }
        }
    }

    combinations_5_of_7()
        .into_iter()
        .map(|idx| {
            let five = [seven[idx[0]], seven[idx[1]], seven[idx[2]], seven[idx[3]], seven[idx[4]]];
            evaluate_five(&five)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|ranks| ranks.into_iter().max().expect("21 combinations is nonempty"))
}

/// Given each contending seat's already-computed best hand, returns the
/// seats that tie for the win, in ascending seat order.
pub fn winners(hands: &[(u8, HandRank)]) -> Vec<u8> {
    let best = match hands.iter().map(|(_, rank)| *rank).max() {
        Some(b) => b,
        None => return Vec::new(),
    };
    let mut out: Vec<u8> = hands
        .iter()
        .filter(|(_, rank)| *rank == best)
        .map(|(seat, _)| *seat)
        .collect();
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(rank_value: u8, suit: u8) -> Card {
        Card((rank_value - 2) * 4 + suit)
    }

    #[test]
    fn royal_flush_beats_straight_flush() {
        let royal = [c(14, 0), c(13, 0), c(12, 0), c(11, 0), c(10, 0)];
        let steel_wheel = [c(5, 1), c(4, 1), c(3, 1), c(2, 1), c(14, 1)];
        let a = evaluate_five(&royal).unwrap();
        let b = evaluate_five(&steel_wheel).unwrap();
        assert_eq!(a.category, HandCategory::StraightFlush);
        assert_eq!(b.category, HandCategory::StraightFlush);
        assert!(a > b);
    }

    #[test]
    fn wheel_straight_ranks_five_high() {
        let wheel = [c(14, 0), c(2, 1), c(3, 2), c(4, 3), c(5, 0)];
        let rank = evaluate_five(&wheel).unwrap();
        assert_eq!(rank.category, HandCategory::Straight);
        assert_eq!(rank.tiebreak[0], 5);
    }

    #[test]
    fn full_house_beats_flush() {
        let boat = [c(5, 0), c(5, 1), c(5, 2), c(9, 0), c(9, 1)];
        let flush = [c(2, 0), c(5, 0), c(9, 0), c(11, 0), c(13, 0)];
        assert!(evaluate_five(&boat).unwrap() > evaluate_five(&flush).unwrap());
    }

    #[test]
    fn detects_duplicate_card() {
        let hand = [c(5, 0), c(5, 0), c(9, 0), c(11, 0), c(13, 0)];
        assert_eq!(
            evaluate_five(&hand),
            Err(HandEvalError::DuplicateCard(hand[0].0))
        );
    }

    #[test]
    fn best_hand_picks_best_of_seven() {
        let hole = [c(14, 0), c(14, 1)];
        let board = [c(14, 2), c(14, 3), c(2, 0), c(5, 1), c(9, 2)];
        let rank = best_hand(hole, board).unwrap();
        assert_eq!(rank.category, HandCategory::FourOfAKind);
        assert_eq!(rank.tiebreak[0], 14);
    }

    #[test]
    fn winners_splits_ties() {
        let board = [c(2, 0), c(5, 1), c(9, 2), c(11, 3), c(13, 0)];
        let a = best_hand([c(14, 1), c(3, 2)], board).unwrap();
        let b = best_hand([c(14, 2), c(4, 3)], board).unwrap();
        let ranked = vec![(0u8, a), (1u8, b)];
        assert_eq!(winners(&ranked), vec![0, 1]);
    }
}
