//! Betting-action legality, application, and street-completion checks.
//!
//! Blinds are posted as an opening bet of size `big_blind`: `bet_to` and
//! `min_raise_size` both start at the big blind and `interval_id` starts at
//! 1, so the first raise over the blinds is a `Raise`, not a `Bet` — the
//! postflop streets start with `bet_to == 0`, where the first aggressor
//! uses `Bet` instead.

use crate::poker::errors::PokerError;
use crate::poker::seating::next_after;
use crate::poker::types::Hand;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet(u64),
    Raise(u64),
}

/// Applies `action` for `seat`, whose stack before the action is `stack`.
/// Returns the number of chips moved from the seat's stack into
/// `street_commit`/`total_commit` (0 for fold/check). Does not advance
/// `action_on` — callers do that separately once they've also applied the
/// stack delta.
pub fn apply_action(
    hand: &mut Hand,
    seat: u8,
    stack: u64,
    action: Action,
    big_blind: u64,
) -> Result<u64, PokerError> {
    let s = seat as usize;
    let to_call = hand.to_call(seat);

    let delta = match action {
        Action::Fold => {
            hand.folded[s] = true;
            hand.last_interval_acted[s] = hand.interval_id as i64;
            0
        }
        Action::Check => {
            if to_call != 0 {
                return Err(PokerError::IllegalAction);
            }
            hand.last_interval_acted[s] = hand.interval_id as i64;
            0
        }
        Action::Call => {
            if to_call == 0 {
                return Err(PokerError::IllegalAction);
            }
            let pay = to_call.min(stack);
            hand.street_commit[s] = hand
                .street_commit[s]
                .checked_add(pay)
                .ok_or(PokerError::Overflow)?;
            hand.total_commit[s] = hand
                .total_commit[s]
                .checked_add(pay)
                .ok_or(PokerError::Overflow)?;
            if pay == stack {
                hand.all_in[s] = true;
            }
            hand.last_interval_acted[s] = hand.interval_id as i64;
            pay
        }
        Action::Bet(to) => {
            if hand.bet_to != 0 {
                return Err(PokerError::IllegalAction);
            }
            let delta = to.saturating_sub(hand.street_commit[s]);
            if delta == 0 || delta > stack {
                return Err(PokerError::IllegalAction);
            }
            let is_all_in = delta == stack;
            if to < big_blind && !is_all_in {
                return Err(PokerError::IllegalAction);
            }
            hand.street_commit[s] = hand
                .street_commit[s]
                .checked_add(delta)
                .ok_or(PokerError::Overflow)?;
            hand.total_commit[s] = hand
                .total_commit[s]
                .checked_add(delta)
                .ok_or(PokerError::Overflow)?;
            hand.bet_to = to;
            hand.min_raise_size = to;
            hand.interval_id = hand.interval_id.checked_add(1).ok_or(PokerError::Overflow)?;
            if is_all_in {
                hand.all_in[s] = true;
            }
            hand.last_interval_acted[s] = hand.interval_id as i64;
            delta
        }
        Action::Raise(to) => {
            if hand.bet_to == 0 || to <= hand.bet_to {
                return Err(PokerError::IllegalAction);
            }
            let delta = to.saturating_sub(hand.street_commit[s]);
            if delta == 0 || delta > stack {
                return Err(PokerError::IllegalAction);
            }
            let is_all_in = delta == stack;
            let raise_size = to - hand.bet_to;
            let full_raise = raise_size >= hand.min_raise_size;
            if !full_raise && !is_all_in {
                return Err(PokerError::IllegalAction);
            }
            hand.street_commit[s] = hand
                .street_commit[s]
                .checked_add(delta)
                .ok_or(PokerError::Overflow)?;
            hand.total_commit[s] = hand
                .total_commit[s]
                .checked_add(delta)
                .ok_or(PokerError::Overflow)?;
            hand.bet_to = to;
            if full_raise {
                hand.min_raise_size = raise_size;
                hand.interval_id = hand.interval_id.checked_add(1).ok_or(PokerError::Overflow)?;
            }
            if is_all_in {
                hand.all_in[s] = true;
            }
            hand.last_interval_acted[s] = hand.interval_id as i64;
            delta
        }
    };

    Ok(delta)
}

/// True once every not-folded, not-all-in contender has matched `bet_to`
/// and acted since the interval last (re)opened.
pub fn street_is_complete(hand: &Hand) -> bool {
    let acting: Vec<u8> = hand
        .contenders()
        .into_iter()
        .filter(|&s| !hand.all_in[s as usize])
        .collect();
    if acting.is_empty() {
        return true;
    }
    acting.iter().all(|&s| {
        hand.street_commit[s as usize] == hand.bet_to
            && hand.last_interval_acted[s as usize] == hand.interval_id as i64
    })
}

/// Moves `action_on` to the next contender still required to act, or -1 if
/// the street is complete.
pub fn advance_action(hand: &mut Hand) {
    if street_is_complete(hand) {
        hand.action_on = -1;
        return;
    }
    let acting: Vec<u8> = hand
        .contenders()
        .into_iter()
        .filter(|&s| !hand.all_in[s as usize])
        .collect();
    hand.action_on = next_after(hand.action_on, &acting) as i16;
}

/// Refunds the delta between the unique top street commitment and the
/// second-highest back to its owner, reopening their all-in flag if the
/// refund re-exposes chips. Returns `(seat, refund_amount)` when a refund
/// applied.
pub fn uncalled_excess_refund(hand: &mut Hand) -> Option<(u8, u64)> {
    let contenders = hand.contenders();
    if contenders.len() < 2 {
        return None;
    }
    let mut commits: Vec<(u8, u64)> = contenders
        .iter()
        .map(|&s| (s, hand.street_commit[s as usize]))
        .collect();
    commits.sort_unstable_by(|a, b| b.1.cmp(&a.1));

    let (top_seat, top_amt) = commits[0];
    let second_amt = commits[1].1;
    if top_amt <= second_amt {
        return None;
    }
    let refund = top_amt - second_amt;
    let s = top_seat as usize;
    hand.street_commit[s] -= refund;
    hand.total_commit[s] -= refund;
    hand.all_in[s] = false;
    Some((top_seat, refund))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_PLAYERS;
    use crate::poker::types::{HandPhase, Street};

    fn empty_hand() -> Hand {
        Hand {
            id: 1,
            phase: HandPhase::Betting,
            street: Street::Preflop,
            button: 0,
            sb_seat: 0,
            bb_seat: 1,
            action_on: 0,
            bet_to: 2,
            min_raise_size: 2,
            interval_id: 1,
            in_hand: [true, true, false, false, false, false, false, false, false],
            folded: [false; MAX_PLAYERS as usize],
            all_in: [false; MAX_PLAYERS as usize],
            street_commit: {
                let mut c = [0u64; MAX_PLAYERS as usize];
                c[0] = 1;
                c[1] = 2;
                c
            },
            total_commit: {
                let mut c = [0u64; MAX_PLAYERS as usize];
                c[0] = 1;
                c[1] = 2;
                c
            },
            last_interval_acted: [-1; MAX_PLAYERS as usize],
            board: Vec::new(),
            pots: Vec::new(),
            action_deadline: 0,
            dealer: None,
        }
    }

    #[test]
    fn short_all_in_raise_does_not_reopen_action() {
        let mut hand = empty_hand();
        // seat 0 (sb, stack behind = 5 after posting 1) shoves short over bb.
        apply_action(&mut hand, 0, 5, Action::Raise(6), 2).unwrap();
        assert!(hand.all_in[0]);
        assert_eq!(hand.interval_id, 1, "short all-in must not bump the interval");
        assert_eq!(hand.min_raise_size, 2, "min raise size unaffected by a short all-in");
        assert_eq!(hand.bet_to, 6);
    }

    #[test]
    fn full_raise_reopens_interval_for_matched_seats() {
        let mut hand = empty_hand();
        hand.last_interval_acted[0] = 1; // sb already matched the original bb.
        apply_action(&mut hand, 1, 50, Action::Raise(10), 2).unwrap();
        assert_eq!(hand.interval_id, 2);
        assert_eq!(hand.min_raise_size, 8);
        assert!(!street_is_complete(&hand), "sb must act again after the reopen");
    }

    #[test]
    fn uncalled_excess_is_refunded_to_unique_top_committer() {
        let mut hand = empty_hand();
        hand.street_commit[0] = 50;
        hand.total_commit[0] = 50;
        hand.all_in[0] = true;
        hand.street_commit[1] = 20;
        hand.total_commit[1] = 20;
        let (seat, refund) = uncalled_excess_refund(&mut hand).unwrap();
        assert_eq!((seat, refund), (0, 30));
        assert_eq!(hand.street_commit[0], 20);
        assert!(!hand.all_in[0]);
    }

    #[test]
    fn tied_top_commitments_get_no_refund() {
        let mut hand = empty_hand();
        hand.street_commit[0] = 20;
        hand.street_commit[1] = 20;
        assert_eq!(uncalled_excess_refund(&mut hand), None);
    }
}
