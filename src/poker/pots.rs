//! Side-pot tier peeling, tier merging, and pot awarding.

use crate::config::MAX_PLAYERS;
use crate::handeval::{winners, HandRank};
use crate::poker::errors::PokerError;
use crate::poker::types::Pot;

/// Peels the smallest positive commitment off every still-contributing seat
/// into a tier, repeating until no seat has chips left in front of it, then
/// merges adjacent tiers that ended up with identical eligible-seat sets.
/// `total_commit`/`eligible_for_win` are indexed by seat, length
/// `MAX_PLAYERS`.
pub fn compute_pots(
    total_commit: &[u64; MAX_PLAYERS as usize],
    eligible_for_win: &[bool; MAX_PLAYERS as usize],
) -> Result<Vec<Pot>, PokerError> {
    let mut remaining = *total_commit;
    let mut tiers: Vec<Pot> = Vec::new();

    loop {
        let contributors: Vec<u8> = (0..MAX_PLAYERS).filter(|&s| remaining[s as usize] > 0).collect();
        let Some(&m) = contributors.iter().map(|&s| &remaining[s as usize]).min() else {
            break;
        };

        let mut eligible: Vec<u8> = contributors
            .iter()
            .copied()
            .filter(|&s| eligible_for_win[s as usize])
            .collect();
        eligible.sort_unstable();

        let amount: u64 = (m as u128)
            .checked_mul(contributors.len() as u128)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or(PokerError::Overflow)?;

        for &s in &contributors {
            remaining[s as usize] -= m;
        }
        tiers.push(Pot { amount, eligible });
    }

    let mut merged: Vec<Pot> = Vec::new();
    for tier in tiers {
        if let Some(last) = merged.last_mut() {
            if last.eligible == tier.eligible {
                last.amount = last
                    .amount
                    .checked_add(tier.amount)
                    .ok_or(PokerError::Overflow)?;
                continue;
            }
        }
        merged.push(tier);
    }
    Ok(merged)
}

/// Splits one pot's amount across its winners, giving the division
/// remainder to the lowest-indexed winning seat. `ranked` need only cover
/// the pot's eligible seats (extra entries are ignored).
pub fn award_pot(pot: &Pot, ranked: &[(u8, HandRank)]) -> Vec<(u8, u64)> {
    if pot.eligible.len() == 1 {
        return vec![(pot.eligible[0], pot.amount)];
    }

    let relevant: Vec<(u8, HandRank)> = ranked
        .iter()
        .copied()
        .filter(|(seat, _)| pot.eligible.contains(seat))
        .collect();
    let winning_seats = winners(&relevant);
    if winning_seats.is_empty() {
        return Vec::new();
    }

    let share = pot.amount / winning_seats.len() as u64;
    let remainder = pot.amount % winning_seats.len() as u64;
    let mut out: Vec<(u8, u64)> = winning_seats.iter().map(|&s| (s, share)).collect();
    out[0].1 += remainder; // winning_seats is ascending by seat index.
    out
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Side-pot tiers always sum back to the total committed, for any
        /// mix of commitments and eligibility (spec §8's round-trip law).
        #[test]
        fn pots_sum_to_total_commit(
            commits in prop::array::uniform9(0u64..1000),
            eligible in prop::array::uniform9(any::<bool>()),
        ) {
            let pots = compute_pots(&commits, &eligible).unwrap();
            let sum: u64 = pots.iter().map(|p| p.amount).sum();
            let expected: u64 = commits.iter().sum();
            prop_assert_eq!(sum, expected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handeval::HandCategory;

    fn commits(vals: &[(u8, u64)]) -> [u64; MAX_PLAYERS as usize] {
        let mut arr = [0u64; MAX_PLAYERS as usize];
        for &(s, v) in vals {
            arr[s as usize] = v;
        }
        arr
    }

    fn elig(seats: &[u8]) -> [bool; MAX_PLAYERS as usize] {
        let mut arr = [false; MAX_PLAYERS as usize];
        for &s in seats {
            arr[s as usize] = true;
        }
        arr
    }

    #[test]
    fn four_way_all_in_builds_three_tiers() {
        // Matches S3: stacks committed 10/20/50/50.
        let total = commits(&[(0, 10), (1, 20), (2, 50), (3, 50)]);
        let eligible = elig(&[0, 1, 2, 3]);
        let pots = compute_pots(&total, &eligible).unwrap();
        assert_eq!(pots.len(), 3);
        assert_eq!(pots[0], Pot { amount: 40, eligible: vec![0, 1, 2, 3] });
        assert_eq!(pots[1], Pot { amount: 30, eligible: vec![1, 2, 3] });
        assert_eq!(pots[2], Pot { amount: 60, eligible: vec![2, 3] });
        let sum: u64 = pots.iter().map(|p| p.amount).sum();
        assert_eq!(sum, 130);
    }

    #[test]
    fn folded_seat_contributes_but_is_ineligible() {
        let total = commits(&[(0, 10), (1, 10)]);
        let eligible = elig(&[1]); // seat 0 folded
        let pots = compute_pots(&total, &eligible).unwrap();
        assert_eq!(pots, vec![Pot { amount: 20, eligible: vec![1] }]);
    }

    #[test]
    fn remainder_goes_to_lowest_winning_seat() {
        let rank = HandRank { category: HandCategory::Pair, tiebreak: [5, 0, 0, 0, 0] };
        let pot = Pot { amount: 101, eligible: vec![1, 3] };
        let ranked = vec![(1u8, rank), (3u8, rank)];
        let shares = award_pot(&pot, &ranked);
        assert_eq!(shares, vec![(1, 51), (3, 50)]);
    }

    #[test]
    fn single_eligible_seat_wins_without_comparison() {
        let pot = Pot { amount: 40, eligible: vec![2] };
        let shares = award_pot(&pot, &[]);
        assert_eq!(shares, vec![(2, 40)]);
    }
}
