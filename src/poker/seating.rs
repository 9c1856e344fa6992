//! Button advance, blind assignment, and first-to-act computation.

/// The first entry of `eligible` (sorted ascending) strictly greater than
/// `after`, wrapping to the smallest entry if none is greater. `eligible`
/// must be nonempty.
pub fn next_after(after: i16, eligible: &[u8]) -> u8 {
    eligible
        .iter()
        .copied()
        .find(|&s| s as i16 > after)
        .unwrap_or(eligible[0])
}

/// Advances the button to the next funded seat, heads-up or full-ring.
/// `funded` is the sorted list of seats with chips behind them.
pub fn advance_button(current_button: i16, funded: &[u8]) -> u8 {
    next_after(current_button, funded)
}

/// Returns `(sb_seat, bb_seat)`. Heads-up (exactly two funded seats) posts
/// the small blind on the button; three or more posts it next-after-button.
pub fn assign_blinds(button: u8, funded: &[u8]) -> (u8, u8) {
    if funded.len() == 2 {
        let other = funded.iter().copied().find(|&s| s != button).unwrap_or(button);
        (button, other)
    } else {
        let sb = next_after(button as i16, funded);
        let bb = next_after(sb as i16, funded);
        (sb, bb)
    }
}

/// First actor preflop: left of the big blind.
pub fn first_to_act_preflop(bb_seat: u8, contenders: &[u8]) -> u8 {
    next_after(bb_seat as i16, contenders)
}

/// First actor postflop: left of the button.
pub fn first_to_act_postflop(button: u8, contenders: &[u8]) -> u8 {
    next_after(button as i16, contenders)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heads_up_posts_sb_on_button() {
        let (sb, bb) = assign_blinds(0, &[0, 1]);
        assert_eq!((sb, bb), (0, 1));
    }

    #[test]
    fn three_handed_posts_sb_next_after_button() {
        let (sb, bb) = assign_blinds(0, &[0, 1, 2]);
        assert_eq!((sb, bb), (1, 2));
    }

    #[test]
    fn next_after_wraps_around() {
        assert_eq!(next_after(2, &[0, 1, 2]), 0);
        assert_eq!(next_after(0, &[0, 1, 2]), 1);
    }
}
