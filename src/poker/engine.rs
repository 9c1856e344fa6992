//! Table lifecycle stitched to the betting engine and the dealer hand
//! pipeline. This is the only module that holds both a [`Table`] and a
//! [`crate::dealer::hand::DealerHandState`] at once — `dealer::hand` itself
//! deliberately stays ignorant of seats, stacks, and bank accounts (see its
//! module doc), so every phase transition that has a poker-side consequence
//! (opening a betting round, paying out a pot, ejecting a bond-depleted
//! seat) is decided here.

use ark_bn254::Bn254;
use ark_groth16::PreparedVerifyingKey;

use crate::bank::Bank;
use crate::config::MAX_PLAYERS;
use crate::dealer::dkg::ActiveEpoch;
use crate::dealer::hand::{DealerHandState, TimeoutOutcome, NO_POSITION};
use crate::events::Event;
use crate::group::chaum_pedersen::{ChaumPedersenProof, EncryptedShareProof};
use crate::group::Point;
use crate::handeval::{self, Card, HandRank};
use crate::staking::Staking;

use super::betting::{advance_action, apply_action, Action};
use super::errors::PokerError;
use super::pots::{award_pot, compute_pots};
use super::seating::{advance_button, assign_blinds, first_to_act_postflop, first_to_act_preflop};
use super::types::{Hand, HandPhase, Seat, Street, Table, TableParams};

fn validate_params(params: &TableParams) -> Result<(), PokerError> {
    if params.max_players < 2 || params.max_players > MAX_PLAYERS {
        return Err(PokerError::InvalidTableParams("max_players out of range"));
    }
    if params.small_blind == 0 || params.big_blind < params.small_blind {
        return Err(PokerError::InvalidTableParams("blinds must be positive and bb >= sb"));
    }
    if params.min_buy_in == 0 || params.min_buy_in > params.max_buy_in {
        return Err(PokerError::InvalidTableParams("buy-in range is empty"));
    }
    if params.rake_bps > 10_000 {
        return Err(PokerError::InvalidTableParams("rake_bps exceeds 100%"));
    }
    Ok(())
}

pub fn create_table(id: u64, creator: &str, label: String, params: TableParams) -> Result<(Table, Vec<Event>), PokerError> {
    validate_params(&params)?;
    let table = Table {
        id,
        creator: creator.to_string(),
        label,
        params,
        seats: std::array::from_fn(|_| Seat::default()),
        next_hand_id: 0,
        button_seat: -1,
        hand: None,
    };
    Ok((table, vec![Event::TableCreated { table_id: id, creator: creator.to_string() }]))
}

fn find_seat_for_player(table: &Table, player: &str) -> Result<u8, PokerError> {
    (0..MAX_PLAYERS)
        .find(|&s| table.seats[s as usize].player.as_deref() == Some(player))
        .ok_or(PokerError::PlayerNotSeated)
}

fn seats_to_string(seats: &[u8]) -> String {
    seats.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",")
}

fn action_name(action: &Action) -> &'static str {
    match action {
        Action::Fold => "fold",
        Action::Check => "check",
        Action::Call => "call",
        Action::Bet(_) => "bet",
        Action::Raise(_) => "raise",
    }
}

pub fn sit(
    table: &mut Table,
    seat: u8,
    player: &str,
    buy_in: u64,
    pk_player: [u8; 32],
    bank: &mut Bank,
) -> Result<Vec<Event>, PokerError> {
    if seat >= table.params.max_players {
        return Err(PokerError::SeatOutOfRange(seat));
    }
    if table.seats[seat as usize].is_occupied() {
        return Err(PokerError::SeatOccupied(seat));
    }
    if buy_in < table.params.min_buy_in || buy_in > table.params.max_buy_in {
        return Err(PokerError::BuyInOutOfRange {
            amount: buy_in,
            min: table.params.min_buy_in,
            max: table.params.max_buy_in,
        });
    }
    let charge = buy_in.checked_add(table.params.player_bond).ok_or(PokerError::Overflow)?;
    bank.debit(player, charge)?;

    table.seats[seat as usize] = Seat {
        player: Some(player.to_string()),
        pk_player: Some(pk_player),
        stack: buy_in,
        bond: table.params.player_bond,
        hole: None,
    };
    Ok(vec![Event::PlayerSat { table_id: table.id, seat, player: player.to_string() }])
}

pub fn leave(table: &mut Table, player: &str, bank: &mut Bank) -> Result<Vec<Event>, PokerError> {
    if table.hand.is_some() {
        return Err(PokerError::HandInProgress(table.id));
    }
    let seat = find_seat_for_player(table, player)?;
    let refund = table.seats[seat as usize]
        .stack
        .checked_add(table.seats[seat as usize].bond)
        .ok_or(PokerError::Overflow)?;
    if refund > 0 {
        bank.credit(player, refund)?;
    }
    table.seats[seat as usize] = Seat::default();
    Ok(vec![Event::PlayerLeft { table_id: table.id, seat, player: player.to_string() }])
}

/// Seats whose bond hit zero (consumed by repeated timeout slashes) are
/// ejected at the hand boundary: their stack is returned and the seat freed.
fn eject_depleted_bonds(table: &mut Table, bank: &mut Bank) -> Result<Vec<Event>, PokerError> {
    let mut events = Vec::new();
    for seat in 0..MAX_PLAYERS {
        let s = seat as usize;
        if table.seats[s].is_occupied() && table.seats[s].bond == 0 {
            let player = table.seats[s].player.clone().expect("occupied seat has a player");
            let stack = table.seats[s].stack;
            if stack > 0 {
                bank.credit(&player, stack)?;
            }
            table.seats[s] = Seat::default();
            events.push(Event::PlayerEjected { table_id: table.id, seat, player });
        }
    }
    Ok(events)
}

/// Seats dealt into the hand, rotated to start at the small blind — the
/// dealing order `dealer::hand::finalize_deck` assigns hole positions in.
fn dealing_order(hand: &Hand) -> Vec<u8> {
    let seats: Vec<u8> = (0..MAX_PLAYERS).filter(|&s| hand.in_hand[s as usize]).collect();
    let start = seats.iter().position(|&s| s == hand.sb_seat).unwrap_or(0);
    seats[start..].iter().chain(seats[..start].iter()).copied().collect()
}

fn post_blind(table: &mut Table, seat: u8, amount: u64) -> u64 {
    let stack = table.seats[seat as usize].stack;
    let pay = amount.min(stack);
    table.seats[seat as usize].stack = stack - pay;
    pay
}

pub fn start_hand(table: &mut Table, caller: &str, bank: &mut Bank) -> Result<Vec<Event>, PokerError> {
    if table.hand.is_some() {
        return Err(PokerError::HandInProgress(table.id));
    }
    let mut events = eject_depleted_bonds(table, bank)?;

    let caller_seat = find_seat_for_player(table, caller)?;
    let funded = table.funded_seats();
    if funded.len() < 2 {
        return Err(PokerError::NotEnoughPlayers(table.id));
    }
    if !funded.contains(&caller_seat) {
        return Err(PokerError::PlayerNotSeated);
    }

    let button = advance_button(table.button_seat, &funded);
    table.button_seat = button as i16;
    let (sb_seat, bb_seat) = assign_blinds(button, &funded);

    let hand_id = table.next_hand_id;
    table.next_hand_id = table.next_hand_id.checked_add(1).ok_or(PokerError::Overflow)?;

    let mut in_hand = [false; MAX_PLAYERS as usize];
    for &s in &funded {
        in_hand[s as usize] = true;
    }

    let sb_pay = post_blind(table, sb_seat, table.params.small_blind);
    let bb_pay = post_blind(table, bb_seat, table.params.big_blind);

    let mut street_commit = [0u64; MAX_PLAYERS as usize];
    let mut total_commit = [0u64; MAX_PLAYERS as usize];
    let mut all_in = [false; MAX_PLAYERS as usize];
    street_commit[sb_seat as usize] = sb_pay;
    total_commit[sb_seat as usize] = sb_pay;
    all_in[sb_seat as usize] = table.seats[sb_seat as usize].stack == 0;
    street_commit[bb_seat as usize] = street_commit[bb_seat as usize]
        .checked_add(bb_pay)
        .ok_or(PokerError::Overflow)?;
    total_commit[bb_seat as usize] = total_commit[bb_seat as usize]
        .checked_add(bb_pay)
        .ok_or(PokerError::Overflow)?;
    all_in[bb_seat as usize] = table.seats[bb_seat as usize].stack == 0;

    table.hand = Some(Hand {
        id: hand_id,
        phase: HandPhase::Shuffle,
        street: Street::Preflop,
        button,
        sb_seat,
        bb_seat,
        // Shuffle is an Await*-like phase for this invariant's purposes: the
        // real preflop actor is assigned once the dealer pipeline opens
        // betting (`submit_enc_share`), per spec's action-on/phase biconditional.
        action_on: -1,
        bet_to: table.params.big_blind,
        min_raise_size: table.params.big_blind,
        interval_id: 1,
        in_hand,
        folded: [false; MAX_PLAYERS as usize],
        all_in,
        street_commit,
        total_commit,
        last_interval_acted: [-1; MAX_PLAYERS as usize],
        board: Vec::new(),
        pots: Vec::new(),
        action_deadline: 0,
        dealer: None,
    });

    events.push(Event::HandStarted { table_id: table.id, hand_id, button });
    Ok(events)
}

pub fn init_dealer_hand(
    table: &mut Table,
    epoch: &ActiveEpoch,
    deck_size: u8,
    height: u64,
    dealer_timeout_blocks: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table_id))?;
    if hand.phase != HandPhase::Shuffle {
        return Err(PokerError::WrongPhase);
    }
    if hand.dealer.is_some() {
        return Err(PokerError::DealerAlreadyInitialized);
    }
    let (dealer_state, events) = DealerHandState::init(epoch, table_id, hand.id, deck_size, height, dealer_timeout_blocks)?;
    hand.dealer = Some(dealer_state);
    Ok(events)
}

pub fn submit_shuffle(
    table: &mut Table,
    shuffler_id: &str,
    round: u32,
    vk: &PreparedVerifyingKey<Bn254>,
    submission_bytes: &[u8],
    height: u64,
    dealer_timeout_blocks: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table_id))?;
    let hand_id = hand.id;
    let dealer = hand.dealer.as_mut().ok_or(PokerError::NoActiveDealerEpoch)?;
    Ok(dealer.submit_shuffle(shuffler_id, round, vk, submission_bytes, height, dealer_timeout_blocks, table_id, hand_id)?)
}

pub fn finalize_deck(table: &mut Table, height: u64, dealer_timeout_blocks: u64) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table_id))?;
    let hand_id = hand.id;
    let order = dealing_order(hand);
    let dealer = hand.dealer.as_mut().ok_or(PokerError::NoActiveDealerEpoch)?;
    Ok(dealer.finalize_deck(&order, height, dealer_timeout_blocks, table_id, hand_id)?)
}

#[allow(clippy::too_many_arguments)]
pub fn submit_enc_share(
    table: &mut Table,
    epoch: &ActiveEpoch,
    pos: u8,
    validator_id: &str,
    pk_player: &Point,
    enc_share: (Point, Point),
    proof: &EncryptedShareProof,
    now_unix: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let threshold = epoch.threshold;
    let action_timeout_secs = table.params.action_timeout_secs;

    let mut events;
    let hole_ready;
    {
        let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table_id))?;
        let hand_id = hand.id;
        let in_hand: Vec<u8> = (0..MAX_PLAYERS).filter(|&s| hand.in_hand[s as usize]).collect();
        let dealer = hand.dealer.as_mut().ok_or(PokerError::NoActiveDealerEpoch)?;
        events = dealer.submit_enc_share(pos, epoch, validator_id, pk_player, enc_share, proof, table_id, hand_id)?;
        hole_ready = dealer.hole_shares_ready(&in_hand, threshold);
    }

    if hole_ready {
        let hand = table.hand.as_mut().unwrap();
        events.push(Event::HoleCardsReady { table_id, hand_id: hand.id });
        hand.phase = HandPhase::Betting;
        let contenders = hand.contenders();
        hand.action_on = first_to_act_preflop(hand.bb_seat, &contenders) as i16;
        hand.action_deadline = now_unix.checked_add(action_timeout_secs).ok_or(PokerError::Overflow)?;
    }
    Ok(events)
}

#[allow(clippy::too_many_arguments)]
pub fn submit_pub_share(
    table: &mut Table,
    epoch: &ActiveEpoch,
    pos: u8,
    validator_id: &str,
    share: Point,
    proof: &ChaumPedersenProof,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table_id))?;
    let hand_id = hand.id;
    let dealer = hand.dealer.as_mut().ok_or(PokerError::NoActiveDealerEpoch)?;
    Ok(dealer.submit_pub_share(pos, epoch, validator_id, share, proof, table_id, hand_id)?)
}

pub(crate) fn owning_seat_and_round(hand: &Hand, pos: u8) -> Option<(u8, usize)> {
    let dealer = hand.dealer.as_ref()?;
    for s in 0..MAX_PLAYERS {
        for (round, &p) in dealer.hole_positions[s as usize].iter().enumerate() {
            if p == pos {
                return Some((s, round));
            }
        }
    }
    None
}

/// The lowest not-yet-revealed deck position among every contender's hole
/// positions, per spec's "ascending deck position over the hole positions of
/// all non-folded in-hand seats" rule — a minimum across all contenders, not
/// a seat-by-seat scan.
fn next_showdown_pos(hand: &Hand) -> Option<u8> {
    let dealer = hand.dealer.as_ref()?;
    hand.contenders()
        .iter()
        .flat_map(|&s| dealer.hole_positions[s as usize])
        .filter(|&pos| pos != NO_POSITION && !dealer.revealed.contains(&pos))
        .min()
}

fn arm_next_board_reveal(hand: &mut Hand, height: u64, dealer_timeout_blocks: u64) -> Result<(), PokerError> {
    let pos = hand.dealer.as_ref().unwrap().community_cursor + hand.board.len() as u8;
    hand.dealer.as_mut().unwrap().arm_reveal(pos, height, dealer_timeout_blocks)?;
    Ok(())
}

/// Arms the next showdown reveal if one remains; returns `false` once every
/// in-hand hole card is public, signalling the caller to settle.
fn arm_next_showdown_reveal(hand: &mut Hand, height: u64, dealer_timeout_blocks: u64) -> Result<bool, PokerError> {
    match next_showdown_pos(hand) {
        Some(pos) => {
            hand.dealer.as_mut().unwrap().arm_reveal(pos, height, dealer_timeout_blocks)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn open_betting_street(hand: &mut Hand, big_blind: u64, now_unix: u64, action_timeout_secs: u64) -> Result<(), PokerError> {
    hand.phase = HandPhase::Betting;
    for s in 0..MAX_PLAYERS as usize {
        hand.street_commit[s] = 0;
        hand.last_interval_acted[s] = -1;
    }
    hand.bet_to = 0;
    hand.min_raise_size = big_blind;
    hand.interval_id = hand.interval_id.checked_add(1).ok_or(PokerError::Overflow)?;
    let contenders = hand.contenders();
    hand.action_on = first_to_act_postflop(hand.button, &contenders) as i16;
    hand.action_deadline = now_unix.checked_add(action_timeout_secs).ok_or(PokerError::Overflow)?;
    Ok(())
}

/// Distributes `hand.total_commit` across side pots and ends the hand —
/// used both for an all-folded win (one contender, no comparison needed)
/// and a full showdown (`award_pot` falls back to rank comparison whenever
/// a pot's eligible set has more than one seat).
fn settle_pots(table: &mut Table) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let hand = table.hand.take().ok_or(PokerError::NoActiveHand(table_id))?;
    let hand_id = hand.id;
    let contenders = hand.contenders();

    let mut eligible_for_win = [false; MAX_PLAYERS as usize];
    for &s in &contenders {
        eligible_for_win[s as usize] = true;
    }
    let pots = compute_pots(&hand.total_commit, &eligible_for_win)?;

    let reason = if contenders.len() <= 1 { "all-folded" } else { "showdown" };
    let ranked: Vec<(u8, HandRank)> = if contenders.len() > 1 {
        let board = &hand.board;
        if board.len() != 5 {
            return Err(PokerError::WrongPhase);
        }
        let board_cards = [
            Card(board[0]),
            Card(board[1]),
            Card(board[2]),
            Card(board[3]),
            Card(board[4]),
        ];
        contenders
            .iter()
            .map(|&s| {
                let hole = table.seats[s as usize].hole.ok_or(PokerError::WrongPhase)?;
                let rank = handeval::best_hand([Card(hole[0]), Card(hole[1])], board_cards)?;
                Ok((s, rank))
            })
            .collect::<Result<Vec<_>, PokerError>>()?
    } else {
        Vec::new()
    };

    let mut events = Vec::new();
    if contenders.len() > 1 {
        events.push(Event::ShowdownReached { table_id, hand_id });
    }
    for pot in &pots {
        let shares = award_pot(pot, &ranked);
        let mut winner_seats: Vec<u8> = shares.iter().map(|(s, _)| *s).collect();
        winner_seats.sort_unstable();
        for &(seat, amount) in &shares {
            table.seats[seat as usize].stack = table.seats[seat as usize]
                .stack
                .checked_add(amount)
                .ok_or(PokerError::Overflow)?;
        }
        events.push(Event::PotAwarded {
            table_id,
            hand_id,
            amount: pot.amount,
            eligible_seats: seats_to_string(&pot.eligible),
            winner_seats: seats_to_string(&winner_seats),
        });
    }
    for seat in 0..MAX_PLAYERS as usize {
        table.seats[seat].hole = None;
    }
    events.push(Event::HandCompleted { table_id, hand_id, reason: reason.to_string() });
    Ok(events)
}

fn abort_and_refund(table: &mut Table) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let hand = table.hand.take().ok_or(PokerError::NoActiveHand(table_id))?;
    let hand_id = hand.id;
    for s in 0..MAX_PLAYERS as usize {
        let refund = hand.total_commit[s];
        if refund > 0 {
            table.seats[s].stack = table.seats[s].stack.checked_add(refund).ok_or(PokerError::Overflow)?;
        }
        table.seats[s].hole = None;
    }
    Ok(vec![Event::HandAborted { table_id, hand_id, reason: "dealer_pipeline_aborted".to_string() }])
}

/// Called once a betting street's completion conditions are met: refunds
/// any uncalled excess, ends the hand on an all-folded win, or arms the
/// next board/showdown reveal. Whether the *next* street opens for betting
/// or runs straight through to showdown is decided once that reveal
/// actually finishes, in [`on_board_card_revealed`].
fn on_street_complete(table: &mut Table, height: u64, dealer_timeout_blocks: u64) -> Result<Vec<Event>, PokerError> {
    let mut events = Vec::new();
    {
        let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table.id))?;
        if let Some((seat, refund)) = super::betting::uncalled_excess_refund(hand) {
            table.seats[seat as usize].stack = table.seats[seat as usize]
                .stack
                .checked_add(refund)
                .ok_or(PokerError::Overflow)?;
        }
    }

    let contenders = table.hand.as_ref().unwrap().contenders();
    if contenders.len() <= 1 {
        events.extend(settle_pots(table)?);
        return Ok(events);
    }

    let hand = table.hand.as_mut().unwrap();
    if hand.street == Street::River {
        hand.phase = HandPhase::AwaitShowdown;
        if arm_next_showdown_reveal(hand, height, dealer_timeout_blocks)? {
            return Ok(events);
        }
        events.extend(settle_pots(table)?);
        return Ok(events);
    }

    let next_street = hand.street.next().expect("non-river street has a next street");
    hand.street = next_street;
    hand.phase = next_street.await_phase();
    arm_next_board_reveal(hand, height, dealer_timeout_blocks)?;
    Ok(events)
}

fn street_start(street: Street) -> usize {
    match street {
        Street::Preflop | Street::Flop => 0,
        Street::Turn => 3,
        Street::River => 4,
    }
}

#[allow(clippy::too_many_arguments)]
fn on_board_card_revealed(
    table: &mut Table,
    card: u8,
    height: u64,
    dealer_timeout_blocks: u64,
    now_unix: u64,
    action_timeout_secs: u64,
    big_blind: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let mut events = Vec::new();
    let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table_id))?;
    let hand_id = hand.id;
    hand.board.push(card);
    let required = hand.street.required_board_len();

    if hand.board.len() < required {
        arm_next_board_reveal(hand, height, dealer_timeout_blocks)?;
        return Ok(events);
    }

    let start = street_start(hand.street);
    events.push(Event::StreetRevealed {
        table_id,
        hand_id,
        street: hand.street.name().to_string(),
        cards: hand.board[start..].to_vec(),
    });

    let contenders = hand.contenders();
    let chip_contenders = contenders.iter().filter(|&&s| !hand.all_in[s as usize]).count();

    if hand.street == Street::River {
        hand.phase = HandPhase::AwaitShowdown;
        if arm_next_showdown_reveal(hand, height, dealer_timeout_blocks)? {
            return Ok(events);
        }
        events.extend(settle_pots(table)?);
        return Ok(events);
    }

    if chip_contenders < 2 {
        let next_street = hand.street.next().expect("non-river street has a next street");
        hand.street = next_street;
        hand.phase = next_street.await_phase();
        arm_next_board_reveal(hand, height, dealer_timeout_blocks)?;
        return Ok(events);
    }

    open_betting_street(hand, big_blind, now_unix, action_timeout_secs)?;
    Ok(events)
}

fn on_showdown_card_revealed(
    table: &mut Table,
    pos: u8,
    card: u8,
    height: u64,
    dealer_timeout_blocks: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let mut events = Vec::new();
    let hand_id = table.hand.as_ref().ok_or(PokerError::NoActiveHand(table_id))?.id;
    let (seat, round) = owning_seat_and_round(table.hand.as_ref().unwrap(), pos).ok_or(PokerError::WrongPhase)?;

    let mut hole = table.seats[seat as usize].hole.unwrap_or([0u8; 2]);
    hole[round] = card;
    table.seats[seat as usize].hole = Some(hole);
    events.push(Event::HoleCardRevealed { table_id, hand_id, seat, pos, card });

    let hand = table.hand.as_mut().unwrap();
    if arm_next_showdown_reveal(hand, height, dealer_timeout_blocks)? {
        return Ok(events);
    }
    events.extend(settle_pots(table)?);
    Ok(events)
}

pub fn finalize_reveal(
    table: &mut Table,
    threshold: u32,
    height: u64,
    dealer_timeout_blocks: u64,
    now_unix: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let action_timeout_secs = table.params.action_timeout_secs;
    let big_blind = table.params.big_blind;

    let (pos, hand_id) = {
        let hand = table.hand.as_ref().ok_or(PokerError::NoActiveHand(table_id))?;
        let dealer = hand.dealer.as_ref().ok_or(PokerError::NoActiveDealerEpoch)?;
        let pos = dealer.expected_reveal_pos.ok_or(PokerError::WrongPhase)?;
        (pos, hand.id)
    };

    let (card, mut events) = {
        let hand = table.hand.as_mut().unwrap();
        let dealer = hand.dealer.as_mut().unwrap();
        dealer.finalize_reveal(pos, threshold, table_id, hand_id)?
    };

    let phase = table.hand.as_ref().unwrap().phase;
    match phase {
        HandPhase::AwaitFlop | HandPhase::AwaitTurn | HandPhase::AwaitRiver => {
            events.extend(on_board_card_revealed(
                table,
                card,
                height,
                dealer_timeout_blocks,
                now_unix,
                action_timeout_secs,
                big_blind,
            )?);
        }
        HandPhase::AwaitShowdown => {
            events.extend(on_showdown_card_revealed(table, pos, card, height, dealer_timeout_blocks)?);
        }
        _ => return Err(PokerError::WrongPhase),
    }
    Ok(events)
}

pub fn act(
    table: &mut Table,
    player: &str,
    action: Action,
    height: u64,
    dealer_timeout_blocks: u64,
    now_unix: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let seat = find_seat_for_player(table, player)?;
    let big_blind = table.params.big_blind;
    let action_timeout_secs = table.params.action_timeout_secs;
    let stack = table.seats[seat as usize].stack;

    let (hand_id, delta) = {
        let hand = table.hand.as_mut().ok_or(PokerError::NoActiveHand(table_id))?;
        if hand.phase != HandPhase::Betting {
            return Err(PokerError::WrongPhase);
        }
        if hand.action_on != seat as i16 {
            return Err(PokerError::NotYourTurn(seat));
        }
        let delta = apply_action(hand, seat, stack, action, big_blind)?;
        (hand.id, delta)
    };
    table.seats[seat as usize].stack = stack.checked_sub(delta).ok_or(PokerError::Overflow)?;

    let mut events = vec![Event::ActionApplied {
        table_id,
        hand_id,
        seat,
        action: action_name(&action).to_string(),
        amount: delta,
    }];

    let complete = {
        let hand = table.hand.as_mut().unwrap();
        advance_action(hand);
        hand.action_on == -1
    };

    if complete {
        events.extend(on_street_complete(table, height, dealer_timeout_blocks)?);
    } else {
        let hand = table.hand.as_mut().unwrap();
        hand.action_deadline = now_unix.checked_add(action_timeout_secs).ok_or(PokerError::Overflow)?;
    }
    Ok(events)
}

/// Applies the default action (fold if facing a bet, else check) for a seat
/// whose action deadline has passed, slashes its bond by the big blind into
/// the treasury, then lets the hand advance as usual. Returns no events (not
/// an error) when nothing is due yet, so callers can invoke this freely.
pub fn tick(
    table: &mut Table,
    now_unix: u64,
    height: u64,
    dealer_timeout_blocks: u64,
    bank: &mut Bank,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let big_blind = table.params.big_blind;
    let action_timeout_secs = table.params.action_timeout_secs;

    let due = match table.hand.as_ref() {
        Some(hand) if hand.phase == HandPhase::Betting && hand.action_on >= 0 => now_unix >= hand.action_deadline,
        _ => false,
    };
    if !due {
        return Ok(Vec::new());
    }

    let seat = table.hand.as_ref().unwrap().action_on as u8;
    let to_call = table.hand.as_ref().unwrap().to_call(seat);
    let default_action = if to_call > 0 { Action::Fold } else { Action::Check };
    let stack = table.seats[seat as usize].stack;

    let (hand_id, delta) = {
        let hand = table.hand.as_mut().unwrap();
        let delta = apply_action(hand, seat, stack, default_action, big_blind)?;
        (hand.id, delta)
    };
    table.seats[seat as usize].stack = stack.checked_sub(delta).ok_or(PokerError::Overflow)?;

    let mut events = vec![
        Event::TimeoutApplied { table_id, hand_id, seat },
        Event::ActionApplied {
            table_id,
            hand_id,
            seat,
            action: action_name(&default_action).to_string(),
            amount: delta,
        },
    ];

    let slash = big_blind.min(table.seats[seat as usize].bond);
    if slash > 0 {
        table.seats[seat as usize].bond -= slash;
        bank.credit(crate::staking::TREASURY_ACCOUNT, slash)?;
    }

    let complete = {
        let hand = table.hand.as_mut().unwrap();
        advance_action(hand);
        hand.action_on == -1
    };
    if complete {
        events.extend(on_street_complete(table, height, dealer_timeout_blocks)?);
    } else {
        let hand = table.hand.as_mut().unwrap();
        hand.action_deadline = now_unix.checked_add(action_timeout_secs).ok_or(PokerError::Overflow)?;
    }
    Ok(events)
}

/// Dealer-pipeline liveness timeout: dispatches to the shuffle, hole-share,
/// or public-reveal phase check depending on where the hand's dealer state
/// currently sits, and carries out the poker-side consequence (open
/// betting, finalize a reveal, or abort-and-refund) the same way a normal
/// `submit_*`/`finalize_*` transaction would.
pub fn dealer_timeout(
    table: &mut Table,
    epoch: &ActiveEpoch,
    bank: &mut Bank,
    staking: &mut Staking,
    height: u64,
    dealer_timeout_blocks: u64,
    now_unix: u64,
) -> Result<Vec<Event>, PokerError> {
    let table_id = table.id;
    let threshold = epoch.threshold;
    let big_blind = table.params.big_blind;
    let action_timeout_secs = table.params.action_timeout_secs;

    let hand_id = table.hand.as_ref().ok_or(PokerError::NoActiveHand(table_id))?.id;
    let phase = table.hand.as_ref().unwrap().phase;
    let deck_finalized = table
        .hand
        .as_ref()
        .unwrap()
        .dealer
        .as_ref()
        .ok_or(PokerError::NoActiveDealerEpoch)?
        .deck_finalized;
    let in_hand: Vec<u8> = (0..MAX_PLAYERS)
        .filter(|&s| table.hand.as_ref().unwrap().in_hand[s as usize])
        .collect();

    let mut events = Vec::new();

    if phase == HandPhase::Shuffle && !deck_finalized {
        let (outcome, dealer_events) = {
            let hand = table.hand.as_mut().unwrap();
            let dealer = hand.dealer.as_mut().unwrap();
            dealer.timeout_shuffle(bank, staking, threshold, height, dealer_timeout_blocks)?
        };
        events.extend(dealer_events);
        events.push(Event::DealerTimeoutApplied { table_id, hand_id, phase: "shuffle".to_string() });
        if outcome == TimeoutOutcome::Abort {
            events.extend(abort_and_refund(table)?);
        }
        return Ok(events);
    }

    if phase == HandPhase::Shuffle && deck_finalized {
        let (outcome, dealer_events) = {
            let hand = table.hand.as_mut().unwrap();
            let dealer = hand.dealer.as_mut().unwrap();
            dealer.timeout_hole_shares(bank, staking, epoch, &in_hand, threshold, height)?
        };
        events.extend(dealer_events);
        events.push(Event::DealerTimeoutApplied { table_id, hand_id, phase: "hole_shares".to_string() });
        match outcome {
            TimeoutOutcome::Abort => events.extend(abort_and_refund(table)?),
            TimeoutOutcome::Advance => {
                let hand = table.hand.as_mut().unwrap();
                hand.phase = HandPhase::Betting;
                let contenders = hand.contenders();
                hand.action_on = first_to_act_preflop(hand.bb_seat, &contenders) as i16;
                hand.action_deadline = now_unix.checked_add(action_timeout_secs).ok_or(PokerError::Overflow)?;
            }
            TimeoutOutcome::Continue => {}
        }
        return Ok(events);
    }

    if matches!(
        phase,
        HandPhase::AwaitFlop | HandPhase::AwaitTurn | HandPhase::AwaitRiver | HandPhase::AwaitShowdown
    ) {
        let (outcome, dealer_events) = {
            let hand = table.hand.as_mut().unwrap();
            let dealer = hand.dealer.as_mut().unwrap();
            dealer.timeout_reveal(bank, staking, epoch, threshold, height)?
        };
        events.extend(dealer_events);
        events.push(Event::DealerTimeoutApplied { table_id, hand_id, phase: "reveal".to_string() });
        match outcome {
            TimeoutOutcome::Abort => events.extend(abort_and_refund(table)?),
            TimeoutOutcome::Advance => {
                let pos = table
                    .hand
                    .as_ref()
                    .unwrap()
                    .dealer
                    .as_ref()
                    .unwrap()
                    .expected_reveal_pos
                    .ok_or(PokerError::WrongPhase)?;
                let (card, finalize_events) = {
                    let hand = table.hand.as_mut().unwrap();
                    let dealer = hand.dealer.as_mut().unwrap();
                    dealer.finalize_reveal(pos, threshold, table_id, hand_id)?
                };
                events.extend(finalize_events);
                if phase == HandPhase::AwaitShowdown {
                    events.extend(on_showdown_card_revealed(table, pos, card, height, dealer_timeout_blocks)?);
                } else {
                    events.extend(on_board_card_revealed(
                        table,
                        card,
                        height,
                        dealer_timeout_blocks,
                        now_unix,
                        action_timeout_secs,
                        big_blind,
                    )?);
                }
            }
            TimeoutOutcome::Continue => {}
        }
        return Ok(events);
    }

    Err(PokerError::WrongPhase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poker::types::TableParams;

    /// A single-member, threshold-1 dealer epoch — enough committee to drive
    /// a hand's dealer pipeline in tests without a real shuffle proof.
    fn dealer_epoch() -> (ActiveEpoch, crate::group::Scalar) {
        use crate::dealer::dkg::EpochMember;
        let secret = crate::group::Scalar::from(101u64);
        let public_key = crate::group::generator_mul(&secret);
        let member = EpochMember {
            validator_id: "v1".to_string(),
            member_index: 1,
            public_share: public_key,
        };
        (
            ActiveEpoch {
                id: 1,
                threshold: 1,
                public_key,
                transcript_root: [0u8; 32],
                members: vec![member],
                start_height: 0,
                slashed: Vec::new(),
            },
            secret,
        )
    }

    /// Drives a freshly `start_hand`-ed table through `init_dealer_hand` /
    /// `finalize_deck` / `submit_enc_share` up to `HandPhase::Betting`. The
    /// lone committee member's shuffle step is marked complete directly
    /// rather than submitted through a real Groth16 proof — this crate only
    /// ever verifies a shuffle, never proves one (see DESIGN.md), and
    /// `dealer::hand`'s own fixtures (e.g.
    /// `finalize_deck_assigns_hole_positions_starting_from_sb`) do the same.
    fn reach_betting_phase(table: &mut Table, now_unix: u64) {
        let (epoch, secret) = dealer_epoch();
        let member = epoch.members[0].clone();

        init_dealer_hand(table, &epoch, 8, 0, 10).unwrap();
        {
            let hand = table.hand.as_mut().unwrap();
            let dealer = hand.dealer.as_mut().unwrap();
            dealer.shuffle_step = dealer.live_quorum().len();
        }
        finalize_deck(table, 0, 10).unwrap();

        let (table_id, hand_id, community_cursor) = {
            let hand = table.hand.as_ref().unwrap();
            (table.id, hand.id, hand.dealer.as_ref().unwrap().community_cursor)
        };
        let k = crate::group::hash_to_scalar(
            crate::config::DOMAIN_DEALER_HAND_DERIVE,
            &[&epoch.id.to_be_bytes(), &table_id.to_be_bytes(), &hand_id.to_be_bytes()],
        );
        let x_hand = secret * k;
        let y_hand = crate::group::generator_mul(&x_hand);
        let g = crate::group::generator();
        let pk_player = crate::group::generator_mul(&crate::group::Scalar::from(7u64));
        let mut rng = rand::thread_rng();

        for pos in 0..community_cursor {
            let c1 = table.hand.as_ref().unwrap().dealer.as_ref().unwrap().deck[pos as usize].c1;
            let r = crate::group::random_scalar(&mut rng);
            let s = c1 * x_hand;
            let u = g * r;
            let v = s + pk_player * r;
            let proof = crate::group::chaum_pedersen::prove_encrypted_share(
                &mut rng, &x_hand, &r, &g, &c1, &pk_player, &y_hand, &u, &v,
            );
            submit_enc_share(table, &epoch, pos, &member.validator_id, &pk_player, (u, v), &proof, now_unix)
                .unwrap();
        }
    }

    fn params() -> TableParams {
        TableParams {
            max_players: 9,
            small_blind: 1,
            big_blind: 2,
            min_buy_in: 20,
            max_buy_in: 200,
            action_timeout_secs: 30,
            dealer_timeout_secs: 30,
            player_bond: 10,
            rake_bps: 0,
        }
    }

    #[test]
    fn sit_debits_buy_in_plus_bond_from_the_bank() {
        let (mut table, _) = create_table(1, "alice", "main".to_string(), params()).unwrap();
        let mut bank = Bank::new();
        bank.credit("alice", 100).unwrap();
        sit(&mut table, 0, "alice", 50, [1u8; 32], &mut bank).unwrap();
        assert_eq!(bank.balance("alice"), 40);
        assert_eq!(table.seats[0].stack, 50);
        assert_eq!(table.seats[0].bond, 10);
    }

    #[test]
    fn start_hand_requires_two_funded_seats() {
        let (mut table, _) = create_table(1, "alice", "main".to_string(), params()).unwrap();
        let mut bank = Bank::new();
        bank.credit("alice", 100).unwrap();
        sit(&mut table, 0, "alice", 50, [1u8; 32], &mut bank).unwrap();
        let err = start_hand(&mut table, "alice", &mut bank).unwrap_err();
        assert_eq!(err, PokerError::NotEnoughPlayers(1));
    }

    #[test]
    fn start_hand_posts_blinds_as_commitments_and_leaves_dealer_unset() {
        let (mut table, _) = create_table(1, "alice", "main".to_string(), params()).unwrap();
        let mut bank = Bank::new();
        bank.credit("alice", 100).unwrap();
        bank.credit("bob", 100).unwrap();
        sit(&mut table, 0, "alice", 50, [1u8; 32], &mut bank).unwrap();
        sit(&mut table, 1, "bob", 50, [2u8; 32], &mut bank).unwrap();

        let events = start_hand(&mut table, "alice", &mut bank).unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::HandStarted { .. })));

        let hand = table.hand.as_ref().unwrap();
        assert_eq!(hand.phase, HandPhase::Shuffle);
        assert_eq!(hand.action_on, -1);
        assert!(hand.dealer.is_none());
        assert_eq!(hand.sb_seat, 0);
        assert_eq!(hand.bb_seat, 1);
        assert_eq!(table.seats[0].stack, 49);
        assert_eq!(table.seats[1].stack, 48);
    }

    #[test]
    fn all_folded_hand_awards_the_whole_pot_without_a_showdown() {
        let (mut table, _) = create_table(1, "alice", "main".to_string(), params()).unwrap();
        let mut bank = Bank::new();
        bank.credit("alice", 100).unwrap();
        bank.credit("bob", 100).unwrap();
        sit(&mut table, 0, "alice", 50, [1u8; 32], &mut bank).unwrap();
        sit(&mut table, 1, "bob", 50, [2u8; 32], &mut bank).unwrap();
        start_hand(&mut table, "alice", &mut bank).unwrap();
        reach_betting_phase(&mut table, 0);

        // Heads-up: seat 0 is both button and SB, acts first preflop.
        let events = act(&mut table, "alice", Action::Fold, 0, 10, 0).unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::HandCompleted { reason, .. } if reason == "all-folded")));
        assert!(table.hand.is_none());
        // Pot (1 + 2 = 3) goes entirely to bob.
        assert_eq!(table.seats[1].stack, 51);
    }

    #[test]
    fn tick_applies_default_action_and_slashes_bond_into_treasury() {
        let (mut table, _) = create_table(1, "alice", "main".to_string(), params()).unwrap();
        let mut bank = Bank::new();
        bank.credit("alice", 100).unwrap();
        bank.credit("bob", 100).unwrap();
        sit(&mut table, 0, "alice", 50, [1u8; 32], &mut bank).unwrap();
        sit(&mut table, 1, "bob", 50, [2u8; 32], &mut bank).unwrap();
        start_hand(&mut table, "alice", &mut bank).unwrap();
        reach_betting_phase(&mut table, 0);

        let events = tick(&mut table, 1_000, 0, 10, &mut bank).unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::TimeoutApplied { .. })));
        assert_eq!(table.seats[0].bond, 8);
        assert_eq!(bank.balance(crate::staking::TREASURY_ACCOUNT), 2);
    }

    #[test]
    fn next_showdown_pos_is_the_minimum_across_all_contenders_not_per_seat() {
        // Three seats, dealing order [1, 2, 0]: hole_positions[0] = [2, 5]
        // (Alice), hole_positions[1] = [0, 3] (Bob, folded), hole_positions[2]
        // = [1, 4] (Charlie). Bob's positions are lower than Alice's and
        // Charlie's individually, but Bob is out of the hand — the real
        // answer is the lowest position among Alice's and Charlie's own
        // positions (1), not the lowest position scanned seat-by-seat (2).
        let mut in_hand = [false; MAX_PLAYERS as usize];
        let mut folded = [false; MAX_PLAYERS as usize];
        in_hand[0] = true;
        in_hand[1] = true;
        in_hand[2] = true;
        folded[1] = true;

        let mut hole_positions = [[NO_POSITION; 2]; MAX_PLAYERS as usize];
        hole_positions[0] = [2, 5];
        hole_positions[1] = [0, 3];
        hole_positions[2] = [1, 4];

        let dealer = DealerHandState {
            epoch_id: 1,
            pk_hand: crate::group::identity(),
            deck_size: 6,
            deck: Vec::new(),
            shuffle_order: Vec::new(),
            shuffle_step: 0,
            deck_finalized: true,
            hole_positions,
            community_cursor: 6,
            pub_shares: Default::default(),
            enc_shares: Default::default(),
            revealed: Default::default(),
            shuffle_deadline: 0,
            hole_shares_deadline: 0,
            reveal_deadline: 0,
            expected_reveal_pos: None,
            slashed_this_hand: Default::default(),
            hand_public_shares: Default::default(),
        };

        let hand = Hand {
            id: 1,
            phase: HandPhase::AwaitShowdown,
            street: Street::River,
            button: 0,
            sb_seat: 1,
            bb_seat: 2,
            action_on: -1,
            bet_to: 0,
            min_raise_size: 0,
            interval_id: 0,
            in_hand,
            folded,
            all_in: [false; MAX_PLAYERS as usize],
            street_commit: [0; MAX_PLAYERS as usize],
            total_commit: [0; MAX_PLAYERS as usize],
            last_interval_acted: [-1; MAX_PLAYERS as usize],
            board: Vec::new(),
            pots: Vec::new(),
            action_deadline: 0,
            dealer: Some(dealer),
        };

        assert_eq!(next_showdown_pos(&hand), Some(1));
    }

    #[test]
    fn leave_refunds_stack_and_bond_and_frees_the_seat() {
        let (mut table, _) = create_table(1, "alice", "main".to_string(), params()).unwrap();
        let mut bank = Bank::new();
        bank.credit("alice", 100).unwrap();
        sit(&mut table, 0, "alice", 50, [1u8; 32], &mut bank).unwrap();
        leave(&mut table, "alice", &mut bank).unwrap();
        assert_eq!(bank.balance("alice"), 100);
        assert!(!table.seats[0].is_occupied());
    }
}
