//! Table, seat, and hand records. Seats are a fixed nine-slot array per
//! table (vacant seats carry `player: None`) so seat indices are stable
//! identifiers rather than positions into a variable-length vector.

use crate::config::MAX_PLAYERS;
use crate::dealer::hand::DealerHandState;

pub type PlayerId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    pub fn next(self) -> Option<Street> {
        match self {
            Street::Preflop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River => None,
        }
    }

    /// Cumulative board length once this street's cards are all public.
    pub fn required_board_len(self) -> usize {
        match self {
            Street::Preflop => 0,
            Street::Flop => 3,
            Street::Turn => 4,
            Street::River => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Street::Preflop => "preflop",
            Street::Flop => "flop",
            Street::Turn => "turn",
            Street::River => "river",
        }
    }

    pub fn await_phase(self) -> HandPhase {
        match self {
            Street::Preflop => HandPhase::Betting,
            Street::Flop => HandPhase::AwaitFlop,
            Street::Turn => HandPhase::AwaitTurn,
            Street::River => HandPhase::AwaitRiver,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandPhase {
    Shuffle,
    Betting,
    AwaitFlop,
    AwaitTurn,
    AwaitRiver,
    AwaitShowdown,
    Showdown,
}

#[derive(Clone, Debug)]
pub struct TableParams {
    pub max_players: u8,
    pub small_blind: u64,
    pub big_blind: u64,
    pub min_buy_in: u64,
    pub max_buy_in: u64,
    pub action_timeout_secs: u64,
    pub dealer_timeout_secs: u64,
    pub player_bond: u64,
    pub rake_bps: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Seat {
    pub player: Option<PlayerId>,
    pub pk_player: Option<[u8; 32]>,
    pub stack: u64,
    pub bond: u64,
    pub hole: Option<[u8; 2]>,
}

impl Seat {
    pub fn is_occupied(&self) -> bool {
        self.player.is_some()
    }
}

/// One peeled/merged side pot: an amount and the sorted seat indices
/// eligible to win it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pot {
    pub amount: u64,
    pub eligible: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Hand {
    pub id: u64,
    pub phase: HandPhase,
    pub street: Street,
    pub button: u8,
    pub sb_seat: u8,
    pub bb_seat: u8,
    pub action_on: i16,
    pub bet_to: u64,
    pub min_raise_size: u64,
    pub interval_id: u64,
    pub in_hand: [bool; MAX_PLAYERS as usize],
    pub folded: [bool; MAX_PLAYERS as usize],
    pub all_in: [bool; MAX_PLAYERS as usize],
    pub street_commit: [u64; MAX_PLAYERS as usize],
    pub total_commit: [u64; MAX_PLAYERS as usize],
    pub last_interval_acted: [i64; MAX_PLAYERS as usize],
    pub board: Vec<u8>,
    pub pots: Vec<Pot>,
    pub action_deadline: u64,
    /// `None` from `start_hand` until the paired `dealer/init_hand`
    /// transaction runs; `Some` for the remainder of the hand.
    pub dealer: Option<DealerHandState>,
}

impl Hand {
    pub fn contenders(&self) -> Vec<u8> {
        (0..MAX_PLAYERS)
            .filter(|&s| self.in_hand[s as usize] && !self.folded[s as usize])
            .collect()
    }

    pub fn to_call(&self, seat: u8) -> u64 {
        self.bet_to.saturating_sub(self.street_commit[seat as usize])
    }
}

#[derive(Clone, Debug)]
pub struct Table {
    pub id: u64,
    pub creator: PlayerId,
    pub label: String,
    pub params: TableParams,
    pub seats: [Seat; MAX_PLAYERS as usize],
    pub next_hand_id: u64,
    /// -1 when no hand has been played yet.
    pub button_seat: i16,
    pub hand: Option<Hand>,
}

impl Table {
    pub fn occupied_seats(&self) -> Vec<u8> {
        (0..MAX_PLAYERS)
            .filter(|&s| self.seats[s as usize].is_occupied())
            .collect()
    }

    pub fn funded_seats(&self) -> Vec<u8> {
        self.occupied_seats()
            .into_iter()
            .filter(|&s| self.seats[s as usize].stack > 0)
            .collect()
    }
}
