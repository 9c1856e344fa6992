//! The stable event taxonomy every component appends to the ordered
//! per-transaction event stream. `attributes()` renders each event as a
//! sorted `(key, value)` list: event attribute ordering must be
//! deterministic, and sorting by attribute key at render time is simpler
//! than hand-ordering every variant's fields.

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    AccountKeyRegistered { account: String },
    BankMinted { to: String, amount: u64 },
    BankSent { from: String, to: String, amount: u64 },
    TableCreated { table_id: u64, creator: String },
    PlayerSat { table_id: u64, seat: u8, player: String },
    PlayerLeft { table_id: u64, seat: u8, player: String },
    HandStarted { table_id: u64, hand_id: u64, button: u8 },
    HoleCardAssigned { table_id: u64, hand_id: u64, seat: u8 },
    StreetRevealed { table_id: u64, hand_id: u64, street: String, cards: Vec<u8> },
    ActionApplied { table_id: u64, hand_id: u64, seat: u8, action: String, amount: u64 },
    ShowdownReached { table_id: u64, hand_id: u64 },
    PotAwarded { table_id: u64, hand_id: u64, amount: u64, eligible_seats: String, winner_seats: String },
    HandCompleted { table_id: u64, hand_id: u64, reason: String },
    HandAborted { table_id: u64, hand_id: u64, reason: String },
    ValidatorRegistered { validator_id: String },
    ValidatorSlashed { validator_id: String, amount: u64, reason: String },
    DealerEpochBegun { epoch_id: u64, committee_size: u32, threshold: u32 },
    DKGCommitAccepted { epoch_id: u64, dealer_id: String },
    DKGComplaintAccepted { epoch_id: u64, dealer_id: String, kind: String },
    DKGShareRevealed { epoch_id: u64, dealer_id: String, to_id: String },
    DealerEpochFinalized { epoch_id: u64, qual_count: u32 },
    DealerEpochAborted { epoch_id: u64, reason: String },
    DealerHandInitialized { table_id: u64, hand_id: u64, epoch_id: u64 },
    ShuffleAccepted { table_id: u64, hand_id: u64, round: u32, shuffler_id: String },
    DeckFinalized { table_id: u64, hand_id: u64 },
    EncShareAccepted { table_id: u64, hand_id: u64, pos: u8, validator_id: String },
    HoleCardsReady { table_id: u64, hand_id: u64 },
    PubShareAccepted { table_id: u64, hand_id: u64, pos: u8, validator_id: String },
    RevealFinalized { table_id: u64, hand_id: u64, pos: u8, card: u8 },
    HoleCardRevealed { table_id: u64, hand_id: u64, seat: u8, pos: u8, card: u8 },
    TimeoutApplied { table_id: u64, hand_id: u64, seat: u8 },
    PlayerEjected { table_id: u64, seat: u8, player: String },
    DealerTimeoutApplied { table_id: u64, hand_id: u64, phase: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::AccountKeyRegistered { .. } => "AccountKeyRegistered",
            Event::BankMinted { .. } => "BankMinted",
            Event::BankSent { .. } => "BankSent",
            Event::TableCreated { .. } => "TableCreated",
            Event::PlayerSat { .. } => "PlayerSat",
            Event::PlayerLeft { .. } => "PlayerLeft",
            Event::HandStarted { .. } => "HandStarted",
            Event::HoleCardAssigned { .. } => "HoleCardAssigned",
            Event::StreetRevealed { .. } => "StreetRevealed",
            Event::ActionApplied { .. } => "ActionApplied",
            Event::ShowdownReached { .. } => "ShowdownReached",
            Event::PotAwarded { .. } => "PotAwarded",
            Event::HandCompleted { .. } => "HandCompleted",
            Event::HandAborted { .. } => "HandAborted",
            Event::ValidatorRegistered { .. } => "ValidatorRegistered",
            Event::ValidatorSlashed { .. } => "ValidatorSlashed",
            Event::DealerEpochBegun { .. } => "DealerEpochBegun",
            Event::DKGCommitAccepted { .. } => "DKGCommitAccepted",
            Event::DKGComplaintAccepted { .. } => "DKGComplaintAccepted",
            Event::DKGShareRevealed { .. } => "DKGShareRevealed",
            Event::DealerEpochFinalized { .. } => "DealerEpochFinalized",
            Event::DealerEpochAborted { .. } => "DealerEpochAborted",
            Event::DealerHandInitialized { .. } => "DealerHandInitialized",
            Event::ShuffleAccepted { .. } => "ShuffleAccepted",
            Event::DeckFinalized { .. } => "DeckFinalized",
            Event::EncShareAccepted { .. } => "EncShareAccepted",
            Event::HoleCardsReady { .. } => "HoleCardsReady",
            Event::PubShareAccepted { .. } => "PubShareAccepted",
            Event::RevealFinalized { .. } => "RevealFinalized",
            Event::HoleCardRevealed { .. } => "HoleCardRevealed",
            Event::TimeoutApplied { .. } => "TimeoutApplied",
            Event::PlayerEjected { .. } => "PlayerEjected",
            Event::DealerTimeoutApplied { .. } => "DealerTimeoutApplied",
        }
    }

    /// Attribute map sorted by key, used both for query/log rendering and
    /// for folding events into the canonical state-hash transcript.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        macro_rules! put {
            ($($k:literal => $v:expr),* $(,)?) => {
                $(m.insert($k.to_string(), $v.to_string());)*
            };
        }
        match self {
            Event::AccountKeyRegistered { account } => put!("account" => account),
            Event::BankMinted { to, amount } => put!("to" => to, "amount" => amount),
            Event::BankSent { from, to, amount } => {
                put!("from" => from, "to" => to, "amount" => amount)
            }
            Event::TableCreated { table_id, creator } => {
                put!("table_id" => table_id, "creator" => creator)
            }
            Event::PlayerSat { table_id, seat, player } => {
                put!("table_id" => table_id, "seat" => seat, "player" => player)
            }
            Event::PlayerLeft { table_id, seat, player } => {
                put!("table_id" => table_id, "seat" => seat, "player" => player)
            }
            Event::HandStarted { table_id, hand_id, button } => {
                put!("table_id" => table_id, "hand_id" => hand_id, "button" => button)
            }
            Event::HoleCardAssigned { table_id, hand_id, seat } => {
                put!("table_id" => table_id, "hand_id" => hand_id, "seat" => seat)
            }
            Event::StreetRevealed { table_id, hand_id, street, cards } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "street" => street,
                "cards" => cards.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",")
            ),
            Event::ActionApplied { table_id, hand_id, seat, action, amount } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "seat" => seat,
                "action" => action,
                "amount" => amount
            ),
            Event::ShowdownReached { table_id, hand_id } => {
                put!("table_id" => table_id, "hand_id" => hand_id)
            }
            Event::PotAwarded { table_id, hand_id, amount, eligible_seats, winner_seats } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "amount" => amount,
                "eligible_seats" => eligible_seats,
                "winner_seats" => winner_seats
            ),
            Event::HandCompleted { table_id, hand_id, reason } => {
                put!("table_id" => table_id, "hand_id" => hand_id, "reason" => reason)
            }
            Event::HandAborted { table_id, hand_id, reason } => {
                put!("table_id" => table_id, "hand_id" => hand_id, "reason" => reason)
            }
            Event::ValidatorRegistered { validator_id } => put!("validator_id" => validator_id),
            Event::ValidatorSlashed { validator_id, amount, reason } => put!(
                "validator_id" => validator_id,
                "amount" => amount,
                "reason" => reason
            ),
            Event::DealerEpochBegun { epoch_id, committee_size, threshold } => put!(
                "epoch_id" => epoch_id,
                "committee_size" => committee_size,
                "threshold" => threshold
            ),
            Event::DKGCommitAccepted { epoch_id, dealer_id } => {
                put!("epoch_id" => epoch_id, "dealer_id" => dealer_id)
            }
            Event::DKGComplaintAccepted { epoch_id, dealer_id, kind } => {
                put!("epoch_id" => epoch_id, "dealer_id" => dealer_id, "kind" => kind)
            }
            Event::DKGShareRevealed { epoch_id, dealer_id, to_id } => {
                put!("epoch_id" => epoch_id, "dealer_id" => dealer_id, "to_id" => to_id)
            }
            Event::DealerEpochFinalized { epoch_id, qual_count } => {
                put!("epoch_id" => epoch_id, "qual_count" => qual_count)
            }
            Event::DealerEpochAborted { epoch_id, reason } => {
                put!("epoch_id" => epoch_id, "reason" => reason)
            }
            Event::DealerHandInitialized { table_id, hand_id, epoch_id } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "epoch_id" => epoch_id
            ),
            Event::ShuffleAccepted { table_id, hand_id, round, shuffler_id } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "round" => round,
                "shuffler_id" => shuffler_id
            ),
            Event::DeckFinalized { table_id, hand_id } => {
                put!("table_id" => table_id, "hand_id" => hand_id)
            }
            Event::EncShareAccepted { table_id, hand_id, pos, validator_id } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "pos" => pos,
                "validator_id" => validator_id
            ),
            Event::HoleCardsReady { table_id, hand_id } => {
                put!("table_id" => table_id, "hand_id" => hand_id)
            }
            Event::PubShareAccepted { table_id, hand_id, pos, validator_id } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "pos" => pos,
                "validator_id" => validator_id
            ),
            Event::RevealFinalized { table_id, hand_id, pos, card } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "pos" => pos,
                "card" => card
            ),
            Event::HoleCardRevealed { table_id, hand_id, seat, pos, card } => put!(
                "table_id" => table_id,
                "hand_id" => hand_id,
                "seat" => seat,
                "pos" => pos,
                "card" => card
            ),
            Event::TimeoutApplied { table_id, hand_id, seat } => {
                put!("table_id" => table_id, "hand_id" => hand_id, "seat" => seat)
            }
            Event::PlayerEjected { table_id, seat, player } => {
                put!("table_id" => table_id, "seat" => seat, "player" => player)
            }
            Event::DealerTimeoutApplied { table_id, hand_id, phase } => {
                put!("table_id" => table_id, "hand_id" => hand_id, "phase" => phase)
            }
        }
    }
}
