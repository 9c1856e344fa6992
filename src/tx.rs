//! Transaction envelope, payload decoding, and the top-level dispatcher.
//!
//! Every entry point funnels through [`apply_transaction`]: it clones the
//! whole [`State`], runs one transaction's checks and mutations against the
//! clone, and only swaps it into place once every check has passed. A
//! failing transaction therefore leaves `state` byte-identical to before the
//! call — no event emitted, no nonce consumed, no partial mutation — without
//! every handler having to hand-roll its own rollback path.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{self, AuthError};
use crate::bank::BankError;
use crate::dealer::dkg::ActiveEpoch;
use crate::dealer::{DealerError, ShareMsg};
use crate::events::Event;
use crate::group::chaum_pedersen::{ChaumPedersenProof, EncryptedShareProof};
use crate::group::{self, GroupError, Point, Scalar};
use crate::handeval::HandEvalError;
use crate::poker::betting::Action;
use crate::poker::engine;
use crate::poker::types::TableParams;
use crate::poker::PokerError;
use crate::shuffle::{self, ShuffleError};
use crate::staking::{StakingError, ValidatorStatus};
use crate::state::State;

/// One signed transaction. `value` is the opaque, already-encoded payload
/// (JSON bytes in this crate); sign-bytes hash it without caring what it
/// decodes to, so a new transaction type only needs a new payload struct and
/// a new dispatch arm, never a change to the envelope or the signature
/// scheme.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub tx_type: String,
    pub value: Vec<u8>,
    pub nonce: String,
    pub signer: String,
    pub sig: [u8; 64],
}

/// Outcome of one transaction: a stable numeric code (0 = success), the
/// events it emitted (empty on failure), and a human-readable log message
/// on failure. Mirrors spec's "code 0 + events on success, code != 0 + log
/// on failure" propagation policy exactly — there is no partial-success
/// representation.
#[derive(Clone, Debug)]
pub struct TxResult {
    pub code: u32,
    pub events: Vec<Event>,
    pub log: Option<String>,
}

#[derive(Debug, Error)]
pub enum TxError {
    #[error("unknown transaction type: {0}")]
    UnknownType(String),
    #[error("payload is not valid JSON for this transaction type")]
    MalformedPayload,
    #[error("base64-encoded field is malformed")]
    MalformedBase64,
    #[error("{0}")]
    Validation(&'static str),
    #[error("signer is not authorized to submit this transaction")]
    Unauthorized,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Staking(#[from] StakingError),
    #[error(transparent)]
    Dealer(#[from] DealerError),
    #[error(transparent)]
    Poker(#[from] PokerError),
    #[error(transparent)]
    Shuffle(#[from] ShuffleError),
    #[error(transparent)]
    HandEval(#[from] HandEvalError),
}

impl TxError {
    /// Stable numeric code grouped by the error-kind taxonomy: 1xx
    /// structural, 2xx auth, 3xx pre-condition, 4xx arithmetic, 5xx proof,
    /// 6xx liveness, 7xx capacity.
    pub fn code(&self) -> u32 {
        match self {
            TxError::UnknownType(_) => 100,
            TxError::MalformedPayload => 101,
            TxError::MalformedBase64 => 102,
            TxError::Group(_) => 103,
            TxError::Validation(_) => 200,
            TxError::Unauthorized => 201,
            TxError::Auth(_) => 202,
            TxError::Bank(BankError::Overflow(_)) => 400,
            TxError::Bank(_) => 300,
            TxError::Staking(StakingError::BondOverflow(_)) => 400,
            TxError::Staking(_) => 300,
            TxError::Poker(PokerError::Overflow) => 400,
            TxError::Poker(PokerError::DeadlineNotPassed) => 600,
            TxError::Poker(_) => 300,
            TxError::Dealer(DealerError::Overflow) => 400,
            TxError::Dealer(
                DealerError::BadShareSignature
                | DealerError::ShuffleVerifyFailed
                | DealerError::ShareProofFailed
                | DealerError::UndecodableCard,
            ) => 500,
            TxError::Dealer(
                DealerError::CommitDeadlinePassed
                | DealerError::NotInComplaintWindow
                | DealerError::NotInRevealWindow
                | DealerError::CommitDeadlineNotPassed
                | DealerError::RevealDeadlineNotPassed
                | DealerError::ShuffleDeadlineNotPassed
                | DealerError::HoleSharesDeadlineNotPassed
                | DealerError::DealerRevealDeadlineNotPassed
                | DealerError::NotEnoughPubShares(_),
            ) => 600,
            TxError::Dealer(
                DealerError::CommitteeTooLarge
                | DealerError::InvalidThreshold
                | DealerError::InsufficientValidators
                | DealerError::BelowThreshold
                | DealerError::ShuffleChainIncomplete,
            ) => 700,
            TxError::Dealer(_) => 300,
            TxError::Shuffle(ShuffleError::VerifyFailed) => 500,
            TxError::Shuffle(_) => 100,
            TxError::HandEval(_) => 300,
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(value: &[u8]) -> Result<T, TxError> {
    serde_json::from_slice(value).map_err(|_| TxError::MalformedPayload)
}

fn decode_b64(s: &str) -> Result<Vec<u8>, TxError> {
    STANDARD.decode(s).map_err(|_| TxError::MalformedBase64)
}

fn decode_b64_array<const N: usize>(s: &str) -> Result<[u8; N], TxError> {
    let bytes = decode_b64(s)?;
    bytes.try_into().map_err(|_| TxError::MalformedBase64)
}

fn decode_point_b64(s: &str) -> Result<Point, TxError> {
    Ok(group::decode_point(&decode_b64(s)?)?)
}

fn decode_scalar_b64(s: &str) -> Result<Scalar, TxError> {
    Ok(group::decode_scalar(&decode_b64(s)?)?)
}

/// Authenticates `env` against an already-registered account key.
fn authorize_account(state: &mut State, env: &Envelope) -> Result<(), TxError> {
    auth::authenticate(&state.keys, &mut state.nonces, &env.tx_type, &env.nonce, &env.signer, &env.value, &env.sig)?;
    Ok(())
}

/// Authenticates `env` against the signer's on-file validator key. Does not
/// itself check `ValidatorStatus` — callers that need an active (unjailed)
/// signer check that separately, since a handful of transactions
/// (`staking/unjail`, for instance) are legitimately submitted by a jailed
/// validator.
fn authorize_validator(state: &mut State, env: &Envelope) -> Result<(), TxError> {
    let pubkey = state
        .staking
        .get(&env.signer)
        .map(|v| v.public_key)
        .ok_or(AuthError::UnknownSigner)?;
    auth::authenticate_with_key(&mut state.nonces, &env.tx_type, &env.nonce, &env.signer, &env.value, &env.sig, &pubkey)?;
    Ok(())
}

fn require_active_validator(state: &State, signer: &str) -> Result<(), TxError> {
    match state.staking.get(signer) {
        Some(v) if v.status == ValidatorStatus::Active => Ok(()),
        _ => Err(TxError::Unauthorized),
    }
}

fn active_epoch_cloned(state: &State) -> Result<ActiveEpoch, TxError> {
    state
        .dealer
        .active_epoch
        .clone()
        .ok_or(PokerError::NoActiveDealerEpoch.into())
}

// ---------------------------------------------------------------------
// Payloads. Field names follow the wire's camelCase convention; binary
// fields travel as base64 strings. `commitments`/`pkPlayer`/etc. decode to
// group elements or raw byte arrays only inside the handler that consumes
// them, never in the payload struct itself — the payload is the untrusted
// shape, not the validated value.
// ---------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterAccountPayload {
    account: String,
    pub_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintPayload {
    to: String,
    amount: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendPayload {
    from: String,
    to: String,
    amount: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTablePayload {
    creator: String,
    small_blind: u64,
    big_blind: u64,
    min_buy_in: u64,
    max_buy_in: u64,
    action_timeout_secs: u64,
    dealer_timeout_secs: u64,
    player_bond: u64,
    rake_bps: u32,
    max_players: u8,
    label: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SitPayload {
    player: String,
    table_id: u64,
    seat: u8,
    buy_in: u64,
    pk_player: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartHandPayload {
    caller: String,
    table_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActPayload {
    player: String,
    table_id: u64,
    action: String,
    amount: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeavePayload {
    player: String,
    table_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickPayload {
    table_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterValidatorPayload {
    validator_id: String,
    pub_key: String,
    power: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BondPayload {
    validator_id: String,
    amount: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnjailPayload {
    validator_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeginEpochPayload {
    epoch_id: Option<u64>,
    committee_size: u32,
    threshold: u32,
    rand_epoch: Option<String>,
    commit_blocks: u64,
    complaint_blocks: u64,
    reveal_blocks: u64,
    finalize_blocks: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DkgCommitPayload {
    epoch_id: u64,
    dealer_id: String,
    commitments: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DkgComplaintMissingPayload {
    epoch_id: u64,
    complainer_id: String,
    dealer_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareMsgPayload {
    dealer_id: String,
    to_id: String,
    share: String,
    sig: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DkgComplaintInvalidPayload {
    epoch_id: u64,
    complainer_id: String,
    dealer_id: String,
    share_msg: ShareMsgPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DkgShareRevealPayload {
    epoch_id: u64,
    dealer_id: String,
    to_id: String,
    share: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpochIdPayload {
    epoch_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitHandPayload {
    table_id: u64,
    hand_id: u64,
    epoch_id: u64,
    deck_size: Option<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitShufflePayload {
    table_id: u64,
    hand_id: u64,
    round: u32,
    shuffler_id: String,
    proof_shuffle: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableHandPayload {
    table_id: u64,
    hand_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitPubSharePayload {
    table_id: u64,
    hand_id: u64,
    pos: u8,
    validator_id: String,
    pub_share: String,
    proof_share: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitEncSharePayload {
    table_id: u64,
    hand_id: u64,
    pos: u8,
    validator_id: String,
    pk_player: String,
    enc_share: String,
    proof_enc_share: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeRevealPayload {
    table_id: u64,
    hand_id: u64,
    pos: u8,
}

fn require_table<'a>(state: &'a mut State, table_id: u64) -> Result<&'a mut crate::poker::Table, TxError> {
    state.tables.get_mut(&table_id).ok_or(PokerError::UnknownTable(table_id).into())
}

fn require_hand_id(table: &crate::poker::Table, hand_id: u64) -> Result<(), TxError> {
    match table.hand.as_ref() {
        Some(hand) if hand.id == hand_id => Ok(()),
        _ => Err(TxError::Validation("handId does not match the table's active hand")),
    }
}

// ---------------------------------------------------------------------
// Handlers, one per transaction type.
// ---------------------------------------------------------------------

fn apply_register_account(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: RegisterAccountPayload = decode_payload(&env.value)?;
    if env.signer != p.account {
        return Err(TxError::Validation("signer must match the account being registered"));
    }
    let pubkey: [u8; 32] = decode_b64_array(&p.pub_key)?;
    auth::authenticate_with_key(&mut state.nonces, &env.tx_type, &env.nonce, &env.signer, &env.value, &env.sig, &pubkey)?;
    state.keys.register(&p.account, pubkey)?;
    Ok(vec![Event::AccountKeyRegistered { account: p.account }])
}

fn apply_mint(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: MintPayload = decode_payload(&env.value)?;
    authorize_validator(state, env)?;
    require_active_validator(state, &env.signer)?;
    if let Some(authority) = state.chain_params.mint_authority.clone() {
        if authority != env.signer {
            return Err(TxError::Unauthorized);
        }
    }
    state.bank.credit(&p.to, p.amount)?;
    Ok(vec![Event::BankMinted { to: p.to, amount: p.amount }])
}

fn apply_send(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: SendPayload = decode_payload(&env.value)?;
    if env.signer != p.from {
        return Err(TxError::Validation("signer must match the sending account"));
    }
    authorize_account(state, env)?;
    state.bank.transfer(&p.from, &p.to, p.amount)?;
    Ok(vec![Event::BankSent { from: p.from, to: p.to, amount: p.amount }])
}

fn apply_create_table(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: CreateTablePayload = decode_payload(&env.value)?;
    if env.signer != p.creator {
        return Err(TxError::Validation("signer must match the table creator"));
    }
    authorize_account(state, env)?;
    let params = TableParams {
        max_players: p.max_players,
        small_blind: p.small_blind,
        big_blind: p.big_blind,
        min_buy_in: p.min_buy_in,
        max_buy_in: p.max_buy_in,
        action_timeout_secs: p.action_timeout_secs,
        dealer_timeout_secs: p.dealer_timeout_secs,
        player_bond: p.player_bond,
        rake_bps: p.rake_bps,
    };
    let table_id = state.next_table_id;
    let (table, events) = engine::create_table(table_id, &p.creator, p.label, params)?;
    state.next_table_id = state.next_table_id.checked_add(1).ok_or(PokerError::Overflow)?;
    state.tables.insert(table_id, table);
    Ok(events)
}

fn apply_sit(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: SitPayload = decode_payload(&env.value)?;
    if env.signer != p.player {
        return Err(TxError::Validation("signer must match the seated player"));
    }
    authorize_account(state, env)?;
    let pk_player: [u8; 32] = decode_b64_array(&p.pk_player)?;
    let table = require_table(state, p.table_id)?;
    Ok(engine::sit(table, p.seat, &p.player, p.buy_in, pk_player, &mut state.bank)?)
}

fn apply_start_hand(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: StartHandPayload = decode_payload(&env.value)?;
    if env.signer != p.caller {
        return Err(TxError::Validation("signer must match the caller"));
    }
    authorize_account(state, env)?;
    if state.dealer.active_epoch.is_none() {
        return Err(PokerError::NoActiveDealerEpoch.into());
    }
    let table = require_table(state, p.table_id)?;
    Ok(engine::start_hand(table, &p.caller, &mut state.bank)?)
}

fn parse_action(name: &str, amount: u64) -> Result<Action, TxError> {
    match name {
        "fold" => Ok(Action::Fold),
        "check" => Ok(Action::Check),
        "call" => Ok(Action::Call),
        "bet" => Ok(Action::Bet(amount)),
        "raise" => Ok(Action::Raise(amount)),
        _ => Err(TxError::Validation("action must be one of fold/check/call/bet/raise")),
    }
}

fn apply_act(state: &mut State, env: &Envelope, now_unix: u64) -> Result<Vec<Event>, TxError> {
    let p: ActPayload = decode_payload(&env.value)?;
    if env.signer != p.player {
        return Err(TxError::Validation("signer must match the acting player"));
    }
    authorize_account(state, env)?;
    let action = parse_action(&p.action, p.amount)?;
    let height = state.height;
    let dealer_timeout_blocks = state.chain_params.dealer_timeout_blocks;
    let table = require_table(state, p.table_id)?;
    Ok(engine::act(table, &p.player, action, height, dealer_timeout_blocks, now_unix)?)
}

fn apply_leave(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: LeavePayload = decode_payload(&env.value)?;
    if env.signer != p.player {
        return Err(TxError::Validation("signer must match the leaving player"));
    }
    authorize_account(state, env)?;
    let table = require_table(state, p.table_id)?;
    Ok(engine::leave(table, &p.player, &mut state.bank)?)
}

fn apply_tick(state: &mut State, env: &Envelope, now_unix: u64) -> Result<Vec<Event>, TxError> {
    let p: TickPayload = decode_payload(&env.value)?;
    let height = state.height;
    let dealer_timeout_blocks = state.chain_params.dealer_timeout_blocks;
    let table = require_table(state, p.table_id)?;
    Ok(engine::tick(table, now_unix, height, dealer_timeout_blocks, &mut state.bank)?)
}

fn apply_register_validator(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: RegisterValidatorPayload = decode_payload(&env.value)?;
    if env.signer != p.validator_id {
        return Err(TxError::Validation("signer must match the validator being registered"));
    }
    let pubkey: [u8; 32] = decode_b64_array(&p.pub_key)?;
    auth::authenticate_with_key(&mut state.nonces, &env.tx_type, &env.nonce, &env.signer, &env.value, &env.sig, &pubkey)?;
    state.staking.register(&p.validator_id, pubkey, p.power)?;
    Ok(vec![Event::ValidatorRegistered { validator_id: p.validator_id }])
}

fn apply_bond(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: BondPayload = decode_payload(&env.value)?;
    if env.signer != p.validator_id {
        return Err(TxError::Validation("signer must match the bonding validator"));
    }
    authorize_validator(state, env)?;
    state.staking.bond(&mut state.bank, &p.validator_id, p.amount)?;
    Ok(Vec::new())
}

fn apply_unbond(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: BondPayload = decode_payload(&env.value)?;
    if env.signer != p.validator_id {
        return Err(TxError::Validation("signer must match the unbonding validator"));
    }
    authorize_validator(state, env)?;
    state.staking.unbond(&mut state.bank, &p.validator_id, p.amount)?;
    Ok(Vec::new())
}

fn apply_unjail(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: UnjailPayload = decode_payload(&env.value)?;
    if env.signer != p.validator_id {
        return Err(TxError::Validation("signer must match the unjailing validator"));
    }
    authorize_validator(state, env)?;
    state.staking.unjail(&p.validator_id)?;
    Ok(Vec::new())
}

fn apply_begin_epoch(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: BeginEpochPayload = decode_payload(&env.value)?;
    authorize_validator(state, env)?;
    require_active_validator(state, &env.signer)?;
    if p.committee_size > state.chain_params.max_committee_size {
        return Err(DealerError::CommitteeTooLarge.into());
    }
    let rand_epoch_override = p.rand_epoch.map(|s| decode_b64_array::<32>(&s)).transpose()?;
    let deadline_blocks = (p.commit_blocks, p.complaint_blocks, p.reveal_blocks, p.finalize_blocks);
    let height = state.height;
    let (epoch_id, events) =
        state
            .dealer
            .begin_epoch(&state.staking.clone(), p.committee_size, p.threshold, rand_epoch_override, height, deadline_blocks)?;
    if let Some(expected) = p.epoch_id {
        if expected != epoch_id {
            return Err(TxError::Validation("epochId does not match the next assigned epoch id"));
        }
    }
    Ok(events)
}

fn apply_dkg_commit(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: DkgCommitPayload = decode_payload(&env.value)?;
    if env.signer != p.dealer_id {
        return Err(TxError::Validation("signer must match dealerId"));
    }
    authorize_validator(state, env)?;
    let commitments: Vec<Point> = p.commitments.iter().map(|s| decode_point_b64(s)).collect::<Result<_, _>>()?;
    let height = state.height;
    Ok(state.dealer.dkg_commit(p.epoch_id, &p.dealer_id, commitments, height)?)
}

fn apply_dkg_complaint_missing(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: DkgComplaintMissingPayload = decode_payload(&env.value)?;
    if env.signer != p.complainer_id {
        return Err(TxError::Validation("signer must match complainerId"));
    }
    authorize_validator(state, env)?;
    let height = state.height;
    Ok(state.dealer.dkg_complaint_missing(p.epoch_id, &p.complainer_id, &p.dealer_id, height)?)
}

fn apply_dkg_complaint_invalid(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: DkgComplaintInvalidPayload = decode_payload(&env.value)?;
    if env.signer != p.complainer_id {
        return Err(TxError::Validation("signer must match complainerId"));
    }
    authorize_validator(state, env)?;
    let share_msg = ShareMsg {
        epoch_id: p.epoch_id,
        dealer_id: p.share_msg.dealer_id,
        to_id: p.share_msg.to_id,
        share: decode_scalar_b64(&p.share_msg.share)?,
        sig: decode_b64_array(&p.share_msg.sig)?,
    };
    let dealer_pubkey = state
        .staking
        .get(&p.dealer_id)
        .map(|v| v.public_key)
        .ok_or_else(|| DealerError::NotACommitteeMember(p.dealer_id.clone()))?;
    let height = state.height;
    Ok(state.dealer.dkg_complaint_invalid(
        p.epoch_id,
        &p.complainer_id,
        &p.dealer_id,
        share_msg,
        &dealer_pubkey,
        &mut state.bank,
        &mut state.staking,
        height,
    )?)
}

fn apply_dkg_share_reveal(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: DkgShareRevealPayload = decode_payload(&env.value)?;
    if env.signer != p.dealer_id {
        return Err(TxError::Validation("signer must match dealerId"));
    }
    authorize_validator(state, env)?;
    let share = decode_scalar_b64(&p.share)?;
    let height = state.height;
    Ok(state.dealer.dkg_share_reveal(p.epoch_id, &p.dealer_id, &p.to_id, share, height)?)
}

fn apply_finalize_epoch(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: EpochIdPayload = decode_payload(&env.value)?;
    let height = state.height;
    Ok(state.dealer.finalize_epoch(p.epoch_id, &mut state.bank, &mut state.staking, height)?)
}

fn apply_dkg_timeout(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: EpochIdPayload = decode_payload(&env.value)?;
    let height = state.height;
    Ok(state.dealer.dkg_timeout(p.epoch_id, &mut state.bank, &mut state.staking, height)?)
}

fn apply_init_hand(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: InitHandPayload = decode_payload(&env.value)?;
    let epoch = active_epoch_cloned(state)?;
    if epoch.id != p.epoch_id {
        return Err(PokerError::NoActiveDealerEpoch.into());
    }
    let deck_size = p.deck_size.unwrap_or(state.chain_params.deck_size);
    let height = state.height;
    let dealer_timeout_blocks = state.chain_params.dealer_timeout_blocks;
    let table = require_table(state, p.table_id)?;
    require_hand_id(table, p.hand_id)?;
    Ok(engine::init_dealer_hand(table, &epoch, deck_size, height, dealer_timeout_blocks)?)
}

fn apply_submit_shuffle(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: SubmitShufflePayload = decode_payload(&env.value)?;
    if env.signer != p.shuffler_id {
        return Err(TxError::Validation("signer must match shufflerId"));
    }
    authorize_validator(state, env)?;
    let submission_bytes = decode_b64(&p.proof_shuffle)?;
    let vk = shuffle::prepare_vk(&state.chain_params.shuffle_vk_bytes)?;
    let height = state.height;
    let dealer_timeout_blocks = state.chain_params.dealer_timeout_blocks;
    let table = require_table(state, p.table_id)?;
    require_hand_id(table, p.hand_id)?;
    Ok(engine::submit_shuffle(table, &p.shuffler_id, p.round, &vk, &submission_bytes, height, dealer_timeout_blocks)?)
}

fn apply_finalize_deck(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: TableHandPayload = decode_payload(&env.value)?;
    let height = state.height;
    let dealer_timeout_blocks = state.chain_params.dealer_timeout_blocks;
    let table = require_table(state, p.table_id)?;
    require_hand_id(table, p.hand_id)?;
    Ok(engine::finalize_deck(table, height, dealer_timeout_blocks)?)
}

fn apply_submit_pub_share(state: &mut State, env: &Envelope) -> Result<Vec<Event>, TxError> {
    let p: SubmitPubSharePayload = decode_payload(&env.value)?;
    if env.signer != p.validator_id {
        return Err(TxError::Validation("signer must match validatorId"));
    }
    authorize_validator(state, env)?;
    let epoch = active_epoch_cloned(state)?;
    let share = decode_point_b64(&p.pub_share)?;
    let proof = ChaumPedersenProof::from_bytes(&decode_b64(&p.proof_share)?)?;
    let table = require_table(state, p.table_id)?;
    require_hand_id(table, p.hand_id)?;
    Ok(engine::submit_pub_share(table, &epoch, p.pos, &p.validator_id, share, &proof)?)
}

fn apply_submit_enc_share(state: &mut State, env: &Envelope, now_unix: u64) -> Result<Vec<Event>, TxError> {
    let p: SubmitEncSharePayload = decode_payload(&env.value)?;
    if env.signer != p.validator_id {
        return Err(TxError::Validation("signer must match validatorId"));
    }
    authorize_validator(state, env)?;
    let epoch = active_epoch_cloned(state)?;
    let pk_player_bytes: [u8; 32] = decode_b64_array(&p.pk_player)?;
    let pk_player = group::decode_point(&pk_player_bytes)?;
    let enc_share_bytes = decode_b64(&p.enc_share)?;
    if enc_share_bytes.len() != 64 {
        return Err(TxError::MalformedBase64);
    }
    let u = group::decode_point(&enc_share_bytes[0..32])?;
    let v = group::decode_point(&enc_share_bytes[32..64])?;
    let proof = EncryptedShareProof::from_bytes(&decode_b64(&p.proof_enc_share)?)?;

    let table = require_table(state, p.table_id)?;
    require_hand_id(table, p.hand_id)?;
    let hand = table.hand.as_ref().ok_or(PokerError::NoActiveHand(p.table_id))?;
    let (seat, _round) = engine::owning_seat_and_round(hand, p.pos).ok_or(PokerError::WrongPhase)?;
    let seat_pk = table.seats[seat as usize]
        .pk_player
        .ok_or(PokerError::MissingPlayerKey(seat))?;
    if seat_pk != pk_player_bytes {
        return Err(DealerError::PlayerKeyMismatch.into());
    }

    Ok(engine::submit_enc_share(table, &epoch, p.pos, &p.validator_id, &pk_player, (u, v), &proof, now_unix)?)
}

fn apply_finalize_reveal(state: &mut State, env: &Envelope, now_unix: u64) -> Result<Vec<Event>, TxError> {
    let p: FinalizeRevealPayload = decode_payload(&env.value)?;
    let epoch = active_epoch_cloned(state)?;
    let height = state.height;
    let dealer_timeout_blocks = state.chain_params.dealer_timeout_blocks;
    let table = require_table(state, p.table_id)?;
    require_hand_id(table, p.hand_id)?;
    Ok(engine::finalize_reveal(table, epoch.threshold, height, dealer_timeout_blocks, now_unix)?)
}

fn apply_dealer_timeout(state: &mut State, env: &Envelope, now_unix: u64) -> Result<Vec<Event>, TxError> {
    let p: TableHandPayload = decode_payload(&env.value)?;
    let epoch = active_epoch_cloned(state)?;
    let height = state.height;
    let dealer_timeout_blocks = state.chain_params.dealer_timeout_blocks;
    let table = require_table(state, p.table_id)?;
    require_hand_id(table, p.hand_id)?;
    Ok(engine::dealer_timeout(table, &epoch, &mut state.bank, &mut state.staking, height, dealer_timeout_blocks, now_unix)?)
}

fn dispatch(state: &mut State, env: &Envelope, now_unix: u64) -> Result<Vec<Event>, TxError> {
    match env.tx_type.as_str() {
        "auth/register_account" => apply_register_account(state, env),
        "bank/mint" => apply_mint(state, env),
        "bank/send" => apply_send(state, env),
        "poker/create_table" => apply_create_table(state, env),
        "poker/sit" => apply_sit(state, env),
        "poker/start_hand" => apply_start_hand(state, env),
        "poker/act" => apply_act(state, env, now_unix),
        "poker/leave" => apply_leave(state, env),
        "poker/tick" => apply_tick(state, env, now_unix),
        "staking/register_validator" => apply_register_validator(state, env),
        "staking/bond" => apply_bond(state, env),
        "staking/unbond" => apply_unbond(state, env),
        "staking/unjail" => apply_unjail(state, env),
        "dealer/begin_epoch" => apply_begin_epoch(state, env),
        "dealer/dkg_commit" => apply_dkg_commit(state, env),
        "dealer/dkg_complaint_missing" => apply_dkg_complaint_missing(state, env),
        "dealer/dkg_complaint_invalid" => apply_dkg_complaint_invalid(state, env),
        "dealer/dkg_share_reveal" => apply_dkg_share_reveal(state, env),
        "dealer/finalize_epoch" => apply_finalize_epoch(state, env),
        "dealer/dkg_timeout" => apply_dkg_timeout(state, env),
        "dealer/init_hand" => apply_init_hand(state, env),
        "dealer/submit_shuffle" => apply_submit_shuffle(state, env),
        "dealer/finalize_deck" => apply_finalize_deck(state, env),
        "dealer/submit_pub_share" => apply_submit_pub_share(state, env),
        "dealer/submit_enc_share" => apply_submit_enc_share(state, env, now_unix),
        "dealer/finalize_reveal" => apply_finalize_reveal(state, env, now_unix),
        "dealer/timeout" => apply_dealer_timeout(state, env, now_unix),
        other => Err(TxError::UnknownType(other.to_string())),
    }
}

/// Applies one transaction against `state`, committing the result only on
/// success. `now_unix` is the enclosing block's timestamp (see
/// [`State::apply_block`]).
#[tracing::instrument(skip(state, env), fields(tx_type = %env.tx_type, signer = %env.signer))]
pub fn apply_transaction(state: &mut State, env: &Envelope, now_unix: u64) -> TxResult {
    let mut staged = state.clone();
    match dispatch(&mut staged, env, now_unix) {
        Ok(events) => {
            *state = staged;
            TxResult { code: 0, events, log: None }
        }
        Err(err) => {
            tracing::warn!(tx_type = %env.tx_type, error = %err, "transaction rejected");
            TxResult { code: err.code(), events: Vec::new(), log: Some(err.to_string()) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainParams;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn signed_envelope(tx_type: &str, nonce: u64, signer: &str, signing_key: &SigningKey, payload: &serde_json::Value) -> Envelope {
        let value = serde_json::to_vec(payload).unwrap();
        let nonce_str = nonce.to_string();
        let message = auth::sign_bytes(tx_type, &nonce_str, signer, &value);
        let sig = signing_key.sign(&message);
        Envelope {
            tx_type: tx_type.to_string(),
            value,
            nonce: nonce_str,
            signer: signer.to_string(),
            sig: sig.to_bytes(),
        }
    }

    #[test]
    fn register_account_then_send_round_trips() {
        let mut state = State::genesis(ChainParams::default());
        let mut csprng = OsRng;
        let alice_key = SigningKey::generate(&mut csprng);
        let bob_key = SigningKey::generate(&mut csprng);

        let env = signed_envelope(
            "auth/register_account",
            1,
            "alice",
            &alice_key,
            &serde_json::json!({"account": "alice", "pubKey": STANDARD.encode(alice_key.verifying_key().to_bytes())}),
        );
        let result = apply_transaction(&mut state, &env, 0);
        assert_eq!(result.code, 0);
        assert!(matches!(result.events[0], Event::AccountKeyRegistered { .. }));

        let env = signed_envelope(
            "auth/register_account",
            1,
            "bob",
            &bob_key,
            &serde_json::json!({"account": "bob", "pubKey": STANDARD.encode(bob_key.verifying_key().to_bytes())}),
        );
        apply_transaction(&mut state, &env, 0);

        state.bank.credit("alice", 100).unwrap();
        let env = signed_envelope(
            "bank/send",
            1,
            "alice",
            &alice_key,
            &serde_json::json!({"from": "alice", "to": "bob", "amount": 40}),
        );
        let result = apply_transaction(&mut state, &env, 0);
        assert_eq!(result.code, 0);
        assert_eq!(state.bank.balance("alice"), 60);
        assert_eq!(state.bank.balance("bob"), 40);
    }

    #[test]
    fn failing_transaction_leaves_state_and_nonce_untouched() {
        let mut state = State::genesis(ChainParams::default());
        let mut csprng = OsRng;
        let alice_key = SigningKey::generate(&mut csprng);
        let env = signed_envelope(
            "auth/register_account",
            1,
            "alice",
            &alice_key,
            &serde_json::json!({"account": "alice", "pubKey": STANDARD.encode(alice_key.verifying_key().to_bytes())}),
        );
        apply_transaction(&mut state, &env, 0);

        let before = state.app_hash();
        // Insufficient balance: alice has never been credited.
        let env = signed_envelope(
            "bank/send",
            1,
            "alice",
            &alice_key,
            &serde_json::json!({"from": "alice", "to": "bob", "amount": 40}),
        );
        let result = apply_transaction(&mut state, &env, 0);
        assert_ne!(result.code, 0);
        assert!(result.events.is_empty());
        assert_eq!(before, state.app_hash());
    }

    #[test]
    fn unknown_tx_type_is_rejected() {
        let mut state = State::genesis(ChainParams::default());
        let env = Envelope {
            tx_type: "nonsense/op".to_string(),
            value: Vec::new(),
            nonce: "1".to_string(),
            signer: "nobody".to_string(),
            sig: [0u8; 64],
        };
        let result = apply_transaction(&mut state, &env, 0);
        assert_eq!(result.code, 100);
    }
}
