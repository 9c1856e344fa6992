//! Per-hand dealer pipeline: the encrypted deck, the round-robin shuffle
//! chain, threshold public reveals (community/showdown cards), and
//! per-player encrypted hole-card hand-offs. One [`DealerHandState`] is
//! owned by exactly one [`crate::poker::types::Hand`] for its lifetime —
//! addressed by `(table_id, hand_id)` at the call site rather than holding
//! a back-reference, so there is no cycle between the poker and dealer
//! modules (see DESIGN.md).
//!
//! This module never reaches into `Bank`/seat state itself: a timeout or
//! abort only reports what *should* happen (slash a member, abort and
//! refund); the caller (the top-level dispatcher, which alone holds both
//! the poker and dealer sub-states) carries out the bank-side effects.

use std::collections::{BTreeMap, BTreeSet};

use ark_bn254::Bn254;
use ark_groth16::PreparedVerifyingKey;

use crate::bank::Bank;
use crate::config::{DOMAIN_DEALER_DECK_INIT, DOMAIN_DEALER_HAND_DERIVE, MAX_PLAYERS};
use crate::events::Event;
use crate::group::chaum_pedersen::{self, ChaumPedersenProof, EncryptedShareProof};
use crate::group::elgamal::ElGamalCiphertext;
use crate::group::{self, Point, Scalar};
use crate::shuffle;
use crate::staking::Staking;

use super::dkg::ActiveEpoch;
use super::DealerError;

/// Sentinel for "no hole position assigned" in [`DealerHandState::hole_positions`].
pub const NO_POSITION: u8 = 255;

/// What a timeout check found, and what the caller (dispatcher) must now do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// Nothing actionable yet (or a fault was recorded but the pipeline can
    /// keep going — caller does not need to change the hand's phase).
    Continue,
    /// Every remaining requirement for the current phase is satisfied;
    /// caller should advance the hand to the next phase.
    Advance,
    /// QUAL fell below threshold; caller must abort-and-refund the hand.
    Abort,
}

#[derive(Clone, Debug)]
pub struct DealerHandState {
    pub epoch_id: u64,
    pub pk_hand: Point,
    pub deck_size: u8,
    pub deck: Vec<ElGamalCiphertext>,
    /// QUAL members at hand init, in ascending member-index order — the
    /// fixed round-robin shuffle order.
    pub shuffle_order: Vec<String>,
    pub shuffle_step: usize,
    pub deck_finalized: bool,
    pub hole_positions: [[u8; 2]; MAX_PLAYERS as usize],
    pub community_cursor: u8,
    pub pub_shares: BTreeMap<u8, BTreeMap<u32, Point>>,
    pub enc_shares: BTreeMap<u8, BTreeMap<u32, (Point, Point)>>,
    pub revealed: BTreeSet<u8>,
    pub shuffle_deadline: u64,
    pub hole_shares_deadline: u64,
    pub reveal_deadline: u64,
    pub expected_reveal_pos: Option<u8>,
    /// Members slashed for liveness faults during this hand; removed from
    /// the hand's own notion of QUAL even though they remain epoch members
    /// elsewhere (the epoch itself is only mutated by DKG finalization).
    pub slashed_this_hand: BTreeSet<String>,
    /// `member_index -> k * member.public_share`, precomputed at init since
    /// every share/proof this hand collects is verified against the
    /// hand-scaled key `x_hand_j * G`, not the epoch-level `x_j * G`.
    pub hand_public_shares: BTreeMap<u32, Point>,
}

fn derive_hand_key(epoch_id: u64, table_id: u64, hand_id: u64) -> Scalar {
    group::hash_to_scalar(
        DOMAIN_DEALER_HAND_DERIVE,
        &[&epoch_id.to_be_bytes(), &table_id.to_be_bytes(), &hand_id.to_be_bytes()],
    )
}

fn deck_init_randomness(k: &Scalar, card: u8) -> Scalar {
    group::hash_to_scalar(DOMAIN_DEALER_DECK_INIT, &[&group::encode_scalar(k), &[card]])
}

impl DealerHandState {
    /// Qualified members still eligible to act for this hand (epoch QUAL
    /// minus anyone slashed mid-hand for a liveness fault).
    pub fn live_quorum(&self) -> Vec<&String> {
        self.shuffle_order
            .iter()
            .filter(|m| !self.slashed_this_hand.contains(*m))
            .collect()
    }

    #[tracing::instrument(skip(epoch), level = "info")]
    pub fn init(
        epoch: &ActiveEpoch,
        table_id: u64,
        hand_id: u64,
        deck_size: u8,
        height: u64,
        dealer_timeout_blocks: u64,
    ) -> Result<(Self, Vec<Event>), DealerError> {
        let k = derive_hand_key(epoch.id, table_id, hand_id);
        let pk_hand = epoch.public_key * k;

        let g = group::generator();
        let deck: Vec<ElGamalCiphertext> = (0..deck_size)
            .map(|c| {
                let message = group::card_to_point(c);
                let r = deck_init_randomness(&k, c);
                ElGamalCiphertext::encrypt(&pk_hand, &message, &r, &g)
            })
            .collect();

        let mut shuffle_order: Vec<String> = epoch.members.iter().map(|m| m.validator_id.clone()).collect();
        shuffle_order.sort_by_key(|id| epoch.member(id).map(|m| m.member_index).unwrap_or(u32::MAX));

        let shuffle_deadline = height.checked_add(dealer_timeout_blocks).ok_or(DealerError::Overflow)?;

        let hand_public_shares = epoch
            .members
            .iter()
            .map(|m| (m.member_index, m.public_share * k))
            .collect();

        let state = DealerHandState {
            epoch_id: epoch.id,
            pk_hand,
            deck_size,
            deck,
            shuffle_order,
            shuffle_step: 0,
            deck_finalized: false,
            hole_positions: [[NO_POSITION; 2]; MAX_PLAYERS as usize],
            community_cursor: 0,
            pub_shares: BTreeMap::new(),
            enc_shares: BTreeMap::new(),
            revealed: BTreeSet::new(),
            shuffle_deadline,
            hole_shares_deadline: 0,
            reveal_deadline: 0,
            expected_reveal_pos: None,
            slashed_this_hand: BTreeSet::new(),
            hand_public_shares,
        };

        Ok((
            state,
            vec![Event::DealerHandInitialized { table_id, hand_id, epoch_id: epoch.id }],
        ))
    }

    pub fn expected_shuffler(&self) -> Option<&str> {
        self.live_quorum().get(self.shuffle_step).map(|s| s.as_str())
    }

    #[tracing::instrument(skip(self, vk, submission_bytes), level = "debug")]
    pub fn submit_shuffle(
        &mut self,
        shuffler_id: &str,
        round: u32,
        vk: &PreparedVerifyingKey<Bn254>,
        submission_bytes: &[u8],
        height: u64,
        dealer_timeout_blocks: u64,
        table_id: u64,
        hand_id: u64,
    ) -> Result<Vec<Event>, DealerError> {
        if self.deck_finalized {
            return Err(DealerError::DeckAlreadyFinalized);
        }
        let expected = self
            .expected_shuffler()
            .ok_or(DealerError::ShuffleChainIncomplete)?
            .to_string();
        if expected != shuffler_id {
            return Err(DealerError::NotExpectedShuffler(shuffler_id.to_string()));
        }
        if round as usize != self.shuffle_step {
            return Err(DealerError::WrongShuffleRound { expected: self.shuffle_step as u32, got: round });
        }

        let output = shuffle::verify_shuffle(vk, &self.deck, submission_bytes)?;
        self.deck = output;
        self.shuffle_step += 1;
        self.shuffle_deadline = height.checked_add(dealer_timeout_blocks).ok_or(DealerError::Overflow)?;

        Ok(vec![Event::ShuffleAccepted {
            table_id,
            hand_id,
            round,
            shuffler_id: shuffler_id.to_string(),
        }])
    }

    pub fn shuffle_chain_complete(&self) -> bool {
        self.shuffle_step >= self.live_quorum().len()
    }

    /// Assigns hole positions `0..2*seats.len()` in dealing order starting
    /// from `seats[0]` (the caller passes seats already rotated to start at
    /// SB), two passes of one card each. Arms the hole-shares deadline.
    #[tracing::instrument(skip(self, seats_dealing_order), level = "info")]
    pub fn finalize_deck(
        &mut self,
        seats_dealing_order: &[u8],
        height: u64,
        dealer_timeout_blocks: u64,
        table_id: u64,
        hand_id: u64,
    ) -> Result<Vec<Event>, DealerError> {
        if self.deck_finalized {
            return Err(DealerError::DeckAlreadyFinalized);
        }
        if !self.shuffle_chain_complete() {
            return Err(DealerError::ShuffleChainIncomplete);
        }

        let mut cursor = 0u8;
        for round in 0..2u8 {
            for &seat in seats_dealing_order {
                self.hole_positions[seat as usize][round as usize] = cursor;
                cursor = cursor.checked_add(1).ok_or(DealerError::Overflow)?;
            }
        }
        self.community_cursor = cursor;
        self.deck_finalized = true;
        self.hole_shares_deadline = height.checked_add(dealer_timeout_blocks).ok_or(DealerError::Overflow)?;

        Ok(vec![Event::DeckFinalized { table_id, hand_id }])
    }

    fn ciphertext_at(&self, pos: u8) -> Result<&ElGamalCiphertext, DealerError> {
        self.deck.get(pos as usize).ok_or(DealerError::PositionOutOfRange(pos))
    }

    /// Accepts one committee member's encrypted re-encryption of a hole
    /// card's decrypt share toward the seated player's public key.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(self, epoch, enc_share, proof), level = "debug")]
    pub fn submit_enc_share(
        &mut self,
        pos: u8,
        epoch: &ActiveEpoch,
        validator_id: &str,
        pk_player: &Point,
        enc_share: (Point, Point),
        proof: &EncryptedShareProof,
        table_id: u64,
        hand_id: u64,
    ) -> Result<Vec<Event>, DealerError> {
        if !self.deck_finalized {
            return Err(DealerError::DeckNotFinalized);
        }
        if pos >= self.community_cursor {
            return Err(DealerError::PositionOutOfRange(pos));
        }
        let member = epoch
            .member(validator_id)
            .ok_or_else(|| DealerError::NotACommitteeMember(validator_id.to_string()))?;
        if self
            .enc_shares
            .get(&pos)
            .is_some_and(|m| m.contains_key(&member.member_index))
        {
            return Err(DealerError::DuplicateShare);
        }

        let c1 = self.ciphertext_at(pos)?.c1;
        let y_hand_j = *self
            .hand_public_shares
            .get(&member.member_index)
            .ok_or_else(|| DealerError::NotACommitteeMember(validator_id.to_string()))?;
        let (u, v) = enc_share;
        let g = group::generator();
        if !chaum_pedersen::verify_encrypted_share(proof, &g, &c1, pk_player, &y_hand_j, &u, &v) {
            return Err(DealerError::ShareProofFailed);
        }

        self.enc_shares.entry(pos).or_default().insert(member.member_index, (u, v));
        Ok(vec![Event::EncShareAccepted {
            table_id,
            hand_id,
            pos,
            validator_id: validator_id.to_string(),
        }])
    }

    /// True once every hole position belonging to an in-hand seat has
    /// `threshold` accepted enc shares.
    pub fn hole_shares_ready(&self, in_hand_seats: &[u8], threshold: u32) -> bool {
        in_hand_seats.iter().all(|&seat| {
            self.hole_positions[seat as usize].iter().all(|&pos| {
                pos != NO_POSITION
                    && self
                        .enc_shares
                        .get(&pos)
                        .is_some_and(|m| m.len() as u32 >= threshold)
            })
        })
    }

    pub fn arm_reveal(&mut self, pos: u8, height: u64, dealer_timeout_blocks: u64) -> Result<(), DealerError> {
        self.expected_reveal_pos = Some(pos);
        self.reveal_deadline = height.checked_add(dealer_timeout_blocks).ok_or(DealerError::Overflow)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, epoch, proof), level = "debug")]
    pub fn submit_pub_share(
        &mut self,
        pos: u8,
        epoch: &ActiveEpoch,
        validator_id: &str,
        share: Point,
        proof: &ChaumPedersenProof,
        table_id: u64,
        hand_id: u64,
    ) -> Result<Vec<Event>, DealerError> {
        if !self.deck_finalized {
            return Err(DealerError::DeckNotFinalized);
        }
        if pos >= self.deck_size {
            return Err(DealerError::PositionOutOfRange(pos));
        }
        let member = epoch
            .member(validator_id)
            .ok_or_else(|| DealerError::NotACommitteeMember(validator_id.to_string()))?;
        if self
            .pub_shares
            .get(&pos)
            .is_some_and(|m| m.contains_key(&member.member_index))
        {
            return Err(DealerError::DuplicateShare);
        }

        let c1 = self.ciphertext_at(pos)?.c1;
        let y_hand_j = *self
            .hand_public_shares
            .get(&member.member_index)
            .ok_or_else(|| DealerError::NotACommitteeMember(validator_id.to_string()))?;
        let g = group::generator();
        if !chaum_pedersen::verify(proof, &g, &c1, &y_hand_j, &share) {
            return Err(DealerError::ShareProofFailed);
        }

        self.pub_shares.entry(pos).or_default().insert(member.member_index, share);
        Ok(vec![Event::PubShareAccepted {
            table_id,
            hand_id,
            pos,
            validator_id: validator_id.to_string(),
        }])
    }

    /// Combines the lexicographically-first threshold-sized subset of
    /// collected pub shares (sorted by member index) via Lagrange
    /// interpolation at zero, decrypts, and marks `pos` revealed.
    pub fn finalize_reveal(
        &mut self,
        pos: u8,
        threshold: u32,
        table_id: u64,
        hand_id: u64,
    ) -> Result<(u8, Vec<Event>), DealerError> {
        let shares = self.pub_shares.get(&pos).ok_or(DealerError::NotEnoughPubShares(pos))?;
        if (shares.len() as u32) < threshold {
            return Err(DealerError::NotEnoughPubShares(pos));
        }
        let chosen: Vec<(u32, Point)> = shares
            .iter()
            .take(threshold as usize)
            .map(|(&idx, &p)| (idx, p))
            .collect();
        let indices: Vec<u32> = chosen.iter().map(|(i, _)| *i).collect();
        let points: Vec<Point> = chosen.iter().map(|(_, p)| *p).collect();
        let combined = group::lagrange_combine_points(&indices, &points);

        let ciphertext = self.ciphertext_at(pos)?;
        let card_point = ciphertext.decrypt_with_share(&combined);
        let card = group::point_to_card(&card_point, self.deck_size).ok_or(DealerError::UndecodableCard)?;

        self.revealed.insert(pos);
        self.expected_reveal_pos = None;
        Ok((card, vec![Event::RevealFinalized { table_id, hand_id, pos, card }]))
    }

    #[tracing::instrument(skip(self, bank, staking), level = "warn")]
    pub fn timeout_shuffle(
        &mut self,
        bank: &mut Bank,
        staking: &mut Staking,
        threshold: u32,
        height: u64,
        dealer_timeout_blocks: u64,
    ) -> Result<(TimeoutOutcome, Vec<Event>), DealerError> {
        if self.deck_finalized {
            return Ok((TimeoutOutcome::Continue, Vec::new()));
        }
        if height < self.shuffle_deadline {
            return Ok((TimeoutOutcome::Continue, Vec::new()));
        }
        let mut events = Vec::new();
        if let Some(expected) = self.expected_shuffler().map(|s| s.to_string()) {
            if self.slashed_this_hand.insert(expected.clone()) {
                let slashed = staking.slash(bank, &expected, 5_000)?;
                events.push(Event::ValidatorSlashed {
                    validator_id: expected,
                    amount: slashed,
                    reason: "dealer_shuffle_timeout".to_string(),
                });
            }
            self.shuffle_deadline = height.checked_add(dealer_timeout_blocks).ok_or(DealerError::Overflow)?;
        }

        if (self.live_quorum().len() as u32) < threshold {
            return Ok((TimeoutOutcome::Abort, events));
        }
        if self.shuffle_chain_complete() {
            return Ok((TimeoutOutcome::Advance, events));
        }
        Ok((TimeoutOutcome::Continue, events))
    }

    #[tracing::instrument(skip(self, bank, staking, in_hand_seats), level = "warn")]
    pub fn timeout_hole_shares(
        &mut self,
        bank: &mut Bank,
        staking: &mut Staking,
        epoch: &ActiveEpoch,
        in_hand_seats: &[u8],
        threshold: u32,
        height: u64,
    ) -> Result<(TimeoutOutcome, Vec<Event>), DealerError> {
        if height < self.hole_shares_deadline {
            return Ok((TimeoutOutcome::Continue, Vec::new()));
        }
        let mut events = Vec::new();
        let required_positions: Vec<u8> = in_hand_seats
            .iter()
            .flat_map(|&seat| self.hole_positions[seat as usize])
            .filter(|&pos| pos != NO_POSITION)
            .collect();

        for member in epoch.members.iter() {
            let missing_any = required_positions.iter().any(|pos| {
                !self
                    .enc_shares
                    .get(pos)
                    .is_some_and(|m| m.contains_key(&member.member_index))
            });
            if missing_any && self.slashed_this_hand.insert(member.validator_id.clone()) {
                let slashed = staking.slash(bank, &member.validator_id, 5_000)?;
                events.push(Event::ValidatorSlashed {
                    validator_id: member.validator_id.clone(),
                    amount: slashed,
                    reason: "dealer_hole_shares_timeout".to_string(),
                });
            }
        }

        if (self.live_quorum().len() as u32) < threshold {
            return Ok((TimeoutOutcome::Abort, events));
        }
        if self.hole_shares_ready(in_hand_seats, threshold) {
            return Ok((TimeoutOutcome::Advance, events));
        }
        Ok((TimeoutOutcome::Continue, events))
    }

    #[tracing::instrument(skip(self, bank, staking, epoch), level = "warn")]
    pub fn timeout_reveal(
        &mut self,
        bank: &mut Bank,
        staking: &mut Staking,
        epoch: &ActiveEpoch,
        threshold: u32,
        height: u64,
    ) -> Result<(TimeoutOutcome, Vec<Event>), DealerError> {
        let Some(pos) = self.expected_reveal_pos else {
            return Ok((TimeoutOutcome::Continue, Vec::new()));
        };
        if height < self.reveal_deadline {
            return Ok((TimeoutOutcome::Continue, Vec::new()));
        }
        let mut events = Vec::new();
        let collected = self.pub_shares.get(&pos).cloned().unwrap_or_default();
        for member in epoch.members.iter() {
            if !collected.contains_key(&member.member_index) && self.slashed_this_hand.insert(member.validator_id.clone()) {
                let slashed = staking.slash(bank, &member.validator_id, 5_000)?;
                events.push(Event::ValidatorSlashed {
                    validator_id: member.validator_id.clone(),
                    amount: slashed,
                    reason: "dealer_reveal_timeout".to_string(),
                });
            }
        }

        if (self.live_quorum().len() as u32) < threshold {
            return Ok((TimeoutOutcome::Abort, events));
        }
        if (collected.len() as u32) >= threshold {
            return Ok((TimeoutOutcome::Advance, events));
        }
        Ok((TimeoutOutcome::Continue, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dealer::dkg::EpochMember;

    fn test_epoch(n: u32, threshold: u32) -> (ActiveEpoch, Vec<Scalar>) {
        let secrets: Vec<Scalar> = (1..=n).map(|i| Scalar::from(100u64 + i as u64)).collect();
        let public_key = secrets.iter().fold(group::identity(), |acc, s| acc + group::generator_mul(s));
        let members: Vec<EpochMember> = secrets
            .iter()
            .enumerate()
            .map(|(i, s)| EpochMember {
                validator_id: format!("v{}", i + 1),
                member_index: (i + 1) as u32,
                public_share: group::generator_mul(s),
            })
            .collect();
        (
            ActiveEpoch {
                id: 1,
                threshold,
                public_key,
                transcript_root: [0u8; 32],
                members,
                start_height: 0,
                slashed: Vec::new(),
            },
            secrets,
        )
    }

    #[test]
    fn init_builds_a_deck_whose_ciphertexts_decrypt_to_card_points() {
        let (epoch, secrets) = test_epoch(3, 2);
        let (state, events) = DealerHandState::init(&epoch, 1, 1, 4, 0, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(state.deck.len(), 4);

        // sk_hand = k * sum(secrets); decrypt position 2 directly to confirm
        // the deterministic deck-init actually encodes the right card.
        let k = derive_hand_key(epoch.id, 1, 1);
        let sk_hand: Scalar = secrets.iter().fold(Scalar::from(0u64), |acc, s| acc + *s) * k;
        let recovered = state.deck[2].decrypt(&sk_hand);
        assert_eq!(group::point_to_card(&recovered, 4), Some(2));
    }

    #[test]
    fn shuffle_order_follows_member_index_and_timeout_slashes_the_laggard() {
        let (epoch, _secrets) = test_epoch(3, 2);
        let (mut state, _) = DealerHandState::init(&epoch, 1, 1, 4, 0, 10).unwrap();
        assert_eq!(state.expected_shuffler(), Some("v1"));

        let mut bank = Bank::new();
        let mut staking = Staking::new();
        for m in &epoch.members {
            staking.register(&m.validator_id, [0u8; 32], 1).unwrap();
            bank.credit(&m.validator_id, 100).unwrap();
            staking.bond(&mut bank, &m.validator_id, 100).unwrap();
        }

        let (outcome, events) = state.timeout_shuffle(&mut bank, &mut staking, 2, 11, 10).unwrap();
        assert_eq!(outcome, TimeoutOutcome::Continue);
        assert!(events.iter().any(|e| matches!(e, Event::ValidatorSlashed { validator_id, .. } if validator_id == "v1")));
        assert_eq!(state.expected_shuffler(), Some("v2"));
    }

    #[test]
    fn shuffle_timeout_aborts_once_quorum_drops_below_threshold() {
        let (epoch, _secrets) = test_epoch(2, 2);
        let (mut state, _) = DealerHandState::init(&epoch, 1, 1, 4, 0, 10).unwrap();
        let mut bank = Bank::new();
        let mut staking = Staking::new();
        for m in &epoch.members {
            staking.register(&m.validator_id, [0u8; 32], 1).unwrap();
            bank.credit(&m.validator_id, 100).unwrap();
            staking.bond(&mut bank, &m.validator_id, 100).unwrap();
        }
        let (outcome, _) = state.timeout_shuffle(&mut bank, &mut staking, 2, 11, 10).unwrap();
        assert_eq!(outcome, TimeoutOutcome::Abort);
    }

    #[test]
    fn finalize_deck_assigns_hole_positions_starting_from_sb() {
        let (epoch, _secrets) = test_epoch(1, 1);
        let (mut state, _) = DealerHandState::init(&epoch, 1, 1, 6, 0, 10).unwrap();
        state.shuffle_step = state.live_quorum().len(); // pretend the (only) member already shuffled
        state.finalize_deck(&[2, 0], 0, 10, 1, 1).unwrap();
        assert_eq!(state.hole_positions[2], [0, 2]);
        assert_eq!(state.hole_positions[0], [1, 3]);
        assert_eq!(state.community_cursor, 4);
    }

    #[test]
    fn pub_share_threshold_combination_recovers_the_card() {
        let (epoch, secrets) = test_epoch(3, 2);
        let (mut state, _) = DealerHandState::init(&epoch, 7, 9, 4, 0, 10).unwrap();
        state.shuffle_step = state.live_quorum().len();
        state.finalize_deck(&[0], 0, 10, 7, 9).unwrap();
        let pos = 1u8;
        let c1 = state.deck[pos as usize].c1;
        let k = derive_hand_key(epoch.id, 7, 9);
        let g = group::generator();
        let mut rng = rand::thread_rng();

        for (i, secret) in secrets.iter().enumerate() {
            let member = &epoch.members[i];
            let x_hand_j = *secret * k;
            let share = c1 * x_hand_j;
            let y_hand_j = state.hand_public_shares[&member.member_index];
            let proof = chaum_pedersen::prove(&mut rng, &x_hand_j, &g, &c1, &y_hand_j, &share);
            state
                .submit_pub_share(pos, &epoch, &member.validator_id, share, &proof, 7, 9)
                .unwrap();
        }

        let (card, events) = state.finalize_reveal(pos, 2, 7, 9).unwrap();
        assert_eq!(card, pos);
        assert!(state.revealed.contains(&pos));
        assert!(matches!(events[0], Event::RevealFinalized { .. }));
    }
}
