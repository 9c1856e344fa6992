//! DKG data model: committee, Feldman commitments, complaints, reveals.

use std::collections::{BTreeMap, BTreeSet};

use crate::group::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FaultKind {
    Missing,
    InvalidComplaint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplaintKind {
    Missing,
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadlines {
    pub commit: u64,
    pub complaint: u64,
    pub reveal: u64,
    pub finalize: u64,
}

/// One DKG in progress. `members[i]` has member index `i + 1` — Feldman
/// polynomial evaluation points are 1-based so index 0 stays reserved for
/// the secret itself.
#[derive(Clone, Debug)]
pub struct Dkg {
    pub id: u64,
    pub threshold: u32,
    pub members: Vec<String>,
    pub deadlines: Deadlines,
    pub rand_epoch: [u8; 32],
    pub commits: BTreeMap<String, Vec<Point>>,
    pub complaints: BTreeMap<(String, String), ComplaintKind>,
    pub reveals: BTreeMap<(String, String), crate::group::Scalar>,
    pub slashed: BTreeSet<String>,
    pub penalized: BTreeSet<(String, FaultKind)>,
}

impl Dkg {
    pub fn member_index(&self, validator_id: &str) -> Option<u32> {
        self.members
            .iter()
            .position(|m| m == validator_id)
            .map(|i| (i + 1) as u32)
    }

    pub fn is_member(&self, validator_id: &str) -> bool {
        self.members.iter().any(|m| m == validator_id)
    }

    pub fn was_complained_against(&self, dealer_id: &str) -> bool {
        self.complaints.keys().any(|(d, _)| d == dealer_id)
    }
}

/// A finalized, currently-serving dealer committee.
#[derive(Clone, Debug)]
pub struct EpochMember {
    pub validator_id: String,
    pub member_index: u32,
    pub public_share: Point,
}

#[derive(Clone, Debug)]
pub struct ActiveEpoch {
    pub id: u64,
    pub threshold: u32,
    pub public_key: Point,
    pub transcript_root: [u8; 32],
    pub members: Vec<EpochMember>,
    pub start_height: u64,
    pub slashed: Vec<String>,
}

impl ActiveEpoch {
    pub fn member(&self, validator_id: &str) -> Option<&EpochMember> {
        self.members.iter().find(|m| m.validator_id == validator_id)
    }
}
