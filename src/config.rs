//! Frozen domain-separation strings and protocol parameter defaults: one
//! place every component pulls its tunables and domain tags from instead of
//! inlining magic strings.

/// Domain used for the top-level transaction sign-bytes.
pub const DOMAIN_TX: &str = "ocp/tx/v0";
pub const DOMAIN_DEALER_HAND_DERIVE: &str = "ocp/v1/dealer/hand-derive";
pub const DOMAIN_DEALER_DECK_INIT: &str = "ocp/v1/dealer/deck-init";
pub const DOMAIN_DKG_RAND: &str = "ocp/v1/dkg/rand";
pub const DOMAIN_DKG_COMMITTEE: &str = "ocp/v1/dkg/committee";
pub const DOMAIN_DKG_TRANSCRIPT: &str = "ocp/v1/dkg/transcript";
pub const DOMAIN_DKG_SHAREMSG: &str = "ocp/dkg/sharemsg/v1";
pub const DKG_SHAREMSG_MAGIC: &[u8; 4] = b"OCP1";

pub const DOMAIN_SHUFFLE_CARD: &str = "ocp/v1/shuffle/card";
pub const DOMAIN_STATE_APPHASH: &str = "ocp/v1/state/app-hash";

/// Hard ceiling on seats per table.
pub const MAX_PLAYERS: u8 = 9;
pub const DECK_SIZE: u8 = 52;

/// Chain-wide tunables threaded into the dispatcher. These are not
/// per-table parameters (those live on `Table::params`) but protocol-level
/// defaults a deployment may override at genesis.
#[derive(Clone, Debug)]
pub struct ChainParams {
    /// Maximum number of committee members a single DKG epoch may sample.
    pub max_committee_size: u32,
    /// Deck size used by the dealer pipeline; always 52 for Hold'em, kept
    /// configurable so tests can exercise small decks cheaply.
    pub deck_size: u8,
    /// Compressed Groth16 verifying key for the shuffle circuit, provisioned
    /// at genesis. Opaque to this crate: the shuffle circuit's trusted setup
    /// is tooling this crate does not implement (see DESIGN.md).
    pub shuffle_vk_bytes: Vec<u8>,
    /// Blocks a dealer committee member gets to respond at each pipeline
    /// step (shuffle round, hole-share submission, public reveal) before a
    /// liveness timeout slashes them.
    pub dealer_timeout_blocks: u64,
    /// Validator id permitted to submit `bank/mint`. `None` means any
    /// active validator may mint (see DESIGN.md for why genesis defaults to
    /// the permissive case rather than requiring a designated faucet).
    pub mint_authority: Option<String>,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            max_committee_size: 32,
            deck_size: DECK_SIZE,
            shuffle_vk_bytes: Vec::new(),
            dealer_timeout_blocks: 50,
            mint_authority: None,
        }
    }
}
