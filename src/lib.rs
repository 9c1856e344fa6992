pub mod auth;
pub mod bank;
pub mod config;
pub mod dealer;
pub mod determinism;
pub mod events;
pub mod group;
pub mod handeval;
pub mod logging;
pub mod poker;
pub mod shuffle;
pub mod staking;
pub mod state;
pub mod tx;

pub use config::ChainParams;
pub use events::Event;
pub use state::State;
pub use tx::{apply_transaction, Envelope, TxResult};
