use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PokerError {
    #[error("table {0} does not exist")]
    UnknownTable(u64),
    #[error("seat {0} is out of range")]
    SeatOutOfRange(u8),
    #[error("seat {0} is already occupied")]
    SeatOccupied(u8),
    #[error("seat {0} is not occupied")]
    SeatVacant(u8),
    #[error("buy-in {amount} is outside the table's [{min}, {max}] range")]
    BuyInOutOfRange { amount: u64, min: u64, max: u64 },
    #[error("table {0} already has a hand in progress")]
    HandInProgress(u64),
    #[error("table {0} has no active hand")]
    NoActiveHand(u64),
    #[error("fewer than two funded seats at table {0}")]
    NotEnoughPlayers(u64),
    #[error("it is not seat {0}'s turn to act")]
    NotYourTurn(u8),
    #[error("action is illegal in the hand's current state")]
    IllegalAction,
    #[error("seat {0} has no registered player public key, required in dealer mode")]
    MissingPlayerKey(u8),
    #[error("the player named in this transaction is not seated at the table")]
    PlayerNotSeated,
    #[error("arithmetic overflow in poker engine")]
    Overflow,
    #[error("action deadline has not yet passed")]
    DeadlineNotPassed,
    #[error("hand is not in the expected phase for this operation")]
    WrongPhase,
    #[error("no active dealer epoch to deal this hand from")]
    NoActiveDealerEpoch,
    #[error("dealer state for this hand is already initialized")]
    DealerAlreadyInitialized,
    #[error("invalid table parameters: {0}")]
    InvalidTableParams(&'static str),
    #[error(transparent)]
    Dealer(#[from] crate::dealer::DealerError),
    #[error(transparent)]
    Bank(#[from] crate::bank::BankError),
    #[error(transparent)]
    HandEval(#[from] crate::handeval::HandEvalError),
}
