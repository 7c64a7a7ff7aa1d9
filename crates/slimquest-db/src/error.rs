use thiserror::Error;

/// Business-rule failures. These travel inside `anyhow::Error` and are
/// recovered with `downcast_ref` at the HTTP boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EconomyError {
    #[error("user not found")]
    UserNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("insufficient coins: need {needed}, have {available}")]
    InsufficientCoins { needed: i64, available: i64 },

    #[error("reward is out of stock")]
    OutOfStock,

    #[error("reward is not available")]
    RewardInactive,

    #[error("purchase has already been used")]
    AlreadyUsed,

    #[error("purchase belongs to another user")]
    NotOwner,

    #[error("username already taken")]
    UsernameTaken,

    #[error("unknown activity '{0}'")]
    UnknownAction(String),
}
