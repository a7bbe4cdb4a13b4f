//! 거래소 공통 도메인 모델과 에러 정의

pub mod error;
pub mod model;
pub mod precision;

pub use error::{ErrorKind, ExchangeError, Operation};
pub use model::{
    AccountBalance, Coin, CoinConstraint, Direction, ExchangeId, Maker, MakerLevel, Order,
    OrderStatus, Pair, PairConstraint,
};
pub use precision::{
    decimals_for, filter_from_decimals, format_to_filter, format_to_step, round_to_filter,
    round_to_step, truncate_to_filter, truncate_to_step, PrecisionError,
};
