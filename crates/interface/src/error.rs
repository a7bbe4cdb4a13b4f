use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ExchangeId;
use crate::precision::PrecisionError;

/// 에러 메시지에 포함할 원본 응답 길이
const RAW_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CoinsData,
    PairsData,
    OrderBook,
    LimitBuy,
    LimitSell,
    OrderStatus,
    CancelOrder,
    CancelAllOrders,
    Balances,
    Withdraw,
}

impl Operation {
    /// 주문/출금처럼 재시도하면 안 되는 호출인지
    pub fn is_trading(&self) -> bool {
        matches!(
            self,
            Operation::LimitBuy
                | Operation::LimitSell
                | Operation::OrderStatus
                | Operation::CancelOrder
                | Operation::CancelAllOrders
                | Operation::Withdraw
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CoinsData => "GetCoinsData",
            Operation::PairsData => "GetPairsData",
            Operation::OrderBook => "OrderBook",
            Operation::LimitBuy => "LimitBuy",
            Operation::LimitSell => "LimitSell",
            Operation::OrderStatus => "OrderStatus",
            Operation::CancelOrder => "CancelOrder",
            Operation::CancelAllOrders => "CancelAllOrder",
            Operation::Balances => "UpdateAllBalances",
            Operation::Withdraw => "Withdraw",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Application,
    Decode,
    Precision,
    Unsupported,
}

#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    /// 네트워크 호출 전에 감지되는 설정 문제 (API 키 누락, 잘못된 키 형식 등)
    #[error("{exchange} {operation}: configuration error: {message}")]
    Configuration {
        exchange: ExchangeId,
        operation: Operation,
        message: String,
    },

    /// 연결 실패, 타임아웃 등
    #[error("{exchange} {operation}: transport error: {message}")]
    Transport {
        exchange: ExchangeId,
        operation: Operation,
        message: String,
    },

    /// 통신은 성공했지만 거래소가 요청을 거절한 경우
    #[error("{exchange} {operation}: rejected (http {status}): {message}, response: {}", preview(.raw))]
    Application {
        exchange: ExchangeId,
        operation: Operation,
        status: u16,
        message: String,
        raw: String,
    },

    /// 응답 형식이 예상과 다른 경우
    #[error("{exchange} {operation}: unexpected response: {message}, response: {}", preview(.raw))]
    Decode {
        exchange: ExchangeId,
        operation: Operation,
        message: String,
        raw: String,
    },

    #[error("{exchange} {operation}: precision error: {source}")]
    Precision {
        exchange: ExchangeId,
        operation: Operation,
        #[source]
        source: PrecisionError,
    },

    #[error("{exchange} {operation}: not supported by this exchange")]
    Unsupported {
        exchange: ExchangeId,
        operation: Operation,
    },
}

fn preview(raw: &str) -> String {
    raw.chars().take(RAW_PREVIEW_CHARS).collect()
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::Configuration { .. } => ErrorKind::Configuration,
            ExchangeError::Transport { .. } => ErrorKind::Transport,
            ExchangeError::Application { .. } => ErrorKind::Application,
            ExchangeError::Decode { .. } => ErrorKind::Decode,
            ExchangeError::Precision { .. } => ErrorKind::Precision,
            ExchangeError::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        match self {
            ExchangeError::Configuration { exchange, .. }
            | ExchangeError::Transport { exchange, .. }
            | ExchangeError::Application { exchange, .. }
            | ExchangeError::Decode { exchange, .. }
            | ExchangeError::Precision { exchange, .. }
            | ExchangeError::Unsupported { exchange, .. } => *exchange,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            ExchangeError::Configuration { operation, .. }
            | ExchangeError::Transport { operation, .. }
            | ExchangeError::Application { operation, .. }
            | ExchangeError::Decode { operation, .. }
            | ExchangeError::Precision { operation, .. }
            | ExchangeError::Unsupported { operation, .. } => *operation,
        }
    }

    /// 원본 응답 전문 (감사 로그용)
    pub fn raw(&self) -> Option<&str> {
        match self {
            ExchangeError::Application { raw, .. } | ExchangeError::Decode { raw, .. } => {
                Some(raw.as_str())
            }
            _ => None,
        }
    }

    /// 인증 문제로 보이는 에러인지 (키 누락/형식 오류 또는 401/403 응답)
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ExchangeError::Configuration { .. } => true,
            ExchangeError::Application { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
