use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExchangeId {
    Binance,
    Bithumb,
    Okx,
    Gate,
    Lbank,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Bithumb => "bithumb",
            ExchangeId::Okx => "okx",
            ExchangeId::Gate => "gate",
            ExchangeId::Lbank => "lbank",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 거래소 공통 자산 식별자. `id` 만이 거래소 간 비교에 쓰인다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub id: u64,
    pub code: String,
    pub name: String,
}

/// 거래쌍 식별자.
/// - `base`: 가격이 표시되는 결제 자산 (BTC/USDT 의 USDT)
/// - `target`: 실제로 사고 파는 자산 (BTC/USDT 의 BTC)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub id: u64,
    pub base: Coin,
    pub target: Coin,
}

impl Pair {
    /// 예: "BTC/USDT"
    pub fn name(&self) -> String {
        format!("{}/{}", self.target.code, self.base.code)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target.code, self.base.code)
    }
}

/// 거래소별 코인 입출금 제약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinConstraint {
    pub coin_id: u64,
    pub exchange_symbol: String,
    pub chain_type: String,
    pub tx_fee: f64,
    pub can_withdraw: bool,
    pub can_deposit: bool,
    pub confirmations: u32,
    pub listed: bool,
}

/// 거래소별 거래쌍 주문 제약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConstraint {
    pub pair_id: u64,
    pub exchange_symbol: String,
    pub maker_fee: f64,
    pub taker_fee: f64,
    /// 수량 최소 단위 (예: 0.0001)
    pub lot_size: f64,
    /// 가격 최소 단위 (tick size)
    pub price_filter: f64,
    pub min_trade_quantity: f64,
    pub listed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Partial,
    Filled,
    Cancelling,
    Cancelled,
    Rejected,
    Expired,
    Other,
}

impl OrderStatus {
    /// 더 이상 상태가 바뀌지 않는 종료 상태인지
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub exchange: ExchangeId,
    pub pair: Pair,
    /// 거래소가 부여한 주문 ID. 한 번 정해지면 바뀌지 않는다.
    pub order_id: String,
    pub rate: f64,
    pub quantity: f64,
    pub deal_rate: f64,
    pub deal_quantity: f64,
    pub direction: Direction,
    pub status: OrderStatus,
    /// 마지막으로 받은 원본 응답
    pub raw: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MakerLevel {
    pub rate: f64,
    pub quantity: f64,
}

/// 오더북 스냅샷. bids 는 높은 가격 순, asks 는 낮은 가격 순.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maker {
    pub bids: Vec<MakerLevel>,
    pub asks: Vec<MakerLevel>,
    pub before_request: DateTime<Utc>,
    pub after_request: DateTime<Utc>,
}

impl Maker {
    pub fn best_bid(&self) -> Option<MakerLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<MakerLevel> {
        self.asks.first().copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub coin: Coin,
    pub available: f64,
    pub frozen: f64,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    pub fn total(&self) -> f64 {
        self.available + self.frozen
    }
}
