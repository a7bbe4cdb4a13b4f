use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use interface::{ExchangeId, OrderStatus};

use crate::config::ConnectorConfig;
use crate::connector::{
    BalanceEntry, CoinListing, Connector, OrderTicket, OrderUpdate, PairListing, PlacedOrder,
    Venue, WithdrawTicket,
};
use crate::decode::{RawBook, WireError};
use crate::registry::Registry;
use crate::request::Request;
use crate::signer::{RsaMd5Signer, Signer};
use crate::transport::TransportFailure;

pub mod market;
pub mod trade;

pub const BASE_URL: &str = "https://api.lbkex.com";
pub const ENV_PREFIX: &str = "LBANK";

pub const DEFAULT_FEE: f64 = 0.001;

/// LBank 커넥터. API secret 은 PKCS8 RSA 개인키(base64)다.
pub type LbankClient = Connector<Lbank>;

impl LbankClient {
    pub fn new(registry: Arc<Registry>, config: ConnectorConfig) -> Result<Self, TransportFailure> {
        Connector::build(Lbank::default(), registry, config)
    }

    /// `{ENV_PREFIX}_API_KEY` 등 환경변수로 인증 정보를 읽는다.
    pub fn from_env(registry: Arc<Registry>) -> Result<Self, TransportFailure> {
        Self::new(registry, ConnectorConfig::from_env(ENV_PREFIX))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Lbank {
    signer: RsaMd5Signer,
}

/// {"result": "true", "data": ..., "error_code": 0, "ts": 1700000000000}
#[derive(Debug, Deserialize)]
pub(crate) struct LbankResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
struct LbankEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error_code: Option<Value>,
    #[serde(default)]
    msg: Option<String>,
}

/// result 는 문자열 "true"/"false" 또는 bool 로 온다.
fn is_false(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::String(s) => s.eq_ignore_ascii_case("false"),
        _ => false,
    }
}

fn error_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 주문 상태 코드
pub fn map_status(status: i64) -> OrderStatus {
    match status {
        -1 => OrderStatus::Cancelled,
        0 => OrderStatus::New,
        1 => OrderStatus::Partial,
        2 => OrderStatus::Filled,
        // 부분 체결 후 취소
        3 => OrderStatus::Cancelled,
        4 => OrderStatus::Cancelling,
        _ => OrderStatus::Other,
    }
}

impl Venue for Lbank {
    fn id(&self) -> ExchangeId {
        ExchangeId::Lbank
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn signer(&self) -> &dyn Signer {
        &self.signer
    }

    fn check(&self, _status: u16, body: &str) -> Result<(), WireError> {
        let Ok(envelope) = serde_json::from_str::<LbankEnvelope>(body) else {
            return Ok(());
        };

        let code = envelope.error_code.as_ref().and_then(error_code).unwrap_or(0);
        let failed = envelope.result.as_ref().is_some_and(is_false);
        if failed || code != 0 {
            let message = envelope.msg.unwrap_or_else(|| "request failed".to_string());
            return Err(WireError::Rejected(format!("{} (error_code {})", message, code)));
        }
        Ok(())
    }

    fn coins_request(&self) -> Request {
        market::coins_request()
    }

    fn decode_coins(&self, body: &str) -> Result<Vec<CoinListing>, WireError> {
        market::decode_coins(body)
    }

    fn pairs_request(&self) -> Request {
        market::pairs_request()
    }

    fn decode_pairs(&self, body: &str) -> Result<Vec<PairListing>, WireError> {
        market::decode_pairs(body)
    }

    fn order_book_request(&self, symbol: &str) -> Request {
        market::order_book_request(symbol)
    }

    fn decode_order_book(&self, body: &str) -> Result<RawBook, WireError> {
        market::decode_order_book(body)
    }

    fn place_order_request(&self, ticket: &OrderTicket<'_>) -> Request {
        trade::place_order_request(ticket)
    }

    fn decode_placed_order(&self, body: &str) -> Result<PlacedOrder, WireError> {
        trade::decode_placed_order(body)
    }

    fn order_status_request(&self, symbol: &str, order_id: &str) -> Request {
        trade::order_request("/v2/supplement/orders_info.do", symbol, order_id)
    }

    fn decode_order_status(&self, body: &str) -> Result<OrderUpdate, WireError> {
        trade::decode_order_status(body)
    }

    fn cancel_order_request(&self, symbol: &str, order_id: &str) -> Request {
        trade::order_request("/v2/supplement/cancel_order.do", symbol, order_id)
    }

    fn cancel_pair_orders_request(&self, symbol: &str) -> Option<Request> {
        Some(
            Request::post("/v2/supplement/cancel_order_by_symbol.do")
                .signed()
                .form("symbol", symbol),
        )
    }

    fn balances_request(&self) -> Request {
        Request::post("/v2/supplement/user_info_account.do").signed()
    }

    fn decode_balances(&self, body: &str) -> Result<Vec<BalanceEntry>, WireError> {
        trade::decode_balances(body)
    }

    fn withdraw_request(&self, ticket: &WithdrawTicket<'_>) -> Option<Request> {
        Some(trade::withdraw_request(ticket))
    }
}
