use std::sync::Arc;

use serde::Deserialize;

use interface::{ExchangeId, OrderStatus};

use crate::config::ConnectorConfig;
use crate::connector::{
    BalanceEntry, CoinListing, Connector, OrderTicket, OrderUpdate, PairListing, PlacedOrder,
    Venue, WithdrawTicket,
};
use crate::decode::{RawBook, WireError};
use crate::registry::Registry;
use crate::request::Request;
use crate::signer::{Signer, TokenSigner};
use crate::transport::TransportFailure;

pub mod market;
pub mod trade;

pub const BASE_URL: &str = "https://api.bithumb.com";
pub const ENV_PREFIX: &str = "BITHUMB";

/// 0.04% 메이커, 테이커
pub const DEFAULT_FEE: f64 = 0.0004;

/// Bithumb 커넥터 (신버전 /v1 API, JWT 인증)
pub type BithumbClient = Connector<Bithumb>;

impl BithumbClient {
    pub fn new(registry: Arc<Registry>, config: ConnectorConfig) -> Result<Self, TransportFailure> {
        Connector::build(Bithumb::default(), registry, config)
    }

    /// `{ENV_PREFIX}_API_KEY` 등 환경변수로 인증 정보를 읽는다.
    pub fn from_env(registry: Arc<Registry>) -> Result<Self, TransportFailure> {
        Self::new(registry, ConnectorConfig::from_env(ENV_PREFIX))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bithumb {
    signer: TokenSigner,
}

/// {"error": {"name": "invalid_query_payload", "message": "..."}}
#[derive(Debug, Deserialize)]
struct BithumbErrorBody {
    error: BithumbError,
}

#[derive(Debug, Deserialize)]
struct BithumbError {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

/// Bithumb 주문 상태 -> 공통 상태.
/// wait/watch 는 체결 수량이 있으면 부분 체결로 본다.
pub fn map_status(state: &str, executed_volume: f64) -> OrderStatus {
    match state {
        "wait" | "watch" if executed_volume > 0.0 => OrderStatus::Partial,
        "wait" | "watch" => OrderStatus::New,
        "done" => OrderStatus::Filled,
        "cancel" => OrderStatus::Cancelled,
        _ => OrderStatus::Other,
    }
}

impl Venue for Bithumb {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bithumb
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn signer(&self) -> &dyn Signer {
        &self.signer
    }

    fn check(&self, _status: u16, body: &str) -> Result<(), WireError> {
        // 에러는 상태 코드와 무관하게 error 객체로 온다
        if !body.trim_start().starts_with('{') {
            return Ok(());
        }
        match serde_json::from_str::<BithumbErrorBody>(body) {
            Ok(body) => Err(WireError::Rejected(format!(
                "{} ({})",
                body.error.message, body.error.name
            ))),
            Err(_) => Ok(()),
        }
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

    fn price_tick(&self, symbol: &str, rate: f64) -> Option<f64> {
        symbol.starts_with("KRW-").then(|| market::krw_tick(rate))
    }

    fn place_order_request(&self, ticket: &OrderTicket<'_>) -> Request {
        trade::place_order_request(ticket)
    }

    fn decode_placed_order(&self, body: &str) -> Result<PlacedOrder, WireError> {
        trade::decode_placed_order(body)
    }

    fn order_status_request(&self, _symbol: &str, order_id: &str) -> Request {
        Request::get("/v1/order").signed().query("uuid", order_id)
    }

    fn decode_order_status(&self, body: &str) -> Result<OrderUpdate, WireError> {
        trade::decode_order_status(body)
    }

    fn cancel_order_request(&self, _symbol: &str, order_id: &str) -> Request {
        Request::delete("/v1/order").signed().query("uuid", order_id)
    }

    fn balances_request(&self) -> Request {
        Request::get("/v1/accounts").signed()
    }

    fn decode_balances(&self, body: &str) -> Result<Vec<BalanceEntry>, WireError> {
        trade::decode_balances(body)
    }

    fn withdraw_request(&self, ticket: &WithdrawTicket<'_>) -> Option<Request> {
        Some(trade::withdraw_request(ticket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_uses_executed_volume() {
        assert_eq!(map_status("wait", 0.0), OrderStatus::New);
        assert_eq!(map_status("watch", 0.0), OrderStatus::New);
        assert_eq!(map_status("wait", 0.0005), OrderStatus::Partial);
        assert_eq!(map_status("watch", 1.0), OrderStatus::Partial);
        assert_eq!(map_status("done", 1.0), OrderStatus::Filled);
        assert_eq!(map_status("cancel", 0.0), OrderStatus::Cancelled);
        assert_eq!(map_status("cancel", 0.3), OrderStatus::Cancelled);
        assert_eq!(map_status("prevented", 0.0), OrderStatus::Other);
    }

    #[test]
    fn test_error_envelope() {
        let venue = Bithumb::default();
        let err = venue
            .check(
                400,
                r#"{"error":{"name":"under_min_total_bid","message":"최소주문금액 이상으로 주문해주세요"}}"#,
            )
            .unwrap_err();
        assert!(matches!(err, WireError::Rejected(ref m) if m.contains("under_min_total_bid")));
        assert!(venue.check(200, r#"[{"currency":"KRW"}]"#).is_ok());
        assert!(venue.check(200, r#"{"uuid":"C0106000032400700021"}"#).is_ok());
    }
}
