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
use crate::signer::{QueryHmacSigner, Signer};
use crate::transport::TransportFailure;

pub mod market;
pub mod trade;

pub const BASE_URL: &str = "https://api.binance.com";
pub const ENV_PREFIX: &str = "BINANCE";

/// 현물 기본 수수료 (VIP 0)
pub const DEFAULT_FEE: f64 = 0.001;

/// Binance 현물 커넥터
pub type BinanceClient = Connector<Binance>;

impl BinanceClient {
    pub fn new(registry: Arc<Registry>, config: ConnectorConfig) -> Result<Self, TransportFailure> {
        Connector::build(Binance::default(), registry, config)
    }

    /// `{ENV_PREFIX}_API_KEY` 등 환경변수로 인증 정보를 읽는다.
    pub fn from_env(registry: Arc<Registry>) -> Result<Self, TransportFailure> {
        Self::new(registry, ConnectorConfig::from_env(ENV_PREFIX))
    }
}

#[derive(Debug, Clone)]
pub struct Binance {
    signer: QueryHmacSigner,
}

impl Default for Binance {
    fn default() -> Self {
        Self {
            signer: QueryHmacSigner::binance(),
        }
    }
}

/// 4xx 응답 본문: {"code": -2010, "msg": "Account has insufficient balance for requested action."}
#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// Binance 주문 상태 -> 공통 상태
pub fn map_status(status: &str) -> OrderStatus {
    match status {
        "NEW" | "PENDING_NEW" => OrderStatus::New,
        "PARTIALLY_FILLED" => OrderStatus::Partial,
        "FILLED" => OrderStatus::Filled,
        "PENDING_CANCEL" => OrderStatus::Cancelling,
        "CANCELED" => OrderStatus::Cancelled,
        "REJECTED" => OrderStatus::Rejected,
        "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
        _ => OrderStatus::Other,
    }
}

impl Venue for Binance {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn signer(&self) -> &dyn Signer {
        &self.signer
    }

    fn check(&self, status: u16, body: &str) -> Result<(), WireError> {
        if (200..300).contains(&status) {
            return Ok(());
        }
        match serde_json::from_str::<BinanceErrorBody>(body) {
            Ok(error) => Err(WireError::Rejected(format!("{} (code {})", error.msg, error.code))),
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

    fn place_order_request(&self, ticket: &OrderTicket<'_>) -> Request {
        trade::place_order_request(ticket)
    }

    fn decode_placed_order(&self, body: &str) -> Result<PlacedOrder, WireError> {
        trade::decode_placed_order(body)
    }

    fn order_status_request(&self, symbol: &str, order_id: &str) -> Request {
        trade::order_request(Request::get("/api/v3/order"), symbol, order_id)
    }

    fn decode_order_status(&self, body: &str) -> Result<OrderUpdate, WireError> {
        trade::decode_order_status(body)
    }

    fn cancel_order_request(&self, symbol: &str, order_id: &str) -> Request {
        trade::order_request(Request::delete("/api/v3/order"), symbol, order_id)
    }

    fn cancel_pair_orders_request(&self, symbol: &str) -> Option<Request> {
        Some(
            Request::delete("/api/v3/openOrders")
                .signed()
                .query("symbol", symbol),
        )
    }

    fn balances_request(&self) -> Request {
        Request::get("/api/v3/account").signed()
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
    fn test_status_mapping_is_total() {
        let documented = [
            ("NEW", OrderStatus::New),
            ("PENDING_NEW", OrderStatus::New),
            ("PARTIALLY_FILLED", OrderStatus::Partial),
            ("FILLED", OrderStatus::Filled),
            ("PENDING_CANCEL", OrderStatus::Cancelling),
            ("CANCELED", OrderStatus::Cancelled),
            ("REJECTED", OrderStatus::Rejected),
            ("EXPIRED", OrderStatus::Expired),
            ("EXPIRED_IN_MATCH", OrderStatus::Expired),
        ];
        for (code, expected) in documented {
            assert_eq!(map_status(code), expected, "{}", code);
        }
        assert_eq!(map_status("SOMETHING_NEW"), OrderStatus::Other);
        assert_eq!(map_status(""), OrderStatus::Other);
    }

    #[test]
    fn test_error_body_is_rejected() {
        let venue = Binance::default();
        let err = venue
            .check(400, r#"{"code":-1013,"msg":"Filter failure: LOT_SIZE"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            WireError::Rejected("Filter failure: LOT_SIZE (code -1013)".to_string())
        );
        assert!(venue.check(200, "{}").is_ok());
        // JSON 이 아닌 에러 본문은 커넥터가 상태 코드로 처리
        assert!(venue.check(404, "<html></html>").is_ok());
    }
}
