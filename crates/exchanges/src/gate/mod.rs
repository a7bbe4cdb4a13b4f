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
use crate::signer::{DigestLineSigner, Signer};
use crate::transport::TransportFailure;

pub mod market;
pub mod trade;

pub const BASE_URL: &str = "https://api.gateio.ws";
pub const ENV_PREFIX: &str = "GATE";

/// Gate.io v4 커넥터
pub type GateClient = Connector<Gate>;

impl GateClient {
    pub fn new(registry: Arc<Registry>, config: ConnectorConfig) -> Result<Self, TransportFailure> {
        Connector::build(Gate::default(), registry, config)
    }

    /// `{ENV_PREFIX}_API_KEY` 등 환경변수로 인증 정보를 읽는다.
    pub fn from_env(registry: Arc<Registry>) -> Result<Self, TransportFailure> {
        Self::new(registry, ConnectorConfig::from_env(ENV_PREFIX))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gate {
    signer: DigestLineSigner,
}

/// {"label": "BALANCE_NOT_ENOUGH", "message": "..."}
#[derive(Debug, Deserialize)]
struct GateError {
    label: String,
    #[serde(default)]
    message: String,
}

/// status 는 open/closed/cancelled 뿐이고, 종료 사유는 finish_as 로 구분한다.
pub fn map_status(status: &str, finish_as: Option<&str>, filled: f64) -> OrderStatus {
    match (status, finish_as) {
        ("open", _) if filled > 0.0 => OrderStatus::Partial,
        ("open", _) => OrderStatus::New,
        (_, Some("filled")) => OrderStatus::Filled,
        (_, Some("ioc" | "fok")) => OrderStatus::Expired,
        (_, Some("poc")) => OrderStatus::Rejected,
        (_, Some("cancelled" | "stp" | "liquidate_cancelled" | "small" | "depth_not_enough" | "trader_not_enough")) => {
            OrderStatus::Cancelled
        }
        ("closed", _) => OrderStatus::Filled,
        ("cancelled", _) => OrderStatus::Cancelled,
        _ => OrderStatus::Other,
    }
}

impl Venue for Gate {
    fn id(&self) -> ExchangeId {
        ExchangeId::Gate
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
        match serde_json::from_str::<GateError>(body) {
            Ok(error) => Err(WireError::Rejected(format!("{} ({})", error.message, error.label))),
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
        Request::get(format!("/api/v4/spot/orders/{}", order_id))
            .signed()
            .query("currency_pair", symbol)
    }

    fn decode_order_status(&self, body: &str) -> Result<OrderUpdate, WireError> {
        trade::decode_order_status(body)
    }

    fn cancel_order_request(&self, symbol: &str, order_id: &str) -> Request {
        Request::delete(format!("/api/v4/spot/orders/{}", order_id))
            .signed()
            .query("currency_pair", symbol)
    }

    fn cancel_all_request(&self) -> Option<Request> {
        Some(Request::delete("/api/v4/spot/orders").signed())
    }

    fn cancel_pair_orders_request(&self, symbol: &str) -> Option<Request> {
        Some(
            Request::delete("/api/v4/spot/orders")
                .signed()
                .query("currency_pair", symbol),
        )
    }

    fn balances_request(&self) -> Request {
        Request::get("/api/v4/spot/accounts").signed()
    }

    fn decode_balances(&self, body: &str) -> Result<Vec<BalanceEntry>, WireError> {
        trade::decode_balances(body)
    }

    fn withdraw_request(&self, ticket: &WithdrawTicket<'_>) -> Option<Request> {
        Some(trade::withdraw_request(ticket))
    }
}
