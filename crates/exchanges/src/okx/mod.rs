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
use crate::signer::{PrehashSigner, Signer};
use crate::transport::TransportFailure;

pub mod market;
pub mod trade;

pub const BASE_URL: &str = "https://www.okx.com";
pub const ENV_PREFIX: &str = "OKX";

/// 기본 등급 수수료
pub const MAKER_FEE: f64 = 0.0008;
pub const TAKER_FEE: f64 = 0.001;

/// OKX 커넥터. 인증에 passphrase 가 필요하다.
pub type OkxClient = Connector<Okx>;

impl OkxClient {
    pub fn new(registry: Arc<Registry>, config: ConnectorConfig) -> Result<Self, TransportFailure> {
        Connector::build(Okx::default(), registry, config)
    }

    /// `{ENV_PREFIX}_API_KEY` 등 환경변수로 인증 정보를 읽는다.
    pub fn from_env(registry: Arc<Registry>) -> Result<Self, TransportFailure> {
        Self::new(registry, ConnectorConfig::from_env(ENV_PREFIX))
    }
}

#[derive(Debug, Clone)]
pub struct Okx {
    signer: PrehashSigner,
}

impl Default for Okx {
    fn default() -> Self {
        Self {
            signer: PrehashSigner::okx(),
        }
    }
}

/// 모든 응답 공통 봉투: {"code": "0", "msg": "", "data": [...]}
/// code/msg 는 `check` 에서 이미 확인했으므로 data 만 읽는다.
#[derive(Debug, Deserialize)]
pub(crate) struct OkxResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
struct OkxEnvelope {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Value,
}

/// 주문류 응답 항목의 sCode != "0" 인 첫 항목 (code, message)
fn failed_item(data: &Value) -> Option<(String, String)> {
    data.as_array()?.iter().find_map(|item| {
        let code = item.get("sCode").and_then(Value::as_str)?;
        if code == "0" {
            return None;
        }
        let message = item.get("sMsg").and_then(Value::as_str).unwrap_or_default();
        Some((code.to_string(), message.to_string()))
    })
}

fn code_text(code: &Value) -> String {
    match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn map_status(state: &str) -> OrderStatus {
    match state {
        "live" => OrderStatus::New,
        "partially_filled" => OrderStatus::Partial,
        "filled" => OrderStatus::Filled,
        "canceled" | "mmp_canceled" => OrderStatus::Cancelled,
        _ => OrderStatus::Other,
    }
}

impl Venue for Okx {
    fn id(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn signer(&self) -> &dyn Signer {
        &self.signer
    }

    fn check(&self, _status: u16, body: &str) -> Result<(), WireError> {
        let Ok(envelope) = serde_json::from_str::<OkxEnvelope>(body) else {
            return Ok(());
        };

        let failed = failed_item(&envelope.data);

        if let Some(code) = envelope.code.as_ref().map(code_text) {
            if code != "0" {
                // 항목별 실패 사유가 상위 msg 보다 구체적이다
                let message = match failed {
                    Some((_, message)) if !message.is_empty() => message,
                    _ => envelope.msg,
                };
                return Err(WireError::Rejected(format!("{} (code {})", message, code)));
            }
        }

        if let Some((code, message)) = failed {
            return Err(WireError::Rejected(format!("{} (code {})", message, code)));
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
        Request::get("/api/v5/trade/order")
            .signed()
            .query("instId", symbol)
            .query("ordId", order_id)
    }

    fn decode_order_status(&self, body: &str) -> Result<OrderUpdate, WireError> {
        trade::decode_order_status(body)
    }

    fn cancel_order_request(&self, symbol: &str, order_id: &str) -> Request {
        trade::cancel_order_request(symbol, order_id)
    }

    fn balances_request(&self) -> Request {
        Request::get("/api/v5/account/balance").signed()
    }

    fn decode_balances(&self, body: &str) -> Result<Vec<BalanceEntry>, WireError> {
        trade::decode_balances(body)
    }

    fn withdraw_request(&self, ticket: &WithdrawTicket<'_>) -> Option<Request> {
        Some(trade::withdraw_request(ticket))
    }
}
