use serde::Deserialize;

use interface::{Direction, OrderStatus};

use crate::connector::{BalanceEntry, OrderTicket, OrderUpdate, PlacedOrder, WithdrawTicket};
use crate::decode::{parse_json, NumericString, WireError};
use crate::request::Request;

use super::{map_status, LbankResponse};

#[derive(Debug, Deserialize)]
struct LbankPlacedOrder {
    #[serde(alias = "orderId")]
    order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LbankOrder {
    #[serde(default)]
    status: Option<NumericString>,
    #[serde(default)]
    executed_qty: NumericString,
    #[serde(default)]
    cummulative_quote_qty: NumericString,
}

#[derive(Debug, Deserialize)]
struct LbankAccount {
    #[serde(default)]
    balances: Vec<LbankBalance>,
}

#[derive(Debug, Deserialize)]
struct LbankBalance {
    asset: String,
    free: NumericString,
    locked: NumericString,
}

pub fn place_order_request(ticket: &OrderTicket<'_>) -> Request {
    let side = match ticket.direction {
        Direction::Buy => "buy",
        Direction::Sell => "sell",
    };
    Request::post("/v2/supplement/create_order.do")
        .signed()
        .form("symbol", ticket.symbol)
        .form("type", side)
        .form("price", ticket.rate.clone())
        .form("amount", ticket.quantity.clone())
}

pub fn decode_placed_order(body: &str) -> Result<PlacedOrder, WireError> {
    let response: LbankResponse<LbankPlacedOrder> = parse_json(body)?;
    Ok(PlacedOrder {
        order_id: response.data.order_id,
        status: map_status(0),
    })
}

/// 주문 조회/취소 공통 폼
pub fn order_request(path: &str, symbol: &str, order_id: &str) -> Request {
    Request::post(path)
        .signed()
        .form("symbol", symbol)
        .form("orderId", order_id)
}

pub fn decode_order_status(body: &str) -> Result<OrderUpdate, WireError> {
    let response: LbankResponse<LbankOrder> = parse_json(body)?;
    let order = response.data;
    // 정수가 아닌 상태값은 Other
    let status = order
        .status
        .as_ref()
        .and_then(NumericString::as_integer)
        .map_or(OrderStatus::Other, map_status);
    let executed = order.executed_qty.value_or_zero();
    let quote = order.cummulative_quote_qty.value_or_zero();

    Ok(OrderUpdate {
        status,
        deal_quantity: Some(executed),
        deal_rate: if executed > 0.0 && quote > 0.0 {
            Some(quote / executed)
        } else {
            None
        },
    })
}

pub fn decode_balances(body: &str) -> Result<Vec<BalanceEntry>, WireError> {
    let response: LbankResponse<LbankAccount> = parse_json(body)?;

    let mut out = Vec::with_capacity(response.data.balances.len());
    for balance in response.data.balances {
        out.push(BalanceEntry {
            symbol: balance.asset,
            available: balance.free.parse()?,
            frozen: balance.locked.parse()?,
        });
    }
    Ok(out)
}

pub fn withdraw_request(ticket: &WithdrawTicket<'_>) -> Request {
    let mut request = Request::post("/v2/supplement/withdraw.do")
        .signed()
        .form("address", ticket.address)
        .form("coin", ticket.symbol)
        .form("amount", ticket.quantity.clone());
    if !ticket.chain_type.is_empty() {
        request = request.form("networkName", ticket.chain_type);
    }
    if let Some(tag) = ticket.tag {
        request = request.form("memo", tag);
    }
    request
}
