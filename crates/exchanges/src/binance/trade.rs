use serde::Deserialize;

use interface::Direction;

use crate::connector::{BalanceEntry, OrderTicket, OrderUpdate, PlacedOrder, WithdrawTicket};
use crate::decode::{parse_json, NumericString, WireError};
use crate::request::Request;

use super::map_status;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrder {
    order_id: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    executed_qty: NumericString,
    #[serde(default)]
    cummulative_quote_qty: NumericString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountResponse {
    balances: Vec<BinanceBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBalance {
    asset: String,
    free: NumericString,   // 사용 가능한 잔액
    locked: NumericString, // 주문에 사용 중인 잔액
}

pub fn place_order_request(ticket: &OrderTicket<'_>) -> Request {
    let side = match ticket.direction {
        Direction::Buy => "BUY",
        Direction::Sell => "SELL",
    };
    Request::post("/api/v3/order")
        .signed()
        .query("symbol", ticket.symbol)
        .query("side", side)
        .query("type", "LIMIT")
        .query("timeInForce", "GTC")
        .query("quantity", ticket.quantity.clone())
        .query("price", ticket.rate.clone())
}

pub fn decode_placed_order(body: &str) -> Result<PlacedOrder, WireError> {
    let order: BinanceOrder = parse_json(body)?;
    Ok(PlacedOrder {
        order_id: order.order_id.to_string(),
        status: map_status(&order.status),
    })
}

/// 주문 조회/취소 공통 파라미터
pub fn order_request(request: Request, symbol: &str, order_id: &str) -> Request {
    request
        .signed()
        .query("symbol", symbol)
        .query("orderId", order_id)
}

pub fn decode_order_status(body: &str) -> Result<OrderUpdate, WireError> {
    let order: BinanceOrder = parse_json(body)?;
    let executed = order.executed_qty.value_or_zero();
    let quote = order.cummulative_quote_qty.value_or_zero();

    Ok(OrderUpdate {
        status: map_status(&order.status),
        deal_quantity: Some(executed),
        deal_rate: if executed > 0.0 { Some(quote / executed) } else { None },
    })
}

pub fn decode_balances(body: &str) -> Result<Vec<BalanceEntry>, WireError> {
    let account: BinanceAccountResponse = parse_json(body)?;

    let mut out = Vec::new();
    for balance in account.balances {
        let free = balance.free.parse()?;
        let locked = balance.locked.parse()?;

        // 잔액이 0인 경우 스킵
        if free + locked > 0.0 {
            out.push(BalanceEntry {
                symbol: balance.asset,
                available: free,
                frozen: locked,
            });
        }
    }
    Ok(out)
}

pub fn withdraw_request(ticket: &WithdrawTicket<'_>) -> Request {
    let mut request = Request::post("/sapi/v1/capital/withdraw/apply")
        .signed()
        .query("coin", ticket.symbol)
        .query("address", ticket.address)
        .query("amount", ticket.quantity.clone());
    if !ticket.chain_type.is_empty() {
        request = request.query("network", ticket.chain_type);
    }
    if let Some(tag) = ticket.tag {
        request = request.query("addressTag", tag);
    }
    request
}
