use serde::Deserialize;
use serde_json::json;

use interface::Direction;

use crate::connector::{BalanceEntry, OrderTicket, OrderUpdate, PlacedOrder, WithdrawTicket};
use crate::decode::{parse_json, NumericString, WireError};
use crate::request::Request;

use super::map_status;

#[derive(Debug, Deserialize)]
struct GateOrder {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    finish_as: Option<String>,
    #[serde(default)]
    amount: NumericString,
    #[serde(default)]
    left: NumericString,
    #[serde(default)]
    filled_total: NumericString,
    #[serde(default)]
    avg_deal_price: NumericString,
}

impl GateOrder {
    /// 체결 수량 = 주문 수량 - 잔여 수량
    fn filled(&self) -> f64 {
        (self.amount.value_or_zero() - self.left.value_or_zero()).max(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct GateSpotAccount {
    currency: String,
    available: NumericString,
    locked: NumericString,
}

pub fn place_order_request(ticket: &OrderTicket<'_>) -> Request {
    let side = match ticket.direction {
        Direction::Buy => "buy",
        Direction::Sell => "sell",
    };
    Request::post("/api/v4/spot/orders").signed().json(json!({
        "currency_pair": ticket.symbol,
        "type": "limit",
        "account": "spot",
        "side": side,
        "amount": ticket.quantity,
        "price": ticket.rate,
        "time_in_force": "gtc",
    }))
}

pub fn decode_placed_order(body: &str) -> Result<PlacedOrder, WireError> {
    let order: GateOrder = parse_json(body)?;
    Ok(PlacedOrder {
        status: map_status(&order.status, order.finish_as.as_deref(), order.filled()),
        order_id: order.id,
    })
}

pub fn decode_order_status(body: &str) -> Result<OrderUpdate, WireError> {
    let order: GateOrder = parse_json(body)?;
    let filled = order.filled();

    let average = match order.avg_deal_price.value_or_zero() {
        price if price > 0.0 => Some(price),
        _ if filled > 0.0 => Some(order.filled_total.value_or_zero() / filled),
        _ => None,
    };

    Ok(OrderUpdate {
        status: map_status(&order.status, order.finish_as.as_deref(), filled),
        deal_quantity: Some(filled),
        deal_rate: average,
    })
}

pub fn decode_balances(body: &str) -> Result<Vec<BalanceEntry>, WireError> {
    let accounts: Vec<GateSpotAccount> = parse_json(body)?;

    let mut out = Vec::with_capacity(accounts.len());
    for account in accounts {
        out.push(BalanceEntry {
            symbol: account.currency,
            available: account.available.parse()?,
            frozen: account.locked.parse()?,
        });
    }
    Ok(out)
}

pub fn withdraw_request(ticket: &WithdrawTicket<'_>) -> Request {
    let mut body = json!({
        "currency": ticket.symbol,
        "address": ticket.address,
        "amount": ticket.quantity,
        "chain": ticket.chain_type,
    });
    if let Some(tag) = ticket.tag {
        body["memo"] = json!(tag);
    }
    Request::post("/api/v4/withdrawals").signed().json(body)
}
