use serde::Deserialize;
use serde_json::json;

use interface::{Direction, OrderStatus};

use crate::connector::{BalanceEntry, OrderTicket, OrderUpdate, PlacedOrder, WithdrawTicket};
use crate::decode::{parse_json, NumericString, WireError};
use crate::request::Request;

use super::map_status;

#[derive(Debug, Deserialize)]
struct BithumbOrder {
    uuid: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    executed_volume: NumericString,
    #[serde(default)]
    trades: Vec<BithumbTrade>,
}

#[derive(Debug, Deserialize)]
struct BithumbTrade {
    volume: NumericString,
    funds: NumericString,
}

#[derive(Debug, Deserialize)]
struct BithumbAccount {
    currency: String,
    balance: NumericString,
    locked: NumericString,
}

pub fn place_order_request(ticket: &OrderTicket<'_>) -> Request {
    let side = match ticket.direction {
        Direction::Buy => "bid",
        Direction::Sell => "ask",
    };
    Request::post("/v1/orders").signed().json(json!({
        "market": ticket.symbol,
        "side": side,
        "volume": ticket.quantity,
        "price": ticket.rate,
        "ord_type": "limit",
    }))
}

pub fn decode_placed_order(body: &str) -> Result<PlacedOrder, WireError> {
    let order: BithumbOrder = parse_json(body)?;
    let status = match order.state.as_deref() {
        Some(state) => map_status(state, order.executed_volume.value_or_zero()),
        None => OrderStatus::New,
    };
    Ok(PlacedOrder {
        order_id: order.uuid,
        status,
    })
}

/// 체결 평균가는 trades 의 funds 합 / volume 합
pub fn decode_order_status(body: &str) -> Result<OrderUpdate, WireError> {
    let order: BithumbOrder = parse_json(body)?;
    let executed = order.executed_volume.value_or_zero();

    let mut volume = 0.0;
    let mut funds = 0.0;
    for trade in &order.trades {
        volume += trade.volume.parse()?;
        funds += trade.funds.parse()?;
    }

    Ok(OrderUpdate {
        status: order
            .state
            .as_deref()
            .map_or(OrderStatus::Other, |state| map_status(state, executed)),
        deal_quantity: Some(executed),
        deal_rate: if volume > 0.0 { Some(funds / volume) } else { None },
    })
}

pub fn decode_balances(body: &str) -> Result<Vec<BalanceEntry>, WireError> {
    let accounts: Vec<BithumbAccount> = parse_json(body)?;

    let mut out = Vec::with_capacity(accounts.len());
    for account in accounts {
        out.push(BalanceEntry {
            symbol: account.currency.to_uppercase(),
            available: account.balance.parse()?,
            frozen: account.locked.parse()?,
        });
    }
    Ok(out)
}

pub fn withdraw_request(ticket: &WithdrawTicket<'_>) -> Request {
    let mut body = json!({
        "currency": ticket.symbol,
        "net_type": ticket.chain_type,
        "amount": ticket.quantity,
        "address": ticket.address,
    });
    if let Some(tag) = ticket.tag {
        body["secondary_address"] = json!(tag);
    }
    Request::post("/v1/withdraws/coin").signed().json(body)
}
