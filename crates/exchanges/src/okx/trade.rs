use serde::Deserialize;
use serde_json::json;

use interface::{Direction, OrderStatus};

use crate::connector::{BalanceEntry, OrderTicket, OrderUpdate, PlacedOrder, WithdrawTicket};
use crate::decode::{parse_json, NumericString, WireError};
use crate::request::Request;

use super::{map_status, OkxResponse};

/// 온체인 출금
const DEST_ON_CHAIN: &str = "4";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxPlacedOrder {
    ord_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxOrder {
    #[serde(default)]
    state: String,
    #[serde(default)]
    acc_fill_sz: NumericString,
    #[serde(default)]
    avg_px: NumericString,
}

#[derive(Debug, Deserialize)]
struct OkxAccount {
    #[serde(default)]
    details: Vec<OkxBalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxBalanceDetail {
    ccy: String,
    avail_bal: NumericString,
    #[serde(default)]
    frozen_bal: NumericString,
}

fn first<T>(response: OkxResponse<Vec<T>>) -> Result<T, WireError> {
    response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| WireError::malformed("empty data array"))
}

pub fn place_order_request(ticket: &OrderTicket<'_>) -> Request {
    let side = match ticket.direction {
        Direction::Buy => "buy",
        Direction::Sell => "sell",
    };
    Request::post("/api/v5/trade/order").signed().json(json!({
        "instId": ticket.symbol,
        "tdMode": "cash",
        "side": side,
        "ordType": "limit",
        "px": ticket.rate,
        "sz": ticket.quantity,
    }))
}

pub fn decode_placed_order(body: &str) -> Result<PlacedOrder, WireError> {
    let placed: OkxPlacedOrder = first(parse_json(body)?)?;
    Ok(PlacedOrder {
        order_id: placed.ord_id,
        status: OrderStatus::New,
    })
}

pub fn decode_order_status(body: &str) -> Result<OrderUpdate, WireError> {
    let order: OkxOrder = first(parse_json(body)?)?;
    let filled = order.acc_fill_sz.value_or_zero();
    // 체결 전에는 avgPx 가 빈 문자열
    let average = order.avg_px.value_or_zero();

    Ok(OrderUpdate {
        status: map_status(&order.state),
        deal_quantity: Some(filled),
        deal_rate: if average > 0.0 { Some(average) } else { None },
    })
}

pub fn cancel_order_request(symbol: &str, order_id: &str) -> Request {
    Request::post("/api/v5/trade/cancel-order").signed().json(json!({
        "instId": symbol,
        "ordId": order_id,
    }))
}

pub fn decode_balances(body: &str) -> Result<Vec<BalanceEntry>, WireError> {
    let account: OkxAccount = first(parse_json(body)?)?;

    let mut out = Vec::with_capacity(account.details.len());
    for detail in account.details {
        out.push(BalanceEntry {
            symbol: detail.ccy,
            available: detail.avail_bal.parse()?,
            frozen: detail.frozen_bal.value_or_zero(),
        });
    }
    Ok(out)
}

/// 태그가 있는 코인은 "주소:태그" 형식으로 보낸다.
pub fn withdraw_request(ticket: &WithdrawTicket<'_>) -> Request {
    let to_addr = match ticket.tag {
        Some(tag) => format!("{}:{}", ticket.address, tag),
        None => ticket.address.to_string(),
    };
    Request::post("/api/v5/asset/withdrawal").signed().json(json!({
        "ccy": ticket.symbol,
        "amt": ticket.quantity,
        "dest": DEST_ON_CHAIN,
        "toAddr": to_addr,
        "chain": ticket.chain_type,
        "fee": ticket.fee.to_string(),
    }))
}
