use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::connector::{CoinListing, PairListing};
use crate::decode::{parse_entries, parse_json, NumericString, RawBook, WireError};
use crate::request::Request;

use super::{OkxResponse, MAKER_FEE, TAKER_FEE};

/// 코인-체인 한 건. 같은 ccy 가 체인 수만큼 반복된다.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxCurrency {
    ccy: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    chain: String,
    #[serde(default)]
    can_dep: bool,
    #[serde(default)]
    can_wd: bool,
    #[serde(default, alias = "fee")]
    min_fee: NumericString,
    #[serde(default)]
    main_net: bool,
    #[serde(default)]
    min_dep_arrival_confirm: NumericString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    base_ccy: String,
    quote_ccy: String,
    lot_sz: NumericString,
    tick_sz: NumericString,
    #[serde(default)]
    min_sz: NumericString,
    state: String,
}

pub fn coins_request() -> Request {
    Request::get("/api/v5/asset/currencies").signed()
}

/// ccy 별로 메인넷 체인을 고른다. 메인넷 표시가 없으면 처음 나온 체인.
pub fn decode_coins(body: &str) -> Result<Vec<CoinListing>, WireError> {
    let response: OkxResponse<Vec<OkxCurrency>> = parse_json(body)?;

    let mut order: Vec<String> = Vec::new();
    let mut chosen: HashMap<String, OkxCurrency> = HashMap::new();
    for currency in response.data {
        match chosen.get(&currency.ccy) {
            None => {
                order.push(currency.ccy.clone());
                chosen.insert(currency.ccy.clone(), currency);
            }
            Some(existing) if !existing.main_net && currency.main_net => {
                chosen.insert(currency.ccy.clone(), currency);
            }
            Some(_) => {}
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for ccy in order {
        let Some(currency) = chosen.remove(&ccy) else {
            continue;
        };
        let confirmations = confirmations(&currency);
        out.push(CoinListing {
            code: currency.ccy.clone(),
            name: currency.name,
            exchange_symbol: currency.ccy,
            chain_type: currency.chain,
            tx_fee: currency.min_fee.value_or_zero(),
            can_withdraw: currency.can_wd,
            can_deposit: currency.can_dep,
            confirmations,
            listed: true,
        });
    }
    Ok(out)
}

fn confirmations(currency: &OkxCurrency) -> u32 {
    let raw = &currency.min_dep_arrival_confirm;
    match raw.as_integer().map(u32::try_from) {
        Some(Ok(count)) => count,
        _ => {
            warn!(ccy = %currency.ccy, value = ?raw, "invalid confirmation count, using 0");
            0
        }
    }
}

pub fn pairs_request() -> Request {
    Request::get("/api/v5/public/instruments").query("instType", "SPOT")
}

pub fn decode_pairs(body: &str) -> Result<Vec<PairListing>, WireError> {
    let response: OkxResponse<Vec<Value>> = parse_json(body)?;
    let instruments: Vec<OkxInstrument> = parse_entries(response.data, "okx instrument");

    let mut out = Vec::with_capacity(instruments.len());
    for instrument in instruments {
        let (lot_size, price_filter) = match (instrument.lot_sz.parse(), instrument.tick_sz.parse()) {
            (Ok(lot), Ok(tick)) => (lot, tick),
            (Err(e), _) | (_, Err(e)) => {
                warn!(inst_id = %instrument.inst_id, error = %e, "skipping instrument");
                continue;
            }
        };
        out.push(PairListing {
            base: instrument.quote_ccy,
            target: instrument.base_ccy,
            exchange_symbol: instrument.inst_id,
            maker_fee: MAKER_FEE,
            taker_fee: TAKER_FEE,
            lot_size,
            price_filter,
            min_trade_quantity: instrument.min_sz.value_or_zero(),
            listed: instrument.state == "live",
        });
    }
    Ok(out)
}

pub fn order_book_request(symbol: &str) -> Request {
    Request::get("/api/v5/market/books")
        .query("instId", symbol)
        .query("sz", "100")
}

/// data[0] 에 asks/bids 가 [가격, 수량, 폐기 필드, 주문 수] 배열로 온다.
pub fn decode_order_book(body: &str) -> Result<RawBook, WireError> {
    let response: OkxResponse<Vec<RawBook>> = parse_json(body)?;
    response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| WireError::malformed("empty order book data"))
}
