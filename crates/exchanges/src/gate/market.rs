use serde::Deserialize;
use serde_json::Value;

use interface::filter_from_decimals;

use crate::connector::{CoinListing, PairListing};
use crate::decode::{parse_entries, parse_json, NumericString, RawBook, WireError};
use crate::request::Request;

#[derive(Debug, Deserialize)]
struct GateCurrency {
    currency: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    delisted: bool,
    #[serde(default)]
    withdraw_disabled: bool,
    #[serde(default)]
    deposit_disabled: bool,
    #[serde(default)]
    chain: String,
}

#[derive(Debug, Deserialize)]
struct GateCurrencyPair {
    id: String,
    base: String,
    quote: String,
    /// 퍼센트 단위 ("0.2" = 0.2%)
    #[serde(default)]
    fee: NumericString,
    #[serde(default)]
    min_base_amount: NumericString,
    amount_precision: u32,
    precision: u32,
    #[serde(default)]
    trade_status: String,
}

pub fn coins_request() -> Request {
    Request::get("/api/v4/spot/currencies")
}

/// 출금 수수료는 이 목록에 없다.
pub fn decode_coins(body: &str) -> Result<Vec<CoinListing>, WireError> {
    let currencies: Vec<GateCurrency> = parse_json(body)?;

    let mut out = Vec::with_capacity(currencies.len());
    for currency in currencies {
        out.push(CoinListing {
            code: currency.currency.clone(),
            name: currency.name,
            exchange_symbol: currency.currency,
            chain_type: currency.chain,
            tx_fee: 0.0,
            can_withdraw: !currency.withdraw_disabled,
            can_deposit: !currency.deposit_disabled,
            confirmations: 0,
            listed: !currency.delisted,
        });
    }
    Ok(out)
}

pub fn pairs_request() -> Request {
    Request::get("/api/v4/spot/currency_pairs")
}

/// 자리수가 비어 있는 거래쌍은 건너뛴다.
pub fn decode_pairs(body: &str) -> Result<Vec<PairListing>, WireError> {
    let entries: Vec<Value> = parse_json(body)?;
    let pairs: Vec<GateCurrencyPair> = parse_entries(entries, "gate currency pair");

    let mut out = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let fee = pair.fee.value_or_zero() / 100.0;
        out.push(PairListing {
            base: pair.quote,
            target: pair.base,
            exchange_symbol: pair.id,
            maker_fee: fee,
            taker_fee: fee,
            lot_size: filter_from_decimals(pair.amount_precision),
            price_filter: filter_from_decimals(pair.precision),
            min_trade_quantity: pair.min_base_amount.value_or_zero(),
            listed: pair.trade_status == "tradable",
        });
    }
    Ok(out)
}

pub fn order_book_request(symbol: &str) -> Request {
    Request::get("/api/v4/spot/order_book")
        .query("currency_pair", symbol)
        .query("limit", "100")
}

pub fn decode_order_book(body: &str) -> Result<RawBook, WireError> {
    parse_json(body)
}
