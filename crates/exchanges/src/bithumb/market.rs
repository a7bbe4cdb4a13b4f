use serde::Deserialize;
use tracing::warn;

use crate::connector::{CoinListing, PairListing};
use crate::decode::{parse_json, NumericString, RawBook, RawLevel, WireError};
use crate::request::Request;

use super::DEFAULT_FEE;

/// 원화 마켓 수량 단위
const KRW_STEP_SIZE: f64 = 0.0001;
const OTHER_STEP_SIZE: f64 = 0.000001;

/// 원화 마켓 호가 단위. (가격 상한, 단위)
const KRW_TICKS: [(f64, f64); 10] = [
    (1.0, 0.0001),
    (10.0, 0.001),
    (100.0, 0.01),
    (1_000.0, 0.1),
    (5_000.0, 1.0),
    (10_000.0, 5.0),
    (50_000.0, 10.0),
    (100_000.0, 50.0),
    (500_000.0, 100.0),
    (1_000_000.0, 500.0),
];
const KRW_TOP_TICK: f64 = 1_000.0;

/// 주문 가격에 해당하는 원화 호가 단위
pub fn krw_tick(rate: f64) -> f64 {
    KRW_TICKS
        .iter()
        .find(|(upper, _)| rate < *upper)
        .map_or(KRW_TOP_TICK, |(_, tick)| *tick)
}

/// 입출금 수수료 응답 (/v2/fee/inout/ALL)
#[derive(Debug, Deserialize)]
struct FeeApiResponse {
    #[serde(default)]
    name: String,
    currency: String,
    #[serde(default)]
    networks: Vec<NetworkFee>,
}

#[derive(Debug, Deserialize)]
struct NetworkFee {
    net_name: String,
    #[serde(default)]
    withdraw_fee_quantity: NumericString,
}

#[derive(Debug, Deserialize)]
struct BithumbMarket {
    market: String,
}

#[derive(Debug, Deserialize)]
struct BithumbOrderBook {
    orderbook_units: Vec<BithumbOrderBookUnit>,
}

#[derive(Debug, Deserialize)]
struct BithumbOrderBookUnit {
    ask_price: NumericString,
    bid_price: NumericString,
    ask_size: NumericString,
    bid_size: NumericString,
}

pub fn coins_request() -> Request {
    Request::get("/v2/fee/inout/ALL")
}

pub fn decode_coins(body: &str) -> Result<Vec<CoinListing>, WireError> {
    let responses: Vec<FeeApiResponse> = parse_json(body)?;

    let mut out = Vec::with_capacity(responses.len());
    for response in responses {
        let symbol = response.currency.to_uppercase();
        // 네트워크가 여러 개면 첫 번째 네트워크 사용
        let network = response.networks.first();
        out.push(CoinListing {
            code: symbol.clone(),
            name: response.name,
            exchange_symbol: symbol,
            chain_type: network.map(|n| n.net_name.clone()).unwrap_or_default(),
            tx_fee: network
                .map(|n| n.withdraw_fee_quantity.value_or_zero())
                .unwrap_or(0.0),
            can_withdraw: network.is_some(),
            can_deposit: network.is_some(),
            confirmations: 0,
            listed: true,
        });
    }
    Ok(out)
}

pub fn pairs_request() -> Request {
    Request::get("/v1/market/all").query("isDetails", "true")
}

/// 마켓 코드 "KRW-BTC" 는 결제 통화가 앞에 온다.
pub fn decode_pairs(body: &str) -> Result<Vec<PairListing>, WireError> {
    let markets: Vec<BithumbMarket> = parse_json(body)?;

    let mut out = Vec::with_capacity(markets.len());
    for market in markets {
        let Some((base, target)) = market.market.split_once('-') else {
            warn!(market = %market.market, "skipping unexpected market code");
            continue;
        };

        // 원화 마켓은 주문 시 가격대별 단위를 다시 고른다
        let (lot_size, price_filter) = match base {
            "KRW" => (KRW_STEP_SIZE, KRW_TICKS[0].1),
            "USDT" => (OTHER_STEP_SIZE, 0.001),
            _ => (OTHER_STEP_SIZE, 0.00000001),
        };

        out.push(PairListing {
            base: base.to_string(),
            target: target.to_string(),
            exchange_symbol: market.market.clone(),
            maker_fee: DEFAULT_FEE,
            taker_fee: DEFAULT_FEE,
            lot_size,
            price_filter,
            min_trade_quantity: 0.0,
            // market/all 은 거래 가능한 마켓만 돌려준다
            listed: true,
        });
    }
    Ok(out)
}

pub fn order_book_request(symbol: &str) -> Request {
    Request::get("/v1/orderbook").query("markets", symbol)
}

/// 호가 단위마다 매도/매수가 한 쌍으로 온다.
pub fn decode_order_book(body: &str) -> Result<RawBook, WireError> {
    let books: Vec<BithumbOrderBook> = parse_json(body)?;
    let book = books
        .into_iter()
        .next()
        .ok_or_else(|| WireError::malformed("empty orderbook response"))?;

    let mut raw = RawBook::default();
    for unit in book.orderbook_units {
        raw.asks.push(RawLevel::List(vec![unit.ask_price, unit.ask_size]));
        raw.bids.push(RawLevel::List(vec![unit.bid_price, unit.bid_size]));
    }
    Ok(raw)
}
