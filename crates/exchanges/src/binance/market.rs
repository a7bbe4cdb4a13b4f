use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::connector::{CoinListing, PairListing};
use crate::decode::{parse_entries, parse_json, NumericString, RawBook, WireError};
use crate::request::Request;

use super::DEFAULT_FEE;

/// Binance 코인 설정 (getall 엔드포인트)
/// 한 번의 호출로 모든 코인의 네트워크 정보까지 포함해서 반환
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceCoinInfo {
    coin: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_true")]
    trading: bool,
    #[serde(default, rename = "networkList")]
    network_list: Vec<BinanceNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceNetwork {
    network: String,
    #[serde(default)]
    is_default: bool,
    #[serde(default)]
    deposit_enable: bool,
    #[serde(default)]
    withdraw_enable: bool,
    #[serde(default)]
    withdraw_fee: NumericString,
    #[serde(default)]
    min_confirm: u32,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbol {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    filters: Vec<BinanceFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum BinanceFilter {
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize")]
        step_size: NumericString,
        #[serde(rename = "minQty")]
        min_qty: NumericString,
    },
    #[serde(rename = "PRICE_FILTER")]
    PriceFilter {
        #[serde(rename = "tickSize")]
        tick_size: NumericString,
    },
    #[serde(other)]
    Other,
}

pub fn coins_request() -> Request {
    Request::get("/sapi/v1/capital/config/getall").signed()
}

pub fn decode_coins(body: &str) -> Result<Vec<CoinListing>, WireError> {
    let coins: Vec<BinanceCoinInfo> = parse_json(body)?;

    let mut out = Vec::with_capacity(coins.len());
    for coin in coins {
        // 기본 네트워크 기준. 없으면 첫 번째 네트워크
        let network = coin
            .network_list
            .iter()
            .find(|n| n.is_default)
            .or_else(|| coin.network_list.first());

        let listing = match network {
            Some(network) => CoinListing {
                code: coin.coin.clone(),
                name: coin.name.clone().unwrap_or_default(),
                exchange_symbol: coin.coin.clone(),
                chain_type: network.network.clone(),
                tx_fee: network.withdraw_fee.value_or_zero(),
                can_withdraw: network.withdraw_enable,
                can_deposit: network.deposit_enable,
                confirmations: network.min_confirm,
                listed: coin.trading,
            },
            None => CoinListing {
                code: coin.coin.clone(),
                name: coin.name.clone().unwrap_or_default(),
                exchange_symbol: coin.coin.clone(),
                chain_type: String::new(),
                tx_fee: 0.0,
                can_withdraw: false,
                can_deposit: false,
                confirmations: 0,
                listed: coin.trading,
            },
        };
        out.push(listing);
    }
    Ok(out)
}

pub fn pairs_request() -> Request {
    Request::get("/api/v3/exchangeInfo").query("permissions", "SPOT")
}

/// 필터가 빠졌거나 읽을 수 없는 심볼은 건너뛴다.
pub fn decode_pairs(body: &str) -> Result<Vec<PairListing>, WireError> {
    let info: BinanceExchangeInfo = parse_json(body)?;

    let symbols: Vec<BinanceSymbol> = parse_entries(info.symbols, "binance symbol");
    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match pair_listing(&symbol) {
            Ok(listing) => out.push(listing),
            Err(e) => warn!(symbol = %symbol.symbol, error = %e, "skipping symbol"),
        }
    }
    Ok(out)
}

fn pair_listing(symbol: &BinanceSymbol) -> Result<PairListing, WireError> {
    let mut lot_size = None;
    let mut min_qty = 0.0;
    let mut tick_size = None;
    for filter in &symbol.filters {
        match filter {
            BinanceFilter::LotSize { step_size, min_qty: min } => {
                lot_size = Some(step_size.parse()?);
                min_qty = min.value_or_zero();
            }
            BinanceFilter::PriceFilter { tick_size: tick } => {
                tick_size = Some(tick.parse()?);
            }
            BinanceFilter::Other => {}
        }
    }

    let (Some(lot_size), Some(price_filter)) = (lot_size, tick_size) else {
        return Err(WireError::malformed("no LOT_SIZE/PRICE_FILTER"));
    };

    Ok(PairListing {
        base: symbol.quote_asset.clone(),
        target: symbol.base_asset.clone(),
        exchange_symbol: symbol.symbol.clone(),
        maker_fee: DEFAULT_FEE,
        taker_fee: DEFAULT_FEE,
        lot_size,
        price_filter,
        min_trade_quantity: min_qty,
        listed: symbol.status == "TRADING",
    })
}

pub fn order_book_request(symbol: &str) -> Request {
    Request::get("/api/v3/depth")
        .query("symbol", symbol)
        .query("limit", "100")
}

pub fn decode_order_book(body: &str) -> Result<RawBook, WireError> {
    parse_json(body)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use interface::{ExchangeId, MakerLevel};

    use super::*;
    use crate::binance::Binance;
    use crate::config::Credentials;
    use crate::connector::tests::{connector, seed_pair};
    use crate::registry::Registry;
    use crate::transport::mock::MockTransport;
    use crate::Exchange;

    const EXCHANGE_INFO: &str = r#"{
        "timezone": "UTC",
        "symbols": [
            {
                "symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000.00", "tickSize": "0.01"},
                    {"filterType": "LOT_SIZE", "minQty": "0.00001", "maxQty": "9000.0", "stepSize": "0.00001"},
                    {"filterType": "NOTIONAL", "minNotional": "5.0"}
                ]
            },
            {
                "symbol": "LUNAUSDT", "status": "BREAK", "baseAsset": "LUNA", "quoteAsset": "USDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "tickSize": "0.0001"},
                    {"filterType": "LOT_SIZE", "minQty": "0.01", "stepSize": "0.01"}
                ]
            }
        ]
    }"#;

    const COINS: &str = r#"[
        {
            "coin": "ETH", "name": "Ethereum", "trading": true,
            "networkList": [
                {"network": "BSC", "isDefault": false, "depositEnable": true, "withdrawEnable": true,
                 "withdrawFee": "0.000074", "minConfirm": 15},
                {"network": "ETH", "isDefault": true, "depositEnable": true, "withdrawEnable": false,
                 "withdrawFee": "0.0012", "minConfirm": 6}
            ]
        },
        {"coin": "NOCHAIN", "name": "Fiat-like", "networkList": []}
    ]"#;

    #[test]
    fn test_decode_pairs() {
        let pairs = decode_pairs(EXCHANGE_INFO).unwrap();
        assert_eq!(pairs.len(), 2);

        let btc = &pairs[0];
        assert_eq!(btc.exchange_symbol, "BTCUSDT");
        assert_eq!(btc.base, "USDT");
        assert_eq!(btc.target, "BTC");
        assert_eq!(btc.lot_size, 0.00001);
        assert_eq!(btc.price_filter, 0.01);
        assert_eq!(btc.min_trade_quantity, 0.00001);
        assert!(btc.listed);
        assert!(!pairs[1].listed);
    }

    #[test]
    fn test_decode_pairs_skips_unusable_symbols() {
        crate::logging::init_test_tracing();
        let body = r#"{"symbols": [
            {"symbol": "XUSDT", "status": "TRADING", "baseAsset": "X", "quoteAsset": "USDT", "filters": []},
            {"symbol": "YUSDT", "status": "TRADING", "baseAsset": "Y", "quoteAsset": "USDT",
             "filters": [{"filterType": "PRICE_FILTER", "tickSize": "abc"},
                         {"filterType": "LOT_SIZE", "minQty": "1", "stepSize": "1"}]},
            {"symbol": "ZUSDT", "status": "TRADING", "baseAsset": null, "quoteAsset": "USDT"},
            {"symbol": "ETHUSDT", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "USDT",
             "filters": [{"filterType": "PRICE_FILTER", "tickSize": "0.01"},
                         {"filterType": "LOT_SIZE", "minQty": "0.0001", "stepSize": "0.0001"}]}
        ]}"#;
        let pairs = decode_pairs(body).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].exchange_symbol, "ETHUSDT");
        assert_eq!(pairs[0].lot_size, 0.0001);

        assert!(matches!(decode_pairs("{}"), Err(WireError::Malformed(_))));
    }

    #[test]
    fn test_decode_coins_prefers_default_network() {
        let coins = decode_coins(COINS).unwrap();
        assert_eq!(coins.len(), 2);

        let eth = &coins[0];
        assert_eq!(eth.chain_type, "ETH");
        assert_eq!(eth.tx_fee, 0.0012);
        assert_eq!(eth.confirmations, 6);
        assert!(!eth.can_withdraw);
        assert!(eth.can_deposit);

        assert!(!coins[1].can_withdraw);
        assert!(coins[1].listed);
    }

    #[tokio::test]
    async fn test_get_pairs_data_populates_registry() {
        let registry = Arc::new(Registry::new());
        let transport = MockTransport::new();
        transport.respond(200, EXCHANGE_INFO);
        let client = connector(Binance::default(), &registry, Credentials::default(), &transport);

        client.get_pairs_data().await.unwrap();

        let pair = registry.pair("USDT", "BTC").unwrap();
        let constraint = registry.get_pair_constraint(ExchangeId::Binance, pair.id).unwrap();
        assert_eq!(constraint.exchange_symbol, "BTCUSDT");
        assert_eq!(constraint.lot_size, 0.00001);
        assert_eq!(registry.pair_by_symbol(ExchangeId::Binance, "BTCUSDT"), Some(pair));

        let requests = transport.requests();
        assert_eq!(requests[0].url, "http://mock/api/v3/exchangeInfo?permissions=SPOT");
    }

    #[tokio::test]
    async fn test_order_book_is_sorted_best_first() {
        let registry = Arc::new(Registry::new());
        let pair = seed_pair(&registry, ExchangeId::Binance, "BTCUSDT", 0.00001, 0.01);
        let transport = MockTransport::new();
        transport.respond(
            200,
            r#"{"lastUpdateId": 1027024,
                "bids": [["4.00000000", "431.00000000"], ["4.10000000", "1.00000000"]],
                "asks": [["4.00000200", "12.00000000"], ["4.00000100", "3.00000000"]]}"#,
        );
        let client = connector(Binance::default(), &registry, Credentials::default(), &transport);

        let maker = client.order_book(&pair).await.unwrap();
        assert_eq!(
            maker.best_bid(),
            Some(MakerLevel {
                rate: 4.1,
                quantity: 1.0
            })
        );
        assert_eq!(maker.best_ask().map(|l| l.rate), Some(4.000001));
        assert!(maker.before_request <= maker.after_request);
        assert_eq!(
            transport.requests()[0].url,
            "http://mock/api/v3/depth?symbol=BTCUSDT&limit=100"
        );
    }

    #[tokio::test]
    async fn test_bad_level_fails_order_book() {
        let registry = Arc::new(Registry::new());
        let pair = seed_pair(&registry, ExchangeId::Binance, "BTCUSDT", 0.00001, 0.01);
        let transport = MockTransport::new();
        transport.respond(200, r#"{"bids": [["4.0", "1"], ["", "2"]], "asks": []}"#);
        let client = connector(Binance::default(), &registry, Credentials::default(), &transport);

        let err = client.order_book(&pair).await.unwrap_err();
        assert_eq!(err.kind(), interface::ErrorKind::Decode);
    }
}
