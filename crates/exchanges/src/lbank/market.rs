use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use interface::filter_from_decimals;

use crate::connector::{CoinListing, PairListing};
use crate::decode::{parse_entries, parse_json, NumericString, RawBook, WireError};
use crate::request::Request;

use super::{LbankResponse, DEFAULT_FEE};

/// 코인-체인별 출금 설정
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LbankWithdrawConfig {
    asset_code: String,
    #[serde(default)]
    chain: Option<String>,
    #[serde(default)]
    can_with_draw: bool,
    #[serde(default)]
    fee: NumericString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LbankAccuracy {
    symbol: String,
    quantity_accuracy: NumericString,
    price_accuracy: NumericString,
    #[serde(default)]
    min_tran_qua: NumericString,
}

fn digits(value: &NumericString) -> Result<u32, WireError> {
    let digits = value.parse()?;
    if digits < 0.0 || digits.fract() != 0.0 {
        return Err(WireError::malformed(format!("invalid accuracy {}", digits)));
    }
    Ok(digits as u32)
}

pub fn coins_request() -> Request {
    Request::get("/v2/withdrawConfigs.do")
}

/// 같은 코인이 체인 수만큼 나오면 첫 체인을 쓴다.
pub fn decode_coins(body: &str) -> Result<Vec<CoinListing>, WireError> {
    let response: LbankResponse<Vec<LbankWithdrawConfig>> = parse_json(body)?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for config in response.data {
        if !seen.insert(config.asset_code.clone()) {
            continue;
        }
        out.push(CoinListing {
            code: config.asset_code.to_uppercase(),
            name: String::new(),
            exchange_symbol: config.asset_code,
            chain_type: config.chain.unwrap_or_default(),
            tx_fee: config.fee.value_or_zero(),
            can_withdraw: config.can_with_draw,
            // 입금 가능 여부는 이 API 에 없다
            can_deposit: true,
            confirmations: 0,
            listed: true,
        });
    }
    Ok(out)
}

pub fn pairs_request() -> Request {
    Request::get("/v2/accuracy.do")
}

/// 심볼 "btc_usdt" 는 거래 대상이 앞, 결제 통화가 뒤.
pub fn decode_pairs(body: &str) -> Result<Vec<PairListing>, WireError> {
    let response: LbankResponse<Vec<Value>> = parse_json(body)?;
    let accuracies: Vec<LbankAccuracy> = parse_entries(response.data, "lbank accuracy");

    let mut out = Vec::with_capacity(accuracies.len());
    for accuracy in accuracies {
        match pair_listing(&accuracy) {
            Ok(listing) => out.push(listing),
            Err(e) => warn!(symbol = %accuracy.symbol, error = %e, "skipping symbol"),
        }
    }
    Ok(out)
}

fn pair_listing(accuracy: &LbankAccuracy) -> Result<PairListing, WireError> {
    let (target, base) = accuracy
        .symbol
        .split_once('_')
        .ok_or_else(|| WireError::malformed("symbol has no '_' separator"))?;
    Ok(PairListing {
        base: base.to_uppercase(),
        target: target.to_uppercase(),
        exchange_symbol: accuracy.symbol.clone(),
        maker_fee: DEFAULT_FEE,
        taker_fee: DEFAULT_FEE,
        lot_size: filter_from_decimals(digits(&accuracy.quantity_accuracy)?),
        price_filter: filter_from_decimals(digits(&accuracy.price_accuracy)?),
        min_trade_quantity: accuracy.min_tran_qua.value_or_zero(),
        listed: true,
    })
}

pub fn order_book_request(symbol: &str) -> Request {
    Request::get("/v2/depth.do")
        .query("symbol", symbol)
        .query("size", "100")
}

pub fn decode_order_book(body: &str) -> Result<RawBook, WireError> {
    let response: LbankResponse<RawBook> = parse_json(body)?;
    Ok(response.data)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use interface::ExchangeId;

    use super::*;
    use crate::config::Credentials;
    use crate::connector::tests::connector;
    use crate::lbank::Lbank;
    use crate::registry::Registry;
    use crate::transport::mock::MockTransport;
    use crate::Exchange;

    #[test]
    fn test_decode_coins_keeps_first_chain() {
        let body = r#"{"result": "true", "error_code": 0, "ts": 1700000000000, "data": [
            {"amountScale": "4", "chain": "erc20", "assetCode": "usdt", "min": "10",
             "transferAmtScale": "4", "canWithDraw": true, "fee": "5.0000", "minTransfer": "0.0001", "type": "1"},
            {"amountScale": "4", "chain": "trc20", "assetCode": "usdt", "min": "10",
             "canWithDraw": true, "fee": "1.0000"},
            {"assetCode": "btc", "canWithDraw": false, "fee": "0.0005"}
        ]}"#;
        let coins = decode_coins(body).unwrap();
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].code, "USDT");
        assert_eq!(coins[0].exchange_symbol, "usdt");
        assert_eq!(coins[0].chain_type, "erc20");
        assert_eq!(coins[0].tx_fee, 5.0);
        assert!(!coins[1].can_withdraw);
        assert_eq!(coins[1].chain_type, "");
    }

    #[test]
    fn test_decode_pairs_skips_bad_symbols() {
        crate::logging::init_test_tracing();
        let body = r#"{"result": "true", "error_code": 0, "data": [
            {"symbol": "btcusdt", "quantityAccuracy": "4", "priceAccuracy": "2"},
            {"symbol": "eos_usdt", "quantityAccuracy": "-1", "priceAccuracy": "2"},
            {"symbol": "xrp_usdt", "quantityAccuracy": "1.5", "priceAccuracy": "4"},
            {"symbol": "doge_usdt", "priceAccuracy": "6"},
            {"symbol": "ltc_usdt", "quantityAccuracy": 3, "priceAccuracy": "2", "minTranQua": "0.01"}
        ]}"#;
        let pairs = decode_pairs(body).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].exchange_symbol, "ltc_usdt");
        assert_eq!(pairs[0].target, "LTC");
        assert_eq!(pairs[0].lot_size, 0.001);
    }

    #[tokio::test]
    async fn test_pairs_and_depth() {
        let registry = Arc::new(Registry::new());
        let transport = MockTransport::new();
        transport.respond(
            200,
            r#"{"result": "true", "error_code": 0, "ts": 1, "data": [
                {"symbol": "btc_usdt", "quantityAccuracy": "4", "minTranQua": "0.0001", "priceAccuracy": "2"},
                {"symbol": "eth_btc", "quantityAccuracy": "3", "minTranQua": "0.001", "priceAccuracy": "6"}
            ]}"#,
        );
        transport.respond(
            200,
            r#"{"result": "true", "error_code": 0, "ts": 1, "data": {
                "asks": [["5370.4", 0.32], ["5369.5", 0.28]],
                "bids": [["5367.24", 0.32], ["5368.6", 0.1]],
                "timestamp": 1559099981562}}"#,
        );
        let client = connector(Lbank::default(), &registry, Credentials::default(), &transport);

        client.get_pairs_data().await.unwrap();
        let pair = registry.pair("USDT", "BTC").unwrap();
        let constraint = registry.get_pair_constraint(ExchangeId::Lbank, pair.id).unwrap();
        assert_eq!(constraint.lot_size, 0.0001);
        assert_eq!(constraint.price_filter, 0.01);
        assert_eq!(constraint.exchange_symbol, "btc_usdt");
        assert!(registry.pair("BTC", "ETH").is_some());

        let maker = client.order_book(&pair).await.unwrap();
        assert_eq!(maker.best_ask().map(|l| l.rate), Some(5369.5));
        assert_eq!(maker.best_bid().map(|l| l.rate), Some(5368.6));
        assert_eq!(
            transport.requests()[1].url,
            "http://mock/v2/depth.do?symbol=btc_usdt&size=100"
        );
    }
}
