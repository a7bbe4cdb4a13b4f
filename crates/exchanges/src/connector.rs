//! 거래소 공통 호출 흐름.
//!
//! 1) 인증 정보 확인 2) 레지스트리에서 심볼/자리수 조회 3) 서명 4) HTTP 호출
//! 5) 응답 해석 6) 공통 모델 반환. 거래소마다 다른 부분은 `Venue` 구현체가 채운다.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use interface::{
    format_to_filter, format_to_step, truncate_to_filter, truncate_to_step, AccountBalance, Coin,
    CoinConstraint, Direction, ExchangeError, ExchangeId, Maker, Operation, Order, OrderStatus,
    Pair, PairConstraint, PrecisionError,
};

use crate::config::{ConnectorConfig, Credentials};
use crate::decode::{normalize_book, RawBook, WireError};
use crate::refresh::{ErrorSink, LogSink};
use crate::registry::Registry;
use crate::request::Request;
use crate::signer::{Signer, Stamp};
use crate::transport::{HttpTransport, ReqwestTransport, TransportFailure};
use crate::Exchange;

/// 출금 수량은 소수점 8자리까지
const WITHDRAW_FILTER: f64 = 1e-8;

/// 거래소가 알려준 코인 한 건
#[derive(Debug, Clone, PartialEq)]
pub struct CoinListing {
    pub code: String,
    pub name: String,
    pub exchange_symbol: String,
    pub chain_type: String,
    pub tx_fee: f64,
    pub can_withdraw: bool,
    pub can_deposit: bool,
    pub confirmations: u32,
    pub listed: bool,
}

/// 거래소가 알려준 거래쌍 한 건. `base` 는 결제 통화, `target` 은 거래 대상.
#[derive(Debug, Clone, PartialEq)]
pub struct PairListing {
    pub base: String,
    pub target: String,
    pub exchange_symbol: String,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub lot_size: f64,
    pub price_filter: f64,
    pub min_trade_quantity: f64,
    pub listed: bool,
}

/// 자리수 처리가 끝난 주문 요청
#[derive(Debug, Clone)]
pub struct OrderTicket<'a> {
    pub symbol: &'a str,
    pub direction: Direction,
    pub quantity: String,
    pub rate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub status: OrderStatus,
    pub deal_quantity: Option<f64>,
    pub deal_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEntry {
    pub symbol: String,
    pub available: f64,
    pub frozen: f64,
}

#[derive(Debug, Clone)]
pub struct WithdrawTicket<'a> {
    pub symbol: &'a str,
    pub chain_type: &'a str,
    pub quantity: String,
    pub fee: f64,
    pub address: &'a str,
    pub tag: Option<&'a str>,
}

/// 거래소별 요청 생성과 응답 해석
pub trait Venue: Send + Sync + 'static {
    fn id(&self) -> ExchangeId;

    fn base_url(&self) -> &'static str;

    fn signer(&self) -> &dyn Signer;

    /// 모든 응답에 공통으로 적용하는 에러 봉투 검사
    fn check(&self, status: u16, body: &str) -> Result<(), WireError>;

    fn coins_request(&self) -> Request;
    fn decode_coins(&self, body: &str) -> Result<Vec<CoinListing>, WireError>;

    fn pairs_request(&self) -> Request;
    fn decode_pairs(&self, body: &str) -> Result<Vec<PairListing>, WireError>;

    fn order_book_request(&self, symbol: &str) -> Request;
    fn decode_order_book(&self, body: &str) -> Result<RawBook, WireError>;

    /// 가격대별 호가 단위가 따로 있으면 해당 가격의 단위. 없으면 `price_filter` 를 쓴다.
    fn price_tick(&self, _symbol: &str, _rate: f64) -> Option<f64> {
        None
    }

    fn place_order_request(&self, ticket: &OrderTicket<'_>) -> Request;
    fn decode_placed_order(&self, body: &str) -> Result<PlacedOrder, WireError>;

    fn order_status_request(&self, symbol: &str, order_id: &str) -> Request;
    fn decode_order_status(&self, body: &str) -> Result<OrderUpdate, WireError>;

    fn cancel_order_request(&self, symbol: &str, order_id: &str) -> Request;

    /// 전체 미체결 주문 취소. 엔드포인트가 없으면 `None`.
    fn cancel_all_request(&self) -> Option<Request> {
        None
    }

    /// 특정 거래쌍의 미체결 주문 취소
    fn cancel_pair_orders_request(&self, _symbol: &str) -> Option<Request> {
        None
    }

    fn balances_request(&self) -> Request;
    fn decode_balances(&self, body: &str) -> Result<Vec<BalanceEntry>, WireError>;

    fn withdraw_request(&self, ticket: &WithdrawTicket<'_>) -> Option<Request>;
}

/// `Venue` 하나를 감싸 `Exchange` 를 구현하는 범용 커넥터
pub struct Connector<V: Venue> {
    venue: V,
    registry: Arc<Registry>,
    credentials: Credentials,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    sink: Arc<dyn ErrorSink>,
    balances: DashMap<u64, AccountBalance>,
}

impl<V: Venue> Connector<V> {
    pub fn build(venue: V, registry: Arc<Registry>, config: ConnectorConfig) -> Result<Self, TransportFailure> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
        Ok(Self::with_transport(venue, registry, config, transport))
    }

    pub fn with_transport(
        venue: V,
        registry: Arc<Registry>,
        config: ConnectorConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let base_url = config
            .base_url
            .unwrap_or_else(|| venue.base_url().to_string());
        Self {
            venue,
            registry,
            credentials: config.credentials,
            base_url,
            transport,
            sink: Arc::new(LogSink),
            balances: DashMap::new(),
        }
    }

    /// 백그라운드 실패를 받을 ErrorSink 지정
    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn sink(&self) -> &Arc<dyn ErrorSink> {
        &self.sink
    }

    fn exchange(&self) -> ExchangeId {
        self.venue.id()
    }

    fn configuration(&self, operation: Operation, message: impl Into<String>) -> ExchangeError {
        ExchangeError::Configuration {
            exchange: self.exchange(),
            operation,
            message: message.into(),
        }
    }

    fn precision(&self, operation: Operation, source: PrecisionError) -> ExchangeError {
        ExchangeError::Precision {
            exchange: self.exchange(),
            operation,
            source,
        }
    }

    fn wire(&self, operation: Operation, status: u16, body: &str, err: WireError) -> ExchangeError {
        match err {
            WireError::Rejected(message) => ExchangeError::Application {
                exchange: self.exchange(),
                operation,
                status,
                message,
                raw: body.to_string(),
            },
            WireError::Malformed(message) => ExchangeError::Decode {
                exchange: self.exchange(),
                operation,
                message,
                raw: body.to_string(),
            },
        }
    }

    /// 네트워크 호출 전에 인증 정보를 확인
    fn require_credentials(&self, operation: Operation) -> Result<(), ExchangeError> {
        if self.credentials.api_key.is_empty() {
            return Err(self.configuration(operation, "API key not set"));
        }
        if self.credentials.secret.is_empty() {
            return Err(self.configuration(operation, "API secret not set"));
        }
        Ok(())
    }

    fn pair_constraint(&self, operation: Operation, pair: &Pair) -> Result<PairConstraint, ExchangeError> {
        self.registry
            .get_pair_constraint(self.exchange(), pair.id)
            .ok_or_else(|| {
                self.configuration(
                    operation,
                    format!("pair {} is not registered; call get_pairs_data first", pair),
                )
            })
    }

    fn coin_constraint(&self, operation: Operation, coin: &Coin) -> Result<CoinConstraint, ExchangeError> {
        self.registry
            .get_coin_constraint(self.exchange(), coin.id)
            .ok_or_else(|| {
                self.configuration(
                    operation,
                    format!("coin {} is not registered; call get_coins_data first", coin.code),
                )
            })
    }

    /// 서명, 호출, 에러 봉투 검사까지 수행하고 응답 본문을 돌려준다.
    async fn execute(&self, operation: Operation, mut request: Request) -> Result<String, ExchangeError> {
        if request.private {
            self.require_credentials(operation)?;
            self.venue
                .signer()
                .sign(&mut request, &self.credentials, &Stamp::now())
                .map_err(|e| self.configuration(operation, e.to_string()))?;
        }

        let http = request.into_http(&self.base_url);
        debug!(
            exchange = %self.exchange(),
            operation = %operation,
            method = %http.method,
            url = %http.url,
            "sending request"
        );

        let response = self
            .transport
            .execute(http)
            .await
            .map_err(|e| ExchangeError::Transport {
                exchange: self.exchange(),
                operation,
                message: e.to_string(),
            })?;

        let status = response.status;
        let body = response.body;

        if status >= 500 {
            return Err(ExchangeError::Transport {
                exchange: self.exchange(),
                operation,
                message: format!(
                    "HTTP error: status {}, response: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            });
        }

        self.venue
            .check(status, &body)
            .map_err(|e| self.wire(operation, status, &body, e))?;

        if !(200..300).contains(&status) {
            return Err(ExchangeError::Application {
                exchange: self.exchange(),
                operation,
                status,
                message: format!("HTTP error: status {}", status),
                raw: body,
            });
        }

        Ok(body)
    }

    fn decode<T>(
        &self,
        operation: Operation,
        body: &str,
        decode: impl FnOnce(&V, &str) -> Result<T, WireError>,
    ) -> Result<T, ExchangeError> {
        decode(&self.venue, body).map_err(|e| self.wire(operation, 200, body, e))
    }

    async fn place_order(
        &self,
        operation: Operation,
        direction: Direction,
        pair: &Pair,
        quantity: f64,
        rate: f64,
    ) -> Result<Order, ExchangeError> {
        self.require_credentials(operation)?;
        let constraint = self.pair_constraint(operation, pair)?;

        let quantity_text = format_to_filter(quantity, constraint.lot_size)
            .map_err(|e| self.precision(operation, e))?;
        let rounded_quantity = truncate_to_filter(quantity, constraint.lot_size)
            .map_err(|e| self.precision(operation, e))?;
        if rounded_quantity <= 0.0 {
            return Err(self.precision(
                operation,
                PrecisionError::RoundsToZero {
                    value: quantity,
                    filter: constraint.lot_size,
                },
            ));
        }
        if rounded_quantity < constraint.min_trade_quantity {
            return Err(self.precision(
                operation,
                PrecisionError::BelowMinimum {
                    quantity: rounded_quantity,
                    minimum: constraint.min_trade_quantity,
                },
            ));
        }

        let (rate_text, rounded_rate, tick) =
            match self.venue.price_tick(&constraint.exchange_symbol, rate) {
                Some(tick) => (
                    format_to_step(rate, tick),
                    truncate_to_step(rate, tick),
                    tick,
                ),
                None => (
                    format_to_filter(rate, constraint.price_filter),
                    truncate_to_filter(rate, constraint.price_filter),
                    constraint.price_filter,
                ),
            };
        let rate_text = rate_text.map_err(|e| self.precision(operation, e))?;
        let rounded_rate = rounded_rate.map_err(|e| self.precision(operation, e))?;
        if rounded_rate <= 0.0 {
            return Err(self.precision(
                operation,
                PrecisionError::RoundsToZero {
                    value: rate,
                    filter: tick,
                },
            ));
        }

        let ticket = OrderTicket {
            symbol: &constraint.exchange_symbol,
            direction,
            quantity: quantity_text,
            rate: rate_text,
        };
        let request = self.venue.place_order_request(&ticket);
        let body = self.execute(operation, request).await?;
        let placed = self.decode(operation, &body, |v, b| v.decode_placed_order(b))?;

        info!(
            exchange = %self.exchange(),
            pair = %pair,
            order_id = %placed.order_id,
            quantity = %ticket.quantity,
            rate = %ticket.rate,
            "{:?} order placed",
            direction
        );

        Ok(Order {
            exchange: self.exchange(),
            pair: pair.clone(),
            order_id: placed.order_id,
            rate: rounded_rate,
            quantity: rounded_quantity,
            deal_rate: 0.0,
            deal_quantity: 0.0,
            direction,
            status: placed.status,
            raw: body,
            created_at: Utc::now(),
        })
    }

    /// 전경 호출용 잔고 조회. 실패를 그대로 돌려준다.
    pub async fn fetch_balances(&self) -> Result<Vec<AccountBalance>, ExchangeError> {
        let operation = Operation::Balances;
        self.require_credentials(operation)?;

        let body = self.execute(operation, self.venue.balances_request()).await?;
        let entries = self.decode(operation, &body, |v, b| v.decode_balances(b))?;

        let now = Utc::now();
        let mut balances = Vec::with_capacity(entries.len());
        for entry in entries {
            let coin = match self.registry.coin_by_symbol(self.exchange(), &entry.symbol) {
                Some(coin) => coin,
                None => self.registry.ensure_coin(&entry.symbol, ""),
            };
            balances.push(AccountBalance {
                coin,
                available: entry.available,
                frozen: entry.frozen,
                updated_at: now,
            });
        }

        self.balances.clear();
        for balance in &balances {
            self.balances.insert(balance.coin.id, balance.clone());
        }
        debug!(exchange = %self.exchange(), count = balances.len(), "balances updated");

        Ok(balances)
    }

    /// 한 거래쌍의 미체결 주문을 모두 취소
    pub async fn cancel_orders_for(&self, pair: &Pair) -> Result<(), ExchangeError> {
        let operation = Operation::CancelAllOrders;
        self.require_credentials(operation)?;
        let constraint = self.pair_constraint(operation, pair)?;
        let request = self
            .venue
            .cancel_pair_orders_request(&constraint.exchange_symbol)
            .ok_or(ExchangeError::Unsupported {
                exchange: self.exchange(),
                operation,
            })?;
        self.execute(operation, request).await?;
        info!(exchange = %self.exchange(), pair = %pair, "cancelled open orders");
        Ok(())
    }
}

#[async_trait]
impl<V: Venue> Exchange for Connector<V> {
    fn id(&self) -> ExchangeId {
        self.exchange()
    }

    async fn get_coins_data(&self) -> Result<(), ExchangeError> {
        let operation = Operation::CoinsData;
        let body = self.execute(operation, self.venue.coins_request()).await?;
        let listings = self.decode(operation, &body, |v, b| v.decode_coins(b))?;

        let mut seen = HashSet::new();
        for listing in listings {
            if listing.code.is_empty() {
                continue;
            }
            let coin = self.registry.ensure_coin(&listing.code, &listing.name);
            seen.insert(coin.id);
            self.registry.set_coin_constraint(
                self.exchange(),
                CoinConstraint {
                    coin_id: coin.id,
                    exchange_symbol: listing.exchange_symbol,
                    chain_type: listing.chain_type,
                    tx_fee: listing.tx_fee,
                    can_withdraw: listing.can_withdraw,
                    can_deposit: listing.can_deposit,
                    confirmations: listing.confirmations,
                    listed: listing.listed,
                },
            );
        }

        let delisted = self.registry.mark_unlisted_coins(self.exchange(), &seen);
        info!(
            exchange = %self.exchange(),
            coins = seen.len(),
            delisted,
            "coin constraints refreshed"
        );
        Ok(())
    }

    async fn get_pairs_data(&self) -> Result<(), ExchangeError> {
        let operation = Operation::PairsData;
        let body = self.execute(operation, self.venue.pairs_request()).await?;
        let listings = self.decode(operation, &body, |v, b| v.decode_pairs(b))?;

        let mut seen = HashSet::new();
        for listing in listings {
            if listing.lot_size <= 0.0 || listing.price_filter <= 0.0 {
                warn!(
                    exchange = %self.exchange(),
                    symbol = %listing.exchange_symbol,
                    lot_size = listing.lot_size,
                    price_filter = listing.price_filter,
                    "skipping pair with invalid filters"
                );
                continue;
            }
            let base = self.registry.ensure_coin(&listing.base, "");
            let target = self.registry.ensure_coin(&listing.target, "");
            let pair = self.registry.ensure_pair(&base, &target);
            seen.insert(pair.id);
            self.registry.set_pair_constraint(
                self.exchange(),
                PairConstraint {
                    pair_id: pair.id,
                    exchange_symbol: listing.exchange_symbol,
                    maker_fee: listing.maker_fee,
                    taker_fee: listing.taker_fee,
                    lot_size: listing.lot_size,
                    price_filter: listing.price_filter,
                    min_trade_quantity: listing.min_trade_quantity,
                    listed: listing.listed,
                },
            );
        }

        let delisted = self.registry.mark_unlisted_pairs(self.exchange(), &seen);
        info!(
            exchange = %self.exchange(),
            pairs = seen.len(),
            delisted,
            "pair constraints refreshed"
        );
        Ok(())
    }

    async fn order_book(&self, pair: &Pair) -> Result<Maker, ExchangeError> {
        let operation = Operation::OrderBook;
        let constraint = self.pair_constraint(operation, pair)?;

        let before_request = Utc::now();
        let body = self
            .execute(operation, self.venue.order_book_request(&constraint.exchange_symbol))
            .await?;
        let after_request = Utc::now();

        let raw = self.decode(operation, &body, |v, b| v.decode_order_book(b))?;
        let (bids, asks) = normalize_book(&raw).map_err(|e| self.wire(operation, 200, &body, e))?;

        Ok(Maker {
            bids,
            asks,
            before_request,
            after_request,
        })
    }

    async fn limit_buy(&self, pair: &Pair, quantity: f64, rate: f64) -> Result<Order, ExchangeError> {
        self.place_order(Operation::LimitBuy, Direction::Buy, pair, quantity, rate)
            .await
    }

    async fn limit_sell(&self, pair: &Pair, quantity: f64, rate: f64) -> Result<Order, ExchangeError> {
        self.place_order(Operation::LimitSell, Direction::Sell, pair, quantity, rate)
            .await
    }

    async fn order_status(&self, order: &mut Order) -> Result<(), ExchangeError> {
        let operation = Operation::OrderStatus;
        self.require_credentials(operation)?;
        let constraint = self.pair_constraint(operation, &order.pair)?;

        let request = self
            .venue
            .order_status_request(&constraint.exchange_symbol, &order.order_id);
        let body = self.execute(operation, request).await?;
        let update = self.decode(operation, &body, |v, b| v.decode_order_status(b))?;

        if update.status != order.status {
            debug!(
                exchange = %self.exchange(),
                order_id = %order.order_id,
                from = ?order.status,
                to = ?update.status,
                "order status changed"
            );
        }
        order.status = update.status;
        if let Some(deal_quantity) = update.deal_quantity {
            order.deal_quantity = deal_quantity;
        }
        if let Some(deal_rate) = update.deal_rate {
            order.deal_rate = deal_rate;
        }
        order.raw = body;
        Ok(())
    }

    async fn cancel_order(&self, order: &mut Order) -> Result<(), ExchangeError> {
        let operation = Operation::CancelOrder;
        self.require_credentials(operation)?;
        let constraint = self.pair_constraint(operation, &order.pair)?;

        let request = self
            .venue
            .cancel_order_request(&constraint.exchange_symbol, &order.order_id);
        let body = self.execute(operation, request).await?;

        info!(exchange = %self.exchange(), order_id = %order.order_id, "cancel requested");
        order.status = OrderStatus::Cancelling;
        order.raw = body;
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<(), ExchangeError> {
        let operation = Operation::CancelAllOrders;
        self.require_credentials(operation)?;
        let request = self
            .venue
            .cancel_all_request()
            .ok_or(ExchangeError::Unsupported {
                exchange: self.exchange(),
                operation,
            })?;
        self.execute(operation, request).await?;
        info!(exchange = %self.exchange(), "cancelled all open orders");
        Ok(())
    }

    async fn update_all_balances(&self) {
        if let Err(e) = self.fetch_balances().await {
            self.sink.report(&e);
        }
    }

    async fn withdraw(
        &self,
        coin: &Coin,
        quantity: f64,
        address: &str,
        tag: Option<&str>,
    ) -> Result<bool, ExchangeError> {
        let operation = Operation::Withdraw;
        self.require_credentials(operation)?;
        let constraint = self.coin_constraint(operation, coin)?;

        if !constraint.can_withdraw || !constraint.listed {
            info!(
                exchange = %self.exchange(),
                coin = %coin.code,
                "withdrawal disabled, request skipped"
            );
            return Ok(false);
        }

        let quantity_text =
            format_to_filter(quantity, WITHDRAW_FILTER).map_err(|e| self.precision(operation, e))?;
        let rounded_quantity = truncate_to_filter(quantity, WITHDRAW_FILTER)
            .map_err(|e| self.precision(operation, e))?;
        if rounded_quantity <= 0.0 {
            return Err(self.precision(
                operation,
                PrecisionError::RoundsToZero {
                    value: quantity,
                    filter: WITHDRAW_FILTER,
                },
            ));
        }
        let ticket = WithdrawTicket {
            symbol: &constraint.exchange_symbol,
            chain_type: &constraint.chain_type,
            quantity: quantity_text,
            fee: constraint.tx_fee,
            address,
            tag: tag.filter(|t| !t.is_empty()),
        };
        let request = self
            .venue
            .withdraw_request(&ticket)
            .ok_or(ExchangeError::Unsupported {
                exchange: self.exchange(),
                operation,
            })?;
        self.execute(operation, request).await?;

        info!(
            exchange = %self.exchange(),
            coin = %coin.code,
            quantity = %ticket.quantity,
            "withdrawal requested"
        );
        Ok(true)
    }

    fn balance(&self, coin: &Coin) -> Option<AccountBalance> {
        self.balances.get(&coin.id).map(|entry| entry.value().clone())
    }

    fn balances(&self) -> Vec<AccountBalance> {
        let mut out: Vec<AccountBalance> = self
            .balances
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(|b| b.coin.id);
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use interface::ErrorKind;

    use super::*;
    use crate::binance::Binance;
    use crate::logging::init_test_tracing;
    use crate::refresh::CollectingSink;
    use crate::transport::mock::MockTransport;

    /// 레지스트리에 BTC/USDT 를 등록하고 거래소 제약을 넣는다.
    pub(crate) fn seed_pair(
        registry: &Registry,
        exchange: ExchangeId,
        symbol: &str,
        lot_size: f64,
        price_filter: f64,
    ) -> Pair {
        let usdt = registry.ensure_coin("USDT", "Tether");
        let btc = registry.ensure_coin("BTC", "Bitcoin");
        let pair = registry.ensure_pair(&usdt, &btc);
        registry.set_pair_constraint(
            exchange,
            PairConstraint {
                pair_id: pair.id,
                exchange_symbol: symbol.to_string(),
                maker_fee: 0.001,
                taker_fee: 0.001,
                lot_size,
                price_filter,
                min_trade_quantity: 0.0,
                listed: true,
            },
        );
        pair
    }

    pub(crate) fn seed_coin(
        registry: &Registry,
        exchange: ExchangeId,
        code: &str,
        symbol: &str,
        can_withdraw: bool,
    ) -> Coin {
        let coin = registry.ensure_coin(code, "");
        registry.set_coin_constraint(
            exchange,
            CoinConstraint {
                coin_id: coin.id,
                exchange_symbol: symbol.to_string(),
                chain_type: "ERC20".to_string(),
                tx_fee: 0.5,
                can_withdraw,
                can_deposit: true,
                confirmations: 12,
                listed: true,
            },
        );
        coin
    }

    pub(crate) fn connector<V: Venue>(
        venue: V,
        registry: &Arc<Registry>,
        credentials: Credentials,
        transport: &Arc<MockTransport>,
    ) -> Connector<V> {
        Connector::with_transport(
            venue,
            registry.clone(),
            ConnectorConfig::with_credentials(credentials).base_url("http://mock"),
            transport.clone(),
        )
    }

    fn binance(registry: &Arc<Registry>, transport: &Arc<MockTransport>) -> Connector<Binance> {
        connector(
            Binance::default(),
            registry,
            Credentials::new("key", "secret"),
            transport,
        )
    }

    #[tokio::test]
    async fn test_private_calls_without_key_never_reach_transport() {
        let registry = Arc::new(Registry::new());
        let pair = seed_pair(&registry, ExchangeId::Binance, "BTCUSDT", 0.001, 0.01);
        let coin = seed_coin(&registry, ExchangeId::Binance, "USDT", "USDT", true);
        let transport = MockTransport::new();
        let client = connector(Binance::default(), &registry, Credentials::default(), &transport);

        let err = client.limit_buy(&pair, 1.0, 100.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.is_auth_failure());

        let err = client.limit_sell(&pair, 1.0, 100.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(client.cancel_all_orders().await.is_err());
        assert!(client.fetch_balances().await.is_err());
        let err = client.withdraw(&coin, 1.0, "0xabc", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let mut order = Order {
            exchange: ExchangeId::Binance,
            pair: pair.clone(),
            order_id: "1".to_string(),
            rate: 100.0,
            quantity: 1.0,
            deal_rate: 0.0,
            deal_quantity: 0.0,
            direction: Direction::Buy,
            status: OrderStatus::New,
            raw: String::new(),
            created_at: Utc::now(),
        };
        assert!(client.order_status(&mut order).await.is_err());
        assert!(client.cancel_order(&mut order).await.is_err());
        assert_eq!(order.status, OrderStatus::New);

        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_secret_missing_is_configuration_error() {
        let registry = Arc::new(Registry::new());
        let pair = seed_pair(&registry, ExchangeId::Binance, "BTCUSDT", 0.001, 0.01);
        let transport = MockTransport::new();
        let client = connector(Binance::default(), &registry, Credentials::new("key", ""), &transport);

        let err = client.limit_buy(&pair, 1.0, 100.0).await.unwrap_err();
        assert!(err.to_string().contains("API secret not set"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_pair_is_rejected_before_network() {
        let registry = Arc::new(Registry::new());
        let usdt = registry.ensure_coin("USDT", "");
        let eth = registry.ensure_coin("ETH", "");
        let pair = registry.ensure_pair(&usdt, &eth);
        let transport = MockTransport::new();
        let client = binance(&registry, &transport);

        let err = client.order_book(&pair).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("ETH/USDT"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_quantity_rounding_to_zero_fails_before_network() {
        let registry = Arc::new(Registry::new());
        let pair = seed_pair(&registry, ExchangeId::Binance, "BTCUSDT", 0.001, 0.01);
        let transport = MockTransport::new();
        let client = binance(&registry, &transport);

        let err = client.limit_buy(&pair, 0.0004, 100.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precision);

        let err = client.limit_sell(&pair, 1.0, f64::NAN).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precision);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_below_minimum_quantity() {
        let registry = Arc::new(Registry::new());
        let pair = seed_pair(&registry, ExchangeId::Binance, "BTCUSDT", 0.001, 0.01);
        let mut constraint = registry.get_pair_constraint(ExchangeId::Binance, pair.id).unwrap();
        constraint.min_trade_quantity = 0.01;
        registry.set_pair_constraint(ExchangeId::Binance, constraint);

        let transport = MockTransport::new();
        let client = binance(&registry, &transport);
        let err = client.limit_buy(&pair, 0.005, 100.0).await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Precision {
                source: PrecisionError::BelowMinimum { .. },
                ..
            }
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_error_kinds_distinguish_down_credentials_and_format() {
        init_test_tracing();
        let registry = Arc::new(Registry::new());
        let pair = seed_pair(&registry, ExchangeId::Binance, "BTCUSDT", 0.001, 0.01);
        let transport = MockTransport::new();
        let client = binance(&registry, &transport);

        transport.fail("connection refused");
        let err = client.order_book(&pair).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("connection refused"));

        transport.respond(503, "Service Unavailable");
        let err = client.order_book(&pair).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        transport.respond(401, r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#);
        let err = client.fetch_balances().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Application);
        assert!(err.is_auth_failure());

        transport.respond(200, r#"{"unexpected":true}"#);
        let err = client.order_book(&pair).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.raw(), Some(r#"{"unexpected":true}"#));
    }

    #[tokio::test]
    async fn test_withdraw_disabled_returns_false_without_network() {
        let registry = Arc::new(Registry::new());
        let coin = seed_coin(&registry, ExchangeId::Binance, "XRP", "XRP", false);
        let transport = MockTransport::new();
        let client = binance(&registry, &transport);

        let accepted = client.withdraw(&coin, 10.0, "rAddress", Some("123")).await.unwrap();
        assert!(!accepted);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_withdraw_rejects_non_positive_quantity_before_network() {
        let registry = Arc::new(Registry::new());
        let coin = seed_coin(&registry, ExchangeId::Binance, "USDT", "USDT", true);
        let transport = MockTransport::new();
        let client = binance(&registry, &transport);

        for quantity in [0.0, -1.0, 1e-9] {
            let err = client.withdraw(&coin, quantity, "0xabc", None).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Precision, "{}", quantity);
        }
        let err = client.withdraw(&coin, f64::NAN, "0xabc", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precision);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_all_balances_reports_to_sink() {
        let registry = Arc::new(Registry::new());
        let transport = MockTransport::new();
        let sink = Arc::new(CollectingSink::default());
        let client = binance(&registry, &transport).with_sink(sink.clone());

        transport.fail("timeout");
        client.update_all_balances().await;

        let errors = sink.take();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].operation(), Operation::Balances);
        assert_eq!(errors[0].kind(), ErrorKind::Transport);
        assert!(client.balances().is_empty());
    }
}
