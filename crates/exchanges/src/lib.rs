use async_trait::async_trait;

use interface::{AccountBalance, Coin, ExchangeError, ExchangeId, Maker, Order, Pair};

pub mod binance;
pub mod bithumb;
pub mod config;
pub mod connector;
pub mod decode;
pub mod gate;
pub mod lbank;
pub mod logging;
pub mod okx;
pub mod refresh;
pub mod registry;
pub mod request;
pub mod signer;
pub mod transport;

/// 모든 거래소 커넥터가 제공하는 공통 기능.
/// 어떤 호출도 내부에서 재시도하지 않는다. 특히 주문은 중복 체결 위험이 있으므로
/// 재시도 여부는 호출자가 결정한다.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// 코인 목록과 입출금 제약을 갱신
    async fn get_coins_data(&self) -> Result<(), ExchangeError>;

    /// 거래쌍 목록과 주문 제약을 갱신. 코인 갱신 후에 호출하는 것이 좋다.
    async fn get_pairs_data(&self) -> Result<(), ExchangeError>;

    async fn order_book(&self, pair: &Pair) -> Result<Maker, ExchangeError>;

    async fn limit_buy(&self, pair: &Pair, quantity: f64, rate: f64) -> Result<Order, ExchangeError>;

    async fn limit_sell(&self, pair: &Pair, quantity: f64, rate: f64)
        -> Result<Order, ExchangeError>;

    /// 주문 상태를 조회해 `order` 를 갱신
    async fn order_status(&self, order: &mut Order) -> Result<(), ExchangeError>;

    async fn cancel_order(&self, order: &mut Order) -> Result<(), ExchangeError>;

    async fn cancel_all_orders(&self) -> Result<(), ExchangeError>;

    /// 잔고 갱신. 실패는 반환하지 않고 ErrorSink 로 보고한다.
    async fn update_all_balances(&self);

    /// 출금 요청. 출금이 막힌 코인이면 호출 없이 `Ok(false)`.
    async fn withdraw(
        &self,
        coin: &Coin,
        quantity: f64,
        address: &str,
        tag: Option<&str>,
    ) -> Result<bool, ExchangeError>;

    /// 마지막 잔고 갱신 결과
    fn balance(&self, coin: &Coin) -> Option<AccountBalance>;

    fn balances(&self) -> Vec<AccountBalance>;
}

// Convenience re-exports
pub use binance::BinanceClient;
pub use bithumb::BithumbClient;
pub use config::{ConfigError, ConnectorConfig, Credentials};
pub use connector::{Connector, Venue};
pub use gate::GateClient;
pub use lbank::LbankClient;
pub use okx::OkxClient;
pub use refresh::{refresh_all, CollectingSink, ErrorSink, LogSink, RefreshReport};
pub use registry::{Registry, RegistrySnapshot};
