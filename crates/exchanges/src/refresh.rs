use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tracing::{info, warn};

use interface::{ErrorKind, ExchangeError, ExchangeId, Operation};

use crate::Exchange;

/// 백그라운드 호출의 실패를 받는 곳.
/// 전경 호출은 에러를 그대로 돌려주고, 주기적 갱신처럼 멈추면 안 되는 호출만 여기로 보낸다.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &ExchangeError);
}

/// 기본 정책: 경고 로그만 남기고 계속 진행
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: &ExchangeError) {
        warn!(
            exchange = %error.exchange(),
            operation = %error.operation(),
            kind = ?error.kind(),
            "{}",
            error
        );
    }
}

/// 받은 에러를 보관한다. 테스트나 상태 점검용.
#[derive(Debug, Default)]
pub struct CollectingSink {
    errors: Mutex<Vec<ExchangeError>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 보관된 에러를 꺼내고 비운다.
    pub fn take(&self) -> Vec<ExchangeError> {
        match self.errors.lock() {
            Ok(mut errors) => std::mem::take(&mut *errors),
            Err(_) => Vec::new(),
        }
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, error: &ExchangeError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error.clone());
        }
    }
}

/// 거래소 하나의 갱신 결과
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub exchange: ExchangeId,
    pub failures: Vec<(Operation, ErrorKind)>,
}

impl RefreshReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 코인 -> 거래쌍 순서로 갱신한다. 코인 갱신이 실패해도 거래쌍 갱신은 시도한다.
pub async fn refresh_one(exchange: &dyn Exchange, sink: &dyn ErrorSink) -> RefreshReport {
    let mut failures = Vec::new();

    if let Err(e) = exchange.get_coins_data().await {
        failures.push((e.operation(), e.kind()));
        sink.report(&e);
    }
    if let Err(e) = exchange.get_pairs_data().await {
        failures.push((e.operation(), e.kind()));
        sink.report(&e);
    }

    RefreshReport {
        exchange: exchange.id(),
        failures,
    }
}

/// 모든 거래소를 동시에 갱신한다. 한 거래소의 실패가 다른 거래소 갱신을 막지 않는다.
/// 주기 실행은 호출자가 타이머로 돌린다.
pub async fn refresh_all(exchanges: &[Arc<dyn Exchange>], sink: &dyn ErrorSink) -> Vec<RefreshReport> {
    let reports = join_all(
        exchanges
            .iter()
            .map(|exchange| refresh_one(exchange.as_ref(), sink)),
    )
    .await;

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    info!(
        "constraint refresh finished: {} exchanges, {} with failures",
        reports.len(),
        failed
    );
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::tests::connector;
    use crate::config::Credentials;
    use crate::gate::Gate;
    use crate::logging::init_test_tracing;
    use crate::okx::Okx;
    use crate::registry::Registry;
    use crate::transport::mock::MockTransport;

    const GATE_CURRENCIES: &str = r#"[
        {"currency": "BTC", "name": "Bitcoin", "delisted": false, "withdraw_disabled": false,
         "withdraw_delayed": false, "deposit_disabled": false, "trade_disabled": false, "chain": "BTC"}
    ]"#;

    const GATE_PAIRS: &str = r#"[
        {"id": "BTC_USDT", "base": "BTC", "quote": "USDT", "fee": "0.2", "min_base_amount": "0.0001",
         "amount_precision": 4, "precision": 2, "trade_status": "tradable"}
    ]"#;

    #[tokio::test]
    async fn test_one_exchange_failure_does_not_abort_others() {
        init_test_tracing();
        let registry = Arc::new(Registry::new());

        let gate_transport = MockTransport::new();
        gate_transport.respond(200, GATE_CURRENCIES);
        gate_transport.respond(200, GATE_PAIRS);
        let gate = connector(Gate::default(), &registry, Credentials::default(), &gate_transport);

        // OKX 는 코인 목록에 인증이 필요하고, 거래쌍 호출은 연결 실패
        let okx_transport = MockTransport::new();
        okx_transport.fail("connection reset");
        let okx = connector(Okx::default(), &registry, Credentials::default(), &okx_transport);

        let exchanges: Vec<Arc<dyn Exchange>> = vec![Arc::new(gate), Arc::new(okx)];
        let sink = CollectingSink::new();
        let reports = refresh_all(&exchanges, &sink).await;

        assert_eq!(reports.len(), 2);
        assert!(reports[0].is_ok());
        assert_eq!(reports[0].exchange, ExchangeId::Gate);
        assert_eq!(
            reports[1].failures,
            vec![
                (Operation::CoinsData, ErrorKind::Configuration),
                (Operation::PairsData, ErrorKind::Transport),
            ]
        );
        assert_eq!(sink.len(), 2);
        assert!(registry.pair("USDT", "BTC").is_some());
    }
}
