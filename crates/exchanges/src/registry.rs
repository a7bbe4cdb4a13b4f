//! 거래소별 코인/거래쌍 제약 정보 저장소.
//!
//! 갱신 작업과 주문 호출이 동시에 읽고 쓰므로 `DashMap` 으로 샤딩한다.
//! 항목은 통째로 교체될 뿐 부분 수정되지 않고, 상장 폐지는 `listed = false` 로 표시만 한다.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use interface::{Coin, CoinConstraint, ExchangeId, Pair, PairConstraint};

/// 직렬화 가능한 저장소 스냅샷. 파일 저장은 호출자 몫이다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub coins: Vec<Coin>,
    pub pairs: Vec<Pair>,
    pub coin_constraints: Vec<(ExchangeId, CoinConstraint)>,
    pub pair_constraints: Vec<(ExchangeId, PairConstraint)>,
}

#[derive(Debug, Default)]
pub struct Registry {
    next_id: AtomicU64,
    /// code -> Coin
    coins: DashMap<String, Coin>,
    /// (base id, target id) -> Pair
    pairs: DashMap<(u64, u64), Pair>,
    coin_constraints: DashMap<(ExchangeId, u64), CoinConstraint>,
    pair_constraints: DashMap<(ExchangeId, u64), PairConstraint>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ----- coin / pair identity -----

    /// 처음 보는 코드면 새 Coin 을 만든다. 코드는 대문자로 저장된다.
    pub fn ensure_coin(&self, code: &str, name: &str) -> Coin {
        let code = code.trim().to_uppercase();
        self.coins
            .entry(code.clone())
            .or_insert_with(|| {
                let coin = Coin {
                    id: self.allocate_id(),
                    name: if name.is_empty() { code.clone() } else { name.to_string() },
                    code,
                };
                debug!(coin = %coin.code, id = coin.id, "registered coin");
                coin
            })
            .clone()
    }

    pub fn coin(&self, code: &str) -> Option<Coin> {
        self.coins
            .get(&code.trim().to_uppercase())
            .map(|entry| entry.value().clone())
    }

    pub fn coin_by_id(&self, id: u64) -> Option<Coin> {
        self.coins
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.value().clone())
    }

    /// (base, target) 당 Pair 는 하나만 존재한다.
    pub fn ensure_pair(&self, base: &Coin, target: &Coin) -> Pair {
        self.pairs
            .entry((base.id, target.id))
            .or_insert_with(|| Pair {
                id: self.allocate_id(),
                base: base.clone(),
                target: target.clone(),
            })
            .clone()
    }

    /// 예: pair("USDT", "BTC") -> BTC/USDT
    pub fn pair(&self, base_code: &str, target_code: &str) -> Option<Pair> {
        let base = self.coin(base_code)?;
        let target = self.coin(target_code)?;
        self.pairs
            .get(&(base.id, target.id))
            .map(|entry| entry.value().clone())
    }

    pub fn pair_by_id(&self, id: u64) -> Option<Pair> {
        self.pairs
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.value().clone())
    }

    pub fn coins(&self) -> Vec<Coin> {
        let mut coins: Vec<Coin> = self.coins.iter().map(|e| e.value().clone()).collect();
        coins.sort_by_key(|c| c.id);
        coins
    }

    pub fn pairs(&self) -> Vec<Pair> {
        let mut pairs: Vec<Pair> = self.pairs.iter().map(|e| e.value().clone()).collect();
        pairs.sort_by_key(|p| p.id);
        pairs
    }

    // ----- constraints -----

    pub fn get_coin_constraint(&self, exchange: ExchangeId, coin_id: u64) -> Option<CoinConstraint> {
        self.coin_constraints
            .get(&(exchange, coin_id))
            .map(|entry| entry.value().clone())
    }

    pub fn set_coin_constraint(&self, exchange: ExchangeId, constraint: CoinConstraint) {
        self.coin_constraints
            .insert((exchange, constraint.coin_id), constraint);
    }

    pub fn get_pair_constraint(&self, exchange: ExchangeId, pair_id: u64) -> Option<PairConstraint> {
        self.pair_constraints
            .get(&(exchange, pair_id))
            .map(|entry| entry.value().clone())
    }

    pub fn set_pair_constraint(&self, exchange: ExchangeId, constraint: PairConstraint) {
        self.pair_constraints
            .insert((exchange, constraint.pair_id), constraint);
    }

    pub fn symbol_by_coin(&self, exchange: ExchangeId, coin_id: u64) -> Option<String> {
        self.coin_constraints
            .get(&(exchange, coin_id))
            .map(|entry| entry.value().exchange_symbol.clone())
    }

    pub fn symbol_by_pair(&self, exchange: ExchangeId, pair_id: u64) -> Option<String> {
        self.pair_constraints
            .get(&(exchange, pair_id))
            .map(|entry| entry.value().exchange_symbol.clone())
    }

    /// 거래소 심볼로 코인 역조회 (선형 탐색)
    pub fn coin_by_symbol(&self, exchange: ExchangeId, symbol: &str) -> Option<Coin> {
        let coin_id = self
            .coin_constraints
            .iter()
            .find(|entry| entry.key().0 == exchange && entry.value().exchange_symbol == symbol)
            .map(|entry| entry.value().coin_id)?;
        self.coin_by_id(coin_id)
    }

    /// 거래소 심볼로 거래쌍 역조회 (선형 탐색)
    pub fn pair_by_symbol(&self, exchange: ExchangeId, symbol: &str) -> Option<Pair> {
        let pair_id = self
            .pair_constraints
            .iter()
            .find(|entry| entry.key().0 == exchange && entry.value().exchange_symbol == symbol)
            .map(|entry| entry.value().pair_id)?;
        self.pair_by_id(pair_id)
    }

    pub fn coin_constraints(&self, exchange: ExchangeId) -> Vec<CoinConstraint> {
        let mut out: Vec<CoinConstraint> = self
            .coin_constraints
            .iter()
            .filter(|entry| entry.key().0 == exchange)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(|c| c.coin_id);
        out
    }

    pub fn pair_constraints(&self, exchange: ExchangeId) -> Vec<PairConstraint> {
        let mut out: Vec<PairConstraint> = self
            .pair_constraints
            .iter()
            .filter(|entry| entry.key().0 == exchange)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(|c| c.pair_id);
        out
    }

    /// 이번 목록에 없는 코인을 상장 폐지로 표시한다. 표시된 개수를 돌려준다.
    pub fn mark_unlisted_coins(&self, exchange: ExchangeId, seen: &HashSet<u64>) -> usize {
        let mut count = 0;
        for mut entry in self.coin_constraints.iter_mut() {
            let (ex, coin_id) = *entry.key();
            if ex == exchange && entry.value().listed && !seen.contains(&coin_id) {
                entry.value_mut().listed = false;
                count += 1;
            }
        }
        count
    }

    /// 이번 목록에 없는 거래쌍을 상장 폐지로 표시한다.
    pub fn mark_unlisted_pairs(&self, exchange: ExchangeId, seen: &HashSet<u64>) -> usize {
        let mut count = 0;
        for mut entry in self.pair_constraints.iter_mut() {
            let (ex, pair_id) = *entry.key();
            if ex == exchange && entry.value().listed && !seen.contains(&pair_id) {
                entry.value_mut().listed = false;
                count += 1;
            }
        }
        count
    }

    // ----- snapshot -----

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut coin_constraints: Vec<(ExchangeId, CoinConstraint)> = self
            .coin_constraints
            .iter()
            .map(|entry| (entry.key().0, entry.value().clone()))
            .collect();
        coin_constraints.sort_by_key(|(ex, c)| (*ex, c.coin_id));

        let mut pair_constraints: Vec<(ExchangeId, PairConstraint)> = self
            .pair_constraints
            .iter()
            .map(|entry| (entry.key().0, entry.value().clone()))
            .collect();
        pair_constraints.sort_by_key(|(ex, c)| (*ex, c.pair_id));

        RegistrySnapshot {
            coins: self.coins(),
            pairs: self.pairs(),
            coin_constraints,
            pair_constraints,
        }
    }

    /// 스냅샷 내용을 덮어쓴다. 이후 새로 만드는 ID 는 스냅샷의 ID 와 겹치지 않는다.
    pub fn restore(&self, snapshot: RegistrySnapshot) {
        let mut max_id = 0;
        for coin in snapshot.coins {
            max_id = max_id.max(coin.id);
            self.coins.insert(coin.code.clone(), coin);
        }
        for pair in snapshot.pairs {
            max_id = max_id.max(pair.id);
            self.pairs.insert((pair.base.id, pair.target.id), pair);
        }
        for (exchange, constraint) in snapshot.coin_constraints {
            self.set_coin_constraint(exchange, constraint);
        }
        for (exchange, constraint) in snapshot.pair_constraints {
            self.set_pair_constraint(exchange, constraint);
        }
        self.next_id.fetch_max(max_id, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn pair_constraint(pair_id: u64, symbol: &str, lot_size: f64) -> PairConstraint {
        PairConstraint {
            pair_id,
            exchange_symbol: symbol.to_string(),
            maker_fee: 0.001,
            taker_fee: 0.001,
            lot_size,
            price_filter: 0.01,
            min_trade_quantity: 0.0,
            listed: true,
        }
    }

    fn coin_constraint(coin_id: u64, symbol: &str) -> CoinConstraint {
        CoinConstraint {
            coin_id,
            exchange_symbol: symbol.to_string(),
            chain_type: String::new(),
            tx_fee: 0.0005,
            can_withdraw: true,
            can_deposit: true,
            confirmations: 1,
            listed: true,
        }
    }

    #[test]
    fn test_ensure_coin_is_idempotent_and_case_insensitive() {
        let registry = Registry::new();
        let btc = registry.ensure_coin("btc", "Bitcoin");
        let again = registry.ensure_coin("BTC", "");
        assert_eq!(btc, again);
        assert_eq!(btc.code, "BTC");
        assert_eq!(btc.name, "Bitcoin");
        assert_eq!(registry.coin("Btc"), Some(btc.clone()));
        assert_eq!(registry.coin_by_id(btc.id), Some(btc));
        assert!(registry.coin("ETH").is_none());
    }

    #[test]
    fn test_one_pair_per_base_target() {
        let registry = Registry::new();
        let usdt = registry.ensure_coin("USDT", "Tether");
        let btc = registry.ensure_coin("BTC", "Bitcoin");
        let pair = registry.ensure_pair(&usdt, &btc);
        assert_eq!(registry.ensure_pair(&usdt, &btc).id, pair.id);
        assert_eq!(registry.pair("usdt", "btc"), Some(pair.clone()));
        assert_eq!(pair.name(), "BTC/USDT");

        // 반대 방향은 다른 거래쌍
        let reverse = registry.ensure_pair(&btc, &usdt);
        assert_ne!(reverse.id, pair.id);
        assert_eq!(registry.pairs().len(), 2);
    }

    #[test]
    fn test_set_then_get_and_replace() {
        let registry = Registry::new();
        registry.set_pair_constraint(ExchangeId::Gate, pair_constraint(7, "BTC_USDT", 0.001));
        assert_eq!(
            registry.get_pair_constraint(ExchangeId::Gate, 7),
            Some(pair_constraint(7, "BTC_USDT", 0.001))
        );

        registry.set_pair_constraint(ExchangeId::Gate, pair_constraint(7, "BTC_USDT", 0.0001));
        assert_eq!(
            registry.get_pair_constraint(ExchangeId::Gate, 7).map(|c| c.lot_size),
            Some(0.0001)
        );
        assert_eq!(registry.pair_constraints(ExchangeId::Gate).len(), 1);
        assert!(registry.get_pair_constraint(ExchangeId::Binance, 7).is_none());
    }

    #[test]
    fn test_symbol_lookups_are_per_exchange() {
        let registry = Registry::new();
        let usdt = registry.ensure_coin("USDT", "");
        let btc = registry.ensure_coin("BTC", "");
        let pair = registry.ensure_pair(&usdt, &btc);

        registry.set_coin_constraint(ExchangeId::Binance, coin_constraint(btc.id, "BTC"));
        registry.set_coin_constraint(ExchangeId::Lbank, coin_constraint(btc.id, "btc"));
        registry.set_pair_constraint(ExchangeId::Binance, pair_constraint(pair.id, "BTCUSDT", 0.00001));
        registry.set_pair_constraint(ExchangeId::Okx, pair_constraint(pair.id, "BTC-USDT", 0.00000001));

        assert_eq!(registry.symbol_by_coin(ExchangeId::Lbank, btc.id).as_deref(), Some("btc"));
        assert_eq!(registry.symbol_by_pair(ExchangeId::Okx, pair.id).as_deref(), Some("BTC-USDT"));
        assert_eq!(registry.coin_by_symbol(ExchangeId::Binance, "BTC"), Some(btc.clone()));
        assert_eq!(registry.pair_by_symbol(ExchangeId::Binance, "BTCUSDT"), Some(pair.clone()));
        assert!(registry.pair_by_symbol(ExchangeId::Binance, "BTC-USDT").is_none());
        assert!(registry.coin_by_symbol(ExchangeId::Gate, "BTC").is_none());
    }

    #[test]
    fn test_mark_unlisted_keeps_entries_resolvable() {
        let registry = Registry::new();
        registry.set_pair_constraint(ExchangeId::Gate, pair_constraint(1, "BTC_USDT", 0.0001));
        registry.set_pair_constraint(ExchangeId::Gate, pair_constraint(2, "LUNA_USDT", 0.01));
        registry.set_pair_constraint(ExchangeId::Binance, pair_constraint(2, "LUNAUSDT", 0.01));

        let seen: HashSet<u64> = [1].into_iter().collect();
        assert_eq!(registry.mark_unlisted_pairs(ExchangeId::Gate, &seen), 1);

        let delisted = registry.get_pair_constraint(ExchangeId::Gate, 2).unwrap();
        assert!(!delisted.listed);
        assert_eq!(delisted.exchange_symbol, "LUNA_USDT");
        assert!(registry.get_pair_constraint(ExchangeId::Gate, 1).unwrap().listed);
        assert!(registry.get_pair_constraint(ExchangeId::Binance, 2).unwrap().listed);

        // 이미 표시된 항목은 다시 세지 않는다
        assert_eq!(registry.mark_unlisted_pairs(ExchangeId::Gate, &seen), 0);

        registry.set_coin_constraint(ExchangeId::Gate, coin_constraint(5, "LUNA"));
        assert_eq!(registry.mark_unlisted_coins(ExchangeId::Gate, &HashSet::new()), 1);
        assert!(!registry.get_coin_constraint(ExchangeId::Gate, 5).unwrap().listed);
    }

    #[test]
    fn test_snapshot_restore_through_json() {
        let registry = Registry::new();
        let usdt = registry.ensure_coin("USDT", "");
        let btc = registry.ensure_coin("BTC", "");
        let pair = registry.ensure_pair(&usdt, &btc);
        registry.set_coin_constraint(ExchangeId::Okx, coin_constraint(btc.id, "BTC"));
        registry.set_pair_constraint(ExchangeId::Okx, pair_constraint(pair.id, "BTC-USDT", 0.00000001));

        let json = serde_json::to_string(&registry.snapshot()).unwrap();
        let snapshot: RegistrySnapshot = serde_json::from_str(&json).unwrap();

        let restored = Registry::new();
        restored.restore(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.pair("USDT", "BTC"), Some(pair.clone()));

        // 새 ID 는 기존 ID 와 겹치지 않는다
        let eth = restored.ensure_coin("ETH", "");
        assert!(eth.id > pair.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_and_reads() {
        let registry = Arc::new(Registry::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let usdt = registry.ensure_coin("USDT", "");
                let btc = registry.ensure_coin("BTC", "");
                let pair = registry.ensure_pair(&usdt, &btc);
                for round in 0..50 {
                    let lot = if (i + round) % 2 == 0 { 0.001 } else { 0.0001 };
                    registry.set_pair_constraint(ExchangeId::Binance, pair_constraint(pair.id, "BTCUSDT", lot));
                    let read = registry.get_pair_constraint(ExchangeId::Binance, pair.id).unwrap();
                    assert!(read.lot_size == 0.001 || read.lot_size == 0.0001);
                    assert_eq!(read.exchange_symbol, "BTCUSDT");
                }
                pair.id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(registry.coins().len(), 2);
        assert_eq!(registry.pairs().len(), 1);
    }
}
