//! Process-wide store of trade records keyed by trade id

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use crate::types::{TradeExecution, TradeStatus};

#[derive(Clone)]
pub struct TradeRegistry {
    trades: Arc<RwLock<HashMap<String, TradeExecution>>>,
    max_retained: usize,
}

impl TradeRegistry {
    pub fn new(max_retained: usize) -> Self {
        Self {
            trades: Arc::new(RwLock::new(HashMap::new())),
            max_retained: max_retained.max(1),
        }
    }

    pub async fn insert(&self, execution: TradeExecution) {
        let mut trades = self.trades.write().await;
        trades.insert(execution.trade_id.clone(), execution);
        Self::evict(&mut trades, self.max_retained);
    }

    /// Applies `f` to the stored record under the write lock and returns its result.
    pub async fn update<F, R>(&self, trade_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut TradeExecution) -> R,
    {
        let mut trades = self.trades.write().await;
        trades.get_mut(trade_id).map(f)
    }

    pub async fn get(&self, trade_id: &str) -> Option<TradeExecution> {
        self.trades.read().await.get(trade_id).cloned()
    }

    pub async fn status(&self, trade_id: &str) -> Option<TradeStatus> {
        self.trades.read().await.get(trade_id).map(|t| t.status)
    }

    pub async fn active(&self) -> Vec<TradeExecution> {
        let trades = self.trades.read().await;
        let mut active: Vec<TradeExecution> = trades.values().filter(|t| t.is_active()).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        active
    }

    /// Newest first.
    pub async fn history(&self, limit: usize) -> Vec<TradeExecution> {
        let trades = self.trades.read().await;
        let mut all: Vec<TradeExecution> = trades.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.trade_id.cmp(&a.trade_id)));
        all.truncate(limit);
        all
    }

    pub async fn len(&self) -> usize {
        self.trades.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trades.read().await.is_empty()
    }

    /// Drops the oldest finished records beyond the bound. Active records stay
    /// even if that leaves the map above the bound.
    fn evict(trades: &mut HashMap<String, TradeExecution>, max_retained: usize) {
        if trades.len() <= max_retained {
            return;
        }
        let mut terminal: Vec<(chrono::DateTime<chrono::Utc>, String)> = trades
            .values()
            .filter(|t| t.is_terminal())
            .map(|t| (t.created_at, t.trade_id.clone()))
            .collect();
        terminal.sort();

        let excess = trades.len() - max_retained;
        for (_, trade_id) in terminal.into_iter().take(excess) {
            debug!("Evicting finished trade {}", trade_id);
            trades.remove(&trade_id);
        }
    }
}
