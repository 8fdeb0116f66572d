//! ウォーク結果の共通型

use sumire_meta::DecodeError;
use thiserror::Error;

/// 1ウォークあたりのステップ上限のデフォルト値
///
/// 破損した構造（自己参照チェーンなど）でも走査が有限時間で終わる
/// ことを保証します。
pub const DEFAULT_MAX_STEPS: usize = 1 << 20;

/// ウォーク中にレコード単位で発生するエラー
#[derive(Debug, Clone, Error)]
pub enum WalkError {
    /// レコードのデコードに失敗した
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// ポインタ循環を検出した（そのブランチの終端。真のエラーではない）
    #[error("already visited {address:#x} (pointer cycle)")]
    AlreadyVisited { address: u64 },

    /// ステップ上限を使い切った
    #[error("walk step budget of {budget} exhausted")]
    BudgetExhausted { budget: usize },
}

impl WalkError {
    /// 循環検出（真のエラーではない）かどうか
    pub fn is_cycle(&self) -> bool {
        matches!(self, WalkError::AlreadyVisited { .. })
    }
}

/// ウォーク出力列の1エントリ
///
/// 破損したノードはエラーエントリとして出力列に残し、黙って
/// 捨てることはしません。
#[derive(Debug, Clone)]
pub enum WalkEntry<T> {
    Record(T),
    Error(WalkError),
}

/// 1ウォークの結果
#[derive(Debug, Clone)]
pub struct Walk<T> {
    /// 走査順のエントリ列
    pub entries: Vec<WalkEntry<T>>,
    /// 中断トークンにより途中で打ち切られたかどうか
    pub cancelled: bool,
}

impl<T> Walk<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            cancelled: false,
        }
    }

    /// 成功したレコードを走査順で返す
    pub fn records(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|e| match e {
            WalkEntry::Record(r) => Some(r),
            WalkEntry::Error(_) => None,
        })
    }

    /// 成功したレコード数
    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    /// エラーエントリ数（循環検出を含む）
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, WalkEntry::Error(_)))
            .count()
    }
}

/// ステップ上限の管理
pub(crate) struct StepBudget {
    used: usize,
    limit: usize,
}

impl StepBudget {
    pub(crate) fn new(limit: usize) -> Self {
        Self { used: 0, limit }
    }

    /// 1ステップ消費する。上限を超えたらエラー
    pub(crate) fn tick(&mut self) -> Result<(), WalkError> {
        self.used += 1;
        if self.used > self.limit {
            Err(WalkError::BudgetExhausted { budget: self.limit })
        } else {
            Ok(())
        }
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_budget_exhausts() {
        let mut budget = StepBudget::new(2);
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_ok());
        match budget.tick() {
            Err(WalkError::BudgetExhausted { budget }) => assert_eq!(budget, 2),
            other => panic!("Expected BudgetExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_walk_counts() {
        let mut walk: Walk<u32> = Walk::new();
        walk.entries.push(WalkEntry::Record(1));
        walk.entries
            .push(WalkEntry::Error(WalkError::AlreadyVisited { address: 0x10 }));
        walk.entries.push(WalkEntry::Record(2));

        assert_eq!(walk.record_count(), 2);
        assert_eq!(walk.error_count(), 1);
    }
}
