//! Sumire グラフウォーカー
//!
//! このクレートは、デコード済みのランタイム構造体をたどって高レベルの
//! ビューを再構築します。走査は明示的な訪問済み集合とステップ上限を
//! 持つ反復処理で、循環や破損した構造でも必ず停止します。破損した
//! ノードはそのレコード/部分木だけを中断し、ウォーク全体は継続します。

pub mod allocations;
pub mod cancel;
pub mod concurrency;
pub mod conformance;
pub mod generic;
pub mod pool;
pub mod visited;
pub mod walk;
pub mod walker;

pub use allocations::AllocationEntry;
pub use cancel::CancelToken;
pub use concurrency::{ActorEntry, TaskEntry};
pub use conformance::ConformanceEntry;
pub use generic::{GenericWalk, MetaNode};
pub use pool::CacheNodeEntry;
pub use visited::VisitedSet;
pub use walk::{Walk, WalkEntry, WalkError, DEFAULT_MAX_STEPS};
pub use walker::GraphWalker;

/// ウォーク処理の結果型
pub type Result<T> = anyhow::Result<T>;
