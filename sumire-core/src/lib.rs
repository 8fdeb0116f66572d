//! Sumire インスペクタのコア機能
//!
//! このクレートは、インスペクタの中核となるロジックを提供します。
//! ターゲットへのアタッチ、ルートシンボルの解決、ウォークの起動、
//! レポートの整形を統合します。

pub mod command;
pub mod errors;
pub mod inspector;
pub mod report;

pub use command::{BacktraceStyle, DumpKind};
pub use inspector::Inspector;

// 他のクレートから使用するために再エクスポート
pub use sumire_meta::Symbol;
pub use sumire_target::{locate, LocateError, ProcessCandidate, TargetError};
pub use sumire_walk::CancelToken;

/// インスペクタの結果型
pub type Result<T> = anyhow::Result<T>;
