//! Sumire ターゲットプロセス接続
//!
//! このクレートは、検査対象プロセスへの読み取り専用アクセスを提供します。
//! プロセスの探索、ptraceによるアタッチ/デタッチ、アドレス空間の読み取り、
//! ロード済みイメージの列挙などを行います。書き込みは一切行いません。

pub mod errors;
pub mod images;
pub mod locator;
pub mod memory;
pub mod process;

pub use errors::TargetError;
pub use images::Image;
pub use locator::{locate, LocateError, ProcessCandidate};
pub use memory::Memory;
pub use process::RemoteProcess;

/// ターゲット接続の結果型
pub type Result<T> = anyhow::Result<T>;
