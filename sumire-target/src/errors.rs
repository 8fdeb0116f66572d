//! アタッチ・接続のエラー型

use thiserror::Error;

/// ターゲットプロセスへの接続エラー
///
/// locateとattachの間でプロセスが消えるレースは起こりうるため、
/// 「最初から存在しない」と「アタッチ中に消えた」を区別します。
#[derive(Debug, Error)]
pub enum TargetError {
    /// 指定されたプロセスが存在しない
    #[error("no such process: {0}")]
    NoSuchProcess(i32),

    /// locate後、アタッチ完了前にプロセスが終了した
    #[error("process {0} exited before attach completed")]
    ProcessVanished(i32),

    /// アタッチ権限がない
    #[error("permission denied attaching to process {0} (check ptrace scope)")]
    PermissionDenied(i32),

    /// このプラットフォームではアタッチをサポートしない
    #[error("process inspection is not supported on this platform")]
    Unsupported,

    /// 実行イメージを解釈できない
    #[error("unrecognized executable image: {0}")]
    BadImage(String),

    /// システムコールの失敗
    #[error(transparent)]
    Sys(#[from] nix::errno::Errno),

    /// I/Oエラー
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
