//! 読み取り・デコードのエラー型

use thiserror::Error;

/// リモートメモリ読み取りのエラー
///
/// 要求したバイト数と実際に読めたバイト数が一致しない場合は必ず
/// `Short` になります。不足分をゼロ埋めして成功扱いすることはありません。
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    /// 要求より少ないバイト数しか読めなかった
    #[error("short read at {address:#x}: requested {requested} bytes, got {actual}")]
    Short {
        address: u64,
        requested: usize,
        actual: usize,
    },

    /// 読み取り自体が失敗した
    #[error("read at {address:#x} failed: {reason}")]
    Failed { address: u64, reason: String },
}

impl ReadError {
    /// エラーの発生アドレスを取得する
    pub fn address(&self) -> u64 {
        match self {
            ReadError::Short { address, .. } => *address,
            ReadError::Failed { address, .. } => *address,
        }
    }
}

/// メタデータデコードのエラー
///
/// 部分的にしかデコードできなかった構造体は、成功した構造体と必ず
/// 区別されます。未知の種別タグはエラーではなく `Unknown` として
/// デコードされるため、ここには現れません。
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// リモートメモリの読み取りに失敗した
    #[error(transparent)]
    Read(#[from] ReadError),

    /// デコード対象のポインタがNULLだった
    #[error("null {what} pointer at {address:#x}")]
    NullPointer { address: u64, what: &'static str },

    /// 宣言された個数が上限を超えている（破損とみなす）
    #[error("{what} count {count} at {address:#x} exceeds limit {limit}")]
    CountOutOfRange {
        address: u64,
        what: &'static str,
        count: u32,
        limit: u32,
    },

    /// 名前文字列が上限バイト数内で終端されていない
    #[error("unterminated name at {address:#x} (no NUL within {limit} bytes)")]
    UnterminatedName { address: u64, limit: usize },

    /// 名前文字列が有効なUTF-8ではない
    #[error("name at {address:#x} is not valid UTF-8")]
    BadUtf8 { address: u64 },
}

impl DecodeError {
    /// エラーの発生アドレスを取得する
    pub fn address(&self) -> u64 {
        match self {
            DecodeError::Read(e) => e.address(),
            DecodeError::NullPointer { address, .. } => *address,
            DecodeError::CountOutOfRange { address, .. } => *address,
            DecodeError::UnterminatedName { address, .. } => *address,
            DecodeError::BadUtf8 { address } => *address,
        }
    }
}
