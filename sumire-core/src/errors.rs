//! エラーメッセージ定数

/// ランタイムルートシンボルが見つからない場合のエラーメッセージ
pub const ERR_ROOT_SYMBOL_MISSING: &str = "target does not export the runtime root symbol";

/// ABIバージョンが未知の場合の警告メッセージ
pub const ERR_UNKNOWN_ABI_VERSION: &str = "unrecognized runtime ABI version";

/// シンボル索引が構築できなかった場合のエラーメッセージ
pub const ERR_NO_SYMBOLS: &str = "no symbols could be indexed from the target images";
