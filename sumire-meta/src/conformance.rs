//! コンフォーマンスキャッシュのデコード
//!
//! ランタイムが保持するチェーン法ハッシュテーブルのヘッダ・エントリ・
//! レコードを解釈します。走査順序の決定はウォーカー側の責務です。

use crate::errors::DecodeError;
use crate::layout::{LayoutTable, MAX_BUCKETS};
use crate::reader::RemoteReader;

/// コンフォーマンスレコード
///
/// ある型があるプロトコルに準拠していることを示す束縛です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceRecord {
    /// レコードのリモートアドレス
    pub address: u64,
    /// 準拠する型のメタデータインスタンス
    pub type_metadata: u64,
    /// プロトコルのディスクリプタ
    pub protocol: u64,
    /// ウィットネステーブルのアドレス
    pub witness: u64,
}

/// コンフォーマンスキャッシュのヘッダ
#[derive(Debug, Clone)]
pub struct CacheHeader {
    /// ヘッダのリモートアドレス
    pub address: u64,
    /// バケット配列の先頭アドレス
    pub buckets: u64,
    /// バケット数
    pub bucket_count: u32,
    /// ランタイムが記録している総エントリ数
    pub entry_count: u32,
}

/// チェーンエントリ（nextポインタ + インラインのレコード）
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// エントリのリモートアドレス
    pub address: u64,
    /// 同一バケット内の次エントリ（0なら終端）
    pub next: u64,
    /// インラインのコンフォーマンスレコード
    pub record: ConformanceRecord,
}

/// キャッシュヘッダをデコードする
pub fn decode_cache_header(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<CacheHeader, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "conformance cache",
        });
    }

    let buckets = reader.read_ptr(address + layout.cache_buckets as u64)?;
    let bucket_count = reader.read_u32(address + layout.cache_bucket_count as u64)?;
    let entry_count = reader.read_u32(address + layout.cache_entry_count as u64)?;

    if bucket_count > MAX_BUCKETS {
        return Err(DecodeError::CountOutOfRange {
            address,
            what: "bucket",
            count: bucket_count,
            limit: MAX_BUCKETS,
        });
    }

    Ok(CacheHeader {
        address,
        buckets,
        bucket_count,
        entry_count,
    })
}

/// コンフォーマンスレコードをデコードする
pub fn decode_conformance_record(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<ConformanceRecord, DecodeError> {
    let type_metadata = reader.read_ptr(address + layout.conf_type as u64)?;
    let protocol = reader.read_ptr(address + layout.conf_protocol as u64)?;
    let witness = reader.read_ptr(address + layout.conf_witness as u64)?;

    Ok(ConformanceRecord {
        address,
        type_metadata,
        protocol,
        witness,
    })
}

/// チェーンエントリをデコードする
pub fn decode_cache_entry(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<CacheEntry, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "cache entry",
        });
    }

    let next = reader.read_ptr(address + layout.entry_next as u64)?;
    let record = decode_conformance_record(reader, layout, address + layout.entry_record as u64)?;

    Ok(CacheEntry {
        address,
        next,
        record,
    })
}
