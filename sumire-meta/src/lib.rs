//! Sumire ランタイムメタデータ解析
//!
//! このクレートは、ターゲットプロセスのランタイムメタデータを解釈するための
//! プラットフォーム非依存な機能を提供します。バイナリレイアウトテーブル、
//! リモートメモリ読み取りの抽象化、型ディスクリプタ・コンフォーマンスレコードの
//! デコード、シンボル解決などを行います。

pub mod conformance;
pub mod descriptor;
pub mod errors;
pub mod layout;
pub mod metadata;
pub mod reader;
pub mod records;
pub mod symbols;

pub use conformance::{CacheEntry, CacheHeader, ConformanceRecord};
pub use descriptor::{DescriptorCache, TypeDescriptor, TypeKind};
pub use errors::{DecodeError, ReadError};
pub use layout::{AbiVersion, LayoutTable, PointerWidth};
pub use metadata::{GenericArg, InstanceHeader, PrimitiveType};
pub use records::{
    ActorRecord, AllocRegistry, AllocSlot, AllocationTag, CacheNodeRecord, PoolNode, PoolRoot,
    TaskRecord,
};
pub use reader::RemoteReader;
pub use symbols::{ResolvedAddress, Symbol, SymbolIndex};

/// メタデータ解析の結果型
pub type Result<T> = anyhow::Result<T>;
