//! 補助ランタイムレコードのデコード
//!
//! メタデータプールのノード、キャッシュノード、アロケーションスロット、
//! 並行タスク・アクターのレコードを解釈します。

use crate::errors::DecodeError;
use crate::layout::{LayoutTable, MAX_BACKTRACE_FRAMES, MAX_ROOT_ENTRIES};
use crate::reader::RemoteReader;

/// メタデータプールノードのタグ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationTag {
    TypeMetadata,
    ProtocolConformance,
    GenericCache,
    SingletonCache,
    WitnessTable,
    CacheNode,
    Unknown(u32),
}

impl AllocationTag {
    /// タグ値からタグ種別を判定する
    pub fn from_tag(tag: u32) -> AllocationTag {
        match tag {
            1 => AllocationTag::TypeMetadata,
            2 => AllocationTag::ProtocolConformance,
            3 => AllocationTag::GenericCache,
            4 => AllocationTag::SingletonCache,
            5 => AllocationTag::WitnessTable,
            6 => AllocationTag::CacheNode,
            other => AllocationTag::Unknown(other),
        }
    }
}

impl std::fmt::Display for AllocationTag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AllocationTag::TypeMetadata => write!(f, "TypeMetadata"),
            AllocationTag::ProtocolConformance => write!(f, "ProtocolConformance"),
            AllocationTag::GenericCache => write!(f, "GenericCache"),
            AllocationTag::SingletonCache => write!(f, "SingletonCache"),
            AllocationTag::WitnessTable => write!(f, "WitnessTable"),
            AllocationTag::CacheNode => write!(f, "CacheNode"),
            AllocationTag::Unknown(tag) => write!(f, "Unknown({:#x})", tag),
        }
    }
}

/// メタデータプールのルート
#[derive(Debug, Clone)]
pub struct PoolRoot {
    pub address: u64,
    /// 先頭ノード（0なら空）
    pub head: u64,
    /// ランタイムが記録しているノード数
    pub count: u32,
}

/// メタデータプールのノード
#[derive(Debug, Clone)]
pub struct PoolNode {
    pub address: u64,
    pub next: u64,
    pub tag: AllocationTag,
    /// ペイロードのバイト数
    pub size: u32,
    /// ペイロード先頭のリモートアドレス
    pub payload: u64,
}

/// プールルートをデコードする
pub fn decode_pool_root(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<PoolRoot, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "metadata pool",
        });
    }

    let head = reader.read_ptr(address + layout.pool_head as u64)?;
    let count = reader.read_u32(address + layout.pool_count as u64)?;

    Ok(PoolRoot {
        address,
        head,
        count,
    })
}

/// プールノードをデコードする
pub fn decode_pool_node(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<PoolNode, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "pool node",
        });
    }

    let next = reader.read_ptr(address + layout.node_next as u64)?;
    let tag = reader.read_u32(address + layout.node_tag as u64)?;
    let size = reader.read_u32(address + layout.node_size as u64)?;

    Ok(PoolNode {
        address,
        next,
        tag: AllocationTag::from_tag(tag),
        size,
        payload: address + layout.node_payload as u64,
    })
}

/// メタデータキャッシュノード
#[derive(Debug, Clone)]
pub struct CacheNodeRecord {
    pub address: u64,
    pub next: u64,
    /// キーとなるメタデータインスタンスのアドレス
    pub key: u64,
    /// キャッシュされた値のアドレス
    pub value: u64,
}

/// キャッシュノードをデコードする
pub fn decode_cache_node(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<CacheNodeRecord, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "cache node",
        });
    }

    let next = reader.read_ptr(address + layout.cnode_next as u64)?;
    let key = reader.read_ptr(address + layout.cnode_key as u64)?;
    let value = reader.read_ptr(address + layout.cnode_value as u64)?;

    Ok(CacheNodeRecord {
        address,
        next,
        key,
        value,
    })
}

/// ジェネリックメタデータルート配列を読み取る
///
/// 返り値は各ルートインスタンスのアドレスです。
pub fn decode_generic_roots(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<Vec<u64>, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "generic roots",
        });
    }

    let count = reader.read_u32(address + layout.groots_count as u64)?;
    if count > MAX_ROOT_ENTRIES {
        return Err(DecodeError::CountOutOfRange {
            address,
            what: "generic root",
            count,
            limit: MAX_ROOT_ENTRIES,
        });
    }

    let pw = layout.pointer_size() as u64;
    let mut roots = Vec::with_capacity(count as usize);
    for i in 0..count as u64 {
        roots.push(reader.read_ptr(address + layout.groots_entries as u64 + i * pw)?);
    }

    Ok(roots)
}

/// アロケーション登録簿のヘッダ
#[derive(Debug, Clone)]
pub struct AllocRegistry {
    pub address: u64,
    pub count: u32,
    /// スロット配列の先頭アドレス
    pub slots: u64,
}

/// アロケーションスロット
#[derive(Debug, Clone)]
pub struct AllocSlot {
    pub address: u64,
    /// 確保された領域の先頭アドレス
    pub payload: u64,
    /// 確保サイズ（バイト）
    pub size: u64,
    /// 動的型のメタデータインスタンス（0なら型情報なし）
    pub metadata: u64,
    /// バックトレースバッファ（0なら未取得）
    pub backtrace: u64,
    /// バックトレースのフレーム数
    pub frame_count: u32,
}

/// アロケーション登録簿のヘッダをデコードする
pub fn decode_alloc_registry(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<AllocRegistry, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "allocation registry",
        });
    }

    let count = reader.read_u32(address + layout.alloc_count as u64)?;
    if count > MAX_ROOT_ENTRIES {
        return Err(DecodeError::CountOutOfRange {
            address,
            what: "allocation slot",
            count,
            limit: MAX_ROOT_ENTRIES,
        });
    }
    let slots = reader.read_ptr(address + layout.alloc_slots as u64)?;

    Ok(AllocRegistry {
        address,
        count,
        slots,
    })
}

/// アロケーションスロットをデコードする
pub fn decode_alloc_slot(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<AllocSlot, DecodeError> {
    let payload = reader.read_ptr(address + layout.slot_payload as u64)?;
    let size = reader.read_u64(address + layout.slot_size as u64)?;
    let metadata = reader.read_ptr(address + layout.slot_metadata as u64)?;
    let backtrace = reader.read_ptr(address + layout.slot_backtrace as u64)?;
    let frame_count = reader.read_u32(address + layout.slot_frames as u64)?;

    if frame_count > MAX_BACKTRACE_FRAMES {
        return Err(DecodeError::CountOutOfRange {
            address,
            what: "backtrace frame",
            count: frame_count,
            limit: MAX_BACKTRACE_FRAMES,
        });
    }

    Ok(AllocSlot {
        address,
        payload,
        size,
        metadata,
        backtrace,
        frame_count,
    })
}

/// スロットのバックトレースバッファを読み取る
///
/// フレームは格納順（新しい順）のまま返します。
pub fn decode_backtrace(
    reader: &dyn RemoteReader,
    slot: &AllocSlot,
) -> Result<Vec<u64>, DecodeError> {
    if slot.backtrace == 0 || slot.frame_count == 0 {
        return Ok(Vec::new());
    }

    let mut frames = Vec::with_capacity(slot.frame_count as usize);
    for i in 0..slot.frame_count as u64 {
        frames.push(reader.read_u64(slot.backtrace + i * 8)?);
    }
    Ok(frames)
}

/// タスクのフラグビット
pub const TASK_FLAG_RUNNING: u32 = 1;
pub const TASK_FLAG_CANCELLED: u32 = 2;
pub const TASK_FLAG_COMPLETE: u32 = 4;

/// 並行タスクのレコード
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub address: u64,
    pub next: u64,
    pub id: u64,
    /// タスク本体の関数アドレス
    pub function: u64,
    pub flags: u32,
}

impl TaskRecord {
    pub fn is_running(&self) -> bool {
        self.flags & TASK_FLAG_RUNNING != 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags & TASK_FLAG_CANCELLED != 0
    }

    pub fn is_complete(&self) -> bool {
        self.flags & TASK_FLAG_COMPLETE != 0
    }
}

/// タスクレコードをデコードする
pub fn decode_task(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<TaskRecord, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "task record",
        });
    }

    let next = reader.read_ptr(address + layout.task_next as u64)?;
    let id = reader.read_u64(address + layout.task_id as u64)?;
    let function = reader.read_ptr(address + layout.task_fn as u64)?;
    let flags = reader.read_u32(address + layout.task_flags as u64)?;

    Ok(TaskRecord {
        address,
        next,
        id,
        function,
        flags,
    })
}

/// アクターのレコード
#[derive(Debug, Clone)]
pub struct ActorRecord {
    pub address: u64,
    pub next: u64,
    pub flags: u32,
    /// 待機中のジョブ数
    pub queue_len: u32,
}

/// アクターレコードをデコードする
pub fn decode_actor(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<ActorRecord, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "actor record",
        });
    }

    let next = reader.read_ptr(address + layout.actor_next as u64)?;
    let flags = reader.read_u32(address + layout.actor_flags as u64)?;
    let queue_len = reader.read_u32(address + layout.actor_queue as u64)?;

    Ok(ActorRecord {
        address,
        next,
        flags,
        queue_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_tag_from_tag() {
        assert_eq!(AllocationTag::from_tag(1), AllocationTag::TypeMetadata);
        assert_eq!(AllocationTag::from_tag(6), AllocationTag::CacheNode);
        match AllocationTag::from_tag(0xbeef) {
            AllocationTag::Unknown(tag) => assert_eq!(tag, 0xbeef),
            other => panic!("Expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_task_flags() {
        let task = TaskRecord {
            address: 0x10,
            next: 0,
            id: 1,
            function: 0x4000,
            flags: TASK_FLAG_RUNNING | TASK_FLAG_CANCELLED,
        };
        assert!(task.is_running());
        assert!(task.is_cancelled());
        assert!(!task.is_complete());
    }
}
