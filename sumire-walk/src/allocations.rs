//! アロケーション登録簿のウォーク

use crate::walk::{StepBudget, Walk, WalkEntry, WalkError};
use crate::walker::GraphWalker;
use crate::Result;
use sumire_meta::metadata::decode_instance;
use sumire_meta::records::{decode_alloc_registry, decode_alloc_slot, decode_backtrace};
use tracing::debug;

/// ウォーク済みのアロケーションレコード
#[derive(Debug, Clone)]
pub struct AllocationEntry {
    /// 確保された領域の先頭アドレス
    pub address: u64,
    /// 確保サイズ（バイト）
    pub size: u64,
    /// 動的型のメタデータアドレス（0なら型情報なし）
    pub metadata: u64,
    /// 動的型の名前（メタデータが解決できた場合）
    pub type_name: Option<String>,
    /// 取得済みバックトレース（格納順 = 新しい順）
    pub backtrace: Vec<u64>,
}

impl<'a> GraphWalker<'a> {
    /// アロケーション登録簿をウォークする
    ///
    /// スロットは固定ストライドの配列です。スロット単位の破損
    /// （メタデータ参照先の切断を含む）はエラーエントリとして記録し、
    /// 残りのスロットの走査を継続します。
    pub fn walk_allocations(
        &self,
        root: u64,
        capture_backtraces: bool,
    ) -> Result<Walk<AllocationEntry>> {
        let registry = decode_alloc_registry(self.reader, self.layout, root)?;
        debug!(slots = registry.count, capture_backtraces, "walking allocations");

        let stride = self.layout.slot_stride as u64;
        let mut walk = Walk::new();
        let mut budget = StepBudget::new(self.max_steps);

        for i in 0..registry.count as u64 {
            if self.cancel.is_cancelled() {
                walk.cancelled = true;
                break;
            }
            if let Err(e) = budget.tick() {
                walk.entries.push(WalkEntry::Error(e));
                break;
            }

            let slot_addr = registry.slots + i * stride;
            let slot = match decode_alloc_slot(self.reader, self.layout, slot_addr) {
                Ok(s) => s,
                Err(e) => {
                    walk.entries.push(WalkEntry::Error(WalkError::Decode(e)));
                    continue;
                }
            };

            // 動的型の解決。参照先が切れているスロットはエラーエントリ
            let type_name = if slot.metadata != 0 {
                match decode_instance(self.reader, self.layout, self.descriptors, slot.metadata) {
                    Ok(inst) => Some(inst.descriptor.name.clone()),
                    Err(e) => {
                        walk.entries.push(WalkEntry::Error(WalkError::Decode(e)));
                        continue;
                    }
                }
            } else {
                None
            };

            let backtrace = if capture_backtraces {
                match decode_backtrace(self.reader, &slot) {
                    Ok(frames) => frames,
                    Err(e) => {
                        walk.entries.push(WalkEntry::Error(WalkError::Decode(e)));
                        continue;
                    }
                }
            } else {
                Vec::new()
            };

            walk.entries.push(WalkEntry::Record(AllocationEntry {
                address: slot.payload,
                size: slot.size,
                metadata: slot.metadata,
                type_name,
                backtrace,
            }));
        }

        Ok(walk)
    }
}
