//! メタデータプールとキャッシュノードのウォーク

use crate::walk::{StepBudget, Walk, WalkEntry, WalkError};
use crate::walker::GraphWalker;
use crate::visited::VisitedSet;
use crate::Result;
use sumire_meta::metadata::decode_instance;
use sumire_meta::records::{decode_cache_node, decode_pool_node, decode_pool_root};
use sumire_meta::{DecodeError, PoolNode};
use tracing::debug;

/// ウォーク済みのキャッシュノード
#[derive(Debug, Clone)]
pub struct CacheNodeEntry {
    /// ノードのリモートアドレス
    pub address: u64,
    /// キーとなるメタデータインスタンスのアドレス
    pub key: u64,
    /// キーの型名（解決できた場合）
    pub key_type: Option<String>,
    /// キャッシュされた値のアドレス
    pub value: u64,
}

impl<'a> GraphWalker<'a> {
    /// メタデータプール（生のメタデータアロケーション）をウォークする
    ///
    /// ノードは格納順のリンクリストです。ノードの破損はチェーンの
    /// 終端として記録されます（nextが読めないため続行できない）。
    pub fn walk_metadata_pool(&self, root: u64) -> Result<Walk<PoolNode>> {
        let pool = decode_pool_root(self.reader, self.layout, root)?;
        debug!(declared = pool.count, "walking metadata pool");

        let mut walk = Walk::new();
        let mut visited = VisitedSet::new();
        let mut budget = StepBudget::new(self.max_steps);

        let mut addr = pool.head;
        while addr != 0 {
            if self.cancel.is_cancelled() {
                walk.cancelled = true;
                break;
            }
            if let Err(e) = budget.tick() {
                walk.entries.push(WalkEntry::Error(e));
                break;
            }
            if !visited.insert(addr) {
                walk.entries
                    .push(WalkEntry::Error(WalkError::AlreadyVisited { address: addr }));
                break;
            }

            match decode_pool_node(self.reader, self.layout, addr) {
                Ok(node) => {
                    addr = node.next;
                    walk.entries.push(WalkEntry::Record(node));
                }
                Err(e) => {
                    walk.entries.push(WalkEntry::Error(WalkError::Decode(e)));
                    break;
                }
            }
        }

        Ok(walk)
    }

    /// メタデータキャッシュノードのリストをウォークする
    ///
    /// キーの型名解決に失敗してもノード自体は記録します（名前なし）。
    pub fn walk_cache_nodes(&self, root: u64) -> Result<Walk<CacheNodeEntry>> {
        let head = self
            .reader
            .read_ptr(root)
            .map_err(DecodeError::Read)?;

        let mut walk = Walk::new();
        let mut visited = VisitedSet::new();
        let mut budget = StepBudget::new(self.max_steps);

        let mut addr = head;
        while addr != 0 {
            if self.cancel.is_cancelled() {
                walk.cancelled = true;
                break;
            }
            if let Err(e) = budget.tick() {
                walk.entries.push(WalkEntry::Error(e));
                break;
            }
            if !visited.insert(addr) {
                walk.entries
                    .push(WalkEntry::Error(WalkError::AlreadyVisited { address: addr }));
                break;
            }

            match decode_cache_node(self.reader, self.layout, addr) {
                Ok(node) => {
                    let key_type =
                        decode_instance(self.reader, self.layout, self.descriptors, node.key)
                            .ok()
                            .map(|inst| inst.descriptor.name.clone());

                    walk.entries.push(WalkEntry::Record(CacheNodeEntry {
                        address: node.address,
                        key: node.key,
                        key_type,
                        value: node.value,
                    }));
                    addr = node.next;
                }
                Err(e) => {
                    walk.entries.push(WalkEntry::Error(WalkError::Decode(e)));
                    break;
                }
            }
        }

        Ok(walk)
    }
}
