//! コンフォーマンスキャッシュのウォーク
//!
//! ランタイムのハッシュテーブルを格納順（バケット昇順、チェーンは
//! 先頭から）でたどります。並べ替えは行いません。

use crate::walk::{StepBudget, Walk, WalkEntry, WalkError};
use crate::walker::GraphWalker;
use crate::visited::VisitedSet;
use crate::Result;
use sumire_meta::conformance::{decode_cache_entry, decode_cache_header};
use sumire_meta::metadata::decode_instance;
use sumire_meta::DecodeError;
use tracing::debug;

/// ウォーク済みのコンフォーマンスレコード
#[derive(Debug, Clone)]
pub struct ConformanceEntry {
    /// レコードのリモートアドレス
    pub address: u64,
    /// 所属バケットの番号
    pub bucket: u32,
    /// 準拠する型のメタデータアドレス
    pub type_metadata: u64,
    /// 準拠する型の名前
    pub type_name: String,
    /// プロトコルディスクリプタのアドレス
    pub protocol: u64,
    /// プロトコル名
    pub protocol_name: String,
    /// ウィットネステーブルのアドレス
    pub witness: u64,
}

impl<'a> GraphWalker<'a> {
    /// コンフォーマンスキャッシュをウォークする
    ///
    /// ヘッダが読めない場合はウォーク全体の失敗です。個々のエントリの
    /// 破損はエラーエントリとして記録し、残りの走査を継続します。
    pub fn walk_conformance_cache(&self, root: u64) -> Result<Walk<ConformanceEntry>> {
        let header = decode_cache_header(self.reader, self.layout, root)?;
        debug!(
            buckets = header.bucket_count,
            entries = header.entry_count,
            "walking conformance cache"
        );

        let pw = self.layout.pointer_size() as u64;
        let mut walk = Walk::new();
        let mut visited = VisitedSet::new();
        let mut budget = StepBudget::new(self.max_steps);

        'buckets: for bucket in 0..header.bucket_count {
            if self.cancel.is_cancelled() {
                walk.cancelled = true;
                break;
            }

            let head_addr = header.buckets + bucket as u64 * pw;
            let mut addr = match self.reader.read_ptr(head_addr) {
                Ok(a) => a,
                Err(e) => {
                    walk.entries
                        .push(WalkEntry::Error(WalkError::Decode(DecodeError::Read(e))));
                    continue;
                }
            };

            // チェーンを先頭からたどる
            while addr != 0 {
                if self.cancel.is_cancelled() {
                    walk.cancelled = true;
                    break 'buckets;
                }
                if let Err(e) = budget.tick() {
                    walk.entries.push(WalkEntry::Error(e));
                    break 'buckets;
                }
                if !visited.insert(addr) {
                    walk.entries
                        .push(WalkEntry::Error(WalkError::AlreadyVisited { address: addr }));
                    break;
                }

                let entry = match decode_cache_entry(self.reader, self.layout, addr) {
                    Ok(e) => e,
                    Err(e) => {
                        // nextが読めないのでこのチェーンはここで終わり
                        walk.entries.push(WalkEntry::Error(WalkError::Decode(e)));
                        break;
                    }
                };

                match self.resolve_names(&entry.record) {
                    Ok((type_name, protocol_name)) => {
                        walk.entries.push(WalkEntry::Record(ConformanceEntry {
                            address: entry.record.address,
                            bucket,
                            type_metadata: entry.record.type_metadata,
                            type_name,
                            protocol: entry.record.protocol,
                            protocol_name,
                            witness: entry.record.witness,
                        }));
                    }
                    Err(e) => {
                        // レコード単体の破損。チェーンの残りは継続する
                        walk.entries.push(WalkEntry::Error(WalkError::Decode(e)));
                    }
                }

                addr = entry.next;
            }
        }

        debug!(steps = budget.used(), records = walk.record_count(), "conformance walk done");
        Ok(walk)
    }

    /// レコードの型名とプロトコル名を解決する
    fn resolve_names(
        &self,
        record: &sumire_meta::ConformanceRecord,
    ) -> std::result::Result<(String, String), DecodeError> {
        let instance =
            decode_instance(self.reader, self.layout, self.descriptors, record.type_metadata)?;
        let protocol = self
            .descriptors
            .get(self.reader, self.layout, record.protocol)?;
        Ok((instance.descriptor.name.clone(), protocol.name.clone()))
    }
}
