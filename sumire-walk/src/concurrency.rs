//! 並行タスク・アクター登録簿のウォーク

use crate::walk::{StepBudget, Walk, WalkEntry, WalkError};
use crate::walker::GraphWalker;
use crate::visited::VisitedSet;
use crate::Result;
use sumire_meta::records::{decode_actor, decode_task};
use sumire_meta::{ActorRecord, DecodeError, TaskRecord};

/// ウォーク済みのタスクレコード
pub type TaskEntry = TaskRecord;

/// ウォーク済みのアクターレコード
pub type ActorEntry = ActorRecord;

impl<'a> GraphWalker<'a> {
    /// タスク登録簿をウォークする
    pub fn walk_tasks(&self, root: u64) -> Result<Walk<TaskEntry>> {
        self.walk_chain(root, |walker, addr| {
            decode_task(walker.reader, walker.layout, addr).map(|t| (t.next, t))
        })
    }

    /// アクター登録簿をウォークする
    pub fn walk_actors(&self, root: u64) -> Result<Walk<ActorEntry>> {
        self.walk_chain(root, |walker, addr| {
            decode_actor(walker.reader, walker.layout, addr).map(|a| (a.next, a))
        })
    }

    /// 先頭ポインタからのリンクリストを共通の手順でたどる
    fn walk_chain<T, F>(&self, root: u64, decode: F) -> Result<Walk<T>>
    where
        F: Fn(&Self, u64) -> std::result::Result<(u64, T), DecodeError>,
    {
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

            match decode(self, addr) {
                Ok((next, record)) => {
                    walk.entries.push(WalkEntry::Record(record));
                    addr = next;
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
