//! ジェネリックメタデータ木のウォーク
//!
//! ルート配列から各インスタンスをたどり、ジェネリック引数を子とする
//! 木を構築します。再帰呼び出しではなく明示的なスタックで走査するため、
//! 敵対的な深さの入力でもスタックオーバーフローしません。

use crate::walk::{StepBudget, WalkError};
use crate::walker::GraphWalker;
use crate::visited::VisitedSet;
use crate::Result;
use sumire_meta::metadata::{decode_instance, GenericArg};
use sumire_meta::records::decode_generic_roots;
use sumire_meta::{InstanceHeader, PrimitiveType, TypeKind};
use tracing::debug;

/// ジェネリックメタデータ木のノード
#[derive(Debug, Clone)]
pub enum MetaNode {
    /// デコードに成功したインスタンス
    Instance {
        address: u64,
        type_name: String,
        kind: TypeKind,
        children: Vec<MetaNode>,
    },
    /// プリミティブ型参照（葉）
    Primitive { ty: PrimitiveType },
    /// 訪問済みアドレスへの循環エッジ（このブランチの終端）
    AlreadyVisited { address: u64 },
    /// デコードに失敗したノード
    Failed { address: u64, error: WalkError },
}

impl MetaNode {
    /// 部分木に含まれるインスタンスノード数を数える
    pub fn instance_count(&self) -> usize {
        match self {
            MetaNode::Instance { children, .. } => {
                1 + children.iter().map(MetaNode::instance_count).sum::<usize>()
            }
            _ => 0,
        }
    }

    /// 部分木に含まれる失敗ノード数を数える
    pub fn failure_count(&self) -> usize {
        match self {
            MetaNode::Instance { children, .. } => {
                children.iter().map(MetaNode::failure_count).sum()
            }
            MetaNode::Failed { .. } => 1,
            _ => 0,
        }
    }
}

/// ジェネリックメタデータウォークの結果
#[derive(Debug, Clone)]
pub struct GenericWalk {
    /// ルートごとの木（ルート配列の格納順）
    pub roots: Vec<MetaNode>,
    /// 中断されたかどうか
    pub cancelled: bool,
}

impl GenericWalk {
    /// 全ルートのインスタンスノード数
    pub fn instance_count(&self) -> usize {
        self.roots.iter().map(MetaNode::instance_count).sum()
    }

    /// 全ルートの失敗ノード数
    pub fn failure_count(&self) -> usize {
        self.roots.iter().map(MetaNode::failure_count).sum()
    }
}

/// 構築中のノード（明示的スタックのフレーム）
struct Frame {
    header: InstanceHeader,
    children: Vec<MetaNode>,
    next_arg: usize,
}

impl<'a> GraphWalker<'a> {
    /// ジェネリックメタデータの木をウォークする
    ///
    /// 訪問済み集合はウォーク全体で共有するため、複数ルートから共有
    /// される部分木は2回目以降 `AlreadyVisited` として現れます。
    pub fn walk_generic_metadata(&self, root: u64) -> Result<GenericWalk> {
        let root_addrs = decode_generic_roots(self.reader, self.layout, root)?;
        debug!(roots = root_addrs.len(), "walking generic metadata");

        let mut visited = VisitedSet::new();
        let mut budget = StepBudget::new(self.max_steps);
        let mut walk = GenericWalk {
            roots: Vec::with_capacity(root_addrs.len()),
            cancelled: false,
        };

        for addr in root_addrs {
            if walk.cancelled {
                break;
            }
            let node = self.build_tree(addr, &mut visited, &mut budget, &mut walk.cancelled);
            walk.roots.push(node);
        }

        Ok(walk)
    }

    /// 1ルートぶんの木を反復的に構築する
    fn build_tree(
        &self,
        root_addr: u64,
        visited: &mut VisitedSet,
        budget: &mut StepBudget,
        cancelled: &mut bool,
    ) -> MetaNode {
        let mut stack: Vec<Frame> = Vec::new();

        // ルートノードを開始。葉で終わる場合はそのまま返す
        match self.start_node(root_addr, visited, budget) {
            Ok(frame) => stack.push(frame),
            Err(node) => return node,
        }

        loop {
            if self.cancel.is_cancelled() {
                *cancelled = true;
                // 構築途中のフレームを畳んで返す
                return collapse(stack);
            }

            let top = stack
                .last_mut()
                .expect("stack is non-empty inside the loop");

            if top.next_arg < top.header.args.len() {
                let arg = top.header.args[top.next_arg];
                top.next_arg += 1;

                let child = match arg {
                    GenericArg::Primitive(ty) => MetaNode::Primitive { ty },
                    GenericArg::Instance(addr) => {
                        match self.start_node(addr, visited, budget) {
                            Ok(frame) => {
                                stack.push(frame);
                                continue;
                            }
                            Err(node) => node,
                        }
                    }
                };

                let top = stack.last_mut().expect("frame still on stack");
                top.children.push(child);
            } else {
                // 引数をすべて処理した。ノードを完成させて親へ渡す
                let frame = stack.pop().expect("frame to finish");
                let node = MetaNode::Instance {
                    address: frame.header.address,
                    type_name: frame.header.descriptor.name.clone(),
                    kind: frame.header.descriptor.kind,
                    children: frame.children,
                };

                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return node,
                }
            }
        }
    }

    /// ノードの走査を開始する
    ///
    /// 葉（循環・失敗）の場合は `Err` で完成済みノードを返します。
    fn start_node(
        &self,
        addr: u64,
        visited: &mut VisitedSet,
        budget: &mut StepBudget,
    ) -> std::result::Result<Frame, MetaNode> {
        if let Err(e) = budget.tick() {
            return Err(MetaNode::Failed {
                address: addr,
                error: e,
            });
        }
        if addr == 0 {
            return Err(MetaNode::Failed {
                address: addr,
                error: WalkError::Decode(sumire_meta::DecodeError::NullPointer {
                    address: addr,
                    what: "metadata instance",
                }),
            });
        }
        if !visited.insert(addr) {
            return Err(MetaNode::AlreadyVisited { address: addr });
        }

        match decode_instance(self.reader, self.layout, self.descriptors, addr) {
            Ok(header) => Ok(Frame {
                header,
                children: Vec::new(),
                next_arg: 0,
            }),
            Err(e) => Err(MetaNode::Failed {
                address: addr,
                error: WalkError::Decode(e),
            }),
        }
    }
}

/// 中断時に構築途中のスタックをルートノードへ畳む
fn collapse(mut stack: Vec<Frame>) -> MetaNode {
    let mut node = match stack.pop() {
        Some(frame) => MetaNode::Instance {
            address: frame.header.address,
            type_name: frame.header.descriptor.name.clone(),
            kind: frame.header.descriptor.kind,
            children: frame.children,
        },
        None => return MetaNode::AlreadyVisited { address: 0 },
    };

    while let Some(mut frame) = stack.pop() {
        frame.children.push(node);
        node = MetaNode::Instance {
            address: frame.header.address,
            type_name: frame.header.descriptor.name.clone(),
            kind: frame.header.descriptor.kind,
            children: frame.children,
        };
    }

    node
}
