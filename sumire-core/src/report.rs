//! レポート整形機能
//!
//! ウォーク結果を人間が読めるテキストに整形します。同じ入力に対しては
//! 必ずバイト単位で同一の出力を生成します（走査順をそのまま使い、
//! 並べ替えやハッシュ順の反復を行わないため）。

use crate::command::BacktraceStyle;
use std::fmt::Write as _;
use sumire_meta::{PoolNode, SymbolIndex};
use sumire_walk::{
    ActorEntry, AllocationEntry, CacheNodeEntry, ConformanceEntry, GenericWalk, MetaNode,
    TaskEntry, Walk, WalkEntry,
};

/// アドレスをシンボル名に解決する（できなければ生の16進）
fn symbolize(symbols: &SymbolIndex, addr: u64) -> String {
    match symbols.nearest(addr) {
        Some(resolved) => {
            if resolved.offset == 0 {
                resolved.symbol.display_name().to_string()
            } else {
                format!("{} + {:#x}", resolved.symbol.display_name(), resolved.offset)
            }
        }
        None => format!("{:#x}", addr),
    }
}

/// ウォークの集計行を書き出す
fn write_summary<T>(out: &mut String, walk: &Walk<T>, noun: &str) {
    let _ = writeln!(
        out,
        "{} {}, {} errors{}",
        walk.record_count(),
        noun,
        walk.error_count(),
        if walk.cancelled { " (walk cancelled)" } else { "" }
    );
}

/// コンフォーマンスキャッシュのレポートを整形する
///
/// レコード行の書式: `<型名> conforms to <プロトコル名> (witness: <アドレス>)`
pub fn format_conformances(walk: &Walk<ConformanceEntry>) -> String {
    let mut out = String::new();

    for entry in &walk.entries {
        match entry {
            WalkEntry::Record(r) => {
                let _ = writeln!(
                    out,
                    "{} conforms to {} (witness: {:#x})",
                    r.type_name, r.protocol_name, r.witness
                );
            }
            WalkEntry::Error(e) => {
                let _ = writeln!(out, "error: {}", e);
            }
        }
    }

    write_summary(&mut out, walk, "conformances");
    out
}

/// メタデータプールのレポートを整形する
pub fn format_pool(walk: &Walk<PoolNode>) -> String {
    let mut out = String::new();

    for entry in &walk.entries {
        match entry {
            WalkEntry::Record(node) => {
                let _ = writeln!(
                    out,
                    "{:#x}: {} ({} bytes)",
                    node.address, node.tag, node.size
                );
            }
            WalkEntry::Error(e) => {
                let _ = writeln!(out, "error: {}", e);
            }
        }
    }

    write_summary(&mut out, walk, "allocations");
    out
}

/// メタデータキャッシュノードのレポートを整形する
pub fn format_cache_nodes(walk: &Walk<CacheNodeEntry>) -> String {
    let mut out = String::new();

    for entry in &walk.entries {
        match entry {
            WalkEntry::Record(node) => match &node.key_type {
                Some(name) => {
                    let _ = writeln!(
                        out,
                        "{:#x}: key={:#x} ({}) value={:#x}",
                        node.address, node.key, name, node.value
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "{:#x}: key={:#x} value={:#x}",
                        node.address, node.key, node.value
                    );
                }
            },
            WalkEntry::Error(e) => {
                let _ = writeln!(out, "error: {}", e);
            }
        }
    }

    write_summary(&mut out, walk, "cache nodes");
    out
}

/// ジェネリックメタデータ木のレポートを整形する
pub fn format_generic(walk: &GenericWalk) -> String {
    let mut out = String::new();

    for root in &walk.roots {
        render_node(&mut out, root, 0);
    }

    let _ = writeln!(
        out,
        "{} instantiations, {} errors{}",
        walk.instance_count(),
        walk.failure_count(),
        if walk.cancelled { " (walk cancelled)" } else { "" }
    );
    out
}

/// 木のノードをインデント付きで書き出す
fn render_node(out: &mut String, node: &MetaNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        MetaNode::Instance {
            address,
            type_name,
            kind,
            children,
        } => {
            let _ = writeln!(out, "{}{:#x} {} ({})", indent, address, type_name, kind);
            for child in children {
                render_node(out, child, depth + 1);
            }
        }
        MetaNode::Primitive { ty } => {
            let _ = writeln!(out, "{}{}", indent, ty);
        }
        MetaNode::AlreadyVisited { address } => {
            let _ = writeln!(out, "{}{:#x} (already visited)", indent, address);
        }
        MetaNode::Failed { address, error } => {
            let _ = writeln!(out, "{}{:#x} error: {}", indent, address, error);
        }
    }
}

/// アロケーションのレポートを整形する
///
/// バックトレースのフレームは格納順（新しい順）のまま、イメージの
/// エクスポートシンボルで解決します。解決できないアドレスは生の16進で
/// 表示します。
pub fn format_allocations(
    walk: &Walk<AllocationEntry>,
    style: Option<BacktraceStyle>,
    symbols: &SymbolIndex,
) -> String {
    let mut out = String::new();

    for entry in &walk.entries {
        match entry {
            WalkEntry::Record(r) => {
                match &r.type_name {
                    Some(name) => {
                        let _ = writeln!(out, "{:#x} {} bytes, {}", r.address, r.size, name);
                    }
                    None => {
                        let _ = writeln!(out, "{:#x} {} bytes", r.address, r.size);
                    }
                }

                match style {
                    Some(BacktraceStyle::OneLine) if !r.backtrace.is_empty() => {
                        let frames: Vec<String> = r
                            .backtrace
                            .iter()
                            .map(|f| symbolize(symbols, *f))
                            .collect();
                        let _ = writeln!(out, "  bt: {}", frames.join(" <- "));
                    }
                    Some(BacktraceStyle::Long) => {
                        for (i, frame) in r.backtrace.iter().enumerate() {
                            let _ = writeln!(
                                out,
                                "  #{:<2} {:#018x} {}",
                                i,
                                frame,
                                symbolize(symbols, *frame)
                            );
                        }
                    }
                    _ => {}
                }
            }
            WalkEntry::Error(e) => {
                let _ = writeln!(out, "error: {}", e);
            }
        }
    }

    write_summary(&mut out, walk, "allocations");
    out
}

/// 並行タスク・アクターのレポートを整形する
pub fn format_concurrency(
    tasks: &Walk<TaskEntry>,
    actors: &Walk<ActorEntry>,
    symbols: &SymbolIndex,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Tasks:");
    for entry in &tasks.entries {
        match entry {
            WalkEntry::Record(t) => {
                let state = if t.is_complete() {
                    "complete"
                } else if t.is_cancelled() {
                    "cancelled"
                } else if t.is_running() {
                    "running"
                } else {
                    "suspended"
                };
                let _ = writeln!(
                    out,
                    "  task {} at {:#x}: {}, fn={}",
                    t.id,
                    t.address,
                    state,
                    symbolize(symbols, t.function)
                );
            }
            WalkEntry::Error(e) => {
                let _ = writeln!(out, "  error: {}", e);
            }
        }
    }

    let _ = writeln!(out, "Actors:");
    for entry in &actors.entries {
        match entry {
            WalkEntry::Record(a) => {
                let _ = writeln!(
                    out,
                    "  actor at {:#x}: flags={:#x}, queue depth {}",
                    a.address, a.flags, a.queue_len
                );
            }
            WalkEntry::Error(e) => {
                let _ = writeln!(out, "  error: {}", e);
            }
        }
    }

    let _ = writeln!(
        out,
        "{} tasks, {} actors, {} errors{}",
        tasks.record_count(),
        actors.record_count(),
        tasks.error_count() + actors.error_count(),
        if tasks.cancelled || actors.cancelled {
            " (walk cancelled)"
        } else {
            ""
        }
    );
    out
}
