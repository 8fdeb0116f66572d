//! シンボル解決機能
//!
//! ターゲットにロードされたイメージのエクスポートシンボルを、ロード先
//! アドレスに合わせてリベースした索引を構築します。ルートシンボルの
//! 正引きと、バックトレースのアドレス逆引きに使用します。

use crate::Result;
use object::{Object, ObjectSymbol};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// シンボル情報
#[derive(Debug, Clone)]
pub struct Symbol {
    /// マングルされたシンボル名
    pub name: String,
    /// デマングルされたシンボル名（可読な形式）
    pub demangled_name: String,
    pub address: u64,
    pub size: u64,
}

impl Symbol {
    /// シンボルを作成し、デマングルされた名前を設定する
    pub fn new(name: String, address: u64, size: u64) -> Self {
        let demangled_name = demangle_symbol(&name);
        Self {
            name,
            demangled_name,
            address,
            size,
        }
    }

    /// 表示用の名前を取得する
    pub fn display_name(&self) -> &str {
        &self.demangled_name
    }
}

/// シンボル名をデマングルする
fn demangle_symbol(name: &str) -> String {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", demangled);
    }
    name.to_string()
}

/// アドレス逆引きの結果
#[derive(Debug, Clone)]
pub struct ResolvedAddress<'a> {
    /// 直前のエクスポートシンボル
    pub symbol: &'a Symbol,
    /// シンボル先頭からのオフセット
    pub offset: u64,
}

/// シンボル索引
pub struct SymbolIndex {
    /// シンボル名 -> アドレスのマップ
    by_name: HashMap<String, u64>,
    /// アドレス順のシンボル列
    by_address: Vec<Symbol>,
}

impl SymbolIndex {
    /// 空の索引を作成する
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_address: Vec::new(),
        }
    }

    /// イメージファイルのシンボルテーブルを索引に取り込む
    ///
    /// PIE/共有オブジェクトの場合はロードベースを加算してリベースします。
    pub fn add_image(&mut self, path: &Path, base: u64) -> Result<()> {
        let data = std::fs::read(path)?;
        let file = object::File::parse(&*data)?;

        // 位置独立イメージはロード先にリベースする
        let bias = match file.kind() {
            object::ObjectKind::Dynamic => base,
            _ => 0,
        };

        let mut added = 0usize;
        for symbol in file.symbols().chain(file.dynamic_symbols()) {
            if !symbol.is_definition() {
                continue;
            }
            if let Ok(name) = symbol.name() {
                if name.is_empty() {
                    continue;
                }
                self.push(Symbol::new(
                    name.to_string(),
                    bias + symbol.address(),
                    symbol.size(),
                ));
                added += 1;
            }
        }

        debug!(path = %path.display(), base, added, "indexed image symbols");
        self.finish();
        Ok(())
    }

    /// (名前, アドレス, サイズ) の列から索引を構築する
    pub fn from_entries(entries: Vec<(String, u64, u64)>) -> Self {
        let mut index = Self::new();
        for (name, address, size) in entries {
            index.push(Symbol::new(name, address, size));
        }
        index.finish();
        index
    }

    fn push(&mut self, symbol: Symbol) {
        self.by_name
            .entry(symbol.name.clone())
            .or_insert(symbol.address);
        self.by_address.push(symbol);
    }

    /// アドレス順にソートし、重複を除去する
    fn finish(&mut self) {
        self.by_address
            .sort_by(|a, b| (a.address, &a.name).cmp(&(b.address, &b.name)));
        self.by_address
            .dedup_by(|a, b| a.address == b.address && a.name == b.name);
    }

    /// シンボル名からアドレスを解決する
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    /// アドレスから直前のシンボルを逆引きする
    ///
    /// 解決できないアドレスは None を返し、呼び出し側が生の16進で
    /// 表示します（致命的エラーにはしません）。
    pub fn nearest(&self, addr: u64) -> Option<ResolvedAddress<'_>> {
        match self
            .by_address
            .binary_search_by_key(&addr, |s| s.address)
        {
            Ok(idx) => Some(ResolvedAddress {
                symbol: &self.by_address[idx],
                offset: 0,
            }),
            Err(idx) => {
                if idx > 0 {
                    let sym = &self.by_address[idx - 1];
                    let offset = addr - sym.address;
                    // サイズが分かっているシンボルの範囲外は未解決扱い
                    if sym.size > 0 && offset >= sym.size {
                        return None;
                    }
                    Some(ResolvedAddress {
                        symbol: sym,
                        offset,
                    })
                } else {
                    None
                }
            }
        }
    }

    /// 索引中のシンボル数を取得する
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    /// 索引が空かどうか
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// すべてのシンボルを取得する
    pub fn all_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.by_address.iter()
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}
