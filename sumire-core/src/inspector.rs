//! インスペクタのメインロジック
//!
//! アタッチ、ルートシンボルの解決、ウォークの起動、レポート整形を
//! 束ねます。アタッチが済むとレイアウトテーブル・シンボル索引・
//! ディスクリプタキャッシュが確定し、以後の各ダンプで再利用されます。

use crate::command::{BacktraceStyle, DumpKind};
use crate::errors::{ERR_ROOT_SYMBOL_MISSING, ERR_UNKNOWN_ABI_VERSION};
use crate::report;
use crate::Result;
use sumire_meta::layout::roots;
use sumire_meta::{AbiVersion, DescriptorCache, LayoutTable, RemoteReader, SymbolIndex};
use sumire_target::RemoteProcess;
use sumire_walk::{CancelToken, GraphWalker};
use tracing::{debug, warn};

/// リモートプロセスのインスペクタ
///
/// RemoteProcessを所有するため、インスペクタのdropでデタッチが
/// 保証されます。
pub struct Inspector {
    process: RemoteProcess,
    layout: &'static LayoutTable,
    descriptors: DescriptorCache,
    symbols: SymbolIndex,
    cancel: CancelToken,
}

impl Inspector {
    /// プロセスにアタッチしてインスペクタを作成する
    pub fn attach(pid: i32) -> Result<Self> {
        let process = RemoteProcess::attach(pid)?;

        // イメージのエクスポートシンボルを索引化する
        let mut symbols = SymbolIndex::new();
        for image in process.images() {
            // 読めないイメージ（削除済みファイルなど）は読み飛ばす
            if let Err(e) = symbols.add_image(&image.path, image.base) {
                debug!(path = %image.path.display(), error = %e, "skipping image");
            }
        }

        let version = read_abi_version(&process, &symbols);
        let layout = LayoutTable::select(version, process.pointer_width());

        Ok(Self {
            process,
            layout,
            descriptors: DescriptorCache::new(),
            symbols,
            cancel: CancelToken::new(),
        })
    }

    /// 一時的な読み取り失敗に対する最大再試行回数を設定する
    pub fn set_read_retries(&mut self, retries: u32) {
        self.process.set_read_retries(retries);
    }

    /// ウォーク中断用のトークンを取得する
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.process.pid()
    }

    /// シンボル索引を取得する
    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }

    /// ルートシンボルをアドレスに解決する
    fn root(&self, name: &str) -> Result<u64> {
        self.symbols
            .resolve(name)
            .ok_or_else(|| anyhow::anyhow!("{}: {}", ERR_ROOT_SYMBOL_MISSING, name))
    }

    /// ダンプを実行して整形済みレポートを返す
    pub fn dump(&self, kind: DumpKind, backtrace: Option<BacktraceStyle>) -> Result<String> {
        let walker = GraphWalker::new(self.process.memory(), self.layout, &self.descriptors)
            .with_cancel(self.cancel.clone());
        let root = self.root(kind.root_symbol())?;

        match kind {
            DumpKind::ConformanceCache => {
                let walk = walker.walk_conformance_cache(root)?;
                Ok(report::format_conformances(&walk))
            }
            DumpKind::RawMetadata => {
                let walk = walker.walk_metadata_pool(root)?;
                Ok(report::format_pool(&walk))
            }
            DumpKind::GenericMetadata => {
                let walk = walker.walk_generic_metadata(root)?;
                Ok(report::format_generic(&walk))
            }
            DumpKind::CacheNodes => {
                let walk = walker.walk_cache_nodes(root)?;
                Ok(report::format_cache_nodes(&walk))
            }
            DumpKind::Arrays => {
                let walk = walker.walk_allocations(root, backtrace.is_some())?;
                Ok(report::format_allocations(&walk, backtrace, &self.symbols))
            }
            DumpKind::Concurrency => {
                let tasks = walker.walk_tasks(root)?;
                let actor_root = self.root(roots::ACTOR_REGISTRY)?;
                let actors = walker.walk_actors(actor_root)?;
                Ok(report::format_concurrency(&tasks, &actors, &self.symbols))
            }
        }
    }
}

/// ターゲットのABIバージョンを読み取る
///
/// バージョンシンボルがない場合は現行バージョンとみなします。未知の
/// 値は警告を出し、既知の最新レイアウトでベストエフォートのデコードを
/// 続けます。
fn read_abi_version(process: &RemoteProcess, symbols: &SymbolIndex) -> AbiVersion {
    let addr = match symbols.resolve(roots::ABI_VERSION) {
        Some(addr) => addr,
        None => {
            debug!("no ABI version symbol, assuming current");
            return AbiVersion::CURRENT;
        }
    };

    match process.memory().read_u32(addr) {
        Ok(raw) => match AbiVersion::from_raw(raw) {
            Some(version) => version,
            None => {
                warn!(raw, "{}", ERR_UNKNOWN_ABI_VERSION);
                AbiVersion::CURRENT
            }
        },
        Err(e) => {
            warn!(error = %e, "could not read ABI version");
            AbiVersion::CURRENT
        }
    }
}
