//! バイナリレイアウトテーブル
//!
//! ターゲットランタイムのメタデータレコードのフィールドオフセットを定義します。
//! オフセットはABIバージョンとポインタ幅（32/64bit）ごとのテーブルで管理し、
//! デコード処理の呼び出し側にハードコードしません。

/// ターゲットプロセスのポインタ幅
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    /// 32bitターゲット
    W32,
    /// 64bitターゲット
    W64,
}

impl PointerWidth {
    /// ポインタのバイト数を取得する
    pub const fn size(self) -> usize {
        match self {
            PointerWidth::W32 => 4,
            PointerWidth::W64 => 8,
        }
    }
}

/// ターゲットランタイムのABIバージョン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiVersion {
    V1,
}

impl AbiVersion {
    /// 現在サポートする最新バージョン
    pub const CURRENT: AbiVersion = AbiVersion::V1;

    /// リモートメモリ上のバージョン値からABIバージョンを判定する
    pub fn from_raw(raw: u32) -> Option<AbiVersion> {
        match raw {
            1 => Some(AbiVersion::V1),
            _ => None,
        }
    }
}

/// ジェネリックパラメータ数の上限（これを超える宣言は破損とみなす）
pub const MAX_GENERIC_ARGS: u32 = 32;

/// 型名の最大バイト数
pub const MAX_NAME_BYTES: usize = 512;

/// コンフォーマンスキャッシュのバケット数上限
pub const MAX_BUCKETS: u32 = 1 << 20;

/// バックトレースフレーム数の上限
pub const MAX_BACKTRACE_FRAMES: u32 = 512;

/// ルート配列（ジェネリックルート・アロケーション登録簿）のエントリ数上限
pub const MAX_ROOT_ENTRIES: u32 = 1 << 16;

/// ターゲットランタイムがエクスポートする既知のルートシンボル名
pub mod roots {
    /// コンフォーマンスキャッシュのルート
    pub const CONFORMANCE_CACHE: &str = "__rtmd_conformance_cache";
    /// メタデータアロケーションプールのルート
    pub const METADATA_POOL: &str = "__rtmd_metadata_pool";
    /// メタデータキャッシュノードリストのルート
    pub const METADATA_CACHE: &str = "__rtmd_metadata_cache";
    /// ジェネリックメタデータルート配列
    pub const GENERIC_ROOTS: &str = "__rtmd_generic_roots";
    /// アロケーション登録簿
    pub const ALLOC_REGISTRY: &str = "__rtmd_alloc_registry";
    /// 並行タスク登録簿
    pub const TASK_REGISTRY: &str = "__rtmd_task_registry";
    /// アクター登録簿
    pub const ACTOR_REGISTRY: &str = "__rtmd_actor_registry";
    /// ABIバージョン値（u32）
    pub const ABI_VERSION: &str = "__rtmd_abi_version";
}

/// レイアウトテーブル
///
/// 各レコード種別のフィールドオフセット（レコード先頭からのバイト数）と
/// レコードサイズを保持します。すべてリトルエンディアンです。
#[derive(Debug)]
pub struct LayoutTable {
    pub version: AbiVersion,
    pub width: PointerWidth,

    // 型ディスクリプタ
    pub desc_kind: usize,
    pub desc_flags: usize,
    pub desc_name: usize,
    pub desc_field_count: usize,
    pub desc_generic_count: usize,
    pub desc_size: usize,

    // メタデータインスタンス（ディスクリプタポインタ + 末尾のジェネリック引数配列）
    pub inst_descriptor: usize,
    pub inst_args: usize,

    // コンフォーマンスレコード
    pub conf_type: usize,
    pub conf_protocol: usize,
    pub conf_witness: usize,
    pub conf_size: usize,

    // コンフォーマンスキャッシュのヘッダとチェーンエントリ
    pub cache_buckets: usize,
    pub cache_bucket_count: usize,
    pub cache_entry_count: usize,
    pub entry_next: usize,
    pub entry_record: usize,

    // メタデータプール
    pub pool_head: usize,
    pub pool_count: usize,
    pub node_next: usize,
    pub node_tag: usize,
    pub node_size: usize,
    pub node_payload: usize,

    // メタデータキャッシュノード
    pub cnode_next: usize,
    pub cnode_key: usize,
    pub cnode_value: usize,

    // ジェネリックメタデータルート配列
    pub groots_count: usize,
    pub groots_entries: usize,

    // アロケーション登録簿とスロット
    pub alloc_count: usize,
    pub alloc_slots: usize,
    pub slot_payload: usize,
    pub slot_size: usize,
    pub slot_metadata: usize,
    pub slot_backtrace: usize,
    pub slot_frames: usize,
    pub slot_stride: usize,

    // タスクレコード
    pub task_next: usize,
    pub task_id: usize,
    pub task_fn: usize,
    pub task_flags: usize,

    // アクターレコード
    pub actor_next: usize,
    pub actor_flags: usize,
    pub actor_queue: usize,
}

impl LayoutTable {
    /// ABIバージョン1のレイアウトを構築する
    const fn v1(width: PointerWidth) -> LayoutTable {
        let pw = width.size();
        LayoutTable {
            version: AbiVersion::V1,
            width,

            desc_kind: 0,
            desc_flags: 4,
            desc_name: 8,
            desc_field_count: 8 + pw,
            desc_generic_count: 12 + pw,
            desc_size: 16 + pw,

            inst_descriptor: 0,
            inst_args: pw,

            conf_type: 0,
            conf_protocol: pw,
            conf_witness: 2 * pw,
            conf_size: 3 * pw,

            cache_buckets: 0,
            cache_bucket_count: pw,
            cache_entry_count: pw + 4,
            entry_next: 0,
            entry_record: pw,

            pool_head: 0,
            pool_count: pw,
            node_next: 0,
            node_tag: pw,
            node_size: pw + 4,
            node_payload: pw + 8,

            cnode_next: 0,
            cnode_key: pw,
            cnode_value: 2 * pw,

            groots_count: 0,
            groots_entries: pw,

            alloc_count: 0,
            alloc_slots: pw,
            slot_payload: 0,
            slot_size: pw,
            slot_metadata: pw + 8,
            slot_backtrace: 2 * pw + 8,
            slot_frames: 3 * pw + 8,
            slot_stride: 3 * pw + 16,

            task_next: 0,
            task_id: pw,
            task_fn: pw + 8,
            task_flags: 2 * pw + 8,

            actor_next: 0,
            actor_flags: pw,
            actor_queue: pw + 4,
        }
    }

    /// バージョンとポインタ幅からレイアウトテーブルを選択する
    pub fn select(version: AbiVersion, width: PointerWidth) -> &'static LayoutTable {
        match (version, width) {
            (AbiVersion::V1, PointerWidth::W32) => &LAYOUT_V1_W32,
            (AbiVersion::V1, PointerWidth::W64) => &LAYOUT_V1_W64,
        }
    }

    /// ポインタのバイト数を取得する
    pub fn pointer_size(&self) -> usize {
        self.width.size()
    }
}

static LAYOUT_V1_W32: LayoutTable = LayoutTable::v1(PointerWidth::W32);
static LAYOUT_V1_W64: LayoutTable = LayoutTable::v1(PointerWidth::W64);
