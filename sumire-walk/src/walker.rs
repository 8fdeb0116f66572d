//! グラフウォーカー本体
//!
//! 走査に必要なコンテキスト（リーダー・レイアウト・ディスクリプタ
//! キャッシュ・中断トークン・ステップ上限）を束ねます。各ウォークの
//! 実装はレコード種別ごとのモジュールにあります。

use crate::cancel::CancelToken;
use crate::walk::DEFAULT_MAX_STEPS;
use sumire_meta::{DescriptorCache, LayoutTable, RemoteReader};

/// グラフウォーカー
///
/// ひとつのアタッチメントに対して作成します。ウォーカー自身は状態を
/// 持たず、訪問済み集合は各ウォークがローカルに保持します。
pub struct GraphWalker<'a> {
    pub(crate) reader: &'a dyn RemoteReader,
    pub(crate) layout: &'static LayoutTable,
    pub(crate) descriptors: &'a DescriptorCache,
    pub(crate) cancel: CancelToken,
    pub(crate) max_steps: usize,
}

impl<'a> GraphWalker<'a> {
    /// 新しいウォーカーを作成する
    pub fn new(
        reader: &'a dyn RemoteReader,
        layout: &'static LayoutTable,
        descriptors: &'a DescriptorCache,
    ) -> Self {
        Self {
            reader,
            layout,
            descriptors,
            cancel: CancelToken::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// 中断トークンを設定する
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// ステップ上限を設定する
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// 中断トークンを取得する
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}
