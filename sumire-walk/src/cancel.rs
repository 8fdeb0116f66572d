//! ウォークの中断トークン

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 走査中断のトークン
///
/// ウォーカーは各ステップでこのトークンを確認し、中断が要求されたら
/// それまでの結果を保持したまま走査を打ち切ります。トークンはクローン
/// してシグナルハンドラなどに渡せます。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// 新しいトークンを作成する
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 中断を要求する
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// 中断が要求されているかどうか
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
