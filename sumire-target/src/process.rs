//! ターゲットプロセスへのアタッチ
//!
//! ptraceでアタッチし、停止を確認してから読み取りを開始します。
//! デタッチはDropで保証されるため、ウォークがどのように終了しても
//! ターゲットは再開されます。

use crate::errors::TargetError;
use crate::images::{self, Image};
use crate::memory::Memory;
use std::fs::File;
use std::io::Read as _;
use std::path::Path;
use sumire_meta::PointerWidth;
use tracing::debug;

/// 検査対象のリモートプロセス
///
/// アタッチ中はターゲットが停止します。読み取りハンドル・イメージ一覧・
/// ポインタ幅はアタッチ時に確定し、以後不変です。
pub struct RemoteProcess {
    pid: nix::unistd::Pid,
    memory: Memory,
    images: Vec<Image>,
    pointer_width: PointerWidth,
}

impl RemoteProcess {
    /// 既存のプロセスにアタッチする
    ///
    /// プロセスが存在しない場合と、locate後に終了していた場合
    /// （レース）、権限がない場合をそれぞれ区別して報告します。
    #[cfg(target_os = "linux")]
    pub fn attach(pid: i32) -> Result<Self, TargetError> {
        use nix::errno::Errno;
        use nix::sys::ptrace;
        use nix::sys::wait::{waitpid, WaitStatus};

        if !Path::new(&format!("/proc/{}", pid)).exists() {
            return Err(TargetError::NoSuchProcess(pid));
        }

        let nix_pid = nix::unistd::Pid::from_raw(pid);
        match ptrace::attach(nix_pid) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Err(TargetError::ProcessVanished(pid)),
            Err(Errno::EPERM) => return Err(TargetError::PermissionDenied(pid)),
            Err(e) => return Err(TargetError::Sys(e)),
        }

        // アタッチ後の停止を待つ
        match waitpid(nix_pid, None) {
            Ok(WaitStatus::Stopped(_, _)) => {}
            Ok(WaitStatus::Exited(_, _)) => return Err(TargetError::ProcessVanished(pid)),
            Ok(_) => {}
            Err(e) => {
                let _ = ptrace::detach(nix_pid, None);
                return Err(TargetError::Sys(e));
            }
        }

        let pointer_width = match detect_pointer_width(pid) {
            Ok(w) => w,
            Err(e) => {
                let _ = ptrace::detach(nix_pid, None);
                return Err(e);
            }
        };
        let images = match images::load_images(pid) {
            Ok(imgs) => imgs,
            Err(e) => {
                let _ = ptrace::detach(nix_pid, None);
                return Err(e);
            }
        };

        debug!(pid, ?pointer_width, images = images.len(), "attached");

        Ok(Self {
            pid: nix_pid,
            memory: Memory::new(pid, pointer_width),
            images,
            pointer_width,
        })
    }

    /// このプラットフォームではアタッチできない
    #[cfg(not(target_os = "linux"))]
    pub fn attach(_pid: i32) -> Result<Self, TargetError> {
        Err(TargetError::Unsupported)
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// ターゲットのポインタ幅を取得する
    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer_width
    }

    /// ロード済みイメージの一覧をマッピング順で取得する
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// メモリ読み取りハンドルを取得する
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// 一時的な読み取り失敗に対する最大再試行回数を設定する
    pub fn set_read_retries(&mut self, retries: u32) {
        self.memory.set_max_retries(retries);
    }
}

impl Drop for RemoteProcess {
    fn drop(&mut self) {
        #[cfg(target_os = "linux")]
        {
            let _ = nix::sys::ptrace::detach(self.pid, None);
        }
    }
}

/// 実行ファイルのELFヘッダからポインタ幅を判定する
fn detect_pointer_width(pid: i32) -> Result<PointerWidth, TargetError> {
    let exe_path = format!("/proc/{}/exe", pid);
    let mut file = File::open(&exe_path)?;
    let mut ident = [0u8; 5];
    file.read_exact(&mut ident)?;

    if &ident[0..4] != b"\x7fELF" {
        return Err(TargetError::BadImage(exe_path));
    }

    // e_ident[EI_CLASS]: 1 = ELFCLASS32, 2 = ELFCLASS64
    match ident[4] {
        1 => Ok(PointerWidth::W32),
        2 => Ok(PointerWidth::W64),
        _ => Err(TargetError::BadImage(exe_path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pointer_width_of_self() {
        let width = detect_pointer_width(std::process::id() as i32)
            .expect("own executable should be ELF");
        // テストは64bit環境で動作する前提
        assert_eq!(width.size(), std::mem::size_of::<usize>());
    }

    #[test]
    fn test_attach_to_nonexistent_pid() {
        // pid 0 は /proc に現れない
        match RemoteProcess::attach(0) {
            Err(TargetError::NoSuchProcess(0)) => {}
            Err(TargetError::Unsupported) => {}
            other => panic!("Expected NoSuchProcess, got {:?}", other.map(|p| p.pid())),
        }
    }
}
