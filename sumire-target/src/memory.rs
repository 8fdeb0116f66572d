//! リモートメモリ読み取り
//!
//! /proc/pid/mem を使用してターゲットプロセスのメモリを読み取ります。
//! /proc/pid/mem が使用できない領域（EIO）では PTRACE_PEEKDATA に
//! フォールバックします。短い読み取りは必ずエラーとして報告し、
//! ゼロ埋めして成功扱いすることはありません。

use std::fs::File;
use std::io::{Read as _, Seek, SeekFrom};
use sumire_meta::{PointerWidth, ReadError, RemoteReader};

/// 1回の読み取り試行の失敗
enum AttemptError {
    /// 要求より少ないバイト数で入力が尽きた
    Short(usize),
    /// I/Oエラー
    Io(std::io::Error),
}

impl AttemptError {
    /// スケジューラ起因の一時的な失敗かどうか
    fn is_transient(&self) -> bool {
        match self {
            AttemptError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
            ),
            AttemptError::Short(_) => false,
        }
    }
}

/// リモートメモリアクセス
pub struct Memory {
    pid: nix::unistd::Pid,
    width: PointerWidth,
    /// 一時的な失敗に対する再試行回数
    max_retries: u32,
}

impl Memory {
    /// メモリアクセスを作成する
    pub fn new(pid: i32, width: PointerWidth) -> Self {
        Self {
            pid: nix::unistd::Pid::from_raw(pid),
            width,
            max_retries: 0,
        }
    }

    /// 一時的な失敗に対する最大再試行回数を設定する
    pub fn set_max_retries(&mut self, retries: u32) {
        self.max_retries = retries;
    }

    /// /proc/pid/mem のパスを取得する
    fn mem_path(&self) -> String {
        format!("/proc/{}/mem", self.pid)
    }

    /// メモリからデータを読み取る
    ///
    /// 読み取れたバイト数が要求と一致しない場合は `ReadError::Short` を
    /// 返します。一時的な失敗は設定された回数まで再試行します。
    pub fn read_bytes(&self, addr: u64, size: usize) -> Result<Vec<u8>, ReadError> {
        let mut last = None;
        for _ in 0..=self.max_retries {
            match self.read_once(addr, size) {
                Ok(data) => return Ok(data),
                Err(e) => {
                    if !e.is_transient() {
                        return Err(self.convert(e, addr, size));
                    }
                    last = Some(e);
                }
            }
        }

        // ここに来るのは再試行をすべて使い切った場合のみ
        let e = last.unwrap_or(AttemptError::Short(0));
        Err(self.convert(e, addr, size))
    }

    fn convert(&self, e: AttemptError, addr: u64, size: usize) -> ReadError {
        match e {
            AttemptError::Short(actual) => ReadError::Short {
                address: addr,
                requested: size,
                actual,
            },
            AttemptError::Io(e) => ReadError::Failed {
                address: addr,
                reason: e.to_string(),
            },
        }
    }

    /// 1回の読み取りを試行する
    fn read_once(&self, addr: u64, size: usize) -> Result<Vec<u8>, AttemptError> {
        match self.read_via_proc_mem(addr, size) {
            Ok(data) => Ok(data),
            Err(AttemptError::Io(e)) if e.raw_os_error() == Some(5) => {
                // EIO: /proc/pid/mem で読めない領域は ptrace にフォールバック
                self.read_via_ptrace(addr, size)
            }
            Err(e) => Err(e),
        }
    }

    /// /proc/pid/mem 経由でメモリを読み取る
    fn read_via_proc_mem(&self, addr: u64, size: usize) -> Result<Vec<u8>, AttemptError> {
        let mut file = File::open(self.mem_path()).map_err(AttemptError::Io)?;
        file.seek(SeekFrom::Start(addr)).map_err(AttemptError::Io)?;

        let mut buffer = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            let n = file.read(&mut buffer[filled..]).map_err(AttemptError::Io)?;
            if n == 0 {
                return Err(AttemptError::Short(filled));
            }
            filled += n;
        }

        Ok(buffer)
    }

    /// PTRACE_PEEKDATA を使用してメモリを読み取る
    ///
    /// /proc/pid/mem が使用できない場合のフォールバック。word単位で
    /// 読み取り、要求サイズに切り詰めます。
    #[cfg(target_os = "linux")]
    fn read_via_ptrace(&self, addr: u64, size: usize) -> Result<Vec<u8>, AttemptError> {
        use nix::sys::ptrace;

        let mut data = Vec::with_capacity(size);
        let word_size = std::mem::size_of::<usize>();

        for offset in (0..size).step_by(word_size) {
            let word_addr = (addr + offset as u64) as *mut std::ffi::c_void;
            let word = ptrace::read(self.pid, word_addr).map_err(|e| {
                AttemptError::Io(std::io::Error::from_raw_os_error(e as i32))
            })?;

            let bytes = word.to_ne_bytes();
            let remaining = size - offset;
            let copy_size = remaining.min(word_size);
            data.extend_from_slice(&bytes[..copy_size]);
        }

        data.truncate(size);
        Ok(data)
    }

    #[cfg(not(target_os = "linux"))]
    fn read_via_ptrace(&self, _addr: u64, _size: usize) -> Result<Vec<u8>, AttemptError> {
        Err(AttemptError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "ptrace fallback is not available on this platform",
        )))
    }
}

/// デコーダとウォーカーが使用する読み取りケイパビリティの実装
impl RemoteReader for Memory {
    fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, ReadError> {
        self.read_bytes(address, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 自プロセスの /proc/self/mem は ptrace なしで読める
    #[test]
    fn test_read_own_memory() {
        static DATA: [u8; 8] = [0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe];

        let memory = Memory::new(std::process::id() as i32, PointerWidth::W64);
        let addr = DATA.as_ptr() as u64;
        let bytes = memory.read_bytes(addr, 8).expect("self read should succeed");
        assert_eq!(bytes, DATA);
    }

    #[test]
    fn test_read_unmapped_address_is_error() {
        let memory = Memory::new(std::process::id() as i32, PointerWidth::W64);

        // ページ0は通常マッピングされない
        match memory.read_bytes(0x10, 8) {
            Err(ReadError::Short { .. }) | Err(ReadError::Failed { .. }) => {}
            Ok(_) => panic!("Expected error reading unmapped address"),
        }
    }

    #[test]
    fn test_typed_reads_through_trait() {
        static VALUE: u64 = 0x0123_4567_89ab_cdef;

        let memory = Memory::new(std::process::id() as i32, PointerWidth::W64);
        let addr = &VALUE as *const u64 as u64;
        assert_eq!(memory.read_u64(addr).unwrap(), VALUE);
        assert_eq!(memory.read_ptr(addr).unwrap(), VALUE);
    }
}
