//! プロセス探索機能
//!
//! pidまたはプロセス名の部分文字列からターゲットプロセスを特定します。

use std::fs;
use std::path::Path;
use thiserror::Error;

/// 名前マッチの候補
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCandidate {
    pub pid: i32,
    pub name: String,
}

/// プロセス探索のエラー
#[derive(Debug, Error)]
pub enum LocateError {
    /// パターンに一致するプロセスがない
    #[error("no process found matching {0:?}")]
    NotFound(String),

    /// パターンが複数のプロセスに一致した（呼び出し側が方針を決める）
    #[error("pattern {pattern:?} matches {} processes", .candidates.len())]
    Ambiguous {
        pattern: String,
        candidates: Vec<ProcessCandidate>,
    },

    /// プロセス一覧の取得に失敗した
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// pidまたは名前の部分文字列からプロセスを特定する
///
/// パターンが整数としてパースでき、そのpidのプロセスが存在する場合は
/// 名前マッチを行わず即座にそのpidを返します。それ以外は全プロセスを
/// 列挙して名前の部分一致で絞り込み、一意に決まらなければ候補一覧を
/// 返します。
pub fn locate(pattern: &str) -> Result<i32, LocateError> {
    // まず完全なpidとして解釈を試みる
    if let Ok(pid) = pattern.trim().parse::<i32>() {
        if pid > 0 && Path::new(&format!("/proc/{}", pid)).exists() {
            return Ok(pid);
        }
    }

    let mut candidates = enumerate()?;
    candidates.retain(|c| c.name.contains(pattern));
    candidates.sort_by_key(|c| c.pid);

    match candidates.len() {
        0 => Err(LocateError::NotFound(pattern.to_string())),
        1 => Ok(candidates[0].pid),
        _ => Err(LocateError::Ambiguous {
            pattern: pattern.to_string(),
            candidates,
        }),
    }
}

/// 生存中のプロセスを列挙する
///
/// 列挙中に消えたプロセスのエントリは読み飛ばします。
pub fn enumerate() -> Result<Vec<ProcessCandidate>, LocateError> {
    let mut out = Vec::new();

    for entry in fs::read_dir("/proc")? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let pid: i32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        // comm はプロセス名（末尾に改行）
        let comm_path = format!("/proc/{}/comm", pid);
        let name = match fs::read_to_string(&comm_path) {
            Ok(s) => s.trim_end().to_string(),
            Err(_) => continue,
        };

        out.push(ProcessCandidate { pid, name });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_by_exact_pid() {
        let own_pid = std::process::id() as i32;
        let located = locate(&own_pid.to_string()).expect("own pid should be located");
        assert_eq!(located, own_pid);
    }

    #[test]
    fn test_locate_nonexistent_name() {
        match locate("no-such-process-name-xyzzy") {
            Err(LocateError::NotFound(pattern)) => {
                assert_eq!(pattern, "no-such-process-name-xyzzy");
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_enumerate_includes_self() {
        let own_pid = std::process::id() as i32;
        let procs = enumerate().expect("enumerate should succeed");
        assert!(procs.iter().any(|c| c.pid == own_pid));
    }
}
