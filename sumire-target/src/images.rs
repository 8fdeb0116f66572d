//! ロード済みイメージの列挙
//!
//! /proc/pid/maps を解析して、ターゲットにロードされたイメージ
//! （実行ファイル・共有ライブラリ）とそのベースアドレスを列挙します。

use crate::errors::TargetError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// ロード済みイメージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// イメージファイルのパス
    pub path: PathBuf,
    /// ロード先ベースアドレス
    pub base: u64,
}

/// ターゲットのイメージ一覧をマッピング順で取得する
///
/// 各イメージについて最初のマッピング（ファイルオフセット0）の開始
/// アドレスをベースとします。匿名マッピングや疑似エントリ
/// （[heap] など）は含めません。
pub fn load_images(pid: i32) -> Result<Vec<Image>, TargetError> {
    let maps_path = format!("/proc/{}/maps", pid);
    let file = File::open(&maps_path)?;
    let reader = BufReader::new(file);

    let mut images: Vec<Image> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        // フォーマット: "address perms offset dev inode pathname"
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            continue;
        }

        let pathname = parts[5];
        if !pathname.starts_with('/') {
            continue;
        }

        // ファイルオフセット0のマッピングだけがイメージ先頭
        let offset = u64::from_str_radix(parts[2], 16).unwrap_or(u64::MAX);
        if offset != 0 {
            continue;
        }

        let path = PathBuf::from(pathname);
        if images.iter().any(|img| img.path == path) {
            continue;
        }

        let start_str = match parts[0].split('-').next() {
            Some(s) => s,
            None => continue,
        };
        let base = match u64::from_str_radix(start_str, 16) {
            Ok(v) => v,
            Err(_) => continue,
        };

        images.push(Image { path, base });
    }

    Ok(images)
}
