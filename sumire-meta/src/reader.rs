//! リモートメモリ読み取りの抽象化
//!
//! デコーダとウォーカーはこのトレイトを通じてターゲットのアドレス空間を
//! 読み取ります。実装はプラットフォーム側のクレートが提供します。

use crate::errors::ReadError;
use crate::layout::PointerWidth;

/// リモートプロセスのアドレス空間を読み取るケイパビリティ
///
/// 読み取りは常にブロッキングで、ターゲットのメモリを変更しません。
/// 要求サイズに満たない読み取りは実装側で `ReadError::Short` として
/// 報告する契約です。
pub trait RemoteReader {
    /// ターゲットのポインタ幅を取得する
    fn pointer_width(&self) -> PointerWidth;

    /// 指定アドレスから指定バイト数を読み取る
    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, ReadError>;

    /// u8値を読み取る
    fn read_u8(&self, address: u64) -> Result<u8, ReadError> {
        let bytes = self.read(address, 1)?;
        Ok(bytes[0])
    }

    /// u32値を読み取る（リトルエンディアン）
    fn read_u32(&self, address: u64) -> Result<u32, ReadError> {
        let bytes = self.read(address, 4)?;
        let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| ReadError::Short {
            address,
            requested: 4,
            actual: bytes.len(),
        })?;
        Ok(u32::from_le_bytes(arr))
    }

    /// u64値を読み取る（リトルエンディアン）
    fn read_u64(&self, address: u64) -> Result<u64, ReadError> {
        let bytes = self.read(address, 8)?;
        let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| ReadError::Short {
            address,
            requested: 8,
            actual: bytes.len(),
        })?;
        Ok(u64::from_le_bytes(arr))
    }

    /// ポインタ値を読み取る（ターゲットのポインタ幅に従う）
    fn read_ptr(&self, address: u64) -> Result<u64, ReadError> {
        match self.pointer_width() {
            PointerWidth::W32 => Ok(self.read_u32(address)? as u64),
            PointerWidth::W64 => self.read_u64(address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// アドレス→バイト列のスパースマップによるテスト用リーダー
    struct MapReader {
        width: PointerWidth,
        bytes: BTreeMap<u64, u8>,
    }

    impl MapReader {
        fn new(width: PointerWidth) -> Self {
            Self {
                width,
                bytes: BTreeMap::new(),
            }
        }

        fn put(&mut self, address: u64, data: &[u8]) {
            for (i, b) in data.iter().enumerate() {
                self.bytes.insert(address + i as u64, *b);
            }
        }
    }

    impl RemoteReader for MapReader {
        fn pointer_width(&self) -> PointerWidth {
            self.width
        }

        fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, ReadError> {
            let mut out = Vec::with_capacity(len);
            for i in 0..len {
                match self.bytes.get(&(address + i as u64)) {
                    Some(b) => out.push(*b),
                    None => {
                        return Err(ReadError::Short {
                            address,
                            requested: len,
                            actual: i,
                        })
                    }
                }
            }
            Ok(out)
        }
    }

    #[test]
    fn test_read_u32_u64() {
        let mut mem = MapReader::new(PointerWidth::W64);
        mem.put(0x1000, &0xdead_beefu32.to_le_bytes());
        mem.put(0x2000, &0x1122_3344_5566_7788u64.to_le_bytes());

        assert_eq!(mem.read_u32(0x1000).unwrap(), 0xdead_beef);
        assert_eq!(mem.read_u64(0x2000).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_read_ptr_width() {
        let mut mem32 = MapReader::new(PointerWidth::W32);
        mem32.put(0x100, &0xaabb_ccddu32.to_le_bytes());
        assert_eq!(mem32.read_ptr(0x100).unwrap(), 0xaabb_ccdd);

        let mut mem64 = MapReader::new(PointerWidth::W64);
        mem64.put(0x100, &0x1_0000_0000u64.to_le_bytes());
        assert_eq!(mem64.read_ptr(0x100).unwrap(), 0x1_0000_0000);
    }

    #[test]
    fn test_short_read_is_error() {
        let mut mem = MapReader::new(PointerWidth::W64);
        mem.put(0x1000, &[1, 2, 3]);

        match mem.read(0x1000, 8) {
            Err(ReadError::Short {
                address,
                requested,
                actual,
            }) => {
                assert_eq!(address, 0x1000);
                assert_eq!(requested, 8);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected short read error, got {:?}", other),
        }
    }
}
