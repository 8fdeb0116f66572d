//! テスト用の合成リモートメモリ
//!
//! スパースなアドレスマップの上に、レイアウトテーブルに従って
//! ランタイム構造をエンコードするビルダー。

use std::collections::BTreeMap;
use sumire_meta::{LayoutTable, PointerWidth, ReadError, RemoteReader};

/// 合成リモートメモリ
pub struct FakeMemory {
    width: PointerWidth,
    bytes: BTreeMap<u64, u8>,
}

impl FakeMemory {
    pub fn new(width: PointerWidth) -> Self {
        Self {
            width,
            bytes: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, address: u64, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            self.bytes.insert(address + i as u64, *b);
        }
    }

    pub fn put_u32(&mut self, address: u64, v: u32) {
        self.put(address, &v.to_le_bytes());
    }

    pub fn put_u64(&mut self, address: u64, v: u64) {
        self.put(address, &v.to_le_bytes());
    }

    pub fn put_ptr(&mut self, address: u64, v: u64) {
        match self.width {
            PointerWidth::W32 => self.put(address, &(v as u32).to_le_bytes()),
            PointerWidth::W64 => self.put(address, &v.to_le_bytes()),
        }
    }

    pub fn put_cstr(&mut self, address: u64, s: &str) {
        self.put(address, s.as_bytes());
        self.put(address + s.len() as u64, &[0]);
    }

    /// 型ディスクリプタをエンコードする
    pub fn put_descriptor(
        &mut self,
        layout: &LayoutTable,
        address: u64,
        tag: u32,
        name_addr: u64,
        name: &str,
        generic_count: u32,
    ) {
        self.put_u32(address + layout.desc_kind as u64, tag);
        self.put_u32(address + layout.desc_flags as u64, 0);
        self.put_ptr(address + layout.desc_name as u64, name_addr);
        self.put_u32(address + layout.desc_field_count as u64, 0);
        self.put_u32(address + layout.desc_generic_count as u64, generic_count);
        self.put_cstr(name_addr, name);
    }

    /// メタデータインスタンスをエンコードする
    pub fn put_instance(
        &mut self,
        layout: &LayoutTable,
        address: u64,
        descriptor: u64,
        args: &[u64],
    ) {
        let pw = layout.pointer_size() as u64;
        self.put_ptr(address + layout.inst_descriptor as u64, descriptor);
        for (i, arg) in args.iter().enumerate() {
            self.put_ptr(address + layout.inst_args as u64 + i as u64 * pw, *arg);
        }
    }

    /// コンフォーマンスキャッシュのチェーンエントリをエンコードする
    pub fn put_cache_entry(
        &mut self,
        layout: &LayoutTable,
        address: u64,
        next: u64,
        type_metadata: u64,
        protocol: u64,
        witness: u64,
    ) {
        self.put_ptr(address + layout.entry_next as u64, next);
        let rec = address + layout.entry_record as u64;
        self.put_ptr(rec + layout.conf_type as u64, type_metadata);
        self.put_ptr(rec + layout.conf_protocol as u64, protocol);
        self.put_ptr(rec + layout.conf_witness as u64, witness);
    }

    /// コンフォーマンスキャッシュのヘッダとバケット配列をエンコードする
    pub fn put_cache_header(
        &mut self,
        layout: &LayoutTable,
        address: u64,
        buckets_addr: u64,
        bucket_heads: &[u64],
        entry_count: u32,
    ) {
        let pw = layout.pointer_size() as u64;
        self.put_ptr(address + layout.cache_buckets as u64, buckets_addr);
        self.put_u32(
            address + layout.cache_bucket_count as u64,
            bucket_heads.len() as u32,
        );
        self.put_u32(address + layout.cache_entry_count as u64, entry_count);
        for (i, head) in bucket_heads.iter().enumerate() {
            self.put_ptr(buckets_addr + i as u64 * pw, *head);
        }
    }

    /// アロケーションスロットをエンコードする
    #[allow(clippy::too_many_arguments)]
    pub fn put_alloc_slot(
        &mut self,
        layout: &LayoutTable,
        address: u64,
        payload: u64,
        size: u64,
        metadata: u64,
        backtrace: u64,
        frame_count: u32,
    ) {
        self.put_ptr(address + layout.slot_payload as u64, payload);
        self.put_u64(address + layout.slot_size as u64, size);
        self.put_ptr(address + layout.slot_metadata as u64, metadata);
        self.put_ptr(address + layout.slot_backtrace as u64, backtrace);
        self.put_u32(address + layout.slot_frames as u64, frame_count);
    }
}

impl RemoteReader for FakeMemory {
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

/// プリミティブ型参照の引数ワードを作る
pub fn primitive_arg(code: u32) -> u64 {
    ((code as u64) << 1) | 1
}
