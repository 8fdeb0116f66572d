//! コンフォーマンスキャッシュウォークのテスト

mod common;

use common::FakeMemory;
use sumire_meta::{AbiVersion, DescriptorCache, LayoutTable, PointerWidth};
use sumire_walk::{CancelToken, GraphWalker, WalkEntry, WalkError};

fn layout64() -> &'static LayoutTable {
    LayoutTable::select(AbiVersion::V1, PointerWidth::W64)
}

/// 型とプロトコルのペアをひとつ用意する
///
/// 戻り値は (型インスタンス, プロトコルディスクリプタ) のアドレス。
fn setup_pair(
    mem: &mut FakeMemory,
    layout: &LayoutTable,
    base: u64,
    type_name: &str,
    proto_name: &str,
) -> (u64, u64) {
    let type_desc = base;
    let proto_desc = base + 0x100;
    let instance = base + 0x200;

    mem.put_descriptor(layout, type_desc, 0, base + 0x300, type_name, 0);
    mem.put_descriptor(layout, proto_desc, 3, base + 0x400, proto_name, 0);
    mem.put_instance(layout, instance, type_desc, &[]);

    (instance, proto_desc)
}

#[test]
fn test_round_trip_in_bucket_order() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    let (inst_a, proto_a) = setup_pair(&mut mem, layout, 0x1_0000, "Alpha", "ProtoA");
    let (inst_b, proto_b) = setup_pair(&mut mem, layout, 0x2_0000, "Beta", "ProtoB");
    let (inst_c, proto_c) = setup_pair(&mut mem, layout, 0x3_0000, "Gamma", "ProtoC");

    // バケット0: B -> C のチェーン、バケット1: 空、バケット2: A
    mem.put_cache_entry(layout, 0x8000, 0x8100, inst_b, proto_b, 0xb000);
    mem.put_cache_entry(layout, 0x8100, 0, inst_c, proto_c, 0xc000);
    mem.put_cache_entry(layout, 0x8200, 0, inst_a, proto_a, 0xa000);
    mem.put_cache_header(layout, 0x7000, 0x7100, &[0x8000, 0, 0x8200], 3);

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors);
    let walk = walker.walk_conformance_cache(0x7000).unwrap();

    assert!(!walk.cancelled);
    assert_eq!(walk.error_count(), 0);

    // 格納順（バケット順、チェーンは先頭から）で、重複も欠落もない
    let names: Vec<(&str, &str, u64)> = walk
        .records()
        .map(|r| (r.type_name.as_str(), r.protocol_name.as_str(), r.witness))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Beta", "ProtoB", 0xb000),
            ("Gamma", "ProtoC", 0xc000),
            ("Alpha", "ProtoA", 0xa000),
        ]
    );

    let buckets: Vec<u32> = walk.records().map(|r| r.bucket).collect();
    assert_eq!(buckets, vec![0, 0, 2]);
}

#[test]
fn test_chain_cycle_terminates_with_marker() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    let (inst, proto) = setup_pair(&mut mem, layout, 0x1_0000, "Looper", "ProtoL");

    // エントリがお互いを指し合う循環チェーン
    mem.put_cache_entry(layout, 0x8000, 0x8100, inst, proto, 0x1111);
    mem.put_cache_entry(layout, 0x8100, 0x8000, inst, proto, 0x2222);
    mem.put_cache_header(layout, 0x7000, 0x7100, &[0x8000], 2);

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors);
    let walk = walker.walk_conformance_cache(0x7000).unwrap();

    // 2レコードの後に循環マーカーで終端する
    assert_eq!(walk.record_count(), 2);
    match walk.entries.last() {
        Some(WalkEntry::Error(WalkError::AlreadyVisited { address })) => {
            assert_eq!(*address, 0x8000);
        }
        other => panic!("Expected AlreadyVisited terminator, got {:?}", other),
    }
}

#[test]
fn test_corrupted_record_does_not_abort_walk() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    let (inst_a, proto_a) = setup_pair(&mut mem, layout, 0x1_0000, "Alpha", "ProtoA");
    let (inst_b, proto_b) = setup_pair(&mut mem, layout, 0x2_0000, "Beta", "ProtoB");

    // 中央のエントリの型メタデータが未マップ領域を指す
    mem.put_cache_entry(layout, 0x8000, 0x8100, inst_a, proto_a, 0xa000);
    mem.put_cache_entry(layout, 0x8100, 0x8200, 0xdead_0000, proto_a, 0xbad0);
    mem.put_cache_entry(layout, 0x8200, 0, inst_b, proto_b, 0xb000);
    mem.put_cache_header(layout, 0x7000, 0x7100, &[0x8000], 3);

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors);
    let walk = walker.walk_conformance_cache(0x7000).unwrap();

    // 破損したレコードはエラーエントリになり、後続は走査される
    assert_eq!(walk.record_count(), 2);
    assert_eq!(walk.error_count(), 1);

    let names: Vec<&str> = walk.records().map(|r| r.type_name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);
}

#[test]
fn test_unreadable_header_fails_the_walk() {
    let layout = layout64();
    let mem = FakeMemory::new(PointerWidth::W64);

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors);
    assert!(walker.walk_conformance_cache(0x7000).is_err());
}

#[test]
fn test_cancelled_walk_stops_early() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    let (inst, proto) = setup_pair(&mut mem, layout, 0x1_0000, "Alpha", "ProtoA");
    mem.put_cache_entry(layout, 0x8000, 0, inst, proto, 0xa000);
    mem.put_cache_header(layout, 0x7000, 0x7100, &[0x8000], 1);

    let token = CancelToken::new();
    token.cancel();

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors).with_cancel(token);
    let walk = walker.walk_conformance_cache(0x7000).unwrap();

    assert!(walk.cancelled);
    assert_eq!(walk.record_count(), 0);
}
