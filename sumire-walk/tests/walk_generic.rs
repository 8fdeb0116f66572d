//! ジェネリックメタデータウォークのテスト

mod common;

use common::{primitive_arg, FakeMemory};
use sumire_meta::{AbiVersion, DescriptorCache, LayoutTable, PointerWidth, TypeKind};
use sumire_walk::{GraphWalker, MetaNode};

fn layout64() -> &'static LayoutTable {
    LayoutTable::select(AbiVersion::V1, PointerWidth::W64)
}

/// ルート配列をエンコードする
fn put_roots(mem: &mut FakeMemory, layout: &LayoutTable, address: u64, roots: &[u64]) {
    let pw = layout.pointer_size() as u64;
    mem.put_u32(address + layout.groots_count as u64, roots.len() as u32);
    for (i, r) in roots.iter().enumerate() {
        mem.put_ptr(address + layout.groots_entries as u64 + i as u64 * pw, *r);
    }
}

#[test]
fn test_nested_instantiation_tree() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    // Array<Dictionary<Int, Element>> に相当する木
    mem.put_descriptor(layout, 0x4000, 0, 0x9000, "Array", 1);
    mem.put_descriptor(layout, 0x4100, 0, 0x9100, "Dictionary", 2);
    mem.put_descriptor(layout, 0x4200, 1, 0x9200, "Element", 0);

    mem.put_instance(layout, 0x5200, 0x4200, &[]);
    mem.put_instance(layout, 0x5100, 0x4100, &[primitive_arg(3), 0x5200]);
    mem.put_instance(layout, 0x5000, 0x4000, &[0x5100]);

    put_roots(&mut mem, layout, 0x6000, &[0x5000]);

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors);
    let walk = walker.walk_generic_metadata(0x6000).unwrap();

    assert!(!walk.cancelled);
    assert_eq!(walk.roots.len(), 1);
    assert_eq!(walk.instance_count(), 3);
    assert_eq!(walk.failure_count(), 0);

    match &walk.roots[0] {
        MetaNode::Instance {
            type_name,
            kind,
            children,
            ..
        } => {
            assert_eq!(type_name, "Array");
            assert_eq!(*kind, TypeKind::Struct);
            assert_eq!(children.len(), 1);

            match &children[0] {
                MetaNode::Instance {
                    type_name, children, ..
                } => {
                    assert_eq!(type_name, "Dictionary");
                    assert_eq!(children.len(), 2);
                    assert!(matches!(&children[0], MetaNode::Primitive { .. }));
                    match &children[1] {
                        MetaNode::Instance { type_name, .. } => {
                            assert_eq!(type_name, "Element")
                        }
                        other => panic!("Expected Element instance, got {:?}", other),
                    }
                }
                other => panic!("Expected Dictionary instance, got {:?}", other),
            }
        }
        other => panic!("Expected Array instance, got {:?}", other),
    }
}

#[test]
fn test_self_referential_argument_terminates() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    // 自分自身をジェネリック引数に持つインスタンス
    mem.put_descriptor(layout, 0x4000, 1, 0x9000, "Recursive", 1);
    mem.put_instance(layout, 0x5000, 0x4000, &[0x5000]);
    put_roots(&mut mem, layout, 0x6000, &[0x5000]);

    let descriptors = DescriptorCache::new();
    // ステップ上限を小さくして、上限内で終わることも確認する
    let walker = GraphWalker::new(&mem, layout, &descriptors).with_max_steps(16);
    let walk = walker.walk_generic_metadata(0x6000).unwrap();

    assert_eq!(walk.instance_count(), 1);
    match &walk.roots[0] {
        MetaNode::Instance { children, .. } => {
            assert_eq!(children.len(), 1);
            match &children[0] {
                MetaNode::AlreadyVisited { address } => assert_eq!(*address, 0x5000),
                other => panic!("Expected AlreadyVisited edge, got {:?}", other),
            }
        }
        other => panic!("Expected root instance, got {:?}", other),
    }
}

#[test]
fn test_shared_subtree_marked_on_second_root() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    mem.put_descriptor(layout, 0x4000, 0, 0x9000, "Shared", 0);
    mem.put_descriptor(layout, 0x4100, 0, 0x9100, "Box", 1);

    mem.put_instance(layout, 0x5000, 0x4000, &[]);
    mem.put_instance(layout, 0x5100, 0x4100, &[0x5000]);

    // ルート配列に共有ノードと、それを参照するノードの両方が載る
    put_roots(&mut mem, layout, 0x6000, &[0x5000, 0x5100]);

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors);
    let walk = walker.walk_generic_metadata(0x6000).unwrap();

    assert_eq!(walk.roots.len(), 2);
    match &walk.roots[1] {
        MetaNode::Instance { children, .. } => {
            assert!(matches!(
                &children[0],
                MetaNode::AlreadyVisited { address: 0x5000 }
            ));
        }
        other => panic!("Expected Box instance, got {:?}", other),
    }
}

#[test]
fn test_broken_argument_fails_only_that_branch() {
    let layout = layout64();
    let mut mem = FakeMemory::new(PointerWidth::W64);

    mem.put_descriptor(layout, 0x4000, 0, 0x9000, "Pair", 2);
    mem.put_descriptor(layout, 0x4100, 0, 0x9100, "Good", 0);

    mem.put_instance(layout, 0x5100, 0x4100, &[]);
    // 引数[0]は未マップ領域、引数[1]は正常
    mem.put_instance(layout, 0x5000, 0x4000, &[0xdead_0000, 0x5100]);
    put_roots(&mut mem, layout, 0x6000, &[0x5000]);

    let descriptors = DescriptorCache::new();
    let walker = GraphWalker::new(&mem, layout, &descriptors);
    let walk = walker.walk_generic_metadata(0x6000).unwrap();

    assert_eq!(walk.instance_count(), 2);
    assert_eq!(walk.failure_count(), 1);

    match &walk.roots[0] {
        MetaNode::Instance { children, .. } => {
            assert!(matches!(&children[0], MetaNode::Failed { .. }));
            assert!(matches!(&children[1], MetaNode::Instance { .. }));
        }
        other => panic!("Expected root instance, got {:?}", other),
    }
}
