//! Construction protocol suite.
//!
//! Storage sizing and zeroing over the whole kind set, name resolution, and
//! the no-allocation guarantee for unknown names.

#[macro_use]
mod common;

use aiobind::storage::CountingAllocator;
use aiobind::{AioContext, AioError, Capability, Kind, KindRegistry, LabEngine, ObjectState};
use common::*;
use proptest::prelude::*;
use std::sync::Arc;

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

#[test]
fn every_kind_constructs_exact_zeroed_storage() {
    init_test("every_kind_constructs_exact_zeroed_storage");
    let (cx, engine) = lab_context();
    let registry = KindRegistry::standard();
    assert_eq!(registry.len(), Kind::COUNT);

    for descriptor in registry.iter() {
        let obj = cx.construct(descriptor.kind).expect("construct");
        assert_with_log!(
            obj.storage().len() == descriptor.size,
            "storage size",
            descriptor.size,
            obj.storage().len()
        );
        assert!(obj.storage().is_zeroed(), "{} not zeroed", descriptor.kind);
        assert_eq!(obj.kind(), descriptor.kind);
        assert_eq!(obj.descriptor(), descriptor);
        assert_eq!(obj.state(), ObjectState::Constructed);
    }
    assert!(engine.calls().is_empty(), "construction never calls the engine");
    assert!(!cx.has_default_loop());
    test_complete!("every_kind_constructs_exact_zeroed_storage");
}

#[test]
fn name_and_type_name_construct_the_same_kind() {
    init_test("name_and_type_name_construct_the_same_kind");
    let (cx, _) = lab_context();
    for kind in Kind::ALL {
        let by_name = cx.construct_by_name(kind.name()).expect("short name");
        let by_type = cx.construct_by_name(kind.type_name()).expect("type name");
        assert_eq!(by_name.kind(), kind);
        assert_eq!(by_type.kind(), kind);
        assert_eq!(by_name.storage().len(), by_type.storage().len());
    }
    test_complete!("name_and_type_name_construct_the_same_kind");
}

#[test]
fn unknown_kind_fails_without_allocating() {
    init_test("unknown_kind_fails_without_allocating");
    let allocator = Arc::new(CountingAllocator::new());
    let cx = AioContext::builder()
        .engine(Arc::new(LabEngine::new()))
        .allocator(allocator.clone())
        .build();

    let err = cx
        .construct_by_name("nonexistent_kind")
        .expect_err("unknown kind");
    assert_with_log!(
        matches!(&err, AioError::KindNotFound { name } if name == "nonexistent_kind"),
        "kind not found",
        "KindNotFound(nonexistent_kind)",
        &err
    );
    assert_eq!(allocator.blocks(), 0);
    assert_eq!(allocator.bytes(), 0);

    cx.construct(Kind::Tcp).expect("known kind");
    assert_eq!(allocator.blocks(), 1);
    test_complete!("unknown_kind_fails_without_allocating");
}

#[test]
fn allocator_sees_declared_sizes() {
    let allocator = Arc::new(CountingAllocator::new());
    let cx = AioContext::builder()
        .engine(Arc::new(LabEngine::new()))
        .allocator(allocator.clone())
        .build();
    let expected: usize = cx.registry().iter().map(|d| d.size).sum();
    let objects: Vec<_> = Kind::ALL
        .iter()
        .map(|kind| cx.construct(*kind).expect("construct"))
        .collect();
    assert_eq!(allocator.blocks(), objects.len());
    assert_eq!(allocator.bytes(), expected);
}

#[test]
fn capabilities_cover_spec_classes() {
    let registry = KindRegistry::standard();
    let handles: Vec<_> = registry
        .lookup_by_capability(Capability::Handle)
        .map(|d| d.kind)
        .collect();
    assert!(handles.contains(&Kind::Tcp));
    assert!(handles.contains(&Kind::FsEvent));
    assert!(!handles.contains(&Kind::Write));

    let requests: Vec<_> = registry
        .lookup_by_capability(Capability::Request)
        .map(|d| d.kind)
        .collect();
    for kind in [
        Kind::Req,
        Kind::Connect,
        Kind::Write,
        Kind::Shutdown,
        Kind::UdpSend,
        Kind::Fs,
        Kind::Work,
        Kind::GetAddrInfo,
    ] {
        assert!(requests.contains(&kind), "{kind}");
    }
}

#[test]
fn registry_json_lists_every_kind() {
    let json = KindRegistry::standard().to_json().expect("json");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
    let entries = parsed.as_array().expect("array");
    assert_eq!(entries.len(), Kind::COUNT);
    assert_eq!(entries[0]["name"], "aio");
    assert!(entries.iter().any(|e| e["type_name"] == "aio_fs_event"));
}

proptest! {
    #[test]
    fn unregistered_names_never_construct(name in "[a-z_]{1,24}") {
        prop_assume!(Kind::from_name(&name).is_none());
        prop_assume!(Kind::from_type_name(&name).is_none());
        let (cx, _) = lab_context();
        let result = cx.construct_by_name(&name);
        prop_assert!(
            matches!(&result, Err(AioError::KindNotFound { name: n }) if *n == name),
            "unexpected result for {}", name
        );
    }

    #[test]
    fn construct_is_independent_per_call(index in 0usize..Kind::COUNT, repeats in 1usize..6) {
        let kind = Kind::ALL[index];
        let (cx, _) = lab_context();
        let objects: Vec<_> = (0..repeats)
            .map(|_| cx.construct(kind).expect("construct"))
            .collect();
        for obj in &objects {
            prop_assert!(obj.storage().is_zeroed());
            prop_assert_eq!(obj.kind(), kind);
        }
    }
}
