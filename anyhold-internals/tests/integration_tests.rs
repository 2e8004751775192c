//! Integration tests for the anyhold-internals crate.
//!
//! These tests drive [`RawAny`] through the public surface only, the way the
//! `anyhold` crate does:
//!
//! ## Lifecycle
//! - `test_assign_reset_assign_scenario`: emplace, in-place assignment,
//!   reset and re-emplace on every storage
//! - `test_drop_releases_payload`: dropping a container drops its payload
//!   exactly once
//! - `test_zero_sized_payloads`: unit-like payloads on every storage
//!
//! ## Cross-container transfers
//! - `test_copy_then_move_chain`: copy and move across all three storages
//! - `test_copy_keeps_values_independent`: copies never share state
//!
//! ## Swap
//! - `test_swap_twice_restores`: swapping twice restores both containers
//!
//! ## Operation tables
//! - `test_table_identity_and_slots`: tables are shared and report their
//!   slots
//! - `test_type_info_ordering_and_hash`: ordering and hashing of
//!   [`TypeInfo`]

use core::cell::Cell;
use std::{collections::BTreeSet, rc::Rc, string::String, vec::Vec};

use anyhold_internals::{
    DEFAULT_SMALL_CAPACITY, HeapStorage, InlineStorage, OperationTable, RawAny, SmallStorage,
    Storage, type_info::TypeInfo,
};

#[derive(Clone)]
struct DropCounter {
    drops: Rc<Cell<usize>>,
    label: &'static str,
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn put<S: Storage, X: Clone + 'static>(raw: &mut RawAny<S>, value: X) -> &mut X {
    // SAFETY: The table is created for `X`.
    unsafe { raw.emplace(value, OperationTable::of_cloneable::<X>()) }
}

fn assign<S: Storage, X: Clone + 'static>(raw: &mut RawAny<S>, value: X) {
    // SAFETY: The table is created for `X`.
    unsafe { raw.assign(value, OperationTable::of_cloneable::<X>()) }
}

fn assign_reset_assign<S: Storage>() {
    let mut raw = RawAny::<S>::new();
    assign(&mut raw, 5i32);
    let first = raw.data_ptr();
    assert_eq!(raw.downcast_ref::<i32>(), Some(&5));

    // In-place assignment keeps the address.
    assign(&mut raw, 6i32);
    assert_eq!(raw.data_ptr(), first);
    assert_eq!(raw.downcast_ref::<i32>(), Some(&6));

    raw.reset();
    assert!(!raw.has_value());
    assert!(raw.downcast_ref::<i32>().is_none());

    assign(&mut raw, 7i32);
    assert!(raw.has_type::<i32>());
    assert_eq!(raw.downcast_ref::<i32>(), Some(&7));
}

#[test]
fn test_assign_reset_assign_scenario() {
    assign_reset_assign::<HeapStorage>();
    assign_reset_assign::<InlineStorage<4>>();
    assign_reset_assign::<SmallStorage<DEFAULT_SMALL_CAPACITY>>();
}

fn drop_releases_payload<S: Storage>() {
    let drops = Rc::new(Cell::new(0));
    {
        let mut raw = RawAny::<S>::new();
        put(
            &mut raw,
            DropCounter {
                drops: Rc::clone(&drops),
                label: "a",
            },
        );
        assert_eq!(drops.get(), 0);
    }
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_drop_releases_payload() {
    drop_releases_payload::<HeapStorage>();
    drop_releases_payload::<InlineStorage<32>>();
    drop_releases_payload::<SmallStorage<DEFAULT_SMALL_CAPACITY>>();
    drop_releases_payload::<SmallStorage<1>>();
}

#[test]
fn test_zero_sized_payloads() {
    #[derive(Clone, Debug, PartialEq)]
    struct Unit;

    let mut heap = RawAny::<HeapStorage>::new();
    let mut inline = RawAny::<InlineStorage<0>>::new();
    let mut small = RawAny::<SmallStorage<DEFAULT_SMALL_CAPACITY>>::new();
    put(&mut heap, Unit);
    put(&mut inline, Unit);
    put(&mut small, Unit);

    assert_eq!(heap.downcast_ref::<Unit>(), Some(&Unit));
    assert_eq!(inline.downcast_ref::<Unit>(), Some(&Unit));
    assert!(small.storage().is_local());

    inline.move_from(&mut heap);
    assert!(!heap.has_value());
    heap.copy_from(&small);
    assert_eq!(heap.downcast_ref::<Unit>(), Some(&Unit));
}

#[test]
fn test_copy_then_move_chain() {
    let drops = Rc::new(Cell::new(0));
    let mut heap = RawAny::<HeapStorage>::new();
    let mut inline = RawAny::<InlineStorage<32>>::new();
    let mut small = RawAny::<SmallStorage<DEFAULT_SMALL_CAPACITY>>::new();

    put(
        &mut heap,
        DropCounter {
            drops: Rc::clone(&drops),
            label: "origin",
        },
    );

    inline.copy_from(&heap);
    small.move_from(&mut inline);
    assert!(!inline.has_value());
    assert!(small.storage().is_heap());
    assert_eq!(
        small.downcast_ref::<DropCounter>().map(|d| d.label),
        Some("origin")
    );

    heap.move_from(&mut small);
    assert!(!small.has_value());
    // The overwritten original and nothing else.
    assert_eq!(drops.get(), 1);

    drop(heap);
    assert_eq!(drops.get(), 2);
}

#[test]
fn test_copy_keeps_values_independent() {
    let mut a = RawAny::<SmallStorage<DEFAULT_SMALL_CAPACITY>>::new();
    let mut b = RawAny::<InlineStorage<64>>::new();
    put(&mut a, String::from("left"));
    b.copy_from(&a);

    a.downcast_mut::<String>()
        .expect("holds String")
        .push_str("-changed");
    assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("left-changed"));
    assert_eq!(b.downcast_ref::<String>().map(String::as_str), Some("left"));
}

fn swap_twice_restores<S: Storage>() {
    let mut a = RawAny::<S>::new();
    let mut b = RawAny::<S>::new();
    put(&mut a, 11u16);
    put(&mut b, Vec::from([1u8, 2, 3]));

    a.swap(&mut b);
    assert!(a.has_type::<Vec<u8>>());
    assert!(b.has_type::<u16>());
    a.swap(&mut b);
    assert_eq!(a.downcast_ref::<u16>(), Some(&11));
    assert_eq!(b.downcast_ref::<Vec<u8>>().map(Vec::len), Some(3));
}

#[test]
fn test_swap_twice_restores() {
    swap_twice_restores::<HeapStorage>();
    swap_twice_restores::<InlineStorage<32>>();
    swap_twice_restores::<SmallStorage<DEFAULT_SMALL_CAPACITY>>();
    swap_twice_restores::<SmallStorage<64>>();
}

#[test]
fn test_table_identity_and_slots() {
    let a = OperationTable::of::<String>();
    let b = OperationTable::of::<String>();
    assert!(core::ptr::eq(a, b));
    assert!(!a.can_copy_construct());
    assert!(!a.can_copy_assign());
    assert!(!a.can_default_construct());

    let c = OperationTable::of_cloneable_default::<String>();
    assert!(c.can_copy_construct());
    assert!(c.can_copy_assign());
    assert!(c.can_default_construct());
    assert_eq!(a.type_info(), c.type_info());
    assert_eq!(c.size(), core::mem::size_of::<String>());
}

#[test]
fn test_type_info_ordering_and_hash() {
    let u8_info = TypeInfo::of::<u8>();
    let string_info = TypeInfo::of::<String>();
    assert_eq!(u8_info, TypeInfo::of::<u8>());
    assert_ne!(u8_info, string_info);
    assert_eq!(u8_info.hash_code(), TypeInfo::of::<u8>().hash_code());
    assert_eq!(
        u8_info.before(&string_info),
        u8_info.name() < string_info.name()
    );

    let set: BTreeSet<TypeInfo> = [string_info, u8_info, TypeInfo::of::<u8>()]
        .into_iter()
        .collect();
    assert_eq!(set.len(), 2);
}
