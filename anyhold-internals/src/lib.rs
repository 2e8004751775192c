#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]
#![deny(missing_copy_implementations)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`anyhold`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased data structures and unsafe
//! operations that power the [`anyhold`] value container. It provides the
//! storage strategies, the per-type operation tables and the raw container
//! that ties the two together.
//!
//! **This crate is an implementation detail.** No semantic versioning guarantees
//! are provided. Users should depend on the [`anyhold`] crate, not this one.
//!
//! # Architecture
//!
//! - **[`type_info`]**: [`TypeInfo`], a comparable and hashable identity for a
//!   concrete type.
//! - **[`operations`]**: [`OperationTable`], a `'static` table of function
//!   pointers built once per payload type. Slots a type cannot support are
//!   stored as absent markers.
//! - **[`storage`]**: the [`Storage`] trait and its three implementations,
//!   [`HeapStorage`], [`InlineStorage`] and [`SmallStorage`].
//! - **[`raw`]**: [`RawAny`], which owns one storage instance plus a reference
//!   to the operation table describing the value inside it, and implements
//!   the emplace/reset/copy/move/swap protocol.
//!
//! # Safety Strategy
//!
//! Type erasure means that the bytes inside a storage instance can only be
//! interpreted through the operation table that was recorded when they were
//! written. This crate maintains safety through:
//!
//! - **Module-based encapsulation**: the `operations` field of [`RawAny`] is
//!   private to the [`raw`] module, and the only way to set it is together
//!   with writing a value of the matching type.
//! - **Static tables**: operation tables are created as `&'static`
//!   references whose function pointers are instantiated with the same type
//!   as the layout and [`TypeInfo`] they report.
//! - **Documented storage contract**: [`Storage`] is an `unsafe trait`, and
//!   every implementation documents how it upholds the address and alignment
//!   guarantees the container relies on.
//!
//! [`anyhold`]: https://docs.rs/anyhold/latest/anyhold/
//! [`TypeInfo`]: type_info::TypeInfo
//! [`OperationTable`]: operations::OperationTable
//! [`Storage`]: storage::Storage
//! [`HeapStorage`]: storage::HeapStorage
//! [`InlineStorage`]: storage::InlineStorage
//! [`SmallStorage`]: storage::SmallStorage

extern crate alloc;

#[macro_use]
mod trace;

pub mod operations;
mod raw;
pub mod storage;
pub mod type_info;

pub use operations::OperationTable;
pub use raw::RawAny;
pub use storage::{
    DEFAULT_SMALL_CAPACITY, HeapStorage, INLINE_ALIGN, InlineStorage, SmallState, SmallStorage,
    Storage,
};
pub use type_info::TypeInfo;
