#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A type-erased container for a single value of any type.
//!
//! ## Overview
//!
//! [`AnyValue`] holds at most one value whose concrete type is chosen at the
//! call site. It remembers just enough about that type to drop, copy and
//! move the value correctly, and to answer whether a later access names the
//! type actually stored.
//!
//! Unlike `Box<dyn Any>`, the container is generic over where the value
//! lives and over which transfers it supports:
//!
//! - Small values can be stored without any allocation.
//! - Values too large for the inline buffer fall back to the heap.
//! - Containers with different storages or policies can be assigned to each
//!   other.
//! - Swapping exchanges pointers when the storage allows it, and relocates
//!   values otherwise.
//!
//! ## Quick Example
//!
//! ```
//! use anyhold::prelude::*;
//!
//! let mut value: SmallAny = SmallAny::new();
//! value.emplace(42u32);
//! assert!(value.has_type::<u32>());
//! assert_eq!(value.downcast_ref::<u32>(), Some(&42));
//!
//! // Small payloads stay inline, large ones spill to the heap.
//! assert!(value.storage().is_local());
//! value.emplace([0u8; 64]);
//! assert!(value.storage().is_heap());
//!
//! // Containers with different storages can be copied into each other.
//! let copy: HeapAny = HeapAny::copied_from(&value);
//! assert_eq!(any_cast::<[u8; 64], _>(&copy), Some(&[0u8; 64]));
//! ```
//!
//! ## Container Type Parameters
//!
//! [`AnyValue<S, P, T>`] is generic over three parameters, each with a
//! sensible default:
//!
//! **Storage (`S`)** decides where the payload lives:
//! - [`SmallStorage`] (default): an inline buffer of two machine words minus
//!   one byte, falling back to the heap for anything larger or more strictly
//!   aligned
//! - [`HeapStorage`]: always one heap allocation per payload
//! - [`InlineStorage<N>`]: always inline in `N` bytes aligned to
//!   [`INLINE_ALIGN`]; a payload that does not fit is a programmer error and
//!   panics
//!
//! **Policy (`P`)** decides which payload transfers are available:
//! - [`CopyAndMove`] (default): copy and move; payloads must be [`Clone`]
//! - [`MoveOnly`]: move only
//! - [`NoCopyOrMove`]: values stay where they were emplaced
//!
//! Operations between two containers are available only if the weaker of
//! the two policies allows them.
//!
//! The copy operations of a payload are recorded when it is emplaced.
//! [`AnyValue::emplace`] records them only under [`CopyAndMove`], so a
//! payload emplaced under a weaker policy cannot be copied even after it
//! has been moved into a copyable container.
//! [`AnyValue::emplace_cloneable`] and its siblings record them under every
//! policy.
//!
//! **Thread safety (`T`)** decides which payloads are accepted:
//! - [`SendSync`] (default): only `Send + Sync` payloads; the container is
//!   `Send + Sync`
//! - [`Local`]: any `'static` payload; the container is neither
//!
//! See the [`markers`] module for details.
//!
//! ## Errors and Panics
//!
//! Accessing a value of the wrong type through [`AnyValue::value`] and
//! emplacing a value that does not fit an [`InlineStorage`] are programmer
//! errors and panic. [`AnyValue::downcast_ref`] and [`any_cast`] never fail;
//! they return `None` instead. [`AnyValue::take`] and
//! [`AnyValue::try_emplace`] report failures through the types in
//! [`error`].
//!
//! ## Runtime Type Lookup
//!
//! The [`registry`] module keeps a process-wide map from [`TypeInfo`] to
//! [`OperationTable`], allowing values to be default-constructed from a
//! type known only at runtime.
//!
//! ## Features
//!
//! - `std`: use `std::sync::RwLock` for the registry instead of a spin lock.
//! - `tracing`: emit `tracing` events when payloads spill to the heap,
//!   swaps fall back to relocation, unsupported operations are skipped, and
//!   the registry changes.
//!
//! For implementation details, see the [`anyhold-internals`] crate.
//!
//! [`anyhold-internals`]: anyhold_internals
//! [`CopyAndMove`]: crate::markers::CopyAndMove
//! [`MoveOnly`]: crate::markers::MoveOnly
//! [`NoCopyOrMove`]: crate::markers::NoCopyOrMove
//! [`SendSync`]: crate::markers::SendSync
//! [`Local`]: crate::markers::Local
//! [`InlineStorage<N>`]: crate::InlineStorage

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

pub mod error;
pub mod markers;
pub mod prelude;
pub mod registry;

mod any_value;
mod cast;

pub use anyhold_internals::{
    DEFAULT_SMALL_CAPACITY, HeapStorage, INLINE_ALIGN, InlineStorage, OperationTable,
    SmallState, SmallStorage, Storage, type_info::TypeInfo,
};

pub use self::{
    any_value::{AnyValue, CopyableAny, HeapAny, InlineAny, MovableAny, NonMovableAny, SmallAny},
    cast::{AnyLike, any_cast, any_cast_mut},
};
