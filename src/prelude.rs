//! Commonly used items for convenient importing.
//!
//! The prelude re-exports the container types, the free cast functions and
//! the [`markers`] module, so most code needs a single use statement.
//!
//! # Usage
//!
//! ```rust
//! use anyhold::prelude::*;
//!
//! let mut value: SmallAny<markers::MoveOnly> = SmallAny::new();
//! value.emplace(String::from("hello"));
//! assert_eq!(any_cast::<String, _>(&value).map(String::as_str), Some("hello"));
//! ```
//!
//! # What's Included
//!
//! - **[`AnyValue`]** and its aliases [`HeapAny`], [`InlineAny`],
//!   [`SmallAny`], [`CopyableAny`], [`MovableAny`] and [`NonMovableAny`]
//! - **[`any_cast`]** and **[`any_cast_mut`]**, with the [`AnyLike`] trait
//! - **[`TypeInfo`]**: the identity of a payload type
//! - **[`markers`]**: capability policy and thread-safety markers

pub use crate::{
    AnyLike, AnyValue, CopyableAny, HeapAny, InlineAny, MovableAny, NonMovableAny, SmallAny,
    TypeInfo, any_cast, any_cast_mut, markers,
};
