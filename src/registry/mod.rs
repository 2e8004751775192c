//! Process-wide registry of operation tables.
//!
//! The registry maps a [`TypeInfo`] to the [`OperationTable`] of its type, so
//! that code which only knows a type at runtime (by its [`TypeInfo`] or by
//! name) can still create and inspect values of it:
//!
//! ```
//! use anyhold::{
//!     SmallAny, TypeInfo,
//!     markers::{CopyAndMove, Local},
//!     registry,
//! };
//!
//! #[derive(Clone, Default)]
//! struct Settings {
//!     retries: u8,
//! }
//!
//! registry::register_cloneable::<Settings>();
//!
//! let table = registry::lookup(TypeInfo::of::<Settings>()).unwrap();
//! let mut value: SmallAny<CopyAndMove, Local> = SmallAny::new();
//! assert!(value.emplace_default_from(table));
//! assert_eq!(value.value::<Settings>().retries, 0);
//! ```
//!
//! Registering a type again replaces its entry. Tables are `'static`, so a
//! reference obtained from the registry stays valid after the entry is
//! replaced or removed.
//!
//! The registry is guarded by a read-write lock: [`std::sync::RwLock`] when
//! the `std` feature is enabled, a spin lock otherwise.

use alloc::vec::Vec;

use anyhold_internals::{OperationTable, type_info::TypeInfo};
use hashbrown::HashMap;

use self::table_lock::TableLock;

mod table_lock;

/// Map from type identity to operation table.
type TableMap = HashMap<TypeInfo, &'static OperationTable, rustc_hash::FxBuildHasher>;

/// The registered tables.
static TABLES: TableLock<TableMap> = TableLock::new();

/// Registers the table of `X`, built with a default-construct operation.
///
/// Returns the previously registered table for `X`, if any.
pub fn register<X: Default + 'static>() -> Option<&'static OperationTable> {
    register_table(OperationTable::of_default::<X>())
}

/// Registers the table of `X`, built with default-construct and copy
/// operations.
///
/// Returns the previously registered table for `X`, if any.
pub fn register_cloneable<X: Clone + Default + 'static>() -> Option<&'static OperationTable> {
    register_table(OperationTable::of_cloneable_default::<X>())
}

/// Registers an arbitrary table under its own [`TypeInfo`].
///
/// Returns the previously registered table for the same type, if any.
pub fn register_table(table: &'static OperationTable) -> Option<&'static OperationTable> {
    let type_info = table.type_info();
    let previous = TABLES
        .write()
        .get()
        .get_or_insert_with(TableMap::default)
        .insert(type_info, table);

    debug_event!(
        type_name = type_info.name(),
        replaced = previous.is_some(),
        "registered operation table"
    );
    previous
}

/// Removes the table registered for `type_info`, returning it.
pub fn unregister(type_info: TypeInfo) -> Option<&'static OperationTable> {
    let removed = TABLES.write().get().as_mut()?.remove(&type_info);
    debug_event!(
        type_name = type_info.name(),
        removed = removed.is_some(),
        "unregistered operation table"
    );
    removed
}

/// Returns the table registered for `type_info`.
pub fn lookup(type_info: TypeInfo) -> Option<&'static OperationTable> {
    TABLES.read().get()?.get(&type_info).copied()
}

/// Returns a table registered for a type with the given name.
///
/// Names are not guaranteed to be unique across types. If several
/// registered types share the name, any one of their tables is returned.
///
/// ```
/// use anyhold::registry;
///
/// registry::register::<u64>();
/// let table = registry::lookup_by_name("u64").unwrap();
/// assert_eq!(table.size(), 8);
/// ```
pub fn lookup_by_name(name: &str) -> Option<&'static OperationTable> {
    TABLES
        .read()
        .get()?
        .values()
        .find(|table| table.type_info().name() == name)
        .copied()
}

/// Calls `f` with every registered table, in unspecified order.
///
/// The tables are collected before `f` runs, so `f` may itself register or
/// unregister types.
pub fn for_each_registered<F: FnMut(&'static OperationTable)>(mut f: F) {
    let tables: Vec<&'static OperationTable> = match TABLES.read().get() {
        Some(map) => map.values().copied().collect(),
        None => Vec::new(),
    };
    for table in tables {
        f(table);
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::String, vec::Vec};

    use super::*;
    use crate::{
        HeapAny,
        markers::{CopyAndMove, Local},
    };

    // Tests share the global registry and run in parallel, so each test
    // registers its own types.

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Registered(u32);

    #[derive(Default)]
    struct Replaced;

    #[derive(Default)]
    struct Removed;

    #[derive(Default)]
    struct Listed;

    #[test]
    fn test_register_and_lookup() {
        assert!(lookup(TypeInfo::of::<Registered>()).is_none());
        assert!(register_cloneable::<Registered>().is_none());

        let table = lookup(TypeInfo::of::<Registered>()).expect("registered");
        assert!(table.can_copy_construct());
        assert!(table.can_default_construct());

        let by_name = lookup_by_name(core::any::type_name::<Registered>()).expect("registered");
        assert!(core::ptr::eq(table, by_name));

        let mut value: HeapAny<CopyAndMove, Local> = HeapAny::new();
        assert!(value.emplace_default_from(table));
        assert_eq!(value.value::<Registered>().0, 0);
        value.value_mut::<Registered>().0 = 4;
        let copy = value.clone();
        assert_eq!(copy.value::<Registered>().0, 4);
    }

    #[test]
    fn test_register_replaces() {
        assert!(register::<Replaced>().is_none());
        let previous = register_table(OperationTable::of::<Replaced>()).expect("replaced");
        assert!(previous.can_default_construct());

        let current = lookup(TypeInfo::of::<Replaced>()).expect("registered");
        assert!(!current.can_default_construct());
    }

    #[test]
    fn test_unregister() {
        register::<Removed>();
        assert!(unregister(TypeInfo::of::<Removed>()).is_some());
        assert!(lookup(TypeInfo::of::<Removed>()).is_none());
        assert!(unregister(TypeInfo::of::<Removed>()).is_none());
    }

    #[test]
    fn test_for_each_registered() {
        register::<Listed>();
        register::<String>();

        let mut names = Vec::new();
        for_each_registered(|table| names.push(table.type_info().name()));
        assert!(names.contains(&core::any::type_name::<Listed>()));
        assert!(names.contains(&core::any::type_name::<String>()));

        // Registering from inside the callback does not deadlock.
        for_each_registered(|table| {
            if table.type_info().is::<Listed>() {
                register_table(table);
            }
        });
        assert!(lookup(TypeInfo::of::<Listed>()).is_some());
    }
}
