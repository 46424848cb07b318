// idb - instrumentation debugger for Rust
// Copyright (C) 2025 idb contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Depth-bounded inspection of typed values.
//!
//! [`Inspect`] is the runtime's window into a captured variable: rendering
//! with a depth budget, element/field access for UI path queries, and byte
//! detection for byte-string display. Injected call sites capture locals as
//! `&dyn Inspect`, so dispatch on the value's compile-time type happens at
//! the trait impl, and the formatter itself stays type-agnostic.
//!
//! The crate implements the trait for primitives, strings, options,
//! references and owning pointers, sequences, atomics, and function
//! pointers. User types opt in with [`inspect_struct!`], [`inspect_enum!`],
//! or the generic [`inspect_debug!`] fallback.

pub mod path;
mod render;

pub use render::{
    format_one_line, format_value, render_sequence, render_str, render_struct, short_type_name,
    Sink, DEBUG_FALLBACK_CAP, FORMAT_LIMIT, SEQUENCE_LIMIT, STRING_TRUNCATE,
    STRUCT_COLLAPSE_FIELDS,
};

use std::any::type_name;

/// A value the debugger can render and navigate.
pub trait Inspect {
    /// Full type name; display code shortens it with [`short_type_name`].
    fn type_name(&self) -> &'static str;

    /// Writes a rendering into `out`. Primitives print at any depth;
    /// containers at depth zero print only their short type name.
    fn render(&self, out: &mut Sink<'_>, depth: usize, indent: usize);

    /// Named field access, for structs.
    fn field(&self, _name: &str) -> Option<&dyn Inspect> {
        None
    }

    /// Positional element access, for sequences.
    fn element(&self, _index: usize) -> Option<&dyn Inspect> {
        None
    }

    /// Element count, for sequences.
    fn len(&self) -> Option<usize> {
        None
    }

    /// Number of named fields, for structs. Guards path access into
    /// pathologically wide types.
    fn field_count(&self) -> usize {
        0
    }

    /// The value a path query should see instead of this one: pointers
    /// yield their pointee, `Some(x)` yields `x`. Unwrapping does not
    /// consume path depth.
    fn transparent(&self) -> Option<&dyn Inspect> {
        None
    }

    /// `Some(byte)` for `u8` only; lets sequence rendering recognise byte
    /// strings through the trait object.
    fn as_byte(&self) -> Option<u8> {
        None
    }
}

macro_rules! impl_inspect_display {
    ($($ty:ty),* $(,)?) => {$(
        impl Inspect for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
                out.write_fmt(format_args!("{self}"));
            }
        }
    )*};
}

impl_inspect_display!(
    i8, i16, i32, i64, i128, isize, u16, u32, u64, u128, usize, f32, f64, bool
);

impl Inspect for u8 {
    fn type_name(&self) -> &'static str {
        "u8"
    }

    fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
        out.write_fmt(format_args!("{self}"));
    }

    fn as_byte(&self) -> Option<u8> {
        Some(*self)
    }
}

impl Inspect for char {
    fn type_name(&self) -> &'static str {
        "char"
    }

    fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
        out.write_fmt(format_args!("{self:?}"));
    }
}

impl Inspect for () {
    fn type_name(&self) -> &'static str {
        "()"
    }

    fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
        out.push_str("()");
    }
}

impl Inspect for &str {
    fn type_name(&self) -> &'static str {
        "&str"
    }

    fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
        render_str(out, self);
    }
}

impl Inspect for String {
    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
        render_str(out, self);
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn render(&self, out: &mut Sink<'_>, depth: usize, indent: usize) {
        match self {
            None => out.push_str("None"),
            Some(value) => value.render(out, depth, indent),
        }
    }

    fn field(&self, name: &str) -> Option<&dyn Inspect> {
        self.as_ref().and_then(|v| v.field(name))
    }

    fn element(&self, index: usize) -> Option<&dyn Inspect> {
        self.as_ref().and_then(|v| v.element(index))
    }

    fn len(&self) -> Option<usize> {
        self.as_ref().and_then(Inspect::len)
    }

    fn field_count(&self) -> usize {
        self.as_ref().map_or(0, Inspect::field_count)
    }

    fn transparent(&self) -> Option<&dyn Inspect> {
        self.as_ref().map(|v| v as &dyn Inspect)
    }
}

// Pointer-to-one: dereference and recurse one level down. The macro only
// supplies the shared method bodies; each impl header stays explicit.
macro_rules! inspect_deref_methods {
    () => {
        fn type_name(&self) -> &'static str {
            type_name::<Self>()
        }

        fn render(&self, out: &mut Sink<'_>, depth: usize, indent: usize) {
            (**self).render(out, depth.saturating_sub(1), indent)
        }

        fn field(&self, name: &str) -> Option<&dyn Inspect> {
            (**self).field(name)
        }

        fn element(&self, index: usize) -> Option<&dyn Inspect> {
            (**self).element(index)
        }

        fn len(&self) -> Option<usize> {
            (**self).len()
        }

        fn field_count(&self) -> usize {
            (**self).field_count()
        }

        fn transparent(&self) -> Option<&dyn Inspect> {
            Some(&**self)
        }

        fn as_byte(&self) -> Option<u8> {
            (**self).as_byte()
        }
    };
}

impl<T: Inspect> Inspect for &T {
    inspect_deref_methods!();
}

impl<T: Inspect> Inspect for &mut T {
    inspect_deref_methods!();
}

impl<T: Inspect> Inspect for Box<T> {
    inspect_deref_methods!();
}

impl<T: Inspect> Inspect for std::rc::Rc<T> {
    inspect_deref_methods!();
}

impl<T: Inspect> Inspect for std::sync::Arc<T> {
    inspect_deref_methods!();
}

impl<T: Inspect> Inspect for Vec<T> {
    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn render(&self, out: &mut Sink<'_>, depth: usize, indent: usize) {
        render_sequence(out, self, depth, indent);
    }

    fn element(&self, index: usize) -> Option<&dyn Inspect> {
        self.as_slice().get(index).map(|v| v as &dyn Inspect)
    }

    fn len(&self) -> Option<usize> {
        Some(Vec::len(self))
    }
}

impl<T: Inspect> Inspect for &[T] {
    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn render(&self, out: &mut Sink<'_>, depth: usize, indent: usize) {
        render_sequence(out, self, depth, indent);
    }

    fn element(&self, index: usize) -> Option<&dyn Inspect> {
        (**self).get(index).map(|v| v as &dyn Inspect)
    }

    fn len(&self) -> Option<usize> {
        Some((**self).len())
    }
}

impl<T: Inspect, const N: usize> Inspect for [T; N] {
    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn render(&self, out: &mut Sink<'_>, depth: usize, indent: usize) {
        render_sequence(out, self, depth, indent);
    }

    fn element(&self, index: usize) -> Option<&dyn Inspect> {
        self.as_slice().get(index).map(|v| v as &dyn Inspect)
    }

    fn len(&self) -> Option<usize> {
        Some(N)
    }
}

macro_rules! impl_inspect_atomic {
    ($($ty:ident),* $(,)?) => {$(
        impl Inspect for std::sync::atomic::$ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
                out.write_fmt(format_args!(
                    "{}",
                    self.load(std::sync::atomic::Ordering::Relaxed)
                ));
            }
        }
    )*};
}

impl_inspect_atomic!(
    AtomicBool, AtomicI8, AtomicI16, AtomicI32, AtomicI64, AtomicIsize, AtomicU8, AtomicU16,
    AtomicU32, AtomicU64, AtomicUsize
);

macro_rules! impl_inspect_fn_ptr {
    ($(($($arg:ident),*)),* $(,)?) => {$(
        impl<R, $($arg),*> Inspect for fn($($arg),*) -> R {
            fn type_name(&self) -> &'static str {
                type_name::<Self>()
            }

            fn render(&self, out: &mut Sink<'_>, _depth: usize, _indent: usize) {
                out.push_str(short_type_name(type_name::<Self>()));
            }
        }
    )*};
}

impl_inspect_fn_ptr!((), (A), (A, B), (A, B, C));

/// Implements [`Inspect`] for a struct, listing its fields in declaration
/// order:
///
/// ```ignore
/// struct Player { name: String, hp: i32 }
/// idb_runtime::inspect_struct!(Player { name, hp });
/// ```
#[macro_export]
macro_rules! inspect_struct {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::inspect::Inspect for $ty {
            fn type_name(&self) -> &'static str {
                ::core::any::type_name::<$ty>()
            }

            fn render(
                &self,
                out: &mut $crate::inspect::Sink<'_>,
                depth: usize,
                indent: usize,
            ) {
                let name =
                    $crate::inspect::short_type_name(::core::any::type_name::<$ty>());
                let fields: &[(&str, &dyn $crate::inspect::Inspect)] = &[
                    $((
                        ::core::stringify!($field),
                        &self.$field as &dyn $crate::inspect::Inspect,
                    ),)*
                ];
                $crate::inspect::render_struct(out, name, fields, depth, indent);
            }

            fn field(&self, name: &str) -> ::core::option::Option<&dyn $crate::inspect::Inspect> {
                match name {
                    $(::core::stringify!($field) => {
                        ::core::option::Option::Some(&self.$field as &dyn $crate::inspect::Inspect)
                    })*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_count(&self) -> usize {
                <[&str]>::len(&[$(::core::stringify!($field)),*])
            }
        }
    };
}

/// Implements [`Inspect`] for a `Debug` enum; variants render as literals
/// at any depth.
#[macro_export]
macro_rules! inspect_enum {
    ($ty:ty) => {
        impl $crate::inspect::Inspect for $ty {
            fn type_name(&self) -> &'static str {
                ::core::any::type_name::<$ty>()
            }

            fn render(
                &self,
                out: &mut $crate::inspect::Sink<'_>,
                _depth: usize,
                _indent: usize,
            ) {
                out.write_fmt(::core::format_args!("{:?}", self));
            }
        }
    };
}

/// Implements [`Inspect`] for any `Debug` type by delegating to the
/// language's generic formatter, capped at
/// [`DEBUG_FALLBACK_CAP`](crate::inspect::DEBUG_FALLBACK_CAP) bytes.
#[macro_export]
macro_rules! inspect_debug {
    ($ty:ty) => {
        impl $crate::inspect::Inspect for $ty {
            fn type_name(&self) -> &'static str {
                ::core::any::type_name::<$ty>()
            }

            fn render(
                &self,
                out: &mut $crate::inspect::Sink<'_>,
                _depth: usize,
                _indent: usize,
            ) {
                let rendered = ::std::format!("{:?}", self);
                let mut cut =
                    ::core::cmp::min(rendered.len(), $crate::inspect::DEBUG_FALLBACK_CAP);
                while !rendered.is_char_boundary(cut) {
                    cut -= 1;
                }
                out.push_str(&rendered[..cut]);
            }
        }
    };
}
