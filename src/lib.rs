//! Runtime core for the au3 scripting language: tagged values, a
//! mark-and-sweep heap of string, function, native and map objects, string
//! interning over an open-addressing table, and a call-frame stack machine.
//!
//! The compiler and host layers live elsewhere. They hand this crate
//! [`ObjFunction`]s and drive a [`Vm`] through its allocation, table and
//! stack entry points.

mod chunk;
mod config;
mod error;
mod function;
mod gc;
mod heap;
mod map;
mod native;
mod object;
mod string;
mod table;
mod value;
mod vm;

pub use chunk::{Chunk, Opcode};
pub use config::Config;
pub use error::{InterpretError, RuntimeError, TraceFrame};
pub use function::ObjFunction;
pub use heap::{Handles, Heap};
pub use map::ObjMap;
pub use native::{NativeFn, ObjNative};
pub use object::{Obj, ObjRef, ObjType, Object};
pub use string::{hash_bytes, ObjString};
pub use table::{Key, Table};
pub use value::{format_number, Value, ValueArray, ValueDisplay};
pub use vm::Vm;
