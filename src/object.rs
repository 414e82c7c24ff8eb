use std::fmt::{self, Debug, Formatter};

use crate::{
    function::ObjFunction, heap::Heap, map::ObjMap, native::ObjNative,
    string::ObjString,
};

/// Handle to a heap object.
///
/// A slot index plus the generation the slot had when the object was
/// allocated. Freeing an object bumps its slot's generation, so handles that
/// outlive their referent stop resolving instead of aliasing a newer object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ObjRef {
    pub fn index(self) -> u32 {
        self.index
    }
}

impl Debug for ObjRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjType {
    Function,
    Map,
    Native,
    String,
}

#[derive(Debug)]
pub enum Obj {
    Function(ObjFunction),
    Map(ObjMap),
    Native(ObjNative),
    String(ObjString),
}

impl Obj {
    pub fn obj_type(&self) -> ObjType {
        match self {
            Obj::Function(_) => ObjType::Function,
            Obj::Map(_) => ObjType::Map,
            Obj::Native(_) => ObjType::Native,
            Obj::String(_) => ObjType::String,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::Function(_) => "fn",
            Obj::Map(_) => "map",
            Obj::Native(_) => "native",
            Obj::String(_) => "str",
        }
    }

    // Includes every buffer the object exclusively owns.
    pub fn size(&self) -> usize {
        let owned = match self {
            Obj::Function(function) => function.chunk.heap_size(),
            Obj::Map(map) => map.table.heap_size(),
            Obj::Native(native) => native.hint.as_ref().map_or(0, |h| h.len()),
            Obj::String(string) => string.len(),
        };

        std::mem::size_of::<Obj>() + owned
    }

    pub fn as_a<T: Object>(&self) -> Option<&T> {
        T::from_obj(self)
    }

    pub fn as_a_mut<T: Object>(&mut self) -> Option<&mut T> {
        T::from_obj_mut(self)
    }

    pub(crate) fn fmt_with(
        &self,
        handle: ObjRef,
        heap: &Heap,
        f: &mut Formatter,
    ) -> fmt::Result {
        match self {
            Obj::String(string) => write!(f, "{}", string.as_str()),
            Obj::Function(function) => {
                match function.name.and_then(|n| heap.as_a::<ObjString>(n)) {
                    Some(name) => write!(f, "fn: {}", name.as_str()),
                    None => write!(f, "<script>"),
                }
            }
            Obj::Native(native) => match &native.hint {
                Some(hint) => write!(f, "native: {}", hint),
                None => write!(f, "native"),
            },
            Obj::Map(_) => write!(f, "map: #{}", handle.index),
        }
    }
}

pub trait Object: Sized {
    const TAG: ObjType;

    fn from_obj(obj: &Obj) -> Option<&Self>;

    fn from_obj_mut(obj: &mut Obj) -> Option<&mut Self>;

    fn into_obj(self) -> Obj;
}

macro_rules! object_variant {
    ($ty:ty, $variant:ident) => {
        impl crate::object::Object for $ty {
            const TAG: crate::object::ObjType = crate::object::ObjType::$variant;

            fn from_obj(obj: &crate::object::Obj) -> Option<&Self> {
                match obj {
                    crate::object::Obj::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_obj_mut(obj: &mut crate::object::Obj) -> Option<&mut Self> {
                match obj {
                    crate::object::Obj::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_obj(self) -> crate::object::Obj {
                crate::object::Obj::$variant(self)
            }
        }
    };
}

object_variant!(ObjFunction, Function);
object_variant!(ObjMap, Map);
object_variant!(ObjNative, Native);
object_variant!(ObjString, String);
