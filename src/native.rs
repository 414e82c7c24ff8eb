use std::fmt::{self, Debug, Formatter};

use crate::{error::RuntimeError, value::Value, vm::Vm};

/// Host function callable from scripts.
///
/// Arguments are the top `arg_count` stack slots, readable with
/// [`Vm::peek`]; the VM pops them and the callee, then pushes the returned
/// value.
pub type NativeFn = fn(vm: &mut Vm, arg_count: usize) -> Result<Value, RuntimeError>;

pub struct ObjNative {
    pub function: NativeFn,
    pub hint: Option<String>,
}

impl ObjNative {
    pub fn new(function: NativeFn, hint: Option<String>) -> ObjNative {
        ObjNative { function, hint }
    }
}

impl Debug for ObjNative {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjNative")
            .field("function", &(self.function as usize as *const ()))
            .field("hint", &self.hint)
            .finish()
    }
}
