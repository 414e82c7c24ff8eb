use std::borrow::Cow;

use crate::{object::ObjRef, vm::Vm};

#[derive(Debug)]
pub struct ObjString {
    hash: u32,
    chars: Box<str>,
}

impl PartialEq for ObjString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.chars == other.chars
    }
}

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a. With `ignore_case` each byte is ASCII-lowercased before it
/// is folded in, so `hash_bytes(b"ABC", true) == hash_bytes(b"abc", false)`.
pub fn hash_bytes(bytes: &[u8], ignore_case: bool) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        let byte = if ignore_case {
            byte.to_ascii_lowercase()
        } else {
            byte
        };
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    })
}

impl ObjString {
    pub(crate) fn new(chars: Box<str>, hash: u32) -> ObjString {
        ObjString { hash, chars }
    }

    pub fn as_str(&self) -> &str {
        &self.chars
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    // If an equal string is already interned the buffer is dropped.
    pub fn take(buf: String, vm: &mut Vm) -> ObjRef {
        let hash = hash_bytes(buf.as_bytes(), false);

        if let Some(interned) = vm.strings.find_string(&vm.heap, &buf, hash) {
            return interned;
        }

        vm.allocate_string(buf.into_boxed_str(), hash)
    }

    /// Interns a borrowed string. `ignore_case` interns the ASCII-lowercased
    /// form.
    pub fn copy(chars: &str, ignore_case: bool, vm: &mut Vm) -> ObjRef {
        let hash = hash_bytes(chars.as_bytes(), ignore_case);
        let chars: Cow<str> = if ignore_case {
            Cow::Owned(chars.to_ascii_lowercase())
        } else {
            Cow::Borrowed(chars)
        };

        if let Some(interned) = vm.strings.find_string(&vm.heap, &chars, hash) {
            return interned;
        }

        vm.allocate_string(chars.into_owned().into_boxed_str(), hash)
    }
}
