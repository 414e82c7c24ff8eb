use crate::{chunk::Chunk, object::ObjRef};

#[derive(Debug)]
pub struct ObjFunction {
    pub arity: usize,
    // None for the top-level script
    pub name: Option<ObjRef>,
    pub chunk: Chunk,
}

impl ObjFunction {
    pub fn new(arity: usize, name: Option<ObjRef>, chunk: Chunk) -> ObjFunction {
        ObjFunction { arity, name, chunk }
    }
}
