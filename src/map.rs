use crate::table::Table;

#[derive(Debug, Default)]
pub struct ObjMap {
    pub table: Table,
}

impl ObjMap {
    pub fn new() -> ObjMap {
        ObjMap {
            table: Table::new(),
        }
    }
}
