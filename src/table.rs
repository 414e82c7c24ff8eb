use crate::{heap::Heap, object::ObjRef, string::ObjString, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub string: ObjRef,
    pub hash: u32,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Option<Key>,
    value: Value,
}

impl Entry {
    const EMPTY: Entry = Entry {
        key: None,
        value: Value::Null,
    };

    // A deleted slot keeps a non-null value so probing walks past it.
    const TOMBSTONE: Entry = Entry {
        key: None,
        value: Value::Bool(true),
    };

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !self.value.is_null()
    }
}

/// Open-addressing hash table with linear probing, keyed by interned strings.
///
/// `count` includes tombstones, so a table that sees many deletes still grows
/// before probe sequences get long.
#[derive(Debug, Default)]
pub struct Table {
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    const MAX_LOAD_NUMERATOR: usize = 3;
    const MAX_LOAD_DENOMINATOR: usize = 4;
    const MIN_CAPACITY: usize = 8;

    pub fn new() -> Self {
        Table {
            count: 0,
            entries: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.key.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn heap_size(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<Entry>()
    }

    pub fn set(&mut self, key: Key, value: Value) -> bool {
        if (self.count + 1) * Table::MAX_LOAD_DENOMINATOR
            > self.capacity() * Table::MAX_LOAD_NUMERATOR
        {
            let capacity = (self.capacity() * 2).max(Table::MIN_CAPACITY);
            self.adjust_capacity(capacity);
        }

        let index = Table::find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        let is_new = entry.key.is_none();

        // Reusing a tombstone doesn't change the load.
        if is_new && entry.value.is_null() {
            self.count += 1;
        }

        entry.key = Some(key);
        entry.value = value;
        is_new
    }

    pub fn get(&self, key: Key) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }

        let entry = &self.entries[Table::find_entry(&self.entries, key)];
        entry.key.map(|_| entry.value)
    }

    pub fn delete(&mut self, key: Key) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let index = Table::find_entry(&self.entries, key);
        if self.entries[index].key.is_none() {
            return false;
        }

        self.entries[index] = Entry::TOMBSTONE;
        true
    }

    /// Looks a string up by content rather than by handle. This is how raw
    /// character data is checked against the intern set before allocating.
    pub fn find_string(&self, heap: &Heap, chars: &str, hash: u32) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }

        let mask = self.capacity() - 1;
        let mut index = hash as usize & mask;

        loop {
            let entry = &self.entries[index];
            match entry.key {
                None if !entry.is_tombstone() => return None,
                None => {}
                Some(key) if key.hash == hash => {
                    let candidate = heap.as_a::<ObjString>(key.string);
                    if candidate.map_or(false, |s| s.as_str() == chars) {
                        return Some(key.string);
                    }
                }
                Some(_) => {}
            }

            index = (index + 1) & mask;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, Value)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.key.map(|key| (key, e.value)))
    }

    // The load factor guarantees the probe reaches an empty slot.
    fn find_entry(entries: &[Entry], key: Key) -> usize {
        let mask = entries.len() - 1;
        let mut index = key.hash as usize & mask;
        let mut tombstone = None;

        loop {
            let entry = &entries[index];
            match entry.key {
                None if entry.is_tombstone() => {
                    tombstone.get_or_insert(index);
                }
                None => return tombstone.unwrap_or(index),
                Some(k) if k.string == key.string => return index,
                Some(_) => {}
            }

            index = (index + 1) & mask;
        }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        debug_assert!(capacity.is_power_of_two());

        let old = std::mem::replace(&mut self.entries, vec![Entry::EMPTY; capacity]);
        self.count = 0;

        for entry in old {
            if let Some(key) = entry.key {
                let index = Table::find_entry(&self.entries, key);
                self.entries[index] = entry;
                self.count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u32) -> Key {
        // Distinct handles; a tiny hash range forces collisions.
        Key {
            string: ObjRef {
                index: n,
                generation: 0,
            },
            hash: n % 5,
        }
    }

    #[test]
    fn set_reports_new_keys() {
        let mut table = Table::new();
        assert!(table.set(key(1), Value::Integer(1)));
        assert!(!table.set(key(1), Value::Integer(2)));
        assert_eq!(table.get(key(1)), Some(Value::Integer(2)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn get_on_empty_table() {
        let table = Table::new();
        assert_eq!(table.get(key(3)), None);
        assert_eq!(table.capacity(), 0);
    }

    #[test]
    fn delete_leaves_other_probe_chains_intact() {
        let mut table = Table::new();
        // 0, 5 and 10 all hash to 0 and share one probe chain.
        for n in [0, 5, 10].iter() {
            table.set(key(*n), Value::Integer(*n as i64));
        }

        assert!(table.delete(key(5)));
        assert!(!table.delete(key(5)));
        assert_eq!(table.get(key(5)), None);
        assert_eq!(table.get(key(10)), Some(Value::Integer(10)));
        assert_eq!(table.get(key(0)), Some(Value::Integer(0)));

        // Re-inserting reuses the tombstone.
        assert!(table.set(key(5), Value::Null));
        assert_eq!(table.get(key(5)), Some(Value::Null));
    }

    #[test]
    fn growth_preserves_entries() {
        for n in [1u32, 5, 6, 7, 12, 13, 24, 25, 100, 1000].iter() {
            let mut table = Table::new();
            for i in 0..*n {
                table.set(key(i), Value::Integer(i as i64 * 3));
            }

            assert_eq!(table.len(), *n as usize);
            assert!(table.capacity().is_power_of_two());
            assert!(table.len() * 4 <= table.capacity() * 3);
            for i in 0..*n {
                assert_eq!(table.get(key(i)), Some(Value::Integer(i as i64 * 3)));
            }
        }
    }

    #[test]
    fn tombstones_count_toward_load() {
        let mut table = Table::new();
        for i in 0..6 {
            table.set(key(i), Value::Integer(0));
        }
        assert_eq!(table.capacity(), 8);

        for i in 0..6 {
            table.delete(key(i));
        }
        table.set(key(6), Value::Integer(0));
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 1);
    }
}
