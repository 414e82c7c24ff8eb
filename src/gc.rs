use tracing::debug;

use crate::{
    object::{Obj, ObjRef},
    table::Key,
    vm::Vm,
};

// Collector methods
impl Vm {
    pub fn collect_garbage(&mut self) {
        self.collect_garbage_with(None);
    }

    // `pending` is an object about to be inserted; its references are roots.
    pub(crate) fn collect_garbage_with(&mut self, pending: Option<&Obj>) {
        let before = self.heap.bytes_allocated();
        debug!(target: "au3::gc", bytes = before, objects = self.heap.object_count(), "gc begin");

        self.mark_roots();
        if let Some(obj) = pending {
            let mut refs = Vec::new();
            references(obj, &mut refs);
            for handle in refs {
                self.mark_object(handle);
            }
        }
        self.trace_references();
        let freed = self.sweep();

        let after = self.heap.bytes_allocated();
        self.next_gc = (after * self.config().gc_growth_factor)
            .max(self.config().initial_gc_threshold);

        debug!(
            target: "au3::gc",
            collected = before - after,
            from = before,
            to = after,
            freed,
            next = self.next_gc,
            "gc end"
        );
    }

    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    fn mark_roots(&mut self) {
        let roots: Vec<ObjRef> = self.roots().collect();
        for handle in roots {
            self.mark_object(handle);
        }
    }

    fn mark_object(&mut self, handle: ObjRef) {
        if self.heap.mark(handle) {
            self.gray_stack.push(handle);
        }
    }

    fn trace_references(&mut self) {
        let mut children = Vec::new();

        while let Some(handle) = self.gray_stack.pop() {
            if let Some(obj) = self.heap.get(handle) {
                references(obj, &mut children);
            }

            for child in children.drain(..) {
                self.mark_object(child);
            }
        }
    }

    /// Frees every unmarked object, dropping a freed string's intern entry in
    /// the same step so the intern table never points at a dead slot.
    fn sweep(&mut self) -> usize {
        let strings = &mut self.strings;

        self.heap.sweep(|handle, obj| {
            if let Obj::String(string) = obj {
                strings.delete(Key {
                    string: handle,
                    hash: string.hash(),
                });
            }
        })
    }
}

fn references(obj: &Obj, out: &mut Vec<ObjRef>) {
    match obj {
        Obj::String(_) | Obj::Native(_) => {}

        Obj::Function(function) => {
            out.extend(function.name);
            out.extend(function.chunk.constants.iter().filter_map(|v| v.as_obj()));
        }

        Obj::Map(map) => {
            for (key, value) in map.table.iter() {
                out.push(key.string);
                out.extend(value.as_obj());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{chunk::Chunk, config::Config, value::Value, vm::Vm};

    #[test]
    fn unreachable_objects_are_freed() {
        let mut vm = Vm::new();
        let kept = vm.copy_string("kept", false);
        vm.push(kept.into()).unwrap();
        let dropped = vm.copy_string("dropped", false);
        let before = vm.heap().bytes_allocated();

        vm.collect_garbage();

        assert!(vm.heap().contains(kept));
        assert!(!vm.heap().contains(dropped));
        assert!(vm.heap().bytes_allocated() < before);
    }

    #[test]
    fn freed_strings_leave_the_intern_table() {
        let mut vm = Vm::new();
        let first = vm.copy_string("temp", false);
        assert_eq!(vm.strings().len(), 1);

        vm.collect_garbage();
        assert_eq!(vm.strings().len(), 0);
        assert!(!vm.heap().contains(first));

        // Interning again makes a fresh object rather than reviving the old
        // handle.
        let second = vm.copy_string("temp", false);
        assert_ne!(first, second);
        assert!(vm.heap().contains(second));
    }

    #[test]
    fn functions_keep_their_name_and_constants_alive() {
        let mut vm = Vm::new();
        let name = vm.copy_string("f", false);
        vm.push(name.into()).unwrap();
        let constant = vm.copy_string("payload", false);
        vm.push(constant.into()).unwrap();

        let mut chunk = Chunk::new();
        chunk.add_constant(constant.into());
        let function = vm.new_function(0, Some(name), chunk);
        vm.pop();
        vm.pop();
        vm.set_global("f", function.into());

        vm.collect_garbage();

        assert!(vm.heap().contains(function));
        assert!(vm.heap().contains(name));
        assert!(vm.heap().contains(constant));
    }

    #[test]
    fn maps_keep_keys_and_values_alive() {
        let mut vm = Vm::new();
        let map = vm.new_map();
        vm.push(map.into()).unwrap();

        let inner = vm.new_map();
        vm.map_set(map, "inner", inner.into());
        vm.map_set(inner, "leaf", Value::Integer(1));

        vm.collect_garbage();

        assert!(vm.heap().contains(inner));
        assert_eq!(vm.map_get(inner, "leaf"), Some(Value::Integer(1)));
    }

    #[test]
    fn cycles_are_collected() {
        let mut vm = Vm::new();
        let a = vm.new_map();
        vm.push(a.into()).unwrap();
        let b = vm.new_map();
        vm.map_set(a, "b", b.into());
        vm.map_set(b, "a", a.into());
        vm.pop();

        vm.collect_garbage();

        assert!(!vm.heap().contains(a));
        assert!(!vm.heap().contains(b));
        assert_eq!(vm.heap().object_count(), 0);
        // Only the intern array is left; its entries are tombstones now.
        assert_eq!(vm.heap().bytes_allocated(), vm.strings().heap_size());
    }

    #[test]
    fn threshold_grows_after_collection() {
        let config = Config::default()
            .with_initial_gc_threshold(256)
            .with_gc_growth_factor(2);
        let mut vm = Vm::with_config(config);

        let map = vm.new_map();
        vm.set_global("m", map.into());
        for i in 0..200 {
            vm.map_set(map, &format!("key{}", i), Value::Integer(i));
        }

        assert!(vm.next_gc() > 256);
        for i in 0..200 {
            assert_eq!(vm.map_get(map, &format!("key{}", i)), Some(Value::Integer(i)));
        }
    }

    #[test]
    fn map_growth_alone_triggers_collection() {
        let config = Config::default()
            .with_initial_gc_threshold(64 * 1024)
            .with_gc_growth_factor(1);
        let mut vm = Vm::with_config(config);

        let keys: Vec<String> = (0..4000).map(|i| format!("key{}", i)).collect();
        for key in &keys {
            let string = vm.copy_string(key, false);
            vm.push(string.into()).unwrap();
        }
        let map = vm.new_map();
        vm.set_global("m", map.into());
        let threshold = vm.next_gc();

        // Every key is already interned, so only the map's array grows.
        for (i, key) in keys.iter().enumerate() {
            vm.map_set(map, key, Value::Integer(i as i64));
            assert!(vm.heap().bytes_allocated() <= vm.next_gc());
        }

        assert!(vm.next_gc() > threshold);
        assert_eq!(vm.map_get(map, "key3999"), Some(Value::Integer(3999)));
    }

    #[test]
    fn globals_and_intern_arrays_are_charged() {
        let mut vm = Vm::new();
        vm.set_global("g", Value::Integer(1));

        let name = vm.heap().handles().next().unwrap();
        let object = vm.heap().get(name).unwrap().size();
        assert!(vm.globals().heap_size() > 0);
        assert_eq!(
            vm.heap().bytes_allocated(),
            object + vm.strings().heap_size() + vm.globals().heap_size()
        );
    }

    #[test]
    fn stress_mode_keeps_rooted_values() {
        let mut vm = Vm::with_config(Config::default().with_stress_gc(true));
        let map = vm.new_map();
        vm.set_global("map", map.into());

        for i in 0..50 {
            let value = vm.copy_string(&format!("value{}", i), false);
            vm.map_set(map, &format!("k{}", i), value.into());
        }

        for i in 0..50 {
            let value = vm.map_get(map, &format!("k{}", i)).unwrap();
            assert_eq!(vm.format_value(value), format!("value{}", i));
        }
    }
}
