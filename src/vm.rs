use std::convert::TryFrom;

use tracing::{debug, trace};

use crate::{
    chunk::{Chunk, Opcode},
    config::Config,
    error::{InterpretError, RuntimeError, TraceFrame},
    function::ObjFunction,
    heap::Heap,
    map::ObjMap,
    native::{NativeFn, ObjNative},
    object::{Obj, ObjRef, Object},
    string::ObjString,
    table::{Key, Table},
    value::Value,
};

/// One interpreter instance. Nothing is shared between instances.
pub struct Vm {
    config: Config,
    frames: Vec<CallFrame>,
    stack: Vec<Value>,
    globals: Table,
    temp_roots: Vec<Value>,

    // heap
    pub(crate) heap: Heap,
    /// Intern set. Keys are weak: the heap owns the strings and the sweep
    /// removes entries for strings it frees.
    pub(crate) strings: Table,
    pub(crate) next_gc: usize,
    pub(crate) gray_stack: Vec<ObjRef>,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Vm {
        Vm::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Vm {
        Vm {
            frames: Vec::with_capacity(config.frames_max),
            stack: Vec::with_capacity(config.stack_max),
            globals: Table::new(),
            temp_roots: Vec::new(),
            heap: Heap::new(),
            strings: Table::new(),
            next_gc: config.initial_gc_threshold,
            gray_stack: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn globals(&self) -> &Table {
        &self.globals
    }

    pub fn strings(&self) -> &Table {
        &self.strings
    }

    /// Runs a compiled script: calls `function` with no arguments and runs
    /// until it returns. On error the stack and frames are unwound to where
    /// they were before the call.
    pub fn interpret(&mut self, function: ObjRef) -> Result<Value, InterpretError> {
        self.call_function(function.into(), &[])
    }

    pub fn call_function(
        &mut self,
        callee: Value,
        args: &[Value],
    ) -> Result<Value, InterpretError> {
        let stack_mark = self.stack.len();
        let frame_mark = self.frames.len();

        let result = self.enter(callee, args).and_then(|()| {
            if self.frames.len() > frame_mark {
                self.run()?;
            }
            Ok(self.pop())
        });

        result.map_err(|error| {
            let trace = self.stack_trace();
            debug!(target: "au3::vm", %error, depth = trace.len(), "runtime error");

            self.stack.truncate(stack_mark);
            self.frames.truncate(frame_mark);
            InterpretError { error, trace }
        })
    }

    fn enter(&mut self, callee: Value, args: &[Value]) -> Result<(), RuntimeError> {
        self.push(callee)?;
        for arg in args {
            self.push(*arg)?;
        }
        self.call_value(callee, args.len())
    }

    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == self.config.stack_max {
            return Err(RuntimeError::StackOverflow);
        }

        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Value {
        self.stack.pop().expect("pop on empty stack")
    }

    pub fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    // Runs until the frame that was on top on entry returns.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let entry_depth = self.frames.len();

        loop {
            let byte = self.read_byte();
            let instruction =
                Opcode::try_from(byte).map_err(RuntimeError::InvalidOpcode)?;

            trace!(
                target: "au3::vm",
                ip = self.frame().ip - 1,
                op = instruction.to_str(),
                stack = ?self.stack,
            );

            match instruction {
                Opcode::Constant => {
                    let constant = self.read_constant();
                    self.push(constant)?;
                }

                Opcode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("return without a frame");

                    self.stack.truncate(frame.result_slot);
                    self.stack.push(result);

                    if self.frames.len() < entry_depth {
                        return Ok(());
                    }
                }

                Opcode::Null => self.push(Value::Null)?,
                Opcode::True => self.push(Value::Bool(true))?,
                Opcode::False => self.push(Value::Bool(false))?,

                Opcode::Pop => {
                    self.pop();
                }

                Opcode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.stack[self.frame().base + slot];
                    self.push(value)?;
                }

                Opcode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0);
                    let base = self.frame().base;
                    self.stack[base + slot] = value;
                }

                Opcode::DefineGlobal => {
                    let key = self.read_key();
                    self.set_global_key(key, self.peek(0));
                    self.pop();
                }

                Opcode::GetGlobal => {
                    let key = self.read_key();
                    match self.globals.get(key) {
                        Some(value) => self.push(value)?,
                        None => return Err(self.undefined(key)),
                    }
                }

                Opcode::SetGlobal => {
                    let key = self.read_key();
                    if self.set_global_key(key, self.peek(0)) {
                        self.globals.delete(key);
                        return Err(self.undefined(key));
                    }
                }

                Opcode::Equal => {
                    let r = self.pop();
                    let l = self.pop();
                    self.push(Value::Bool(l == r))?;
                }

                Opcode::Add => {
                    let result = self.add(self.peek(1), self.peek(0))?;
                    self.pop();
                    self.pop();
                    self.push(result)?;
                }

                Opcode::Call => {
                    let arg_count = self.read_byte() as usize;
                    self.call_value(self.peek(arg_count), arg_count)?;
                }

                Opcode::Print => {
                    let value = self.pop();
                    self.print(value);
                    println!();
                }
            }
        }
    }

    /// Calls a function or native sitting `arg_count` slots below the top of
    /// the stack. On success the callee's slot will receive the result.
    pub fn call_value(
        &mut self,
        callee: Value,
        arg_count: usize,
    ) -> Result<(), RuntimeError> {
        let handle = match callee {
            Value::Obj(handle) => handle,
            other => return Err(RuntimeError::NotCallable(other.type_name(&self.heap))),
        };

        match self.heap.get(handle) {
            Some(Obj::Function(_)) => {
                self.push_frame(handle, arg_count, 1)
            }
            Some(Obj::Native(native)) => {
                let function = native.function;
                let result = function(self, arg_count)?;

                self.stack.truncate(self.stack.len() - arg_count - 1);
                self.stack.push(result);
                Ok(())
            }
            Some(other) => Err(RuntimeError::NotCallable(other.type_name())),
            None => panic!("stale handle {:?} called", handle),
        }
    }

    /// Pushes a frame for `function` whose local window starts `arg_count`
    /// slots below the top. The return value will be left where the window
    /// started. The stack is untouched if the call is rejected.
    pub fn call(&mut self, function: ObjRef, arg_count: usize) -> Result<(), RuntimeError> {
        self.push_frame(function, arg_count, 0)
    }

    fn push_frame(
        &mut self,
        function: ObjRef,
        arg_count: usize,
        callee_slots: usize,
    ) -> Result<(), RuntimeError> {
        let arity = self
            .heap
            .as_a::<ObjFunction>(function)
            .expect("call target is not a live function")
            .arity;

        if arg_count != arity {
            return Err(RuntimeError::ArityMismatch {
                expected: arity,
                got: arg_count,
            });
        }

        if self.frames.len() == self.config.frames_max {
            return Err(RuntimeError::FrameOverflow {
                max: self.config.frames_max,
            });
        }

        let base = self
            .stack
            .len()
            .checked_sub(arg_count)
            .expect("fewer stack slots than call arguments");

        self.frames.push(CallFrame {
            function,
            ip: 0,
            base,
            result_slot: base - callee_slots,
        });

        Ok(())
    }

    fn add(&mut self, l: Value, r: Value) -> Result<Value, RuntimeError> {
        match (l, r) {
            (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(l.wrapping_add(r))),
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::Integer(l), Value::Number(r)) => Ok(Value::Number(l as f64 + r)),
            (Value::Number(l), Value::Integer(r)) => Ok(Value::Number(l + r as f64)),
            (Value::Obj(l), Value::Obj(r)) => {
                let buf = match (
                    self.heap.as_a::<ObjString>(l),
                    self.heap.as_a::<ObjString>(r),
                ) {
                    (Some(l), Some(r)) => {
                        let mut buf = String::with_capacity(l.len() + r.len());
                        buf.push_str(l.as_str());
                        buf.push_str(r.as_str());
                        buf
                    }
                    _ => return Err(RuntimeError::OperandMismatch),
                };
                Ok(self.take_string(buf).into())
            }
            _ => Err(RuntimeError::OperandMismatch),
        }
    }

    fn undefined(&self, key: Key) -> RuntimeError {
        let name = self
            .heap
            .as_a::<ObjString>(key.string)
            .map_or("", |s| s.as_str());
        RuntimeError::UndefinedVariable(name.to_owned())
    }

    fn stack_trace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let function = self.heap.as_a::<ObjFunction>(frame.function);
                let line = function
                    .and_then(|f| f.chunk.lines.get(frame.ip.saturating_sub(1)))
                    .copied()
                    .unwrap_or(0);
                let name = function
                    .and_then(|f| f.name)
                    .and_then(|n| self.heap.as_a::<ObjString>(n))
                    .map_or("script", |n| n.as_str());

                TraceFrame {
                    line,
                    function: name.to_owned(),
                }
            })
            .collect()
    }

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active call frame")
    }

    fn chunk(&self) -> &Chunk {
        &self
            .heap
            .as_a::<ObjFunction>(self.frame().function)
            .expect("frame function was freed")
            .chunk
    }

    fn read_byte(&mut self) -> u8 {
        let ip = self.frame().ip;
        let byte = *self
            .chunk()
            .code
            .get(ip)
            .expect("instruction pointer ran past the end of the chunk");
        self.frames.last_mut().expect("no active call frame").ip += 1;
        byte
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        self.chunk()
            .constants
            .get(index)
            .expect("constant index out of range")
    }

    fn read_key(&mut self) -> Key {
        let name = self.read_constant();
        self.key(name.as_obj().expect("global name is not an object"))
    }
}

// Host-facing object API
impl Vm {
    pub fn key(&self, string: ObjRef) -> Key {
        let hash = self
            .heap
            .as_a::<ObjString>(string)
            .expect("table key is not a live string")
            .hash();
        Key { string, hash }
    }

    pub fn type_of(&self, value: Value) -> &'static str {
        value.type_name(&self.heap)
    }

    pub fn print(&self, value: Value) {
        print!("{}", value.display(&self.heap));
    }

    pub fn format_value(&self, value: Value) -> String {
        value.display(&self.heap).to_string()
    }

    pub fn set_global(&mut self, name: &str, value: Value) -> bool {
        self.temp_roots.push(value);
        let name = self.copy_string(name, false);
        self.temp_roots.pop();

        let key = self.key(name);
        self.set_global_key(key, value)
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        let key = self.lookup_key(name)?;
        self.globals.get(key)
    }

    pub fn delete_global(&mut self, name: &str) -> bool {
        match self.lookup_key(name) {
            Some(key) => self.globals.delete(key),
            None => false,
        }
    }

    pub fn define_native(&mut self, name: &str, hint: Option<&str>, function: NativeFn) {
        let native = self.new_native(function, hint.map(str::to_owned));
        self.set_global(name, native.into());
    }

    pub fn map_set(&mut self, map: ObjRef, key: &str, value: Value) -> bool {
        self.temp_roots.push(map.into());
        self.temp_roots.push(value);
        let field = self.copy_string(key, false);

        let key = self.key(field);
        let is_new = self.map_mut(map).table.set(key, value);
        self.account(map);

        self.temp_roots.truncate(self.temp_roots.len() - 2);
        is_new
    }

    pub fn map_get(&self, map: ObjRef, key: &str) -> Option<Value> {
        let key = self.lookup_key(key)?;
        self.map_ref(map).table.get(key)
    }

    pub fn map_delete(&mut self, map: ObjRef, key: &str) -> bool {
        match self.lookup_key(key) {
            Some(key) => self.map_mut(map).table.delete(key),
            None => false,
        }
    }

    fn set_global_key(&mut self, key: Key, value: Value) -> bool {
        let old = self.globals.heap_size();
        let is_new = self.globals.set(key, value);
        self.charge(old, self.globals.heap_size());
        is_new
    }

    // A string that was never interned can't be a key in any table.
    fn lookup_key(&self, name: &str) -> Option<Key> {
        let hash = crate::string::hash_bytes(name.as_bytes(), false);
        let string = self.strings.find_string(&self.heap, name, hash)?;
        Some(Key { string, hash })
    }

    fn map_ref(&self, map: ObjRef) -> &ObjMap {
        self.heap.as_a::<ObjMap>(map).expect("not a live map")
    }

    fn map_mut(&mut self, map: ObjRef) -> &mut ObjMap {
        self.heap.as_a_mut::<ObjMap>(map).expect("not a live map")
    }
}

// Allocation entry points
impl Vm {
    /// Moves `object` onto the heap, collecting first if the allocation would
    /// cross the threshold. References held by `object` are treated as roots
    /// for that collection.
    pub fn allocate<T: Object>(&mut self, object: T) -> ObjRef {
        let obj = object.into_obj();

        if self.config.stress_gc || self.heap.bytes_allocated() + obj.size() > self.next_gc {
            self.collect_garbage_with(Some(&obj));
        }

        self.heap.insert(obj)
    }

    pub fn copy_string(&mut self, chars: &str, ignore_case: bool) -> ObjRef {
        ObjString::copy(chars, ignore_case, self)
    }

    pub fn take_string(&mut self, buf: String) -> ObjRef {
        ObjString::take(buf, self)
    }

    pub fn new_function(&mut self, arity: usize, name: Option<ObjRef>, chunk: Chunk) -> ObjRef {
        self.allocate(ObjFunction::new(arity, name, chunk))
    }

    pub fn new_map(&mut self) -> ObjRef {
        self.allocate(ObjMap::new())
    }

    pub fn new_native(&mut self, function: NativeFn, hint: Option<String>) -> ObjRef {
        self.allocate(ObjNative::new(function, hint))
    }

    pub(crate) fn allocate_string(&mut self, chars: Box<str>, hash: u32) -> ObjRef {
        let string = self.allocate(ObjString::new(chars, hash));

        let old = self.strings.heap_size();
        self.strings.set(Key { string, hash }, Value::Null);

        self.temp_roots.push(string.into());
        self.charge(old, self.strings.heap_size());
        self.temp_roots.pop();
        string
    }

    /// Re-measures `handle` after its owned buffers changed, then runs the
    /// collection check if it grew. Anything the caller still needs must be
    /// rooted.
    fn account(&mut self, handle: ObjRef) {
        let before = self.heap.bytes_allocated();
        self.heap.reaccount(handle);
        if self.heap.bytes_allocated() > before {
            self.maybe_collect();
        }
    }

    // Same as `account` for the globals and intern arrays.
    fn charge(&mut self, old: usize, new: usize) {
        if old == new {
            return;
        }

        self.heap.charge(old, new);
        if new > old {
            self.maybe_collect();
        }
    }

    fn maybe_collect(&mut self) {
        if self.config.stress_gc || self.heap.bytes_allocated() > self.next_gc {
            self.collect_garbage();
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CallFrame {
    pub(crate) function: ObjRef,
    pub(crate) ip: usize,
    pub(crate) base: usize,
    pub(crate) result_slot: usize,
}

// Roots for the collector
impl Vm {
    pub(crate) fn roots(&self) -> impl Iterator<Item = ObjRef> + '_ {
        let globals = self
            .globals
            .iter()
            .flat_map(|(key, value)| std::iter::once(key.string).chain(value.as_obj()));

        self.stack
            .iter()
            .chain(self.temp_roots.iter())
            .filter_map(Value::as_obj)
            .chain(self.frames.iter().map(|frame| frame.function))
            .chain(globals)
    }
}
