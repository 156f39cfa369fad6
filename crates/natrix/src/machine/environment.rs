//! Lexical environments and closures, stored in index arenas.
//!
//! Frames live in a central [`Environments`] arena and refer to their
//! parents by [`EnvId`] rather than by pointer, which keeps the scope
//! chain acyclic by construction and lets closures outlive the chunk
//! that created them. The parent/children links double as a frame tree
//! for debugging.

use ahash::{AHashMap, AHashSet};

use crate::{
    ast::{Block, ExprRef},
    token::CodeRange,
    value::Value,
};

/// Index of a frame in the [`Environments`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EnvId(u32);

impl EnvId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a closure in the [`Closures`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ClosureId(u32);

impl ClosureId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One lexical frame.
#[derive(Debug)]
pub(crate) struct Frame {
    /// Display name: the function's name, `<lambda>`, or `<module>`.
    pub name: String,
    pub bindings: AHashMap<String, Value>,
    /// The enclosing frame; `None` only for the global frame.
    pub tail: Option<EnvId>,
    /// Child frames, kept for the debugging tree.
    pub children: Vec<EnvId>,
    /// The closure whose call created this frame, if any.
    pub closure: Option<ClosureId>,
    /// The call expression that created this frame, if any.
    pub call_range: Option<CodeRange>,
    /// Names this frame has declared `global`.
    pub globals: AHashSet<String>,
    /// Names this frame has declared `nonlocal`.
    pub nonlocals: AHashSet<String>,
}

/// Arena of every frame created during a context's lifetime.
///
/// Frames are never freed: the teaching subset has no garbage collector,
/// and closures may keep any frame reachable indefinitely.
#[derive(Debug, Default)]
pub(crate) struct Environments {
    frames: Vec<Frame>,
}

impl Environments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new frame, linking it into the tree under its tail.
    pub fn new_frame(
        &mut self,
        name: impl Into<String>,
        tail: Option<EnvId>,
        closure: Option<ClosureId>,
        call_range: Option<CodeRange>,
    ) -> EnvId {
        let id = EnvId(u32::try_from(self.frames.len()).expect("frame arena overflow"));
        self.frames.push(Frame {
            name: name.into(),
            bindings: AHashMap::new(),
            tail,
            children: Vec::new(),
            closure,
            call_range,
            globals: AHashSet::new(),
            nonlocals: AHashSet::new(),
        });
        if let Some(parent) = tail {
            self.frames[parent.index()].children.push(id);
        }
        id
    }

    pub fn get(&self, id: EnvId) -> &Frame {
        &self.frames[id.index()]
    }

    pub fn get_mut(&mut self, id: EnvId) -> &mut Frame {
        &mut self.frames[id.index()]
    }

    /// Walks the tail chain from `start`, returning the first frame that
    /// binds `name`.
    pub fn lookup(&self, start: EnvId, name: &str) -> Option<&Value> {
        let mut current = Some(start);
        while let Some(id) = current {
            let frame = self.get(id);
            if let Some(value) = frame.bindings.get(name) {
                return Some(value);
            }
            current = frame.tail;
        }
        None
    }

    /// Rebinds `name` in the nearest ancestor frame (excluding `start`)
    /// that already binds it. Used for `nonlocal` assignment.
    ///
    /// Returns false when no ancestor binds the name.
    pub fn rebind_in_ancestor(&mut self, start: EnvId, name: &str, value: Value) -> bool {
        let mut current = self.get(start).tail;
        while let Some(id) = current {
            let frame = self.get_mut(id);
            if let Some(slot) = frame.bindings.get_mut(name) {
                *slot = value;
                return true;
            }
            current = self.get(id).tail;
        }
        false
    }
}

/// The body of a closure: a statement block for `def`, a single
/// expression for `lambda`.
#[derive(Debug, Clone)]
pub(crate) enum ClosureBody {
    Block(Block),
    Expr(ExprRef),
}

/// A function value: parameters, body, and the frame it closed over.
#[derive(Debug)]
pub(crate) struct Closure {
    pub name: String,
    pub params: Vec<String>,
    pub body: ClosureBody,
    /// The frame in which the closure was defined.
    pub env: EnvId,
    /// Names the body assigns somewhere, precomputed at creation time.
    /// Drives the `UnboundLocalError` / `NameError` distinction.
    pub local_variables: AHashSet<String>,
}

/// Arena of every closure created during a context's lifetime.
#[derive(Debug, Default)]
pub(crate) struct Closures {
    items: Vec<Closure>,
}

impl Closures {
    pub fn alloc(&mut self, closure: Closure) -> ClosureId {
        let id = ClosureId(u32::try_from(self.items.len()).expect("closure arena overflow"));
        self.items.push(closure);
        id
    }

    pub fn get(&self, id: ClosureId) -> &Closure {
        &self.items[id.index()]
    }
}
