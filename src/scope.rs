//! Lexical scopes, as an arena of frames.
//!
//! Frames point at their parent by index and list their children, so the
//! whole tree stays inspectable after typing without reference cycles.

use std::collections::HashMap;

use crate::types::Type;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug)]
struct Frame {
    parent: Option<ScopeId>,
    values: HashMap<String, Type>,
    children: Vec<ScopeId>,
}

impl Frame {
    fn new(parent: Option<ScopeId>) -> Frame {
        Frame {
            parent,
            values: HashMap::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Scopes {
    frames: Vec<Frame>,
    current: ScopeId,
}

impl Default for Scopes {
    fn default() -> Scopes {
        Scopes::new()
    }
}

impl Scopes {
    /// Creates the tree with a single root frame.
    pub fn new() -> Scopes {
        Scopes {
            frames: vec![Frame::new(None)],
            current: ScopeId(0),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Opens a child of the current frame and enters it.
    pub fn push(&mut self) -> ScopeId {
        let id = ScopeId(self.frames.len());
        self.frames.push(Frame::new(Some(self.current)));
        self.frames[self.current.0].children.push(id);
        self.current = id;
        id
    }

    /// Returns to the parent of the current frame. Popping the root is a
    /// no-op.
    pub fn pop(&mut self) {
        if let Some(parent) = self.frames[self.current.0].parent {
            self.current = parent;
        }
    }

    /// Binds `name` in the current frame, shadowing outer bindings.
    pub fn declare(&mut self, name: impl Into<String>, ty: Type) {
        self.frames[self.current.0].values.insert(name.into(), ty);
    }

    /// Looks `name` up from the current frame outwards.
    pub fn resolve(&self, name: &str) -> Option<&Type> {
        let mut id = Some(self.current);
        while let Some(ScopeId(i)) = id {
            let frame = &self.frames[i];
            if let Some(ty) = frame.values.get(name) {
                return Some(ty);
            }
            id = frame.parent;
        }
        None
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn children(&self, id: ScopeId) -> &[ScopeId] {
        &self.frames[id.0].children
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
