use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::Value;

struct Frame {
    bindings: RefCell<IndexMap<String, Value>>,
    parent: Option<Scope>,
}

/// Handle to the innermost frame of a scope chain. Cloning shares the
/// frames; `child` pushes a new frame on top.
#[derive(Clone)]
pub struct Scope(Rc<Frame>);

impl Scope {
    pub fn root() -> Self {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(IndexMap::new()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(IndexMap::new()),
            parent: Some(self.clone()),
        }))
    }

    /// Bind `name` in the innermost frame, shadowing outer bindings.
    pub fn define(&self, name: &str, value: Value) {
        self.0.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Mutate the nearest frame already defining `name`.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            let mut bindings = scope.0.bindings.borrow_mut();
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value;
                return true;
            }
            drop(bindings);
            cursor = scope.0.parent.as_ref();
        }
        false
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            if let Some(value) = scope.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            cursor = scope.0.parent.as_ref();
        }
        None
    }

    /// Bindings of the innermost frame only.
    pub fn bindings(&self) -> IndexMap<String, Value> {
        self.0.bindings.borrow().clone()
    }

    /// Empty this frame and every frame above it.
    fn clear_chain(&self) {
        let mut cursor = Some(self.clone());
        while let Some(scope) = cursor {
            // Dropped outside the borrow: releasing a closure can free frames.
            let released = mem::take(&mut *scope.0.bindings.borrow_mut());
            drop(released);
            cursor = scope.0.parent.clone();
        }
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            depth += 1;
            cursor = scope.0.parent.as_ref();
        }
        depth
    }
}

/// Frames captured by closures during one invocation chain. A frame that
/// binds a closure capturing it is an `Rc` cycle; `release` empties those
/// frames so the cycle can be freed.
#[derive(Clone, Default)]
pub struct Captures(Rc<RefCell<Vec<Weak<Frame>>>>);

impl Captures {
    pub fn record(&self, scope: &Scope) {
        let mut frames = self.0.borrow_mut();
        if frames.len() == frames.capacity() {
            frames.retain(|frame| frame.strong_count() > 0);
        }
        frames.push(Rc::downgrade(&scope.0));
    }

    pub fn release(&self) {
        let frames = mem::take(&mut *self.0.borrow_mut());
        for frame in frames.iter().filter_map(Weak::upgrade) {
            Scope(frame).clear_chain();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Closure;

    #[test]
    fn set_reaches_nearest_defining_frame() {
        let root = Scope::root();
        root.define("a", Value::Number(1.0));
        let inner = root.child();
        inner.define("b", Value::Number(2.0));
        assert!(inner.assign("a", Value::Number(10.0)));
        assert_eq!(root.lookup("a"), Some(Value::Number(10.0)));
        assert!(!inner.assign("missing", Value::Null));
        assert_eq!(inner.depth(), 2);
    }

    #[test]
    fn define_shadows_outer_binding() {
        let root = Scope::root();
        root.define("x", Value::from("outer"));
        let inner = root.child();
        inner.define("x", Value::from("inner"));
        assert_eq!(inner.lookup("x"), Some(Value::from("inner")));
        assert_eq!(root.lookup("x"), Some(Value::from("outer")));
    }

    #[test]
    fn release_frees_self_capturing_frames() {
        let captures = Captures::default();
        let frame = Scope::root().child();
        let closure = Closure {
            params: vec![],
            body: Value::Null,
            scope: frame.clone(),
            compiled: None,
        };
        frame.define("f", Value::Closure(Rc::new(closure)));
        captures.record(&frame);
        let weak = Rc::downgrade(&frame.0);
        drop(frame);
        assert!(weak.upgrade().is_some());

        captures.release();
        assert!(weak.upgrade().is_none());
    }
}
