//! Block scopes with high-water marks.
//!
//! Bindings live in one flat vector. Entering a block records the current length; leaving truncates
//! back to it. Lookups scan from the end, so the innermost binding of a name wins.

/// Name bindings of one function under validation.
#[derive(Debug, Clone)]
pub struct Scope<B> {
    bindings: Vec<(String, B)>,
    marks: Vec<usize>,
}

impl<B> Default for Scope<B> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            marks: Vec::new(),
        }
    }
}

impl<B> Scope<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.marks.push(self.bindings.len());
    }

    pub fn leave(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.bindings.truncate(mark);
        }
    }

    pub fn push(&mut self, name: impl Into<String>, binding: B) {
        self.bindings.push((name.into(), binding));
    }

    /// Innermost binding of `name` in any enclosing block.
    pub fn lookup(&self, name: &str) -> Option<&B> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, binding)| binding)
    }

    /// Number of nested blocks currently open.
    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &B)> {
        self.bindings.iter().map(|(name, binding)| (name.as_str(), binding))
    }
}

/// Stack of deferred items with the same mark discipline as [`Scope`].
#[derive(Debug, Clone)]
pub struct DeferStack<D> {
    items: Vec<D>,
    marks: Vec<usize>,
}

impl<D> Default for DeferStack<D> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            marks: Vec::new(),
        }
    }
}

impl<D> DeferStack<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.marks.push(self.items.len());
    }

    /// Close the innermost block, returning its items in execution (reverse) order.
    pub fn leave(&mut self) -> Vec<D> {
        let mark = self.marks.pop().unwrap_or(0);
        let mut drained = self.items.split_off(mark);
        drained.reverse();
        drained
    }

    pub fn push(&mut self, item: D) {
        self.items.push(item);
    }

    /// Items of the innermost block, in execution order, without closing it.
    pub fn current(&self) -> impl Iterator<Item = &D> {
        let mark = self.marks.last().copied().unwrap_or(0);
        self.items[mark..].iter().rev()
    }

    /// Items registered since `depth` blocks were open, in execution order.
    pub fn since_depth(&self, depth: usize) -> impl Iterator<Item = &D> {
        let mark = if depth == 0 {
            0
        } else {
            self.marks.get(depth).copied().unwrap_or(self.items.len())
        };
        self.items[mark..].iter().rev()
    }

    /// Every pending item of every open block, innermost first.
    pub fn all(&self) -> impl Iterator<Item = &D> {
        self.items.iter().rev()
    }

    pub fn depth(&self) -> usize {
        self.marks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innermost_binding_wins() {
        let mut scope = Scope::new();
        scope.enter();
        scope.push("x", 1);
        scope.enter();
        scope.push("x", 2);
        assert_eq!(scope.lookup("x"), Some(&2));
        scope.leave();
        assert_eq!(scope.lookup("x"), Some(&1));
        scope.leave();
        assert_eq!(scope.lookup("x"), None);
        assert!(scope.is_empty());
    }

    #[test]
    fn test_defers_drain_in_reverse() {
        let mut defers = DeferStack::new();
        defers.enter();
        defers.push("d1");
        defers.push("d2");
        defers.enter();
        defers.push("d3");
        assert_eq!(defers.all().copied().collect::<Vec<_>>(), vec!["d3", "d2", "d1"]);
        assert_eq!(defers.leave(), vec!["d3"]);
        assert_eq!(defers.current().copied().collect::<Vec<_>>(), vec!["d2", "d1"]);
        assert_eq!(defers.leave(), vec!["d2", "d1"]);
        assert_eq!(defers.depth(), 0);
    }

    #[test]
    fn test_since_depth_covers_inner_blocks() {
        let mut defers = DeferStack::new();
        defers.enter();
        defers.push(1);
        defers.enter();
        defers.push(2);
        defers.enter();
        defers.push(3);
        assert_eq!(defers.since_depth(1).copied().collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(defers.since_depth(0).copied().collect::<Vec<_>>(), vec![3, 2, 1]);
    }
}
