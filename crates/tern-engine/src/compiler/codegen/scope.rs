//! Scope management for variable resolution during compilation.
//!
//! Slots are handed out monotonically: a global slot for every declaration
//! outside a function, a frame slot for every declaration inside one. Ending
//! a block hides its names but never recycles their slots, so the slot count
//! of a function is simply the number of names it ever declared.

/// What a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A slot in the global namespace
    Global(u32),
    /// A slot relative to the current frame's base
    Local(u32),
    /// An entry in the function table
    Function(u32),
}

/// A name declared in a scope.
#[derive(Debug, Clone)]
pub struct Local {
    /// The declared name
    pub name: String,
    /// The block depth where this was declared
    pub depth: usize,
    /// Function nesting level at the declaration (0 = top level)
    pub function: usize,
    /// What the name refers to
    pub binding: Binding,
}

/// A scope chain for name resolution.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Every visible declaration, innermost last
    pub locals: Vec<Local>,
    /// Current block depth (0 = global)
    pub depth: usize,
    next_global: u32,
    /// Next free slot of each function being compiled, innermost last
    frames: Vec<u32>,
}

impl Scope {
    /// Creates a new scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new block scope.
    pub fn begin_scope(&mut self) {
        self.depth += 1;
    }

    /// End the current block scope, hiding the names declared in it.
    pub fn end_scope(&mut self) {
        while self.locals.last().is_some_and(|l| l.depth == self.depth) {
            self.locals.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Start compiling a function body with a fresh slot namespace.
    pub fn begin_function(&mut self) {
        self.frames.push(0);
        self.begin_scope();
    }

    /// Finish a function body and return the number of slots it used.
    pub fn end_function(&mut self) -> usize {
        self.end_scope();
        self.frames.pop().unwrap_or(0) as usize
    }

    /// Declare a variable and reserve its slot.
    pub fn declare_variable(&mut self, name: &str) -> Binding {
        let binding = match self.frames.last_mut() {
            Some(next) => {
                let slot = *next;
                *next += 1;
                Binding::Local(slot)
            }
            None => {
                let slot = self.next_global;
                self.next_global += 1;
                Binding::Global(slot)
            }
        };
        self.push(name, binding);
        binding
    }

    /// Declare a function name.
    pub fn declare_function(&mut self, name: &str, id: u32) {
        self.push(name, Binding::Function(id));
    }

    /// Resolve a name, innermost declaration first.
    ///
    /// Locals of an enclosing function are not visible.
    pub fn resolve(&self, name: &str) -> Option<Binding> {
        let local = self.locals.iter().rev().find(|l| l.name == name)?;
        match local.binding {
            Binding::Local(_) if local.function != self.frames.len() => None,
            binding => Some(binding),
        }
    }

    /// Number of global slots handed out so far.
    pub fn global_count(&self) -> usize {
        self.next_global as usize
    }

    fn push(&mut self, name: &str, binding: Binding) {
        self.locals.push(Local {
            name: name.to_string(),
            depth: self.depth,
            function: self.frames.len(),
            binding,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_are_monotonic() {
        let mut scope = Scope::new();
        assert_eq!(scope.declare_variable("a"), Binding::Global(0));
        scope.begin_scope();
        assert_eq!(scope.declare_variable("b"), Binding::Global(1));
        scope.end_scope();
        assert_eq!(scope.resolve("b"), None);
        assert_eq!(scope.resolve("a"), Some(Binding::Global(0)));
        assert_eq!(scope.declare_variable("c"), Binding::Global(2));
        assert_eq!(scope.global_count(), 3);
    }

    #[test]
    fn test_function_slots_are_not_reused() {
        let mut scope = Scope::new();
        scope.begin_function();
        assert_eq!(scope.declare_variable("n"), Binding::Local(0));
        scope.begin_scope();
        assert_eq!(scope.declare_variable("tmp"), Binding::Local(1));
        scope.end_scope();
        assert_eq!(scope.declare_variable("other"), Binding::Local(2));
        assert_eq!(scope.end_function(), 3);
        assert_eq!(scope.declare_variable("top"), Binding::Global(0));
    }

    #[test]
    fn test_shadowing_resolves_innermost() {
        let mut scope = Scope::new();
        scope.declare_variable("x");
        scope.begin_scope();
        scope.declare_variable("x");
        assert_eq!(scope.resolve("x"), Some(Binding::Global(1)));
        scope.end_scope();
        assert_eq!(scope.resolve("x"), Some(Binding::Global(0)));
    }

    #[test]
    fn test_enclosing_function_locals_are_hidden() {
        let mut scope = Scope::new();
        scope.declare_variable("g");
        scope.declare_function("outer", 0);
        scope.begin_function();
        scope.declare_variable("a");
        scope.begin_function();
        assert_eq!(scope.resolve("a"), None);
        assert_eq!(scope.resolve("g"), Some(Binding::Global(0)));
        assert_eq!(scope.resolve("outer"), Some(Binding::Function(0)));
        scope.end_function();
        assert_eq!(scope.resolve("a"), Some(Binding::Local(0)));
        scope.end_function();
    }
}
