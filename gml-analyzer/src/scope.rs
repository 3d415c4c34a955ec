use crate::cst::Position;
use crate::error::AnalysisError;
use crate::types::Type;

/// The three scopes a name can resolve against at one point in a file.
#[derive(Debug, Clone)]
pub struct ScopeTuple {
    pub local: Type,
    pub self_scope: Type,
    pub global: Type,
}

impl ScopeTuple {
    /// `self` aliases the global struct, as at the top level of a script.
    pub fn self_is_global(&self) -> bool {
        self.self_scope.ptr_eq(&self.global)
    }
}

/// The scope tuple active between two positions of a file.
#[derive(Debug, Clone)]
pub struct ScopeRange {
    pub start: Position,
    pub end: Position,
    pub scope: ScopeTuple,
}

impl ScopeRange {
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

/// Separate stacks for lexical (`local`) and dynamic (`self`) scopes. Each
/// push or pop closes the range opened by the previous boundary, so the
/// recorded ranges tile the file without gaps.
pub struct ScopeStack {
    global: Type,
    locals: Vec<Type>,
    selves: Vec<Type>,
    ranges: Vec<ScopeRange>,
    range_start: Position,
}

impl ScopeStack {
    pub fn new(global: Type, local: Type, start: Position) -> Self {
        Self {
            locals: vec![local],
            selves: vec![global.clone()],
            global,
            ranges: Vec::new(),
            range_start: start,
        }
    }

    pub fn global(&self) -> &Type {
        &self.global
    }

    pub fn local(&self) -> &Type {
        self.locals.last().unwrap_or(&self.global)
    }

    pub fn self_scope(&self) -> &Type {
        self.selves.last().unwrap_or(&self.global)
    }

    /// The self scope the current one replaced, used for `other`.
    pub fn other_scope(&self) -> &Type {
        match self.selves.len() {
            0 | 1 => self.self_scope(),
            len => &self.selves[len - 2],
        }
    }

    pub fn full_scope(&self) -> ScopeTuple {
        ScopeTuple {
            local: self.local().clone(),
            self_scope: self.self_scope().clone(),
            global: self.global.clone(),
        }
    }

    /// Enters a function: a fresh local scope and the function's self.
    pub fn push_scope(&mut self, at: Position, local: Type, self_scope: Type) {
        self.close_range(at);
        self.locals.push(local);
        self.selves.push(self_scope);
    }

    pub fn pop_scope(&mut self, at: Position) -> Result<(), AnalysisError> {
        if self.locals.len() < 2 || self.selves.len() < 2 {
            return Err(AnalysisError::invariant(
                "popped the root local scope",
                None,
            ));
        }
        self.close_range(at);
        self.locals.pop();
        self.selves.pop();
        Ok(())
    }

    /// Rebinds `self` without changing the local scope (`with`, struct
    /// literals).
    pub fn push_self_scope(&mut self, at: Position, self_scope: Type) {
        self.close_range(at);
        self.selves.push(self_scope);
    }

    pub fn pop_self_scope(&mut self, at: Position) -> Result<(), AnalysisError> {
        if self.selves.len() < 2 {
            return Err(AnalysisError::invariant(
                "popped the root self scope",
                None,
            ));
        }
        self.close_range(at);
        self.selves.pop();
        Ok(())
    }

    fn close_range(&mut self, at: Position) {
        if at > self.range_start {
            self.ranges.push(ScopeRange {
                start: self.range_start,
                end: at,
                scope: self.full_scope(),
            });
        }
        self.range_start = at;
    }

    /// Closes the last open range at the end of the file.
    pub fn finish(mut self, end: Position) -> Vec<ScopeRange> {
        self.close_range(end);
        self.ranges
    }

    pub fn depth(&self) -> usize {
        self.locals.len()
    }
}

/// Latest range containing `position`; ranges share their boundary point and
/// the later one owns it.
pub fn scope_at(ranges: &[ScopeRange], position: Position) -> Option<&ScopeRange> {
    ranges.iter().rev().find(|range| range.contains(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn at(line: usize, column: usize) -> Position {
        Position::new(0, line, column)
    }

    #[test]
    fn ranges_tile_the_file() {
        let global = Type::named(TypeKind::Struct, "global");
        let root = Type::new(TypeKind::Struct);
        let mut stack = ScopeStack::new(global.clone(), root.clone(), at(1, 0));

        let function_local = Type::new(TypeKind::Struct);
        let function_self = Type::new(TypeKind::Struct);
        stack.push_scope(at(2, 10), function_local.clone(), function_self.clone());
        assert!(!stack.full_scope().self_is_global());
        assert!(stack.other_scope().ptr_eq(&global));
        stack.pop_scope(at(4, 0)).expect("pop function scope");
        assert!(stack.full_scope().self_is_global());

        let ranges = stack.finish(at(6, 0));
        assert_eq!(ranges.len(), 3);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }

        let inside = scope_at(&ranges, at(3, 4)).expect("range inside function");
        assert!(inside.scope.local.ptr_eq(&function_local));
        assert!(inside.scope.self_scope.ptr_eq(&function_self));

        let after = scope_at(&ranges, at(5, 0)).expect("range after function");
        assert!(after.scope.local.ptr_eq(&root));
        assert!(after.scope.self_is_global());
    }

    #[test]
    fn popping_the_root_is_an_invariant_violation() {
        let global = Type::named(TypeKind::Struct, "global");
        let mut stack = ScopeStack::new(global, Type::new(TypeKind::Struct), at(1, 0));
        assert!(matches!(
            stack.pop_scope(at(1, 1)),
            Err(AnalysisError::Invariant { .. })
        ));
        assert!(stack.pop_self_scope(at(1, 1)).is_err());
    }
}
