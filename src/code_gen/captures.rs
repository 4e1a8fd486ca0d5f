//! Free variables of closures, which PHP needs spelled out in `use (...)`.

use std::collections::HashSet;

use crate::ast::{CallArgument, Expr, ExprKind, FunctionDecl, MatchCase, Stmt, StmtKind};

use super::FunctionNames;

/// The variables `func` reads from its enclosing scope, in order of first
/// use. Parameters, locals and declared functions are not captures.
pub fn free_variables(func: &FunctionDecl, functions: &FunctionNames<'_>) -> Vec<String> {
    let mut walker = Walker::new(functions);
    walker.bind_all(func.args.iter().map(|arg| arg.name.as_str()));
    for arg in &func.args {
        if let Some(default) = &arg.default {
            walker.expr(default);
        }
    }
    if let Some(body) = &func.body {
        walker.stmt(body);
    }
    walker.free
}

/// Like [`free_variables`], for a parameterless body.
pub fn free_in_stmts(stmts: &[Stmt], functions: &FunctionNames<'_>) -> Vec<String> {
    let mut walker = Walker::new(functions);
    walker.stmts(stmts);
    walker.free
}

struct Walker<'t> {
    functions: &'t FunctionNames<'t>,
    bound: HashSet<String>,
    free: Vec<String>,
}

impl<'t> Walker<'t> {
    fn new(functions: &'t FunctionNames<'t>) -> Walker<'t> {
        Walker {
            functions,
            bound: HashSet::new(),
            free: Vec::new(),
        }
    }

    fn bind(&mut self, name: &str) {
        self.bound.insert(name.to_owned());
    }

    fn bind_all<'n>(&mut self, names: impl IntoIterator<Item = &'n str>) {
        for name in names {
            self.bind(name);
        }
    }

    fn reference(&mut self, name: &str) {
        if name == "this" || self.bound.contains(name) || self.free.iter().any(|n| n == name) {
            return;
        }
        self.free.push(name.to_owned());
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Throw(expr) => self.expr(expr),
            StmtKind::Var { name, init, .. } => {
                if let Some(init) = init {
                    self.expr(init);
                }
                self.bind(name);
            }
            StmtKind::Global(name) => self.bind(name),
            StmtKind::Try { body, catches } => {
                self.stmt(body);
                self.stmts(catches);
            }
            StmtKind::Catch { name, body, .. } => {
                self.bind(name);
                self.stmt(body);
            }
            StmtKind::While { cond, body, .. } => {
                self.expr(cond);
                self.stmt(body);
            }
            StmtKind::For {
                key,
                value,
                target,
                body,
            } => {
                self.expr(target);
                self.bind(key);
                if let Some(value) = value {
                    self.bind(value);
                }
                self.stmt(body);
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.stmt(then);
                if let Some(otherwise) = otherwise {
                    self.stmt(otherwise);
                }
            }
            StmtKind::Switch { target, cases } => {
                self.expr(target);
                self.cases(cases);
            }
            StmtKind::Block(stmts) => self.stmts(stmts),
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.expr(expr);
                }
            }
            // Named functions do not see the enclosing scope.
            StmtKind::Function(func) => self.bind(&func.name),
            StmtKind::Use { .. } | StmtKind::Namespace { .. } | StmtKind::Class(_) => {}
        }
    }

    fn cases(&mut self, cases: &[MatchCase]) {
        for case in cases {
            if let Some(condition) = &case.condition {
                self.expr(condition);
            }
            self.stmts(&case.body);
        }
    }

    fn args(&mut self, args: &[CallArgument]) {
        for arg in args {
            self.expr(arg.value());
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Variable(name) => {
                if !self.functions.contains(expr, name) {
                    self.reference(name);
                }
            }
            ExprKind::Assign { name, value } => {
                self.expr(value);
                self.reference(name);
            }
            ExprKind::Lambda(inner) => {
                for name in free_variables(inner, self.functions) {
                    self.reference(&name);
                }
            }
            ExprKind::Attribute { args, .. } => self.args(args),
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                self.args(args);
            }
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Range { from, to } => {
                self.expr(from);
                self.expr(to);
            }
            ExprKind::Unary { expr, .. } | ExprKind::Is { expr, .. } | ExprKind::Grouping(expr) => {
                self.expr(expr);
            }
            ExprKind::Get { target, field } => {
                self.expr(target);
                if field.as_variable().is_none() {
                    self.expr(field);
                }
            }
            ExprKind::Set {
                target,
                field,
                value,
            } => {
                self.expr(target);
                if field.as_variable().is_none() {
                    self.expr(field);
                }
                self.expr(value);
            }
            ExprKind::ArrayIndexGet { target, index } => {
                self.expr(target);
                if let Some(index) = index {
                    self.expr(index);
                }
            }
            ExprKind::ArrayIndexSet {
                target,
                index,
                value,
            } => {
                self.expr(target);
                if let Some(index) = index {
                    self.expr(index);
                }
                self.expr(value);
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.expr(then);
                self.expr(otherwise);
            }
            ExprKind::ArrayLiteral { items, .. } => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::MapLiteral { entries, .. } => {
                for (key, value) in entries {
                    self.expr(key);
                    self.expr(value);
                }
            }
            ExprKind::Match { target, cases } => {
                self.expr(target);
                self.cases(cases);
            }
            ExprKind::Super { .. }
            | ExprKind::Path(_)
            | ExprKind::This
            | ExprKind::Static
            | ExprKind::Literal(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{context::Context, parser, report::CollectingReporter, typer};

    fn lambda_captures(src: &str) -> Vec<String> {
        let reporter = CollectingReporter::new();
        let stmts = parser::parse_source(src, "test.phs".into(), &reporter).unwrap();
        let typed = typer::type_program(&stmts, &mut Context::default(), &reporter);
        let Some(Stmt {
            kind: StmtKind::Var {
                init: Some(init), ..
            },
            ..
        }) = stmts.last()
        else {
            panic!("expected a trailing var");
        };
        let ExprKind::Lambda(func) = &init.kind else {
            panic!("expected a lambda");
        };
        free_variables(func, &FunctionNames::new(&typed.table, &stmts))
    }

    #[test]
    fn test_params_and_locals_are_not_captured() {
        let captures = lambda_captures(indoc::indoc! {"
            var total = 0
            var step = 2
            var f = function (x) {
              var local = x + step
              return local + total + step
            }
        "});
        assert_eq!(captures, ["step", "total"]);
    }

    #[test]
    fn test_declared_functions_are_not_captured() {
        let captures = lambda_captures(indoc::indoc! {"
            function double(x) { x * 2 }
            var factor = 3
            var f = { |x| double(x) * factor }
        "});
        assert_eq!(captures, ["factor"]);
    }

    #[test]
    fn test_nested_lambdas_propagate_captures() {
        let captures = lambda_captures(indoc::indoc! {"
            var a = 1
            var b = 2
            var f = { |x| { |y| x + y + a + b } }
        "});
        assert_eq!(captures, ["a", "b"]);
    }
}
