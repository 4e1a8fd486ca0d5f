//! Best-effort typing of a parsed file.
//!
//! The typer never rejects a program. It gives the generator enough to pick
//! the right syntax (member access style, string concatenation, constructor
//! calls) and falls back to [`Type::Any`] or [`Type::Unknown`] whenever it
//! cannot tell. Undeclared variables and missing fields are reported, but
//! typing carries on.

use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use crate::{
    ast::{
        BinaryOperator, CallArgument, ClassDecl, ClassKind, Expr, ExprKind, Field, FieldKind,
        FunctionDecl, Literal, MatchCase, Stmt, StmtKind, TypePath, UnaryOperator, UseKind,
    },
    context::Context,
    report::ErrorReporter,
    scope::Scopes,
    types::{builtins, Type, TypeTable},
};

/// Declared classes and functions, keyed by their `::`-joined qualified name
/// (without a leading `::`).
pub type Surface = HashMap<String, Type>;

/// The output of [`type_program`].
#[derive(Debug)]
pub struct TypedProgram {
    pub surface: Surface,
    pub table: TypeTable,
}

/// Inheritance chains deeper than this are treated as unknowable, which also
/// stops cyclic `extends`.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Records every declared class and function without descending into bodies.
pub fn type_surface(stmts: &[Stmt], reporter: &dyn ErrorReporter) -> Surface {
    let mut typer = Typer::new(None, reporter);
    typer.surface(stmts);
    debug!(declared = typer.surface.len(), "typed surface");
    typer.surface
}

/// Types the surface, then every statement and expression of the file.
///
/// Unresolved names go through `context`, which is seeded with this file's
/// surface afterwards.
pub fn type_program(
    stmts: &[Stmt],
    context: &mut Context,
    reporter: &dyn ErrorReporter,
) -> TypedProgram {
    let mut typer = Typer::new(Some(&mut *context), reporter);
    typer.surface(stmts);
    for stmt in stmts {
        typer.stmt(stmt);
    }
    let Typer { surface, table, .. } = typer;
    debug!(declared = surface.len(), exprs = table.len(), "typed program");

    context.add_types(surface.clone());
    TypedProgram { surface, table }
}

struct Typer<'c, 'r> {
    scopes: Scopes,
    ns: Vec<String>,
    surface: Surface,
    table: TypeTable,
    context: Option<&'c mut Context>,
    reporter: &'r dyn ErrorReporter,
}

impl<'c, 'r> Typer<'c, 'r> {
    fn new(context: Option<&'c mut Context>, reporter: &'r dyn ErrorReporter) -> Typer<'c, 'r> {
        Typer {
            scopes: Scopes::new(),
            ns: Vec::new(),
            surface: Surface::new(),
            table: TypeTable::with_capacity(256),
            context,
            reporter,
        }
    }

    fn surface(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Namespace { path, decls } => {
                    let prev = self.enter_namespace(path);
                    self.surface(decls);
                    self.ns = prev;
                }
                StmtKind::Class(class) => {
                    self.declare_surface(&class.name, Type::Class(Rc::clone(class)));
                }
                StmtKind::Function(func) => {
                    self.declare_surface(&func.name, Type::Fun(Rc::clone(func)));
                }
                _ => (),
            }
        }
    }

    fn declare_surface(&mut self, name: &str, ty: Type) {
        let qualified = TypePath::new(name).qualify(&self.ns).qualified_name();
        self.surface.insert(qualified, ty.clone());
        self.scopes.declare(name, ty);
    }

    fn enter_namespace(&mut self, path: &TypePath) -> Vec<String> {
        let mut ns = path.ns.clone();
        ns.push(path.name.clone());
        std::mem::replace(&mut self.ns, ns)
    }

    /// Runs `f` inside a fresh child scope.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push();
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Throw(expr) => {
                self.expr(expr);
            }
            StmtKind::Use { path, kind, .. } => self.use_decl(path, kind),
            StmtKind::Namespace { path, decls } => {
                let prev = self.enter_namespace(path);
                for decl in decls {
                    self.stmt(decl);
                }
                self.ns = prev;
            }
            StmtKind::Var { name, ty, init } => {
                let declared = ty.as_ref().map(|ty| self.resolve(ty));
                let inferred = init.as_ref().map(|init| self.expr(init));
                let ty = declared.or(inferred).unwrap_or(Type::Any);
                self.scopes.declare(name.as_str(), ty);
            }
            StmtKind::Global(name) => self.scopes.declare(name.as_str(), Type::Any),
            StmtKind::Try { body, catches } => self.scoped(|t| {
                t.stmt(body);
                for catch in catches {
                    t.stmt(catch);
                }
            }),
            StmtKind::Catch { name, ty, body } => self.scoped(|t| {
                let ty = ty.as_ref().map_or(Type::Any, |ty| t.resolve(ty));
                t.scopes.declare(name.as_str(), ty);
                t.stmt(body);
            }),
            StmtKind::While { cond, body, .. } => self.scoped(|t| {
                t.expr(cond);
                t.stmt(body);
            }),
            StmtKind::For {
                key,
                value,
                target,
                body,
            } => self.scoped(|t| {
                t.expr(target);
                let key_ty = match (&target.kind, value) {
                    (ExprKind::Range { .. }, None) => t.builtin(builtins::INT),
                    _ => Type::Any,
                };
                t.scopes.declare(key.as_str(), key_ty);
                if let Some(value) = value {
                    t.scopes.declare(value.as_str(), Type::Any);
                }
                t.stmt(body);
            }),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => self.scoped(|t| {
                t.expr(cond);
                t.scoped(|t| t.stmt(then));
                if let Some(otherwise) = otherwise {
                    t.scoped(|t| t.stmt(otherwise));
                }
            }),
            StmtKind::Switch { target, cases } => self.scoped(|t| {
                t.expr(target);
                t.cases(cases);
            }),
            StmtKind::Block(stmts) => self.scoped(|t| {
                for stmt in stmts {
                    t.stmt(stmt);
                }
            }),
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.expr(expr);
                }
            }
            StmtKind::Function(func) => {
                self.scopes
                    .declare(func.name.as_str(), Type::Fun(Rc::clone(func)));
                self.function(func);
            }
            StmtKind::Class(class) => self.class(class),
        }
    }

    fn cases(&mut self, cases: &[MatchCase]) {
        for case in cases {
            self.scoped(|t| {
                if let Some(condition) = &case.condition {
                    t.expr(condition);
                }
                for stmt in &case.body {
                    t.stmt(stmt);
                }
            });
        }
    }

    /// Binds imported names. Each one is looked up through the context, so
    /// it stays [`Type::Unknown`] when nothing declares it.
    fn use_decl(&mut self, path: &TypePath, kind: &UseKind) {
        match kind {
            UseKind::Normal => {
                let ty = self.load(path);
                self.scopes.declare(path.name.as_str(), ty);
            }
            UseKind::Alias(target) => {
                let ty = self.load(path);
                self.scopes.declare(target.name(), ty);
            }
            UseKind::Sub(targets) => {
                let mut ns = path.ns.clone();
                ns.push(path.name.clone());
                for target in targets {
                    let imported = TypePath {
                        ns: ns.clone(),
                        ..TypePath::new(target.name())
                    };
                    let ty = self.load(&imported);
                    self.scopes.declare(target.name(), ty);
                }
            }
        }
    }

    fn class(&mut self, class: &Rc<ClassDecl>) {
        self.scopes
            .declare(class.name.as_str(), Type::Class(Rc::clone(class)));
        self.scoped(|t| {
            let instance = Type::Instance(Rc::clone(class));
            t.scopes.declare("this", instance.clone());
            t.scopes.declare("static", instance);
            for attribute in &class.attributes {
                t.expr(attribute);
            }
            for field in &class.fields {
                t.field(field);
            }
        });
    }

    fn field(&mut self, field: &Field) {
        for attribute in &field.attributes {
            self.expr(attribute);
        }
        match &field.kind {
            FieldKind::Use(_) | FieldKind::Var { init: None, .. } => (),
            FieldKind::Var {
                init: Some(init), ..
            } => {
                self.expr(init);
            }
            FieldKind::Prop { getter, setter, .. } => {
                for accessor in [getter, setter].into_iter().flatten() {
                    self.function(accessor);
                }
            }
            FieldKind::Fun(func) => self.function(func),
        }
    }

    /// Types a function's parameters and body. Parameters without an
    /// annotation take the type of their default value.
    fn function(&mut self, func: &FunctionDecl) {
        self.scoped(|t| {
            for attribute in &func.attributes {
                t.expr(attribute);
            }
            for arg in &func.args {
                let declared = arg.ty.as_ref().map(|ty| t.resolve(ty));
                let inferred = arg.default.as_ref().map(|default| t.expr(default));
                let ty = declared.or(inferred).unwrap_or(Type::Any);
                t.scopes.declare(arg.name.as_str(), ty);
            }
            if let Some(body) = &func.body {
                t.stmt(body);
            }
        });
    }

    fn expr(&mut self, expr: &Expr) -> Type {
        let ty = self.expr_kind(expr);
        self.table.insert(expr.id, ty.clone());
        ty
    }

    fn expr_kind(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Attribute { args, .. } => {
                self.arguments(args);
                Type::Any
            }
            ExprKind::Assign { value, .. } => self.expr(value),
            ExprKind::Binary { lhs, op, rhs } => {
                let lhs = self.expr(lhs);
                self.expr(rhs);
                match op {
                    op if op.is_comparison() => self.builtin(builtins::BOOL),
                    BinaryOperator::Concat => self.builtin(builtins::STRING),
                    _ => lhs,
                }
            }
            ExprKind::Unary { op, expr, .. } => {
                let ty = self.expr(expr);
                match op {
                    UnaryOperator::Not => self.builtin(builtins::BOOL),
                    _ => ty,
                }
            }
            ExprKind::Is { expr, .. } => {
                self.expr(expr);
                self.builtin(builtins::BOOL)
            }
            ExprKind::Logical { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
                self.builtin(builtins::BOOL)
            }
            ExprKind::Range { from, to } => {
                self.expr(from);
                self.expr(to);
                self.builtin(builtins::INT)
            }
            ExprKind::Call { callee, args } => {
                let callee = self.expr(callee);
                self.arguments(args);
                self.call_result(&callee)
            }
            ExprKind::Get { target, field } => {
                let target = self.expr(target);
                match &field.kind {
                    ExprKind::Variable(name) => self.member(&target, name, field),
                    _ => {
                        self.expr(field);
                        Type::Any
                    }
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
                Type::Void
            }
            ExprKind::ArrayIndexGet { target, index } => {
                self.expr(target);
                if let Some(index) = index {
                    self.expr(index);
                }
                Type::Any
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
                Type::Void
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                let ty = self.expr(then);
                self.expr(otherwise);
                ty
            }
            ExprKind::Super { method } => self.super_member(method),
            ExprKind::Path(path) => self.resolve(path),
            ExprKind::This => self.class_binding("this", expr),
            ExprKind::Static => self.class_binding("static", expr),
            ExprKind::Grouping(inner) => self.expr(inner),
            ExprKind::Literal(literal) => self.builtin(match literal {
                Literal::String(_) => builtins::STRING,
                Literal::Number(_) => builtins::INT,
                Literal::True | Literal::False => builtins::BOOL,
                Literal::Null => builtins::NULL,
            }),
            ExprKind::ArrayLiteral { items, native } => {
                for item in items {
                    self.expr(item);
                }
                self.builtin(if *native {
                    builtins::NATIVE_ARRAY
                } else {
                    builtins::ARRAY
                })
            }
            ExprKind::MapLiteral { entries, native } => {
                for (key, value) in entries {
                    self.expr(key);
                    self.expr(value);
                }
                self.builtin(if *native {
                    builtins::NATIVE_MAP
                } else {
                    builtins::MAP
                })
            }
            ExprKind::Lambda(func) => {
                self.function(func);
                Type::Fun(Rc::clone(func))
            }
            ExprKind::Variable(name) => match self.scopes.resolve(name) {
                Some(ty) => ty.clone(),
                None => {
                    self.reporter
                        .report(&expr.pos, &format!("Undeclared variable: {name}"));
                    Type::Any
                }
            },
            ExprKind::Match { target, cases } => {
                self.expr(target);
                self.cases(cases);
                self.match_result(cases)
            }
        }
    }

    fn arguments(&mut self, args: &[CallArgument]) {
        for arg in args {
            self.expr(arg.value());
        }
    }

    /// Calling a function gives its return type, calling a class builds an
    /// instance. Unknown callees get one more resolution attempt.
    fn call_result(&mut self, callee: &Type) -> Type {
        match callee.non_null() {
            Type::Fun(func) => func
                .return_type
                .as_ref()
                .map_or(Type::Any, |ret| self.resolve(ret)),
            Type::Class(class) | Type::Instance(class) => Type::Instance(Rc::clone(class)),
            Type::Unknown(Some(path)) => match self.resolve(path) {
                ty @ (Type::Fun(_) | Type::Class(_) | Type::Instance(_)) => self.call_result(&ty),
                _ => Type::Any,
            },
            _ => Type::Any,
        }
    }

    fn member(&mut self, target: &Type, name: &str, field: &Expr) -> Type {
        let Some(class) = target.class().cloned() else {
            return Type::Any;
        };
        match self.field_type(&class, name, 0) {
            Some(ty) => ty,
            None => {
                let message = format!("The class {} does not have a field {name}", class.name);
                self.reporter.report(&field.pos, &message);
                Type::Any
            }
        }
    }

    /// Looks a field up on the class, its used traits and its ancestors.
    ///
    /// Returns `None` only when the whole hierarchy is known and lacks the
    /// field. Unresolvable ancestors make the lookup give up with
    /// [`Type::Any`].
    fn field_type(&mut self, class: &ClassDecl, name: &str, depth: usize) -> Option<Type> {
        let found = class
            .fields
            .iter()
            .find(|f| f.name == name && !matches!(f.kind, FieldKind::Use(_)));
        if let Some(field) = found {
            return Some(self.field_kind_type(&field.kind));
        }

        let mut parents: Vec<&TypePath> = class.superclass.iter().collect();
        parents.extend(class.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Use(path) => Some(path),
            _ => None,
        }));
        if class.kind == ClassKind::Interface {
            parents.extend(&class.interfaces);
        }

        for parent in parents {
            let parent = match self.resolve(parent) {
                Type::Class(parent) | Type::Instance(parent) if depth < MAX_INHERITANCE_DEPTH => {
                    parent
                }
                _ => return Some(Type::Any),
            };
            if let Some(ty) = self.field_type(&parent, name, depth + 1) {
                return Some(ty);
            }
        }
        None
    }

    fn field_kind_type(&mut self, kind: &FieldKind) -> Type {
        match kind {
            FieldKind::Use(_) => Type::Void,
            FieldKind::Var { ty, .. } | FieldKind::Prop { ty, .. } => {
                ty.as_ref().map_or(Type::Any, |ty| self.resolve(ty))
            }
            FieldKind::Fun(func) => Type::Fun(Rc::clone(func)),
        }
    }

    fn super_member(&mut self, method: &str) -> Type {
        let superclass = self
            .scopes
            .resolve("this")
            .and_then(Type::class)
            .and_then(|class| class.superclass.clone());
        let Some(superclass) = superclass else {
            return Type::Any;
        };
        match self.resolve(&superclass) {
            Type::Class(parent) | Type::Instance(parent) => {
                self.field_type(&parent, method, 1).unwrap_or(Type::Any)
            }
            _ => Type::Any,
        }
    }

    fn class_binding(&mut self, name: &str, expr: &Expr) -> Type {
        if let Some(ty) = self.scopes.resolve(name) {
            return ty.clone();
        }
        let message = format!("Used `{name}` outside of a class declaration");
        self.reporter.report(&expr.pos, &message);
        Type::Any
    }

    /// A match takes the type of the first arm that is a bare expression.
    fn match_result(&self, cases: &[MatchCase]) -> Type {
        cases
            .iter()
            .find_map(|case| match case.body.as_slice() {
                [Stmt {
                    kind: StmtKind::Expr(expr),
                    ..
                }] => self.table.type_of(expr).cloned(),
                _ => None,
            })
            .unwrap_or(Type::Any)
    }

    fn builtin(&mut self, name: &str) -> Type {
        self.resolve(&TypePath::new(name).absolute())
    }

    /// Resolves a path: first through the scope chain, then this file's
    /// surface (relative to the current namespace, then as written), and
    /// finally through the context.
    fn resolve(&mut self, path: &TypePath) -> Type {
        let ty = self.resolve_non_null(path);
        if path.is_nullable {
            Type::Nullable(Box::new(ty))
        } else {
            ty
        }
    }

    fn resolve_non_null(&mut self, path: &TypePath) -> Type {
        let name = path.qualified_name();
        if !path.is_absolute {
            if let Some(ty) = self.scopes.resolve(&name) {
                return ty.clone();
            }
        }

        let local = (!path.is_absolute && !self.ns.is_empty())
            .then(|| path.qualify(&self.ns).qualified_name());
        for candidate in local.iter().chain([&name]) {
            if let Some(ty) = self.surface.get(candidate) {
                return ty.clone();
            }
        }

        let Some(context) = self.context.as_deref_mut() else {
            return Type::Unknown(Some(TypePath {
                params: Vec::new(),
                is_nullable: false,
                ..path.clone()
            }));
        };
        if let Some(local) = &local {
            let ty = context.get_type(local, self.reporter);
            if ty.is_informative() {
                return ty;
            }
        }
        context.get_type(&name, self.reporter)
    }

    fn load(&mut self, path: &TypePath) -> Type {
        let absolute = path.clone().absolute();
        match self.context.as_deref_mut() {
            Some(context) => context.get_type(&absolute.qualified_name(), self.reporter),
            None => Type::Unknown(Some(absolute)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{parser, report::CollectingReporter, util::test_utils::tree_tests};

    fn parse(src: &str) -> Vec<Stmt> {
        let reporter = CollectingReporter::new();
        let stmts = parser::parse_source(src, "test.phs".into(), &reporter).unwrap();
        assert!(!reporter.has_errors());
        stmts
    }

    #[test]
    fn test_surface_qualifies_declarations() {
        let stmts = parse(
            "
            namespace App::Models {
              class User {}
              function make() {}
            }
            function main() {}
            ",
        );
        let reporter = CollectingReporter::new();
        let surface = type_surface(&stmts, &reporter);

        let mut names: Vec<_> = surface.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, ["App::Models::User", "App::Models::make", "main"]);
        assert!(matches!(surface["App::Models::User"], Type::Class(_)));
        assert!(matches!(surface["main"], Type::Fun(_)));
    }

    #[test]
    fn test_program_seeds_context() {
        let stmts = parse("class User {}\nvar u = User()");
        let reporter = CollectingReporter::new();
        let mut context = Context::default();
        let typed = type_program(&stmts, &mut context, &reporter);

        assert!(context.contains("User"));
        assert_eq!(typed.surface.len(), 1);
        assert!(!typed.table.is_empty());
    }

    #[test]
    fn test_retyping_is_idempotent() {
        let stmts = parse("var a = \"x\" + 1");
        let reporter = CollectingReporter::new();
        let first = type_program(&stmts, &mut Context::default(), &reporter);
        let second = type_program(&stmts, &mut Context::default(), &reporter);
        let StmtKind::Var { init: Some(init), .. } = &stmts[0].kind else {
            panic!("expected a var");
        };
        assert_eq!(first.table.type_of(init), second.table.type_of(init));
        assert_eq!(first.table.type_of(init), Some(&Type::builtin("String")));
    }

    tree_tests! {
        use typer;

        fn test_literals_and_operators() {
            let program = r#"
                var a = 1 + 2
                var b = "x" +++ a
                var c = a < 2 || !true
            "#;
            let tree_ok = r#"
                var a
                  binary + => ::Int
                    number 1 => ::Int
                    number 2 => ::Int
                var b
                  binary +++ => ::String
                    string "x" => ::String
                    variable a => ::Int
                var c
                  logical || => ::Bool
                    binary < => ::Bool
                      variable a => ::Int
                      number 2 => ::Int
                    unary ! => ::Bool
                      true => ::Bool
            "#;
        }

        fn test_annotation_wins_over_initializer() {
            let program = r#"
                var a: ?String = 1
                a
            "#;
            let tree_ok = "
                var a: ?String
                  number 1 => ::Int
                variable a => ?::String
            ";
        }

        fn test_collections() {
            let program = "
                var a = [1]
                var b = $[:]
                a[0]
            ";
            let tree_ok = "
                var a
                  array => ::Array
                    number 1 => ::Int
                var b
                  native map => ::NativeMap
                index => Any
                  variable a => ::Array
                  number 0 => ::Int
            ";
        }

        fn test_instances_and_members() {
            let program = "
                class User {
                  name: String
                  greet(): String { this.name }
                }
                var u = User()
                u.greet()
            ";
            let tree_ok = "
                class User
                  public var name: String
                  public fun greet(): String
                    block
                      return
                        get .name => ::String
                          this => User
                var u
                  call => User
                    path User => class User
                call => ::String
                  get .greet => fun greet
                    variable u => User
            ";
        }

        fn test_inherited_fields() {
            let program = "
                class Base {
                  id: Int
                }
                class Child extends Base {
                  show() { this.id }
                }
            ";
            let tree_ok = "
                class Base
                  public var id: Int
                class Child extends Base
                  public fun show()
                    block
                      return
                        get .id => ::Int
                          this => Child
            ";
        }

        fn test_unknown_ancestor_hides_missing_fields() {
            let program = "
                class Child extends Vendor::Base {
                  show() { this.id }
                }
            ";
            let tree_ok = "
                class Child extends Vendor::Base
                  public fun show()
                    block
                      return
                        get .id => Any
                          this => Child
            ";
        }

        fn test_missing_field() {
            let program = "
                class A {}
                var a = A()
                a.b
            ";
            let expected_errors = &["The class A does not have a field b"];
        }

        fn test_undeclared_variable() {
            let program = "var a = b + 1";
            let expected_errors = &["Undeclared variable: b"];
            let tree_error = "
                var a
                  binary + => Any
                    variable b => Any
                    number 1 => ::Int
            ";
        }

        fn test_this_outside_class() {
            let program = "this";
            let expected_errors = &["Used `this` outside of a class declaration"];
        }

        fn test_functions_and_lambdas() {
            let program = "
                function twice(x: Int): Int { x * 2 }
                var f = { |y| twice(y) }
                var g = function (n = 1) { n }
            ";
            let tree_ok = "
                function twice(x: Int): Int
                  block
                    return
                      binary * => ::Int
                        variable x => ::Int
                        number 2 => ::Int
                var f
                  lambda(y) => fun
                    block
                      return
                        call => ::Int
                          variable twice => fun twice
                          variable y => Any
                var g
                  lambda(n) => fun
                    default n
                      number 1 => ::Int
                    block
                      return
                        variable n => ::Int
            ";
        }

        fn test_loops_and_catch_bind_names() {
            let program = "
                for (i in 0...3) { i }
                for (k: v in $[]) { v }
                try {} catch (e: Failure) { e }
            ";
            let tree_ok = "
                for i in
                  range => ::Int
                    number 0 => ::Int
                    number 3 => ::Int
                  block
                    variable i => ::Int
                for k, v in
                  native array => ::NativeArray
                  block
                    variable v => Any
                try
                  block
                  catch e: Failure
                    block
                      variable e => ::Failure
            ";
        }

        fn test_use_binds_imports() {
            let program = "
                namespace App
                use Std::Io
                use Std::Text::{Printer, format}
                use Std::Json as Serializer
                Io
                Printer
                format
                Serializer
            ";
            let tree_ok = "
                namespace App
                  use Std::Io
                  use Std::Text::{Printer, format}
                  use Std::Json as Serializer
                  path Io => ::Std::Io
                  path Printer => ::Std::Text::Printer
                  variable format => ::Std::Text::format
                  path Serializer => ::Std::Json
            ";
        }

        fn test_namespace_relative_resolution() {
            let program = "
                namespace App {
                  class User {}
                  var a = User()
                  var b = ::App::User()
                }
            ";
            let tree_ok = "
                namespace App
                  class User
                  var a
                    call => User
                      path User => class User
                  var b
                    call => User
                      path ::App::User => class User
            ";
        }

        fn test_ternary_and_match() {
            let program = r#"
                var a = if (true) "a" else 1
                var b = match (a) {
                  1 -> 2
                  default -> 3
                }
            "#;
            let tree_ok = r#"
                var a
                  ternary => ::String
                    true => ::Bool
                    string "a" => ::String
                    number 1 => ::Int
                var b
                  match => ::Int
                    variable a => ::String
                    case
                      number 1 => ::Int
                      number 2 => ::Int
                    default
                      number 3 => ::Int
            "#;
        }
    }
}
