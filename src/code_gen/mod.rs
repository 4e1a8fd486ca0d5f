//! PHP code generation from a typed syntax tree.
//!
//! Output is indented with four spaces and starts with the `<?php` tag. The
//! generator never fails: it leans on the [`TypeTable`] to pick between
//! syntaxes (`.` or `+`, `->` or `::`, `new` or a plain call) and falls back
//! to the most common form when a type is unknown.

use std::{
    collections::HashSet,
    fmt::{self, Write},
    format_args as f, mem,
    rc::Rc,
};

use tracing::{debug, trace};

use crate::{
    ast::{
        BinaryOperator, CallArgument, ClassDecl, ClassKind, Expr, ExprKind, Field, FieldAccess,
        FieldKind, FunctionArg, FunctionDecl, Literal, MatchCase, Stmt, StmtKind, TypePath,
        UnaryOperator, UseKind, UseTarget, CONSTRUCTOR_NAME,
    },
    context::Context,
    report::ErrorReporter,
    synth,
    types::{builtins, Type, TypeTable},
};

mod captures;
mod types;

#[cfg(test)]
mod tests;

pub use types::{php_name, php_type_path, PHASE_TO_PHP_TYPES};

const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

const INDENT: &str = "    ";

/// Inheritance chains deeper than this are not searched for members.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Property and return types and attributes are only emitted from PHP 8.
    pub php_version: u32,
}

impl GeneratorConfig {
    pub const DEFAULT_PHP_VERSION: u32 = 8;

    fn typed(&self) -> bool {
        self.php_version >= 8
    }
}

impl Default for GeneratorConfig {
    fn default() -> GeneratorConfig {
        GeneratorConfig {
            php_version: GeneratorConfig::DEFAULT_PHP_VERSION,
        }
    }
}

/// Generates a PHP file from typed statements.
pub fn generate(
    stmts: &[Stmt],
    types: &TypeTable,
    context: &mut Context,
    config: &GeneratorConfig,
    reporter: &dyn ErrorReporter,
) -> String {
    CodeGen::new(config, context, types, reporter).gen(stmts)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Root,
    Class,
    Interface,
    Trait,
    Closure,
    Function,
}

/// How a member is reached from its target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Access {
    /// `->name`
    Instance,
    /// `::NAME`
    Const,
    /// `::$name`
    StaticVar,
    /// `::name`
    StaticFun,
}

#[derive(Copy, Clone, Debug)]
struct Member {
    is_const: bool,
    is_static: bool,
    is_var: bool,
}

/// A statement placed before a function's own body.
enum Prologue<'s> {
    ParentConstructor,
    /// A deferred instance field initializer.
    Init(&'s str, &'s Expr),
    Stmt(Stmt),
}

/// Decides which variables name functions. PHP calls those without a `$`.
pub(crate) struct FunctionNames<'a> {
    types: &'a TypeTable,
    imported: HashSet<String>,
}

impl<'a> FunctionNames<'a> {
    pub(crate) fn new(types: &'a TypeTable, stmts: &[Stmt]) -> FunctionNames<'a> {
        let mut imported = HashSet::new();
        collect_imported_functions(stmts, &mut imported);
        FunctionNames { types, imported }
    }

    /// A variable names a function when it resolves to the function declared
    /// under that same name, or to something imported as a function.
    pub(crate) fn contains(&self, expr: &Expr, name: &str) -> bool {
        match self.types.type_of(expr) {
            Some(Type::Fun(func)) => func.name == name,
            Some(Type::Unknown(Some(_))) => self.imported.contains(name),
            _ => false,
        }
    }
}

fn collect_imported_functions(stmts: &[Stmt], imported: &mut HashSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Namespace { decls, .. } => collect_imported_functions(decls, imported),
            StmtKind::Use { path, kind, .. } => match kind {
                UseKind::Normal if starts_lowercase(&path.name) => {
                    imported.insert(path.name.clone());
                }
                UseKind::Normal => {}
                UseKind::Alias(target) => {
                    if let UseTarget::Function(name) = target {
                        imported.insert(name.clone());
                    }
                }
                UseKind::Sub(targets) => {
                    imported.extend(targets.iter().filter_map(|target| match target {
                        UseTarget::Function(name) => Some(name.clone()),
                        UseTarget::Type(_) => None,
                    }));
                }
            },
            _ => {}
        }
    }
}

pub struct CodeGen<'a> {
    code: String,
    indent: usize,
    mode: Mode,
    ns: Vec<String>,
    functions: FunctionNames<'a>,
    config: &'a GeneratorConfig,
    context: &'a mut Context,
    types: &'a TypeTable,
    reporter: &'a dyn ErrorReporter,
}

impl<'a> CodeGen<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        context: &'a mut Context,
        types: &'a TypeTable,
        reporter: &'a dyn ErrorReporter,
    ) -> CodeGen<'a> {
        CodeGen {
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            indent: 0,
            mode: Mode::Root,
            ns: Vec::new(),
            functions: FunctionNames {
                types,
                imported: HashSet::new(),
            },
            config,
            context,
            types,
            reporter,
        }
    }

    pub fn gen(mut self, stmts: &[Stmt]) -> String {
        self.functions = FunctionNames::new(self.types, stmts);
        self.emit(f!("<?php\n"));
        for stmt in stmts {
            self.stmt(stmt);
            self.emit(f!("\n"));
        }
        debug!(bytes = self.code.len(), php_version = self.config.php_version, "generated php");

        self.code
    }
}

// Statements.
impl CodeGen<'_> {
    /// Emits a statement at the current indentation, without a trailing
    /// newline.
    fn stmt(&mut self, stmt: &Stmt) {
        self.emit_indent();
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.expr(expr);
                self.emit(f!(";"));
            }
            StmtKind::Use { path, kind, .. } => self.use_decl(path, kind),
            StmtKind::Namespace { path, decls } => {
                self.emit(f!("namespace {} {{", php_name(path)));
                let mut ns = path.ns.clone();
                ns.push(path.name.clone());
                let outer = mem::replace(&mut self.ns, ns);
                self.indented(|g| {
                    for decl in decls {
                        g.emit(f!("\n"));
                        g.stmt(decl);
                    }
                });
                self.ns = outer;
                self.newline();
                self.emit(f!("}}"));
            }
            StmtKind::Var { name, init, .. } => {
                self.emit(f!("${name} = "));
                match init {
                    Some(init) => self.expr(init),
                    None => self.emit(f!("null")),
                }
                self.emit(f!(";"));
            }
            StmtKind::Global(name) => self.emit(f!("global ${name};")),
            StmtKind::Throw(expr) => {
                self.emit(f!("throw "));
                self.expr(expr);
                self.emit(f!(";"));
            }
            StmtKind::Try { body, catches } => {
                self.emit(f!("try"));
                self.body(body);
                for catch in catches {
                    self.emit(f!("\n"));
                    self.stmt(catch);
                }
            }
            StmtKind::Catch { name, ty, body } => {
                let ty = ty
                    .as_ref()
                    .map_or_else(|| "\\Throwable".to_owned(), php_type_path);
                self.emit(f!("catch ({ty} ${name})"));
                self.body(body);
            }
            StmtKind::While {
                cond,
                body,
                inverted: false,
            } => {
                self.emit(f!("while ("));
                self.expr(cond);
                self.emit(f!(")"));
                self.body(body);
            }
            StmtKind::While {
                cond,
                body,
                inverted: true,
            } => {
                self.emit(f!("do"));
                self.body(body);
                self.newline();
                self.emit(f!("while ("));
                self.expr(cond);
                self.emit(f!(");"));
            }
            StmtKind::For {
                key,
                value,
                target,
                body,
            } => {
                match (&target.kind, value) {
                    (ExprKind::Range { from, to }, None) => {
                        self.emit(f!("for (${key} = "));
                        self.expr(from);
                        self.emit(f!("; ${key} < "));
                        self.expr(to);
                        self.emit(f!("; ${key}++)"));
                    }
                    _ => {
                        self.emit(f!("foreach ("));
                        self.expr(target);
                        self.emit(f!(" as ${key}"));
                        if let Some(value) = value {
                            self.emit(f!(" => ${value}"));
                        }
                        self.emit(f!(")"));
                    }
                }
                self.body(body);
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.emit(f!("if ("));
                self.expr(cond);
                self.emit(f!(")"));
                self.body(then);
                if let Some(otherwise) = otherwise {
                    self.newline();
                    self.emit(f!("else"));
                    self.body(otherwise);
                }
            }
            StmtKind::Switch { target, cases } => self.switch(target, cases),
            StmtKind::Block(stmts) => self.block(stmts),
            StmtKind::Return(None) => self.emit(f!("return;")),
            StmtKind::Return(Some(expr)) => {
                self.emit(f!("return "));
                self.expr(expr);
                self.emit(f!(";"));
            }
            StmtKind::Function(func) => self.function(func),
            StmtKind::Class(class) => self.class(class),
        }
    }

    /// Emits the body of a control statement on its own line.
    fn body(&mut self, body: &Stmt) {
        self.emit(f!("\n"));
        if matches!(body.kind, StmtKind::Block(_)) {
            self.stmt(body);
        } else {
            self.indented(|g| g.stmt(body));
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.block_with(&[], stmts);
    }

    fn block_with(&mut self, prologue: &[Prologue<'_>], stmts: &[Stmt]) {
        self.emit(f!("{{"));
        self.indented(|g| {
            for line in prologue {
                g.prologue(line);
            }
            for stmt in stmts {
                g.emit(f!("\n"));
                g.stmt(stmt);
            }
        });
        self.newline();
        self.emit(f!("}}"));
    }

    fn prologue(&mut self, line: &Prologue<'_>) {
        match line {
            Prologue::ParentConstructor => {
                self.newline();
                self.emit(f!("parent::__construct(...$args);"));
            }
            Prologue::Init(name, init) => {
                self.newline();
                self.emit(f!("$this->{name} = "));
                self.expr(init);
                self.emit(f!(";"));
            }
            Prologue::Stmt(stmt) => {
                self.emit(f!("\n"));
                self.stmt(stmt);
            }
        }
    }

    fn use_decl(&mut self, path: &TypePath, kind: &UseKind) {
        let name = php_name(path);
        match kind {
            UseKind::Normal => {
                let function = if starts_lowercase(&path.name) { "function " } else { "" };
                self.emit(f!("use {function}{name};"));
            }
            UseKind::Alias(target) => {
                let function = match target {
                    UseTarget::Function(_) => "function ",
                    UseTarget::Type(_) => "",
                };
                self.emit(f!("use {function}{name} as {};", target.name()));
            }
            UseKind::Sub(targets) => {
                let (functions, types): (Vec<&UseTarget>, Vec<&UseTarget>) = targets
                    .iter()
                    .partition(|target| matches!(target, UseTarget::Function(_)));
                let groups = [("", types), ("function ", functions)];
                for (i, (prefix, group)) in groups.iter().filter(|(_, g)| !g.is_empty()).enumerate() {
                    if i > 0 {
                        self.newline();
                    }
                    let names: Vec<&str> = group.iter().map(|target| target.name()).collect();
                    match names.as_slice() {
                        [single] => self.emit(f!("use {prefix}{name}\\{single};")),
                        names => self.emit(f!("use {prefix}{name}\\{{{}}};", names.join(", "))),
                    }
                }
            }
        }
    }

    fn switch(&mut self, target: &Expr, cases: &[MatchCase]) {
        self.emit(f!("switch ("));
        self.expr(target);
        self.emit(f!(")"));
        self.newline();
        self.emit(f!("{{"));
        self.indented(|g| {
            for case in cases {
                g.newline();
                match &case.condition {
                    Some(condition) => {
                        g.emit(f!("case "));
                        g.expr(condition);
                        g.emit(f!(":"));
                    }
                    None => g.emit(f!("default:")),
                }
                g.indented(|g| {
                    for stmt in &case.body {
                        g.emit(f!("\n"));
                        g.stmt(stmt);
                    }
                    g.newline();
                    g.emit(f!("break;"));
                });
            }
        });
        self.newline();
        self.emit(f!("}}"));
    }

    fn function(&mut self, func: &FunctionDecl) {
        self.attributes(&func.attributes);
        self.emit(f!("function {}(", func.name));
        self.params(&func.args, false);
        self.emit(f!(")"));
        self.return_type(func.return_type.as_ref());
        self.newline();
        self.with_mode(Mode::Function, |g| g.function_body(func, &[]));
    }

    fn function_body(&mut self, func: &FunctionDecl, prologue: &[Prologue<'_>]) {
        match func.body.as_deref() {
            Some(Stmt {
                kind: StmtKind::Block(stmts),
                ..
            }) => self.block_with(prologue, stmts),
            Some(body) => self.block_with(prologue, std::slice::from_ref(body)),
            None => self.block_with(prologue, &[]),
        }
    }

    fn params(&mut self, args: &[FunctionArg], is_lambda: bool) {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.emit(f!(", "));
            }
            if let Some(ty) = &arg.ty {
                self.emit(f!("{} ", php_type_path(ty)));
            }
            self.emit(f!("${}", arg.name));
            match &arg.default {
                Some(default) => {
                    self.emit(f!(" = "));
                    self.expr(default);
                }
                None if is_lambda && arg.ty.is_none() => self.emit(f!(" = null")),
                None => {}
            }
        }
    }

    fn return_type(&mut self, ty: Option<&TypePath>) {
        if let Some(ty) = ty.filter(|_| self.config.typed()) {
            self.emit(f!(": {}", php_type_path(ty)));
        }
    }

    /// Emits `#[...]` on its own line, followed by the indentation of the
    /// declaration it belongs to.
    fn attributes(&mut self, attributes: &[Expr]) {
        if attributes.is_empty() || !self.config.typed() {
            return;
        }
        self.emit(f!("#["));
        self.comma_separated(attributes);
        self.emit(f!("]"));
        self.newline();
    }
}

// Classes.
impl CodeGen<'_> {
    fn class(&mut self, class: &ClassDecl) {
        trace!(class = %class.name, "generating class");
        self.attributes(&class.attributes);
        let is_abstract = class.fields.iter().any(|f| f.has(FieldAccess::Abstract));
        let (keyword, mode) = match class.kind {
            ClassKind::Class if is_abstract => ("abstract class", Mode::Class),
            ClassKind::Class => ("class", Mode::Class),
            ClassKind::Interface => ("interface", Mode::Interface),
            ClassKind::Trait => ("trait", Mode::Trait),
        };
        self.emit(f!("{keyword} {}", class.name));
        if let Some(superclass) = &class.superclass {
            self.emit(f!(" extends {}", php_type_path(superclass)));
        }
        if !class.interfaces.is_empty() {
            let keyword = if mode == Mode::Interface { "extends" } else { "implements" };
            let names: Vec<String> = class.interfaces.iter().map(php_type_path).collect();
            self.emit(f!(" {keyword} {}", names.join(", ")));
        }
        self.newline();
        self.emit(f!("{{"));
        let statics = self.with_mode(mode, |g| g.indented(|g| g.members(class)));
        self.newline();
        self.emit(f!("}}"));

        for (name, init) in statics {
            self.newline();
            self.emit(f!("{}::${name} = ", class.name));
            self.expr(init);
            self.emit(f!(";"));
        }
    }

    /// Emits the constructor first, then every other member in order.
    /// Returns the static initializers PHP cannot evaluate in place, which
    /// run after the class is declared.
    fn members<'c>(&mut self, class: &'c ClassDecl) -> Vec<(&'c str, &'c Expr)> {
        let mut inits = Vec::new();
        let mut statics = Vec::new();
        if self.mode != Mode::Interface {
            for field in &class.fields {
                let FieldKind::Var { init: Some(init), .. } = &field.kind else {
                    continue;
                };
                if field.has(FieldAccess::Const) || is_constant(init) {
                    continue;
                }
                if field.has(FieldAccess::Static) {
                    statics.push((field.name.as_str(), init));
                } else {
                    inits.push((field.name.as_str(), init));
                }
            }
        }

        let constructor = class.constructor();
        match constructor {
            Some(field) => {
                self.newline();
                self.field(field, &inits);
            }
            None if !inits.is_empty() => {
                self.newline();
                self.synthesized_constructor(class, &inits);
            }
            None => {}
        }

        let mut has_props = false;
        for field in &class.fields {
            if constructor.is_some_and(|c| std::ptr::eq(c, field)) {
                continue;
            }
            let is_state = matches!(field.kind, FieldKind::Var { .. } | FieldKind::Prop { .. });
            if self.mode == Mode::Interface && is_state {
                continue;
            }
            has_props |= matches!(field.kind, FieldKind::Prop { .. });
            self.newline();
            self.field(field, &[]);
        }
        if has_props {
            self.property_dispatchers();
        }
        statics
    }

    fn field(&mut self, field: &Field, inits: &[(&str, &Expr)]) {
        self.attributes(&field.attributes);
        let access = self.access(field);
        match &field.kind {
            FieldKind::Use(path) => self.emit(f!("use {};", php_type_path(path))),
            FieldKind::Var { ty, init } => {
                let is_const = field.has(FieldAccess::Const);
                let mut head = access;
                if is_const {
                    push_word(&mut head, &field.name);
                } else {
                    if let Some(ty) = ty.as_ref().filter(|_| self.config.typed()) {
                        push_word(&mut head, &php_type_path(ty));
                    }
                    push_word(&mut head, &format!("${}", field.name));
                }
                self.emit(f!("{head}"));
                match init {
                    Some(init) if is_const || is_constant(init) => {
                        self.emit(f!(" = "));
                        self.expr(init);
                    }
                    None if ty.as_ref().is_some_and(|ty| ty.is_nullable) => {
                        self.emit(f!(" = null"));
                    }
                    _ => {}
                }
                self.emit(f!(";"));
            }
            FieldKind::Prop { ty, getter, setter } => {
                if let Some(getter) = getter {
                    self.emit(f!("{access} function __get_{}()", field.name));
                    self.return_type(ty.as_ref());
                    self.newline();
                    self.with_mode(Mode::Function, |g| g.function_body(getter, &[]));
                }
                if let Some(setter) = setter {
                    if getter.is_some() {
                        self.newline();
                    }
                    self.emit(f!("{access} function __set_{}(", field.name));
                    self.params(&setter.args, false);
                    self.emit(f!(")"));
                    self.newline();
                    self.with_mode(Mode::Function, |g| g.function_body(setter, &[]));
                }
            }
            FieldKind::Fun(func) => {
                let is_constructor = field.name == CONSTRUCTOR_NAME;
                let name = php_method_name(&field.name);
                self.emit(f!("{access} function {name}("));
                self.params(&func.args, false);
                self.emit(f!(")"));
                if !is_constructor {
                    self.return_type(func.return_type.as_ref());
                }
                let is_abstract = field.has(FieldAccess::Abstract) || self.mode == Mode::Interface;
                if is_abstract || func.body.is_none() {
                    self.emit(f!(";"));
                    return;
                }

                let mut prologue: Vec<Prologue<'_>> = inits
                    .iter()
                    .map(|&(name, init)| Prologue::Init(name, init))
                    .collect();
                if is_constructor {
                    prologue.extend(self.missing_promotions(func));
                }
                self.newline();
                self.with_mode(Mode::Function, |g| g.function_body(func, &prologue));
            }
        }
    }

    fn access(&self, field: &Field) -> String {
        let words: Vec<&str> = field
            .access
            .iter()
            .filter_map(|access| match access {
                FieldAccess::Abstract if self.mode == Mode::Interface => None,
                FieldAccess::Private => Some("protected"),
                FieldAccess::Public => Some("public"),
                FieldAccess::Static => Some("static"),
                FieldAccess::Const => Some("const"),
                FieldAccess::Abstract => Some("abstract"),
            })
            .collect();
        words.join(" ")
    }

    /// Promoted parameters whose `this.name = name` assignment is not in the
    /// constructor body.
    fn missing_promotions<'s>(&self, func: &FunctionDecl) -> Vec<Prologue<'s>> {
        func.args
            .iter()
            .filter(|arg| arg.is_constructor_init && !assigns_field(func, &arg.name))
            .filter_map(|arg| {
                let code = format!("this.{0} = {0}", arg.name);
                synth::generate_stmt(&code, &arg.pos, self.reporter).ok()
            })
            .map(Prologue::Stmt)
            .collect()
    }

    fn synthesized_constructor(&mut self, class: &ClassDecl, inits: &[(&str, &Expr)]) {
        self.emit(f!("public function __construct(...$args)"));
        self.newline();
        let mut prologue = Vec::with_capacity(inits.len() + 1);
        if class.superclass.is_some() {
            prologue.push(Prologue::ParentConstructor);
        }
        prologue.extend(inits.iter().map(|&(name, init)| Prologue::Init(name, init)));
        self.with_mode(Mode::Function, |g| g.block_with(&prologue, &[]));
    }

    /// Routes property reads and writes to the `__get_name` and
    /// `__set_name` accessors.
    fn property_dispatchers(&mut self) {
        self.newline();
        self.emit(f!("public function __get($name)"));
        self.newline();
        self.emit(f!("{{"));
        self.indented(|g| {
            g.newline();
            g.emit(f!("return $this->{{\"__get_\" . $name}}();"));
        });
        self.newline();
        self.emit(f!("}}"));

        self.newline();
        self.emit(f!("public function __set($name, $value)"));
        self.newline();
        self.emit(f!("{{"));
        self.indented(|g| {
            g.newline();
            g.emit(f!("$this->{{\"__set_\" . $name}}($value);"));
        });
        self.newline();
        self.emit(f!("}}"));
    }
}

// Expressions.
impl CodeGen<'_> {
    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Attribute { path, args } => {
                self.emit(f!("{}", php_type_path(path)));
                if !args.is_empty() {
                    self.call_args(args);
                }
            }
            ExprKind::Assign { name, value } => {
                self.emit(f!("${name} = "));
                self.expr(value);
            }
            ExprKind::Binary { lhs, op, rhs } => {
                let op = match op {
                    BinaryOperator::Add if self.is_string(lhs) => ".",
                    op => php_operator(*op),
                };
                self.expr(lhs);
                self.emit(f!(" {op} "));
                self.expr(rhs);
            }
            ExprKind::Unary { op, expr, prefix } => {
                if *prefix {
                    self.emit(f!("{op}"));
                    // `- -x` must not become the decrement `--$x`.
                    if merges_with_prefix(*op, expr) {
                        self.grouped(expr);
                    } else {
                        self.expr(expr);
                    }
                } else {
                    self.expr(expr);
                    self.emit(f!("{op}"));
                }
            }
            ExprKind::Is { expr, ty } => self.is_check(expr, ty),
            ExprKind::Logical { lhs, op, rhs } => {
                self.expr(lhs);
                self.emit(f!(" {op} "));
                self.expr(rhs);
            }
            ExprKind::Range { from, to } => {
                self.emit(f!("\\range("));
                self.expr(from);
                self.emit(f!(", "));
                self.expr(to);
                self.emit(f!(" - 1)"));
            }
            ExprKind::Call { callee, args } => self.call(callee, args),
            ExprKind::Get { target, field } => self.member(target, field, true),
            ExprKind::Set {
                target,
                field,
                value,
            } => {
                self.member(target, field, false);
                self.emit(f!(" = "));
                self.expr(value);
            }
            ExprKind::ArrayIndexGet { target, index } => self.index(target, index.as_deref()),
            ExprKind::ArrayIndexSet {
                target,
                index,
                value,
            } => {
                self.index(target, index.as_deref());
                self.emit(f!(" = "));
                self.expr(value);
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.ternary_operand(cond);
                self.emit(f!(" ? "));
                self.ternary_operand(then);
                self.emit(f!(" : "));
                self.ternary_operand(otherwise);
            }
            ExprKind::Super { method } => self.emit(f!("parent::{}", php_method_name(method))),
            ExprKind::Path(path) => self.emit(f!("{}", php_type_path(path))),
            ExprKind::This => self.emit(f!("$this")),
            ExprKind::Static => self.emit(f!("static")),
            ExprKind::Grouping(inner) => self.grouped(inner),
            ExprKind::Literal(literal) => self.literal(literal),
            ExprKind::ArrayLiteral { items, native } => {
                if !native {
                    self.emit(f!("new \\Std\\PhaseArray("));
                }
                self.emit(f!("["));
                self.comma_separated(items);
                self.emit(f!("]"));
                if !native {
                    self.emit(f!(")"));
                }
            }
            ExprKind::MapLiteral { entries, native } => {
                if !native {
                    self.emit(f!("new \\Std\\PhaseMap("));
                }
                self.map_entries(entries);
                if !native {
                    self.emit(f!(")"));
                }
            }
            ExprKind::Lambda(func) => self.lambda(func),
            ExprKind::Variable(name) if self.functions.contains(expr, name) => {
                self.emit(f!("{name}(...)"));
            }
            ExprKind::Variable(name) => self.emit(f!("${name}")),
            ExprKind::Match { target, cases } => self.match_expr(target, cases),
        }
    }

    /// PHP 8 rejects unparenthesized nested ternaries.
    fn ternary_operand(&mut self, operand: &Expr) {
        if matches!(operand.kind, ExprKind::Ternary { .. }) {
            self.grouped(operand);
        } else {
            self.expr(operand);
        }
    }

    fn grouped(&mut self, expr: &Expr) {
        self.emit(f!("("));
        self.expr(expr);
        self.emit(f!(")"));
    }

    fn literal(&mut self, literal: &Literal) {
        match literal {
            Literal::String(value) => self.emit(f!("\"{}\"", escape_string(value))),
            Literal::Number(number) => self.emit(f!("{number}")),
            Literal::True => self.emit(f!("true")),
            Literal::False => self.emit(f!("false")),
            Literal::Null => self.emit(f!("null")),
        }
    }

    fn call(&mut self, callee: &Expr, args: &[CallArgument]) {
        match &callee.kind {
            ExprKind::Super { method } => self.emit(f!("parent::{}", php_method_name(method))),
            ExprKind::Path(_) => {
                self.emit(f!("new "));
                self.expr(callee);
            }
            ExprKind::Variable(name) if self.functions.contains(callee, name) => {
                self.emit(f!("{name}"));
            }
            _ if matches!(self.type_of(callee).non_null(), Type::Class(_)) => {
                self.emit(f!("new "));
                self.expr(callee);
            }
            _ => self.expr(callee),
        }
        self.call_args(args);
    }

    fn call_args(&mut self, args: &[CallArgument]) {
        self.emit(f!("("));
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.emit(f!(", "));
            }
            match arg {
                CallArgument::Positional(value) => self.expr(value),
                CallArgument::Named { name, value } => {
                    self.emit(f!("{name}: "));
                    self.expr(value);
                }
            }
        }
        self.emit(f!(")"));
    }

    /// Emits `target->field` or one of its static forms. Reads through a
    /// string go through the runtime string wrapper.
    fn member(&mut self, target: &Expr, field: &Expr, wrap_strings: bool) {
        let Some(name) = field.as_variable() else {
            self.expr(target);
            self.emit(f!("->{{"));
            self.expr(field);
            self.emit(f!("}}"));
            return;
        };
        if wrap_strings && self.is_string(target) {
            self.emit(f!("\\Std\\PhaseString::wrap("));
            self.expr(target);
            self.emit(f!(")->{name}"));
            return;
        }
        let access = self.member_access(target, name);
        self.expr(target);
        match access {
            Access::Instance => self.emit(f!("->{name}")),
            Access::Const | Access::StaticFun => self.emit(f!("::{name}")),
            Access::StaticVar => self.emit(f!("::${name}")),
        }
    }

    fn member_access(&mut self, target: &Expr, name: &str) -> Access {
        let ty = self.type_of(target);
        let is_static_target = matches!(target.kind, ExprKind::Path(_) | ExprKind::Static)
            || matches!(ty.non_null(), Type::Class(_));
        let member = match ty.class() {
            Some(class) => self.find_member(class, name, 0),
            None => None,
        };
        match member {
            Some(Member { is_const: true, .. }) => Access::Const,
            Some(Member {
                is_static, is_var, ..
            }) if is_static || is_static_target => {
                if is_var {
                    Access::StaticVar
                } else {
                    Access::StaticFun
                }
            }
            Some(_) => Access::Instance,
            None if is_static_target && starts_uppercase(name) => Access::Const,
            None if is_static_target => Access::StaticFun,
            None => Access::Instance,
        }
    }

    /// Looks `name` up on the class, then its superclass, interfaces and
    /// used traits.
    fn find_member(&mut self, class: &ClassDecl, name: &str, depth: usize) -> Option<Member> {
        let own = class
            .fields
            .iter()
            .find(|f| f.name == name && !matches!(f.kind, FieldKind::Use(_)));
        if let Some(field) = own {
            return Some(Member {
                is_const: field.has(FieldAccess::Const),
                is_static: field.has(FieldAccess::Static),
                is_var: matches!(field.kind, FieldKind::Var { .. } | FieldKind::Prop { .. }),
            });
        }
        if depth >= MAX_INHERITANCE_DEPTH {
            return None;
        }
        let traits = class.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Use(path) => Some(path),
            _ => None,
        });
        let parents: Vec<&TypePath> = class
            .superclass
            .iter()
            .chain(&class.interfaces)
            .chain(traits)
            .collect();
        for parent in parents {
            let Some(parent) = self.lookup_class(parent) else {
                continue;
            };
            if let Some(member) = self.find_member(&parent, name, depth + 1) {
                return Some(member);
            }
        }
        None
    }

    fn lookup_class(&mut self, path: &TypePath) -> Option<Rc<ClassDecl>> {
        if !path.is_absolute && !self.ns.is_empty() {
            let qualified = path.qualify(&self.ns).qualified_name();
            if self.context.contains(&qualified) {
                let class = self.context.get_type(&qualified, self.reporter).class().cloned();
                if class.is_some() {
                    return class;
                }
            }
        }
        self.context
            .get_type(&path.qualified_name(), self.reporter)
            .class()
            .cloned()
    }

    fn index(&mut self, target: &Expr, index: Option<&Expr>) {
        self.expr(target);
        self.emit(f!("["));
        if let Some(index) = index {
            self.expr(index);
        }
        self.emit(f!("]"));
    }

    fn is_check(&mut self, expr: &Expr, ty: &TypePath) {
        let check = match ty.name.as_str() {
            _ if !ty.ns.is_empty() => None,
            builtins::STRING => Some("is_string"),
            builtins::INT => Some("is_int"),
            builtins::BOOL => Some("is_bool"),
            builtins::NULL => Some("is_null"),
            _ => None,
        };
        match check {
            Some(check) => {
                self.emit(f!("\\{check}("));
                self.expr(expr);
                self.emit(f!(")"));
            }
            None => {
                self.expr(expr);
                self.emit(f!(" instanceof {}", php_type_path(ty)));
            }
        }
    }

    fn map_entries(&mut self, entries: &[(Expr, Expr)]) {
        if entries.is_empty() {
            self.emit(f!("[]"));
            return;
        }
        self.emit(f!("["));
        self.indented(|g| {
            for (key, value) in entries {
                g.newline();
                g.expr(key);
                g.emit(f!(" => "));
                g.expr(value);
                g.emit(f!(","));
            }
        });
        self.newline();
        self.emit(f!("]"));
    }

    fn lambda(&mut self, func: &FunctionDecl) {
        let captures = captures::free_variables(func, &self.functions);
        self.emit(f!("function ("));
        self.params(&func.args, true);
        self.emit(f!(")"));
        self.captures(&captures);
        self.return_type(func.return_type.as_ref());
        self.emit(f!(" "));
        self.with_mode(Mode::Closure, |g| g.function_body(func, &[]));
    }

    fn captures(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let names: Vec<String> = names.iter().map(|name| format!("${name}")).collect();
        self.emit(f!(" use ({})", names.join(", ")));
    }

    fn match_expr(&mut self, target: &Expr, cases: &[MatchCase]) {
        self.emit(f!("match ("));
        self.expr(target);
        self.emit(f!(") {{"));
        self.indented(|g| {
            for case in cases {
                g.newline();
                match &case.condition {
                    Some(condition) => g.expr(condition),
                    None => g.emit(f!("default")),
                }
                g.emit(f!(" => "));
                g.match_arm(&case.body);
                g.emit(f!(","));
            }
        });
        self.newline();
        self.emit(f!("}}"));
    }

    /// Arms are expressions in PHP. Anything but a single expression, return
    /// or throw becomes an immediately invoked closure.
    fn match_arm(&mut self, body: &[Stmt]) {
        match body {
            [Stmt {
                kind: StmtKind::Expr(expr) | StmtKind::Return(Some(expr)),
                ..
            }] => self.expr(expr),
            [Stmt {
                kind: StmtKind::Throw(expr),
                ..
            }] => {
                self.emit(f!("throw "));
                self.expr(expr);
            }
            stmts => {
                let captures = captures::free_in_stmts(stmts, &self.functions);
                self.emit(f!("(function ()"));
                self.captures(&captures);
                self.emit(f!(" "));
                self.with_mode(Mode::Closure, |g| g.block(stmts));
                self.emit(f!(")()"));
            }
        }
    }

    fn comma_separated(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.emit(f!(", "));
            }
            self.expr(expr);
        }
    }

    fn type_of(&self, expr: &Expr) -> Type {
        self.types.type_of(expr).cloned().unwrap_or(Type::Any)
    }

    /// Strings dispatch through one nullable layer: `?String` is a string.
    fn is_string(&mut self, expr: &Expr) -> bool {
        let ty = match self.type_of(expr).non_null() {
            Type::Unknown(Some(path)) => self.context.get_type(&path.qualified_name(), self.reporter),
            ty => ty.clone(),
        };
        let string = self.context.get_type(builtins::STRING, self.reporter);
        self.context.unify(&ty, &string)
    }
}

// Utility functions.
impl CodeGen<'_> {
    fn emit(&mut self, f: fmt::Arguments<'_>) {
        self.code
            .write_fmt(f)
            .expect("code emit should be infallible");
    }

    fn emit_indent(&mut self) {
        for _ in 0..self.indent {
            self.code.push_str(INDENT);
        }
    }

    fn newline(&mut self) {
        self.code.push('\n');
        self.emit_indent();
    }

    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent += 1;
        let result = f(self);
        self.indent -= 1;
        result
    }

    fn with_mode<T>(&mut self, mode: Mode, f: impl FnOnce(&mut Self) -> T) -> T {
        let outer = mem::replace(&mut self.mode, mode);
        let result = f(self);
        self.mode = outer;
        result
    }
}

fn php_operator(op: BinaryOperator) -> &'static str {
    use BinaryOperator::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Concat => ".",
        Eq => "===",
        NotEq => "!==",
        Greater => ">",
        GreaterEq => ">=",
        Less => "<",
        LessEq => "<=",
    }
}

/// Whether `op` written right before `operand` would lex as another operator,
/// as `-` before `-1` or `--$x` does.
fn merges_with_prefix(op: UnaryOperator, operand: &Expr) -> bool {
    let leading = match &operand.kind {
        ExprKind::Unary {
            op: inner,
            prefix: true,
            ..
        } => inner.to_string(),
        ExprKind::Literal(Literal::Number(number)) => number.clone(),
        _ => return false,
    };
    matches!(op.to_string().chars().last(), Some(c @ ('-' | '+')) if leading.starts_with(c))
}

fn php_method_name(name: &str) -> &str {
    if name == CONSTRUCTOR_NAME {
        "__construct"
    } else {
        name
    }
}

/// Whether PHP accepts the expression as a property default.
fn is_constant(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(_) => true,
        ExprKind::Unary {
            op: UnaryOperator::Not | UnaryOperator::Negate,
            expr,
            ..
        }
        | ExprKind::Grouping(expr) => is_constant(expr),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
            is_constant(lhs) && is_constant(rhs)
        }
        ExprKind::ArrayLiteral {
            items,
            native: true,
        } => items.iter().all(is_constant),
        ExprKind::MapLiteral {
            entries,
            native: true,
        } => entries.iter().all(|(k, v)| is_constant(k) && is_constant(v)),
        ExprKind::Get { target, field } => {
            matches!(target.kind, ExprKind::Path(_))
                && field.as_variable().is_some_and(starts_uppercase)
        }
        _ => false,
    }
}

/// Whether the constructor body already assigns `this.name = ...`.
fn assigns_field(func: &FunctionDecl, name: &str) -> bool {
    let Some(Stmt {
        kind: StmtKind::Block(stmts),
        ..
    }) = func.body.as_deref()
    else {
        return false;
    };
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Expr(Expr {
            kind: ExprKind::Set { target, field, .. },
            ..
        }) => matches!(target.kind, ExprKind::This) && field.as_variable() == Some(name),
        _ => false,
    })
}

/// Escapes `"` and `$` for a double-quoted PHP string. Escape sequences from
/// the source are kept as written.
fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' | '$' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn push_word(out: &mut String, word: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(word);
}

fn starts_lowercase(name: &str) -> bool {
    name.starts_with(|c: char| c.is_lowercase())
}

fn starts_uppercase(name: &str) -> bool {
    name.starts_with(|c: char| c.is_uppercase())
}
