use std::io::Write;

use crate::{
    ast::{
        CallArgument, ClassDecl, ClassKind, Expr, ExprKind, Field, FieldKind, FunctionArg,
        FunctionDecl, Literal, MatchCase, Stmt, StmtKind, UseKind,
    },
    types::TypeTable,
};

const INDENT_WIDTH: usize = 2;

/// Types to annotate expressions with, if any.
type Types<'a> = Option<&'a TypeTable>;

pub fn print_program_string(stmts: &[Stmt], types: Types<'_>) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, stmts, types).expect("writes to a vec should be infallible");
    String::from_utf8(buf).expect("tree output should be utf-8")
}

pub fn print_expr_string(expr: &Expr, types: Types<'_>) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, types, 0, expr).expect("writes to a vec should be infallible");
    String::from_utf8(buf).expect("tree output should be utf-8")
}

pub fn print_program(w: &mut impl Write, stmts: &[Stmt], types: Types<'_>) -> std::io::Result<()> {
    for stmt in stmts {
        print_stmt(w, types, 0, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, t: Types<'_>, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    if let StmtKind::Expr(expr) = &stmt.kind {
        return print_expr(w, t, i, expr);
    }
    if let StmtKind::Class(class) = &stmt.kind {
        return print_class(w, t, i, class);
    }

    sp(w, i)?;
    match &stmt.kind {
        StmtKind::Use {
            path,
            kind,
            attributes,
        } => {
            write!(w, "use {path}")?;
            match kind {
                UseKind::Normal => (),
                UseKind::Alias(target) => write!(w, " as {}", target.name())?,
                UseKind::Sub(targets) => {
                    let names: Vec<&str> = targets.iter().map(|t| t.name()).collect();
                    write!(w, "::{{{}}}", names.join(", "))?;
                }
            }
            writeln!(w)?;
            print_exprs(w, t, i + 1, attributes)?;
        }
        StmtKind::Namespace { path, decls } => {
            writeln!(w, "namespace {path}")?;
            print_stmts(w, t, i + 1, decls)?;
        }
        StmtKind::Var { name, ty, init } => {
            write!(w, "var {name}")?;
            if let Some(ty) = ty {
                write!(w, ": {ty}")?;
            }
            writeln!(w)?;
            if let Some(init) = init {
                print_expr(w, t, i + 1, init)?;
            }
        }
        StmtKind::Global(name) => writeln!(w, "global {name}")?,
        StmtKind::Throw(expr) => {
            writeln!(w, "throw")?;
            print_expr(w, t, i + 1, expr)?;
        }
        StmtKind::Try { body, catches } => {
            writeln!(w, "try")?;
            print_stmt(w, t, i + 1, body)?;
            print_stmts(w, t, i + 1, catches)?;
        }
        StmtKind::Catch { name, ty, body } => {
            write!(w, "catch {name}")?;
            if let Some(ty) = ty {
                write!(w, ": {ty}")?;
            }
            writeln!(w)?;
            print_stmt(w, t, i + 1, body)?;
        }
        StmtKind::While {
            cond,
            body,
            inverted,
        } => {
            writeln!(w, "{}", if *inverted { "do-while" } else { "while" })?;
            print_expr(w, t, i + 1, cond)?;
            print_stmt(w, t, i + 1, body)?;
        }
        StmtKind::For {
            key,
            value,
            target,
            body,
        } => {
            write!(w, "for {key}")?;
            if let Some(value) = value {
                write!(w, ", {value}")?;
            }
            writeln!(w, " in")?;
            print_expr(w, t, i + 1, target)?;
            print_stmt(w, t, i + 1, body)?;
        }
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            writeln!(w, "if")?;
            print_expr(w, t, i + 1, cond)?;
            print_stmt(w, t, i + 1, then)?;
            if let Some(otherwise) = otherwise {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                print_stmt(w, t, i + 2, otherwise)?;
            }
        }
        StmtKind::Switch { target, cases } => {
            writeln!(w, "switch")?;
            print_expr(w, t, i + 1, target)?;
            print_cases(w, t, i + 1, cases)?;
        }
        StmtKind::Block(stmts) => {
            writeln!(w, "block")?;
            print_stmts(w, t, i + 1, stmts)?;
        }
        StmtKind::Return(expr) => {
            writeln!(w, "return")?;
            if let Some(expr) = expr {
                print_expr(w, t, i + 1, expr)?;
            }
        }
        StmtKind::Function(func) => {
            write!(w, "function ")?;
            print_signature(w, func)?;
            writeln!(w)?;
            print_function_children(w, t, i + 1, func)?;
        }
        StmtKind::Expr(_) | StmtKind::Class(_) => unreachable!("printed above"),
    }
    Ok(())
}

fn print_stmts(w: &mut impl Write, t: Types<'_>, i: usize, stmts: &[Stmt]) -> std::io::Result<()> {
    for stmt in stmts {
        print_stmt(w, t, i, stmt)?;
    }
    Ok(())
}

fn print_cases(
    w: &mut impl Write,
    t: Types<'_>,
    i: usize,
    cases: &[MatchCase],
) -> std::io::Result<()> {
    for case in cases {
        sp(w, i)?;
        match &case.condition {
            Some(condition) => {
                writeln!(w, "case")?;
                print_expr(w, t, i + 1, condition)?;
            }
            None => writeln!(w, "default")?,
        }
        print_stmts(w, t, i + 1, &case.body)?;
    }
    Ok(())
}

fn print_class(w: &mut impl Write, t: Types<'_>, i: usize, class: &ClassDecl) -> std::io::Result<()> {
    sp(w, i)?;
    let keyword = match class.kind {
        ClassKind::Class => "class",
        ClassKind::Interface => "interface",
        ClassKind::Trait => "trait",
    };
    write!(w, "{keyword} {}", class.name)?;
    if let Some(superclass) = &class.superclass {
        write!(w, " extends {superclass}")?;
    }
    if !class.interfaces.is_empty() {
        let names: Vec<String> = class.interfaces.iter().map(ToString::to_string).collect();
        let keyword = match class.kind {
            ClassKind::Interface => "extends",
            _ => "implements",
        };
        write!(w, " {keyword} {}", names.join(", "))?;
    }
    writeln!(w)?;

    print_exprs(w, t, i + 1, &class.attributes)?;
    for field in &class.fields {
        print_field(w, t, i + 1, field)?;
    }
    Ok(())
}

fn print_field(w: &mut impl Write, t: Types<'_>, i: usize, field: &Field) -> std::io::Result<()> {
    sp(w, i)?;
    for access in &field.access {
        write!(w, "{access} ")?;
    }
    match &field.kind {
        FieldKind::Use(path) => writeln!(w, "use {path}")?,
        FieldKind::Var { ty, init } => {
            write!(w, "var {}", field.name)?;
            if let Some(ty) = ty {
                write!(w, ": {ty}")?;
            }
            writeln!(w)?;
            print_exprs(w, t, i + 1, &field.attributes)?;
            if let Some(init) = init {
                print_expr(w, t, i + 1, init)?;
            }
        }
        FieldKind::Prop { ty, getter, setter } => {
            write!(w, "prop {}", field.name)?;
            if let Some(ty) = ty {
                write!(w, ": {ty}")?;
            }
            writeln!(w)?;
            print_exprs(w, t, i + 1, &field.attributes)?;
            if let Some(getter) = getter {
                sp(w, i + 1)?;
                writeln!(w, "get")?;
                print_function_children(w, t, i + 2, getter)?;
            }
            if let Some(setter) = setter {
                sp(w, i + 1)?;
                writeln!(w, "set({})", format_args(&setter.args))?;
                print_function_children(w, t, i + 2, setter)?;
            }
        }
        FieldKind::Fun(func) => {
            write!(w, "fun ")?;
            print_signature(w, func)?;
            writeln!(w)?;
            print_function_children(w, t, i + 1, func)?;
        }
    }
    Ok(())
}

fn print_signature(w: &mut impl Write, func: &FunctionDecl) -> std::io::Result<()> {
    write!(w, "{}({})", func.name, format_args(&func.args))?;
    if let Some(ret) = &func.return_type {
        write!(w, ": {ret}")?;
    }
    Ok(())
}

fn format_args(args: &[FunctionArg]) -> String {
    let args: Vec<String> = args
        .iter()
        .map(|arg| {
            let prefix = if arg.is_constructor_init { "this." } else { "" };
            match &arg.ty {
                Some(ty) => format!("{prefix}{}: {ty}", arg.name),
                None => format!("{prefix}{}", arg.name),
            }
        })
        .collect();
    args.join(", ")
}

/// Prints attributes, then parameter defaults, then the body.
fn print_function_children(
    w: &mut impl Write,
    t: Types<'_>,
    i: usize,
    func: &FunctionDecl,
) -> std::io::Result<()> {
    print_exprs(w, t, i, &func.attributes)?;
    for arg in &func.args {
        if let Some(default) = &arg.default {
            sp(w, i)?;
            writeln!(w, "default {}", arg.name)?;
            print_expr(w, t, i + 1, default)?;
        }
    }
    if let Some(body) = &func.body {
        print_stmt(w, t, i, body)?;
    }
    Ok(())
}

fn print_expr(w: &mut impl Write, t: Types<'_>, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    match &expr.kind {
        ExprKind::Attribute { path, .. } => write!(w, "attribute {path}")?,
        ExprKind::Assign { name, .. } => write!(w, "assign {name}")?,
        ExprKind::Binary { op, .. } => write!(w, "binary {op}")?,
        ExprKind::Unary { op, prefix, .. } => {
            write!(w, "unary {op}")?;
            if !prefix {
                write!(w, " (postfix)")?;
            }
        }
        ExprKind::Is { ty, .. } => write!(w, "is {ty}")?,
        ExprKind::Logical { op, .. } => write!(w, "logical {op}")?,
        ExprKind::Range { .. } => write!(w, "range")?,
        ExprKind::Call { .. } => write!(w, "call")?,
        ExprKind::Get { field, .. } => match field.as_variable() {
            Some(name) => write!(w, "get .{name}")?,
            None => write!(w, "get")?,
        },
        ExprKind::Set { field, .. } => match field.as_variable() {
            Some(name) => write!(w, "set .{name}")?,
            None => write!(w, "set")?,
        },
        ExprKind::ArrayIndexGet { .. } => write!(w, "index")?,
        ExprKind::ArrayIndexSet { .. } => write!(w, "index-set")?,
        ExprKind::Ternary { .. } => write!(w, "ternary")?,
        ExprKind::Super { method } => write!(w, "super.{method}")?,
        ExprKind::Path(path) => write!(w, "path {path}")?,
        ExprKind::This => write!(w, "this")?,
        ExprKind::Static => write!(w, "static")?,
        ExprKind::Grouping(_) => write!(w, "grouping")?,
        ExprKind::Literal(literal) => match literal {
            Literal::String(s) => write!(w, "string \"{s}\"")?,
            Literal::Number(n) => write!(w, "number {n}")?,
            Literal::True => write!(w, "true")?,
            Literal::False => write!(w, "false")?,
            Literal::Null => write!(w, "null")?,
        },
        ExprKind::ArrayLiteral { native, .. } => write!(w, "{}array", native_prefix(*native))?,
        ExprKind::MapLiteral { native, .. } => write!(w, "{}map", native_prefix(*native))?,
        ExprKind::Lambda(func) => write!(w, "lambda({})", format_args(&func.args))?,
        ExprKind::Variable(name) => write!(w, "variable {name}")?,
        ExprKind::Match { .. } => write!(w, "match")?,
    }
    if let Some(ty) = t.and_then(|t| t.type_of(expr)) {
        write!(w, " => {ty}")?;
    }
    writeln!(w)?;

    let i = i + 1;
    match &expr.kind {
        ExprKind::Attribute { args, .. } => print_args(w, t, i, args)?,
        ExprKind::Assign { value, .. } => print_expr(w, t, i, value)?,
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
            print_expr(w, t, i, lhs)?;
            print_expr(w, t, i, rhs)?;
        }
        ExprKind::Unary { expr, .. } | ExprKind::Is { expr, .. } | ExprKind::Grouping(expr) => {
            print_expr(w, t, i, expr)?;
        }
        ExprKind::Range { from, to } => {
            print_expr(w, t, i, from)?;
            print_expr(w, t, i, to)?;
        }
        ExprKind::Call { callee, args } => {
            print_expr(w, t, i, callee)?;
            print_args(w, t, i, args)?;
        }
        ExprKind::Get { target, field } => {
            print_expr(w, t, i, target)?;
            if field.as_variable().is_none() {
                print_expr(w, t, i, field)?;
            }
        }
        ExprKind::Set {
            target,
            field,
            value,
        } => {
            print_expr(w, t, i, target)?;
            if field.as_variable().is_none() {
                print_expr(w, t, i, field)?;
            }
            print_expr(w, t, i, value)?;
        }
        ExprKind::ArrayIndexGet { target, index } => {
            print_expr(w, t, i, target)?;
            if let Some(index) = index {
                print_expr(w, t, i, index)?;
            }
        }
        ExprKind::ArrayIndexSet {
            target,
            index,
            value,
        } => {
            print_expr(w, t, i, target)?;
            if let Some(index) = index {
                print_expr(w, t, i, index)?;
            }
            print_expr(w, t, i, value)?;
        }
        ExprKind::Ternary {
            cond,
            then,
            otherwise,
        } => {
            print_expr(w, t, i, cond)?;
            print_expr(w, t, i, then)?;
            print_expr(w, t, i, otherwise)?;
        }
        ExprKind::ArrayLiteral { items, .. } => print_exprs(w, t, i, items)?,
        ExprKind::MapLiteral { entries, .. } => {
            for (key, value) in entries {
                sp(w, i)?;
                writeln!(w, "entry")?;
                print_expr(w, t, i + 1, key)?;
                print_expr(w, t, i + 1, value)?;
            }
        }
        ExprKind::Lambda(func) => print_function_children(w, t, i, func)?,
        ExprKind::Match { target, cases } => {
            print_expr(w, t, i, target)?;
            print_cases(w, t, i, cases)?;
        }
        ExprKind::Super { .. }
        | ExprKind::Path(_)
        | ExprKind::This
        | ExprKind::Static
        | ExprKind::Literal(_)
        | ExprKind::Variable(_) => (),
    }
    Ok(())
}

fn print_exprs(w: &mut impl Write, t: Types<'_>, i: usize, exprs: &[Expr]) -> std::io::Result<()> {
    for expr in exprs {
        print_expr(w, t, i, expr)?;
    }
    Ok(())
}

fn print_args(
    w: &mut impl Write,
    t: Types<'_>,
    i: usize,
    args: &[CallArgument],
) -> std::io::Result<()> {
    for arg in args {
        match arg {
            CallArgument::Positional(value) => print_expr(w, t, i, value)?,
            CallArgument::Named { name, value } => {
                sp(w, i)?;
                writeln!(w, "named {name}")?;
                print_expr(w, t, i + 1, value)?;
            }
        }
    }
    Ok(())
}

fn native_prefix(native: bool) -> &'static str {
    if native {
        "native "
    } else {
        ""
    }
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
