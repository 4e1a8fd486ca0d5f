// program ::= decl*
// decl ::= attrs? ( namespace | use | function | class | interface | trait
//                 | enum | var | global ) | stmt
// attrs ::= ('[' attr (',' attr)* ']')+
// attr ::= path ['(' args ')']
// namespace ::= 'namespace' path ( '{' decl* '}' | end decl* )
// use ::= 'use' ['::'] TYPE ('::' TYPE)* ['::' ( ID | TYPE | '{' target (',' target)* '}' )]
//         ['as' target]
// function ::= 'function' ID '(' args ')' [':' path] body
// class ::= 'class' TYPE ('extends' path | 'implements' path (',' path)*)* '{' field* '}'
// interface ::= 'interface' TYPE ['extends' path (',' path)*] '{' field* '}'
// trait ::= 'trait' TYPE '{' field* '}'
// enum ::= 'enum' TYPE 'as' TYPE '{' (TYPE ['=' expr] end)* '}'
//        | 'enum' TYPE '{' (TYPE ['(' args ')'] end)* '}'
// field ::= 'use' path end
//         | 'const' TYPE [':' path] '=' expr end
//         | attrs? modifier* ID [':' path] ( end | '=' expr end | '{' get/set '}'
//                                        | '(' args ')' [':' path] (body | end) )
// var ::= 'var' ID [':' path] ['=' expr] end
// stmt ::= if | while | do | for | switch | return | throw | try | global | block
//        | expr end
// expr ::= assignment
// path ::= ['?'] ['::'] TYPE ('::' TYPE)* ['<' path (',' path)* '>']

// Precedence (lowest first)
//
// = +=
// ||
// &&
// == !=
// < <= > >= is
// + - +++
// * /
// ...
// |>
// ! - ++ -- (prefix), ++ -- (postfix)
// call, member, index

use std::{
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::token::Position;

/// Identifies an expression node, keying the typer's side table.
///
/// Ids are unique across the whole process, so fragments synthesized by a
/// nested parse never collide with the enclosing tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn fresh() -> ExprId {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        ExprId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Expr {
        Expr {
            id: ExprId::fresh(),
            kind,
            pos,
        }
    }

    /// Boxes the expression, for use as a child node.
    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    pub fn as_variable(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    /// An entry of an attribute list, as in `[Path(args)]`.
    Attribute {
        path: TypePath,
        args: Vec<CallArgument>,
    },
    Assign {
        name: String,
        value: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinaryOperator,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
        prefix: bool,
    },
    Is {
        expr: Box<Expr>,
        ty: TypePath,
    },
    Logical {
        lhs: Box<Expr>,
        op: LogicalOperator,
        rhs: Box<Expr>,
    },
    Range {
        from: Box<Expr>,
        to: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<CallArgument>,
    },
    /// Member access. The field is a [`ExprKind::Variable`] for static names
    /// and any other expression for dynamic access (`a.{expr}`).
    Get {
        target: Box<Expr>,
        field: Box<Expr>,
    },
    Set {
        target: Box<Expr>,
        field: Box<Expr>,
        value: Box<Expr>,
    },
    ArrayIndexGet {
        target: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    ArrayIndexSet {
        target: Box<Expr>,
        index: Option<Box<Expr>>,
        value: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Super {
        method: String,
    },
    Path(TypePath),
    This,
    Static,
    Grouping(Box<Expr>),
    Literal(Literal),
    ArrayLiteral {
        items: Vec<Expr>,
        native: bool,
    },
    MapLiteral {
        entries: Vec<(Expr, Expr)>,
        native: bool,
    },
    Lambda(Rc<FunctionDecl>),
    Variable(String),
    Match {
        target: Box<Expr>,
        cases: Vec<MatchCase>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    String(String),
    /// The number exactly as written in the source.
    Number(String),
    True,
    False,
    Null,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallArgument {
    Positional(Expr),
    Named { name: String, value: Expr },
}

impl CallArgument {
    pub fn value(&self) -> &Expr {
        match self {
            CallArgument::Positional(value) | CallArgument::Named { value, .. } => value,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    NotEq,
    Greater,
    GreaterEq,
    Less,
    LessEq,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        use BinaryOperator::*;
        matches!(self, Eq | NotEq | Greater | GreaterEq | Less | LessEq)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOperator::*;
        f.write_str(match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Concat => "+++",
            Eq => "==",
            NotEq => "!=",
            Greater => ">",
            GreaterEq => ">=",
            Less => "<",
            LessEq => "<=",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Increment,
    Decrement,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Negate => "-",
            UnaryOperator::Increment => "++",
            UnaryOperator::Decrement => "--",
        })
    }
}

/// A `case`/`default` arm of a `switch` statement or a `match` expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchCase {
    /// `None` for the `default` arm.
    pub condition: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Position) -> Stmt {
        Stmt { kind, pos }
    }

    pub fn boxed(self) -> Box<Stmt> {
        Box::new(self)
    }

    /// Wraps the statement into a block, unless it already is one.
    pub fn into_block(self) -> Stmt {
        match self.kind {
            StmtKind::Block(_) => self,
            _ => {
                let pos = self.pos.clone();
                Stmt::new(StmtKind::Block(vec![self]), pos)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    Expr(Expr),
    Use {
        path: TypePath,
        kind: UseKind,
        attributes: Vec<Expr>,
    },
    Namespace {
        path: TypePath,
        decls: Vec<Stmt>,
    },
    Var {
        name: String,
        ty: Option<TypePath>,
        init: Option<Expr>,
    },
    Global(String),
    Throw(Expr),
    Try {
        body: Box<Stmt>,
        /// Always [`StmtKind::Catch`] statements.
        catches: Vec<Stmt>,
    },
    Catch {
        name: String,
        ty: Option<TypePath>,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        /// Set for `do ... while`, which runs the body before the check.
        inverted: bool,
    },
    For {
        key: String,
        value: Option<String>,
        target: Expr,
        body: Box<Stmt>,
    },
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    Switch {
        target: Expr,
        cases: Vec<MatchCase>,
    },
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Function(Rc<FunctionDecl>),
    Class(Rc<ClassDecl>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UseKind {
    /// `use A::B`
    Normal,
    /// `use A::B as C`
    Alias(UseTarget),
    /// `use A::{B, c}` or `use A::c`
    Sub(Vec<UseTarget>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UseTarget {
    Type(String),
    Function(String),
}

impl UseTarget {
    pub fn name(&self) -> &str {
        match self {
            UseTarget::Type(name) | UseTarget::Function(name) => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct TypePath {
    pub ns: Vec<String>,
    pub name: String,
    pub params: Vec<TypePath>,
    pub is_absolute: bool,
    pub is_nullable: bool,
}

impl TypePath {
    pub fn new(name: impl Into<String>) -> TypePath {
        TypePath {
            name: name.into(),
            ..TypePath::default()
        }
    }

    /// Parses an absolute path from its `A::B::Name` form.
    pub fn from_qualified(qualified: &str) -> TypePath {
        let qualified = qualified.trim_start_matches("::");
        let mut segments: Vec<String> = qualified.split("::").map(str::to_owned).collect();
        let name = segments.pop().unwrap_or_default();
        TypePath {
            ns: segments,
            name,
            params: Vec::new(),
            is_absolute: true,
            is_nullable: false,
        }
    }

    pub fn absolute(mut self) -> TypePath {
        self.is_absolute = true;
        self
    }

    /// The namespace segments and the name, joined by `::`, without any
    /// prefix or generic parameters.
    pub fn qualified_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + self.ns.len() * 8);
        for segment in &self.ns {
            out.push_str(segment);
            out.push_str("::");
        }
        out.push_str(&self.name);
        out
    }

    /// Qualifies the path with the provided namespace, making it absolute.
    pub fn qualify(&self, namespace: &[String]) -> TypePath {
        let mut ns = namespace.to_vec();
        ns.extend(self.ns.iter().cloned());
        TypePath {
            ns,
            name: self.name.clone(),
            params: self.params.clone(),
            is_absolute: true,
            is_nullable: self.is_nullable,
        }
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nullable {
            f.write_str("?")?;
        }
        if self.is_absolute {
            f.write_str("::")?;
        }
        f.write_str(&self.qualified_name())?;
        if !self.params.is_empty() {
            f.write_str("<")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{param}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub kind: ClassKind,
    pub superclass: Option<TypePath>,
    pub interfaces: Vec<TypePath>,
    pub fields: Vec<Field>,
    pub attributes: Vec<Expr>,
    pub pos: Position,
}

impl ClassDecl {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn constructor(&self) -> Option<&Field> {
        self.field(CONSTRUCTOR_NAME)
    }
}

/// Fields with this name are constructors.
pub const CONSTRUCTOR_NAME: &str = "new";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub access: Vec<FieldAccess>,
    pub attributes: Vec<Expr>,
    pub pos: Position,
}

impl Field {
    pub fn has(&self, access: FieldAccess) -> bool {
        self.access.contains(&access)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// `use Trait`
    Use(TypePath),
    Var {
        ty: Option<TypePath>,
        init: Option<Expr>,
    },
    Prop {
        ty: Option<TypePath>,
        getter: Option<Rc<FunctionDecl>>,
        setter: Option<Rc<FunctionDecl>>,
    },
    Fun(Rc<FunctionDecl>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldAccess {
    Static,
    Public,
    Private,
    Const,
    Abstract,
}

impl fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldAccess::Static => "static",
            FieldAccess::Public => "public",
            FieldAccess::Private => "private",
            FieldAccess::Const => "const",
            FieldAccess::Abstract => "abstract",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    /// Empty for anonymous functions and lambdas.
    pub name: String,
    pub args: Vec<FunctionArg>,
    pub body: Option<Box<Stmt>>,
    pub return_type: Option<TypePath>,
    pub attributes: Vec<Expr>,
    pub pos: Position,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionArg {
    pub name: String,
    pub ty: Option<TypePath>,
    pub default: Option<Expr>,
    /// Set for `this.name` constructor parameters, which are promoted into
    /// instance fields.
    pub is_constructor_init: bool,
    pub pos: Position,
}
