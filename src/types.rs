use std::{collections::HashMap, fmt, rc::Rc};

use crate::ast::{ClassDecl, Expr, ExprId, FunctionDecl, TypePath};

/// A resolved type.
///
/// [`Type::Unknown`] and [`Type::Any`] carry no information; consumers must
/// not treat them as errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Nullable(Box<Type>),
    Void,
    Any,
    /// Unresolved, with the path that failed to resolve when there was one.
    Unknown(Option<TypePath>),
    Fun(Rc<FunctionDecl>),
    /// The class itself, as named by a path.
    Class(Rc<ClassDecl>),
    /// A value of the class.
    Instance(Rc<ClassDecl>),
}

impl Type {
    /// An unresolved built-in, such as `::String`.
    pub fn builtin(name: &str) -> Type {
        Type::Unknown(Some(TypePath::from_qualified(name)))
    }

    pub fn is_informative(&self) -> bool {
        !matches!(self, Type::Any | Type::Unknown(_))
    }

    /// Strips one nullable layer, if any.
    pub fn non_null(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            ty => ty,
        }
    }

    /// The class behind a class or instance type.
    pub fn class(&self) -> Option<&Rc<ClassDecl>> {
        match self.non_null() {
            Type::Class(class) | Type::Instance(class) => Some(class),
            _ => None,
        }
    }

    /// The path an unresolved type failed to resolve, if known.
    pub fn unresolved_path(&self) -> Option<&TypePath> {
        match self.non_null() {
            Type::Unknown(path) => path.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Nullable(inner) => write!(f, "?{inner}"),
            Type::Void => f.write_str("Void"),
            Type::Any => f.write_str("Any"),
            Type::Unknown(Some(path)) => write!(f, "{path}"),
            Type::Unknown(None) => f.write_str("Unknown"),
            Type::Fun(func) if func.name.is_empty() => f.write_str("fun"),
            Type::Fun(func) => write!(f, "fun {}", func.name),
            Type::Class(class) => write!(f, "class {}", class.name),
            Type::Instance(class) => f.write_str(&class.name),
        }
    }
}

/// Names of the types the language provides without a declaration.
pub mod builtins {
    pub const STRING: &str = "String";
    pub const INT: &str = "Int";
    pub const BOOL: &str = "Bool";
    pub const NULL: &str = "Null";
    pub const ARRAY: &str = "Array";
    pub const MAP: &str = "Map";
    pub const NATIVE_ARRAY: &str = "NativeArray";
    pub const NATIVE_MAP: &str = "NativeMap";
}

/// The type of every typed expression, keyed by expression id.
#[derive(Debug, Default)]
pub struct TypeTable {
    map: HashMap<ExprId, Type>,
}

impl TypeTable {
    pub fn with_capacity(capacity: usize) -> TypeTable {
        TypeTable {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Records the type of an expression. Typing the same expression again
    /// overwrites the previous entry.
    pub fn insert(&mut self, id: ExprId, ty: Type) {
        self.map.insert(id, ty);
    }

    pub fn get(&self, id: ExprId) -> Option<&Type> {
        self.map.get(&id)
    }

    pub fn type_of(&self, expr: &Expr) -> Option<&Type> {
        self.get(expr.id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
