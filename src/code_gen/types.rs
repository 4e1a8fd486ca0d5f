use phf::phf_map;

use crate::ast::TypePath;

/// Built-in types that have a PHP spelling of their own.
pub static PHASE_TO_PHP_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "String" => "string",
    "Int" => "int",
    "Array" => "\\Std\\PhaseArray",
    "Map" => "\\Std\\PhaseMap",
    "Callable" => "callable",
    "Any" => "mixed",
    "Scalar" => "scalar",
    "Bool" => "bool",
};

/// Joins the namespace and name with `\`, dropping generic parameters.
pub fn php_name(path: &TypePath) -> String {
    let mut out = String::with_capacity(path.name.len() + path.ns.len() * 8);
    for segment in &path.ns {
        out.push_str(segment);
        out.push('\\');
    }
    out.push_str(&path.name);
    out
}

/// Renders a type path as a PHP type or class reference.
pub fn php_type_path(path: &TypePath) -> String {
    let name = php_name(path);
    let nullable = if path.is_nullable { "?" } else { "" };
    if name == "Any" {
        return "mixed".to_owned();
    }
    if let Some(mapped) = PHASE_TO_PHP_TYPES.get(name.as_str()) {
        return format!("{nullable}{mapped}");
    }
    let absolute = if path.is_absolute { "\\" } else { "" };
    format!("{nullable}{absolute}{name}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_builtins_are_mapped() {
        assert_eq!(php_type_path(&TypePath::new("String")), "string");
        assert_eq!(php_type_path(&TypePath::new("Array")), "\\Std\\PhaseArray");
        assert_eq!(php_type_path(&TypePath::from_qualified("Bool")), "bool");

        let mut nullable = TypePath::new("Int");
        nullable.is_nullable = true;
        assert_eq!(php_type_path(&nullable), "?int");
    }

    #[test]
    fn test_any_is_never_nullable() {
        let mut any = TypePath::new("Any");
        any.is_nullable = true;
        assert_eq!(php_type_path(&any), "mixed");
    }

    #[test]
    fn test_user_paths() {
        assert_eq!(php_type_path(&TypePath::new("User")), "User");
        assert_eq!(
            php_type_path(&TypePath::from_qualified("App::Models::User")),
            "\\App\\Models\\User"
        );

        let mut path = TypePath::new("Box");
        path.ns = vec!["Data".to_owned()];
        path.params = vec![TypePath::new("String")];
        path.is_nullable = true;
        assert_eq!(php_type_path(&path), "?Data\\Box");
    }
}
