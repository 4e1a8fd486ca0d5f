//! Cross-file type resolution.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, trace, warn};

use crate::{
    ast::TypePath,
    error::LoadError,
    lexer, parser,
    report::ErrorReporter,
    typer,
    types::Type,
};

/// Locates the declaration of a qualified name, usually in another file.
pub trait TypeLoader {
    /// Returns `Ok(None)` when nothing declares `name`.
    fn load(&self, name: &str, reporter: &dyn ErrorReporter) -> Result<Option<Type>, LoadError>;
}

/// A loader that never finds anything.
#[derive(Debug, Default)]
pub struct NullTypeLoader;

impl TypeLoader for NullTypeLoader {
    fn load(&self, _: &str, _: &dyn ErrorReporter) -> Result<Option<Type>, LoadError> {
        Ok(None)
    }
}

/// Maps `A::B::C` to `<root>/A/B/C.<extension>` and surface-types that file.
#[derive(Debug)]
pub struct FileTypeLoader {
    root: PathBuf,
    extension: String,
}

impl FileTypeLoader {
    pub const DEFAULT_EXTENSION: &'static str = "phs";

    pub fn new(root: impl Into<PathBuf>) -> FileTypeLoader {
        FileTypeLoader {
            root: root.into(),
            extension: FileTypeLoader::DEFAULT_EXTENSION.to_owned(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> FileTypeLoader {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file that would declare `name`.
    pub fn path_of(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(name.trim_start_matches("::").split("::"));
        path.set_extension(&self.extension);
        path
    }
}

impl TypeLoader for FileTypeLoader {
    fn load(&self, name: &str, reporter: &dyn ErrorReporter) -> Result<Option<Type>, LoadError> {
        let path = self.path_of(name);
        let src = match fs::read_to_string(&path) {
            Ok(src) => src,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(name, path = %path.display(), "no source file for type");
                return Ok(None);
            }
            Err(source) => return Err(LoadError::Io { path, source }),
        };

        let file = path.display().to_string();
        let tokens = lexer::scan(&src, file.into(), reporter);
        let stmts = parser::parse(&tokens, reporter).map_err(|source| LoadError::Syntax {
            path: path.clone(),
            source,
        })?;
        let surface = typer::type_surface(&stmts, reporter);

        let qualified = name.trim_start_matches("::");
        let local = qualified.rsplit("::").next().unwrap_or(qualified);
        let ty = surface.get(qualified).or_else(|| {
            surface
                .iter()
                .find(|(key, _)| key.rsplit("::").next() == Some(local))
                .map(|(_, ty)| ty)
        });
        debug!(name, path = %path.display(), found = ty.is_some(), "loaded type surface");
        Ok(ty.cloned())
    }
}

/// Memoizing resolver shared by the typer and the generator.
///
/// Misses are cached too, as [`Type::Unknown`] carrying the absolute path, so
/// a missing file is only looked for once per context.
pub struct Context {
    types: HashMap<String, Type>,
    loader: Box<dyn TypeLoader>,
}

impl Default for Context {
    fn default() -> Context {
        Context::new(NullTypeLoader)
    }
}

impl Context {
    pub fn new(loader: impl TypeLoader + 'static) -> Context {
        Context {
            types: HashMap::new(),
            loader: Box::new(loader),
        }
    }

    /// Seeds the cache, usually with a surface map.
    pub fn add_types(&mut self, types: impl IntoIterator<Item = (String, Type)>) -> &mut Context {
        for (name, ty) in types {
            self.types.insert(key(&name).to_owned(), ty);
        }
        self
    }

    pub fn get_type(&mut self, name: &str, reporter: &dyn ErrorReporter) -> Type {
        let name = key(name);
        if let Some(ty) = self.types.get(name) {
            return ty.clone();
        }
        trace!(name, "type cache miss");

        let loaded = match self.loader.load(name, reporter) {
            Ok(ty) => ty,
            Err(error) => {
                warn!(name, %error, "failed to load type");
                None
            }
        };
        let ty = loaded.unwrap_or_else(|| Type::Unknown(Some(TypePath::from_qualified(name))));
        self.types.insert(name.to_owned(), ty.clone());
        ty
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(key(name))
    }

    /// Structural equality. Nullability is significant: `?String` does not
    /// unify with `String`.
    pub fn unify(&self, a: &Type, b: &Type) -> bool {
        a == b
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn key(name: &str) -> &str {
    name.trim_start_matches("::")
}
