use std::rc::Rc;

use crate::{
    ast::{
        BinaryOperator, CallArgument, ClassDecl, ClassKind, Expr, ExprKind, Field, FieldAccess,
        FieldKind, FunctionArg, FunctionDecl, Literal, LogicalOperator, MatchCase, Stmt, StmtKind,
        TypePath, UnaryOperator, UseKind, UseTarget, CONSTRUCTOR_NAME,
    },
    error::SyntaxError,
    lexer,
    report::ErrorReporter,
    synth,
    token::{Position, Token, TokenKind},
};

type Result<T, E = SyntaxError> = std::result::Result<T, E>;

/// Parses a token sequence (which must end with [`TokenKind::Eof`]) into the
/// top-level declarations of a file.
///
/// Parsing stops at the first grammar violation, which is reported and then
/// returned.
pub fn parse(tokens: &[Token], reporter: &dyn ErrorReporter) -> Result<Vec<Stmt>> {
    parse_unreported(tokens, reporter).inspect_err(|e| reporter.report(&e.pos, &e.message))
}

/// Scans and parses the provided source.
pub fn parse_source(src: &str, file: Rc<str>, reporter: &dyn ErrorReporter) -> Result<Vec<Stmt>> {
    let tokens = lexer::scan(src, file, reporter);
    parse(&tokens, reporter)
}

/// Like [`parse`], but leaves reporting the error to the caller.
pub(crate) fn parse_unreported(tokens: &[Token], reporter: &dyn ErrorReporter) -> Result<Vec<Stmt>> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let mut parser = Parser::new(tokens, reporter);
    let program = parser.program();
    tracing::trace!(tokens = tokens.len(), ok = program.is_ok(), "parsed");
    program
}

struct Parser<'tok, 'r> {
    tokens: &'tok [Token],
    cursor: usize,
    in_namespace: bool,
    in_interface: bool,
    reporter: &'r dyn ErrorReporter,
}

impl Parser<'_, '_> {
    fn program(&mut self) -> Result<Vec<Stmt>> {
        let mut decls = Vec::new();
        self.ignore_newlines();
        while !self.is_at_end() {
            decls.push(self.declaration(Vec::new())?);
            self.ignore_newlines();
        }
        Ok(decls)
    }

    fn declaration(&mut self, mut attributes: Vec<Expr>) -> Result<Stmt> {
        if self.is_attribute_start() {
            attributes.extend(self.attribute_list()?);
            return self.declaration(attributes);
        }

        let token = self.peek();
        match token.kind {
            TokenKind::Namespace if attributes.is_empty() => self.namespace_declaration(),
            TokenKind::Use => self.use_declaration(attributes),
            TokenKind::Function if self.peek_next().kind == TokenKind::Identifier => {
                self.advance();
                self.function_declaration(attributes)
            }
            TokenKind::Class => {
                self.advance();
                self.class_declaration(attributes)
            }
            TokenKind::Interface => {
                self.advance();
                self.interface_declaration(attributes)
            }
            TokenKind::Trait => {
                self.advance();
                self.trait_declaration(attributes)
            }
            TokenKind::Enum => {
                self.advance();
                self.enum_declaration(attributes)
            }
            _ if !attributes.is_empty() => {
                Err(self.error(token, "Attributes are only allowed on declarations"))
            }
            _ => self.statement(),
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        let token = self.peek();
        match token.kind {
            TokenKind::Var => {
                self.advance();
                self.var_declaration()
            }
            TokenKind::Global => {
                self.advance();
                let name = self.consume(TokenKind::Identifier, "Expected a variable name")?;
                self.expect_end_of_statement()?;
                Ok(Stmt::new(
                    StmtKind::Global(name.lexeme.to_string()),
                    token.pos.merge(&name.pos),
                ))
            }
            TokenKind::If => {
                self.advance();
                self.if_statement()
            }
            TokenKind::Return => {
                self.advance();
                self.return_statement()
            }
            TokenKind::While => {
                self.advance();
                self.while_statement()
            }
            TokenKind::Do => {
                self.advance();
                self.do_statement()
            }
            TokenKind::For => {
                self.advance();
                self.for_statement()
            }
            TokenKind::Switch => {
                self.advance();
                self.switch_statement()
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.expression()?;
                let pos = self.pos_from(token);
                self.expect_end_of_statement()?;
                Ok(Stmt::new(StmtKind::Throw(value), pos))
            }
            TokenKind::Try => {
                self.advance();
                self.try_statement()
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.block_statement()
            }
            _ => {
                let expr = self.expression()?;
                self.expect_end_of_statement()?;
                let pos = expr.pos.clone();
                Ok(Stmt::new(StmtKind::Expr(expr), pos))
            }
        }
    }

    fn attribute_list(&mut self) -> Result<Vec<Expr>> {
        let mut attributes = Vec::new();
        while self.is_attribute_start() {
            self.advance();
            let entries = self.separated(TokenKind::Comma, |p| {
                let start = p.peek();
                let path = p.type_path(false)?;
                let args = if p.take(TokenKind::LeftParen) {
                    p.arguments()?
                } else {
                    Vec::new()
                };
                let pos = p.pos_from(start);
                Ok(Expr::new(ExprKind::Attribute { path, args }, pos))
            })?;
            self.ignore_newlines();
            self.consume(TokenKind::RightBracket, "Expected `]` at the end of an attribute list")?;
            self.ignore_newlines();
            attributes.extend(entries);
        }
        Ok(attributes)
    }

    fn namespace_declaration(&mut self) -> Result<Stmt> {
        let keyword = self.advance();
        if self.in_namespace {
            return Err(self.error(keyword, "Namespaces cannot be nested"));
        }
        let path = self.type_path(false)?;
        self.in_namespace = true;

        let mut decls = Vec::new();
        if self.take(TokenKind::LeftBrace) {
            self.ignore_newlines();
            while !self.is(TokenKind::RightBrace) && !self.is_at_end() {
                decls.push(self.declaration(Vec::new())?);
                self.ignore_newlines();
            }
            self.consume(TokenKind::RightBrace, "Expected `}` at the end of a namespace")?;
            self.in_namespace = false;
        } else {
            self.expect_end_of_statement()?;
            while !self.is_at_end() {
                decls.push(self.declaration(Vec::new())?);
                self.ignore_newlines();
            }
        }

        Ok(Stmt::new(
            StmtKind::Namespace { path, decls },
            self.pos_from(keyword),
        ))
    }

    fn use_declaration(&mut self, attributes: Vec<Expr>) -> Result<Stmt> {
        let keyword = self.advance();
        if !self.in_namespace {
            return Err(self.error(keyword, "`use` is only allowed inside a namespace"));
        }

        let is_absolute = self.take(TokenKind::ColonColon);
        let mut segments = Vec::new();
        let mut kind = UseKind::Normal;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::TypeIdentifier => {
                    self.advance();
                    segments.push(token.lexeme.to_string());
                    if !self.take(TokenKind::ColonColon) {
                        break;
                    }
                }
                TokenKind::Identifier => {
                    self.advance();
                    kind = UseKind::Sub(vec![UseTarget::Function(token.lexeme.to_string())]);
                    break;
                }
                TokenKind::LeftBrace if !segments.is_empty() => {
                    self.advance();
                    let targets = self.separated(TokenKind::Comma, Parser::use_target)?;
                    self.ignore_newlines();
                    self.consume(TokenKind::RightBrace, "Expected `}` after imported names")?;
                    kind = UseKind::Sub(targets);
                    break;
                }
                _ => return Err(self.error(token, "Expected a package, type or function name")),
            }
        }

        if self.take(TokenKind::As) {
            let alias = self.use_target()?;
            match kind {
                UseKind::Sub(mut targets) if targets.len() == 1 => {
                    let target = targets.remove(0);
                    segments.push(target.name().to_owned());
                }
                UseKind::Sub(_) => {
                    return Err(self.error(self.previous(), "Cannot alias a group of imports"));
                }
                _ => (),
            }
            kind = UseKind::Alias(alias);
        }

        let Some(name) = segments.pop() else {
            return Err(self.error(keyword, "Expected a package name"));
        };
        let path = TypePath {
            ns: segments,
            name,
            is_absolute,
            ..TypePath::default()
        };
        self.expect_end_of_statement()?;
        Ok(Stmt::new(
            StmtKind::Use {
                path,
                kind,
                attributes,
            },
            self.pos_from(keyword),
        ))
    }

    fn use_target(&mut self) -> Result<UseTarget> {
        let token = self.advance();
        match token.kind {
            TokenKind::TypeIdentifier => Ok(UseTarget::Type(token.lexeme.to_string())),
            TokenKind::Identifier => Ok(UseTarget::Function(token.lexeme.to_string())),
            _ => Err(self.error(token, "Expected a type or function name")),
        }
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        let name = self.consume(TokenKind::Identifier, "Expected a variable name")?;
        let ty = if self.take(TokenKind::Colon) {
            Some(self.type_path(true)?)
        } else {
            None
        };
        let init = if self.take(TokenKind::Equal) {
            self.ignore_newlines();
            Some(self.expression()?)
        } else {
            None
        };
        let pos = self.pos_from(keyword);
        self.expect_end_of_statement()?;
        Ok(Stmt::new(
            StmtKind::Var {
                name: name.lexeme.to_string(),
                ty,
                init,
            },
            pos,
        ))
    }

    fn function_declaration(&mut self, attributes: Vec<Expr>) -> Result<Stmt> {
        let decl = self.function(false, attributes)?;
        let pos = decl.pos.clone();
        Ok(Stmt::new(StmtKind::Function(Rc::new(decl)), pos))
    }

    /// Parses a function after its `function` keyword.
    fn function(&mut self, is_anonymous: bool, attributes: Vec<Expr>) -> Result<FunctionDecl> {
        let keyword = self.previous();
        let name = if !is_anonymous || self.is(TokenKind::Identifier) {
            self.consume(TokenKind::Identifier, "Expected a function name")?
                .lexeme
                .to_string()
        } else {
            String::new()
        };
        self.consume(TokenKind::LeftParen, "Expected `(` after function name")?;
        let args = self.function_args(false)?;
        let return_type = self.return_type()?;
        self.consume(TokenKind::LeftBrace, "Expected `{` before function body")?;
        let body = self.function_body()?;
        Ok(FunctionDecl {
            name,
            args,
            body: Some(body.boxed()),
            return_type,
            attributes,
            pos: self.pos_from(keyword),
        })
    }

    /// Parses parameters up to, and including, the closing parenthesis.
    fn function_args(&mut self, allow_init: bool) -> Result<Vec<FunctionArg>> {
        let mut args = Vec::new();
        self.ignore_newlines();
        while !self.is(TokenKind::RightParen) {
            let start = self.peek();
            let is_constructor_init = allow_init && self.take(TokenKind::This);
            if is_constructor_init {
                self.consume(TokenKind::Dot, "Expected `.` after `this`")?;
            }
            let name = self.consume(TokenKind::Identifier, "Expected a parameter name")?;
            let ty = if self.take(TokenKind::Colon) {
                Some(self.type_path(true)?)
            } else {
                None
            };
            let default = if self.take(TokenKind::Equal) {
                Some(self.expression()?)
            } else {
                None
            };
            args.push(FunctionArg {
                name: name.lexeme.to_string(),
                ty,
                default,
                is_constructor_init,
                pos: self.pos_from(start),
            });
            self.ignore_newlines();
            if !self.take(TokenKind::Comma) {
                break;
            }
            self.ignore_newlines();
        }
        self.consume(TokenKind::RightParen, "Expected `)` after parameters")?;
        Ok(args)
    }

    fn return_type(&mut self) -> Result<Option<TypePath>> {
        if self.take(TokenKind::Colon) {
            Ok(Some(self.type_path(true)?))
        } else {
            Ok(None)
        }
    }

    /// Parses a function body after its opening brace. A body starting on
    /// the same line with an expression is an inline body, returning it.
    fn function_body(&mut self) -> Result<Stmt> {
        let open = self.previous();
        if self.take(TokenKind::RightBrace) {
            return Ok(Stmt::new(StmtKind::Block(Vec::new()), self.pos_from(open)));
        }
        if self.is_inline_body() {
            return self.inline_body(open, "Inline functions must contain only one expression");
        }
        self.block_statement()
    }

    fn is_inline_body(&self) -> bool {
        let kind = self.peek().kind;
        !matches!(kind, TokenKind::Newline | TokenKind::Return | TokenKind::RightBrace)
            && !starts_statement(kind)
    }

    fn inline_body(&mut self, open: &Token, message: &str) -> Result<Stmt> {
        let expr = self.expression()?;
        let pos = expr.pos.clone();
        self.ignore_newlines();
        self.consume(TokenKind::RightBrace, message)?;
        let ret = Stmt::new(StmtKind::Return(Some(expr)), pos);
        Ok(Stmt::new(StmtKind::Block(vec![ret]), self.pos_from(open)))
    }

    /// Parses declarations up to, and including, the closing brace.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        self.ignore_newlines();
        while !self.is(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration(Vec::new())?);
            self.ignore_newlines();
        }
        self.consume(TokenKind::RightBrace, "Expected `}` at the end of a block")?;
        Ok(stmts)
    }

    fn block_statement(&mut self) -> Result<Stmt> {
        let open = self.previous();
        let stmts = self.block()?;
        Ok(Stmt::new(StmtKind::Block(stmts), self.pos_from(open)))
    }

    fn class_declaration(&mut self, attributes: Vec<Expr>) -> Result<Stmt> {
        let keyword = self.previous();
        let name = self.consume(TokenKind::TypeIdentifier, "Expected a class name")?;
        let mut superclass = None;
        let mut interfaces = Vec::new();
        loop {
            self.ignore_newlines();
            if self.take(TokenKind::Extends) {
                if superclass.is_some() {
                    return Err(self.error(self.previous(), "Can only extend once"));
                }
                superclass = Some(self.type_path(false)?);
            } else if self.take(TokenKind::Implements) {
                interfaces.extend(self.separated(TokenKind::Comma, |p| p.type_path(false))?);
            } else {
                break;
            }
        }
        self.consume(TokenKind::LeftBrace, "Expected `{` before class body")?;
        let fields = self.class_body()?;
        let class = ClassDecl {
            name: name.lexeme.to_string(),
            kind: ClassKind::Class,
            superclass,
            interfaces,
            fields,
            attributes,
            pos: self.pos_from(keyword),
        };
        let pos = class.pos.clone();
        Ok(Stmt::new(StmtKind::Class(Rc::new(class)), pos))
    }

    fn interface_declaration(&mut self, attributes: Vec<Expr>) -> Result<Stmt> {
        let keyword = self.previous();
        let name = self.consume(TokenKind::TypeIdentifier, "Expected an interface name")?;
        self.ignore_newlines();
        let mut interfaces = Vec::new();
        if self.take(TokenKind::Extends) {
            interfaces = self.separated(TokenKind::Comma, |p| p.type_path(false))?;
            self.ignore_newlines();
        }
        if self.is(TokenKind::Implements) {
            return Err(self.error(self.peek(), "Interfaces can only extend other interfaces"));
        }
        self.consume(TokenKind::LeftBrace, "Expected `{` before interface body")?;

        self.in_interface = true;
        let fields = self.class_body();
        self.in_interface = false;
        let mut fields = fields?;
        for field in &mut fields {
            if !field.has(FieldAccess::Abstract) {
                field.access.push(FieldAccess::Abstract);
            }
        }

        let class = ClassDecl {
            name: name.lexeme.to_string(),
            kind: ClassKind::Interface,
            superclass: None,
            interfaces,
            fields,
            attributes,
            pos: self.pos_from(keyword),
        };
        let pos = class.pos.clone();
        Ok(Stmt::new(StmtKind::Class(Rc::new(class)), pos))
    }

    fn trait_declaration(&mut self, attributes: Vec<Expr>) -> Result<Stmt> {
        let keyword = self.previous();
        let name = self.consume(TokenKind::TypeIdentifier, "Expected a trait name")?;
        self.ignore_newlines();
        self.consume(TokenKind::LeftBrace, "Expected `{` before trait body")?;
        let fields = self.class_body()?;
        let class = ClassDecl {
            name: name.lexeme.to_string(),
            kind: ClassKind::Trait,
            superclass: None,
            interfaces: Vec::new(),
            fields,
            attributes,
            pos: self.pos_from(keyword),
        };
        let pos = class.pos.clone();
        Ok(Stmt::new(StmtKind::Class(Rc::new(class)), pos))
    }

    /// Parses an enum, which is lowered into a class. A value enum (`enum E
    /// as Int`) gets one constant per case. Any other enum gets one static
    /// factory per case, building a `::Std::PhaseEnum` instance.
    fn enum_declaration(&mut self, attributes: Vec<Expr>) -> Result<Stmt> {
        let keyword = self.previous();
        let name_token = self.consume(TokenKind::TypeIdentifier, "Expected an enum name")?;
        let name = name_token.lexeme.to_string();

        let (fields, superclass) = if self.take(TokenKind::As) {
            let wrapped = self.consume(TokenKind::TypeIdentifier, "Expected a wrapped type name")?;
            if !matches!(&*wrapped.lexeme, "String" | "Int") {
                return Err(self.error(wrapped, "Enums can only wrap `String` or `Int`"));
            }
            self.ignore_newlines();
            self.consume(TokenKind::LeftBrace, "Expected `{` before enum body")?;
            (self.value_enum_cases(&wrapped.lexeme)?, None)
        } else {
            self.ignore_newlines();
            self.consume(TokenKind::LeftBrace, "Expected `{` before enum body")?;
            let superclass = TypePath::from_qualified("Std::PhaseEnum");
            (self.adt_enum_cases(&name)?, Some(superclass))
        };

        let class = ClassDecl {
            name,
            kind: ClassKind::Class,
            superclass,
            interfaces: Vec::new(),
            fields,
            attributes,
            pos: self.pos_from(keyword),
        };
        let pos = class.pos.clone();
        Ok(Stmt::new(StmtKind::Class(Rc::new(class)), pos))
    }

    fn value_enum_cases(&mut self, wrapped: &str) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        self.ignore_newlines();
        for index in 0.. {
            if self.is(TokenKind::RightBrace) || self.is_at_end() {
                break;
            }
            let case = self.consume(TokenKind::TypeIdentifier, "Expected an uppercase case name")?;
            let value = if self.take(TokenKind::Equal) {
                self.ignore_newlines();
                self.expression()?
            } else {
                let literal = match wrapped {
                    "String" => Literal::String(case.lexeme.to_string()),
                    _ => Literal::Number(index.to_string()),
                };
                Expr::new(ExprKind::Literal(literal), case.pos.clone())
            };
            self.expect_end_of_statement()?;
            fields.push(Field {
                name: case.lexeme.to_string(),
                kind: FieldKind::Var {
                    ty: None,
                    init: Some(value),
                },
                access: vec![FieldAccess::Const],
                attributes: Vec::new(),
                pos: self.pos_from(case),
            });
        }
        self.consume(TokenKind::RightBrace, "Expected `}` at the end of an enum body")?;
        Ok(fields)
    }

    fn adt_enum_cases(&mut self, enum_name: &str) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        self.ignore_newlines();
        for index in 0.. {
            if self.is(TokenKind::RightBrace) || self.is_at_end() {
                break;
            }
            let case = self.consume(TokenKind::TypeIdentifier, "Expected an uppercase case name")?;
            let args = if self.take(TokenKind::LeftParen) {
                self.function_args(false)?
            } else {
                Vec::new()
            };
            let names: Vec<&str> = args.iter().map(|arg| &*arg.name).collect();
            let code = format!(
                "{{ return {enum_name}({index}, \"{}\", [{}]) }}",
                case.lexeme,
                names.join(", ")
            );
            let body = synth::snippet_stmt(&code, self.reporter)?;
            self.expect_end_of_statement()?;

            let pos = self.pos_from(case);
            let func = FunctionDecl {
                name: case.lexeme.to_string(),
                args,
                body: Some(body.boxed()),
                return_type: Some(TypePath::new(enum_name)),
                attributes: Vec::new(),
                pos: pos.clone(),
            };
            fields.push(Field {
                name: case.lexeme.to_string(),
                kind: FieldKind::Fun(Rc::new(func)),
                access: vec![FieldAccess::Public, FieldAccess::Static],
                attributes: Vec::new(),
                pos,
            });
        }
        self.consume(TokenKind::RightBrace, "Expected `}` at the end of an enum body")?;
        Ok(fields)
    }

    /// Parses fields up to, and including, the closing brace. Promoted
    /// constructor parameters get a matching public field, unless one is
    /// already declared.
    fn class_body(&mut self) -> Result<Vec<Field>> {
        let mut fields: Vec<Field> = Vec::new();
        self.ignore_newlines();
        while !self.is(TokenKind::RightBrace) && !self.is_at_end() {
            let field = self.field_declaration()?;
            if let FieldKind::Fun(func) = &field.kind {
                for arg in func.args.iter().filter(|arg| arg.is_constructor_init) {
                    if fields.iter().any(|f| f.name == arg.name) {
                        continue;
                    }
                    fields.push(Field {
                        name: arg.name.clone(),
                        kind: FieldKind::Var {
                            ty: arg.ty.clone(),
                            init: None,
                        },
                        access: vec![FieldAccess::Public],
                        attributes: Vec::new(),
                        pos: arg.pos.clone(),
                    });
                }
            }
            fields.push(field);
            self.ignore_newlines();
        }
        self.consume(TokenKind::RightBrace, "Expected `}` at the end of a class body")?;
        Ok(fields)
    }

    fn field_declaration(&mut self) -> Result<Field> {
        let start = self.peek();

        if self.take(TokenKind::Use) {
            let path = self.type_path(false)?;
            self.expect_end_of_statement()?;
            return Ok(Field {
                name: path.qualified_name(),
                kind: FieldKind::Use(path),
                access: Vec::new(),
                attributes: Vec::new(),
                pos: self.pos_from(start),
            });
        }

        if self.take(TokenKind::Const) {
            let name = self.consume(TokenKind::TypeIdentifier, "Expected an uppercase constant name")?;
            let ty = if self.take(TokenKind::Colon) {
                Some(self.type_path(true)?)
            } else {
                None
            };
            self.consume(TokenKind::Equal, "Constants must be initialized")?;
            self.ignore_newlines();
            let init = self.expression()?;
            let pos = self.pos_from(start);
            self.expect_end_of_statement()?;
            return Ok(Field {
                name: name.lexeme.to_string(),
                kind: FieldKind::Var {
                    ty,
                    init: Some(init),
                },
                access: vec![FieldAccess::Const],
                attributes: Vec::new(),
                pos,
            });
        }

        let attributes = if self.is(TokenKind::LeftBracket) {
            self.attribute_list()?
        } else {
            Vec::new()
        };

        let mut access = Vec::new();
        loop {
            let token = self.peek();
            let modifier = match token.kind {
                TokenKind::Static => FieldAccess::Static,
                TokenKind::Public => FieldAccess::Public,
                TokenKind::Private => FieldAccess::Private,
                TokenKind::Abstract => FieldAccess::Abstract,
                _ => break,
            };
            if access.contains(&modifier) {
                let message = format!("Only one `{modifier}` declaration is allowed per field");
                return Err(self.error(token, &message));
            }
            self.advance();
            access.push(modifier);
        }
        if !access.contains(&FieldAccess::Public) && !access.contains(&FieldAccess::Private) {
            access.insert(0, FieldAccess::Public);
        }
        let is_abstract = access.contains(&FieldAccess::Abstract);

        let name = self.consume(TokenKind::Identifier, "Expected a field name")?;
        let name = name.lexeme.to_string();
        let ty = if self.take(TokenKind::Colon) {
            Some(self.type_path(true)?)
        } else {
            None
        };

        let token = self.peek();
        let kind = match token.kind {
            TokenKind::LeftBrace => {
                self.advance();
                self.property(ty)?
            }
            TokenKind::Equal => {
                self.advance();
                if is_abstract {
                    return Err(self.error(token, "No assignment allowed on abstract fields"));
                }
                self.ignore_newlines();
                let init = self.expression()?;
                self.expect_end_of_statement()?;
                FieldKind::Var {
                    ty,
                    init: Some(init),
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let is_constructor = name == CONSTRUCTOR_NAME;
                let args = self.function_args(is_constructor)?;
                let return_type = self.return_type()?;
                let body = if is_abstract || (self.in_interface && !self.is(TokenKind::LeftBrace)) {
                    self.expect_end_of_statement()?;
                    None
                } else {
                    self.consume(TokenKind::LeftBrace, "Expected `{` before method body")?;
                    Some(self.function_body()?.boxed())
                };
                let mut func = FunctionDecl {
                    name: name.clone(),
                    args,
                    body,
                    return_type,
                    attributes: attributes.clone(),
                    pos: self.pos_from(start),
                };
                if is_constructor {
                    self.promote_constructor_args(&mut func)?;
                }
                FieldKind::Fun(Rc::new(func))
            }
            _ => {
                self.expect_end_of_statement()?;
                FieldKind::Var { ty, init: None }
            }
        };

        Ok(Field {
            name,
            kind,
            access,
            attributes,
            pos: self.pos_from(start),
        })
    }

    /// Parses the `get`/`set` accessors of a property after its opening
    /// brace.
    fn property(&mut self, ty: Option<TypePath>) -> Result<FieldKind> {
        let mut getter = None;
        let mut setter = None;
        self.ignore_newlines();
        while !self.is(TokenKind::RightBrace) && !self.is_at_end() {
            let mode = self.consume(TokenKind::Identifier, "Expected `get` or `set`")?;
            let (slot, args, return_type) = match &*mode.lexeme {
                "get" => (&mut getter, Vec::new(), ty.clone()),
                "set" => {
                    let value = FunctionArg {
                        name: "value".to_owned(),
                        ty: ty.clone(),
                        default: None,
                        is_constructor_init: false,
                        pos: mode.pos.clone(),
                    };
                    (&mut setter, vec![value], None)
                }
                _ => return Err(self.error(mode, "Expected `get` or `set`")),
            };
            if slot.is_some() {
                let message = format!("`{}` already defined", mode.lexeme);
                return Err(self.error(mode, &message));
            }
            self.consume(TokenKind::LeftBrace, "Expected `{` before accessor body")?;
            let body = self.function_body()?;
            *slot = Some(Rc::new(FunctionDecl {
                name: mode.lexeme.to_string(),
                args,
                body: Some(body.boxed()),
                return_type,
                attributes: Vec::new(),
                pos: self.pos_from(mode),
            }));
            self.ignore_newlines();
        }
        self.consume(TokenKind::RightBrace, "Expected `}` after property accessors")?;
        self.expect_end_of_statement()?;
        Ok(FieldKind::Prop { ty, getter, setter })
    }

    /// Prepends a `this.name = name` assignment to the constructor body for
    /// every `this.name` parameter.
    fn promote_constructor_args(&self, func: &mut FunctionDecl) -> Result<()> {
        let Some(body) = func.body.take() else {
            return Ok(());
        };
        let mut stmts = Vec::new();
        for arg in func.args.iter().filter(|arg| arg.is_constructor_init) {
            let code = format!("this.{0} = {0}", arg.name);
            stmts.push(synth::snippet_stmt(&code, self.reporter)?);
        }
        let pos = body.pos.clone();
        match body.kind {
            StmtKind::Block(rest) => stmts.extend(rest),
            kind => stmts.push(Stmt::new(kind, pos.clone())),
        }
        func.body = Some(Stmt::new(StmtKind::Block(stmts), pos).boxed());
        Ok(())
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        let cond = self.condition("if")?;
        let then = self.statement()?.into_block();
        let otherwise = if self.take_after_newlines(TokenKind::Else) {
            self.ignore_newlines();
            Some(self.statement()?.into_block().boxed())
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then: then.boxed(),
                otherwise,
            },
            self.pos_from(keyword),
        ))
    }

    /// Parses a parenthesized condition, ignoring newlines around it.
    fn condition(&mut self, keyword: &str) -> Result<Expr> {
        self.consume(TokenKind::LeftParen, &format!("Expected `(` after `{keyword}`"))?;
        self.ignore_newlines();
        let cond = self.expression()?;
        self.ignore_newlines();
        self.consume(TokenKind::RightParen, &format!("Expected `)` after `{keyword}` condition"))?;
        self.ignore_newlines();
        Ok(cond)
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        let value = match self.peek().kind {
            TokenKind::Semicolon | TokenKind::Newline | TokenKind::RightBrace | TokenKind::Eof => {
                None
            }
            _ => Some(self.expression()?),
        };
        let pos = self.pos_from(keyword);
        self.expect_end_of_statement()?;
        Ok(Stmt::new(StmtKind::Return(value), pos))
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        let cond = self.condition("while")?;
        let body = self.statement()?;
        Ok(Stmt::new(
            StmtKind::While {
                cond,
                body: body.boxed(),
                inverted: false,
            },
            self.pos_from(keyword),
        ))
    }

    fn do_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        self.ignore_newlines();
        let body = self.statement()?;
        if !self.take_after_newlines(TokenKind::While) {
            return Err(self.error(self.peek(), "Expected `while` after a `do` body"));
        }
        self.consume(TokenKind::LeftParen, "Expected `(` after `while`")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected `)` after `while` condition")?;
        let pos = self.pos_from(keyword);
        self.expect_end_of_statement()?;
        Ok(Stmt::new(
            StmtKind::While {
                cond,
                body: body.boxed(),
                inverted: true,
            },
            pos,
        ))
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        self.consume(TokenKind::LeftParen, "Expected `(` after `for`")?;
        let key = self.consume(TokenKind::Identifier, "Expected a loop variable")?;
        let value = if self.take(TokenKind::Colon) {
            let value = self.consume(TokenKind::Identifier, "Expected a loop variable after `:`")?;
            Some(value.lexeme.to_string())
        } else {
            None
        };
        self.consume(TokenKind::In, "Expected `in` after loop variables")?;
        let target = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected `)` after loop target")?;
        self.ignore_newlines();
        let body = self.statement()?;
        Ok(Stmt::new(
            StmtKind::For {
                key: key.lexeme.to_string(),
                value,
                target,
                body: body.boxed(),
            },
            self.pos_from(keyword),
        ))
    }

    fn switch_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        let target = self.condition("switch")?;
        self.consume(TokenKind::LeftBrace, "Expected `{` before switch cases")?;
        self.ignore_newlines();

        let mut cases = Vec::new();
        loop {
            let condition = if self.take(TokenKind::Case) {
                self.ignore_newlines();
                Some(self.expression()?)
            } else if self.take(TokenKind::Default) {
                None
            } else {
                break;
            };
            self.consume(TokenKind::Colon, "Expected `:` after case condition")?;
            self.ignore_newlines();
            let mut body = Vec::new();
            while !matches!(
                self.peek().kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RightBrace | TokenKind::Eof
            ) {
                body.push(self.statement()?);
                self.ignore_newlines();
            }
            cases.push(MatchCase { condition, body });
        }

        self.consume(TokenKind::RightBrace, "Expected `}` at the end of a switch")?;
        Ok(Stmt::new(
            StmtKind::Switch { target, cases },
            self.pos_from(keyword),
        ))
    }

    fn try_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        self.ignore_newlines();
        self.consume(TokenKind::LeftBrace, "Expected `{` after `try`")?;
        let body = self.block_statement()?;

        let mut catches = Vec::new();
        while self.take_after_newlines(TokenKind::Catch) {
            let start = self.previous();
            self.consume(TokenKind::LeftParen, "Expected `(` after `catch`")?;
            let name = self.consume(TokenKind::Identifier, "Expected a name for the caught value")?;
            let ty = if self.take(TokenKind::Colon) {
                Some(self.type_path(false)?)
            } else {
                None
            };
            self.consume(TokenKind::RightParen, "Expected `)` after caught value")?;
            self.ignore_newlines();
            self.consume(TokenKind::LeftBrace, "Expected `{` before catch body")?;
            let body = self.block_statement()?;
            catches.push(Stmt::new(
                StmtKind::Catch {
                    name: name.lexeme.to_string(),
                    ty,
                    body: body.boxed(),
                },
                self.pos_from(start),
            ));
        }

        Ok(Stmt::new(
            StmtKind::Try {
                body: body.boxed(),
                catches,
            },
            self.pos_from(keyword),
        ))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;
        let token = self.peek();
        let compound = match token.kind {
            TokenKind::Equal => false,
            TokenKind::PlusEqual => true,
            _ => return Ok(expr),
        };
        self.advance();
        self.ignore_newlines();
        let mut value = self.assignment()?;
        if compound {
            let pos = expr.pos.merge(&value.pos);
            value = Expr::new(
                ExprKind::Binary {
                    lhs: expr.clone().boxed(),
                    op: BinaryOperator::Add,
                    rhs: value.boxed(),
                },
                pos,
            );
        }

        let pos = expr.pos.merge(&value.pos);
        let kind = match expr.kind {
            ExprKind::Variable(name) => ExprKind::Assign {
                name,
                value: value.boxed(),
            },
            ExprKind::Get { target, field } => ExprKind::Set {
                target,
                field,
                value: value.boxed(),
            },
            ExprKind::ArrayIndexGet { target, index } => ExprKind::ArrayIndexSet {
                target,
                index,
                value: value.boxed(),
            },
            _ => return Err(self.error(token, "Invalid assignment target")),
        };
        Ok(Expr::new(kind, pos))
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;
        while self.take(TokenKind::OrOr) {
            self.ignore_newlines();
            let rhs = self.and()?;
            expr = logical(expr, LogicalOperator::Or, rhs);
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;
        while self.take(TokenKind::AndAnd) {
            self.ignore_newlines();
            let rhs = self.equality()?;
            expr = logical(expr, LogicalOperator::And, rhs);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualEqual => BinaryOperator::Eq,
                TokenKind::BangEqual => BinaryOperator::NotEq,
                _ => break,
            };
            self.advance();
            self.ignore_newlines();
            let rhs = self.comparison()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.addition()?;
        if self.take(TokenKind::Is) {
            let ty = self.type_path(true)?;
            let pos = expr.pos.merge(&self.previous().pos);
            return Ok(Expr::new(
                ExprKind::Is {
                    expr: expr.boxed(),
                    ty,
                },
                pos,
            ));
        }
        loop {
            let op = match self.peek().kind {
                TokenKind::Greater => BinaryOperator::Greater,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEq,
                TokenKind::Less => BinaryOperator::Less,
                TokenKind::LessEqual => BinaryOperator::LessEq,
                _ => break,
            };
            self.advance();
            self.ignore_newlines();
            let rhs = self.addition()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn addition(&mut self) -> Result<Expr> {
        let mut expr = self.multiplication()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                TokenKind::Concat => BinaryOperator::Concat,
                _ => break,
            };
            self.advance();
            self.ignore_newlines();
            let rhs = self.multiplication()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn multiplication(&mut self) -> Result<Expr> {
        let mut expr = self.range()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            self.ignore_newlines();
            let rhs = self.range()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn range(&mut self) -> Result<Expr> {
        let mut expr = self.pipe()?;
        while self.take(TokenKind::Range) {
            self.ignore_newlines();
            let to = self.pipe()?;
            let pos = expr.pos.merge(&to.pos);
            expr = Expr::new(
                ExprKind::Range {
                    from: expr.boxed(),
                    to: to.boxed(),
                },
                pos,
            );
        }
        Ok(expr)
    }

    /// Parses `lhs |> target`, which appends `lhs` to the arguments of the
    /// `target` call, or calls the `target` lambda with it.
    fn pipe(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;
        while self.is(TokenKind::Pipe) {
            let op = self.advance();
            self.ignore_newlines();
            let Expr { kind, pos, .. } = self.unary()?;
            let kind = match kind {
                ExprKind::Call { callee, mut args } => {
                    args.push(CallArgument::Positional(expr));
                    ExprKind::Call { callee, args }
                }
                ExprKind::Lambda(func) => {
                    let lambda = Expr::new(ExprKind::Lambda(func), pos.clone());
                    let callee = Expr::new(ExprKind::Grouping(lambda.boxed()), pos.clone());
                    ExprKind::Call {
                        callee: callee.boxed(),
                        args: vec![CallArgument::Positional(expr)],
                    }
                }
                _ => return Err(self.error(op, "Expected a function/method call or a lambda")),
            };
            expr = Expr::new(kind, pos);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        let token = self.peek();
        let prefix = match token.kind {
            TokenKind::Bang => Some(UnaryOperator::Not),
            TokenKind::Minus => Some(UnaryOperator::Negate),
            TokenKind::PlusPlus => Some(UnaryOperator::Increment),
            TokenKind::MinusMinus => Some(UnaryOperator::Decrement),
            _ => None,
        };
        if let Some(op) = prefix {
            self.advance();
            self.ignore_newlines();
            let expr = self.unary()?;
            let pos = token.pos.merge(&expr.pos);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    expr: expr.boxed(),
                    prefix: true,
                },
                pos,
            ));
        }

        let expr = self.call()?;
        let postfix = match self.peek().kind {
            TokenKind::PlusPlus => UnaryOperator::Increment,
            TokenKind::MinusMinus => UnaryOperator::Decrement,
            _ => return Ok(expr),
        };
        let op = self.advance();
        let pos = expr.pos.merge(&op.pos);
        Ok(Expr::new(
            ExprKind::Unary {
                op: postfix,
                expr: expr.boxed(),
                prefix: false,
            },
            pos,
        ))
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            self.conditional_ignore_newlines();
            match self.peek().kind {
                TokenKind::LeftParen => {
                    self.advance();
                    expr = self.finish_call(expr)?;
                }
                TokenKind::LeftBrace => {
                    self.advance();
                    let lambda = self.short_lambda()?;
                    let pos = expr.pos.merge(&lambda.pos);
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: expr.boxed(),
                            args: vec![CallArgument::Positional(lambda)],
                        },
                        pos,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    self.ignore_newlines();
                    let field = self.field_name()?;
                    let pos = expr.pos.merge(&field.pos);
                    expr = Expr::new(
                        ExprKind::Get {
                            target: expr.boxed(),
                            field: field.boxed(),
                        },
                        pos,
                    );
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = if self.is(TokenKind::RightBracket) {
                        None
                    } else {
                        self.ignore_newlines();
                        let index = self.expression()?;
                        self.ignore_newlines();
                        Some(index.boxed())
                    };
                    let close = self.consume(TokenKind::RightBracket, "Expected `]` after index")?;
                    let pos = expr.pos.merge(&close.pos);
                    expr = Expr::new(
                        ExprKind::ArrayIndexGet {
                            target: expr.boxed(),
                            index,
                        },
                        pos,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parses the name after a `.`: a plain name or a braced dynamic one.
    fn field_name(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Identifier | TokenKind::TypeIdentifier | TokenKind::Class => Ok(Expr::new(
                ExprKind::Variable(token.lexeme.to_string()),
                token.pos.clone(),
            )),
            TokenKind::LeftBrace => {
                self.ignore_newlines();
                let mut name = self.expression()?;
                self.ignore_newlines();
                let close = self.consume(TokenKind::RightBrace, "Expected `}` after dynamic name")?;
                if name.as_variable().is_some() {
                    name = Expr::new(ExprKind::Grouping(name.boxed()), token.pos.merge(&close.pos));
                }
                Ok(name)
            }
            _ => Err(self.error(token, "Expected a property name after `.`")),
        }
    }

    /// Parses call arguments after the opening parenthesis. A trailing
    /// lambda, as in `f(a) { it }`, becomes the last argument.
    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut args = self.arguments()?;
        if self.take(TokenKind::LeftBrace) {
            args.push(CallArgument::Positional(self.short_lambda()?));
        }
        let pos = callee.pos.merge(&self.previous().pos);
        Ok(Expr::new(
            ExprKind::Call {
                callee: callee.boxed(),
                args,
            },
            pos,
        ))
    }

    /// Parses arguments up to, and including, the closing parenthesis.
    fn arguments(&mut self) -> Result<Vec<CallArgument>> {
        let mut args = Vec::new();
        self.ignore_newlines();
        while !self.is(TokenKind::RightParen) {
            let arg = if self.is(TokenKind::Identifier) && self.peek_next().kind == TokenKind::Colon {
                let name = self.advance();
                self.advance();
                self.ignore_newlines();
                CallArgument::Named {
                    name: name.lexeme.to_string(),
                    value: self.expression()?,
                }
            } else {
                CallArgument::Positional(self.expression()?)
            };
            args.push(arg);
            self.ignore_newlines();
            if !self.take(TokenKind::Comma) {
                break;
            }
            self.ignore_newlines();
        }
        self.consume(TokenKind::RightParen, "Expected `)` after arguments")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.peek();
        let literal = match token.kind {
            TokenKind::True => Some(Literal::True),
            TokenKind::False => Some(Literal::False),
            TokenKind::Null => Some(Literal::Null),
            TokenKind::Number => Some(Literal::Number(token.lexeme.to_string())),
            TokenKind::String => Some(Literal::String(token.text().to_owned())),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expr::new(ExprKind::Literal(literal), token.pos.clone()));
        }

        match token.kind {
            TokenKind::ColonColon | TokenKind::TypeIdentifier => {
                let path = self.path()?;
                Ok(Expr::new(ExprKind::Path(path), self.pos_from(token)))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Variable(token.lexeme.to_string()),
                    token.pos.clone(),
                ))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::new(ExprKind::This, token.pos.clone()))
            }
            TokenKind::Static => {
                self.advance();
                Ok(Expr::new(ExprKind::Static, token.pos.clone()))
            }
            TokenKind::Super => {
                self.advance();
                self.consume(TokenKind::Dot, "Expected `.` after `super`")?;
                self.ignore_newlines();
                let method = self.consume(TokenKind::Identifier, "Expected a superclass method name")?;
                Ok(Expr::new(
                    ExprKind::Super {
                        method: method.lexeme.to_string(),
                    },
                    token.pos.merge(&method.pos),
                ))
            }
            TokenKind::Interpolation => {
                self.advance();
                self.interpolation(token)
            }
            TokenKind::TemplateTag => {
                self.advance();
                self.tagged_template(token)
            }
            TokenKind::LeftParen => {
                self.advance();
                self.ignore_newlines();
                let expr = self.expression()?;
                self.ignore_newlines();
                let close = self.consume(TokenKind::RightParen, "Expected `)` after expression")?;
                Ok(Expr::new(
                    ExprKind::Grouping(expr.boxed()),
                    token.pos.merge(&close.pos),
                ))
            }
            TokenKind::Dollar => {
                self.advance();
                self.consume(TokenKind::LeftBracket, "Expected `[` after `$`")?;
                self.collection_literal(true)
            }
            TokenKind::LeftBracket => {
                self.advance();
                self.collection_literal(false)
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.short_lambda()
            }
            TokenKind::Function => {
                self.advance();
                let func = self.function(true, Vec::new())?;
                let pos = func.pos.clone();
                Ok(Expr::new(ExprKind::Lambda(Rc::new(func)), pos))
            }
            TokenKind::If => {
                self.advance();
                self.ternary()
            }
            TokenKind::Match => {
                self.advance();
                self.match_expr()
            }
            TokenKind::Eof => Err(self.error(token, "Unexpected end of file")),
            TokenKind::Newline => Err(self.error(token, "Unexpected newline")),
            _ => Err(self.error(token, &format!("Unexpected `{}`", token.lexeme))),
        }
    }

    /// Lowers an interpolated string into a `+` chain of its fragments and
    /// its parenthesized embedded expressions.
    fn interpolation(&mut self, first: &Token) -> Result<Expr> {
        let mut expr = string_literal(first);
        loop {
            let embedded = self.expression()?;
            let pos = embedded.pos.clone();
            expr = binary(
                expr,
                BinaryOperator::Add,
                Expr::new(ExprKind::Grouping(embedded.boxed()), pos),
            );
            let fragment = self.advance();
            match fragment.kind {
                TokenKind::String | TokenKind::Interpolation => {
                    if !fragment.text().is_empty() {
                        expr = binary(expr, BinaryOperator::Add, string_literal(fragment));
                    }
                    if fragment.kind == TokenKind::String {
                        return Ok(expr);
                    }
                }
                _ => return Err(self.error(fragment, "Unexpected end of interpolated string")),
            }
        }
    }

    /// Lowers `tag"a${x}b"` into `tag(["a", "b"], [x])`.
    fn tagged_template(&mut self, tag: &Token) -> Result<Expr> {
        let callee = Expr::new(ExprKind::Variable(tag.lexeme.to_string()), tag.pos.clone());
        let mut parts = Vec::new();
        let mut placeholders = Vec::new();
        loop {
            let fragment = self.advance();
            match fragment.kind {
                TokenKind::String => {
                    parts.push(string_literal(fragment));
                    break;
                }
                TokenKind::Interpolation => {
                    parts.push(string_literal(fragment));
                    placeholders.push(self.expression()?);
                }
                _ => return Err(self.error(fragment, "Expected a template string")),
            }
        }

        let pos = self.pos_from(tag);
        let list = |items: Vec<Expr>| {
            let pos = match (items.first(), items.last()) {
                (Some(first), Some(last)) => first.pos.merge(&last.pos),
                _ => pos.clone(),
            };
            CallArgument::Positional(Expr::new(
                ExprKind::ArrayLiteral {
                    items,
                    native: false,
                },
                pos,
            ))
        };
        let args = vec![list(parts), list(placeholders)];
        Ok(Expr::new(
            ExprKind::Call {
                callee: callee.boxed(),
                args,
            },
            pos,
        ))
    }

    /// Parses an array or map literal after its opening bracket. `[:]` is the
    /// empty map.
    fn collection_literal(&mut self, native: bool) -> Result<Expr> {
        let open = self.previous();
        self.ignore_newlines();
        if self.is(TokenKind::Colon) && self.peek_next().kind == TokenKind::RightBracket {
            self.advance();
            self.advance();
            return Ok(Expr::new(
                ExprKind::MapLiteral {
                    entries: Vec::new(),
                    native,
                },
                self.pos_from(open),
            ));
        }
        if self.take(TokenKind::RightBracket) {
            return Ok(Expr::new(
                ExprKind::ArrayLiteral {
                    items: Vec::new(),
                    native,
                },
                self.pos_from(open),
            ));
        }

        let first = self.expression()?;
        let is_map = self.take(TokenKind::Colon);
        let mut items = Vec::new();
        let mut entries = Vec::new();
        if is_map {
            self.ignore_newlines();
            entries.push((first, self.expression()?));
        } else {
            items.push(first);
        }
        loop {
            self.ignore_newlines();
            if !self.take(TokenKind::Comma) {
                break;
            }
            self.ignore_newlines();
            if self.is(TokenKind::RightBracket) {
                break;
            }
            let item = self.expression()?;
            if is_map {
                self.consume(TokenKind::Colon, "Expected `:` after map key")?;
                self.ignore_newlines();
                entries.push((item, self.expression()?));
            } else {
                items.push(item);
            }
        }
        self.consume(TokenKind::RightBracket, "Expected `]` at the end of a literal")?;

        let kind = if is_map {
            ExprKind::MapLiteral { entries, native }
        } else {
            ExprKind::ArrayLiteral { items, native }
        };
        Ok(Expr::new(kind, self.pos_from(open)))
    }

    /// Parses `{ |a, b| ... }` after its opening brace. Without a parameter
    /// list the lambda takes a single `it` parameter.
    fn short_lambda(&mut self) -> Result<Expr> {
        let open = self.previous();
        let mut inline = !self.is(TokenKind::Newline);
        self.ignore_newlines();

        let mut args = Vec::new();
        if self.take(TokenKind::Bar) {
            if !self.is(TokenKind::Bar) {
                args = self.separated(TokenKind::Comma, |p| {
                    let name = p.consume(TokenKind::Identifier, "Expected a parameter name")?;
                    Ok(FunctionArg {
                        name: name.lexeme.to_string(),
                        ty: None,
                        default: None,
                        is_constructor_init: false,
                        pos: name.pos.clone(),
                    })
                })?;
            }
            self.consume(TokenKind::Bar, "Expected `|` after lambda parameters")?;
            inline = !self.is(TokenKind::Newline);
        } else {
            args.push(FunctionArg {
                name: "it".to_owned(),
                ty: None,
                default: None,
                is_constructor_init: false,
                pos: open.pos.clone(),
            });
        }

        let body = if inline && self.is_inline_body() {
            self.inline_body(open, "Inline lambdas must contain only one expression")?
        } else {
            self.block_statement()?
        };
        let pos = self.pos_from(open);
        let func = FunctionDecl {
            name: String::new(),
            args,
            body: Some(body.boxed()),
            return_type: None,
            attributes: Vec::new(),
            pos: pos.clone(),
        };
        Ok(Expr::new(ExprKind::Lambda(Rc::new(func)), pos))
    }

    fn ternary(&mut self) -> Result<Expr> {
        let keyword = self.previous();
        let cond = self.condition("if")?;
        let then = self.expression()?;
        if !self.take_after_newlines(TokenKind::Else) {
            return Err(self.error(self.peek(), "Expected an `else` branch"));
        }
        self.ignore_newlines();
        let otherwise = self.expression()?;
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: cond.boxed(),
                then: then.boxed(),
                otherwise: otherwise.boxed(),
            },
            self.pos_from(keyword),
        ))
    }

    fn match_expr(&mut self) -> Result<Expr> {
        let keyword = self.previous();
        let target = self.condition("match")?;
        self.consume(TokenKind::LeftBrace, "Expected `{` before match arms")?;
        self.ignore_newlines();

        let mut cases = Vec::new();
        while !self.is(TokenKind::RightBrace) && !self.is_at_end() {
            let condition = if self.take(TokenKind::Default) {
                None
            } else {
                Some(self.expression()?)
            };
            self.consume(TokenKind::Arrow, "Expected `->` after match condition")?;
            self.ignore_newlines();
            let body = vec![self.statement()?];
            cases.push(MatchCase { condition, body });
            self.ignore_newlines();
        }
        self.consume(TokenKind::RightBrace, "Expected `}` at the end of a match")?;

        Ok(Expr::new(
            ExprKind::Match {
                target: target.boxed(),
                cases,
            },
            self.pos_from(keyword),
        ))
    }

    /// Parses a type annotation: `?::A::B<C, D>`.
    fn type_path(&mut self, allow_nullable: bool) -> Result<TypePath> {
        let is_nullable = self.take(TokenKind::Question);
        if is_nullable && !allow_nullable {
            return Err(self.error(self.previous(), "Nullable types are not allowed here"));
        }
        let mut path = self.path()?;
        path.is_nullable = is_nullable;
        if self.take(TokenKind::Less) {
            path.params = self.separated(TokenKind::Comma, |p| p.type_path(true))?;
            self.consume(TokenKind::Greater, "Expected `>` after type parameters")?;
        }
        Ok(path)
    }

    /// Parses `::A::B`, without type parameters.
    fn path(&mut self) -> Result<TypePath> {
        let is_absolute = self.take(TokenKind::ColonColon);
        let mut ns = Vec::new();
        loop {
            let segment = self.consume(TokenKind::TypeIdentifier, "Expected a type name")?;
            ns.push(segment.lexeme.to_string());
            if !(self.is(TokenKind::ColonColon)
                && self.peek_next().kind == TokenKind::TypeIdentifier)
            {
                break;
            }
            self.advance();
        }
        let name = ns.pop().unwrap_or_default();
        Ok(TypePath {
            ns,
            name,
            is_absolute,
            ..TypePath::default()
        })
    }
}

impl<'tok> Parser<'tok, '_> {
    fn new<'r>(tokens: &'tok [Token], reporter: &'r dyn ErrorReporter) -> Parser<'tok, 'r> {
        debug_assert!(tokens.last().is_some_and(Token::is_eof));
        Parser {
            tokens,
            cursor: 0,
            in_namespace: false,
            in_interface: false,
            reporter,
        }
    }

    fn error(&self, token: &Token, message: &str) -> SyntaxError {
        SyntaxError {
            pos: token.pos.clone(),
            message: message.to_owned(),
        }
    }

    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    /// Returns the current token.
    fn peek(&self) -> &'tok Token {
        let tokens = self.tokens;
        &tokens[self.cursor.min(tokens.len() - 1)]
    }

    /// Returns the token after the current one.
    fn peek_next(&self) -> &'tok Token {
        let tokens = self.tokens;
        &tokens[(self.cursor + 1).min(tokens.len() - 1)]
    }

    /// Returns the last consumed token.
    fn previous(&self) -> &'tok Token {
        let tokens = self.tokens;
        &tokens[self.cursor.saturating_sub(1).min(tokens.len() - 1)]
    }

    /// Returns the current token and advances, unless at the end.
    fn advance(&mut self) -> &'tok Token {
        let token = self.peek();
        if !token.is_eof() {
            self.cursor += 1;
        }
        token
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances past the expected token, or fails with `message`.
    fn consume(&mut self, expect: TokenKind, message: &str) -> Result<&'tok Token> {
        if self.is(expect) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    /// Like [`Parser::take`], but looks past a run of newlines, which are
    /// only consumed if the token is found.
    fn take_after_newlines(&mut self, expect: TokenKind) -> bool {
        let mut cursor = self.cursor;
        while self.tokens.get(cursor).is_some_and(|t| t.kind == TokenKind::Newline) {
            cursor += 1;
        }
        if self.tokens.get(cursor).is_some_and(|t| t.kind == expect) {
            self.cursor = cursor + 1;
            true
        } else {
            false
        }
    }

    /// Parses `item (sep item)*`, skipping newlines around each item.
    fn separated<T>(
        &mut self,
        sep: TokenKind,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        loop {
            self.ignore_newlines();
            items.push(item(self)?);
            self.ignore_newlines();
            if !self.take(sep) {
                break Ok(items);
            }
        }
    }

    fn ignore_newlines(&mut self) {
        while self.take(TokenKind::Newline) {}
    }

    /// Skips newlines only if the line after them starts with a token that
    /// continues the current expression, such as a leading `.` or `|>`.
    fn conditional_ignore_newlines(&mut self) {
        let mut cursor = self.cursor;
        while self.tokens.get(cursor).is_some_and(|t| t.kind == TokenKind::Newline) {
            cursor += 1;
        }
        if cursor > self.cursor
            && self.tokens.get(cursor).is_some_and(|t| t.kind.is_continuation())
        {
            self.cursor = cursor;
        }
    }

    /// A statement ends at a newline, a `;`, a closing brace or the end of
    /// the file. Only the first two are consumed.
    fn expect_end_of_statement(&mut self) -> Result<()> {
        match self.peek().kind {
            TokenKind::RightBrace | TokenKind::Eof => Ok(()),
            TokenKind::Newline | TokenKind::Semicolon => {
                self.advance();
                self.ignore_newlines();
                Ok(())
            }
            _ => Err(self.error(self.peek(), "Expected a newline or `;` after statement")),
        }
    }

    fn is_attribute_start(&self) -> bool {
        self.is(TokenKind::LeftBracket)
            && matches!(
                self.peek_next().kind,
                TokenKind::TypeIdentifier | TokenKind::ColonColon
            )
    }

    /// Spans from the start of `start` to the last consumed token.
    fn pos_from(&self, start: &Token) -> Position {
        start.pos.merge(&self.previous().pos)
    }
}

/// Keywords that start a statement, and so never an inline body.
fn starts_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Var
            | TokenKind::Global
            | TokenKind::While
            | TokenKind::Do
            | TokenKind::For
            | TokenKind::Switch
            | TokenKind::Throw
            | TokenKind::Try
    )
}

fn binary(lhs: Expr, op: BinaryOperator, rhs: Expr) -> Expr {
    let pos = lhs.pos.merge(&rhs.pos);
    Expr::new(
        ExprKind::Binary {
            lhs: lhs.boxed(),
            op,
            rhs: rhs.boxed(),
        },
        pos,
    )
}

fn logical(lhs: Expr, op: LogicalOperator, rhs: Expr) -> Expr {
    let pos = lhs.pos.merge(&rhs.pos);
    Expr::new(
        ExprKind::Logical {
            lhs: lhs.boxed(),
            op,
            rhs: rhs.boxed(),
        },
        pos,
    )
}

fn string_literal(token: &Token) -> Expr {
    Expr::new(
        ExprKind::Literal(Literal::String(token.text().to_owned())),
        token.pos.clone(),
    )
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests! {
        use parser;

        fn test_arithmetic_precedence() {
            let program = "1 + 2 * 3";
            let tree_ok = "
                binary +
                  number 1
                  binary *
                    number 2
                    number 3
            ";
        }

        fn test_comparison_and_logical() {
            let program = "a < b && !c || d == e";
            let tree_ok = "
                logical ||
                  logical &&
                    binary <
                      variable a
                      variable b
                    unary !
                      variable c
                  binary ==
                    variable d
                    variable e
            ";
        }

        fn test_assignment_targets() {
            let program = "
                a = 1
                a.b = 2
                a[0] = 3
                a[] = 4
            ";
            let tree_ok = r#"
                assign a
                  number 1
                set .b
                  variable a
                  number 2
                index-set
                  variable a
                  number 0
                  number 3
                index-set
                  variable a
                  number 4
            "#;
        }

        fn test_compound_assignment_desugars() {
            let program = "total += 2";
            let tree_ok = "
                assign total
                  binary +
                    variable total
                    number 2
            ";
        }

        fn test_invalid_assignment_target() {
            let program = "1 = 2";
            let expected_errors = &["Invalid assignment target"];
        }

        fn test_var_declaration() {
            let program = "var name: ?String = \"a\"";
            let tree_ok = r#"
                var name: ?String
                  string "a"
            "#;
        }

        fn test_postfix_and_prefix() {
            let program = "i++\n--j";
            let tree_ok = "
                unary ++ (postfix)
                  variable i
                unary --
                  variable j
            ";
        }

        fn test_calls_with_named_args_and_trailing_lambda() {
            let program = "foo(1, bar: 2) { it }";
            let tree_ok = "
                call
                  variable foo
                  number 1
                  named bar
                    number 2
                  lambda(it)
                    block
                      return
                        variable it
            ";
        }

        fn test_method_chain_on_continuation_lines() {
            let program = "
                items
                  .map { |x| x * 2 }
                  .filter { it > 1 }
            ";
            let tree_ok = "
                call
                  get .filter
                    call
                      get .map
                        variable items
                      lambda(x)
                        block
                          return
                            binary *
                              variable x
                              number 2
                  lambda(it)
                    block
                      return
                        binary >
                          variable it
                          number 1
            ";
        }

        fn test_newline_ends_statement_without_continuation() {
            let program = "a\nb";
            let tree_ok = "
                variable a
                variable b
            ";
        }

        fn test_dynamic_property() {
            let program = "a.{name}";
            let tree_ok = "
                get
                  variable a
                  grouping
                    variable name
            ";
        }

        fn test_pipe_into_call() {
            let program = "items |> map(double)";
            let tree_ok = "
                call
                  variable map
                  variable double
                  variable items
            ";
        }

        fn test_pipe_into_lambda() {
            let program = "2 |> { it + 1 }";
            let tree_ok = "
                call
                  grouping
                    lambda(it)
                      block
                        return
                          binary +
                            variable it
                            number 1
                  number 2
            ";
        }

        fn test_pipe_into_value_fails() {
            let program = "a |> b";
            let expected_errors = &["Expected a function/method call or a lambda"];
        }

        fn test_range_and_is() {
            let program = "var r = 1...10\nr is Array<Int>";
            let tree_ok = "
                var r
                  range
                    number 1
                    number 10
                is Array<Int>
                  variable r
            ";
        }

        fn test_interpolation_lowering() {
            let program = r#""a ${b} c""#;
            let tree_ok = r#"
                binary +
                  binary +
                    string "a "
                    grouping
                      variable b
                  string " c"
            "#;
        }

        fn test_tagged_template() {
            let program = r#"html"<p>${name}</p>""#;
            let tree_ok = r#"
                call
                  variable html
                  array
                    string "<p>"
                    string "</p>"
                  array
                    variable name
            "#;
        }

        fn test_collection_literals() {
            let program = "
                var a = [1, 2,]
                var m = [\"a\": 1, \"b\": 2]
                var e = [:]
                var n = $[1]
            ";
            let tree_ok = r#"
                var a
                  array
                    number 1
                    number 2
                var m
                  map
                    entry
                      string "a"
                      number 1
                    entry
                      string "b"
                      number 2
                var e
                  map
                var n
                  native array
                    number 1
            "#;
        }

        fn test_ternary_and_match() {
            let program = "
                var a = if (x) 1 else 2
                var b = match (a) {
                  1 -> \"one\"
                  default -> \"many\"
                }
            ";
            let tree_ok = r#"
                var a
                  ternary
                    variable x
                    number 1
                    number 2
                var b
                  match
                    variable a
                    case
                      number 1
                      string "one"
                    default
                      string "many"
            "#;
        }

        fn test_paths_and_keywords() {
            let program = "::Std::Io.print(this, static, super.run)";
            let tree_ok = "
                call
                  get .print
                    path ::Std::Io
                  this
                  static
                  super.run
            ";
        }

        fn test_if_else_wraps_branches_in_blocks() {
            let program = "
                if (a) b()
                else {
                  c()
                }
            ";
            let tree_ok = "
                if
                  variable a
                  block
                    call
                      variable b
                  else
                    block
                      call
                        variable c
            ";
        }

        fn test_loops() {
            let program = "
                while (a) a = a - 1
                do { a++ } while (a < 3)
                for (k: v in items) { print(k) }
            ";
            let tree_ok = "
                while
                  variable a
                  assign a
                    binary -
                      variable a
                      number 1
                do-while
                  binary <
                    variable a
                    number 3
                  block
                    unary ++ (postfix)
                      variable a
                for k, v in
                  variable items
                  block
                    call
                      variable print
                      variable k
            ";
        }

        fn test_switch_and_try() {
            let program = "
                switch (a) {
                  case 1:
                    b()
                  default:
                    c()
                }
                try {
                  d()
                } catch (e: Failure) {
                  throw e
                }
            ";
            let tree_ok = "
                switch
                  variable a
                  case
                    number 1
                    call
                      variable b
                  default
                    call
                      variable c
                try
                  block
                    call
                      variable d
                  catch e: Failure
                    block
                      throw
                        variable e
            ";
        }

        fn test_functions() {
            let program = "
                function add(a: Int, b: Int = 1): Int { a + b }
                function noop() {}
                function run() {
                  return
                }
            ";
            let tree_ok = "
                function add(a: Int, b: Int): Int
                  default b
                    number 1
                  block
                    return
                      binary +
                        variable a
                        variable b
                function noop()
                  block
                function run()
                  block
                    return
            ";
        }

        fn test_unterminated_inline_function() {
            let program = "function f() { a b }";
            let expected_errors = &["Inline functions must contain only one expression"];
        }

        fn test_class_with_fields() {
            let program = "
                [Entity]
                class User extends Model implements Named, Aged {
                  use Greets
                  const Table = \"users\"
                  private static count: Int = 0
                  name: String
                  abstract age(): Int
                  greet(): String { \"hi\" }
                }
            ";
            let tree_ok = r#"
                class User extends Model implements Named, Aged
                  attribute Entity
                  use Greets
                  const var Table
                    string "users"
                  private static var count: Int
                    number 0
                  public var name: String
                  public abstract fun age(): Int
                  public fun greet(): String
                    block
                      return
                        string "hi"
            "#;
        }

        fn test_constructor_promotion() {
            let program = "
                class Point {
                  new(this.x: Int, y: Int) {
                    print(y)
                  }
                }
            ";
            let tree_ok = "
                class Point
                  public var x: Int
                  public fun new(this.x: Int, y: Int)
                    block
                      set .x
                        this
                        variable x
                      call
                        variable print
                        variable y
            ";
        }

        fn test_properties() {
            let program = "
                class Box {
                  size: Int {
                    get { 1 }
                    set { print(value) }
                  }
                }
            ";
            let tree_ok = "
                class Box
                  public prop size: Int
                    get
                      block
                        return
                          number 1
                    set(value: Int)
                      block
                        return
                          call
                            variable print
                            variable value
            ";
        }

        fn test_property_get_twice() {
            let program = "class Box { size { get { 1 } get { 2 } } }";
            let expected_errors = &["`get` already defined"];
        }

        fn test_property_unknown_accessor() {
            let program = "class Box { size { fetch { 1 } } }";
            let expected_errors = &["Expected `get` or `set`"];
        }

        fn test_duplicate_modifier() {
            let program = "class A { static static a = 1 }";
            let expected_errors = &["Only one `static` declaration is allowed per field"];
        }

        fn test_abstract_assignment() {
            let program = "class A { abstract a = 1 }";
            let expected_errors = &["No assignment allowed on abstract fields"];
        }

        fn test_extends_twice() {
            let program = "class A extends B extends C {}";
            let expected_errors = &["Can only extend once"];
        }

        fn test_interface_fields_are_abstract() {
            let program = "
                interface Shape extends Named {
                  area(): Int
                }
            ";
            let tree_ok = "
                interface Shape extends Named
                  public abstract fun area(): Int
            ";
        }

        fn test_value_enum() {
            let program = "
                enum Size as Int {
                  Small
                  Large = 10
                  Huge
                }
            ";
            let tree_ok = "
                class Size
                  const var Small
                    number 0
                  const var Large
                    number 10
                  const var Huge
                    number 2
            ";
        }

        fn test_value_enum_rejects_other_types() {
            let program = "enum Size as Bool { Small }";
            let expected_errors = &["Enums can only wrap `String` or `Int`"];
        }

        fn test_adt_enum() {
            let program = "
                enum Option {
                  Some(value)
                  None
                }
            ";
            let tree_ok = r#"
                class Option extends ::Std::PhaseEnum
                  public static fun Some(value): Option
                    block
                      return
                        call
                          path Option
                          number 0
                          string "Some"
                          array
                            variable value
                  public static fun None(): Option
                    block
                      return
                        call
                          path Option
                          number 1
                          string "None"
                          array
            "#;
        }

        fn test_namespace_and_use() {
            let program = "
                namespace App::Models

                use Std::Io
                use Std::Collections::{Map, filter}
                use Std::print as show
                use ::Std::Json as Serializer
            ";
            let tree_ok = "
                namespace App::Models
                  use Std::Io
                  use Std::Collections::{Map, filter}
                  use Std::print as show
                  use ::Std::Json as Serializer
            ";
        }

        fn test_braced_namespaces() {
            let program = "
                namespace A { function a() {} }
                namespace B { function b() {} }
            ";
            let tree_ok = "
                namespace A
                  function a()
                    block
                namespace B
                  function b()
                    block
            ";
        }

        fn test_nested_namespace() {
            let program = "namespace A { namespace B {} }";
            let expected_errors = &["Namespaces cannot be nested"];
        }

        fn test_use_outside_namespace() {
            let program = "use Std::Io";
            let expected_errors = &["`use` is only allowed inside a namespace"];
        }

        fn test_missing_end_of_statement() {
            let program = "var a = 1 var b = 2";
            let expected_errors = &["Expected a newline or `;` after statement"];
        }

        fn test_semicolons_separate_statements() {
            let program = "a; b";
            let tree_ok = "
                variable a
                variable b
            ";
        }

        fn test_unexpected_token() {
            let program = "var a = )";
            let expected_errors = &["Unexpected `)`"];
        }

        fn test_global_and_block() {
            let program = "global config\n{ var a }";
            let tree_ok = "
                global config
                block
                  var a
            ";
        }
    }
}
