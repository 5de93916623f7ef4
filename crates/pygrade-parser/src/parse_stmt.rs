//! Statement parsing: simple statements, `;` lists, compound statements
//! and indented blocks.

use pygrade_lexer::TokenKind;
use pygrade_types::ast::*;
use pygrade_types::{ErrorCode, Span};

use crate::parser::{Parser, MAX_BLOCK_DEPTH};

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Module & Blocks
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_module(&mut self) -> Module {
        let start = self.current_span();
        let mut body = Vec::new();
        while !self.at_end() && !self.too_many_errors() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            if self.check_exact(&TokenKind::Dedent) {
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Some(stmts) => body.extend(stmts),
                None => self.synchronize(),
            }
        }
        let span = match (body.first(), body.last()) {
            (Some(first), Some(last)) => first.span.merge(last.span),
            _ => start,
        };
        Module { body, span }
    }

    /// Parse the body after a compound statement's `:`.
    fn parse_block(&mut self) -> Option<Vec<Stmt>> {
        if !self.eat(&TokenKind::Newline) {
            return self.parse_simple_line();
        }
        if !self.eat(&TokenKind::Indent) {
            self.error_at_current(ErrorCode::EXPECTED_INDENT, "expected an indented block");
            return None;
        }
        if self.block_depth >= MAX_BLOCK_DEPTH {
            self.error_at(
                ErrorCode::NESTING_LIMIT,
                format!("blocks are nested deeper than {MAX_BLOCK_DEPTH} levels"),
                self.previous_span(),
            );
            return None;
        }

        self.block_depth += 1;
        let mut body = Vec::new();
        while !self.at_end() && !self.check_exact(&TokenKind::Dedent) {
            if self.too_many_errors() {
                break;
            }
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            match self.parse_statement() {
                Some(stmts) => body.extend(stmts),
                None => self.synchronize(),
            }
        }
        self.eat(&TokenKind::Dedent);
        self.block_depth -= 1;
        Some(body)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════════

    /// One logical line, or one compound statement.
    pub(crate) fn parse_statement(&mut self) -> Option<Vec<Stmt>> {
        match self.peek_kind() {
            TokenKind::Def => self.parse_function_def().map(|s| vec![s]),
            TokenKind::Class => self.parse_class_def().map(|s| vec![s]),
            TokenKind::If => self.parse_if().map(|s| vec![s]),
            TokenKind::While => self.parse_while().map(|s| vec![s]),
            TokenKind::For => self.parse_for().map(|s| vec![s]),
            TokenKind::Indent => {
                self.error_at_current(ErrorCode::UNEXPECTED_INDENT, "unexpected indent");
                None
            }
            _ => self.parse_simple_line(),
        }
    }

    /// `small_stmt (';' small_stmt)* [';'] NEWLINE`
    fn parse_simple_line(&mut self) -> Option<Vec<Stmt>> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.eat(&TokenKind::Semicolon) {
            if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        self.expect_newline()?;
        Some(stmts)
    }

    fn parse_small_statement(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_testlist()?))
                }
            }
            TokenKind::Raise => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Raise(None)
                } else {
                    StmtKind::Raise(Some(self.parse_expression()?))
                }
            }
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_expression()?;
                let msg = if self.eat(&TokenKind::Comma) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            TokenKind::Import => {
                self.advance();
                StmtKind::Import(self.parse_aliases(true)?)
            }
            TokenKind::From => return self.parse_import_from(),
            TokenKind::ReservedWord(word) => {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_SYNTAX,
                    format!("'{word}' statements are not supported"),
                );
                return None;
            }
            _ => return self.parse_expression_statement(),
        };
        Some(Stmt::new(kind, start.merge(self.previous_span())))
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    /// Expression statement, assignment or augmented assignment.
    fn parse_expression_statement(&mut self) -> Option<Stmt> {
        let first = self.parse_testlist()?;

        if let Some(op) = self.match_augmented_op() {
            self.advance();
            self.check_target(&first, false);
            let value = self.parse_testlist()?;
            let span = first.span.merge(value.span);
            return Some(Stmt::new(
                StmtKind::AugAssign {
                    target: first,
                    op,
                    value,
                },
                span,
            ));
        }

        if !self.check_exact(&TokenKind::Eq) {
            let span = first.span;
            return Some(Stmt::new(StmtKind::Expr(first), span));
        }

        let mut targets = vec![first];
        let mut value = None;
        while self.eat(&TokenKind::Eq) {
            let next = self.parse_testlist()?;
            if let Some(previous) = value.replace(next) {
                targets.push(previous);
            }
        }
        let value = value?;
        for target in &targets {
            self.check_target(target, true);
        }
        let span = targets[0].span.merge(value.span);
        Some(Stmt::new(StmtKind::Assign { targets, value }, span))
    }

    fn match_augmented_op(&self) -> Option<BinOp> {
        match self.peek_kind() {
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::DoubleSlashEq => Some(BinOp::FloorDiv),
            TokenKind::PercentEq => Some(BinOp::Mod),
            TokenKind::DoubleStarEq => Some(BinOp::Pow),
            _ => None,
        }
    }

    /// Report targets that cannot be assigned to. Tuple and list unpacking
    /// is only allowed for plain assignment.
    pub(crate) fn check_target(&mut self, target: &Expr, allow_unpacking: bool) {
        match &target.kind {
            ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => {}
            ExprKind::Tuple(elts) | ExprKind::List(elts) if allow_unpacking => {
                for elt in elts {
                    self.check_target(elt, true);
                }
            }
            ExprKind::Starred(inner) if allow_unpacking => self.check_target(inner, false),
            ExprKind::Call(_) => self.error_at(
                ErrorCode::INVALID_TARGET,
                "cannot assign to function call",
                target.span,
            ),
            _ => self.error_at(
                ErrorCode::INVALID_TARGET,
                "cannot assign to expression",
                target.span,
            ),
        }
    }

    // ── Imports ───────────────────────────────────────────────────────────────

    fn parse_dotted_name(&mut self) -> Option<(String, Span)> {
        let first = self.expect_identifier()?;
        let mut name = first.name;
        let mut span = first.span;
        while self.eat(&TokenKind::Dot) {
            let part = self.expect_identifier()?;
            name.push('.');
            name.push_str(&part.name);
            span = span.merge(part.span);
        }
        Some((name, span))
    }

    /// `name [as alias] (, name [as alias])*`
    fn parse_aliases(&mut self, dotted: bool) -> Option<Vec<Alias>> {
        let mut names = Vec::new();
        loop {
            let (name, mut span) = if dotted {
                self.parse_dotted_name()?
            } else {
                let id = self.expect_identifier()?;
                (id.name, id.span)
            };
            let asname = if self.eat(&TokenKind::As) {
                let id = self.expect_identifier()?;
                span = span.merge(id.span);
                Some(id)
            } else {
                None
            };
            names.push(Alias { name, asname, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if matches!(self.peek_kind(), TokenKind::RParen | TokenKind::Newline) {
                break;
            }
        }
        Some(names)
    }

    fn parse_import_from(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let (module, _) = self.parse_dotted_name()?;
        self.expect(&TokenKind::Import)?;
        if self.check_exact(&TokenKind::Star) {
            self.error_at_current(
                ErrorCode::UNSUPPORTED_SYNTAX,
                "wildcard imports are not supported",
            );
            return None;
        }
        let names = if self.check_exact(&TokenKind::LParen) {
            let open = self.advance().span;
            let names = self.parse_aliases(false)?;
            self.expect_closing(&TokenKind::RParen, open)?;
            names
        } else {
            self.parse_aliases(false)?
        };
        Some(Stmt::new(
            StmtKind::ImportFrom { module, names },
            start.merge(self.previous_span()),
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Compound Statements
    // ══════════════════════════════════════════════════════════════════════════

    /// `def name(params) [-> annotation]: block`
    fn parse_function_def(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        let open = self.expect(&TokenKind::LParen)?.span;
        let params = self.parse_params(&TokenKind::RParen, true)?;
        self.expect_closing(&TokenKind::RParen, open)?;
        if self.eat(&TokenKind::Arrow) {
            self.parse_expression()?;
        }
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Some(Stmt::new(
            StmtKind::FunctionDef(Box::new(FunctionDef { name, params, body })),
            span,
        ))
    }

    /// `class Name[(bases)]: block`
    fn parse_class_def(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        let mut bases = Vec::new();
        if self.check_exact(&TokenKind::LParen) {
            let open = self.advance().span;
            while !self.check_exact(&TokenKind::RParen) {
                if matches!(self.peek_kind(), TokenKind::Name(_))
                    && self.look_ahead(1) == &TokenKind::Eq
                {
                    self.error_at_current(
                        ErrorCode::UNSUPPORTED_SYNTAX,
                        "class keyword arguments are not supported",
                    );
                    return None;
                }
                bases.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_closing(&TokenKind::RParen, open)?;
        }
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Some(Stmt::new(
            StmtKind::ClassDef(Box::new(ClassDef { name, bases, body })),
            span,
        ))
    }

    /// `if test: block (elif test: block)* [else: block]`
    ///
    /// `elif` chains become nested `If` statements in `orelse`.
    fn parse_if(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_block()?;
        let orelse = if self.check_exact(&TokenKind::Elif) {
            vec![self.parse_if()?]
        } else if self.eat(&TokenKind::Else) {
            self.expect(&TokenKind::Colon)?;
            self.parse_block()?
        } else {
            Vec::new()
        };
        let span = start.merge(self.previous_span());
        Some(Stmt::new(StmtKind::If { test, body, orelse }, span))
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_block()?;
        let span = start.merge(self.previous_span());
        Some(Stmt::new(StmtKind::While { test, body, orelse }, span))
    }

    /// `for target in iter: block [else: block]`
    fn parse_for(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let target = self.parse_target_list()?;
        self.check_target(&target, true);
        self.expect(&TokenKind::In)?;
        let iter = self.parse_testlist()?;
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_block()?;
        let span = start.merge(self.previous_span());
        Some(Stmt::new(
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            span,
        ))
    }

    fn parse_else_block(&mut self) -> Option<Vec<Stmt>> {
        if self.eat(&TokenKind::Else) {
            self.expect(&TokenKind::Colon)?;
            self.parse_block()
        } else {
            Some(Vec::new())
        }
    }
}
