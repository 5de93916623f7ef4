//! Expression parsing with Python operator precedence.
//!
//! Precedence (lowest → highest):
//! 1. `lambda`
//! 2. `x if c else y`
//! 3. `or`
//! 4. `and`
//! 5. `not`
//! 6. comparisons, `in`, `not in`, `is`, `is not` (chainable)
//! 7. `|`
//! 8. `^`
//! 9. `&`
//! 10. `<<`, `>>`
//! 11. `+`, `-`
//! 12. `*`, `@`, `/`, `//`, `%`
//! 13. unary `+`, `-`, `~`
//! 14. `**` (right associative, binds tighter than a unary on its left)
//! 15. calls, subscripts, attribute access

use pygrade_lexer::TokenKind;
use pygrade_types::ast::*;
use pygrade_types::{ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Points
    // ══════════════════════════════════════════════════════════════════════════

    /// A single expression (`test` in the Python grammar).
    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        self.enter_expr()?;
        let result = if self.check_exact(&TokenKind::Lambda) {
            self.parse_lambda()
        } else {
            self.parse_conditional()
        };
        self.leave_expr();
        result
    }

    /// Comma-separated expressions; more than one (or a trailing comma)
    /// forms an unparenthesized tuple.
    pub(crate) fn parse_testlist(&mut self) -> Option<Expr> {
        let first = self.parse_star_or_expression()?;
        if !self.check_exact(&TokenKind::Comma) {
            return Some(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.at_testlist_end() {
                break;
            }
            elts.push(self.parse_star_or_expression()?);
        }
        let span = elts[0].span.merge(self.previous_span());
        Some(Expr::new(ExprKind::Tuple(elts), span))
    }

    /// `for` targets: bitwise-or expressions so `in` is not swallowed.
    pub(crate) fn parse_target_list(&mut self) -> Option<Expr> {
        let first = self.parse_target()?;
        if !self.check_exact(&TokenKind::Comma) {
            return Some(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check_exact(&TokenKind::In) {
                break;
            }
            elts.push(self.parse_target()?);
        }
        let span = elts[0].span.merge(self.previous_span());
        Some(Expr::new(ExprKind::Tuple(elts), span))
    }

    fn parse_target(&mut self) -> Option<Expr> {
        if self.check_exact(&TokenKind::Star) {
            let start = self.advance().span;
            let inner = self.parse_bitor()?;
            let span = start.merge(inner.span);
            return Some(Expr::new(ExprKind::Starred(Box::new(inner)), span));
        }
        self.parse_bitor()
    }

    fn at_testlist_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Eof
                | TokenKind::Eq
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Colon
        ) || self.match_augmented_token()
    }

    fn match_augmented_token(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::DoubleSlashEq
                | TokenKind::PercentEq
                | TokenKind::DoubleStarEq
        )
    }

    fn parse_star_or_expression(&mut self) -> Option<Expr> {
        if self.check_exact(&TokenKind::Star) {
            let start = self.advance().span;
            let inner = self.parse_bitor()?;
            let span = start.merge(inner.span);
            return Some(Expr::new(ExprKind::Starred(Box::new(inner)), span));
        }
        self.parse_expression()
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Lambda & Conditional
    // ══════════════════════════════════════════════════════════════════════════

    /// `lambda params: body`
    fn parse_lambda(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let params = self.parse_params(&TokenKind::Colon, false)?;
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_expression()?;
        let span = start.merge(body.span);
        Some(Expr::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            span,
        ))
    }

    /// `or_test ['if' or_test 'else' test]`
    fn parse_conditional(&mut self) -> Option<Expr> {
        let body = self.parse_or()?;
        if !self.eat(&TokenKind::If) {
            return Some(body);
        }
        let test = self.parse_or()?;
        self.expect(&TokenKind::Else)?;
        let orelse = self.parse_expression()?;
        let span = body.span.merge(orelse.span);
        Some(Expr::new(
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            span,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Boolean Operators
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_or(&mut self) -> Option<Expr> {
        let first = self.parse_and()?;
        self.parse_bool_chain(first, &TokenKind::Or, BoolOp::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let first = self.parse_not()?;
        self.parse_bool_chain(first, &TokenKind::And, BoolOp::And, Self::parse_not)
    }

    /// `a or b or c` becomes one `BoolOp` with three values.
    fn parse_bool_chain(
        &mut self,
        first: Expr,
        token: &TokenKind,
        op: BoolOp,
        operand: fn(&mut Self) -> Option<Expr>,
    ) -> Option<Expr> {
        if !self.check_exact(token) {
            return Some(first);
        }
        let mut values = vec![first];
        while self.eat(token) {
            values.push(operand(self)?);
        }
        let span = values[0].span.merge(self.previous_span());
        Some(Expr::new(ExprKind::BoolOp { op, values }, span))
    }

    fn parse_not(&mut self) -> Option<Expr> {
        if !self.check_exact(&TokenKind::Not) {
            return self.parse_comparison();
        }
        let start = self.advance().span;
        self.enter_expr()?;
        let operand = self.parse_not();
        self.leave_expr();
        let operand = operand?;
        let span = start.merge(operand.span);
        Some(Expr::new(
            ExprKind::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `a < b <= c` keeps every operator and comparator in one node.
    fn parse_comparison(&mut self) -> Option<Expr> {
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.take_comparison_op() {
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }
        if ops.is_empty() {
            return Some(left);
        }
        let span = left.span.merge(self.previous_span());
        Some(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            span,
        ))
    }

    /// Consume a comparison operator, including the two-token `not in`
    /// and `is not`.
    fn take_comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek_kind() {
            TokenKind::EqEq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::NotEq,
            TokenKind::Less => CmpOp::Lt,
            TokenKind::LessEq => CmpOp::LtE,
            TokenKind::Greater => CmpOp::Gt,
            TokenKind::GreaterEq => CmpOp::GtE,
            TokenKind::In => CmpOp::In,
            TokenKind::Not if self.look_ahead(1) == &TokenKind::In => {
                self.advance();
                CmpOp::NotIn
            }
            TokenKind::Is if self.look_ahead(1) == &TokenKind::Not => {
                self.advance();
                CmpOp::IsNot
            }
            TokenKind::Is => CmpOp::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Binary Operators
    // ══════════════════════════════════════════════════════════════════════════

    /// Left-associative binary level: `operand (op operand)*`.
    fn parse_binary_level(
        &mut self,
        operand: fn(&mut Self) -> Option<Expr>,
        op_for: fn(&TokenKind) -> Option<BinOp>,
    ) -> Option<Expr> {
        let mut left = operand(self)?;
        while let Some(op) = op_for(self.peek_kind()) {
            self.advance();
            let right = operand(self)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Some(left)
    }

    pub(crate) fn parse_bitor(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_bitxor, |k| {
            matches!(k, TokenKind::Pipe).then_some(BinOp::BitOr)
        })
    }

    fn parse_bitxor(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_bitand, |k| {
            matches!(k, TokenKind::Caret).then_some(BinOp::BitXor)
        })
    }

    fn parse_bitand(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_shift, |k| {
            matches!(k, TokenKind::Amp).then_some(BinOp::BitAnd)
        })
    }

    fn parse_shift(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_arith, |k| match k {
            TokenKind::LShift => Some(BinOp::LShift),
            TokenKind::RShift => Some(BinOp::RShift),
            _ => None,
        })
    }

    fn parse_arith(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_term, |k| match k {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn parse_term(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_factor, |k| match k {
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::At => Some(BinOp::MatMul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::DoubleSlash => Some(BinOp::FloorDiv),
            TokenKind::Percent => Some(BinOp::Mod),
            _ => None,
        })
    }

    /// `('+' | '-' | '~') factor | power`
    fn parse_factor(&mut self) -> Option<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let start = self.advance().span;
        self.enter_expr()?;
        let operand = self.parse_factor();
        self.leave_expr();
        let operand = operand?;
        let span = start.merge(operand.span);
        Some(Expr::new(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `primary ['**' factor]`
    fn parse_power(&mut self) -> Option<Expr> {
        let base = self.parse_primary()?;
        if !self.eat(&TokenKind::DoubleStar) {
            return Some(base);
        }
        self.enter_expr()?;
        let exponent = self.parse_factor();
        self.leave_expr();
        let exponent = exponent?;
        let span = base.span.merge(exponent.span);
        Some(Expr::new(
            ExprKind::BinOp {
                left: Box::new(base),
                op: BinOp::Pow,
                right: Box::new(exponent),
            },
            span,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary & Trailers
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Option<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let open = self.advance().span;
                    let (args, keywords) = self.parse_arguments(open)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call(Box::new(Call {
                            func: expr,
                            args,
                            keywords,
                        })),
                        span,
                    );
                }
                TokenKind::LBracket => {
                    let open = self.advance().span;
                    let index = self.parse_subscript()?;
                    self.expect_closing(&TokenKind::RBracket, open)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.expect_identifier()?;
                    let span = expr.span.merge(attr.span);
                    expr = Expr::new(
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                        span,
                    );
                }
                _ => return Some(expr),
            }
        }
    }

    /// Call arguments after `(`, through the closing `)`.
    fn parse_arguments(&mut self, open: Span) -> Option<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();

        while !self.check_exact(&TokenKind::RParen) {
            let start = self.current_span();
            match self.peek_kind().clone() {
                TokenKind::DoubleStar => {
                    self.advance();
                    let value = self.parse_expression()?;
                    let span = start.merge(value.span);
                    keywords.push(Keyword {
                        arg: None,
                        value,
                        span,
                    });
                }
                TokenKind::Name(name) if self.look_ahead(1) == &TokenKind::Eq => {
                    let arg = Ident::new(name.clone(), self.advance().span);
                    self.advance();
                    let value = self.parse_expression()?;
                    if keywords
                        .iter()
                        .any(|k| k.arg.as_ref().is_some_and(|a| a.name == name))
                    {
                        let error = self
                            .make_error(
                                ErrorCode::REPEATED_KEYWORD,
                                format!("keyword argument repeated: {name}"),
                                arg.span,
                            )
                            .with_subject(name.as_str());
                        self.push_error(error);
                    }
                    let span = arg.span.merge(value.span);
                    keywords.push(Keyword {
                        arg: Some(arg),
                        value,
                        span,
                    });
                }
                _ => {
                    let value = self.parse_star_or_expression()?;
                    let is_starred = matches!(value.kind, ExprKind::Starred(_));
                    if !keywords.is_empty() && !is_starred {
                        let message = if keywords.iter().any(|k| k.arg.is_none()) {
                            "positional argument follows keyword argument unpacking"
                        } else {
                            "positional argument follows keyword argument"
                        };
                        self.error_at(ErrorCode::POSITIONAL_AFTER_KEYWORD, message, value.span);
                    }
                    args.push(value);
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_closing(&TokenKind::RParen, open)?;
        Some((args, keywords))
    }

    /// Inside `[...]`: an expression, a slice, or a tuple of them.
    fn parse_subscript(&mut self) -> Option<Expr> {
        let first = self.parse_slice_item()?;
        if !self.check_exact(&TokenKind::Comma) {
            return Some(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check_exact(&TokenKind::RBracket) {
                break;
            }
            elts.push(self.parse_slice_item()?);
        }
        let span = elts[0].span.merge(self.previous_span());
        Some(Expr::new(ExprKind::Tuple(elts), span))
    }

    fn parse_slice_item(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let lower = if self.check_exact(&TokenKind::Colon) {
            None
        } else {
            let expr = self.parse_expression()?;
            if !self.check_exact(&TokenKind::Colon) {
                return Some(expr);
            }
            Some(Box::new(expr))
        };
        self.expect(&TokenKind::Colon)?;
        let upper = self.parse_optional_slice_bound()?;
        let step = if self.eat(&TokenKind::Colon) {
            self.parse_optional_slice_bound()?
        } else {
            None
        };
        Some(Expr::new(
            ExprKind::Slice { lower, upper, step },
            start.merge(self.previous_span()),
        ))
    }

    fn parse_optional_slice_bound(&mut self) -> Option<Option<Box<Expr>>> {
        if matches!(
            self.peek_kind(),
            TokenKind::Colon | TokenKind::Comma | TokenKind::RBracket
        ) {
            return Some(None);
        }
        Some(Some(Box::new(self.parse_expression()?)))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Atoms
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_atom(&mut self) -> Option<Expr> {
        let token = self.peek().clone();
        let span = token.span;
        let kind = match token.kind {
            TokenKind::Int(v) => ExprKind::Int(v),
            TokenKind::Float(v) => ExprKind::Float(v),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::None => ExprKind::NoneLit,
            TokenKind::Name(name) => ExprKind::Name(name),
            TokenKind::Str(_) => return Some(self.parse_strings()),
            TokenKind::LParen => return self.parse_paren(),
            TokenKind::LBracket => return self.parse_list_display(),
            TokenKind::LBrace => return self.parse_brace_display(),
            TokenKind::ReservedWord(word) => {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_SYNTAX,
                    format!("'{word}' is not supported"),
                );
                return None;
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("invalid syntax: unexpected '{other}'"),
                );
                return None;
            }
        };
        self.advance();
        Some(Expr::new(kind, span))
    }

    /// Adjacent string literals concatenate: `"a" "b"`.
    fn parse_strings(&mut self) -> Expr {
        let start = self.current_span();
        let mut text = String::new();
        while let TokenKind::Str(part) = self.peek_kind().clone() {
            self.advance();
            text.push_str(&part);
        }
        Expr::new(ExprKind::Str(text), start.merge(self.previous_span()))
    }

    /// `()`, `(expr)`, `(a, b)`
    fn parse_paren(&mut self) -> Option<Expr> {
        let open = self.advance().span;
        if self.check_exact(&TokenKind::RParen) {
            let close = self.advance().span;
            return Some(Expr::new(ExprKind::Tuple(Vec::new()), open.merge(close)));
        }
        let first = self.parse_star_or_expression()?;
        self.reject_comprehension()?;
        if self.check_exact(&TokenKind::RParen) {
            self.advance();
            return Some(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check_exact(&TokenKind::RParen) {
                break;
            }
            elts.push(self.parse_star_or_expression()?);
        }
        let close = self.expect_closing(&TokenKind::RParen, open)?.span;
        Some(Expr::new(ExprKind::Tuple(elts), open.merge(close)))
    }

    fn parse_list_display(&mut self) -> Option<Expr> {
        let open = self.advance().span;
        let mut elts = Vec::new();
        while !self.check_exact(&TokenKind::RBracket) {
            elts.push(self.parse_star_or_expression()?);
            self.reject_comprehension()?;
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect_closing(&TokenKind::RBracket, open)?.span;
        Some(Expr::new(ExprKind::List(elts), open.merge(close)))
    }

    /// `{}` is an empty dict; `{a, b}` a set; `{k: v}` a dict.
    fn parse_brace_display(&mut self) -> Option<Expr> {
        let open = self.advance().span;
        if self.check_exact(&TokenKind::RBrace) {
            let close = self.advance().span;
            return Some(Expr::new(
                ExprKind::Dict {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
                open.merge(close),
            ));
        }

        let first = self.parse_star_or_expression()?;
        self.reject_comprehension()?;
        if !self.eat(&TokenKind::Colon) {
            let mut elts = vec![first];
            while self.eat(&TokenKind::Comma) {
                if self.check_exact(&TokenKind::RBrace) {
                    break;
                }
                elts.push(self.parse_star_or_expression()?);
            }
            let close = self.expect_closing(&TokenKind::RBrace, open)?.span;
            return Some(Expr::new(ExprKind::Set(elts), open.merge(close)));
        }

        let mut keys = vec![first];
        let mut values = vec![self.parse_expression()?];
        self.reject_comprehension()?;
        while self.eat(&TokenKind::Comma) {
            if self.check_exact(&TokenKind::RBrace) {
                break;
            }
            keys.push(self.parse_expression()?);
            self.expect(&TokenKind::Colon)?;
            values.push(self.parse_expression()?);
        }
        let close = self.expect_closing(&TokenKind::RBrace, open)?.span;
        Some(Expr::new(ExprKind::Dict { keys, values }, open.merge(close)))
    }

    fn reject_comprehension(&mut self) -> Option<()> {
        if self.check_exact(&TokenKind::For) {
            self.error_at_current(
                ErrorCode::UNSUPPORTED_SYNTAX,
                "comprehensions and generator expressions are not supported",
            );
            return None;
        }
        Some(())
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Parameters
    // ══════════════════════════════════════════════════════════════════════════

    /// Parameter list up to (not including) `closing`. Annotations are
    /// accepted and discarded when `annotations` is set.
    pub(crate) fn parse_params(
        &mut self,
        closing: &TokenKind,
        annotations: bool,
    ) -> Option<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        let mut keyword_only = false;
        let mut seen_slash = false;
        let mut seen_default = false;

        while !self.check_exact(closing) {
            let start = self.current_span();
            match self.peek_kind() {
                TokenKind::Slash => {
                    self.advance();
                    if seen_slash || keyword_only || params.is_empty() {
                        self.error_at(ErrorCode::INVALID_PARAMETERS, "invalid '/' in parameters", start);
                        return None;
                    }
                    seen_slash = true;
                    for p in &mut params {
                        p.kind = ParamKind::PositionalOnly;
                    }
                }
                TokenKind::DoubleStar => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    self.skip_annotation(annotations)?;
                    let span = start.merge(name.span);
                    params.push(Param {
                        name,
                        kind: ParamKind::VarKeyword,
                        default: None,
                        span,
                    });
                    self.eat(&TokenKind::Comma);
                    if !self.check_exact(closing) {
                        self.error_at_current(
                            ErrorCode::INVALID_PARAMETERS,
                            "arguments cannot follow var-keyword argument",
                        );
                        return None;
                    }
                    break;
                }
                TokenKind::Star => {
                    self.advance();
                    if keyword_only {
                        self.error_at(ErrorCode::INVALID_PARAMETERS, "* argument may appear only once", start);
                        return None;
                    }
                    keyword_only = true;
                    if matches!(self.peek_kind(), TokenKind::Name(_)) {
                        let name = self.expect_identifier()?;
                        self.skip_annotation(annotations)?;
                        let span = start.merge(name.span);
                        params.push(Param {
                            name,
                            kind: ParamKind::VarPositional,
                            default: None,
                            span,
                        });
                    } else if self.check_exact(closing) || self.check_exact(&TokenKind::DoubleStar) {
                        self.error_at(
                            ErrorCode::INVALID_PARAMETERS,
                            "named arguments must follow bare *",
                            start,
                        );
                        return None;
                    }
                }
                _ => {
                    let name = self.expect_identifier()?;
                    self.skip_annotation(annotations)?;
                    let default = if self.eat(&TokenKind::Eq) {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    if !keyword_only {
                        if default.is_some() {
                            seen_default = true;
                        } else if seen_default {
                            self.error_at(
                                ErrorCode::INVALID_PARAMETERS,
                                "non-default argument follows default argument",
                                name.span,
                            );
                            return None;
                        }
                    }
                    let span = match &default {
                        Some(d) => name.span.merge(d.span),
                        None => name.span,
                    };
                    let kind = if keyword_only {
                        ParamKind::KeywordOnly
                    } else {
                        ParamKind::PositionalOrKeyword
                    };
                    params.push(Param {
                        name,
                        kind,
                        default,
                        span,
                    });
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        for (i, p) in params.iter().enumerate() {
            if params[..i].iter().any(|q| q.name.name == p.name.name) {
                self.error_at(
                    ErrorCode::INVALID_PARAMETERS,
                    format!(
                        "duplicate argument '{}' in function definition",
                        p.name.name
                    ),
                    p.span,
                );
                return None;
            }
        }
        Some(params)
    }

    fn skip_annotation(&mut self, annotations: bool) -> Option<()> {
        if annotations && self.eat(&TokenKind::Colon) {
            self.parse_expression()?;
        }
        Some(())
    }
}
