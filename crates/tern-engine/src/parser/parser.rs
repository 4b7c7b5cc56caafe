//! The main parser implementation.

use crate::ast::{Literal, Node, NodeKind, Operator, Program};
use crate::error::SyntaxError;
use crate::lexer::{Position, Scanner, Span, Token, TokenKind};

type ParseResult<T> = Result<T, SyntaxError>;

/// A recursive descent parser for tern source code.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0), Position::default()),
        }
    }

    /// Parses the source code into a [`Program`].
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program::new(body))
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> ParseResult<Node> {
        match &self.current.kind {
            TokenKind::Var => {
                let decl = self.parse_var_declaration()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(decl)
            }
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::LeftBrace => self.parse_block(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(expr)
            }
        }
    }

    /// Parses `var a = 1, b` without the trailing semicolon.
    fn parse_var_declaration(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.advance(); // consume 'var'

        let mut declarators = Vec::new();
        loop {
            let ident = self.expect_identifier()?;
            let init = if self.check(&TokenKind::Equal) {
                self.advance();
                Some(Box::new(self.parse_expression()?))
            } else {
                None
            };

            declarators.push(Node::new(
                ident.pos,
                NodeKind::Declarator {
                    ident: Box::new(ident),
                    init,
                },
            ));

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(Node::new(pos, NodeKind::VarDeclaration(declarators)))
    }

    fn parse_function_declaration(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.advance(); // consume 'function'

        let ident = self.expect_identifier()?;

        let params_pos = self.current.pos;
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let params = if params.is_empty() {
            None
        } else {
            Some(Box::new(Node::new(params_pos, NodeKind::Args(params))))
        };

        if !self.check(&TokenKind::LeftBrace) {
            return Err(self.unexpected("'{' before function body"));
        }
        let block = self.parse_block()?;

        Ok(Node::new(
            pos,
            NodeKind::FuncDeclaration {
                ident: Box::new(ident),
                params,
                block: Box::new(block),
            },
        ))
    }

    fn parse_if_statement(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.advance(); // consume 'if'

        let test = self.parse_condition()?;
        let consequent = self.parse_body()?;
        let alternate = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_body()?))
        } else {
            None
        };

        Ok(Node::new(
            pos,
            NodeKind::If {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate,
            },
        ))
    }

    fn parse_while_statement(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.advance(); // consume 'while'

        let test = self.parse_condition()?;
        let block = self.parse_body()?;

        Ok(Node::new(
            pos,
            NodeKind::While {
                test: Box::new(test),
                block: Box::new(block),
            },
        ))
    }

    fn parse_do_while_statement(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.advance(); // consume 'do'

        let block = self.parse_body()?;
        self.expect(&TokenKind::While)?;
        let test = self.parse_condition()?;

        // The trailing semicolon is optional
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }

        Ok(Node::new(
            pos,
            NodeKind::DoWhile {
                block: Box::new(block),
                test: Box::new(test),
            },
        ))
    }

    fn parse_for_statement(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.advance(); // consume 'for'
        self.expect(&TokenKind::LeftParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Var) {
            Some(Box::new(self.parse_var_declaration()?))
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::RightParen)?;

        let block = self.parse_body()?;

        Ok(Node::new(
            pos,
            NodeKind::For {
                init,
                test,
                update,
                block: Box::new(block),
            },
        ))
    }

    fn parse_return_statement(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.advance(); // consume 'return'

        let argument = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::Semicolon)?;

        Ok(Node::new(pos, NodeKind::Return(argument)))
    }

    fn parse_block(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;
        self.expect(&TokenKind::LeftBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Node::new(pos, NodeKind::Block(body)))
    }

    /// Parses the body of an `if` or a loop, wrapping a lone statement in a
    /// block so every body opens its own scope.
    fn parse_body(&mut self) -> ParseResult<Node> {
        let statement = self.parse_statement()?;
        if matches!(statement.kind, NodeKind::Block(_)) {
            return Ok(statement);
        }
        Ok(Node::new(statement.pos, NodeKind::Block(vec![statement])))
    }

    /// Parses a parenthesized condition: `( expr )`
    fn parse_condition(&mut self) -> ParseResult<Node> {
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(test)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Parses an expression.
    pub fn parse_expression(&mut self) -> ParseResult<Node> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Node> {
        let target = self.parse_logical_or()?;

        if self.check(&TokenKind::Equal) {
            let pos = self.current.pos;
            if target.ident_name().is_none() {
                return Err(SyntaxError::new("invalid assignment target", target.pos));
            }
            self.advance();
            let value = self.parse_assignment()?;
            return Ok(binary(pos, Operator::Assign, target, value));
        }

        Ok(target)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_logical_and()?;

        while self.check(&TokenKind::PipePipe) {
            let pos = self.current.pos;
            self.advance();
            let right = self.parse_logical_and()?;
            left = binary(pos, Operator::Or, left, right);
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AmpersandAmpersand) {
            let pos = self.current.pos;
            self.advance();
            let right = self.parse_equality()?;
            left = binary(pos, Operator::And, left, right);
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_comparison()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::EqualEqual => Operator::Eq,
                TokenKind::NotEqual => Operator::Neq,
                _ => break,
            };
            let pos = self.current.pos;
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(pos, op, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::LessThan => Operator::Lt,
                TokenKind::LessThanEqual => Operator::Le,
                TokenKind::GreaterThan => Operator::Gt,
                TokenKind::GreaterThanEqual => Operator::Ge,
                _ => break,
            };
            let pos = self.current.pos;
            self.advance();
            let right = self.parse_additive()?;
            left = binary(pos, op, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::Plus => Operator::Add,
                TokenKind::Minus => Operator::Sub,
                _ => break,
            };
            let pos = self.current.pos;
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(pos, op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match &self.current.kind {
                TokenKind::Star => Operator::Mul,
                TokenKind::Slash => Operator::Div,
                TokenKind::Percent => Operator::Mod,
                _ => break,
            };
            let pos = self.current.pos;
            self.advance();
            let right = self.parse_exponent()?;
            left = binary(pos, op, left, right);
        }

        Ok(left)
    }

    /// `**` binds tighter than `*` and groups to the right.
    fn parse_exponent(&mut self) -> ParseResult<Node> {
        let base = self.parse_unary()?;

        if self.check(&TokenKind::StarStar) {
            let pos = self.current.pos;
            self.advance();
            let exponent = self.parse_exponent()?;
            return Ok(binary(pos, Operator::Exp, base, exponent));
        }

        Ok(base)
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        let op = match &self.current.kind {
            TokenKind::Minus => Operator::Sub,
            TokenKind::Bang => Operator::Not,
            TokenKind::PlusPlus => Operator::Incr,
            TokenKind::MinusMinus => Operator::Decr,
            _ => return self.parse_postfix(),
        };
        let pos = self.current.pos;
        self.advance();

        let operand = self.parse_unary()?;
        if op.is_update() && operand.ident_name().is_none() {
            return Err(SyntaxError::new(
                format!("invalid operand for prefix '{}'", op),
                operand.pos,
            ));
        }

        Ok(Node::new(
            pos,
            NodeKind::UnaryExpr {
                op,
                prefix: true,
                operand: Some(Box::new(operand)),
            },
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Node> {
        let operand = self.parse_primary()?;

        let op = match &self.current.kind {
            TokenKind::PlusPlus => Operator::Incr,
            TokenKind::MinusMinus => Operator::Decr,
            _ => return Ok(operand),
        };
        if operand.ident_name().is_none() {
            return Err(SyntaxError::new(
                format!("invalid operand for postfix '{}'", op),
                operand.pos,
            ));
        }
        self.advance();

        Ok(Node::new(
            operand.pos,
            NodeKind::UnaryExpr {
                op,
                prefix: false,
                operand: Some(Box::new(operand)),
            },
        ))
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let pos = self.current.pos;

        let kind = match &self.current.kind {
            TokenKind::Number(n) => NodeKind::Literal(Literal::Number(*n)),
            TokenKind::String(s) => NodeKind::Literal(Literal::String(s.clone())),
            TokenKind::True => NodeKind::Literal(Literal::Boolean(true)),
            TokenKind::False => NodeKind::Literal(Literal::Boolean(false)),
            TokenKind::Identifier(name) => {
                let callee = Node::new(pos, NodeKind::Ident(name.clone()));
                self.advance();
                if self.check(&TokenKind::LeftParen) {
                    return self.parse_call(callee);
                }
                return Ok(callee);
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(expr);
            }
            _ => return Err(self.unexpected("an expression")),
        };

        self.advance();
        Ok(Node::new(pos, kind))
    }

    fn parse_call(&mut self, callee: Node) -> ParseResult<Node> {
        self.expect(&TokenKind::LeftParen)?;

        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(&TokenKind::RightParen)?;

        Ok(Node::new(
            callee.pos,
            NodeKind::Call {
                callee: Box::new(callee),
                args,
            },
        ))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.scanner.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<Node> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let ident = Node::new(self.current.pos, NodeKind::Ident(name.clone()));
            self.advance();
            Ok(ident)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let message = match &self.current.kind {
            TokenKind::Invalid(_) | TokenKind::UnterminatedString => self.current.kind.to_string(),
            found => format!("expected {}, found {}", expected, found),
        };
        SyntaxError::new(message, self.current.pos)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }
}

fn binary(pos: Position, op: Operator, left: Node, right: Node) -> Node {
    Node::new(
        pos,
        NodeKind::BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap()
    }

    fn parse_err(src: &str) -> SyntaxError {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap_err()
    }

    fn parse_stmt(src: &str) -> Node {
        parse_ok(src).body.into_iter().next().unwrap()
    }

    fn tree(src: &str) -> Vec<String> {
        parse_stmt(src).tree()
    }

    #[test]
    fn test_parse_var_declaration() {
        assert_eq!(
            tree("var a = 1, b;"),
            vec!["var", "├ a", "│ └ 1", "└ b"]
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            tree("1 + 2 * 3;"),
            vec!["+", "├ 1", "└ *", "  ├ 2", "  └ 3"]
        );
        assert_eq!(
            tree("a || b && c;"),
            vec!["||", "├ a", "└ &&", "  ├ b", "  └ c"]
        );
    }

    #[test]
    fn test_exponent_is_right_associative() {
        assert_eq!(
            tree("2 ** 3 ** 2;"),
            vec!["**", "├ 2", "└ **", "  ├ 3", "  └ 2"]
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(
            tree("a = b = 1;"),
            vec!["=", "├ a", "└ =", "  ├ b", "  └ 1"]
        );
    }

    #[test]
    fn test_prefix_and_postfix_updates() {
        match parse_stmt("i++;").kind {
            NodeKind::UnaryExpr { op, prefix, .. } => {
                assert_eq!(op, Operator::Incr);
                assert!(!prefix);
            }
            other => panic!("expected unary, got {:?}", other),
        }
        match parse_stmt("--i;").kind {
            NodeKind::UnaryExpr { op, prefix, .. } => {
                assert_eq!(op, Operator::Decr);
                assert!(prefix);
            }
            other => panic!("expected unary, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_and_call() {
        let program = parse_ok(
            "function add(a, b) { return a + b; }
             logprint(add(1, 2));",
        );
        assert_eq!(program.body.len(), 2);
        assert_eq!(
            program.body[0].tree(),
            vec![
                "function add",
                "├ args: a, b",
                "└ block",
                "  └ return",
                "    └ +",
                "      ├ a",
                "      └ b",
            ]
        );
        assert_eq!(
            program.body[1].tree(),
            vec!["call", "├ logprint", "└ call", "  ├ add", "  ├ 1", "  └ 2"]
        );
    }

    #[test]
    fn test_function_without_params() {
        match parse_stmt("function f() {}").kind {
            NodeKind::FuncDeclaration { params, .. } => assert!(params.is_none()),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_bodies_are_wrapped_in_blocks() {
        assert_eq!(
            tree("while (x) x = x - 1;"),
            vec!["while", "├ x", "└ block", "  └ =", "    ├ x", "    └ -", "      ├ x", "      └ 1"]
        );
        assert_eq!(
            tree("if (a) b; else c;"),
            vec!["if", "├ a", "├ block", "│ └ b", "└ block", "  └ c"]
        );
    }

    #[test]
    fn test_do_while_semicolon_is_optional() {
        assert_eq!(parse_ok("do { x; } while (x)").body.len(), 1);
        assert_eq!(parse_ok("do { x; } while (x); y;").body.len(), 2);
    }

    #[test]
    fn test_for_clauses() {
        match parse_stmt("for (var i = 0; i < 3; i++) {}").kind {
            NodeKind::For {
                init, test, update, ..
            } => {
                assert!(matches!(init.unwrap().kind, NodeKind::VarDeclaration(_)));
                assert!(test.is_some());
                assert!(update.is_some());
            }
            other => panic!("expected for, got {:?}", other),
        }
        match parse_stmt("for (;;) {}").kind {
            NodeKind::For {
                init, test, update, ..
            } => {
                assert!(init.is_none() && test.is_none() && update.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_node_positions() {
        let program = parse_ok("var x = 1;\nlogprint(x / 0);");
        assert_eq!(program.body[1].pos, Position::new(2, 1));
        match &program.body[1].kind {
            NodeKind::Call { args, .. } => assert_eq!(args[0].pos, Position::new(2, 12)),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_err("var x = 1");
        assert_eq!(err.message, "expected ';', found end of input");
        assert_eq!(err.pos, Position::new(1, 10));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_err("1 = 2;");
        assert_eq!(err.message, "invalid assignment target");
    }

    #[test]
    fn test_invalid_update_operand() {
        assert!(parse_err("(a + b)++;").message.contains("postfix '++'"));
        assert!(parse_err("++1;").message.contains("prefix '++'"));
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse_err("function f() { return 1;");
        assert_eq!(err.message, "expected '}', found end of input");
    }

    #[test]
    fn test_invalid_character_reported() {
        let err = parse_err("var x = 1 # 2;");
        assert_eq!(err.message, "unexpected character '#'");
        assert_eq!(err.pos, Position::new(1, 11));
    }
}
