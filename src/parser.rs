use crate::{
    LoxError, Result,
    expr::{Assign, Binary, Call, Expr, Get, Grouping, Literal, Logical, Set, Super, This, Unary, Variable},
    stmt::{self, Block, Expression, If, Print, Stmt, Var, While},
    token::Token,
    token_type::TokenType,
};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: usize,
    errored: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            next_id: 0,
            errored: false,
        }
    }

    /// Parses a statement list. The first syntax error aborts the parse;
    /// non-fatal reports (invalid assignment targets, arity overflows) let
    /// parsing continue but still fail the program before execution.
    pub fn parse(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        if self.errored {
            return Err(LoxError::Fatal);
        }
        Ok(statements)
    }

    /// Legacy single-expression mode for the `parse` and `evaluate`
    /// subcommands.
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let expr = self.expression()?;
        if self.errored {
            return Err(LoxError::Fatal);
        }
        Ok(expr)
    }
}

// Declarations
impl Parser {
    fn declaration(&mut self) -> Result<Stmt> {
        if self.match_advance(&[TokenType::Class]) {
            self.class_declaration()
        } else if self.match_advance(&[TokenType::Fun]) {
            Ok(Stmt::Function(self.function("function")?))
        } else if self.match_advance(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let superclass = if self.match_advance(&[TokenType::Less]) {
            let parent = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Variable::new(parent, self.node_id()))
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(stmt::Class::stmt(name, superclass, methods))
    }

    fn function(&mut self, kind: &str) -> Result<stmt::Function> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;

        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.report(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.match_advance(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;

        Ok(stmt::Function::new(name, params, body))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_advance(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;

        Ok(Var::stmt(name, initializer))
    }
}

// Statements
impl Parser {
    fn statement(&mut self) -> Result<Stmt> {
        if self.match_advance(&[TokenType::Print]) {
            return self.print_statement();
        }
        if self.match_advance(&[TokenType::Return]) {
            return self.return_statement();
        }
        if self.match_advance(&[TokenType::While]) {
            return self.while_statement();
        }
        if self.match_advance(&[TokenType::LeftBrace]) {
            return Ok(Block::stmt(self.block()?));
        }
        if self.match_advance(&[TokenType::If]) {
            return self.if_statement();
        }
        if self.match_advance(&[TokenType::For]) {
            return self.for_statement();
        }
        self.expression_statement()
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Print::stmt(value))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        let value = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;

        Ok(stmt::Return::stmt(keyword, value))
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Ok(While::stmt(condition, body))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let else_branch = if self.match_advance(&[TokenType::Else]) {
            Some(self.statement()?)
        } else {
            None
        };

        Ok(If::stmt(condition, then_branch, else_branch))
    }

    /// De-sugar a for statement into a while statement
    fn for_statement(&mut self) -> Result<Stmt> {
        /* for (var i = 0; i < 10; i = i + 1) {
         *    print i;
         *  }
         */
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        // `var i = 0;`, could also be empty, or just an expression which
        // we'd treat as a statement to keep things tidy
        let initializer = match self.peek().typ {
            TokenType::Semicolon => {
                self.advance();
                None
            }
            TokenType::Var => {
                self.advance();
                Some(self.var_declaration()?)
            }
            _ => Some(self.expression_statement()?),
        };

        // `i < 10;`, if not present use `true` instead
        let condition = match self.check(&TokenType::Semicolon) {
            true => Literal::expr(true.into()),
            false => self.expression()?,
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        // `i = i + 1;`, could also be empty
        let increment = match self.check(&TokenType::RightParen) {
            true => None,
            false => Some(self.expression()?),
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        // `{ print i; }`
        let mut body = self.statement()?;

        // Now, build out the while statement, working backwards
        if let Some(incr) = increment {
            /* {
             *   { print i; }
             *   i = i + 1;
             * }
             */
            body = Block::stmt(vec![body, Expression::stmt(incr)]);
        }
        /* while (i < 10) {
         *   { print i; }
         *   i = i + 1;
         * }
         */
        body = While::stmt(condition, body);

        /* {
         *   // scope `var` to just this block
         *   var i = 0;
         *   while (i < 10) {
         *     { print i; }
         *     i = i + 1;
         *   }
         * }
         */
        if let Some(init) = initializer {
            body = Block::stmt(vec![init, body]);
        }

        // boom!
        Ok(body)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Expression::stmt(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;

        Ok(statements)
    }
}

// Expressions
impl Parser {
    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if self.match_advance(&[TokenType::Equal]) {
            let equals = self.previous();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable(var) => Ok(Assign::expr(var.name, value, self.node_id())),
                Expr::Get(get) => Ok(Set::expr(*get.object, get.name, value)),
                other => {
                    // Reported, but the surrounding parse carries on
                    self.report(&equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while self.match_advance(&[TokenType::Or]) {
            let operator = self.previous();
            let right = self.and()?;
            expr = Logical::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_advance(&[TokenType::And]) {
            let operator = self.previous();
            let right = self.equality()?;
            expr = Logical::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_advance(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous();
            let right = self.comparison()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;
        while self.match_advance(&[TokenType::Greater, TokenType::GreaterEqual, TokenType::Less, TokenType::LessEqual]) {
            let operator = self.previous();
            let right = self.term()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;
        while self.match_advance(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous();
            let right = self.factor()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;
        while self.match_advance(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous();
            let right = self.unary()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_advance(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous();
            let right = self.unary()?;
            return Ok(Unary::expr(operator, right));
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_advance(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_advance(&[TokenType::Dot]) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Get::expr(expr, name);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    let token = self.peek().clone();
                    self.report(&token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.match_advance(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(Call::expr(callee, paren, arguments))
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance().typ {
            TokenType::False => Ok(Literal::expr(false.into())),
            TokenType::True => Ok(Literal::expr(true.into())),
            TokenType::Nil => Ok(Literal::expr(().into())),
            TokenType::Number | TokenType::String => Ok(Literal::expr(self.previous().literal.into())),
            TokenType::Identifier => {
                let id = self.node_id();
                Ok(Variable::expr(self.previous(), id))
            }
            TokenType::This => {
                let id = self.node_id();
                Ok(This::expr(self.previous(), id))
            }
            TokenType::Super => {
                let keyword = self.previous();
                self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
                let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
                Ok(Super::expr(keyword, method, self.node_id()))
            }
            TokenType::LeftParen => {
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Grouping::expr(expr))
            }
            _ => Err(LoxError::at(&self.previous(), "Expect expression.")),
        }
    }
}

// Helpers
impl Parser {
    fn previous(&self) -> Token {
        self.tokens[self.current - 1].clone()
    }

    fn consume(&mut self, typ: TokenType, msg: &str) -> Result<Token> {
        if self.check(&typ) {
            return Ok(self.advance());
        }

        Err(LoxError::at(self.peek(), msg))
    }

    /// If any of the token types are the next token, advance and return true
    /// Otherwise, return false and do not advance
    fn match_advance(&mut self, typs: &[TokenType]) -> bool {
        if typs.iter().any(|t| self.check(t)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, typ: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().typ == typ
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Returns the next token and advances over it (if not at the end)
    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().typ == TokenType::Eof
    }

    /// Hands out the stable identity carried by variable-use sites; the
    /// resolver keys its distance table on it.
    fn node_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn report(&mut self, token: &Token, message: &str) {
        eprintln!("{}", LoxError::at(token, message));
        self.errored = true;
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ast_printer::AstPrinter, scanner::Scanner};

    fn parse_source(source: &str) -> Result<Vec<Stmt>> {
        let (tokens, had_error) = Scanner::new(source.to_string()).scan_tokens();
        assert!(!had_error);
        Parser::new(tokens).parse()
    }

    fn printed_expression(source: &str) -> String {
        let (tokens, _) = Scanner::new(source.to_string()).scan_tokens();
        let expr = Parser::new(tokens).parse_expression().expect("should parse");
        AstPrinter {}.print(&expr)
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(printed_expression("1 + 2 * 3"), "(+ 1.0 (* 2.0 3.0))");
    }

    #[test]
    fn comparison_is_left_associative() {
        assert_eq!(printed_expression("1 < 2 == true"), "(== (< 1.0 2.0) true)");
    }

    #[test]
    fn unary_chains_bind_right() {
        assert_eq!(printed_expression("!!false"), "(! (! false))");
        assert_eq!(printed_expression("-(-1)"), "(- (group (- 1.0)))");
    }

    #[test]
    fn for_desugars_to_block_and_while() {
        let stmts = parse_source("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();
        assert_eq!(stmts.len(), 1);
        let Stmt::Block(outer) = &stmts[0] else {
            panic!("expected initializer block");
        };
        assert!(matches!(outer.statements[0], Stmt::Var(_)));
        let Stmt::While(while_stmt) = &outer.statements[1] else {
            panic!("expected while loop");
        };
        let Stmt::Block(body) = while_stmt.body.as_ref() else {
            panic!("expected body block with increment");
        };
        assert!(matches!(body.statements[0], Stmt::Print(_)));
        assert!(matches!(body.statements[1], Stmt::Expression(_)));
    }

    #[test]
    fn for_without_condition_loops_on_true() {
        let stmts = parse_source("for (;;) print 1;").unwrap();
        let Stmt::While(while_stmt) = &stmts[0] else {
            panic!("expected bare while");
        };
        assert!(matches!(while_stmt.condition, Expr::Literal(_)));
    }

    #[test]
    fn class_declaration_with_superclass_and_methods() {
        let stmts = parse_source("class B < A { one() {} two(x) { return x; } }").unwrap();
        let Stmt::Class(class) = &stmts[0] else {
            panic!("expected class statement");
        };
        assert_eq!(class.name.lexeme, "B");
        assert_eq!(class.superclass.as_ref().unwrap().name.lexeme, "A");
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.methods[1].params.len(), 1);
    }

    #[test]
    fn property_access_chains_left() {
        assert_eq!(printed_expression("a.b.c"), "(. (. a b) c)");
    }

    #[test]
    fn assignment_to_property_parses_as_set() {
        let stmts = parse_source("a.b = 1;").unwrap();
        let Stmt::Expression(stmt) = &stmts[0] else {
            panic!("expected expression statement");
        };
        assert!(matches!(stmt.expression, Expr::Set(_)));
    }

    #[test]
    fn invalid_assignment_target_fails_the_parse() {
        let err = parse_source("1 = 2;").unwrap_err();
        assert!(matches!(err, LoxError::Fatal));
    }

    #[test]
    fn missing_semicolon_is_a_syntax_error() {
        assert!(parse_source("print 1").is_err());
    }

    #[test]
    fn variable_use_sites_get_distinct_ids() {
        let stmts = parse_source("a; a;").unwrap();
        let ids: Vec<usize> = stmts
            .iter()
            .map(|s| {
                let Stmt::Expression(stmt) = s else { panic!() };
                let Expr::Variable(var) = &stmt.expression else { panic!() };
                var.id
            })
            .collect();
        assert_ne!(ids[0], ids[1]);
    }
}
