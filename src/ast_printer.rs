use crate::{
    expr::Expr,
    object::{self, Literal, Object},
};

/// Renders the parenthesized form the `parse` subcommand prints. Number
/// literals always show at least one decimal, unlike runtime output.
pub struct AstPrinter {}

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary(e) => self.parenthesize(&e.operator.lexeme, &[&*e.left, &*e.right]),
            Expr::Logical(e) => self.parenthesize(&e.operator.lexeme, &[&*e.left, &*e.right]),
            Expr::Grouping(e) => self.parenthesize("group", &[&*e.expression]),
            Expr::Literal(e) => match &e.value {
                Object::Literal(Literal::Number(n)) => object::decimal(n.into_inner()),
                other => other.to_string(),
            },
            Expr::Unary(e) => self.parenthesize(&e.operator.lexeme, &[&*e.right]),
            Expr::Variable(e) => e.name.lexeme.clone(),
            Expr::Assign(e) => format!("(= {} {})", e.name.lexeme, self.print(&e.value)),
            Expr::Call(e) => {
                let mut parts = vec![self.print(&e.callee)];
                parts.extend(e.arguments.iter().map(|arg| self.print(arg)));
                format!("(call {})", parts.join(" "))
            }
            Expr::Get(e) => format!("(. {} {})", self.print(&e.object), e.name.lexeme),
            Expr::Set(e) => format!("(.= {} {} {})", self.print(&e.object), e.name.lexeme, self.print(&e.value)),
            Expr::This(_) => "this".to_string(),
            Expr::Super(e) => format!("(super {})", e.method.lexeme),
        }
    }

    fn parenthesize(&self, name: &str, exprs: &[&Expr]) -> String {
        let parts: Vec<_> = exprs.iter().map(|expr| self.print(expr)).collect();
        format!("({} {})", name, parts.join(" "))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        expr::{Binary, Grouping, Literal, Unary},
        token::Token,
        token_type::TokenType,
    };

    #[test]
    fn does_the_thing() {
        let expr = Binary::expr(
            Unary::expr(
                Token::new(TokenType::Minus, "-", ().into(), 1),
                Literal::expr(123_f64.into()),
            ),
            Token::new(TokenType::Star, "*", ().into(), 1),
            Grouping::expr(Literal::expr(45.67.into())),
        );
        let printer = AstPrinter {};
        assert_eq!(printer.print(&expr), "(* (- 123.0) (group 45.67))".to_string());
    }

    #[test]
    fn literals_use_canonical_spellings() {
        let printer = AstPrinter {};
        assert_eq!(printer.print(&Literal::expr(true.into())), "true");
        assert_eq!(printer.print(&Literal::expr(().into())), "nil");
        assert_eq!(printer.print(&Literal::expr("str".to_string().into())), "str");
    }
}
