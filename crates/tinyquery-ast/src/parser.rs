use crate::ast::*;
use crate::error::ParseError;
use crate::token::{Span, Token, TokenKind};

pub fn parse(tokens: &[Token]) -> Result<Select, ParseError> {
    let mut p = Parser { tokens, pos: 0 };
    let select = p.parse_select()?;
    p.expect_eof()?;
    Ok(select)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos.min(self.tokens.len() - 1)].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("expected {kind:?}, found {:?}", self.peek()),
                self.span(),
            ))
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("unexpected trailing input: {:?}", self.peek()),
                self.span(),
            ))
        }
    }

    fn expect_id(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::Id(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::new(
                format!("expected identifier, found {other:?}"),
                self.span(),
            )),
        }
    }

    // SELECT fields [FROM table_expr [WHERE expr] [GROUP [EACH] BY cols]
    //   [HAVING expr] [ORDER BY orderings] [LIMIT int]]
    fn parse_select(&mut self) -> Result<Select, ParseError> {
        self.expect(&TokenKind::Select)?;
        let select_fields = self.parse_select_field_list()?;

        let table_expr = if self.eat(&TokenKind::From) {
            Some(Box::new(self.parse_table_expr()?))
        } else {
            None
        };

        let where_expr = if self.eat(&TokenKind::Where) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        let groups = if self.eat(&TokenKind::Group) {
            self.eat(&TokenKind::Each);
            self.expect(&TokenKind::By)?;
            Some(self.parse_trailing_comma_list(|p| p.expect_id())?)
        } else {
            None
        };

        let having_expr = if self.eat(&TokenKind::Having) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        let orderings = if self.eat(&TokenKind::Order) {
            self.expect(&TokenKind::By)?;
            Some(self.parse_trailing_comma_list(|p| p.parse_ordering())?)
        } else {
            None
        };

        let limit = if self.eat(&TokenKind::Limit) {
            Some(self.parse_int_literal()?)
        } else {
            None
        };

        Ok(Select {
            select_fields,
            table_expr,
            where_expr,
            groups,
            having_expr,
            orderings,
            limit,
            alias: None,
        })
    }

    fn parse_int_literal(&mut self) -> Result<i64, ParseError> {
        match self.peek().clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(n)
            }
            other => Err(ParseError::new(
                format!("expected integer literal, found {other:?}"),
                self.span(),
            )),
        }
    }

    fn parse_ordering(&mut self) -> Result<Ordering, ParseError> {
        let column_id = self.parse_expr()?;
        let is_ascending = if self.eat(&TokenKind::Asc) {
            true
        } else if self.eat(&TokenKind::Desc) {
            false
        } else {
            true
        };
        Ok(Ordering {
            column_id,
            is_ascending,
        })
    }

    /// Comma-separated list that tolerates one trailing comma before a
    /// terminator (the parse of the next item simply fails gracefully and we
    /// stop), matching §4.2's "trailing commas permitted" rule.
    fn parse_trailing_comma_list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = vec![item(self)?];
        while self.eat(&TokenKind::Comma) {
            if self.at_list_terminator() {
                break;
            }
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn at_list_terminator(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Eof
                | TokenKind::From
                | TokenKind::Where
                | TokenKind::Group
                | TokenKind::Having
                | TokenKind::Order
                | TokenKind::Limit
                | TokenKind::RParen
                | TokenKind::On
        )
    }

    fn parse_select_field_list(&mut self) -> Result<Vec<SelectField>, ParseError> {
        self.parse_trailing_comma_list(|p| p.parse_select_field())
    }

    fn parse_select_field(&mut self) -> Result<SelectField, ParseError> {
        if matches!(self.peek(), TokenKind::Star) {
            self.advance();
            return Ok(SelectField {
                expr: Expr::Star,
                alias: None,
                within_record: None,
            });
        }

        let expr = self.parse_expr()?;

        let within_record = if self.eat(&TokenKind::Within) {
            if self.eat(&TokenKind::Record) {
                Some(WithinClause::Record)
            } else {
                Some(WithinClause::Id(self.expect_id()?))
            }
        } else {
            None
        };

        let alias = if within_record.is_some() {
            self.expect(&TokenKind::As)?;
            Some(self.expect_id()?)
        } else if self.eat(&TokenKind::As) {
            Some(self.expect_id()?)
        } else if let TokenKind::Id(_) = self.peek() {
            Some(self.expect_id()?)
        } else {
            None
        };

        Ok(SelectField {
            expr,
            alias,
            within_record,
        })
    }

    // ---- table expressions ----

    fn parse_table_expr(&mut self) -> Result<TableExpr, ParseError> {
        let first = self.parse_joined_table_expr()?;
        if matches!(self.peek(), TokenKind::Comma) {
            let mut tables = vec![first];
            while self.eat(&TokenKind::Comma) {
                if self.at_list_terminator() {
                    break;
                }
                tables.push(self.parse_joined_table_expr()?);
            }
            return Ok(TableExpr::TableUnion(TableUnion { tables }));
        }
        Ok(first)
    }

    fn parse_joined_table_expr(&mut self) -> Result<TableExpr, ParseError> {
        let base = self.parse_primary_table_expr()?;
        let mut join_parts = Vec::new();
        loop {
            let join_type = if self.eat(&TokenKind::Cross) {
                self.expect(&TokenKind::Join)?;
                JoinType::Cross
            } else if self.eat(&TokenKind::Join) {
                JoinType::Inner
            } else if matches!(self.peek(), TokenKind::Left) {
                self.advance();
                self.eat(&TokenKind::Outer);
                self.eat(&TokenKind::Each);
                self.expect(&TokenKind::Join)?;
                JoinType::LeftOuter
            } else {
                break;
            };

            let table_expr = self.parse_primary_table_expr()?;
            let condition = if join_type == JoinType::Cross {
                None
            } else {
                self.expect(&TokenKind::On)?;
                Some(self.parse_expr()?)
            };

            join_parts.push(PartialJoin {
                table_expr,
                join_type,
                condition,
            });
        }

        if join_parts.is_empty() {
            Ok(base)
        } else {
            Ok(TableExpr::Join(Join {
                base: Box::new(base),
                join_parts,
            }))
        }
    }

    fn parse_primary_table_expr(&mut self) -> Result<TableExpr, ParseError> {
        let expr = if self.eat(&TokenKind::LParen) {
            if matches!(self.peek(), TokenKind::Select) {
                let select = self.parse_select()?;
                self.expect(&TokenKind::RParen)?;
                TableExpr::Select(Box::new(select))
            } else {
                let inner = self.parse_table_expr()?;
                self.expect(&TokenKind::RParen)?;
                inner
            }
        } else if matches!(self.peek(), TokenKind::Select) {
            TableExpr::Select(Box::new(self.parse_select()?))
        } else {
            let name = self.parse_table_name()?;
            TableExpr::TableId(TableId { name, alias: None })
        };

        let alias = if self.eat(&TokenKind::As) {
            Some(self.expect_id()?)
        } else if let TokenKind::Id(_) = self.peek() {
            Some(self.expect_id()?)
        } else {
            None
        };

        Ok(attach_alias(expr, alias))
    }

    fn parse_table_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_id()?;
        while self.eat(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_id()?);
        }
        Ok(name)
    }

    // ---- expressions, precedence climbing ----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_and_or()
    }

    fn parse_and_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::And => BinaryOp::And,
                TokenKind::Or => BinaryOp::Or,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::BinaryOperator(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        if self.eat(&TokenKind::Is) {
            let negate = self.eat(&TokenKind::Not);
            self.expect(&TokenKind::Null)?;
            let name = if negate { "is_not_null" } else { "is_null" };
            return Ok(Expr::FunctionCall {
                name: name.to_string(),
                args: vec![left],
            });
        }

        let op = match self.peek() {
            TokenKind::Equals => BinaryOp::Equals,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            TokenKind::GreaterThan => BinaryOp::GreaterThan,
            TokenKind::LessThan => BinaryOp::LessThan,
            TokenKind::GreaterThanOrEqual => BinaryOp::GreaterThanOrEqual,
            TokenKind::LessThanOrEqual => BinaryOp::LessThanOrEqual,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Expr::BinaryOperator(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Plus,
                TokenKind::Minus => BinaryOp::Minus,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOperator(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                TokenKind::Star => {
                    self.advance();
                    let right = self.parse_unary()?;
                    left = Expr::BinaryOperator(BinaryOp::Times, Box::new(left), Box::new(right));
                }
                TokenKind::DividedBy => {
                    self.advance();
                    let right = self.parse_unary()?;
                    left = Expr::BinaryOperator(BinaryOp::Divide, Box::new(left), Box::new(right));
                }
                TokenKind::Mod => {
                    self.advance();
                    let right = self.parse_unary()?;
                    left = Expr::BinaryOperator(BinaryOp::Mod, Box::new(left), Box::new(right));
                }
                TokenKind::Contains => {
                    self.advance();
                    let right = self.parse_unary()?;
                    left =
                        Expr::BinaryOperator(BinaryOp::Contains, Box::new(left), Box::new(right));
                }
                TokenKind::In => {
                    self.advance();
                    self.expect(&TokenKind::LParen)?;
                    let mut args = vec![left];
                    args.extend(self.parse_trailing_comma_list(|p| p.parse_expr())?);
                    self.expect(&TokenKind::RParen)?;
                    left = Expr::FunctionCall {
                        name: "in".to_string(),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Minus) {
            let expr = self.parse_unary()?;
            return Ok(Expr::UnaryOperator(UnaryOp::Neg, Box::new(expr)));
        }
        if self.eat(&TokenKind::Not) {
            let expr = self.parse_unary()?;
            return Ok(Expr::UnaryOperator(UnaryOp::Not, Box::new(expr)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(f)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Case => self.parse_case(),
            TokenKind::Count => self.parse_count_call(),
            TokenKind::Id(name) => {
                self.advance();
                if matches!(self.peek(), TokenKind::LParen) {
                    self.parse_function_call(name)
                } else {
                    self.parse_column_id(name)
                }
            }
            other => Err(ParseError::new(
                format!("unexpected token in expression: {other:?}"),
                self.span(),
            )),
        }
    }

    fn parse_column_id(&mut self, first: String) -> Result<Expr, ParseError> {
        let mut name = first;
        while matches!(self.peek(), TokenKind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_id()?);
        }
        Ok(Expr::ColumnId(name))
    }

    fn parse_count_call(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::Count)?;
        self.expect(&TokenKind::LParen)?;
        if self.eat(&TokenKind::Star) {
            self.expect(&TokenKind::RParen)?;
            return Ok(Expr::FunctionCall {
                name: "count".to_string(),
                args: vec![Expr::Literal(Literal::Int(1))],
            });
        }
        if self.eat(&TokenKind::Distinct) {
            let arg = self.parse_expr()?;
            self.expect(&TokenKind::RParen)?;
            return Ok(Expr::FunctionCall {
                name: "count_distinct".to_string(),
                args: vec![arg],
            });
        }
        let arg = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::FunctionCall {
            name: "count".to_string(),
            args: vec![arg],
        })
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), TokenKind::RParen) {
            args.push(self.parse_expr()?);
            while self.eat(&TokenKind::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::FunctionCall {
            name: name.to_ascii_lowercase(),
            args,
        })
    }

    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::Case)?;
        let mut clauses = Vec::new();
        while self.eat(&TokenKind::When) {
            let condition = self.parse_expr()?;
            self.expect(&TokenKind::Then)?;
            let result_expr = self.parse_expr()?;
            clauses.push(CaseClause {
                condition,
                result_expr,
            });
        }
        if clauses.is_empty() {
            return Err(ParseError::new(
                "CASE must have at least one WHEN clause".to_string(),
                self.span(),
            ));
        }
        if self.eat(&TokenKind::Else) {
            let result_expr = self.parse_expr()?;
            clauses.push(CaseClause {
                condition: Expr::Literal(Literal::Bool(true)),
                result_expr,
            });
        }
        self.expect(&TokenKind::End)?;
        Ok(Expr::Case(CaseExpression { clauses }))
    }
}

fn attach_alias(expr: TableExpr, alias: Option<String>) -> TableExpr {
    match (expr, alias) {
        (TableExpr::TableId(mut t), alias) => {
            t.alias = alias;
            TableExpr::TableId(t)
        }
        (TableExpr::Select(mut s), alias) => {
            s.alias = alias;
            TableExpr::Select(s)
        }
        (other, None) => other,
        // Joins and unions don't carry an inline alias field in this AST;
        // an alias on one is only meaningful when wrapped in parens as a
        // subquery, which the grammar routes through TableId/Select instead.
        (other, Some(_)) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use pretty_assertions::assert_eq;

    fn parse_text(text: &str) -> Select {
        let tokens = lex(text).unwrap();
        parse(&tokens).unwrap()
    }

    #[test]
    fn parses_simple_select() {
        let select = parse_text("SELECT 1");
        assert_eq!(select.select_fields.len(), 1);
        assert_eq!(select.select_fields[0].expr, Expr::Literal(Literal::Int(1)));
    }

    #[test]
    fn parses_count_star_as_count_one() {
        let select = parse_text("SELECT COUNT(*) FROM t");
        assert_eq!(
            select.select_fields[0].expr,
            Expr::FunctionCall {
                name: "count".to_string(),
                args: vec![Expr::Literal(Literal::Int(1))],
            }
        );
    }

    #[test]
    fn parses_count_distinct() {
        let select = parse_text("SELECT COUNT(DISTINCT x) FROM t");
        assert_eq!(
            select.select_fields[0].expr,
            Expr::FunctionCall {
                name: "count_distinct".to_string(),
                args: vec![Expr::ColumnId("x".to_string())],
            }
        );
    }

    #[test]
    fn parses_case_with_else() {
        let select = parse_text("SELECT CASE WHEN TRUE THEN 1 ELSE 0 END");
        match &select.select_fields[0].expr {
            Expr::Case(case) => {
                assert_eq!(case.clauses.len(), 2);
                assert_eq!(case.clauses[1].condition, Expr::Literal(Literal::Bool(true)));
            }
            other => panic!("expected CASE, got {other:?}"),
        }
    }

    #[test]
    fn bare_case_else_is_a_syntax_error() {
        let tokens = lex("SELECT CASE ELSE 1 END").unwrap();
        assert!(parse(&tokens).is_err());
    }

    #[test]
    fn parses_in_list() {
        let select = parse_text("SELECT x IN (1, 2, 3)");
        assert_eq!(
            select.select_fields[0].expr,
            Expr::FunctionCall {
                name: "in".to_string(),
                args: vec![
                    Expr::ColumnId("x".to_string()),
                    Expr::Literal(Literal::Int(1)),
                    Expr::Literal(Literal::Int(2)),
                    Expr::Literal(Literal::Int(3)),
                ],
            }
        );
    }

    #[test]
    fn parses_is_null() {
        let select = parse_text("SELECT foo IS NULL, foo IS NOT NULL FROM t");
        assert_eq!(
            select.select_fields[0].expr,
            Expr::FunctionCall {
                name: "is_null".to_string(),
                args: vec![Expr::ColumnId("foo".to_string())],
            }
        );
        assert_eq!(
            select.select_fields[1].expr,
            Expr::FunctionCall {
                name: "is_not_null".to_string(),
                args: vec![Expr::ColumnId("foo".to_string())],
            }
        );
    }

    #[test]
    fn parses_join_with_condition() {
        let select = parse_text(
            "SELECT bar FROM test_table JOIN test_table_3 ON test_table.val1 = test_table_3.foo",
        );
        match select.table_expr.unwrap().as_ref() {
            TableExpr::Join(join) => {
                assert_eq!(join.join_parts.len(), 1);
                assert_eq!(join.join_parts[0].join_type, JoinType::Inner);
            }
            other => panic!("expected Join, got {other:?}"),
        }
    }

    #[test]
    fn trailing_comma_in_select_list_is_allowed() {
        let select = parse_text("SELECT 1, 2,");
        assert_eq!(select.select_fields.len(), 2);
    }

    #[test]
    fn precedence_multiplication_over_addition() {
        let select = parse_text("SELECT 1 + 2 * 3");
        assert_eq!(
            select.select_fields[0].expr,
            Expr::BinaryOperator(
                BinaryOp::Plus,
                Box::new(Expr::Literal(Literal::Int(1))),
                Box::new(Expr::BinaryOperator(
                    BinaryOp::Times,
                    Box::new(Expr::Literal(Literal::Int(2))),
                    Box::new(Expr::Literal(Literal::Int(3))),
                )),
            )
        );
    }
}
