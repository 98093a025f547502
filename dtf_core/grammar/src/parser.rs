//! Transfer-statement recognition.
//!
//! The grammar is a thin interceptor in front of the host engine's SQL
//! parser: text whose first token is the transfer keyword is parsed by the
//! extension trait below; everything else is handed to the stock parser
//! untouched and returned as host statements.

use crate::ast::{TransferClause, TransferStatement, STATEMENT_KEYWORD};
use crate::error::SyntaxError;
use common::types::OptionValue;
use sqlparser::ast::{Statement, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, Tokenizer};

/// Result of running a raw statement through the interceptor.
#[derive(Debug)]
pub enum Dispatched {
    /// The statement carried the transfer keyword and parsed as one.
    Transfer(TransferStatement),
    /// Anything else, parsed by the host engine's own grammar.
    Host(Vec<Statement>),
}

/// Parse a raw statement, routing it to the transfer grammar or the host
/// parser based on the leading token.
pub fn dispatch(sql: &str) -> Result<Dispatched, SyntaxError> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize_with_location()?;
    let mut parser = Parser::new(&dialect).with_tokens_with_locations(tokens);

    let leading = parser.peek_token();
    let is_transfer = matches!(
        &leading.token,
        Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(STATEMENT_KEYWORD)
    );

    if is_transfer {
        Ok(Dispatched::Transfer(parser.parse_transfer_statement()?))
    } else {
        Ok(Dispatched::Host(Parser::parse_sql(&dialect, sql)?))
    }
}

/// Extension parsing over the stock SQL parser, mirroring how the host
/// grammar is extended elsewhere: new productions as trait methods on
/// [`Parser`], reusing its tokenizer, value parsing and error type.
pub trait TransferStatementParse {
    fn parse_transfer_statement(&mut self) -> Result<TransferStatement, ParserError>;
    fn parse_transfer_clause(&mut self, keyword: &str) -> Result<TransferClause, ParserError>;
    fn parse_options_block(&mut self) -> Result<Vec<(String, OptionValue)>, ParserError>;
    fn parse_option_value(&mut self) -> Result<OptionValue, ParserError>;
    fn parse_string_literal(&mut self, what: &str) -> Result<String, ParserError>;
    fn expect_word(&mut self, expected: &str) -> Result<(), ParserError>;
}

impl TransferStatementParse for Parser<'_> {
    fn parse_transfer_statement(&mut self) -> Result<TransferStatement, ParserError> {
        self.expect_word(STATEMENT_KEYWORD)?;
        let source = self.parse_transfer_clause("SOURCE")?;
        let sink = self.parse_transfer_clause("SINK")?;

        self.consume_token(&Token::SemiColon);
        let trailing = self.peek_token();
        if trailing.token != Token::EOF {
            return Err(ParserError::ParserError(format!(
                "Expected end of statement, found {} at line {}, column {}",
                trailing.token, trailing.span.start.line, trailing.span.start.column
            )));
        }

        Ok(TransferStatement { source, sink })
    }

    fn parse_transfer_clause(&mut self, keyword: &str) -> Result<TransferClause, ParserError> {
        self.expect_word(keyword)?;
        self.expect_token(&Token::LParen)?;
        let connector = self.parse_string_literal("connector name")?;
        self.expect_token(&Token::RParen)?;
        self.expect_word("OPTIONS")?;
        let options = self.parse_options_block()?;
        Ok(TransferClause { connector, options })
    }

    fn parse_options_block(&mut self) -> Result<Vec<(String, OptionValue)>, ParserError> {
        self.expect_token(&Token::LParen)?;
        let mut options = Vec::new();
        if self.consume_token(&Token::RParen) {
            return Ok(options);
        }
        loop {
            let key = self.parse_identifier()?.value;
            self.expect_token(&Token::Eq)?;
            let value = self.parse_option_value()?;
            options.push((key, value));
            if self.consume_token(&Token::RParen) {
                break;
            }
            self.expect_token(&Token::Comma)?;
        }
        Ok(options)
    }

    fn parse_option_value(&mut self) -> Result<OptionValue, ParserError> {
        if self.consume_token(&Token::LBracket) {
            let mut items = Vec::new();
            if self.consume_token(&Token::RBracket) {
                return Ok(OptionValue::StringList(items));
            }
            loop {
                items.push(self.parse_string_literal("list element")?);
                if self.consume_token(&Token::RBracket) {
                    break;
                }
                self.expect_token(&Token::Comma)?;
            }
            return Ok(OptionValue::StringList(items));
        }

        let negated = self.consume_token(&Token::Minus);
        let at = self.peek_token();
        let value = self.parse_value()?;
        match value.value {
            Value::Number(repr, _) => {
                let parsed = repr.parse::<i64>().map_err(|_| {
                    ParserError::ParserError(format!(
                        "Expected an integer option value, found {} at line {}, column {}",
                        repr, at.span.start.line, at.span.start.column
                    ))
                })?;
                Ok(OptionValue::Integer(if negated { -parsed } else { parsed }))
            }
            _ if negated => Err(ParserError::ParserError(format!(
                "Expected a number after '-' at line {}, column {}",
                at.span.start.line, at.span.start.column
            ))),
            Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
                Ok(OptionValue::String(s))
            }
            Value::Boolean(b) => Ok(OptionValue::Boolean(b)),
            other => Err(ParserError::ParserError(format!(
                "Expected a string, integer, boolean or string list, found {} at line {}, column {}",
                other, at.span.start.line, at.span.start.column
            ))),
        }
    }

    fn parse_string_literal(&mut self, what: &str) -> Result<String, ParserError> {
        let tws = self.next_token();
        match tws.token {
            Token::SingleQuotedString(s) | Token::DoubleQuotedString(s) => Ok(s),
            Token::Word(w) if matches!(w.quote_style, Some('"') | Some('\'')) => Ok(w.value),
            other => Err(ParserError::ParserError(format!(
                "Expected a quoted {} string, found {} at line {}, column {}",
                what, other, tws.span.start.line, tws.span.start.column
            ))),
        }
    }

    fn expect_word(&mut self, expected: &str) -> Result<(), ParserError> {
        let tws = self.next_token();
        match &tws.token {
            Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(expected) => {
                Ok(())
            }
            other => Err(ParserError::ParserError(format!(
                "Expected {}, found {} at line {}, column {}",
                expected, other, tws.span.start.line, tws.span.start.column
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_transfer(sql: &str) -> TransferStatement {
        match dispatch(sql).expect("parse failed") {
            Dispatched::Transfer(stmt) => stmt,
            Dispatched::Host(other) => panic!("expected a transfer statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_pattern_source_into_log_sink() {
        let sql = r#"
            DATATUNNEL SOURCE("mysql") OPTIONS (
              username = "root",
              password = "root2023",
              host = '172.18.5.44',
              port = 3306,
              schemaName = 'cdc_demos_[0-9]+',
              tableName = 'account_[0-9]+',
              columns = ["id", "name", "dt_meta_table"],
              condition = "where 1=1 limit 1"
            )
            SINK("log") OPTIONS (
              columns = ["id", "username", "table_name"]
            )
        "#;

        let stmt = parse_transfer(sql);
        assert_eq!(stmt.source.connector, "mysql");
        assert_eq!(stmt.sink.connector, "log");
        assert_eq!(
            stmt.source.option("port"),
            Some(&OptionValue::Integer(3306))
        );
        assert_eq!(
            stmt.source.option("schemaName"),
            Some(&OptionValue::String("cdc_demos_[0-9]+".into()))
        );
        assert_eq!(
            stmt.sink.option("columns"),
            Some(&OptionValue::StringList(vec![
                "id".into(),
                "username".into(),
                "table_name".into()
            ]))
        );
    }

    #[test]
    fn keywords_and_connector_names_are_case_insensitive() {
        let sql = r#"
            Datatunnel source('mysql') OPTIONS(
                "username" = "root"
                ,"jdbcUrl" = "jdbc:mysql://172.18.1.51:3306/pipeline"
                ,"schemaName" = "pipeline"
                ,"tableName" = "cyj_test1"
                ,"columns" = ["*"]
            )
            sink('oracle') options(
                "schemaName" = "FLINKUSER"
                ,"tableName" = "DEMOS"
                ,"writeMode" = "UPSERT"
                ,"upsertKeyColumns" = ["ID"]
            );
        "#;

        let stmt = parse_transfer(sql);
        assert_eq!(stmt.source.connector, "mysql");
        assert_eq!(stmt.sink.connector, "oracle");
        assert_eq!(
            stmt.sink.option("writeMode"),
            Some(&OptionValue::String("UPSERT".into()))
        );
        assert_eq!(
            stmt.sink.option("upsertKeyColumns"),
            Some(&OptionValue::StringList(vec!["ID".into()]))
        );
    }

    #[test]
    fn value_kinds() {
        let sql = r#"DATATUNNEL SOURCE("a") OPTIONS (
            schemaName = 's', tableName = 't',
            retries = -3, verbose = true, tags = []
        ) SINK("b") OPTIONS (schemaName = 's', tableName = 't')"#;

        let stmt = parse_transfer(sql);
        assert_eq!(stmt.source.option("retries"), Some(&OptionValue::Integer(-3)));
        assert_eq!(stmt.source.option("verbose"), Some(&OptionValue::Boolean(true)));
        assert_eq!(
            stmt.source.option("tags"),
            Some(&OptionValue::StringList(vec![]))
        );
    }

    #[test]
    fn canonical_rendering_round_trips() {
        let sql = r#"DATATUNNEL SOURCE("mysql") OPTIONS (
            username = "root", port = 3306, ssl = false,
            schemaName = 'cdc_demos_[0-9]+', tableName = "account_[0-9]+",
            columns = ["id", "name"]
        ) SINK("log") OPTIONS (maxRows = 10)"#;

        let first = parse_transfer(sql);
        let rendered = first.to_string();
        let second = parse_transfer(&rendered);
        assert_eq!(first, second);
        // rendering is a fixed point
        assert_eq!(rendered, second.to_string());
    }

    #[test]
    fn missing_sink_clause_is_a_syntax_error() {
        let sql = r#"DATATUNNEL SOURCE("mysql") OPTIONS (schemaName = 's', tableName = 't')"#;
        let err = dispatch(sql).expect_err("expected syntax error");
        assert!(err.to_string().contains("SINK"), "got: {err}");
    }

    #[test]
    fn unbalanced_options_list_is_a_syntax_error() {
        let sql = r#"DATATUNNEL SOURCE("mysql") OPTIONS (schemaName = 's'
            SINK("log") OPTIONS (tableName = 't')"#;
        assert!(dispatch(sql).is_err());
    }

    #[test]
    fn missing_equals_is_a_syntax_error() {
        let sql = r#"DATATUNNEL SOURCE("mysql") OPTIONS (schemaName 's') SINK("log") OPTIONS ()"#;
        assert!(dispatch(sql).is_err());
    }

    #[test]
    fn fractional_number_is_rejected() {
        let sql = r#"DATATUNNEL SOURCE("a") OPTIONS (rate = 1.5) SINK("b") OPTIONS ()"#;
        let err = dispatch(sql).expect_err("expected syntax error");
        assert!(err.to_string().contains("integer"), "got: {err}");
    }

    #[test]
    fn trailing_text_is_rejected() {
        let sql = r#"DATATUNNEL SOURCE("a") OPTIONS (k = 1) SINK("b") OPTIONS (k = 2) garbage"#;
        let err = dispatch(sql).expect_err("expected syntax error");
        assert!(err.to_string().contains("end of statement"), "got: {err}");
    }

    #[test]
    fn ordinary_sql_passes_through_to_the_host_parser() {
        match dispatch("SELECT id, name FROM accounts").expect("parse failed") {
            Dispatched::Host(stmts) => assert_eq!(stmts.len(), 1),
            Dispatched::Transfer(stmt) => panic!("unexpected transfer statement: {stmt}"),
        }
    }

    #[test]
    fn host_parse_errors_are_reported() {
        assert!(dispatch("SELEC id FROM").is_err());
    }
}
