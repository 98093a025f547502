use sqlparser::parser::ParserError;
use sqlparser::tokenizer::TokenizerError;
use thiserror::Error;

/// Statement text that could not be turned into an AST. Messages carry the
/// offending line/column.
#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("could not tokenize statement: {0}")]
    Tokenize(#[from] TokenizerError),
    #[error("syntax error: {0}")]
    Statement(#[from] ParserError),
}
