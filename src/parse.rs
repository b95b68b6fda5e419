//! Análisis sintáctico de expresiones.
//!
//! La gramática de una expresión es mínima:
//!
//! ```text
//! expr := IDENT [ '(' args ')' ]
//! args := expr [ ',' expr ]
//! ```
//!
//! Un identificador sin `(` posterior es una lectura de señal. Un
//! identificador seguido de `(` es una invocación de alguno de los
//! cuatro operadores conocidos. La aridad se verifica únicamente
//! luego de consumir la lista completa de argumentos y el `)` final.
//!
//! Tanto el verificador como el generador de código consumen el mismo
//! [`Expr`], por lo cual ambos aceptan exactamente la misma sintaxis.
//!
//! Las invocaciones pueden anidarse hasta [`MAX_DEPTH`] niveles. Todo
//! recorrido posterior del árbol es recursivo, así que este límite
//! acota también el uso de pila de esas fases.

use std::{
    fmt::{self, Display},
    iter::Peekable,
    slice,
    str::FromStr,
};

use thiserror::Error;

use crate::{
    lex::{Identifier, Lexer, NoCase, Token},
    source::{Located, Location, Snippet},
};

/// Máxima cantidad de invocaciones anidadas en una expresión.
pub const MAX_DEPTH: usize = 256;

/// Un árbol de expresión.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Lectura del valor actual de una señal.
    Read(Located<Identifier>),

    /// Aplicación de un operador.
    Call {
        operator: Located<Operator>,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Visita todas las lecturas de señal, de izquierda a derecha.
    pub fn reads(&self) -> Vec<&Located<Identifier>> {
        let mut reads = Vec::new();
        self.collect_reads(&mut reads);
        reads
    }

    fn collect_reads<'a>(&'a self, reads: &mut Vec<&'a Located<Identifier>>) {
        match self {
            Expr::Read(id) => reads.push(id),
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.collect_reads(reads)),
        }
    }
}

/// Forma canónica, con operadores en mayúscula.
impl Display for Expr {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Read(id) => id.as_ref().fmt(fmt),
            Expr::Call { operator, args } => {
                write!(fmt, "{}(", operator.as_ref())?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        fmt.write_str(", ")?;
                    }

                    arg.fmt(fmt)?;
                }

                fmt.write_str(")")
            }
        }
    }
}

/// Un operador lógico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Not,
    And,
    Or,
    Xor,
}

impl Operator {
    /// Cantidad exacta de argumentos que requiere el operador.
    pub fn arity(self) -> usize {
        match self {
            Operator::Not => 1,
            Operator::And | Operator::Or | Operator::Xor => 2,
        }
    }

    /// Determina si un nombre coincide con algún operador, sin importar
    /// mayúsculas o minúsculas.
    pub fn is_operator_name(name: &str) -> bool {
        Operator::from_str(name).is_ok()
    }
}

impl Display for Operator {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Operator::Not => "NOT",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Xor => "XOR",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Operator::*;

        const OPERATORS: &[(NoCase<&str>, Operator)] = &[
            (NoCase::new("not"), Not),
            (NoCase::new("and"), And),
            (NoCase::new("or"),  Or),
            (NoCase::new("xor"), Xor),
        ];

        OPERATORS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, operator)| operator)
            .ok_or(())
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Unexpected end of expression")]
    UnexpectedEof,

    #[error("Expected identifier, got '{0}'")]
    ExpectedId(Token),

    #[error("Unknown function '{0}'")]
    UnknownFunction(Identifier),

    #[error("{0} requires arguments")]
    MissingArguments(Operator),

    #[error("Missing ')' in call to {0}")]
    MissingCloseParen(Operator),

    #[error("{operator} must have exactly {expected} {}, got {found}", arguments(.expected))]
    Arity {
        operator: Operator,
        expected: usize,
        found: usize,
    },

    #[error("Unexpected token '{0}' after expression")]
    UnexpectedToken(Token),

    #[error("Expression is nested deeper than {limit} calls")]
    TooDeep { limit: usize },
}

fn arguments(count: &usize) -> &'static str {
    if *count == 1 {
        "argument"
    } else {
        "arguments"
    }
}

/// Error de cualquiera de las dos fases que componen a una expresión.
#[derive(Debug)]
pub enum ExprError {
    Lexer(Located<crate::lex::LexerError>),
    Parser(Located<ParserError>),
}

impl From<ExprError> for crate::error::Diagnostic {
    fn from(error: ExprError) -> Self {
        match error {
            ExprError::Lexer(error) => crate::error::Diagnostic::from(error).kind("Lexical error"),
            ExprError::Parser(error) => crate::error::Diagnostic::from(error).kind("Syntax error"),
        }
    }
}

/// Escanea y analiza el lado derecho completo de una ecuación.
///
/// Todo el fragmento debe ser consumido por una única expresión.
pub fn expression(snippet: Snippet<'_>) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(snippet)
        .try_exhaustive()
        .map_err(ExprError::Lexer)?;

    parse(&tokens, snippet.end_location()).map_err(ExprError::Parser)
}

/// Analiza una expresión que debe abarcar todos los tokens.
///
/// `eof` es la ubicación a reportar cuando la entrada termina antes
/// de lo esperado.
pub fn parse(tokens: &[Located<Token>], eof: Location) -> Result<Expr, Located<ParserError>> {
    let mut parser = Parser {
        tokens: tokens.iter().peekable(),
        eof,
        depth: 0,
    };

    let expr = parser.expr()?;
    match parser.tokens.next() {
        None => Ok(expr),
        Some(extra) => Err(Located::at(
            ParserError::UnexpectedToken(extra.as_ref().clone()),
            extra.location().clone(),
        )),
    }
}

struct Parser<'a> {
    tokens: Peekable<slice::Iter<'a, Located<Token>>>,
    eof: Location,
    depth: usize,
}

type Parse<T> = Result<T, Located<ParserError>>;

impl<'a> Parser<'a> {
    fn expr(&mut self) -> Parse<Expr> {
        let (location, token) = self.next()?.clone().split();
        let id = match token {
            Token::Id(id) => id,
            other => return Err(Located::at(ParserError::ExpectedId(other), location)),
        };

        if !self.peek_is(&Token::OpenParen) {
            return Ok(Expr::Read(Located::at(id, location)));
        }

        let operator = match Operator::from_str(id.as_ref()) {
            Ok(operator) => operator,
            Err(()) => return Err(Located::at(ParserError::UnknownFunction(id), location)),
        };

        let open = self.next()?.location().clone();
        if self.peek_is(&Token::CloseParen) {
            return Err(Located::at(ParserError::MissingArguments(operator), open));
        }

        if self.depth == MAX_DEPTH {
            let error = ParserError::TooDeep { limit: MAX_DEPTH };
            return Err(Located::at(error, location));
        }

        self.depth += 1;
        let mut args = vec![self.expr()?];
        if self.peek_is(&Token::Comma) {
            self.next()?;
            args.push(self.expr()?);
        }

        self.depth -= 1;

        let close = match self.tokens.next() {
            Some(token) if *token.as_ref() == Token::CloseParen => token.location(),
            Some(token) => {
                return Err(Located::at(
                    ParserError::MissingCloseParen(operator),
                    token.location().clone(),
                ))
            }

            None => {
                return Err(Located::at(
                    ParserError::MissingCloseParen(operator),
                    self.eof.clone(),
                ))
            }
        };

        let call = Location::span(location.clone(), close);
        if args.len() != operator.arity() {
            let error = ParserError::Arity {
                operator,
                expected: operator.arity(),
                found: args.len(),
            };

            return Err(Located::at(error, call));
        }

        Ok(Expr::Call {
            operator: Located::at(operator, location),
            args,
        })
    }

    fn peek_is(&mut self, token: &Token) -> bool {
        matches!(self.tokens.peek(), Some(next) if next.as_ref() == token)
    }

    fn next(&mut self) -> Parse<&'a Located<Token>> {
        self.tokens
            .next()
            .ok_or_else(|| Located::at(ParserError::UnexpectedEof, self.eof.clone()))
    }
}
