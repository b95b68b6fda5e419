//! Análisis léxico.
//!
//! # Tokenization
//! Descompone el lado derecho de una ecuación (un [`Snippet`]) en
//! unidades léxicas denominadas tokens. Los espacios en blanco se
//! descartan durante esta operación. Cada token emitido está asociado
//! a una ubicación en el código fuente original.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores inician con una letra ASCII, seguida de letras,
//!   dígitos o `'_'`.
//! - Los identificadores distinguen mayúsculas de minúsculas. Los nombres
//!   de operadores no, pero eso se resuelve en [`crate::parse`].
//! - Las constantes numéricas se aceptan como tokens aunque ningún
//!   operador las utilice todavía; se preserva su lexema.
//!
//! # Errores
//! No hay recuperación: el primer carácter inesperado termina el
//! escaneo y aborta la verificación completa.

use crate::source::{Located, Position, Snippet};
use std::{
    borrow::Borrow,
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
};

use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Invalid character {0:?} in expression")]
    BadChar(char),
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(Rc<str>);

impl Identifier {
    /// Determina si el identificador sigue la convención de registros
    /// (`q` o `Q` inicial).
    pub fn is_register_name(&self) -> bool {
        self.0.starts_with(['q', 'Q'])
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier(Rc::from(name))
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Constante numérica, como lexema.
    Number(String),

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `,`
    Comma,
}

impl Display for Token {
    // Los mensajes de error citan el lexema tal cual aparece
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => id.fmt(fmt),
            Number(digits) => fmt.write_str(digits),
            OpenParen => fmt.write_str("("),
            CloseParen => fmt.write_str(")"),
            Comma => fmt.write_str(","),
        }
    }
}

/// Determina si un carácter puede iniciar un identificador.
pub fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Determina si un carácter puede pertenecer a un identificador.
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Máquina de estados para análisis léxico.
///
/// La salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el fragmento de entrada.
pub struct Lexer<'a> {
    snippet: Snippet<'a>,
    source: Peekable<Box<dyn Iterator<Item = (char, Position)> + 'a>>,
    state: State,
    start: Position,
    next: Position,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado terminal, luego de un error o del fin de la entrada.
    Done,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Constante numérica.
    Digits(String),

    /// Identificador, incluyendo nombres de operadores.
    Word(String),
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial a partir de un fragmento.
    pub fn new(snippet: Snippet<'a>) -> Self {
        let chars: Box<dyn Iterator<Item = (char, Position)> + 'a> = Box::new(snippet.chars());

        Lexer {
            snippet,
            source: chars.peekable(),
            state: State::Start,
            start: snippet.start(),
            next: snippet.start(),
        }
    }

    /// Reduce la entrada a una secuencia de tokens, o bien al primer
    /// error encontrado. Nunca hay salida parcial.
    pub fn try_exhaustive(self) -> Result<Vec<Located<Token>>, Located<LexerError>> {
        self.collect()
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use {State::*, Token::*};

        loop {
            let next_char = self.source.peek().map(|&(c, _)| c);

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next;
            }

            match (&mut self.state, next_char) {
                (Done, _) => return Ok(None),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some(',')) => self.state = Complete(Comma),

                (Start, Some(c)) if is_word_start(c) => self.state = Word(c.to_string()),
                (Start, Some(c)) if c.is_ascii_digit() => self.state = Digits(c.to_string()),

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => return Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens triviales
                (Complete(token), _) => return Ok(Some(std::mem::replace(token, Comma))),

                (Digits(digits), Some(c)) if c.is_ascii_digit() => digits.push(c),
                (Digits(digits), _) => return Ok(Some(Number(std::mem::take(digits)))),

                (Word(word), Some(c)) if is_word_char(c) => word.push(c),
                (Word(word), _) => return Ok(Some(Id(Identifier::from(std::mem::take(word))))),
            }

            // Aquí se consume el carácter que se observó con lookahead
            if let Some((_, position)) = self.source.next() {
                self.next = position.advance();
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => {
                self.state = State::Done;
                None
            }

            Ok(Some(token)) => {
                self.state = State::Start;

                let location = self.snippet.locate(self.start..self.next);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Done;

                let location = self.snippet.locate(self.start..self.start.advance());
                Some(Err(Located::at(error, location)))
            }
        }
    }
}
