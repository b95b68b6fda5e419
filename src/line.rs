//! Clasificación de líneas.
//!
//! Cada línea no vacía de un programa `.seq` tiene exactamente una de
//! tres formas, que se prueban en este orden:
//!
//! 1. `pin NOMBRE = ENTERO`
//! 2. `qNOMBRE.D = expr`
//! 3. `NOMBRE = expr`
//!
//! El lado derecho de las ecuaciones no se analiza aquí; se devuelve
//! como un [`Snippet`] que luego se entrega a [`crate::parse`]. Tampoco
//! se acota aquí el número de pin, que puede tener cualquier cantidad
//! de dígitos.

use crate::{
    lex::{is_word_char, is_word_start, Identifier},
    source::{Located, Snippet},
};

/// Forma de una línea reconocida.
#[derive(Debug)]
pub enum Shape<'a> {
    /// Declaración de pin.
    Pin {
        name: Located<Identifier>,
        number: Snippet<'a>,
    },

    /// Ecuación secuencial, con el sufijo `.D` ya removido.
    Sequential {
        register: Located<Identifier>,
        rhs: Snippet<'a>,
    },

    /// Ecuación combinacional.
    Combinational {
        target: Located<Identifier>,
        rhs: Snippet<'a>,
    },
}

/// Reconoce la forma de una línea recortada y no vacía.
///
/// Retorna `None` si la línea no tiene ninguna forma válida.
pub fn classify(line: Snippet<'_>) -> Option<Shape<'_>> {
    pin(line)
        .or_else(|| sequential(line))
        .or_else(|| combinational(line))
}

fn pin(line: Snippet<'_>) -> Option<Shape<'_>> {
    let mut scanner = Scanner::new(line);

    let keyword = scanner.word()?;
    if !unicase::eq_ascii(keyword.as_ref().as_ref(), "pin") || scanner.whitespace() == 0 {
        return None;
    }

    let name = scanner.word()?;
    scanner.whitespace();
    scanner.literal("=")?;
    scanner.whitespace();

    let number = scanner.integer()?;
    scanner.at_end().then(|| Shape::Pin { name, number })
}

fn sequential(line: Snippet<'_>) -> Option<Shape<'_>> {
    let mut scanner = Scanner::new(line);

    let register = scanner.word()?;
    if !register.as_ref().is_register_name() {
        return None;
    }

    scanner.literal(".D")?;
    let rhs = scanner.assignment()?;

    Some(Shape::Sequential { register, rhs })
}

fn combinational(line: Snippet<'_>) -> Option<Shape<'_>> {
    let mut scanner = Scanner::new(line);

    let target = scanner.word()?;
    let rhs = scanner.assignment()?;

    Some(Shape::Combinational { target, rhs })
}

/// Cursor sobre una línea, con reconocedores de piezas pequeñas.
struct Scanner<'a> {
    line: Snippet<'a>,
    offset: usize,
}

impl<'a> Scanner<'a> {
    fn new(line: Snippet<'a>) -> Self {
        Scanner { line, offset: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.line.text()[self.offset..]
    }

    /// Consume caracteres mientras se cumpla un predicado, retornando el rango.
    fn take_while<F>(&mut self, predicate: F) -> Snippet<'a>
    where
        F: Fn(char) -> bool,
    {
        let length = self
            .rest()
            .find(|c: char| !predicate(c))
            .unwrap_or_else(|| self.rest().len());

        let taken = self.line.slice(self.offset..self.offset + length);
        self.offset += length;
        taken
    }

    fn whitespace(&mut self) -> usize {
        self.take_while(char::is_whitespace).text().len()
    }

    fn word(&mut self) -> Option<Located<Identifier>> {
        if !self.rest().starts_with(is_word_start) {
            return None;
        }

        let word = self.take_while(is_word_char);
        Some(Located::at(Identifier::from(word.text()), word.location()))
    }

    fn integer(&mut self) -> Option<Snippet<'a>> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        (!digits.text().is_empty()).then(|| digits)
    }

    fn literal(&mut self, literal: &str) -> Option<()> {
        if self.rest().starts_with(literal) {
            self.offset += literal.len();
            Some(())
        } else {
            None
        }
    }

    /// Reconoce `= resto` y retorna el resto, que no puede ser vacío.
    fn assignment(&mut self) -> Option<Snippet<'a>> {
        self.whitespace();
        self.literal("=")?;
        self.whitespace();

        let rhs = self.take_while(|_| true);
        (!rhs.text().is_empty()).then(|| rhs)
    }

    fn at_end(&self) -> bool {
        self.rest().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;

    fn shape(text: &str) -> Option<String> {
        let source = Source::new("test.seq", text);
        let line = source.lines().next().unwrap().trim();

        classify(line).map(|shape| match shape {
            Shape::Pin { name, number } => format!("pin {} = {}", name.as_ref(), number.text()),
            Shape::Sequential { register, rhs } => {
                format!("seq {} <- {:?} @ {}", register.as_ref(), rhs.text(), rhs.start())
            }
            Shape::Combinational { target, rhs } => {
                format!("comb {} <- {:?} @ {}", target.as_ref(), rhs.text(), rhs.start())
            }
        })
    }

    #[test]
    fn pin_declarations() {
        assert_eq!(shape("pin Y=8").as_deref(), Some("pin Y = 8"));
        assert_eq!(shape("PIN  q_3 =  3").as_deref(), Some("pin q_3 = 3"));
        assert_eq!(shape("Pin a = 0").as_deref(), Some("pin a = 0"));
        assert_eq!(shape("pin x = 99999999999").as_deref(), Some("pin x = 99999999999"));
    }

    #[test]
    fn malformed_pins_fall_through() {
        // Sin espacio tras `pin`, se trata de una ecuación combinacional
        assert_eq!(shape("pinx = 3").as_deref(), Some("comb pinx <- \"3\" @ 1:8"));

        assert_eq!(shape("pin x = 3 4"), None);
        assert_eq!(shape("pin x = a"), None);
        assert_eq!(shape("pin x"), None);
        assert_eq!(shape("pin x = -3"), None);
    }

    #[test]
    fn sequential_equations() {
        assert_eq!(
            shape("q1.D = NOT(q1)").as_deref(),
            Some("seq q1 <- \"NOT(q1)\" @ 1:8")
        );

        assert_eq!(
            shape("Qstate.D=AND(a,b)").as_deref(),
            Some("seq Qstate <- \"AND(a,b)\" @ 1:10")
        );
    }

    #[test]
    fn sequential_shape_is_strict() {
        assert_eq!(shape("a.D = b"), None);
        assert_eq!(shape("q1.d = b"), None);
        assert_eq!(shape("q1 .D = b"), None);
    }

    #[test]
    fn combinational_equations() {
        assert_eq!(shape("y = f1").as_deref(), Some("comb y <- \"f1\" @ 1:5"));
        assert_eq!(shape("q1 = x").as_deref(), Some("comb q1 <- \"x\" @ 1:6"));
        assert_eq!(shape("y==a").as_deref(), Some("comb y <- \"=a\" @ 1:3"));
    }

    #[test]
    fn equations_need_a_right_hand_side() {
        assert_eq!(shape("y ="), None);
        assert_eq!(shape("q.D ="), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(shape("= a"), None);
        assert_eq!(shape("1y = a"), None);
        assert_eq!(shape("y: a"), None);
    }
}
