//! Análisis semántico.
//!
//! La verificación ocurre en dos pasadas. La primera recorre las líneas
//! en orden, clasifica cada una, analiza los lados derechos y construye
//! la tabla de símbolos. La segunda, que solo ocurre si la primera no
//! encontró errores, verifica que todo identificador leído en alguna
//! expresión esté definido en alguno de los tres espacios de nombres:
//! pines, salidas combinacionales o registros.
//!
//! Ambas pasadas se detienen en el primer error.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, trace};

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use crate::{
    error::Diagnostic,
    ir::{Equation, Pin, Program},
    lex::Identifier,
    line::{classify, Shape},
    parse::{self, Operator},
    source::{Located, Location, Snippet, Source},
};

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Invalid syntax")]
    InvalidSyntax,

    #[error("Symbol '{0}' is used but never declared as a pin or defined on the left-hand side")]
    Undefined(Identifier),

    #[error("Pin '{0}' is already declared on line {1}")]
    PinRedeclared(Identifier, u32),

    #[error("Pin number {number} for '{name}' is out of range (0 to {})", u8::MAX)]
    PinNumber { name: Identifier, number: String },

    #[error("Signal '{0}' is already driven on line {1}")]
    Redriven(Identifier, u32),
}

/// Espacio de nombres de un símbolo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    Pin,
    Combinational,
    Register,
}

impl Display for Symbol {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Pin => fmt.write_str("pin"),
            Symbol::Combinational => fmt.write_str("combinational output"),
            Symbol::Register => fmt.write_str("register"),
        }
    }
}

/// Tabla de símbolos con los tres espacios de nombres fusionados.
///
/// Un mismo nombre puede ser a la vez pin y señal asignada, lo cual
/// lo convierte en pin de salida. Lo que no se permite es declarar dos
/// veces un pin o asignar dos veces una misma señal.
#[derive(Default)]
pub struct SymbolTable {
    pins: IndexMap<Identifier, Location>,
    drivers: IndexMap<Identifier, (Symbol, Location)>,
}

impl SymbolTable {
    /// Agrega un símbolo, fallando si ya existía en el mismo espacio.
    pub fn declare(&mut self, name: &Located<Identifier>, symbol: Symbol) -> Semantic<()> {
        let (location, id) = name.clone().split();
        let previous = match symbol {
            Symbol::Pin => self
                .pins
                .get(&id)
                .map(|previous| SemanticError::PinRedeclared(id.clone(), previous.line())),

            _ => self
                .drivers
                .get(&id)
                .map(|(_, previous)| SemanticError::Redriven(id.clone(), previous.line())),
        };

        if let Some(error) = previous {
            return Err(Located::at(error, location));
        }

        trace!(name = %id, %symbol, "declared");
        match symbol {
            Symbol::Pin => {
                self.pins.insert(id, location);
            }

            _ => {
                self.drivers.insert(id, (symbol, location));
            }
        }

        Ok(())
    }

    /// Busca un nombre.
    ///
    /// Para pines de salida se retorna la clase de la ecuación que
    /// los asigna, ya que es esta la que define su valor.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        match self.drivers.get(name) {
            Some(&(symbol, _)) => Some(symbol),
            None => self.pins.get(name).map(|_| Symbol::Pin),
        }
    }

    /// Determina si un nombre está definido en cualquier espacio.
    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// Verifica un programa completo y construye su representación validada.
#[tracing::instrument(skip_all, fields(source = %source.name()))]
pub fn check(source: &Rc<Source>) -> Result<Program, Diagnostic> {
    let mut checker = Checker::default();
    for line in source.lines().filter(|line| !line.is_blank()) {
        checker.line(line.trim())?;
    }

    let program = checker.resolve()?;
    debug!(
        pins = program.pins.len(),
        combinational = program.combinational.len(),
        sequential = program.sequential.len(),
        "check passed"
    );

    Ok(program)
}

/// Construye un programa a partir de código que podría ser inválido.
///
/// Las líneas sin forma reconocible se ignoran, y las ecuaciones cuyo
/// lado derecho no se puede analizar quedan sin expresión. El resultado
/// solo tiene sentido lógico si [`check()`] fue exitoso sobre el mismo
/// código.
#[tracing::instrument(skip_all, fields(source = %source.name()))]
pub fn salvage(source: &Rc<Source>) -> Program {
    let mut program = Program::default();

    for line in source.lines().filter(|line| !line.is_blank()).map(Snippet::trim) {
        let line_number = line.line();
        let equation = |target: Located<Identifier>, rhs| Equation {
            target: target.into_inner(),
            rhs: parse::expression(rhs).ok(),
            line: line_number,
        };

        match classify(line) {
            Some(Shape::Pin { name, number }) => match number.text().parse::<u8>() {
                Ok(number) => program.pins.push(Pin {
                    name: name.into_inner(),
                    number,
                    line: line_number,
                }),

                Err(_) => debug!(line = line_number, "ignoring out-of-range pin number"),
            },

            Some(Shape::Sequential { register, rhs }) => {
                program.sequential.push(equation(register, rhs))
            }

            Some(Shape::Combinational { target, rhs }) => {
                program.combinational.push(equation(target, rhs))
            }

            None => debug!(line = line_number, "ignoring line with invalid syntax"),
        }
    }

    program
}

#[derive(Default)]
struct Checker {
    table: SymbolTable,
    references: IndexMap<Identifier, Location>,
    program: Program,
}

impl Checker {
    /// Primera pasada, para una línea recortada y no vacía.
    fn line(&mut self, line: Snippet<'_>) -> Result<(), Diagnostic> {
        let shape = classify(line)
            .ok_or_else(|| diagnose(Located::at(SemanticError::InvalidSyntax, line.location())))?;

        match shape {
            Shape::Pin { name, number: digits } => {
                let number = match digits.text().parse::<u8>() {
                    Ok(number) => number,
                    Err(_) => {
                        let error = SemanticError::PinNumber {
                            name: name.into_inner(),
                            number: digits.text().to_owned(),
                        };

                        return Err(diagnose(Located::at(error, digits.location())));
                    }
                };

                self.table.declare(&name, Symbol::Pin).map_err(diagnose)?;
                self.program.pins.push(Pin {
                    name: name.into_inner(),
                    number,
                    line: line.line(),
                });
            }

            Shape::Sequential { register, rhs } => {
                let equation = self.equation(register, rhs, Symbol::Register)?;
                self.program.sequential.push(equation);
            }

            Shape::Combinational { target, rhs } => {
                let equation = self.equation(target, rhs, Symbol::Combinational)?;
                self.program.combinational.push(equation);
            }
        }

        Ok(())
    }

    fn equation(
        &mut self,
        target: Located<Identifier>,
        rhs: Snippet<'_>,
        symbol: Symbol,
    ) -> Result<Equation, Diagnostic> {
        let line = rhs.line();
        let rhs = parse::expression(rhs)?;

        self.table.declare(&target, symbol).map_err(diagnose)?;

        // Solo cuenta la primera aparición de cada nombre
        for read in rhs.reads() {
            let name = read.as_ref();
            if !Operator::is_operator_name(name.as_ref()) && !self.references.contains_key(name) {
                self.references.insert(name.clone(), read.location().clone());
            }
        }

        Ok(Equation {
            target: target.into_inner(),
            rhs: Some(rhs),
            line,
        })
    }

    /// Segunda pasada.
    fn resolve(self) -> Result<Program, Diagnostic> {
        for (name, location) in &self.references {
            if !self.table.is_defined(name.as_ref()) {
                let error = SemanticError::Undefined(name.clone());
                return Err(diagnose(Located::at(error, location.clone())));
            }
        }

        Ok(self.program)
    }
}

fn diagnose(error: Located<SemanticError>) -> Diagnostic {
    let kind = match error.as_ref() {
        SemanticError::InvalidSyntax => "Syntax error",
        _ => "Semantic error",
    };

    Diagnostic::from(error).kind(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn check_str(text: &str) -> Result<Program, String> {
        check_err(text).map_err(|error| error.summary())
    }

    fn check_err(text: &str) -> Result<Program, Diagnostic> {
        check(&Source::new("test.seq", text))
    }

    #[test]
    fn blank_sources_are_valid() {
        assert!(check_str("").unwrap().is_empty());
        assert!(check_str("  \n\t\n\n").unwrap().is_empty());
    }

    #[test]
    fn accepts_a_complete_program() {
        let program = check_str(indoc! {"
            pin a = 2
            pin b = 3
            pin y = 9
            pin q1 = 10

            f1 = AND(a, b)
            y = XOR(f1, q1)
            q1.D = NOT(q1)
        "})
        .unwrap();

        assert_eq!(program.pins.len(), 4);
        assert_eq!(program.combinational.len(), 2);
        assert_eq!(program.sequential.len(), 1);
        assert_eq!(program.sequential[0].target.as_ref(), "q1");
        assert_eq!(program.combinational[1].line, 7);
    }

    #[test]
    fn undefined_symbols_are_reported() {
        assert_eq!(
            check_str("pin y = 3\ny = f1").unwrap_err(),
            "Line 2: Symbol 'f1' is used but never declared as a pin or defined on the left-hand side"
        );
    }

    #[test]
    fn symbols_may_be_defined_after_use() {
        assert!(check_str("a = b\nb = c\npin c = 2").is_ok());
    }

    #[test]
    fn first_undefined_symbol_by_line_wins() {
        let error = check_err("zeta = omega\nalpha = beta\n").unwrap_err();
        assert_eq!(error.line(), 1);
        assert!(error.message().contains("'omega'"));

        let error = check_err("y = AND(m, n)\nz = NOT(n)\n").unwrap_err();
        assert!(error.message().contains("'m'"));
    }

    #[test]
    fn undefined_symbols_cite_their_first_use() {
        let error = check_err("pin x = 1\ny = x\nz = NOT(w)\nv = w\n").unwrap_err();
        assert_eq!(error.summary().split(':').next(), Some("Line 3"));
        assert_eq!(error.location().start().column(), 9);
    }

    #[test]
    fn arity_errors_abort_the_check() {
        assert_eq!(
            check_str("pin a = 1\ny = AND(a)").unwrap_err(),
            "Line 2: AND must have exactly 2 arguments, got 1"
        );
    }

    #[test]
    fn syntax_errors_stop_before_semantics() {
        // La línea 1 tiene un símbolo indefinido, pero el error de sintaxis
        // de la línea 2 se reporta primero
        assert_eq!(check_str("y = undefined\nthis is wrong").unwrap_err(), "Line 2: Invalid syntax");
    }

    #[test]
    fn only_the_first_error_is_reported() {
        assert_eq!(
            check_str("y = $\nz = NOT(a, b)").unwrap_err(),
            "Line 1: Invalid character '$' in expression"
        );
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = |depth| format!("pin a = 1\ny = {}a{}", "NOT(".repeat(depth), ")".repeat(depth));

        assert!(check_str(&deep(parse::MAX_DEPTH)).is_ok());
        assert_eq!(
            check_str(&deep(parse::MAX_DEPTH + 1)).unwrap_err(),
            format!("Line 2: Expression is nested deeper than {} calls", parse::MAX_DEPTH)
        );

        let error = check_err(&deep(5000)).unwrap_err();
        assert!(error.to_string().starts_with("Syntax error: "));
    }

    #[test]
    fn operator_names_are_not_references() {
        assert!(check_str("pin a = 1\ny = NOT(a)\nz = nOt(y)").is_ok());
    }

    #[test]
    fn pin_numbers_fit_in_a_byte() {
        let program = check_str("pin a = 0\npin b = 255\npin c = 007").unwrap();
        let numbers: Vec<_> = program.pins.iter().map(|pin| pin.number).collect();
        assert_eq!(numbers, vec![0, 255, 7]);

        assert_eq!(
            check_str("pin a = 1\npin x = 300").unwrap_err(),
            "Line 2: Pin number 300 for 'x' is out of range (0 to 255)"
        );

        let error = check_err("pin x = 4294967296").unwrap_err();
        assert_eq!(error.location().start().column(), 9);
        assert!(error.message().contains("4294967296"));
    }

    #[test]
    fn duplicate_pins_are_rejected() {
        assert_eq!(
            check_str("pin a = 1\npin a = 2").unwrap_err(),
            "Line 2: Pin 'a' is already declared on line 1"
        );
    }

    #[test]
    fn signals_have_a_single_driver() {
        assert_eq!(
            check_str("pin a = 1\ny = a\ny = NOT(a)").unwrap_err(),
            "Line 3: Signal 'y' is already driven on line 2"
        );

        assert_eq!(
            check_str("pin a = 1\nq1 = a\nq1.D = a").unwrap_err(),
            "Line 3: Signal 'q1' is already driven on line 2"
        );
    }

    #[test]
    fn pins_may_be_driven() {
        assert!(check_str("pin a = 1\npin q = 2\nq.D = a").is_ok());
    }

    #[test]
    fn target_names_are_not_restricted() {
        // Cualquier identificador es válido, aunque coincida con nombres
        // del lenguaje objetivo o del sketch generado
        assert!(check_str("pin HIGH = 3\npin byte = 2\nword = HIGH\nrising = byte").is_ok());
        assert!(check_str("pin a = 1\nq.D = a\nD_q = a\nPIN_a = a").is_ok());
        assert!(check_str("pin y = 1\ny = and").is_ok());
    }

    #[test]
    fn symbol_table_tracks_namespaces() {
        let source = Source::new("test.seq", "pin y = 1\ny = x\nq.D = y");
        let located = |line: usize, range| {
            let snippet = source.lines().nth(line).unwrap().slice(range);
            Located::at(Identifier::from(snippet.text()), snippet.location())
        };

        let mut table = SymbolTable::default();
        table.declare(&located(0, 4..5), Symbol::Pin).unwrap();
        assert_eq!(table.lookup("y"), Some(Symbol::Pin));

        table.declare(&located(1, 0..1), Symbol::Combinational).unwrap();
        assert_eq!(table.lookup("y"), Some(Symbol::Combinational));

        table.declare(&located(2, 0..1), Symbol::Register).unwrap();
        assert_eq!(table.lookup("q"), Some(Symbol::Register));
        assert!(!table.is_defined("x"));
    }

    #[test]
    fn salvage_keeps_what_it_can() {
        let program = salvage(&Source::new(
            "test.seq",
            "pin a = 1\npin b = 256\nnonsense here\ny = AND(a)\nz = NOT(a)\nq.D = ???",
        ));

        assert_eq!(program.pins.len(), 1);
        assert_eq!(program.combinational.len(), 2);
        assert!(program.combinational[0].rhs.is_none());
        assert!(program.combinational[1].rhs.is_some());
        assert!(program.sequential[0].rhs.is_none());
    }
}
