//! Simulación hospedada.
//!
//! Ejecuta un programa validado con exactamente la misma semántica que
//! el ciclo `loop()` emitido por [`crate::codegen`], sin necesidad de
//! hardware. Cada llamada a [`Simulator::step()`] corresponde a una
//! iteración del ciclo con un nivel de reloj muestreado.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::trace;

use crate::{
    ir::{Direction, Program},
    lex::Identifier,
    parse::{Expr, Operator},
};

#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimError {
    #[error("'{0}' is not an input pin")]
    NotAnInput(String),
}

/// Evalúa una expresión, dado el valor actual de cada señal.
pub fn evaluate<F>(expr: &Expr, value: &F) -> bool
where
    F: Fn(&str) -> bool,
{
    match expr {
        Expr::Read(id) => value(id.as_ref().as_ref()),
        Expr::Call { operator, args } => {
            let arg = |index: usize| args.get(index).map_or(false, |arg| evaluate(arg, value));

            match operator.as_ref() {
                Operator::Not => !arg(0),
                Operator::And => arg(0) && arg(1),
                Operator::Or => arg(0) || arg(1),
                Operator::Xor => arg(0) ^ arg(1),
            }
        }
    }
}

/// Estado de una placa que ejecuta el sketch generado.
pub struct Simulator<'a> {
    program: &'a Program,
    directions: BTreeMap<Identifier, Direction>,
    signals: BTreeMap<Identifier, bool>,
    next: BTreeMap<Identifier, bool>,
    levels: BTreeMap<Identifier, bool>,
    clock: bool,
}

impl<'a> Simulator<'a> {
    /// Equivale a `setup()`: todas las señales en 0 y el nivel de
    /// reloj inicial capturado.
    pub fn new(program: &'a Program, clock: bool) -> Self {
        let directions = program
            .directions()
            .into_iter()
            .map(|(name, direction)| (name.clone(), direction))
            .collect();

        Simulator {
            program,
            directions,
            signals: low(program.signals()),
            next: low(program.registers()),
            levels: low(program.pin_map().into_keys()),
            clock,
        }
    }

    /// Fija el nivel eléctrico de un pin de entrada.
    pub fn set_input(&mut self, name: &str, high: bool) -> Result<(), SimError> {
        match self.directions.get(name) {
            Some(Direction::Input) => {
                if let Some(level) = self.levels.get_mut(name) {
                    *level = high;
                }

                Ok(())
            }

            _ => Err(SimError::NotAnInput(name.to_owned())),
        }
    }

    /// Ejecuta una iteración del ciclo con el reloj en el nivel dado.
    ///
    /// Retorna si se detectó un flanco de subida.
    pub fn step(&mut self, clock: bool) -> bool {
        let rising = !self.clock && clock;
        self.clock = clock;

        for (name, _) in self.pins(Direction::Input) {
            let level = self.levels.get(&name).copied().unwrap_or(false);
            self.signals.insert(name, level);
        }

        // Cada ecuación combinacional ve los valores recién calculados
        // de las anteriores
        let program = self.program;
        for equation in &program.combinational {
            let value = self.eval(equation.rhs.as_ref());
            self.signals.insert(equation.target.clone(), value);
        }

        for equation in &program.sequential {
            let value = self.eval(equation.rhs.as_ref());
            self.next.insert(equation.target.clone(), value);
        }

        if rising {
            trace!("rising edge");
            for (register, value) in &self.next {
                self.signals.insert(register.clone(), *value);
            }
        }

        for (name, _) in self.pins(Direction::Output) {
            let value = self.signal(name.as_ref()).unwrap_or(false);
            self.levels.insert(name, value);
        }

        rising
    }

    /// Valor actual de una señal.
    pub fn signal(&self, name: &str) -> Option<bool> {
        self.signals.get(name).copied()
    }

    /// Nivel eléctrico actual de un pin.
    pub fn pin(&self, name: &str) -> Option<bool> {
        self.levels.get(name).copied()
    }

    fn pins(&self, wanted: Direction) -> Vec<(Identifier, Direction)> {
        self.directions
            .iter()
            .filter(|&(_, &direction)| direction == wanted)
            .map(|(name, &direction)| (name.clone(), direction))
            .collect()
    }

    fn eval(&self, expr: Option<&Expr>) -> bool {
        let value = |name: &str| self.signals.get(name).copied().unwrap_or(false);
        expr.map_or(false, |expr| evaluate(expr, &value))
    }
}

fn low<'a, I>(names: I) -> BTreeMap<Identifier, bool>
where
    I: IntoIterator<Item = &'a Identifier>,
{
    names.into_iter().map(|name| (name.clone(), false)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{semantic::check, source::Source};
    use indoc::indoc;

    fn program(text: &str) -> Program {
        check(&Source::new("test.seq", text)).unwrap()
    }

    fn truth_table(operator: &str) -> Vec<bool> {
        let program = program(&format!("pin a = 1\npin b = 2\npin y = 3\ny = {}(a, b)", operator));
        let mut sim = Simulator::new(&program, false);

        [(false, false), (false, true), (true, false), (true, true)]
            .iter()
            .map(|&(a, b)| {
                sim.set_input("a", a).unwrap();
                sim.set_input("b", b).unwrap();
                sim.step(false);

                sim.pin("y").unwrap()
            })
            .collect()
    }

    #[test]
    fn binary_operators() {
        assert_eq!(truth_table("AND"), vec![false, false, false, true]);
        assert_eq!(truth_table("OR"), vec![false, true, true, true]);
        assert_eq!(truth_table("XOR"), vec![false, true, true, false]);
    }

    #[test]
    fn negation() {
        let program = program("pin a = 1\npin y = 2\ny = NOT(a)");
        let mut sim = Simulator::new(&program, false);

        sim.step(false);
        assert_eq!(sim.pin("y"), Some(true));

        sim.set_input("a", true).unwrap();
        sim.step(false);
        assert_eq!(sim.pin("y"), Some(false));
    }

    #[test]
    fn only_inputs_can_be_set() {
        let program = program("pin a = 1\npin y = 2\ny = a");
        let mut sim = Simulator::new(&program, false);

        assert_eq!(sim.set_input("y", true), Err(SimError::NotAnInput("y".into())));
        assert_eq!(sim.set_input("z", true), Err(SimError::NotAnInput("z".into())));
    }

    #[test]
    fn toggle_flips_once_per_rising_edge() {
        let program = program("pin q1 = 9\nq1.D = NOT(q1)");
        let mut sim = Simulator::new(&program, false);

        let clock = [true, true, false, false, true, false, true, true];
        let mut seen = Vec::new();

        for &level in &clock {
            let rising = sim.step(level);
            seen.push((rising, sim.signal("q1").unwrap()));
        }

        assert_eq!(
            seen,
            vec![
                (true, true),
                (false, true),
                (false, true),
                (false, true),
                (true, false),
                (false, false),
                (true, true),
                (false, true),
            ]
        );

        assert_eq!(sim.pin("q1"), Some(true));
    }

    #[test]
    fn initial_high_clock_is_not_an_edge() {
        let program = program("pin q1 = 9\nq1.D = NOT(q1)");
        let mut sim = Simulator::new(&program, true);

        assert!(!sim.step(true));
        assert_eq!(sim.signal("q1"), Some(false));
    }

    #[test]
    fn registers_update_simultaneously() {
        let program = program(indoc! {"
            pin d = 1
            q1.D = d
            q2.D = q1
        "});

        let mut sim = Simulator::new(&program, false);
        sim.set_input("d", true).unwrap();

        sim.step(true);
        assert_eq!((sim.signal("q1"), sim.signal("q2")), (Some(true), Some(false)));

        sim.step(false);
        sim.step(true);
        assert_eq!((sim.signal("q1"), sim.signal("q2")), (Some(true), Some(true)));
    }

    #[test]
    fn combinational_equations_run_in_file_order() {
        let program = program("a = b\nb = c\npin c = 2");
        let mut sim = Simulator::new(&program, false);
        sim.set_input("c", true).unwrap();

        // `a` lee el valor de `b` previo a esta iteración
        sim.step(false);
        assert_eq!((sim.signal("a"), sim.signal("b")), (Some(false), Some(true)));

        sim.step(false);
        assert_eq!(sim.signal("a"), Some(true));
    }
}
