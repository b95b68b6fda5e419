//! Programa validado.
//!
//! Esta es la representación que comparten el generador de código y
//! el simulador. Conserva el orden de declaración de las ecuaciones,
//! el cual es semánticamente significativo: una ecuación combinacional
//! puede leer el valor recién calculado de otra anterior.

use std::collections::{BTreeMap, BTreeSet};

use crate::{lex::Identifier, parse::Expr};

#[derive(Debug, Default)]
pub struct Program {
    pub pins: Vec<Pin>,
    pub combinational: Vec<Equation>,
    pub sequential: Vec<Equation>,
}

/// Declaración `pin NOMBRE = NÚMERO`.
#[derive(Debug, Clone)]
pub struct Pin {
    pub name: Identifier,
    pub number: u8,
    pub line: u32,
}

/// Una ecuación, combinacional o secuencial.
#[derive(Debug, Clone)]
pub struct Equation {
    pub target: Identifier,

    /// Lado derecho. Solo es `None` en programas recuperados de código
    /// inválido, ver [`crate::semantic::salvage()`].
    pub rhs: Option<Expr>,

    pub line: u32,
}

/// Dirección de un pin físico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Program {
    /// Determina si el programa no declara nada.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty() && self.combinational.is_empty() && self.sequential.is_empty()
    }

    /// Números de pin por nombre, ordenados por nombre.
    ///
    /// Si un nombre se declara más de una vez, prevalece la última.
    pub fn pin_map(&self) -> BTreeMap<&Identifier, u8> {
        self.pins.iter().map(|pin| (&pin.name, pin.number)).collect()
    }

    /// Nombres asignados por alguna ecuación.
    pub fn driven(&self) -> BTreeSet<&Identifier> {
        self.equations().map(|equation| &equation.target).collect()
    }

    /// Nombres de registros, ordenados.
    pub fn registers(&self) -> BTreeSet<&Identifier> {
        self.sequential.iter().map(|equation| &equation.target).collect()
    }

    /// Toda señal del programa: pines, salidas combinacionales y registros.
    pub fn signals(&self) -> BTreeSet<&Identifier> {
        let mut signals = self.driven();
        signals.extend(self.pins.iter().map(|pin| &pin.name));
        signals
    }

    /// Clasifica los pines declarados.
    ///
    /// Un pin es entrada si y solo si ninguna ecuación lo asigna, sin
    /// importar el orden de declaración.
    pub fn directions(&self) -> BTreeMap<&Identifier, Direction> {
        let driven = self.driven();

        self.pin_map()
            .into_keys()
            .map(|name| {
                let direction = if driven.contains(name) {
                    Direction::Output
                } else {
                    Direction::Input
                };

                (name, direction)
            })
            .collect()
    }

    /// Pines de entrada, ordenados por nombre.
    pub fn inputs(&self) -> Vec<&Identifier> {
        self.with_direction(Direction::Input)
    }

    /// Pines de salida, ordenados por nombre.
    pub fn outputs(&self) -> Vec<&Identifier> {
        self.with_direction(Direction::Output)
    }

    fn with_direction(&self, wanted: Direction) -> Vec<&Identifier> {
        self.directions()
            .into_iter()
            .filter(|&(_, direction)| direction == wanted)
            .map(|(name, _)| name)
            .collect()
    }

    fn equations(&self) -> impl Iterator<Item = &Equation> {
        self.combinational.iter().chain(self.sequential.iter())
    }
}
