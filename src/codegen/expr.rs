use std::fmt::{self, Display};

use crate::{
    ir::Equation,
    parse::{Expr, Operator},
};

/// Expresión en sintaxis C sobre señales de valor 0/1.
///
/// Cada operando se rodea de paréntesis, de manera que la precedencia
/// de operadores en C nunca altera el significado.
pub struct CExpr<'a>(pub &'a Expr);

/// Lado derecho de una ecuación, o `0` si no pudo analizarse.
pub fn rhs(equation: &Equation) -> impl Display + '_ {
    Rhs(equation.rhs.as_ref())
}

struct Rhs<'a>(Option<&'a Expr>);

impl Display for Rhs<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(expr) => CExpr(expr).fmt(fmt),
            None => fmt.write_str("0"),
        }
    }
}

impl Display for CExpr<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (operator, args) = match self.0 {
            Expr::Read(id) => return id.as_ref().fmt(fmt),
            Expr::Call { operator, args } => (*operator.as_ref(), args.as_slice()),
        };

        match (operator, args) {
            (Operator::Not, [arg]) => write!(fmt, "(!({}))", CExpr(arg)),
            (Operator::And, [lhs, rhs]) => binary(fmt, lhs, "&&", rhs),
            (Operator::Or, [lhs, rhs]) => binary(fmt, lhs, "||", rhs),
            (Operator::Xor, [lhs, rhs]) => binary(fmt, lhs, "^", rhs),

            // El parser nunca construye llamadas con aridad incorrecta
            _ => fmt.write_str("0"),
        }
    }
}

fn binary(fmt: &mut fmt::Formatter<'_>, lhs: &Expr, op: &str, rhs: &Expr) -> fmt::Result {
    write!(fmt, "(({}) {} ({}))", CExpr(lhs), op, CExpr(rhs))
}
