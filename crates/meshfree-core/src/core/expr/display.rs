use super::node::Expression;
use super::operator::{Notation, OperatorKind};
use crate::core::models::workspace::Workspace;
use std::fmt;

/// Infix rendering of an expression, resolving handles to their names.
pub struct ExpressionDisplay<'a> {
    expr: &'a Expression,
    workspace: &'a Workspace,
}

impl<'a> ExpressionDisplay<'a> {
    pub fn new(expr: &'a Expression, workspace: &'a Workspace) -> Self {
        Self { expr, workspace }
    }
}

impl fmt::Display for ExpressionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expression(f, self.expr, self.workspace)
    }
}

fn binding(expr: &Expression) -> Option<u8> {
    match expr {
        Expression::Operator(op) => match op.kind().notation() {
            Notation::Infix(_, strength) => Some(strength),
            _ => None,
        },
        _ => None,
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    expr: &Expression,
    workspace: &Workspace,
    parenthesize: bool,
) -> fmt::Result {
    if parenthesize {
        write!(f, "(")?;
        write_expression(f, expr, workspace)?;
        write!(f, ")")
    } else {
        write_expression(f, expr, workspace)
    }
}

fn write_call(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    operands: &[Expression],
    workspace: &Workspace,
) -> fmt::Result {
    write!(f, "{name}(")?;
    for (k, operand) in operands.iter().enumerate() {
        if k > 0 {
            write!(f, ", ")?;
        }
        write_expression(f, operand, workspace)?;
    }
    write!(f, ")")
}

fn write_expression(
    f: &mut fmt::Formatter<'_>,
    expr: &Expression,
    workspace: &Workspace,
) -> fmt::Result {
    const UNBOUND: &str = "<unbound>";
    match expr {
        Expression::Constant(constant) => match constant.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", constant.value()),
        },
        Expression::Variable(id) => match workspace.variable(*id) {
            Ok(variable) => write!(f, "{}", variable.name()),
            Err(_) => write!(f, "{UNBOUND}"),
        },
        Expression::Field(id) => match workspace.field(*id) {
            Ok(field) => write!(f, "{}", field.name()),
            Err(_) => write!(f, "{UNBOUND}"),
        },
        Expression::Positions(id) => match workspace.system(*id) {
            Ok(system) => write!(f, "{}", system.name()),
            Err(_) => write!(f, "{UNBOUND}"),
        },
        Expression::Interaction(interaction) => write_call(
            f,
            interaction.kind().name(),
            interaction.operands(),
            workspace,
        ),
        Expression::Operator(op) => {
            let operands = op.operands();
            match op.kind().notation() {
                Notation::Prefix(symbol) => {
                    write!(f, "{symbol}")?;
                    write_operand(f, &operands[0], workspace, binding(&operands[0]).is_some())
                }
                Notation::Infix(symbol, strength) => {
                    let right_associative = op.kind() == OperatorKind::Power;
                    let left_paren = binding(&operands[0]).is_some_and(|child| {
                        child < strength || (right_associative && child == strength)
                    });
                    let right_paren = binding(&operands[1]).is_some_and(|child| {
                        child < strength || (!right_associative && child == strength)
                    });
                    write_operand(f, &operands[0], workspace, left_paren)?;
                    write!(f, " {symbol} ")?;
                    write_operand(f, &operands[1], workspace, right_paren)
                }
                Notation::Call(name) => write_call(f, name, operands, workspace),
            }
        }
    }
}
