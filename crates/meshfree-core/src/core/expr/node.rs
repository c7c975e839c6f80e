use super::display::ExpressionDisplay;
use super::error::EvalError;
use super::interaction::Interaction;
use super::operator::{Operator, OperatorKind};
use crate::core::math::tensor::Tensor;
use crate::core::models::field::TimeLevel;
use crate::core::models::ids::{FieldId, PairListId, ParticleSystemId, VariableId};
use crate::core::models::workspace::{Symbol, Workspace};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A literal value, optionally carrying the name it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    name: Option<String>,
    value: Tensor,
}

impl Constant {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }
}

/// A node of an expression tree.
///
/// Every node exclusively owns its operands, so `clone` yields an independent
/// deep copy. Leaves referencing workspace storage hold handles, not data.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Constant),
    Variable(VariableId),
    Field(FieldId),
    /// The positions of a particle system.
    Positions(ParticleSystemId),
    Operator(Operator),
    Interaction(Interaction),
}

impl Expression {
    pub fn constant(value: impl Into<Tensor>) -> Self {
        Expression::Constant(Constant {
            name: None,
            value: value.into(),
        })
    }

    pub fn named_constant(name: impl Into<String>, value: impl Into<Tensor>) -> Self {
        Expression::Constant(Constant {
            name: Some(name.into()),
            value: value.into(),
        })
    }

    /// A leaf referring to the workspace symbol bound to `name`.
    pub fn symbol(workspace: &Workspace, name: &str) -> Result<Self, EvalError> {
        match workspace.lookup(name)? {
            Symbol::Field(id) => Ok(Expression::Field(id)),
            Symbol::Variable(id) => Ok(Expression::Variable(id)),
            Symbol::System(id) => Ok(Expression::Positions(id)),
            Symbol::Pairs(_) => Err(EvalError::InvalidArgument {
                name: name.to_string(),
                reason: "a pair list has no value".to_string(),
            }),
        }
    }

    pub fn operator(kind: OperatorKind, operands: Vec<Expression>) -> Result<Self, EvalError> {
        Ok(Expression::Operator(Operator::new(kind, operands)?))
    }

    /// A catalogue function such as `sqrt` or `if`.
    pub fn function(name: &str, operands: Vec<Expression>) -> Result<Self, EvalError> {
        Ok(Expression::Operator(Operator::function(name, operands)?))
    }

    /// A catalogue interaction such as `sph_density`; unassigned until [`Expression::assign`].
    pub fn interaction(name: &str, operands: Vec<Expression>) -> Result<Self, EvalError> {
        Ok(Expression::Interaction(Interaction::named(name, operands)?))
    }

    fn binary(kind: OperatorKind, lhs: Expression, rhs: Expression) -> Self {
        Expression::Operator(Operator::from_parts(kind, vec![lhs, rhs]))
    }

    pub fn term_product(self, rhs: Expression) -> Self {
        Self::binary(OperatorKind::TermProduct, self, rhs)
    }

    pub fn pow(self, rhs: Expression) -> Self {
        Self::binary(OperatorKind::Power, self, rhs)
    }

    pub fn children(&self) -> &[Expression] {
        match self {
            Expression::Operator(op) => op.operands(),
            Expression::Interaction(interaction) => interaction.operands(),
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> &mut [Expression] {
        match self {
            Expression::Operator(op) => op.operands_mut(),
            Expression::Interaction(interaction) => interaction.operands_mut(),
            _ => &mut [],
        }
    }

    /// Evaluates the node for particle `i`.
    ///
    /// A field with a single member broadcasts it to every particle. The
    /// branches of `if` are evaluated lazily.
    pub fn evaluate(
        &self,
        workspace: &Workspace,
        i: usize,
        level: TimeLevel,
    ) -> Result<Tensor, EvalError> {
        match self {
            Expression::Constant(constant) => Ok(constant.value.clone()),
            Expression::Variable(id) => Ok(workspace.variable(*id)?.value(level)?.clone()),
            Expression::Field(id) => {
                let field = workspace.field(*id)?;
                let index = if field.len() == 1 { 0 } else { i };
                Ok(field.value(index, level)?.clone())
            }
            Expression::Positions(id) => Ok(workspace.system(*id)?.position_tensor(i, level)?),
            Expression::Operator(op) if op.kind() == OperatorKind::If => {
                let [condition, then, otherwise] = op.operands() else {
                    return Err(EvalError::Arity {
                        name: OperatorKind::If.name().to_string(),
                        expected: 3,
                        found: op.operands().len(),
                    });
                };
                if condition.evaluate(workspace, i, level)?.is_truthy()? {
                    then.evaluate(workspace, i, level)
                } else {
                    otherwise.evaluate(workspace, i, level)
                }
            }
            Expression::Operator(op) => {
                let args = op
                    .operands()
                    .iter()
                    .map(|operand| operand.evaluate(workspace, i, level))
                    .collect::<Result<Vec<_>, _>>()?;
                op.kind().apply(&args)
            }
            Expression::Interaction(interaction) => interaction.evaluate(workspace, i, level),
        }
    }

    /// Number of particles the node ranges over: 1 for particle-independent nodes.
    pub fn field_size(&self, workspace: &Workspace) -> Result<usize, EvalError> {
        match self {
            Expression::Constant(_) | Expression::Variable(_) => Ok(1),
            Expression::Field(id) => Ok(workspace.field(*id)?.len()),
            Expression::Positions(id) => Ok(workspace.system(*id)?.len()),
            Expression::Interaction(interaction) => match interaction.system() {
                Some(id) => Ok(workspace.system(id)?.len()),
                None => max_field_size(self.children(), workspace),
            },
            Expression::Operator(_) => max_field_size(self.children(), workspace),
        }
    }

    /// Whether every interaction in the tree is bound and every leaf handle is live.
    pub fn is_assigned(&self, workspace: &Workspace) -> bool {
        let own = match self {
            Expression::Constant(_) | Expression::Operator(_) => true,
            Expression::Variable(id) => workspace.variable(*id).is_ok(),
            Expression::Field(id) => workspace.field(*id).is_ok(),
            Expression::Positions(id) => workspace.contains_system(*id),
            Expression::Interaction(interaction) => interaction.is_bound(workspace),
        };
        own && self
            .children()
            .iter()
            .all(|child| child.is_assigned(workspace))
    }

    /// Binds every interaction in the tree to `system`, depth first.
    pub fn assign(&mut self, system: ParticleSystemId) {
        if let Expression::Interaction(interaction) = self {
            interaction.assign(system);
        }
        for child in self.children_mut() {
            child.assign(system);
        }
    }

    /// Binds every pair-list interaction in the tree to `pairs`.
    pub fn assign_pairs(&mut self, pairs: PairListId) {
        if let Expression::Interaction(interaction) = self {
            if interaction.kind().uses_pairs() {
                interaction.assign_pairs(pairs);
            }
        }
        for child in self.children_mut() {
            child.assign_pairs(pairs);
        }
    }

    /// Enables or disables previous-step storage on every symbol the tree reads.
    pub fn double_steps(&self, workspace: &mut Workspace, enabled: bool) -> Result<(), EvalError> {
        match self {
            Expression::Variable(id) => workspace.variable_mut(*id)?.double_steps(enabled),
            Expression::Field(id) => workspace.field_mut(*id)?.double_steps(enabled),
            Expression::Positions(id) => workspace.system_mut(*id)?.double_steps(enabled),
            _ => {}
        }
        for child in self.children() {
            child.double_steps(workspace, enabled)?;
        }
        Ok(())
    }

    /// Infix rendering using the names bound in `workspace`.
    pub fn display<'a>(&'a self, workspace: &'a Workspace) -> ExpressionDisplay<'a> {
        ExpressionDisplay::new(self, workspace)
    }
}

fn max_field_size(children: &[Expression], workspace: &Workspace) -> Result<usize, EvalError> {
    children.iter().try_fold(1, |size, child| {
        Ok(size.max(child.field_size(workspace)?))
    })
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::constant(value)
    }
}

impl Add for Expression {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        Expression::binary(OperatorKind::Add, self, rhs)
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        Expression::binary(OperatorKind::Subtract, self, rhs)
    }
}

impl Mul for Expression {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        Expression::binary(OperatorKind::Multiply, self, rhs)
    }
}

impl Div for Expression {
    type Output = Expression;

    fn div(self, rhs: Expression) -> Expression {
        Expression::binary(OperatorKind::Divide, self, rhs)
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::Operator(Operator::from_parts(OperatorKind::Negate, vec![self]))
    }
}
