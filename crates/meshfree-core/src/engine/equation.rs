use super::error::EngineError;
use crate::core::expr::error::EvalError;
use crate::core::expr::node::Expression;
use crate::core::math::tensor::Tensor;
use crate::core::models::field::TimeLevel;
use crate::core::models::ids::{FieldId, ParticleSystemId, VariableId};
use crate::core::models::workspace::{Symbol, Workspace, WorkspaceError};
use std::ops::Range;

/// The mutable symbol an equation writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Field(FieldId),
    Variable(VariableId),
    /// The positions of a particle system; writing expires its grid.
    Positions(ParticleSystemId),
}

impl Target {
    /// Resolves the symbol bound to `name`.
    pub fn from_symbol(workspace: &Workspace, name: &str) -> Result<Self, EngineError> {
        match workspace.lookup(name)? {
            Symbol::Field(id) => Ok(Target::Field(id)),
            Symbol::Variable(id) => Ok(Target::Variable(id)),
            Symbol::System(id) => Ok(Target::Positions(id)),
            Symbol::Pairs(_) => Err(EvalError::InvalidArgument {
                name: name.to_string(),
                reason: "a pair list cannot be assigned to".to_string(),
            }
            .into()),
        }
    }

    /// Number of slots the target holds.
    pub fn field_size(&self, workspace: &Workspace) -> Result<usize, WorkspaceError> {
        match *self {
            Target::Field(id) => Ok(workspace.field(id)?.len()),
            Target::Variable(id) => workspace.variable(id).map(|_| 1),
            Target::Positions(id) => Ok(workspace.system(id)?.len()),
        }
    }

    /// Rejects a value the target could not store, without writing it.
    fn check(&self, workspace: &Workspace, value: &Tensor) -> Result<(), WorkspaceError> {
        match *self {
            Target::Field(id) => workspace.field(id)?.check_value(value)?,
            Target::Variable(id) => {
                workspace.variable(id)?;
            }
            Target::Positions(id) => workspace.system(id)?.check_position(value)?,
        }
        Ok(())
    }

    fn write(&self, workspace: &mut Workspace, index: usize, value: Tensor) -> Result<(), WorkspaceError> {
        match *self {
            Target::Field(id) => workspace.field_mut(id)?.set_value(index, value)?,
            Target::Variable(id) => workspace.variable_mut(id)?.set_value(value),
            Target::Positions(id) => workspace.system_mut(id)?.set_position(index, &value)?,
        }
        Ok(())
    }

    fn double_steps(&self, workspace: &mut Workspace, enabled: bool) -> Result<(), WorkspaceError> {
        match *self {
            Target::Field(id) => workspace.field_mut(id)?.double_steps(enabled),
            Target::Variable(id) => workspace.variable_mut(id)?.double_steps(enabled),
            Target::Positions(id) => workspace.system_mut(id)?.double_steps(enabled),
        }
        Ok(())
    }
}

/// A conditional per-particle assignment `target = rhs if condition`.
///
/// Evaluation and commit are separate steps: [`Equation::evaluate_range`]
/// only reads the workspace, so any number of ranges can be evaluated
/// concurrently, and [`Equation::commit`] writes the collected values in
/// index order afterwards. Every read of a step therefore observes the
/// values from before the equation ran.
#[derive(Debug, Clone)]
pub struct Equation {
    name: String,
    target: Target,
    rhs: Expression,
    condition: Option<Expression>,
}

impl Equation {
    pub fn new(name: impl Into<String>, target: Target, rhs: Expression) -> Self {
        Self {
            name: name.into(),
            target,
            rhs,
            condition: None,
        }
    }

    /// Only particles for which `condition` is truthy are assigned.
    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn rhs(&self) -> &Expression {
        &self.rhs
    }

    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    /// Number of slots the equation assigns.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InconsistentFieldSize`] unless the right-hand side
    /// and the condition each range over either one value or exactly as many
    /// values as the target holds.
    pub fn field_size(&self, workspace: &Workspace) -> Result<usize, EngineError> {
        let lhs = self.target.field_size(workspace)?;
        let operands = std::iter::once(&self.rhs).chain(self.condition.as_ref());
        for expression in operands {
            let rhs = expression.field_size(workspace)?;
            if rhs != lhs && rhs != 1 {
                return Err(EngineError::InconsistentFieldSize {
                    equation: self.name.clone(),
                    lhs,
                    rhs,
                });
            }
        }
        Ok(lhs)
    }

    /// Evaluates the right-hand side over `range` without touching the workspace.
    ///
    /// # Return
    ///
    /// One entry per index in `range`: the value to commit, or `None` where
    /// the condition is false.
    pub fn evaluate_range(
        &self,
        workspace: &Workspace,
        range: Range<usize>,
    ) -> Result<Vec<Option<Tensor>>, EvalError> {
        range
            .map(|i| self.evaluate_at(workspace, i))
            .collect()
    }

    fn evaluate_at(&self, workspace: &Workspace, i: usize) -> Result<Option<Tensor>, EvalError> {
        if let Some(condition) = &self.condition {
            if !condition.evaluate(workspace, i, TimeLevel::Current)?.is_truthy()? {
                return Ok(None);
            }
        }
        self.rhs
            .evaluate(workspace, i, TimeLevel::Current)
            .map(Some)
    }

    /// Writes evaluated values into the target, index by index.
    ///
    /// Every value is checked against the target before the first write, so a
    /// failed commit leaves the target untouched.
    ///
    /// # Return
    ///
    /// The number of slots actually assigned.
    pub fn commit(
        &self,
        workspace: &mut Workspace,
        values: Vec<Option<Tensor>>,
    ) -> Result<usize, EngineError> {
        let size = self.target.field_size(workspace)?;
        if values.len() != size {
            return Err(EngineError::InconsistentFieldSize {
                equation: self.name.clone(),
                lhs: size,
                rhs: values.len(),
            });
        }
        for value in values.iter().flatten() {
            self.target.check(workspace, value)?;
        }

        let mut assigned = 0;
        for (index, value) in values.into_iter().enumerate() {
            if let Some(value) = value {
                self.target.write(workspace, index, value)?;
                assigned += 1;
            }
        }
        Ok(assigned)
    }

    /// Enables or disables previous-step storage on the target and every symbol the equation reads.
    pub fn double_steps(&self, workspace: &mut Workspace, enabled: bool) -> Result<(), EngineError> {
        self.target.double_steps(workspace, enabled)?;
        self.rhs.double_steps(workspace, enabled)?;
        if let Some(condition) = &self.condition {
            condition.double_steps(workspace, enabled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::operator::OperatorKind;
    use crate::core::models::domain::Domain;
    use crate::core::models::field::StorageError;
    use nalgebra::Point3;

    fn setup() -> (Workspace, ParticleSystemId, FieldId) {
        let mut workspace = Workspace::new();
        let domain = Domain::new(&[0.0], &[4.0], &[1.0], &[]).unwrap();
        let positions = (0..4).map(|k| Point3::new(k as f64 + 0.5, 0.0, 0.0)).collect();
        let system = workspace
            .add_particle_system("particles", domain, positions)
            .unwrap();
        let field = workspace
            .add_field("f", system, Tensor::scalar(0.0))
            .unwrap();
        (workspace, system, field)
    }

    fn run(equation: &Equation, workspace: &mut Workspace) -> usize {
        let size = equation.field_size(workspace).unwrap();
        let values = equation.evaluate_range(workspace, 0..size).unwrap();
        equation.commit(workspace, values).unwrap()
    }

    #[test]
    fn particle_independent_rhs_is_broadcast() {
        let (mut workspace, _, field) = setup();
        let equation = Equation::new("init", Target::Field(field), Expression::constant(2.5));
        assert_eq!(run(&equation, &mut workspace), 4);
        assert!(
            workspace
                .field(field)
                .unwrap()
                .values()
                .iter()
                .all(|v| v.value().unwrap() == 2.5)
        );
    }

    #[test]
    fn condition_masks_assignment() {
        let (mut workspace, system, field) = setup();
        let x = Expression::function(
            "component",
            vec![Expression::Positions(system), Expression::constant(0.0)],
        )
        .unwrap();
        let condition =
            Expression::operator(OperatorKind::Greater, vec![x, Expression::constant(2.0)]).unwrap();
        let equation = Equation::new("mask", Target::Field(field), Expression::constant(1.0))
            .with_condition(condition);
        assert_eq!(run(&equation, &mut workspace), 2);
        let values: Vec<f64> = workspace
            .field(field)
            .unwrap()
            .values()
            .iter()
            .map(|v| v.value().unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let (mut workspace, _, field) = setup();
        let domain = Domain::new(&[0.0], &[4.0], &[1.0], &[]).unwrap();
        let other = workspace
            .add_particle_system("others", domain, vec![Point3::origin(); 3])
            .unwrap();
        let equation = Equation::new("bad", Target::Field(field), Expression::Positions(other));
        assert!(matches!(
            equation.field_size(&workspace),
            Err(EngineError::InconsistentFieldSize { lhs: 4, rhs: 3, .. })
        ));
    }

    #[test]
    fn variable_target_takes_a_single_value() {
        let (mut workspace, _, field) = setup();
        let total = workspace.add_variable("total", Tensor::scalar(0.0)).unwrap();
        let target = Target::from_symbol(&workspace, "total").unwrap();
        assert_eq!(target, Target::Variable(total));

        let equation = Equation::new("sum", target, Expression::Field(field));
        assert!(matches!(
            equation.field_size(&workspace),
            Err(EngineError::InconsistentFieldSize { lhs: 1, rhs: 4, .. })
        ));

        let equation = Equation::new("set", target, Expression::constant(3.0));
        assert_eq!(run(&equation, &mut workspace), 1);
        assert_eq!(
            workspace
                .variable(total)
                .unwrap()
                .value(TimeLevel::Current)
                .unwrap()
                .value()
                .unwrap(),
            3.0
        );
    }

    #[test]
    fn writing_positions_expires_the_grid() {
        let (mut workspace, system, _) = setup();
        workspace.update_space(system).unwrap();
        let shifted = Expression::Positions(system) + Expression::constant(0.25);
        let equation = Equation::new("move", Target::Positions(system), shifted);
        assert_eq!(run(&equation, &mut workspace), 4);
        let particles = workspace.system(system).unwrap();
        assert!(!particles.space().is_up_to_date());
        assert!((particles.positions()[0].x - 0.75).abs() < 1e-12);
    }

    fn vector_where_x_exceeds_two(system: ParticleSystemId) -> Expression {
        let x = Expression::function(
            "component",
            vec![Expression::Positions(system), Expression::constant(0.0)],
        )
        .unwrap();
        let condition =
            Expression::operator(OperatorKind::Greater, vec![x, Expression::constant(2.0)]).unwrap();
        Expression::function(
            "if",
            vec![
                condition,
                Expression::constant(Tensor::vector(&[1.0, 2.0])),
                Expression::constant(5.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejected_commit_leaves_the_target_untouched() {
        let (mut workspace, system, field) = setup();
        let equation = Equation::new("mixed", Target::Field(field), vector_where_x_exceeds_two(system));
        let size = equation.field_size(&workspace).unwrap();
        let values = equation.evaluate_range(&workspace, 0..size).unwrap();

        let result = equation.commit(&mut workspace, values);
        assert!(matches!(
            result,
            Err(EngineError::Workspace(WorkspaceError::Storage(
                StorageError::ShapeMismatch { .. }
            )))
        ));
        assert!(
            workspace
                .field(field)
                .unwrap()
                .values()
                .iter()
                .all(|v| v.value().unwrap() == 0.0)
        );
    }

    #[test]
    fn commit_rejects_a_value_count_other_than_the_target_size() {
        let (mut workspace, _, field) = setup();
        let equation = Equation::new("short", Target::Field(field), Expression::constant(1.0));
        let values = vec![Some(Tensor::scalar(1.0)); 3];
        assert!(matches!(
            equation.commit(&mut workspace, values),
            Err(EngineError::InconsistentFieldSize { lhs: 4, rhs: 3, .. })
        ));
    }

    #[test]
    fn pair_lists_are_not_targets() {
        use crate::core::pairs::list::LongRangePairs;
        let (mut workspace, system, _) = setup();
        workspace
            .add_pair_list(system, LongRangePairs::new("bonds", &[]).unwrap())
            .unwrap();
        assert!(matches!(
            Target::from_symbol(&workspace, "bonds"),
            Err(EngineError::Eval(EvalError::InvalidArgument { .. }))
        ));
        assert!(matches!(
            Target::from_symbol(&workspace, "missing"),
            Err(EngineError::Workspace(WorkspaceError::UndefinedSymbol(_)))
        ));
    }
}
