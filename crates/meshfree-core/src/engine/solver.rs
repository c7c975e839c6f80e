use super::config::SolverConfig;
use super::equation::Equation;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::math::tensor::Tensor;
use crate::core::models::workspace::Workspace;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Runs equations over a persistent pool of worker threads.
///
/// Each solve cuts the target's index range into contiguous slices according
/// to the configured [`ChunkPolicy`](super::config::ChunkPolicy), evaluates
/// every slice against the unmodified workspace and then commits all values in
/// index order. The result is identical for any thread count.
pub struct Solver {
    config: SolverConfig,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl Solver {
    /// Builds the worker pool once; it is reused by every solve.
    pub fn new(config: SolverConfig) -> Result<Self, EngineError> {
        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|index| format!("meshfree-worker-{index}"))
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;

        info!(
            threads = config.num_threads,
            policy = ?config.chunk_policy,
            "Solver worker pool ready."
        );

        Ok(Self {
            config,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    /// Evaluates `equation` for every index of its target without writing anything.
    pub fn evaluate(
        &self,
        workspace: &Workspace,
        equation: &Equation,
    ) -> Result<Vec<Option<Tensor>>, EngineError> {
        let size = equation.field_size(workspace)?;
        let slices = self
            .config
            .chunk_policy
            .slices(size, self.config.num_threads);

        #[cfg(feature = "parallel")]
        let parts = self.pool.install(|| {
            slices
                .into_par_iter()
                .map(|range| equation.evaluate_range(workspace, range))
                .collect::<Result<Vec<_>, _>>()
        })?;
        #[cfg(not(feature = "parallel"))]
        let parts = slices
            .into_iter()
            .map(|range| equation.evaluate_range(workspace, range))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(parts.into_iter().flatten().collect())
    }

    /// Evaluates and commits one equation.
    ///
    /// # Return
    ///
    /// The number of slots whose condition held and that were assigned.
    #[instrument(skip_all, name = "equation_solve", fields(equation = %equation.name()))]
    pub fn solve(&self, workspace: &mut Workspace, equation: &Equation) -> Result<usize, EngineError> {
        let values = self.evaluate(workspace, equation)?;
        let size = values.len();
        let assigned = equation.commit(workspace, values)?;
        debug!(
            size,
            assigned,
            threads = self.config.num_threads,
            "Equation committed."
        );
        Ok(assigned)
    }

    /// Solves `equations` one after another in declaration order.
    pub fn solve_all(
        &self,
        workspace: &mut Workspace,
        equations: &[Equation],
        reporter: &ProgressReporter,
    ) -> Result<usize, EngineError> {
        reporter.report(Progress::TaskStart {
            total_steps: equations.len() as u64,
        });
        let mut total = 0;
        for equation in equations {
            let assigned = self.solve(workspace, equation)?;
            reporter.report(Progress::EquationSolved {
                name: equation.name().to_string(),
                assigned,
            });
            reporter.report(Progress::TaskIncrement);
            total += assigned;
        }
        reporter.report(Progress::TaskFinish);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::node::Expression;
    use crate::core::expr::operator::OperatorKind;
    use crate::core::models::domain::{Boundary, Domain};
    use crate::core::models::ids::ParticleSystemId;
    use crate::engine::config::{ChunkPolicy, SolverConfigBuilder};
    use crate::engine::equation::Target;
    use nalgebra::Point3;
    use std::sync::Mutex;

    fn solver(threads: usize) -> Solver {
        Solver::new(SolverConfigBuilder::new().num_threads(threads).build().unwrap()).unwrap()
    }

    fn lattice(n: usize) -> (Workspace, ParticleSystemId) {
        let mut workspace = Workspace::new();
        let domain = Domain::new(
            &[0.0, 0.0],
            &[n as f64, n as f64],
            &[1.0],
            &[Boundary::Periodic, Boundary::Periodic],
        )
        .unwrap();
        let positions = (0..n * n)
            .map(|k| Point3::new((k % n) as f64 + 0.5, (k / n) as f64 + 0.5, 0.0))
            .collect();
        let system = workspace
            .add_particle_system("lattice", domain, positions)
            .unwrap();
        (workspace, system)
    }

    #[test]
    fn every_index_is_evaluated_exactly_once() {
        let (mut workspace, system) = lattice(5);
        let field = workspace
            .add_field("x", system, Tensor::scalar(0.0))
            .unwrap();
        let rhs = Expression::function(
            "component",
            vec![Expression::Positions(system), Expression::constant(1.0)],
        )
        .unwrap();
        let equation = Equation::new("y", Target::Field(field), rhs);
        let solver = Solver::new(SolverConfig {
            num_threads: 3,
            chunk_policy: ChunkPolicy::Fixed(4),
        })
        .unwrap();
        assert_eq!(solver.solve(&mut workspace, &equation).unwrap(), 25);
        let values = workspace.field(field).unwrap().values();
        for (k, value) in values.iter().enumerate() {
            assert_eq!(value.value().unwrap(), (k / 5) as f64 + 0.5);
        }
    }

    #[test]
    fn reads_observe_values_from_before_the_solve() {
        let (mut workspace, system) = lattice(4);
        workspace.update_space(system).unwrap();
        // Moving positions would expire the grid if writes were interleaved
        // with neighbor reads.
        let mut count = Expression::interaction("neighbor_count", vec![Expression::constant(1.1)])
            .unwrap();
        count.assign(system);
        let rhs = Expression::Positions(system) + count * Expression::constant(0.0);
        let equation = Equation::new("noop_move", Target::Positions(system), rhs);
        assert_eq!(solver(4).solve(&mut workspace, &equation).unwrap(), 16);
    }

    #[test]
    fn solve_all_runs_in_declaration_order_and_reports() {
        let (mut workspace, system) = lattice(2);
        let field = workspace
            .add_field("f", system, Tensor::scalar(0.0))
            .unwrap();
        let equations = vec![
            Equation::new("first", Target::Field(field), Expression::constant(1.0)),
            Equation::new(
                "second",
                Target::Field(field),
                Expression::Field(field) * Expression::constant(3.0),
            ),
        ];
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::EquationSolved { name, .. } = event {
                events.lock().unwrap().push(name);
            }
        }));
        let total = solver(2)
            .solve_all(&mut workspace, &equations, &reporter)
            .unwrap();
        drop(reporter);
        assert_eq!(total, 8);
        assert_eq!(events.into_inner().unwrap(), vec!["first", "second"]);
        assert!(
            workspace
                .field(field)
                .unwrap()
                .values()
                .iter()
                .all(|v| v.value().unwrap() == 3.0)
        );
    }

    #[test]
    fn commit_errors_abort_without_writing() {
        let (mut workspace, system) = lattice(3);
        let field = workspace
            .add_field("f", system, Tensor::scalar(7.0))
            .unwrap();
        // The last row of particles evaluates to a vector.
        let y = Expression::function(
            "component",
            vec![Expression::Positions(system), Expression::constant(1.0)],
        )
        .unwrap();
        let rhs = Expression::function(
            "if",
            vec![
                Expression::operator(OperatorKind::Greater, vec![y, Expression::constant(2.0)])
                    .unwrap(),
                Expression::constant(Tensor::vector(&[1.0, 1.0])),
                Expression::constant(0.0),
            ],
        )
        .unwrap();
        let equation = Equation::new("partly_vector", Target::Field(field), rhs);
        let solver = solver(2);
        assert_eq!(solver.evaluate(&workspace, &equation).unwrap().len(), 9);
        assert!(solver.solve(&mut workspace, &equation).is_err());
        assert!(
            workspace
                .field(field)
                .unwrap()
                .values()
                .iter()
                .all(|v| v.value().unwrap() == 7.0)
        );
    }

    #[test]
    fn evaluation_errors_abort_without_writing() {
        let (mut workspace, system) = lattice(3);
        let field = workspace
            .add_field("f", system, Tensor::scalar(7.0))
            .unwrap();
        let mut count = Expression::interaction("neighbor_count", vec![Expression::constant(1.0)])
            .unwrap();
        count.assign(system);
        let equation = Equation::new("stale", Target::Field(field), count);
        assert!(solver(2).solve(&mut workspace, &equation).is_err());
        assert!(
            workspace
                .field(field)
                .unwrap()
                .values()
                .iter()
                .all(|v| v.value().unwrap() == 7.0)
        );
    }
}
