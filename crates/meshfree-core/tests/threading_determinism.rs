use meshfree::core::expr::node::Expression;
use meshfree::core::math::tensor::Tensor;
use meshfree::core::models::domain::{Boundary, Domain};
use meshfree::core::models::ids::{FieldId, ParticleSystemId};
use meshfree::core::models::workspace::Workspace;
use meshfree::engine::config::{ChunkPolicy, SolverConfig, SolverConfigBuilder};
use meshfree::engine::equation::{Equation, Target};
use meshfree::engine::solver::Solver;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Setup {
    workspace: Workspace,
    system: ParticleSystemId,
    mass: FieldId,
    density: FieldId,
    gradient: FieldId,
}

fn setup() -> Setup {
    let mut rng = StdRng::seed_from_u64(42);
    let domain = Domain::new(
        &[0.0, 0.0],
        &[6.0, 6.0],
        &[0.5],
        &[Boundary::Periodic, Boundary::Mirror],
    )
    .unwrap();
    let positions: Vec<_> = (0..500)
        .map(|_| Point3::new(rng.random_range(0.0..6.0), rng.random_range(0.0..6.0), 0.0))
        .collect();
    let masses: Vec<f64> = (0..500).map(|_| rng.random_range(0.5..1.5)).collect();

    let mut workspace = Workspace::new();
    let system = workspace
        .add_particle_system("fluid", domain, positions)
        .unwrap();
    let mass = workspace
        .add_field("mass", system, Tensor::scalar(0.0))
        .unwrap();
    for (i, &m) in masses.iter().enumerate() {
        workspace
            .field_mut(mass)
            .unwrap()
            .set_value(i, Tensor::scalar(m))
            .unwrap();
    }
    let density = workspace
        .add_field("rho", system, Tensor::scalar(0.0))
        .unwrap();
    let gradient = workspace
        .add_field("grad_rho", system, Tensor::new(2, 1))
        .unwrap();
    workspace.update_space(system).unwrap();
    Setup {
        workspace,
        system,
        mass,
        density,
        gradient,
    }
}

fn equations(setup: &Setup) -> Vec<Equation> {
    let h = || Expression::named_constant("h", 0.25);
    let mut density =
        Expression::interaction("sph_density", vec![Expression::Field(setup.mass), h()]).unwrap();
    density.assign(setup.system);
    let volume = Expression::Field(setup.mass) / Expression::Field(setup.density);
    let mut gradient = Expression::interaction(
        "sph_gradient",
        vec![Expression::Field(setup.density), volume, h()],
    )
    .unwrap();
    gradient.assign(setup.system);
    vec![
        Equation::new("density", Target::Field(setup.density), density),
        Equation::new("gradient", Target::Field(setup.gradient), gradient),
    ]
}

fn solve_with(config: SolverConfig) -> Vec<Vec<f64>> {
    let mut setup = setup();
    let solver = Solver::new(config).unwrap();
    for equation in equations(&setup) {
        solver.solve(&mut setup.workspace, &equation).unwrap();
    }
    [setup.density, setup.gradient]
        .iter()
        .flat_map(|&id| {
            setup
                .workspace
                .field(id)
                .unwrap()
                .values()
                .iter()
                .map(|value| value.elements())
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn results_are_bit_identical_across_thread_counts() {
    let serial = solve_with(SolverConfigBuilder::new().num_threads(1).build().unwrap());
    let parallel = solve_with(SolverConfigBuilder::new().num_threads(8).build().unwrap());
    let chunked = solve_with(SolverConfig {
        num_threads: 3,
        chunk_policy: ChunkPolicy::Fixed(7),
    });

    assert_eq!(serial.len(), 1000);
    for (a, b) in serial.iter().zip(&parallel) {
        let a_bits: Vec<u64> = a.iter().map(|x| x.to_bits()).collect();
        let b_bits: Vec<u64> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }
    assert_eq!(serial, chunked);
    assert!(serial.iter().flatten().all(|x| x.is_finite()));
}
