use meshfree::core::expr::node::Expression;
use meshfree::core::math::tensor::Tensor;
use meshfree::core::models::domain::{Boundary, Domain};
use meshfree::core::models::field::TimeLevel;
use meshfree::core::models::particles::ParticleSystem;
use meshfree::core::models::workspace::Workspace;
use meshfree::core::space::grid::SpaceError;
use meshfree::core::space::guide::Wrap;
use meshfree::engine::tasks::neighbors::brute_force_counts;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

fn scatter(domain: &Domain, n: usize, seed: u64) -> Vec<Point3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dims = domain.dimensions();
    (0..n)
        .map(|_| {
            let mut p = Point3::origin();
            for axis in 0..dims {
                p[axis] = rng.random_range(domain.minimum()[axis]..domain.maximum()[axis]);
            }
            p
        })
        .collect()
}

fn grid_neighbors(system: &ParticleSystem, i: usize, radius: f64) -> BTreeSet<usize> {
    let mut found = BTreeSet::new();
    system
        .for_each_neighbor::<_, SpaceError>(i, radius, |neighbor| {
            let is_self = neighbor.j == i && !neighbor.guide.is_wrapped();
            if !is_self && !neighbor.guide.is_mirrored() && neighbor.distance < radius {
                found.insert(neighbor.j);
            }
            Ok(())
        })
        .unwrap();
    found
}

fn brute_force_neighbors(system: &ParticleSystem, i: usize, radius: f64) -> BTreeSet<usize> {
    let positions = system.positions();
    (0..positions.len())
        .filter(|&j| {
            j != i
                && system
                    .domain()
                    .displacement(&positions[i], &positions[j])
                    .norm()
                    < radius
        })
        .collect()
}

fn assert_grid_matches_brute_force(domain: Domain, n: usize, radius: f64, seed: u64) {
    let positions = scatter(&domain, n, seed);
    let mut system = ParticleSystem::new("cloud", domain, positions);
    system.update_space();
    for i in 0..n {
        assert_eq!(
            grid_neighbors(&system, i, radius),
            brute_force_neighbors(&system, i, radius),
            "neighbor sets differ for particle {i}"
        );
    }
}

#[test]
fn open_square_matches_brute_force() {
    let domain = Domain::new(&[0.0, 0.0], &[10.0, 10.0], &[1.0], &[]).unwrap();
    assert_grid_matches_brute_force(domain, 400, 1.0, 1);
}

#[test]
fn periodic_square_matches_brute_force() {
    let domain = Domain::new(
        &[0.0, 0.0],
        &[10.0, 10.0],
        &[1.0],
        &[Boundary::Periodic, Boundary::Periodic],
    )
    .unwrap();
    assert_grid_matches_brute_force(domain, 400, 1.0, 2);
}

#[test]
fn radius_wider_than_a_cell_matches_brute_force() {
    let domain = Domain::new(
        &[-2.0, 0.0],
        &[6.0, 8.0],
        &[0.5],
        &[Boundary::Periodic, Boundary::Open],
    )
    .unwrap();
    assert_grid_matches_brute_force(domain, 300, 1.3, 3);
}

#[test]
fn mixed_boundaries_in_three_dimensions_match_brute_force() {
    let domain = Domain::new(
        &[0.0, 0.0, 0.0],
        &[5.0, 4.0, 3.0],
        &[1.0],
        &[Boundary::Periodic, Boundary::Open, Boundary::Periodic],
    )
    .unwrap();
    assert_grid_matches_brute_force(domain, 300, 0.9, 4);
}

#[test]
fn mirror_walls_do_not_add_real_neighbors() {
    let domain = Domain::new(
        &[0.0, 0.0],
        &[6.0, 6.0],
        &[1.0],
        &[Boundary::Mirror, Boundary::Mirror],
    )
    .unwrap();
    assert_grid_matches_brute_force(domain, 200, 1.0, 5);
}

/// Per-axis reflection code: 0 untouched, -1 lower wall, 1 upper wall.
type Ghost = (usize, i8, i8);

fn wrap_code(wrap: Wrap) -> i8 {
    match wrap {
        Wrap::MirrorLower => -1,
        Wrap::MirrorUpper => 1,
        Wrap::None | Wrap::Periodic => 0,
    }
}

fn grid_ghosts(system: &ParticleSystem, i: usize, radius: f64) -> Vec<Ghost> {
    let mut found = Vec::new();
    system
        .for_each_neighbor::<_, SpaceError>(i, radius, |neighbor| {
            if neighbor.guide.is_mirrored() && neighbor.distance < radius {
                found.push((
                    neighbor.j,
                    wrap_code(neighbor.guide.axis(0)),
                    wrap_code(neighbor.guide.axis(1)),
                ));
            }
            Ok(())
        })
        .unwrap();
    found.sort();
    found
}

fn brute_force_ghosts(system: &ParticleSystem, i: usize, radius: f64) -> Vec<Ghost> {
    let domain = system.domain();
    let positions = system.positions();
    let reflect = |x: f64, axis: usize, code: i8| match code {
        -1 => 2.0 * domain.minimum()[axis] - x,
        1 => 2.0 * domain.maximum()[axis] - x,
        _ => x,
    };
    let mut found = Vec::new();
    for (j, xj) in positions.iter().enumerate() {
        for cx in [-1i8, 0, 1] {
            for cy in [-1i8, 0, 1] {
                if cx == 0 && cy == 0 {
                    continue;
                }
                let image = Point3::new(reflect(xj.x, 0, cx), reflect(xj.y, 1, cy), 0.0);
                if (positions[i] - image).norm() < radius {
                    found.push((j, cx, cy));
                }
            }
        }
    }
    found.sort();
    found
}

#[test]
fn mirror_ghosts_match_reflected_images_on_untiled_domain() {
    // Neither side is a whole number of requested cells.
    let domain = Domain::new(
        &[0.0, 0.3],
        &[9.5, 7.0],
        &[1.0],
        &[Boundary::Mirror, Boundary::Mirror],
    )
    .unwrap();
    let positions = scatter(&domain, 300, 7);
    let mut system = ParticleSystem::new("cloud", domain, positions);
    system.update_space();
    for radius in [0.6, 1.0, 2.3] {
        for i in 0..system.len() {
            assert_eq!(
                grid_ghosts(&system, i, radius),
                brute_force_ghosts(&system, i, radius),
                "ghost images differ for particle {i} at radius {radius}"
            );
        }
    }
}

#[test]
fn untiled_mirror_domain_real_neighbors_match_brute_force() {
    let domain = Domain::new(
        &[0.0, 0.0],
        &[9.5, 6.2],
        &[1.0],
        &[Boundary::Mirror, Boundary::Open],
    )
    .unwrap();
    assert_grid_matches_brute_force(domain, 250, 1.0, 8);
}

#[test]
fn brute_force_counts_agree_with_neighbor_sets() {
    let domain = Domain::new(
        &[0.0, 0.0],
        &[8.0, 8.0],
        &[1.0],
        &[Boundary::Periodic, Boundary::Periodic],
    )
    .unwrap();
    let positions = scatter(&domain, 150, 6);
    let mut system = ParticleSystem::new("cloud", domain, positions);
    system.update_space();
    let counts = brute_force_counts(&system, 1.2);
    for (i, &count) in counts.iter().enumerate() {
        assert_eq!(count, grid_neighbors(&system, i, 1.2).len());
    }
}

#[test]
fn dem_contact_on_polydisperse_grains_matches_all_pairs_and_balances() {
    let domain = Domain::new(&[0.0, 0.0], &[8.0, 8.0], &[0.4], &[]).unwrap();
    let n = 150;
    let positions = scatter(&domain, n, 11);
    let mut rng = StdRng::seed_from_u64(12);
    let diameters: Vec<f64> = (0..n).map(|_| rng.random_range(0.2..1.6)).collect();

    let mut workspace = Workspace::new();
    let system = workspace
        .add_particle_system("grains", domain.clone(), positions.clone())
        .unwrap();
    let d = workspace
        .add_field("d", system, Tensor::scalar(0.0))
        .unwrap();
    for (i, &diameter) in diameters.iter().enumerate() {
        workspace
            .field_mut(d)
            .unwrap()
            .set_value(i, Tensor::scalar(diameter))
            .unwrap();
    }
    workspace.update_space(system).unwrap();
    let mut contact = Expression::interaction(
        "dem_contact",
        vec![Expression::Field(d), Expression::constant(1.0)],
    )
    .unwrap();
    contact.assign(system);

    let mut net = [0.0; 2];
    let mut touching = 0;
    for i in 0..n {
        let force = contact.evaluate(&workspace, i, TimeLevel::Current).unwrap();
        let mut expected = [0.0; 2];
        for j in (0..n).filter(|&j| j != i) {
            let relative = domain.displacement(&positions[i], &positions[j]);
            let distance = relative.norm();
            let overlap = 0.5 * (diameters[i] + diameters[j]) - distance;
            if overlap > 0.0 && distance > f64::EPSILON {
                touching += 1;
                for axis in 0..2 {
                    expected[axis] += relative[axis] / distance * overlap;
                }
            }
        }
        for axis in 0..2 {
            let got = force.get(axis).unwrap();
            assert!(
                (got - expected[axis]).abs() < 1e-9,
                "particle {i} axis {axis}: grid {got}, all pairs {}",
                expected[axis]
            );
            net[axis] += got;
        }
    }
    assert!(touching > 0);
    assert!(net.iter().all(|f| f.abs() < 1e-9), "net force {net:?}");
}
