use super::error::EvalError;
use super::kernels::{SUPPORT_FACTOR, cubic_spline, cubic_spline_gradient};
use super::node::Expression;
use crate::core::math::tensor::Tensor;
use crate::core::models::field::TimeLevel;
use crate::core::models::ids::{PairListId, ParticleSystemId};
use crate::core::models::particles::ParticleSystem;
use crate::core::models::workspace::Workspace;
use crate::core::space::guide::Guide;
use nalgebra::Vector3;
use phf::{Map, phf_map};

/// Interaction names accepted by [`Interaction::named`].
pub static INTERACTIONS: Map<&'static str, InteractionKind> = phf_map! {
    "neighbor_count" => InteractionKind::NeighborCount,
    "sph_sum" => InteractionKind::SphSum,
    "sph_density" => InteractionKind::SphDensity,
    "sph_gradient" => InteractionKind::SphGradient,
    "sph_laplacian" => InteractionKind::SphLaplacian,
    "dem_contact" => InteractionKind::DemContact,
    "lennard_jones" => InteractionKind::LennardJones,
    "bond_spring" => InteractionKind::BondSpring,
};

/// Payload column read by `bond_spring` as the rest length of each bond.
pub const REST_LENGTH_PAYLOAD: &str = "initial_length";

/// Lennard-Jones cutoff in units of `sigma`.
const LENNARD_JONES_CUTOFF: f64 = 2.5;

/// Regularisation of the SPH Laplacian denominator, in units of `h^2`.
const LAPLACIAN_EPSILON: f64 = 0.01;

/// The closed set of pairwise interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    /// `neighbor_count(radius)`: real neighbors closer than `radius`.
    NeighborCount,
    /// `sph_sum(f, h)`: kernel-weighted sum of `f`, self included.
    SphSum,
    /// `sph_density(mass, h)`: kernel-weighted mass sum, self included.
    SphDensity,
    /// `sph_gradient(f, volume, h)`: difference-form gradient of `f`.
    SphGradient,
    /// `sph_laplacian(f, volume, h)`: Brookshaw Laplacian of `f`.
    SphLaplacian,
    /// `dem_contact(diameter, stiffness)`: linear-spring normal contact force.
    DemContact,
    /// `lennard_jones(epsilon, sigma)`: 12-6 force truncated at 2.5 sigma.
    LennardJones,
    /// `bond_spring(stiffness)`: Hookean force along the bonds of a pair list.
    BondSpring,
}

impl InteractionKind {
    pub fn name(self) -> &'static str {
        match self {
            InteractionKind::NeighborCount => "neighbor_count",
            InteractionKind::SphSum => "sph_sum",
            InteractionKind::SphDensity => "sph_density",
            InteractionKind::SphGradient => "sph_gradient",
            InteractionKind::SphLaplacian => "sph_laplacian",
            InteractionKind::DemContact => "dem_contact",
            InteractionKind::LennardJones => "lennard_jones",
            InteractionKind::BondSpring => "bond_spring",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            InteractionKind::NeighborCount | InteractionKind::BondSpring => 1,
            InteractionKind::SphSum
            | InteractionKind::SphDensity
            | InteractionKind::DemContact
            | InteractionKind::LennardJones => 2,
            InteractionKind::SphGradient | InteractionKind::SphLaplacian => 3,
        }
    }

    /// Whether the interaction walks a pair list instead of the grid.
    pub fn uses_pairs(self) -> bool {
        matches!(self, InteractionKind::BondSpring)
    }
}

/// Everything a contribution function knows about one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairContext {
    pub i: usize,
    pub j: usize,
    /// `x_i - x_j`, measured to the wrapped or reflected image of `j`.
    pub relative: Vector3<f64>,
    pub distance: f64,
    pub cell_size: Vector3<f64>,
    pub guide: Guide,
}

impl PairContext {
    /// True for the particle itself, as opposed to one of its images.
    pub fn is_self(&self) -> bool {
        self.i == self.j && !self.guide.is_wrapped()
    }
}

/// An operator that folds a per-pair contribution over nearby particles.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    kind: InteractionKind,
    operands: Vec<Expression>,
    system: Option<ParticleSystemId>,
    pairs: Option<PairListId>,
}

impl Interaction {
    pub fn new(kind: InteractionKind, operands: Vec<Expression>) -> Result<Self, EvalError> {
        if operands.len() != kind.arity() {
            return Err(EvalError::Arity {
                name: kind.name().to_string(),
                expected: kind.arity(),
                found: operands.len(),
            });
        }
        Ok(Self {
            kind,
            operands,
            system: None,
            pairs: None,
        })
    }

    /// Builds a catalogue interaction by name.
    pub fn named(name: &str, operands: Vec<Expression>) -> Result<Self, EvalError> {
        let kind = INTERACTIONS
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        Self::new(kind, operands)
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    pub fn operands(&self) -> &[Expression] {
        &self.operands
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Expression] {
        &mut self.operands
    }

    pub fn system(&self) -> Option<ParticleSystemId> {
        self.system
    }

    pub fn pairs(&self) -> Option<PairListId> {
        self.pairs
    }

    pub fn assign(&mut self, system: ParticleSystemId) {
        self.system = Some(system);
    }

    pub fn assign_pairs(&mut self, pairs: PairListId) {
        self.pairs = Some(pairs);
    }

    /// Whether the bindings this interaction needs are live in `workspace`.
    pub fn is_bound(&self, workspace: &Workspace) -> bool {
        let system_ok = self.system.is_some_and(|id| workspace.contains_system(id));
        let pairs_ok = !self.kind.uses_pairs()
            || self.pairs.is_some_and(|id| workspace.pairs(id).is_ok());
        system_ok && pairs_ok
    }

    fn bound_system<'a>(&self, workspace: &'a Workspace) -> Result<&'a ParticleSystem, EvalError> {
        let id = self
            .system
            .ok_or_else(|| EvalError::NotAssigned(self.kind.name().to_string()))?;
        workspace
            .system(id)
            .map_err(|_| EvalError::NotAssigned(self.kind.name().to_string()))
    }

    /// Upper bound of the `dem_contact` diameter operand over the system.
    ///
    /// Particle-independent diameters and plain fields are answered without a
    /// scan; any other expression is evaluated at every particle.
    fn largest_diameter(
        &self,
        workspace: &Workspace,
        system: &ParticleSystem,
        d_i: f64,
        level: TimeLevel,
    ) -> Result<f64, EvalError> {
        let diameter = &self.operands[0];
        if diameter.field_size(workspace)? == 1 {
            return Ok(d_i);
        }
        if let (Expression::Field(id), TimeLevel::Current) = (diameter, level) {
            if let Some(max) = workspace.field(*id)?.max_scalar() {
                return Ok(max.max(d_i));
            }
        }
        (0..system.len()).try_fold(d_i, |max, j| -> Result<f64, EvalError> {
            Ok(max.max(diameter.evaluate(workspace, j, level)?.value()?))
        })
    }

    /// Folds `contribute` over every grid candidate around particle `i`.
    ///
    /// The sum starts at `init`; candidates for which `contribute` returns
    /// `None` add nothing. Self-pairs and distance cutoffs are left to
    /// `contribute`.
    pub fn interact<F>(
        &self,
        workspace: &Workspace,
        i: usize,
        radius: f64,
        init: Tensor,
        mut contribute: F,
    ) -> Result<Tensor, EvalError>
    where
        F: FnMut(&PairContext) -> Result<Option<Tensor>, EvalError>,
    {
        let system = self.bound_system(workspace)?;
        let cell_size = *system.domain().cell_size();
        let mut total = init;
        system.for_each_neighbor::<_, EvalError>(i, radius, |neighbor| {
            let context = PairContext {
                i,
                j: neighbor.j,
                relative: neighbor.relative,
                distance: neighbor.distance,
                cell_size,
                guide: neighbor.guide,
            };
            if let Some(contribution) = contribute(&context)? {
                total = total.try_add(&contribution)?;
            }
            Ok(())
        })?;
        Ok(total)
    }

    pub fn evaluate(
        &self,
        workspace: &Workspace,
        i: usize,
        level: TimeLevel,
    ) -> Result<Tensor, EvalError> {
        let system = self.bound_system(workspace)?;
        let dimensions = system.dimensions();
        let operand = |k: usize, at: usize| self.operands[k].evaluate(workspace, at, level);
        let scalar_operand = |k: usize, at: usize| -> Result<f64, EvalError> {
            Ok(operand(k, at)?.value()?)
        };
        let vector = |v: Vector3<f64>| Tensor::from_vector3(&v, dimensions);

        match self.kind {
            InteractionKind::NeighborCount => {
                let radius = scalar_operand(0, i)?;
                self.interact(workspace, i, radius, Tensor::scalar(0.0), |pair| {
                    let counted =
                        !pair.is_self() && !pair.guide.is_mirrored() && pair.distance < radius;
                    Ok(counted.then(|| Tensor::scalar(1.0)))
                })
            }
            InteractionKind::SphSum => {
                let h = scalar_operand(1, i)?;
                let support = SUPPORT_FACTOR * h;
                let init = operand(0, i)?.zeros_like();
                self.interact(workspace, i, support, init, |pair| {
                    if pair.distance >= support {
                        return Ok(None);
                    }
                    let f_j = pair.guide.reflect_tensor(&operand(0, pair.j)?);
                    Ok(Some(f_j * cubic_spline(pair.distance, h, dimensions)))
                })
            }
            InteractionKind::SphDensity => {
                let h = scalar_operand(1, i)?;
                let support = SUPPORT_FACTOR * h;
                self.interact(workspace, i, support, Tensor::scalar(0.0), |pair| {
                    if pair.distance >= support {
                        return Ok(None);
                    }
                    let m_j = scalar_operand(0, pair.j)?;
                    Ok(Some(Tensor::scalar(
                        m_j * cubic_spline(pair.distance, h, dimensions),
                    )))
                })
            }
            InteractionKind::SphGradient => {
                let f_i = operand(0, i)?;
                let h = scalar_operand(2, i)?;
                let support = SUPPORT_FACTOR * h;
                let init = if f_i.numel() == 1 {
                    Tensor::new(dimensions, 1)
                } else {
                    Tensor::new(f_i.numel(), dimensions)
                };
                self.interact(workspace, i, support, init, |pair| {
                    if pair.is_self() || pair.distance >= support {
                        return Ok(None);
                    }
                    let f_j = pair.guide.reflect_tensor(&operand(0, pair.j)?);
                    let v_j = scalar_operand(1, pair.j)?;
                    let difference = f_j.try_sub(&f_i)? * v_j;
                    let gradient = vector(cubic_spline_gradient(&pair.relative, h, dimensions));
                    let term = if difference.numel() == 1 {
                        gradient.try_mul(&difference)?
                    } else {
                        let column = Tensor::vector(&difference.elements());
                        column.try_mul(&gradient.transpose())?
                    };
                    Ok(Some(term))
                })
            }
            InteractionKind::SphLaplacian => {
                let f_i = operand(0, i)?;
                let h = scalar_operand(2, i)?;
                let support = SUPPORT_FACTOR * h;
                let init = f_i.zeros_like();
                self.interact(workspace, i, support, init, |pair| {
                    if pair.is_self() || pair.distance >= support {
                        return Ok(None);
                    }
                    let f_j = pair.guide.reflect_tensor(&operand(0, pair.j)?);
                    let v_j = scalar_operand(1, pair.j)?;
                    let gradient = cubic_spline_gradient(&pair.relative, h, dimensions);
                    let weight = 2.0 * v_j * pair.relative.dot(&gradient)
                        / (pair.distance * pair.distance + LAPLACIAN_EPSILON * h * h);
                    Ok(Some(f_i.try_sub(&f_j)? * weight))
                })
            }
            InteractionKind::DemContact => {
                let d_i = scalar_operand(0, i)?;
                let k_i = scalar_operand(1, i)?;
                let d_max = self.largest_diameter(workspace, system, d_i, level)?;
                let init = Tensor::new(dimensions, 1);
                self.interact(workspace, i, 0.5 * (d_i + d_max), init, |pair| {
                    if pair.is_self() || pair.distance <= f64::EPSILON {
                        return Ok(None);
                    }
                    let d_j = scalar_operand(0, pair.j)?;
                    let overlap = 0.5 * (d_i + d_j) - pair.distance;
                    if overlap <= 0.0 {
                        return Ok(None);
                    }
                    let normal = pair.relative / pair.distance;
                    Ok(Some(vector(normal * (k_i * overlap))))
                })
            }
            InteractionKind::LennardJones => {
                let epsilon = scalar_operand(0, i)?;
                let sigma = scalar_operand(1, i)?;
                let cutoff = LENNARD_JONES_CUTOFF * sigma;
                let init = Tensor::new(dimensions, 1);
                self.interact(workspace, i, cutoff, init, |pair| {
                    if pair.is_self() || pair.distance <= f64::EPSILON || pair.distance >= cutoff
                    {
                        return Ok(None);
                    }
                    let s6 = (sigma / pair.distance).powi(6);
                    let magnitude = 24.0 * epsilon * (2.0 * s6 * s6 - s6)
                        / (pair.distance * pair.distance);
                    Ok(Some(vector(pair.relative * magnitude)))
                })
            }
            InteractionKind::BondSpring => {
                let list = self
                    .pairs
                    .ok_or_else(|| EvalError::PairsNotAssigned(self.kind.name().to_string()))?;
                let pairs = workspace.pairs(list)?;
                let rest_lengths = pairs.payload(REST_LENGTH_PAYLOAD)?;
                let k_i = scalar_operand(0, i)?;
                let x_i = system.position(i)?;
                let mut total = Tensor::new(dimensions, 1);
                for index in pairs.involving(i) {
                    let j = if pairs.first()[index] == i {
                        pairs.second()[index]
                    } else {
                        pairs.first()[index]
                    };
                    let relative = system.domain().displacement(x_i, system.position(j)?);
                    let distance = relative.norm();
                    if distance <= f64::EPSILON {
                        continue;
                    }
                    let stretch = distance - rest_lengths[index];
                    let force = relative * (-k_i * stretch / distance);
                    total = total.try_add(&vector(force))?;
                }
                Ok(total)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::domain::{Boundary, Domain};
    use crate::core::pairs::list::LongRangePairs;
    use nalgebra::Point3;

    const SPACING: f64 = 0.1;

    fn lattice(boundary: Boundary, cell_size: f64) -> (Workspace, ParticleSystemId) {
        let mut workspace = Workspace::new();
        let domain =
            Domain::new(&[0.0, 0.0], &[1.0, 1.0], &[cell_size], &[boundary, boundary]).unwrap();
        let positions = (0..10)
            .flat_map(|y| {
                (0..10).map(move |x| {
                    Point3::new((x as f64 + 0.5) * SPACING, (y as f64 + 0.5) * SPACING, 0.0)
                })
            })
            .collect();
        let system = workspace
            .add_particle_system("lattice", domain, positions)
            .unwrap();
        workspace.update_space(system).unwrap();
        (workspace, system)
    }

    fn bound(name: &str, operands: Vec<Expression>, system: ParticleSystemId) -> Expression {
        let mut expr = Expression::interaction(name, operands).unwrap();
        expr.assign(system);
        expr
    }

    fn eval(expr: &Expression, ws: &Workspace, i: usize) -> Tensor {
        expr.evaluate(ws, i, TimeLevel::Current).unwrap()
    }

    #[test]
    fn catalogue_arities_match_kinds() {
        for (name, kind) in INTERACTIONS.entries() {
            assert_eq!(kind.name(), *name);
        }
        assert_eq!(InteractionKind::SphGradient.arity(), 3);
        assert!(InteractionKind::BondSpring.uses_pairs());
    }

    #[test]
    fn sph_density_of_uniform_periodic_lattice_is_uniform() {
        let (ws, system) = lattice(Boundary::Periodic, 0.26);
        let mass = SPACING * SPACING;
        let density = bound(
            "sph_density",
            vec![Expression::constant(mass), Expression::constant(1.3 * SPACING)],
            system,
        );
        for i in [0, 9, 45, 99] {
            let rho = eval(&density, &ws, i).value().unwrap();
            assert!((rho - 1.0).abs() < 0.05, "particle {i}: rho = {rho}");
        }
    }

    #[test]
    fn sph_gradient_recovers_linear_field_in_the_interior() {
        let (mut ws, system) = lattice(Boundary::Open, 0.26);
        let f = ws.add_field("f", system, Tensor::scalar(0.0)).unwrap();
        let positions = ws.system(system).unwrap().positions().to_vec();
        for (i, p) in positions.iter().enumerate() {
            ws.field_mut(f)
                .unwrap()
                .set_value(i, Tensor::scalar(2.0 * p.x + 3.0 * p.y))
                .unwrap();
        }
        let gradient = bound(
            "sph_gradient",
            vec![
                Expression::Field(f),
                Expression::constant(SPACING * SPACING),
                Expression::constant(1.3 * SPACING),
            ],
            system,
        );
        let interior = 5 * 10 + 5;
        let g = eval(&gradient, &ws, interior);
        assert_eq!(g.shape(), (2, 1));
        assert!((g.get(0).unwrap() - 2.0).abs() < 0.1, "g = {g}");
        assert!((g.get(1).unwrap() - 3.0).abs() < 0.15, "g = {g}");
    }

    #[test]
    fn sph_laplacian_of_constant_field_vanishes() {
        let (ws, system) = lattice(Boundary::Periodic, 0.26);
        let laplacian = bound(
            "sph_laplacian",
            vec![
                Expression::constant(4.0),
                Expression::constant(SPACING * SPACING),
                Expression::constant(1.3 * SPACING),
            ],
            system,
        );
        assert!(eval(&laplacian, &ws, 0).value().unwrap().abs() < 1e-12);
    }

    #[test]
    fn dem_contact_pushes_away_from_mirror_wall() {
        let mut ws = Workspace::new();
        let domain = Domain::new(
            &[0.0, 0.0],
            &[1.0, 1.0],
            &[0.25],
            &[Boundary::Mirror, Boundary::Open],
        )
        .unwrap();
        let system = ws
            .add_particle_system("grains", domain, vec![Point3::new(0.05, 0.5, 0.0)])
            .unwrap();
        ws.update_space(system).unwrap();
        let contact = bound(
            "dem_contact",
            vec![Expression::constant(0.2), Expression::constant(100.0)],
            system,
        );
        let force = eval(&contact, &ws, 0);
        assert!((force.get(0).unwrap() - 10.0).abs() < 1e-9);
        assert!(force.get(1).unwrap().abs() < 1e-12);
    }

    fn grains_1d(maximum: f64, boundary: Boundary, xs: &[f64]) -> (Workspace, ParticleSystemId) {
        let mut ws = Workspace::new();
        let domain = Domain::new(&[0.0], &[maximum], &[1.0], &[boundary]).unwrap();
        let positions = xs.iter().map(|&x| Point3::new(x, 0.0, 0.0)).collect();
        let system = ws.add_particle_system("grains", domain, positions).unwrap();
        ws.update_space(system).unwrap();
        (ws, system)
    }

    #[test]
    fn dem_contact_sees_ghosts_next_to_an_untiled_mirror_wall() {
        let (ws, system) = grains_1d(9.5, Boundary::Mirror, &[9.4, 8.9]);
        let contact = bound(
            "dem_contact",
            vec![Expression::constant(1.0), Expression::constant(1.0)],
            system,
        );
        assert!((eval(&contact, &ws, 0).value().unwrap() + 0.6).abs() < 1e-12);
        assert!((eval(&contact, &ws, 1).value().unwrap() + 0.8).abs() < 1e-12);
    }

    #[test]
    fn dem_contact_between_unequal_grains_is_equal_and_opposite() {
        let mut ws = Workspace::new();
        let domain = Domain::new(&[0.0], &[10.0], &[0.5], &[Boundary::Open]).unwrap();
        let system = ws
            .add_particle_system(
                "grains",
                domain,
                vec![Point3::new(2.0, 0.0, 0.0), Point3::new(3.7, 0.0, 0.0)],
            )
            .unwrap();
        let diameter = ws.add_field("d", system, Tensor::scalar(0.5)).unwrap();
        ws.field_mut(diameter)
            .unwrap()
            .set_value(1, Tensor::scalar(3.0))
            .unwrap();
        ws.update_space(system).unwrap();

        // Overlap is (0.5 + 3.0) / 2 - 1.7 = 0.05.
        for d in [
            Expression::Field(diameter),
            Expression::Field(diameter) * Expression::constant(1.0),
        ] {
            let contact = bound("dem_contact", vec![d, Expression::constant(1.0)], system);
            let small = eval(&contact, &ws, 0).value().unwrap();
            let large = eval(&contact, &ws, 1).value().unwrap();
            assert!((small + 0.05).abs() < 1e-12, "small grain feels {small}");
            assert!((large - 0.05).abs() < 1e-12, "large grain feels {large}");
        }
    }

    #[test]
    fn lennard_jones_is_repulsive_inside_the_minimum() {
        let mut ws = Workspace::new();
        let domain = Domain::new(&[0.0], &[10.0], &[2.5], &[Boundary::Open]).unwrap();
        let system = ws
            .add_particle_system(
                "atoms",
                domain,
                vec![Point3::new(4.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)],
            )
            .unwrap();
        ws.update_space(system).unwrap();
        let lj = bound(
            "lennard_jones",
            vec![Expression::constant(1.0), Expression::constant(1.0)],
            system,
        );
        assert!((eval(&lj, &ws, 0).value().unwrap() + 24.0).abs() < 1e-9);
        assert!((eval(&lj, &ws, 1).value().unwrap() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn bond_spring_pulls_stretched_bond_together() {
        let mut ws = Workspace::new();
        let domain = Domain::new(&[0.0], &[10.0], &[1.0], &[Boundary::Open]).unwrap();
        let system = ws
            .add_particle_system(
                "chain",
                domain,
                vec![Point3::new(1.0, 0.0, 0.0), Point3::new(2.5, 0.0, 0.0)],
            )
            .unwrap();
        let mut pairs = LongRangePairs::new("bonds", &[REST_LENGTH_PAYLOAD]).unwrap();
        pairs.add_pair(0, 1, &[1.0]).unwrap();
        let list = ws.add_pair_list(system, pairs).unwrap();

        let mut spring = bound("bond_spring", vec![Expression::constant(2.0)], system);
        assert_eq!(
            spring.evaluate(&ws, 0, TimeLevel::Current),
            Err(EvalError::PairsNotAssigned("bond_spring".to_string()))
        );
        assert!(!spring.is_assigned(&ws));

        spring.assign_pairs(list);
        assert!(spring.is_assigned(&ws));
        assert!((eval(&spring, &ws, 0).value().unwrap() - 1.0).abs() < 1e-12);
        assert!((eval(&spring, &ws, 1).value().unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn interact_reports_stale_grid() {
        let (mut ws, system) = lattice(Boundary::Open, 0.26);
        ws.system_mut(system).unwrap().expire();
        let count = bound("neighbor_count", vec![Expression::constant(0.15)], system);
        assert!(matches!(
            count.evaluate(&ws, 0, TimeLevel::Current),
            Err(EvalError::Space(_))
        ));
    }
}
