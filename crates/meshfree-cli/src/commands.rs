pub mod contacts;
pub mod neighbors;

use crate::config::models::AppConfig;
use crate::error::Result;
use meshfree::core::expr::node::Expression;
use meshfree::core::math::tensor::Tensor;
use meshfree::core::models::ids::ParticleSystemId;
use meshfree::core::models::workspace::Workspace;
use meshfree::engine::error::EngineError;

const SYSTEM_NAME: &str = "particles";
const DIAMETER_FIELD: &str = "diameter";

/// A workspace holding the scenario's particles.
pub struct Scene {
    pub workspace: Workspace,
    pub system: ParticleSystemId,
    /// Uniform constant, or a per-particle field when any particle sets its own.
    pub diameter: Expression,
}

pub fn build_scene(app: &AppConfig) -> Result<Scene> {
    let mut workspace = Workspace::new();
    let system = workspace
        .add_particle_system(SYSTEM_NAME, app.domain.clone(), app.positions.clone())
        .map_err(EngineError::from)?;

    let diameter = if app.diameters.iter().any(Option::is_some) {
        let field = workspace
            .add_field(DIAMETER_FIELD, system, Tensor::scalar(app.diameter))
            .map_err(EngineError::from)?;
        let values = workspace.field_mut(field).map_err(EngineError::from)?;
        for (i, d) in app.diameters.iter().enumerate() {
            if let Some(d) = d {
                values
                    .set_value(i, Tensor::scalar(*d))
                    .map_err(EngineError::from)?;
            }
        }
        Expression::Field(field)
    } else {
        Expression::named_constant(DIAMETER_FIELD, app.diameter)
    };

    Ok(Scene {
        workspace,
        system,
        diameter,
    })
}
