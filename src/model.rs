use crate::{
    backend::{AbsorbingBoundary, SolverBackend},
    config::{ProblemDefinition, RunConfig},
    datatypes::Vertex,
    error::MotorError,
    geometry::{self, StatorGeometry},
    post_processor::{self, QueryPoints, PROJECT_FILE},
    regions::{self, RegionPlan},
};

pub const ABC_LAYERS: u32 = 7;

/// A fully validated model, ready to be drawn
#[derive(Debug, Clone)]
pub struct Model {
    pub problem: ProblemDefinition,
    pub geometry: StatorGeometry,
    pub regions: RegionPlan,
    pub boundary: AbsorbingBoundary,
    pub queries: QueryPoints,
}

impl Model {
    /// Derives geometry, region assignments and query points. Nothing is
    /// sent to a solver here, so a rejected configuration leaves no trace.
    pub fn build(config: &RunConfig) -> Result<Model, MotorError> {
        let geometry = geometry::build(&config.machine)?;
        let regions = regions::plan(
            &geometry.dimensions,
            config.machine.magnet_angle,
            &config.circuits,
            &config.windings,
        )?;
        let queries = QueryPoints::derive(&geometry.dimensions);
        let boundary = AbsorbingBoundary {
            layers: ABC_LAYERS,
            radius: 2.0 * geometry.dimensions.outer_stator_radius,
            center: Vertex::new(0.0, 0.0),
            edge: 0,
        };

        Ok(Model {
            problem: ProblemDefinition::default(),
            geometry,
            regions,
            boundary,
            queries,
        })
    }
}

/// Replays the model on the pre-processor and saves the project
pub fn draw<B: SolverBackend + ?Sized>(model: &Model, backend: &mut B) -> Result<(), MotorError> {
    backend.define_problem(&model.problem)?;

    let geometry = &model.geometry;
    for node in geometry.nodes() {
        backend.add_node(node)?;
    }
    for arc in &geometry.arcs {
        backend.draw_arc(arc)?;
    }
    for segment in geometry.walls.iter().chain(&geometry.dividers) {
        backend.draw_line(segment)?;
    }
    log::info!(
        "drew {} nodes, {} arcs and {} lines",
        geometry.nodes().len(),
        geometry.arcs.len(),
        geometry.walls.len() + geometry.dividers.len()
    );

    regions::apply(&model.regions, backend)?;

    backend.make_absorbing_boundary(&model.boundary)?;

    // Contour endpoints become nodes so the contour starts and ends on geometry
    backend.add_node(model.queries.contour_start)?;
    backend.add_node(model.queries.contour_end)?;

    backend.zoom_natural()?;
    backend.save_as(PROJECT_FILE)?;
    Ok(())
}

/// Queues the analysis and the post-processing queries
pub fn queue_solve<B: SolverBackend + ?Sized>(
    model: &Model,
    backend: &mut B,
) -> Result<(), MotorError> {
    backend.analyze()?;
    backend.load_solution()?;
    post_processor::queue_queries(&model.queries, backend)
}

/// Validates the configuration, then draws the model and queues its solve
pub fn prepare<B: SolverBackend + ?Sized>(
    config: &RunConfig,
    backend: &mut B,
) -> Result<Model, MotorError> {
    let model = Model::build(config)?;
    draw(&model, backend)?;
    queue_solve(&model, backend)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::testing::{Call, RecordingBackend},
        config::MachineParameters,
        regions::Region,
    };

    #[test]
    fn sample_run_drives_the_backend() {
        let mut backend = RecordingBackend::default();
        let model = prepare(&RunConfig::default(), &mut backend).unwrap();

        assert_eq!(backend.calls[0], Call::DefineProblem);
        assert_eq!(model.geometry.teeth.len(), 4);
        assert_eq!(model.geometry.dividers.len(), 4);
        assert_eq!(model.regions.coils().count(), 8);

        // 16 tooth nodes plus the two contour endpoints
        assert_eq!(backend.count(|c| matches!(c, Call::AddNode(_))), 18);
        assert_eq!(backend.count(|c| matches!(c, Call::DrawArc(_))), 12);
        assert_eq!(backend.count(|c| matches!(c, Call::DrawLine(_))), 12);
        assert_eq!(backend.count(|c| matches!(c, Call::AddBlockLabel(_))), 13);
        assert_eq!(backend.count(|c| *c == Call::Execute), 0);

        let magnets = model
            .regions
            .assignments
            .iter()
            .filter(|a| a.region == Region::Magnet)
            .count();
        assert_eq!(magnets, 1);

        let boundary = backend
            .calls
            .iter()
            .find_map(|c| match c {
                Call::MakeAbsorbingBoundary(b) => Some(b.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(boundary.layers, 7);
        assert_eq!(boundary.radius, 120.0);
    }

    #[test]
    fn project_is_saved_before_analysis() {
        let mut backend = RecordingBackend::default();
        prepare(&RunConfig::default(), &mut backend).unwrap();

        let position = |call: &Call| backend.calls.iter().position(|c| c == call).unwrap();
        let saved = position(&Call::SaveAs(PROJECT_FILE.to_owned()));
        let analyzed = position(&Call::Analyze);
        let loaded = position(&Call::LoadSolution);
        assert!(saved < analyzed);
        assert!(analyzed < loaded);
        let first_query = backend
            .calls
            .iter()
            .position(|c| matches!(c, Call::SelectPoint(_)))
            .unwrap();
        assert!(loaded < first_query);
    }

    #[test]
    fn invalid_configuration_draws_nothing() {
        let config = RunConfig {
            machine: MachineParameters {
                bandage: 100.0,
                ..MachineParameters::default()
            },
            ..RunConfig::default()
        };
        let mut backend = RecordingBackend::default();
        let result = prepare(&config, &mut backend);
        assert!(matches!(result, Err(MotorError::Config(_))));
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn invalid_winding_draws_nothing() {
        let mut config = RunConfig::default();
        config.circuits.clear();
        let mut backend = RecordingBackend::default();
        assert!(prepare(&config, &mut backend).is_err());
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn failing_bind_stops_the_pipeline_with_selection_cleared() {
        let mut backend = RecordingBackend {
            fail_bind: true,
            ..Default::default()
        };
        let result = prepare(&RunConfig::default(), &mut backend);
        assert!(matches!(result, Err(MotorError::Solver(_))));
        assert_eq!(backend.calls.last(), Some(&Call::ClearSelection));
        assert_eq!(backend.count(|c| *c == Call::Analyze), 0);
    }
}
