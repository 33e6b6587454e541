use crate::{
    config::ProblemDefinition,
    datatypes::{Arc, BlockProperty, Circuit, Material, Segment, Vertex},
    error::MotorError,
};

/// Open boundary synthesized around the model
#[derive(Debug, Clone, PartialEq)]
pub struct AbsorbingBoundary {
    pub layers: u32,
    pub radius: f64,
    pub center: Vertex,
    /// 0 for a Dirichlet outer edge, 1 for Neumann
    pub edge: u32,
}

/// Field quantity sampled along a contour, numbered as FEMM's plot types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotQuantity {
    FluxDensityMagnitude = 1,
}

/// Contour plot written by the solver as a two column tab-delimited file
#[derive(Debug, Clone, PartialEq)]
pub struct ContourPlot {
    pub quantity: PlotQuantity,
    pub samples: u32,
    pub file: String,
}

/// The command set of the external magnetostatic solver.
///
/// Pre-processor calls describe the model, `analyze` and `load_solution`
/// queue the solve, post-processor calls queue queries, and `execute`
/// blocks until everything queued has run.
pub trait SolverBackend {
    fn define_problem(&mut self, problem: &ProblemDefinition) -> Result<(), MotorError>;
    fn add_node(&mut self, at: Vertex) -> Result<(), MotorError>;
    fn draw_arc(&mut self, arc: &Arc) -> Result<(), MotorError>;
    fn draw_line(&mut self, segment: &Segment) -> Result<(), MotorError>;
    fn add_material(&mut self, material: &Material) -> Result<(), MotorError>;
    /// Copies a material from the solver's built-in library into the model
    fn load_library_material(&mut self, name: &str) -> Result<(), MotorError>;
    fn add_circuit(&mut self, circuit: &Circuit) -> Result<(), MotorError>;
    fn add_block_label(&mut self, at: Vertex) -> Result<(), MotorError>;
    fn select_label(&mut self, at: Vertex) -> Result<(), MotorError>;
    fn set_block_property(&mut self, property: &BlockProperty) -> Result<(), MotorError>;
    fn clear_selection(&mut self) -> Result<(), MotorError>;
    fn make_absorbing_boundary(&mut self, boundary: &AbsorbingBoundary)
        -> Result<(), MotorError>;
    fn zoom_natural(&mut self) -> Result<(), MotorError>;
    fn save_as(&mut self, file: &str) -> Result<(), MotorError>;
    fn analyze(&mut self) -> Result<(), MotorError>;
    fn load_solution(&mut self) -> Result<(), MotorError>;
    fn select_point(&mut self, at: Vertex) -> Result<(), MotorError>;
    fn export_contour_plot(&mut self, plot: &ContourPlot) -> Result<(), MotorError>;
    /// Writes the tuple of field values at `at` to `file`, tab-delimited
    fn export_point_values(&mut self, at: Vertex, file: &str) -> Result<(), MotorError>;
    fn execute(&mut self) -> Result<(), MotorError>;
}

/// A selected block label. The selection is cleared when the value is
/// consumed by `bind` or dropped, whichever comes first.
pub struct LabelSelection<'a, B: SolverBackend + ?Sized> {
    backend: &'a mut B,
    cleared: bool,
}

impl<'a, B: SolverBackend + ?Sized> LabelSelection<'a, B> {
    /// Binds `property` to the selected label and clears the selection
    pub fn bind(mut self, property: &BlockProperty) -> Result<(), MotorError> {
        let bound = self.backend.set_block_property(property);
        self.cleared = true;
        let cleared = self.backend.clear_selection();
        bound.and(cleared)
    }
}

impl<'a, B: SolverBackend + ?Sized> Drop for LabelSelection<'a, B> {
    fn drop(&mut self) {
        if self.cleared {
            return;
        }
        if let Err(err) = self.backend.clear_selection() {
            log::warn!("failed to clear label selection: {err}");
        }
    }
}

/// Selects the label at `at`. A failed selection is cleared before the
/// error is returned.
pub fn select_label<B: SolverBackend + ?Sized>(
    backend: &mut B,
    at: Vertex,
) -> Result<LabelSelection<'_, B>, MotorError> {
    if let Err(err) = backend.select_label(at) {
        if let Err(clear_err) = backend.clear_selection() {
            log::warn!("failed to clear label selection: {clear_err}");
        }
        return Err(err);
    }
    Ok(LabelSelection {
        backend,
        cleared: false,
    })
}
