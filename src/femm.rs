use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    backend::{AbsorbingBoundary, ContourPlot, SolverBackend},
    config::ProblemDefinition,
    datatypes::{
        Arc, BlockProperty, Circuit, CircuitConnection, MagneticResponse, Material, Segment,
        Vertex,
    },
    error::MotorError,
};

pub const SCRIPT_FILE: &str = "motor_model_FEMM.lua";

/// Quotes a string as a Lua literal
fn lua_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// A FEMM document driven through a generated Lua script.
///
/// Every backend call appends one command to the script. `execute` writes the
/// script into the working directory and runs FEMM on it, blocking until FEMM
/// exits. The script file is removed when the session is dropped unless
/// `keep_script` was called.
pub struct FemmSession {
    executable: String,
    workdir: PathBuf,
    script: String,
    outputs: Vec<PathBuf>,
    keep_script: bool,
}

impl FemmSession {
    /// Opens a session with a fresh magnetics document
    ///
    /// # Arguments
    /// * `executable` - The FEMM executable to run
    /// * `workdir` - Directory that receives the project and result files
    pub fn open(executable: &str, workdir: &Path) -> Result<FemmSession, MotorError> {
        if !workdir.is_dir() {
            return Err(MotorError::Solver(format!(
                "working directory {} does not exist",
                workdir.display()
            )));
        }
        let workdir = workdir.canonicalize()?;

        log::debug!("opening FEMM session in {}", workdir.display());

        let mut session = FemmSession {
            executable: executable.to_owned(),
            workdir,
            script: String::new(),
            outputs: Vec::new(),
            keep_script: false,
        };
        session.emit("newdocument(0)".to_owned());
        Ok(session)
    }

    #[cfg(test)]
    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn script_path(&self) -> PathBuf {
        self.workdir.join(SCRIPT_FILE)
    }

    pub fn resolve(&self, file: &str) -> PathBuf {
        self.workdir.join(file)
    }

    /// Leaves the generated script on disk after the session ends
    pub fn keep_script(&mut self) {
        self.keep_script = true;
    }

    /// Writes the script as it stands, followed by a `quit()`
    pub fn write_script(&self) -> Result<PathBuf, MotorError> {
        let path = self.script_path();
        let mut contents = self.script.clone();
        contents.push_str("quit()\n");
        match std::fs::write(&path, contents) {
            Ok(()) => Ok(path),
            Err(err) => Err(MotorError::Solver(format!(
                "Failed to write FEMM script {}: {err}",
                path.display()
            ))),
        }
    }

    fn emit(&mut self, command: String) {
        self.script.push_str(&command);
        self.script.push('\n');
    }

    fn quoted_path(&self, file: &str) -> String {
        lua_string(&self.resolve(file).to_string_lossy())
    }
}

impl SolverBackend for FemmSession {
    fn define_problem(&mut self, problem: &ProblemDefinition) -> Result<(), MotorError> {
        self.emit(format!(
            "mi_probdef(0, {}, {}, {}, {}, {})",
            lua_string(problem.units),
            lua_string(problem.kind),
            problem.precision,
            problem.depth,
            problem.min_angle
        ));
        Ok(())
    }

    fn add_node(&mut self, at: Vertex) -> Result<(), MotorError> {
        self.emit(format!("mi_addnode({}, {})", at.x, at.y));
        Ok(())
    }

    fn draw_arc(&mut self, arc: &Arc) -> Result<(), MotorError> {
        self.emit(format!(
            "mi_drawarc({}, {}, {}, {}, {}, {})",
            arc.start.x, arc.start.y, arc.end.x, arc.end.y, arc.angle, arc.max_segment
        ));
        Ok(())
    }

    fn draw_line(&mut self, segment: &Segment) -> Result<(), MotorError> {
        self.emit(format!(
            "mi_drawline({}, {}, {}, {})",
            segment.start.x, segment.start.y, segment.end.x, segment.end.y
        ));
        Ok(())
    }

    fn add_material(&mut self, material: &Material) -> Result<(), MotorError> {
        let (mu_x, mu_y) = match &material.response {
            MagneticResponse::Linear { mu_x, mu_y } => (*mu_x, *mu_y),
            MagneticResponse::Nonlinear { mu_x, mu_y, .. } => (*mu_x, *mu_y),
        };
        let name = lua_string(&material.name);
        self.emit(format!(
            "mi_addmaterial({name}, {mu_x}, {mu_y}, {}, {}, {}, {}, {}, {}, {}, 0, 0)",
            material.coercivity,
            material.current_density,
            material.conductivity,
            material.lamination_thickness,
            material.hysteresis_lag,
            material.lamination_fill,
            material.lamination_type
        ));
        if let MagneticResponse::Nonlinear { bh_curve, .. } = &material.response {
            for (b, h) in bh_curve {
                self.emit(format!("mi_addbhpoint({name}, {b}, {h})"));
            }
        }
        Ok(())
    }

    fn load_library_material(&mut self, name: &str) -> Result<(), MotorError> {
        self.emit(format!("mi_getmaterial({})", lua_string(name)));
        Ok(())
    }

    fn add_circuit(&mut self, circuit: &Circuit) -> Result<(), MotorError> {
        self.emit(format!(
            "mi_addcircprop({}, {}, {})",
            lua_string(&circuit.name),
            circuit.current,
            flag(circuit.connection == CircuitConnection::Series)
        ));
        Ok(())
    }

    fn add_block_label(&mut self, at: Vertex) -> Result<(), MotorError> {
        self.emit(format!("mi_addblocklabel({}, {})", at.x, at.y));
        Ok(())
    }

    fn select_label(&mut self, at: Vertex) -> Result<(), MotorError> {
        self.emit(format!("mi_selectlabel({}, {})", at.x, at.y));
        Ok(())
    }

    fn set_block_property(&mut self, property: &BlockProperty) -> Result<(), MotorError> {
        let circuit = property.circuit.as_deref().unwrap_or("<None>");
        self.emit(format!(
            "mi_setblockprop({}, {}, {}, {}, {}, {}, {})",
            lua_string(&property.material),
            flag(property.automesh),
            property.mesh_size,
            lua_string(circuit),
            property.magnet_direction,
            property.group,
            property.turns
        ));
        Ok(())
    }

    fn clear_selection(&mut self) -> Result<(), MotorError> {
        self.emit("mi_clearselected()".to_owned());
        Ok(())
    }

    fn make_absorbing_boundary(&mut self, boundary: &AbsorbingBoundary) -> Result<(), MotorError> {
        self.emit(format!(
            "mi_makeABC({}, {}, {}, {}, {})",
            boundary.layers, boundary.radius, boundary.center.x, boundary.center.y, boundary.edge
        ));
        Ok(())
    }

    fn zoom_natural(&mut self) -> Result<(), MotorError> {
        self.emit("mi_zoomnatural()".to_owned());
        Ok(())
    }

    fn save_as(&mut self, file: &str) -> Result<(), MotorError> {
        let path = self.quoted_path(file);
        self.emit(format!("mi_saveas({path})"));
        Ok(())
    }

    fn analyze(&mut self) -> Result<(), MotorError> {
        self.emit("mi_analyze(1)".to_owned());
        Ok(())
    }

    fn load_solution(&mut self) -> Result<(), MotorError> {
        self.emit("mi_loadsolution()".to_owned());
        Ok(())
    }

    fn select_point(&mut self, at: Vertex) -> Result<(), MotorError> {
        self.emit(format!("mo_selectpoint({}, {})", at.x, at.y));
        Ok(())
    }

    fn export_contour_plot(&mut self, plot: &ContourPlot) -> Result<(), MotorError> {
        let path = self.quoted_path(&plot.file);
        self.emit(format!(
            "mo_makeplot({}, {}, {path}, 1)",
            plot.quantity as u8, plot.samples
        ));
        self.outputs.push(self.resolve(&plot.file));
        Ok(())
    }

    fn export_point_values(&mut self, at: Vertex, file: &str) -> Result<(), MotorError> {
        let path = self.quoted_path(file);
        let block = format!(
            "pv = {{mo_getpointvalues({x}, {y})}}\n\
             handle = openfile({path}, \"w\")\n\
             write(handle, pv[1])\n\
             for k = 2, getn(pv) do write(handle, \"\\t\", pv[k]) end\n\
             write(handle, \"\\n\")\n\
             closefile(handle)",
            x = at.x,
            y = at.y,
        );
        self.emit(block);
        self.outputs.push(self.resolve(file));
        Ok(())
    }

    fn execute(&mut self) -> Result<(), MotorError> {
        for output in &self.outputs {
            if output.exists() {
                std::fs::remove_file(output)?;
            }
        }

        let script_path = self.write_script()?;

        log::info!("running FEMM on {}...", script_path.display());
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
            spinner.set_style(style);
        }
        spinner.set_message("meshing and solving");
        spinner.enable_steady_tick(Duration::from_millis(120));

        // No timeout: a solve that never returns blocks here
        let status = std::process::Command::new(&self.executable)
            .arg(format!("-lua-script={}", script_path.display()))
            .arg("-windowhide")
            .current_dir(&self.workdir)
            .status();

        spinner.finish_and_clear();

        let status = match status {
            Ok(s) => s,
            Err(err) => {
                return Err(MotorError::Solver(format!(
                    "FEMM failed to start ({}): {err}",
                    self.executable
                )))
            }
        };
        if !status.success() {
            return Err(MotorError::Solver(format!("FEMM exited with {status}")));
        }

        for output in &self.outputs {
            if !output.is_file() {
                return Err(MotorError::Solver(format!(
                    "FEMM finished without writing {}; the analysis may not have converged",
                    output.display()
                )));
            }
        }

        log::info!("FEMM run complete");
        Ok(())
    }
}

impl Drop for FemmSession {
    fn drop(&mut self) {
        if self.keep_script {
            return;
        }
        let path = self.script_path();
        if path.exists() {
            if let Err(err) = std::fs::remove_file(&path) {
                log::warn!("failed to remove {}: {err}", path.display());
            }
        }
    }
}
