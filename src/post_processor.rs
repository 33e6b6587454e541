use std::path::Path;

use crate::{
    backend::{ContourPlot, PlotQuantity, SolverBackend},
    datatypes::Vertex,
    error::MotorError,
    geometry::Dimensions,
};

pub const PROJECT_FILE: &str = "motor_model_FEMM.fem";
pub const PLOT_FILE: &str = "motor_model_FEMM.txt";
pub const POINT_FILE: &str = "motor_model_FEMM_point.txt";

/// Angle of the radial back-iron contour, in degrees
pub const CONTOUR_ANGLE: f64 = 135.0;
pub const CONTOUR_SAMPLES: u32 = 500;

/// Position of the source current density Js in the point-value tuple
pub const CURRENT_DENSITY_INDEX: usize = 8;

/// Where the solution is queried after the solve
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPoints {
    pub contour_start: Vertex,
    pub contour_end: Vertex,
    pub coil_point: Vertex,
}

impl QueryPoints {
    pub fn derive(dims: &Dimensions) -> QueryPoints {
        let theta = CONTOUR_ANGLE.to_radians();
        QueryPoints {
            contour_start: Vertex::polar(dims.inner_stator_radius, theta),
            contour_end: Vertex::polar(dims.outer_stator_radius, theta),
            coil_point: Vertex::polar(dims.coil_label_radius, dims.tooth_pitch / 3.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Results {
    /// Mean flux density magnitude along the back-iron contour, in tesla
    pub back_iron_flux_density: f64,
    /// Source current density in the first excited coil, in MA/m^2
    pub coil_current_density: f64,
}

/// Queues the post-processing queries on the backend
pub fn queue_queries<B: SolverBackend + ?Sized>(
    points: &QueryPoints,
    backend: &mut B,
) -> Result<(), MotorError> {
    backend.select_point(points.contour_start)?;
    backend.select_point(points.contour_end)?;
    backend.export_contour_plot(&ContourPlot {
        quantity: PlotQuantity::FluxDensityMagnitude,
        samples: CONTOUR_SAMPLES,
        file: PLOT_FILE.to_owned(),
    })?;
    backend.export_point_values(points.coil_point, POINT_FILE)?;
    Ok(())
}

/// Parses one solver-written value; NaN and infinities are rejected
fn parse_finite(text: &str) -> Result<f64, String> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(v) => Err(format!("non-finite value '{text}' ({v})")),
        Err(err) => Err(format!("non-numeric value '{text}': {err}")),
    }
}

/// Parses the second column of a tab-delimited contour plot
///
/// # Arguments
/// * `contents` - The file contents, one `position<TAB>value` pair per line
///
/// # Returns
/// The samples in file order. Blank lines are skipped; anything else that
/// does not carry a finite numeric second column is an error.
pub fn parse_contour_samples(contents: &str) -> Result<Vec<f64>, MotorError> {
    let mut samples = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let column = match line.split('\t').nth(1) {
            Some(c) => c.trim(),
            None => {
                return Err(MotorError::PostProcessor(format!(
                    "line {} of contour plot has no second column: '{line}'",
                    i + 1
                )))
            }
        };
        match parse_finite(column) {
            Ok(v) => samples.push(v),
            Err(err) => {
                return Err(MotorError::PostProcessor(format!(
                    "line {} of contour plot has {err}",
                    i + 1
                )))
            }
        }
    }
    Ok(samples)
}

/// Arithmetic mean; the plot samples are equally spaced along the contour
pub fn mean(samples: &[f64]) -> Result<f64, MotorError> {
    if samples.is_empty() {
        return Err(MotorError::PostProcessor(
            "contour plot contains no samples".to_owned(),
        ));
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Parses the tab-delimited point-value tuple written by the solver
pub fn parse_point_values(contents: &str) -> Result<Vec<f64>, MotorError> {
    let line = match contents.lines().find(|l| !l.trim().is_empty()) {
        Some(l) => l,
        None => {
            return Err(MotorError::PostProcessor(
                "point value file is empty".to_owned(),
            ))
        }
    };

    line.split('\t')
        .map(|v| {
            parse_finite(v.trim())
                .map_err(|err| MotorError::PostProcessor(format!("point value tuple has {err}")))
        })
        .collect()
}

pub fn current_density(values: &[f64]) -> Result<f64, MotorError> {
    match values.get(CURRENT_DENSITY_INDEX) {
        Some(j) => Ok(*j),
        None => Err(MotorError::PostProcessor(format!(
            "point value tuple has {} entries, current density is entry {}",
            values.len(),
            CURRENT_DENSITY_INDEX + 1
        ))),
    }
}

fn read(path: &Path) -> Result<String, MotorError> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(err) => Err(MotorError::PostProcessor(format!(
            "Unable to read {}: {err}",
            path.display()
        ))),
    }
}

/// Reads both result files written by the solver
///
/// # Arguments
/// * `workdir` - Directory the solver wrote its files into
pub fn read_results(workdir: &Path) -> Result<Results, MotorError> {
    let samples = parse_contour_samples(&read(&workdir.join(PLOT_FILE))?)?;
    let back_iron_flux_density = mean(&samples)?;
    log::info!(
        "averaged {} flux density samples along the back-iron",
        samples.len()
    );

    let values = parse_point_values(&read(&workdir.join(POINT_FILE))?)?;
    let coil_current_density = current_density(&values)?;

    Ok(Results {
        back_iron_flux_density,
        coil_current_density,
    })
}

/// Writes the results as a json report
pub fn write_report(results: &Results, output: &Path) -> Result<(), MotorError> {
    let mut report = json::JsonValue::new_object();
    report["back_iron_flux_density"] = results.back_iron_flux_density.into();
    report["coil_current_density"] = results.coil_current_density.into();
    std::fs::write(output, report.pretty(2))?;
    log::info!("wrote report to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::testing::{Call, RecordingBackend},
        config::MachineParameters,
    };
    use approx::assert_relative_eq;

    #[test]
    fn query_points_for_sample_machine() {
        let dims = Dimensions::derive(&MachineParameters::default()).unwrap();
        let points = QueryPoints::derive(&dims);
        let c = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(points.contour_start.x, -50.0 * c, epsilon = 1e-9);
        assert_relative_eq!(points.contour_start.y, 50.0 * c, epsilon = 1e-9);
        assert_relative_eq!(points.contour_end.x, -60.0 * c, epsilon = 1e-9);
        assert_relative_eq!(points.coil_point.radius(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(
            points.coil_point.theta(),
            std::f64::consts::PI / 6.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn queues_contour_then_point_query() {
        let dims = Dimensions::derive(&MachineParameters::default()).unwrap();
        let points = QueryPoints::derive(&dims);
        let mut backend = RecordingBackend::default();
        queue_queries(&points, &mut backend).unwrap();
        assert_eq!(backend.calls[0], Call::SelectPoint(points.contour_start));
        assert_eq!(backend.calls[1], Call::SelectPoint(points.contour_end));
        assert!(matches!(&backend.calls[2], Call::ExportContourPlot(p) if p.samples == 500));
        assert_eq!(
            backend.calls[3],
            Call::ExportPointValues(points.coil_point, POINT_FILE.to_owned())
        );
    }

    #[test]
    fn mean_of_contour_samples() {
        let contents = "0\t1.0\n0.5\t1.5\n1.0\t2.0\n";
        let samples = parse_contour_samples(contents).unwrap();
        assert_eq!(samples, vec![1.0, 1.5, 2.0]);
        assert_relative_eq!(mean(&samples).unwrap(), 1.5);
    }

    #[test]
    fn reparsing_gives_identical_mean() {
        let contents: String = (0..500)
            .map(|i| format!("{}\t{}\n", i as f64 * 0.02, 1.0 + (i as f64 * 0.1).sin()))
            .collect();
        let first = mean(&parse_contour_samples(&contents).unwrap()).unwrap();
        let second = mean(&parse_contour_samples(&contents).unwrap()).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn skips_blank_lines_and_handles_crlf() {
        let samples = parse_contour_samples("0\t1.25\r\n\n1\t0.75\r\n").unwrap();
        assert_eq!(samples, vec![1.25, 0.75]);
    }

    #[test]
    fn missing_column_is_fatal() {
        let err = parse_contour_samples("0\t1.0\n0.5\n").unwrap_err();
        assert!(matches!(err, MotorError::PostProcessor(_)));
    }

    #[test]
    fn garbage_value_is_fatal() {
        assert!(parse_contour_samples("0\tabc\n").is_err());
    }

    #[test]
    fn non_finite_samples_are_fatal() {
        for contents in ["0\t1.0\n0.5\tnan\n1.0\t2.0\n", "0\tinf\n", "0\t-infinity\n"] {
            let err = parse_contour_samples(contents).unwrap_err();
            assert!(matches!(err, MotorError::PostProcessor(_)), "{contents:?}");
        }
    }

    #[test]
    fn non_finite_point_value_is_fatal() {
        assert!(parse_point_values("0\t0\t0\t0\t0\t0\t0\t0\tinf\t1\n").is_err());
        assert!(parse_point_values("NaN\t1\n").is_err());
    }

    #[test]
    fn empty_plot_has_no_mean() {
        let samples = parse_contour_samples("\n").unwrap();
        assert!(mean(&samples).is_err());
    }

    #[test]
    fn ninth_point_value_is_current_density() {
        let values =
            parse_point_values("0.01\t0.2\t0.3\t0\t0\t100\t200\t0\t3.5\t1\t1\t0\t0\n")
                .unwrap();
        assert_eq!(current_density(&values).unwrap(), 3.5);
    }

    #[test]
    fn short_point_tuple_is_fatal() {
        let values = parse_point_values("1\t2\t3").unwrap();
        assert!(current_density(&values).is_err());
        assert!(parse_point_values("").is_err());
    }

    #[test]
    fn reads_results_and_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PLOT_FILE), "0\t0.5\n1\t1.5\n").unwrap();
        std::fs::write(
            dir.path().join(POINT_FILE),
            "0\t0\t0\t0\t0\t0\t0\t0\t2.5\t1\t1\n",
        )
        .unwrap();

        let results = read_results(dir.path()).unwrap();
        assert_relative_eq!(results.back_iron_flux_density, 1.0);
        assert_relative_eq!(results.coil_current_density, 2.5);

        let report = dir.path().join("report.json");
        write_report(&results, &report).unwrap();
        let parsed = json::parse(&std::fs::read_to_string(report).unwrap()).unwrap();
        assert_eq!(parsed["coil_current_density"].as_f64(), Some(2.5));
    }

    #[test]
    fn missing_result_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_results(dir.path()),
            Err(MotorError::PostProcessor(_))
        ));
    }
}
