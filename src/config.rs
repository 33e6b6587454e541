use json::JsonValue;

use crate::{
    datatypes::{Circuit, CircuitConnection, Winding, WindingMap},
    error::MotorError,
};

/// Dimensional parameters of the machine. All lengths are in millimeters.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineParameters {
    /// Number of pole pairs; the stator carries `2 * pole_pairs` teeth
    pub pole_pairs: usize,
    pub outer_stator_radius: f64,
    /// Radius of the bore, where the teeth leave the back-iron
    pub inner_stator_radius: f64,
    /// Distance from the rotation axis to the pole-tip reference
    pub tooth_radius: f64,
    pub tooth_width: f64,
    pub air_gap: f64,
    pub bandage: f64,
    /// Magnetization direction of the magnet in degrees
    pub magnet_angle: f64,
}

impl Default for MachineParameters {
    fn default() -> Self {
        MachineParameters {
            pole_pairs: 2,
            outer_stator_radius: 60.0,
            inner_stator_radius: 50.0,
            tooth_radius: 30.0,
            tooth_width: 30.0,
            air_gap: 2.0,
            bandage: 2.0,
            magnet_angle: 40.0,
        }
    }
}

/// Everything a single model build needs
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub machine: MachineParameters,
    pub circuits: Vec<Circuit>,
    pub windings: WindingMap,
}

impl Default for RunConfig {
    fn default() -> Self {
        let machine = MachineParameters::default();
        let windings = default_windings(machine.pole_pairs);
        RunConfig {
            machine,
            circuits: default_circuits(),
            windings,
        }
    }
}

/// Single-phase test excitation: `i1` carries 20 A, `i2` is defined but idle
pub fn default_circuits() -> Vec<Circuit> {
    vec![
        Circuit {
            name: "i1".to_owned(),
            current: 20.0,
            connection: CircuitConnection::Series,
        },
        Circuit {
            name: "i2".to_owned(),
            current: 0.0,
            connection: CircuitConnection::Series,
        },
    ]
}

/// Excites slot 0 and the opposite slot `pole_pairs` with opposite polarity
pub fn default_windings(pole_pairs: usize) -> WindingMap {
    let mut windings = WindingMap::new();
    windings.insert(
        0,
        Winding {
            circuit: "i1".to_owned(),
            turns: 40,
        },
    );
    windings.insert(
        pole_pairs,
        Winding {
            circuit: "i1".to_owned(),
            turns: -40,
        },
    );
    windings
}

/// Problem definition handed to the solver before any geometry
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemDefinition {
    pub units: &'static str,
    pub kind: &'static str,
    pub precision: f64,
    pub depth: f64,
    pub min_angle: f64,
}

impl Default for ProblemDefinition {
    fn default() -> Self {
        ProblemDefinition {
            units: "millimeters",
            kind: "planar",
            precision: 1e-8,
            depth: 50.0,
            min_angle: 30.0,
        }
    }
}

/// Parses the input json into a JsonValue object
///
/// # Arguments
/// * `input_file` - Path to the input json file
///
/// # Returns
/// The parsed JsonValue
fn load_input_file(input_file: &str) -> Result<JsonValue, MotorError> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(s) => s,
        Err(err) => {
            return Err(MotorError::Input(format!(
                "Unable to read parameter file {input_file}: {err}"
            )))
        }
    };

    let input_json = match json::parse(&file_string) {
        Ok(j) => j,
        Err(err) => {
            return Err(MotorError::Input(format!(
                "Error in parameter file json: {err}"
            )))
        }
    };

    if !input_json.has_key("machine") {
        return Err(MotorError::Input(
            "Parameter file missing machine section".to_owned(),
        ));
    }

    Ok(input_json)
}

fn require_f64(section: &JsonValue, key: &str) -> Result<f64, MotorError> {
    match section[key].as_f64() {
        Some(v) => Ok(v),
        None => Err(MotorError::Input(format!(
            "Parameter file missing numeric field machine.{key}"
        ))),
    }
}

/// Parses machine parameters from the `machine` section
fn parse_machine(input_json: &JsonValue) -> Result<MachineParameters, MotorError> {
    let machine = &input_json["machine"];

    let pole_pairs = match machine["pole_pairs"].as_usize() {
        Some(p) => p,
        None => {
            return Err(MotorError::Input(
                "Parameter file missing integer field machine.pole_pairs".to_owned(),
            ))
        }
    };

    Ok(MachineParameters {
        pole_pairs,
        outer_stator_radius: require_f64(machine, "outer_stator_radius")?,
        inner_stator_radius: require_f64(machine, "inner_stator_radius")?,
        tooth_radius: require_f64(machine, "tooth_radius")?,
        tooth_width: require_f64(machine, "tooth_width")?,
        air_gap: require_f64(machine, "air_gap")?,
        bandage: require_f64(machine, "bandage")?,
        magnet_angle: require_f64(machine, "magnet_angle")?,
    })
}

fn parse_circuits(input_json: &JsonValue) -> Result<Vec<Circuit>, MotorError> {
    if !input_json.has_key("circuits") {
        return Ok(default_circuits());
    }
    if !input_json["circuits"].is_object() {
        return Err(MotorError::Input(
            "circuits must be an object keyed by circuit name".to_owned(),
        ));
    }

    let mut circuits = Vec::new();
    for (name, circuit_json) in input_json["circuits"].entries() {
        let current = match circuit_json["current"].as_f64() {
            Some(c) => c,
            None => {
                return Err(MotorError::Input(format!(
                    "Circuit '{name}' is missing a numeric current"
                )))
            }
        };
        let connection = match circuit_json["series"].as_bool() {
            Some(false) => CircuitConnection::Parallel,
            _ => CircuitConnection::Series,
        };
        circuits.push(Circuit {
            name: name.to_owned(),
            current,
            connection,
        });
    }

    Ok(circuits)
}

fn parse_windings(input_json: &JsonValue, pole_pairs: usize) -> Result<WindingMap, MotorError> {
    if !input_json.has_key("windings") {
        return Ok(default_windings(pole_pairs));
    }
    if !input_json["windings"].is_array() {
        return Err(MotorError::Input(
            "windings must be an array of winding entries".to_owned(),
        ));
    }

    let mut windings = WindingMap::new();
    for (i, winding_json) in input_json["windings"].members().enumerate() {
        let slot = winding_json["slot"].as_usize();
        let circuit = winding_json["circuit"].as_str();
        let turns = winding_json["turns"].as_i32();

        let (slot, circuit, turns) = match (slot, circuit, turns) {
            (Some(s), Some(c), Some(t)) => (s, c, t),
            _ => {
                return Err(MotorError::Input(format!(
                    "Winding entry {i} needs integer slot, string circuit and integer turns"
                )))
            }
        };

        if windings
            .insert(
                slot,
                Winding {
                    circuit: circuit.to_owned(),
                    turns,
                },
            )
            .is_some()
        {
            return Err(MotorError::Input(format!(
                "Slot {slot} is wound more than once"
            )));
        }
    }

    Ok(windings)
}

/// Loads a run configuration from a json parameter file
///
/// # Arguments
/// * `input_file` - Path to the parameter file
pub fn load(input_file: &str) -> Result<RunConfig, MotorError> {
    let input_json = load_input_file(input_file)?;
    let machine = parse_machine(&input_json)?;
    let circuits = parse_circuits(&input_json)?;
    let windings = parse_windings(&input_json, machine.pole_pairs)?;

    log::info!(
        "loaded {} circuits and {} windings from {}",
        circuits.len(),
        windings.len(),
        input_file
    );

    Ok(RunConfig {
        machine,
        circuits,
        windings,
    })
}
