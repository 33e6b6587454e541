use std::collections::HashSet;

use crate::{
    backend::{self, SolverBackend},
    datatypes::{BlockProperty, Circuit, Material, Vertex, WindingMap},
    error::MotorError,
    geometry::Dimensions,
};

pub const AIR: &str = "Air";
pub const IRON: &str = "Iron";
pub const TITANIUM: &str = "Titanium";
pub const COIL: &str = "Coil";
pub const MAGNET: &str = "NdFeB 37 MGOe";

/// B-H curve of the stator core as (B [T], H [A/m])
const IRON_BH_CURVE: [(f64, f64); 13] = [
    (0.0, 0.0),
    (0.3, 40.0),
    (0.8, 80.0),
    (1.12, 160.0),
    (1.32, 318.0),
    (1.46, 796.0),
    (1.54, 1590.0),
    (1.62, 3380.0),
    (1.74, 7960.0),
    (1.87, 15900.0),
    (1.99, 31800.0),
    (2.046, 55100.0),
    (2.08, 79600.0),
];

/// Materials defined in the model itself
pub fn material_library() -> Vec<Material> {
    vec![
        Material::linear(AIR, 1.0, 0.0),
        Material::nonlinear(IRON, 2100.0, IRON_BH_CURVE.to_vec()),
        Material::linear(TITANIUM, 1.0, 1.798),
        Material::linear(COIL, 1.0, 58.0),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilSide {
    Leading,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    ExteriorAir,
    BackIron,
    AirGap,
    Bandage,
    Magnet,
    Coil { slot: usize, side: CoilSide },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionAssignment {
    pub region: Region,
    pub label: Vertex,
    pub property: BlockProperty,
}

/// Everything the assignor hands to the solver
#[derive(Debug, Clone)]
pub struct RegionPlan {
    pub materials: Vec<Material>,
    pub library_materials: Vec<String>,
    pub circuits: Vec<Circuit>,
    pub assignments: Vec<RegionAssignment>,
}

impl RegionPlan {
    pub fn coils(&self) -> impl Iterator<Item = &RegionAssignment> {
        self.assignments
            .iter()
            .filter(|a| matches!(a.region, Region::Coil { .. }))
    }
}

fn validate_windings(
    windings: &WindingMap,
    circuits: &[Circuit],
    slots: usize,
) -> Result<(), MotorError> {
    let mut names = HashSet::new();
    for circuit in circuits {
        if !names.insert(circuit.name.as_str()) {
            return Err(MotorError::Config(format!(
                "circuit '{}' is defined more than once",
                circuit.name
            )));
        }
    }

    for (slot, winding) in windings {
        if *slot >= slots {
            return Err(MotorError::Config(format!(
                "winding slot {slot} does not exist, the stator has {slots} slots"
            )));
        }
        if !names.contains(winding.circuit.as_str()) {
            return Err(MotorError::Config(format!(
                "slot {slot} is wound on undefined circuit '{}'",
                winding.circuit
            )));
        }
        if winding.turns == 0 {
            return Err(MotorError::Config(format!(
                "slot {slot} is wound with zero turns"
            )));
        }
    }
    Ok(())
}

fn coil_property(windings: &WindingMap, slot: usize, side: CoilSide) -> BlockProperty {
    let mut property = BlockProperty::plain(COIL);
    if let Some(winding) = windings.get(&slot) {
        property.circuit = Some(winding.circuit.clone());
        property.turns = match side {
            CoilSide::Leading => winding.turns,
            CoilSide::Trailing => -winding.turns,
        };
    }
    property
}

/// Places one label inside every region and decides what is bound to it
///
/// # Arguments
/// * `dims` - Validated machine dimensions
/// * `magnet_angle` - Magnetization direction in degrees
/// * `circuits` - Circuits available to the coils
/// * `windings` - Slot index to circuit and signed turns
pub fn plan(
    dims: &Dimensions,
    magnet_angle: f64,
    circuits: &[Circuit],
    windings: &WindingMap,
) -> Result<RegionPlan, MotorError> {
    validate_windings(windings, circuits, dims.teeth)?;

    let mut assignments = vec![
        RegionAssignment {
            region: Region::ExteriorAir,
            label: Vertex::new(0.0, 1.25 * dims.outer_stator_radius),
            property: BlockProperty::plain(AIR),
        },
        RegionAssignment {
            region: Region::BackIron,
            label: Vertex::new(0.0, (dims.outer_stator_radius + dims.inner_stator_radius) / 2.0),
            property: BlockProperty::plain(IRON),
        },
        RegionAssignment {
            region: Region::AirGap,
            label: Vertex::new(0.0, dims.rotor_radius + dims.air_gap / 2.0),
            property: BlockProperty::plain(AIR),
        },
        RegionAssignment {
            region: Region::Bandage,
            label: Vertex::new(0.0, (dims.rotor_radius + dims.magnet_radius) / 2.0),
            property: BlockProperty::plain(TITANIUM),
        },
        RegionAssignment {
            region: Region::Magnet,
            label: Vertex::new(0.0, 0.0),
            property: BlockProperty {
                automesh: true,
                mesh_size: 0.0,
                magnet_direction: magnet_angle,
                ..BlockProperty::plain(MAGNET)
            },
        },
    ];

    for slot in 0..dims.teeth {
        let theta = slot as f64 * dims.tooth_pitch + dims.tooth_pitch / 3.0;
        for (side, label) in [
            (CoilSide::Leading, Vertex::polar(dims.coil_label_radius, theta)),
            (CoilSide::Trailing, Vertex::polar(dims.coil_label_radius, -theta)),
        ] {
            assignments.push(RegionAssignment {
                region: Region::Coil { slot, side },
                label,
                property: coil_property(windings, slot, side),
            });
        }
    }

    Ok(RegionPlan {
        materials: material_library(),
        library_materials: vec![MAGNET.to_owned()],
        circuits: circuits.to_vec(),
        assignments,
    })
}

/// Sends materials and circuits to the solver, then labels and binds every
/// region in plan order
pub fn apply<B: SolverBackend + ?Sized>(
    plan: &RegionPlan,
    backend: &mut B,
) -> Result<(), MotorError> {
    for material in &plan.materials {
        backend.add_material(material)?;
    }
    for name in &plan.library_materials {
        backend.load_library_material(name)?;
    }
    for circuit in &plan.circuits {
        backend.add_circuit(circuit)?;
    }

    for assignment in &plan.assignments {
        backend.add_block_label(assignment.label)?;
        backend::select_label(&mut *backend, assignment.label)?.bind(&assignment.property)?;
    }

    log::info!(
        "assigned {} regions ({} coil labels)",
        plan.assignments.len(),
        plan.coils().count()
    );

    Ok(())
}
