use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Vertex {
        Vertex { x, y }
    }

    /// Places a vertex at `radius` along the direction `theta` (radians)
    pub fn polar(radius: f64, theta: f64) -> Vertex {
        Vertex {
            x: radius * theta.cos(),
            y: radius * theta.sin(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn theta(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

/// A circular arc, drawn counter-clockwise from `start` to `end`
#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub start: Vertex,
    pub end: Vertex,
    /// Included angle in degrees
    pub angle: f64,
    /// Maximum segment size in degrees; ignored by the mesher, kept for the call
    pub max_segment: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: Vertex,
    pub end: Vertex,
}

/// Both bore and pole-tip nodes of one stator tooth
#[derive(Debug, Clone, PartialEq)]
pub struct Tooth {
    pub index: usize,
    pub bore_left: Vertex,
    pub bore_right: Vertex,
    pub tip_left: Vertex,
    pub tip_right: Vertex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MagneticResponse {
    /// Relative permeability in x and y
    Linear { mu_x: f64, mu_y: f64 },
    /// Placeholder permeabilities plus a B-H curve as (B [T], H [A/m]) samples
    Nonlinear {
        mu_x: f64,
        mu_y: f64,
        bh_curve: Vec<(f64, f64)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub response: MagneticResponse,
    /// Coercivity in A/m
    pub coercivity: f64,
    /// Source current density in MA/m^2
    pub current_density: f64,
    /// Electrical conductivity in MS/m
    pub conductivity: f64,
    pub lamination_thickness: f64,
    pub hysteresis_lag: f64,
    pub lamination_fill: f64,
    pub lamination_type: u32,
}

impl Material {
    pub fn linear(name: &str, mu: f64, conductivity: f64) -> Material {
        Material {
            name: name.to_owned(),
            response: MagneticResponse::Linear { mu_x: mu, mu_y: mu },
            coercivity: 0.0,
            current_density: 0.0,
            conductivity,
            lamination_thickness: 0.0,
            hysteresis_lag: 0.0,
            lamination_fill: 1.0,
            lamination_type: 0,
        }
    }

    pub fn nonlinear(name: &str, placeholder_mu: f64, bh_curve: Vec<(f64, f64)>) -> Material {
        Material {
            response: MagneticResponse::Nonlinear {
                mu_x: placeholder_mu,
                mu_y: placeholder_mu,
                bh_curve,
            },
            ..Material::linear(name, placeholder_mu, 0.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitConnection {
    Parallel,
    Series,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    pub name: String,
    /// Current in amperes
    pub current: f64,
    pub connection: CircuitConnection,
}

/// A coil slot's excitation: the circuit it is in and its signed turn count.
/// The sign gives the winding direction of the slot's leading side.
#[derive(Debug, Clone, PartialEq)]
pub struct Winding {
    pub circuit: String,
    pub turns: i32,
}

pub type WindingMap = BTreeMap<usize, Winding>;

/// Properties bound to a block label once it is selected
#[derive(Debug, Clone, PartialEq)]
pub struct BlockProperty {
    pub material: String,
    pub automesh: bool,
    pub mesh_size: f64,
    pub circuit: Option<String>,
    /// Magnetization direction in degrees
    pub magnet_direction: f64,
    pub group: u32,
    pub turns: i32,
}

impl BlockProperty {
    pub fn plain(material: &str) -> BlockProperty {
        BlockProperty {
            material: material.to_owned(),
            automesh: false,
            mesh_size: 1.0,
            circuit: None,
            magnet_direction: 0.0,
            group: 0,
            turns: 0,
        }
    }
}
