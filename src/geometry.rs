use std::f64::consts::PI;

use nalgebra::{Point2, Rotation2};

use crate::{
    config::MachineParameters,
    datatypes::{Arc, Segment, Tooth, Vertex},
    error::MotorError,
};

/// Max segment hint passed along with every arc
pub const ARC_MAX_SEGMENT: f64 = 1.0;

/// Quantities derived from the machine parameters. Constructing one
/// validates the parameter set, so holding a `Dimensions` means the
/// geometry is drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimensions {
    pub teeth: usize,
    /// Angle between adjacent tooth centers, in radians
    pub tooth_pitch: f64,
    /// Angle subtended by one tooth opening on the bore circle, in radians
    pub tooth_angle: f64,
    pub outer_stator_radius: f64,
    pub inner_stator_radius: f64,
    pub pole_tip_radius: f64,
    pub rotor_radius: f64,
    pub magnet_radius: f64,
    pub coil_label_radius: f64,
    pub air_gap: f64,
    /// Left pole-tip node of tooth 0
    pub tip_reference: Vertex,
}

fn require_positive(name: &str, value: f64) -> Result<(), MotorError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MotorError::Config(format!(
            "{name} must be a positive finite length, got {value}"
        )));
    }
    Ok(())
}

/// Angle subtended at the center by a chord of `chord` on a circle of `radius`
///
/// # Returns
/// The angle in radians, or a configuration error when the chord does not
/// fit strictly inside the circle
pub fn chord_angle(chord: f64, radius: f64) -> Result<f64, MotorError> {
    let ratio = chord / (2.0 * radius);
    if !(ratio < 1.0) {
        return Err(MotorError::Config(format!(
            "tooth width {chord} must be smaller than the bore diameter {}",
            2.0 * radius
        )));
    }
    Ok(2.0 * ratio.asin())
}

impl Dimensions {
    /// Derives and validates all dimensions of the cross-section
    pub fn derive(params: &MachineParameters) -> Result<Dimensions, MotorError> {
        if params.pole_pairs == 0 {
            return Err(MotorError::Config(
                "pole pair count must be at least 1".to_owned(),
            ));
        }
        require_positive("outer stator radius", params.outer_stator_radius)?;
        require_positive("inner stator radius", params.inner_stator_radius)?;
        require_positive("tooth radius", params.tooth_radius)?;
        require_positive("tooth width", params.tooth_width)?;
        require_positive("air gap", params.air_gap)?;
        require_positive("bandage", params.bandage)?;
        if !params.magnet_angle.is_finite() {
            return Err(MotorError::Config(format!(
                "magnet angle must be finite, got {}",
                params.magnet_angle
            )));
        }

        let teeth = match params.pole_pairs.checked_mul(2) {
            Some(t) => t,
            None => {
                return Err(MotorError::Config(format!(
                    "pole pair count {} is too large",
                    params.pole_pairs
                )))
            }
        };
        let tooth_pitch = PI / params.pole_pairs as f64;
        let tooth_angle = chord_angle(params.tooth_width, params.inner_stator_radius)?;

        if tooth_angle >= tooth_pitch {
            return Err(MotorError::Config(format!(
                "teeth overlap: tooth opening {:.4} rad is not below tooth pitch {:.4} rad",
                tooth_angle, tooth_pitch
            )));
        }

        let inner_tooth = params.inner_stator_radius - params.tooth_radius;
        let bore_reference = Vertex::polar(params.inner_stator_radius, tooth_angle / 2.0);
        let tip_reference = Vertex::new(bore_reference.x - inner_tooth, bore_reference.y);
        let pole_tip_radius = tip_reference.radius();
        let rotor_radius = pole_tip_radius - params.air_gap;
        let magnet_radius = rotor_radius - params.bandage;

        let ordered = magnet_radius > 0.0
            && magnet_radius < rotor_radius
            && rotor_radius < pole_tip_radius
            && pole_tip_radius < params.inner_stator_radius
            && params.inner_stator_radius < params.outer_stator_radius;
        if !ordered {
            return Err(MotorError::Config(format!(
                "radii must satisfy 0 < magnet ({:.4}) < rotor ({:.4}) < pole tip ({:.4}) \
                 < inner stator ({:.4}) < outer stator ({:.4})",
                magnet_radius,
                rotor_radius,
                pole_tip_radius,
                params.inner_stator_radius,
                params.outer_stator_radius
            )));
        }

        if tip_reference.theta() >= tooth_pitch / 2.0 {
            return Err(MotorError::Config(format!(
                "pole tips cross the coil dividers: tip half-angle {:.4} rad, limit {:.4} rad",
                tip_reference.theta(),
                tooth_pitch / 2.0
            )));
        }

        let coil_label_radius = params.inner_stator_radius - inner_tooth / 2.0;
        if !(coil_label_radius > pole_tip_radius && coil_label_radius < params.inner_stator_radius)
        {
            return Err(MotorError::Config(format!(
                "coil label radius {:.4} is outside the slot ({:.4}, {:.4})",
                coil_label_radius, pole_tip_radius, params.inner_stator_radius
            )));
        }

        // Tooth walls run parallel to the tooth axis at half the tooth width
        let wall_angle = (params.tooth_width / (2.0 * coil_label_radius)).asin();
        if !(wall_angle < tooth_pitch / 3.0) {
            return Err(MotorError::Config(format!(
                "coil labels at {:.4} rad would land inside a tooth (wall at {:.4} rad)",
                tooth_pitch / 3.0,
                wall_angle
            )));
        }

        Ok(Dimensions {
            teeth,
            tooth_pitch,
            tooth_angle,
            outer_stator_radius: params.outer_stator_radius,
            inner_stator_radius: params.inner_stator_radius,
            pole_tip_radius,
            rotor_radius,
            magnet_radius,
            coil_label_radius,
            air_gap: params.air_gap,
            tip_reference,
        })
    }
}

/// Rotates `base` about the origin by `index * step` radians.
///
/// Every repeated feature around the stator is placed with this.
pub fn rotate_about_origin(base: Vertex, index: usize, step: f64) -> Vertex {
    let rotated = Rotation2::new(index as f64 * step) * Point2::new(base.x, base.y);
    Vertex::new(rotated.x, rotated.y)
}

/// Two 180 degree arcs forming a full circle of `radius`
pub fn full_circle(radius: f64) -> [Arc; 2] {
    let right = Vertex::new(radius, 0.0);
    let left = Vertex::new(-radius, 0.0);
    [
        Arc {
            start: right,
            end: left,
            angle: 180.0,
            max_segment: ARC_MAX_SEGMENT,
        },
        Arc {
            start: left,
            end: right,
            angle: 180.0,
            max_segment: ARC_MAX_SEGMENT,
        },
    ]
}

/// The complete boundary set of the cross-section
#[derive(Debug, Clone)]
pub struct StatorGeometry {
    pub dimensions: Dimensions,
    pub teeth: Vec<Tooth>,
    pub arcs: Vec<Arc>,
    /// Tooth side walls, left then right for each tooth
    pub walls: Vec<Segment>,
    /// Lines separating the two coil sides of each slot
    pub dividers: Vec<Segment>,
}

impl StatorGeometry {
    pub fn bore_nodes(&self) -> Vec<Vertex> {
        self.teeth
            .iter()
            .flat_map(|t| [t.bore_left, t.bore_right])
            .collect()
    }

    pub fn tip_nodes(&self) -> Vec<Vertex> {
        self.teeth
            .iter()
            .flat_map(|t| [t.tip_left, t.tip_right])
            .collect()
    }

    /// Every explicit node in the order it is added to the solver
    pub fn nodes(&self) -> Vec<Vertex> {
        let mut nodes = self.bore_nodes();
        nodes.extend(self.tip_nodes());
        nodes
    }
}

fn place_teeth(dims: &Dimensions) -> Vec<Tooth> {
    let bore_left_0 = Vertex::polar(dims.inner_stator_radius, dims.tooth_angle / 2.0);
    let bore_right_0 = Vertex::polar(dims.inner_stator_radius, -dims.tooth_angle / 2.0);
    let tip_left_0 = dims.tip_reference;
    let tip_right_0 = Vertex::new(tip_left_0.x, -tip_left_0.y);

    (0..dims.teeth)
        .map(|i| Tooth {
            index: i,
            bore_left: rotate_about_origin(bore_left_0, i, dims.tooth_pitch),
            bore_right: rotate_about_origin(bore_right_0, i, dims.tooth_pitch),
            tip_left: rotate_about_origin(tip_left_0, i, dims.tooth_pitch),
            tip_right: rotate_about_origin(tip_right_0, i, dims.tooth_pitch),
        })
        .collect()
}

/// Back-iron arcs on the bore, from the left node of each tooth to the right
/// node of the next one
fn bore_arcs(teeth: &[Tooth], dims: &Dimensions) -> Vec<Arc> {
    let span = (dims.tooth_pitch - dims.tooth_angle).to_degrees();
    (0..teeth.len())
        .map(|i| {
            let next = (i + 1) % teeth.len();
            Arc {
                start: teeth[i].bore_left,
                end: teeth[next].bore_right,
                angle: span,
                max_segment: ARC_MAX_SEGMENT,
            }
        })
        .collect()
}

fn coil_dividers(dims: &Dimensions) -> Vec<Segment> {
    let bore_0 = Vertex::polar(dims.inner_stator_radius, dims.tooth_pitch / 2.0);
    let tip_0 = Vertex::polar(dims.pole_tip_radius, dims.tooth_pitch / 2.0);
    (0..dims.teeth)
        .map(|i| Segment {
            start: rotate_about_origin(bore_0, i, dims.tooth_pitch),
            end: rotate_about_origin(tip_0, i, dims.tooth_pitch),
        })
        .collect()
}

/// Builds the boundary set of the stator/rotor cross-section
///
/// # Arguments
/// * `params` - The machine parameters
///
/// # Returns
/// The geometry, or a configuration error if the parameters do not describe
/// a drawable machine
pub fn build(params: &MachineParameters) -> Result<StatorGeometry, MotorError> {
    let dims = Dimensions::derive(params)?;

    let teeth = place_teeth(&dims);

    let mut arcs: Vec<Arc> = Vec::with_capacity(dims.teeth + 8);
    arcs.extend(full_circle(dims.outer_stator_radius));
    arcs.extend(bore_arcs(&teeth, &dims));
    arcs.extend(full_circle(dims.pole_tip_radius));
    arcs.extend(full_circle(dims.rotor_radius));
    arcs.extend(full_circle(dims.magnet_radius));

    let walls: Vec<Segment> = teeth
        .iter()
        .flat_map(|t| {
            [
                Segment {
                    start: t.bore_left,
                    end: t.tip_left,
                },
                Segment {
                    start: t.bore_right,
                    end: t.tip_right,
                },
            ]
        })
        .collect();

    let dividers = coil_dividers(&dims);

    for tooth in &teeth {
        log::debug!(
            "tooth {}: bore nodes at {:.4}/{:.4} rad, tips at {:.4}/{:.4} rad",
            tooth.index,
            tooth.bore_left.theta(),
            tooth.bore_right.theta(),
            tooth.tip_left.theta(),
            tooth.tip_right.theta()
        );
    }

    log::debug!(
        "geometry: {} teeth, pole tip radius {:.4}, rotor radius {:.4}, magnet radius {:.4}",
        dims.teeth,
        dims.pole_tip_radius,
        dims.rotor_radius,
        dims.magnet_radius
    );

    Ok(StatorGeometry {
        dimensions: dims,
        teeth,
        arcs,
        walls,
        dividers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn sample() -> MachineParameters {
        MachineParameters::default()
    }

    #[test]
    fn tooth_angle_follows_chord_formula() {
        let angle = chord_angle(30.0, 50.0).unwrap();
        assert_relative_eq!(angle, 2.0 * 0.3f64.asin(), epsilon = 1e-12);
        assert_relative_eq!(angle, 0.6094, epsilon = 1e-4);
    }

    #[test]
    fn sample_node_counts() {
        let geometry = build(&sample()).unwrap();
        assert_eq!(geometry.teeth.len(), 4);
        assert_eq!(geometry.bore_nodes().len(), 8);
        assert_eq!(geometry.tip_nodes().len(), 8);
        assert_eq!(geometry.dividers.len(), 4);
        assert_eq!(geometry.walls.len(), 8);
        // outer, pole tip, rotor and magnet circles plus one bore arc per tooth
        assert_eq!(geometry.arcs.len(), 8 + 4);
    }

    #[test]
    fn sample_radii() {
        let dims = Dimensions::derive(&sample()).unwrap();
        let x = 50.0 * (dims.tooth_angle / 2.0).cos() - 20.0;
        let expected_tip = (x * x + 15.0 * 15.0).sqrt();
        assert_relative_eq!(dims.pole_tip_radius, expected_tip, epsilon = 1e-12);
        assert_relative_eq!(dims.rotor_radius, expected_tip - 2.0, epsilon = 1e-12);
        assert_relative_eq!(dims.magnet_radius, expected_tip - 4.0, epsilon = 1e-12);
        assert_relative_eq!(dims.coil_label_radius, 40.0);
    }

    #[test]
    fn tooth_nodes_are_symmetric_about_tooth_center() {
        let geometry = build(&sample()).unwrap();
        let pitch = geometry.dimensions.tooth_pitch;
        for tooth in &geometry.teeth {
            let center = tooth.index as f64 * pitch;
            let to_center = Rotation2::new(-center);
            for (left, right) in [
                (tooth.bore_left, tooth.bore_right),
                (tooth.tip_left, tooth.tip_right),
            ] {
                let l = to_center * Point2::new(left.x, left.y);
                let r = to_center * Point2::new(right.x, right.y);
                assert_relative_eq!(l.x, r.x, epsilon = 1e-9);
                assert_relative_eq!(l.y, -r.y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn rotation_placement() {
        let base = Vertex::new(1.0, 0.0);
        let p = rotate_about_origin(base, 3, PI / 2.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, -1.0, epsilon = 1e-12);
        assert_eq!(rotate_about_origin(base, 0, 1.3), base);
    }

    #[test]
    fn bore_arcs_close_the_bore() {
        let geometry = build(&sample()).unwrap();
        let dims = &geometry.dimensions;
        let bore: Vec<&Arc> = geometry.arcs[2..2 + dims.teeth].iter().collect();
        for (i, arc) in bore.iter().enumerate() {
            assert_eq!(arc.start, geometry.teeth[i].bore_left);
            assert_eq!(arc.end, geometry.teeth[(i + 1) % dims.teeth].bore_right);
            assert_relative_eq!(arc.start.radius(), dims.inner_stator_radius, epsilon = 1e-9);
        }
        let bore_total: f64 = bore.iter().map(|a| a.angle).sum();
        let teeth_total = (dims.teeth as f64) * dims.tooth_angle.to_degrees();
        assert_relative_eq!(bore_total + teeth_total, 360.0, epsilon = 1e-9);
    }

    #[test]
    fn dividers_sit_on_slot_bisectors() {
        let geometry = build(&sample()).unwrap();
        let dims = &geometry.dimensions;
        for (i, divider) in geometry.dividers.iter().enumerate() {
            let bisector = i as f64 * dims.tooth_pitch + dims.tooth_pitch / 2.0;
            let expected = Vertex::polar(dims.inner_stator_radius, bisector);
            assert_relative_eq!(divider.start.x, expected.x, epsilon = 1e-9);
            assert_relative_eq!(divider.start.y, expected.y, epsilon = 1e-9);
            assert_relative_eq!(divider.end.radius(), dims.pole_tip_radius, epsilon = 1e-9);
        }
    }

    #[test]
    fn oversized_bandage_is_rejected() {
        let params = MachineParameters {
            bandage: 100.0,
            ..sample()
        };
        assert!(matches!(build(&params), Err(MotorError::Config(_))));
    }

    #[test]
    fn tooth_as_wide_as_bore_is_rejected() {
        let params = MachineParameters {
            tooth_width: 100.0,
            ..sample()
        };
        assert!(matches!(build(&params), Err(MotorError::Config(_))));
    }

    #[test]
    fn overlapping_teeth_are_rejected() {
        let params = MachineParameters {
            pole_pairs: 8,
            ..sample()
        };
        assert!(matches!(build(&params), Err(MotorError::Config(_))));
    }

    #[test]
    fn stator_must_enclose_bore() {
        let params = MachineParameters {
            outer_stator_radius: 45.0,
            ..sample()
        };
        assert!(build(&params).is_err());
    }

    #[test]
    fn zero_pole_pairs_is_rejected() {
        let params = MachineParameters {
            pole_pairs: 0,
            ..sample()
        };
        assert!(build(&params).is_err());
    }

    #[test]
    fn huge_pole_pair_count_is_rejected() {
        let params = MachineParameters {
            pole_pairs: usize::MAX / 2 + 1,
            ..sample()
        };
        assert!(matches!(
            Dimensions::derive(&params),
            Err(MotorError::Config(msg)) if msg.contains("too large")
        ));
    }

    #[test]
    fn short_teeth_put_pole_tips_across_dividers() {
        let params = MachineParameters {
            pole_pairs: 3,
            tooth_radius: 20.0,
            ..sample()
        };
        assert!(matches!(
            Dimensions::derive(&params),
            Err(MotorError::Config(msg)) if msg.contains("pole tips cross the coil dividers")
        ));
    }

    #[test]
    fn coil_labels_inside_teeth_are_rejected() {
        let params = MachineParameters {
            pole_pairs: 3,
            tooth_radius: 35.0,
            ..sample()
        };
        assert!(matches!(
            Dimensions::derive(&params),
            Err(MotorError::Config(msg)) if msg.contains("would land inside a tooth")
        ));
    }

    proptest! {
        #[test]
        fn accepted_parameters_keep_radii_ordered(
            pole_pairs in 1usize..6,
            inner in 20.0f64..100.0,
            outer_margin in 1.0f64..30.0,
            tooth_fraction in 0.3f64..0.9,
            width_fraction in 0.05f64..0.9,
            air_gap in 0.1f64..5.0,
            bandage in 0.1f64..20.0,
        ) {
            let params = MachineParameters {
                pole_pairs,
                outer_stator_radius: inner + outer_margin,
                inner_stator_radius: inner,
                tooth_radius: inner * tooth_fraction,
                tooth_width: inner * width_fraction,
                air_gap,
                bandage,
                magnet_angle: 0.0,
            };
            match build(&params) {
                Ok(geometry) => {
                    let d = &geometry.dimensions;
                    prop_assert!(0.0 < d.magnet_radius);
                    prop_assert!(d.magnet_radius < d.rotor_radius);
                    prop_assert!(d.rotor_radius < d.pole_tip_radius);
                    prop_assert!(d.pole_tip_radius < d.inner_stator_radius);
                    prop_assert!(d.inner_stator_radius < d.outer_stator_radius);
                    prop_assert!(d.tooth_angle < d.tooth_pitch);
                    prop_assert_eq!(geometry.bore_nodes().len(), 4 * pole_pairs);
                    prop_assert_eq!(geometry.tip_nodes().len(), 4 * pole_pairs);
                }
                Err(err) => prop_assert!(matches!(err, MotorError::Config(_))),
            }
        }
    }
}
