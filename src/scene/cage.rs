use glam::Vec3;

use super::color::Color;
use super::LineVertex;

const AXIS_ALPHA: f32 = 0.9;
const EDGE_ALPHA: f32 = 0.15;

/// World-space anchor for a numeric tick label; the overlay compositor
/// projects it to screen space after the 3D pass.
pub struct AxisLabel {
    pub position: Vec3,
    pub text: String,
}

/// Static reference geometry around the terrain: three axis lines from the
/// shared origin corner, tick gridlines, the remaining box edges at low
/// opacity, and label anchors. Independent of audio data.
pub struct CageGeometry {
    pub lines: Vec<LineVertex>,
    pub labels: Vec<AxisLabel>,
}

pub fn build_cage(volume_size: f32, ticks: usize, color: Color) -> CageGeometry {
    let s = volume_size;
    let mut lines = Vec::new();
    let axis = color.with_alpha(AXIS_ALPHA);
    let edge = color.with_alpha(EDGE_ALPHA);

    let mut push = |a: Vec3, b: Vec3, c: [f32; 4]| {
        lines.push(LineVertex { position: a.to_array(), color: c });
        lines.push(LineVertex { position: b.to_array(), color: c });
    };

    let o = Vec3::ZERO;
    let x = Vec3::new(s, 0.0, 0.0);
    let y = Vec3::new(0.0, s, 0.0);
    let z = Vec3::new(0.0, 0.0, s);

    // Axis lines: frequency along X, amplitude along Y, time along Z.
    push(o, x, axis);
    push(o, y, axis);
    push(o, z, axis);

    // Remaining nine box edges.
    push(x, x + y, edge);
    push(x, x + z, edge);
    push(z, z + y, edge);
    push(z, x + z, edge);
    push(y, x + y, edge);
    push(y, y + z, edge);
    push(x + y, x + y + z, edge);
    push(y + z, x + y + z, edge);
    push(x + z, x + y + z, edge);

    // Tick gridlines on the floor and the two walls meeting the Y axis.
    for i in 1..=ticks {
        let d = i as f32 / ticks as f32 * s;
        push(Vec3::new(0.0, 0.0, d), Vec3::new(s, 0.0, d), edge);
        push(Vec3::new(d, 0.0, 0.0), Vec3::new(d, 0.0, s), edge);
        push(Vec3::new(0.0, d, 0.0), Vec3::new(0.0, d, s), edge);
        push(Vec3::new(0.0, d, 0.0), Vec3::new(s, d, 0.0), edge);
    }

    let mut labels = Vec::new();
    for i in 1..=ticks {
        let frac = i as f32 / ticks as f32;
        let d = frac * s;
        let text = format!("{frac:.2}");
        labels.push(AxisLabel { position: Vec3::new(d, 0.0, 0.0), text: text.clone() });
        labels.push(AxisLabel { position: Vec3::new(0.0, d, 0.0), text: text.clone() });
        labels.push(AxisLabel { position: Vec3::new(0.0, 0.0, d), text });
    }

    CageGeometry { lines, labels }
}
