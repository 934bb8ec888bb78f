pub mod cage;
pub mod color;
pub mod scanner;
pub mod terrain;

use bytemuck::{Pod, Zeroable};

/// Vertex format shared by the cage lines, the scan crest and the curtain.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}
