use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::color::ColorScheme;
use crate::audio::spectrogram::SpectrogramMatrix;

/// Peak energy reaches 70% of the volume so the terrain never touches the
/// top of the cage.
pub const HEIGHT_HEADROOM: f32 = 0.7;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

/// Renderable grid mesh: one vertex per matrix cell, two triangles per
/// grid quad. Held by the builder, consumed read-only by the renderer.
pub struct TerrainMesh {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    time_bins: usize,
    freq_bins: usize,
}

impl TerrainMesh {
    fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            bounds_min: Vec3::ZERO,
            bounds_max: Vec3::ZERO,
            time_bins: 0,
            freq_bins: 0,
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.time_bins, self.freq_bins)
    }
}

pub struct TerrainMeshBuilder {
    volume_size: f32,
    mesh: TerrainMesh,
}

impl TerrainMeshBuilder {
    pub fn new(volume_size: f32) -> Self {
        Self {
            volume_size,
            mesh: TerrainMesh::empty(),
        }
    }

    /// Rebuild heights and colors from a matrix. Buffer reallocation only
    /// happens through `resize`, and only when the grid dimensions differ
    /// from the allocated ones; a same-shape rebuild mutates in place.
    /// Normals and bounds are recomputed before the mesh is returned.
    pub fn build(&mut self, matrix: &SpectrogramMatrix, scheme: &ColorScheme) -> &TerrainMesh {
        let (time_bins, freq_bins) = (matrix.time_bins(), matrix.freq_bins());
        if self.mesh.dims() != (time_bins, freq_bins) {
            self.resize(time_bins, freq_bins);
        }

        let peak = matrix.normalization_peak();
        let max_height = self.volume_size * HEIGHT_HEADROOM;

        for t in 0..time_bins {
            for f in 0..freq_bins {
                let level = matrix.at(t, f) / peak;
                let vertex = &mut self.mesh.vertices[t * freq_bins + f];
                vertex.position[1] = level * max_height;
                vertex.color = scheme
                    .vertex_color(f as f32 / (freq_bins - 1) as f32, level)
                    .to_array();
            }
        }

        self.recompute_normals();
        self.recompute_bounds();
        &self.mesh
    }

    /// Reallocate vertex and index buffers for a new grid. A buffer sized
    /// for one grid is never reused for a different one.
    pub fn resize(&mut self, time_bins: usize, freq_bins: usize) {
        log::debug!("Reallocating terrain grid: {time_bins}x{freq_bins}");

        let mut vertices = Vec::with_capacity(time_bins * freq_bins);
        for t in 0..time_bins {
            for f in 0..freq_bins {
                // Frequency runs along X, time along Z; matrix rows are
                // newest-first, so the clip's start sits at the far side
                // and the sweep travels toward the origin.
                let x = f as f32 / (freq_bins - 1).max(1) as f32 * self.volume_size;
                let z = t as f32 / (time_bins - 1).max(1) as f32 * self.volume_size;
                vertices.push(TerrainVertex {
                    position: [x, 0.0, z],
                    normal: [0.0, 1.0, 0.0],
                    color: [0.0, 0.0, 0.0],
                });
            }
        }

        let mut indices = Vec::with_capacity(time_bins.saturating_sub(1) * freq_bins.saturating_sub(1) * 6);
        for t in 0..time_bins.saturating_sub(1) {
            for f in 0..freq_bins.saturating_sub(1) {
                let top_left = (t * freq_bins + f) as u32;
                let top_right = top_left + 1;
                let bottom_left = ((t + 1) * freq_bins + f) as u32;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        self.mesh = TerrainMesh {
            vertices,
            indices,
            bounds_min: Vec3::ZERO,
            bounds_max: Vec3::ZERO,
            time_bins,
            freq_bins,
        };
    }

    fn recompute_normals(&mut self) {
        let mesh = &mut self.mesh;
        let mut accumulated = vec![Vec3::ZERO; mesh.vertices.len()];

        for tri in mesh.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let p0 = Vec3::from_array(mesh.vertices[i0].position);
            let p1 = Vec3::from_array(mesh.vertices[i1].position);
            let p2 = Vec3::from_array(mesh.vertices[i2].position);
            let face = (p1 - p0).cross(p2 - p0);
            accumulated[i0] += face;
            accumulated[i1] += face;
            accumulated[i2] += face;
        }

        for (vertex, normal) in mesh.vertices.iter_mut().zip(accumulated) {
            let n = normal.normalize_or_zero();
            vertex.normal = if n == Vec3::ZERO { [0.0, 1.0, 0.0] } else { n.to_array() };
        }
    }

    fn recompute_bounds(&mut self) {
        let mesh = &mut self.mesh;
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in &mesh.vertices {
            let p = Vec3::from_array(vertex.position);
            min = min.min(p);
            max = max.max(p);
        }
        if mesh.vertices.is_empty() {
            min = Vec3::ZERO;
            max = Vec3::ZERO;
        }
        mesh.bounds_min = min;
        mesh.bounds_max = max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrogram::{SpectrogramMatrix, FREQ_BINS, TIME_BINS};
    use crate::scene::color::{Color, ColorScheme};

    fn flat_matrix(value: f32) -> SpectrogramMatrix {
        SpectrogramMatrix::from_values(vec![value; TIME_BINS * FREQ_BINS])
    }

    fn single_scheme() -> ColorScheme {
        ColorScheme::new(&[Color::WHITE]).unwrap()
    }

    #[test]
    fn silence_builds_flat_mesh_without_nans() {
        let mut builder = TerrainMeshBuilder::new(10.0);
        let mesh = builder.build(&flat_matrix(0.0), &single_scheme());

        assert_eq!(mesh.vertices.len(), TIME_BINS * FREQ_BINS);
        for vertex in &mesh.vertices {
            assert_eq!(vertex.position[1], 0.0);
            assert!(vertex.position.iter().all(|v| v.is_finite()));
        }
        assert_eq!(mesh.bounds_max.y, 0.0);
    }

    #[test]
    fn peak_cell_reaches_headroom_height() {
        let mut values = vec![0.0f32; TIME_BINS * FREQ_BINS];
        values[5 * FREQ_BINS + 7] = 200.0;
        let matrix = SpectrogramMatrix::from_values(values);

        let mut builder = TerrainMeshBuilder::new(10.0);
        let mesh = builder.build(&matrix, &single_scheme());

        let peak_y = mesh.vertices[5 * FREQ_BINS + 7].position[1];
        assert!((peak_y - 7.0).abs() < 1e-4);
        assert!((mesh.bounds_max.y - 7.0).abs() < 1e-4);
    }

    #[test]
    fn height_is_monotonic_in_amplitude() {
        let mut values = vec![0.0f32; TIME_BINS * FREQ_BINS];
        values[0] = 10.0;
        values[1] = 20.0;
        values[2] = 40.0;
        let matrix = SpectrogramMatrix::from_values(values);

        let mut builder = TerrainMeshBuilder::new(10.0);
        let mesh = builder.build(&matrix, &single_scheme());

        let h = |i: usize| mesh.vertices[i].position[1];
        assert!(h(0) < h(1));
        assert!(h(1) < h(2));
    }

    #[test]
    fn dual_color_endpoints_match_supplied_colors() {
        let a = Color { r: 1.0, g: 0.2, b: 0.2 };
        let b = Color { r: 0.2, g: 0.2, b: 1.0 };
        let scheme = ColorScheme::new(&[a, b]).unwrap();

        // Uniform full-scale matrix: darken factor is 1 everywhere.
        let mut builder = TerrainMeshBuilder::new(10.0);
        let mesh = builder.build(&flat_matrix(100.0), &scheme);

        assert_eq!(mesh.vertices[0].color, a.to_array());
        assert_eq!(mesh.vertices[FREQ_BINS - 1].color, b.to_array());
    }

    #[test]
    fn single_color_is_uniform_across_vertices() {
        let mut values = vec![0.0f32; TIME_BINS * FREQ_BINS];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (i % 97) as f32;
        }
        let matrix = SpectrogramMatrix::from_values(values);

        let mut builder = TerrainMeshBuilder::new(10.0);
        let mesh = builder.build(&matrix, &single_scheme());

        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.color == Color::WHITE.to_array()));
    }

    #[test]
    fn resize_reallocates_vertex_and_index_buffers() {
        let mut builder = TerrainMeshBuilder::new(10.0);

        builder.resize(4, 4);
        assert_eq!(builder.mesh.vertices.len(), 16);
        assert_eq!(builder.mesh.indices.len(), 3 * 3 * 6);

        builder.resize(2, 3);
        assert_eq!(builder.mesh.dims(), (2, 3));
        assert_eq!(builder.mesh.vertices.len(), 6);
        assert_eq!(builder.mesh.indices.len(), 1 * 2 * 6);
    }

    #[test]
    fn normals_are_unit_length_after_build() {
        let mut values = vec![0.0f32; TIME_BINS * FREQ_BINS];
        for (i, v) in values.iter_mut().enumerate() {
            *v = ((i * 31) % 113) as f32;
        }
        let matrix = SpectrogramMatrix::from_values(values);

        let mut builder = TerrainMeshBuilder::new(10.0);
        let mesh = builder.build(&matrix, &single_scheme());

        for vertex in &mesh.vertices {
            let len = Vec3::from_array(vertex.normal).length();
            assert!((len - 1.0).abs() < 1e-4);
        }
    }
}
