//! UV remapping into atlas space.
//!
//! Every submesh's UVs are moved into the rectangle its texture occupies in
//! the atlas, then all triangle lists are merged into a single submesh.

use super::Mesh;
use crate::atlas::UvRect;
use crate::texture::MaterialTextureIndex;
use log::{debug, warn};

/// Prefix marking a mesh produced by [`remap`].
pub const COMBINED_MESH_PREFIX: &str = "Combined_";

pub fn combined_mesh_name(original: &str) -> String {
    format!("{}{}", COMBINED_MESH_PREFIX, original)
}

/// What happened to each submesh during a remap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapReport {
    /// Submeshes whose UVs were moved and triangles merged.
    pub remapped_submeshes: Vec<usize>,
    /// Submeshes with no usable atlas rect; their triangles are left out.
    pub skipped_submeshes: Vec<usize>,
    /// Triangles dropped for referencing a missing vertex, or left incomplete.
    pub dropped_triangles: usize,
    /// Individual indices outside the vertex/UV arrays.
    pub out_of_range_indices: usize,
}

/// Remap `mesh` into atlas space.
///
/// `index` maps submesh ordinal to an entry of `rects`. Positions, normals
/// and tangents are copied untouched. A vertex referenced from several
/// submeshes ends up in the rect of the last one; vertices no submesh
/// references keep their original UV.
pub fn remap(mesh: &Mesh, index: &MaterialTextureIndex, rects: &[UvRect]) -> (Mesh, RemapReport) {
    let mut report = RemapReport::default();
    let mut uv = mesh.uv.clone();
    let mut merged = Vec::with_capacity(mesh.submeshes.iter().map(Vec::len).sum());

    // An index must address both arrays
    let limit = mesh.uv.len().min(mesh.vertices.len());

    if mesh.submesh_count() != index.len() {
        debug!(
            "Mesh {} has {} submeshes for {} mapped materials",
            mesh.name,
            mesh.submesh_count(),
            index.len()
        );
    }

    for (submesh, triangles) in mesh.submeshes.iter().enumerate() {
        let Some(rect) = index.get(&submesh).and_then(|&t| rects.get(t)) else {
            warn!(
                "No atlas rect for submesh {} of {}, skipping it",
                submesh, mesh.name
            );
            report.skipped_submeshes.push(submesh);
            continue;
        };

        for &i in triangles {
            let i = i as usize;
            if i < limit {
                uv[i] = rect.transform_uv(mesh.uv[i]);
            } else {
                report.out_of_range_indices += 1;
            }
        }

        let before = merged.len();
        for triangle in triangles.chunks(3) {
            if triangle.len() == 3 && triangle.iter().all(|&i| (i as usize) < limit) {
                merged.extend_from_slice(triangle);
            } else {
                report.dropped_triangles += 1;
            }
        }

        debug!(
            "Submesh {} -> rect ({:.4}, {:.4}, {:.4}x{:.4}), {} triangles",
            submesh,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            (merged.len() - before) / 3
        );
        report.remapped_submeshes.push(submesh);
    }

    if report.dropped_triangles > 0 {
        warn!(
            "Dropped {} triangles of {} with out-of-range indices",
            report.dropped_triangles, mesh.name
        );
    }

    let mut combined = Mesh {
        name: combined_mesh_name(&mesh.name),
        vertices: mesh.vertices.clone(),
        normals: mesh.normals.clone(),
        tangents: mesh.tangents.clone(),
        uv,
        submeshes: vec![merged],
        bounds: None,
    };
    combined.recalculate_bounds();

    (combined, report)
}
