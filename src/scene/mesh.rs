use std::{fs, path::Path, sync::Arc};

use indexmap::IndexMap;
use nalgebra::Unit;
use thiserror::Error;

use crate::geometry::{EPSILON, FloatType, Ray, WorldBox, WorldPoint, WorldVector};

use super::{KdTree, Object, Surface, Trace, Triangle};

/// Corner shared by mesh faces. The normal is None when the source gave none.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshVertex {
    pub position: WorldPoint,
    pub normal: Option<WorldVector>,
}

/// Mesh triangle with a normal per corner, interpolated across the face.
#[derive(Clone, Debug)]
pub struct MeshFace {
    pub triangle: Triangle,
    pub vertex_indices: [usize; 3],
    normals: [WorldVector; 3],
}

impl MeshFace {
    /// Shading normal at barycentric coordinates `u`, `v`, as returned by `Triangle::intersect`.
    pub fn normal_at(&self, u: FloatType, v: FloatType) -> Unit<WorldVector> {
        let [n0, n1, n2] = self.normals;
        let normal = n0 * (1.0 - u - v) + n1 * u + n2 * v;
        Unit::try_new(normal, EPSILON).unwrap_or_else(|| self.triangle.normal())
    }
}

impl Object for MeshFace {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        let (t, u, v) = self.triangle.intersect(ray)?;
        Some(Trace::new(ray, t, self.normal_at(u, v), self.triangle.surface))
    }

    fn get_aabb(&self) -> WorldBox {
        self.triangle.get_aabb()
    }
}

/// Smooth shaded triangle mesh answering ray queries through its own kd-tree.
#[derive(Debug)]
pub struct Mesh {
    vertices: Vec<MeshVertex>,
    tree: KdTree<MeshFace>,
}

impl Mesh {
    /// Builds a mesh from a vertex table and faces indexing into it.
    /// Faces with out of range indices or no area are skipped.
    /// Vertices without a normal get the area weighted average of their faces' normals.
    pub fn new(
        vertices: Vec<MeshVertex>,
        faces: impl IntoIterator<Item = [usize; 3]>,
        surface: Surface,
    ) -> Self {
        let mut kept = Vec::new();
        let mut skipped = 0usize;
        let mut face_normal_sums = vec![WorldVector::zeros(); vertices.len()];

        for indices in faces {
            if indices.iter().any(|&i| i >= vertices.len()) {
                skipped += 1;
                continue;
            }

            let [a, b, c] = indices.map(|i| vertices[i].position);
            // Length is twice the face area
            let cross = (b - a).cross(&(c - a));
            if cross.norm() < EPSILON {
                skipped += 1;
                continue;
            }

            for i in indices {
                face_normal_sums[i] += cross;
            }
            kept.push((indices, Triangle::new(a, b, c, surface)));
        }

        let vertex_normals: Vec<Option<WorldVector>> = vertices
            .iter()
            .zip(&face_normal_sums)
            .map(|(vertex, sum)| {
                let normal = vertex.normal.unwrap_or(*sum);
                Unit::try_new(normal, EPSILON).map(Unit::into_inner)
            })
            .collect();

        let faces: Vec<Arc<MeshFace>> = kept
            .into_iter()
            .map(|(vertex_indices, triangle)| {
                let flat = triangle.normal().into_inner();
                Arc::new(MeshFace {
                    triangle,
                    vertex_indices,
                    normals: vertex_indices.map(|i| vertex_normals[i].unwrap_or(flat)),
                })
            })
            .collect();

        tracing::debug!(faces = faces.len(), skipped, "mesh built");

        let tree = KdTree::builder().objects(faces).build();
        Mesh { vertices, tree }
    }

    /// Loads all triangles of a Wavefront OBJ file, all with the same surface.
    /// Vertex normals are taken from the file where present.
    /// Other primitives and degenerate faces are skipped.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn with_obj(path: impl AsRef<Path>, surface: Surface) -> Result<Mesh, ObjOpenError> {
        let content = fs::read_to_string(path)?;
        let parsed = wavefront_obj::obj::parse(content)?;
        let (vertices, faces) = load_obj(parsed);
        Ok(Self::new(vertices, faces, surface))
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn faces(&self) -> impl ExactSizeIterator<Item = &Arc<MeshFace>> {
        self.tree.objects()
    }

    pub fn tree(&self) -> &KdTree<MeshFace> {
        &self.tree
    }
}

impl Object for Mesh {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        self.tree.get_trace(ray)
    }

    fn get_aabb(&self) -> WorldBox {
        *self.tree.region()
    }
}

/// Vertex table and triangle list of all objects in the file.
/// Corners sharing both position and normal become one vertex.
fn load_obj(obj: wavefront_obj::obj::ObjSet) -> (Vec<MeshVertex>, Vec<[usize; 3]>) {
    let mut vertices = IndexMap::new();
    let mut faces = Vec::new();
    let mut skipped = 0usize;

    for (object_index, o) in obj.objects.into_iter().enumerate() {
        for geometry in o.geometry {
            for shape in geometry.shapes {
                let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                    skipped += 1;
                    continue;
                };

                faces.push([a, b, c].map(|(position_index, _texture_index, normal_index)| {
                    let entry = vertices.entry((object_index, position_index, normal_index));
                    let index = entry.index();
                    entry.or_insert_with(|| {
                        let v = &o.vertices[position_index];
                        MeshVertex {
                            position: WorldPoint::new(v.x, v.y, v.z),
                            normal: normal_index.map(|i| {
                                let n = &o.normals[i];
                                WorldVector::new(n.x, n.y, n.z)
                            }),
                        }
                    });
                    index
                }));
            }
        }
    }

    tracing::info!(
        vertices = vertices.len(),
        faces = faces.len(),
        skipped,
        "mesh loaded"
    );
    (vertices.into_values().collect(), faces)
}

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),
}
