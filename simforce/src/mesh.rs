//! Simplex meshes and the topological queries used to build forces from them.
//!
//! A mesh is an immutable list of elements, each an ordered array of `K` vertex indices. The
//! element dimension is `K - 1`: segments have 2 vertices, triangles 3 and tetrahedra 4.

use ahash::AHashMap;

use crate::Error;

/// An ordered collection of elements with `K` vertices each.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimplexMesh<const K: usize> {
    pub elements: Vec<[usize; K]>,
}

pub type SegmentMesh = SimplexMesh<2>;
pub type TriangleMesh = SimplexMesh<3>;
pub type TetMesh = SimplexMesh<4>;

impl<const K: usize> SimplexMesh<K> {
    pub fn new(elements: Vec<[usize; K]>) -> Self {
        SimplexMesh { elements }
    }

    /// Number of vertices minus one.
    pub fn element_dimension(&self) -> usize {
        K - 1
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// One more than the largest referenced vertex index.
    pub fn num_vertices(&self) -> usize {
        self.elements
            .iter()
            .flat_map(|e| e.iter())
            .max()
            .map_or(0, |&v| v + 1)
    }

    /// Check that every element references a vertex in `0..num_vertices`.
    pub fn validate(&self, num_vertices: usize) -> Result<(), Error> {
        validate_elements(&self.elements, num_vertices)
    }

    /// The edge skeleton of this mesh: every pair of vertices sharing an element, without
    /// duplicates, each stored with the smaller index first and sorted.
    pub fn segment_mesh(&self) -> SegmentMesh {
        let mut edges: Vec<[usize; 2]> = Vec::with_capacity(self.elements.len() * K);
        for element in self.elements.iter() {
            for i in 0..K {
                for j in i + 1..K {
                    let (a, b) = (element[i], element[j]);
                    if a != b {
                        edges.push([a.min(b), a.max(b)]);
                    }
                }
            }
        }
        edges.sort_unstable();
        edges.dedup();
        SegmentMesh::new(edges)
    }
}

impl<const K: usize> AsRef<[[usize; K]]> for SimplexMesh<K> {
    fn as_ref(&self) -> &[[usize; K]] {
        &self.elements
    }
}

impl<const K: usize> From<Vec<[usize; K]>> for SimplexMesh<K> {
    fn from(elements: Vec<[usize; K]>) -> Self {
        SimplexMesh::new(elements)
    }
}

impl SegmentMesh {
    /// Bending triples `[i, j, k]` for every vertex `j` with exactly two incident segments.
    ///
    /// When the curve is consistently oriented `i` precedes `j` and `k` follows it. Triples are
    /// sorted by their middle vertex.
    pub fn bending_triples(&self) -> Vec<[usize; 3]> {
        let mut incident: AHashMap<usize, Vec<(usize, bool)>> = AHashMap::new();
        for &[a, b] in self.elements.iter() {
            incident.entry(a).or_default().push((b, false));
            incident.entry(b).or_default().push((a, true));
        }

        let mut triples: Vec<[usize; 3]> = incident
            .into_iter()
            .filter_map(|(j, neighbours)| match neighbours.as_slice() {
                // `true` marks the neighbour at the start of the segment, i.e. a predecessor.
                &[(n0, false), (n1, true)] => Some([n1, j, n0]),
                &[(n0, _), (n1, _)] => Some([n0, j, n1]),
                _ => None,
            })
            .collect();
        triples.sort_unstable_by_key(|t| t[1]);
        triples
    }
}

impl TriangleMesh {
    /// Bending quadruples `[o0, a, b, o1]` for every edge shared by exactly two faces.
    ///
    /// ```verbatim
    ///      o1
    ///      /\
    ///     /f1\
    ///   b/____\a
    ///    \    /
    ///     \f0/
    ///      \/
    ///      o0
    /// ```
    ///
    /// `a -> b` is the shared edge oriented as in the first face `f0`, `o0` is the remaining
    /// vertex of `f0` and `o1` is the remaining vertex of the second face `f1`. Boundary and
    /// non-manifold edges produce no quadruples. Quadruples are sorted by their shared edge.
    pub fn bending_quadruples(&self) -> Vec<[usize; 4]> {
        // Undirected edge -> (directed start, directed end, opposite vertex) per incident face.
        let mut edge_faces: AHashMap<[usize; 2], Vec<[usize; 3]>> = AHashMap::new();
        for &[v0, v1, v2] in self.elements.iter() {
            for [a, b, o] in [[v0, v1, v2], [v1, v2, v0], [v2, v0, v1]] {
                edge_faces
                    .entry([a.min(b), a.max(b)])
                    .or_default()
                    .push([a, b, o]);
            }
        }

        let mut quadruples: Vec<([usize; 2], [usize; 4])> = edge_faces
            .into_iter()
            .filter_map(|(edge, faces)| match faces.as_slice() {
                &[[a, b, o0], [_, _, o1]] => Some((edge, [o0, a, b, o1])),
                _ => None,
            })
            .collect();
        quadruples.sort_unstable_by_key(|(edge, _)| *edge);
        quadruples.into_iter().map(|(_, q)| q).collect()
    }
}

/// Check that every element references a vertex in `0..num_vertices`.
pub fn validate_elements<const K: usize>(
    elements: &[[usize; K]],
    num_vertices: usize,
) -> Result<(), Error> {
    for (element, vertices) in elements.iter().enumerate() {
        if let Some(&vertex) = vertices.iter().find(|&&v| v >= num_vertices) {
            return Err(Error::InvalidIndex {
                element,
                vertex,
                num_vertices,
            });
        }
    }
    Ok(())
}
