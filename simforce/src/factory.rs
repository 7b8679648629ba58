//! Constructors that pick a force variant from mesh and position dimensions.
//!
//! The ambient dimension `m` is the number of columns of the positions and the element dimension
//! `d` is one less than the number of vertices per element. Supported pairs are enumerated by
//! `ElementDimensions`.

use crate::bending::LinearBendingElements;
use crate::finite_volume::{FiniteVolume, LinearFiniteVolume};
use crate::material::*;
use crate::mesh::{SegmentMesh, SimplexMesh, TriangleMesh};
use crate::springs::Springs;
use crate::strain::{StrainKind, StrainMeasure};
use crate::{Error, VectorField};

/// Supported `(ambient, element)` dimension pairs for strain measures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementDimensions {
    /// Triangles in 2D: `(2, 2)`.
    Planar,
    /// Triangles in 3D: `(3, 2)`.
    Shell,
    /// Tetrahedra in 3D: `(3, 3)`.
    Volume,
    /// Hexahedra in 3D, encoded with element dimension 7: `(3, 7)`.
    Hexahedral,
}

impl ElementDimensions {
    pub fn from_shape(ambient: usize, element: usize) -> Result<Self, Error> {
        match (ambient, element) {
            (2, 2) => Ok(ElementDimensions::Planar),
            (3, 2) => Ok(ElementDimensions::Shell),
            (3, 3) => Ok(ElementDimensions::Volume),
            (3, 7) => Ok(ElementDimensions::Hexahedral),
            _ => Err(Error::UnsupportedDimensions { ambient, element }),
        }
    }

    pub fn strain_kind(self) -> StrainKind {
        match self {
            ElementDimensions::Planar => StrainKind::Planar,
            ElementDimensions::Shell => StrainKind::Shell,
            ElementDimensions::Volume => StrainKind::Volume,
            ElementDimensions::Hexahedral => StrainKind::Hexahedral,
        }
    }
}

/// Springs along every edge of `mesh`.
pub fn edge_springs<const K: usize>(
    mesh: &SimplexMesh<K>,
    mass: &[f64],
    x: &VectorField,
    stiffness: f64,
    damping_ratio: f64,
) -> Result<Springs, Error> {
    Springs::new(
        &mesh.segment_mesh().elements,
        mass,
        x,
        stiffness,
        damping_ratio,
    )
}

/// Springs joining the two vertices opposite each interior edge of `mesh`.
pub fn bending_springs(
    mesh: &TriangleMesh,
    mass: &[f64],
    x: &VectorField,
    stiffness: f64,
    damping_ratio: f64,
) -> Result<Springs, Error> {
    let springs: Vec<[usize; 2]> = mesh
        .bending_quadruples()
        .into_iter()
        .map(|[o0, _, _, o1]| [o0, o1])
        .collect();
    Springs::new(&springs, mass, x, stiffness, damping_ratio)
}

/// Finite volume force over simplices.
///
/// `model` is either a constitutive model or a `ByElementDimension` map resolved by the
/// element dimension. Altitude statistics are logged when `verbose` is set.
pub fn finite_volume<const K: usize, M, R>(
    elements: &[[usize; K]],
    density: f64,
    x: &VectorField,
    model: R,
    plasticity: Option<StretchLimitPlasticity>,
    verbose: bool,
) -> Result<FiniteVolume<M>, Error>
where
    M: ConstitutiveModel,
    R: ResolveModel<M>,
{
    let element = K.saturating_sub(1);
    let dims = ElementDimensions::from_shape(x.ncols(), element)?;
    let kind = match dims {
        ElementDimensions::Hexahedral => {
            return Err(Error::UnsupportedDimensions {
                ambient: x.ncols(),
                element,
            })
        }
        dims => dims.strain_kind(),
    };
    let strain = StrainMeasure::new(kind, elements, x)?;
    if verbose {
        strain.print_altitude_statistics();
    }
    let model = model.resolve(element)?;
    FiniteVolume::new(strain, density, model, plasticity)
}

/// Linear elastic finite volume force. Hexahedra (eight vertices per element) dispatch to
/// trilinear quadrature.
pub fn linear_finite_volume<const K: usize>(
    elements: &[[usize; K]],
    x: &VectorField,
    density: f64,
    youngs_modulus: f64,
    poissons_ratio: f64,
    rayleigh_coefficient: f64,
) -> Result<LinearFiniteVolume, Error> {
    let dims = ElementDimensions::from_shape(x.ncols(), K.saturating_sub(1))?;
    let strain = StrainMeasure::new(dims.strain_kind(), elements, x)?;
    let model = LinearElasticity::new(youngs_modulus, poissons_ratio, rayleigh_coefficient);
    FiniteVolume::new(strain, density, model, None)
}

/// Neo-Hookean models for triangles and tetrahedra sharing the same parameters.
pub fn neo_hookean(
    youngs_modulus: f64,
    poissons_ratio: f64,
    rayleigh_coefficient: f64,
    failure_threshold: f64,
) -> ByElementDimension<NeoHookean> {
    let model = NeoHookean::new(
        youngs_modulus,
        poissons_ratio,
        rayleigh_coefficient,
        failure_threshold,
    );
    ByElementDimension {
        planar: Some(model),
        volumetric: Some(model),
    }
}

/// A bending mesh: curves bend in the plane and surfaces in space.
#[derive(Copy, Clone, Debug)]
pub enum BendingMesh<'a> {
    Curve(&'a SegmentMesh),
    Surface(&'a TriangleMesh),
}

impl<'a> From<&'a SegmentMesh> for BendingMesh<'a> {
    fn from(mesh: &'a SegmentMesh) -> Self {
        BendingMesh::Curve(mesh)
    }
}

impl<'a> From<&'a TriangleMesh> for BendingMesh<'a> {
    fn from(mesh: &'a TriangleMesh) -> Self {
        BendingMesh::Surface(mesh)
    }
}

/// Linear bending elements chosen by the ambient dimension of `x`: curves for `m = 2` and
/// surfaces for `m = 3`.
pub fn linear_bending_elements<'a>(
    mesh: impl Into<BendingMesh<'a>>,
    x: &VectorField,
    stiffness: f64,
    damping: f64,
) -> Result<LinearBendingElements, Error> {
    let mut bend = match (x.ncols(), mesh.into()) {
        (2, BendingMesh::Curve(mesh)) => LinearBendingElements::curve(mesh, x)?,
        (3, BendingMesh::Surface(mesh)) => LinearBendingElements::surface(mesh, x)?,
        (ambient, BendingMesh::Curve(_)) => {
            return Err(Error::UnsupportedDimensions { ambient, element: 1 })
        }
        (ambient, BendingMesh::Surface(_)) => {
            return Err(Error::UnsupportedDimensions { ambient, element: 2 })
        }
    };
    bend.stiffness = stiffness;
    bend.damping = damping;
    Ok(bend)
}
