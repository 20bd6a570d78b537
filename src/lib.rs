//! # polytess
//!
//! `polytess` builds Voronoi tessellations on a quantized mesh, in Rust as well as compiled to
//! WebAssembly (WASM). Every position is snapped onto an integer lattice before it becomes a
//! node, so Voronoi vertices computed independently from different cells merge into one node and
//! neighbouring cells share their edges and faces exactly.
//!
//! ## Features
//!
//! - **Unbounded 2D diagrams**: built as the dual of a Delaunay triangulation, with the open
//!   outer cells closed along a circle far outside the generators, and a closed-form
//!   construction for collinear input.
//! - **Boundary clipping**: cells are clipped against a box, the generator hull or a piecewise
//!   linear complex with holes; fragments cut off from their generator are merged into
//!   neighbouring cells so the domain is covered exactly once.
//! - **3D box tessellation**: convex cells clipped out of a box in parallel and merged into one
//!   shared-face mesh.
//! - **Lloyd relaxation** towards centroidal tessellations.
//! - **WASM-first**: the 2D tessellator is exposed through `wasm-bindgen`.
//!
//! ## Example
//!
//! ```
//! use polytess::{DelaunayTessellator, Tessellator, BoundingBox};
//!
//! let generators = [0.25, 0.25, 0.75, 0.25, 0.25, 0.75, 0.75, 0.75];
//! let mesh = DelaunayTessellator::new()
//!     .tessellate_in_box(&generators, &BoundingBox::new([0.0, 0.0], [1.0, 1.0]))
//!     .unwrap();
//! assert_eq!(mesh.num_cells(), 4);
//! assert_eq!(mesh.num_nodes(), 9);
//! ```
//!
//! See the `demos/` directory for SVG plotting and JSON export.
//!
//! ## Main Interface
//!
//! The entry points are the [`Tessellator`] implementations [`DelaunayTessellator`] and
//! [`BoxTessellator3D`], which return a [`Tessellation`]. The intermediate quantized mesh,
//! [`QuantTessellation`], is public for callers that need the unbounded diagram or its hashes.

pub mod algorithm;
pub mod boundary;
mod bounds;
pub mod delaunay;
mod errors;
pub mod geometry;
pub mod hasher;
pub mod plc;
pub mod polyhedron;
pub mod quant_tessellation;
pub mod relax;
mod tessellation;
pub mod tessellator;
pub mod unbounded;
pub mod wasm;

pub use boundary::{Boundary, ClipMode, clip_cells};
pub use bounds::BoundingBox;
pub use delaunay::{Delaunator, DelaunayConnectivity, Triangulator};
pub use errors::{Result, TessellationError};
pub use hasher::{Hasher, PointHash};
pub use plc::Plc;
pub use quant_tessellation::{LabFrame, QuantTessellation, Validate};
pub use relax::{lloyd_step, relax};
pub use tessellation::{Tessellation, positive_id, signed_id};
pub use tessellator::{BoxTessellator3D, DelaunayTessellator, Tessellator, TessellatorConfig};
pub use unbounded::{UnboundedTessellation, build_unbounded};
