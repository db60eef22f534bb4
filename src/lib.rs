pub mod config;
pub mod csg;
pub mod dims;
pub mod generator;
pub mod mesher;
pub mod output;
pub mod plot;
pub mod residuals;

pub use config::{CaseConfig, CasePaths, Symmetry};
pub use dims::{BodyDims, BodyParams};
pub use generator::AhmedGenerator;
pub use mesher::TriMesh;
pub use output::MeshWriter;

pub type Float = f64;
