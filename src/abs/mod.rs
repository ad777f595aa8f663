//! This module contains the OpenGL layer of the viewer: window and context setup,
//! shader program building and GPU mesh handling.

pub mod app;
pub mod mesh;
pub mod shader;

pub use app::*;
pub use mesh::*;
pub use shader::*;
