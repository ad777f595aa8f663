//! OpenGL Shaders
//!
//! This module defines the [`Shader`] and [`ShaderProgram`] structs for managing OpenGL shaders.
//! Programs are usually built straight from GLSL files on disk with
//! [`ShaderProgram::from_files`]. This module also provides the [`Uniform`] trait for setting
//! uniform variables in shader programs.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use glam::{Mat4, Vec3};
use glow::HasContext;

/// A stage of the shader pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
}

impl ShaderStage {
    /// The OpenGL shader type constant for this stage.
    pub fn gl_type(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Geometry => glow::GEOMETRY_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Geometry => "GEOMETRY",
            ShaderStage::Fragment => "FRAGMENT",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Paths to the GLSL source of each stage. The geometry stage is optional.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderSources {
    pub vertex: PathBuf,
    pub geometry: Option<PathBuf>,
    pub fragment: PathBuf,
}

impl ShaderSources {
    pub fn new(
        vertex: impl Into<PathBuf>,
        geometry: Option<PathBuf>,
        fragment: impl Into<PathBuf>,
    ) -> Self {
        Self {
            vertex: vertex.into(),
            geometry,
            fragment: fragment.into(),
        }
    }

    /// The stages to build, in attach order. An absent geometry stage is left out entirely.
    pub fn stages(&self) -> Vec<(ShaderStage, &Path)> {
        let mut stages = vec![(ShaderStage::Vertex, self.vertex.as_path())];
        if let Some(geometry) = &self.geometry {
            stages.push((ShaderStage::Geometry, geometry.as_path()));
        }
        stages.push((ShaderStage::Fragment, self.fragment.as_path()));
        stages
    }
}

/// Errors raised while building a shader program.
#[derive(Debug)]
pub enum ShaderError {
    Read {
        stage: ShaderStage,
        path: PathBuf,
        source: io::Error,
    },
    /// OpenGL refused to create a shader or program object.
    Create { what: &'static str, message: String },
    Compile { stage: ShaderStage, log: String },
    Link { log: String },
}

fn write_log(f: &mut fmt::Formatter<'_>, log: &str) -> fmt::Result {
    let log = log.trim_end();
    if log.is_empty() {
        f.write_str("No error log.")
    } else {
        f.write_str(log)
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Read {
                stage,
                path,
                source,
            } => write!(
                f,
                "cannot read {} shader source {}: {}",
                stage,
                path.display(),
                source
            ),
            ShaderError::Create { what, message } => {
                write!(f, "cannot create {}: {}", what, message)
            }
            ShaderError::Compile { stage, log } => {
                writeln!(f, "GLSL SHADER COMPILE ERROR -- {}", stage)?;
                write_log(f, log)
            }
            ShaderError::Link { log } => {
                writeln!(f, "GLSL PROGRAM LINK ERROR -- PROGRAM")?;
                write_log(f, log)
            }
        }
    }
}

impl std::error::Error for ShaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaderError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reads the whole GLSL source of a stage.
pub fn read_source(stage: ShaderStage, path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Read {
        stage,
        path: path.to_path_buf(),
        source,
    })
}

/// Represents an individual OpenGL shader.
pub struct Shader {
    gl: Arc<glow::Context>,
    id: glow::Shader,
    stage: ShaderStage,
}

impl Shader {
    /// Compiles a new shader from the given source code.
    pub fn new(
        gl: &Arc<glow::Context>,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Self, ShaderError> {
        unsafe {
            let shader = gl
                .create_shader(stage.gl_type())
                .map_err(|message| ShaderError::Create {
                    what: "shader",
                    message,
                })?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);

            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                return Err(ShaderError::Compile { stage, log });
            }

            log::debug!("Compiled {} shader", stage);

            Ok(Self {
                gl: Arc::clone(gl),
                id: shader,
                stage,
            })
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_shader(self.id);
        }
    }
}

/// Represents a uniform variable in a shader program.
pub trait Uniform {
    /// Sets the value of the uniform variable in the given shader program.
    fn set_uniform(&self, gl: &glow::Context, program: glow::Program, name: &str);
}

impl Uniform for f32 {
    fn set_uniform(&self, gl: &glow::Context, program: glow::Program, name: &str) {
        unsafe {
            let location = gl.get_uniform_location(program, name);
            if let Some(loc) = location {
                gl.uniform_1_f32(Some(&loc), *self);
            }
        }
    }
}

impl Uniform for Vec3 {
    fn set_uniform(&self, gl: &glow::Context, program: glow::Program, name: &str) {
        unsafe {
            let location = gl.get_uniform_location(program, name);
            if let Some(loc) = location {
                gl.uniform_3_f32(Some(&loc), self.x, self.y, self.z);
            }
        }
    }
}

impl Uniform for Mat4 {
    fn set_uniform(&self, gl: &glow::Context, program: glow::Program, name: &str) {
        unsafe {
            let location = gl.get_uniform_location(program, name);
            if let Some(loc) = location {
                gl.uniform_matrix_4_f32_slice(Some(&loc), false, self.as_ref());
            }
        }
    }
}

impl<T: Uniform> Uniform for &T {
    fn set_uniform(&self, gl: &glow::Context, program: glow::Program, name: &str) {
        (*self).set_uniform(gl, program, name);
    }
}

/// Represents an OpenGL shader program composed of multiple shaders.
pub struct ShaderProgram {
    gl: Arc<glow::Context>,
    id: glow::Program,
}

impl ShaderProgram {
    /// Links a new shader program from the given shaders.
    pub fn new(gl: &Arc<glow::Context>, shaders: &[&Shader]) -> Result<Self, ShaderError> {
        unsafe {
            let program = gl
                .create_program()
                .map_err(|message| ShaderError::Create {
                    what: "program",
                    message,
                })?;

            for shader in shaders {
                gl.attach_shader(program, shader.id);
            }

            gl.link_program(program);

            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(ShaderError::Link { log });
            }

            for shader in shaders {
                gl.detach_shader(program, shader.id);
            }

            Ok(Self {
                gl: Arc::clone(gl),
                id: program,
            })
        }
    }

    /// Reads, compiles and links every stage named in `sources`.
    ///
    /// Stops at the first stage that fails to compile. The intermediate shader objects are
    /// deleted once the program is linked.
    pub fn from_files(gl: &Arc<glow::Context>, sources: &ShaderSources) -> Result<Self, ShaderError> {
        let stages = sources.stages();
        let mut shaders = Vec::with_capacity(stages.len());

        for (stage, path) in stages {
            let source = read_source(stage, path)?;
            shaders.push(Shader::new(gl, stage, &source)?);
        }

        let attached: Vec<&Shader> = shaders.iter().collect();
        let program = Self::new(gl, &attached)?;

        log::info!(
            "Linked shader program from {} stages ({})",
            shaders.len(),
            shaders
                .iter()
                .map(|shader| shader.stage().label())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(program)
    }

    /// Binds the shader program for use.
    pub fn use_program(&self) {
        unsafe {
            self.gl.use_program(Some(self.id));
        }
    }

    /// Unbinds whatever program is in use.
    pub fn unbind(&self) {
        unsafe {
            self.gl.use_program(None);
        }
    }

    /// Sets a uniform variable in the shader program.
    pub fn set_uniform<T: Uniform>(&self, name: &str, value: T) {
        value.set_uniform(&self.gl, self.id, name);
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_program(self.id);
        }
    }
}
