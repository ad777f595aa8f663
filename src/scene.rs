//! The scene shown by the viewer: one object and a fixed camera looking at it.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};

use crate::{
    abs::{Mesh, ShaderProgram},
    config::CameraConfig,
};

/// A perspective camera placed on the Z axis, facing the origin.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, config.distance),
            fov: config.fov,
            near: config.near,
            far: config.far,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }

    /// Recomputes the view and projection matrices for the given aspect ratio.
    pub fn update(&mut self, aspect: f32) {
        self.view = Mat4::from_rotation_y(-PI) * Mat4::from_translation(self.position);
        self.projection = Mat4::perspective_rh_gl(self.fov, aspect, self.near, self.far);
    }
}

/// Width over height of a drawable size in pixels. A zero height counts as one pixel.
pub fn aspect_ratio((width, height): (u32, u32)) -> f32 {
    width as f32 / height.max(1) as f32
}

/// The object being viewed: its GPU mesh, the program drawing it and its model matrix.
pub struct SceneObject {
    pub mesh: Mesh,
    pub program: ShaderProgram,
    pub model: Mat4,
}

impl SceneObject {
    pub fn new(mesh: Mesh, program: ShaderProgram) -> Self {
        Self {
            mesh,
            program,
            model: Mat4::IDENTITY,
        }
    }

    /// Spins the object about its local Y axis.
    pub fn rotate(&mut self, angle: f32) {
        self.model *= Mat4::from_rotation_y(angle);
    }
}

pub struct Scene {
    pub object: SceneObject,
    pub camera: Camera,
    pub light_dir: Vec3,
}

impl Scene {
    /// Draws the object with the current camera.
    pub fn render(&self) {
        let program = &self.object.program;
        program.use_program();

        let mvp = self.camera.projection * self.camera.view * self.object.model;
        program.set_uniform("MVP", mvp);
        program.set_uniform("model", self.object.model);
        program.set_uniform("light_dir", self.light_dir);

        self.object.mesh.draw();
        program.unbind();
    }
}
