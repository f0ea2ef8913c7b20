use nalgebra::{Isometry3, Point3, Vector3};

use crate::{
    anim::KeyCap,
    config,
    core::{
        physics::{PropShape, StaticProp},
        working_set::WorkingSet,
    },
    glyph::Visual,
    types::{ColorId, Transform},
};

const TEXT_MAX_DRAW: usize = 12;
/// Pulls text in front of the outline of its own box.
const TEXT_DEPTH_BIAS: f32 = 0.05;
/// Nothing sits below the floor, so the grid is always the backmost layer.
const FLOOR_DEPTH: f32 = f32::MAX;

/// Everything drawn in one frame, borrowed from the simulation.
pub struct Scene<'a> {
    pub working_set: &'a WorkingSet,
    pub key_caps: &'a [KeyCap],
    pub props: &'a [StaticProp],
    pub elapsed: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vector3<f32>,
    pub target: Vector3<f32>,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Height of a terminal cell divided by its width.
    pub cell_aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vector3::new(0.0, 0.7, 4.5),
            target: Vector3::zeros(),
            fov_y: 90.0_f32.to_radians(),
            near: 0.01,
            far: 100.0,
            cell_aspect: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    /// Distance in front of the camera.
    pub depth: f32,
}

impl Camera {
    fn view(&self) -> Isometry3<f32> {
        Isometry3::look_at_rh(
            &Point3::from(self.eye),
            &Point3::from(self.target),
            &Vector3::y(),
        )
    }

    /// Perspective projection into cell coordinates. `None` outside the
    /// near/far range.
    #[cfg(test)]
    pub fn project(&self, world: Vector3<f32>, viewport: Viewport) -> Option<ScreenPoint> {
        self.project_with(&self.view(), world, viewport)
    }

    fn project_with(
        &self,
        view: &Isometry3<f32>,
        world: Vector3<f32>,
        viewport: Viewport,
    ) -> Option<ScreenPoint> {
        let p = view * Point3::from(world);
        let depth = -p.z;
        if depth < self.near || depth > self.far || viewport.height == 0 {
            return None;
        }
        let half_h = (self.fov_y * 0.5).tan();
        let aspect =
            viewport.width as f32 / (viewport.height as f32 * self.cell_aspect.max(f32::EPSILON));
        let ndc_x = p.x / (depth * half_h * aspect);
        let ndc_y = p.y / (depth * half_h);
        Some(ScreenPoint {
            x: (ndc_x + 1.0) * 0.5 * viewport.width as f32,
            y: (1.0 - ndc_y) * 0.5 * viewport.height as f32,
            depth,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderCell {
    pub ch: char,
    pub depth: f32,
    pub color: ColorId,
}

#[derive(Debug)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<RenderCell>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        let mut buffer = Self {
            width,
            height,
            cells: Vec::new(),
        };
        buffer.resize(width, height);
        buffer
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let len = (width as usize).saturating_mul(height as usize);
        if self.cells.len() != len {
            self.cells.resize(
                len,
                RenderCell {
                    ch: ' ',
                    depth: f32::INFINITY,
                    color: ColorId::White,
                },
            );
        }
        self.clear();
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.ch = ' ';
            cell.depth = f32::INFINITY;
            cell.color = ColorId::White;
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn get(&self, x: u16, y: u16) -> RenderCell {
        debug_assert!(x < self.width && y < self.height, "get() out of bounds");
        let idx = (y as usize) * (self.width as usize) + (x as usize);
        self.cells[idx]
    }

    /// Writes the cell unless something nearer is already there.
    fn set(&mut self, x: i32, y: i32, ch: char, depth: f32, color: ColorId) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize) * (self.width as usize) + (x as usize);
        let cell = &mut self.cells[idx];
        if depth < cell.depth {
            cell.depth = depth;
            cell.ch = ch;
            cell.color = color;
        }
    }
}

struct Painter<'a> {
    camera: &'a Camera,
    view: Isometry3<f32>,
    viewport: Viewport,
    frame: &'a mut FrameBuffer,
}

impl Painter<'_> {
    fn project(&self, world: Vector3<f32>) -> Option<ScreenPoint> {
        self.camera.project_with(&self.view, world, self.viewport)
    }

    fn point(&mut self, world: Vector3<f32>, ch: char, color: ColorId) {
        if let Some(p) = self.project(world) {
            self.frame
                .set(p.x.round() as i32, p.y.round() as i32, ch, p.depth, color);
        }
    }

    fn backdrop(&mut self, world: Vector3<f32>, ch: char, color: ColorId) {
        if let Some(p) = self.project(world) {
            self.frame
                .set(p.x.round() as i32, p.y.round() as i32, ch, FLOOR_DEPTH, color);
        }
    }

    fn line(&mut self, a: Vector3<f32>, b: Vector3<f32>, ch: char, color: ColorId) {
        let (Some(pa), Some(pb)) = (self.project(a), self.project(b)) else {
            return;
        };
        let steps = (pb.x - pa.x).abs().max((pb.y - pa.y).abs()).ceil().clamp(1.0, 512.0) as u32;
        for s in 0..=steps {
            let t = s as f32 / steps as f32;
            let x = pa.x + (pb.x - pa.x) * t;
            let y = pa.y + (pb.y - pa.y) * t;
            let depth = pa.depth + (pb.depth - pa.depth) * t;
            self.frame
                .set(x.round() as i32, y.round() as i32, ch, depth, color);
        }
    }

    fn wire_box(&mut self, corners: &[Vector3<f32>; 8], ch: char, color: ColorId) {
        for i in 0..8 {
            for bit in [1, 2, 4] {
                if i & bit == 0 {
                    self.line(corners[i], corners[i | bit], ch, color);
                }
            }
        }
    }

    fn text(&mut self, world: Vector3<f32>, text: &str, color: ColorId) {
        let Some(p) = self.project(world) else {
            return;
        };
        let len = text.chars().take(TEXT_MAX_DRAW).count() as i32;
        let start = p.x.round() as i32 - len / 2;
        let y = p.y.round() as i32;
        for (i, ch) in text.chars().take(TEXT_MAX_DRAW).enumerate() {
            self.frame
                .set(start + i as i32, y, ch, p.depth - TEXT_DEPTH_BIAS, color);
        }
    }
}

pub fn draw(scene: &Scene<'_>, camera: &Camera, viewport: Viewport, frame: &mut FrameBuffer) {
    if frame.width() != viewport.width || frame.height() != viewport.height {
        frame.resize(viewport.width, viewport.height);
    } else {
        frame.clear();
    }

    let mut painter = Painter {
        camera,
        view: camera.view(),
        viewport,
        frame,
    };

    draw_floor(&mut painter);
    for prop in scene.props {
        draw_prop(&mut painter, prop);
    }
    for cap in scene.key_caps {
        let pressed = cap.position.y < cap.rest.y - 1e-4;
        let (ch, color) = if pressed {
            ('▪', ColorId::Yellow)
        } else {
            ('▫', ColorId::Gray)
        };
        painter.point(cap.position, ch, color);
    }

    let newest = scene.working_set.iter().last().map(|e| e.id);
    for entity in scene.working_set.iter() {
        let color = glyph_color(&entity.visual.transform, newest == Some(entity.id));
        draw_visual(&mut painter, &entity.visual, color, true);
    }

    let side = scene.working_set.side_display();
    if let Some(label) = &side.label {
        draw_visual(&mut painter, label, ColorId::Magenta, false);
    }
    if let Some(code) = &side.code {
        draw_visual(&mut painter, code, ColorId::Cyan, false);
    }
}

fn draw_floor(painter: &mut Painter<'_>) {
    let cells = (2.0 * config::FLOOR_HALF_SIZE / config::FLOOR_GRID_STEP).round() as i32;
    for ix in 0..=cells {
        for iz in 0..=cells {
            let x = -config::FLOOR_HALF_SIZE + ix as f32 * config::FLOOR_GRID_STEP;
            let z = -config::FLOOR_HALF_SIZE + iz as f32 * config::FLOOR_GRID_STEP;
            painter.backdrop(Vector3::new(x, 0.0, z), '.', ColorId::Floor);
        }
    }
}

fn draw_prop(painter: &mut Painter<'_>, prop: &StaticProp) {
    let PropShape::Cuboid { half_extents } = prop.shape else {
        return;
    };
    let corners = box_corners(&prop.transform, -half_extents, half_extents);
    painter.wire_box(&corners, '#', ColorId::Prop);
}

fn draw_visual(painter: &mut Painter<'_>, visual: &Visual, color: ColorId, outline: bool) {
    if outline {
        painter.wire_box(&visual.world_corners(), '·', color);
    }
    painter.text(visual.transform.position, &visual.text, color);
}

fn box_corners(
    transform: &Transform,
    min: Vector3<f32>,
    max: Vector3<f32>,
) -> [Vector3<f32>; 8] {
    std::array::from_fn(|i| {
        transform.apply(Vector3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        ))
    })
}

/// Newest glyph in yellow; the rest by how upright they landed.
fn glyph_color(transform: &Transform, newest: bool) -> ColorId {
    if newest {
        return ColorId::Yellow;
    }
    let up = transform.up().y;
    if up > 0.9 {
        ColorId::White
    } else if up < -0.5 {
        ColorId::Blue
    } else {
        ColorId::Cyan
    }
}
