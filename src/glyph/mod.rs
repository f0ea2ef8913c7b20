pub mod resolver;
pub mod typeface;

use std::collections::VecDeque;

use nalgebra::Vector3;
use thiserror::Error;
use tracing::debug;

use crate::types::{Aabb, Transform};

use resolver::{FontPoll, FontSource, TypefaceResolver};
use typeface::Typeface;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("text {text:?} has no outline to extrude")]
    EmptyOutline { text: String },
    #[error("typeface unavailable, dropped {text:?}")]
    FontUnavailable { text: String },
}

/// Extrusion parameters for shaped text, all in layout units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    /// Extrusion depth along +Z before bevelling.
    pub depth: f32,
    pub curve_segments: u32,
    pub bevel_enabled: bool,
    pub bevel_thickness: f32,
    pub bevel_size: f32,
    pub bevel_offset: f32,
    pub bevel_segments: u32,
}

impl TextStyle {
    /// Falling key labels.
    pub const LABEL: TextStyle = TextStyle {
        size: 1.0,
        depth: 0.4,
        curve_segments: 10,
        bevel_enabled: true,
        bevel_thickness: 0.05,
        bevel_size: 0.05,
        bevel_offset: 0.0,
        bevel_segments: 10,
    };

    /// Numeric key codes on the side display.
    pub const CODE: TextStyle = TextStyle {
        size: 1.0,
        depth: 0.3,
        curve_segments: 3,
        bevel_enabled: true,
        bevel_thickness: 0.01,
        bevel_size: 0.05,
        bevel_offset: 0.0,
        bevel_segments: 5,
    };
}

/// Lays out `text`, extrudes it with `style` and returns the bounding box of
/// the result, translated so it is symmetric about the origin.
pub fn shape_text(face: &Typeface, text: &str, style: &TextStyle) -> Result<Aabb, ShapeError> {
    let contours = face.layout(text, style.size, style.curve_segments);
    let flat = Aabb::from_points(
        contours
            .iter()
            .flatten()
            .map(|p| Vector3::new(p.x, p.y, 0.0)),
    )
    .ok_or_else(|| ShapeError::EmptyOutline {
        text: text.to_string(),
    })?;

    let (grow, z_min, z_max) = if style.bevel_enabled {
        (
            style.bevel_size + style.bevel_offset,
            -style.bevel_thickness,
            style.depth + style.bevel_thickness,
        )
    } else {
        (0.0, 0.0, style.depth)
    };
    let mut extruded = flat.grown(grow, 0.0);
    extruded.min.z = z_min;
    extruded.max.z = z_max;
    Ok(extruded.centered())
}

/// Something the renderer draws: text, its centered local bounds and where
/// it sits in the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Visual {
    pub text: String,
    pub bounds: Aabb,
    pub transform: Transform,
    pub scale: f32,
}

impl Visual {
    pub fn new(text: impl Into<String>, bounds: Aabb) -> Self {
        Self {
            text: text.into(),
            bounds,
            transform: Transform::default(),
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn placed(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// The eight corners of the scaled bounds in scene space.
    pub fn world_corners(&self) -> [Vector3<f32>; 8] {
        let min = self.bounds.min * self.scale;
        let max = self.bounds.max * self.scale;
        let mut corners = [Vector3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let local = Vector3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            *corner = self.transform.apply(local);
        }
        corners
    }
}

/// Why a glyph was requested. Decides its spawn pose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnOrigin {
    Initial,
    Keyboard,
}

#[derive(Clone, Debug, PartialEq)]
struct GlyphRequest {
    label: String,
    code: String,
    origin: SpawnOrigin,
}

/// A resolved request: the falling label, its numeric code and the half
/// extents of the label's box collider.
#[derive(Clone, Debug, PartialEq)]
pub struct Glyph {
    pub label: Visual,
    pub code: Visual,
    pub collider_half_extents: Vector3<f32>,
    pub origin: SpawnOrigin,
}

/// Turns (label, code) pairs into glyphs once the typeface is available.
/// Requests are answered in the order they were made.
pub struct GlyphFactory {
    resolver: TypefaceResolver,
    pending: VecDeque<GlyphRequest>,
}

impl GlyphFactory {
    pub fn new(source: FontSource) -> Self {
        Self {
            resolver: TypefaceResolver::spawn(source),
            pending: VecDeque::new(),
        }
    }

    pub fn create_glyph(
        &mut self,
        label: impl Into<String>,
        code: impl Into<String>,
        origin: SpawnOrigin,
    ) {
        let request = GlyphRequest {
            label: label.into(),
            code: code.into(),
            origin,
        };
        debug!(label = %request.label, code = %request.code, "glyph_requested");
        self.pending.push_back(request);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Resolves every queued request the typeface allows. Nothing happens
    /// while the typeface is still loading; once it has failed, queued
    /// requests come back as `FontUnavailable`.
    pub fn poll(&mut self, out: &mut Vec<Result<Glyph, ShapeError>>) {
        match self.resolver.poll() {
            FontPoll::Pending => {}
            FontPoll::Ready(face) => {
                out.extend(self.pending.drain(..).map(|request| build_glyph(face, request)));
            }
            FontPoll::Failed => {
                out.extend(self.pending.drain(..).map(|request| {
                    Err(ShapeError::FontUnavailable {
                        text: request.label,
                    })
                }));
            }
        }
    }
}

/// Only the label has to shape. A code the face cannot draw is left blank.
fn build_glyph(face: &Typeface, request: GlyphRequest) -> Result<Glyph, ShapeError> {
    let label_bounds = shape_text(face, &request.label, &TextStyle::LABEL)?;
    let code = match shape_text(face, &request.code, &TextStyle::CODE) {
        Ok(bounds) => Visual::new(request.code, bounds),
        Err(err) => {
            debug!(error = %err, label = %request.label, "code left blank");
            Visual::new("", Aabb::new(Vector3::zeros(), Vector3::zeros()))
        }
    };
    Ok(Glyph {
        collider_half_extents: label_bounds.half_extents(),
        label: Visual::new(request.label, label_bounds),
        code,
        origin: request.origin,
    })
}
