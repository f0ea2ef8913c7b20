use std::{collections::HashMap, fs, io, path::Path};

use nalgebra::Vector2;
use serde::Deserialize;
use thiserror::Error;

/// Glyph drawn for characters the typeface does not cover.
pub const FALLBACK_GLYPH: char = '?';

#[derive(Debug, Error)]
pub enum TypefaceError {
    #[error("failed to read typeface: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse typeface json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bad outline for glyph {glyph:?}: {reason}")]
    BadOutline { glyph: char, reason: String },
    #[error("typeface resolution must be positive, got {0}")]
    BadResolution(f32),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypefaceFile {
    glyphs: HashMap<String, GlyphFile>,
    resolution: f32,
    bounding_box: BoundingBoxFile,
    #[serde(default)]
    underline_thickness: f32,
    #[serde(default)]
    family_name: String,
}

#[derive(Deserialize)]
struct GlyphFile {
    ha: f32,
    #[serde(default)]
    o: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundingBoxFile {
    y_min: f32,
    y_max: f32,
}

/// One outline instruction in font units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Vector2<f32>),
    LineTo(Vector2<f32>),
    QuadTo {
        ctrl: Vector2<f32>,
        end: Vector2<f32>,
    },
    CubicTo {
        ctrl1: Vector2<f32>,
        ctrl2: Vector2<f32>,
        end: Vector2<f32>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GlyphOutline {
    pub advance: f32,
    pub commands: Vec<PathCommand>,
}

/// A closed or open polyline in layout units.
pub type Contour = Vec<Vector2<f32>>;

#[derive(Clone, Debug)]
pub struct Typeface {
    family: String,
    resolution: f32,
    line_height: f32,
    glyphs: HashMap<char, GlyphOutline>,
}

impl Typeface {
    pub fn load(path: &Path) -> Result<Self, TypefaceError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, TypefaceError> {
        let file: TypefaceFile = serde_json::from_str(raw)?;
        if !(file.resolution.is_finite() && file.resolution > 0.0) {
            return Err(TypefaceError::BadResolution(file.resolution));
        }

        let mut glyphs = HashMap::with_capacity(file.glyphs.len());
        for (key, glyph) in file.glyphs {
            let mut chars = key.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                continue;
            };
            let commands = match glyph.o.as_deref() {
                Some(outline) => parse_outline(ch, outline)?,
                None => Vec::new(),
            };
            glyphs.insert(
                ch,
                GlyphOutline {
                    advance: glyph.ha,
                    commands,
                },
            );
        }

        let bbox = file.bounding_box;
        Ok(Self {
            family: file.family_name,
            resolution: file.resolution,
            line_height: bbox.y_max - bbox.y_min + file.underline_thickness,
            glyphs,
        })
    }

    /// Face made of plain blocks: every printable ASCII character is a
    /// rectangle, lowercase ones shorter than the rest.
    pub fn builtin_block() -> Self {
        const RESOLUTION: f32 = 1000.0;
        const ADVANCE: f32 = 700.0;
        const WIDTH: f32 = 560.0;

        let mut glyphs = HashMap::new();
        glyphs.insert(
            ' ',
            GlyphOutline {
                advance: ADVANCE * 0.5,
                commands: Vec::new(),
            },
        );
        for ch in '!'..='~' {
            let height = if ch.is_ascii_lowercase() { 520.0 } else { 720.0 };
            let corner = |x: f32, y: f32| Vector2::new(x, y);
            glyphs.insert(
                ch,
                GlyphOutline {
                    advance: ADVANCE,
                    commands: vec![
                        PathCommand::MoveTo(corner(0.0, 0.0)),
                        PathCommand::LineTo(corner(WIDTH, 0.0)),
                        PathCommand::LineTo(corner(WIDTH, height)),
                        PathCommand::LineTo(corner(0.0, height)),
                        PathCommand::LineTo(corner(0.0, 0.0)),
                    ],
                },
            );
        }

        Self {
            family: "glyphfall block".to_string(),
            resolution: RESOLUTION,
            line_height: 1000.0 + 50.0,
            glyphs,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Outline for `ch`, falling back to `?` when the face lacks it.
    pub fn glyph(&self, ch: char) -> Option<&GlyphOutline> {
        self.glyphs
            .get(&ch)
            .or_else(|| self.glyphs.get(&FALLBACK_GLYPH))
    }

    /// Lays out `text` at `size` and flattens every outline into polylines,
    /// sampling each curve at `curve_segments` divisions.
    pub fn layout(&self, text: &str, size: f32, curve_segments: u32) -> Vec<Contour> {
        let scale = size / self.resolution;
        let line_height = self.line_height * scale;
        let segments = curve_segments.max(1);
        let mut contours = Vec::new();
        let mut pen = Vector2::zeros();

        for ch in text.chars() {
            if ch == '\n' {
                pen.x = 0.0;
                pen.y -= line_height;
                continue;
            }
            let Some(glyph) = self.glyph(ch) else {
                continue;
            };
            flatten(&glyph.commands, scale, pen, segments, &mut contours);
            pen.x += glyph.advance * scale;
        }

        contours
    }
}

fn flatten(
    commands: &[PathCommand],
    scale: f32,
    offset: Vector2<f32>,
    segments: u32,
    out: &mut Vec<Contour>,
) {
    let place = |p: Vector2<f32>| p * scale + offset;
    let mut current: Contour = Vec::new();
    let mut cursor = offset;

    for command in commands {
        match *command {
            PathCommand::MoveTo(p) => {
                if current.len() > 1 {
                    out.push(std::mem::take(&mut current));
                }
                current.clear();
                cursor = place(p);
                current.push(cursor);
            }
            PathCommand::LineTo(p) => {
                cursor = place(p);
                current.push(cursor);
            }
            PathCommand::QuadTo { ctrl, end } => {
                let (start, ctrl, end) = (cursor, place(ctrl), place(end));
                for i in 1..=segments {
                    let t = i as f32 / segments as f32;
                    current.push(quadratic(start, ctrl, end, t));
                }
                cursor = end;
            }
            PathCommand::CubicTo { ctrl1, ctrl2, end } => {
                let (start, c1, c2, end) = (cursor, place(ctrl1), place(ctrl2), place(end));
                for i in 1..=segments {
                    let t = i as f32 / segments as f32;
                    current.push(cubic(start, c1, c2, end, t));
                }
                cursor = end;
            }
        }
    }
    if current.len() > 1 {
        out.push(current);
    }
}

fn quadratic(p0: Vector2<f32>, p1: Vector2<f32>, p2: Vector2<f32>, t: f32) -> Vector2<f32> {
    let k = 1.0 - t;
    p0 * (k * k) + p1 * (2.0 * k * t) + p2 * (t * t)
}

fn cubic(
    p0: Vector2<f32>,
    p1: Vector2<f32>,
    p2: Vector2<f32>,
    p3: Vector2<f32>,
    t: f32,
) -> Vector2<f32> {
    let k = 1.0 - t;
    p0 * (k * k * k) + p1 * (3.0 * k * k * t) + p2 * (3.0 * k * t * t) + p3 * (t * t * t)
}

/// Parses a typeface outline string. `q` and `b` list the end point before
/// their control points.
fn parse_outline(glyph: char, outline: &str) -> Result<Vec<PathCommand>, TypefaceError> {
    let mut tokens = outline.split_whitespace();
    let mut commands = Vec::new();

    while let Some(op) = tokens.next() {
        let command = match op {
            "m" => PathCommand::MoveTo(next_point(glyph, &mut tokens)?),
            "l" => PathCommand::LineTo(next_point(glyph, &mut tokens)?),
            "q" => {
                let end = next_point(glyph, &mut tokens)?;
                let ctrl = next_point(glyph, &mut tokens)?;
                PathCommand::QuadTo { ctrl, end }
            }
            "b" => {
                let end = next_point(glyph, &mut tokens)?;
                let ctrl1 = next_point(glyph, &mut tokens)?;
                let ctrl2 = next_point(glyph, &mut tokens)?;
                PathCommand::CubicTo { ctrl1, ctrl2, end }
            }
            other => {
                return Err(TypefaceError::BadOutline {
                    glyph,
                    reason: format!("unknown command {other:?}"),
                });
            }
        };
        commands.push(command);
    }

    Ok(commands)
}

fn next_point<'a, I>(glyph: char, tokens: &mut I) -> Result<Vector2<f32>, TypefaceError>
where
    I: Iterator<Item = &'a str>,
{
    let mut coord = || {
        let token = tokens.next().ok_or_else(|| TypefaceError::BadOutline {
            glyph,
            reason: "outline ends mid-command".to_string(),
        })?;
        token.parse::<f32>().map_err(|_| TypefaceError::BadOutline {
            glyph,
            reason: format!("not a number: {token:?}"),
        })
    };
    let x = coord()?;
    let y = coord()?;
    Ok(Vector2::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE_FACE: &str = r#"{
        "familyName": "Square",
        "resolution": 1000,
        "underlineThickness": 50,
        "boundingBox": { "xMin": 0, "xMax": 1000, "yMin": -200, "yMax": 800 },
        "glyphs": {
            "A": { "ha": 800, "x_min": 0, "x_max": 600, "o": "m 0 0 l 600 0 l 600 700 l 0 700 l 0 0" },
            "?": { "ha": 500, "o": "m 0 0 l 400 0 l 400 400 l 0 400" },
            "o": { "ha": 600, "o": "m 0 0 q 500 0 250 -250 l 0 0" },
            "s": { "ha": 600, "o": "m 0 0 b 500 0 100 300 400 300" },
            " ": { "ha": 300 }
        }
    }"#;

    fn face() -> Typeface {
        Typeface::from_json(SQUARE_FACE).expect("parse face")
    }

    fn close(a: Vector2<f32>, b: Vector2<f32>) -> bool {
        (a - b).norm() < 1e-5
    }

    mod from_json {
        use super::*;

        #[test]
        fn reads_glyphs_and_metrics() {
            let face = face();
            assert_eq!(face.family(), "Square");
            assert_eq!(face.glyph_count(), 5);
            let a = face.glyph('A').expect("A");
            assert_eq!(a.advance, 800.0);
            assert_eq!(a.commands.len(), 5);
        }

        #[test]
        fn glyph_without_outline_has_no_commands() {
            let face = face();
            assert!(face.glyph(' ').expect("space").commands.is_empty());
        }

        #[test]
        fn quadratic_lists_end_before_control() {
            let face = face();
            let o = face.glyph('o').expect("o");
            assert_eq!(
                o.commands[1],
                PathCommand::QuadTo {
                    ctrl: Vector2::new(250.0, -250.0),
                    end: Vector2::new(500.0, 0.0),
                }
            );
        }

        #[test]
        fn cubic_lists_end_before_controls() {
            let face = face();
            let s = face.glyph('s').expect("s");
            assert_eq!(
                s.commands[1],
                PathCommand::CubicTo {
                    ctrl1: Vector2::new(100.0, 300.0),
                    ctrl2: Vector2::new(400.0, 300.0),
                    end: Vector2::new(500.0, 0.0),
                }
            );
        }

        #[test]
        fn truncated_outline_is_rejected() {
            let raw = r#"{
                "resolution": 1000,
                "boundingBox": { "yMin": 0, "yMax": 1000 },
                "glyphs": { "x": { "ha": 500, "o": "m 0 0 l 10" } }
            }"#;
            let err = Typeface::from_json(raw).expect_err("bad outline");
            assert!(matches!(err, TypefaceError::BadOutline { glyph: 'x', .. }));
        }

        #[test]
        fn unknown_command_is_rejected() {
            let raw = r#"{
                "resolution": 1000,
                "boundingBox": { "yMin": 0, "yMax": 1000 },
                "glyphs": { "x": { "ha": 500, "o": "m 0 0 z" } }
            }"#;
            assert!(matches!(
                Typeface::from_json(raw),
                Err(TypefaceError::BadOutline { .. })
            ));
        }

        #[test]
        fn zero_resolution_is_rejected() {
            let raw = r#"{ "resolution": 0, "boundingBox": { "yMin": 0, "yMax": 1 }, "glyphs": {} }"#;
            assert!(matches!(
                Typeface::from_json(raw),
                Err(TypefaceError::BadResolution(_))
            ));
        }

        #[test]
        fn malformed_json_is_a_parse_error() {
            assert!(matches!(
                Typeface::from_json("{ not json"),
                Err(TypefaceError::Parse(_))
            ));
        }
    }

    mod load {
        use std::io::Write;

        use super::*;

        #[test]
        fn reads_face_from_file() {
            let mut file = tempfile::NamedTempFile::new().expect("temp file");
            file.write_all(SQUARE_FACE.as_bytes()).expect("write");
            let face = Typeface::load(file.path()).expect("load");
            assert_eq!(face.family(), "Square");
        }

        #[test]
        fn missing_file_is_io_error() {
            let err = Typeface::load(Path::new("/no/such/face.typeface.json")).expect_err("io");
            assert!(matches!(err, TypefaceError::Io(_)));
        }
    }

    mod layout {
        use super::*;

        #[test]
        fn scales_by_size_over_resolution() {
            let contours = face().layout("A", 1.0, 4);
            assert_eq!(contours.len(), 1);
            let square = &contours[0];
            assert!(close(square[0], Vector2::new(0.0, 0.0)));
            assert!(close(square[2], Vector2::new(0.6, 0.7)));
        }

        #[test]
        fn pen_advances_by_glyph_advance() {
            let contours = face().layout("AA", 2.0, 4);
            assert_eq!(contours.len(), 2);
            assert!(close(contours[1][0], Vector2::new(1.6, 0.0)));
        }

        #[test]
        fn newline_moves_down_one_line() {
            let contours = face().layout("A\nA", 1.0, 4);
            // (800 - -200 + 50) / 1000
            assert!(close(contours[1][0], Vector2::new(0.0, -1.05)));
        }

        #[test]
        fn missing_glyph_uses_question_mark() {
            let contours = face().layout("Z", 1.0, 4);
            assert_eq!(contours.len(), 1);
            assert!(close(contours[0][2], Vector2::new(0.4, 0.4)));
        }

        #[test]
        fn space_only_advances() {
            let contours = face().layout(" A", 1.0, 4);
            assert_eq!(contours.len(), 1);
            assert!(close(contours[0][0], Vector2::new(0.3, 0.0)));
        }

        #[test]
        fn curves_sample_requested_segments() {
            let contours = face().layout("o", 1.0, 10);
            // move + 10 curve samples + closing line
            assert_eq!(contours[0].len(), 12);
            // midpoint of the quadratic
            assert!(close(contours[0][5], Vector2::new(0.25, -0.125)));
        }
    }

    mod builtin_block {
        use super::*;

        #[test]
        fn covers_printable_ascii() {
            let face = Typeface::builtin_block();
            for ch in ' '..='~' {
                assert!(face.glyph(ch).is_some(), "missing {ch:?}");
            }
        }

        #[test]
        fn lowercase_is_shorter() {
            let face = Typeface::builtin_block();
            let upper = face.layout("A", 1.0, 1);
            let lower = face.layout("a", 1.0, 1);
            assert!(upper[0][2].y > lower[0][2].y);
        }
    }
}
