//! Drawing target contract and a recording implementation.
//!
//! The runtime never draws by itself: the render phase walks the scene graph
//! and issues transform/alpha/clip calls against a [`Renderer`], and `render`
//! listeners issue the actual drawing. The calls mirror a 2D canvas context,
//! including `save`/`restore` capturing alpha and composite operation.
//!
//! [`Recorder`] keeps every call as a [`DrawCommand`]; the demo binary and
//! the tests run headless against it.

use serde::Serialize;

/// A region of a loaded image, as handed out by a resource loader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRegion {
    /// Loader key (usually the URL).
    pub source: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// 2D canvas-like drawing target.
pub trait Renderer {
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f32, y: f32);
    /// Rotation in radians.
    fn rotate(&mut self, angle: f32);
    fn scale(&mut self, x: f32, y: f32);
    /// Replace the current transform matrix.
    fn set_transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32);
    fn global_alpha(&self) -> f32;
    fn set_global_alpha(&mut self, alpha: f32);
    fn composite_operation(&self) -> &str;
    fn set_composite_operation(&mut self, op: &str);
    fn set_fill_style(&mut self, style: &str);
    fn set_stroke_style(&mut self, style: &str, line_width: f32);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32);
    fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);
    /// Intersect the clip region with a rectangle.
    fn clip_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn draw_image(&mut self, image: &ImageRegion, x: f32, y: f32, width: f32, height: f32);
}

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawCommand {
    Save,
    Restore,
    Translate { x: f32, y: f32 },
    Rotate { angle: f32 },
    Scale { x: f32, y: f32 },
    SetTransform { matrix: [f32; 6] },
    GlobalAlpha { alpha: f32 },
    Composite {
        #[serde(rename = "operation")]
        op: String,
    },
    FillStyle { style: String },
    StrokeStyle { style: String, line_width: f32 },
    FillRect { x: f32, y: f32, width: f32, height: f32 },
    StrokeRect { x: f32, y: f32, width: f32, height: f32 },
    FillCircle { x: f32, y: f32, radius: f32 },
    StrokeLine { x1: f32, y1: f32, x2: f32, y2: f32 },
    ClipRect { x: f32, y: f32, width: f32, height: f32 },
    DrawImage { source: String, x: f32, y: f32, width: f32, height: f32 },
}

#[derive(Debug, Clone)]
struct DrawState {
    alpha: f32,
    composite: String,
}

impl Default for DrawState {
    fn default() -> Self {
        DrawState {
            alpha: 1.0,
            composite: "source-over".to_string(),
        }
    }
}

/// Headless renderer that records every call.
#[derive(Debug, Default)]
pub struct Recorder {
    commands: Vec<DrawCommand>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drop recorded commands, keeping the current state.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of shape and image drawing calls.
    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    DrawCommand::FillRect { .. }
                        | DrawCommand::StrokeRect { .. }
                        | DrawCommand::FillCircle { .. }
                        | DrawCommand::StrokeLine { .. }
                        | DrawCommand::DrawImage { .. }
                )
            })
            .count()
    }

    /// Current `save` nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Recorded commands as JSON, for dumping a frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.commands)
    }
}

impl Renderer for Recorder {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
        self.commands.push(DrawCommand::Restore);
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.commands.push(DrawCommand::Translate { x, y });
    }

    fn rotate(&mut self, angle: f32) {
        self.commands.push(DrawCommand::Rotate { angle });
    }

    fn scale(&mut self, x: f32, y: f32) {
        self.commands.push(DrawCommand::Scale { x, y });
    }

    fn set_transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.commands.push(DrawCommand::SetTransform {
            matrix: [a, b, c, d, e, f],
        });
    }

    fn global_alpha(&self) -> f32 {
        self.state.alpha
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha;
        self.commands.push(DrawCommand::GlobalAlpha { alpha });
    }

    fn composite_operation(&self) -> &str {
        &self.state.composite
    }

    fn set_composite_operation(&mut self, op: &str) {
        self.state.composite = op.to_string();
        self.commands.push(DrawCommand::Composite { op: op.to_string() });
    }

    fn set_fill_style(&mut self, style: &str) {
        self.commands.push(DrawCommand::FillStyle {
            style: style.to_string(),
        });
    }

    fn set_stroke_style(&mut self, style: &str, line_width: f32) {
        self.commands.push(DrawCommand::StrokeStyle {
            style: style.to_string(),
            line_width,
        });
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
        });
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(DrawCommand::StrokeRect {
            x,
            y,
            width,
            height,
        });
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32) {
        self.commands.push(DrawCommand::FillCircle { x, y, radius });
    }

    fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.commands.push(DrawCommand::StrokeLine { x1, y1, x2, y2 });
    }

    fn clip_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(DrawCommand::ClipRect {
            x,
            y,
            width,
            height,
        });
    }

    fn draw_image(&mut self, image: &ImageRegion, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(DrawCommand::DrawImage {
            source: image.source.clone(),
            x,
            y,
            width,
            height,
        });
    }
}
