//! Graphics and text state.
//!
//! States are plain owned value types: `save` pushes a clone onto an
//! explicit stack, `restore` pops by value. There is no shared mutable
//! aliasing between stack frames.

use crate::colorspace::ColorSpace;
use crate::font::translate::TranslatedFont;
use crate::utils::{MATRIX_IDENTITY, Matrix, Point, mult_matrix, translate_matrix};
use std::sync::Arc;

/// A state that can live in a [`StateManager`] stack.
pub trait ContentState: Clone {
    /// Compose a matrix into the state's current transform.
    fn transform(&mut self, m: Matrix);
}

/// Graphics state carried through operator-list building.
#[derive(Debug, Clone)]
pub struct EvalState {
    /// Current transformation matrix
    pub ctm: Matrix,
    /// Active font, set by the font resolution pipeline
    pub font: Option<Arc<TranslatedFont>>,
    /// Active font size in user units
    pub font_size: f64,
    /// Text rendering mode (0-7)
    pub text_render_mode: i32,
    /// Fill color space
    pub fill_color_space: Arc<ColorSpace>,
    /// Stroke color space
    pub stroke_color_space: Arc<ColorSpace>,
}

impl EvalState {
    pub fn new() -> Self {
        Self {
            ctm: MATRIX_IDENTITY,
            font: None,
            font_size: 0.0,
            text_render_mode: 0,
            fill_color_space: Arc::new(ColorSpace::DeviceGray),
            stroke_color_space: Arc::new(ColorSpace::DeviceGray),
        }
    }
}

impl Default for EvalState {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentState for EvalState {
    fn transform(&mut self, m: Matrix) {
        self.ctm = mult_matrix(m, self.ctm);
    }
}

/// Text positioning state used by text content extraction.
#[derive(Debug, Clone)]
pub struct TextState {
    /// Current transformation matrix
    pub ctm: Matrix,
    /// Active font
    pub font: Option<Arc<TranslatedFont>>,
    /// Active font size
    pub font_size: f64,
    /// Character spacing
    pub char_spacing: f64,
    /// Word spacing (applied to single-byte code 32)
    pub word_spacing: f64,
    /// Leading (vertical advance for T*, ', ")
    pub leading: f64,
    /// Horizontal scaling, 1.0 = 100%
    pub h_scale: f64,
    /// Text rise
    pub rise: f64,
    /// Text matrix
    pub text_matrix: Matrix,
    /// Text line matrix
    pub line_matrix: Matrix,
}

impl TextState {
    pub fn new() -> Self {
        Self {
            ctm: MATRIX_IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: 0.0,
            h_scale: 1.0,
            rise: 0.0,
            text_matrix: MATRIX_IDENTITY,
            line_matrix: MATRIX_IDENTITY,
        }
    }

    /// Reset text and line matrices. Called on BT.
    pub fn reset_text_matrices(&mut self) {
        self.text_matrix = MATRIX_IDENTITY;
        self.line_matrix = MATRIX_IDENTITY;
    }

    /// Set both matrices directly (Tm).
    pub fn set_text_matrix(&mut self, m: Matrix) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    /// Translate the text matrix by (tx, ty).
    pub fn translate_text_matrix(&mut self, v: Point) {
        self.text_matrix = translate_matrix(self.text_matrix, v);
    }

    /// Move to the next line relative to the line matrix (Td, TD).
    pub fn translate_text_line_matrix(&mut self, v: Point) {
        self.line_matrix = translate_matrix(self.line_matrix, v);
        self.text_matrix = self.line_matrix;
    }

    /// Move to the next line using the current leading (T*, ', ").
    pub fn carriage_return(&mut self) {
        self.translate_text_line_matrix((0.0, -self.leading));
    }
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentState for TextState {
    fn transform(&mut self, m: Matrix) {
        self.ctm = mult_matrix(m, self.ctm);
    }
}

/// Explicit stack of content states.
///
/// `save` pushes a clone of the current state, `restore` pops one back,
/// `transform` composes into the current state's matrix. A `restore`
/// without a matching `save` leaves the state untouched.
#[derive(Debug, Clone)]
pub struct StateManager<S: ContentState> {
    /// Current state
    pub state: S,
    stack: Vec<S>,
}

impl<S: ContentState> StateManager<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            stack: Vec::new(),
        }
    }

    pub fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    pub fn restore(&mut self) {
        if let Some(prev) = self.stack.pop() {
            self.state = prev;
        }
    }

    pub fn transform(&mut self, m: Matrix) {
        self.state.transform(m);
    }

    /// Number of saves without a matching restore.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
