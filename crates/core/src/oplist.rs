//! Operator list: the evaluator's structured output.
//!
//! Parallel operator-code and argument arrays plus a set of pending
//! resource dependency identifiers. When a streaming sink is attached the
//! list flushes itself in chunks; the sink's `ready` future is the
//! back-pressure signal awaited at every suspend point.

use crate::font::Glyph;
use crate::image::{DecodedImage, MaskData};
use crate::model::Object;
use crate::ops::OpCode;
use crate::pattern::{ShadingIR, TilingPatternIR};
use crate::utils::{Matrix, Rect};
use futures::future::BoxFuture;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Number of operators per streamed chunk.
pub const CHUNK_SIZE: usize = 1000;

/// One item of a show-text argument: a mapped glyph or an inter-glyph
/// spacing adjustment (in thousandths of text space units).
#[derive(Debug, Clone)]
pub enum GlyphItem {
    Glyph(Glyph),
    Spacing(f64),
}

/// Path construction entries merged into a ConstructPath operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOp {
    MoveTo,
    LineTo,
    CurveTo,
    CurveTo2,
    CurveTo3,
    ClosePath,
    Rectangle,
}

/// A flattened ExtGState parameter change.
#[derive(Debug, Clone)]
pub enum GStateEntry {
    LineWidth(f64),
    LineCap(i64),
    LineJoin(i64),
    MiterLimit(f64),
    Dash { array: Vec<f64>, phase: f64 },
    RenderingIntent(String),
    Flatness(f64),
    StrokeAlpha(f64),
    FillAlpha(f64),
    BlendMode(String),
    Font { loaded_name: String, size: f64 },
    SMask(Option<SMaskData>),
    TransferFunction(Vec<Arc<[u8; 256]>>),
}

/// A resolved soft mask: the mask group's own operator list plus the
/// compositing parameters the renderer needs.
#[derive(Debug, Clone)]
pub struct SMaskData {
    /// "Alpha" or "Luminosity"
    pub subtype: String,
    pub backdrop: Option<Vec<f64>>,
    pub transfer: Option<Arc<[u8; 256]>>,
    pub matrix: Matrix,
    pub bbox: Option<Rect>,
    pub group: Arc<OperatorList>,
}

/// Boolean visibility expression over optional-content groups.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibilityExpression {
    And(Vec<VisibilityExpression>),
    Or(Vec<VisibilityExpression>),
    Not(Vec<VisibilityExpression>),
    /// Leaf: an optional-content group identifier
    Group(String),
}

/// Resolved optional-content membership for a marked content sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalContentProps {
    /// "OCG" or "OCMD"
    pub kind: String,
    pub ids: Vec<String>,
    pub expression: Option<VisibilityExpression>,
}

/// Properties attached to a marked content operator.
#[derive(Debug, Clone)]
pub enum MarkedProps {
    None,
    /// Property dictionary passed through to the renderer
    Raw(Object),
    OptionalContent(OptionalContentProps),
}

/// Argument payload of one output operator.
#[derive(Debug, Clone)]
pub enum OpArgs {
    None,
    Numbers(SmallVec<[f64; 6]>),
    Name(String),
    Dependency(String),
    Dash { array: Vec<f64>, phase: f64 },
    Font { loaded_name: String, size: f64 },
    Glyphs(Vec<GlyphItem>),
    ConstructPath { ops: Vec<PathOp>, coords: Vec<f64> },
    Image { object_id: String, width: u32, height: u32 },
    InlineImage(Arc<DecodedImage>),
    ImageMask(Arc<MaskData>),
    GState(Arc<Vec<GStateEntry>>),
    Shading(Arc<ShadingIR>),
    TilingPattern(Arc<TilingPatternIR>),
    MarkedContent { tag: String, props: MarkedProps },
    Group { isolated: bool, knockout: bool },
    FormBegin { matrix: Option<Matrix>, bbox: Option<Rect> },
}

impl OpArgs {
    pub fn numbers(values: &[f64]) -> Self {
        Self::Numbers(SmallVec::from_slice(values))
    }
}

/// A flushed run of operators, delivered to the renderer.
#[derive(Debug)]
pub struct OperatorChunk {
    pub fn_array: Vec<OpCode>,
    pub args_array: Vec<OpArgs>,
    pub dependencies: Vec<String>,
    pub last: bool,
}

/// Receiving end of a streamed operator list.
///
/// `ready` is the back-pressure signal: the evaluator awaits it together
/// with any pending resource resolution before re-entering its loop.
pub trait OperatorSink: Send + Sync {
    fn send_chunk(&self, chunk: OperatorChunk);

    fn ready(&self) -> BoxFuture<'static, ()> {
        Box::pin(futures::future::ready(()))
    }
}

/// Ordered output of one evaluation.
///
/// Appended to only by its owning evaluation; consumed by the renderer
/// after every identifier in the dependency set has resolved.
pub struct OperatorList {
    fn_array: Vec<OpCode>,
    args_array: Vec<OpArgs>,
    dependencies: FxHashSet<String>,
    sink: Option<Arc<dyn OperatorSink>>,
    flushed: usize,
}

impl OperatorList {
    pub fn new() -> Self {
        Self {
            fn_array: Vec::new(),
            args_array: Vec::new(),
            dependencies: FxHashSet::default(),
            sink: None,
            flushed: 0,
        }
    }

    /// An operator list that streams chunks to a renderer sink.
    pub fn with_sink(sink: Arc<dyn OperatorSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// Operators currently buffered (not yet flushed).
    pub fn len(&self) -> usize {
        self.fn_array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fn_array.is_empty() && self.flushed == 0
    }

    /// Total operators appended over the lifetime of this list.
    pub fn total_length(&self) -> usize {
        self.flushed + self.fn_array.len()
    }

    pub fn fn_array(&self) -> &[OpCode] {
        &self.fn_array
    }

    pub fn args_array(&self) -> &[OpArgs] {
        &self.args_array
    }

    pub fn dependencies(&self) -> &FxHashSet<String> {
        &self.dependencies
    }

    pub fn last_op(&self) -> Option<OpCode> {
        self.fn_array.last().copied()
    }

    /// Append one operator.
    pub fn add_op(&mut self, op: OpCode, args: OpArgs) {
        self.fn_array.push(op);
        self.args_array.push(args);
        if self.sink.is_some() && self.fn_array.len() >= CHUNK_SIZE {
            self.flush(false);
        }
    }

    /// Record a pending resource and emit its dependency marker once.
    pub fn add_dependency(&mut self, id: &str) {
        if self.dependencies.contains(id) {
            return;
        }
        self.dependencies.insert(id.to_string());
        self.add_op(OpCode::Dependency, OpArgs::Dependency(id.to_string()));
    }

    pub fn add_dependencies<'a, I: IntoIterator<Item = &'a String>>(&mut self, ids: I) {
        for id in ids {
            self.add_dependency(id);
        }
    }

    /// Append another list's operators, merging its dependency set.
    pub fn add_op_list(&mut self, other: &OperatorList) {
        self.dependencies.extend(other.dependencies.iter().cloned());
        for (op, args) in other.fn_array.iter().zip(other.args_array.iter()) {
            self.add_op(*op, args.clone());
        }
    }

    /// Try to merge a path construction entry into a trailing
    /// ConstructPath operator. Returns false when a fresh operator is
    /// needed.
    pub fn append_path(&mut self, op: PathOp, coords: &[f64]) -> bool {
        if self.last_op() != Some(OpCode::ConstructPath) {
            return false;
        }
        if let Some(OpArgs::ConstructPath {
            ops,
            coords: all_coords,
        }) = self.args_array.last_mut()
        {
            ops.push(op);
            all_coords.extend_from_slice(coords);
            true
        } else {
            false
        }
    }

    /// Drop buffered operators whose code fails the predicate, keeping
    /// the parallel arrays in sync. Only meaningful for unflushed lists
    /// (Type3 glyph programs).
    pub fn retain_ops(&mut self, keep: impl Fn(OpCode) -> bool) {
        let mut kept_args = Vec::with_capacity(self.args_array.len());
        let mut kept_ops = Vec::with_capacity(self.fn_array.len());
        for (op, args) in self.fn_array.drain(..).zip(self.args_array.drain(..)) {
            if keep(op) {
                kept_ops.push(op);
                kept_args.push(args);
            }
        }
        self.fn_array = kept_ops;
        self.args_array = kept_args;
    }

    /// Send buffered operators to the sink, if one is attached.
    pub fn flush(&mut self, last: bool) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        self.flushed += self.fn_array.len();
        let chunk = OperatorChunk {
            fn_array: std::mem::take(&mut self.fn_array),
            args_array: std::mem::take(&mut self.args_array),
            dependencies: self.dependencies.iter().cloned().collect(),
            last,
        };
        sink.send_chunk(chunk);
    }

    /// Back-pressure signal: resolves when the renderer can accept more
    /// output. Immediate when no sink is attached.
    pub fn ready(&self) -> BoxFuture<'static, ()> {
        match &self.sink {
            Some(sink) => sink.ready(),
            None => Box::pin(futures::future::ready(())),
        }
    }
}

impl Default for OperatorList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperatorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorList")
            .field("fn_array", &self.fn_array)
            .field("dependencies", &self.dependencies)
            .field("flushed", &self.flushed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CollectingSink {
        chunks: Mutex<Vec<OperatorChunk>>,
    }

    impl OperatorSink for CollectingSink {
        fn send_chunk(&self, chunk: OperatorChunk) {
            self.chunks.lock().push(chunk);
        }
    }

    #[test]
    fn test_sink_receives_full_chunks() {
        let sink = Arc::new(CollectingSink {
            chunks: Mutex::new(Vec::new()),
        });
        let mut list = OperatorList::with_sink(sink.clone());
        for _ in 0..CHUNK_SIZE + 10 {
            list.add_op(OpCode::Save, OpArgs::None);
        }
        assert_eq!(sink.chunks.lock().len(), 1);
        assert_eq!(list.len(), 10);
        assert_eq!(list.total_length(), CHUNK_SIZE + 10);

        list.flush(true);
        let chunks = sink.chunks.lock();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].fn_array.len(), CHUNK_SIZE);
        assert!(chunks[1].last);
    }

    #[test]
    fn test_dependency_emitted_once() {
        let mut list = OperatorList::new();
        list.add_dependency("g_font_1");
        list.add_dependency("g_font_1");
        assert_eq!(list.fn_array(), &[OpCode::Dependency]);
        assert_eq!(list.dependencies().len(), 1);
    }

    #[test]
    fn test_append_path_merges() {
        let mut list = OperatorList::new();
        list.add_op(
            OpCode::ConstructPath,
            OpArgs::ConstructPath {
                ops: vec![PathOp::MoveTo],
                coords: vec![0.0, 0.0],
            },
        );
        assert!(list.append_path(PathOp::LineTo, &[5.0, 5.0]));
        assert_eq!(list.len(), 1);
        match &list.args_array()[0] {
            OpArgs::ConstructPath { ops, coords } => {
                assert_eq!(ops, &[PathOp::MoveTo, PathOp::LineTo]);
                assert_eq!(coords, &[0.0, 0.0, 5.0, 5.0]);
            }
            other => panic!("unexpected args: {other:?}"),
        }
    }

    #[test]
    fn test_append_path_needs_trailing_construct() {
        let mut list = OperatorList::new();
        list.add_op(OpCode::Save, OpArgs::None);
        assert!(!list.append_path(PathOp::MoveTo, &[1.0, 2.0]));
    }
}
