//! Operator codes and the content stream keyword table.
//!
//! Every operator the evaluator can emit is a variant of [`OpCode`]; the
//! renderer dispatches on this closed enum rather than on keyword strings.
//! [`lookup`] maps a raw content stream keyword to its [`OpSpec`], which
//! declares the operator's argument arity: fixed (exact count) or variable
//! (0..=max).

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Renderer-consumable operator codes.
///
/// Most variants correspond 1:1 to content stream operators; the remainder
/// (`Dependency`, `ConstructPath`, the form/group wrappers and the image
/// paint codes) only ever appear in evaluator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Marks a pending resource the renderer must wait on
    Dependency,
    SetLineWidth,
    SetLineCap,
    SetLineJoin,
    SetMiterLimit,
    SetDash,
    SetRenderingIntent,
    SetFlatness,
    SetGState,
    Save,
    Restore,
    Transform,
    MoveTo,
    LineTo,
    CurveTo,
    CurveTo2,
    CurveTo3,
    ClosePath,
    Rectangle,
    Stroke,
    CloseStroke,
    Fill,
    EoFill,
    FillStroke,
    EoFillStroke,
    CloseFillStroke,
    CloseEoFillStroke,
    EndPath,
    Clip,
    EoClip,
    BeginText,
    EndText,
    SetCharSpacing,
    SetWordSpacing,
    SetHScale,
    SetLeading,
    SetFont,
    SetTextRenderingMode,
    SetTextRise,
    MoveText,
    SetLeadingMoveText,
    SetTextMatrix,
    NextLine,
    ShowText,
    ShowSpacedText,
    NextLineShowText,
    NextLineSetSpacingShowText,
    SetCharWidth,
    SetCharWidthAndBounds,
    SetStrokeColorSpace,
    SetFillColorSpace,
    SetStrokeColor,
    SetStrokeColorN,
    SetFillColor,
    SetFillColorN,
    SetStrokeGray,
    SetFillGray,
    SetStrokeRgbColor,
    SetFillRgbColor,
    SetStrokeCmykColor,
    SetFillCmykColor,
    ShadingFill,
    BeginInlineImage,
    BeginImageData,
    EndInlineImage,
    PaintXObject,
    MarkPoint,
    MarkPointProps,
    BeginMarkedContent,
    BeginMarkedContentProps,
    EndMarkedContent,
    BeginCompat,
    EndCompat,
    /// Merged run of consecutive path construction operators
    ConstructPath,
    PaintFormXObjectBegin,
    PaintFormXObjectEnd,
    BeginGroup,
    EndGroup,
    PaintImageXObject,
    PaintInlineImageXObject,
    PaintImageMaskXObject,
}

impl OpCode {
    /// Stable name, used for warnings and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dependency => "dependency",
            Self::SetLineWidth => "setLineWidth",
            Self::SetLineCap => "setLineCap",
            Self::SetLineJoin => "setLineJoin",
            Self::SetMiterLimit => "setMiterLimit",
            Self::SetDash => "setDash",
            Self::SetRenderingIntent => "setRenderingIntent",
            Self::SetFlatness => "setFlatness",
            Self::SetGState => "setGState",
            Self::Save => "save",
            Self::Restore => "restore",
            Self::Transform => "transform",
            Self::MoveTo => "moveTo",
            Self::LineTo => "lineTo",
            Self::CurveTo => "curveTo",
            Self::CurveTo2 => "curveTo2",
            Self::CurveTo3 => "curveTo3",
            Self::ClosePath => "closePath",
            Self::Rectangle => "rectangle",
            Self::Stroke => "stroke",
            Self::CloseStroke => "closeStroke",
            Self::Fill => "fill",
            Self::EoFill => "eoFill",
            Self::FillStroke => "fillStroke",
            Self::EoFillStroke => "eoFillStroke",
            Self::CloseFillStroke => "closeFillStroke",
            Self::CloseEoFillStroke => "closeEOFillStroke",
            Self::EndPath => "endPath",
            Self::Clip => "clip",
            Self::EoClip => "eoClip",
            Self::BeginText => "beginText",
            Self::EndText => "endText",
            Self::SetCharSpacing => "setCharSpacing",
            Self::SetWordSpacing => "setWordSpacing",
            Self::SetHScale => "setHScale",
            Self::SetLeading => "setLeading",
            Self::SetFont => "setFont",
            Self::SetTextRenderingMode => "setTextRenderingMode",
            Self::SetTextRise => "setTextRise",
            Self::MoveText => "moveText",
            Self::SetLeadingMoveText => "setLeadingMoveText",
            Self::SetTextMatrix => "setTextMatrix",
            Self::NextLine => "nextLine",
            Self::ShowText => "showText",
            Self::ShowSpacedText => "showSpacedText",
            Self::NextLineShowText => "nextLineShowText",
            Self::NextLineSetSpacingShowText => "nextLineSetSpacingShowText",
            Self::SetCharWidth => "setCharWidth",
            Self::SetCharWidthAndBounds => "setCharWidthAndBounds",
            Self::SetStrokeColorSpace => "setStrokeColorSpace",
            Self::SetFillColorSpace => "setFillColorSpace",
            Self::SetStrokeColor => "setStrokeColor",
            Self::SetStrokeColorN => "setStrokeColorN",
            Self::SetFillColor => "setFillColor",
            Self::SetFillColorN => "setFillColorN",
            Self::SetStrokeGray => "setStrokeGray",
            Self::SetFillGray => "setFillGray",
            Self::SetStrokeRgbColor => "setStrokeRGBColor",
            Self::SetFillRgbColor => "setFillRGBColor",
            Self::SetStrokeCmykColor => "setStrokeCMYKColor",
            Self::SetFillCmykColor => "setFillCMYKColor",
            Self::ShadingFill => "shadingFill",
            Self::BeginInlineImage => "beginInlineImage",
            Self::BeginImageData => "beginImageData",
            Self::EndInlineImage => "endInlineImage",
            Self::PaintXObject => "paintXObject",
            Self::MarkPoint => "markPoint",
            Self::MarkPointProps => "markPointProps",
            Self::BeginMarkedContent => "beginMarkedContent",
            Self::BeginMarkedContentProps => "beginMarkedContentProps",
            Self::EndMarkedContent => "endMarkedContent",
            Self::BeginCompat => "beginCompat",
            Self::EndCompat => "endCompat",
            Self::ConstructPath => "constructPath",
            Self::PaintFormXObjectBegin => "paintFormXObjectBegin",
            Self::PaintFormXObjectEnd => "paintFormXObjectEnd",
            Self::BeginGroup => "beginGroup",
            Self::EndGroup => "endGroup",
            Self::PaintImageXObject => "paintImageXObject",
            Self::PaintInlineImageXObject => "paintInlineImageXObject",
            Self::PaintImageMaskXObject => "paintImageMaskXObject",
        }
    }

    /// Path construction and painting operators, for the invalid-operator
    /// threshold in the preprocessor.
    pub const fn is_path_op(self) -> bool {
        matches!(
            self,
            Self::MoveTo
                | Self::LineTo
                | Self::CurveTo
                | Self::CurveTo2
                | Self::CurveTo3
                | Self::ClosePath
                | Self::Rectangle
                | Self::Stroke
                | Self::CloseStroke
                | Self::Fill
                | Self::EoFill
                | Self::FillStroke
                | Self::EoFillStroke
                | Self::CloseFillStroke
                | Self::CloseEoFillStroke
                | Self::EndPath
        )
    }

    /// Color-setting operators, stripped from Type3 glyph programs that
    /// declare their metrics with d1.
    pub const fn is_color_op(self) -> bool {
        matches!(
            self,
            Self::SetStrokeColorSpace
                | Self::SetFillColorSpace
                | Self::SetStrokeColor
                | Self::SetStrokeColorN
                | Self::SetFillColor
                | Self::SetFillColorN
                | Self::SetStrokeGray
                | Self::SetFillGray
                | Self::SetStrokeRgbColor
                | Self::SetFillRgbColor
                | Self::SetStrokeCmykColor
                | Self::SetFillCmykColor
                | Self::ShadingFill
        )
    }
}

/// Declared arity of a content stream operator.
#[derive(Debug, Clone, Copy)]
pub struct OpSpec {
    pub op: OpCode,
    /// Exact argument count, or the maximum for variable-arity operators
    pub num_args: u8,
    pub variable_args: bool,
}

const fn fixed(op: OpCode, num_args: u8) -> OpSpec {
    OpSpec {
        op,
        num_args,
        variable_args: false,
    }
}

const fn variable(op: OpCode, max_args: u8) -> OpSpec {
    OpSpec {
        op,
        num_args: max_args,
        variable_args: true,
    }
}

static OP_MAP: LazyLock<FxHashMap<&'static [u8], OpSpec>> = LazyLock::new(|| {
    let entries: &[(&[u8], OpSpec)] = &[
        // Graphics state
        (b"w", fixed(OpCode::SetLineWidth, 1)),
        (b"J", fixed(OpCode::SetLineCap, 1)),
        (b"j", fixed(OpCode::SetLineJoin, 1)),
        (b"M", fixed(OpCode::SetMiterLimit, 1)),
        (b"d", fixed(OpCode::SetDash, 2)),
        (b"ri", fixed(OpCode::SetRenderingIntent, 1)),
        (b"i", fixed(OpCode::SetFlatness, 1)),
        (b"gs", fixed(OpCode::SetGState, 1)),
        (b"q", fixed(OpCode::Save, 0)),
        (b"Q", fixed(OpCode::Restore, 0)),
        (b"cm", fixed(OpCode::Transform, 6)),
        // Path
        (b"m", fixed(OpCode::MoveTo, 2)),
        (b"l", fixed(OpCode::LineTo, 2)),
        (b"c", fixed(OpCode::CurveTo, 6)),
        (b"v", fixed(OpCode::CurveTo2, 4)),
        (b"y", fixed(OpCode::CurveTo3, 4)),
        (b"h", fixed(OpCode::ClosePath, 0)),
        (b"re", fixed(OpCode::Rectangle, 4)),
        (b"S", fixed(OpCode::Stroke, 0)),
        (b"s", fixed(OpCode::CloseStroke, 0)),
        (b"f", fixed(OpCode::Fill, 0)),
        (b"F", fixed(OpCode::Fill, 0)),
        (b"f*", fixed(OpCode::EoFill, 0)),
        (b"B", fixed(OpCode::FillStroke, 0)),
        (b"B*", fixed(OpCode::EoFillStroke, 0)),
        (b"b", fixed(OpCode::CloseFillStroke, 0)),
        (b"b*", fixed(OpCode::CloseEoFillStroke, 0)),
        (b"n", fixed(OpCode::EndPath, 0)),
        // Clipping
        (b"W", fixed(OpCode::Clip, 0)),
        (b"W*", fixed(OpCode::EoClip, 0)),
        // Text
        (b"BT", fixed(OpCode::BeginText, 0)),
        (b"ET", fixed(OpCode::EndText, 0)),
        (b"Tc", fixed(OpCode::SetCharSpacing, 1)),
        (b"Tw", fixed(OpCode::SetWordSpacing, 1)),
        (b"Tz", fixed(OpCode::SetHScale, 1)),
        (b"TL", fixed(OpCode::SetLeading, 1)),
        (b"Tf", fixed(OpCode::SetFont, 2)),
        (b"Tr", fixed(OpCode::SetTextRenderingMode, 1)),
        (b"Ts", fixed(OpCode::SetTextRise, 1)),
        (b"Td", fixed(OpCode::MoveText, 2)),
        (b"TD", fixed(OpCode::SetLeadingMoveText, 2)),
        (b"Tm", fixed(OpCode::SetTextMatrix, 6)),
        (b"T*", fixed(OpCode::NextLine, 0)),
        (b"Tj", fixed(OpCode::ShowText, 1)),
        (b"TJ", fixed(OpCode::ShowSpacedText, 1)),
        (b"'", fixed(OpCode::NextLineShowText, 1)),
        (b"\"", fixed(OpCode::NextLineSetSpacingShowText, 3)),
        // Type3 glyph metrics
        (b"d0", fixed(OpCode::SetCharWidth, 2)),
        (b"d1", fixed(OpCode::SetCharWidthAndBounds, 6)),
        // Color
        (b"CS", fixed(OpCode::SetStrokeColorSpace, 1)),
        (b"cs", fixed(OpCode::SetFillColorSpace, 1)),
        (b"SC", variable(OpCode::SetStrokeColor, 4)),
        (b"SCN", variable(OpCode::SetStrokeColorN, 33)),
        (b"sc", variable(OpCode::SetFillColor, 4)),
        (b"scn", variable(OpCode::SetFillColorN, 33)),
        (b"G", fixed(OpCode::SetStrokeGray, 1)),
        (b"g", fixed(OpCode::SetFillGray, 1)),
        (b"RG", fixed(OpCode::SetStrokeRgbColor, 3)),
        (b"rg", fixed(OpCode::SetFillRgbColor, 3)),
        (b"K", fixed(OpCode::SetStrokeCmykColor, 4)),
        (b"k", fixed(OpCode::SetFillCmykColor, 4)),
        // Shading
        (b"sh", fixed(OpCode::ShadingFill, 1)),
        // Inline images
        (b"BI", fixed(OpCode::BeginInlineImage, 0)),
        (b"ID", fixed(OpCode::BeginImageData, 0)),
        (b"EI", fixed(OpCode::EndInlineImage, 1)),
        // XObjects
        (b"Do", fixed(OpCode::PaintXObject, 1)),
        // Marked content
        (b"MP", fixed(OpCode::MarkPoint, 1)),
        (b"DP", fixed(OpCode::MarkPointProps, 2)),
        (b"BMC", fixed(OpCode::BeginMarkedContent, 1)),
        (b"BDC", fixed(OpCode::BeginMarkedContentProps, 2)),
        (b"EMC", fixed(OpCode::EndMarkedContent, 0)),
        // Compatibility
        (b"BX", fixed(OpCode::BeginCompat, 0)),
        (b"EX", fixed(OpCode::EndCompat, 0)),
    ];
    entries.iter().copied().collect()
});

/// Look up a content stream keyword. Unknown keywords return None and are
/// skipped by the preprocessor with a warning.
pub fn lookup(keyword: &[u8]) -> Option<OpSpec> {
    OP_MAP.get(keyword).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let spec = lookup(b"cm").unwrap();
        assert_eq!(spec.op, OpCode::Transform);
        assert_eq!(spec.num_args, 6);
        assert!(!spec.variable_args);
    }

    #[test]
    fn test_lookup_variable() {
        let spec = lookup(b"scn").unwrap();
        assert_eq!(spec.op, OpCode::SetFillColorN);
        assert!(spec.variable_args);
        assert_eq!(spec.num_args, 33);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup(b"XYZ").is_none());
    }

    #[test]
    fn test_path_op_range() {
        assert!(OpCode::MoveTo.is_path_op());
        assert!(OpCode::EndPath.is_path_op());
        assert!(!OpCode::Save.is_path_op());
        assert!(!OpCode::ShowText.is_path_op());
    }
}
