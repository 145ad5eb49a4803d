//! dumpops - Evaluate a content stream and dump its operator list.
//!
//! A command line tool for inspecting evaluator output as JSON. The
//! resource dictionary comes from an optional JSON sidecar: names are
//! written with a leading slash ("/DeviceRGB"), indirect references as
//! {"$ref": [id, gen]}.

use clap::Parser;
use memmap2::Mmap;
use miranda_core::error::{EvalError, Result};
use miranda_core::model::{Dict, ObjRef, Object};
use miranda_core::oplist::{GlyphItem, MarkedProps, OpArgs, OperatorList};
use miranda_core::parser::ContentStream;
use miranda_core::store::MemoryStore;
use miranda_core::{ContentEvaluator, EvalTask, EvaluatorContext, EvaluatorOptions};
use serde_json::{Value, json};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dumpops", about = "Dump a content stream's operator list as JSON")]
struct Args {
    /// Content stream file
    content: PathBuf,

    /// Resource dictionary as JSON
    #[arg(short, long)]
    resources: Option<PathBuf>,

    /// Abort on the first non-conformance instead of recovering
    #[arg(long)]
    strict: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let file = File::open(&args.content)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let resources = match &args.resources {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| EvalError::Format(format!("bad resources JSON: {e}")))?;
            match json_to_object(&value) {
                Object::Dict(dict) => dict,
                _ => return Err(EvalError::Format("resources must be a JSON object".into())),
            }
        }
        None => Dict::default(),
    };

    let evaluator = ContentEvaluator::new(
        EvaluatorContext::basic(Arc::new(MemoryStore::new())),
        0,
        EvaluatorOptions {
            ignore_errors: !args.strict,
            ..Default::default()
        },
    );
    let task = EvalTask::new();
    let mut op_list = OperatorList::new();
    futures::executor::block_on(evaluator.get_operator_list(
        ContentStream::from_bytes(mmap.to_vec()),
        &resources,
        &mut op_list,
        None,
        &task,
    ))?;

    let ops: Vec<Value> = op_list
        .fn_array()
        .iter()
        .zip(op_list.args_array())
        .map(|(op, args)| json!({ "op": op.name(), "args": args_to_json(args) }))
        .collect();
    let mut dependencies: Vec<&String> = op_list.dependencies().iter().collect();
    dependencies.sort();
    let doc = json!({ "ops": ops, "dependencies": dependencies });

    let mut out: BufWriter<Box<dyn Write>> = BufWriter::new(match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&doc).unwrap_or_default())?;
    Ok(())
}

fn json_to_object(value: &Value) -> Object {
    match value {
        Value::Null => Object::Null,
        Value::Bool(b) => Object::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Object::Int(i),
            None => Object::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => match s.strip_prefix('/') {
            Some(name) => Object::Name(name.to_string()),
            None => Object::String(s.as_bytes().to_vec()),
        },
        Value::Array(items) => Object::Array(items.iter().map(json_to_object).collect()),
        Value::Object(map) => {
            if let Some(Value::Array(parts)) = map.get("$ref")
                && let (Some(id), Some(r#gen)) =
                    (parts.first().and_then(Value::as_u64), parts.get(1).and_then(Value::as_u64))
            {
                return Object::Ref(ObjRef::new(id as u32, r#gen as u16));
            }
            Object::Dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), json_to_object(v)))
                    .collect(),
            )
        }
    }
}

fn args_to_json(args: &OpArgs) -> Value {
    match args {
        OpArgs::None => json!([]),
        OpArgs::Numbers(nums) => json!(nums.as_slice()),
        OpArgs::Name(name) | OpArgs::Dependency(name) => json!([name]),
        OpArgs::Dash { array, phase } => json!([array, phase]),
        OpArgs::Font { loaded_name, size } => json!([loaded_name, size]),
        OpArgs::Glyphs(items) => json!(
            items
                .iter()
                .map(|item| match item {
                    GlyphItem::Glyph(glyph) => json!(glyph.unicode),
                    GlyphItem::Spacing(s) => json!(s),
                })
                .collect::<Vec<Value>>()
        ),
        OpArgs::ConstructPath { ops, coords } => json!([
            ops.iter().map(|op| format!("{op:?}")).collect::<Vec<String>>(),
            coords,
        ]),
        OpArgs::Image {
            object_id,
            width,
            height,
        } => json!([object_id, width, height]),
        OpArgs::InlineImage(image) => {
            json!([{ "width": image.width, "height": image.height, "bytes": image.data.len() }])
        }
        OpArgs::ImageMask(mask) => {
            json!([{ "width": mask.width, "height": mask.height, "bytes": mask.data.len() }])
        }
        OpArgs::GState(entries) => json!(
            entries
                .iter()
                .map(|entry| format!("{entry:?}"))
                .collect::<Vec<String>>()
        ),
        OpArgs::Shading(ir) => json!([ir.kind]),
        OpArgs::TilingPattern(ir) => {
            json!(["TilingPattern", ir.paint_type, ir.op_list.fn_array().len()])
        }
        OpArgs::MarkedContent { tag, props } => {
            let props = match props {
                MarkedProps::None => Value::Null,
                MarkedProps::Raw(_) => json!("dict"),
                MarkedProps::OptionalContent(oc) => json!({ "kind": oc.kind, "ids": oc.ids }),
            };
            json!([tag, props])
        }
        OpArgs::Group { isolated, knockout } => {
            json!([{ "isolated": isolated, "knockout": knockout }])
        }
        OpArgs::FormBegin { matrix, bbox } => {
            let matrix = matrix.map(|m| vec![m.0, m.1, m.2, m.3, m.4, m.5]);
            let bbox = bbox.map(|b| vec![b.0, b.1, b.2, b.3]);
            json!([matrix, bbox])
        }
    }
}
