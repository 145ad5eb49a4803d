//! stream2txt - Extract text from a content stream.
//!
//! Runs the text extraction traversal over a raw content stream file and
//! prints the reconstructed runs. The resource dictionary comes from an
//! optional JSON sidecar in the same format dumpops uses.

use clap::Parser;
use memmap2::Mmap;
use miranda_core::error::{EvalError, Result};
use miranda_core::model::{Dict, ObjRef, Object};
use miranda_core::parser::ContentStream;
use miranda_core::store::MemoryStore;
use miranda_core::{ContentEvaluator, EvalTask, EvaluatorContext, EvaluatorOptions};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "stream2txt", about = "Extract text runs from a content stream")]
struct Args {
    /// Content stream file
    content: PathBuf,

    /// Resource dictionary as JSON
    #[arg(short, long)]
    resources: Option<PathBuf>,

    /// Print one run per line with its position
    #[arg(long)]
    verbose: bool,

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
            ignore_errors: true,
            ..Default::default()
        },
    );
    let task = EvalTask::new();
    let content = futures::executor::block_on(evaluator.get_text_content(
        ContentStream::from_bytes(mmap.to_vec()),
        &resources,
        &task,
    ))?;

    let mut out: BufWriter<Box<dyn Write>> = BufWriter::new(match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    });

    for item in &content.items {
        if args.verbose {
            writeln!(
                out,
                "[{:.2} {:.2}] {:?} {}",
                item.transform.4, item.transform.5, item.dir, item.text
            )?;
        } else {
            write!(out, "{}", item.text)?;
            if item.has_eol {
                writeln!(out)?;
            } else {
                write!(out, " ")?;
            }
        }
    }
    if !args.verbose {
        writeln!(out)?;
    }
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
