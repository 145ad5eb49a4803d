//! PDF function evaluation seam.
//!
//! The evaluator never interprets function dictionaries itself; it asks a
//! factory for a callable and samples it where the output format wants
//! lookup tables (ExtGState transfer functions).

use crate::error::Result;
use crate::model::Object;
use std::sync::Arc;

/// A sampled-evaluation view of a PDF function.
pub trait PdfFunction: Send + Sync {
    /// Evaluate the function. Inputs and outputs are clamped to the
    /// function's domain/range by the implementation.
    fn eval(&self, input: &[f64], output: &mut [f64]);
}

/// Creates callables from function dictionaries or streams.
pub trait FunctionFactory: Send + Sync {
    fn create(&self, obj: &Object) -> Result<Arc<dyn PdfFunction>>;
}

/// Identity transfer; also the fallback factory for hosts without a
/// function interpreter.
pub struct IdentityFunction;

impl PdfFunction for IdentityFunction {
    fn eval(&self, input: &[f64], output: &mut [f64]) {
        for (out, val) in output.iter_mut().zip(input.iter()) {
            *out = *val;
        }
    }
}

/// Factory returning the identity function for every descriptor.
pub struct IdentityFunctionFactory;

impl FunctionFactory for IdentityFunctionFactory {
    fn create(&self, _obj: &Object) -> Result<Arc<dyn PdfFunction>> {
        Ok(Arc::new(IdentityFunction))
    }
}

/// Sample a single-input, single-output function into a 256-entry lookup
/// table over the unit interval.
pub fn sample_function_256(func: &dyn PdfFunction) -> Arc<[u8; 256]> {
    let mut table = [0u8; 256];
    let mut out = [0.0f64];
    for (i, entry) in table.iter_mut().enumerate() {
        func.eval(&[i as f64 / 255.0], &mut out);
        *entry = (out[0] * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    Arc::new(table)
}
