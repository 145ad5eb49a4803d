//! Operator preprocessor.
//!
//! Reads primitive values until an operator keyword is found, validates
//! the operator's declared arity, and mirrors save/restore/transform into
//! the state manager so the unclosed-save depth is always known.
//!
//! Malformed streams where operators bleed into each other are recovered
//! by borrowing from (or donating to) a side buffer of leftover
//! arguments. A fixed-arity operator still short of arguments is skipped
//! with a warning, except that skipped path operators count toward a hard
//! failure threshold: past it the stream is treated as unrecoverable.

use crate::error::{EvalError, Result};
use crate::model::{ContentState, Object, StateManager};
use crate::ops::{self, OpCode};
use crate::parser::content::{ContentItem, ContentParser};
use crate::utils::matrix_from_slice;
use tracing::{info, warn};

/// Invalid path operators tolerated before the evaluation fails hard.
pub const MAX_INVALID_PATH_OPS: u32 = 20;
/// No operator takes more arguments than this.
const MAX_ARGS: usize = 33;

/// One validated operation: the operator code and its collected
/// arguments.
#[derive(Debug)]
pub struct Operation {
    pub op: OpCode,
    pub args: Vec<Object>,
}

/// Wraps the content parser, owning the state manager it mirrors into.
pub struct Preprocessor<S: ContentState> {
    parser: ContentParser,
    state_manager: StateManager<S>,
    non_processed_args: Vec<Object>,
    num_invalid_path_ops: u32,
}

impl<S: ContentState> Preprocessor<S> {
    pub fn new(parser: ContentParser, initial_state: S) -> Self {
        Self {
            parser,
            state_manager: StateManager::new(initial_state),
            non_processed_args: Vec::new(),
            num_invalid_path_ops: 0,
        }
    }

    pub fn state(&self) -> &S {
        &self.state_manager.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state_manager.state
    }

    /// Push a state frame on behalf of the evaluator (form descents).
    pub fn save_state(&mut self) {
        self.state_manager.save();
    }

    pub fn restore_state(&mut self) {
        self.state_manager.restore();
    }

    /// Number of saves without a matching restore.
    pub fn saved_states_depth(&self) -> usize {
        self.state_manager.depth()
    }

    /// Read the next operation, or None at end of stream. Leftover
    /// operands without an operator are dropped.
    pub fn read(&mut self) -> Result<Option<Operation>> {
        let mut args: Vec<Object> = Vec::new();

        loop {
            match self.parser.next_item()? {
                None => return Ok(None),
                Some(ContentItem::Operand(obj)) => {
                    args.push(obj);
                    if args.len() > MAX_ARGS {
                        return Err(EvalError::Format(format!(
                            "too many operator arguments: {}",
                            args.len()
                        )));
                    }
                }
                Some(ContentItem::InlineImage(image)) => {
                    // The assembled image is the single argument of the
                    // end-of-inline-image operator.
                    return Ok(Some(Operation {
                        op: OpCode::EndInlineImage,
                        args: vec![Object::Stream(Box::new(image))],
                    }));
                }
                Some(ContentItem::Operator(keyword)) => {
                    let Some(spec) = ops::lookup(&keyword) else {
                        warn!(
                            "unknown operator: {}",
                            String::from_utf8_lossy(&keyword)
                        );
                        continue;
                    };
                    let op = spec.op;
                    let num_args = spec.num_args as usize;

                    if !spec.variable_args {
                        // Operators can run into each other in malformed
                        // streams (/F2 /GS2 gs 5.711 Tf); rebalance via
                        // the leftover buffer.
                        if args.len() != num_args {
                            while args.len() > num_args {
                                self.non_processed_args.push(args.remove(0));
                            }
                            while args.len() < num_args {
                                let Some(arg) = self.non_processed_args.pop() else {
                                    break;
                                };
                                args.insert(0, arg);
                            }
                            if self.non_processed_args.len() > MAX_ARGS {
                                let excess = self.non_processed_args.len() - MAX_ARGS;
                                self.non_processed_args.drain(..excess);
                            }
                        }

                        if args.len() < num_args {
                            if op.is_path_op() {
                                self.num_invalid_path_ops += 1;
                                if self.num_invalid_path_ops > MAX_INVALID_PATH_OPS {
                                    return Err(EvalError::Format(format!(
                                        "invalid {}: expected {} args, received {}",
                                        op.name(),
                                        num_args,
                                        args.len()
                                    )));
                                }
                            }
                            warn!(
                                "skipping {}: expected {} args, received {}",
                                op.name(),
                                num_args,
                                args.len()
                            );
                            args.clear();
                            continue;
                        }
                    } else if args.len() > num_args {
                        info!(
                            "{}: expected [0, {}] args, received {}",
                            op.name(),
                            num_args,
                            args.len()
                        );
                    }

                    self.preprocess(op, &args);
                    return Ok(Some(Operation { op, args }));
                }
            }
        }
    }

    /// Mirror the state-affecting operators into the state manager.
    fn preprocess(&mut self, op: OpCode, args: &[Object]) {
        match op {
            OpCode::Save => self.state_manager.save(),
            OpCode::Restore => self.state_manager.restore(),
            OpCode::Transform => {
                let nums: Vec<f64> = args.iter().filter_map(|a| a.as_num().ok()).collect();
                if let Some(matrix) = matrix_from_slice(&nums) {
                    self.state_manager.transform(matrix);
                }
            }
            _ => {}
        }
    }
}
