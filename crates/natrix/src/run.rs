//! Public interfaces for running code: one-shot [`Runner`] and the
//! chunk-at-a-time [`ReplEvaluator`].

use crate::{
    ast::Module,
    builtins,
    errors::{Error, EvalResult},
    io::{CollectStringIo, IoHandler, StdIo},
    lexer::tokenize,
    machine::{Context, Machine},
    modules::{ModuleLoader, ModuleRegistry, NoModules},
    object::Object,
    parser::parse,
    resolver,
};

/// Evaluation options.
///
/// `step_limit` bounds the machine's total steps across the context's
/// lifetime (0 disables the bound); `env_steps` is recorded for
/// visualization hosts. `is_prelude` exempts a chunk from step
/// accounting entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EvalOptions {
    pub is_prelude: bool,
    pub env_steps: u64,
    pub step_limit: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            is_prelude: false,
            env_steps: 0,
            step_limit: 0,
        }
    }
}

/// One-shot execution of a complete program.
///
/// # Example
/// ```
/// use natrix::Runner;
///
/// let runner = Runner::new("x = 3\ny = 4\nx + y\n").unwrap();
/// let result = runner.run_collect().unwrap();
/// assert_eq!(result.0.to_string(), "7");
/// ```
#[derive(Debug)]
pub struct Runner {
    module: Module,
    source: String,
}

impl Runner {
    /// Tokenizes, parses, and resolves the program.
    ///
    /// # Errors
    /// Returns the first tokenizer, parser, or resolver diagnostic.
    pub fn new(code: impl Into<String>) -> Result<Self, Error> {
        let source = code.into();
        let tokens = tokenize(&source)?;
        let module = parse(tokens)?;
        resolver::resolve(&module, &builtins::builtin_names())?;
        Ok(Self { module, source })
    }

    /// The source the runner was built from, for rendering diagnostics.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Runs to completion against a fresh context, printing to stdout.
    pub fn run(&self) -> Result<Object, Error> {
        self.run_with(&mut StdIo)
    }

    /// Runs to completion, writing output through the given handler.
    pub fn run_with(&self, io: &mut impl IoHandler) -> Result<Object, Error> {
        self.run_with_options(io, &EvalOptions::default())
    }

    /// Runs with explicit options (step limits, prelude accounting).
    pub fn run_with_options(&self, io: &mut impl IoHandler, options: &EvalOptions) -> Result<Object, Error> {
        let mut ctx = Context::new();
        ModuleRegistry::new(NoModules).preload(&self.module, &mut ctx)?;
        let value = Machine::new(&mut ctx, io, options).run(&self.module)?;
        Ok(Object::from_value(&value, &ctx))
    }

    /// Runs to completion and returns both the result and everything the
    /// program printed.
    pub fn run_collect(&self) -> Result<(Object, String), Error> {
        let mut io = CollectStringIo::new();
        let result = self.run_with(&mut io)?;
        Ok((result, io.into_output()))
    }
}

/// The conductor-facing evaluator: parse, resolve, and run one chunk at
/// a time against an accumulated context.
///
/// Output (from `print`, chunk results, and formatted errors) flows
/// through the owned [`IoHandler`]; the host reads it back from there.
pub struct ReplEvaluator<L: ModuleLoader, Io: IoHandler> {
    ctx: Context,
    registry: ModuleRegistry<L>,
    io: Io,
    options: EvalOptions,
}

impl<L: ModuleLoader, Io: IoHandler> ReplEvaluator<L, Io> {
    pub fn new(loader: L, io: Io, options: EvalOptions) -> Self {
        Self {
            ctx: Context::new(),
            registry: ModuleRegistry::new(loader),
            io,
            options,
        }
    }

    /// Starts the evaluator on an entrypoint program. Equivalent to
    /// evaluating it as the first chunk.
    pub fn start(&mut self, entrypoint: &str) -> Result<Object, Error> {
        self.evaluate_chunk(entrypoint)
    }

    /// Parses, resolves, preloads modules for, and evaluates one chunk.
    ///
    /// The repr of the chunk's value is sent through the handler (unless
    /// it is `None`); a failure is sent as `Error: <formatted message>`
    /// with the snippet-and-caret rendering, and also returned.
    pub fn evaluate_chunk(&mut self, source: &str) -> Result<Object, Error> {
        match self.evaluate_inner(source) {
            Ok(object) => {
                if object != Object::None {
                    self.io.stdout_write(&object.to_string());
                    self.io.stdout_push('\n');
                }
                Ok(object)
            }
            Err(err) => {
                self.io.stdout_write(&format!("Error: {}", err.render(source)));
                self.io.stdout_push('\n');
                // Frames pushed by an aborted call chain must not leak
                // into the next chunk.
                self.ctx.unwind_to_global();
                Err(err)
            }
        }
    }

    fn evaluate_inner(&mut self, source: &str) -> EvalResult<Object> {
        let tokens = tokenize(source)?;
        let module = parse(tokens)?;
        let globals = self.ctx.global_names();
        resolver::resolve_with_globals(&module, &builtins::builtin_names(), &globals)?;
        self.registry.preload(&module, &mut self.ctx)?;
        let value = Machine::new(&mut self.ctx, &mut self.io, &self.options).run(&module)?;
        Ok(Object::from_value(&value, &self.ctx))
    }

    /// Total machine steps executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.ctx.steps
    }

    /// Read access to the handler, e.g. to drain collected output.
    pub fn io(&self) -> &Io {
        &self.io
    }

    /// Mutable access to the handler.
    pub fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }
}
