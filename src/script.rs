use crate::{
    error::SketchError,
    namespace::{Builtins, Namespace},
};
use rhai::{Dynamic, Engine, AST};
use std::{
    cell::RefCell,
    fs,
    io::{self, Write},
    path::Path,
    rc::Rc,
};

/// Sketch source and the name diagnostics refer to it by.
#[derive(Clone, Debug)]
pub struct Script {
    id: String,
    text: String,
}

impl Script {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SketchError> {
        let text = fs::read_to_string(&path)?;
        Ok(Self::new(path.as_ref().display().to_string(), text))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn compile(&self, engine: &Engine) -> Result<AST, SketchError> {
        let mut ast = engine
            .compile(&self.text)
            .map_err(|err| SketchError::compile(&self.id, &self.text, err))?;
        ast.set_source(self.id.as_str());
        Ok(ast)
    }
}

/// An interpreter session: the engine, its namespace and buffered `print`
/// output.
pub struct Session {
    pub(crate) engine: Engine,
    pub(crate) namespace: Namespace,
    printed: Rc<RefCell<Vec<String>>>,
    sink: Box<dyn Write>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_sink(io::stdout())
    }

    /// A session whose flushed `print` output goes to `sink`.
    pub fn with_sink(sink: impl Write + 'static) -> Self {
        let builtins = Builtins::default();
        let printed = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::new();

        let buffer = printed.clone();
        engine.on_print(move |text| buffer.borrow_mut().push(text.to_string()));
        engine.on_debug(|text, source, pos| {
            log::debug!("{}{pos:?}: {text}", source.unwrap_or("script"))
        });

        let resolver = builtins.clone();
        #[allow(deprecated)]
        engine.on_var(move |name, _index, context| {
            if context.scope().contains(name) {
                Ok(None)
            } else {
                Ok(resolver.get(name))
            }
        });

        Self {
            engine,
            namespace: Namespace::new(builtins),
            printed,
            sink: Box::new(sink),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn builtins(&self) -> &Builtins {
        self.namespace.builtins()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn get(&self, name: &str) -> Option<Dynamic> {
        self.namespace.get(name)
    }

    pub fn set(&mut self, name: &str, value: Dynamic) {
        self.namespace.set(name, value);
    }

    /// Runs a compiled sketch against the global namespace, then flushes
    /// whatever it printed.
    pub fn execute(&mut self, script: &Script, ast: &AST) -> Result<(), SketchError> {
        let mark = self.namespace.global_count();
        let result = self
            .engine
            .run_ast_with_scope(&mut self.namespace.globals, ast)
            .map_err(|err| SketchError::script(script.id(), script.text(), err));
        self.namespace.settle(mark);
        self.flush()?;
        result
    }

    pub fn flush(&mut self) -> Result<(), SketchError> {
        let lines: Vec<String> = self.printed.borrow_mut().drain(..).collect();
        for line in lines {
            writeln!(self.sink, "{line}")?;
        }
        self.sink.flush()?;
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
