use crate::{
    constants::ConstantTable,
    error::{RendererChange, SketchError},
    mode::ExecutionMode,
    namespace::Builtins,
    script::{Script, Session},
};
use rhai::{CallFnOptions, Dynamic, Engine, FnPtr, AST};

/// Name of the builtin bound to the host object. Inside callbacks the host is
/// also rhai's `this`.
pub const HOST_BINDING: &str = "sketch";

/// Default behaviour of the host framework, used when a sketch leaves the
/// matching callback undefined.
pub trait Host: Clone + 'static {
    fn size(
        &mut self,
        width: u32,
        height: u32,
        renderer: &str,
        path: Option<&str>,
    ) -> Result<(), RendererChange>;

    fn draw(&mut self) {}
    fn mouse_pressed(&mut self) {}
    fn mouse_clicked(&mut self) {}
    fn mouse_released(&mut self) {}
    fn mouse_dragged(&mut self) {}
    fn key_pressed(&mut self) {}
    fn key_released(&mut self) {}
    fn key_typed(&mut self) {}
}

type PopulateBuiltins<H> = Box<dyn FnOnce(&H, &mut Engine, &Builtins)>;
type SetFields<H> = Box<dyn FnMut(&H, &Builtins)>;

/// Host-specific glue: builtins registered once at construction, and host
/// state pushed into the builtins before every `setup`, `draw` and `size`.
pub struct HostGlue<H> {
    populate_builtins: PopulateBuiltins<H>,
    set_fields: SetFields<H>,
}

impl<H> HostGlue<H> {
    pub fn new(
        populate_builtins: impl FnOnce(&H, &mut Engine, &Builtins) + 'static,
        set_fields: impl FnMut(&H, &Builtins) + 'static,
    ) -> Self {
        Self {
            populate_builtins: Box::new(populate_builtins),
            set_fields: Box::new(set_fields),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Setup,
    Draw,
    MousePressed,
    MouseClicked,
    MouseReleased,
    MouseDragged,
    KeyPressed,
    KeyReleased,
    KeyTyped,
}

impl Event {
    pub const ALL: [Event; 9] = [
        Event::Setup,
        Event::Draw,
        Event::MousePressed,
        Event::MouseClicked,
        Event::MouseReleased,
        Event::MouseDragged,
        Event::KeyPressed,
        Event::KeyReleased,
        Event::KeyTyped,
    ];

    /// The script function name handling this event.
    pub fn name(self) -> &'static str {
        match self {
            Event::Setup => "setup",
            Event::Draw => "draw",
            Event::MousePressed => "mousePressed",
            Event::MouseClicked => "mouseClicked",
            Event::MouseReleased => "mouseReleased",
            Event::MouseDragged => "mouseDragged",
            Event::KeyPressed => "keyPressed",
            Event::KeyReleased => "keyReleased",
            Event::KeyTyped => "keyTyped",
        }
    }
}

/// What an event resolved to when the driver was built.
#[derive(Clone, Debug, Default)]
pub enum Callback {
    #[default]
    Absent,
    /// A function defined by the sketch.
    Function(String),
    /// Whatever a global of that name held.
    Value(Dynamic),
}

impl Callback {
    pub fn is_absent(&self) -> bool {
        matches!(self, Callback::Absent)
    }
}

/// Drives a host through a sketch script.
pub struct SketchDriver<H: Host> {
    session: Session,
    script: Script,
    mode: ExecutionMode,
    program: Option<AST>,
    host: H,
    this: Dynamic,
    set_fields: SetFields<H>,
    callbacks: [Callback; 9],
}

impl<H: Host> SketchDriver<H> {
    pub fn new(
        mut session: Session,
        script: Script,
        host: H,
        glue: HostGlue<H>,
        constants: &ConstantTable,
    ) -> Result<Self, SketchError> {
        let mode = ExecutionMode::detect(script.text());
        log::debug!("{} runs in {mode:?} mode", script.id());

        let builtins = session.builtins().clone();
        constants.inject(&builtins);
        (glue.populate_builtins)(&host, session.engine_mut(), &builtins);
        let this = Dynamic::from(host.clone());
        builtins.set(HOST_BINDING, this.clone());

        let mut driver = Self {
            session,
            script,
            mode,
            program: None,
            host,
            this,
            set_fields: glue.set_fields,
            callbacks: Default::default(),
        };
        driver.set_fields();
        if mode == ExecutionMode::Active {
            driver.execute_sketch()?;
        }
        driver.callbacks = Event::ALL.map(|event| driver.resolve(event.name()));
        Ok(driver)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn callback(&self, event: Event) -> &Callback {
        &self.callbacks[event as usize]
    }

    fn set_fields(&mut self) {
        (self.set_fields)(&self.host, self.session.builtins());
    }

    fn execute_sketch(&mut self) -> Result<(), SketchError> {
        if self.program.is_none() {
            self.program = Some(self.script.compile(self.session.engine())?);
        }
        let Some(program) = &self.program else {
            return Ok(());
        };
        self.session.execute(&self.script, program)
    }

    fn resolve(&self, name: &str) -> Callback {
        let callback = if self.program.as_ref().is_some_and(|program| defines(program, name)) {
            Callback::Function(name.to_string())
        } else {
            match self.session.namespace().global(name) {
                Some(value) => Callback::Value(value),
                None => Callback::Absent,
            }
        };
        log::trace!("{name} resolved to {callback:?}");
        callback
    }

    /// Calls the script's handler for `event`. Returns `false` when the
    /// sketch has none.
    fn invoke(&mut self, event: Event) -> Result<bool, SketchError> {
        let empty = AST::empty();
        let program = self.program.as_ref().unwrap_or(&empty);
        let result = match &self.callbacks[event as usize] {
            Callback::Absent => return Ok(false),
            Callback::Function(name) => {
                let options = CallFnOptions::new()
                    .eval_ast(false)
                    .rewind_scope(true)
                    .bind_this_ptr(&mut self.this);
                self.session.engine.call_fn_with_options::<Dynamic>(
                    options,
                    &mut self.session.namespace.globals,
                    program,
                    name,
                    (),
                )
            }
            Callback::Value(value) => match value.clone().try_cast::<FnPtr>() {
                Some(function) if defines(program, function.fn_name()) => {
                    let options = CallFnOptions::new()
                        .eval_ast(false)
                        .rewind_scope(true)
                        .bind_this_ptr(&mut self.this);
                    self.session.engine.call_fn_with_options::<Dynamic>(
                        options,
                        &mut self.session.namespace.globals,
                        program,
                        function.fn_name(),
                        function.curry().to_vec(),
                    )
                }
                // Native functions have no `this` to bind.
                Some(function) => function.call::<Dynamic>(&self.session.engine, program, ()),
                None => {
                    return Err(SketchError::NotCallable {
                        name: event.name().to_string(),
                    })
                }
            },
        };
        let flushed = self.session.flush();
        result.map_err(|err| SketchError::script(self.script.id(), self.script.text(), err))?;
        flushed?;
        Ok(true)
    }

    fn dispatch(&mut self, event: Event, fallback: fn(&mut H)) -> Result<(), SketchError> {
        if !self.invoke(event)? {
            log::trace!("{} falls back to the host", event.name());
            fallback(&mut self.host);
        }
        Ok(())
    }

    pub fn setup(&mut self) -> Result<(), SketchError> {
        self.set_fields();
        match self.mode {
            ExecutionMode::Static => self.execute_sketch(),
            ExecutionMode::Active => self
                .invoke(Event::Setup)
                .map(|_| ())
                .map_err(SketchError::unwrap_renderer_change),
        }
    }

    pub fn draw(&mut self) -> Result<(), SketchError> {
        self.set_fields();
        match self.mode {
            ExecutionMode::Static => self.execute_sketch(),
            ExecutionMode::Active => self.dispatch(Event::Draw, H::draw),
        }
    }

    pub fn size(
        &mut self,
        width: u32,
        height: u32,
        renderer: &str,
        path: Option<&str>,
    ) -> Result<(), SketchError> {
        self.host
            .size(width, height, renderer, path)
            .map_err(SketchError::RendererChange)?;
        self.set_fields();
        Ok(())
    }

    pub fn mouse_pressed(&mut self) -> Result<(), SketchError> {
        self.dispatch(Event::MousePressed, H::mouse_pressed)
    }

    pub fn mouse_clicked(&mut self) -> Result<(), SketchError> {
        self.dispatch(Event::MouseClicked, H::mouse_clicked)
    }

    pub fn mouse_released(&mut self) -> Result<(), SketchError> {
        self.dispatch(Event::MouseReleased, H::mouse_released)
    }

    pub fn mouse_dragged(&mut self) -> Result<(), SketchError> {
        self.dispatch(Event::MouseDragged, H::mouse_dragged)
    }

    pub fn key_pressed(&mut self) -> Result<(), SketchError> {
        self.dispatch(Event::KeyPressed, H::key_pressed)
    }

    pub fn key_released(&mut self) -> Result<(), SketchError> {
        self.dispatch(Event::KeyReleased, H::key_released)
    }

    pub fn key_typed(&mut self) -> Result<(), SketchError> {
        self.dispatch(Event::KeyTyped, H::key_typed)
    }
}

fn defines(program: &AST, name: &str) -> bool {
    program.iter_functions().any(|function| function.name == name)
}
