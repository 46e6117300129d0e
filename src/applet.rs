use crate::{
    config::SketchConfig,
    driver::{Host, HostGlue},
    error::{raise_renderer_change, RendererChange},
    namespace::Builtins,
};
use nalgebra::{Point2, Vector2, Vector3};
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Map, INT};
use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};

pub const MOUSE_LEFT: INT = 37;
pub const MOUSE_RIGHT: INT = 39;
pub const MOUSE_CENTER: INT = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Point(Point2<f32>),
    Line(Point2<f32>, Point2<f32>),
    /// Top-left corner and size.
    Rect(Point2<f32>, Vector2<f32>),
    /// Center and diameters.
    Ellipse(Point2<f32>, Vector2<f32>),
}

/// A shape with the style it was drawn in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mark {
    pub shape: Shape,
    pub fill: Option<Vector3<f32>>,
    pub stroke: Option<Vector3<f32>>,
}

pub struct AppletState {
    pub width: u32,
    pub height: u32,
    pub renderer: String,
    pub frame_count: INT,
    pub mouse: Point2<f32>,
    pub pmouse: Point2<f32>,
    pub mouse_pressed: bool,
    pub mouse_button: INT,
    pub key: char,
    pub key_code: INT,
    pub key_pressed: bool,
    pub fill: Option<Vector3<f32>>,
    pub stroke: Option<Vector3<f32>>,
    pub background: Vector3<f32>,
    pub marks: Vec<Mark>,
    dragged: bool,
    properties: Map,
}

impl AppletState {
    fn mark(&mut self, shape: Shape) {
        let mark = Mark {
            shape,
            fill: self.fill,
            stroke: self.stroke,
        };
        self.marks.push(mark);
    }
}

/// The sketch canvas and input state, shared between the render loop and the
/// script builtins.
#[derive(Clone)]
pub struct Applet(Rc<RefCell<AppletState>>);

impl Applet {
    pub fn new(config: &SketchConfig) -> Self {
        Self(Rc::new(RefCell::new(AppletState {
            width: config.width,
            height: config.height,
            renderer: config.renderer.clone(),
            frame_count: 0,
            mouse: Point2::origin(),
            pmouse: Point2::origin(),
            mouse_pressed: false,
            mouse_button: 0,
            key: '\0',
            key_code: 0,
            key_pressed: false,
            fill: Some(Vector3::new(1.0, 1.0, 1.0)),
            stroke: Some(Vector3::zeros()),
            background: config.background,
            marks: Vec::new(),
            dragged: false,
            properties: Map::new(),
        })))
    }

    pub fn glue() -> HostGlue<Applet> {
        HostGlue::new(Applet::populate_builtins, Applet::set_fields)
    }

    pub fn state(&self) -> Ref<'_, AppletState> {
        self.0.borrow()
    }

    pub fn renderer(&self) -> String {
        self.0.borrow().renderer.clone()
    }

    /// Applies a new geometry. Asking for another renderer is reported back
    /// so the host can restart `setup` under it.
    pub fn resize(&self, width: u32, height: u32, renderer: &str) -> Result<(), RendererChange> {
        let mut state = self.0.borrow_mut();
        state.width = width;
        state.height = height;
        if state.renderer == renderer {
            return Ok(());
        }
        state.renderer = renderer.to_string();
        Err(RendererChange {
            renderer: renderer.to_string(),
            width,
            height,
        })
    }

    pub fn next_frame(&self) {
        self.0.borrow_mut().frame_count += 1;
    }

    /// Returns whether the move is a drag.
    pub fn move_mouse(&self, x: f32, y: f32) -> bool {
        let mut state = self.0.borrow_mut();
        state.pmouse = state.mouse;
        state.mouse = Point2::new(x, y);
        if state.mouse_pressed {
            state.dragged = true;
        }
        state.mouse_pressed
    }

    pub fn press_mouse(&self, button: INT) {
        let mut state = self.0.borrow_mut();
        state.mouse_pressed = true;
        state.mouse_button = button;
        state.dragged = false;
    }

    /// Returns whether the press and release form a click.
    pub fn release_mouse(&self) -> bool {
        let mut state = self.0.borrow_mut();
        state.mouse_pressed = false;
        !state.dragged
    }

    pub fn press_key(&self, key: char, key_code: INT) {
        let mut state = self.0.borrow_mut();
        state.key_pressed = true;
        state.key = key;
        state.key_code = key_code;
    }

    pub fn release_key(&self) {
        self.0.borrow_mut().key_pressed = false;
    }

    pub fn type_key(&self, key: char) {
        self.0.borrow_mut().key = key;
    }

    pub fn set_fields(&self, builtins: &Builtins) {
        let state = self.0.borrow();
        builtins.set("width", Dynamic::from(state.width as INT));
        builtins.set("height", Dynamic::from(state.height as INT));
        builtins.set("frameCount", Dynamic::from(state.frame_count));
        builtins.set("mouseX", Dynamic::from(state.mouse.x as INT));
        builtins.set("mouseY", Dynamic::from(state.mouse.y as INT));
        builtins.set("pmouseX", Dynamic::from(state.pmouse.x as INT));
        builtins.set("pmouseY", Dynamic::from(state.pmouse.y as INT));
        builtins.set("mousePressed", Dynamic::from(state.mouse_pressed));
        builtins.set("mouseButton", Dynamic::from(state.mouse_button));
        builtins.set("key", Dynamic::from(state.key));
        builtins.set("keyCode", Dynamic::from(state.key_code));
        builtins.set("keyPressed", Dynamic::from(state.key_pressed));
    }

    /// Resizes on behalf of a script and refreshes the fields it reads.
    fn resize_from_script(
        &self,
        builtins: &Builtins,
        width: &Dynamic,
        height: &Dynamic,
        renderer: &str,
    ) -> Result<(), Box<EvalAltResult>> {
        self.resize(dimension(width)?, dimension(height)?, renderer)
            .map_err(raise_renderer_change)?;
        self.set_fields(builtins);
        Ok(())
    }

    pub fn populate_builtins(&self, engine: &mut Engine, builtins: &Builtins) {
        engine
            .register_type_with_name::<Applet>("Sketch")
            .register_get("width", |applet: &mut Applet| applet.state().width as INT)
            .register_get("height", |applet: &mut Applet| applet.state().height as INT)
            .register_get("frameCount", |applet: &mut Applet| applet.state().frame_count)
            .register_get("renderer", |applet: &mut Applet| applet.renderer())
            .register_indexer_get(Applet::property)
            .register_indexer_set(Applet::set_property);

        let (applet, fields) = (self.clone(), builtins.clone());
        engine.register_fn("size", move |width: Dynamic, height: Dynamic| {
            let renderer = applet.renderer();
            applet.resize_from_script(&fields, &width, &height, &renderer)
        });
        let (applet, fields) = (self.clone(), builtins.clone());
        engine.register_fn(
            "size",
            move |width: Dynamic, height: Dynamic, renderer: ImmutableString| {
                applet.resize_from_script(&fields, &width, &height, &renderer)
            },
        );

        let applet = self.clone();
        engine.register_fn("background", move |gray: Dynamic| {
            applet.clear(color(&gray, &gray, &gray)?);
            Ok::<_, Box<EvalAltResult>>(())
        });
        let applet = self.clone();
        engine.register_fn("background", move |r: Dynamic, g: Dynamic, b: Dynamic| {
            applet.clear(color(&r, &g, &b)?);
            Ok::<_, Box<EvalAltResult>>(())
        });

        let applet = self.clone();
        engine.register_fn("fill", move |gray: Dynamic| {
            applet.0.borrow_mut().fill = Some(color(&gray, &gray, &gray)?);
            Ok::<_, Box<EvalAltResult>>(())
        });
        let applet = self.clone();
        engine.register_fn("fill", move |r: Dynamic, g: Dynamic, b: Dynamic| {
            applet.0.borrow_mut().fill = Some(color(&r, &g, &b)?);
            Ok::<_, Box<EvalAltResult>>(())
        });
        let applet = self.clone();
        engine.register_fn("noFill", move || applet.0.borrow_mut().fill = None);

        let applet = self.clone();
        engine.register_fn("stroke", move |gray: Dynamic| {
            applet.0.borrow_mut().stroke = Some(color(&gray, &gray, &gray)?);
            Ok::<_, Box<EvalAltResult>>(())
        });
        let applet = self.clone();
        engine.register_fn("stroke", move |r: Dynamic, g: Dynamic, b: Dynamic| {
            applet.0.borrow_mut().stroke = Some(color(&r, &g, &b)?);
            Ok::<_, Box<EvalAltResult>>(())
        });
        let applet = self.clone();
        engine.register_fn("noStroke", move || applet.0.borrow_mut().stroke = None);

        let applet = self.clone();
        engine.register_fn("point", move |x: Dynamic, y: Dynamic| {
            let at = Point2::new(number(&x)?, number(&y)?);
            applet.0.borrow_mut().mark(Shape::Point(at));
            Ok::<_, Box<EvalAltResult>>(())
        });
        let applet = self.clone();
        engine.register_fn(
            "line",
            move |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic| {
                let from = Point2::new(number(&x1)?, number(&y1)?);
                let to = Point2::new(number(&x2)?, number(&y2)?);
                applet.0.borrow_mut().mark(Shape::Line(from, to));
                Ok::<_, Box<EvalAltResult>>(())
            },
        );
        let applet = self.clone();
        engine.register_fn(
            "rect",
            move |x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| {
                let corner = Point2::new(number(&x)?, number(&y)?);
                let size = Vector2::new(number(&w)?, number(&h)?);
                applet.0.borrow_mut().mark(Shape::Rect(corner, size));
                Ok::<_, Box<EvalAltResult>>(())
            },
        );
        let applet = self.clone();
        engine.register_fn(
            "ellipse",
            move |x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| {
                let center = Point2::new(number(&x)?, number(&y)?);
                let size = Vector2::new(number(&w)?, number(&h)?);
                applet.0.borrow_mut().mark(Shape::Ellipse(center, size));
                Ok::<_, Box<EvalAltResult>>(())
            },
        );
    }

    fn clear(&self, background: Vector3<f32>) {
        let mut state = self.0.borrow_mut();
        state.background = background;
        state.marks.clear();
    }

    fn property(&mut self, name: ImmutableString) -> Result<Dynamic, Box<EvalAltResult>> {
        self.0
            .borrow()
            .properties
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| format!("sketch has no property '{name}'").into())
    }

    fn set_property(&mut self, name: ImmutableString, value: Dynamic) {
        self.0.borrow_mut().properties.insert(name.as_str().into(), value);
    }
}

impl Host for Applet {
    fn size(
        &mut self,
        width: u32,
        height: u32,
        renderer: &str,
        _path: Option<&str>,
    ) -> Result<(), RendererChange> {
        self.resize(width, height, renderer)
    }
}

fn number(value: &Dynamic) -> Result<f32, Box<EvalAltResult>> {
    if let Ok(value) = value.as_float() {
        Ok(value as f32)
    } else if let Ok(value) = value.as_int() {
        Ok(value as f32)
    } else {
        Err(format!("expected a number, got {}", value.type_name()).into())
    }
}

fn dimension(value: &Dynamic) -> Result<u32, Box<EvalAltResult>> {
    Ok(number(value)?.max(1.0) as u32)
}

fn color(r: &Dynamic, g: &Dynamic, b: &Dynamic) -> Result<Vector3<f32>, Box<EvalAltResult>> {
    let channel = |value| number(value).map(|value| value.clamp(0.0, 255.0) / 255.0);
    Ok(Vector3::new(channel(r)?, channel(g)?, channel(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::ConstantTable,
        driver::SketchDriver,
        error::SketchError,
        script::{Script, Session},
    };
    use std::io;

    fn driver(text: &str) -> (Applet, SketchDriver<Applet>) {
        let applet = Applet::new(&SketchConfig::default());
        let driver = SketchDriver::new(
            Session::with_sink(io::sink()),
            Script::new("test.rhai", text),
            applet.clone(),
            Applet::glue(),
            &ConstantTable::processing(),
        )
        .unwrap();
        (applet, driver)
    }

    #[test]
    fn static_sketch_draws_marks() {
        let (applet, mut driver) =
            driver("background(0);\nfill(255, 0, 0);\nnoStroke();\nrect(10, 20.5, 30, 40);\n");
        driver.setup().unwrap();
        let state = applet.state();
        assert_eq!(state.background, Vector3::zeros());
        assert_eq!(
            state.marks,
            vec![Mark {
                shape: Shape::Rect(Point2::new(10.0, 20.5), Vector2::new(30.0, 40.0)),
                fill: Some(Vector3::new(1.0, 0.0, 0.0)),
                stroke: None,
            }]
        );
    }

    #[test]
    fn background_clears_the_canvas() {
        let (applet, mut driver) = driver(
            "fn setup() { point(1, 1); point(2, 2); }\nfn draw() { background(255); line(0, 0, width, height); }\n",
        );
        driver.setup().unwrap();
        assert_eq!(applet.state().marks.len(), 2);
        driver.draw().unwrap();
        let state = applet.state();
        assert_eq!(state.marks.len(), 1);
        assert_eq!(
            state.marks[0].shape,
            Shape::Line(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0))
        );
    }

    #[test]
    fn fields_follow_input() {
        let (applet, mut driver) = driver("fn draw() { point(mouseX, mouseY); }\n");
        applet.move_mouse(12.0, 34.0);
        driver.draw().unwrap();
        assert_eq!(applet.state().marks[0].shape, Shape::Point(Point2::new(12.0, 34.0)));
        let builtins = driver.session().builtins();
        assert_eq!(builtins.get("pmouseX").and_then(|v| v.as_int().ok()), Some(0));
        assert_eq!(builtins.get("mousePressed").and_then(|v| v.as_bool().ok()), Some(false));
    }

    #[test]
    fn clicks_are_presses_without_drags() {
        let applet = Applet::new(&SketchConfig::default());
        applet.press_mouse(MOUSE_LEFT);
        assert!(applet.release_mouse());
        applet.press_mouse(MOUSE_LEFT);
        assert!(applet.move_mouse(5.0, 5.0));
        assert!(!applet.release_mouse());
        assert!(!applet.move_mouse(6.0, 6.0));
    }

    #[test]
    fn size_in_setup_resizes() {
        let (applet, mut driver) = driver("fn setup() { size(320, 240); }\n");
        driver.setup().unwrap();
        assert_eq!((applet.state().width, applet.state().height), (320, 240));
        assert_eq!(applet.renderer(), "java2d");
    }

    #[test]
    fn size_refreshes_fields_for_the_rest_of_setup() {
        let (applet, mut driver) =
            driver("fn setup() { size(320, 240); this[\"w\"] = width; this[\"h\"] = height; }\n");
        driver.setup().unwrap();
        let state = applet.state();
        let read = |name: &str| state.properties.get(name).and_then(|v| v.as_int().ok());
        assert_eq!((read("w"), read("h")), (Some(320), Some(240)));
    }

    #[test]
    fn static_size_is_visible_on_the_next_line() {
        let (_, mut driver) = driver("size(64, 48);\nlet area = width * height;\n");
        driver.setup().unwrap();
        assert_eq!(driver.session().get("area").and_then(|v| v.as_int().ok()), Some(3072));
    }

    #[test]
    fn renderer_change_escapes_setup() {
        let (applet, mut driver) = driver("fn setup() { size(640, 480, P3D); }\n");
        let err = driver.setup().unwrap_err();
        assert!(matches!(
            err,
            SketchError::RendererChange(RendererChange { ref renderer, width: 640, height: 480 })
                if renderer == "p3d"
        ));
        assert_eq!(applet.renderer(), "p3d");
        driver.setup().unwrap();
    }

    #[test]
    fn callbacks_see_the_host_as_this() {
        let (applet, mut driver) = driver(
            "fn setup() { this[\"count\"] = 1; }\nfn draw() { this[\"count\"] += this.width; }\n",
        );
        driver.setup().unwrap();
        driver.draw().unwrap();
        let count = applet.0.borrow().properties.get("count").and_then(|v| v.as_int().ok());
        assert_eq!(count, Some(101));
    }

    #[test]
    fn function_pointer_handlers_see_the_host_as_this() {
        let (applet, mut driver) = driver(
            "fn setup() {}\nfn bump(step) { this[\"hits\"] = step; }\nlet mousePressed = Fn(\"bump\").curry(7);\n",
        );
        driver.mouse_pressed().unwrap();
        let hits = applet.0.borrow().properties.get("hits").and_then(|v| v.as_int().ok());
        assert_eq!(hits, Some(7));
    }

    #[test]
    fn host_binding_is_a_builtin() {
        let (_, mut driver) = driver("let w = sketch.width;\n");
        driver.setup().unwrap();
        assert_eq!(driver.session().get("w").and_then(|v| v.as_int().ok()), Some(100));
    }

    #[test]
    fn colors_reject_non_numbers() {
        let (_, mut driver) = driver("fill(\"red\");\n");
        assert!(matches!(driver.setup(), Err(SketchError::Script { .. })));
    }
}
