use crate::namespace::Builtins;
use rhai::{Array, Dynamic, FLOAT, INT};
use ron::Value;
use std::{borrow::Cow, collections::HashMap, f64::consts};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstantError {
    #[error("{0} values have no script representation")]
    Unsupported(&'static str),
    #[error("element {index}: {error}")]
    Element {
        index: usize,
        error: Box<ConstantError>,
    },
}

#[derive(Clone, Debug)]
pub enum ConstantValue {
    Int(INT),
    Float(FLOAT),
    Char(char),
    Str(Cow<'static, str>),
    Ron(Value),
}

impl ConstantValue {
    /// Produces the script value for this constant.
    pub fn read(&self) -> Result<Dynamic, ConstantError> {
        match self {
            Self::Int(value) => Ok(Dynamic::from(*value)),
            Self::Float(value) => Ok(Dynamic::from(*value)),
            Self::Char(value) => Ok(Dynamic::from(*value)),
            Self::Str(value) => Ok(Dynamic::from(value.to_string())),
            Self::Ron(value) => read_ron(value),
        }
    }
}

fn read_ron(value: &Value) -> Result<Dynamic, ConstantError> {
    match value {
        Value::Bool(value) => Ok(Dynamic::from(*value)),
        Value::Char(value) => Ok(Dynamic::from(*value)),
        Value::String(value) => Ok(Dynamic::from(value.clone())),
        Value::Number(ron::Number::Integer(value)) => Ok(Dynamic::from(*value as INT)),
        Value::Number(ron::Number::Float(value)) => Ok(Dynamic::from(value.get() as FLOAT)),
        Value::Seq(values) => values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                read_ron(value).map_err(|error| ConstantError::Element {
                    index,
                    error: Box::new(error),
                })
            })
            .collect::<Result<Array, _>>()
            .map(Dynamic::from_array),
        Value::Map(_) => Err(ConstantError::Unsupported("map")),
        Value::Option(_) => Err(ConstantError::Unsupported("option")),
        Value::Unit => Err(ConstantError::Unsupported("unit")),
    }
}

/// The host's registry of named constants.
#[derive(Clone, Debug, Default)]
pub struct ConstantTable {
    entries: Vec<(Cow<'static, str>, ConstantValue)>,
}

impl ConstantTable {
    /// Constants every sketch sees, named after Processing's.
    pub fn processing() -> Self {
        use ConstantValue::{Char, Float, Int, Str};

        let builtin = [
            ("PI", Float(consts::PI)),
            ("HALF_PI", Float(consts::FRAC_PI_2)),
            ("THIRD_PI", Float(consts::FRAC_PI_3)),
            ("QUARTER_PI", Float(consts::FRAC_PI_4)),
            ("TWO_PI", Float(consts::TAU)),
            ("TAU", Float(consts::TAU)),
            ("DEG_TO_RAD", Float(consts::PI / 180.0)),
            ("RAD_TO_DEG", Float(180.0 / consts::PI)),
            ("JAVA2D", Str(Cow::Borrowed("java2d"))),
            ("P2D", Str(Cow::Borrowed("p2d"))),
            ("P3D", Str(Cow::Borrowed("p3d"))),
            ("RGB", Int(1)),
            ("ARGB", Int(2)),
            ("HSB", Int(3)),
            ("ALPHA", Int(4)),
            ("CORNER", Int(0)),
            ("CORNERS", Int(1)),
            ("RADIUS", Int(2)),
            ("CENTER", Int(3)),
            ("DIAMETER", Int(3)),
            ("BASELINE", Int(0)),
            ("TOP", Int(101)),
            ("BOTTOM", Int(102)),
            ("OPEN", Int(1)),
            ("CLOSE", Int(2)),
            ("POINTS", Int(3)),
            ("LINES", Int(5)),
            ("TRIANGLES", Int(9)),
            ("TRIANGLE_FAN", Int(11)),
            ("TRIANGLE_STRIP", Int(10)),
            ("QUADS", Int(17)),
            ("QUAD_STRIP", Int(18)),
            ("SQUARE", Int(1)),
            ("ROUND", Int(2)),
            ("PROJECT", Int(4)),
            ("MITER", Int(8)),
            ("BEVEL", Int(32)),
            ("LEFT", Int(37)),
            ("UP", Int(38)),
            ("RIGHT", Int(39)),
            ("DOWN", Int(40)),
            ("SHIFT", Int(16)),
            ("CONTROL", Int(17)),
            ("ALT", Int(18)),
            ("BACKSPACE", Char('\u{8}')),
            ("TAB", Char('\t')),
            ("ENTER", Char('\n')),
            ("RETURN", Char('\r')),
            ("ESC", Char('\u{1b}')),
            ("DELETE", Char('\u{7f}')),
            ("CODED", Char('\u{ffff}')),
            ("ARROW", Int(0)),
            ("CROSS", Int(1)),
            ("TEXT", Int(2)),
            ("WAIT", Int(3)),
            ("HAND", Int(12)),
            ("MOVE", Int(13)),
        ];
        Self {
            entries: builtin
                .into_iter()
                .map(|(name, value)| (Cow::Borrowed(name), value))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<Cow<'static, str>>, value: ConstantValue) {
        self.entries.push((name.into(), value));
    }

    /// Adds the constants a sketch config declares. Later entries win.
    pub fn extend_from_ron(&mut self, constants: &HashMap<String, Value>) {
        let mut names: Vec<_> = constants.keys().collect();
        names.sort();
        for name in names {
            self.insert(name.clone(), ConstantValue::Ron(constants[name].clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binds every readable constant into `builtins`. An unreadable entry is
    /// logged and skipped. Returns how many were bound.
    pub fn inject(&self, builtins: &Builtins) -> usize {
        let mut bound = 0;
        for (name, value) in &self.entries {
            match value.read() {
                Ok(value) => {
                    builtins.set(name.as_ref(), value);
                    bound += 1;
                }
                Err(err) => log::warn!("Skipping constant {name}: {err}"),
            }
        }
        bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ron_map(source: &str) -> HashMap<String, Value> {
        ron::from_str(source).unwrap()
    }

    #[test]
    fn processing_constants_are_bound() {
        let builtins = Builtins::default();
        let table = ConstantTable::processing();
        assert_eq!(table.inject(&builtins), table.len());
        assert_eq!(builtins.get("LEFT").and_then(|v| v.as_int().ok()), Some(37));
        assert_eq!(builtins.get("CODED").and_then(|v| v.as_char().ok()), Some('\u{ffff}'));
        assert_eq!(
            builtins.get("P3D").and_then(|v| v.into_string().ok()).as_deref(),
            Some("p3d")
        );
        let two_pi = builtins.get("TWO_PI").and_then(|v| v.as_float().ok()).unwrap();
        assert!((two_pi - 2.0 * consts::PI).abs() < 1e-12);
    }

    #[test]
    fn injecting_twice_is_idempotent() {
        let builtins = Builtins::default();
        let table = ConstantTable::processing();
        table.inject(&builtins);
        let first: Vec<_> = builtins
            .names()
            .into_iter()
            .map(|name| (name.clone(), builtins.get(&name).unwrap().to_string()))
            .collect();
        table.inject(&builtins);
        let second: Vec<_> = builtins
            .names()
            .into_iter()
            .map(|name| (name.clone(), builtins.get(&name).unwrap().to_string()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unreadable_constants_are_skipped() {
        let mut table = ConstantTable::default();
        table.extend_from_ron(&ron_map(
            r#"{ "GRID": 16, "SCALE": 1.5, "NAMES": ["a", "b"], "NOTHING": (), "NESTED": [1, {}] }"#,
        ));
        let builtins = Builtins::default();
        assert_eq!(table.inject(&builtins), 3);
        assert_eq!(builtins.get("GRID").and_then(|v| v.as_int().ok()), Some(16));
        assert_eq!(builtins.get("SCALE").and_then(|v| v.as_float().ok()), Some(1.5));
        assert!(builtins.get("NAMES").is_some_and(|v| v.is_array()));
        assert!(!builtins.contains("NOTHING"));
        assert!(!builtins.contains("NESTED"));
    }

    #[test]
    fn element_errors_name_their_index() {
        let value = ConstantValue::Ron(ron::from_str("[1, 2, ()]").unwrap());
        assert_eq!(
            value.read().unwrap_err(),
            ConstantError::Element {
                index: 2,
                error: Box::new(ConstantError::Unsupported("unit")),
            }
        );
    }
}
