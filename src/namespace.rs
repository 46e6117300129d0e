use rhai::{Dynamic, Scope};
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

/// Names visible to every script execution after the script's own variables:
/// framework constants, host fields and the host binding.
///
/// Cloning yields another handle to the same map; the engine's variable
/// resolver holds one so builtins also resolve inside script functions.
#[derive(Clone, Default)]
pub struct Builtins(Rc<RefCell<HashMap<String, Dynamic>>>);

impl Builtins {
    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Dynamic> {
        self.0.borrow().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Binds `name`, replacing any previous value.
    pub fn set(&self, name: impl Into<String>, value: Dynamic) {
        self.0.borrow_mut().insert(name.into(), value);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.0.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

/// The script's global variables plus the builtins behind them.
pub struct Namespace {
    pub(crate) globals: Scope<'static>,
    builtins: Builtins,
}

impl Namespace {
    pub fn new(builtins: Builtins) -> Self {
        Self {
            globals: Scope::new(),
            builtins,
        }
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Looks `name` up the way a script would: globals first, then builtins.
    pub fn get(&self, name: &str) -> Option<Dynamic> {
        self.global(name).or_else(|| self.builtins.get(name))
    }

    pub fn global(&self, name: &str) -> Option<Dynamic> {
        self.globals.get(name).cloned()
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    /// Binds a global, replacing any previous binding of the same name.
    pub fn set(&mut self, name: &str, value: Dynamic) {
        if self.globals.is_constant(name) == Some(true) {
            let mark = self.globals.len();
            self.globals.push_dynamic(name, value);
            self.settle(mark);
        } else {
            self.globals.set_or_push(name, value);
        }
    }

    /// Folds the variables pushed since `mark` into the globals: a name bound
    /// again replaces its earlier binding instead of shadowing it, so a script
    /// run every frame keeps one binding per name.
    pub(crate) fn settle(&mut self, mark: usize) {
        if self.globals.len() <= mark {
            return;
        }
        let mut seen = HashSet::new();
        let mut latest: Vec<(String, bool, Dynamic)> = self
            .globals
            .iter()
            .skip(mark)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .filter(|(name, _, _)| seen.insert(name.to_string()))
            .map(|(name, constant, value)| (name.to_string(), constant, value))
            .collect();
        latest.reverse();

        let mut settled = Scope::new();
        for (name, constant, value) in self.globals.iter().take(mark) {
            if !seen.contains(name) {
                push(&mut settled, name.to_string(), constant, value);
            }
        }
        for (name, constant, value) in latest {
            push(&mut settled, name, constant, value);
        }
        self.globals = settled;
    }
}

fn push(scope: &mut Scope<'static>, name: String, constant: bool, value: Dynamic) {
    if constant {
        scope.push_constant_dynamic(name, value);
    } else {
        scope.push_dynamic(name, value);
    }
}
