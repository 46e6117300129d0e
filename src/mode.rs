use regex::Regex;
use std::sync::LazyLock;

static ACTIVE_FN_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*fn\s+(setup|draw)\s*\(\s*\)\s*\{").expect("valid active-mode pattern")
});

/// How a sketch script is driven by the host loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Flat script, re-run in full on every `setup` and `draw`.
    Static,
    /// Defines `setup` and/or `draw`; run once, then dispatched per callback.
    Active,
}

impl ExecutionMode {
    /// Classifies a script by looking for a zero-argument `setup` or `draw`
    /// definition anywhere in the text. This is a textual match, so a
    /// commented-out or quoted definition also counts.
    pub fn detect(text: &str) -> Self {
        if ACTIVE_FN_DEF.is_match(text) {
            Self::Active
        } else {
            Self::Static
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionMode::{self, Active, Static};

    #[test]
    fn definitions_make_a_script_active() {
        assert_eq!(ExecutionMode::detect("fn setup() {\n}\n"), Active);
        assert_eq!(ExecutionMode::detect("let a = 1;\nfn draw(){ a }\n"), Active);
        assert_eq!(ExecutionMode::detect("fn  draw ( )  {}"), Active);
        assert_eq!(ExecutionMode::detect("    fn setup() {}"), Active);
    }

    #[test]
    fn flat_scripts_are_static() {
        assert_eq!(ExecutionMode::detect("let x = 1;\nx = x + 1;\n"), Static);
        assert_eq!(ExecutionMode::detect("fn setup(size) {}"), Static);
        assert_eq!(ExecutionMode::detect("fn setupx() {}"), Static);
        assert_eq!(ExecutionMode::detect("fn mousePressed() {}"), Static);
        assert_eq!(ExecutionMode::detect("let f = draw();"), Static);
        assert_eq!(ExecutionMode::detect("// fn setup() {}\nlet x = 1;"), Static);
        assert_eq!(ExecutionMode::detect(""), Static);
    }

    #[test]
    fn block_commented_and_quoted_definitions_still_count() {
        assert_eq!(ExecutionMode::detect("/*\nfn setup() {}\n*/\nlet x = 1;"), Active);
        assert_eq!(ExecutionMode::detect("let s = `\nfn draw() {\n`;"), Active);
    }
}
