use rhai::{EvalAltResult, ParseError, Position};
use std::io;
use thiserror::Error;

/// Raised by a host when a sketch asks for a renderer other than the current
/// one. The host restarts `setup` with the new renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererChange {
    pub renderer: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum SketchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid sketch config: {0}")]
    Config(#[from] ron::error::SpannedError),
    #[error("{source_id}: {error}{context}")]
    Compile {
        source_id: String,
        context: String,
        error: ParseError,
    },
    #[error("{source_id}: {error}{context}")]
    Script {
        source_id: String,
        context: String,
        error: Box<EvalAltResult>,
    },
    #[error("renderer changed to {} ({}x{})", .0.renderer, .0.width, .0.height)]
    RendererChange(RendererChange),
    #[error("`{name}` is bound to a value that is not a function")]
    NotCallable { name: String },
}

impl SketchError {
    pub(crate) fn compile(source_id: &str, text: &str, error: ParseError) -> Self {
        Self::Compile {
            source_id: source_id.to_string(),
            context: excerpt(text, error.position()),
            error,
        }
    }

    pub(crate) fn script(source_id: &str, text: &str, error: Box<EvalAltResult>) -> Self {
        Self::Script {
            source_id: source_id.to_string(),
            context: excerpt(text, error.position()),
            error,
        }
    }

    /// Peels a renderer change out of a script error so it reaches the host
    /// as its own signal rather than as a script failure.
    pub(crate) fn unwrap_renderer_change(self) -> Self {
        match &self {
            Self::Script { error, .. } => match renderer_change(error) {
                Some(change) => Self::RendererChange(change),
                None => self,
            },
            _ => self,
        }
    }
}

/// Builds the error a script builtin returns to signal a renderer change.
pub fn raise_renderer_change(change: RendererChange) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(rhai::Dynamic::from(change), Position::NONE).into()
}

fn renderer_change(error: &EvalAltResult) -> Option<RendererChange> {
    match error {
        EvalAltResult::ErrorRuntime(value, _) => value.clone().try_cast::<RendererChange>(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => renderer_change(inner),
        _ => None,
    }
}

fn excerpt(text: &str, position: Position) -> String {
    position
        .line()
        .and_then(|line| Some((line, text.lines().nth(line.checked_sub(1)?)?)))
        .map(|(line, source)| format!("\n{line:>5} | {source}"))
        .unwrap_or_default()
}
