use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("worker script has no measurable RAM cost: {0}")]
    UnknownScriptRam(&'static str),

    #[error("home host {0:?} not found in the world")]
    MissingHome(String),
}
