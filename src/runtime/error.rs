use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("unknown type tag `{tag}`")]
    UnknownTag { tag: u8 },
    #[error("{tag} value has no payload")]
    MissingPayload { tag: &'static str },
}
