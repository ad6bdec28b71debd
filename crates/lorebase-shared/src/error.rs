use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid visibility: {0}")]
    Visibility(String),

    #[error("Invalid message role: {0}")]
    Role(String),

    #[error("Invalid provider tier: {0}")]
    ProviderTier(String),

    #[error("Invalid tenancy mode: {0}")]
    Tenancy(String),

    #[error("Invalid user id: {0}")]
    UserId(String),
}
