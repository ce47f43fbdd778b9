use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DB: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Config: {0}")]
    Config(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF: {0}")]
    Pdf(String),

    #[error("LLM [{status}]: {detail}")]
    Llm { status: u16, detail: String },

    #[error("Validation: {0}")]
    Validation(String),
}

