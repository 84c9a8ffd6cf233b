pub type ShowreelResult<T> = Result<T, ShowreelError>;

#[derive(thiserror::Error, Debug)]
pub enum ShowreelError {
    #[error("playlist error: {0}")]
    Playlist(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("display error: {0}")]
    Display(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShowreelError {
    pub fn playlist(msg: impl Into<String>) -> Self {
        Self::Playlist(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    pub fn display(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }
}
