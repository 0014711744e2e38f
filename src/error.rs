#[derive(Debug, thiserror::Error)]
pub enum ZedisError {
    #[error("corrupt encoding: {0}")]
    CorruptEncoding(String),

    #[error("index out of range")]
    IndexOutOfRange,
}

pub type ZedisResult<T> = Result<T, ZedisError>;
