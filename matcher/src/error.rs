use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    /// The collector was disposed; using it again is a programming error.
    #[error("illegal state: problem collector used after dispose")]
    Disposed,
    #[error("problem matcher '{matcher}': invalid regex: {source}")]
    InvalidRegex {
        matcher: String,
        #[source]
        source: regex::Error,
    },
    #[error("problem matcher '{matcher}' has no patterns")]
    NoPatterns { matcher: String },
}

#[derive(Debug, Error)]
#[error("unknown character encoding '{0}'")]
pub struct UnknownEncoding(pub String);
