pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid argument: {message}")]
	InvalidArgument { message: String },
	#[error("Search timed out: {message}")]
	Timeout { message: String },
	#[error("Backend error: {message}")]
	Backend { message: String },
	#[error("Invalid backend response: {message}")]
	InvalidResponse { message: String },
}
impl From<aiera_client::Error> for Error {
	fn from(err: aiera_client::Error) -> Self {
		match err {
			aiera_client::Error::Timeout { endpoint } =>
				Self::Timeout { message: format!("request to {endpoint} timed out") },
			aiera_client::Error::InvalidResponse { message } => Self::InvalidResponse { message },
			other => Self::Backend { message: other.to_string() },
		}
	}
}
