pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Aiera API request to {endpoint} timed out.")]
	Timeout { endpoint: String },
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
	#[error("Aiera API returned {status} for {endpoint}: {body}")]
	Status { endpoint: String, status: u16, body: String },
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	pub fn is_timeout(&self) -> bool {
		match self {
			Self::Timeout { .. } => true,
			Self::Transport(err) => err.is_timeout(),
			_ => false,
		}
	}
}
