use std::io;

/// Errors surfaced by supervisor operations.
#[derive(Debug)]
pub enum SupervisorError {
	/// No process registered (or configured) under this name.
	NotFound(String),
	/// Spawning the command failed.
	Spawn { name: String, source: io::Error },
	/// Delivering a signal failed for a reason other than the process
	/// already being gone.
	Signal { name: String, errno: nix::errno::Errno },
	/// IO error outside of spawn (pipes, config files).
	Io(io::Error),
}

impl std::fmt::Display for SupervisorError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SupervisorError::NotFound(name) => write!(f, "{}: not found", name),
			SupervisorError::Spawn { name, source } => {
				write!(f, "{}: spawn failed: {}", name, source)
			}
			SupervisorError::Signal { name, errno } => {
				write!(f, "{}: signal failed: {}", name, errno)
			}
			SupervisorError::Io(e) => write!(f, "io error: {}", e),
		}
	}
}

impl std::error::Error for SupervisorError {}

impl From<io::Error> for SupervisorError {
	fn from(e: io::Error) -> Self {
		SupervisorError::Io(e)
	}
}
