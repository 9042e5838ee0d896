use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use vigil::{Supervisor, SupervisorConfig, SupervisorError};

use crate::protocol::{self, Request, Response};

const SAMPLE_PERIOD: Duration = Duration::from_secs(3);

pub async fn run(args: &[String]) {
	tracing_subscriber::fmt().init();

	let scrollback = parse_scrollback(args);

	let supervisor = Supervisor::new(SupervisorConfig {
		config_dir: protocol::config_dir(),
		legacy_config: Some(protocol::legacy_config_path()),
		scrollback,
		sample_period: SAMPLE_PERIOD,
	});

	let started = supervisor.reload().await;
	tracing::info!("loaded {} process(es) from {}", started.len(), protocol::config_dir().display());

	let _sampler = supervisor.spawn_sampler();

	let state_dir = protocol::state_dir();
	let _ = std::fs::create_dir_all(&state_dir);
	let _ = std::fs::write(protocol::pid_path(), std::process::id().to_string());

	let socket_path = protocol::socket_path();
	if socket_path.exists() {
		let _ = std::fs::remove_file(&socket_path);
	}

	let sup_socket = Arc::clone(&supervisor);
	let socket_handle = tokio::spawn(async move {
		run_socket_server(sup_socket).await;
	});

	tracing::info!("daemon started (pid {})", std::process::id());

	tokio::select! {
		_ = socket_handle => {},
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutting down");
		}
	}

	supervisor.kill_all().await;
	let _ = std::fs::remove_file(protocol::socket_path());
	let _ = std::fs::remove_file(protocol::pid_path());
}

fn parse_scrollback(args: &[String]) -> Option<usize> {
	let mut iter = args.iter();
	while let Some(arg) = iter.next() {
		if arg == "--scrollback" {
			if let Some(n) = iter.next().and_then(|v| v.parse().ok()) {
				return Some(n);
			}
		}
	}
	None
}

async fn run_socket_server(supervisor: Arc<Supervisor>) {
	let socket_path = protocol::socket_path();

	let listener = match UnixListener::bind(&socket_path) {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind socket {}: {}", socket_path.display(), e);
			return;
		}
	};

	tracing::info!("listening on {}", socket_path.display());

	loop {
		let (stream, _) = match listener.accept().await {
			Ok(s) => s,
			Err(e) => {
				tracing::error!("accept error: {}", e);
				continue;
			}
		};

		let sup = Arc::clone(&supervisor);
		tokio::spawn(async move {
			handle_connection(stream, sup).await;
		});
	}
}

async fn handle_connection(stream: UnixStream, supervisor: Arc<Supervisor>) {
	let (reader, mut writer) = stream.into_split();
	let mut lines = BufReader::new(reader).lines();

	while let Ok(Some(line)) = lines.next_line().await {
		let request: Request = match serde_json::from_str(&line) {
			Ok(r) => r,
			Err(e) => {
				tracing::warn!("invalid request: {}", e);
				let response = Response::Error {
					message: format!("invalid request: {}", e),
				};
				if write_response(&mut writer, &response).await.is_err() {
					break;
				}
				continue;
			}
		};

		// Watch turns the connection into a push stream: one Status line
		// per sampler tick until the client hangs up.
		if matches!(request, Request::Watch) {
			let mut rx = supervisor.subscribe();
			loop {
				if rx.changed().await.is_err() {
					return;
				}
				let snapshot = *rx.borrow_and_update();
				let response = Response::Status { snapshot };
				if write_response(&mut writer, &response).await.is_err() {
					return;
				}
			}
		}

		let response = handle_request(&supervisor, request).await;
		if write_response(&mut writer, &response).await.is_err() {
			break;
		}
	}
}

async fn write_response(
	writer: &mut tokio::net::unix::OwnedWriteHalf,
	response: &Response,
) -> std::io::Result<()> {
	let mut data = match serde_json::to_vec(response) {
		Ok(d) => d,
		Err(e) => {
			tracing::error!("failed to serialize response: {}", e);
			return Ok(());
		}
	};
	data.push(b'\n');
	writer.write_all(&data).await
}

async fn handle_request(supervisor: &Arc<Supervisor>, request: Request) -> Response {
	match request {
		Request::Ping => Response::Pong,
		Request::List => Response::List {
			procs: supervisor.list().await,
		},
		Request::Status => Response::Status {
			snapshot: supervisor.status(),
		},
		Request::Watch => Response::Error {
			message: "watch is handled at the connection level".to_string(),
		},
		Request::Out { name } => match supervisor.output(&name).await {
			Ok(text) => Response::Out { text },
			Err(e) => Response::Error { message: e.to_string() },
		},
		Request::Start { name } => {
			ok_or_error(supervisor.start(&name).await, format!("{}: started", name))
		}
		Request::Kill { name } => {
			ok_or_error(supervisor.kill(&name).await, format!("{}: killed", name))
		}
		Request::Restart { name } => ok_or_error(
			supervisor.restart(&name).await,
			format!("{}: restarting", name),
		),
		Request::Pause { name } => {
			ok_or_error(supervisor.pause(&name).await, format!("{}: paused", name))
		}
		Request::Resume { name } => {
			ok_or_error(supervisor.resume(&name).await, format!("{}: resumed", name))
		}
		Request::Reload => {
			let started = supervisor.reload().await;
			let message = if started.is_empty() {
				"no changes".to_string()
			} else {
				format!("reloaded: {}", started.join(", "))
			};
			Response::Ok {
				message: Some(message),
			}
		}
		Request::Shutdown => {
			let sup = Arc::clone(supervisor);
			tokio::spawn(async move {
				tokio::time::sleep(Duration::from_millis(100)).await;
				sup.kill_all().await;
				let _ = std::fs::remove_file(protocol::socket_path());
				let _ = std::fs::remove_file(protocol::pid_path());
				std::process::exit(0);
			});
			Response::Ok {
				message: Some("shutting down".to_string()),
			}
		}
	}
}

fn ok_or_error(result: Result<(), SupervisorError>, message: String) -> Response {
	match result {
		Ok(()) => Response::Ok {
			message: Some(message),
		},
		Err(e) => Response::Error {
			message: e.to_string(),
		},
	}
}
