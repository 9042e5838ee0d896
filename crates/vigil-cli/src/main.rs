mod daemon;
mod protocol;

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::Command;

use owo_colors::OwoColorize;

use protocol::{Request, Response};
use vigil::{ProcSummary, StatusSnapshot, PENDING_EXIT};

fn main() {
	let args: Vec<String> = std::env::args().skip(1).collect();

	if args.is_empty() {
		print_usage();
		if connect_daemon().is_some() {
			eprintln!();
			cmd_list();
		}
		return;
	}

	match args[0].as_str() {
		"help" | "--help" | "-h" => print_usage(),
		"version" | "--version" | "-V" => println!("vigil {}", env!("CARGO_PKG_VERSION")),
		"daemon" => cmd_daemon(&args[1..]),
		"list" | "ls" => cmd_list(),
		"status" | "st" => cmd_status(&args[1..]),
		"start" => cmd_named(&args[1..], "start <name>", |name| Request::Start { name }),
		"kill" => cmd_named(&args[1..], "kill <name>", |name| Request::Kill { name }),
		"restart" => cmd_named(&args[1..], "restart <name>", |name| Request::Restart { name }),
		"pause" => cmd_named(&args[1..], "pause <name>", |name| Request::Pause { name }),
		"resume" => cmd_named(&args[1..], "resume <name>", |name| Request::Resume { name }),
		"out" | "logs" => cmd_out(&args[1..]),
		"reload" => cmd_reload(),
		name => {
			eprintln!("unknown command: {}", name);
			eprintln!("run 'vigil help' for usage");
			std::process::exit(1);
		}
	}
}

fn print_usage() {
	eprintln!(
		"{} {} — declarative process supervisor",
		"vigil".bold(),
		env!("CARGO_PKG_VERSION")
	);
	eprintln!();
	eprintln!("usage: {} [command] [name]", "vigil".bold());
	eprintln!();

	eprintln!("{}", "processes".cyan().bold());
	eprintln!("  {}                    Show every registered process", "list".bold());
	eprintln!("  {} <name>            Start from the last loaded spec", "start".bold());
	eprintln!("  {} <name>             Terminate the whole process group", "kill".bold());
	eprintln!("  {} <name>          Kill, then reapply the last spec", "restart".bold());
	eprintln!("  {} <name>            Group-wide SIGSTOP", "pause".bold());
	eprintln!("  {} <name>           Group-wide SIGCONT", "resume".bold());
	eprintln!("  {} <name>              Captured output so far", "out".bold());
	eprintln!();

	eprintln!("{}", "health".cyan().bold());
	eprintln!("  {} [--watch]        Aggregate status percentages", "status".bold());
	eprintln!("  {}                  Re-read config, restart changed specs", "reload".bold());
	eprintln!();

	eprintln!("{}", "system".cyan().bold());
	eprintln!("  {} [start|stop|status|run]   Manage the daemon", "daemon".bold());
	eprintln!();
	eprintln!("config: one TOML file per process in {}", protocol::config_dir().display());
}

// --- Daemon communication ---

fn connect_daemon() -> Option<UnixStream> {
	UnixStream::connect(protocol::socket_path()).ok()
}

fn ensure_daemon() -> UnixStream {
	if let Some(stream) = connect_daemon() {
		return stream;
	}

	eprintln!("starting daemon...");
	let daemon_bin = find_daemon_binary();

	let mut cmd = Command::new(&daemon_bin);
	cmd.args(["daemon", "run"])
		.stdout(std::process::Stdio::null())
		.stderr(std::process::Stdio::null());

	if let Err(e) = cmd.spawn() {
		eprintln!("error: failed to start daemon: {}", e);
		eprintln!("binary: {}", daemon_bin.display());
		std::process::exit(1);
	}

	for _ in 0..50 {
		std::thread::sleep(std::time::Duration::from_millis(100));
		if let Some(stream) = connect_daemon() {
			return stream;
		}
	}

	eprintln!("error: daemon did not start in time");
	std::process::exit(1);
}

fn find_daemon_binary() -> PathBuf {
	std::env::current_exe().unwrap_or_else(|_| PathBuf::from("vigil"))
}

fn send_request(request: &Request) -> Response {
	let mut stream = ensure_daemon();
	let mut data = serde_json::to_vec(request).expect("request serializes");
	data.push(b'\n');
	if stream.write_all(&data).is_err() {
		eprintln!("error: daemon connection lost");
		std::process::exit(1);
	}

	let mut reader = BufReader::new(&stream);
	let mut line = String::new();
	if reader.read_line(&mut line).is_err() {
		eprintln!("error: daemon connection lost");
		std::process::exit(1);
	}

	serde_json::from_str(&line).unwrap_or(Response::Error {
		message: "failed to parse daemon response".to_string(),
	})
}

// --- Commands ---

fn cmd_named(args: &[String], usage: &str, build: impl Fn(String) -> Request) {
	let Some(name) = args.first() else {
		eprintln!("usage: vigil {}", usage);
		std::process::exit(1);
	};
	match send_request(&build(name.clone())) {
		Response::Ok { message } => {
			if let Some(msg) = message {
				eprintln!("{}", msg);
			}
		}
		Response::Error { message } => {
			eprintln!("error: {}", message);
			std::process::exit(1);
		}
		_ => {}
	}
}

fn cmd_list() {
	match send_request(&Request::List) {
		Response::List { procs } => render_rows(&procs),
		Response::Error { message } => {
			eprintln!("error: {}", message);
			std::process::exit(1);
		}
		_ => {}
	}
}

fn render_rows(rows: &[ProcSummary]) {
	if rows.is_empty() {
		eprintln!("no processes");
		return;
	}
	let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
	for row in rows {
		let (circle, label) = if row.paused {
			("●".yellow().to_string(), "paused".yellow().to_string())
		} else if row.running {
			("●".green().to_string(), "running".green().to_string())
		} else if row.returncode == 0 {
			("○".dimmed().to_string(), "done".dimmed().to_string())
		} else if row.returncode == PENDING_EXIT {
			("○".dimmed().to_string(), "not started".dimmed().to_string())
		} else {
			(
				"●".red().to_string(),
				format!("exit {}", row.returncode).red().to_string(),
			)
		};
		println!(" {} {:<width$} {}", circle, row.name, label, width = width);
	}
}

fn cmd_status(args: &[String]) {
	if args.iter().any(|a| a == "--watch" || a == "-w") {
		watch_status();
		return;
	}
	match send_request(&Request::Status) {
		Response::Status { snapshot } => render_snapshot(&snapshot),
		Response::Error { message } => {
			eprintln!("error: {}", message);
			std::process::exit(1);
		}
		_ => {}
	}
}

fn watch_status() {
	let mut stream = ensure_daemon();
	let mut data = serde_json::to_vec(&Request::Watch).expect("request serializes");
	data.push(b'\n');
	if stream.write_all(&data).is_err() {
		eprintln!("error: daemon connection lost");
		std::process::exit(1);
	}

	let reader = BufReader::new(stream);
	for line in reader.lines() {
		let Ok(line) = line else { break };
		match serde_json::from_str(&line) {
			Ok(Response::Status { snapshot }) => render_snapshot(&snapshot),
			Ok(Response::Error { message }) => {
				eprintln!("error: {}", message);
				std::process::exit(1);
			}
			_ => {}
		}
	}
}

fn render_snapshot(s: &StatusSnapshot) {
	println!(
		" {} {:>3}%   {} {:>3}%   {} {:>3}%   {} {:>3}%",
		"running".green(),
		s.running,
		"paused".yellow(),
		s.paused,
		"killed".red(),
		s.killed,
		"done".dimmed(),
		s.done,
	);
}

fn cmd_out(args: &[String]) {
	let Some(name) = args.first() else {
		eprintln!("usage: vigil out <name>");
		std::process::exit(1);
	};
	match send_request(&Request::Out { name: name.clone() }) {
		Response::Out { text } => {
			if !text.is_empty() {
				println!("{}", text);
			}
		}
		Response::Error { message } => {
			eprintln!("error: {}", message);
			std::process::exit(1);
		}
		_ => {}
	}
}

fn cmd_reload() {
	match send_request(&Request::Reload) {
		Response::Ok { message } => {
			if let Some(msg) = message {
				eprintln!("{}", msg);
			}
		}
		Response::Error { message } => {
			eprintln!("error: {}", message);
			std::process::exit(1);
		}
		_ => {}
	}
}

fn cmd_daemon(args: &[String]) {
	let subcmd = args.first().map(|s| s.as_str()).unwrap_or("status");

	match subcmd {
		"run" => {
			// Foreground daemon; this is the actual supervisor process.
			let daemon_args: Vec<String> = args[1..].to_vec();
			tokio::runtime::Runtime::new()
				.expect("tokio runtime")
				.block_on(daemon::run(&daemon_args));
		}
		"start" => {
			if connect_daemon().is_some() {
				eprintln!("daemon already running");
				return;
			}
			let daemon_bin = find_daemon_binary();
			let mut spawn_args = vec!["daemon".to_string(), "run".to_string()];
			spawn_args.extend(args[1..].iter().cloned());
			let mut cmd = Command::new(&daemon_bin);
			cmd.args(&spawn_args)
				.stdout(std::process::Stdio::null())
				.stderr(std::process::Stdio::null());
			match cmd.spawn() {
				Ok(_) => eprintln!("daemon started"),
				Err(e) => {
					eprintln!("error: {}", e);
					std::process::exit(1);
				}
			}
		}
		"stop" => {
			if connect_daemon().is_none() {
				eprintln!("daemon not running");
				return;
			}
			match send_request(&Request::Shutdown) {
				Response::Ok { message } => {
					eprintln!("daemon: {}", message.unwrap_or_default());
				}
				_ => eprintln!("daemon not running"),
			}
		}
		"status" => {
			if connect_daemon().is_some() {
				let pid = std::fs::read_to_string(protocol::pid_path()).unwrap_or_default();
				eprintln!("daemon running (pid {})", pid.trim());
			} else {
				eprintln!("daemon not running");
			}
		}
		_ => {
			eprintln!("usage: vigil daemon [start|stop|status|run]");
		}
	}
}
