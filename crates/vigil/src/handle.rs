use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{pipe, Pid};

use crate::error::SupervisorError;
use crate::types::{ProcState, ProcessSpec, PENDING_EXIT};

/// Supervision handle bound to at most one spawned OS process generation.
///
/// The child runs `sh -c <command>` as the leader of its own process group,
/// with stderr merged into stdout through a pipe whose read end is kept here
/// in non-blocking mode. Output is pull-based: nothing is read until
/// [`ProcessHandle::pump`] is called, and a full pipe buffer blocks the
/// child's writes until someone pumps.
pub struct ProcessHandle {
	spec: ProcessSpec,
	child: Option<Child>,
	stream: Option<File>,
	pending: Vec<u8>,
	log: VecDeque<String>,
	scrollback: Option<usize>,
	paused: bool,
}

impl ProcessHandle {
	pub fn new(spec: ProcessSpec, scrollback: Option<usize>) -> Self {
		Self {
			spec,
			child: None,
			stream: None,
			pending: Vec::new(),
			log: VecDeque::new(),
			scrollback,
			paused: false,
		}
	}

	pub fn spec(&self) -> &ProcessSpec {
		&self.spec
	}

	pub fn pid(&self) -> Option<u32> {
		self.child.as_ref().map(|c| c.id())
	}

	pub fn paused(&self) -> bool {
		self.paused
	}

	/// Spawn the spec's command. A spec without a command is inert and this
	/// is a no-op. The log starts empty; no output is captured here.
	pub fn start(&mut self) -> Result<(), SupervisorError> {
		let Some(command) = self.spec.command.clone() else {
			return Ok(());
		};

		let (read_end, write_end) = pipe().map_err(io::Error::from)?;
		let write_twin = write_end.try_clone()?;

		// Only the read end goes non-blocking; the child's writes must
		// still block when the pipe fills.
		let flags = fcntl(read_end.as_raw_fd(), FcntlArg::F_GETFL).map_err(io::Error::from)?;
		let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
		fcntl(read_end.as_raw_fd(), FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;

		let mut cmd = Command::new("sh");
		cmd.args(["-c", &command])
			.stdin(Stdio::piped())
			.stdout(Stdio::from(write_end))
			.stderr(Stdio::from(write_twin))
			.process_group(0);

		if let Some(dir) = &self.spec.workdir {
			cmd.current_dir(dir);
		}
		for (key, val) in &self.spec.env {
			cmd.env(key, val);
		}

		let child = cmd.spawn().map_err(|e| SupervisorError::Spawn {
			name: self.spec.name.clone(),
			source: e,
		})?;

		tracing::info!("{}: spawned pid {}", self.spec.name, child.id());
		self.child = Some(child);
		self.stream = Some(File::from(read_end));
		Ok(())
	}

	/// SIGTERM the whole process group. Already-gone groups are a no-op;
	/// the exit itself is observed lazily on the next status poll.
	pub fn kill(&mut self) -> Result<(), SupervisorError> {
		self.signal_group(Signal::SIGTERM)
	}

	/// Group-wide SIGSTOP. The logical flag is set regardless of what the
	/// OS reports, because a stopped child still polls as alive.
	pub fn pause(&mut self) -> Result<(), SupervisorError> {
		self.paused = true;
		self.signal_group(Signal::SIGSTOP)
	}

	/// Group-wide SIGCONT, clearing the logical flag.
	pub fn resume(&mut self) -> Result<(), SupervisorError> {
		self.paused = false;
		self.signal_group(Signal::SIGCONT)
	}

	fn signal_group(&self, signal: Signal) -> Result<(), SupervisorError> {
		let Some(child) = self.child.as_ref() else {
			return Ok(());
		};
		let pgid = Pid::from_raw(child.id() as i32);
		match killpg(pgid, signal) {
			Ok(()) | Err(Errno::ESRCH) | Err(Errno::EPERM) => Ok(()),
			Err(errno) => Err(SupervisorError::Signal {
				name: self.spec.name.clone(),
				errno,
			}),
		}
	}

	/// Drain whatever bytes are currently buffered in the pipe, append the
	/// complete lines to the retained log, and return the whole log joined
	/// by newlines. Never blocks; with nothing available the log comes back
	/// unchanged.
	pub fn pump(&mut self) -> String {
		let mut eof = false;
		if let Some(stream) = self.stream.as_mut() {
			let mut buf = [0u8; 4096];
			loop {
				match stream.read(&mut buf) {
					Ok(0) => {
						eof = true;
						break;
					}
					Ok(n) => self.pending.extend_from_slice(&buf[..n]),
					Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
					Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
					Err(e) => {
						tracing::warn!("{}: output read failed: {}", self.spec.name, e);
						eof = true;
						break;
					}
				}
			}
		}

		while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
			let line: Vec<u8> = self.pending.drain(..=pos).collect();
			let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
			self.push_line(text);
		}

		if eof {
			if !self.pending.is_empty() {
				let text = String::from_utf8_lossy(&self.pending).into_owned();
				self.push_line(text);
				self.pending.clear();
			}
			self.stream = None;
		}

		let lines: Vec<&str> = self.log.iter().map(String::as_str).collect();
		lines.join("\n")
	}

	fn push_line(&mut self, line: String) {
		if let Some(cap) = self.scrollback {
			while self.log.len() >= cap.max(1) {
				self.log.pop_front();
			}
		}
		self.log.push_back(line);
	}

	/// Whether the process counts as running. The paused flag overrides the
	/// OS poll: a stopped-but-unreaped child reports alive either way.
	pub fn running(&mut self) -> bool {
		if self.paused {
			return true;
		}
		match self.child.as_mut() {
			Some(child) => matches!(child.try_wait(), Ok(None)),
			None => false,
		}
	}

	/// Exit code of the finished process, `-signo` for signal deaths, or
	/// [`PENDING_EXIT`] while there is nothing to report.
	pub fn returncode(&mut self) -> i32 {
		match self.child.as_mut() {
			None => PENDING_EXIT,
			Some(child) => match child.try_wait() {
				Ok(Some(status)) => normalize_exit(status),
				_ => PENDING_EXIT,
			},
		}
	}

	pub fn state(&mut self) -> ProcState {
		let Some(child) = self.child.as_mut() else {
			return ProcState::NotStarted;
		};
		if self.paused {
			return ProcState::Paused;
		}
		match child.try_wait() {
			Ok(None) => ProcState::Running,
			Ok(Some(status)) => ProcState::Exited(normalize_exit(status)),
			Err(_) => ProcState::Exited(PENDING_EXIT),
		}
	}
}

impl Drop for ProcessHandle {
	fn drop(&mut self) {
		let _ = self.kill();
		if let Some(child) = self.child.as_mut() {
			let _ = child.try_wait();
		}
	}
}

fn normalize_exit(status: ExitStatus) -> i32 {
	status
		.code()
		.or_else(|| status.signal().map(|s| -s))
		.unwrap_or(PENDING_EXIT)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn inert_spec_never_spawns() {
		let mut handle = ProcessHandle::new(ProcessSpec::inert("idle"), None);
		handle.start().unwrap();
		assert!(handle.pid().is_none());
		assert!(!handle.running());
		assert_eq!(handle.returncode(), PENDING_EXIT);
		assert_eq!(handle.state(), ProcState::NotStarted);
		assert_eq!(handle.pump(), "");
	}

	#[test]
	fn kill_before_start_is_noop() {
		let mut handle = ProcessHandle::new(ProcessSpec::inert("idle"), None);
		assert!(handle.kill().is_ok());
		assert!(handle.pause().is_ok());
		assert!(handle.resume().is_ok());
	}

	#[test]
	fn scrollback_caps_retained_lines() {
		let mut handle = ProcessHandle::new(ProcessSpec::inert("capped"), Some(2));
		handle.push_line("one".into());
		handle.push_line("two".into());
		handle.push_line("three".into());
		assert_eq!(handle.pump(), "two\nthree");
	}
}
