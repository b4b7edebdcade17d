//! Real system implementation using `std::env`, `std::fs` and `std::process`

use super::{OutputStream, ProcessExit, ProcessSpec, System};
use std::env::VarError;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::debug;

const PIPE_BUFFER_SIZE: usize = 8 * 1024;

/// Production implementation of System trait
///
/// This implementation directly delegates to the standard library's
/// environment, filesystem and process functions.
#[derive(Debug, Clone, Copy)]
pub struct RealSystem;

impl RealSystem {
    /// Create a new `RealSystem` instance
    #[must_use]
    pub const fn new() -> Self {
        return Self;
    }
}

impl Default for RealSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for RealSystem {
    fn env_var(&self, key: &str) -> Result<String, VarError> {
        std::env::var(key)
    }

    fn env_vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send + '_>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Box::new(file))
    }

    fn run_process(
        &self,
        spec: &ProcessSpec,
        on_output: &mut dyn FnMut(OutputStream, &[u8]),
    ) -> io::Result<ProcessExit> {
        debug!("Spawning: {}", spec.command_line());

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .env_clear()
            .envs(spec.environment.resolved())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not captured"))?;
        let stdin = child.stdin.take();

        let (sender, receiver) = mpsc::channel::<(OutputStream, Vec<u8>)>();

        thread::scope(|scope| {
            if let Some(mut pipe) = stdin
                && let Some(input) = spec.stdin.as_ref()
            {
                scope.spawn(move || {
                    if let Err(e) = pipe.write_all(input) {
                        debug!("Failed to write child stdin: {e}");
                    }
                    // Dropping the pipe closes stdin
                });
            }

            let stdout_sender = sender.clone();
            scope.spawn(move || forward_pipe(stdout, OutputStream::Stdout, &stdout_sender));
            scope.spawn(move || forward_pipe(stderr, OutputStream::Stderr, &sender));

            // Ends once both reader threads have dropped their senders
            for (stream, chunk) in receiver {
                on_output(stream, &chunk);
            }
        });

        let status = child.wait()?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }
}

/// Read a pipe until EOF, sending every chunk to the consuming thread
fn forward_pipe<R: Read>(mut pipe: R, stream: OutputStream, sender: &Sender<(OutputStream, Vec<u8>)>) {
    let mut buffer = [0_u8; PIPE_BUFFER_SIZE];
    loop {
        match pipe.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => {
                if sender.send((stream, buffer[..read].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                debug!("Stopped reading {stream:?}: {e}");
                break;
            }
        }
    }
}
