//! Mock system implementation for testing

#![expect(clippy::module_name_repetitions)]

use tracing::error;

use super::{OutputStream, ProcessExit, ProcessSpec, System};
use std::collections::{HashMap, HashSet, VecDeque};
use std::env::VarError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Scripted outcome of one mocked child process
#[derive(Debug, Clone, Default)]
pub struct MockProcess {
    output: Vec<(OutputStream, Vec<u8>)>,
    exit_code: Option<i32>,
    spawn_error: Option<String>,
    creates: Vec<(PathBuf, Vec<u8>)>,
}

impl MockProcess {
    /// A process that exits with code 0 and prints nothing
    #[must_use]
    #[inline]
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// A process that exits with the given code
    #[must_use]
    #[inline]
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// A process that cannot be spawned at all
    #[must_use]
    #[inline]
    pub fn spawn_failure(message: &str) -> Self {
        Self {
            spawn_error: Some(message.to_owned()),
            ..Self::default()
        }
    }

    /// Emit a chunk on stdout
    #[must_use]
    #[inline]
    pub fn stdout(mut self, chunk: &str) -> Self {
        self.output
            .push((OutputStream::Stdout, chunk.as_bytes().to_vec()));
        self
    }

    /// Emit a chunk on stderr
    #[must_use]
    #[inline]
    pub fn stderr(mut self, chunk: &str) -> Self {
        self.output
            .push((OutputStream::Stderr, chunk.as_bytes().to_vec()));
        self
    }

    /// Create a file in the mock filesystem while running, like a clone would
    #[must_use]
    #[inline]
    pub fn creating<P: AsRef<Path>>(mut self, path: P, contents: &[u8]) -> Self {
        self.creates
            .push((path.as_ref().to_path_buf(), contents.to_vec()));
        self
    }
}

/// In-memory implementation of System trait for testing
///
/// `MockSystem` provides an in-memory filesystem and environment plus
/// scripted child processes, for fast, isolated unit tests without side
/// effects. Every process invocation is recorded.
///
/// # Example
/// ```
/// use gitprovision::system::{mock::{MockProcess, MockSystem}, System};
/// use std::path::Path;
///
/// let system = MockSystem::new()
///     .with_env("HOME", "/home/user").unwrap()
///     .with_file("/test/file.txt", b"Hello, world!").unwrap()
///     .with_process("git", MockProcess::exit(128)).unwrap();
///
/// assert_eq!(system.env_var("HOME").unwrap(), "/home/user");
/// assert!(system.exists(Path::new("/test/file.txt")));
/// ```
#[derive(Clone)]
pub struct MockSystem {
    state: Arc<RwLock<MockSystemState>>,
}

struct MockSystemState {
    env_vars: HashMap<String, String>,
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    failing_paths: HashSet<PathBuf>,
    processes: HashMap<String, VecDeque<MockProcess>>,
    invocations: Vec<ProcessSpec>,
    open_writers: usize,
}

impl MockSystem {
    /// Create a new `MockSystem` with default state
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockSystemState {
                env_vars: HashMap::new(),
                files: HashMap::new(),
                dirs: HashSet::from([PathBuf::from("/")]),
                failing_paths: HashSet::new(),
                processes: HashMap::new(),
                invocations: Vec::new(),
                open_writers: 0,
            })),
        }
    }

    fn write_state(&self) -> io::Result<std::sync::RwLockWriteGuard<'_, MockSystemState>> {
        self.state
            .write()
            .map_err(|e| io::Error::other(e.to_string()))
    }

    fn read_state(&self) -> io::Result<std::sync::RwLockReadGuard<'_, MockSystemState>> {
        self.state
            .read()
            .map_err(|e| io::Error::other(e.to_string()))
    }

    /// Set an environment variable (builder pattern)
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned
    #[inline]
    pub fn with_env(self, key: &str, value: &str) -> io::Result<Self> {
        let mut state = self.write_state()?;
        state.env_vars.insert(key.to_owned(), value.to_owned());
        drop(state);
        Ok(self)
    }

    /// Add a file with contents (builder pattern)
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned
    #[inline]
    pub fn with_file<P: AsRef<Path>>(self, path: P, contents: &[u8]) -> io::Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let mut state = self.write_state()?;

        // Ensure parent directories exist
        if let Some(parent) = path_buf.parent() {
            Self::ensure_parent_dirs(&mut state.dirs, parent);
        }

        state.files.insert(path_buf, contents.to_vec());
        drop(state);
        Ok(self)
    }

    /// Add a directory (builder pattern)
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned
    #[inline]
    pub fn with_dir<P: AsRef<Path>>(self, path: P) -> io::Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let mut state = self.write_state()?;
        Self::ensure_parent_dirs(&mut state.dirs, &path_buf);
        drop(state);
        Ok(self)
    }

    /// Make every mutating filesystem call at or below `path` fail
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned
    #[inline]
    pub fn with_failing_path<P: AsRef<Path>>(self, path: P) -> io::Result<Self> {
        let mut state = self.write_state()?;
        state.failing_paths.insert(path.as_ref().to_path_buf());
        drop(state);
        Ok(self)
    }

    /// Queue the outcome of the next run of `program` (builder pattern)
    ///
    /// Programs without a queued outcome succeed silently.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned
    #[inline]
    pub fn with_process(self, program: &str, process: MockProcess) -> io::Result<Self> {
        self.queue_process(program, process)?;
        Ok(self)
    }

    /// Queue the outcome of the next run of `program`
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned
    #[inline]
    pub fn queue_process(&self, program: &str, process: MockProcess) -> io::Result<()> {
        let mut state = self.write_state()?;
        state
            .processes
            .entry(program.to_owned())
            .or_default()
            .push_back(process);
        Ok(())
    }

    /// Every process spec run so far, in order
    #[must_use]
    #[inline]
    pub fn invocations(&self) -> Vec<ProcessSpec> {
        self.read_state()
            .map(|state| state.invocations.clone())
            .unwrap_or_default()
    }

    /// Programs run so far, in order
    #[must_use]
    #[inline]
    pub fn invoked_programs(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|spec| spec.program)
            .collect()
    }

    /// Number of append writers that have not been dropped yet
    #[must_use]
    #[inline]
    pub fn open_writers(&self) -> usize {
        self.read_state().map_or(0, |state| state.open_writers)
    }

    /// File contents as a lossy string, or empty when missing
    #[must_use]
    #[inline]
    pub fn file_contents<P: AsRef<Path>>(&self, path: P) -> String {
        self.read_state()
            .ok()
            .and_then(|state| {
                state
                    .files
                    .get(path.as_ref())
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            })
            .unwrap_or_default()
    }

    #[inline]
    fn ensure_parent_dirs(dirs: &mut HashSet<PathBuf>, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor == Path::new("") {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    fn check_writable(state: &MockSystemState, path: &Path) -> io::Result<()> {
        if state
            .failing_paths
            .iter()
            .any(|failing| path.starts_with(failing))
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("Permission denied: {}", path.display()),
            ));
        }
        Ok(())
    }

    fn append_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.write_state()?;
        Self::check_writable(&state, path)?;

        if let Some(parent) = path.parent()
            && !state.dirs.contains(parent)
        {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Parent directory does not exist: {}", parent.display()),
            ));
        }

        state
            .files
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(bytes);
        drop(state);
        Ok(())
    }
}

impl Default for MockSystem {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl System for MockSystem {
    #[inline]
    #[expect(clippy::map_err_ignore, reason = "This is for VarError")]
    fn env_var(&self, key: &str) -> Result<String, VarError> {
        let state = self.state.read().map_err(|_| VarError::NotPresent)?;
        state.env_vars.get(key).cloned().ok_or(VarError::NotPresent)
    }

    #[inline]
    fn env_vars(&self) -> Vec<(String, String)> {
        self.read_state()
            .map(|state| {
                state
                    .env_vars
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[inline]
    fn exists(&self, path: &Path) -> bool {
        self.read_state()
            .is_ok_and(|state| state.files.contains_key(path) || state.dirs.contains(path))
    }

    #[inline]
    fn is_dir(&self, path: &Path) -> bool {
        self.read_state()
            .is_ok_and(|state| state.dirs.contains(path))
    }

    #[inline]
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let state = self.read_state()?;
        let bytes = state.files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )
        })?;
        let result = bytes.clone();
        drop(state);
        String::from_utf8(result)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {e}")))
    }

    #[inline]
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.write_state()?;
        Self::check_writable(&state, path)?;

        if let Some(parent) = path.parent()
            && !state.dirs.contains(parent)
        {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Parent directory does not exist: {}", parent.display()),
            ));
        }

        state.files.insert(path.to_path_buf(), contents.to_vec());
        drop(state);
        Ok(())
    }

    #[inline]
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.write_state()?;
        Self::check_writable(&state, path)?;
        Self::ensure_parent_dirs(&mut state.dirs, path);
        drop(state);
        Ok(())
    }

    #[inline]
    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.write_state()?;
        Self::check_writable(&state, path)?;

        if !state.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Directory not found: {}", path.display()),
            ));
        }

        // Remove the directory and everything under it
        state.files.retain(|p, _| !p.starts_with(path));
        state.dirs.retain(|p| !p.starts_with(path));
        drop(state);
        Ok(())
    }

    #[inline]
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.read_state()?;

        if !state.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Directory not found: {}", path.display()),
            ));
        }

        let mut entries: Vec<PathBuf> = state
            .files
            .keys()
            .chain(state.dirs.iter())
            .filter(|entry| entry.parent() == Some(path) && entry.as_path() != path)
            .cloned()
            .collect();
        drop(state);

        entries.sort();
        Ok(entries)
    }

    #[inline]
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send + '_>> {
        // Opening creates the file, like O_CREAT would
        self.append_bytes(path, &[])?;
        let mut state = self.write_state()?;
        state.open_writers += 1;
        drop(state);

        Ok(Box::new(MockAppendWriter {
            path: path.to_path_buf(),
            system: self.clone(),
        }))
    }

    #[inline]
    fn run_process(
        &self,
        spec: &ProcessSpec,
        on_output: &mut dyn FnMut(OutputStream, &[u8]),
    ) -> io::Result<ProcessExit> {
        let scripted = {
            let mut state = self.write_state()?;
            state.invocations.push(spec.clone());
            state
                .processes
                .get_mut(&spec.program)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(MockProcess::success)
        };

        if let Some(message) = scripted.spawn_error {
            return Err(io::Error::new(io::ErrorKind::NotFound, message));
        }

        for (path, contents) in &scripted.creates {
            let mut state = self.write_state()?;
            if let Some(parent) = path.parent() {
                Self::ensure_parent_dirs(&mut state.dirs, parent);
            }
            state.files.insert(path.clone(), contents.clone());
        }

        // The lock is not held while calling back, the callback may append
        for (stream, chunk) in &scripted.output {
            on_output(*stream, chunk);
        }

        Ok(ProcessExit {
            code: scripted.exit_code,
        })
    }
}

/// Append writer for `MockSystem`; every write lands in the in-memory file
struct MockAppendWriter {
    path: PathBuf,
    system: MockSystem,
}

#[expect(
    clippy::missing_trait_methods,
    reason = "Only implementing what I need"
)]
impl Write for MockAppendWriter {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.system.append_bytes(&self.path, buf)?;
        Ok(buf.len())
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockAppendWriter {
    #[inline]
    fn drop(&mut self) {
        match self.system.write_state() {
            Ok(mut state) => state.open_writers = state.open_writers.saturating_sub(1),
            Err(e) => error!("Failed to release mock writer: {e}"),
        }
    }
}
