//! Backing media for the history log.

use alloc::string::String;
use core::fmt;

/// A single line-oriented text resource. Every `line` and `contents`
/// handed to a store already carries its `\n` terminators.
pub trait HistoryStore {
    type Error: fmt::Display;

    /// Whole contents, or `None` if nothing has been created yet.
    fn read_all(&mut self) -> Result<Option<String>, Self::Error>;

    fn append(&mut self, line: &str) -> Result<(), Self::Error>;

    /// Overwrite everything with `contents`.
    fn replace(&mut self, contents: &str) -> Result<(), Self::Error>;
}

/// RAM-backed store, for hosts without a writable medium and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    contents: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: &str) -> Self {
        Self {
            contents: Some(String::from(contents)),
        }
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl HistoryStore for MemoryStore {
    type Error = core::convert::Infallible;

    fn read_all(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(self.contents.clone())
    }

    fn append(&mut self, line: &str) -> Result<(), Self::Error> {
        self.contents.get_or_insert_with(String::new).push_str(line);
        Ok(())
    }

    fn replace(&mut self, contents: &str) -> Result<(), Self::Error> {
        self.contents = Some(String::from(contents));
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use file::{FileStore, DEFAULT_LOG_PATHS};

#[cfg(feature = "std")]
mod file {
    use std::fs::{self, OpenOptions};
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};

    use log::{debug, info, warn};

    use super::HistoryStore;

    /// SD card first, then the root of the board's own filesystem.
    pub const DEFAULT_LOG_PATHS: [&str; 2] = ["/sd/posture_log.csv", "/posture_log.csv"];

    #[derive(Debug, Clone)]
    pub struct FileStore {
        path: PathBuf,
    }

    impl FileStore {
        /// Use `path` if its directory exists and the file opens for append.
        pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
            let path = path.into();
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            if !fs::metadata(parent)?.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "parent is not a directory",
                ));
            }

            OpenOptions::new().create(true).append(true).open(&path)?;
            Ok(Self { path })
        }

        /// First writable candidate, or `None` when logging has to be disabled.
        pub fn discover<I, P>(candidates: I) -> Option<Self>
        where
            I: IntoIterator<Item = P>,
            P: Into<PathBuf>,
        {
            for candidate in candidates {
                let candidate = candidate.into();
                match Self::open(&candidate) {
                    Ok(store) => {
                        info!("Log path: {}", store.path.display());
                        return Some(store);
                    }
                    Err(e) => debug!("{} not writable: {}", candidate.display(), e),
                }
            }

            warn!("No writable location for the posture log, history disabled");
            None
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl HistoryStore for FileStore {
        type Error = io::Error;

        fn read_all(&mut self) -> io::Result<Option<String>> {
            match fs::read_to_string(&self.path) {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        }

        fn append(&mut self, line: &str) -> io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(line.as_bytes())
        }

        fn replace(&mut self, contents: &str) -> io::Result<()> {
            fs::write(&self.path, contents)
        }
    }
}
