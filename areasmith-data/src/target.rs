//! Where text output (area dumps, problem reports) goes.

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Failure to open a text target.
#[derive(Debug, Error)]
#[error("failed to open output file {path}")]
pub struct TargetError {
    /// File that could not be created.
    pub path: Utf8PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// A requested text output.
///
/// `-` selects standard output, anything else is a file path.
///
/// # Examples
/// ```
/// use areasmith_data::TargetSpec;
///
/// assert_eq!("-".parse::<TargetSpec>(), Ok(TargetSpec::Stdout));
/// assert!(matches!("problems.txt".parse(), Ok(TargetSpec::File(_))));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetSpec {
    /// No output requested.
    #[default]
    Disabled,
    /// Standard output.
    Stdout,
    /// A file, created or truncated when opened.
    File(Utf8PathBuf),
}

impl TargetSpec {
    /// Whether output was requested.
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Open the target. Returns `None` when disabled.
    pub fn open(&self) -> Result<Option<OutputTarget>, TargetError> {
        match self {
            Self::Disabled => Ok(None),
            Self::Stdout => Ok(Some(OutputTarget::stdout())),
            Self::File(path) => OutputTarget::file(path).map(Some),
        }
    }
}

impl FromStr for TargetSpec {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "-" => Self::Stdout,
            path => Self::File(Utf8PathBuf::from(path)),
        })
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Stdout => f.write_str("stdout"),
            Self::File(path) => write!(f, "{path}"),
        }
    }
}

/// An opened, buffered text target.
pub struct OutputTarget {
    label: String,
    writer: Box<dyn Write>,
}

impl OutputTarget {
    /// Buffered standard output.
    pub fn stdout() -> Self {
        Self {
            label: String::from("stdout"),
            writer: Box::new(BufWriter::new(io::stdout())),
        }
    }

    /// Create or truncate `path`, creating parent directories.
    pub fn file(path: &Utf8Path) -> Result<Self, TargetError> {
        let file = areasmith_fs::create_utf8_file(path).map_err(|source| TargetError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            label: path.to_string(),
            writer: Box::new(BufWriter::new(file)),
        })
    }

    /// Wrap any writer, e.g. an in-memory buffer.
    pub fn from_writer(label: impl Into<String>, writer: impl Write + 'static) -> Self {
        Self {
            label: label.into(),
            writer: Box::new(writer),
        }
    }

    /// Human-readable destination name.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputTarget")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// In-memory writer whose contents stay readable after it moved into an
/// [`OutputTarget`].
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    /// Contents written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
