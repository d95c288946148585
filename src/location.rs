//! Storage endpoints that open and close named sub-artifacts.
//!
//! A [`Location`] maps [`LocationName`]s to files. The dictionary file itself
//! lives at the default (empty) name; external tables and blobs get sibling
//! names from [`Location::generate_new_name`].
//!
//! Three endpoints are provided:
//!
//! - [`SingleFileLocation`]: exactly one file, only the default name is legal
//! - [`PrefixedFileLocation`]: sibling files sharing the master file's stem
//! - [`FolderLocation`]: one file per name inside a fixed folder
//!
//! ```rust,no_run
//! use dictfile::location::{DataKind, Location, LocationName, NameStart, OpenMode, PrefixedFileLocation};
//! use std::io::Write;
//!
//! # fn main() -> dictfile::Result<()> {
//! let mut location = PrefixedFileLocation::new("out/run.dict");
//! let name = location.generate_new_name(&LocationName::parse("trace.dat"), NameStart::PrefixFirst)?;
//! location.open(&name, OpenMode::Write, DataKind::Text)?;
//! location.stream_mut(&name)?.write_all(b"1\t2\n")?;
//! location.close(&name)?;
//! assert_eq!(location.resolve(&name)?, std::path::Path::new("out/run_trace.dat"));
//! # Ok(())
//! # }
//! ```

use crate::{Result, StorageMisuse};
use indexmap::IndexMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// A relative, case-insensitive name inside a [`Location`].
///
/// The empty path is the default name: the location's main artifact.
///
/// # Examples
///
/// ```rust
/// use dictfile::location::LocationName;
///
/// let name = LocationName::parse("Tables\\scan.DAT");
/// assert_eq!(name.path, vec!["Tables", "scan"]);
/// assert_eq!(name, LocationName::parse("tables/scan.dat"));
/// assert_eq!(name.with_suffix("_000").to_string(), "Tables/scan_000.DAT");
/// assert!(LocationName::default().is_default());
/// ```
#[derive(Clone, Debug, Default)]
pub struct LocationName {
    pub path: Vec<String>,
    pub ext: Option<String>,
}

impl LocationName {
    pub fn new<I, S>(path: I, ext: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LocationName {
            path: path.into_iter().map(Into::into).collect(),
            ext: ext.map(str::to_string),
        }
    }

    /// Parses `a/b/name.ext`, accepting both `/` and `\` as separators.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut path: Vec<String> = text
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_string)
            .collect();
        let mut ext = None;
        if let Some(last) = path.last_mut() {
            if let Some((stem, e)) = last.rsplit_once('.') {
                if !stem.is_empty() && !e.is_empty() {
                    ext = Some(e.to_string());
                    *last = stem.to_string();
                }
            }
        }
        LocationName { path, ext }
    }

    /// True if every segment names a plain entry, so the name resolves inside
    /// the location: no `..`, no separators, no empty segments.
    #[must_use]
    pub fn is_contained(&self) -> bool {
        self.path.iter().all(|segment| {
            !segment.is_empty() && segment != ".." && !segment.contains(['/', '\\'])
        })
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.path.is_empty()
    }

    /// Appends `suffix` to the last path segment.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let mut name = self.clone();
        match name.path.last_mut() {
            Some(last) => last.push_str(suffix),
            None => name.path.push(suffix.trim_start_matches('_').to_string()),
        }
        name
    }

    #[must_use]
    pub fn with_ext(mut self, ext: Option<&str>) -> Self {
        self.ext = ext.map(str::to_string);
        self
    }

    fn key(&self) -> (Vec<String>, Option<String>) {
        (
            self.path.iter().map(|s| s.to_lowercase()).collect(),
            self.ext.as_ref().map(|e| e.to_lowercase()),
        )
    }
}

impl PartialEq for LocationName {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for LocationName {}

impl Hash for LocationName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("/"))?;
        if let Some(ext) = &self.ext {
            write!(f, ".{}", ext)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::Append)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    Text,
    Binary,
}

/// Where [`Location::generate_new_name`] starts probing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameStart {
    /// Try the bare prefix first, then `_000`, `_001`, ...
    PrefixFirst,
    /// Start at the given numeric suffix.
    Index(usize),
}

/// An open stream, buffered in the direction it was opened for.
#[derive(Debug)]
pub enum LocationStream {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

impl Read for LocationStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            LocationStream::Reader(r) => r.read(buf),
            LocationStream::Writer(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "stream is open for writing",
            )),
        }
    }
}

impl Write for LocationStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LocationStream::Writer(w) => w.write(buf),
            LocationStream::Reader(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "stream is open for reading",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LocationStream::Writer(w) => w.flush(),
            LocationStream::Reader(_) => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct OpenFile {
    pub mode: OpenMode,
    pub kind: DataKind,
    pub path: PathBuf,
    pub stream: LocationStream,
}

/// The set of streams a location currently has open, in opening order.
#[derive(Debug, Default)]
pub struct OpenFiles {
    files: IndexMap<LocationName, OpenFile>,
}

impl OpenFiles {
    #[must_use]
    pub fn contains(&self, name: &LocationName) -> bool {
        self.files.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, LocationName, OpenFile> {
        self.files.iter()
    }
}

/// A storage endpoint capable of opening and closing named sub-artifacts.
///
/// Implementors only map names to paths and hold their open streams; opening,
/// closing and name generation are shared.
pub trait Location: fmt::Debug {
    /// Maps a name to a filesystem path, failing for names the endpoint does not accept.
    fn resolve(&self, name: &LocationName) -> Result<PathBuf>;

    fn open_files(&self) -> &OpenFiles;

    fn open_files_mut(&mut self) -> &mut OpenFiles;

    /// A name is free if it is legal, not open and nothing exists at its path.
    fn is_free(&self, name: &LocationName) -> bool {
        !self.open_files().contains(name)
            && self.resolve(name).map_or(false, |path| !path.exists())
    }

    /// Finds an unused name derived from `prefix`.
    ///
    /// With [`NameStart::PrefixFirst`] the prefix itself is returned if it is
    /// free; otherwise numeric suffixes `_000`, `_001`, ... are probed.
    fn generate_new_name(&self, prefix: &LocationName, start: NameStart) -> Result<LocationName> {
        if !prefix.is_contained() {
            return Err(StorageMisuse::IllegalName(prefix.to_string()).into());
        }
        self.resolve(prefix)?;
        if start == NameStart::PrefixFirst && self.is_free(prefix) {
            tracing::debug!(name = %prefix, "using prefix as new name");
            return Ok(prefix.clone());
        }
        let first = match start {
            NameStart::PrefixFirst => 0,
            NameStart::Index(index) => index,
        };
        let name = (first..usize::MAX)
            .map(|index| prefix.with_suffix(&format!("_{:03}", index)))
            .find(|candidate| self.is_free(candidate))
            .ok_or_else(|| crate::Error::custom(format!("no free name for prefix '{}'", prefix)))?;
        tracing::debug!(prefix = %prefix, name = %name, "generated new name");
        Ok(name)
    }

    fn open(&mut self, name: &LocationName, mode: OpenMode, kind: DataKind) -> Result<()> {
        if !name.is_contained() {
            return Err(StorageMisuse::IllegalName(name.to_string()).into());
        }
        if self.open_files().contains(name) {
            return Err(StorageMisuse::AlreadyOpen(name.to_string()).into());
        }
        let path = self.resolve(name)?;
        if mode.is_write() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        let stream = match mode {
            OpenMode::Read => LocationStream::Reader(BufReader::new(File::open(&path)?)),
            OpenMode::Write => LocationStream::Writer(BufWriter::new(File::create(&path)?)),
            OpenMode::Append => LocationStream::Writer(BufWriter::new(
                OpenOptions::new().create(true).append(true).open(&path)?,
            )),
        };
        tracing::debug!(name = %name, path = %path.display(), ?mode, ?kind, "opened stream");
        self.open_files_mut().files.insert(
            name.clone(),
            OpenFile {
                mode,
                kind,
                path,
                stream,
            },
        );
        Ok(())
    }

    fn stream_mut(&mut self, name: &LocationName) -> Result<&mut LocationStream> {
        self.open_files_mut()
            .files
            .get_mut(name)
            .map(|file| &mut file.stream)
            .ok_or_else(|| StorageMisuse::NotOpen(name.to_string()).into())
    }

    fn close(&mut self, name: &LocationName) -> Result<()> {
        let mut file = self
            .open_files_mut()
            .files
            .shift_remove(name)
            .ok_or_else(|| StorageMisuse::NotOpen(name.to_string()))?;
        file.stream.flush()?;
        tracing::debug!(name = %name, "closed stream");
        Ok(())
    }

    fn list_open(&self) -> Vec<&LocationName> {
        self.open_files().files.keys().collect()
    }
}

/// Scoped access to one named stream: closes it when dropped.
///
/// Prefer [`LocationFile::close`] so that flush errors are reported; a close
/// failing inside `Drop` can only be logged.
#[derive(Debug)]
pub struct LocationFile<'a> {
    location: &'a mut dyn Location,
    name: LocationName,
    closed: bool,
}

impl<'a> LocationFile<'a> {
    pub fn open(
        location: &'a mut dyn Location,
        name: LocationName,
        mode: OpenMode,
        kind: DataKind,
    ) -> Result<Self> {
        location.open(&name, mode, kind)?;
        Ok(LocationFile {
            location,
            name,
            closed: false,
        })
    }

    #[must_use]
    pub fn name(&self) -> &LocationName {
        &self.name
    }

    pub fn stream(&mut self) -> Result<&mut LocationStream> {
        self.location.stream_mut(&self.name)
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.location.close(&self.name)
    }
}

impl Drop for LocationFile<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.location.close(&self.name) {
            tracing::warn!(name = %self.name, error = %err, "failed to close stream on drop");
        }
    }
}

fn to_io(err: crate::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

impl Read for LocationFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream().map_err(to_io)?.read(buf)
    }
}

impl Write for LocationFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream().map_err(to_io)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream().map_err(to_io)?.flush()
    }
}

fn with_ext(mut path: PathBuf, ext: Option<&str>) -> PathBuf {
    if let Some(ext) = ext {
        let mut file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        file_name.push(".");
        file_name.push(ext);
        path.set_file_name(file_name);
    }
    path
}

/// Exactly one file; any name other than the default is illegal.
#[derive(Debug)]
pub struct SingleFileLocation {
    path: PathBuf,
    open: OpenFiles,
}

impl SingleFileLocation {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SingleFileLocation {
            path: path.as_ref().to_path_buf(),
            open: OpenFiles::default(),
        }
    }
}

impl Location for SingleFileLocation {
    fn resolve(&self, name: &LocationName) -> Result<PathBuf> {
        if name.is_default() {
            Ok(self.path.clone())
        } else {
            Err(StorageMisuse::IllegalName(name.to_string()).into())
        }
    }

    fn open_files(&self) -> &OpenFiles {
        &self.open
    }

    fn open_files_mut(&mut self) -> &mut OpenFiles {
        &mut self.open
    }
}

/// Sibling files next to a master file, sharing its stem as prefix.
///
/// For master `dir/run.dict`: the default name is `dir/run.dict`, `trace.dat`
/// is `dir/run_trace.dat`, and `scan/trace.dat` is `dir/run_scan/trace.dat`.
/// Names without an extension take the master's.
#[derive(Debug)]
pub struct PrefixedFileLocation {
    folder: PathBuf,
    prefix: String,
    ext: Option<String>,
    open: OpenFiles,
}

impl PrefixedFileLocation {
    pub fn new(master: impl AsRef<Path>) -> Self {
        let master = master.as_ref();
        PrefixedFileLocation {
            folder: master.parent().map(Path::to_path_buf).unwrap_or_default(),
            prefix: master
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ext: master.extension().map(|e| e.to_string_lossy().into_owned()),
            open: OpenFiles::default(),
        }
    }
}

impl Location for PrefixedFileLocation {
    fn resolve(&self, name: &LocationName) -> Result<PathBuf> {
        let ext = name.ext.as_deref().or(self.ext.as_deref());
        let path = match name.path.as_slice() {
            [] => self.folder.join(&self.prefix),
            [single] => self.folder.join(format!("{}_{}", self.prefix, single)),
            [first, rest @ ..] => {
                let mut path = self.folder.join(format!("{}_{}", self.prefix, first));
                path.extend(rest);
                path
            }
        };
        Ok(with_ext(path, ext))
    }

    fn open_files(&self) -> &OpenFiles {
        &self.open
    }

    fn open_files_mut(&mut self) -> &mut OpenFiles {
        &mut self.open
    }
}

/// One file per name inside a fixed folder.
///
/// With a fold separator, multi-segment names are joined into a single file
/// name instead of nested subfolders.
#[derive(Debug)]
pub struct FolderLocation {
    folder: PathBuf,
    default_name: String,
    default_ext: Option<String>,
    fold_separator: Option<String>,
    open: OpenFiles,
}

impl FolderLocation {
    pub fn new(folder: impl AsRef<Path>) -> Self {
        FolderLocation {
            folder: folder.as_ref().to_path_buf(),
            default_name: "content".to_string(),
            default_ext: Some("dict".to_string()),
            fold_separator: None,
            open: OpenFiles::default(),
        }
    }

    #[must_use]
    pub fn with_default_name(mut self, name: &str, ext: Option<&str>) -> Self {
        self.default_name = name.to_string();
        self.default_ext = ext.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_fold_separator(mut self, separator: &str) -> Self {
        self.fold_separator = Some(separator.to_string());
        self
    }
}

impl Location for FolderLocation {
    fn resolve(&self, name: &LocationName) -> Result<PathBuf> {
        let ext = name.ext.as_deref().or(self.default_ext.as_deref());
        let path = if name.is_default() {
            self.folder.join(&self.default_name)
        } else if let Some(separator) = &self.fold_separator {
            self.folder.join(name.path.join(separator))
        } else {
            let mut path = self.folder.clone();
            path.extend(&name.path);
            path
        };
        Ok(with_ext(path, ext))
    }

    fn open_files(&self) -> &OpenFiles {
        &self.open
    }

    fn open_files_mut(&mut self) -> &mut OpenFiles {
        &mut self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::TempDir;

    #[test]
    fn test_name_parse() {
        let name = LocationName::parse("./a/b.c.txt");
        assert_eq!(name.path, vec!["a", "b.c"]);
        assert_eq!(name.ext.as_deref(), Some("txt"));
        assert!(LocationName::parse(".hidden").ext.is_none());
        assert!(LocationName::parse("").is_default());
    }

    #[test]
    fn test_prefixed_resolution() {
        let loc = PrefixedFileLocation::new("/data/run.dict");
        let resolve = |s: &str| loc.resolve(&LocationName::parse(s)).unwrap();
        assert_eq!(resolve(""), PathBuf::from("/data/run.dict"));
        assert_eq!(resolve("t.dat"), PathBuf::from("/data/run_t.dat"));
        assert_eq!(resolve("t"), PathBuf::from("/data/run_t.dict"));
        assert_eq!(resolve("g/sub/t.bin"), PathBuf::from("/data/run_g/sub/t.bin"));
    }

    #[test]
    fn test_folder_resolution() {
        let loc = FolderLocation::new("/out");
        assert_eq!(
            loc.resolve(&LocationName::default()).unwrap(),
            PathBuf::from("/out/content.dict")
        );
        assert_eq!(
            loc.resolve(&LocationName::parse("a/b.dat")).unwrap(),
            PathBuf::from("/out/a/b.dat")
        );
        let folded = FolderLocation::new("/out").with_fold_separator("__");
        assert_eq!(
            folded.resolve(&LocationName::parse("a/b.dat")).unwrap(),
            PathBuf::from("/out/a__b.dat")
        );
    }

    #[test]
    fn test_single_file_rejects_names() {
        let loc = SingleFileLocation::new("/tmp/x.dict");
        assert!(loc.resolve(&LocationName::default()).is_ok());
        assert!(matches!(
            loc.resolve(&LocationName::parse("t.dat")),
            Err(Error::Storage(StorageMisuse::IllegalName(_)))
        ));
        assert!(loc
            .generate_new_name(&LocationName::parse("t.dat"), NameStart::PrefixFirst)
            .is_err());
    }

    #[test]
    fn test_names_cannot_leave_the_location() {
        let dir = TempDir::new().unwrap();
        let mut loc = FolderLocation::new(dir.path().join("store"));
        let escaping = LocationName::parse("../outside.bin");
        assert!(!escaping.is_contained());
        assert!(matches!(
            loc.open(&escaping, OpenMode::Write, DataKind::Binary),
            Err(Error::Storage(StorageMisuse::IllegalName(_)))
        ));
        assert!(loc.generate_new_name(&escaping, NameStart::PrefixFirst).is_err());
        assert!(!dir.path().join("outside.bin").exists());
        assert!(LocationName::parse("a/b.bin").is_contained());
        assert!(LocationName::default().is_contained());
    }

    #[test]
    fn test_open_twice_and_close_unopened() {
        let dir = TempDir::new().unwrap();
        let mut loc = FolderLocation::new(dir.path());
        let name = LocationName::parse("a.txt");
        loc.open(&name, OpenMode::Write, DataKind::Text).unwrap();
        assert!(matches!(
            loc.open(&LocationName::parse("A.TXT"), OpenMode::Write, DataKind::Text),
            Err(Error::Storage(StorageMisuse::AlreadyOpen(_)))
        ));
        assert_eq!(loc.list_open().len(), 1);
        loc.close(&name).unwrap();
        assert!(matches!(
            loc.close(&name),
            Err(Error::Storage(StorageMisuse::NotOpen(_)))
        ));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let mut loc = PrefixedFileLocation::new(dir.path().join("run.dict"));
        let name = LocationName::parse("g/t.dat");
        loc.open(&name, OpenMode::Write, DataKind::Text).unwrap();
        loc.stream_mut(&name).unwrap().write_all(b"1\n").unwrap();
        loc.close(&name).unwrap();
        assert!(dir.path().join("run_g").join("t.dat").exists());
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let dir = TempDir::new().unwrap();
        let mut loc = FolderLocation::new(dir.path());
        {
            let mut file = LocationFile::open(
                &mut loc,
                LocationName::parse("x.txt"),
                OpenMode::Write,
                DataKind::Text,
            )
            .unwrap();
            file.write_all(b"hello").unwrap();
        }
        assert!(loc.list_open().is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("x.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_generate_new_name() {
        let dir = TempDir::new().unwrap();
        let loc = FolderLocation::new(dir.path()).with_default_name("content", None);
        for existing in ["x", "x_000", "x_001"] {
            File::create(dir.path().join(existing)).unwrap();
        }
        let prefix = LocationName::parse("x");
        let name = loc.generate_new_name(&prefix, NameStart::Index(0)).unwrap();
        assert_eq!(name.to_string(), "x_002");
        let name = loc.generate_new_name(&prefix, NameStart::PrefixFirst).unwrap();
        assert_eq!(name.to_string(), "x_002");
        let fresh = loc
            .generate_new_name(&LocationName::parse("y"), NameStart::PrefixFirst)
            .unwrap();
        assert_eq!(fresh.to_string(), "y");
    }
}
