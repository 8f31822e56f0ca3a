use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// One collected file name and, once the manifest has been edited, the
/// line the user left in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    original: Vec<u8>,
    replacement: Option<Vec<u8>>,
}

impl NameEntry {
    pub fn new(original: impl Into<Vec<u8>>) -> Self {
        Self {
            original: original.into(),
            replacement: None,
        }
    }

    pub fn original(&self) -> &[u8] {
        &self.original
    }

    /// `None` until pairing; `Some(b"")` is a deliberate empty edit.
    pub fn replacement(&self) -> Option<&[u8]> {
        self.replacement.as_deref()
    }

    /// The replacement, if it differs from the original byte for byte.
    pub fn change(&self) -> Option<&[u8]> {
        self.replacement
            .as_deref()
            .filter(|replacement| *replacement != self.original.as_slice())
    }
}

/// The single ordered sequence that is written to the manifest and later
/// paired with the edited lines. It is never re-sorted after collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameList {
    entries: Vec<NameEntry>,
}

impl NameList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: NameEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NameEntry> {
        self.entries.iter()
    }

    /// Sets every replacement at once, in order. Callers validate the count
    /// first so that either all entries are paired or none are.
    pub fn assign_replacements(&mut self, replacements: Vec<Vec<u8>>) {
        debug_assert_eq!(replacements.len(), self.entries.len());
        for (entry, replacement) in self.entries.iter_mut().zip(replacements) {
            entry.replacement = Some(replacement);
        }
    }
}

impl From<Vec<NameEntry>> for NameList {
    fn from(entries: Vec<NameEntry>) -> Self {
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a NameList {
    type Item = &'a NameEntry;
    type IntoIter = std::slice::Iter<'a, NameEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// `.` and `..` are never collected.
pub fn is_pseudo_entry(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

pub fn has_line_break(name: &[u8]) -> bool {
    name.iter().any(|&byte| byte == b'\n' || byte == b'\r')
}

#[cfg(unix)]
pub fn os_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(name.as_bytes())
}

#[cfg(not(unix))]
pub fn os_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    match name.to_string_lossy() {
        Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
        Cow::Owned(text) => Cow::Owned(text.into_bytes()),
    }
}

#[cfg(unix)]
pub fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    os_bytes(path.as_os_str())
}
