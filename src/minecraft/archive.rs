use encoding_rs::{Encoding, GBK, SHIFT_JIS, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::minecraft::error::InstallError;

/// Upper bound on the buffer reserved up front from an entry's declared size.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Candidates tried, in order, when entry names are not valid UTF-8.
fn fallback_encodings() -> [&'static Encoding; 3] {
    [GBK, SHIFT_JIS, WINDOWS_1252]
}

/// How zip entry names are decoded.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveEncoding {
    #[default]
    Auto,
    Utf8,
    Label(String),
}

impl ArchiveEncoding {
    fn resolve(&self) -> Result<Option<&'static Encoding>, InstallError> {
        match self {
            ArchiveEncoding::Auto => Ok(None),
            ArchiveEncoding::Utf8 => Ok(Some(UTF_8)),
            ArchiveEncoding::Label(label) => Encoding::for_label(label.trim().as_bytes())
                .map(Some)
                .ok_or_else(|| InstallError::UnknownEncoding(label.clone())),
        }
    }
}

impl FromStr for ArchiveEncoding {
    type Err = InstallError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let encoding = match normalized.as_str() {
            "" | "auto" => ArchiveEncoding::Auto,
            "utf-8" | "utf8" => ArchiveEncoding::Utf8,
            _ => ArchiveEncoding::Label(normalized),
        };
        encoding.resolve()?;
        Ok(encoding)
    }
}

impl fmt::Display for ArchiveEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveEncoding::Auto => write!(f, "auto"),
            ArchiveEncoding::Utf8 => write!(f, "utf-8"),
            ArchiveEncoding::Label(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    path: String,
    index: Option<usize>,
    is_dir: bool,
}

/// Read-only view of a zip archive as a `/`-rooted path tree.
///
/// Paths handed to the view may start with `/` or not; `""` and `"/"` are the root.
/// Listing order follows the archive's own entry order.
pub struct ArchiveView {
    archive: zip::ZipArchive<File>,
    nodes: Vec<Node>,
    lookup: HashMap<String, usize>,
    encoding: &'static Encoding,
}

impl ArchiveView {
    pub fn open(zip_file: &Path, encoding: &ArchiveEncoding) -> Result<Self, InstallError> {
        let file = File::open(zip_file)?;
        let mut archive = zip::ZipArchive::new(file)?;

        let mut raw_names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            // `name()` only matches the raw bytes for UTF-8 flagged or plain ASCII names.
            let utf8 = entry.name().as_bytes() == entry.name_raw();
            raw_names.push((entry.name_raw().to_vec(), utf8));
        }

        let encoding = match encoding.resolve()? {
            Some(encoding) => encoding,
            None => detect_encoding(&raw_names),
        };
        log::debug!("Opened {} ({} entries, names as {})", zip_file.display(), raw_names.len(), encoding.name());

        let mut view = ArchiveView {
            archive,
            nodes: vec![Node { path: String::new(), index: None, is_dir: true }],
            lookup: HashMap::from([(String::new(), 0)]),
            encoding,
        };

        for (index, (raw, utf8)) in raw_names.iter().enumerate() {
            let name_encoding = if *utf8 { UTF_8 } else { encoding };
            let (decoded, _) = name_encoding.decode_without_bom_handling(raw);
            let is_dir = decoded.ends_with('/') || decoded.ends_with('\\');
            match normalize(&decoded) {
                Some(path) if !path.is_empty() => view.insert(path, index, is_dir),
                Some(_) => {}
                None => log::warn!("Ignoring archive entry outside of the root: {}", decoded),
            }
        }

        Ok(view)
    }

    fn insert(&mut self, path: String, index: usize, is_dir: bool) {
        let mut prefix = String::new();
        let components: Vec<&str> = path.split('/').collect();
        let last = components.len() - 1;

        for (i, component) in components.iter().enumerate() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);

            if self.lookup.contains_key(&prefix) {
                continue;
            }
            let node = if i == last {
                Node { path: prefix.clone(), index: Some(index), is_dir }
            } else {
                Node { path: prefix.clone(), index: None, is_dir: true }
            };
            self.lookup.insert(prefix.clone(), self.nodes.len());
            self.nodes.push(node);
        }
    }

    fn node(&self, path: &str) -> Option<&Node> {
        let path = normalize(path)?;
        self.lookup.get(&path).map(|&i| &self.nodes[i])
    }

    /// Encoding used to decode entry names.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn exists(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.node(path).map(|n| n.is_dir).unwrap_or(false)
    }

    /// Direct children of `dir` as absolute (`/`-prefixed) paths, in archive order.
    pub fn list(&self, dir: &str) -> Vec<String> {
        let Some(dir) = normalize(dir) else {
            return Vec::new();
        };

        self.nodes
            .iter()
            .filter(|n| !n.path.is_empty() && parent_of(&n.path) == dir)
            .map(|n| format!("/{}", n.path))
            .collect()
    }

    /// Paths of every file below `dir`, relative to it, in archive order.
    pub fn files_under(&self, dir: &str) -> Vec<String> {
        let Some(dir) = normalize(dir) else {
            return Vec::new();
        };
        let prefix = if dir.is_empty() { String::new() } else { format!("{}/", dir) };

        self.nodes
            .iter()
            .filter(|n| !n.is_dir && n.path.starts_with(&prefix))
            .map(|n| n.path[prefix.len()..].to_string())
            .collect()
    }

    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, InstallError> {
        let index = self
            .node(path)
            .filter(|n| !n.is_dir)
            .and_then(|n| n.index)
            .ok_or_else(|| InstallError::EntryNotFound(path.to_string()))?;

        let mut entry = self.archive.by_index(index)?;
        let mut buffer = Vec::with_capacity(initial_capacity(entry.size()));
        entry.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    pub fn read_to_string(&mut self, path: &str) -> Result<String, InstallError> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| {
            InstallError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{}: {}", path, e)))
        })
    }

    /// Recursively extracts `dir` into `destination`, overwriting existing files.
    pub fn copy_dir(&mut self, dir: &str, destination: &Path) -> Result<usize, InstallError> {
        let Some(normalized) = normalize(dir) else {
            return Err(InstallError::EntryNotFound(dir.to_string()));
        };
        fs::create_dir_all(destination)?;

        let prefix = if normalized.is_empty() { String::new() } else { format!("{}/", normalized) };
        let subdirs: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| n.is_dir && n.path.starts_with(&prefix))
            .map(|n| n.path[prefix.len()..].to_string())
            .collect();
        for rel in subdirs {
            fs::create_dir_all(destination.join(rel))?;
        }

        let files = self.files_under(&normalized);
        for rel in &files {
            let bytes = self.read(&format!("{}{}", prefix, rel))?;
            let dest = destination.join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, bytes)?;
        }

        Ok(files.len())
    }
}

/// Joins archive path segments, `"/a" + "b"` -> `"/a/b"`.
pub fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    format!("{}/{}", base, child)
}

/// Last path segment, `"/a/b.json"` -> `"b.json"`.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn normalize(path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATION) as usize
}

/// Picks the encoding for names without the UTF-8 flag; flagged names are skipped.
fn detect_encoding(raw_names: &[(Vec<u8>, bool)]) -> &'static Encoding {
    let unflagged: Vec<&[u8]> = raw_names
        .iter()
        .filter(|(_, utf8)| !utf8)
        .map(|(name, _)| name.as_slice())
        .collect();

    if unflagged.iter().all(|name| std::str::from_utf8(name).is_ok()) {
        return UTF_8;
    }

    fallback_encodings()
        .into_iter()
        .find(|candidate| {
            unflagged
                .iter()
                .all(|name| !candidate.decode_without_bom_handling(name).1)
        })
        .unwrap_or(WINDOWS_1252)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_parent_components() {
        assert_eq!(normalize("/a/./b/"), Some("a/b".to_string()));
        assert_eq!(normalize("a\\b"), Some("a/b".to_string()));
        assert_eq!(normalize("/"), Some(String::new()));
        assert_eq!(normalize("a/../b"), None);
    }

    #[test]
    fn auto_detection_prefers_utf8() {
        let names = vec![(b"a/b.txt".to_vec(), true), ("ü.txt".as_bytes().to_vec(), false)];
        assert_eq!(detect_encoding(&names), UTF_8);
    }

    #[test]
    fn auto_detection_falls_back_to_gbk() {
        let (gbk_name, _, _) = GBK.encode("整合包/.minecraft/");
        let names = vec![(gbk_name.into_owned(), false)];
        assert_eq!(detect_encoding(&names), GBK);
    }

    #[test]
    fn flagged_names_do_not_vote() {
        let (gbk_name, _, _) = GBK.encode("整合包/");
        let names = vec![("ü/".as_bytes().to_vec(), true), (gbk_name.into_owned(), false)];
        assert_eq!(detect_encoding(&names), GBK);

        let names = vec![(vec![0xff, 0xfe], true)];
        assert_eq!(detect_encoding(&names), UTF_8);
    }

    #[test]
    fn utf8_flagged_entries_ignore_an_explicit_label() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("整合包/instance.cfg", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"name=x\n").unwrap();
        writer.finish().unwrap();

        let view = ArchiveView::open(&path, &ArchiveEncoding::Label("gbk".to_string())).unwrap();
        assert_eq!(view.encoding(), GBK);
        assert!(view.exists("/整合包/instance.cfg"));
        assert_eq!(view.list("/"), vec!["/整合包".to_string()]);
    }

    #[test]
    fn encoding_labels_parse() {
        assert_eq!("auto".parse::<ArchiveEncoding>().unwrap(), ArchiveEncoding::Auto);
        assert_eq!("UTF-8".parse::<ArchiveEncoding>().unwrap(), ArchiveEncoding::Utf8);
        assert_eq!("gbk".parse::<ArchiveEncoding>().unwrap(), ArchiveEncoding::Label("gbk".to_string()));
        assert!("not-an-encoding".parse::<ArchiveEncoding>().is_err());
    }

    #[test]
    fn declared_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(512), 512);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATION as usize);
    }

    #[test]
    fn path_helpers() {
        assert_eq!(join("/", "patches"), "/patches");
        assert_eq!(join("/pack/", "/patches"), "/pack/patches");
        assert_eq!(file_name("/pack/patches/a.json"), "a.json");
        assert_eq!(parent_of("pack/patches"), "pack");
        assert_eq!(parent_of("pack"), "");
    }
}
