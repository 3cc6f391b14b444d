/// Maps caller-facing virtual paths onto flat backend object keys.
///
/// The mapping is a bijection restricted to the configured root subtree:
/// `from_key(to_key(p)) == normalize(p)` for every path under the root.
/// Pure string work, no I/O.
#[derive(Debug, Clone)]
pub struct KeyMapper {
    root: String,
}

impl KeyMapper {
    /// Create a mapper for the given root directory prefix.
    ///
    /// An empty root maps the virtual namespace directly onto the bucket
    /// keyspace.
    pub fn new(root_directory: &str) -> Self {
        Self {
            root: root_directory.trim_matches('/').to_string(),
        }
    }

    /// Collapse duplicate slashes and anchor the path at `/`
    pub fn normalize(path: &str) -> String {
        let joined: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if joined.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", joined.join("/"))
        }
    }

    /// Backend object key for a virtual path
    pub fn to_key(&self, path: &str) -> String {
        let rel = Self::normalize(path);
        let rel = rel.trim_start_matches('/');

        if self.root.is_empty() {
            rel.to_string()
        } else if rel.is_empty() {
            self.root.clone()
        } else {
            format!("{}/{}", self.root, rel)
        }
    }

    /// Virtual path for a backend object key, inverse of [`Self::to_key`]
    pub fn from_key(&self, key: &str) -> String {
        let rel = if self.root.is_empty() {
            key
        } else if let Some(stripped) = key.strip_prefix(&format!("{}/", self.root)) {
            stripped
        } else if key == self.root {
            ""
        } else {
            key
        };
        Self::normalize(&format!("/{}", rel))
    }

    /// Listing prefix for the directory at a virtual path.
    ///
    /// The virtual root maps to the bare root prefix so an empty root
    /// directory lists the whole bucket.
    pub fn to_prefix(&self, path: &str) -> String {
        let key = self.to_key(path);
        if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key.trim_end_matches('/'))
        }
    }
}
