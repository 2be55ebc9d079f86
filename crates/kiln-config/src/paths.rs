//! Output asset path policy.

/// Resolves asset-relative paths under the environment's configured
/// sub-directory (e.g. `static/img/logo.[hash:7].png`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    dev_sub_directory: String,
    build_sub_directory: String,
}

impl PathPolicy {
    pub fn new(dev_sub_directory: impl Into<String>, build_sub_directory: impl Into<String>) -> Self {
        Self {
            dev_sub_directory: dev_sub_directory.into(),
            build_sub_directory: build_sub_directory.into(),
        }
    }

    pub fn sub_directory(&self, is_debug: bool) -> &str {
        if is_debug {
            &self.dev_sub_directory
        } else {
            &self.build_sub_directory
        }
    }

    pub fn assets_path(&self, relative: &str, is_debug: bool) -> String {
        posix_join(&[self.sub_directory(is_debug), relative])
    }
}

/// Join URL-style path segments with `/`.
///
/// Empty and `.` segments are dropped, `..` pops, separators never double.
/// A leading `/` on the first segment is kept.
pub fn posix_join(parts: &[&str]) -> String {
    let absolute = parts
        .iter()
        .find(|p| !p.is_empty())
        .is_some_and(|p| p.starts_with('/'));

    let mut segments: Vec<&str> = Vec::new();
    for segment in parts.iter().flat_map(|p| p.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PathPolicy {
        PathPolicy::new("static", "assets")
    }

    #[test]
    fn debug_paths_use_dev_sub_directory() {
        assert_eq!(policy().assets_path("img/x.png", true), "static/img/x.png");
    }

    #[test]
    fn release_paths_use_build_sub_directory() {
        assert_eq!(policy().assets_path("img/x.png", false), "assets/img/x.png");
    }

    #[test]
    fn separators_never_double() {
        let policy = PathPolicy::new("static/", "/");
        assert_eq!(policy.assets_path("/img//x.png", true), "static/img/x.png");
        assert_eq!(policy.assets_path("js/app.js", false), "/js/app.js");
        assert!(!policy.assets_path("a//b", true).contains("//"));
    }

    #[test]
    fn join_handles_dots() {
        assert_eq!(posix_join(&["static", "./css", "../img/a.png"]), "static/img/a.png");
        assert_eq!(posix_join(&["", ""]), ".");
        assert_eq!(posix_join(&["/", "static"]), "/static");
    }
}
