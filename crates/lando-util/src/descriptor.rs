use std::path::PathBuf;

pub const UTIL_SERVICE: &str = "util";
pub const DEFAULT_EXEC_USER: &str = "www-data";
const PROJECT_PREFIX: &str = "landoutil";

/// Strips the characters compose drops when it derives container names.
pub fn composify(name: &str) -> String {
    name.chars().filter(|ch| *ch != '-' && *ch != '.').collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    Attach,
    Detach,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: ExecMode,
    pub user: String,
    pub services: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ExecMode::Attach,
            user: DEFAULT_EXEC_USER.to_string(),
            services: vec![UTIL_SERVICE.to_string()],
        }
    }
}

/// Per-operation handle on one util context. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilServiceDescriptor {
    pub project_name: String,
    pub compose_files: Vec<PathBuf>,
    pub container_id: String,
    pub run_options: RunOptions,
}

impl UtilServiceDescriptor {
    pub fn new(name: &str, compose_file: PathBuf) -> Self {
        let project_name = format!("{PROJECT_PREFIX}{name}");
        let container_id = format!("{}_{UTIL_SERVICE}_1", composify(&project_name));
        Self {
            project_name,
            compose_files: vec![compose_file],
            container_id,
            run_options: RunOptions::default(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.run_options.user = user.into();
        self
    }
}

/// The app a util context works on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppContext {
    pub name: String,
    pub root: Option<PathBuf>,
}

impl AppContext {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{composify, ExecMode, UtilServiceDescriptor};

    #[test]
    fn descriptor_names_follow_compose_scheme() {
        let descriptor =
            UtilServiceDescriptor::new("my-app.test", PathBuf::from("/conf/util/util.yml"));
        assert_eq!(descriptor.project_name, "landoutilmy-app.test");
        assert_eq!(descriptor.container_id, "landoutilmyapptest_util_1");
        assert_eq!(descriptor.run_options.user, "www-data");
        assert_eq!(descriptor.run_options.mode, ExecMode::Attach);
        assert_eq!(descriptor.run_options.services, vec!["util".to_string()]);
    }

    #[test]
    fn composify_removes_dashes_and_dots_only() {
        assert_eq!(composify("a-b.c_d"), "abc_d");
        assert_eq!(composify(""), "");
    }
}
