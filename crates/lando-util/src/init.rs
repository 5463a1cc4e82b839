use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

pub const KEYS_DIR: &str = "keys";
const CONTAINER_KEYS_DIR: &str = "/user/.lando/keys";

/// Known init strategies, with the string form kept only for plugins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InitMethodId {
    Github,
    Pantheon,
    Plugin(String),
}

impl InitMethodId {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "github" => Self::Github,
            "pantheon" => Self::Pantheon,
            other => Self::Plugin(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Github => "github",
            Self::Pantheon => "pantheon",
            Self::Plugin(name) => name,
        }
    }
}

impl fmt::Display for InitMethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait InitMethod: Send + Sync {
    fn build(&self, name: &str, options: &Value) -> Value;

    fn yaml(&self, config: Value, options: &Value) -> Value;
}

/// Built once at startup and handed to whoever needs init methods.
#[derive(Default)]
pub struct InitRegistry {
    methods: BTreeMap<InitMethodId, Box<dyn InitMethod>>,
}

impl InitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: InitMethodId, method: impl InitMethod + 'static) {
        self.methods.insert(id, Box::new(method));
    }

    pub fn get(&self, id: &InitMethodId) -> Option<&dyn InitMethod> {
        self.methods.get(id).map(|method| method.as_ref())
    }

    pub fn ids(&self) -> Vec<&InitMethodId> {
        self.methods.keys().collect()
    }

    /// Unknown methods build nothing.
    pub fn build(&self, name: &str, method: &InitMethodId, options: &Value) -> Value {
        let Some(handler) = self.get(method) else {
            return Value::Object(Default::default());
        };
        info!(app = name, method = %method, "building app with init method");
        debug!(app = name, ?options, "init build options");
        handler.build(name, options)
    }

    /// Unknown recipes leave the config untouched.
    pub fn yaml(&self, recipe: &InitMethodId, config: Value, options: &Value) -> Value {
        let Some(handler) = self.get(recipe) else {
            return config;
        };
        debug!(recipe = %recipe, ?options, "augmenting app config");
        handler.yaml(config, options)
    }
}

impl fmt::Debug for InitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitRegistry")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `ssh-keygen` invocation for the util context, writing under the mounted engine home.
pub fn create_key_command(key: &str, hostname: &str) -> String {
    format!(
        "ssh-keygen -t rsa -N \"\" -C \"lando@{hostname}\" -f \"{CONTAINER_KEYS_DIR}/{key}\""
    )
}

pub async fn ensure_keys_dir(user_conf_root: &Path) -> std::io::Result<PathBuf> {
    let keys_dir = user_conf_root.join(KEYS_DIR);
    tokio::fs::create_dir_all(&keys_dir).await?;
    Ok(keys_dir)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{create_key_command, ensure_keys_dir, InitMethod, InitMethodId, InitRegistry};

    struct GithubInit;

    impl InitMethod for GithubInit {
        fn build(&self, name: &str, options: &Value) -> Value {
            json!({ "name": name, "repo": options["github-repo"] })
        }

        fn yaml(&self, mut config: Value, _options: &Value) -> Value {
            config["recipe"] = json!("github");
            config
        }
    }

    #[test]
    fn ids_parse_to_typed_variants_with_plugin_fallback() {
        assert_eq!(InitMethodId::parse("GitHub"), InitMethodId::Github);
        assert_eq!(InitMethodId::parse("pantheon"), InitMethodId::Pantheon);
        assert_eq!(
            InitMethodId::parse("custom"),
            InitMethodId::Plugin("custom".to_string())
        );
    }

    #[test]
    fn registry_dispatches_known_methods_and_defaults_unknown() {
        let mut registry = InitRegistry::new();
        registry.add(InitMethodId::Github, GithubInit);

        let built = registry.build("site", &InitMethodId::Github, &json!({"github-repo": "a/b"}));
        assert_eq!(built, json!({"name": "site", "repo": "a/b"}));

        let empty = registry.build("site", &InitMethodId::Pantheon, &json!({}));
        assert_eq!(empty, json!({}));

        let config = json!({"name": "site"});
        assert_eq!(
            registry.yaml(&InitMethodId::Pantheon, config.clone(), &json!({})),
            config
        );
        assert_eq!(
            registry.yaml(&InitMethodId::Github, config, &json!({})),
            json!({"name": "site", "recipe": "github"})
        );
        assert_eq!(registry.ids(), vec![&InitMethodId::Github]);
    }

    #[test]
    fn key_command_targets_mounted_keys_dir() {
        assert_eq!(
            create_key_command("lando_id_rsa", "devbox"),
            "ssh-keygen -t rsa -N \"\" -C \"lando@devbox\" -f \"/user/.lando/keys/lando_id_rsa\""
        );
    }

    #[tokio::test]
    async fn ensure_keys_dir_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = ensure_keys_dir(dir.path()).await.expect("first");
        let second = ensure_keys_dir(dir.path()).await.expect("second");
        assert_eq!(first, second);
        assert!(first.is_dir());
    }
}
