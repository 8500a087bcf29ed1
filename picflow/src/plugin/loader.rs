//! Loads plugins and wires their capabilities into the lifecycle registries.

use super::capability::{Capability, ConfigItem, ConfigProvider, Plugin, PluginFactory};
use super::stage::{StageHandler, Transformer, Uploader};
use crate::config::PLUGINS_KEY;
use crate::context::{ExecutionContext, SharedResources};
use crate::errors::{PicflowError, PluginLoadError, PluginNotFoundError};
use crate::events::{PLUGIN_REGISTERED, PLUGIN_UNREGISTERED};
use crate::lifecycle::{LifecycleRegistries, LifecycleStage};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A registry entry owned by a plugin, compared by identity.
#[derive(Clone)]
enum Entry {
    Transformer(Arc<dyn Transformer>),
    Uploader(Arc<dyn Uploader>),
    Handler(Arc<dyn StageHandler>),
}

impl Entry {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Transformer(a), Self::Transformer(b)) => Arc::ptr_eq(a, b),
            (Self::Uploader(a), Self::Uploader(b)) => Arc::ptr_eq(a, b),
            (Self::Handler(a), Self::Handler(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Puts the entry under `id`, returning whatever it displaced.
    fn put(
        &self,
        registries: &LifecycleRegistries,
        stage: LifecycleStage,
        id: &str,
    ) -> Result<Option<Self>, PicflowError> {
        let displaced = match (stage, self) {
            (LifecycleStage::Transformer, Self::Transformer(t)) => registries
                .transformer
                .replace(id, Arc::clone(t))?
                .map(Self::Transformer),
            (LifecycleStage::Uploader, Self::Uploader(u)) => registries
                .uploader
                .replace(id, Arc::clone(u))?
                .map(Self::Uploader),
            (stage, Self::Handler(h)) => registries
                .handlers(stage)
                .ok_or_else(|| {
                    PicflowError::Internal(format!("{stage} does not take handlers"))
                })?
                .replace(id, Arc::clone(h))?
                .map(Self::Handler),
            (stage, _) => {
                return Err(PicflowError::Internal(format!(
                    "entry does not belong to {stage}"
                )))
            }
        };
        Ok(displaced)
    }

    /// Removes the entry from `id` if it is still the live one there.
    fn take(&self, registries: &LifecycleRegistries, stage: LifecycleStage, id: &str) -> bool {
        match (stage, self) {
            (LifecycleStage::Transformer, Self::Transformer(t)) => {
                registries.transformer.unregister_if(id, t)
            }
            (LifecycleStage::Uploader, Self::Uploader(u)) => registries.uploader.unregister_if(id, u),
            (stage, Self::Handler(h)) => registries
                .handlers(stage)
                .is_some_and(|r| r.unregister_if(id, h)),
            _ => false,
        }
    }
}

/// One entry a plugin put into a registry, and the entry it displaced.
struct Registration {
    stage: LifecycleStage,
    id: String,
    entry: Entry,
    displaced: Option<Entry>,
}

struct LoadedPlugin {
    plugin: Arc<dyn Plugin>,
    registrations: Vec<Registration>,
    config: Vec<Arc<dyn ConfigProvider>>,
}

/// Tracks known plugin packages and the plugins currently loaded.
///
/// Known packages make up the full list. A package is loaded unless its
/// `plugins.<name>` flag is `false`. Loading never persists configuration.
pub struct PluginLoader {
    resources: SharedResources,
    packages: RwLock<Vec<(String, PluginFactory)>>,
    loaded: RwLock<Vec<(String, LoadedPlugin)>>,
}

impl PluginLoader {
    /// Creates a loader over the runtime's shared resources.
    #[must_use]
    pub fn new(resources: SharedResources) -> Self {
        Self {
            resources,
            packages: RwLock::new(Vec::new()),
            loaded: RwLock::new(Vec::new()),
        }
    }

    /// Adds a package to the known table without loading it.
    pub fn add_package(&self, name: impl Into<String>, factory: PluginFactory) {
        let name = name.into();
        let mut packages = self.packages.write();
        if let Some(slot) = packages.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = factory;
        } else {
            debug!(plugin = %name, "Added plugin package");
            packages.push((name, factory));
        }
    }

    /// Loads every known package that is not disabled.
    ///
    /// Failures are logged and returned; they do not stop the other packages.
    pub fn load_packages(&self) -> Vec<(String, PicflowError)> {
        let names: Vec<String> = self.packages.read().iter().map(|(n, _)| n.clone()).collect();
        names
            .into_iter()
            .filter_map(|name| {
                self.register_plugin(&name, None)
                    .err()
                    .map(|e| (name, e))
            })
            .collect()
    }

    /// Loads a plugin and registers its capabilities.
    ///
    /// With a factory the plugin is also added to the known table. Without
    /// one, `name` must already be known. A disabled plugin is tracked but
    /// not loaded. Loading a loaded plugin again replaces it.
    ///
    /// # Errors
    ///
    /// Returns `PluginNotFound` for an unknown package, `InvalidName` for an
    /// empty name, and `PluginLoad` if the factory, `Plugin::register` or a
    /// capability registration fails. Nothing stays registered on failure.
    pub fn register_plugin(&self, name: &str, factory: Option<PluginFactory>) -> Result<(), PicflowError> {
        if name.trim().is_empty() {
            return Err(PicflowError::InvalidName("plugin name must not be empty".to_string()));
        }

        let factory = match factory {
            Some(factory) => {
                self.add_package(name, Arc::clone(&factory));
                factory
            }
            None => self
                .package(name)
                .ok_or_else(|| PluginNotFoundError::new(name))?,
        };

        if self.is_disabled(name) {
            warn!(plugin = %name, "Plugin is disabled, skipping");
            return Ok(());
        }

        if self.has_plugin(name) {
            self.unload(name);
        }

        let ctx = ExecutionContext::new(self.resources.clone(), Vec::new());
        let loaded = self.instantiate(name, &factory, &ctx).map_err(|e| {
            error!(plugin = %name, error = %e, "Failed to load plugin");
            e
        })?;

        info!(
            plugin = %name,
            stages = ?loaded.registrations.iter().map(|r| r.stage.as_str()).collect::<Vec<_>>(),
            "Registered plugin"
        );
        self.loaded.write().push((name.to_string(), loaded));
        self.resources
            .events
            .try_emit(PLUGIN_REGISTERED, Some(json!({ "name": name })));
        Ok(())
    }

    fn instantiate(
        &self,
        name: &str,
        factory: &PluginFactory,
        ctx: &ExecutionContext,
    ) -> Result<LoadedPlugin, PicflowError> {
        let plugin = factory(ctx).map_err(|e| PluginLoadError::new(name, e))?;
        plugin
            .register(ctx)
            .map_err(|e| PluginLoadError::new(name, e))?;

        let mut loaded = LoadedPlugin {
            plugin: Arc::clone(&plugin),
            registrations: Vec::new(),
            config: Vec::new(),
        };
        for capability in plugin.capabilities() {
            if let Capability::Config(provider) = capability {
                loaded.config.push(provider);
                continue;
            }
            match self.register_capability(name, capability) {
                Ok(registration) => loaded.registrations.push(registration),
                Err(e) => {
                    self.release(&loaded.registrations);
                    return Err(PluginLoadError::new(name, anyhow::Error::new(e)).into());
                }
            }
        }
        Ok(loaded)
    }

    fn register_capability(
        &self,
        name: &str,
        capability: Capability,
    ) -> Result<Registration, PicflowError> {
        let (stage, id, entry) = match capability {
            Capability::Transformer { id, transformer } => (
                LifecycleStage::Transformer,
                id.unwrap_or_else(|| name.to_string()),
                Entry::Transformer(transformer),
            ),
            Capability::Uploader { id, uploader } => (
                LifecycleStage::Uploader,
                id.unwrap_or_else(|| name.to_string()),
                Entry::Uploader(uploader),
            ),
            Capability::BeforeTransform(handler) => (
                LifecycleStage::BeforeTransform,
                name.to_string(),
                Entry::Handler(handler),
            ),
            Capability::BeforeUpload(handler) => (
                LifecycleStage::BeforeUpload,
                name.to_string(),
                Entry::Handler(handler),
            ),
            Capability::AfterUpload(handler) => (
                LifecycleStage::AfterUpload,
                name.to_string(),
                Entry::Handler(handler),
            ),
            Capability::Config(_) => {
                return Err(PicflowError::Internal(
                    "config schemas are not registry entries".to_string(),
                ))
            }
        };
        let displaced = entry.put(&self.resources.registries, stage, &id)?;
        if displaced.is_some() {
            debug!(plugin = %name, stage = %stage, entry = %id, "Plugin took over registry entry");
        }
        Ok(Registration {
            stage,
            id,
            entry,
            displaced,
        })
    }

    /// Removes a plugin's live entries, newest first, and puts back what
    /// each one displaced. Entries since taken over by others are left alone.
    fn release(&self, registrations: &[Registration]) {
        let registries = &self.resources.registries;
        for reg in registrations.iter().rev() {
            if !reg.entry.take(registries, reg.stage, &reg.id) {
                continue;
            }
            if let Some(previous) = &reg.displaced {
                if let Err(e) = previous.put(registries, reg.stage, &reg.id) {
                    warn!(stage = %reg.stage, entry = %reg.id, error = %e, "Failed to restore entry");
                }
            }
        }
    }

    fn unload(&self, name: &str) -> bool {
        let removed = {
            let mut loaded = self.loaded.write();
            let removed = loaded
                .iter()
                .position(|(n, _)| n == name)
                .map(|pos| loaded.remove(pos).1);
            // Whoever displaced this plugin's entries now displaces what they displaced.
            if let Some(gone) = &removed {
                for (_, other) in loaded.iter_mut() {
                    for reg in &mut other.registrations {
                        let Some(displaced) = &reg.displaced else {
                            continue;
                        };
                        if let Some(own) = gone.registrations.iter().find(|g| {
                            g.stage == reg.stage && g.id == reg.id && g.entry.same(displaced)
                        }) {
                            reg.displaced = own.displaced.clone();
                        }
                    }
                }
            }
            removed
        };
        let Some(plugin) = removed else {
            return false;
        };
        self.release(&plugin.registrations);
        self.resources
            .events
            .try_emit(PLUGIN_UNREGISTERED, Some(json!({ "name": name })));
        true
    }

    /// Unloads a plugin and forgets its package. Does nothing if unknown.
    pub fn unregister_plugin(&self, name: &str) {
        let unloaded = self.unload(name);
        let mut packages = self.packages.write();
        let known = packages.len();
        packages.retain(|(n, _)| n != name);
        if unloaded || packages.len() != known {
            info!(plugin = %name, "Unregistered plugin");
        }
    }

    /// Enables a plugin in memory and loads it.
    ///
    /// # Errors
    ///
    /// Fails as [`register_plugin`](Self::register_plugin) does.
    pub fn enable_plugin(&self, name: &str) -> Result<(), PicflowError> {
        self.set_flag(name, true)?;
        self.register_plugin(name, None)
    }

    /// Disables a plugin in memory and unloads it. The package stays known.
    ///
    /// # Errors
    ///
    /// Returns `PluginNotFound` if the package is unknown.
    pub fn disable_plugin(&self, name: &str) -> Result<(), PicflowError> {
        if self.package(name).is_none() {
            return Err(PluginNotFoundError::new(name).into());
        }
        self.set_flag(name, false)?;
        self.unload(name);
        Ok(())
    }

    fn set_flag(&self, name: &str, enabled: bool) -> Result<(), PicflowError> {
        let mut partial = serde_json::Map::new();
        partial.insert(format!("{PLUGINS_KEY}.{name}"), Value::Bool(enabled));
        self.resources.config.set_config(Value::Object(partial))
    }

    fn is_disabled(&self, name: &str) -> bool {
        self.resources
            .config
            .get_config(Some(PLUGINS_KEY))
            .get(name)
            .and_then(Value::as_bool)
            == Some(false)
    }

    fn package(&self, name: &str) -> Option<PluginFactory> {
        self.packages
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| Arc::clone(f))
    }

    /// Returns a loaded plugin.
    #[must_use]
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.loaded
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| Arc::clone(&p.plugin))
    }

    /// Whether a plugin is loaded.
    #[must_use]
    pub fn has_plugin(&self, name: &str) -> bool {
        self.loaded.read().iter().any(|(n, _)| n == name)
    }

    /// Loaded plugins, in load order.
    #[must_use]
    pub fn get_list(&self) -> Vec<String> {
        self.loaded.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Every known plugin, loaded or not.
    #[must_use]
    pub fn get_full_list(&self) -> Vec<String> {
        self.packages.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// The configuration schema a loaded plugin declares.
    #[must_use]
    pub fn plugin_config(&self, name: &str) -> Vec<ConfigItem> {
        let providers: Vec<Arc<dyn ConfigProvider>> = self
            .loaded
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.config.clone())
            .unwrap_or_default();
        if providers.is_empty() {
            return Vec::new();
        }
        let ctx = ExecutionContext::new(self.resources.clone(), Vec::new());
        providers.iter().flat_map(|p| p.config(&ctx)).collect()
    }

    /// Required fields of `name`'s schema with no value under `prefix`.
    ///
    /// `prefix` is the dotted path of the plugin's config subtree, e.g.
    /// `picBed.github`. Empty strings count as missing.
    #[must_use]
    pub fn missing_required_config(&self, name: &str, prefix: &str) -> Vec<String> {
        self.plugin_config(name)
            .into_iter()
            .filter(|item| item.required)
            .filter(|item| {
                let value = self
                    .resources
                    .config
                    .get_config(Some(format!("{prefix}.{}", item.name).as_str()));
                match value {
                    Value::Null => true,
                    Value::String(s) => s.is_empty(),
                    _ => false,
                }
            })
            .map(|item| item.name)
            .collect()
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("loaded", &self.get_list())
            .field("known", &self.get_full_list())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{factory_of, Capability, ConfigItem, FnHandler, StaticPlugin};
    use crate::testing::{test_resources, MockUploader};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn uploader_plugin() -> PluginFactory {
        factory_of(Arc::new(
            StaticPlugin::new()
                .with_uploader(Arc::new(MockUploader::new("https://cdn")))
                .with_after_upload(Arc::new(FnHandler::new(|_| Ok(()))))
                .with_config(Arc::new(|_ctx: &ExecutionContext| {
                    vec![ConfigItem::new("token").required(), ConfigItem::new("branch")]
                })),
        ))
    }

    fn loader() -> PluginLoader {
        PluginLoader::new(test_resources())
    }

    #[test]
    fn test_register_plugin_wires_capabilities() {
        let loader = loader();
        loader.register_plugin("github", Some(uploader_plugin())).unwrap();

        let registries = &loader.resources.registries;
        assert!(registries.uploader.contains("github"));
        assert!(registries.after_upload.contains("github"));
        assert!(loader.has_plugin("github"));
        assert!(loader.get_plugin("github").is_some());
        assert_eq!(loader.get_list(), vec!["github"]);
    }

    #[test]
    fn test_register_and_unregister_are_idempotent() {
        let loader = loader();
        loader.register_plugin("github", Some(uploader_plugin())).unwrap();
        loader.register_plugin("github", Some(uploader_plugin())).unwrap();
        assert_eq!(loader.get_list(), vec!["github"]);
        assert_eq!(loader.resources.registries.uploader.len(), 1);

        loader.unregister_plugin("github");
        loader.unregister_plugin("github");
        assert!(!loader.has_plugin("github"));
        assert!(loader.get_full_list().is_empty());
        assert!(loader.resources.registries.uploader.is_empty());
        assert!(loader.resources.registries.after_upload.is_empty());
    }

    #[test]
    fn test_unknown_package_is_not_found() {
        let err = loader().register_plugin("nope", None).unwrap_err();
        assert!(matches!(err, PicflowError::PluginNotFound(_)));
    }

    #[test]
    fn test_disabled_package_is_tracked_not_loaded() {
        let loader = loader();
        loader
            .resources
            .config
            .set_config(json!({"plugins.github": false}))
            .unwrap();
        loader.add_package("github", uploader_plugin());
        loader.add_package("other", uploader_plugin());

        let failures = loader.load_packages();
        assert!(failures.is_empty());
        assert_eq!(loader.get_list(), vec!["other"]);
        assert_eq!(loader.get_full_list(), vec!["github", "other"]);
        assert!(!loader.resources.registries.uploader.contains("github"));
    }

    #[test]
    fn test_enable_and_disable_toggle_memory_flag() {
        let loader = loader();
        loader.add_package("github", uploader_plugin());

        loader.disable_plugin("github").unwrap();
        assert_eq!(loader.resources.config.get_config(Some("plugins.github")), false);
        assert!(!loader.has_plugin("github"));

        loader.enable_plugin("github").unwrap();
        assert!(loader.has_plugin("github"));
        assert_eq!(loader.resources.config.get_config(Some("plugins.github")), true);
        assert!(matches!(
            loader.disable_plugin("missing"),
            Err(PicflowError::PluginNotFound(_))
        ));
    }

    #[test]
    fn test_failing_factory_aborts_only_that_plugin() {
        let loader = loader();
        loader.add_package("good", uploader_plugin());
        loader.add_package(
            "bad",
            Arc::new(|_ctx: &ExecutionContext| -> anyhow::Result<Arc<dyn Plugin>> {
                Err(anyhow::anyhow!("boom"))
            }),
        );

        let failures = loader.load_packages();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "bad");
        assert!(matches!(failures[0].1, PicflowError::PluginLoad(_)));
        assert_eq!(loader.get_list(), vec!["good"]);
    }

    #[test]
    fn test_failed_capability_rolls_back_partial_registrations() {
        let loader = loader();
        let plugin = StaticPlugin::new()
            .with_before_upload(Arc::new(FnHandler::new(|_| Ok(()))))
            .with(Capability::uploader_with_id("", Arc::new(MockUploader::new("https://cdn"))));

        let err = loader
            .register_plugin("broken", Some(factory_of(Arc::new(plugin))))
            .unwrap_err();
        assert!(matches!(err, PicflowError::PluginLoad(_)));
        assert!(loader.resources.registries.before_upload.is_empty());
        assert!(!loader.has_plugin("broken"));
        assert_eq!(loader.get_full_list(), vec!["broken"]);
    }

    fn smms_plugin(uploader: &Arc<dyn Uploader>) -> PluginFactory {
        factory_of(Arc::new(
            StaticPlugin::new().with(Capability::uploader_with_id("smms", Arc::clone(uploader))),
        ))
    }

    fn mock(base: &str) -> Arc<dyn Uploader> {
        Arc::new(MockUploader::new(base))
    }

    fn live_smms_is(loader: &PluginLoader, expected: &Arc<dyn Uploader>) -> bool {
        loader
            .resources
            .registries
            .uploader
            .get("smms")
            .is_some_and(|live| Arc::ptr_eq(&live, expected))
    }

    #[test]
    fn test_unregistering_plugin_keeps_entry_taken_over_by_another() {
        let loader = loader();
        let (a, b) = (mock("https://a"), mock("https://b"));
        loader.register_plugin("a", Some(smms_plugin(&a))).unwrap();
        loader.register_plugin("b", Some(smms_plugin(&b))).unwrap();

        loader.unregister_plugin("a");
        assert!(live_smms_is(&loader, &b));

        loader.unregister_plugin("b");
        assert!(!loader.resources.registries.uploader.contains("smms"));
    }

    #[test]
    fn test_disabling_plugin_restores_entry_it_displaced() {
        let loader = loader();
        let (a, b) = (mock("https://a"), mock("https://b"));
        loader.register_plugin("a", Some(smms_plugin(&a))).unwrap();
        loader.register_plugin("b", Some(smms_plugin(&b))).unwrap();

        loader.disable_plugin("b").unwrap();
        assert!(live_smms_is(&loader, &a));

        loader.disable_plugin("a").unwrap();
        assert!(loader.resources.registries.uploader.is_empty());
    }

    #[test]
    fn test_failed_load_restores_builtin_entry() {
        let loader = loader();
        let builtin: Arc<dyn Transformer> = Arc::new(crate::transformers::PathTransformer);
        loader
            .resources
            .registries
            .transformer
            .register("path", Arc::clone(&builtin))
            .unwrap();
        let plugin = StaticPlugin::new()
            .with(Capability::transformer_with_id(
                "path",
                Arc::new(crate::transformers::Base64Transformer),
            ))
            .with(Capability::uploader_with_id("", Arc::new(MockUploader::new("https://cdn"))));

        let err = loader
            .register_plugin("hijack", Some(factory_of(Arc::new(plugin))))
            .unwrap_err();

        assert!(matches!(err, PicflowError::PluginLoad(_)));
        let live = loader.resources.registries.transformer.get("path").unwrap();
        assert!(Arc::ptr_eq(&live, &builtin));
    }

    #[test]
    fn test_register_hook_called_once_per_load() {
        struct Counting(Arc<AtomicUsize>);
        impl Plugin for Counting {
            fn register(&self, _ctx: &ExecutionContext) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn capabilities(&self) -> Vec<Capability> {
                Vec::new()
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let loader = loader();
        loader
            .register_plugin("counting", Some(factory_of(Arc::new(Counting(Arc::clone(&count))))))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plugin_config_and_missing_required() {
        let loader = loader();
        loader.register_plugin("github", Some(uploader_plugin())).unwrap();

        let names: Vec<_> = loader.plugin_config("github").into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["token", "branch"]);
        assert_eq!(loader.missing_required_config("github", "picBed.github"), vec!["token"]);

        loader
            .resources
            .config
            .set_config(json!({"picBed.github": {"token": "abc"}}))
            .unwrap();
        assert!(loader.missing_required_config("github", "picBed.github").is_empty());
        assert!(loader.plugin_config("unknown").is_empty());
    }
}
