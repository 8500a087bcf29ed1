//! The host-facing runtime.
//!
//! A [`Picflow`] owns the shared resources and the plugin loader. Hosts build
//! one at startup, register plugins through [`Picflow::plugins`], and call
//! [`Picflow::upload`] for each operation.

use crate::config::{
    ConfigPersistence, ConfigStore, RequestSettings, PLUGINS_KEY, REQUEST_SETTINGS_PATH,
};
use crate::context::{ExecutionContext, ImageRecord, InputItem, SharedResources};
use crate::errors::PicflowError;
use crate::events::EventSink;
use crate::interfaces::{InstallOptions, InstallOutcome, PluginInstaller, Translator};
use crate::lifecycle::LifecycleRegistries;
use crate::pipeline::PipelineExecutor;
use crate::plugin::{PluginFactory, PluginLoader};
use crate::request::{HttpTransport, RequestAdapter};
use crate::transformers::{
    Base64Transformer, PathTransformer, BASE64_TRANSFORMER, PATH_TRANSFORMER,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Builder for [`Picflow`].
#[derive(Default)]
pub struct PicflowBuilder {
    config: Option<Arc<ConfigStore>>,
    persistence: Option<Arc<dyn ConfigPersistence>>,
    transport: Option<Arc<dyn HttpTransport>>,
    events: Option<Arc<dyn EventSink>>,
    translator: Option<Arc<dyn Translator>>,
    installer: Option<Arc<dyn PluginInstaller>>,
    packages: Vec<(String, PluginFactory)>,
}

impl PicflowBuilder {
    /// Creates a builder with in-memory configuration and a `reqwest`
    /// transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing config store. Takes precedence over
    /// [`with_persistence`](Self::with_persistence).
    #[must_use]
    pub fn with_config(mut self, config: Arc<ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads configuration from `persistence` on build.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn ConfigPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Replaces the HTTP transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Sets the translator used for notifications.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Sets the package installer.
    #[must_use]
    pub fn with_installer(mut self, installer: Arc<dyn PluginInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    /// Adds a known plugin package, loaded on build unless disabled.
    #[must_use]
    pub fn with_package(mut self, name: impl Into<String>, factory: PluginFactory) -> Self {
        self.packages.push((name.into(), factory));
        self
    }

    /// Builds the runtime.
    ///
    /// Registers the built-in transformers, then loads the known packages.
    /// A package that fails to load is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigPersist` if the persisted configuration cannot be read,
    /// or `Config` if the request settings are invalid.
    pub fn build(self) -> Result<Picflow, PicflowError> {
        let config = match (self.config, self.persistence) {
            (Some(config), _) => config,
            (None, Some(persistence)) => Arc::new(ConfigStore::load(persistence)?),
            (None, None) => Arc::new(ConfigStore::in_memory()),
        };

        let request = match self.transport {
            Some(transport) => RequestAdapter::new(transport),
            None => {
                let settings: RequestSettings = config.get_config_as(REQUEST_SETTINGS_PATH)?;
                RequestAdapter::from_settings(&settings)?
            }
        };

        let mut resources = SharedResources::new(config, Arc::new(request));
        if let Some(events) = self.events {
            resources = resources.with_events(events);
        }
        if let Some(translator) = self.translator {
            resources = resources.with_translator(translator);
        }

        resources
            .registries
            .transformer
            .register(PATH_TRANSFORMER, Arc::new(PathTransformer))?;
        resources
            .registries
            .transformer
            .register(BASE64_TRANSFORMER, Arc::new(Base64Transformer))?;

        let loader = PluginLoader::new(resources.clone());
        for (name, factory) in self.packages {
            loader.add_package(name, factory);
        }
        let failures = loader.load_packages();
        if !failures.is_empty() {
            warn!(failed = failures.len(), "Some plugin packages failed to load");
        }

        info!(plugins = ?loader.get_list(), "Picflow runtime ready");
        Ok(Picflow {
            resources,
            plugins: loader,
            installer: self.installer,
        })
    }
}

/// A configured upload runtime.
pub struct Picflow {
    resources: SharedResources,
    plugins: PluginLoader,
    installer: Option<Arc<dyn PluginInstaller>>,
}

impl Picflow {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> PicflowBuilder {
        PicflowBuilder::new()
    }

    /// The shared resources every context receives.
    #[must_use]
    pub fn resources(&self) -> &SharedResources {
        &self.resources
    }

    /// The config store.
    #[must_use]
    pub fn config(&self) -> &ConfigStore {
        &self.resources.config
    }

    /// The lifecycle registries.
    #[must_use]
    pub fn registries(&self) -> &LifecycleRegistries {
        &self.resources.registries
    }

    /// The plugin loader.
    #[must_use]
    pub fn plugins(&self) -> &PluginLoader {
        &self.plugins
    }

    /// Creates a context for hosts that drive a [`PipelineExecutor`]
    /// themselves.
    #[must_use]
    pub fn context(&self, input: Vec<InputItem>) -> ExecutionContext {
        ExecutionContext::new(self.resources.clone(), input)
    }

    /// Uploads `input` with the configured transformer and uploader.
    ///
    /// Each call gets its own context, so uploads may run concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first error of the run. See [`PipelineExecutor::execute`].
    pub async fn upload(&self, input: Vec<InputItem>) -> Result<Vec<ImageRecord>, PicflowError> {
        let mut ctx = self.context(input);
        PipelineExecutor::new().execute(&mut ctx).await
    }

    /// Installs packages through the host installer.
    ///
    /// On success each package is enabled in the durable config and loaded
    /// if a factory for it is known.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no installer is configured, or `ConfigPersist` if
    /// the enable flags cannot be saved.
    pub async fn install(
        &self,
        packages: &[String],
        options: &InstallOptions,
    ) -> Result<InstallOutcome, PicflowError> {
        let outcome = self.installer()?.install(packages, options).await;
        if !outcome.success {
            warn!(packages = ?packages, diagnostic = ?outcome.diagnostic, "Plugin install failed");
            return Ok(outcome);
        }

        let mut flags = serde_json::Map::new();
        for name in &outcome.packages {
            flags.insert(format!("{PLUGINS_KEY}.{name}"), Value::Bool(true));
        }
        self.config().save_config(Value::Object(flags))?;

        let known = self.plugins.get_full_list();
        for name in outcome.packages.iter().filter(|n| known.contains(*n)) {
            if let Err(e) = self.plugins.register_plugin(name, None) {
                error!(plugin = %name, error = %e, "Installed plugin failed to load");
            }
        }
        info!(packages = ?outcome.packages, "Installed plugins");
        Ok(outcome)
    }

    /// Updates packages through the host installer.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no installer is configured.
    pub async fn update(
        &self,
        packages: &[String],
        options: &InstallOptions,
    ) -> Result<InstallOutcome, PicflowError> {
        let outcome = self.installer()?.update(packages, options).await;
        if outcome.success {
            info!(packages = ?outcome.packages, "Updated plugins");
        } else {
            warn!(packages = ?packages, diagnostic = ?outcome.diagnostic, "Plugin update failed");
        }
        Ok(outcome)
    }

    /// Uninstalls packages through the host installer.
    ///
    /// On success each package is unloaded and its enable flag removed from
    /// the durable config.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no installer is configured, or `ConfigPersist` if
    /// the config cannot be saved.
    pub async fn uninstall(
        &self,
        packages: &[String],
        options: &InstallOptions,
    ) -> Result<InstallOutcome, PicflowError> {
        let outcome = self.installer()?.uninstall(packages, options).await;
        if !outcome.success {
            warn!(packages = ?packages, diagnostic = ?outcome.diagnostic, "Plugin uninstall failed");
            return Ok(outcome);
        }

        for name in &outcome.packages {
            self.plugins.unregister_plugin(name);
            self.config().unset_config(PLUGINS_KEY, name);
        }
        self.config().persist()?;
        info!(packages = ?outcome.packages, "Uninstalled plugins");
        Ok(outcome)
    }

    fn installer(&self) -> Result<&Arc<dyn PluginInstaller>, PicflowError> {
        self.installer
            .as_ref()
            .ok_or_else(|| PicflowError::Config("no plugin installer configured".to_string()))
    }
}

impl std::fmt::Debug for Picflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picflow")
            .field("resources", &self.resources)
            .field("plugins", &self.plugins)
            .field("installer", &self.installer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryPersistence;
    use crate::plugin::{factory_of, StaticPlugin};
    use crate::testing::{CollectingEventSink, MockUploader, StaticTransport};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingInstaller {
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl RecordingInstaller {
        fn record(&self, op: &str, packages: &[String]) -> InstallOutcome {
            self.calls.lock().push((op.to_string(), packages.to_vec()));
            InstallOutcome {
                success: true,
                packages: packages.to_vec(),
                diagnostic: None,
            }
        }
    }

    #[async_trait]
    impl PluginInstaller for RecordingInstaller {
        async fn install(&self, packages: &[String], _options: &InstallOptions) -> InstallOutcome {
            self.record("install", packages)
        }

        async fn update(&self, packages: &[String], _options: &InstallOptions) -> InstallOutcome {
            self.record("update", packages)
        }

        async fn uninstall(&self, packages: &[String], _options: &InstallOptions) -> InstallOutcome {
            self.record("uninstall", packages)
        }
    }

    fn mock_plugin() -> PluginFactory {
        factory_of(Arc::new(
            StaticPlugin::new().with_uploader(Arc::new(MockUploader::new("https://mock.example"))),
        ))
    }

    fn offline() -> PicflowBuilder {
        Picflow::builder().with_transport(Arc::new(StaticTransport::ok(Vec::new())))
    }

    #[test]
    fn test_build_registers_builtin_transformers() {
        let picflow = offline().build().unwrap();
        assert_eq!(
            picflow.registries().transformer.get_id_list(),
            vec![PATH_TRANSFORMER, BASE64_TRANSFORMER]
        );
        assert!(picflow.plugins().get_list().is_empty());
    }

    #[test]
    fn test_build_reads_persisted_config() {
        let persistence = Arc::new(MemoryPersistence::with_tree(json!({
            "picBed": {"uploader": "smms"},
        })));
        let picflow = offline().with_persistence(persistence).build().unwrap();
        assert_eq!(
            picflow.config().get_config(Some("picBed.uploader")),
            json!("smms")
        );
    }

    #[test]
    fn test_build_skips_disabled_and_failing_packages() {
        let persistence = Arc::new(MemoryPersistence::with_tree(json!({
            "plugins": {"picflow-plugin-off": false},
        })));
        let picflow = offline()
            .with_persistence(persistence)
            .with_package("picflow-plugin-mock", mock_plugin())
            .with_package("picflow-plugin-off", mock_plugin())
            .with_package(
                "picflow-plugin-broken",
                Arc::new(|_: &ExecutionContext| -> anyhow::Result<Arc<dyn crate::plugin::Plugin>> {
                    anyhow::bail!("missing native dependency")
                }),
            )
            .build()
            .unwrap();

        assert_eq!(picflow.plugins().get_list(), vec!["picflow-plugin-mock"]);
        assert_eq!(picflow.plugins().get_full_list().len(), 3);
    }

    #[tokio::test]
    async fn test_upload_end_to_end() {
        let events = Arc::new(CollectingEventSink::new());
        let picflow = offline()
            .with_events(events.clone())
            .with_package("picflow-plugin-mock", mock_plugin())
            .build()
            .unwrap();
        picflow
            .config()
            .set_config(json!({"picBed.uploader": "picflow-plugin-mock"}))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"png").unwrap();

        let output = picflow.upload(vec![InputItem::Path(file)]).await.unwrap();
        assert_eq!(output[0].img_url.as_deref(), Some("https://mock.example/a.png"));
        assert!(events.names().contains(&crate::events::UPLOAD_FINISHED.to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_use_separate_contexts() {
        let picflow = offline().with_package("mock", mock_plugin()).build().unwrap();
        picflow.config().set_config(json!({"picBed.uploader": "mock"})).unwrap();

        let (a, b) = tokio::join!(
            picflow.upload(vec![InputItem::parse("data:image/png;base64,YQ==")]),
            picflow.upload(vec![
                InputItem::parse("data:image/png;base64,Yg=="),
                InputItem::parse("data:image/gif;base64,Yw=="),
            ]),
        );
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_install_without_installer_is_config_error() {
        let picflow = offline().build().unwrap();
        let err = picflow
            .install(&["picflow-plugin-x".to_string()], &InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PicflowError::Config(_)));
    }

    #[tokio::test]
    async fn test_install_and_uninstall_persist_flags() {
        let persistence = Arc::new(MemoryPersistence::new());
        let installer = Arc::new(RecordingInstaller::default());
        let picflow = offline()
            .with_persistence(persistence.clone())
            .with_installer(installer.clone())
            .with_package("mock", mock_plugin())
            .build()
            .unwrap();
        let packages = vec!["mock".to_string()];

        let outcome = picflow
            .install(&packages, &InstallOptions::default())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(
            persistence.persisted().unwrap()["plugins"]["mock"],
            json!(true)
        );
        assert!(picflow.plugins().has_plugin("mock"));

        picflow
            .uninstall(&packages, &InstallOptions::default())
            .await
            .unwrap();
        assert!(!picflow.plugins().has_plugin("mock"));
        assert!(picflow.registries().uploader.get("mock").is_none());
        assert!(persistence.persisted().unwrap()["plugins"].get("mock").is_none());

        let ops: Vec<_> = installer.calls.lock().iter().map(|(op, _)| op.clone()).collect();
        assert_eq!(ops, vec!["install", "uninstall"]);
    }
}
