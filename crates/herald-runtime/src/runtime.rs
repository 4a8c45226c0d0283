//! Runtime bootstrap.
//!
//! [`HeraldRuntime`] ties configuration, logging and the [`Container`]
//! together and hands out mediators wired to them.
//!
//! ```rust,ignore
//! use herald_runtime::{HeraldRuntime, Lifetime};
//!
//! let runtime = HeraldRuntime::builder()
//!     .profile("production")
//!     .configure(|c| {
//!         c.add_request_handler::<GetUser, _, _>(Lifetime::Scoped, |_| Ok(GetUserHandler));
//!     })
//!     .build()?;
//!
//! let mediator = runtime.build_mediator(
//!     runtime
//!         .mediator_builder()
//!         .request_handler::<GetUser, GetUserHandler>(),
//! );
//!
//! // One scope per unit of work.
//! let user = runtime.scoped(&mediator).send(GetUser { id: 7 }).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use herald_core::{DefaultEnvelopeFactory, Mediator, MediatorBuilder, Resolver};

use crate::config::{ConfigLoader, HeraldConfig, validate_config};
use crate::container::Container;
use crate::error::RuntimeResult;
use crate::logging;

/// Configuration plus the root container.
pub struct HeraldRuntime {
    config: HeraldConfig,
    container: Arc<Container>,
}

impl HeraldRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates the configuration and initializes logging from it; logging
    /// is left alone if a subscriber is already installed.
    pub fn from_config(config: HeraldConfig, container: Container) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        info!(
            source = %config.mediator.source,
            default_strategy = %config.mediator.default_strategy,
            registrations = container.len(),
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            container: Arc::new(container),
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// The root container.
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// The root container as a resolver.
    pub fn resolver(&self) -> Arc<dyn Resolver> {
        Arc::clone(&self.container) as Arc<dyn Resolver>
    }

    /// An envelope factory stamping the configured source.
    pub fn envelope_factory(&self) -> DefaultEnvelopeFactory {
        DefaultEnvelopeFactory::new(self.config.mediator.source.clone())
    }

    /// A mediator builder preset with the configured envelope source and
    /// default publish strategy.
    pub fn mediator_builder(&self) -> MediatorBuilder {
        Mediator::builder()
            .envelope_factory(self.envelope_factory())
            .default_strategy(self.config.mediator.default_strategy)
    }

    /// Builds a mediator resolving through the root container.
    pub fn build_mediator(&self, builder: MediatorBuilder) -> Mediator {
        builder.build(self.resolver())
    }

    /// Returns `mediator` resolving through a fresh scope.
    pub fn scoped(&self, mediator: &Mediator) -> Mediator {
        mediator.with_resolver(Arc::new(self.container.create_scope()))
    }
}

impl std::fmt::Debug for HeraldRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldRuntime")
            .field("config", &self.config)
            .field("container", &self.container)
            .finish()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`HeraldRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    container: Container,
}

impl RuntimeBuilder {
    /// Creates a builder with an empty container.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            container: Container::new(),
        }
    }

    /// Loads this file instead of searching for `herald.*`.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Overrides `HERALD_PROFILE`.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Ignores `HERALD_*` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Layers `config` above the defaults and below any file.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Replaces the container.
    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Adds registrations to the container.
    pub fn configure(mut self, f: impl FnOnce(&mut Container)) -> Self {
        f(&mut self.container);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = self.config_loader.load()?;
        HeraldRuntime::from_config(config, self.container)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use figment::Jail;
    use herald_core::prelude::*;
    use herald_core::{CallContext, HandlerResult, PublishStrategy};

    use super::*;
    use crate::config::ConfigError;
    use crate::container::Lifetime;
    use crate::error::RuntimeError;

    struct WhoAmI;

    impl Request for WhoAmI {
        type Response = (String, usize);
    }

    struct WhoAmIHandler {
        instance: usize,
    }

    #[async_trait]
    impl RequestHandler<WhoAmI> for WhoAmIHandler {
        async fn handle(&self, _request: &WhoAmI, ctx: &CallContext) -> HandlerResult<(String, usize)> {
            Ok((ctx.envelope().source.clone(), self.instance))
        }
    }

    fn runtime(jail: &Jail) -> RuntimeResult<HeraldRuntime> {
        let created = Arc::new(AtomicUsize::new(0));
        HeraldRuntime::builder()
            .search_path(jail.directory())
            .configure(move |c| {
                c.add_request_handler::<WhoAmI, _, _>(Lifetime::Scoped, move |_| Ok(WhoAmIHandler {
                    instance: created.fetch_add(1, Ordering::SeqCst),
                }));
            })
            .build()
    }

    #[test]
    fn test_build_applies_config() {
        Jail::expect_with(|jail| {
            jail.set_env("HERALD_MEDIATOR__SOURCE", "orders");
            jail.set_env("HERALD_MEDIATOR__DEFAULT_STRATEGY", "sequential-stop");

            let runtime = runtime(jail).map_err(|e| e.to_string())?;
            let mediator = runtime.build_mediator(runtime.mediator_builder());

            assert_eq!(runtime.envelope_factory().source(), "orders");
            assert_eq!(mediator.default_strategy(), PublishStrategy::SequentialStop);
            assert!(runtime.container().contains::<WhoAmIHandler>());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = HeraldConfig::default();
        config.mediator.source.clear();

        let result = HeraldRuntime::from_config(config, Container::new());
        assert!(matches!(
            result,
            Err(RuntimeError::Config(ConfigError::MissingField { .. }))
        ));
    }

    #[tokio::test]
    async fn test_scoped_mediators_get_fresh_scoped_handlers() {
        let mut config = HeraldConfig::default();
        config.mediator.source = "scoped-test".to_string();

        let created = Arc::new(AtomicUsize::new(0));
        let mut container = Container::new();
        container.add_request_handler::<WhoAmI, _, _>(Lifetime::Scoped, move |_| Ok(WhoAmIHandler {
            instance: created.fetch_add(1, Ordering::SeqCst),
        }));

        let runtime = HeraldRuntime::from_config(config, container).unwrap();
        let mediator = runtime.build_mediator(
            runtime
                .mediator_builder()
                .request_handler::<WhoAmI, WhoAmIHandler>(),
        );

        let first = runtime.scoped(&mediator);
        let second = runtime.scoped(&mediator);

        let a = first.send(WhoAmI).await.unwrap();
        let b = first.send(WhoAmI).await.unwrap();
        let c = second.send(WhoAmI).await.unwrap();

        assert_eq!(a, ("scoped-test".to_string(), 0));
        assert_eq!(b.1, 0);
        assert_eq!(c.1, 1);
    }
}
