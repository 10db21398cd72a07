//! Lifecycle orchestration.
//!
//! Given a project and a handler action, the orchestrator computes the
//! environment subset (single environment for `update`, the full registry
//! otherwise) and drives each environment's resource steps in registry
//! order: vhost, database, settings include, solr index, drush alias,
//! cron job.
//!
//! Failure semantics: the run halts at the first failing step and the
//! error names the project, environment, and step. Environments completed
//! before the failure are left as-is - partial success is visible state,
//! not something to roll back.

pub mod checkout;
pub mod cron;
pub mod database;
pub mod drush;
pub mod settings;
pub mod solr;
pub mod vhost;

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::environment::Environment;
use crate::error::Error;
use crate::handler::{validate_project_name, Handler};
use crate::locator::locate;
use crate::lock::ProjectLock;
use crate::permissions::{self, InstallProbe};
use crate::platform::PlatformProfile;
use crate::template::Emitter;

/// Per-run inputs that are not derivable from the project name.
pub struct ProvisionOptions {
    /// Password for the project's database user.
    pub db_password: String,
    /// Optional SQL dump to load into each environment's database.
    pub db_dump: Option<PathBuf>,
}

/// Drives lifecycle actions against one project at a time.
pub struct Orchestrator<'a> {
    profile: &'a PlatformProfile,
    emitter: &'a dyn Emitter,
    probe: &'a dyn InstallProbe,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        profile: &'a PlatformProfile,
        emitter: &'a dyn Emitter,
        probe: &'a dyn InstallProbe,
    ) -> Self {
        Orchestrator {
            profile,
            emitter,
            probe,
        }
    }

    /// Provision the handler's environment subset for `project`.
    ///
    /// Holds the project lock for the whole run; a concurrent operation on
    /// the same project fails fast with [`Error::ProjectLocked`].
    pub fn provision(
        &self,
        project: &str,
        handler: Handler,
        environment: Option<Environment>,
        options: &ProvisionOptions,
    ) -> Result<()> {
        validate_project_name(project)?;
        let environments = handler.target_environments(environment)?;
        let _lock = ProjectLock::acquire(self.profile, project)?;

        for &env in &environments {
            self.provision_environment(project, env, options)?;
        }
        println!(
            "[{}] {} complete for {} environment(s)",
            project,
            handler,
            environments.len()
        );
        Ok(())
    }

    /// Reconcile ownership and modes for the handler's environment subset.
    pub fn apply_permissions(
        &self,
        project: &str,
        handler: Handler,
        environment: Option<Environment>,
    ) -> Result<()> {
        validate_project_name(project)?;
        let _lock = ProjectLock::acquire(self.profile, project)?;
        permissions::reconcile(self.profile, self.probe, project, handler, environment)
    }

    fn provision_environment(
        &self,
        project: &str,
        env: Environment,
        options: &ProvisionOptions,
    ) -> Result<()> {
        let step = |name: &'static str| Error::Step {
            project: project.to_string(),
            environment: env,
            step: name,
        };
        let desc = locate(project, env, self.profile);

        println!("[{}:{}] writing vhost", project, env);
        vhost::create(self.profile, self.emitter, &desc, &options.db_password)
            .with_context(|| step("vhost"))?;

        println!("[{}:{}] provisioning database {}", project, env, desc.db_name);
        database::create(&desc.db_name).with_context(|| step("database"))?;
        database::grant(&desc.db_name, &desc.db_username, &options.db_password)
            .with_context(|| step("database"))?;
        if let Some(dump) = &options.db_dump {
            database::import_dump(&desc.db_name, dump)
                .with_context(|| step("database-import"))?;
        }

        settings::seed(self.emitter, &desc).with_context(|| step("settings"))?;

        println!("[{}:{}] creating solr index", project, env);
        solr::create_index(self.profile, self.emitter, &desc)
            .with_context(|| step("solr"))?;

        drush::create_alias(self.emitter, &desc).with_context(|| step("drush-alias"))?;

        println!("[{}:{}] creating cron job", project, env);
        cron::create_job(self.profile, self.emitter, &desc)
            .with_context(|| step("cron"))?;

        Ok(())
    }
}
