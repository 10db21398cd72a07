use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use site_builder::provision::checkout;
use site_builder::{
    preflight, BackupJob, DiskTemplates, DrushProbe, Environment, Handler, Orchestrator,
    PlatformProfile, ProvisionOptions,
};

fn usage() -> &'static str {
    "Usage:\n  site-builder provision <project> <install|import|restore> --db-password <pw> [--dump <file>]\n  site-builder provision <project> update <env> --db-password <pw>\n  site-builder permissions <project> <install|import|restore|update> [env]\n  site-builder backup <project> <name> [dev|test|live ...]\n  site-builder seed <project> <tag>"
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [cmd, project, handler, rest @ ..] if cmd == "provision" => {
            run_provision(project, handler, rest)
        }
        [cmd, project, handler] if cmd == "permissions" => {
            run_permissions(project, handler, None)
        }
        [cmd, project, handler, env] if cmd == "permissions" => {
            run_permissions(project, handler, Some(env))
        }
        [cmd, project, name, envs @ ..] if cmd == "backup" => run_backup(project, name, envs),
        [cmd, project, tag] if cmd == "seed" => run_seed(project, tag),
        _ => bail!(usage()),
    }
}

fn run_provision(project: &str, handler: &str, rest: &[String]) -> Result<()> {
    let handler = Handler::from_str(handler)?;

    let mut environment = None;
    let mut db_password = None;
    let mut db_dump = None;
    let mut rest = rest.iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--db-password" => {
                db_password = Some(
                    rest.next()
                        .with_context(|| usage())?
                        .clone(),
                );
            }
            "--dump" => {
                db_dump = Some(PathBuf::from(
                    rest.next().with_context(|| usage())?,
                ));
            }
            other if environment.is_none() && !other.starts_with("--") => {
                environment = Some(Environment::from_str(other)?);
            }
            _ => bail!(usage()),
        }
    }
    let db_password = db_password.with_context(|| usage())?;

    let profile = PlatformProfile::detect()?;
    preflight::check_host_tools(&profile)?;

    let emitter = DiskTemplates::new(&profile.template_dir);
    let probe = DrushProbe::new(&profile);
    let orchestrator = Orchestrator::new(&profile, &emitter, &probe);

    let options = ProvisionOptions {
        db_password,
        db_dump,
    };
    orchestrator.provision(project, handler, environment, &options)?;
    orchestrator.apply_permissions(project, handler, environment)
}

fn run_permissions(project: &str, handler: &str, env: Option<&String>) -> Result<()> {
    let handler = Handler::from_str(handler)?;
    let environment = env.map(|e| Environment::from_str(e)).transpose()?;

    let profile = PlatformProfile::detect()?;
    let emitter = DiskTemplates::new(&profile.template_dir);
    let probe = DrushProbe::new(&profile);
    let orchestrator = Orchestrator::new(&profile, &emitter, &probe);
    orchestrator.apply_permissions(project, handler, environment)
}

fn run_backup(project: &str, name: &str, envs: &[String]) -> Result<()> {
    let environments = if envs.is_empty() {
        Environment::REGISTRY.to_vec()
    } else {
        envs.iter()
            .map(|e| Environment::from_str(e))
            .collect::<Result<Vec<_>, _>>()?
    };

    let profile = PlatformProfile::detect()?;
    preflight::check_host_tools(&profile)?;

    let job = BackupJob::new(&profile, project, name)?;
    job.run(&environments)?;
    Ok(())
}

fn run_seed(project: &str, tag: &str) -> Result<()> {
    let profile = PlatformProfile::detect()?;
    preflight::check_host_tools(&profile)?;
    checkout::seed_environments(&profile, project, tag)
}
