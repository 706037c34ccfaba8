use forkserver_transport::rebind_stdio;
use forkserver_worker::{ForkServer, WorkerConfig};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{server_error, transport_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let mut config = WorkerConfig::default();
    if let Some(dir) = args.resource_dir {
        if !dir.is_dir() {
            return Err(CliError::new(
                USAGE,
                format!("resource directory {} does not exist", dir.display()),
            ));
        }
        config = config.with_resource_dir(dir);
    }

    let channel = rebind_stdio().map_err(|err| transport_error("stdio rebind failed", err))?;
    info!(
        pid = std::process::id(),
        resource_dir = %config.resource_dir.display(),
        "worker serving parent"
    );

    let server = ForkServer::from_stdio(channel, config);
    let summary = server
        .run()
        .map_err(|err| server_error("command loop failed", err))?;

    info!(
        echoes = summary.echoes,
        failures = summary.failures,
        resources = summary.resources_created,
        "worker exiting"
    );
    Ok(SUCCESS)
}
