use anyhow::Context as _;
use std::sync::Arc;

use pingr_core::{LoadTest, RetryingProbe, RunConfig};
use pingr_http::HttpStatusClient;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::logging;
use crate::output;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let cfg = run_config(&args);
    cfg.validate()?;
    pingr_http::validate_target(&cfg.target)
        .map_err(|err| RunError::InvalidInput(anyhow::Error::new(err)))?;

    logging::init(args.log_file.as_deref()).map_err(RunError::RuntimeError)?;

    let out = output::formatter(args.output);
    let client = Arc::new(HttpStatusClient::default());

    out.print_header(&cfg);

    if !args.skip_preflight {
        let preflight = RetryingProbe::new(client.clone())
            .preflight(&cfg.job_spec())
            .await
            .with_context(|| {
                format!(
                    "preflight query to {} failed (use --skip-preflight to run anyway)",
                    cfg.target
                )
            })
            .map_err(RunError::PreflightFailed)?;
        out.print_preflight(&cfg.target, &preflight);
    }

    let mut load = LoadTest::new(cfg, client);
    if let Some(progress) = out.progress() {
        load = load.with_progress(progress);
    }

    let interrupt = load.controller().cancel_on(async {
        // Without a signal handler the run can only end by itself.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    });

    let report = load.run().await;
    interrupt.abort();
    let report = report?;

    out.print_summary(&report).map_err(RunError::RuntimeError)?;

    Ok(ExitCode::Success)
}

fn run_config(args: &RunArgs) -> RunConfig {
    RunConfig {
        target: args.target.trim().to_string(),
        concurrency: args.concurrency,
        total: args.total,
        qps: args.qps,
        timeout: args.timeout,
        retries: args.retries,
        grace: args.grace,
    }
}
