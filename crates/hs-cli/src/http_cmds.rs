// SPDX-License-Identifier: MIT OR Apache-2.0
//! The request-making commands: per-method (`hs GET …`), `hs build`, and
//! `hs run`.

use crate::output::OutputFormat;
use crate::progress::{self, ProgressMode};
use crate::{BuildCmdArgs, DoArgs, RunCmdArgs, input, output, signal};
use anyhow::Result;
use hs_http::{AddInputField, BuildCommand, HttpCommand, RetryFn, RunCommand, default_retry};
use hs_runtime::loadjson::load_json_table;
use hs_runtime::{Context, Options};
use hs_stream::{CancellationToken, JsonLineSink, RecordCommand, run_parallel};
use std::sync::Arc;

pub async fn cmd_do(method: &str, args: DoArgs) -> Result<()> {
    let mut ctx = init_context(Options {
        cookie_specs: args.run.cookies.clone(),
    })?;
    apply_load_specs(&mut ctx, &args.build.loadjson)?;

    let cmd = Arc::new(HttpCommand::new(
        method,
        &args.url,
        args.body.as_deref().unwrap_or(""),
        &args.build.headers,
        &ctx,
        retry_policy(args.run.retries),
    )?);

    // With `full` output each record also echoes the input that built it.
    let pipeline_cmd: Arc<dyn RecordCommand> = if args.run.output == OutputFormat::Full {
        Arc::new(AddInputField::new(cmd.clone(), "input"))
    } else {
        cmd.clone()
    };

    let input = input::open_input(args.common.input)?;
    let sink = Arc::new(output::open_output(args.run.output, &args.run.failfile)?);

    let cancel = CancellationToken::new();
    let (input, counter, progress) =
        progress::attach(&cancel, input, progress_enabled(args.run.progress));
    signal::attach_two_stage(&cancel, {
        let cmd = cmd.clone();
        move || cmd.set_dry_run()
    });

    let result = run_parallel(
        &cancel,
        pipeline_cmd,
        ctx.globals.binds.clone(),
        input,
        sink,
        args.run.parallel,
        counter,
    )
    .await;

    cancel.cancel();
    progress.finish().await;
    result
}

pub async fn cmd_build(args: BuildCmdArgs) -> Result<()> {
    let mut ctx = init_context(Options::default())?;
    apply_load_specs(&mut ctx, &args.build.loadjson)?;

    let cmd = Arc::new(BuildCommand::new(
        &args.method,
        &args.url,
        args.body.as_deref().unwrap_or(""),
        &args.build.headers,
        &ctx,
    )?);

    let input = input::open_input(args.common.input)?;
    let sink = Arc::new(JsonLineSink::new(Box::new(std::io::stdout())));

    let cancel = CancellationToken::new();
    run_parallel(&cancel, cmd, ctx.globals.binds.clone(), input, sink, 1, None).await
}

pub async fn cmd_run(args: RunCmdArgs) -> Result<()> {
    let ctx = init_context(Options {
        cookie_specs: args.run.cookies.clone(),
    })?;

    let cmd = Arc::new(RunCommand::new(&ctx, retry_policy(args.run.retries)));

    let input = input::open_input(args.common.input)?;
    let sink = Arc::new(output::open_output(args.run.output, &args.run.failfile)?);

    let cancel = CancellationToken::new();
    let (input, counter, progress) =
        progress::attach(&cancel, input, progress_enabled(args.run.progress));
    signal::attach_two_stage(&cancel, {
        let cmd = cmd.clone();
        move || cmd.set_dry_run()
    });

    let result = run_parallel(
        &cancel,
        cmd,
        ctx.globals.binds.clone(),
        input,
        sink,
        args.run.parallel,
        counter,
    )
    .await;

    cancel.cancel();
    progress.finish().await;
    result
}

fn init_context(opts: Options) -> Result<Context> {
    let ctx = Context::default_context(opts)?;
    if let Some(warning) = hs_runtime::config::missing_base_config_warning() {
        tracing::warn!(target: "hs.config", "{warning}");
    }
    Ok(ctx)
}

fn apply_load_specs(ctx: &mut Context, specs: &[String]) -> Result<()> {
    // All tables load before any template parses, so templates resolve
    // against the final scope.
    for spec in specs {
        ctx.globals = load_json_table(spec, &ctx.globals, &ctx.funcs)?;
    }
    Ok(())
}

fn retry_policy(retries: usize) -> Option<RetryFn> {
    (retries > 0).then(|| default_retry(retries))
}

fn progress_enabled(mode: ProgressMode) -> bool {
    match mode {
        ProgressMode::True => true,
        ProgressMode::False => false,
        // By default only when output is redirected to a regular file:
        // a TTY shows bodies, and pipes stay quiet.
        ProgressMode::Auto => stdout_is_regular_file(),
    }
}

fn stdout_is_regular_file() -> bool {
    #[cfg(unix)]
    {
        use std::os::fd::AsFd;
        let Ok(fd) = std::io::stdout().as_fd().try_clone_to_owned() else {
            return false;
        };
        std::fs::File::from(fd)
            .metadata()
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        false
    }
}
