// SPDX-License-Identifier: MIT OR Apache-2.0
//! `hs expr` — apply one expression to each input JSON value.

use crate::ExprArgs;
use anyhow::{Context as _, Result};
use hs_record::stream::json_stream;
use hs_runtime::{Context, Options};
use std::io::Write;

pub fn cmd_expr(args: ExprArgs) -> Result<()> {
    let ctx = Context::default_context(Options::default())?;

    let expr = hs_expr::parse_expr(&args.expression, &ctx.globals.scope, &ctx.funcs)
        .context("bad expression")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for item in json_stream(std::io::stdin()) {
        let rec = item.context("error reading input")?;
        let result = expr
            .eval(&rec, &ctx.globals.binds)
            .context("error evaluating expression")?;
        serde_json::to_writer(&mut out, &result).context("error writing output")?;
        out.write_all(b"\n").context("error writing output")?;
    }
    Ok(())
}
