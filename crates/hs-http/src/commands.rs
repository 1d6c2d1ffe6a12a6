// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipeline commands over the builder and runner.

use crate::HttpError;
use crate::builder::RequestTemplate;
use crate::retry::RetryFn;
use crate::runner::HttpRunner;
use crate::types::extract_request;
use anyhow::Result;
use async_trait::async_trait;
use hs_expr::Bindings;
use hs_record::Record;
use hs_runtime::Context;
use hs_stream::{CancellationToken, RecordCommand};
use serde_json::Value;
use std::sync::Arc;

/// Builds and executes one request per input record.
pub struct HttpCommand {
    template: RequestTemplate,
    runner: HttpRunner,
}

impl HttpCommand {
    /// Compiles the templates against the context's global scope.
    pub fn new(
        method: &str,
        url_src: &str,
        body_src: &str,
        header_srcs: &[String],
        ctx: &Context,
        retry: Option<RetryFn>,
    ) -> Result<Self, HttpError> {
        Ok(HttpCommand {
            template: RequestTemplate::new(
                method,
                url_src,
                body_src,
                header_srcs,
                &ctx.globals.scope,
                &ctx.funcs,
                ctx.default_host.clone(),
                ctx.host_alias.clone(),
            )?,
            runner: HttpRunner::new(ctx.client.clone(), retry),
        })
    }

    /// Switches request execution to dry-run (sticky).
    pub fn set_dry_run(&self) {
        self.runner.set_dry_run();
    }
}

#[async_trait]
impl RecordCommand for HttpCommand {
    async fn run(
        &self,
        cancel: &CancellationToken,
        rec: Record,
        binds: &Arc<Bindings>,
    ) -> Result<Vec<Record>> {
        let req = self.template.build(&rec, binds)?;
        let out = self.runner.run(cancel, req).await?;
        Ok(vec![out])
    }
}

/// Builds request records without executing them (`hs build`).
pub struct BuildCommand {
    template: RequestTemplate,
}

impl BuildCommand {
    /// Compiles the templates against the context's global scope.
    pub fn new(
        method: &str,
        url_src: &str,
        body_src: &str,
        header_srcs: &[String],
        ctx: &Context,
    ) -> Result<Self, HttpError> {
        Ok(BuildCommand {
            template: RequestTemplate::new(
                method,
                url_src,
                body_src,
                header_srcs,
                &ctx.globals.scope,
                &ctx.funcs,
                ctx.default_host.clone(),
                ctx.host_alias.clone(),
            )?,
        })
    }
}

#[async_trait]
impl RecordCommand for BuildCommand {
    async fn run(
        &self,
        _cancel: &CancellationToken,
        rec: Record,
        binds: &Arc<Bindings>,
    ) -> Result<Vec<Record>> {
        Ok(vec![self.template.build(&rec, binds)?.to_record()])
    }
}

/// Executes prebuilt request records from the input stream (`hs run`).
pub struct RunCommand {
    runner: HttpRunner,
}

impl RunCommand {
    /// Creates the command over the context's shared client.
    pub fn new(ctx: &Context, retry: Option<RetryFn>) -> Self {
        RunCommand {
            runner: HttpRunner::new(ctx.client.clone(), retry),
        }
    }

    /// Switches request execution to dry-run (sticky).
    pub fn set_dry_run(&self) {
        self.runner.set_dry_run();
    }
}

#[async_trait]
impl RecordCommand for RunCommand {
    async fn run(
        &self,
        cancel: &CancellationToken,
        rec: Record,
        _binds: &Arc<Bindings>,
    ) -> Result<Vec<Record>> {
        let req = extract_request(&rec)?;
        let out = self.runner.run(cancel, req).await?;
        Ok(vec![out])
    }
}

/// Decorates another command, injecting the input record into each output
/// object under `field` (used by the `full` output mode).
pub struct AddInputField {
    inner: Arc<dyn RecordCommand>,
    field: &'static str,
}

impl AddInputField {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn RecordCommand>, field: &'static str) -> Self {
        AddInputField { inner, field }
    }
}

#[async_trait]
impl RecordCommand for AddInputField {
    async fn run(
        &self,
        cancel: &CancellationToken,
        rec: Record,
        binds: &Arc<Bindings>,
    ) -> Result<Vec<Record>> {
        let input = rec.clone();
        let mut outs = self.inner.run(cancel, rec, binds).await?;
        for out in &mut outs {
            if let Value::Object(obj) = out {
                obj.insert(self.field.to_string(), input.clone());
            }
        }
        Ok(outs)
    }
}
