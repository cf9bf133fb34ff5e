use crate::context::{self, Overrides};
use anyhow::Context;
use std::sync::Arc;

pub fn run(overrides: &Overrides, port: u16) -> anyhow::Result<()> {
    let config = overrides.load_config()?;
    for w in config.validate() {
        tracing::warn!("config: {}", w.message);
    }

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let orch = context::orchestrator(config, rt.handle().clone())?;

    rt.block_on(storefleet_server::serve(Arc::new(orch), port))
}
