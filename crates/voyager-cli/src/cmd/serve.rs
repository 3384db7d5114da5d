use std::path::Path;
use voyager_core::config::Config;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    Config::load(root)?;

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();
    rt.block_on(async move {
        tokio::select! {
            res = voyager_server::serve(root_buf, port) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
