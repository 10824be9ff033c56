use anyhow::Result;
use clap::Args;

use crate::config;

#[derive(Debug, Clone, Args)]
pub struct ConfigureCommand {
    #[arg(long, help = "Print the effective settings instead of editing them")]
    pub show: bool,
}

impl ConfigureCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        if !self.show {
            return config::configure_interactive(profile).await;
        }

        let config = config::load(profile).await?;
        println!("[{profile}]");
        println!("tag         = {}", config.tag);
        println!("output_file = {}", config.output_file.display());
        println!(
            "region      = {}",
            config.region.as_deref().unwrap_or("(SDK default)")
        );
        println!("op_path     = {}", config.op_path.display());
        Ok(())
    }
}
