use clap::Parser;

use docent_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	docent_eval::run(args).await
}
