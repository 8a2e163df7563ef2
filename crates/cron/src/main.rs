use anyhow::Result;
use matview_cron::app::MatviewCronApp;
use matview_cron::bootstrap::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let exit_code = MatviewCronApp::run(None, None).await?;
    std::process::exit(exit_code);
}
