use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use etl_lib::{
    BrowserManager, BrowserOptions, Config, ExtractRequest, ExtractResponse, ExtractionEngine,
};
use tracing::{debug, info};

use crate::cli::IoArgs;
use crate::formatting::{render_error, write_output};

use super::read_request;

/// Run the extract command. The browser is only launched for web sources.
pub async fn run_extract(
    config: &Config,
    io: &IoArgs,
    nav_timeout: Option<u64>,
    headed: bool,
) -> ExitCode {
    let request: ExtractRequest = match read_request(&io.input) {
        Ok(request) => request,
        Err(err) => return render_error(err, io.format, io.output.as_deref()),
    };
    let extraction = match request.into_config() {
        Ok(extraction) => extraction,
        Err(err) => return render_error(err, io.format, io.output.as_deref()),
    };

    let mut options = BrowserOptions::from(&config.browser);
    if let Some(ms) = nav_timeout {
        options.navigation_timeout = Duration::from_millis(ms);
    }
    if headed {
        options.headless = false;
    }
    debug!(?options, "browser options");

    let browser = Arc::new(BrowserManager::chromium(options));
    let engine = ExtractionEngine::new(Arc::clone(&browser));
    let outcome = engine.extract(extraction).await;

    if browser.launch_attempts() > 0 {
        info!("shutting down browser");
        browser.stop().await;
    }

    match outcome {
        Ok(result) => {
            let body = ExtractResponse::from(result);
            match write_output(&body, io.format, io.output.as_deref()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => render_error(err, io.format, io.output.as_deref()),
            }
        }
        Err(err) => render_error(err, io.format, io.output.as_deref()),
    }
}
